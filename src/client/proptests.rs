//! Property-based tests for the conversation state machine

use super::state::*;
use super::transition::*;
use super::*;
use crate::wire::{ErrorKind, StreamChunk};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn online() -> Conversation {
    let mut conv = Conversation::new();
    conv.availability = Availability::Online;
    conv
}

/// Apply an event, keeping the old conversation when it is rejected
fn step(conv: Conversation, event: Event) -> Conversation {
    match transition(&conv, event) {
        Ok(result) => result.new_state,
        Err(_) => conv,
    }
}

fn submit() -> Event {
    Event::Submit { text: None }
}

fn delta(generation: u64, text: &str) -> Event {
    Event::Chunk {
        generation,
        chunk: StreamChunk::delta(text),
    }
}

fn submitted(text: &str) -> Conversation {
    let conv = step(online(), Event::InputChanged { text: text.to_string() });
    step(conv, submit())
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_error_kind() -> impl Strategy<Value = ErrorKind> {
    prop_oneof![
        Just(ErrorKind::InvalidRequest),
        Just(ErrorKind::Unconfigured),
        Just(ErrorKind::UpstreamUnavailable),
        Just(ErrorKind::GenerationFailed),
    ]
}

fn arb_chunk() -> impl Strategy<Value = StreamChunk> {
    prop_oneof![
        4 => "[a-zA-Z ]{0,12}".prop_map(StreamChunk::delta),
        1 => Just(StreamChunk::Done),
        1 => (arb_error_kind(), "[a-z ]{0,12}").prop_map(|(k, m)| StreamChunk::error(k, m)),
    ]
}

/// Any event, with generations drawn from a small range so that both
/// current and stale tags occur
fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-z ]{0,8}".prop_map(|text| Event::InputChanged { text }),
        Just(Event::Submit { text: None }),
        Just(Event::Cancel),
        Just(Event::Clear),
        Just(Event::RefreshHealth),
        any::<bool>().prop_map(|configured| Event::HealthChecked { configured }),
        (0u64..4).prop_map(|generation| Event::StreamOpened { generation }),
        (0u64..4, arb_chunk()).prop_map(|(generation, chunk)| Event::Chunk { generation, chunk }),
        (0u64..4, arb_error_kind(), "[a-z]{0,8}").prop_map(|(generation, kind, message)| {
            Event::StreamFailed {
                generation,
                kind,
                message,
            }
        }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The assistant message equals the concatenation of its deltas
    #[test]
    fn deltas_concatenate_in_order(deltas in prop::collection::vec("[a-zA-Z0-9 .,]{0,16}", 0..20)) {
        let mut conv = submitted("hi");
        for text in &deltas {
            conv = step(conv, delta(1, text));
        }
        conv = step(conv, Event::Chunk { generation: 1, chunk: StreamChunk::Done });

        prop_assert_eq!(conv.lifecycle(), &Lifecycle::Idle);
        prop_assert_eq!(conv.messages().len(), 2);
        prop_assert_eq!(&conv.messages()[1].content, &deltas.concat());
        prop_assert_eq!(conv.messages()[1].status, MessageStatus::Complete);
    }

    /// Whitespace-only input never changes the conversation
    #[test]
    fn whitespace_submit_is_ignored(text in "[ \t\n]{0,10}") {
        let conv = step(online(), Event::InputChanged { text });
        let result = transition(&conv, submit()).unwrap();

        prop_assert!(result.effects.is_empty());
        prop_assert!(result.new_state.messages().is_empty());
        prop_assert_eq!(result.new_state.lifecycle(), &Lifecycle::Idle);
    }

    /// Submitting while a request is in flight is rejected and changes nothing,
    /// whether the buffer or an explicit text is submitted
    #[test]
    fn submit_while_busy_is_rejected(
        deltas in prop::collection::vec("[a-z]{1,5}", 0..5),
        draft in "[a-z]{0,8}",
        text in "[a-z]{1,8}",
    ) {
        let mut conv = submitted("first");
        for d in &deltas {
            conv = step(conv, delta(1, d));
        }
        conv = step(conv, Event::InputChanged { text: draft });

        let before = conv.snapshot();
        for event in [submit(), Event::Submit { text: Some(text.clone()) }] {
            prop_assert_eq!(transition(&conv, event).unwrap_err(), TransitionError::Busy);
            prop_assert_eq!(conv.snapshot(), before.clone());
        }
    }

    /// After a cancel, nothing tagged with the cancelled generation has any effect
    #[test]
    fn cancelled_generation_is_inert(late in prop::collection::vec(arb_chunk(), 0..10)) {
        let conv = step(submitted("story"), delta(1, "Once"));
        let cancelled = step(conv, Event::Cancel);
        let before = cancelled.snapshot();

        let mut conv = cancelled;
        for chunk in late {
            let result = transition(&conv, Event::Chunk { generation: 1, chunk }).unwrap();
            prop_assert!(result.effects.is_empty());
            conv = result.new_state;
        }
        prop_assert_eq!(conv.snapshot(), before);
    }

    /// Structural invariants hold under any event sequence
    #[test]
    fn invariants_hold_for_any_sequence(events in prop::collection::vec(arb_event(), 0..60)) {
        let mut conv = online();

        for event in events {
            let before = conv.snapshot();
            let frozen: Vec<Message> = conv
                .messages()
                .iter()
                .filter(|m| !m.is_in_progress())
                .cloned()
                .collect();

            conv = match transition(&conv, event) {
                Ok(result) => result.new_state,
                Err(_) => {
                    // Rejections never mutate
                    prop_assert_eq!(conv.snapshot(), before);
                    conv
                }
            };

            // At most one message in progress, and only as the last one
            let in_progress: Vec<_> = conv
                .messages()
                .iter()
                .enumerate()
                .filter(|(_, m)| m.is_in_progress())
                .map(|(i, _)| i)
                .collect();
            prop_assert!(in_progress.len() <= 1);
            if let Some(&i) = in_progress.first() {
                prop_assert_eq!(i, conv.messages().len() - 1);
                prop_assert!(matches!(conv.lifecycle(), Lifecycle::Streaming { .. }), "lifecycle must be Streaming while a message is in progress");
            }

            // Frozen messages are never edited; they only disappear on clear
            if !conv.messages().is_empty() {
                for message in &frozen {
                    if let Some(now) = conv.messages().iter().find(|m| m.id == message.id) {
                        prop_assert_eq!(now, message);
                    }
                }
            }

            // Settled is never a resting state
            prop_assert!(!matches!(conv.lifecycle(), Lifecycle::Settled { .. }), "Settled must not be a resting state");
        }
    }
}
