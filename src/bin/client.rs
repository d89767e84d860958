//! Terminal chat client for the completion proxy

use chat_relay::client::{
    spawn_conversation, Availability, ConversationHandle, HttpTransport, Lifecycle, Snapshot,
    Update,
};
use chat_relay::system_prompt::STARTER_PROMPTS;
use chat_relay::wire::Role;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_relay=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let server_url =
        std::env::var("CHAT_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
    let transport = Arc::new(HttpTransport::new(&server_url)?);
    let (handle, mut updates) = spawn_conversation(transport);

    println!("Connected to {server_url}. Type a message, or /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut view = View::default();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !run_command(&handle, Command::parse(&line)).await? {
                    break;
                }
            }
            update = updates.recv() => {
                let Some(update) = update else { break };
                view.render(update);
            }
            _ = tokio::signal::ctrl_c() => {
                if !view.in_flight() {
                    break;
                }
                handle.cancel().await?;
            }
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Send(&'a str),
    Clear,
    Cancel,
    Examples,
    Example(usize),
    Health,
    Help,
    Quit,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return Command::Send(line);
        };

        let mut parts = command.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("clear"), None) => Command::Clear,
            (Some("cancel"), None) => Command::Cancel,
            (Some("examples"), None) => Command::Examples,
            (Some("examples"), Some(n)) => match n.parse::<usize>() {
                Ok(n) if (1..=STARTER_PROMPTS.len()).contains(&n) => Command::Example(n - 1),
                _ => Command::Unknown(line),
            },
            (Some("health"), None) => Command::Health,
            (Some("help"), None) => Command::Help,
            (Some("quit" | "exit"), None) => Command::Quit,
            _ => Command::Unknown(line),
        }
    }
}

/// Execute one command; returns `false` when the client should exit
async fn run_command(
    handle: &ConversationHandle,
    command: Command<'_>,
) -> Result<bool, Box<dyn std::error::Error>> {
    match command {
        Command::Send(text) => handle.submit(text).await?,
        Command::Clear => handle.clear().await?,
        Command::Cancel => handle.cancel().await?,
        Command::Health => handle.refresh_health().await?,
        Command::Examples => {
            for (i, prompt) in STARTER_PROMPTS.iter().enumerate() {
                println!("  {}. {prompt}", i + 1);
            }
            println!("Send one with /examples <n>");
        }
        Command::Example(i) => {
            if let Some(prompt) = STARTER_PROMPTS.get(i) {
                println!("you> {prompt}");
                handle.submit(*prompt).await?;
            }
        }
        Command::Help => {
            println!("  /clear          forget the conversation");
            println!("  /cancel         stop the current reply (or press Ctrl-C)");
            println!("  /examples [n]   list starter prompts, or send number n");
            println!("  /health         re-check the server");
            println!("  /quit           exit");
        }
        Command::Quit => return Ok(false),
        Command::Unknown(line) => eprintln!("Unknown command: {line}"),
    }
    Ok(true)
}

/// Incremental terminal rendering of conversation snapshots
#[derive(Default)]
struct View {
    lifecycle: Lifecycle,
    availability: Option<Availability>,
    message_count: usize,
    /// Assistant message being printed and how many bytes of it are out
    printing: Option<(String, usize)>,
}

impl View {
    fn in_flight(&self) -> bool {
        self.lifecycle.is_in_flight()
    }

    fn render(&mut self, update: Update) {
        let snapshot = match update {
            Update::Snapshot(snapshot) => snapshot,
            Update::Warning(message) => {
                eprintln!("! {message}");
                return;
            }
        };

        self.render_availability(snapshot.availability);
        self.render_reply(&snapshot);
        self.render_lifecycle(&snapshot);

        self.message_count = snapshot.messages.len();
        self.lifecycle = snapshot.lifecycle;
        let _ = std::io::stdout().flush();
    }

    fn render_availability(&mut self, availability: Availability) {
        if self.availability == Some(availability) {
            return;
        }
        match availability {
            Availability::Checking => {}
            Availability::Online => println!("[online]"),
            Availability::Offline => {
                println!(
                    "[offline] The server has no provider credential; \
                     set OPENROUTER_API_KEY there."
                );
            }
        }
        self.availability = Some(availability);
    }

    fn render_reply(&mut self, snapshot: &Snapshot) {
        let Some(reply) = snapshot.messages.last().filter(|m| m.role == Role::Assistant) else {
            return;
        };

        let printed = match &self.printing {
            Some((id, printed)) if *id == reply.id => *printed,
            _ => {
                print!("jarvis> ");
                0
            }
        };

        if let Some(fresh) = reply.content.get(printed..) {
            print!("{fresh}");
        }
        self.printing = Some((reply.id.clone(), reply.content.len()));
    }

    fn render_lifecycle(&mut self, snapshot: &Snapshot) {
        if snapshot.lifecycle == self.lifecycle {
            if snapshot.messages.is_empty() && self.message_count > 0 {
                println!("[conversation cleared]");
            }
            return;
        }

        match (&self.lifecycle, &snapshot.lifecycle) {
            (_, Lifecycle::Settled { .. }) => println!(),
            (Lifecycle::Submitting { .. } | Lifecycle::Streaming { .. }, Lifecycle::Idle) => {
                println!("\n[cancelled]");
                self.printing = None;
            }
            (_, Lifecycle::Errored { kind, message }) => {
                if self.printing.is_some() {
                    println!();
                }
                println!("[error: {kind}] {message}");
                self.printing = None;
            }
            _ => {}
        }
    }
}
