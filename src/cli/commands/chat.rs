//! Interactive terminal chat against a running server.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{personas, Settings};
use crate::message::{ChatRequest, StreamEvent};
use crate::session::{ChatClient, ChatController, ClientAction};
use console::style;
use futures::StreamExt;
use std::io::{self, BufRead, Write};
use std::time::Instant;
use tracing::debug;

/// Run the interactive chat command.
pub async fn run_chat(
    persona: Option<String>,
    server: Option<String>,
    settings: Settings,
) -> anyhow::Result<()> {
    if server.is_none() {
        if let Err(e) = preflight::check(Operation::Chat, &settings) {
            Output::error(&format!("{}", e));
            return Err(e.into());
        }
    }

    let server_url = server.unwrap_or_else(|| settings.client.server_url.clone());
    let client = ChatClient::new(&server_url)?;

    if let Err(e) = client.health().await {
        Output::error(&format!("Cannot reach {}: {}", client.base_url(), e));
        Output::info("Start the server with: conjure serve");
        return Err(e.into());
    }

    let mut chat = ChatController::new(
        Some(persona.as_deref().unwrap_or(&settings.client.persona)),
        settings.client.client_ack_delay(),
    );

    let current = chat.persona();
    println!(
        "\n{} {}",
        style("Conjure Chat").bold().cyan(),
        style(format!("with {} {}", current.avatar, current.name)).dim()
    );
    println!(
        "{}\n",
        style("Type your message, 'persona <key>' to switch, 'personas' to list, 'clear' to reset, or 'exit' to quit.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        chat.tick(Instant::now());

        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            chat.clear();
            Output::info("Conversation cleared.");
            continue;
        }

        if input.eq_ignore_ascii_case("personas") {
            for p in personas() {
                Output::persona(p, p.key == chat.persona().key);
            }
            continue;
        }

        if let Some(key) = input.strip_prefix("persona ") {
            let selected = chat.select_persona(key.trim());
            Output::info(&format!("Now talking to {} {}", selected.avatar, selected.name));
            continue;
        }

        let Some(request) = chat.submit(input, Vec::new()) else {
            continue;
        };

        stream_response(&client, &mut chat, request).await;

        if let Some(message) = chat.render_error() {
            Output::error(&message);
        }
    }

    Ok(())
}

/// Send one request and render its events as they arrive.
async fn stream_response(client: &ChatClient, chat: &mut ChatController, request: ChatRequest) {
    let name = chat.persona().name;
    let settled_before = chat.reconciled().len();
    let spinner = Output::spinner(&format!("{} is thinking...", name));

    let mut events = match client.send(&request).await {
        Ok(events) => events,
        Err(e) => {
            spinner.finish_and_clear();
            chat.fail(e.to_string(), Instant::now());
            return;
        }
    };

    let mut speaking = false;
    let mut stdout = io::stdout();

    while let Some(item) = events.next().await {
        let now = Instant::now();
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                chat.fail(e.to_string(), now);
                break;
            }
        };
        let terminal = event.is_terminal();

        match &event {
            StreamEvent::TextDelta { delta } => {
                if !speaking {
                    spinner.finish_and_clear();
                    print!("\n{} ", style(format!("{}:", name)).cyan().bold());
                    speaking = true;
                }
                print!("{}", delta);
                stdout.flush().ok();
            }
            StreamEvent::ToolCall { tool_name, .. } => {
                spinner.set_message(format!("{} is using {}...", name, tool_name));
            }
            other => debug!("Event: {:?}", other),
        }

        if let Some(action) = chat.apply(event, now) {
            match action {
                ClientAction::Navigate { url } => {
                    spinner.suspend(|| Output::info(&format!("Open in your browser: {}", url)));
                }
            }
        }
        chat.tick(now);

        if terminal {
            break;
        }
    }

    if chat.is_busy() {
        chat.fail("the response ended early", Instant::now());
    }
    spinner.finish_and_clear();
    println!("\n");

    settle_pending_acks(chat).await;
    for record in &chat.reconciled()[settled_before..] {
        Output::tool_call(record);
    }
}

/// Wait out scheduled client acknowledgements so settled calls render settled.
async fn settle_pending_acks(chat: &mut ChatController) {
    while let Some(due) = chat.next_ack_due() {
        tokio::time::sleep_until(tokio::time::Instant::from_std(due)).await;
        chat.tick(Instant::now());
    }
}
