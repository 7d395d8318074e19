//! Interactive terminal client for Densé AI.
//!
//! Accounts and chats live in an in-process simulated backend; replies
//! stream from the Gemini API.
//!
//! # Usage
//!
//! ```bash
//! export DENSECHAT_API_KEY=...
//!
//! # Basic usage with default settings
//! densechat
//!
//! # Keep the auth token and preferences between runs
//! densechat --store ~/.densechat.json
//!
//! # No simulated latency, no colors
//! densechat --latency-ms 0 --no-color
//! ```
//!
//! Type `/help` at the prompt for the list of commands.

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use densechat::attachment::StagedFiles;
use densechat::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatRef, PlainTextRenderer, Renderer, help_text,
    parse_command,
};
use densechat::{ApiClient, AppState, ChatController, GeminiFactory, MockTransport, Page};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("densechat [OPTIONS]");
    let config = ChatConfig::from(args);

    let transport = Arc::new(MockTransport::new(config.mock.clone()));
    let api = ApiClient::new(transport, config.storage());
    let factory = Arc::new(GeminiFactory::from_key(None, config.gemini_model.clone()));
    let mut controller = ChatController::new(api, factory);
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;
    let mut staged = StagedFiles::new();

    println!("Densé AI");
    println!("Type /help for commands, /quit to exit\n");

    let _ = controller.initialize().await;
    show_banners(controller.state(), &mut renderer);
    if controller.state().page != Page::Chat {
        renderer.print_info("Sign in with /signin <email> or create an account with /signup <name> <email>.");
    }

    loop {
        let prompt = match controller.state().page {
            Page::Chat => "You: ",
            _ => "> ",
        };
        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        let Some(command) = parse_command(line) else {
            if controller.state().page != Page::Chat {
                renderer.print_error("Sign in first.");
                continue;
            }
            let files = staged.take();
            if let Err(err) = controller.send_message(line, &files, &mut renderer).await {
                renderer.print_error(err.user_message());
            }
            continue;
        };

        match command {
            ChatCommand::Quit => {
                println!("Goodbye!");
                break;
            }
            ChatCommand::Help => {
                for line in help_text().lines() {
                    println!("    {}", line);
                }
            }
            ChatCommand::SignUp { name, email } => {
                let password = match read_password(&mut rl) {
                    Some(password) => password,
                    None => continue,
                };
                controller.navigate_to_sign_up();
                if controller.sign_up(&name, &email, &password).await.is_ok() {
                    renderer.print_info("Sign up successful! Please sign in.");
                }
            }
            ChatCommand::SignIn(email) => {
                let password = match read_password(&mut rl) {
                    Some(password) => password,
                    None => continue,
                };
                controller.navigate_to_sign_in();
                if controller.sign_in(&email, &password).await.is_ok() {
                    if let Some(user) = &controller.state().current_user {
                        renderer.print_info(&format!("Signed in as {}.", user.name));
                    }
                    print_chats(controller.state());
                }
            }
            ChatCommand::SignOut => {
                controller.sign_out().await;
                staged.take();
                renderer.print_info("Signed out.");
            }
            ChatCommand::WhoAmI => match &controller.state().current_user {
                Some(user) => renderer.print_info(&format!("{} <{}>", user.name, user.email)),
                None => renderer.print_info("Not signed in."),
            },
            ChatCommand::New => {
                if controller.new_chat().await.is_ok() {
                    print_active(controller.state(), &mut renderer);
                }
            }
            ChatCommand::Chats => print_chats(controller.state()),
            ChatCommand::Select(chat) => {
                let Some(chat_id) = resolve(&chat, controller.state(), &mut renderer) else {
                    continue;
                };
                if controller.select_chat(&chat_id).await.is_ok() {
                    print_active(controller.state(), &mut renderer);
                }
            }
            ChatCommand::Delete(chat) => {
                let Some(chat_id) = resolve(&chat, controller.state(), &mut renderer) else {
                    continue;
                };
                if controller.delete_chat(&chat_id).await.is_ok() {
                    renderer.print_info("Chat deleted.");
                    if controller.state().sidebar_open {
                        print_chats(controller.state());
                    }
                }
            }
            ChatCommand::Model(model) => {
                if controller.change_model(model).await.is_ok() {
                    renderer.print_info(&format!("Model: {}", model.display_name()));
                }
            }
            ChatCommand::Attach(path) => match staged.add(&path).await {
                Ok(()) => renderer.print_info(&format!("{} file(s) attached.", staged.len())),
                Err(err) => renderer.print_error(err.user_message()),
            },
            ChatCommand::Detach => {
                staged.take();
                renderer.print_info("Attachments cleared.");
            }
            ChatCommand::Sidebar => {
                controller.toggle_sidebar();
                let state = if controller.state().sidebar_open {
                    "shown"
                } else {
                    "hidden"
                };
                renderer.print_info(&format!("Chat list {state}."));
            }
            ChatCommand::History => {
                for message in controller.state().active_messages() {
                    renderer.print_message(message);
                }
            }
            ChatCommand::Invalid(message) => {
                renderer.print_error(&message);
                continue;
            }
        }
        show_banners(controller.state(), &mut renderer);
    }

    Ok(())
}

fn read_password(rl: &mut DefaultEditor) -> Option<String> {
    match rl.readline("Password: ") {
        Ok(password) => Some(password),
        Err(_) => {
            println!();
            None
        }
    }
}

fn resolve(chat: &ChatRef, state: &AppState, renderer: &mut dyn Renderer) -> Option<String> {
    let resolved = chat.resolve(&state.summaries).map(str::to_string);
    if resolved.is_none() {
        renderer.print_error("No such chat. Use /chats to list them.");
    }
    resolved
}

fn show_banners(state: &AppState, renderer: &mut dyn Renderer) {
    let banner = match state.page {
        Page::Chat => state.chat_error.as_deref(),
        _ => state.auth_error.as_deref(),
    };
    if let Some(banner) = banner {
        renderer.print_error(banner);
    }
}

fn print_active(state: &AppState, renderer: &mut dyn Renderer) {
    if state.sidebar_open {
        print_chats(state);
    }
    if let Some(session) = state.active_session() {
        renderer.print_info(&format!(
            "{} ({})",
            session.title,
            session.selected_model.display_name()
        ));
        for message in &session.messages {
            renderer.print_message(message);
        }
    }
}

fn print_chats(state: &AppState) {
    if state.summaries.is_empty() {
        println!("    No chats yet. Start one with /new.");
        return;
    }
    println!("    Chats:");
    for (i, summary) in state.summaries.iter().enumerate() {
        let marker = if state.active_chat_id.as_deref() == Some(summary.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("    {marker} {:>2}. {}", i + 1, summary.title);
    }
}
