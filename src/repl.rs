use crate::client::{extract_audio_path, extract_reply, new_session_id, resolve_playable, with_voice, ApiClient};
use agent_core::config::AppConfig;
use agent_tools::voice::{find_voice, VOICE_CATALOG};
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::{Config as RlConfig, DefaultEditor};

const BANNER: &str = r#"
  ╔═══════════════════════════════════════════╗
  ║          multi-tools-agent                ║
  ║   Weather, time, translation and voice    ║
  ╚═══════════════════════════════════════════╝

  Type your message and press Enter to chat.
  Commands:
    /new           Start a new session
    /session       Show the current session
    /voice <id>    Choose the voice for spoken replies
    /voices        List available voices
    /help          Show this help
    /exit          Quit
"#;

/// Mutable chat state: who we are talking as and in which session.
struct ChatState {
    client: ApiClient,
    session_id: String,
    voice_id: String,
}

/// Run the interactive chat client against a running server.
pub async fn run(config: AppConfig, voice_id: Option<String>) -> Result<()> {
    println!("{}", BANNER);

    let client = ApiClient::new(&config.client.api_base_url, &config.client.app_name);
    match client.health().await {
        Ok(_) => println!("  Server: {}  |  User: {}", client.base_url(), client.user_id()),
        Err(e) => println!("\x1b[1;33m  ⚠  {:#}\x1b[0m", e),
    }

    let voice_id = voice_id.unwrap_or_else(|| config.tools.speech.default_voice_id.clone());
    let mut chat = ChatState {
        client,
        session_id: new_session_id(),
        voice_id,
    };
    start_session(&chat).await;
    println!();

    let rl_config = RlConfig::builder().auto_add_history(true).build();
    let history_path = AppConfig::default_path().with_file_name("chat_history.txt");
    let mut rl = DefaultEditor::with_config(rl_config)?;
    let _ = rl.load_history(&history_path);

    loop {
        let prompt = format!("\x1b[1;36m{}\x1b[0m \x1b[1;32m❯\x1b[0m ", chat.session_id);

        match rl.readline(&prompt) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                if input.starts_with('/') {
                    if !handle_command(input, &mut chat).await {
                        break;
                    }
                    continue;
                }

                let message = with_voice(input, &chat.voice_id);
                match chat.client.send_message(&chat.session_id, &message).await {
                    Ok(events) => {
                        for event in &events {
                            let Some(content) = &event.content else { continue };
                            for call in content.function_calls() {
                                println!("  \x1b[0;35m⚡ Calling tool: {}\x1b[0m", call.name);
                            }
                        }
                        let reply = extract_reply(&events).unwrap_or_else(|| "(no reply)".into());
                        println!("\x1b[1;33massistant\x1b[0m: {}", reply);

                        let audio = extract_audio_path(&events);
                        if audio.is_some() {
                            match resolve_playable(audio.as_deref(), &config.client.default_audio_path) {
                                Some(path) => println!("  \x1b[0;32m♪ Audio: {}\x1b[0m", path.display()),
                                None => println!("\x1b[1;33m  ⚠  Audio file not accessible locally\x1b[0m"),
                            }
                        }
                    }
                    Err(e) => {
                        eprintln!("\x1b[0;31mError: {:#}\x1b[0m", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}

async fn start_session(chat: &ChatState) {
    match chat.client.create_session(&chat.session_id).await {
        Ok(_) => println!("  Session: {}", chat.session_id),
        Err(e) => eprintln!("\x1b[0;31mCould not create session: {:#}\x1b[0m", e),
    }
}

/// Handle a slash command. Returns `true` to continue the loop, `false` to exit.
async fn handle_command(input: &str, chat: &mut ChatState) -> bool {
    let (cmd, arg) = match input.split_once(' ') {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (input, ""),
    };

    match cmd {
        "/exit" | "/quit" | "/q" => {
            println!("Goodbye!");
            return false;
        }
        "/new" => {
            let next = new_session_id();
            if next == chat.session_id {
                println!("  Session ids are per second; wait a moment and try again.");
            } else {
                chat.session_id = next;
                start_session(chat).await;
            }
        }
        "/session" => {
            println!("  User:    {}", chat.client.user_id());
            println!("  Session: {}", chat.session_id);
            println!("  Voice:   {}", describe_voice(&chat.voice_id));
        }
        "/voice" => {
            if arg.is_empty() {
                println!("  Current voice: {}", describe_voice(&chat.voice_id));
            } else if find_voice(arg).is_some() {
                chat.voice_id = arg.to_string();
                println!("  Voice set to {}", describe_voice(arg));
            } else {
                println!("  Unknown voice '{}'. Type /voices to list them.", arg);
            }
        }
        "/voices" => {
            for voice in VOICE_CATALOG {
                let marker = if voice.id == chat.voice_id { " ◀" } else { "" };
                println!(
                    "  {}  {:<10} {}, {}, {}, {}, {}{marker}",
                    voice.id, voice.name, voice.gender, voice.age, voice.accent, voice.tone, voice.use_case
                );
            }
        }
        "/help" | "/?" => {
            println!("  /new           Start a new session");
            println!("  /session       Show the current session");
            println!("  /voice <id>    Choose the voice for spoken replies");
            println!("  /voices        List available voices");
            println!("  /help          Show this help");
            println!("  /exit          Quit");
        }
        _ => {
            println!("Unknown command: {}. Type /help for available commands.", cmd);
        }
    }

    true
}

fn describe_voice(id: &str) -> String {
    match find_voice(id) {
        Some(v) => format!("{} ({})", v.name, v.id),
        None => id.to_string(),
    }
}
