//! # chatty
//!
//! Line-oriented terminal front end for the Chatty client core. Reads slash
//! commands from stdin and prints notices, presence and messages as plain
//! lines.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use chatty_client::{ChatClient, ClientConfig, ConversationState, NoticeLevel};
use chatty_shared::constants::APP_NAME;
use chatty_shared::{Credentials, MessageContent, ProfileUpdate, SignupDetails, UserId};

const HELP: &str = "\
commands:
  /login <email> <password>
  /signup <full name>|<username>|<email>|<password>
  /logout
  /users [online]
  /open <username|id>
  /close
  /send <text>            (or just type)
  /image <ref> [caption]
  /add <username>
  /profile <full name>
  /theme [name]
  /whoami
  /quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chatty_client::init_tracing();
    info!("Starting {} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let client = Arc::new(ChatClient::from_config(&config).context("failed to build client")?);
    spawn_printers(&client);

    match client.start().await {
        Some(user) => println!("welcome back, {}", user.username),
        None => println!("not signed in, use /login or /signup"),
    }
    println!("theme: {}  (type /help for commands)", client.theme().theme());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !run_command(&client, line).await {
            break;
        }
    }

    client.transport().disconnect();
    info!("Shutting down");
    Ok(())
}

/// Execute one input line. Returns `false` when the user asked to quit.
async fn run_command(client: &ChatClient, line: &str) -> bool {
    let (cmd, rest) = match line.strip_prefix('/') {
        Some(cmd) => cmd.split_once(' ').unwrap_or((cmd, "")),
        None => ("send", line),
    };
    let rest = rest.trim();

    // Operation failures are already reported as notices.
    let outcome: Result<(), chatty_client::ClientError> = match cmd {
        "quit" | "exit" => return false,
        "help" => {
            println!("{HELP}");
            Ok(())
        }
        "login" => match rest.split_once(' ') {
            Some((email, password)) => client
                .login(&Credentials {
                    email: email.trim().to_string(),
                    password: password.trim().to_string(),
                })
                .await
                .map(|_| ()),
            None => {
                println!("usage: /login <email> <password>");
                Ok(())
            }
        },
        "signup" => {
            let parts: Vec<&str> = rest.split('|').map(str::trim).collect();
            match parts.as_slice() {
                [full_name, username, email, password] => client
                    .signup(SignupDetails {
                        full_name: full_name.to_string(),
                        username: username.to_string(),
                        email: email.to_string(),
                        password: password.to_string(),
                        color: None,
                    })
                    .await
                    .map(|_| ()),
                _ => {
                    println!("usage: /signup <full name>|<username>|<email>|<password>");
                    Ok(())
                }
            }
        }
        "logout" => client.logout().await,
        "users" => {
            print_contacts(client, rest == "online");
            Ok(())
        }
        "open" => match client.conversation().find_contact(rest) {
            Some(peer) => {
                println!("-- conversation with {} --", peer.username);
                client.open_conversation(Some(peer)).await
            }
            None => {
                println!("no contact named {rest:?}");
                Ok(())
            }
        },
        "close" => client.open_conversation(None).await,
        "send" => {
            let content = MessageContent::text(rest);
            if content.is_empty() {
                println!("usage: /send <text>");
                Ok(())
            } else {
                client.send(content).await.map(|_| ())
            }
        }
        "image" => {
            let (image, caption) = rest.split_once(' ').unwrap_or((rest, ""));
            let content = MessageContent {
                text: Some(caption.trim().to_string()).filter(|c| !c.is_empty()),
                image: Some(image.to_string()).filter(|i| !i.is_empty()),
            };
            if content.is_empty() {
                println!("usage: /image <ref> [caption]");
                Ok(())
            } else {
                client.send(content).await.map(|_| ())
            }
        }
        "add" => client.add_contact(rest).await,
        "profile" => {
            let update = ProfileUpdate {
                full_name: Some(rest.to_string()),
                profile_pic: None,
            };
            client.update_profile(&update).await.map(|_| ())
        }
        "theme" => {
            if rest.is_empty() {
                println!("theme: {}", client.theme().theme());
                Ok(())
            } else {
                client.theme().set_theme(rest)
            }
        }
        "whoami" => {
            match client.session().identity() {
                Some(me) => println!(
                    "{} <{}> ({} contacts online)",
                    me.username,
                    me.email,
                    client.presence().online_peer_count(&me.id)
                ),
                None => println!("not signed in"),
            }
            Ok(())
        }
        other => {
            println!("unknown command /{other}, try /help");
            Ok(())
        }
    };

    if let Err(e) = outcome {
        debug!(command = cmd, error = %e, "command failed");
    }
    true
}

fn print_contacts(client: &ChatClient, online_only: bool) {
    let contacts = client.visible_contacts(online_only);
    if contacts.is_empty() {
        println!("(no contacts)");
    }
    for contact in contacts {
        let marker = if client.presence().is_online(&contact.id) {
            "*"
        } else {
            " "
        };
        println!("{marker} {:<16} {}", contact.username, contact.full_name);
    }
}

/// Background tasks that print notices and incoming messages.
fn spawn_printers(client: &ChatClient) {
    let mut notices = client.notifier().subscribe();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => match notice.level {
                    NoticeLevel::Success => println!("[ok] {}", notice.message),
                    NoticeLevel::Error => println!("[error] {}", notice.message),
                },
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut conversation = client.conversation().subscribe();
    let session = client.session().subscribe();
    tokio::spawn(async move {
        let mut shown: Option<(Option<UserId>, usize)> = None;
        while conversation.changed().await.is_ok() {
            let state = conversation.borrow_and_update().clone();
            let selected = state.selected_id().cloned();
            let printed = match &shown {
                Some((peer, n)) if *peer == selected && *n <= state.messages.len() => *n,
                _ => 0,
            };
            let me = session.borrow().identity.as_ref().map(|u| u.id.clone());
            print_messages(&state, me.as_ref(), printed);
            shown = Some((selected, state.messages.len()));
        }
    });
}

fn print_messages(state: &ConversationState, me: Option<&UserId>, from: usize) {
    for message in state.messages.iter().skip(from) {
        let author = if me.is_some_and(|me| message.is_outgoing(me)) {
            "you"
        } else {
            state
                .contacts
                .iter()
                .find(|c| c.id == message.sender_id)
                .map_or(message.sender_id.short(), |c| c.username.as_str())
        };
        let mut body = message.text.clone().unwrap_or_default();
        if message.image.is_some() {
            body.push_str(" [image]");
        }
        println!("{} {author}: {}", message.time_label(), body.trim());
    }
}
