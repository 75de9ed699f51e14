//! Line-oriented front end: parses typed commands into session intents and
//! renders session events.

use anyhow::Context;
use client_core::{SessionEvent, SessionHandle, SessionSnapshot};
use shared::{domain::clamp_angle, Preset};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, warn};

use crate::settings::Settings;

pub const HELP: &str = "commands: connect [url] | disconnect | set <0-90> | preset <0|15|45|90> | status | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Connect(Option<String>),
    Disconnect,
    SetAngle(f64),
    Preset(Preset),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{command}' expects {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("no preset for {0}°, choose 0, 15, 45 or 90")]
    UnknownPreset(String),
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, CommandError> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(ConsoleCommand::Help);
    };
    let argument = parts.next();

    match verb.to_ascii_lowercase().as_str() {
        "connect" | "c" => Ok(ConsoleCommand::Connect(argument.map(str::to_string))),
        "disconnect" | "d" => Ok(ConsoleCommand::Disconnect),
        "set" | "s" => {
            let raw = argument.ok_or(CommandError::MissingArgument {
                command: "set",
                expected: "an angle",
            })?;
            let angle: f64 = raw
                .parse()
                .map_err(|_| CommandError::NotANumber(raw.to_string()))?;
            // Typed input is pulled into range before it reaches the session.
            Ok(ConsoleCommand::SetAngle(clamp_angle(angle)))
        }
        "preset" | "p" => {
            let raw = argument.ok_or(CommandError::MissingArgument {
                command: "preset",
                expected: "0, 15, 45 or 90",
            })?;
            raw.parse::<u16>()
                .ok()
                .and_then(Preset::from_degrees)
                .map(ConsoleCommand::Preset)
                .ok_or_else(|| CommandError::UnknownPreset(raw.to_string()))
        }
        "status" => Ok(ConsoleCommand::Status),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" | "q" => Ok(ConsoleCommand::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTone {
    Success,
    Info,
}

pub fn feedback_tone(message: &str) -> FeedbackTone {
    if message.contains("Connected") || message.contains("set to") {
        FeedbackTone::Success
    } else {
        FeedbackTone::Info
    }
}

pub fn render_feedback(message: &str) -> String {
    match feedback_tone(message) {
        FeedbackTone::Success => format!("[ok] {message}"),
        FeedbackTone::Info => format!("[info] {message}"),
    }
}

pub fn render_status(snapshot: &SessionSnapshot) -> String {
    let location = snapshot
        .endpoint
        .as_ref()
        .filter(|_| snapshot.connection.is_connected())
        .map_or_else(|| "Not connected".to_string(), |endpoint| endpoint.to_string());

    let mut lines = vec![
        format!("Status: {} ({location})", snapshot.connection),
        format!("Current wing angle: {:.1}°", snapshot.displayed_angle()),
    ];
    if let Some(reported) = snapshot.angles.reported {
        lines.push(format!(
            "Commanded {:.1}°, device reports {reported:.1}°",
            snapshot.angles.commanded
        ));
    }
    if let Some(feedback) = &snapshot.feedback {
        lines.push(render_feedback(feedback));
    }
    lines.join("\n")
}

pub async fn run(
    session: SessionHandle,
    settings: &Settings,
    connect_on_start: bool,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut events = session.subscribe_events();

    println!("{HELP}");
    println!("{}", render_status(&session.snapshot()));
    if connect_on_start {
        execute(&session, settings, ConsoleCommand::Connect(None)).await;
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read console input")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(ConsoleCommand::Quit) => break,
                    Ok(command) => execute(&session, settings, command).await,
                    Err(err) => println!("{err}\n{HELP}"),
                }
            }
            event = events.recv() => match event {
                Ok(SessionEvent::Feedback(message)) => println!("{}", render_feedback(&message)),
                Ok(SessionEvent::TelemetryReceived { angle }) => {
                    println!("Current wing angle: {angle:.1}°");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "console fell behind session events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    session
        .disconnect()
        .await
        .context("failed to disconnect on exit")?;
    Ok(())
}

async fn execute(session: &SessionHandle, settings: &Settings, command: ConsoleCommand) {
    let outcome = match command {
        ConsoleCommand::Connect(endpoint) => {
            let endpoint = endpoint.unwrap_or_else(|| settings.default_endpoint.clone());
            session.connect(endpoint).await
        }
        ConsoleCommand::Disconnect => session.disconnect().await,
        ConsoleCommand::SetAngle(angle) => session.set_angle(angle).await.map(|_| ()),
        ConsoleCommand::Preset(preset) => session.apply_preset(preset).await.map(|_| ()),
        ConsoleCommand::Status => {
            println!("{}", render_status(&session.snapshot()));
            Ok(())
        }
        ConsoleCommand::Help => {
            println!("{HELP}");
            Ok(())
        }
        ConsoleCommand::Quit => Ok(()),
    };
    // Rejections already surface as feedback events.
    if let Err(err) = outcome {
        debug!(error = %err, "console intent rejected");
    }
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
