//! Interactive console for the gesture session
//!
//! Reads one command per line and re-renders the status line whenever the
//! session publishes a change.

use std::future::Future;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use super::{display_status, render_status_line};
use crate::session::SessionHandle;

/// Console commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Toggle,
    Status,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(input: &str) -> Result<Option<ConsoleCommand>> {
        let input = input.trim();

        if input.is_empty() {
            return Ok(None);
        }

        let command = input.split_whitespace().next().unwrap_or_default();

        match command.to_ascii_lowercase().as_str() {
            "start" | "on" => Ok(Some(ConsoleCommand::Start)),
            "stop" | "off" => Ok(Some(ConsoleCommand::Stop)),
            "toggle" | "t" => Ok(Some(ConsoleCommand::Toggle)),
            "status" | "s" => Ok(Some(ConsoleCommand::Status)),
            "help" | "?" => Ok(Some(ConsoleCommand::Help)),
            "quit" | "exit" | "q" => Ok(Some(ConsoleCommand::Quit)),
            other => Err(anyhow::anyhow!(
                "Unknown command: {}. Type 'help' for available commands.",
                other
            )),
        }
    }

    pub fn help_messages() -> &'static [&'static str] {
        &[
            "GestureLink Commands:",
            "  start   - Connect to the gesture backend and begin detection",
            "  stop    - Stop detection and disconnect",
            "  toggle  - Start when disconnected, stop otherwise",
            "  status  - Show session details",
            "  help    - Show this help",
            "  quit    - Disconnect and exit",
        ]
    }
}

/// Console behaviour switches
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOptions {
    pub enable_colors: bool,
    /// Send start before reading the first command
    pub autostart: bool,
}

/// Run the console until `quit`, end of input, or `interrupt` resolves.
/// Always asks the session loop to shut down before returning.
pub async fn run_console<R, F>(
    handle: SessionHandle,
    input: R,
    options: ConsoleOptions,
    interrupt: F,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let result = console_loop(&handle, input, options, interrupt).await;

    if let Err(e) = handle.shutdown() {
        debug!("Session loop already gone: {}", e);
    }

    result
}

async fn console_loop<R, F>(
    handle: &SessionHandle,
    input: R,
    options: ConsoleOptions,
    interrupt: F,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(interrupt);

    let mut snapshots = handle.subscribe();
    let mut lines = input.lines();
    let mut watching = true;

    println!(
        "{}",
        render_status_line(&snapshots.borrow_and_update(), options.enable_colors)
    );

    if options.autostart {
        handle.start()?;
    }

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => match ConsoleCommand::parse(&line) {
                    Ok(Some(command)) => {
                        if !execute(handle, command)? {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                },
                None => {
                    info!("Console input closed");
                    break;
                }
            },
            changed = snapshots.changed(), if watching => match changed {
                Ok(()) => {
                    let snapshot = snapshots.borrow_and_update().clone();
                    println!("{}", render_status_line(&snapshot, options.enable_colors));
                }
                Err(_) => watching = false,
            },
            _ = &mut interrupt => {
                info!("Console interrupted");
                break;
            }
        }
    }

    Ok(())
}

/// Execute a console command; returns false when the console should exit
fn execute(handle: &SessionHandle, command: ConsoleCommand) -> Result<bool> {
    debug!("Console command: {:?}", command);

    match command {
        ConsoleCommand::Start => handle.start()?,
        ConsoleCommand::Stop => handle.stop()?,
        ConsoleCommand::Toggle => handle.toggle()?,
        ConsoleCommand::Status => display_status(&handle.snapshot()),
        ConsoleCommand::Help => {
            println!();
            for line in ConsoleCommand::help_messages() {
                println!("{}", line);
            }
            println!();
        }
        ConsoleCommand::Quit => return Ok(false),
    }

    Ok(true)
}
