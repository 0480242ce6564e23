//! User Interface module
//!
//! Terminal rendering of the session state and the interactive console that
//! turns typed commands into session intents.

/// Interactive stdin console
pub mod console;

use colored::Colorize;

use crate::config::Config;
use crate::session::{ConnectionState, SessionSnapshot, SessionStats};

/// Render a snapshot as a single status line
pub fn render_status_line(snapshot: &SessionSnapshot, enable_colors: bool) -> String {
    let indicator = match snapshot.state {
        ConnectionState::Active => "● Connected",
        ConnectionState::Connecting => "◌ Connecting",
        ConnectionState::Disconnecting => "◌ Disconnecting",
        ConnectionState::Disconnected => "○ Disconnected",
    };

    let indicator = if enable_colors {
        match snapshot.state {
            ConnectionState::Active => indicator.green().bold().to_string(),
            ConnectionState::Connecting | ConnectionState::Disconnecting => {
                indicator.yellow().to_string()
            }
            ConnectionState::Disconnected => indicator.red().to_string(),
        }
    } else {
        indicator.to_string()
    };

    let mut line = format!("{} | Gesture: {}", indicator, snapshot.last_status);
    if snapshot.state == ConnectionState::Disconnected {
        if let Some(reason) = &snapshot.last_disconnect {
            line.push_str(&format!(" ({})", reason));
        }
    }
    line
}

/// Print the console banner
pub fn display_welcome(config: &Config) {
    println!("🖐  GestureLink");
    println!("   Backend: {}", config.backend.endpoint);
    println!("   Type 'start', 'stop' or 'help'. 'quit' exits.");
    println!();
}

/// Print session details for the `status` command
pub fn display_status(snapshot: &SessionSnapshot) {
    println!("🔍 Session status:");
    println!("   State: {}", snapshot.state);
    println!("   Gesture: {}", snapshot.last_status);
    match snapshot.channel {
        Some(channel) => println!("   Channel: {}", channel),
        None => println!("   Channel: (none)"),
    }
    if let Some(reason) = &snapshot.last_disconnect {
        println!("   Last disconnect: {}", reason);
    }
}

/// Print counters once the session loop has finished
pub fn display_session_summary(stats: &SessionStats, snapshot: &SessionSnapshot) {
    let uptime = chrono::Utc::now() - stats.started_at;
    println!();
    println!("Session summary:");
    println!("   Uptime: {}s", uptime.num_seconds());
    println!("   Channels opened: {}", stats.channels_opened);
    println!("   Status frames received: {}", stats.frames_received);
    println!("   Control messages queued: {}", stats.control_messages_queued);
    println!("   Ignored intents: {}", stats.intents_rejected);
    println!("   Stale events dropped: {}", stats.stale_events_dropped);
    println!("   Last gesture: {}", snapshot.last_status);
}
