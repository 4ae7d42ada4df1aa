//! Stdin command parsing and one-line rendering of call events.

use roomcall_common::NotificationLevel;
use roomcall_core::{CallCommand, CallEvent, Theme};

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Command(CallCommand),
    Leave,
    Invalid(String),
    Empty,
}

pub const HELP: &str =
    "commands: /mute /video /share /refresh /theme <dark|light> /react <emoji> /leave";

pub fn parse(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Input::Command(CallCommand::SendChat(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "mute" => Input::Command(CallCommand::ToggleMute),
        "video" => Input::Command(CallCommand::ToggleVideo),
        "share" => Input::Command(CallCommand::ToggleScreenShare),
        "refresh" => Input::Command(CallCommand::RefreshMedia),
        "theme" => match arg.parse::<Theme>() {
            Ok(theme) => Input::Command(CallCommand::ChangeTheme(theme)),
            Err(e) => Input::Invalid(e),
        },
        "react" if !arg.is_empty() => Input::Command(CallCommand::SendReaction(arg.to_string())),
        "react" => Input::Invalid("usage: /react <emoji>".into()),
        "leave" | "quit" => Input::Leave,
        other => Input::Invalid(format!("unknown command /{other}; {HELP}")),
    }
}

/// Render an event for the console, or `None` when it is only logged.
pub fn render(event: &CallEvent) -> Option<String> {
    let line = match event {
        CallEvent::RoomStateChanged(_) => return None,
        CallEvent::Joined { local_id } => format!("joined as {local_id}"),
        CallEvent::SignalingStatus { connected: true } => "signaling connected".into(),
        CallEvent::SignalingStatus { connected: false } => "signaling lost, reconnecting".into(),
        CallEvent::RosterChanged { members } => format!("{members} other participant(s) in the room"),
        CallEvent::ParticipantAdded(p) => format!("+ {} [{}]", p.display_name, p.key),
        CallEvent::ParticipantRemoved(key) => format!("- [{key}]"),
        CallEvent::Chat(msg) if msg.is_system() => format!("* {}", msg.text),
        CallEvent::Chat(msg) => format!("<{}> {}", msg.author, msg.text),
        CallEvent::ThemeChanged(theme) => format!("theme is now {theme}"),
        CallEvent::Reaction {
            user_id,
            display_name,
            emoji,
        } => format!("{} reacted {emoji}", display_name.as_deref().unwrap_or(user_id)),
        CallEvent::LocalMediaChanged { muted, video_off } => format!(
            "microphone {}, camera {}",
            on_off(!muted),
            on_off(!video_off)
        ),
        CallEvent::ScreenShareChanged { active: true } => "you are sharing your screen".into(),
        CallEvent::ScreenShareChanged { active: false } => "screen share stopped".into(),
        // The start is announced by a system chat line.
        CallEvent::RemoteScreenShare { active: true, .. } => return None,
        CallEvent::RemoteScreenShare {
            user_id,
            display_name,
            ..
        } => format!(
            "{} stopped sharing",
            display_name.as_deref().unwrap_or(user_id)
        ),
        CallEvent::Notice(n) => {
            let tag = match n.level {
                NotificationLevel::Info => "info",
                NotificationLevel::Warning => "warning",
                NotificationLevel::Error => "error",
            };
            format!("{tag}: {}: {}", n.title, n.body)
        }
        CallEvent::Error(e) => format!("error: {e}"),
        CallEvent::SessionFailed(e) => format!("fatal: {e}"),
    };
    Some(line)
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
