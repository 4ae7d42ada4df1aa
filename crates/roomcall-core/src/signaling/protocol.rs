//! Signaling wire format.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": {...}}` with
//! camelCase payload fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Shared room color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dark => f.write_str("dark"),
            Self::Light => f.write_str("light"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => Err(format!("unknown theme: {other}")),
        }
    }
}

/// One entry of an `all-users` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub user_id: String,
    pub user_name: String,
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Frames sent by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundSignal {
    #[serde(rename = "join-room", rename_all = "camelCase")]
    JoinRoom {
        room_id: String,
        user_id: String,
        user_name: String,
    },

    #[serde(rename = "message")]
    Message { text: String },

    #[serde(rename = "change-theme")]
    ChangeTheme { theme: Theme },

    #[serde(rename = "start-screen-share", rename_all = "camelCase")]
    StartScreenShare { user_id: String, user_name: String },

    #[serde(rename = "stop-screen-share")]
    StopScreenShare,

    #[serde(rename = "emoji-reaction")]
    EmojiReaction { emoji: String },
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Frames broadcast by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum InboundSignal {
    #[serde(rename = "user-joined", rename_all = "camelCase")]
    UserJoined { user_id: String, user_name: String },

    /// Full roster snapshot, sent to a client right after it joins.
    #[serde(rename = "all-users")]
    AllUsers { users: Vec<RosterEntry> },

    #[serde(rename = "user-disconnected", rename_all = "camelCase")]
    UserDisconnected {
        user_id: String,
        #[serde(default)]
        user_name: Option<String>,
    },

    /// Chat line relayed to every member, including the sender.
    #[serde(rename = "createMessage", rename_all = "camelCase")]
    CreateMessage { text: String, user_name: String },

    #[serde(rename = "theme-changed")]
    ThemeChanged { theme: Theme },

    #[serde(rename = "user-started-screen-share", rename_all = "camelCase")]
    UserStartedScreenShare { user_id: String, user_name: String },

    #[serde(rename = "user-stopped-screen-share", rename_all = "camelCase")]
    UserStoppedScreenShare { user_id: String },

    #[serde(rename = "user-reaction", rename_all = "camelCase")]
    UserReaction { user_id: String, emoji: String },
}

pub fn encode_outbound(signal: &OutboundSignal) -> Result<String, serde_json::Error> {
    serde_json::to_string(signal)
}

pub fn decode_inbound(text: &str) -> Result<InboundSignal, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_room_uses_camel_case_fields() {
        let signal = OutboundSignal::JoinRoom {
            room_id: "main-room".into(),
            user_id: "peer-1".into(),
            user_name: "Ada".into(),
        };
        let value: serde_json::Value =
            serde_json::from_str(&encode_outbound(&signal).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "join-room",
                "data": { "roomId": "main-room", "userId": "peer-1", "userName": "Ada" }
            })
        );
    }

    #[test]
    fn stop_screen_share_has_no_payload() {
        let value: serde_json::Value =
            serde_json::from_str(&encode_outbound(&OutboundSignal::StopScreenShare).unwrap())
                .unwrap();
        assert_eq!(value["event"], "stop-screen-share");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn change_theme_serializes_lowercase() {
        let json = encode_outbound(&OutboundSignal::ChangeTheme { theme: Theme::Light }).unwrap();
        assert!(json.contains(r#""theme":"light""#));
    }

    #[test]
    fn decodes_all_users_snapshot() {
        let text = r#"{"event":"all-users","data":{"users":[
            {"userId":"a","userName":"Ada"},
            {"userId":"b","userName":"Bob"}
        ]}}"#;
        match decode_inbound(text).unwrap() {
            InboundSignal::AllUsers { users } => {
                assert_eq!(users.len(), 2);
                assert_eq!(users[1].user_name, "Bob");
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn disconnect_name_is_optional() {
        let signal =
            decode_inbound(r#"{"event":"user-disconnected","data":{"userId":"a"}}"#).unwrap();
        assert_eq!(
            signal,
            InboundSignal::UserDisconnected {
                user_id: "a".into(),
                user_name: None
            }
        );
    }

    #[test]
    fn decodes_chat_line() {
        let signal = decode_inbound(
            r#"{"event":"createMessage","data":{"text":"hi","userName":"Ada"}}"#,
        )
        .unwrap();
        assert_eq!(
            signal,
            InboundSignal::CreateMessage {
                text: "hi".into(),
                user_name: "Ada".into()
            }
        );
    }

    #[test]
    fn unknown_event_is_an_error() {
        assert!(decode_inbound(r#"{"event":"kick","data":{}}"#).is_err());
        assert!(decode_inbound("not json").is_err());
    }

    #[test]
    fn unknown_theme_is_rejected() {
        assert!(decode_inbound(r#"{"event":"theme-changed","data":{"theme":"sepia"}}"#).is_err());
        assert_eq!("Light".parse::<Theme>().unwrap(), Theme::Light);
        assert!("sepia".parse::<Theme>().is_err());
    }
}
