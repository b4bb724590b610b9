//! Notifier settings as exchanged with the settings service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use sw_core::constants::notifiers;
use sw_core::error::SwError;

/// A chat integration the settings service manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifierKind {
    Discord,
    Slack,
    Telegram,
    SteemitChat,
}

impl NotifierKind {
    pub const ALL: [NotifierKind; 4] = [
        NotifierKind::Discord,
        NotifierKind::Slack,
        NotifierKind::Telegram,
        NotifierKind::SteemitChat,
    ];

    /// Path segment used by the settings API.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifierKind::Discord => notifiers::DISCORD,
            NotifierKind::Slack => notifiers::SLACK,
            NotifierKind::Telegram => notifiers::TELEGRAM,
            NotifierKind::SteemitChat => notifiers::STEEMIT_CHAT,
        }
    }
}

impl fmt::Display for NotifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotifierKind {
    type Err = SwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        NotifierKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                SwError::Config(format!(
                    "unknown notifier '{s}' (expected one of: {})",
                    notifiers::ALL.join(", ")
                ))
            })
    }
}

/// Stored configuration of one notifier.
///
/// `settings` is notifier specific and passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotifierDocument {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl NotifierDocument {
    /// Whether the notifier has been linked to an account at all.
    pub fn is_connected(&self) -> bool {
        match &self.settings {
            serde_json::Value::Object(map) => !map.is_empty(),
            serde_json::Value::Null => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!("discord".parse::<NotifierKind>().unwrap(), NotifierKind::Discord);
        assert_eq!(" Steemit-Chat ".parse::<NotifierKind>().unwrap(), NotifierKind::SteemitChat);
        let err = "irc".parse::<NotifierKind>().unwrap_err();
        assert!(err.to_string().contains("irc"));
    }

    #[test]
    fn test_kinds_match_constants() {
        let names: Vec<_> = NotifierKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, notifiers::ALL);
    }

    #[test]
    fn test_document_defaults() {
        let doc: NotifierDocument = serde_json::from_str("{}").unwrap();
        assert!(!doc.enabled);
        assert!(!doc.is_connected());

        let doc: NotifierDocument = serde_json::from_value(serde_json::json!({
            "enabled": true,
            "settings": {"username": "bob#1234"}
        }))
        .unwrap();
        assert!(doc.enabled);
        assert!(doc.is_connected());
    }
}
