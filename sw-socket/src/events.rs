//! Stream event types.
//!
//! Every frame on the event stream is a JSON object of the form
//! `{"kind": "...", "payload": {...}}`. Known kinds decode into typed
//! payloads; anything else is kept verbatim as [`Event::Unknown`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sw_core::error::{SwError, SwResult};

/// Kind discriminators used on the wire.
pub mod kinds {
    pub const ACCOUNT_UPDATED: &str = "account.updated";
    pub const ACCOUNT_WITNESS_VOTED: &str = "account.witness_voted";
    pub const TRANSFER_MADE: &str = "transfer.made";
    pub const USER_MENTIONED: &str = "user.mentioned";
    pub const USER_FOLLOW_CHANGED: &str = "user.follow_changed";
    pub const STORY_PUBLISHED: &str = "story.published";
    pub const STORY_VOTED: &str = "story.voted";
    pub const COMMENT_PUBLISHED: &str = "comment.published";
    pub const COMMENT_VOTED: &str = "comment.voted";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdated {
    pub account: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountWitnessVoted {
    pub account: String,
    pub witness: String,
    pub approve: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMade {
    pub from: String,
    pub to: String,
    pub amount: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMentioned {
    pub user: String,
    pub url: String,
    pub author: String,
    pub permlink: String,
}

/// `what` is one of `follow`, `mute` or `reset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFollowChanged {
    pub follower: String,
    pub following: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub what: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryPublished {
    pub author: String,
    pub title: String,
    pub url: String,
    /// The server sends `null` for stories without tags.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryVoted {
    pub voter: String,
    pub vote_weight: i16,
    pub author: String,
    pub title: String,
    pub url: String,
    pub total_payout: String,
    pub pending_payout: String,
    pub total_pending_payout: String,
}

/// `content` holds at most the first five lines of the comment body;
/// `more` is set when the body was longer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPublished {
    pub author: String,
    pub url: String,
    pub parent_author: String,
    pub parent_permlink: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentVoted {
    pub voter: String,
    pub vote_weight: i16,
    pub author: String,
    pub permlink: String,
    pub url: String,
    pub total_payout: String,
    pub pending_payout: String,
    pub total_pending_payout: String,
}

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    AccountUpdated(AccountUpdated),
    AccountWitnessVoted(AccountWitnessVoted),
    TransferMade(TransferMade),
    UserMentioned(UserMentioned),
    UserFollowChanged(UserFollowChanged),
    StoryPublished(StoryPublished),
    StoryVoted(StoryVoted),
    CommentPublished(CommentPublished),
    CommentVoted(CommentVoted),
    /// A kind this client does not know about, kept as raw JSON.
    Unknown { kind: String, payload: Value },
}

/// Wire envelope shared by every frame.
#[derive(Deserialize)]
struct Envelope {
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    kind: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    payload: Value,
}

impl Event {
    /// Decode one text frame.
    ///
    /// Fails with [`SwError::MalformedMessage`] when the frame is not a JSON
    /// envelope or when a known kind carries a payload of the wrong shape.
    pub fn decode(frame: &str) -> SwResult<Self> {
        let envelope: Envelope = serde_json::from_str(frame)
            .map_err(|e| SwError::MalformedMessage(format!("invalid envelope: {e}")))?;
        Self::from_envelope(envelope.kind, envelope.payload)
    }

    fn from_envelope(kind: String, payload: Value) -> SwResult<Self> {
        fn typed<T: serde::de::DeserializeOwned>(kind: &str, payload: Value) -> SwResult<T> {
            serde_json::from_value(payload)
                .map_err(|e| SwError::MalformedMessage(format!("invalid {kind} payload: {e}")))
        }

        let event = match kind.as_str() {
            kinds::ACCOUNT_UPDATED => Event::AccountUpdated(typed(&kind, payload)?),
            kinds::ACCOUNT_WITNESS_VOTED => Event::AccountWitnessVoted(typed(&kind, payload)?),
            kinds::TRANSFER_MADE => Event::TransferMade(typed(&kind, payload)?),
            kinds::USER_MENTIONED => Event::UserMentioned(typed(&kind, payload)?),
            kinds::USER_FOLLOW_CHANGED => Event::UserFollowChanged(typed(&kind, payload)?),
            kinds::STORY_PUBLISHED => Event::StoryPublished(typed(&kind, payload)?),
            kinds::STORY_VOTED => Event::StoryVoted(typed(&kind, payload)?),
            kinds::COMMENT_PUBLISHED => Event::CommentPublished(typed(&kind, payload)?),
            kinds::COMMENT_VOTED => Event::CommentVoted(typed(&kind, payload)?),
            _ => Event::Unknown { kind, payload },
        };
        Ok(event)
    }

    /// The wire discriminator of this event.
    pub fn kind(&self) -> &str {
        match self {
            Event::AccountUpdated(_) => kinds::ACCOUNT_UPDATED,
            Event::AccountWitnessVoted(_) => kinds::ACCOUNT_WITNESS_VOTED,
            Event::TransferMade(_) => kinds::TRANSFER_MADE,
            Event::UserMentioned(_) => kinds::USER_MENTIONED,
            Event::UserFollowChanged(_) => kinds::USER_FOLLOW_CHANGED,
            Event::StoryPublished(_) => kinds::STORY_PUBLISHED,
            Event::StoryVoted(_) => kinds::STORY_VOTED,
            Event::CommentPublished(_) => kinds::COMMENT_PUBLISHED,
            Event::CommentVoted(_) => kinds::COMMENT_VOTED,
            Event::Unknown { kind, .. } => kind,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Event::Unknown { .. })
    }

    /// Whether this event concerns `account` directly.
    pub fn is_related(&self, account: &str) -> bool {
        match self {
            Event::AccountWitnessVoted(e) => e.witness == account,
            Event::TransferMade(e) => e.from == account || e.to == account,
            Event::UserMentioned(e) => e.user == account,
            Event::UserFollowChanged(e) => e.following == account,
            Event::StoryVoted(e) => e.author == account,
            Event::CommentPublished(e) => e.author == account,
            Event::AccountUpdated(_)
            | Event::StoryPublished(_)
            | Event::CommentVoted(_)
            | Event::Unknown { .. } => false,
        }
    }

    /// One-line human readable description.
    pub fn summary(&self) -> String {
        match self {
            Event::AccountUpdated(e) => format!("@{} updated their account", e.account),
            Event::AccountWitnessVoted(e) => {
                let verb = if e.approve { "voted for" } else { "unvoted" };
                format!("@{} {verb} witness @{}", e.account, e.witness)
            }
            Event::TransferMade(e) => {
                let mut line = format!("@{} sent {} to @{}", e.from, e.amount, e.to);
                if !e.memo.is_empty() {
                    line.push_str(&format!(" ({})", e.memo));
                }
                line
            }
            Event::UserMentioned(e) => {
                format!("@{} mentioned @{} in {}", e.author, e.user, e.url)
            }
            Event::UserFollowChanged(e) => match e.what.as_str() {
                "follow" => format!("@{} followed @{}", e.follower, e.following),
                "mute" => format!("@{} muted @{}", e.follower, e.following),
                _ => format!("@{} reset their relation to @{}", e.follower, e.following),
            },
            Event::StoryPublished(e) => format!("@{} published \"{}\"", e.author, e.title),
            Event::StoryVoted(e) => format!(
                "@{} voted ({}%) on \"{}\" by @{}",
                e.voter,
                f64::from(e.vote_weight) / 100.0,
                e.title,
                e.author
            ),
            Event::CommentPublished(e) => {
                format!("@{} replied to @{}: {}", e.author, e.parent_author, e.url)
            }
            Event::CommentVoted(e) => format!(
                "@{} voted ({}%) on a comment by @{}",
                e.voter,
                f64::from(e.vote_weight) / 100.0,
                e.author
            ),
            Event::Unknown { kind, .. } => format!("unrecognized event {kind}"),
        }
    }

    fn payload_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Event::AccountUpdated(p) => serde_json::to_value(p),
            Event::AccountWitnessVoted(p) => serde_json::to_value(p),
            Event::TransferMade(p) => serde_json::to_value(p),
            Event::UserMentioned(p) => serde_json::to_value(p),
            Event::UserFollowChanged(p) => serde_json::to_value(p),
            Event::StoryPublished(p) => serde_json::to_value(p),
            Event::StoryVoted(p) => serde_json::to_value(p),
            Event::CommentPublished(p) => serde_json::to_value(p),
            Event::CommentVoted(p) => serde_json::to_value(p),
            Event::Unknown { payload, .. } => Ok(payload.clone()),
        }
    }
}

/// Serializes back into the wire envelope.
impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let payload = self.payload_value().map_err(serde::ser::Error::custom)?;
        EnvelopeRef {
            kind: self.kind(),
            payload,
        }
        .serialize(serializer)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_transfer() {
        let frame = r#"{"kind":"transfer.made","payload":{"from":"alice","to":"bob","amount":"1.000 STEEM"}}"#;
        let event = Event::decode(frame).unwrap();
        assert_eq!(event.kind(), "transfer.made");
        match &event {
            Event::TransferMade(t) => {
                assert_eq!(t.from, "alice");
                assert_eq!(t.memo, "");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(event.is_related("bob"));
        assert!(event.is_related("alice"));
        assert!(!event.is_related("carol"));
    }

    #[test]
    fn test_decode_camel_case_payload() {
        let frame = r#"{"kind":"story.voted","payload":{"voter":"bob","voteWeight":5000,
            "author":"alice","title":"Hello","url":"/@alice/hello","totalPayout":"0.000 SBD",
            "pendingPayout":"1.234 SBD","totalPendingPayout":"1.234 SBD"}}"#;
        match Event::decode(frame).unwrap() {
            Event::StoryVoted(v) => {
                assert_eq!(v.vote_weight, 5000);
                assert_eq!(v.pending_payout, "1.234 SBD");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_null_tags() {
        let frame = r#"{"kind":"story.published","payload":{"author":"a","title":"t","url":"u","tags":null}}"#;
        match Event::decode(frame).unwrap() {
            Event::StoryPublished(s) => assert!(s.tags.is_empty()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_kind_is_kept() {
        let event = Event::decode(r#"{"kind":"account.exploded","payload":{"x":1}}"#).unwrap();
        assert!(!event.is_known());
        assert_eq!(event.kind(), "account.exploded");
        assert!(!event.is_related("x"));
    }

    #[test]
    fn test_unknown_kind_without_payload() {
        let event = Event::decode(r#"{"kind":"ping"}"#).unwrap();
        assert_eq!(
            event,
            Event::Unknown {
                kind: "ping".into(),
                payload: Value::Null
            }
        );
    }

    #[test]
    fn test_malformed_frames() {
        for frame in [
            "not json",
            r#"{"payload":{}}"#,
            r#"[1,2,3]"#,
            r#"{"kind":"transfer.made","payload":{"from":"alice"}}"#,
            r#"{"kind":"account.updated"}"#,
        ] {
            let err = Event::decode(frame).unwrap_err();
            assert!(matches!(err, SwError::MalformedMessage(_)), "{frame}: {err}");
        }
    }

    #[test]
    fn test_related_rules() {
        let follow = Event::UserFollowChanged(UserFollowChanged {
            follower: "bob".into(),
            following: "alice".into(),
            what: "follow".into(),
        });
        assert!(follow.is_related("alice"));
        assert!(!follow.is_related("bob"));

        let vote = Event::AccountWitnessVoted(AccountWitnessVoted {
            account: "bob".into(),
            witness: "alice".into(),
            approve: true,
        });
        assert!(vote.is_related("alice"));
        assert_eq!(vote.summary(), "@bob voted for witness @alice");
    }

    #[test]
    fn test_serialize_envelope() {
        let event = Event::AccountUpdated(AccountUpdated {
            account: "alice".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "account.updated");
        assert_eq!(json["payload"]["account"], "alice");
    }
}
