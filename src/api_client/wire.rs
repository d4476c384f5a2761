//! Raw records as the backend sends them. Fields the server may omit are
//! defaulted here; shaping into canonical [`crate::types::FeedItem`] values
//! happens in the normalizer, never at the call sites.

use serde::{Deserialize, Serialize};

use crate::types::Scope;

/// Author block the server inlines on threads, comments and polls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAuthor {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub university: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawComment {
    pub id: i64,
    #[serde(default)]
    pub thread_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: Option<RawAuthor>,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Thread tags arrive either as a proper array or as one comma-separated
/// string, depending on the server code path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTags {
    List(Vec<String>),
    Csv(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawThread {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<RawTags>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub university: Option<String>,
    #[serde(default)]
    pub author: Option<RawAuthor>,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    #[serde(default)]
    pub user_vote: Option<i8>,
    #[serde(default)]
    pub is_reported: bool,
    #[serde(default)]
    pub top_comments: Vec<RawComment>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_datetime: Option<String>,
    #[serde(default)]
    pub end_datetime: Option<String>,
    #[serde(default)]
    pub university: Option<String>,
    /// Explicit confirmed count; some responses carry only `participants`.
    #[serde(default)]
    pub participant_count: Option<i64>,
    #[serde(default)]
    pub participants: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub created_by: Option<i64>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub user_rsvp_status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Poll options arrive either as bare strings or as objects whose label and
/// count fields vary by server version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPollOption {
    Label(String),
    Rich(RawPollOptionFields),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPollOptionFields {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub votes_count: Option<i64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPoll {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub creator: Option<RawAuthor>,
    #[serde(default)]
    pub options: Vec<RawPollOption>,
    #[serde(default)]
    pub user_vote: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// The slice of the caller's profile the feed engine cares about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProfile {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub university: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
}

// --- request payloads ---

#[derive(Debug, Clone, Serialize)]
pub struct NewThread {
    pub title: String,
    pub description: String,
    pub category: Scope,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub scheduled_at: String,
    pub audience: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPoll {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub options: Vec<String>,
    pub audience: Scope,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_tags_accept_both_wire_shapes() {
        let list: RawThread =
            serde_json::from_value(serde_json::json!({"id": 1, "tags": ["a", "b"]})).unwrap();
        assert_eq!(
            list.tags,
            Some(RawTags::List(vec!["a".into(), "b".into()]))
        );

        let csv: RawThread =
            serde_json::from_value(serde_json::json!({"id": 1, "tags": "a, b"})).unwrap();
        assert_eq!(csv.tags, Some(RawTags::Csv("a, b".into())));
    }

    #[test]
    fn poll_options_accept_strings_and_objects() {
        let poll: RawPoll = serde_json::from_value(serde_json::json!({
            "id": 2,
            "options": ["Sim", {"label": "Não", "votes_count": 4}],
        }))
        .unwrap();

        assert_eq!(poll.options.len(), 2);
        assert!(matches!(poll.options[0], RawPollOption::Label(_)));
        assert!(matches!(poll.options[1], RawPollOption::Rich(_)));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let event: RawEvent = serde_json::from_value(serde_json::json!({
            "id": 9,
            "title": "Feira de estágios",
            "max_participants": 120,
            "is_cancelled": false,
        }))
        .unwrap();
        assert_eq!(event.id, 9);
        assert_eq!(event.participant_count, None);
    }
}
