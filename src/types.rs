use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visibility classification of feed content: platform-wide or restricted to
/// the caller's university.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Geral,
    Faculdade,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Geral => "geral",
            Scope::Faculdade => "faculdade",
        }
    }
}

/// The caller's RSVP on an event. Absence of an RSVP is represented as
/// `Option<RsvpStatus>::None` on the item, not as a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsvpStatus {
    Confirmed,
    Maybe,
    Declined,
}

impl RsvpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RsvpStatus::Confirmed => "confirmed",
            RsvpStatus::Maybe => "maybe",
            RsvpStatus::Declined => "declined",
        }
    }

    /// Lenient parse of the wire value; anything unrecognized reads as "no RSVP".
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value.map(str::trim) {
            Some("confirmed") => Some(RsvpStatus::Confirmed),
            Some("maybe") => Some(RsvpStatus::Maybe),
            Some("declined") => Some(RsvpStatus::Declined),
            _ => None,
        }
    }
}

/// Discriminant of the three feed entity types. Ids are only unique per
/// entity type, so feed identity is always the `(kind, id)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Thread,
    Event,
    Poll,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ItemKind::Thread => "thread",
            ItemKind::Event => "event",
            ItemKind::Poll => "poll",
        };
        write!(f, "{}", label)
    }
}

/// Identity of an item within the merged feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedKey {
    pub kind: ItemKind,
    pub id: i64,
}

impl FeedKey {
    pub fn thread(id: i64) -> Self {
        FeedKey {
            kind: ItemKind::Thread,
            id,
        }
    }

    pub fn event(id: i64) -> Self {
        FeedKey {
            kind: ItemKind::Event,
            id,
        }
    }

    pub fn poll(id: i64) -> Self {
        FeedKey {
            kind: ItemKind::Poll,
            id,
        }
    }
}

impl std::fmt::Display for FeedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Flattened author/creator summary attached to threads, comments, events
/// and polls. Every field the server may omit defaults to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub full_name: Option<String>,
    pub university: Option<String>,
    pub course: Option<String>,
    pub photo_url: Option<String>,
}

/// One of the capped preview comments the thread list endpoint inlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentPreview {
    pub id: i64,
    pub thread_id: i64,
    pub content: String,
    pub author: AuthorSummary,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: DateTime<Utc>,
}

/// One option of a poll, coerced to a single shape regardless of how the
/// server spelled it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub label: String,
    pub votes_count: i64,
}

/// A discussion thread in the unified feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: Scope,
    /// Deduplicated, order-preserving tag list.
    pub tags: Vec<String>,
    pub university: Option<String>,
    pub upvotes: i64,
    pub downvotes: i64,
    /// The caller's own vote: -1, 0 or 1.
    pub user_vote: i8,
    pub is_reported: bool,
    pub author: AuthorSummary,
    pub top_comments: Vec<CommentPreview>,
    pub created_at: DateTime<Utc>,
}

/// An event in the unified feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: Option<DateTime<Utc>>,
    /// Derived from the presence of a university value, never trusted from
    /// the server verbatim.
    pub scope: Scope,
    pub university: Option<String>,
    pub confirmed_count: i64,
    pub creator: AuthorSummary,
    /// Server cover when present, otherwise the client-persisted overlay.
    pub photo_url: Option<String>,
    pub comment: Option<String>,
    pub user_rsvp_status: Option<RsvpStatus>,
    pub created_at: DateTime<Utc>,
}

/// A poll in the unified feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollItem {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub scope: Scope,
    pub options: Vec<PollOption>,
    /// Label of the option the caller voted for, if any.
    pub user_vote: Option<String>,
    pub creator: AuthorSummary,
    pub created_at: DateTime<Utc>,
}

/// Canonical tagged record the renderer consumes. The `type` tag is the
/// required discriminant; consumers switch on it and must not assume fields
/// outside the variant's declared shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedItem {
    Thread(ThreadItem),
    Event(EventItem),
    Poll(PollItem),
}

impl FeedItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            FeedItem::Thread(_) => ItemKind::Thread,
            FeedItem::Event(_) => ItemKind::Event,
            FeedItem::Poll(_) => ItemKind::Poll,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            FeedItem::Thread(t) => t.id,
            FeedItem::Event(e) => e.id,
            FeedItem::Poll(p) => p.id,
        }
    }

    pub fn key(&self) -> FeedKey {
        FeedKey {
            kind: self.kind(),
            id: self.id(),
        }
    }

    /// The item's own recency field, which drives the merged-feed ordering:
    /// creation time for threads and polls, start time for events.
    pub fn recency(&self) -> DateTime<Utc> {
        match self {
            FeedItem::Thread(t) => t.created_at,
            FeedItem::Event(e) => e.start_datetime,
            FeedItem::Poll(p) => p.created_at,
        }
    }
}

/// Category filter the UI drives the feed with. `Todos` places no category
/// restriction on the thread query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    Todos,
    Geral,
    Faculdade,
}

impl CategoryFilter {
    /// The scope sent to the server, if the filter restricts to one.
    pub fn as_scope(&self) -> Option<Scope> {
        match self {
            CategoryFilter::Todos => None,
            CategoryFilter::Geral => Some(Scope::Geral),
            CategoryFilter::Faculdade => Some(Scope::Faculdade),
        }
    }
}
