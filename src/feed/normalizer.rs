//! Shaping of raw backend records into canonical [`FeedItem`]s, one rule per
//! entity type. Everything here is pure and deterministic: the same raw
//! record always yields a structurally identical item, because
//! normalization runs both on fetched responses and on locally constructed
//! optimistic records.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::api_client::{RawAuthor, RawComment, RawEvent, RawPoll, RawPollOption, RawTags, RawThread};
use crate::types::{
    AuthorSummary, CommentPreview, EventItem, FeedItem, PollItem, PollOption, RsvpStatus, Scope,
    ThreadItem,
};

/// Lenient timestamp parse. The backend emits RFC 3339 with or without an
/// offset depending on the code path; unparseable or absent values pin to
/// the epoch so normalization stays deterministic.
pub(crate) fn parse_timestamp(value: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return DateTime::UNIX_EPOCH;
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return parsed.and_utc();
        }
    }
    DateTime::UNIX_EPOCH
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn scope_from_str(value: Option<&str>) -> Scope {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        Some("faculdade") => Scope::Faculdade,
        _ => Scope::Geral,
    }
}

/// Tags arrive as an array or one comma-separated string; either way they
/// come out trimmed, empty-dropped and deduplicated in first-seen order.
fn normalize_tags(raw: Option<&RawTags>) -> Vec<String> {
    let candidates: Vec<String> = match raw {
        Some(RawTags::List(list)) => list.clone(),
        Some(RawTags::Csv(csv)) => csv.split(',').map(String::from).collect(),
        None => Vec::new(),
    };

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

fn normalize_author(raw: Option<&RawAuthor>) -> AuthorSummary {
    let Some(author) = raw else {
        return AuthorSummary::default();
    };
    AuthorSummary {
        user_id: author.user_id,
        email: author.email.clone(),
        nickname: author.nickname.clone(),
        full_name: author.full_name.clone(),
        university: author.university.clone(),
        course: author.course.clone(),
        photo_url: author.photo_url.clone(),
    }
}

pub(crate) fn normalize_comment(raw: &RawComment) -> CommentPreview {
    CommentPreview {
        id: raw.id,
        thread_id: raw.thread_id,
        content: raw.content.clone(),
        author: normalize_author(raw.author.as_ref()),
        upvotes: raw.upvotes,
        downvotes: raw.downvotes,
        created_at: parse_timestamp(raw.created_at.as_deref()),
    }
}

pub fn normalize_thread(raw: &RawThread) -> FeedItem {
    FeedItem::Thread(ThreadItem {
        id: raw.id,
        title: raw.title.clone(),
        description: raw.description.clone(),
        category: scope_from_str(raw.category.as_deref()),
        tags: normalize_tags(raw.tags.as_ref()),
        university: non_empty(raw.university.as_deref()),
        upvotes: raw.upvotes,
        downvotes: raw.downvotes,
        user_vote: raw.user_vote.unwrap_or(0),
        is_reported: raw.is_reported,
        author: normalize_author(raw.author.as_ref()),
        top_comments: raw.top_comments.iter().map(normalize_comment).collect(),
        created_at: parse_timestamp(raw.created_at.as_deref()),
    })
}

/// Events derive their scope from the presence of a university value; the
/// confirmed count resolves from the first of the explicit count field, the
/// participant array length, else 0; the cover falls back to the caller's
/// overlay lookup when the server sent none.
pub fn normalize_event(raw: &RawEvent, cover_fallback: Option<String>) -> FeedItem {
    let university = non_empty(raw.university.as_deref());
    let scope = if university.is_some() {
        Scope::Faculdade
    } else {
        Scope::Geral
    };

    let confirmed_count = raw
        .participant_count
        .or_else(|| raw.participants.as_ref().map(|p| p.len() as i64))
        .unwrap_or(0);

    FeedItem::Event(EventItem {
        id: raw.id,
        title: raw.title.clone(),
        description: raw.description.clone(),
        location: raw.location.clone(),
        start_datetime: parse_timestamp(raw.start_datetime.as_deref()),
        end_datetime: raw
            .end_datetime
            .as_deref()
            .map(|v| parse_timestamp(Some(v))),
        scope,
        university,
        confirmed_count,
        creator: AuthorSummary {
            user_id: raw.created_by,
            ..AuthorSummary::default()
        },
        photo_url: raw.photo_url.clone().or(cover_fallback),
        comment: raw.comment.clone(),
        user_rsvp_status: RsvpStatus::parse(raw.user_rsvp_status.as_deref()),
        created_at: parse_timestamp(raw.created_at.as_deref()),
    })
}

pub fn normalize_poll(raw: &RawPoll) -> FeedItem {
    let options = raw
        .options
        .iter()
        .map(|option| match option {
            RawPollOption::Label(label) => PollOption {
                label: label.clone(),
                votes_count: 0,
            },
            RawPollOption::Rich(fields) => PollOption {
                label: fields
                    .label
                    .clone()
                    .or_else(|| fields.text.clone())
                    .or_else(|| fields.title.clone())
                    .unwrap_or_default(),
                votes_count: fields.votes_count.or(fields.vote_count).unwrap_or(0),
            },
        })
        .collect();

    FeedItem::Poll(PollItem {
        id: raw.id,
        title: raw.title.clone(),
        description: raw.description.clone(),
        scope: scope_from_str(raw.audience.as_deref()),
        options,
        user_vote: non_empty(raw.user_vote.as_deref()),
        creator: normalize_author(raw.creator.as_ref()),
        created_at: parse_timestamp(raw.created_at.as_deref()),
    })
}
