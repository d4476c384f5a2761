//! Optimistic mutations over the in-memory feed: vote, report, RSVP, poll
//! vote and delete. All five share one pattern: locate the target by its
//! `(type, id)` key, apply a synchronous local transform, fire the request,
//! and on failure run the matching revert and re-surface the error so the
//! caller can show an inline failure.
//!
//! Transforms are keyed by [`FeedKey`], never by list position: an
//! aggregator refresh may replace the list while a request is in flight,
//! and the rollback must land on whatever copy of the item is current (or
//! quietly on nothing at all).

use crate::api_client::ApiClientError;
use crate::error::{FeedError, Result};
use crate::types::{FeedItem, FeedKey, PollItem, RsvpStatus, ThreadItem};

use super::normalizer::normalize_poll;
use super::FeedEngine;

/// Vote math for a thread, computed purely from the previous in-memory
/// state. Repeating the held vote clears it; switching moves one unit from
/// the old counter to the new one.
pub(crate) fn apply_vote(thread: &mut ThreadItem, value: i8) {
    let previous = thread.user_vote;
    if previous == value {
        match value {
            1 => thread.upvotes -= 1,
            -1 => thread.downvotes -= 1,
            _ => {}
        }
        thread.user_vote = 0;
        return;
    }

    match previous {
        1 => thread.upvotes -= 1,
        -1 => thread.downvotes -= 1,
        _ => {}
    }
    match value {
        1 => thread.upvotes += 1,
        -1 => thread.downvotes += 1,
        _ => {}
    }
    thread.user_vote = value;
}

/// Change to the confirmed-participant counter for an RSVP transition.
/// Only entering or leaving `Confirmed` moves it.
pub(crate) fn rsvp_delta(previous: Option<RsvpStatus>, next: RsvpStatus) -> i64 {
    let was_confirmed = previous == Some(RsvpStatus::Confirmed);
    let is_confirmed = next == RsvpStatus::Confirmed;
    match (was_confirmed, is_confirmed) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

/// Local poll-vote math mirroring the server's toggle semantics: voting the
/// held option again clears it, anything else moves the vote.
pub(crate) fn apply_poll_vote(poll: &mut PollItem, label: &str) {
    fn decrement(poll: &mut PollItem, label: &str) {
        if let Some(option) = poll.options.iter_mut().find(|o| o.label == label) {
            option.votes_count = (option.votes_count - 1).max(0);
        }
    }

    if poll.user_vote.as_deref() == Some(label) {
        decrement(poll, label);
        poll.user_vote = None;
        return;
    }

    if let Some(previous) = poll.user_vote.take() {
        decrement(poll, &previous);
    }
    if let Some(option) = poll.options.iter_mut().find(|o| o.label == label) {
        option.votes_count += 1;
    }
    poll.user_vote = Some(label.to_string());
}

impl FeedEngine {
    /// Applies a transform to the item with the given key, returning its
    /// pre-mutation snapshot. `None` when the item is gone (or the engine
    /// is shut down).
    pub(crate) fn apply_to_item(
        &self,
        key: FeedKey,
        f: impl FnOnce(&mut FeedItem),
    ) -> Option<FeedItem> {
        self.write_state(|state| {
            let item = state.items.iter_mut().find(|item| item.key() == key)?;
            let snapshot = item.clone();
            f(item);
            Some(snapshot)
        })
        .flatten()
    }

    /// Overwrites the current copy of an item with a snapshot. A vanished
    /// item makes this a no-op; the rollback has nothing left to fix.
    fn restore_item(&self, key: FeedKey, snapshot: FeedItem) {
        self.apply_to_item(key, |item| *item = snapshot);
    }

    fn replace_item(&self, key: FeedKey, replacement: FeedItem) {
        self.apply_to_item(key, |item| *item = replacement);
    }

    fn remove_item(&self, key: FeedKey) {
        self.write_state(|state| {
            state.items.retain(|item| item.key() != key);
        });
    }

    fn contains(&self, key: FeedKey) -> bool {
        self.state().items.iter().any(|item| item.key() == key)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(FeedError::Shutdown)
        }
    }

    fn rollback_warn(&self, action: &str, key: FeedKey, error: &ApiClientError) {
        tracing::warn!(
            target: "conecta_feed::mutations",
            "{} failed for {}, rolling back: {}",
            action,
            key,
            error
        );
    }

    /// Casts or toggles the caller's vote on a thread. The new counters are
    /// computed locally before the request goes out; a failed request
    /// restores the exact pre-call snapshot.
    pub async fn vote(&self, thread_id: i64, value: i8) -> Result<()> {
        self.ensure_alive()?;
        let key = FeedKey::thread(thread_id);
        let snapshot = self
            .apply_to_item(key, |item| {
                if let FeedItem::Thread(thread) = item {
                    apply_vote(thread, value);
                }
            })
            .ok_or(FeedError::ItemNotFound(key))?;

        match self.api().vote_thread(thread_id, value).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.rollback_warn("Vote", key, &e);
                self.restore_item(key, snapshot);
                Err(e.into())
            }
        }
    }

    /// Flags a thread. One-way: callers disable repeat reports; the engine
    /// only reverts the flag when the request fails.
    pub async fn report(&self, thread_id: i64) -> Result<()> {
        self.ensure_alive()?;
        let key = FeedKey::thread(thread_id);
        let snapshot = self
            .apply_to_item(key, |item| {
                if let FeedItem::Thread(thread) = item {
                    thread.is_reported = true;
                }
            })
            .ok_or(FeedError::ItemNotFound(key))?;

        match self.api().report_thread(thread_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.rollback_warn("Report", key, &e);
                self.restore_item(key, snapshot);
                Err(e.into())
            }
        }
    }

    /// Updates the caller's RSVP. Rollback inverts exactly the counter
    /// delta this call applied, rather than restoring a cached count, so an
    /// interleaved refresh is never double-adjusted.
    pub async fn rsvp(&self, event_id: i64, status: RsvpStatus) -> Result<()> {
        self.ensure_alive()?;
        let key = FeedKey::event(event_id);
        let mut previous = None;
        let mut delta = 0i64;
        self.apply_to_item(key, |item| {
            if let FeedItem::Event(event) = item {
                previous = event.user_rsvp_status;
                delta = rsvp_delta(previous, status);
                event.user_rsvp_status = Some(status);
                event.confirmed_count += delta;
            }
        })
        .ok_or(FeedError::ItemNotFound(key))?;

        match self.api().rsvp_event(event_id, status).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.rollback_warn("RSVP", key, &e);
                self.apply_to_item(key, |item| {
                    if let FeedItem::Event(event) = item {
                        event.user_rsvp_status = previous;
                        event.confirmed_count -= delta;
                    }
                });
                Err(e.into())
            }
        }
    }

    /// Casts or toggles a poll vote. The optimistic step recomputes option
    /// totals locally; on success the item is replaced with the
    /// server-returned poll, since the client cannot fully recompute totals
    /// alone.
    pub async fn poll_vote(&self, poll_id: i64, option_label: &str) -> Result<()> {
        self.ensure_alive()?;
        let key = FeedKey::poll(poll_id);
        let snapshot = self
            .apply_to_item(key, |item| {
                if let FeedItem::Poll(poll) = item {
                    apply_poll_vote(poll, option_label);
                }
            })
            .ok_or(FeedError::ItemNotFound(key))?;

        match self.api().vote_poll(poll_id, option_label).await {
            Ok(raw) => {
                self.replace_item(key, normalize_poll(&raw));
                Ok(())
            }
            Err(e) => {
                self.rollback_warn("Poll vote", key, &e);
                self.restore_item(key, snapshot);
                Err(e.into())
            }
        }
    }

    /// Deletes a thread. The one action with no optimistic step: removal is
    /// destructive, so the item leaves the list only after the server
    /// confirms. Failure leaves it in place.
    pub async fn delete_thread(&self, thread_id: i64) -> Result<()> {
        self.ensure_alive()?;
        let key = FeedKey::thread(thread_id);
        if !self.contains(key) {
            return Err(FeedError::ItemNotFound(key));
        }

        self.api().delete_thread(thread_id).await?;
        self.remove_item(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;
    use crate::feed::normalizer::{normalize_event, normalize_thread};
    use crate::types::PollOption;
    use serde_json::json;

    fn seeded_thread(engine: &FeedEngine, id: i64, upvotes: i64, downvotes: i64, user_vote: i8) {
        let raw = serde_json::from_value(json!({
            "id": id,
            "title": "Thread",
            "description": "d",
            "upvotes": upvotes,
            "downvotes": downvotes,
            "user_vote": user_vote,
            "created_at": "2024-01-01T00:00:00Z",
        }))
        .unwrap();
        seed_items(engine, vec![normalize_thread(&raw)]);
    }

    fn seeded_event(engine: &FeedEngine, id: i64, confirmed: i64, rsvp: Option<&str>) {
        let raw = serde_json::from_value(json!({
            "id": id,
            "title": "Evento",
            "description": "d",
            "start_datetime": "2024-05-01T00:00:00Z",
            "participant_count": confirmed,
            "user_rsvp_status": rsvp,
        }))
        .unwrap();
        seed_items(engine, vec![normalize_event(&raw, None)]);
    }

    fn seeded_poll(engine: &FeedEngine, user_vote: Option<&str>) {
        let item = FeedItem::Poll(PollItem {
            id: 5,
            title: "Enquete".into(),
            description: None,
            scope: crate::types::Scope::Geral,
            options: vec![
                PollOption {
                    label: "Sim".into(),
                    votes_count: 2,
                },
                PollOption {
                    label: "Não".into(),
                    votes_count: 1,
                },
            ],
            user_vote: user_vote.map(String::from),
            creator: Default::default(),
            created_at: chrono::DateTime::UNIX_EPOCH,
        });
        seed_items(engine, vec![item]);
    }

    fn thread_of(engine: &FeedEngine, id: i64) -> ThreadItem {
        match engine
            .items()
            .into_iter()
            .find(|item| item.key() == FeedKey::thread(id))
        {
            Some(FeedItem::Thread(thread)) => thread,
            other => panic!("expected thread, got {:?}", other),
        }
    }

    fn event_of(engine: &FeedEngine, id: i64) -> crate::types::EventItem {
        match engine
            .items()
            .into_iter()
            .find(|item| item.key() == FeedKey::event(id))
        {
            Some(FeedItem::Event(event)) => event,
            other => panic!("expected event, got {:?}", other),
        }
    }

    fn poll_of(engine: &FeedEngine, id: i64) -> PollItem {
        match engine
            .items()
            .into_iter()
            .find(|item| item.key() == FeedKey::poll(id))
        {
            Some(FeedItem::Poll(poll)) => poll,
            other => panic!("expected poll, got {:?}", other),
        }
    }

    mod vote {
        use super::*;

        #[tokio::test]
        async fn upvote_then_switch_to_downvote() {
            let (engine, mut server) = create_test_engine().await;
            seeded_thread(&engine, 1, 2, 0, 0);
            server
                .mock("POST", "/api/threads/1/vote")
                .with_status(200)
                .with_body("{}")
                .expect(2)
                .create_async()
                .await;

            engine.vote(1, 1).await.unwrap();
            let after_up = thread_of(&engine, 1);
            assert_eq!(after_up.upvotes, 3);
            assert_eq!(after_up.user_vote, 1);

            engine.vote(1, -1).await.unwrap();
            let after_down = thread_of(&engine, 1);
            assert_eq!(after_down.upvotes, 2);
            assert_eq!(after_down.downvotes, 1);
            assert_eq!(after_down.user_vote, -1);
        }

        #[tokio::test]
        async fn repeating_the_same_vote_toggles_off() {
            let (engine, mut server) = create_test_engine().await;
            seeded_thread(&engine, 1, 2, 1, 0);
            server
                .mock("POST", "/api/threads/1/vote")
                .with_status(200)
                .with_body("{}")
                .expect(2)
                .create_async()
                .await;

            engine.vote(1, 1).await.unwrap();
            engine.vote(1, 1).await.unwrap();

            let thread = thread_of(&engine, 1);
            assert_eq!(thread.user_vote, 0, "toggle-off is idempotent-inverse");
            assert_eq!(thread.upvotes, 2, "counter back to its pre-mutation value");
            assert_eq!(thread.downvotes, 1);
        }

        #[tokio::test]
        async fn failed_vote_restores_the_exact_snapshot() {
            let (engine, mut server) = create_test_engine().await;
            seeded_thread(&engine, 1, 2, 0, 0);
            let before = thread_of(&engine, 1);

            server
                .mock("POST", "/api/threads/1/vote")
                .with_status(500)
                .with_body(r#"{"detail": "boom"}"#)
                .create_async()
                .await;

            let err = engine.vote(1, 1).await.unwrap_err();
            assert!(matches!(err, FeedError::Api(_)));
            assert_eq!(thread_of(&engine, 1), before);
        }

        #[tokio::test]
        async fn vote_on_missing_thread_is_item_not_found() {
            let (engine, _server) = create_test_engine().await;
            let err = engine.vote(42, 1).await.unwrap_err();
            assert!(matches!(err, FeedError::ItemNotFound(_)));
        }
    }

    mod report {
        use super::*;

        #[tokio::test]
        async fn sets_the_flag_optimistically() {
            let (engine, mut server) = create_test_engine().await;
            seeded_thread(&engine, 1, 0, 0, 0);
            server
                .mock("POST", "/api/threads/1/report")
                .with_status(200)
                .with_body("{}")
                .create_async()
                .await;

            engine.report(1).await.unwrap();
            assert!(thread_of(&engine, 1).is_reported);
        }

        #[tokio::test]
        async fn failure_reverts_the_flag() {
            let (engine, mut server) = create_test_engine().await;
            seeded_thread(&engine, 1, 0, 0, 0);
            server
                .mock("POST", "/api/threads/1/report")
                .with_status(500)
                .with_body(r#"{"detail": "boom"}"#)
                .create_async()
                .await;

            assert!(engine.report(1).await.is_err());
            assert!(!thread_of(&engine, 1).is_reported);
        }
    }

    mod rsvp {
        use super::*;

        #[test]
        fn delta_moves_only_on_confirmed_transitions() {
            assert_eq!(rsvp_delta(None, RsvpStatus::Confirmed), 1);
            assert_eq!(rsvp_delta(Some(RsvpStatus::Maybe), RsvpStatus::Confirmed), 1);
            assert_eq!(rsvp_delta(Some(RsvpStatus::Confirmed), RsvpStatus::Declined), -1);
            assert_eq!(rsvp_delta(Some(RsvpStatus::Confirmed), RsvpStatus::Confirmed), 0);
            assert_eq!(rsvp_delta(Some(RsvpStatus::Maybe), RsvpStatus::Declined), 0);
            assert_eq!(rsvp_delta(None, RsvpStatus::Maybe), 0);
        }

        #[tokio::test]
        async fn counter_tracks_entries_and_exits_across_a_sequence() {
            let (engine, mut server) = create_test_engine().await;
            seeded_event(&engine, 3, 10, None);
            server
                .mock("POST", "/api/events/3/rsvp")
                .with_status(200)
                .with_body("{}")
                .expect(4)
                .create_async()
                .await;

            engine.rsvp(3, RsvpStatus::Maybe).await.unwrap();
            assert_eq!(event_of(&engine, 3).confirmed_count, 10);

            engine.rsvp(3, RsvpStatus::Confirmed).await.unwrap();
            assert_eq!(event_of(&engine, 3).confirmed_count, 11);

            engine.rsvp(3, RsvpStatus::Declined).await.unwrap();
            assert_eq!(event_of(&engine, 3).confirmed_count, 10);

            engine.rsvp(3, RsvpStatus::Confirmed).await.unwrap();
            let event = event_of(&engine, 3);
            // initial + entries(2) - exits(1)
            assert_eq!(event.confirmed_count, 11);
            assert_eq!(event.user_rsvp_status, Some(RsvpStatus::Confirmed));
        }

        #[tokio::test]
        async fn failure_inverts_exactly_the_applied_delta() {
            let (engine, mut server) = create_test_engine().await;
            seeded_event(&engine, 3, 10, Some("maybe"));
            server
                .mock("POST", "/api/events/3/rsvp")
                .with_status(500)
                .with_body(r#"{"detail": "boom"}"#)
                .create_async()
                .await;

            assert!(engine.rsvp(3, RsvpStatus::Confirmed).await.is_err());

            let event = event_of(&engine, 3);
            assert_eq!(event.confirmed_count, 10);
            assert_eq!(event.user_rsvp_status, Some(RsvpStatus::Maybe));
        }
    }

    mod poll_vote {
        use super::*;

        #[test]
        fn local_math_toggles_and_moves_votes() {
            let mut poll = PollItem {
                id: 5,
                title: "t".into(),
                description: None,
                scope: crate::types::Scope::Geral,
                options: vec![
                    PollOption {
                        label: "Sim".into(),
                        votes_count: 2,
                    },
                    PollOption {
                        label: "Não".into(),
                        votes_count: 1,
                    },
                ],
                user_vote: None,
                creator: Default::default(),
                created_at: chrono::DateTime::UNIX_EPOCH,
            };

            apply_poll_vote(&mut poll, "Sim");
            assert_eq!(poll.options[0].votes_count, 3);
            assert_eq!(poll.user_vote.as_deref(), Some("Sim"));

            // Moving the vote shifts one unit between options.
            apply_poll_vote(&mut poll, "Não");
            assert_eq!(poll.options[0].votes_count, 2);
            assert_eq!(poll.options[1].votes_count, 2);

            // Repeating the held option clears it.
            apply_poll_vote(&mut poll, "Não");
            assert_eq!(poll.options[1].votes_count, 1);
            assert_eq!(poll.user_vote, None);
        }

        #[tokio::test]
        async fn success_replaces_the_item_with_server_truth() {
            let (engine, mut server) = create_test_engine().await;
            seeded_poll(&engine, None);
            server
                .mock("POST", "/api/polls/5/vote")
                .with_status(200)
                .with_body(
                    json!({
                        "id": 5,
                        "title": "Enquete",
                        "audience": "geral",
                        // Server totals differ from what the client computed.
                        "options": [
                            {"label": "Sim", "votes_count": 7},
                            {"label": "Não", "votes_count": 1},
                        ],
                        "user_vote": "Sim",
                    })
                    .to_string(),
                )
                .create_async()
                .await;

            engine.poll_vote(5, "Sim").await.unwrap();

            let poll = poll_of(&engine, 5);
            assert_eq!(poll.options[0].votes_count, 7);
            assert_eq!(poll.user_vote.as_deref(), Some("Sim"));
        }

        #[tokio::test]
        async fn failure_restores_the_snapshot() {
            let (engine, mut server) = create_test_engine().await;
            seeded_poll(&engine, Some("Não"));
            let before = poll_of(&engine, 5);

            server
                .mock("POST", "/api/polls/5/vote")
                .with_status(500)
                .with_body(r#"{"detail": "boom"}"#)
                .create_async()
                .await;

            assert!(engine.poll_vote(5, "Sim").await.is_err());
            assert_eq!(poll_of(&engine, 5), before);
        }
    }

    mod delete {
        use super::*;

        #[tokio::test]
        async fn removal_waits_for_server_confirmation() {
            let (engine, mut server) = create_test_engine().await;
            seeded_thread(&engine, 1, 0, 0, 0);
            server
                .mock("DELETE", "/api/threads/1")
                .with_status(200)
                .with_body(r#"{"message": "ok"}"#)
                .create_async()
                .await;

            engine.delete_thread(1).await.unwrap();
            assert!(engine.items().is_empty());
        }

        #[tokio::test]
        async fn failure_leaves_the_item_in_place() {
            let (engine, mut server) = create_test_engine().await;
            seeded_thread(&engine, 1, 0, 0, 0);
            server
                .mock("DELETE", "/api/threads/1")
                .with_status(403)
                .with_body(r#"{"detail": "Sem permissão."}"#)
                .create_async()
                .await;

            let err = engine.delete_thread(1).await.unwrap_err();
            assert!(matches!(err, FeedError::Api(_)));
            assert_eq!(engine.items().len(), 1);
        }
    }
}
