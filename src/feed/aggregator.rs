//! Fetch, merge, sort and pagination bookkeeping across the three feed
//! sources. The contract is deliberately asymmetric: only threads paginate
//! incrementally; events and polls are fetched in full on every reset and
//! never again on "load more". That asymmetry is preserved as observed
//! behavior, not silently fixed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::try_join;

use crate::api_client::{EventQuery, RawEvent, RawPoll, ThreadQuery};
use crate::types::{CategoryFilter, FeedItem};

use super::normalizer::{normalize_event, normalize_poll, normalize_thread};
use super::{
    FeedEngine, EVENTS_PAGE_SIZE, LOAD_ERROR_MESSAGE, POLLS_PAGE_SIZE, SCOPE_GUIDANCE_MESSAGE,
};

/// Releases the engine's in-flight flag when the load completes or bails on
/// any early-return path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl FeedEngine {
    /// Loads a feed page. `reset` replaces the list and refetches events and
    /// polls; a non-reset call appends the next thread page only.
    ///
    /// At most one load is in flight at a time: a call made while another is
    /// outstanding is dropped, not queued. Callers that still want fresher
    /// data re-trigger after completion (a debounced search effect calls
    /// `load(true)` once the debounce settles).
    ///
    /// Failures never corrupt the list; they surface through
    /// [`FeedState::error`](super::FeedState).
    pub async fn load(&self, reset: bool) {
        if self
            .load_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(
                target: "conecta_feed::aggregator::load",
                "Load already in flight, dropping call (reset: {})",
                reset
            );
            return;
        }
        let _guard = InFlightGuard(&self.load_in_flight);

        let filter = self.filter();
        let faculty = filter.category == CategoryFilter::Faculdade;
        let scope = self.scope().current();

        // Faculty scope waits for the profile: a deferred state, not an
        // error, and no request may go out for the wrong university.
        if faculty && !scope.loaded {
            tracing::debug!(
                target: "conecta_feed::aggregator::load",
                "Faculty scope requested before profile resolution, deferring"
            );
            if reset {
                self.write_state(|state| {
                    state.items.clear();
                    state.skip = 0;
                    state.has_more = false;
                    state.error = None;
                });
            }
            return;
        }
        if faculty && scope.university.is_none() {
            self.write_state(|state| {
                state.items.clear();
                state.skip = 0;
                state.has_more = false;
                state.error = Some(SCOPE_GUIDANCE_MESSAGE.to_string());
            });
            return;
        }

        let university = if faculty { scope.university.clone() } else { None };
        let skip = if reset { 0 } else { self.state().skip };
        let limit = self.config.page_size;
        let search = filter.search.trim().to_string();

        let thread_query = ThreadQuery {
            skip,
            limit,
            search: (!search.is_empty()).then(|| search.clone()),
            category: filter.category.as_scope(),
            university: university.clone(),
            tag: None,
        };

        let fetched = if reset {
            let event_query = EventQuery {
                skip: 0,
                limit: EVENTS_PAGE_SIZE,
                university: university.clone(),
                include_past: false,
            };
            try_join!(
                self.api().list_threads(&thread_query),
                self.api().list_events(&event_query),
                self.api().list_polls(None, 0, POLLS_PAGE_SIZE),
            )
            .map(|(threads, events, polls)| (threads, Some(events), Some(polls)))
        } else {
            self.api()
                .list_threads(&thread_query)
                .await
                .map(|threads| (threads, None, None))
        };

        if !self.is_alive() {
            tracing::debug!(
                target: "conecta_feed::aggregator::load",
                "Engine shut down during fetch, discarding results"
            );
            return;
        }

        let (raw_threads, raw_events, raw_polls) = match fetched {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(
                    target: "conecta_feed::aggregator::load",
                    "Feed fetch failed, keeping current list: {}",
                    e
                );
                self.write_state(|state| {
                    state.error = Some(LOAD_ERROR_MESSAGE.to_string());
                });
                return;
            }
        };

        let thread_count = raw_threads.len();
        let mut page: Vec<FeedItem> = raw_threads.iter().map(normalize_thread).collect();
        if let Some(raw_events) = raw_events {
            page.extend(self.merge_events(raw_events, university.as_deref(), &search));
        }
        if let Some(raw_polls) = raw_polls {
            page.extend(filter_polls(raw_polls, faculty, &search));
        }

        // Stable sort: ties keep the thread/event/poll merge order.
        page.sort_by(|a, b| b.recency().cmp(&a.recency()));

        self.write_state(|state| {
            if reset {
                state.items = page;
                state.skip = thread_count;
            } else {
                state.items.extend(page);
                state.skip += thread_count;
            }
            state.has_more = thread_count == limit;
            state.error = None;
        });
    }

    /// Filters the server's event page, then overlays locally created
    /// events the server does not list yet and locally chosen covers it
    /// does not echo back.
    fn merge_events(
        &self,
        raw_events: Vec<RawEvent>,
        university: Option<&str>,
        search: &str,
    ) -> Vec<FeedItem> {
        let needle = search.to_lowercase();
        let remote: Vec<RawEvent> = raw_events
            .into_iter()
            .filter(|event| match university {
                Some(u) => event.university.as_deref() == Some(u),
                None => true,
            })
            .filter(|event| matches_search(&needle, &event.title, &event.description))
            .collect();

        let remote_ids: HashSet<i64> = remote.iter().map(|event| event.id).collect();
        let local: Vec<RawEvent> = self
            .overlay()
            .local_events()
            .into_iter()
            .filter(|event| !remote_ids.contains(&event.id))
            .collect();

        local
            .iter()
            .chain(remote.iter())
            .map(|event| normalize_event(event, self.overlay().cover(event.id)))
            .collect()
    }
}

fn matches_search(needle: &str, title: &str, description: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let haystack = format!("{} {}", title, description).to_lowercase();
    haystack.contains(needle)
}

fn filter_polls(raw_polls: Vec<RawPoll>, faculty: bool, search: &str) -> Vec<FeedItem> {
    let needle = search.to_lowercase();
    raw_polls
        .iter()
        .filter(|poll| {
            let scope = poll
                .audience
                .as_deref()
                .unwrap_or("geral")
                .trim()
                .to_lowercase();
            !faculty || scope == "faculdade"
        })
        .filter(|poll| {
            matches_search(&needle, &poll.title, poll.description.as_deref().unwrap_or(""))
        })
        .map(normalize_poll)
        .collect()
}
