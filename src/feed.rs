//! Paginated feed state for one city filter.
//!
//! Holds the moment list, cursor, and flags, and merges push events into
//! local state. Two of the original client's races are closed here: every
//! fetch is tagged with a monotonically increasing sequence number so a
//! stale response can never overwrite a newer one, and every list mutation
//! de-duplicates by moment id so a pushed moment that later arrives again
//! via pagination is not shown twice.

use std::collections::HashSet;

use crate::api::{ApiClient, FeedQuery, MomentsPage};
use crate::dashes::DashTotalUpdate;
use crate::moments::Moment;
use crate::types::City;

pub const DEFAULT_FEED_LIMIT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    Replace,
    Append,
}

/// Tag for one in-flight fetch. A page is applied only while its ticket is
/// still the latest issued for this feed.
#[derive(Debug)]
pub struct FetchTicket {
    seq: u64,
    mode: FetchMode,
    cursor: Option<String>,
}

#[derive(Debug)]
pub struct FeedState {
    city: Option<City>,
    limit: u32,
    moments: Vec<Moment>,
    ids: HashSet<String>,
    is_loading: bool,
    error: Option<String>,
    next_cursor: Option<String>,
    has_more: bool,
    latest_seq: u64,
}

impl FeedState {
    pub fn new(city: Option<City>) -> Self {
        Self::with_limit(city, DEFAULT_FEED_LIMIT)
    }

    pub fn with_limit(city: Option<City>, limit: u32) -> Self {
        Self {
            city,
            limit,
            moments: Vec::new(),
            ids: HashSet::new(),
            is_loading: false,
            error: None,
            next_cursor: None,
            has_more: true,
            latest_seq: 0,
        }
    }

    pub fn city(&self) -> Option<City> {
        self.city
    }

    pub fn moments(&self) -> &[Moment] {
        &self.moments
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    // Fetch lifecycle -------------------------------------------------------

    /// Starts an initial fetch; the applied page replaces the list.
    pub fn begin_initial(&mut self) -> FetchTicket {
        self.start_fetch(FetchMode::Replace, None)
    }

    /// Starts a refresh: the cursor is discarded immediately and the applied
    /// page replaces the list wholesale.
    pub fn begin_refresh(&mut self) -> FetchTicket {
        self.next_cursor = None;
        self.start_fetch(FetchMode::Replace, None)
    }

    /// Starts a load-more if one is allowed: refuses while a fetch is in
    /// flight, when no more pages exist, or before the first page arrived.
    pub fn begin_load_more(&mut self) -> Option<FetchTicket> {
        if self.is_loading || !self.has_more {
            return None;
        }
        let cursor = self.next_cursor.clone()?;
        Some(self.start_fetch(FetchMode::Append, Some(cursor)))
    }

    fn start_fetch(&mut self, mode: FetchMode, cursor: Option<String>) -> FetchTicket {
        self.latest_seq += 1;
        self.is_loading = true;
        self.error = None;
        FetchTicket {
            seq: self.latest_seq,
            mode,
            cursor,
        }
    }

    /// Applies a fetched page. Returns `false` (leaving all state untouched)
    /// when the ticket has been superseded by a later fetch.
    pub fn apply_page(&mut self, ticket: &FetchTicket, page: MomentsPage) -> bool {
        if ticket.seq != self.latest_seq {
            tracing::debug!(
                target: "dasham::feed::apply_page",
                "Discarding stale response (seq {} < {})",
                ticket.seq,
                self.latest_seq
            );
            return false;
        }

        self.is_loading = false;
        if ticket.mode == FetchMode::Replace {
            self.moments.clear();
            self.ids.clear();
        }
        for moment in page.moments {
            if self.ids.insert(moment.id.clone()) {
                self.moments.push(moment);
            }
        }
        self.next_cursor = page.next_cursor;
        self.has_more = page.has_more;
        true
    }

    /// Records a fetch failure. Stale tickets are ignored.
    pub fn apply_error(&mut self, ticket: &FetchTicket, message: impl Into<String>) {
        if ticket.seq != self.latest_seq {
            return;
        }
        self.is_loading = false;
        self.error = Some(message.into());
    }

    /// Fetches the first page and replaces the list.
    pub async fn load_initial(&mut self, api: &ApiClient) -> crate::api::Result<()> {
        let ticket = self.begin_initial();
        self.fetch(api, ticket).await
    }

    /// Appends the next page, if any.
    pub async fn load_more(&mut self, api: &ApiClient) -> crate::api::Result<()> {
        match self.begin_load_more() {
            Some(ticket) => self.fetch(api, ticket).await,
            None => Ok(()),
        }
    }

    /// Discards the cursor and refetches from the start.
    pub async fn refresh(&mut self, api: &ApiClient) -> crate::api::Result<()> {
        let ticket = self.begin_refresh();
        self.fetch(api, ticket).await
    }

    async fn fetch(&mut self, api: &ApiClient, ticket: FetchTicket) -> crate::api::Result<()> {
        let query = FeedQuery {
            city: self.city,
            cursor: ticket.cursor.clone(),
            limit: Some(self.limit),
        };
        match api.feed(&query).await {
            Ok(page) => {
                self.apply_page(&ticket, page);
                Ok(())
            }
            Err(e) => {
                self.apply_error(&ticket, e.to_string());
                Err(e)
            }
        }
    }

    // Push-event merging ----------------------------------------------------

    /// Inserts a pushed moment at the head, unless it is already present.
    pub fn prepend(&mut self, moment: Moment) -> bool {
        if !self.ids.insert(moment.id.clone()) {
            return false;
        }
        self.moments.insert(0, moment);
        true
    }

    /// Overwrites one moment's aggregate counters. Returns `false` when the
    /// moment is not in the list.
    pub fn patch_totals(&mut self, update: &DashTotalUpdate) -> bool {
        match self.moments.iter_mut().find(|m| m.id == update.moment_id) {
            Some(moment) => {
                moment.set_totals(update.total_dashes, update.dash_count);
                true
            }
            None => false,
        }
    }
}
