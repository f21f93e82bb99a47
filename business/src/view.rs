//! Client-side search and incremental pagination over the fetched user list.
//!
//! [`UserListView`] only holds the screen-local inputs (query and page). The
//! visible slice is derived on demand from the directory's full list, so it is
//! always consistent with the latest query, page and users.

use serde::Deserialize;

use crate::config::{DEFAULT_PAGE_SIZE, DirectoryConfig};
use crate::model::User;

/// What happens to the page count when the search query changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SearchPagePolicy {
    /// Keep the current page count.
    #[default]
    #[serde(rename = "keep")]
    KeepPage,
    /// Start over at page 1.
    #[serde(rename = "reset")]
    ResetToFirstPage,
}

/// Which length [`UserListView::load_more`] compares the visible count against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum LoadMoreGuard {
    /// The full, unfiltered list. With a narrowing query the page may still
    /// advance without revealing anything new.
    #[default]
    #[serde(rename = "unfiltered")]
    UnfilteredLen,
    /// The number of users matching the query.
    #[serde(rename = "filtered")]
    FilteredLen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserListView {
    query: String,
    // lowercase copy of `query`, matched against lowercased name/email
    needle: String,
    page: usize,
    page_size: usize,
    search_page_policy: SearchPagePolicy,
    load_more_guard: LoadMoreGuard,
}

impl Default for UserListView {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl UserListView {
    /// A view on page 1 with an empty query. A `page_size` of 0 is treated as 1.
    pub fn new(page_size: usize) -> Self {
        Self {
            query: String::new(),
            needle: String::new(),
            page: 1,
            page_size: page_size.max(1),
            search_page_policy: SearchPagePolicy::default(),
            load_more_guard: LoadMoreGuard::default(),
        }
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(config.page_size)
            .with_search_page_policy(config.search_page_policy)
            .with_load_more_guard(config.load_more_guard)
    }

    #[must_use]
    pub fn with_search_page_policy(mut self, policy: SearchPagePolicy) -> Self {
        self.search_page_policy = policy;
        self
    }

    #[must_use]
    pub fn with_load_more_guard(mut self, guard: LoadMoreGuard) -> Self {
        self.load_more_guard = guard;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Replace the search text. Setting the same text again changes nothing.
    pub fn set_search_query(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text == self.query {
            return;
        }
        self.needle = text.to_lowercase();
        self.query = text;
        if self.search_page_policy == SearchPagePolicy::ResetToFirstPage {
            self.page = 1;
        }
    }

    /// Back to page 1 with an empty query.
    pub fn reset(&mut self) {
        self.query.clear();
        self.needle.clear();
        self.page = 1;
    }

    fn limit(&self) -> usize {
        self.page.saturating_mul(self.page_size)
    }

    pub fn matching_count(&self, users: &[User]) -> usize {
        users
            .iter()
            .filter(|user| user.matches_lowercase(&self.needle))
            .count()
    }

    /// The first `page * page_size` users matching the query, in list order.
    pub fn visible_users<'u>(&self, users: &'u [User]) -> Vec<&'u User> {
        users
            .iter()
            .filter(|user| user.matches_lowercase(&self.needle))
            .take(self.limit())
            .collect()
    }

    fn guard_len(&self, users: &[User]) -> usize {
        match self.load_more_guard {
            LoadMoreGuard::UnfilteredLen => users.len(),
            LoadMoreGuard::FilteredLen => self.matching_count(users),
        }
    }

    /// Whether [`UserListView::load_more`] would advance the page.
    pub fn has_more(&self, users: &[User]) -> bool {
        self.visible_users(users).len() < self.guard_len(users)
    }

    /// Advance one page if the guard allows it. Returns whether the page changed.
    pub fn load_more(&mut self, users: &[User]) -> bool {
        if !self.has_more(users) {
            return false;
        }
        self.page += 1;
        log::debug!("List view advanced to page {}", self.page);
        true
    }
}
