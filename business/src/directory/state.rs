//! Directory State: the single source of truth for the user directory.
//!
//! Each load kind runs its own small state machine
//! (`Idle -> Pending -> Fulfilled | Rejected`, re-entering `Pending` on the next
//! dispatch). `loading` is derived from both, so it is true exactly while at
//! least one load is outstanding.

use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};
use roster_states::{State, state_assign_impl};

use crate::model::User;

pub const LOAD_USERS_ERROR: &str = "Error loading users";
pub const LOAD_USER_ERROR: &str = "Error loading user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadKind {
    /// The full user list.
    All,
    /// A single user, into `selected_user`.
    ById,
}

impl LoadKind {
    /// The fixed user-facing message recorded when a load of this kind fails.
    pub fn error_message(self) -> &'static str {
        match self {
            Self::All => LOAD_USERS_ERROR,
            Self::ById => LOAD_USER_ERROR,
        }
    }
}

impl fmt::Display for LoadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("load-all"),
            Self::ById => f.write_str("load-by-id"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Pending,
    Fulfilled,
    Rejected,
}

/// The error currently shown, and which load raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LoadFailure {
    kind: LoadKind,
    message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryState {
    users: Vec<User>,
    selected_user: Option<User>,
    error: Option<LoadFailure>,
    all_status: LoadStatus,
    by_id_status: LoadStatus,
    users_loaded_at: Option<DateTime<Utc>>,
}

impl DirectoryState {
    /// Users in server order; empty until the first successful load-all.
    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn selected_user(&self) -> Option<&User> {
        self.selected_user.as_ref()
    }

    pub fn loading(&self) -> bool {
        self.all_status == LoadStatus::Pending || self.by_id_status == LoadStatus::Pending
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_ref().map(|failure| failure.message.as_str())
    }

    pub fn status(&self, kind: LoadKind) -> LoadStatus {
        match kind {
            LoadKind::All => self.all_status,
            LoadKind::ById => self.by_id_status,
        }
    }

    pub fn is_pending(&self, kind: LoadKind) -> bool {
        self.status(kind) == LoadStatus::Pending
    }

    /// When `users` was last replaced by a successful load-all.
    pub fn users_loaded_at(&self) -> Option<DateTime<Utc>> {
        self.users_loaded_at
    }

    fn status_mut(&mut self, kind: LoadKind) -> &mut LoadStatus {
        match kind {
            LoadKind::All => &mut self.all_status,
            LoadKind::ById => &mut self.by_id_status,
        }
    }

    fn clear_error_from(&mut self, kind: LoadKind) {
        if self
            .error
            .as_ref()
            .is_some_and(|failure| failure.kind == kind)
        {
            self.error = None;
        }
    }

    pub(crate) fn begin(&mut self, kind: LoadKind) {
        *self.status_mut(kind) = LoadStatus::Pending;
        self.error = None;
        log::debug!("{kind}: pending");
    }

    pub(crate) fn fulfill_all(&mut self, users: Vec<User>, at: DateTime<Utc>) {
        self.users = users;
        self.users_loaded_at = Some(at);
        self.all_status = LoadStatus::Fulfilled;
        self.clear_error_from(LoadKind::All);
        log::debug!(
            "{}: fulfilled with {} users",
            LoadKind::All,
            self.users.len()
        );
    }

    pub(crate) fn fulfill_one(&mut self, user: User) {
        log::debug!("{}: fulfilled with user {}", LoadKind::ById, user.id);
        self.selected_user = Some(user);
        self.by_id_status = LoadStatus::Fulfilled;
        self.clear_error_from(LoadKind::ById);
    }

    /// Record a failed load. Users and selection are left as they were.
    pub(crate) fn reject(&mut self, kind: LoadKind) {
        *self.status_mut(kind) = LoadStatus::Rejected;
        self.error = Some(LoadFailure {
            kind,
            message: kind.error_message().to_owned(),
        });
        log::debug!("{kind}: rejected");
    }

    /// A pending load was cancelled before it resolved.
    pub(crate) fn abandon(&mut self, kind: LoadKind) {
        let status = self.status_mut(kind);
        if *status == LoadStatus::Pending {
            *status = LoadStatus::Idle;
            log::debug!("{kind}: abandoned");
        }
    }

    pub(crate) fn select(&mut self, user: User) {
        self.selected_user = Some(user);
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
    }
}

impl State for DirectoryState {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn assign_box(&mut self, new_self: Box<dyn Any + Send>) {
        state_assign_impl(self, new_self);
    }
}
