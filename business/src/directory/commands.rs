//! Load commands for the directory store.
//!
//! Fetching is a side effect, so it lives in commands the store dispatches
//! explicitly. A command reads its inputs from the snapshot it is handed, runs
//! the fetch, and reports back through its [`LatestOnlyUpdater`]; the store
//! applies the result on its next sync. A superseded or cancelled command
//! returns without reporting anything.

use std::any::Any;
use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use roster_states::{
    Command, CommandFuture, CommandSnapshot, LatestOnlyUpdater, State, state_assign_impl,
    state_snapshot_impl,
};
use tokio_util::sync::CancellationToken;

use crate::api::UserSource;
use crate::directory::state::{DirectoryState, LoadKind};
use crate::model::UserId;

/// The data source shared by every load command.
#[derive(Debug, Clone)]
pub struct UserSourceState {
    pub inner: Arc<dyn UserSource>,
}

impl UserSourceState {
    pub fn new(source: Arc<dyn UserSource>) -> Self {
        Self { inner: source }
    }
}

impl State for UserSourceState {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn snapshot(&self) -> Option<Box<dyn Any + Send>> {
        state_snapshot_impl(self)
    }

    fn assign_box(&mut self, new_self: Box<dyn Any + Send>) {
        state_assign_impl(self, new_self);
    }
}

/// Which user [`LoadUserByIdCommand`] fetches on its next dispatch.
#[derive(Debug, Clone, Default)]
pub struct LoadUserByIdInput {
    pub id: Option<UserId>,
}

impl State for LoadUserByIdInput {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn snapshot(&self) -> Option<Box<dyn Any + Send>> {
        state_snapshot_impl(self)
    }

    fn assign_box(&mut self, new_self: Box<dyn Any + Send>) {
        state_assign_impl(self, new_self);
    }
}

fn reject_now(updater: LatestOnlyUpdater, kind: LoadKind) -> CommandFuture {
    Box::pin(async move {
        updater.update(move |state: &mut DirectoryState| state.reject(kind));
    })
}

#[derive(Debug, Default)]
pub struct LoadAllUsersCommand;

impl Command for LoadAllUsersCommand {
    fn run(
        &self,
        snap: CommandSnapshot,
        updater: LatestOnlyUpdater,
        cancel: CancellationToken,
    ) -> CommandFuture {
        let source = match snap.state::<UserSourceState>() {
            Ok(source) => Arc::clone(&source.inner),
            Err(err) => {
                error!("LoadAllUsersCommand: {err}");
                return reject_now(updater, LoadKind::All);
            }
        };

        let generation = updater.task_id().generation();
        Box::pin(async move {
            info!("LoadAllUsersCommand: generation {generation} fetching");
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("LoadAllUsersCommand: generation {generation} cancelled");
                    return;
                }
                result = source.fetch_all_users() => result,
            };

            match result {
                Ok(users) => {
                    info!("LoadAllUsersCommand: fetched {} users", users.len());
                    let fetched_at = Utc::now();
                    updater.update(move |state: &mut DirectoryState| {
                        state.fulfill_all(users, fetched_at);
                    });
                }
                Err(err) => {
                    error!("LoadAllUsersCommand: {err}");
                    updater.update(|state: &mut DirectoryState| state.reject(LoadKind::All));
                }
            }
        })
    }
}

#[derive(Debug, Default)]
pub struct LoadUserByIdCommand;

impl Command for LoadUserByIdCommand {
    fn run(
        &self,
        snap: CommandSnapshot,
        updater: LatestOnlyUpdater,
        cancel: CancellationToken,
    ) -> CommandFuture {
        let (source, id) = match (
            snap.state::<UserSourceState>(),
            snap.state::<LoadUserByIdInput>(),
        ) {
            (Ok(source), Ok(input)) => (Arc::clone(&source.inner), input.id),
            (Err(err), _) | (_, Err(err)) => {
                error!("LoadUserByIdCommand: {err}");
                return reject_now(updater, LoadKind::ById);
            }
        };

        let Some(id) = id else {
            warn!("LoadUserByIdCommand: dispatched without an id");
            return Box::pin(async {});
        };

        let generation = updater.task_id().generation();
        Box::pin(async move {
            info!("LoadUserByIdCommand: generation {generation} fetching {id}");
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("LoadUserByIdCommand: cancelled fetch of user {id}");
                    return;
                }
                result = source.fetch_user_by_id(id) => result,
            };

            match result {
                Ok(user) => {
                    info!("LoadUserByIdCommand: fetched user {id}");
                    updater.update(move |state: &mut DirectoryState| state.fulfill_one(user));
                }
                Err(err) => {
                    error!("LoadUserByIdCommand: {err}");
                    updater.update(|state: &mut DirectoryState| state.reject(LoadKind::ById));
                }
            }
        })
    }
}
