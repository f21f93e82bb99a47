use std::sync::Arc;

use log::{debug, error, info, warn};
use roster_states::{Command, Error, StateCtx, TaskId};
use tokio::sync::watch;

use crate::api::{HttpUserSource, UserSource};
use crate::config::{ConfigError, DirectoryConfig};
use crate::directory::commands::{
    LoadAllUsersCommand, LoadUserByIdCommand, LoadUserByIdInput, UserSourceState,
};
use crate::directory::state::{DirectoryState, LoadKind};
use crate::model::{User, UserId};

/// Owner of the [`DirectoryState`] and of the load tasks that feed it.
///
/// Every operation is applied synchronously on the caller's side. Fetch results
/// arrive in the background and become visible after [`DirectoryStore::sync`],
/// [`DirectoryStore::next_resolution`] or [`DirectoryStore::settle`]. Observers
/// get a fresh copy of the state through [`DirectoryStore::subscribe`] after
/// every change.
///
/// A new load of a kind supersedes the one still in flight, so the latest
/// dispatch always wins.
#[derive(Debug)]
pub struct DirectoryStore {
    ctx: StateCtx,
    config: DirectoryConfig,
    publisher: watch::Sender<DirectoryState>,
}

impl DirectoryStore {
    /// Store backed by the REST API at `config.api_base_url`.
    pub fn new(config: DirectoryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let source = HttpUserSource::new(config.api_url().as_str());
        Ok(Self::with_source(config, Arc::new(source)))
    }

    pub fn with_source(config: DirectoryConfig, source: Arc<dyn UserSource>) -> Self {
        let mut ctx = StateCtx::new();
        ctx.add_state(DirectoryState::default());
        ctx.add_state(LoadUserByIdInput::default());
        ctx.add_state(UserSourceState::new(source));
        ctx.record_command(LoadAllUsersCommand);
        ctx.record_command(LoadUserByIdCommand);

        let (publisher, _) = watch::channel(DirectoryState::default());
        Self {
            ctx,
            config,
            publisher,
        }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> DirectoryState {
        self.publisher.borrow().clone()
    }

    /// Watch the state. The receiver sees the value as of the last change.
    pub fn subscribe(&self) -> watch::Receiver<DirectoryState> {
        self.publisher.subscribe()
    }

    /// Fetch the full user list, replacing `users` once it resolves.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn load_all(&mut self) -> Result<TaskId, Error> {
        self.start::<LoadAllUsersCommand>(LoadKind::All)
    }

    /// Fetch one user into `selected_user`. `None` does nothing and returns `Ok(None)`.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn load_by_id(&mut self, id: Option<UserId>) -> Result<Option<TaskId>, Error> {
        let Some(id) = id else {
            debug!("load_by_id called without an id, ignoring");
            return Ok(None);
        };
        self.ctx
            .update(|input: &mut LoadUserByIdInput| input.id = Some(id))?;
        self.start::<LoadUserByIdCommand>(LoadKind::ById).map(Some)
    }

    fn start<C: Command>(&mut self, kind: LoadKind) -> Result<TaskId, Error> {
        // Results are only applied on sync, so dispatching before marking the
        // kind pending cannot lose a resolution.
        let task = self.ctx.dispatch::<C>()?;
        self.ctx
            .update(|state: &mut DirectoryState| state.begin(kind))?;
        info!("Started {kind} (generation {})", task.generation());
        self.publish();
        Ok(task)
    }

    /// Replace the selected user with a locally chosen one. No fetch is made.
    pub fn select(&mut self, user: User) -> Result<(), Error> {
        self.ctx
            .update(|state: &mut DirectoryState| state.select(user))?;
        self.publish();
        Ok(())
    }

    /// Clear the error. A load still in flight may set a new one when it fails.
    pub fn clear_error(&mut self) -> Result<(), Error> {
        self.ctx
            .update(|state: &mut DirectoryState| state.clear_error())?;
        self.publish();
        Ok(())
    }

    /// Abandon the pending load of `kind`. Its result, if any, is discarded and
    /// the kind goes back to idle. Returns whether a task was still running.
    pub fn cancel(&mut self, kind: LoadKind) -> Result<bool, Error> {
        let was_running = match kind {
            LoadKind::All => self.ctx.cancel::<LoadAllUsersCommand>(),
            LoadKind::ById => self.ctx.cancel::<LoadUserByIdCommand>(),
        };
        self.ctx
            .update(|state: &mut DirectoryState| state.abandon(kind))?;
        info!("Cancelled {kind} (running: {was_running})");
        self.publish();
        Ok(was_running)
    }

    /// Apply every result that arrived so far. Returns how many were applied.
    pub fn sync(&mut self) -> usize {
        let applied = self.ctx.sync_updates();
        if applied > 0 {
            self.publish();
        }
        applied
    }

    /// Wait for the next load to finish and apply what it reported.
    /// `None` when nothing is in flight.
    pub async fn next_resolution(&mut self) -> Option<TaskId> {
        let task = self.ctx.join_next().await;
        self.sync();
        if let Err(err) = self.reject_stalled() {
            error!("DirectoryStore::next_resolution: {err}");
        }
        task
    }

    /// Wait until every load in flight has finished.
    pub async fn settle(&mut self) -> Result<(), Error> {
        self.ctx.settle().await;
        self.reject_stalled()?;
        self.publish();
        Ok(())
    }

    fn is_running(&self, kind: LoadKind) -> bool {
        match kind {
            LoadKind::All => self.ctx.is_running::<LoadAllUsersCommand>(),
            LoadKind::ById => self.ctx.is_running::<LoadUserByIdCommand>(),
        }
    }

    /// A kind still pending with no task left ended without reporting, e.g. its
    /// task panicked. Record it as failed so `loading` cannot stay stuck.
    fn reject_stalled(&mut self) -> Result<(), Error> {
        for kind in [LoadKind::All, LoadKind::ById] {
            let pending = self.ctx.state::<DirectoryState>()?.is_pending(kind);
            if pending && !self.is_running(kind) {
                warn!("{kind} ended without a result, marking it failed");
                self.ctx
                    .update(|state: &mut DirectoryState| state.reject(kind))?;
                self.publish();
            }
        }
        Ok(())
    }

    /// Cancel everything in flight. Pending kinds go back to idle.
    pub async fn shutdown(&mut self) {
        self.ctx.shutdown().await;
        let abandoned = self.ctx.update(|state: &mut DirectoryState| {
            state.abandon(LoadKind::All);
            state.abandon(LoadKind::ById);
        });
        if let Err(err) = abandoned {
            error!("DirectoryStore::shutdown: {err}");
        }
        self.publish();
    }

    fn publish(&self) {
        match self.ctx.state::<DirectoryState>() {
            Ok(state) => {
                self.publisher.send_replace(state.clone());
            }
            Err(err) => error!("DirectoryStore::publish: {err}"),
        }
    }
}
