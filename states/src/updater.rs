use std::any::{Any, TypeId, type_name};

use flume::Sender;

use crate::{State, TaskId};

type Mutation = Box<dyn FnOnce(&mut dyn Any) + Send>;

pub(crate) enum Change {
    Assign(Box<dyn Any + Send>),
    Mutate(Mutation),
}

/// A queued change to one state, applied by `StateCtx::sync_updates`.
pub(crate) struct Update {
    pub(crate) target: TypeId,
    pub(crate) target_name: &'static str,
    /// The dispatch that sent it; stale dispatches are dropped on sync.
    pub(crate) origin: TaskId,
    pub(crate) change: Change,
}

impl Update {
    fn assign<T: State>(state: T, origin: TaskId) -> Self {
        Self {
            target: TypeId::of::<T>(),
            target_name: type_name::<T>(),
            origin,
            change: Change::Assign(Box::new(state)),
        }
    }

    fn mutate<T: State>(f: impl FnOnce(&mut T) + Send + 'static, origin: TaskId) -> Self {
        let mutation: Mutation = Box::new(move |any: &mut dyn Any| {
            if let Some(state) = any.downcast_mut::<T>() {
                f(state);
            }
        });
        Self {
            target: TypeId::of::<T>(),
            target_name: type_name::<T>(),
            origin,
            change: Change::Mutate(mutation),
        }
    }
}

fn push(send: &Sender<Update>, update: Update) {
    if send.send(update).is_err() {
        log::debug!("State context dropped, discarding update");
    }
}

/// Updater handed to a spawned command.
///
/// Every update is tagged with the command's [`TaskId`]. The context drops it
/// on arrival if a newer dispatch of the same command happened, or the command
/// was cancelled, in the meantime.
#[derive(Clone)]
pub struct LatestOnlyUpdater {
    send: Sender<Update>,
    task: TaskId,
}

impl std::fmt::Debug for LatestOnlyUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatestOnlyUpdater")
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

impl LatestOnlyUpdater {
    pub(crate) fn new(send: Sender<Update>, task: TaskId) -> Self {
        Self { send, task }
    }

    pub fn task_id(&self) -> TaskId {
        self.task
    }

    pub fn set<T: State>(&self, state: T) {
        push(&self.send, Update::assign(state, self.task));
    }

    pub fn update<T: State>(&self, f: impl FnOnce(&mut T) + Send + 'static) {
        push(&self.send, Update::mutate(f, self.task));
    }
}
