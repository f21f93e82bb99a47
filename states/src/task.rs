//! Task identity and cooperative cancellation for spawned commands.
//!
//! Every dispatch of a command gets a [`TaskId`]: the command's `TypeId` plus a
//! generation counter that increases by one per dispatch of that command. The
//! context only applies updates whose generation is still the current one, so a
//! superseded or cancelled task can never overwrite newer state.

use std::any::TypeId;

use tokio_util::sync::CancellationToken;

/// Identifies one dispatch of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId {
    command: TypeId,
    generation: u64,
}

impl TaskId {
    pub fn new(command: TypeId, generation: u64) -> Self {
        Self {
            command,
            generation,
        }
    }

    /// `TypeId` of the command that spawned the task.
    pub fn command(&self) -> TypeId {
        self.command
    }

    /// Higher generations were dispatched later.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A running task together with the token that asks it to stop.
///
/// Cancellation is cooperative: the command has to observe the token, usually
/// through `tokio::select!` on `token.cancelled()`.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    cancel_token: CancellationToken,
}

impl TaskHandle {
    pub fn new(id: TaskId, cancel_token: CancellationToken) -> Self {
        Self { id, cancel_token }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}
