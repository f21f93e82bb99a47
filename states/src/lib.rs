//! State context for Roster.
//!
//! States live in a [`StateCtx`] owned by the application root. Side effects run
//! as [`Command`]s spawned onto the context's task set; they read a
//! [`CommandSnapshot`] and report back through a [`LatestOnlyUpdater`], whose
//! updates are dropped once a newer dispatch of the same command exists.

mod command;
mod ctx;
mod error;
mod snapshot;
mod state;
mod task;
mod updater;

pub use command::{Command, CommandFuture};
pub use ctx::StateCtx;
pub use error::Error;
pub use snapshot::CommandSnapshot;
pub use state::{State, state_assign_impl, state_snapshot_impl};
pub use task::{TaskHandle, TaskId};
pub use updater::LatestOnlyUpdater;
