use std::any::Any;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::{CommandSnapshot, LatestOnlyUpdater};

pub type CommandFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A side effect dispatched explicitly by the context owner.
///
/// `run` is called synchronously at dispatch time with a snapshot of the
/// states; the returned future is spawned and may outlive the call. Results
/// flow back only through `updater`.
pub trait Command: Any + Send + Sync + Debug {
    fn run(
        &self,
        snap: CommandSnapshot,
        updater: LatestOnlyUpdater,
        cancel: CancellationToken,
    ) -> CommandFuture;
}
