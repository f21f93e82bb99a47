use std::any::{TypeId, type_name};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use flume::{Receiver, Sender};
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::updater::{Change, Update};
use crate::{Command, CommandSnapshot, Error, LatestOnlyUpdater, State, TaskHandle, TaskId};

/// Owner of all states and of the tasks spawned by commands.
///
/// The owner is the only writer: synchronous changes go through [`StateCtx::update`],
/// asynchronous ones are queued by commands and applied by [`StateCtx::sync_updates`].
pub struct StateCtx {
    states: BTreeMap<TypeId, Box<dyn State>>,
    commands: BTreeMap<TypeId, Arc<dyn Command>>,

    // Current generation per command type; updates tagged with an older one are dropped.
    generations: BTreeMap<TypeId, u64>,
    running: BTreeMap<TypeId, TaskHandle>,
    tasks: JoinSet<()>,
    spawned: HashMap<task::Id, TaskId>,

    send: Sender<Update>,
    recv: Receiver<Update>,
}

impl Default for StateCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCtx")
            .field("states", &self.states.len())
            .field("commands", &self.commands.len())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl StateCtx {
    pub fn new() -> Self {
        let (send, recv) = flume::unbounded();
        Self {
            states: BTreeMap::new(),
            commands: BTreeMap::new(),
            generations: BTreeMap::new(),
            running: BTreeMap::new(),
            tasks: JoinSet::new(),
            spawned: HashMap::new(),
            send,
            recv,
        }
    }

    pub fn add_state<T: State>(&mut self, state: T) {
        self.states.insert(TypeId::of::<T>(), Box::new(state));
    }

    pub fn record_command<C: Command>(&mut self, command: C) {
        self.commands.insert(TypeId::of::<C>(), Arc::new(command));
    }

    pub fn state<T: State>(&self) -> Result<&T, Error> {
        self.states
            .get(&TypeId::of::<T>())
            .and_then(|state| state.as_any().downcast_ref::<T>())
            .ok_or_else(|| Error::state_not_found(type_name::<T>(), "StateCtx::state"))
    }

    pub fn state_mut<T: State>(&mut self) -> Result<&mut T, Error> {
        self.states
            .get_mut(&TypeId::of::<T>())
            .and_then(|state| state.as_any_mut().downcast_mut::<T>())
            .ok_or_else(|| Error::state_not_found(type_name::<T>(), "StateCtx::state_mut"))
    }

    /// Apply a synchronous change immediately.
    pub fn update<T: State, R>(&mut self, f: impl FnOnce(&mut T) -> R) -> Result<R, Error> {
        self.state_mut::<T>().map(f)
    }

    /// Spawn command `C` right away.
    ///
    /// A still-running task of the same command is cancelled and superseded.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn dispatch<C: Command>(&mut self) -> Result<TaskId, Error> {
        let id = TypeId::of::<C>();
        let name = type_name::<C>();
        let command = self
            .commands
            .get(&id)
            .map(Arc::clone)
            .ok_or_else(|| Error::command_not_found(name, "StateCtx::dispatch"))?;

        let task = self.bump_generation(id);
        if let Some(previous) = self.running.remove(&id) {
            log::debug!(
                "Superseding {name} generation {} with {}",
                previous.id().generation(),
                task.generation()
            );
            previous.cancel();
        }

        let token = CancellationToken::new();
        let updater = LatestOnlyUpdater::new(self.send.clone(), task);
        let future = command.run(self.snapshot(), updater, token.clone());
        let handle = self.tasks.spawn(future);
        self.spawned.insert(handle.id(), task);
        self.running.insert(id, TaskHandle::new(task, token));

        log::debug!("Dispatched {name} generation {}", task.generation());
        Ok(task)
    }

    fn bump_generation(&mut self, id: TypeId) -> TaskId {
        let generation = self.generations.entry(id).or_insert(0);
        *generation += 1;
        TaskId::new(id, *generation)
    }

    /// Cancel the running task of command `C`, if any.
    ///
    /// Results it already queued are dropped as well. Returns whether a task was running.
    pub fn cancel<C: Command>(&mut self) -> bool {
        let id = TypeId::of::<C>();
        self.bump_generation(id);
        match self.running.remove(&id) {
            Some(handle) => {
                handle.cancel();
                log::debug!(
                    "Cancelled {} generation {}",
                    type_name::<C>(),
                    handle.id().generation()
                );
                true
            }
            None => false,
        }
    }

    /// Whether `task` is still the latest dispatch of its command.
    pub fn is_current(&self, task: TaskId) -> bool {
        self.generations.get(&task.command()) == Some(&task.generation())
    }

    /// Whether command `C` has a task that has not been joined yet.
    pub fn is_running<C: Command>(&self) -> bool {
        self.running.contains_key(&TypeId::of::<C>())
    }

    fn snapshot(&self) -> CommandSnapshot {
        let mut snap = CommandSnapshot::new();
        for (id, state) in &self.states {
            if let Some(cloned) = state.snapshot() {
                snap.insert_cloned(*id, cloned);
            }
        }
        snap
    }

    /// Apply every queued update, in the order it was sent. Returns how many were applied.
    pub fn sync_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.recv.try_recv() {
            if !self.is_current(update.origin) {
                log::warn!(
                    "Dropping stale update for {} from generation {}",
                    update.target_name,
                    update.origin.generation()
                );
                continue;
            }

            let Some(state) = self.states.get_mut(&update.target) else {
                log::error!("Update for unregistered state {}", update.target_name);
                continue;
            };

            match update.change {
                Change::Assign(value) => state.assign_box(value),
                Change::Mutate(f) => f(state.as_any_mut()),
            }
            applied += 1;
        }
        applied
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the next spawned task to end, whether it returned or panicked.
    /// `None` when nothing is running.
    pub async fn join_next(&mut self) -> Option<TaskId> {
        loop {
            let (id, failure) = match self.tasks.join_next_with_id().await? {
                Ok((id, ())) => (id, None),
                Err(err) => (err.id(), Some(err)),
            };
            let Some(task) = self.spawned.remove(&id) else {
                log::debug!("Joined task {id} that was never recorded");
                continue;
            };

            if let Some(err) = failure {
                log::error!(
                    "Command task generation {} failed: {err}",
                    task.generation()
                );
            }
            if self
                .running
                .get(&task.command())
                .is_some_and(|handle| handle.id() == task)
            {
                self.running.remove(&task.command());
            }
            return Some(task);
        }
    }

    /// Wait for all tasks, applying updates as they finish.
    pub async fn settle(&mut self) {
        self.sync_updates();
        while self.join_next().await.is_some() {
            self.sync_updates();
        }
        self.sync_updates();
    }

    /// Cancel every task and discard whatever they queued.
    pub async fn shutdown(&mut self) {
        let running = std::mem::take(&mut self.running);
        for (id, handle) in running {
            self.bump_generation(id);
            handle.cancel();
        }
        self.tasks.shutdown().await;
        self.spawned.clear();
        self.sync_updates();
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::time::Duration;

    use super::*;
    use crate::{CommandFuture, state_assign_impl, state_snapshot_impl};

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    struct Counter {
        value: u32,
        writes: u32,
    }

    impl State for Counter {
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

    /// Input read by commands from their snapshot.
    #[derive(Debug, Clone, Default)]
    struct Plan {
        value: u32,
        delay_ms: u64,
    }

    impl State for Plan {
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

    /// Sleeps, then writes `Plan::value`. Observes cancellation.
    #[derive(Debug)]
    struct WriteCommand;

    impl Command for WriteCommand {
        fn run(
            &self,
            snap: CommandSnapshot,
            updater: LatestOnlyUpdater,
            cancel: CancellationToken,
        ) -> CommandFuture {
            let plan = snap.state::<Plan>().cloned().unwrap_or_default();
            Box::pin(async move {
                tokio::select! {
                    () = cancel.cancelled() => {}
                    () = tokio::time::sleep(Duration::from_millis(plan.delay_ms)) => {
                        updater.update(move |c: &mut Counter| {
                            c.value = plan.value;
                            c.writes += 1;
                        });
                    }
                }
            })
        }
    }

    /// Same as `WriteCommand` but ignores its token.
    #[derive(Debug)]
    struct StubbornCommand;

    impl Command for StubbornCommand {
        fn run(
            &self,
            snap: CommandSnapshot,
            updater: LatestOnlyUpdater,
            _cancel: CancellationToken,
        ) -> CommandFuture {
            let plan = snap.state::<Plan>().cloned().unwrap_or_default();
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(plan.delay_ms)).await;
                updater.set(Counter {
                    value: plan.value,
                    writes: 1,
                });
            })
        }
    }

    /// Panics before reporting anything.
    #[derive(Debug)]
    struct PanickingCommand;

    impl Command for PanickingCommand {
        fn run(
            &self,
            _snap: CommandSnapshot,
            _updater: LatestOnlyUpdater,
            _cancel: CancellationToken,
        ) -> CommandFuture {
            Box::pin(async { panic!("command blew up") })
        }
    }

    fn ctx() -> StateCtx {
        let mut ctx = StateCtx::new();
        ctx.add_state(Counter::default());
        ctx.add_state(Plan::default());
        ctx.record_command(WriteCommand);
        ctx.record_command(StubbornCommand);
        ctx.record_command(PanickingCommand);
        ctx
    }

    fn set_plan(ctx: &mut StateCtx, value: u32, delay_ms: u64) {
        ctx.update(|p: &mut Plan| {
            p.value = value;
            p.delay_ms = delay_ms;
        })
        .unwrap();
    }

    #[test]
    fn sync_update_applies_immediately() {
        let mut ctx = ctx();
        ctx.update(|c: &mut Counter| c.value = 7).unwrap();
        assert_eq!(ctx.state::<Counter>().unwrap().value, 7);
    }

    #[tokio::test]
    async fn command_changes_wait_for_sync() {
        let mut ctx = ctx();
        set_plan(&mut ctx, 3, 0);
        let task = ctx.dispatch::<StubbornCommand>().unwrap();

        assert_eq!(ctx.join_next().await, Some(task));
        assert_eq!(ctx.state::<Counter>().unwrap().value, 0);

        assert_eq!(ctx.sync_updates(), 1);
        assert_eq!(ctx.state::<Counter>().unwrap().value, 3);
    }

    #[test]
    fn missing_state_is_reported() {
        let ctx = StateCtx::new();
        assert!(matches!(
            ctx.state::<Counter>(),
            Err(Error::StateNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn unrecorded_command_is_reported() {
        let mut ctx = StateCtx::new();
        assert!(matches!(
            ctx.dispatch::<WriteCommand>(),
            Err(Error::CommandNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn command_result_is_applied_after_settle() {
        let mut ctx = ctx();
        set_plan(&mut ctx, 5, 1);

        ctx.dispatch::<WriteCommand>().unwrap();
        assert!(ctx.is_running::<WriteCommand>());
        ctx.settle().await;

        assert_eq!(
            ctx.state::<Counter>().unwrap(),
            &Counter {
                value: 5,
                writes: 1
            }
        );
        assert_eq!(ctx.task_count(), 0);
        assert!(!ctx.is_running::<WriteCommand>());
    }

    #[tokio::test]
    async fn new_dispatch_supersedes_running_task() {
        let mut ctx = ctx();
        set_plan(&mut ctx, 1, 50);
        let first = ctx.dispatch::<WriteCommand>().unwrap();
        set_plan(&mut ctx, 2, 1);
        let second = ctx.dispatch::<WriteCommand>().unwrap();

        assert!(!ctx.is_current(first));
        assert!(ctx.is_current(second));

        ctx.settle().await;
        assert_eq!(
            ctx.state::<Counter>().unwrap(),
            &Counter {
                value: 2,
                writes: 1
            }
        );
    }

    #[tokio::test]
    async fn late_result_of_superseded_task_is_dropped() {
        let mut ctx = ctx();
        set_plan(&mut ctx, 1, 40);
        ctx.dispatch::<StubbornCommand>().unwrap();
        set_plan(&mut ctx, 2, 1);
        ctx.dispatch::<StubbornCommand>().unwrap();

        ctx.settle().await;
        assert_eq!(ctx.state::<Counter>().unwrap().value, 2);
    }

    #[tokio::test]
    async fn cancel_discards_result_even_if_ignored() {
        let mut ctx = ctx();
        set_plan(&mut ctx, 9, 10);
        ctx.dispatch::<StubbornCommand>().unwrap();

        assert!(ctx.cancel::<StubbornCommand>());
        assert!(!ctx.cancel::<StubbornCommand>());

        ctx.settle().await;
        assert_eq!(ctx.state::<Counter>().unwrap().value, 0);
    }

    #[tokio::test]
    async fn shutdown_stops_everything() {
        let mut ctx = ctx();
        set_plan(&mut ctx, 4, 1_000);
        ctx.dispatch::<WriteCommand>().unwrap();
        ctx.shutdown().await;

        assert_eq!(ctx.task_count(), 0);
        assert_eq!(ctx.state::<Counter>().unwrap().value, 0);
    }

    #[tokio::test]
    async fn panicked_task_is_joined_and_leaves_running() {
        let mut ctx = ctx();
        let task = ctx.dispatch::<PanickingCommand>().unwrap();
        assert!(ctx.is_running::<PanickingCommand>());

        assert_eq!(ctx.join_next().await, Some(task));
        assert!(!ctx.is_running::<PanickingCommand>());
        assert_eq!(ctx.task_count(), 0);
        assert!(ctx.join_next().await.is_none());
    }

    #[tokio::test]
    async fn finished_superseded_task_keeps_newer_one_running() {
        let mut ctx = ctx();
        set_plan(&mut ctx, 1, 0);
        let first = ctx.dispatch::<StubbornCommand>().unwrap();
        set_plan(&mut ctx, 2, 1_000);
        let second = ctx.dispatch::<StubbornCommand>().unwrap();

        assert_eq!(ctx.join_next().await, Some(first));
        assert!(ctx.is_running::<StubbornCommand>());
        assert!(ctx.is_current(second));
        ctx.shutdown().await;
    }
}
