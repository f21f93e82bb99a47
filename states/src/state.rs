use std::any::{Any, type_name};
use std::fmt::Debug;

/// A value stored in [`StateCtx`](crate::StateCtx), keyed by its concrete type.
///
/// States are only ever mutated by the context owner. Async commands see a
/// cloned snapshot and publish changes through a
/// [`LatestOnlyUpdater`](crate::LatestOnlyUpdater).
pub trait State: Any + Send + Debug {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Clone handed to commands through [`CommandSnapshot`](crate::CommandSnapshot).
    ///
    /// States that commands never read can keep the default and stay out of snapshots.
    fn snapshot(&self) -> Option<Box<dyn Any + Send>> {
        None
    }

    /// Replace `self` with a boxed value of the same type.
    fn assign_box(&mut self, new_self: Box<dyn Any + Send>);
}

/// Shared body for [`State::assign_box`].
pub fn state_assign_impl<T: State>(target: &mut T, new_self: Box<dyn Any + Send>) {
    match new_self.downcast::<T>() {
        Ok(value) => *target = *value,
        Err(_) => log::warn!(
            "Ignoring assignment with mismatched type for {}",
            type_name::<T>()
        ),
    }
}

/// Shared body for [`State::snapshot`] on `Clone` states.
pub fn state_snapshot_impl<T: State + Clone>(state: &T) -> Option<Box<dyn Any + Send>> {
    Some(Box::new(state.clone()))
}
