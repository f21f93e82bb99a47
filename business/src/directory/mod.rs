//! User Directory Store.

mod commands;
mod state;
mod store;

pub use commands::{LoadAllUsersCommand, LoadUserByIdCommand, LoadUserByIdInput, UserSourceState};
pub use state::{DirectoryState, LOAD_USER_ERROR, LOAD_USERS_ERROR, LoadKind, LoadStatus};
pub use store::DirectoryStore;
