//! User directory: data source adapter, directory store and list view.

mod api;
mod config;
mod directory;
mod http;
mod model;
mod view;

pub use api::{FetchError, FetchResult, HttpUserSource, UserSource};
pub use config::{
    ConfigError, DEFAULT_API_BASE_URL, DEFAULT_PAGE_SIZE, DirectoryConfig, ENV_PREFIX,
};
pub use directory::{
    DirectoryState, DirectoryStore, LOAD_USER_ERROR, LOAD_USERS_ERROR, LoadAllUsersCommand,
    LoadKind, LoadStatus, LoadUserByIdCommand, LoadUserByIdInput, UserSourceState,
};
pub use http::{Client, HttpError, HttpResult, RequestBuilder, Response};
pub use model::{Address, Company, User, UserId};
pub use view::{LoadMoreGuard, SearchPagePolicy, UserListView};
