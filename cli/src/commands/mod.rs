//! Command implementations for the roster CLI.

pub mod list;
pub mod show;

pub use list::run_list;
pub use show::run_show;
