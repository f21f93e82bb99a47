use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Browse the user directory", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Base URL of the users API (overrides ROSTER_API_BASE_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Show timing/latency information
    #[arg(long, global = true)]
    pub timing: bool,

    /// Enable verbose debug output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List users, optionally filtered by name or email
    List {
        /// Case-insensitive text matched against name and email
        #[arg(long, short = 's')]
        search: Option<String>,

        /// Number of pages to show
        #[arg(long, short = 'p', default_value_t = 1)]
        pages: usize,

        /// Users per page (overrides ROSTER_PAGE_SIZE)
        #[arg(long)]
        page_size: Option<usize>,

        /// Go back to the first page when the search changes
        #[arg(long)]
        reset_page_on_search: bool,
    },
    /// Show one user's details
    Show {
        /// User ID
        id: u64,
    },
}
