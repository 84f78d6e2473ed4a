use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Port authority dashboard in the terminal")]
pub struct Cli {
    /// Path to the dashboard data file
    #[clap(long, global = true)]
    pub data: Option<PathBuf>,

    /// Show debug logging (RUST_LOG takes precedence)
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the records of a configured view
    List {
        /// View name, see `portboard views`
        view: String,

        /// Free-text search across the view's searchable fields
        #[clap(long, short = 'q')]
        query: Option<String>,

        /// Categorical filter as field=value (repeatable, "all" means no constraint)
        #[clap(long = "filter", short = 'f')]
        filters: Vec<String>,

        /// Sort key as field[:date|number|text], overrides the view default
        #[clap(long)]
        sort: Option<String>,

        /// Sort ascending instead of descending
        #[clap(long)]
        asc: bool,

        /// User id or username, needed for restricted collections
        #[clap(long, short = 'u')]
        user: Option<String>,
    },

    /// Registered correspondence (requires registry access)
    Registry {
        /// Search by subject, reference, sender, division or registrar
        #[clap(long, short = 'q')]
        query: Option<String>,

        /// Status filter (pending, in-progress, completed, archived or all)
        #[clap(long, default_value = "all")]
        status: String,

        /// Priority filter (urgent, high, medium, low or all)
        #[clap(long, default_value = "all")]
        priority: String,

        /// User id or username to act as; prompts when omitted
        #[clap(long, short = 'u')]
        user: Option<String>,

        /// Refresh correspondence from this file before listing
        #[clap(long)]
        sync_from: Option<PathBuf>,

        /// Keep refining the search at a prompt after the first listing
        #[clap(long, short = 'i')]
        interactive: bool,
    },

    /// Summary tiles over the full catalog of a view
    Summary {
        view: String,

        /// Categorical field to break down (defaults to the view's first)
        #[clap(long)]
        field: Option<String>,

        /// Only report the share of this category of --field
        #[clap(long)]
        value: Option<String>,

        /// Numeric field to average
        #[clap(long)]
        average: Option<String>,

        /// User id or username, needed for restricted collections
        #[clap(long, short = 'u')]
        user: Option<String>,
    },

    /// Check a correspondence feed: refresh from a JSON or YAML file and
    /// report the result (the data file is left unchanged)
    Sync {
        /// File holding a list of correspondence records
        #[clap(long)]
        from: PathBuf,

        /// Number of attempts (defaults to the configured retry policy)
        #[clap(long)]
        attempts: Option<u32>,
    },

    /// Show the capabilities of a user
    Whoami {
        /// User id or username
        #[clap(long, short = 'u')]
        user: Option<String>,
    },

    /// Show a correspondence in detail (requires registry access)
    Show {
        /// Correspondence id
        id: String,

        /// User id or username; prompts when omitted
        #[clap(long, short = 'u')]
        user: Option<String>,
    },

    /// List configured views and available collections
    Views,
}
