use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "leetharvest",
    version,
    about = "Harvest a LeetCode account's submission history"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Walk the full submission history and harvest every problem.
    Harvest {
        #[command(flatten)]
        credentials: CredentialArgs,

        /// Root data directory; a per-user folder is created inside it.
        #[arg(long, env = "LEETHARVEST_DATA_DIR", default_value = "data/raw")]
        data_dir: PathBuf,

        /// Upper bound on problems processed concurrently.
        #[arg(long, default_value_t = 25)]
        max_in_flight: usize,

        /// Page size for the history listing.
        #[arg(long, default_value_t = 20)]
        page_size: usize,

        /// Skip problems that already have an output file on disk.
        #[arg(long)]
        resume: bool,

        /// Automatic retry passes over whatever failed (0 disables).
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },

    /// Re-run only the problems recorded in failed_downloads.json.
    Retry {
        #[command(flatten)]
        credentials: CredentialArgs,

        /// Root data directory; a per-user folder is created inside it.
        #[arg(long, env = "LEETHARVEST_DATA_DIR", default_value = "data/raw")]
        data_dir: PathBuf,
    },

    /// Report what a user's harvest directory holds (no network).
    Status {
        /// Root data directory; a per-user folder is created inside it.
        #[arg(long, env = "LEETHARVEST_DATA_DIR", default_value = "data/raw")]
        data_dir: PathBuf,

        /// Username whose harvest directory to inspect.
        #[arg(long)]
        username: String,
    },
}

/// Session cookies lifted from a signed-in browser.
#[derive(Debug, Args)]
pub struct CredentialArgs {
    /// LEETCODE_SESSION cookie value.
    #[arg(long, env = "LEETCODE_SESSION", hide_env_values = true)]
    pub session: String,

    /// csrftoken cookie value.
    #[arg(long, env = "LEETCODE_CSRF_TOKEN", hide_env_values = true)]
    pub csrf_token: String,

    /// cf_clearance cookie value.
    #[arg(long, env = "CF_CLEARANCE", hide_env_values = true)]
    pub cf_clearance: String,
}
