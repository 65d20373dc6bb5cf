//! Command-line interface definitions for News Harvest.
//!
//! Every option can also be supplied through an environment variable.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for one harvesting run.
///
/// # Examples
///
/// ```sh
/// # Harvest every configured source
/// news_harvest -c ./config/spiders -s ./data/news.jsonl
///
/// # Only two sources, for a site with an expired certificate
/// news_harvest --only campus --only notices --accept-invalid-certs
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory containing spider definition files (.json, .yaml, .yml)
    #[arg(short, long, env = "HARVEST_CONFIG_DIR", default_value = "config/spiders")]
    pub config_dir: PathBuf,

    /// JSON-lines file that stores harvested records
    #[arg(short, long, env = "HARVEST_STORE", default_value = "data/news.jsonl")]
    pub store: PathBuf,

    /// Only harvest these source keys (repeatable)
    #[arg(long = "only", value_name = "SUB")]
    pub only: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "HARVEST_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Skip TLS certificate validation (for legacy sources)
    #[arg(long, env = "HARVEST_ACCEPT_INVALID_CERTS")]
    pub accept_invalid_certs: bool,
}

impl Cli {
    /// Whether the source `sub` is selected for this run.
    pub fn wants(&self, sub: &str) -> bool {
        self.only.is_empty() || self.only.iter().any(|s| s == sub)
    }
}
