use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI arguments for convprefs
#[derive(Parser, Debug)]
#[command(name = "convprefs")]
#[command(about = "Inspect and edit a stored preference set from the command line")]
pub struct Cli {
    /// Path to the preference storage file
    #[arg(short, long, default_value = "preferences.json")]
    pub file: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the resolved preference set after defaults and migrations
    Show {
        /// Glob patterns to filter keys (OR logic), e.g. "hide_*"
        #[arg(short, long)]
        query: Vec<String>,

        /// Output a JSON array of {key, value} entries instead of an object
        #[arg(long)]
        array: bool,
    },

    /// Print a single preference value in raw form
    Get {
        /// Preference key
        key: String,
    },

    /// Set a preference and persist the full set
    Set {
        /// Preference key
        key: String,

        /// Value, parsed as a JSON scalar (true, 5, "text") or taken as a bare string
        value: String,
    },

    /// Restore a preference to its compiled-in default
    Reset {
        /// Preference key
        key: String,
    },

    /// Load the stored set, apply outstanding migrations, and persist it
    Migrate,
}
