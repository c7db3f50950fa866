use clap::{ArgAction, Parser, Subcommand};
use snapz::model::RecordKind;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "snapz", version = env!("SNAPZ_VERSION"))]
#[command(about = "Inheritable snapshot policies for ZFS datasets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Read settings from this TOML file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record the pools, filesystems and volumes reported by zfs
    Discover,

    /// Register a dataset by hand
    Add {
        /// Dataset path (e.g. tank/home)
        path: String,

        /// pool, filesystem or volume
        kind: RecordKind,
    },

    /// List datasets with their effective snapshot settings
    #[command(alias = "ls")]
    List,

    /// Show the properties of a record
    Get {
        /// Record path (e.g. tank/home or tank/home@snap)
        path: String,

        /// Only this property
        property: Option<String>,
    },

    /// Set properties locally on a record
    Set {
        path: String,

        /// Assignments (e.g. snapshot:enabled=true)
        #[arg(required = true, num_args = 1..)]
        assignments: Vec<String>,

        /// Show the changes without saving them
        #[arg(long)]
        dry_run: bool,
    },

    /// Drop a local value and inherit the parent's again
    Inherit {
        path: String,

        property: String,

        /// Show the change without saving it
        #[arg(long)]
        dry_run: bool,
    },

    /// Take every snapshot that is due
    Take {
        /// Log the zfs commands instead of running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Destroy snapshots beyond their retention
    Prune {
        /// Log the zfs commands instead of running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Take, then prune
    Run {
        /// Log the zfs commands instead of running them
        #[arg(long)]
        dry_run: bool,
    },
}
