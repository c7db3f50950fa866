use chrono::{DateTime, FixedOffset, Local};
use clap::Parser;
use colored::*;
use snapz::api::SnapzApi;
use snapz::commands::{CmdMessage, CmdResult, DatasetSummary, MessageLevel, PropertySource, PropertyView};
use snapz::config::SnapzConfig;
use snapz::error::Result;
use snapz::exit::{codes, exit_code};
use snapz::lock::RunLock;
use snapz::runner::ZfsRunner;
use snapz::store::fs::FileStore;
use tracing::Level;

mod args;
use args::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            exit_code(&e)
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let config = SnapzConfig::load(cli.config.as_deref())?;
    let lock_file = config.lock_file.clone();
    let store = FileStore::new(config.state_file());
    let runner = ZfsRunner::new(config.zfs_path.clone());
    let mut api = SnapzApi::new(store, runner, config);

    let result = match cli.command {
        Commands::Discover => api.discover()?,
        Commands::Add { path, kind } => api.add_dataset(&path, kind)?,
        Commands::List => {
            let result = api.list()?;
            print_datasets(&result.listed);
            result
        }
        Commands::Get { path, property } => {
            let result = api.get_properties(&path, property.as_deref())?;
            print_properties(&result.properties);
            result
        }
        Commands::Set {
            path,
            assignments,
            dry_run,
        } => api.set_properties(&path, &assignments, dry_run)?,
        Commands::Inherit {
            path,
            property,
            dry_run,
        } => api.inherit_property(&path, &property, dry_run)?,
        Commands::Take { dry_run } => {
            let lock = RunLock::acquire(&lock_file)?;
            api.take(&lock, dry_run)?
        }
        Commands::Prune { dry_run } => {
            let lock = RunLock::acquire(&lock_file)?;
            api.prune(&lock, dry_run)?
        }
        Commands::Run { dry_run } => {
            let lock = RunLock::acquire(&lock_file)?;
            api.run(&lock, dry_run)?
        }
    };

    print_messages(&result.messages);
    Ok(status_of(&result))
}

fn status_of(result: &CmdResult) -> i32 {
    if result.has_failures() {
        codes::COMMAND_FAILED
    } else {
        codes::SUCCESS
    }
}

fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
            MessageLevel::Error => println!("{}", message.content.red()),
        }
    }
}

const PATH_WIDTH: usize = 32;
const TIME_WIDTH: usize = 16;

fn print_datasets(datasets: &[DatasetSummary]) {
    if datasets.is_empty() {
        println!("No datasets found.");
        return;
    }

    for dataset in datasets {
        let flags = format!(
            "{}{}{}",
            if dataset.enabled { "E" } else { "-" },
            if dataset.take { "T" } else { "-" },
            if dataset.prune { "P" } else { "-" },
        );
        let flags = if dataset.enabled {
            flags.green()
        } else {
            flags.dimmed()
        };
        let latest = match dataset.latest_snapshot {
            Some(ts) => format_time_ago(ts),
            None => format!("{:>width$}", "never", width = TIME_WIDTH),
        };

        println!(
            "{:<width$} {} {:<10} {:<5} {:>4} {}",
            dataset.path.bold(),
            flags,
            dataset.kind.to_string(),
            dataset.recursion.to_string(),
            dataset.snapshot_count,
            latest.dimmed(),
            width = PATH_WIDTH
        );
    }
}

fn print_properties(properties: &[PropertyView]) {
    let name_width = properties.iter().map(|p| p.name.len()).max().unwrap_or(0);
    for prop in properties {
        let source = match &prop.source {
            PropertySource::Local => "local".cyan(),
            PropertySource::Inherited(from) => format!("inherited from {}", from).normal(),
            PropertySource::Default => "default".dimmed(),
            PropertySource::Identity => "snapshot".yellow(),
        };
        println!(
            "{:<width$}  {}  {}",
            prop.name,
            prop.value.bold(),
            source,
            width = name_width
        );
    }
}

fn format_time_ago(timestamp: DateTime<FixedOffset>) -> String {
    let duration = Local::now().signed_duration_since(timestamp);

    let formatter = timeago::Formatter::new();
    let time_str = formatter.convert(duration.to_std().unwrap_or_default());

    format!("{:>width$}", time_str, width = TIME_WIDTH)
}
