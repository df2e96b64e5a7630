use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use funguild_rs::config::{Database, GuildConfig, MatchStrategy, OutputEncoding};
use funguild_rs::run_guilds;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DatabaseArg {
    Fungi,
    Nematode,
}

impl From<DatabaseArg> for Database {
    fn from(arg: DatabaseArg) -> Self {
        match arg {
            DatabaseArg::Fungi => Database::Fungi,
            DatabaseArg::Nematode => Database::Nematode,
        }
    }
}

/// Assign ecological guilds to the OTUs of an OTU table.
///
/// The table needs a header line with a column named 'taxonomy' (or 'Taxonomy').
/// The combined result is written next to the input as <name>.guilds.txt and is sorted
/// by total OTU abundance. Existing output files are overwritten.
#[derive(Parser, Debug)]
#[command(name = "funguild-rs", version, about)]
struct Cli {
    /// Path of the OTU table (tab or comma delimited preferred, .gz accepted)
    #[arg(short = 'o', long = "otu")]
    otu: PathBuf,

    /// Reference database to use
    #[arg(long = "db", value_enum, default_value = "fungi")]
    db: DatabaseArg,

    /// Also write a table with only the OTUs that were assigned a function
    #[arg(short, long)]
    matched: bool,

    /// Also write a table with only the OTUs that could not be assigned
    #[arg(short, long)]
    unmatched: bool,

    /// Column delimiter of the OTU table (detected when omitted)
    #[arg(long)]
    delimiter: Option<char>,

    /// Read the reference database from a saved file instead of downloading it
    #[arg(long = "db-file")]
    db_file: Option<PathBuf>,

    /// Use the token index instead of testing every reference/OTU pair
    #[arg(long)]
    indexed: bool,

    /// Write ASCII only; rows with other characters lose their last column
    #[arg(long)]
    ascii: bool,
}

impl Cli {
    fn into_config(self) -> Result<GuildConfig, String> {
        let delimiter = match self.delimiter {
            Some(c) if c.is_ascii() => Some(c as u8),
            Some(c) => return Err(format!("Delimiter must be an ASCII character, got {c:?}")),
            None => None,
        };
        Ok(GuildConfig {
            otu_table_path: self.otu,
            database: self.db.into(),
            emit_matched_only: self.matched,
            emit_unmatched_only: self.unmatched,
            delimiter,
            database_file: self.db_file,
            strategy: if self.indexed {
                MatchStrategy::Indexed
            } else {
                MatchStrategy::Exhaustive
            },
            encoding: if self.ascii {
                OutputEncoding::Ascii
            } else {
                OutputEncoding::Utf8
            },
        })
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let start = Instant::now();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    // 1. Progress bar fed by the matcher's decile callback
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
            .expect("Invalid progress template")
            .progress_chars("=>-"),
    );
    bar.set_message(format!("Searching the {} database...", config.database));
    let mut on_progress = |pct: u32| bar.set_position(u64::from(pct));

    let outcome = match run_guilds(&config, Some(&mut on_progress)) {
        Ok(outcome) => outcome,
        Err(err) => {
            bar.abandon_with_message("Failed");
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    bar.finish_with_message("Search finished.");

    // 2. Report
    let summary = outcome.results.summary;

    println!(
        "Found {} matching taxonomy records in the database.",
        summary.redundant_matches
    );
    println!(
        "Tried to assign function to {} OTUs in '{}'.",
        summary.otus,
        config.otu_table_path.display()
    );
    println!("Made assignments on {} OTUs.", summary.matched);
    println!("Result saved to '{}'", outcome.paths.combined.display());

    if config.emit_matched_only || config.emit_unmatched_only {
        println!("\nAdditional output:");
        if config.emit_matched_only {
            println!(
                "{} assigned OTUs have been saved to {}.",
                summary.matched,
                outcome.paths.matched.display()
            );
        }
        if config.emit_unmatched_only {
            println!(
                "{} OTUs were unassigned, these are saved to {}.",
                summary.unmatched,
                outcome.paths.unmatched.display()
            );
        }
    }
    if summary.incomplete_references > 0 {
        println!(
            "{} reference records were incomplete and used with partial data.",
            summary.incomplete_references
        );
    }
    if summary.fallback_rows > 0 {
        println!(
            "{} rows contained non-ASCII text and were written without their last column.",
            summary.fallback_rows
        );
    }

    println!(
        "\nTotal calculating time: {:.2} seconds.",
        start.elapsed().as_secs_f64()
    );
    ExitCode::SUCCESS
}
