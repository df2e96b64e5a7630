//src/config.rs

use std::fmt;
use std::path::{Path, PathBuf};

/// Which reference trait database to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Database {
    #[default]
    Fungi,
    Nematode,
}

impl Database {
    pub fn url(&self) -> &'static str {
        match self {
            Database::Fungi => "http://www.stbates.org/funguild_db_2.php",
            Database::Nematode => "http://www.stbates.org/nemaguild_db.php",
        }
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Database::Fungi => write!(f, "FUNGuild"),
            Database::Nematode => write!(f, "NEMAGuild"),
        }
    }
}

/// How reference records are paired with OTUs. Both give identical output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Test every (reference, OTU) pair.
    #[default]
    Exhaustive,
    /// Look up the token runs of each OTU in a map of reference taxa.
    Indexed,
}

/// Text encoding of the written tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputEncoding {
    #[default]
    Utf8,
    /// Rows with non-ASCII text fall back to a truncated, ASCII-only column set.
    Ascii,
}

/// Everything a run needs. Passed explicitly into `run_guilds`.
#[derive(Debug, Clone, Default)]
pub struct GuildConfig {
    pub otu_table_path: PathBuf,
    pub database: Database,
    pub emit_matched_only: bool,
    pub emit_unmatched_only: bool,
    /// Column delimiter of the OTU table; sniffed from the file when `None`.
    pub delimiter: Option<u8>,
    /// Read the reference payload from this file instead of fetching it.
    pub database_file: Option<PathBuf>,
    pub strategy: MatchStrategy,
    pub encoding: OutputEncoding,
}

impl GuildConfig {
    pub fn new<P: Into<PathBuf>>(otu_table_path: P) -> Self {
        Self {
            otu_table_path: otu_table_path.into(),
            ..Default::default()
        }
    }
}

/// Paths of the three output tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub combined: PathBuf,
    pub matched: PathBuf,
    pub unmatched: PathBuf,
}

impl OutputPaths {
    /// `otus.txt` -> `otus.guilds.txt`, `otus.guilds_matched.txt`, `otus.guilds_unmatched.txt`.
    /// Only the last extension of the file name is dropped; directories are left alone.
    pub fn derive(otu_table_path: &Path) -> Self {
        let base = otu_table_path.with_extension("");
        let with_suffix = |suffix: &str| {
            let mut name = base.file_name().unwrap_or_default().to_os_string();
            name.push(suffix);
            base.with_file_name(name)
        };
        Self {
            combined: with_suffix(".guilds.txt"),
            matched: with_suffix(".guilds_matched.txt"),
            unmatched: with_suffix(".guilds_unmatched.txt"),
        }
    }
}
