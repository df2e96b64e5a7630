// src/lib.rs
pub mod assemble;
pub mod config;
pub mod dereplicate;
pub mod error;
pub mod guilddb;
pub mod matcher;
pub mod otu_table;
pub mod taxonomy;
pub mod types;

use std::path::PathBuf;

use crate::assemble::{assemble_tables, table_text, write_table_file, GuildTables};
use crate::config::{GuildConfig, MatchStrategy, OutputEncoding, OutputPaths};
use crate::dereplicate::{dereplicate, unmatched};
use crate::guilddb::{load_reference_database, ReferenceDatabase};
use crate::matcher::match_otus;
use crate::otu_table::read_otu_table;
use crate::types::OtuTable;

pub use crate::error::{GuildError, Result};

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// OTUs in the input table
    pub otus: usize,
    /// (reference, OTU) hits before dereplication
    pub redundant_matches: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Reference records kept with partial data
    pub incomplete_references: usize,
    /// Rows of the combined table written through the ASCII fallback. Set by `run_guilds`
    /// from the write report; always 0 after `assign_guilds` alone.
    pub fallback_rows: usize,
}

/// Assignment results. Text is generated on demand from the structured tables.
pub struct GuildResults {
    pub tables: GuildTables,
    pub summary: RunSummary,
    pub encoding: OutputEncoding,
}

impl GuildResults {
    /// Matched and unmatched OTUs together, by abundance.
    pub fn get_combined_text(&self) -> String {
        table_text(&self.tables.header, &self.tables.combined, self.encoding)
    }

    pub fn get_matched_text(&self) -> String {
        table_text(&self.tables.header, &self.tables.matched, self.encoding)
    }

    pub fn get_unmatched_text(&self) -> String {
        table_text(&self.tables.header, &self.tables.unmatched, self.encoding)
    }
}

/// Match, dereplicate and assemble an in-memory OTU table against a shaped reference database.
pub fn assign_guilds(
    table: &OtuTable,
    references: &ReferenceDatabase,
    strategy: MatchStrategy,
    encoding: OutputEncoding,
    progress: Option<&mut dyn FnMut(u32)>,
) -> Result<GuildResults> {
    // 1. Pair every reference taxon with the OTUs whose lineage contains it
    let matches = match_otus(strategy, &references.records, &table.records, progress);
    let redundant_matches = matches.len();

    // 2. One assignment per OTU id
    let resolved = dereplicate(matches, &table.records, table.taxonomy_index);
    let missing = unmatched(&table.records, &resolved, table.taxonomy_index);

    let summary = RunSummary {
        otus: table.records.len(),
        redundant_matches,
        matched: resolved.len(),
        unmatched: missing.len(),
        incomplete_references: references.incomplete_records,
        fallback_rows: 0,
    };

    // 3. Sort and lay out the output tables
    let tables = assemble_tables(table, resolved, missing)?;

    Ok(GuildResults {
        tables,
        summary,
        encoding,
    })
}

/// Results of `run_guilds` and the files it wrote.
pub struct RunOutcome {
    pub results: GuildResults,
    pub paths: OutputPaths,
    pub written: Vec<PathBuf>,
}

/// Full run: read the OTU table, load the reference database, assign guilds and write
/// the combined table plus any requested matched/unmatched tables. Existing files are replaced.
pub fn run_guilds(
    config: &GuildConfig,
    progress: Option<&mut dyn FnMut(u32)>,
) -> Result<RunOutcome> {
    let table = read_otu_table(&config.otu_table_path, config.delimiter)?;
    let references =
        load_reference_database(config.database, config.database_file.as_deref())?;

    let mut results = assign_guilds(
        &table,
        &references,
        config.strategy,
        config.encoding,
        progress,
    )?;

    let paths = OutputPaths::derive(&config.otu_table_path);
    let tables = &results.tables;
    let mut written = Vec::new();

    if config.emit_matched_only {
        write_table_file(&paths.matched, &tables.header, &tables.matched, config.encoding)?;
        written.push(paths.matched.clone());
    }
    if config.emit_unmatched_only {
        write_table_file(&paths.unmatched, &tables.header, &tables.unmatched, config.encoding)?;
        written.push(paths.unmatched.clone());
    }
    let report =
        write_table_file(&paths.combined, &tables.header, &tables.combined, config.encoding)?;
    written.push(paths.combined.clone());
    results.summary.fallback_rows = report.fallback_rows;

    log::info!(
        "Assigned functions to {} of {} OTUs in '{}'",
        results.summary.matched,
        results.summary.otus,
        config.otu_table_path.display()
    );

    Ok(RunOutcome {
        results,
        paths,
        written,
    })
}
