//src/assemble.rs

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::OutputEncoding;
use crate::error::{GuildError, Result};
use crate::types::{OtuRecord, OtuTable, ResolvedOtu};

/// The three output tables, all sharing one extended header.
#[derive(Debug, Clone, Default)]
pub struct GuildTables {
    pub header: Vec<String>,
    /// Assigned OTUs, by total abundance descending.
    pub matched: Vec<Vec<String>>,
    /// Unassigned OTUs, in input order.
    pub unmatched: Vec<Vec<String>>,
    /// Both sets, by total abundance descending.
    pub combined: Vec<Vec<String>>,
}

/// Rows written and rows that needed the ASCII fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub rows: usize,
    pub fallback_rows: usize,
}

/// Sum of the abundance cells, i.e. every column between the id and the taxonomy column.
pub fn total_abundance(otu: &OtuRecord, header: &[String], taxonomy_index: usize) -> Result<f64> {
    let cells = otu.cells.get(1..taxonomy_index).unwrap_or(&[]);
    let mut total = 0.0;
    for (offset, cell) in cells.iter().enumerate() {
        let value: f64 = cell
            .trim()
            .parse()
            .map_err(|_| GuildError::NonNumericAbundance {
                otu_id: otu.id().to_string(),
                column: header.get(offset + 1).cloned().unwrap_or_default(),
                value: cell.clone(),
            })?;
        total += value;
    }
    Ok(total)
}

/// Stable sort by total abundance, largest first.
pub fn sort_by_abundance<'a>(
    rows: Vec<ResolvedOtu<'a>>,
    header: &[String],
    taxonomy_index: usize,
) -> Result<Vec<ResolvedOtu<'a>>> {
    let mut keyed = rows
        .into_iter()
        .map(|r| -> Result<(f64, ResolvedOtu<'a>)> {
            Ok((total_abundance(r.otu, header, taxonomy_index)?, r))
        })
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
    Ok(keyed.into_iter().map(|(_, r)| r).collect())
}

/// Build the matched, unmatched and combined tables.
pub fn assemble_tables(
    table: &OtuTable,
    matched: Vec<ResolvedOtu>,
    unmatched: Vec<ResolvedOtu>,
) -> Result<GuildTables> {
    let header = table.extended_header();
    let input_width = table.header.len();
    let tax = table.taxonomy_index;
    let to_rows = |rows: &[ResolvedOtu]| -> Vec<Vec<String>> {
        rows.iter().map(|r| r.to_row(tax, input_width)).collect()
    };

    let matched = sort_by_abundance(matched, &table.header, tax)?;

    let mut combined = matched.clone();
    combined.extend(unmatched.iter().cloned());
    let combined = sort_by_abundance(combined, &table.header, tax)?;

    Ok(GuildTables {
        matched: to_rows(&matched),
        unmatched: to_rows(&unmatched),
        combined: to_rows(&combined),
        header,
    })
}

/// Tab-join a row. With `OutputEncoding::Ascii`, a row holding non-ASCII text drops its
/// last column and any remaining non-ASCII character becomes `?`. Returns whether the
/// fallback was used.
pub fn format_row(row: &[String], encoding: OutputEncoding) -> (String, bool) {
    let line = row.join("\t");
    if encoding == OutputEncoding::Utf8 || line.is_ascii() {
        return (line, false);
    }

    let kept = &row[..row.len().saturating_sub(1)];
    let line = kept
        .join("\t")
        .chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect();
    (line, true)
}

/// Write a header and rows as tab-delimited text, one row per line.
pub fn write_table<W: Write>(
    mut out: W,
    header: &[String],
    rows: &[Vec<String>],
    encoding: OutputEncoding,
) -> Result<WriteReport> {
    let mut report = WriteReport::default();

    let (line, _) = format_row(header, encoding);
    writeln!(out, "{line}")?;

    for row in rows {
        let (line, fallback) = format_row(row, encoding);
        if fallback {
            log::warn!(
                "Row '{}' has characters outside ASCII; written without its last column",
                row.first().map(String::as_str).unwrap_or_default()
            );
            report.fallback_rows += 1;
        }
        writeln!(out, "{line}")?;
        report.rows += 1;
    }
    out.flush()?;
    Ok(report)
}

/// Write a table to `path`, replacing any existing file.
pub fn write_table_file<P: AsRef<Path>>(
    path: P,
    header: &[String],
    rows: &[Vec<String>],
    encoding: OutputEncoding,
) -> Result<WriteReport> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| GuildError::from(e).with_path(path))?;
    let report = write_table(BufWriter::new(file), header, rows, encoding)
        .map_err(|e| e.with_path(path))?;
    log::info!("Wrote {} rows to {}", report.rows, path.display());
    Ok(report)
}

/// Render a table in memory.
pub fn table_text(header: &[String], rows: &[Vec<String>], encoding: OutputEncoding) -> String {
    let mut output = String::new();
    for row in std::iter::once(header).chain(rows.iter().map(Vec::as_slice)) {
        output.push_str(&format_row(row, encoding).0);
        output.push('\n');
    }
    output
}
