//src/otu_table.rs

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{GuildError, Result};
use crate::taxonomy::normalize_taxonomy;
use crate::types::{OtuRecord, OtuTable};

/// Delimiters tried when sniffing, in order of preference.
pub const DELIMITER_CANDIDATES: [u8; 5] = [b'\t', b',', b';', b'|', b' '];

/// Header names accepted for the taxonomy column, in order of preference.
pub const TAXONOMY_HEADERS: [&str; 2] = ["taxonomy", "Taxonomy"];

const SNIFF_LINES: usize = 20;

/// Open a table for reading, transparently decompressing `.gz` files.
fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let f = File::open(path).map_err(|e| GuildError::from(e).with_path(path))?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Pick the first candidate that occurs the same non-zero number of times on every sampled line.
/// Falls back to tab.
pub fn sniff_delimiter(lines: &[&str]) -> u8 {
    let sample: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    if sample.is_empty() {
        return b'\t';
    }

    DELIMITER_CANDIDATES
        .iter()
        .copied()
        .find(|&delim| {
            let count = |line: &str| line.bytes().filter(|&b| b == delim).count();
            let first = count(sample[0]);
            first > 0 && sample.iter().all(|line| count(line) == first)
        })
        .unwrap_or(b'\t')
}

/// Locate the taxonomy column; `taxonomy` is preferred over `Taxonomy`.
pub fn find_taxonomy_column(header: &[String]) -> Option<usize> {
    TAXONOMY_HEADERS
        .iter()
        .find_map(|name| header.iter().position(|h| h == name))
}

/// Parse OTU table text. `source` is only used in error messages.
pub fn parse_otu_table(text: &str, delimiter: Option<u8>, source: &Path) -> Result<OtuTable> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .collect();

    let Some(header_line) = lines.first().filter(|l| !l.trim().is_empty()) else {
        return Err(GuildError::EmptyTable {
            path: source.to_path_buf(),
        });
    };

    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(&lines)) as char;
    log::debug!("Using delimiter {:?} for {}", delimiter, source.display());

    let header: Vec<String> = header_line.split(delimiter).map(str::to_string).collect();
    let taxonomy_index =
        find_taxonomy_column(&header).ok_or_else(|| GuildError::MissingTaxonomyColumn {
            path: source.to_path_buf(),
        })?;

    let mut records = Vec::with_capacity(lines.len().saturating_sub(1));
    for (i, line) in lines.iter().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<String> = line.split(delimiter).map(str::to_string).collect();
        let Some(taxonomy) = cells.get(taxonomy_index) else {
            return Err(GuildError::MalformedRow {
                line: i + 1,
                columns: cells.len(),
                needed: taxonomy_index + 1,
            });
        };
        let normalized_taxonomy = normalize_taxonomy(taxonomy);
        records.push(OtuRecord {
            cells,
            normalized_taxonomy,
        });
    }

    log::info!(
        "Read {} OTUs from {} (taxonomy column '{}')",
        records.len(),
        source.display(),
        header[taxonomy_index]
    );

    Ok(OtuTable {
        header,
        taxonomy_index,
        records,
    })
}

/// Read an OTU table from disk (plain or gzip-compressed).
pub fn read_otu_table<P: AsRef<Path>>(path: P, delimiter: Option<u8>) -> Result<OtuTable> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|e| GuildError::from(e).with_path(path))?;
    parse_otu_table(&text, delimiter, path)
}
