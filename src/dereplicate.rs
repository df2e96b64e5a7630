//src/dereplicate.rs

use ahash::{AHashMap, AHashSet};

use crate::types::{Assignment, MatchRecord, OtuRecord, ResolvedOtu};

/// Collapse the redundant match list to one assignment per OTU id.
///
/// Matches are stably sorted by normalized taxonomy (descending), then stably by OTU id
/// (ascending), and the first record of each id is kept. All matches of one OTU share
/// the same normalized taxonomy, so the winner is the earliest match in reference
/// order, not necessarily the most specific level.
///
/// The taxonomy of each winner is restored to the raw text of the input row with that id.
pub fn dereplicate<'a>(
    mut matches: Vec<MatchRecord<'a>>,
    otus: &'a [OtuRecord],
    taxonomy_index: usize,
) -> Vec<ResolvedOtu<'a>> {
    matches.sort_by(|a, b| b.otu.normalized_taxonomy.cmp(&a.otu.normalized_taxonomy));
    matches.sort_by(|a, b| a.otu.id().cmp(b.otu.id()));

    let raw_taxonomy = raw_taxonomy_by_id(otus, taxonomy_index);

    let mut seen: AHashSet<&str> = AHashSet::new();
    let mut resolved = Vec::new();
    for m in matches {
        if !seen.insert(m.otu.id()) {
            continue;
        }
        let taxonomy = raw_taxonomy
            .get(m.otu.id())
            .copied()
            .or_else(|| m.otu.cells.get(taxonomy_index).map(String::as_str))
            .unwrap_or_default()
            .to_string();
        resolved.push(ResolvedOtu {
            otu: m.otu,
            taxonomy,
            assignment: Assignment::Matched(m.reference),
        });
    }

    log::info!("Dereplicated to {} assigned OTUs", resolved.len());
    resolved
}

/// OTU id -> raw taxonomy text. A repeated id maps to its last row.
fn raw_taxonomy_by_id(otus: &[OtuRecord], taxonomy_index: usize) -> AHashMap<&str, &str> {
    let mut map = AHashMap::with_capacity(otus.len());
    for otu in otus {
        if let Some(taxonomy) = otu.cells.get(taxonomy_index) {
            map.insert(otu.id(), taxonomy.as_str());
        }
    }
    map
}

/// OTUs of `otus` with no entry in `resolved`, in input order, marked unassigned.
pub fn unmatched<'a>(
    otus: &'a [OtuRecord],
    resolved: &[ResolvedOtu<'a>],
    taxonomy_index: usize,
) -> Vec<ResolvedOtu<'a>> {
    let assigned: AHashSet<&str> = resolved.iter().map(|r| r.otu.id()).collect();
    otus.iter()
        .filter(|otu| !assigned.contains(otu.id()))
        .map(|otu| ResolvedOtu {
            otu,
            taxonomy: otu.cells.get(taxonomy_index).cloned().unwrap_or_default(),
            assignment: Assignment::Unassigned,
        })
        .collect()
}
