//src/matcher.rs

use ahash::{AHashMap, AHashSet};

use crate::config::MatchStrategy;
use crate::taxonomy::{join_words, search_term};
use crate::types::{MatchRecord, OtuRecord, ReferenceRecord, MARKER};

/// Positions (1-based count of processed items) at which progress is reported.
fn decile_waypoints(total: usize) -> Vec<usize> {
    (1..=10).map(|x| total * x / 10).collect()
}

/// Calls `progress` with the rounded percentage whenever `processed` hits a decile boundary.
fn report_progress(
    progress: &mut Option<&mut dyn FnMut(u32)>,
    waypoints: &[usize],
    processed: usize,
    total: usize,
) {
    if let Some(callback) = progress.as_mut() {
        if waypoints.contains(&processed) {
            callback((processed as f64 / total as f64 * 100.0).round() as u32);
        }
    }
}

/// Test every reference record against every OTU, reference-major.
///
/// Each hit pairs the OTU with the reference record whose `@taxon@` term occurs in the
/// OTU's normalized taxonomy. `progress` receives the percentage of reference
/// records processed at each decile.
pub fn find_matches<'a>(
    references: &'a [ReferenceRecord],
    otus: &'a [OtuRecord],
    mut progress: Option<&mut dyn FnMut(u32)>,
) -> Vec<MatchRecord<'a>> {
    let total = references.len();
    let waypoints = decile_waypoints(total);
    let mut matches = Vec::new();

    for (i, reference) in references.iter().enumerate() {
        report_progress(&mut progress, &waypoints, i + 1, total);

        let Some(taxon) = reference.match_key() else {
            continue;
        };
        let term = search_term(taxon);

        for otu in otus {
            if otu.normalized_taxonomy.contains(&term) {
                matches.push(MatchRecord { otu, reference });
            }
        }
    }

    log::info!("Found {} matching taxonomy records", matches.len());
    matches
}

/// Map from marker-joined taxon to the reference records carrying it.
pub struct ReferenceIndex {
    by_taxon: AHashMap<String, Vec<usize>>,
    /// Largest number of marker-separated words in any indexed taxon.
    max_words: usize,
}

impl ReferenceIndex {
    pub fn build(references: &[ReferenceRecord]) -> Self {
        let mut by_taxon: AHashMap<String, Vec<usize>> = AHashMap::new();
        let mut max_words = 0usize;

        for (idx, reference) in references.iter().enumerate() {
            if let Some(taxon) = reference.match_key() {
                let key = join_words(taxon);
                max_words = max_words.max(key.split(MARKER).count());
                by_taxon.entry(key).or_default().push(idx);
            }
        }

        Self {
            by_taxon,
            max_words,
        }
    }

    /// Indices of reference records whose search term occurs in `normalized`, ascending.
    ///
    /// A term `@T@` occurs exactly when `T` is the text between two markers of the
    /// taxonomy, so only marker-bounded spans of up to `max_words` words are looked up.
    pub fn candidates(&self, normalized: &str) -> Vec<usize> {
        let markers: Vec<usize> = normalized
            .char_indices()
            .filter(|&(_, c)| c == MARKER)
            .map(|(pos, _)| pos)
            .collect();
        if markers.len() < 2 {
            return Vec::new();
        }

        let mut found = AHashSet::new();
        for (i, &start) in markers.iter().enumerate() {
            let last = (i + self.max_words).min(markers.len() - 1);
            for &end in &markers[i + 1..=last] {
                let span = &normalized[start + MARKER.len_utf8()..end];
                if let Some(hits) = self.by_taxon.get(span) {
                    found.extend(hits.iter().copied());
                }
            }
        }

        let mut found: Vec<usize> = found.into_iter().collect();
        found.sort_unstable();
        found
    }
}

/// Same output as `find_matches`, using a token index over the reference taxa.
///
/// Unlike `find_matches`, `progress` counts OTUs, not reference records: it receives
/// the percentage of OTUs processed at each decile. Building the index is not reported.
pub fn find_matches_indexed<'a>(
    references: &'a [ReferenceRecord],
    otus: &'a [OtuRecord],
    mut progress: Option<&mut dyn FnMut(u32)>,
) -> Vec<MatchRecord<'a>> {
    let index = ReferenceIndex::build(references);
    let total = otus.len();
    let waypoints = decile_waypoints(total);

    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for (otu_idx, otu) in otus.iter().enumerate() {
        report_progress(&mut progress, &waypoints, otu_idx + 1, total);
        pairs.extend(
            index
                .candidates(&otu.normalized_taxonomy)
                .into_iter()
                .map(|ref_idx| (ref_idx, otu_idx)),
        );
    }

    // Reference-major, like the exhaustive search.
    pairs.sort_unstable();

    let matches: Vec<MatchRecord<'a>> = pairs
        .into_iter()
        .map(|(ref_idx, otu_idx)| MatchRecord {
            otu: &otus[otu_idx],
            reference: &references[ref_idx],
        })
        .collect();

    log::info!("Found {} matching taxonomy records", matches.len());
    matches
}

/// Dispatch on `strategy`.
pub fn match_otus<'a>(
    strategy: MatchStrategy,
    references: &'a [ReferenceRecord],
    otus: &'a [OtuRecord],
    progress: Option<&mut dyn FnMut(u32)>,
) -> Vec<MatchRecord<'a>> {
    match strategy {
        MatchStrategy::Exhaustive => find_matches(references, otus, progress),
        MatchStrategy::Indexed => find_matches_indexed(references, otus, progress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::normalize_taxonomy;

    fn otu(id: &str, taxonomy: &str) -> OtuRecord {
        OtuRecord {
            cells: vec![id.to_string(), "1".to_string(), taxonomy.to_string()],
            normalized_taxonomy: normalize_taxonomy(taxonomy),
        }
    }

    fn reference(taxon: &str, level: i64) -> ReferenceRecord {
        ReferenceRecord {
            taxon: Some(taxon.to_string()),
            taxonomic_level: Some(level),
            ..Default::default()
        }
    }

    fn pairs(matches: &[MatchRecord]) -> Vec<(String, String)> {
        matches
            .iter()
            .map(|m| (m.reference.taxon.clone().unwrap(), m.otu.id().to_string()))
            .collect()
    }

    #[test]
    fn test_no_partial_name_match() {
        let refs = vec![reference("Trichoderma", 13)];
        let otus = vec![otu("OTU1", "Fungi;Ascomycota;Trichodermopsis")];
        assert!(find_matches(&refs, &otus, None).is_empty());
        assert!(find_matches_indexed(&refs, &otus, None).is_empty());
    }

    #[test]
    fn test_species_requires_contiguous_words() {
        let refs = vec![reference("Armillaria@mellea", 20)];
        let otus = vec![
            otu("OTU1", "Fungi;Basidiomycota;Armillaria;Armillaria mellea"),
            otu("OTU2", "Fungi;Armillaria;melleax"),
            otu("OTU3", "Fungi;Armillaria;gallica;mellea"),
            otu("OTU4", "s__Armillaria_mellea"),
        ];
        let found = pairs(&find_matches(&refs, &otus, None));
        assert_eq!(
            found,
            vec![
                ("Armillaria@mellea".to_string(), "OTU1".to_string()),
                ("Armillaria@mellea".to_string(), "OTU4".to_string()),
            ]
        );
    }

    #[test]
    fn test_first_token_needs_leading_separator() {
        let refs = vec![reference("Fungi", 1)];
        let otus = vec![otu("OTU1", "Fungi;Ascomycota"), otu("OTU2", "k__Fungi;p__Ascomycota")];
        let found = pairs(&find_matches(&refs, &otus, None));
        assert_eq!(found, vec![("Fungi".to_string(), "OTU2".to_string())]);
        assert_eq!(pairs(&find_matches_indexed(&refs, &otus, None)), found);
    }

    #[test]
    fn test_reference_without_taxon_never_matches() {
        let refs = vec![ReferenceRecord::default()];
        let otus = vec![otu("OTU1", "Fungi;;Ascomycota")];
        assert!(find_matches(&refs, &otus, None).is_empty());
        assert!(find_matches_indexed(&refs, &otus, None).is_empty());
    }

    #[test]
    fn test_indexed_matches_exhaustive() {
        let refs = vec![
            reference("Ascomycota", 3),
            reference("Trichoderma", 13),
            reference("Armillaria@mellea", 20),
            reference("Armillaria", 13),
            reference("Incertae sedis", 7),
            reference("Trichoderma", 13),
            reference("", 0),
        ];
        let otus = vec![
            otu("OTU1", "k__Fungi;p__Ascomycota;g__Trichoderma"),
            otu("OTU2", "Fungi;Basidiomycota;Armillaria;Armillaria mellea"),
            otu("OTU3", "Fungi;Ascomycota;Incertae sedis;Trichodermopsis"),
            otu("OTU4", "Fungi;;Unknown"),
            otu("OTU5", "Fungi"),
        ];
        let exhaustive = pairs(&find_matches(&refs, &otus, None));
        let indexed = pairs(&find_matches_indexed(&refs, &otus, None));
        assert!(!exhaustive.is_empty());
        assert_eq!(exhaustive, indexed);
    }

    #[test]
    fn test_progress_reported_at_deciles() {
        let refs: Vec<ReferenceRecord> = (0..20).map(|i| reference(&format!("T{i}"), 13)).collect();
        let otus = vec![otu("OTU1", "Fungi;T3")];
        let mut seen = Vec::new();
        let mut record = |pct: u32| seen.push(pct);
        let found = find_matches(&refs, &otus, Some(&mut record));
        assert_eq!(found.len(), 1);
        assert_eq!(seen, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn test_indexed_progress_counts_otus() {
        let refs: Vec<ReferenceRecord> = (0..20).map(|i| reference(&format!("T{i}"), 13)).collect();
        let otus: Vec<OtuRecord> = (0..4).map(|i| otu(&format!("OTU{i}"), "Fungi;T3")).collect();
        let mut seen = Vec::new();
        let mut record = |pct: u32| seen.push(pct);
        let found = find_matches_indexed(&refs, &otus, Some(&mut record));
        assert_eq!(found.len(), 4);
        // waypoints over 4 OTUs are 0,0,1,1,2,2,2,3,3,4
        assert_eq!(seen, vec![25, 50, 75, 100]);
    }

    #[test]
    fn test_shaped_species_record_matches() {
        let species = ReferenceRecord {
            taxon: Some("Armillaria mellea".to_string()),
            match_taxon: Some("Armillaria@mellea".to_string()),
            taxonomic_level: Some(20),
            ..Default::default()
        };
        let refs = vec![species];
        let otus = vec![otu("OTU1", "Fungi;Armillaria;Armillaria mellea")];
        let found = pairs(&find_matches(&refs, &otus, None));
        assert_eq!(found, vec![("Armillaria mellea".to_string(), "OTU1".to_string())]);
        assert_eq!(pairs(&find_matches_indexed(&refs, &otus, None)), found);
    }

    #[test]
    fn test_progress_with_few_records() {
        let refs = vec![reference("A", 13), reference("B", 13)];
        let otus: Vec<OtuRecord> = Vec::new();
        let mut seen = Vec::new();
        let mut record = |pct: u32| seen.push(pct);
        find_matches(&refs, &otus, Some(&mut record));
        // waypoints are 0,0,0,0,1,1,1,1,1,2
        assert_eq!(seen, vec![50, 100]);
    }
}
