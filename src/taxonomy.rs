//src/taxonomy.rs

use crate::types::MARKER;

/// Characters that separate taxonomy levels in the lineage strings of common pipelines
/// (UNITE `k__Fungi;p__Ascomycota`, QIIME, comma lists, ...).
pub const LEVEL_SEPARATORS: [char; 5] = ['_', ' ', ';', ',', ':'];

/// Replace every level separator with `MARKER` and append a trailing `MARKER`,
/// so every taxon name, including the last one, is delimited on both sides.
pub fn normalize_taxonomy(raw: &str) -> String {
    let mut normalized: String = raw
        .chars()
        .map(|c| if LEVEL_SEPARATORS.contains(&c) { MARKER } else { c })
        .collect();
    normalized.push(MARKER);
    normalized
}

/// Taxon name with internal spaces joined by `MARKER`.
pub fn join_words(taxon: &str) -> String {
    taxon.replace(' ', &MARKER.to_string())
}

/// `@taxon@` with internal spaces replaced by the marker.
pub fn search_term(taxon: &str) -> String {
    let mut term = String::with_capacity(taxon.len() + 2);
    term.push(MARKER);
    term.push_str(&join_words(taxon));
    term.push(MARKER);
    term
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_separators_become_markers() {
        assert_eq!(
            normalize_taxonomy("k__Fungi;p:Asco,c Sordario"),
            "k@@Fungi@p@Asco@c@Sordario@"
        );
    }

    #[test]
    fn test_trailing_marker_always_appended() {
        assert_eq!(normalize_taxonomy(""), "@");
        assert_eq!(normalize_taxonomy("Fungi"), "Fungi@");
    }

    #[test]
    fn test_normalizing_twice_keeps_tokens() {
        let once = normalize_taxonomy("Fungi;Ascomycota;Trichoderma");
        let twice = normalize_taxonomy(&once);
        assert_eq!(twice, format!("{once}@"));
        let tokens = |s: &str| -> Vec<String> {
            s.split(MARKER)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        };
        assert_eq!(tokens(&once), tokens(&twice));
    }

    #[test]
    fn test_search_term_is_bounded() {
        assert_eq!(search_term("Trichoderma"), "@Trichoderma@");
        assert_eq!(search_term("Armillaria mellea"), "@Armillaria@mellea@");
    }

    #[test]
    fn test_prefix_taxon_does_not_match_longer_name() {
        let otu = normalize_taxonomy("Fungi;Ascomycota;Trichodermopsis");
        assert!(!otu.contains(&search_term("Trichoderma")));
        let otu = normalize_taxonomy("Fungi;Ascomycota;Trichoderma");
        assert!(otu.contains(&search_term("Trichoderma")));
    }
}
