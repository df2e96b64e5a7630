//src/types.rs

/// Boundary marker written between taxonomy levels. Never occurs inside a taxon name.
pub const MARKER: char = '@';

/// `taxonomicLevel` value used by the reference databases for species entries.
pub const SPECIES_LEVEL: i64 = 20;

/// Placeholder for function fields of an OTU with no assignment.
pub const NO_VALUE: &str = "-";

/// Notes value for an OTU with no assignment.
pub const UNASSIGNED: &str = "Unassigned";

/// Column names appended after the original OTU table header.
pub const FUNCTION_HEADER: [&str; 9] = [
    "Taxon",
    "Taxon Level",
    "Trophic Mode",
    "Guild",
    "Growth Morphology",
    "Trait",
    "Confidence Ranking",
    "Notes",
    "Citation/Source",
];

/// Position of "Notes" inside `FUNCTION_HEADER`.
pub const NOTES_OFFSET: usize = 7;

/// One row of the user's OTU table.
#[derive(Debug, Clone)]
pub struct OtuRecord {
    /// All cells exactly as read, including the raw taxonomy text.
    pub cells: Vec<String>,
    /// Marker-delimited taxonomy used only while matching.
    pub normalized_taxonomy: String,
}

impl OtuRecord {
    /// First column of the row.
    pub fn id(&self) -> &str {
        self.cells.first().map(String::as_str).unwrap_or_default()
    }
}

/// An OTU table held fully in memory.
#[derive(Debug, Clone)]
pub struct OtuTable {
    pub header: Vec<String>,
    /// Index of the `taxonomy` / `Taxonomy` column, fixed for every row.
    pub taxonomy_index: usize,
    pub records: Vec<OtuRecord>,
}

impl OtuTable {
    /// Input header followed by the function columns.
    pub fn extended_header(&self) -> Vec<String> {
        let mut header = self.header.clone();
        header.extend(FUNCTION_HEADER.iter().map(|h| h.to_string()));
        header
    }
}

/// One entry of the functional trait database, projected onto the fixed field list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceRecord {
    /// Taxon name as published, written to the Taxon column.
    pub taxon: Option<String>,
    /// Species binomials with their words joined by `MARKER`; unset for other levels.
    pub match_taxon: Option<String>,
    pub taxonomic_level: Option<i64>,
    pub trophic_mode: Option<String>,
    pub guild: Option<String>,
    pub growth_form: Option<String>,
    pub trait_: Option<String>,
    pub confidence_ranking: Option<String>,
    pub notes: Option<String>,
    pub citation_source: Option<String>,
}

impl ReferenceRecord {
    /// Name looked up in OTU lineages.
    pub fn match_key(&self) -> Option<&str> {
        self.match_taxon.as_deref().or(self.taxon.as_deref())
    }

    /// The nine output cells in `FUNCTION_HEADER` order. Absent fields are empty.
    pub fn fields(&self) -> Vec<String> {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            text(&self.taxon),
            self.taxonomic_level.map(|l| l.to_string()).unwrap_or_default(),
            text(&self.trophic_mode),
            text(&self.guild),
            text(&self.growth_form),
            text(&self.trait_),
            text(&self.confidence_ranking),
            text(&self.notes),
            text(&self.citation_source),
        ]
    }
}

/// An OTU paired with a reference record whose taxon occurs in its lineage.
#[derive(Debug, Clone, Copy)]
pub struct MatchRecord<'a> {
    pub otu: &'a OtuRecord,
    pub reference: &'a ReferenceRecord,
}

/// Functional block attached to a resolved OTU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assignment<'a> {
    Matched(&'a ReferenceRecord),
    Unassigned,
}

/// Final state of one OTU, ready to be written.
#[derive(Debug, Clone)]
pub struct ResolvedOtu<'a> {
    pub otu: &'a OtuRecord,
    /// Raw taxonomy text restored from the input table.
    pub taxonomy: String,
    pub assignment: Assignment<'a>,
}

impl ResolvedOtu<'_> {
    /// Output cells: the OTU row padded to `input_width`, followed by the function fields.
    pub fn to_row(&self, taxonomy_index: usize, input_width: usize) -> Vec<String> {
        let mut row = self.otu.cells.clone();
        if let Some(cell) = row.get_mut(taxonomy_index) {
            cell.clone_from(&self.taxonomy);
        }
        if row.len() < input_width {
            row.resize(input_width, NO_VALUE.to_string());
        }

        match self.assignment {
            Assignment::Matched(reference) => row.extend(reference.fields()),
            Assignment::Unassigned => {
                let start = row.len();
                row.resize(start + FUNCTION_HEADER.len(), NO_VALUE.to_string());
                row[start + NOTES_OFFSET] = UNASSIGNED.to_string();
            }
        }
        row
    }
}
