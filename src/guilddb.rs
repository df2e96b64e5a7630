//src/guilddb.rs

use std::path::Path;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::config::Database;
use crate::error::{GuildError, Result};
use crate::taxonomy::join_words;
use crate::types::{ReferenceRecord, SPECIES_LEVEL};

/// A reference record as it comes out of the JSON payload: field name -> value.
pub type RawRecord = Map<String, Value>;

/// Output fields in order, each with the keys tried when the canonical one is absent.
pub const FIELD_KEYS: [(&str, &[&str]); 9] = [
    ("taxon", &[]),
    ("taxonomicLevel", &[]),
    ("trophicMode", &["TrophicMode"]),
    ("guild", &[]),
    ("growthForm", &["growthMorphology"]),
    ("trait", &[]),
    ("confidenceRanking", &[]),
    ("notes", &[]),
    ("citationSource", &[]),
];

const LEVEL_KEY: &str = "taxonomicLevel";

/// Where each text field of `FIELD_KEYS` is stored.
fn text_slot<'r>(record: &'r mut ReferenceRecord, canonical: &str) -> Option<&'r mut Option<String>> {
    match canonical {
        "taxon" => Some(&mut record.taxon),
        "trophicMode" => Some(&mut record.trophic_mode),
        "guild" => Some(&mut record.guild),
        "growthForm" => Some(&mut record.growth_form),
        "trait" => Some(&mut record.trait_),
        "confidenceRanking" => Some(&mut record.confidence_ranking),
        "notes" => Some(&mut record.notes),
        "citationSource" => Some(&mut record.citation_source),
        _ => None,
    }
}

/// Shaped reference records plus how many of them were incomplete.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDatabase {
    pub records: Vec<ReferenceRecord>,
    pub incomplete_records: usize,
}

/// A shaped record and the canonical names of the fields that could not be resolved.
#[derive(Debug, Clone)]
pub struct ShapedRecord {
    pub record: ReferenceRecord,
    pub missing: Vec<&'static str>,
}

/// First non-null value among `canonical` and its fallbacks.
fn resolve<'a>(raw: &'a RawRecord, canonical: &str, fallbacks: &[&str]) -> Option<&'a Value> {
    std::iter::once(canonical)
        .chain(fallbacks.iter().copied())
        .find_map(|key| raw.get(key).filter(|v| !v.is_null()))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_level(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Project one raw record onto the fixed field list, applying aliases.
/// Species-level taxa get a marker-joined match key so binomials match as one token;
/// `taxon` itself keeps the published spelling.
pub fn shape_record(raw: &RawRecord) -> ShapedRecord {
    let mut record = ReferenceRecord::default();
    let mut missing = Vec::new();

    for (canonical, fallbacks) in FIELD_KEYS {
        let value = resolve(raw, canonical, fallbacks);
        if canonical == LEVEL_KEY {
            record.taxonomic_level = value.and_then(value_level);
            if record.taxonomic_level.is_none() {
                missing.push(canonical);
            }
        } else if let Some(slot) = text_slot(&mut record, canonical) {
            *slot = value.map(value_text);
            if slot.is_none() {
                missing.push(canonical);
            }
        }
    }

    if record.taxonomic_level == Some(SPECIES_LEVEL) {
        record.match_taxon = record.taxon.as_deref().map(join_words);
    }

    ShapedRecord { record, missing }
}

/// Shape every raw record. Incomplete records are reported and kept with partial data.
pub fn shape_records(raws: &[RawRecord]) -> ReferenceDatabase {
    let mut db = ReferenceDatabase {
        records: Vec::with_capacity(raws.len()),
        incomplete_records: 0,
    };

    for raw in raws {
        let shaped = shape_record(raw);
        if !shaped.missing.is_empty() {
            log::warn!(
                "Reference record '{}' is missing field(s): {}",
                shaped.record.taxon.as_deref().unwrap_or("<no taxon>"),
                shaped.missing.join(", ")
            );
            db.incomplete_records += 1;
        }
        db.records.push(shaped.record);
    }

    log::info!(
        "Loaded {} reference records ({} incomplete)",
        db.records.len(),
        db.incomplete_records
    );
    db
}

/// Parse a database payload. Accepts a bare JSON array or the HTML page served
/// by the database endpoints, which wraps the array in markup.
pub fn parse_payload(body: &str) -> Result<Vec<RawRecord>> {
    let trimmed = body.trim();
    let values: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        embedded_array(trimmed)
            .ok_or_else(|| GuildError::InvalidPayload("no JSON array found".to_string()))?
    };

    let mut records = Vec::with_capacity(values.len());
    for (i, value) in values.into_iter().enumerate() {
        match value {
            Value::Object(map) => records.push(map),
            other => log::warn!("Skipping reference entry {i}: not an object ({other})"),
        }
    }
    Ok(records)
}

/// First `[` in the page body (or anywhere, without a `<body>` tag) that opens a
/// complete JSON array. Bracketed markup such as `<!--[if IE]>` is skipped, as is
/// anything after the array.
fn embedded_array(page: &str) -> Option<Vec<Value>> {
    let start = page
        .find("<body")
        .and_then(|tag| page[tag..].find('>').map(|end| tag + end + 1))
        .unwrap_or(0);
    let body = &page[start..];

    body.match_indices('[').find_map(|(pos, _)| {
        serde_json::Deserializer::from_str(&body[pos..])
            .into_iter::<Vec<Value>>()
            .next()
            .and_then(|parsed| parsed.ok())
    })
}

/// Download the raw payload for `database`.
pub fn fetch_payload(database: Database) -> Result<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(300))
        .user_agent(concat!("funguild-rs/", env!("CARGO_PKG_VERSION")))
        .build()?;

    log::info!("Connecting with {} database at {}", database, database.url());
    let body = client
        .get(database.url())
        .send()?
        .error_for_status()?
        .text()?;
    Ok(body)
}

/// Read a payload previously saved to disk.
pub fn read_payload_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|e| GuildError::from(e).with_path(path))
}

/// Fetch (or read) and shape the reference database.
pub fn load_reference_database(
    database: Database,
    database_file: Option<&Path>,
) -> Result<ReferenceDatabase> {
    let body = match database_file {
        Some(path) => read_payload_file(path)?,
        None => fetch_payload(database)?,
    };
    let raws = parse_payload(&body)?;
    Ok(shape_records(&raws))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    fn full_record() -> Value {
        json!({
            "taxon": "Trichoderma",
            "taxonomicLevel": 13,
            "trophicMode": "Saprotroph",
            "guild": "Undefined Saprotroph",
            "growthForm": "Microfungus",
            "trait": "NULL",
            "confidenceRanking": "Probable",
            "notes": "",
            "citationSource": "Tedersoo et al. 2014"
        })
    }

    #[test]
    fn test_complete_record_has_no_missing_fields() {
        let shaped = shape_record(&raw(full_record()));
        assert!(shaped.missing.is_empty());
        assert_eq!(shaped.record.taxon.as_deref(), Some("Trichoderma"));
        assert_eq!(shaped.record.taxonomic_level, Some(13));
        assert_eq!(shaped.record.guild.as_deref(), Some("Undefined Saprotroph"));
    }

    #[test]
    fn test_growth_morphology_alias_is_used() {
        let mut value = full_record();
        let obj = value.as_object_mut().unwrap();
        obj.remove("growthForm");
        obj.insert("growthMorphology".to_string(), json!("Agaricoid"));
        let shaped = shape_record(&raw(value));
        assert!(shaped.missing.is_empty());
        assert_eq!(shaped.record.growth_form.as_deref(), Some("Agaricoid"));
    }

    #[test]
    fn test_canonical_key_wins_over_alias() {
        let mut value = full_record();
        value
            .as_object_mut()
            .unwrap()
            .insert("TrophicMode".to_string(), json!("Pathotroph"));
        let shaped = shape_record(&raw(value));
        assert_eq!(shaped.record.trophic_mode.as_deref(), Some("Saprotroph"));
    }

    #[test]
    fn test_trophic_mode_alias() {
        let mut value = full_record();
        let obj = value.as_object_mut().unwrap();
        obj.remove("trophicMode");
        obj.insert("TrophicMode".to_string(), json!("Symbiotroph"));
        let shaped = shape_record(&raw(value));
        assert_eq!(shaped.record.trophic_mode.as_deref(), Some("Symbiotroph"));
    }

    #[test]
    fn test_missing_field_is_reported_but_record_kept() {
        let mut value = full_record();
        value.as_object_mut().unwrap().remove("trait");
        let db = shape_records(&[raw(value), raw(full_record())]);
        assert_eq!(db.records.len(), 2);
        assert_eq!(db.incomplete_records, 1);
        assert_eq!(db.records[0].trait_, None);
        assert_eq!(db.records[0].fields()[5], "");
    }

    #[test]
    fn test_species_match_key_joined() {
        let shaped = shape_record(&raw(json!({
            "taxon": "Armillaria mellea",
            "taxonomicLevel": 20
        })));
        assert_eq!(shaped.record.match_taxon.as_deref(), Some("Armillaria@mellea"));
        assert_eq!(shaped.record.taxon.as_deref(), Some("Armillaria mellea"));
        assert_eq!(shaped.record.fields()[0], "Armillaria mellea");

        let shaped = shape_record(&raw(json!({
            "taxon": "Incertae sedis",
            "taxonomicLevel": "13"
        })));
        assert_eq!(shaped.record.taxonomic_level, Some(13));
        assert_eq!(shaped.record.taxon.as_deref(), Some("Incertae sedis"));
        assert_eq!(shaped.record.match_taxon, None);
    }

    #[test]
    fn test_parse_bare_array() {
        let records = parse_payload(r#"[{"taxon": "A"}, 3, {"taxon": "B"}]"#).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["taxon"], json!("B"));
    }

    #[test]
    fn test_parse_html_wrapped_payload() {
        let body = "<html>\n<head></head>\n<body>\n\n\n\n[{\"taxon\": \"Fusarium\", \"taxonomicLevel\": 13}]</body>\n</html>";
        let records = parse_payload(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["taxon"], json!("Fusarium"));
    }

    #[test]
    fn test_parse_page_with_bracketed_markup() {
        let body = "<html>\n<head><!--[if lt IE 9]><script src=\"shim.js\"></script><![endif]--></head>\n\
            <body>\n[{\"taxon\": \"Fusarium\", \"taxonomicLevel\": 13}]\n\
            <script>var menu = [1, 2];</script></body>\n</html>";
        let records = parse_payload(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["taxon"], json!("Fusarium"));
    }

    #[test]
    fn test_missing_payload_file_error_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funguild_dump.json");
        let err = load_reference_database(Database::Fungi, Some(&path)).unwrap_err();
        assert!(matches!(err, GuildError::File { .. }));
        assert!(err.to_string().contains("funguild_dump.json"));
    }

    #[test]
    fn test_payload_without_array_is_an_error() {
        assert!(matches!(
            parse_payload("<html>maintenance</html>"),
            Err(GuildError::InvalidPayload(_))
        ));
    }
}
