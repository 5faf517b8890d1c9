//! Merge the pattern and semantic record streams into one product list.
//!
//! A semantic record replaces the pattern record at the same index. Semantic
//! records lacking `name`/`sku`/`price` borrow them from that pattern record.
//! Semantic-only indices follow the pattern order.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::error::{ReconError, SnapshotKind};
use crate::model::{AttrValue, ProductRecord, SkippedRow, Source};

type JsonObject = Map<String, Value>;

/// Top-level pattern fields carrying attributes.
const PATTERN_ATTRIBUTES: &[&str] = &["flavor", "nicotine_mg", "volume_ml"];

/// Fields that describe the product rather than an attribute of it.
const RESERVED: &[&str] = &[
    "index",
    "name",
    "sku",
    "price",
    "product_name",
    "brand",
    "attributes",
    "error",
    "confidence",
    "regex_result",
];

#[derive(Debug, Default)]
pub struct MergedRecords {
    pub products: Vec<ProductRecord>,
    pub skipped: Vec<SkippedRow>,
}

struct IndexedRecord {
    line: usize,
    index: u64,
    record: JsonObject,
}

/// Parse and merge both streams. Only a document that is not a JSON array
/// is fatal; individual bad records are skipped and reported.
pub fn merge_records(
    pattern_json: &str,
    semantic_json: Option<&str>,
) -> Result<MergedRecords, ReconError> {
    let mut skipped = Vec::new();

    let pattern = indexed_records(SnapshotKind::PatternRecords, pattern_json, &mut skipped)?;
    let semantic = match semantic_json {
        Some(json) => indexed_records(SnapshotKind::SemanticRecords, json, &mut skipped)?,
        None => Vec::new(),
    };

    let mut semantic_by_index: BTreeMap<u64, (usize, JsonObject)> = BTreeMap::new();
    let mut semantic_order = Vec::new();
    for IndexedRecord { line, index, record } in semantic {
        if record.get("error").is_some_and(|e| !e.is_null()) {
            tracing::warn!(index, "semantic record marks a failed chunk; keeping pattern record");
            continue;
        }
        if semantic_by_index.contains_key(&index) {
            skipped.push(SkippedRow {
                snapshot: SnapshotKind::SemanticRecords,
                line,
                reason: format!("duplicate index {index}"),
            });
            continue;
        }
        semantic_by_index.insert(index, (line, record));
        semantic_order.push(index);
    }

    let mut products = Vec::new();
    let mut seen = BTreeSet::new();
    for IndexedRecord { line, index, record } in pattern {
        if !seen.insert(index) {
            skipped.push(SkippedRow {
                snapshot: SnapshotKind::PatternRecords,
                line,
                reason: format!("duplicate index {index}"),
            });
            continue;
        }
        let built = match semantic_by_index.get(&index) {
            Some((sem_line, sem)) => {
                semantic_product(index, sem, Some(&record)).map_err(|reason| (*sem_line, reason))
            }
            None => pattern_product(index, &record).map_err(|reason| (line, reason)),
        };
        push_or_skip(built, index, &mut products, &mut skipped);
    }

    for index in semantic_order {
        if seen.contains(&index) {
            continue;
        }
        if let Some((line, sem)) = semantic_by_index.get(&index) {
            let built = semantic_product(index, sem, None).map_err(|reason| (*line, reason));
            push_or_skip(built, index, &mut products, &mut skipped);
        }
    }

    tracing::info!(products = products.len(), skipped = skipped.len(), "merged record streams");
    Ok(MergedRecords { products, skipped })
}

type BuildError = (usize, (SnapshotKind, String));

fn push_or_skip(
    built: Result<ProductRecord, BuildError>,
    index: u64,
    products: &mut Vec<ProductRecord>,
    skipped: &mut Vec<SkippedRow>,
) {
    match built {
        Ok(product) => products.push(product),
        Err((line, (snapshot, reason))) => {
            tracing::warn!(index, %snapshot, %reason, "skipping record");
            skipped.push(SkippedRow { snapshot, line, reason });
        }
    }
}

fn indexed_records(
    kind: SnapshotKind,
    json: &str,
    skipped: &mut Vec<SkippedRow>,
) -> Result<Vec<IndexedRecord>, ReconError> {
    let doc: Value = serde_json::from_str(json).map_err(|e| ReconError::SnapshotLoad {
        kind,
        reason: e.to_string(),
    })?;
    let Value::Array(items) = doc else {
        return Err(ReconError::SnapshotLoad {
            kind,
            reason: "expected a JSON array of records".into(),
        });
    };

    let mut out = Vec::with_capacity(items.len());
    for (pos, item) in items.into_iter().enumerate() {
        let line = pos + 1;
        let Value::Object(record) = item else {
            skipped.push(SkippedRow { snapshot: kind, line, reason: "record is not an object".into() });
            continue;
        };
        let index = match record.get("index") {
            Some(Value::Number(n)) => n.as_u64(),
            None | Some(Value::Null) if kind == SnapshotKind::PatternRecords => Some(pos as u64),
            _ => None,
        };
        match index {
            Some(index) => out.push(IndexedRecord { line, index, record }),
            None => skipped.push(SkippedRow {
                snapshot: kind,
                line,
                reason: "missing or invalid index".into(),
            }),
        }
    }
    Ok(out)
}

fn pattern_product(index: u64, record: &JsonObject) -> Result<ProductRecord, (SnapshotKind, String)> {
    let price = parse_price(record.get("price"))
        .map_err(|reason| (SnapshotKind::PatternRecords, reason))?;

    let mut attributes = Vec::new();
    for key in PATTERN_ATTRIBUTES {
        if let Some(value) = record.get(*key).and_then(AttrValue::from_json) {
            upsert(&mut attributes, key, value);
        }
    }

    let regex_result = record.get("regex_result").and_then(Value::as_object);
    if let Some(extracted) = regex_result {
        for (key, value) in extracted {
            if matches!(key.as_str(), "product_name" | "confidence" | "brand") {
                continue;
            }
            if let Some(value) = AttrValue::from_json(value) {
                upsert(&mut attributes, key, value);
            }
        }
    }

    let mut display_name = text(record.get("product_name"));
    if display_name.trim().is_empty() {
        display_name = text(regex_result.and_then(|r| r.get("product_name")));
    }
    let brand = non_empty(text(record.get("brand")))
        .or_else(|| non_empty(text(regex_result.and_then(|r| r.get("brand")))));

    Ok(ProductRecord {
        index,
        raw_name: text(record.get("name")),
        sku: text(record.get("sku")),
        price,
        display_name,
        brand,
        source: Source::Pattern,
        attributes,
    })
}

fn semantic_product(
    index: u64,
    record: &JsonObject,
    fallback: Option<&JsonObject>,
) -> Result<ProductRecord, (SnapshotKind, String)> {
    let price = parse_price(field(record, fallback, "price"))
        .map_err(|reason| (SnapshotKind::SemanticRecords, reason))?;

    let mut attributes = Vec::new();
    for (key, value) in record {
        if RESERVED.contains(&key.as_str()) {
            continue;
        }
        if let Some(value) = AttrValue::from_json(value) {
            upsert(&mut attributes, key, value);
        }
    }
    if let Some(nested) = record.get("attributes").and_then(Value::as_object) {
        for (key, value) in nested {
            if RESERVED.contains(&key.as_str()) {
                continue;
            }
            if let Some(value) = AttrValue::from_json(value) {
                upsert(&mut attributes, key, value);
            }
        }
    }

    Ok(ProductRecord {
        index,
        raw_name: text(field(record, fallback, "name")),
        sku: text(field(record, fallback, "sku")),
        price,
        display_name: text(record.get("product_name")),
        brand: non_empty(text(record.get("brand"))),
        source: Source::Semantic,
        attributes,
    })
}

fn field<'a>(record: &'a JsonObject, fallback: Option<&'a JsonObject>, key: &str) -> Option<&'a Value> {
    record
        .get(key)
        .filter(|v| !v.is_null())
        .or_else(|| fallback.and_then(|f| f.get(key)))
}

/// Later spellings of the same key replace earlier ones in place.
fn upsert(attributes: &mut Vec<(String, AttrValue)>, key: &str, value: AttrValue) {
    match attributes.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => slot.1 = value,
        None => attributes.push((key.to_string(), value)),
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Prices arrive as numbers or as strings like `"$1,299.00"`. Absent is zero.
pub fn parse_price(value: Option<&Value>) -> Result<Decimal, String> {
    let raw = match value {
        None | Some(Value::Null) => return Ok(Decimal::ZERO),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.replace(['$', ','], "").trim().to_string(),
        Some(_) => return Err("price must be a number or a string".into()),
    };
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| format!("unparsable price '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    const PATTERN: &str = r#"[
        {"index": 0, "name": "ACME Juice Mango 6mg", "sku": "J-1", "price": "$12.50",
         "product_name": "ACME - Juice Line", "flavor": "Mango", "nicotine_mg": 6,
         "confidence": 0.9},
        {"index": 1, "name": "ACME Coil 0.4", "sku": "C-1", "price": 9,
         "product_name": "ACME - Coils",
         "regex_result": {"product_name": "ignored", "confidence": 0.4, "resistance_ohm": "0.4"}},
        {"index": 2, "name": "Broken Chunk", "sku": "B-1", "price": 5, "product_name": "Broken"}
    ]"#;

    const SEMANTIC: &str = r#"[
        {"index": 0, "product_name": "ACME - Juice Line", "brand": "ACME",
         "flavor": "Mango Ice", "attributes": {"nicotine_mg": "3", "sku": "nope"}},
        {"index": 2, "error": "chunk failed"},
        {"index": 7, "name": "Late", "sku": "L-7", "price": "1,000.00", "product_name": "Late Line",
         "color": "Red"}
    ]"#;

    #[test]
    fn semantic_wins_and_borrows_identity_fields() {
        let merged = merge_records(PATTERN, Some(SEMANTIC)).unwrap();
        let first = &merged.products[0];
        assert_eq!(first.source, Source::Semantic);
        assert_eq!(first.sku, "J-1");
        assert_eq!(first.raw_name, "ACME Juice Mango 6mg");
        assert_eq!(first.price, dec("12.50"));
        assert_eq!(first.brand.as_deref(), Some("ACME"));
        assert_eq!(
            first.attributes,
            vec![
                ("flavor".to_string(), AttrValue::Scalar("Mango Ice".into())),
                ("nicotine_mg".to_string(), AttrValue::Scalar("3".into())),
            ]
        );
    }

    #[test]
    fn pattern_record_reads_regex_result() {
        let merged = merge_records(PATTERN, None).unwrap();
        let coil = &merged.products[1];
        assert_eq!(coil.source, Source::Pattern);
        assert_eq!(coil.price, dec("9"));
        assert_eq!(
            coil.attributes,
            vec![("resistance_ohm".to_string(), AttrValue::Scalar("0.4".into()))]
        );
    }

    #[test]
    fn failed_chunk_keeps_pattern_record() {
        let merged = merge_records(PATTERN, Some(SEMANTIC)).unwrap();
        let broken = &merged.products[2];
        assert_eq!(broken.index, 2);
        assert_eq!(broken.source, Source::Pattern);
    }

    #[test]
    fn semantic_only_indices_follow_pattern_order() {
        let merged = merge_records(PATTERN, Some(SEMANTIC)).unwrap();
        let indices: Vec<u64> = merged.products.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 7]);
        let late = &merged.products[3];
        assert_eq!(late.price, dec("1000.00"));
        assert_eq!(late.sku, "L-7");
    }

    #[test]
    fn bad_records_are_skipped_not_fatal() {
        let pattern = r#"[
            {"index": 0, "name": "ok", "sku": "A", "price": 1},
            "not an object",
            {"index": 2, "name": "bad price", "sku": "B", "price": "twelve"},
            {"index": 0, "name": "dup", "sku": "C", "price": 1}
        ]"#;
        let merged = merge_records(pattern, None).unwrap();
        assert_eq!(merged.products.len(), 1);
        assert_eq!(merged.skipped.len(), 3);
        assert!(merged.skipped.iter().all(|s| s.snapshot == SnapshotKind::PatternRecords));
    }

    #[test]
    fn duplicate_semantic_index_keeps_the_first_record() {
        let semantic = r#"[
            {"index": 0, "product_name": "ACME - Juice Line", "flavor": "Mango Ice"},
            {"index": 0, "product_name": "Other Line", "flavor": "Peach"}
        ]"#;
        let merged = merge_records(PATTERN, Some(semantic)).unwrap();
        assert_eq!(merged.products.len(), 3);
        assert_eq!(merged.products[0].display_name, "ACME - Juice Line");
        assert_eq!(merged.skipped.len(), 1);
        assert_eq!(merged.skipped[0].snapshot, SnapshotKind::SemanticRecords);
        assert_eq!(merged.skipped[0].line, 2);
        assert_eq!(merged.skipped[0].reason, "duplicate index 0");
    }

    #[test]
    fn non_array_document_is_fatal() {
        let err = merge_records(r#"{"index": 0}"#, None).unwrap_err();
        assert!(matches!(
            err,
            ReconError::SnapshotLoad { kind: SnapshotKind::PatternRecords, .. }
        ));
    }

    #[test]
    fn price_parsing() {
        assert_eq!(parse_price(None).unwrap(), Decimal::ZERO);
        assert_eq!(parse_price(Some(&Value::String("$1,299.99".into()))).unwrap(), dec("1299.99"));
        assert_eq!(parse_price(Some(&Value::String("  ".into()))).unwrap(), Decimal::ZERO);
        assert!(parse_price(Some(&Value::Bool(true))).is_err());
    }
}
