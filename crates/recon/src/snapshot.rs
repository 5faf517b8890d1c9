//! Loaders for the downstream catalog exports.
//!
//! Loaders take file contents, not paths. A missing required column aborts
//! the load; a malformed row is skipped and reported.

use serde::Deserialize;

use crate::error::{ReconError, SnapshotKind};
use crate::model::{
    CategoryIndex, DisplayKind, ExistingVariant, NamedId, SkippedRow, TemplateAxis,
    TemplateOrigin, TemplateRecord, VocabularyEntry,
};
use crate::normalize::canonical_key;
use crate::vocabulary::Vocabulary;

pub const TEMPLATE_VALUE_DESC: &str =
    "attribute_line_ids/product_template_value_ids/product_attribute_value_id";
pub const TEMPLATE_VALUE_ID: &str = "attribute_line_ids/product_template_value_ids/id";

/// A loaded snapshot plus the rows that had to be skipped.
#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub skipped: Vec<SkippedRow>,
}

/// Read `columns` from every data row, trimmed. Rows are numbered from 1.
fn read_rows(
    kind: SnapshotKind,
    csv_data: &str,
    columns: &[&str],
    skipped: &mut Vec<SkippedRow>,
) -> Result<Vec<(usize, Vec<String>)>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::SnapshotLoad { kind, reason: e.to_string() })?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let idx = |name: &str| -> Result<usize, ReconError> {
        headers.iter().position(|h| h == name).ok_or_else(|| ReconError::MissingColumn {
            kind,
            column: name.into(),
        })
    };
    let indices = columns.iter().map(|c| idx(c)).collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::new();
    for (pos, record) in reader.records().enumerate() {
        let line = pos + 1;
        match record {
            Ok(record) => {
                let values = indices
                    .iter()
                    .map(|&i| record.get(i).unwrap_or("").trim().to_string())
                    .collect();
                rows.push((line, values));
            }
            Err(e) => skip(skipped, kind, line, e.to_string()),
        }
    }
    Ok(rows)
}

fn skip(skipped: &mut Vec<SkippedRow>, kind: SnapshotKind, line: usize, reason: impl Into<String>) {
    let reason = reason.into();
    tracing::warn!(snapshot = %kind, line, %reason, "skipping malformed row");
    skipped.push(SkippedRow { snapshot: kind, line, reason });
}

/// Split `"Attr: Value"`. Both halves must be non-empty.
fn split_attribute_value(desc: &str) -> Option<(&str, &str)> {
    let (attr, value) = desc.split_once(':')?;
    let (attr, value) = (attr.trim(), value.trim());
    if attr.is_empty() || value.is_empty() {
        None
    } else {
        Some((attr, value))
    }
}

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

/// Columns `id, name, value_ids/id, value_ids/name`. A row with `id` and
/// `name` opens an attribute; value columns attach to the open attribute.
pub fn load_vocabulary(csv_data: &str) -> Result<Loaded<Vocabulary>, ReconError> {
    let kind = SnapshotKind::Vocabulary;
    let mut skipped = Vec::new();
    let columns = ["id", "name", "value_ids/id", "value_ids/name"];
    let rows = read_rows(kind, csv_data, &columns, &mut skipped)?;

    let mut entries: Vec<VocabularyEntry> = Vec::new();
    let mut current: Option<usize> = None;
    for (line, row) in rows {
        let [id, name, value_id, value_name] = <[String; 4]>::try_from(row)
            .map_err(|_| ReconError::SnapshotLoad { kind, reason: "column count".into() })?;

        match (id.is_empty(), name.is_empty()) {
            (false, false) => {
                current = Some(match entries.iter().position(|e| e.attribute_id == id) {
                    Some(i) => i,
                    None => {
                        entries.push(VocabularyEntry {
                            attribute_id: id,
                            canonical_name: name,
                            display_kind: DisplayKind::Radio,
                            values: Vec::new(),
                        });
                        entries.len() - 1
                    }
                });
            }
            (true, true) => {}
            _ => {
                skip(&mut skipped, kind, line, "attribute row needs both id and name");
                current = None;
                continue;
            }
        }

        match (value_id.is_empty(), value_name.is_empty(), current) {
            (true, true, _) => {}
            (false, false, Some(i)) => entries[i].values.push(NamedId::new(value_name, value_id)),
            (false, false, None) => skip(&mut skipped, kind, line, "value row before any attribute"),
            _ => skip(&mut skipped, kind, line, "value row needs both id and name"),
        }
    }

    tracing::info!(attributes = entries.len(), "loaded vocabulary export");
    Ok(Loaded { value: Vocabulary::new(entries), skipped })
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Columns `id, name` plus the template value description (`"Attr: Value"`)
/// and template value id. Continuation rows leave `id` blank.
pub fn load_templates(csv_data: &str) -> Result<Loaded<Vec<TemplateRecord>>, ReconError> {
    let kind = SnapshotKind::Templates;
    let mut skipped = Vec::new();
    let rows = read_rows(
        kind,
        csv_data,
        &["id", "name", TEMPLATE_VALUE_DESC, TEMPLATE_VALUE_ID],
        &mut skipped,
    )?;

    let mut templates: Vec<TemplateRecord> = Vec::new();
    let mut current: Option<usize> = None;
    for (line, row) in rows {
        let [id, name, desc, value_id] = <[String; 4]>::try_from(row)
            .map_err(|_| ReconError::SnapshotLoad { kind, reason: "column count".into() })?;

        if !id.is_empty() {
            if name.is_empty() {
                skip(&mut skipped, kind, line, "template row without a name");
                current = None;
                continue;
            }
            current = Some(match templates.iter().position(|t| t.template_id == id) {
                Some(i) => i,
                None => {
                    templates.push(TemplateRecord {
                        template_id: id,
                        template_name: name,
                        axes: Vec::new(),
                        origin: TemplateOrigin::Existing,
                    });
                    templates.len() - 1
                }
            });
        }

        if desc.is_empty() && value_id.is_empty() {
            continue;
        }
        let Some(i) = current else {
            skip(&mut skipped, kind, line, "value row before any template");
            continue;
        };
        let Some((attr, value)) = split_attribute_value(&desc) else {
            skip(&mut skipped, kind, line, format!("expected 'Attr: Value', got '{desc}'"));
            continue;
        };
        if value_id.is_empty() {
            skip(&mut skipped, kind, line, "template value without an id");
            continue;
        }

        let axis_name = attr.to_lowercase();
        let template = &mut templates[i];
        let axis = match template.axes.iter().position(|a| a.name == axis_name) {
            Some(a) => &mut template.axes[a],
            None => {
                template.axes.push(TemplateAxis {
                    key: canonical_key(&axis_name),
                    name: axis_name,
                    values: Vec::new(),
                });
                let last = template.axes.len() - 1;
                &mut template.axes[last]
            }
        };
        axis.values.push(NamedId::new(value, value_id));
    }

    tracing::info!(templates = templates.len(), "loaded template export");
    Ok(Loaded { value: templates, skipped })
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// Columns `ID, Name, Variant Values`. A variant's extra attributes follow
/// on rows with blank `ID` and `Name`.
pub fn load_variants(csv_data: &str) -> Result<Loaded<Vec<ExistingVariant>>, ReconError> {
    let kind = SnapshotKind::Variants;
    let mut skipped = Vec::new();
    let rows = read_rows(kind, csv_data, &["ID", "Name", "Variant Values"], &mut skipped)?;

    let mut variants: Vec<ExistingVariant> = Vec::new();
    let mut open = false;
    for (line, row) in rows {
        let [id, name, values] = <[String; 3]>::try_from(row)
            .map_err(|_| ReconError::SnapshotLoad { kind, reason: "column count".into() })?;

        if !id.is_empty() {
            if name.is_empty() {
                skip(&mut skipped, kind, line, "variant row without a Name");
                open = false;
                continue;
            }
            variants.push(ExistingVariant {
                variant_id: id,
                template_name: name,
                signature: Vec::new(),
            });
            open = true;
        } else if !name.is_empty() {
            skip(&mut skipped, kind, line, "variant row without an ID");
            open = false;
            continue;
        } else if !open {
            if !values.is_empty() {
                skip(&mut skipped, kind, line, "continuation row without a variant");
            }
            continue;
        }

        if values.is_empty() {
            continue;
        }
        let Some((attr, value)) = split_attribute_value(&values) else {
            skip(&mut skipped, kind, line, format!("expected 'Attr: Value', got '{values}'"));
            continue;
        };
        if let Some(variant) = variants.last_mut() {
            variant.signature.push((attr.to_lowercase(), value.to_string()));
        }
    }

    tracing::info!(variants = variants.len(), "loaded variant export");
    Ok(Loaded { value: variants, skipped })
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Columns `id, name`.
pub fn load_categories(
    csv_data: &str,
    index: &mut CategoryIndex,
) -> Result<Vec<SkippedRow>, ReconError> {
    let kind = SnapshotKind::Categories;
    let mut skipped = Vec::new();
    for (line, row) in read_rows(kind, csv_data, &["id", "name"], &mut skipped)? {
        match row.as_slice() {
            [id, name] if !id.is_empty() && !name.is_empty() => {
                index.ids_by_name.entry(name.clone()).or_insert_with(|| id.clone());
            }
            _ => skip(&mut skipped, kind, line, "category row needs both id and name"),
        }
    }
    Ok(skipped)
}

#[derive(Debug, Deserialize)]
struct Assignment {
    product_name: Option<String>,
    category_name: Option<String>,
}

/// JSON array of `{product_name, category_name}`.
pub fn load_category_assignments(
    json: &str,
    index: &mut CategoryIndex,
) -> Result<Vec<SkippedRow>, ReconError> {
    let kind = SnapshotKind::CategoryAssignments;
    let items: Vec<serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| ReconError::SnapshotLoad { kind, reason: e.to_string() })?;

    let mut skipped = Vec::new();
    for (pos, item) in items.into_iter().enumerate() {
        let line = pos + 1;
        match serde_json::from_value::<Assignment>(item) {
            Ok(Assignment { product_name: Some(product), category_name: Some(category) })
                if !product.trim().is_empty() && !category.trim().is_empty() =>
            {
                index
                    .assignments
                    .insert(product.trim().to_string(), category.trim().to_string());
            }
            Ok(_) => skip(
                &mut skipped,
                kind,
                line,
                "assignment needs product_name and category_name",
            ),
            Err(e) => skip(&mut skipped, kind, line, e.to_string()),
        }
    }
    Ok(skipped)
}
