//! Attribute vocabulary: what the downstream system already knows, and the
//! plan for what this run adds to it.

use std::collections::BTreeMap;

use crate::model::{DisplayKind, NamedId, NewVocabularyValue, VocabularyEntry};
use crate::normalize::{canonical_key, display_name, is_numeric_like, sanitize};

/// Existing attributes read from the vocabulary export.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    entries: Vec<VocabularyEntry>,
}

impl Vocabulary {
    pub fn new(entries: Vec<VocabularyEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive name match (snake and spaced forms), then alias match.
    pub fn resolve_attribute(&self, key: &str) -> Option<&VocabularyEntry> {
        let lower = key.trim().to_lowercase();
        let spaced = lower.replace('_', " ");
        let snake = lower.replace(' ', "_");
        self.entries
            .iter()
            .find(|e| {
                let name = e.canonical_name.trim().to_lowercase();
                name == lower || name == spaced || name == snake
            })
            .or_else(|| {
                let wanted = canonical_key(key);
                self.entries.iter().find(|e| canonical_key(&e.canonical_name) == wanted)
            })
    }
}

/// Case-insensitive, trimmed value lookup within one attribute.
pub fn resolve_value<'a>(entry: &'a VocabularyEntry, value: &str) -> Option<&'a NamedId> {
    find_value(&entry.values, value)
}

fn find_value<'a>(values: &'a [NamedId], value: &str) -> Option<&'a NamedId> {
    let wanted = value.trim().to_lowercase();
    values.iter().find(|v| v.name.trim().to_lowercase() == wanted)
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// One attribute as it will exist after the run.
#[derive(Debug, Clone)]
pub struct PlannedAttribute {
    pub key: String,
    pub attribute_id: String,
    pub name: String,
    pub display_kind: DisplayKind,
    pub is_new: bool,
    /// Existing values first, then values added by this run.
    pub values: Vec<NamedId>,
}

impl PlannedAttribute {
    pub fn value_id(&self, value: &str) -> Option<&str> {
        find_value(&self.values, value).map(|v| v.id.as_str())
    }
}

/// Collects observed `(key, value)` pairs against the existing vocabulary.
#[derive(Debug)]
pub struct VocabularyBuilder<'a> {
    vocabulary: &'a Vocabulary,
    attributes: Vec<PlannedAttribute>,
    /// Distinct values seen per attribute, for the display-kind decision.
    observed: Vec<Vec<String>>,
    by_key: BTreeMap<String, usize>,
    new_values: Vec<(usize, String, String)>,
}

impl<'a> VocabularyBuilder<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self {
            vocabulary,
            attributes: Vec::new(),
            observed: Vec::new(),
            by_key: BTreeMap::new(),
            new_values: Vec::new(),
        }
    }

    pub fn observe(&mut self, key: &str, value: &str) {
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return;
        }
        let slot = self.attribute_slot(key);

        let seen = &mut self.observed[slot];
        if !seen.iter().any(|v| v.eq_ignore_ascii_case(value)) {
            seen.push(value.to_string());
        }

        let attribute = &mut self.attributes[slot];
        if find_value(&attribute.values, value).is_some() {
            return;
        }
        let value_id = format!("value_{}_{}", sanitize(&attribute.key), sanitize(value));
        if attribute.values.iter().any(|v| v.id == value_id) {
            // Spelling variant of a value already planned under the same id.
            return;
        }
        attribute.values.push(NamedId::new(value, value_id.clone()));
        self.new_values.push((slot, value.to_string(), value_id));
    }

    fn attribute_slot(&mut self, key: &str) -> usize {
        if let Some(&slot) = self.by_key.get(key) {
            return slot;
        }
        let planned = match self.vocabulary.resolve_attribute(key) {
            Some(entry) => PlannedAttribute {
                key: key.to_string(),
                attribute_id: entry.attribute_id.clone(),
                name: entry.canonical_name.clone(),
                display_kind: entry.display_kind,
                is_new: false,
                values: entry.values.clone(),
            },
            None => PlannedAttribute {
                key: key.to_string(),
                attribute_id: format!("attr_{}", sanitize(key)),
                name: display_name(key),
                display_kind: DisplayKind::Radio,
                is_new: true,
                values: Vec::new(),
            },
        };
        let slot = match self
            .attributes
            .iter()
            .position(|a| a.attribute_id == planned.attribute_id)
        {
            Some(slot) => slot,
            None => {
                self.attributes.push(planned);
                self.observed.push(Vec::new());
                self.attributes.len() - 1
            }
        };
        self.by_key.insert(key.to_string(), slot);
        slot
    }

    pub fn build(mut self) -> VocabularyPlan {
        for (attribute, seen) in self.attributes.iter_mut().zip(&self.observed) {
            if attribute.is_new {
                attribute.display_kind = display_kind_for(seen);
            }
        }
        let new_values = self
            .new_values
            .into_iter()
            .map(|(slot, value, value_id)| {
                let attribute = &self.attributes[slot];
                NewVocabularyValue {
                    attribute_id: attribute.attribute_id.clone(),
                    attribute_name: attribute.name.clone(),
                    display_kind: attribute.display_kind,
                    attribute_is_new: attribute.is_new,
                    value,
                    value_id,
                }
            })
            .collect();
        VocabularyPlan {
            attributes: self.attributes,
            by_key: self.by_key,
            new_values,
        }
    }
}

/// Radio when at least 80% of values are numeric, Select above ten values.
pub fn display_kind_for(values: &[String]) -> DisplayKind {
    let numeric = values.iter().filter(|v| is_numeric_like(v)).count();
    if numeric as f64 >= values.len() as f64 * 0.8 {
        DisplayKind::Radio
    } else if values.len() > 10 {
        DisplayKind::Select
    } else {
        DisplayKind::Radio
    }
}

/// Resolved vocabulary for every attribute observed in the run.
#[derive(Debug, Clone, Default)]
pub struct VocabularyPlan {
    attributes: Vec<PlannedAttribute>,
    by_key: BTreeMap<String, usize>,
    new_values: Vec<NewVocabularyValue>,
}

impl VocabularyPlan {
    pub fn attribute(&self, key: &str) -> Option<&PlannedAttribute> {
        self.by_key.get(key).map(|&slot| &self.attributes[slot])
    }

    pub fn value_id(&self, key: &str, value: &str) -> Option<&str> {
        self.attribute(key).and_then(|a| a.value_id(value))
    }

    pub fn new_values(&self) -> &[NewVocabularyValue] {
        &self.new_values
    }

    pub fn into_new_values(self) -> Vec<NewVocabularyValue> {
        self.new_values
    }
}
