//! Template planning: decide, per product group, which template it lands in
//! and what the catalog must gain for that to work.

use std::collections::BTreeSet;

use rust_decimal::Decimal;

use crate::aggregate::{average_price, GroupAxis, TemplateGroup};
use crate::config::TemplatesConfig;
use crate::matcher::{match_catalog, TemplateRef};
use crate::model::{
    AttributeLine, Attributes, CatalogSnapshot, NamedId, NewTemplate, ProductRecord,
    TemplateAttributeUpdate, TemplateAxis, TemplateOrigin, TemplateRecord,
};
use crate::normalize::sanitize;
use crate::similarity::FuzzyMatcher;
use crate::vocabulary::{VocabularyBuilder, VocabularyPlan};

/// Axis key carrying the folded hardware label.
pub const VARIANT_TYPE: &str = "variant_type";

/// Preferred axis order on new templates; other keys follow in first-seen order.
const AXIS_PRIORITY: &[&str] = &[
    "flavor",
    "nicotine_level",
    "resistance",
    "coil_type",
    "color",
    "model",
];

/// Label parts, in this order, before any remaining attributes.
const HARDWARE_LABEL_KEYS: &[&str] = &["coil_type", "resistance", "color", "size"];

#[derive(Debug, Clone, Default)]
pub struct TemplatePlan {
    /// Templates created in this run, with vocabulary ids on their axes.
    pub synthesized: Vec<TemplateRecord>,
    pub new_templates: Vec<NewTemplate>,
    pub template_updates: Vec<TemplateAttributeUpdate>,
    pub vocabulary: VocabularyPlan,
}

/// A template being synthesized, before vocabulary ids are known.
#[derive(Debug)]
struct Draft {
    template_id: String,
    name: String,
    axes: Vec<GroupAxis>,
    prices: Vec<Decimal>,
    members: usize,
    folded: bool,
}

impl Draft {
    fn merge_axes(&mut self, axes: &[GroupAxis]) {
        for axis in axes {
            merge_axis(&mut self.axes, &axis.key, &axis.values);
        }
    }

    /// Folded drafts with a single member end up without axes.
    fn is_simple(&self) -> bool {
        self.folded && self.members <= 1
    }
}

/// Pending attribute line on an existing template.
#[derive(Debug)]
struct PendingUpdate {
    template: usize,
    key: String,
    values: Vec<String>,
}

fn merge_axis(axes: &mut Vec<GroupAxis>, key: &str, values: &[String]) {
    match axes.iter_mut().find(|a| a.key == key) {
        Some(axis) => merge_values(&mut axis.values, values),
        None => {
            let mut axis = GroupAxis { key: key.to_string(), values: Vec::new() };
            merge_values(&mut axis.values, values);
            axes.push(axis);
        }
    }
}

/// Append values not yet present, compared case-insensitively.
fn merge_values(target: &mut Vec<String>, values: &[String]) {
    for value in values {
        let lower = value.to_lowercase();
        if !target.iter().any(|v| v.to_lowercase() == lower) {
            target.push(value.clone());
        }
    }
}

/// An observed axis value, tagged with the draft it feeds (if any).
struct Observation {
    draft: Option<usize>,
    key: String,
    value: String,
}

/// Plan templates for every group.
///
/// Folding a hardware group appends a `variant_type` entry to each member's
/// attributes, so `attributes` is updated in place.
pub fn plan_templates(
    groups: Vec<TemplateGroup>,
    products: &[ProductRecord],
    attributes: &mut [Attributes],
    snapshot: &CatalogSnapshot,
    matcher: &FuzzyMatcher,
    config: &TemplatesConfig,
) -> TemplatePlan {
    let existing = &snapshot.templates;
    let mut drafts: Vec<Draft> = Vec::new();
    // Name-only records so drafts can be matched like any other template.
    let mut draft_records: Vec<TemplateRecord> = Vec::new();
    let mut updates: Vec<PendingUpdate> = Vec::new();
    let mut observations: Vec<Observation> = Vec::new();
    let mut used_ids: BTreeSet<String> = existing.iter().map(|t| t.template_id.clone()).collect();

    for mut group in groups {
        match match_catalog(&group.name, existing, &draft_records, matcher) {
            Some(TemplateRef::Existing(i)) => {
                let template = &existing[i];
                for axis in group.axes.iter().filter(|a| !template.has_axis(&a.key)) {
                    tracing::debug!(
                        template = %template.template_name,
                        axis = %axis.key,
                        "planning attribute line"
                    );
                    observe(&mut observations, None, axis);
                    match updates.iter_mut().find(|u| u.template == i && u.key == axis.key) {
                        Some(pending) => merge_values(&mut pending.values, &axis.values),
                        None => updates.push(PendingUpdate {
                            template: i,
                            key: axis.key.clone(),
                            values: axis.values.clone(),
                        }),
                    }
                }
            }
            Some(TemplateRef::Synthesized(j)) => {
                let draft = &mut drafts[j];
                if draft.folded {
                    fold_group(&mut group, products, attributes);
                }
                for axis in &group.axes {
                    observe(&mut observations, Some(j), axis);
                }
                draft.merge_axes(&group.axes);
                draft.prices.extend(group.prices.iter().copied());
                draft.members += group.members.len();
            }
            None if config.create_missing => {
                let folded = config.hardware_fold
                    && !group.has_axis("flavor")
                    && !group.has_axis("nicotine_level");
                if folded {
                    fold_group(&mut group, products, attributes);
                }
                for axis in &group.axes {
                    observe(&mut observations, Some(drafts.len()), axis);
                }
                let template_id = unique_template_id(&group.name, &mut used_ids);
                tracing::debug!(name = %group.name, id = %template_id, folded, "synthesizing template");
                draft_records.push(TemplateRecord {
                    template_id: template_id.clone(),
                    template_name: group.name.clone(),
                    axes: Vec::new(),
                    origin: TemplateOrigin::Synthesized,
                });
                drafts.push(Draft {
                    template_id,
                    name: group.name,
                    axes: group.axes,
                    prices: group.prices,
                    members: group.members.len(),
                    folded,
                });
            }
            None => {
                tracing::debug!(name = %group.name, "no template and creation disabled");
            }
        }
    }

    for draft in drafts.iter_mut().filter(|d| d.is_simple()) {
        draft.axes.clear();
    }

    let mut builder = VocabularyBuilder::new(&snapshot.vocabulary);
    for obs in &observations {
        if obs.draft.is_some_and(|j| drafts[j].is_simple()) {
            continue;
        }
        builder.observe(&obs.key, &obs.value);
    }
    let vocabulary = builder.build();

    let mut synthesized = Vec::with_capacity(drafts.len());
    let mut new_templates = Vec::with_capacity(drafts.len());
    for draft in &drafts {
        let axes = ordered_axes(&draft.axes, &vocabulary);
        new_templates.push(NewTemplate {
            template_id: draft.template_id.clone(),
            name: draft.name.clone(),
            category_id: snapshot
                .categories
                .category_id(&draft.name, &config.default_category),
            product_type: config.product_type.clone(),
            list_price: average_price(&draft.prices),
            lines: axes.iter().map(|(line, _)| line.clone()).collect(),
        });
        synthesized.push(TemplateRecord {
            template_id: draft.template_id.clone(),
            template_name: draft.name.clone(),
            axes: axes.into_iter().map(|(_, axis)| axis).collect(),
            origin: TemplateOrigin::Synthesized,
        });
    }

    // Distinct keys can resolve to one attribute; emit one line per pair.
    let mut template_updates: Vec<TemplateAttributeUpdate> = Vec::new();
    for pending in updates {
        let Some(attribute) = vocabulary.attribute(&pending.key) else {
            continue;
        };
        let template = &existing[pending.template];
        let ids = value_ids(&vocabulary, &pending.key, &pending.values);
        match template_updates.iter_mut().find(|u| {
            u.template_id == template.template_id && u.attribute_id == attribute.attribute_id
        }) {
            Some(update) => {
                for id in ids {
                    if !update.value_ids.contains(&id) {
                        update.value_ids.push(id);
                    }
                }
            }
            None => template_updates.push(TemplateAttributeUpdate {
                template_id: template.template_id.clone(),
                template_name: template.template_name.clone(),
                attribute_id: attribute.attribute_id.clone(),
                value_ids: ids,
            }),
        }
    }

    tracing::info!(
        synthesized = synthesized.len(),
        new_values = vocabulary.new_values().len(),
        "planned templates"
    );

    TemplatePlan {
        synthesized,
        new_templates,
        template_updates,
        vocabulary,
    }
}

fn observe(observations: &mut Vec<Observation>, draft: Option<usize>, axis: &GroupAxis) {
    for value in &axis.values {
        observations.push(Observation {
            draft,
            key: axis.key.clone(),
            value: value.clone(),
        });
    }
}

fn value_ids(vocabulary: &VocabularyPlan, key: &str, values: &[String]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for value in values {
        if let Some(id) = vocabulary.value_id(key, value) {
            if !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}

/// Axes in priority order, each paired with its attribute line.
fn ordered_axes(axes: &[GroupAxis], vocabulary: &VocabularyPlan) -> Vec<(AttributeLine, TemplateAxis)> {
    let rank = |key: &str| AXIS_PRIORITY.iter().position(|p| *p == key).unwrap_or(AXIS_PRIORITY.len());
    let mut sorted: Vec<&GroupAxis> = axes.iter().collect();
    // Stable: unranked keys keep first-seen order.
    sorted.sort_by_key(|a| rank(&a.key));

    sorted
        .into_iter()
        .filter_map(|axis| {
            let attribute = vocabulary.attribute(&axis.key)?;
            let values: Vec<NamedId> = axis
                .values
                .iter()
                .filter_map(|v| attribute.value_id(v).map(|id| NamedId::new(v.clone(), id)))
                .collect();
            let line = AttributeLine {
                attribute_id: attribute.attribute_id.clone(),
                value_ids: value_ids(vocabulary, &axis.key, &axis.values),
            };
            let template_axis = TemplateAxis {
                name: attribute.name.to_lowercase(),
                key: axis.key.clone(),
                values,
            };
            Some((line, template_axis))
        })
        .collect()
}

/// `template_` + sanitized name, suffixed `_2`, `_3`, ... on collision.
pub fn unique_template_id(name: &str, used: &mut BTreeSet<String>) -> String {
    let base = format!("template_{}", sanitize(name));
    let mut candidate = base.clone();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{base}_{n}");
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// Replace the group's axes with one `variant_type` axis of member labels.
fn fold_group(group: &mut TemplateGroup, products: &[ProductRecord], attributes: &mut [Attributes]) {
    let mut labels = Vec::with_capacity(group.members.len());
    for &position in &group.members {
        let label = hardware_label(&products[position], &attributes[position]);
        attributes[position].push(VARIANT_TYPE, label.clone());
        labels.push(label);
    }
    group.axes.clear();
    merge_axis(&mut group.axes, VARIANT_TYPE, &labels);
}

/// Space-joined hardware attributes, or `Variant <sku>` when there are none.
pub fn hardware_label(product: &ProductRecord, attributes: &Attributes) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for key in HARDWARE_LABEL_KEYS {
        if let Some(value) = attributes.get(key) {
            parts.push(value);
        }
    }
    for (key, value) in attributes.iter() {
        let skip = HARDWARE_LABEL_KEYS.contains(&key) || key == "brand" || key == VARIANT_TYPE;
        if !skip && !parts.contains(&value) {
            parts.push(value);
        }
    }
    if !parts.is_empty() {
        return parts.join(" ");
    }
    if product.sku.is_empty() {
        format!("Variant #{}", product.index)
    } else {
        format!("Variant {}", product.sku)
    }
}
