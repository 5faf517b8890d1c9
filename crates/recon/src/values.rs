//! Resolve a product's attributes to template value ids.

use crate::error::ResolutionFailure;
use crate::model::{Attributes, NamedId, TemplateRecord};
use crate::normalize::{first_number, is_numeric_like};
use crate::similarity::{contains_either, FuzzyMatcher};

/// Value ids for every template axis the product resolves, in axis order.
///
/// Unresolved axes are skipped. A template with axes but no resolved axis
/// fails; a template without axes yields an empty set.
pub fn resolve_values(
    attributes: &Attributes,
    template: &TemplateRecord,
    matcher: &FuzzyMatcher,
) -> Result<Vec<String>, ResolutionFailure> {
    let mut ids: Vec<String> = Vec::new();
    for axis in &template.axes {
        let found = attributes
            .iter()
            .filter(|(key, _)| *key == axis.key)
            .find_map(|(_, value)| best_value_match(value, &axis.values, matcher));
        match found {
            Some(hit) => {
                if !ids.contains(&hit.id) {
                    ids.push(hit.id.clone());
                }
            }
            None => tracing::debug!(
                template = %template.template_name,
                axis = %axis.key,
                "axis unresolved"
            ),
        }
    }

    if ids.is_empty() && !template.axes.is_empty() {
        return Err(ResolutionFailure::AttributeCombination);
    }
    Ok(ids)
}

/// Exact, then numeric, then containment, then word overlap.
pub fn best_value_match<'a>(
    value: &str,
    candidates: &'a [NamedId],
    matcher: &FuzzyMatcher,
) -> Option<&'a NamedId> {
    let wanted = value.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    if let Some(hit) = candidates.iter().find(|c| c.name.trim().to_lowercase() == wanted) {
        return Some(hit);
    }

    if is_numeric_like(&wanted) {
        if let Some(number) = first_number(&wanted) {
            let hit = candidates.iter().find(|c| first_number(&c.name) == Some(number));
            if hit.is_some() {
                return hit;
            }
        }
    }

    candidates
        .iter()
        .find(|c| contains_either(&wanted, &c.name))
        .or_else(|| candidates.iter().find(|c| matcher.overlaps(&wanted, &c.name)))
}
