//! Match a resolved product against variants the downstream system already has.

use crate::model::{Attributes, ExistingVariant};
use crate::normalize::{canonical_key, numeric_eq};
use crate::similarity::contains_either;

/// First variant of `template_name` whose whole signature the product
/// satisfies. An empty signature matches any product of that template.
pub fn find_existing_variant<'a>(
    attributes: &Attributes,
    template_name: &str,
    variants: &'a [ExistingVariant],
) -> Option<&'a ExistingVariant> {
    let template_name = template_name.trim().to_lowercase();
    variants
        .iter()
        .filter(|v| v.template_name.trim().to_lowercase() == template_name)
        .find(|v| {
            v.signature
                .iter()
                .all(|(attr, expected)| signature_entry_matches(attributes, attr, expected))
        })
}

fn signature_entry_matches(attributes: &Attributes, attr: &str, expected: &str) -> bool {
    let key = canonical_key(attr);
    let mut values: Vec<&str> = attributes
        .iter()
        .filter(|(k, _)| *k == key)
        .map(|(_, v)| v)
        .collect();
    if values.is_empty() {
        let raw = attr.trim().to_lowercase();
        values = attributes
            .iter()
            .filter(|(k, _)| contains_either(k, &key) || contains_either(k, &raw))
            .map(|(_, v)| v)
            .collect();
    }
    values.into_iter().any(|v| values_match(v, expected))
}

/// Case-insensitive equality, numeric equality ignoring `mg`, or containment.
pub fn values_match(product: &str, stored: &str) -> bool {
    let product = product.trim();
    let stored = stored.trim();
    product.to_lowercase() == stored.to_lowercase()
        || numeric_eq(product, stored)
        || contains_either(product, stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn variant(id: &str, template: &str, signature: &[(&str, &str)]) -> ExistingVariant {
        ExistingVariant {
            variant_id: id.into(),
            template_name: template.into(),
            signature: signature.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn empty_signature_matches_any_product_of_template() {
        let variants = vec![variant("__export__.simple_1", "Simple Widget", &[])];
        let found = find_existing_variant(&attrs(&[("color", "Teal")]), "simple widget", &variants);
        assert_eq!(found.unwrap().variant_id, "__export__.simple_1");
        assert!(find_existing_variant(&Attributes::default(), "Other Widget", &variants).is_none());
    }

    #[test]
    fn full_signature_must_match() {
        let variants = vec![
            variant("v1", "ACME - Juice Line", &[("Flavor", "Mango"), ("Nicotine Level", "3mg")]),
            variant("v2", "ACME - Juice Line", &[("Flavor", "Mango"), ("Nicotine Level", "6mg")]),
        ];
        let product = attrs(&[("flavor", "mango"), ("nicotine_level", "6")]);
        assert_eq!(
            find_existing_variant(&product, "ACME - Juice Line", &variants).unwrap().variant_id,
            "v2"
        );
    }

    #[test]
    fn missing_signature_attribute_rejects_candidate() {
        let variants = vec![variant("v1", "Tank", &[("Color", "Red"), ("Size", "5ml")])];
        assert!(find_existing_variant(&attrs(&[("color", "Red")]), "Tank", &variants).is_none());
    }

    #[test]
    fn key_containment_fallback() {
        let variants = vec![variant("v1", "Pods", &[("Pack", "2")])];
        let found = find_existing_variant(&attrs(&[("pack count", "2")]), "Pods", &variants);
        assert_eq!(found.unwrap().variant_id, "v1");
    }

    #[test]
    fn value_rules() {
        assert!(values_match("3", "3mg"));
        assert!(values_match("MANGO", "mango"));
        assert!(values_match("Mango", "Mango Ice"));
        assert!(!values_match("Peach", "Mango"));
    }
}
