//! Attribute name and value canonicalization.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{AttrValue, Attributes};

/// Canonical key → accepted spellings. Matching unifies spaces and underscores.
pub const ALIASES: &[(&str, &[&str])] = &[
    ("flavor", &["flavor", "flavour"]),
    (
        "nicotine_level",
        &["nicotine", "nicotine_mg", "nicotine strength", "nicotine level"],
    ),
    ("size", &["volume", "volume_ml", "capacity"]),
    ("resistance", &["resistance_ohm", "ohm"]),
    ("coil_type", &["coil_model", "coil type", "model"]),
    ("color", &["color", "colour"]),
    ("brand", &["brand"]),
];

static TRAILING_UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^()]*\)\s*$").expect("valid unit regex"));

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid number regex"));

fn unify(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Map an attribute name to its canonical key.
///
/// `"Nicotine (mg)"`, `"nicotine_mg"` and `"Nicotine Strength"` all become
/// `nicotine_level`. Names outside the alias table and its families pass
/// through lower-cased and trimmed.
pub fn canonical_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let stripped = TRAILING_UNIT.replace(&lowered, "");
    let stripped = stripped.trim();
    // A key that is nothing but a unit, e.g. "(mg)", keeps its text.
    let base = if stripped.is_empty() { lowered.as_str() } else { stripped };
    let unified = unify(base);

    for (canonical, aliases) in ALIASES {
        if unified == *canonical || aliases.iter().any(|a| unify(a) == unified) {
            return (*canonical).to_string();
        }
    }

    if unified.contains("nicotine") {
        "nicotine_level".into()
    } else if unified.contains("volume") || unified == "size" || unified.contains("capacity") {
        "size".into()
    } else if unified.contains("resistance") || unified.contains("ohm") {
        "resistance".into()
    } else if unified.contains("coil") {
        "coil_type".into()
    } else if unified.contains("flavo") {
        "flavor".into()
    } else if unified.contains("colo") {
        "color".into()
    } else {
        base.to_string()
    }
}

/// Canonicalize keys and explode list values. Blank values and nested
/// objects produce no entry.
pub fn normalize_attributes(raw: &[(String, AttrValue)]) -> Attributes {
    let mut out = Attributes::default();
    for (key, value) in raw {
        let key = canonical_key(key);
        if key.is_empty() {
            continue;
        }
        match value {
            AttrValue::Scalar(v) => push_trimmed(&mut out, &key, v),
            AttrValue::List(items) => {
                for v in items {
                    push_trimmed(&mut out, &key, v);
                }
            }
            AttrValue::Unsupported => {
                tracing::debug!(key = %key, "dropping nested attribute value");
            }
        }
    }
    out
}

fn push_trimmed(out: &mut Attributes, key: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        out.push(key, value);
    }
}

/// Digits only once `.` and `-` are removed.
pub fn is_numeric_like(value: &str) -> bool {
    let digits: String = value.trim().chars().filter(|c| *c != '.' && *c != '-').collect();
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// First `\d+(\.\d+)?` token, parsed.
pub fn first_number(value: &str) -> Option<f64> {
    NUMBER.find(value).and_then(|m| m.as_str().parse().ok())
}

/// Equal as numbers once a trailing `mg` is removed from both sides.
pub fn numeric_eq(a: &str, b: &str) -> bool {
    match (strip_mg(a).parse::<f64>(), strip_mg(b).parse::<f64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

fn strip_mg(value: &str) -> &str {
    let trimmed = value.trim();
    let lower = trimmed.to_ascii_lowercase();
    match lower.strip_suffix("mg") {
        Some(rest) => trimmed[..rest.len()].trim(),
        None => trimmed,
    }
}

/// Identifier-safe form: lower-case, non-alphanumerics to `_`, runs
/// collapsed, edges trimmed. Empty input yields `unknown`.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "unknown".into()
    } else {
        trimmed.to_string()
    }
}

/// Human-facing attribute name for a canonical key.
pub fn display_name(key: &str) -> String {
    let spelled = match key {
        "nicotine_level" => "nicotine_mg",
        "size" => "volume_ml",
        "resistance" => "resistance_ohm",
        other => other,
    };
    spelled
        .replace('_', " ")
        .split_whitespace()
        .map(|word| match word.to_lowercase().as_str() {
            "mg" => "(mg)".to_string(),
            "ml" => "(mL)".to_string(),
            "ohm" => "(Ω)".to_string(),
            _ => capitalize(word),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_table_maps_spellings() {
        assert_eq!(canonical_key("flavour"), "flavor");
        assert_eq!(canonical_key("nicotine_mg"), "nicotine_level");
        assert_eq!(canonical_key("Nicotine Strength"), "nicotine_level");
        assert_eq!(canonical_key("nicotine level"), "nicotine_level");
        assert_eq!(canonical_key("volume_ml"), "size");
        assert_eq!(canonical_key("Capacity"), "size");
        assert_eq!(canonical_key("resistance_ohm"), "resistance");
        assert_eq!(canonical_key("Coil Type"), "coil_type");
        assert_eq!(canonical_key("model"), "coil_type");
        assert_eq!(canonical_key("Colour"), "color");
    }

    #[test]
    fn strips_trailing_unit() {
        assert_eq!(canonical_key("Nicotine (mg)"), "nicotine_level");
        assert_eq!(canonical_key("Volume (mL)"), "size");
        assert_eq!(canonical_key("Resistance (Ω)"), "resistance");
    }

    #[test]
    fn family_containment_fallback() {
        assert_eq!(canonical_key("nicotine_salt_strength"), "nicotine_level");
        assert_eq!(canonical_key("tank volume"), "size");
        assert_eq!(canonical_key("coil_series"), "coil_type");
    }

    #[test]
    fn unmapped_keys_pass_through() {
        assert_eq!(canonical_key("  Pack Count "), "pack count");
        assert_eq!(canonical_key("warranty"), "warranty");
    }

    #[test]
    fn normalize_explodes_lists_and_drops_blanks() {
        let raw = vec![
            ("Flavour".to_string(), AttrValue::Scalar("  Mango ".into())),
            ("color".to_string(), AttrValue::List(vec!["Red".into(), " ".into(), "Blue".into()])),
            ("specs".to_string(), AttrValue::Unsupported),
            ("nicotine_mg".to_string(), AttrValue::Scalar("".into())),
        ];
        let attrs = normalize_attributes(&raw);
        let pairs: Vec<_> = attrs.iter().collect();
        assert_eq!(pairs, vec![("flavor", "Mango"), ("color", "Red"), ("color", "Blue")]);
    }

    #[test]
    fn numeric_helpers() {
        assert!(is_numeric_like("3"));
        assert!(is_numeric_like("0.15"));
        assert!(is_numeric_like("3-6"));
        assert!(!is_numeric_like("3mg"));
        assert!(!is_numeric_like(""));

        assert_eq!(first_number("6MG"), Some(6.0));
        assert_eq!(first_number("0.4 ohm"), Some(0.4));
        assert_eq!(first_number("Mango"), None);

        assert!(numeric_eq("3", "3mg"));
        assert!(numeric_eq("3.0", "3 MG"));
        assert!(!numeric_eq("3", "6mg"));
        assert!(!numeric_eq("Mango", "Mango"));
    }

    #[test]
    fn sanitize_ids() {
        assert_eq!(sanitize("Nicotine (mg)"), "nicotine_mg");
        assert_eq!(sanitize("  Mango--Ice!! "), "mango_ice");
        assert_eq!(sanitize("***"), "unknown");
    }

    #[test]
    fn display_names_carry_units() {
        assert_eq!(display_name("nicotine_level"), "Nicotine (mg)");
        assert_eq!(display_name("size"), "Volume (mL)");
        assert_eq!(display_name("resistance"), "Resistance (Ω)");
        assert_eq!(display_name("coil_type"), "Coil Type");
        assert_eq!(display_name("pack count"), "Pack Count");
    }
}
