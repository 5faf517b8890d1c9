//! Shared fuzzy comparison used by template and value matching.

use std::collections::BTreeSet;

/// Lower-cased words, split on whitespace and hyphens.
pub fn words(s: &str) -> BTreeSet<String> {
    s.split(|c: char| c.is_whitespace() || c == '-')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// `|a ∩ b| / min(|a|, |b|)` over word sets. Zero when either side has no words.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let wa = words(a);
    let wb = words(b);
    let smaller = wa.len().min(wb.len());
    if smaller == 0 {
        return 0.0;
    }
    let common = wa.intersection(&wb).count();
    common as f64 / smaller as f64
}

/// Case-insensitive containment in either direction. Blank sides never match.
pub fn contains_either(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatcher {
    pub threshold: f64,
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn overlaps(&self, a: &str, b: &str) -> bool {
        word_overlap(a, b) >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_split_on_hyphen_and_space() {
        let w = words("ACME - Juice-Line  60ml");
        assert_eq!(
            w.into_iter().collect::<Vec<_>>(),
            vec!["60ml", "acme", "juice", "line"]
        );
    }

    #[test]
    fn overlap_uses_smaller_set() {
        assert_eq!(word_overlap("ACME Juice Line", "ACME Juice Line Mango 60ml"), 1.0);
        assert!((word_overlap("ACME Juice Line", "ACME Tank Line") - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(word_overlap("", "ACME"), 0.0);
        assert_eq!(word_overlap(" - ", "ACME"), 0.0);
    }

    #[test]
    fn containment_is_case_insensitive_and_rejects_blank() {
        assert!(contains_either("ACME Juice", "acme juice line"));
        assert!(contains_either("acme juice line", "JUICE"));
        assert!(!contains_either("", "anything"));
        assert!(!contains_either("Mango", "Peach"));
    }

    #[test]
    fn matcher_threshold_is_inclusive() {
        let m = FuzzyMatcher::new(0.5);
        assert!(m.overlaps("alpha beta", "alpha gamma"));
        assert!(!FuzzyMatcher::new(0.7).overlaps("alpha beta", "alpha gamma"));
    }
}
