use crate::model::TemplateRecord;
use crate::similarity::{contains_either, FuzzyMatcher};

/// Which pass produced a template match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Containment,
    Overlap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateHit {
    pub index: usize,
    pub kind: MatchKind,
}

/// Where a matched template lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateRef {
    Existing(usize),
    Synthesized(usize),
}

/// Match a name against `templates` in three passes; the first hit wins.
///
/// 1. exact equality of the trimmed names
/// 2. case-insensitive containment either way
/// 3. word overlap at or above the matcher threshold
pub fn match_template(
    name: &str,
    templates: &[TemplateRecord],
    matcher: &FuzzyMatcher,
) -> Option<TemplateHit> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let hit = |kind: MatchKind, pred: &dyn Fn(&str) -> bool| {
        templates
            .iter()
            .position(|t| pred(t.template_name.trim()))
            .map(|index| TemplateHit { index, kind })
    };

    hit(MatchKind::Exact, &|candidate: &str| candidate == name)
        .or_else(|| hit(MatchKind::Containment, &|candidate: &str| contains_either(name, candidate)))
        .or_else(|| hit(MatchKind::Overlap, &|candidate: &str| matcher.overlaps(name, candidate)))
}

/// Existing templates first, then templates synthesized earlier in the run.
pub fn match_catalog(
    name: &str,
    existing: &[TemplateRecord],
    synthesized: &[TemplateRecord],
    matcher: &FuzzyMatcher,
) -> Option<TemplateRef> {
    if let Some(hit) = match_template(name, existing, matcher) {
        tracing::debug!(
            name,
            template = %existing[hit.index].template_name,
            kind = ?hit.kind,
            "template match"
        );
        return Some(TemplateRef::Existing(hit.index));
    }
    let hit = match_template(name, synthesized, matcher)?;
    tracing::debug!(
        name,
        template = %synthesized[hit.index].template_name,
        kind = ?hit.kind,
        "synthesized template match"
    );
    Some(TemplateRef::Synthesized(hit.index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TemplateOrigin;
    use proptest::prelude::*;

    fn tpl(name: &str) -> TemplateRecord {
        TemplateRecord {
            template_id: format!("id_{name}"),
            template_name: name.into(),
            axes: vec![],
            origin: TemplateOrigin::Existing,
        }
    }

    fn m() -> FuzzyMatcher {
        FuzzyMatcher::new(0.7)
    }

    #[test]
    fn exact_beats_earlier_containment() {
        let templates = vec![tpl("ACME - Juice Line Extra"), tpl("ACME - Juice Line")];
        let hit = match_template("ACME - Juice Line", &templates, &m()).unwrap();
        assert_eq!(hit, TemplateHit { index: 1, kind: MatchKind::Exact });
    }

    #[test]
    fn containment_either_direction() {
        let templates = vec![tpl("Vapor Tank")];
        let hit = match_template("vapor tank mini", &templates, &m()).unwrap();
        assert_eq!(hit.kind, MatchKind::Containment);
    }

    #[test]
    fn overlap_pass() {
        let templates = vec![tpl("ACME Cloud Juice Series")];
        // 3 of the 3 smaller-side words appear in the candidate.
        let hit = match_template("Juice Cloud ACME", &templates, &m()).unwrap();
        assert_eq!(hit.kind, MatchKind::Overlap);
    }

    #[test]
    fn low_overlap_is_a_miss() {
        let templates = vec![tpl("ACME - Juice Line")];
        assert!(match_template("Zephyr Coil Pack", &templates, &m()).is_none());
    }

    #[test]
    fn blank_names_never_match() {
        let templates = vec![tpl(""), tpl("Widget")];
        assert!(match_template("   ", &templates, &m()).is_none());
        // An empty template name is not "contained" in everything.
        let hit = match_template("Gadget", &templates, &m());
        assert!(hit.is_none());
    }

    #[test]
    fn existing_searched_before_synthesized() {
        let existing = vec![tpl("Widget Pro")];
        let synthesized = vec![tpl("Widget Pro")];
        assert_eq!(
            match_catalog("Widget Pro", &existing, &synthesized, &m()),
            Some(TemplateRef::Existing(0))
        );
        assert_eq!(
            match_catalog("Gizmo", &existing, &[tpl("Gizmo")], &m()),
            Some(TemplateRef::Synthesized(0))
        );
    }

    proptest! {
        #[test]
        fn match_is_reflexive(name in "[A-Za-z0-9][A-Za-z0-9 -]{0,30}") {
            let templates = vec![tpl("Unrelated Thing"), tpl(&name)];
            let hit = match_template(&name, &templates, &m());
            prop_assert!(hit.is_some());
        }
    }
}
