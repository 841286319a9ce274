//! Rule evaluation engine.
//!
//! Walks a scope's rules in configuration order against the attribute bag.
//! For each rule whose attribute is present, patterns are tried in order and
//! for each pattern every value in order. The first (pattern, value) hit
//! anywhere ends evaluation: later rules are never consulted.
//!
//! With no hit, an allow-list scope denies and a deny-list scope allows.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attributes::AttributeBag;
use crate::policy::{Effect, LocalizedText, PolicyScope};

// ============================================================================
// Decision
// ============================================================================

/// The (attribute, pattern, value) triple that decided a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub attribute: String,
    pub pattern: String,
    pub value: String,
}

/// What the rejection page shows, copied from the deciding scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Localized rejection text; `None` means use the generic text.
    pub message: Option<LocalizedText>,
    /// Logo shown next to the text.
    pub logo: Option<String>,
}

/// The result of evaluating an attribute bag against a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether access is allowed or denied.
    pub effect: Effect,
    /// The match that ended evaluation, if any.
    pub matched: Option<RuleMatch>,
    /// Present only when `effect` is `Deny`.
    pub rejection: Option<Rejection>,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Evaluates `attributes` against `scope`.
///
/// Never fails: patterns were validated when the scope was built. Holds no
/// state, so the same inputs always produce the same decision.
pub fn evaluate(scope: &PolicyScope, attributes: &AttributeBag) -> Decision {
    let matched = first_match(scope, attributes);
    let authorized = if matched.is_some() {
        !scope.deny_on_match()
    } else {
        scope.deny_on_match()
    };

    if authorized {
        return Decision {
            effect: Effect::Allow,
            matched,
            rejection: None,
        };
    }

    let message = scope.reject_message();
    Decision {
        effect: Effect::Deny,
        matched,
        rejection: Some(Rejection {
            message: (!message.is_empty()).then(|| message.clone()),
            logo: scope.logo().map(str::to_string),
        }),
    }
}

/// Finds the first matching triple in evaluation order.
fn first_match(scope: &PolicyScope, attributes: &AttributeBag) -> Option<RuleMatch> {
    for rule in scope.rules() {
        let Some(values) = attributes.get(rule.attribute()) else {
            continue;
        };

        for pattern in rule.patterns() {
            if let Some(value) = values.iter().find(|value| pattern.matches(value)) {
                debug!(
                    attribute = %rule.attribute(),
                    pattern = %pattern.source(),
                    "Attribute value matched a rule"
                );
                return Some(RuleMatch {
                    attribute: rule.attribute().to_string(),
                    pattern: pattern.source().to_string(),
                    value: value.clone(),
                });
            }
        }
    }

    None
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MatchMode;
    use proptest::prelude::*;

    fn allow_list(attribute: &str, patterns: &[&str]) -> PolicyScope {
        PolicyScope::builder()
            .rule(attribute, patterns.iter().copied())
            .build()
            .expect("build scope")
    }

    fn deny_list(attribute: &str, patterns: &[&str]) -> PolicyScope {
        PolicyScope::builder()
            .deny_on_match(true)
            .rule(attribute, patterns.iter().copied())
            .build()
            .expect("build scope")
    }

    fn bag(attribute: &str, values: &[&str]) -> AttributeBag {
        AttributeBag::new().with(attribute, values.iter().copied())
    }

    #[test]
    fn test_allow_list_without_match_denies() {
        let decision = evaluate(
            &allow_list("affiliation", &["staff"]),
            &bag("affiliation", &["student"]),
        );
        assert_eq!(decision.effect, Effect::Deny);
        assert!(decision.matched.is_none());
    }

    #[test]
    fn test_allow_list_match_allows() {
        let decision = evaluate(
            &allow_list("affiliation", &["staff"]),
            &bag("affiliation", &["staff"]),
        );
        assert_eq!(decision.effect, Effect::Allow);
        assert!(decision.rejection.is_none());
        assert_eq!(
            decision.matched,
            Some(RuleMatch {
                attribute: "affiliation".to_string(),
                pattern: "staff".to_string(),
                value: "staff".to_string(),
            })
        );
    }

    #[test]
    fn test_deny_list_without_match_allows() {
        let decision = evaluate(
            &deny_list("affiliation", &["blocked"]),
            &bag("affiliation", &["staff"]),
        );
        assert_eq!(decision.effect, Effect::Allow);
    }

    #[test]
    fn test_deny_list_match_denies() {
        let decision = evaluate(
            &deny_list("affiliation", &["blocked"]),
            &bag("affiliation", &["blocked"]),
        );
        assert_eq!(decision.effect, Effect::Deny);
        assert!(decision.rejection.is_some());
    }

    #[test]
    fn test_first_match_wins_across_rules() {
        // Rule 1 misses, rule 2 hits, rule 3 would also hit with a different
        // pattern. Evaluation must stop at rule 2.
        let scope = PolicyScope::builder()
            .deny_on_match(true)
            .rule("uid", ["^nobody$"])
            .rule("affiliation", ["^member$"])
            .rule("mail", ["@example\\.org$"])
            .build()
            .expect("build");

        let attributes = AttributeBag::new()
            .with("uid", ["alice"])
            .with("affiliation", ["member"])
            .with("mail", ["alice@example.org"]);

        let decision = evaluate(&scope, &attributes);
        assert_eq!(decision.effect, Effect::Deny);
        let matched = decision.matched.expect("a rule matched");
        assert_eq!(matched.attribute, "affiliation");
        assert_eq!(matched.pattern, "^member$");
    }

    #[test]
    fn test_patterns_outer_values_inner() {
        let scope = allow_list("entitlement", &["^b$", "^a$"]);
        let decision = evaluate(&scope, &bag("entitlement", &["a", "b"]));
        // Pattern "^b$" is tried against every value before "^a$".
        assert_eq!(decision.matched.expect("matched").value, "b");
    }

    #[test]
    fn test_literal_vs_regex_mode() {
        let literal = PolicyScope::builder()
            .match_mode(MatchMode::Literal)
            .rule("affiliation", ["^staff$"])
            .build()
            .expect("build");
        assert!(!evaluate(&literal, &bag("affiliation", &["staff"])).is_allowed());
        assert!(evaluate(&literal, &bag("affiliation", &["^staff$"])).is_allowed());

        let regex = allow_list("affiliation", &["^staff$"]);
        assert!(evaluate(&regex, &bag("affiliation", &["staff"])).is_allowed());
        assert!(!evaluate(&regex, &bag("affiliation", &["staffing"])).is_allowed());
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        for mode in [MatchMode::Regex, MatchMode::Literal] {
            let scope = PolicyScope::builder()
                .match_mode(mode)
                .deny_on_match(true)
                .rule("affiliation", [".*"])
                .build()
                .expect("build");
            let decision = evaluate(&scope, &bag("uid", &[".*"]));
            assert!(decision.is_allowed(), "mode {mode:?}");
            assert!(decision.matched.is_none());
        }
    }

    #[test]
    fn test_empty_value_list_never_matches() {
        let scope = deny_list("affiliation", &[".*"]);
        let decision = evaluate(&scope, &bag("affiliation", &[]));
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_rule_without_patterns_never_matches() {
        let scope = allow_list("affiliation", &[]);
        assert!(!evaluate(&scope, &bag("affiliation", &["staff"])).is_allowed());
    }

    #[test]
    fn test_duplicate_attribute_rules_are_independent() {
        let scope = PolicyScope::builder()
            .rule("affiliation", ["^faculty$"])
            .rule("affiliation", ["^staff$"])
            .build()
            .expect("build");
        let decision = evaluate(&scope, &bag("affiliation", &["staff"]));
        assert!(decision.is_allowed());
        assert_eq!(decision.matched.expect("matched").pattern, "^staff$");
    }

    #[test]
    fn test_rejection_payload_is_copied() {
        let message = LocalizedText::new().with("en", "Not for you");
        let scope = PolicyScope::builder()
            .reject_message(message.clone())
            .logo("https://example.org/logo.svg")
            .rule("affiliation", ["staff"])
            .build()
            .expect("build");

        let decision = evaluate(&scope, &AttributeBag::new());
        let rejection = decision.rejection.expect("denied");
        assert_eq!(rejection.message, Some(message));
        assert_eq!(rejection.logo.as_deref(), Some("https://example.org/logo.svg"));
    }

    #[test]
    fn test_rejection_payload_absent_when_unconfigured() {
        let decision = evaluate(&allow_list("affiliation", &["staff"]), &AttributeBag::new());
        assert_eq!(decision.rejection, Some(Rejection::default()));
    }

    proptest! {
        #[test]
        fn prop_evaluation_is_idempotent(
            patterns in prop::collection::vec("[a-c]{1,2}", 0..4),
            values in prop::collection::vec("[a-c]{1,2}", 0..4),
            deny in any::<bool>(),
        ) {
            let scope = PolicyScope::builder()
                .match_mode(MatchMode::Literal)
                .deny_on_match(deny)
                .rule("attr", patterns)
                .build()
                .expect("literal scope");
            let attributes = AttributeBag::new().with("attr", values);

            let first = evaluate(&scope, &attributes);
            for _ in 0..3 {
                prop_assert_eq!(&evaluate(&scope, &attributes), &first);
            }
        }

        #[test]
        fn prop_deny_flag_inverts_effect(
            patterns in prop::collection::vec("[a-c]{1,2}", 0..4),
            values in prop::collection::vec("[a-c]{1,2}", 0..4),
        ) {
            let build = |deny: bool| {
                PolicyScope::builder()
                    .match_mode(MatchMode::Literal)
                    .deny_on_match(deny)
                    .rule("attr", patterns.clone())
                    .build()
                    .expect("literal scope")
            };
            let attributes = AttributeBag::new().with("attr", values.clone());

            let allow_list = evaluate(&build(false), &attributes);
            let deny_list = evaluate(&build(true), &attributes);
            prop_assert_ne!(allow_list.effect, deny_list.effect);
            prop_assert_eq!(allow_list.matched.is_some(), values.iter().any(|v| patterns.contains(v)));
        }
    }
}
