//! Kani proofs for rule evaluation
//!
//! These proofs verify correctness properties of the evaluator using bounded
//! model checking. Scopes use literal matching so the harnesses stay within
//! the unwinding bounds.
//!
//! **Proof Count**: 4 proofs
//!
//! Run with: `cargo kani --tests --harness verify_*`

#[cfg(kani)]
use crate::attributes::AttributeBag;
#[cfg(kani)]
use crate::evaluator;
#[cfg(kani)]
use crate::policy::{Effect, MatchMode, PolicyScope};

/// Proof #1: Evaluation determinism
///
/// **Property**: Same inputs always produce the same decision
///
/// **Verification**:
/// - Evaluate a fixed scope and bag twice
/// - Both decisions must be identical (effect, match and rejection)
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(10)]
fn verify_evaluation_determinism() {
    let scope = PolicyScope::builder()
        .match_mode(MatchMode::Literal)
        .rule("affiliation", ["staff"])
        .build()
        .unwrap();
    let attributes = AttributeBag::new().with("affiliation", ["staff"]);

    let decision1 = evaluator::evaluate(&scope, &attributes);
    let decision2 = evaluator::evaluate(&scope, &attributes);

    // Postcondition: Identical decisions
    assert_eq!(decision1, decision2);
}

/// Proof #2: Allow-list default deny
///
/// **Property**: An allow-list scope with no matching rule denies
///
/// **Verification**:
/// - Scope allows only `staff`
/// - Request asserts `student`
/// - Must be denied with no recorded match
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(10)]
fn verify_allow_list_default_deny() {
    let scope = PolicyScope::builder()
        .match_mode(MatchMode::Literal)
        .rule("affiliation", ["staff"])
        .build()
        .unwrap();
    let attributes = AttributeBag::new().with("affiliation", ["student"]);

    let decision = evaluator::evaluate(&scope, &attributes);

    // Postcondition: Default Deny applied
    assert_eq!(decision.effect, Effect::Deny);
    assert!(decision.matched.is_none());
}

/// Proof #3: Deny-list default allow
///
/// **Property**: A deny-list scope with no matching rule allows
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(10)]
fn verify_deny_list_default_allow() {
    let scope = PolicyScope::builder()
        .match_mode(MatchMode::Literal)
        .deny_on_match(true)
        .rule("affiliation", ["blocked"])
        .build()
        .unwrap();
    let attributes = AttributeBag::new().with("affiliation", ["staff"]);

    let decision = evaluator::evaluate(&scope, &attributes);

    // Postcondition: Nothing on the blocklist, so allowed without payload
    assert_eq!(decision.effect, Effect::Allow);
    assert!(decision.rejection.is_none());
}

/// Proof #4: Absent attribute is inert
///
/// **Property**: A rule on an attribute the user does not have never matches
///
/// **Verification**:
/// - Deny-list scope blocking `affiliation`
/// - Request carries only `uid` with the same value
/// - Must be allowed (rule skipped)
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(10)]
fn verify_absent_attribute_is_inert() {
    let scope = PolicyScope::builder()
        .match_mode(MatchMode::Literal)
        .deny_on_match(true)
        .rule("affiliation", ["x"])
        .build()
        .unwrap();
    let attributes = AttributeBag::new().with("uid", ["x"]);

    let decision = evaluator::evaluate(&scope, &attributes);

    assert_eq!(decision.effect, Effect::Allow);
    assert!(decision.matched.is_none());
}
