//! Policy check command.

use std::path::Path;

use anyhow::Result;
use attrgate_abac::pattern::Pattern;
use attrgate_abac::{MatchMode, PolicyScope, PolicySet};

use crate::style::colors::SemanticStyle;
use crate::style::{print_header, print_hint, print_labeled, print_spacer, print_success};

/// Compiles the policy at `path` and prints what each scope enforces.
pub fn run(path: &Path) -> Result<()> {
    let policy = super::compile_policy_file(path)?;

    print_success(&format!("Policy in {} is valid", path.display().code()));
    print_labeled("Mode", &policy.mode().to_string());
    print_labeled("Scopes", &policy.policies().len().to_string());

    match policy.policies() {
        PolicySet::Global(scope) => {
            print_spacer();
            print_header("global");
            print_scope(scope);
        }
        PolicySet::PerClient(scopes) => {
            if scopes.is_empty() {
                print_spacer();
                print_hint("No clients configured; every request passes through");
            }
            for id in policy.policies().client_ids() {
                let Some(scope) = scopes.get(id) else {
                    continue;
                };
                print_spacer();
                print_header(&format!("client {id}"));
                print_scope(scope);
            }
        }
    }

    Ok(())
}

fn print_scope(scope: &PolicyScope) {
    let list = if scope.deny_on_match() {
        "deny-list (matching users are rejected)"
    } else {
        "allow-list (only matching users pass)"
    };
    let mode = match scope.match_mode() {
        MatchMode::Regex => "regex",
        MatchMode::Literal => "literal",
    };

    print_labeled("List", list);
    print_labeled("Matching", mode);

    if scope.rules().is_empty() {
        print_labeled("Rules", "none");
    } else {
        print_labeled("Rules", &scope.rules().len().to_string());
        for rule in scope.rules() {
            let patterns: Vec<&str> = rule.patterns().iter().map(Pattern::source).collect();
            println!("    {} {}", rule.attribute().code(), patterns.join(", "));
        }
    }

    let message = scope.reject_message();
    if !message.is_empty() {
        let languages: Vec<&str> = message.languages().collect();
        print_labeled("Reject message", &languages.join(", "));
    }
    if let Some(logo) = scope.logo() {
        print_labeled("Logo", logo);
    }
}
