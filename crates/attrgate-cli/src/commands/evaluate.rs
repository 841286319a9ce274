//! Evaluate command: trace the decision for one recorded request.
//!
//! The request is processed exactly as the filter would in a pipeline,
//! with an in-memory state store standing in for the session. On deny the
//! suspended request is loaded back to render the rejection page text.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use attrgate_abac::dispatch::TextPreference;
use attrgate_abac::{
    AuthorizeFilter, InMemoryStateStore, Outcome, RejectionPage, RequestContext, RuleMatch,
    SuspendingDispatcher,
};
use attrgate_config::AttrgateConfig;
use serde_json::{Value, json};

use crate::style::colors::SemanticStyle;
use crate::style::{print_failure, print_hint, print_labeled, print_success, print_warn};

pub struct EvaluateArgs<'a> {
    pub policy: &'a Path,
    pub request: &'a Path,
    pub language: Option<&'a str>,
    pub format: &'a str,
}

/// Returns whether the request may continue.
pub fn run(settings: &AttrgateConfig, args: &EvaluateArgs<'_>) -> Result<bool> {
    let policy = super::compile_policy_file(args.policy)?;

    let store = Arc::new(InMemoryStateStore::new());
    let dispatcher = Arc::new(SuspendingDispatcher::new(
        store.clone(),
        &settings.rejection.endpoint,
    ));
    let filter = AuthorizeFilter::new(policy, dispatcher.clone());

    let request = read_request(args.request)?;
    let outcome = filter
        .process(&request)
        .context("Authorization could not be decided")?;

    let page = match &outcome {
        Outcome::Rejected { redirect, .. } => {
            let preference = TextPreference {
                language: args.language.unwrap_or(settings.rejection.default_language.as_str()),
                default_language: &settings.rejection.default_language,
                generic_text: &settings.rejection.generic_text,
            };
            Some(RejectionPage::load(
                store.as_ref(),
                &redirect.state_id,
                dispatcher.stage(),
                &preference,
            )?)
        }
        _ => None,
    };

    if args.format == "json" {
        let report = report(&outcome, page.as_ref());
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_outcome(&outcome, page.as_ref());
    }

    Ok(outcome.passes())
}

fn read_request(path: &Path) -> Result<RequestContext> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read request from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse request in {}", path.display()))
}

fn print_outcome(outcome: &Outcome, page: Option<&RejectionPage>) {
    match outcome {
        Outcome::Allowed { subject, decision } => {
            print_success(&format!("Access allowed for {subject}"));
            print_match(decision.matched.as_ref());
        }
        Outcome::OutOfScope(reason) => {
            print_warn(&format!("Not covered by policy: {reason}"));
            print_hint("The request continues untouched");
        }
        Outcome::Rejected {
            subject,
            decision,
            redirect,
        } => {
            print_failure(&format!("Access forbidden for {subject}"));
            print_match(decision.matched.as_ref());
            print_labeled("Redirect", &redirect.endpoint);
            print_labeled("State id", &redirect.state_id);
            if let Some(page) = page {
                print_labeled("Message", &page.text);
                if let Some(logo) = &page.logo {
                    print_labeled("Logo", logo);
                }
            }
        }
    }
}

fn print_match(matched: Option<&RuleMatch>) {
    match matched {
        Some(m) => print_labeled(
            "Matched",
            &format!("{} = {} (pattern {})", m.attribute.code(), m.value, m.pattern),
        ),
        None => print_labeled("Matched", "no rule"),
    }
}

fn report(outcome: &Outcome, page: Option<&RejectionPage>) -> Value {
    match outcome {
        Outcome::Allowed { subject, decision } => json!({
            "outcome": "allowed",
            "subject": subject.to_string(),
            "matched": decision.matched,
        }),
        Outcome::OutOfScope(reason) => json!({
            "outcome": "out_of_scope",
            "reason": reason.to_string(),
        }),
        Outcome::Rejected {
            subject,
            decision,
            redirect,
        } => json!({
            "outcome": "rejected",
            "subject": subject.to_string(),
            "matched": decision.matched,
            "redirect": redirect,
            "page": page,
        }),
    }
}
