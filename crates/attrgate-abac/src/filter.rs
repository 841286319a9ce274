//! The authorization filter as the pipeline sees it.
//!
//! [`AuthorizeFilter`] owns the compiled policy and a rejection dispatcher.
//! Per request it resolves the subject, evaluates, and on deny hands the
//! request to the dispatcher.
//!
//! The compiled policy sits behind an [`ArcSwap`]: requests read it without
//! locking, and [`AuthorizeFilter::reload`] publishes a freshly compiled
//! policy in one atomic swap. In-flight requests finish on the policy they
//! started with.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::attributes::RequestContext;
use crate::compiler::{self, CompiledPolicy};
use crate::dispatch::{Redirect, RejectionDispatcher};
use crate::error::{ConfigError, FilterError, RequestError};
use crate::evaluator::{self, Decision};
use crate::resolver::{self, OutOfScope, Resolution, Subject};

/// The decision for one request, before any dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// A scope applied and produced `decision`.
    Decided { subject: Subject, decision: Decision },
    /// No scope applies; the request passes through untouched.
    OutOfScope(OutOfScope),
}

/// What the pipeline must do with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Continue the pipeline.
    Allowed { subject: Subject, decision: Decision },
    /// Continue the pipeline; this filter did not apply.
    OutOfScope(OutOfScope),
    /// Stop and follow `redirect` to the rejection page.
    Rejected {
        subject: Subject,
        decision: Decision,
        redirect: Redirect,
    },
}

impl Outcome {
    /// True unless the request was rejected.
    pub fn passes(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Attribute-based authorization filter.
#[derive(Debug)]
pub struct AuthorizeFilter {
    policy: ArcSwap<CompiledPolicy>,
    dispatcher: Arc<dyn RejectionDispatcher>,
}

impl AuthorizeFilter {
    pub fn new(policy: CompiledPolicy, dispatcher: Arc<dyn RejectionDispatcher>) -> Self {
        info!(
            mode = %policy.mode(),
            scopes = policy.policies().len(),
            "Authorization policy loaded"
        );
        Self {
            policy: ArcSwap::from_pointee(policy),
            dispatcher,
        }
    }

    /// Compiles `config` and builds a filter from it.
    ///
    /// # Errors
    ///
    /// The compiler's [`ConfigError`]; no filter is built from a bad config.
    pub fn from_config(
        config: &Map<String, Value>,
        dispatcher: Arc<dyn RejectionDispatcher>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(compiler::compile(config)?, dispatcher))
    }

    /// Snapshot of the policy currently in force.
    pub fn policy(&self) -> Arc<CompiledPolicy> {
        self.policy.load_full()
    }

    /// Compiles `config` and swaps it in.
    ///
    /// # Errors
    ///
    /// On a [`ConfigError`] the current policy stays in force.
    pub fn reload(&self, config: &Map<String, Value>) -> Result<(), ConfigError> {
        let policy = compiler::compile(config).inspect_err(|e| {
            warn!(error = %e, "Policy reload rejected; keeping current policy");
        })?;
        self.replace(policy);
        Ok(())
    }

    /// Publishes an already compiled policy.
    pub fn replace(&self, policy: CompiledPolicy) {
        info!(
            mode = %policy.mode(),
            scopes = policy.policies().len(),
            "Authorization policy reloaded"
        );
        self.policy.store(Arc::new(policy));
    }

    /// Resolves and evaluates without dispatching.
    ///
    /// # Errors
    ///
    /// [`RequestError`] when the subject cannot be derived.
    pub fn decide(&self, request: &RequestContext) -> Result<Verdict, RequestError> {
        let policy = self.policy.load();

        let resolution = resolver::resolve(policy.resolver(), policy.policies(), request)
            .inspect_err(|e| warn!(error = %e, "Cannot resolve authorization subject"))?;

        match resolution {
            Resolution::OutOfScope(reason) => {
                debug!(%reason, "Request outside authorization policy");
                Ok(Verdict::OutOfScope(reason))
            }
            Resolution::InScope { subject, scope } => {
                let decision = evaluator::evaluate(scope, &request.attributes);
                Ok(Verdict::Decided { subject, decision })
            }
        }
    }

    /// Runs the filter on one request.
    ///
    /// On deny the dispatcher is invoked and the returned [`Outcome::Rejected`]
    /// carries its redirect; the caller must not continue the pipeline.
    ///
    /// # Errors
    ///
    /// [`FilterError::Request`] for requests that cannot be processed and
    /// [`FilterError::Dispatch`] if the rejection flow fails. Neither is a
    /// deny.
    pub fn process(&self, request: &RequestContext) -> Result<Outcome, FilterError> {
        match self.decide(request)? {
            Verdict::OutOfScope(reason) => Ok(Outcome::OutOfScope(reason)),
            Verdict::Decided { subject, decision } if decision.is_allowed() => {
                Ok(Outcome::Allowed { subject, decision })
            }
            Verdict::Decided { subject, decision } => {
                info!(%subject, "Access forbidden");
                let rejection = decision.rejection.clone().unwrap_or_default();
                let redirect = self.dispatcher.dispatch(request, &rejection)?;
                Ok(Outcome::Rejected {
                    subject,
                    decision,
                    redirect,
                })
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
