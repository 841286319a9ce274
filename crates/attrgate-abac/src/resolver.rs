//! Subject resolution: which scope applies to this request.
//!
//! Each deployment mode has its own strategy, all behind [`SubjectResolver`]:
//!
//! | Strategy               | Subject                                     |
//! |------------------------|---------------------------------------------|
//! | [`GlobalResolver`]     | always the single global scope              |
//! | [`IssuerResolver`]     | requester id with the issuer removed        |
//! | [`RelayStateResolver`] | relay state, or its third `.` segment       |
//!
//! A strategy that cannot name a subject reports the request as out of
//! scope, which lets it pass through untouched. Only the relay-state strategy
//! can fail outright, when the relay state it needs is missing or malformed.

use std::fmt;

use tracing::debug;

use crate::attributes::RequestContext;
use crate::error::RequestError;
use crate::policy::{PolicyScope, PolicySet};

/// Who a request is evaluated as.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// The single policy of a simple deployment.
    Global,
    /// A client id of a client-scoped deployment.
    Client(String),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Client(id) => write!(f, "client '{id}'"),
        }
    }
}

/// Why a request was left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutOfScope {
    /// The request carries no usable requester id.
    MissingRequesterId,
    /// The derived client id has no configured scope.
    UnknownClient(String),
}

impl fmt::Display for OutOfScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequesterId => f.write_str("request has no requester id"),
            Self::UnknownClient(id) => write!(f, "no policy configured for client '{id}'"),
        }
    }
}

/// The scope selected for a request, or the reason none applies.
#[derive(Debug)]
pub enum Resolution<'p> {
    InScope {
        subject: Subject,
        scope: &'p PolicyScope,
    },
    OutOfScope(OutOfScope),
}

/// Derives the subject of a request.
///
/// Implementations only read the request; scope lookup is shared in
/// [`resolve`].
pub trait SubjectResolver: fmt::Debug + Send + Sync {
    /// Returns the subject, `Ok(None)` when the request is out of scope, or
    /// an error when the request cannot be processed.
    fn subject(&self, request: &RequestContext) -> Result<Option<Subject>, RequestError>;
}

/// Runs `resolver` and looks the subject up in `policies`.
///
/// # Errors
///
/// Propagates the resolver's [`RequestError`].
pub fn resolve<'p>(
    resolver: &dyn SubjectResolver,
    policies: &'p PolicySet,
    request: &RequestContext,
) -> Result<Resolution<'p>, RequestError> {
    let Some(subject) = resolver.subject(request)? else {
        debug!("Ignoring request with missing requester id");
        return Ok(Resolution::OutOfScope(OutOfScope::MissingRequesterId));
    };

    match policies.select(&subject) {
        Some(scope) => Ok(Resolution::InScope { subject, scope }),
        None => {
            let id = match subject {
                Subject::Client(id) => id,
                Subject::Global => String::new(),
            };
            debug!(client_id = %id, "Ignoring client with no configured policy");
            Ok(Resolution::OutOfScope(OutOfScope::UnknownClient(id)))
        }
    }
}

// ============================================================================
// Global
// ============================================================================

/// Simple deployments: every request is evaluated against the global scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalResolver;

impl SubjectResolver for GlobalResolver {
    fn subject(&self, _request: &RequestContext) -> Result<Option<Subject>, RequestError> {
        Ok(Some(Subject::Global))
    }
}

// ============================================================================
// Issuer
// ============================================================================

/// OIDC deployments keyed by requester id.
///
/// The proxy forwards requester ids of the form `<issuer><client_id>`; every
/// occurrence of the issuer is removed to recover the client id. This is
/// plain substring removal, not URL parsing.
#[derive(Debug, Clone)]
pub struct IssuerResolver {
    issuer: String,
}

impl IssuerResolver {
    pub fn new(issuer: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

impl SubjectResolver for IssuerResolver {
    fn subject(&self, request: &RequestContext) -> Result<Option<Subject>, RequestError> {
        Ok(request
            .requester_id()
            .map(|id| Subject::Client(id.replace(&self.issuer, ""))))
    }
}

// ============================================================================
// Relay State
// ============================================================================

/// OIDC deployments keyed by relay state.
///
/// When the response is destined for the trusted service provider, the relay
/// state is `<a>.<b>.<client_id>` and the client id is everything after the
/// second dot. For any other destination the relay state is the client id.
#[derive(Debug, Clone)]
pub struct RelayStateResolver {
    trusted_sp: String,
}

impl RelayStateResolver {
    pub fn new(trusted_sp: &str) -> Self {
        Self {
            trusted_sp: trusted_sp.to_string(),
        }
    }

    pub fn trusted_sp(&self) -> &str {
        &self.trusted_sp
    }
}

impl SubjectResolver for RelayStateResolver {
    fn subject(&self, request: &RequestContext) -> Result<Option<Subject>, RequestError> {
        let relay_state = request
            .relay_state
            .as_deref()
            .ok_or(RequestError::MissingRelayState)?;

        if request.destination.as_deref() != Some(self.trusted_sp.as_str()) {
            return Ok(Some(Subject::Client(relay_state.to_string())));
        }

        match relay_state.splitn(3, '.').nth(2) {
            Some(client_id) if !client_id.is_empty() => {
                Ok(Some(Subject::Client(client_id.to_string())))
            }
            _ => Err(RequestError::UnparseableRelayState {
                relay_state: relay_state.to_string(),
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
