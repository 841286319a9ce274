//! Error types for policy compilation and request handling.

use thiserror::Error;

/// Malformed policy configuration.
///
/// Always fatal to filter construction: a policy that fails to compile is
/// never partially applied.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("attribute value is neither string nor list for attribute '{attribute}'")]
    AttributeValueShape { attribute: String },

    #[error("each value must be a string for attribute '{attribute}', got {value}")]
    NonStringValue { attribute: String, value: String },

    #[error("option '{key}' must be {expected}")]
    InvalidOption { key: String, expected: &'static str },

    #[error("oidc issuer cannot be empty")]
    MissingIssuer,

    #[error("trusted service provider id cannot be empty")]
    MissingTrustedSp,

    #[error("client-scoped policy requires a 'clients' mapping")]
    MissingClients,

    /// `clients` is reserved, even in a single-scope policy.
    #[error("'clients' needs 'oidc_issuer' or 'keycloakSp' and cannot be an attribute rule")]
    ClientsWithoutMode,

    #[error("client '{client}' must map to a configuration block")]
    InvalidClientBlock { client: String },

    #[error("'oidc_issuer' and 'keycloakSp' cannot be combined in one filter")]
    ConflictingModes,

    #[error("invalid pattern '{pattern}' for attribute '{attribute}': {reason}")]
    InvalidPattern {
        attribute: String,
        pattern: String,
        reason: String,
    },
}

/// A request the filter cannot process at all.
///
/// Distinct from a deny: the pipeline must abort this request with a
/// server-side error instead of rendering a rejection page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request missing relay state")]
    MissingRelayState,

    #[error("could not extract client id from relay state '{relay_state}'")]
    UnparseableRelayState { relay_state: String },
}

/// Failure inside a rejection collaborator (state store, dispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no suspended request with id '{0}'")]
    UnknownState(String),

    #[error("suspended request '{id}' belongs to stage '{found}', expected '{expected}'")]
    StageMismatch {
        id: String,
        expected: String,
        found: String,
    },

    #[error("suspended request '{0}' has expired")]
    Expired(String),

    #[error("state store unavailable: {0}")]
    Store(String),
}

/// Everything `AuthorizeFilter::process` can fail with.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
