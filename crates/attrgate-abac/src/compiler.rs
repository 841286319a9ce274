//! Policy compiler: raw filter configuration to [`CompiledPolicy`].
//!
//! The configuration is a loosely typed mapping (as read from TOML or JSON).
//! Its shape selects the deployment mode:
//!
//! - `oidc_issuer` + `clients`: client-scoped, client id from requester id
//! - `keycloakSp` + `clients`: client-scoped, client id from relay state
//! - anything else: a single global scope
//!
//! `clients` is reserved in every mode: without one of the two mode keys it
//! is an error, not an attribute rule.
//!
//! A scope body recognizes `deny`, `regex`, `rejectMsg` and `logoUrl` (client
//! blocks also take `reject_msg` and `logo_url`). Every other key is an
//! attribute rule whose value is a string or a list of strings. Key order is
//! rule order, so the mapping must come from an order-preserving parser.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ConfigError;
use crate::policy::{LocalizedText, MatchMode, PolicyScope, PolicySet};
use crate::resolver::{GlobalResolver, IssuerResolver, RelayStateResolver, SubjectResolver};

const DENY: &str = "deny";
const REGEX: &str = "regex";
const REJECT_MSG: [&str; 2] = ["rejectMsg", "reject_msg"];
const LOGO_URL: [&str; 2] = ["logoUrl", "logo_url"];
const OIDC_ISSUER: &str = "oidc_issuer";
const TRUSTED_SP: &str = "keycloakSp";
const CLIENTS: &str = "clients";

/// How client ids are derived, as selected by the configuration shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentMode {
    /// One global scope.
    Global,
    /// Client id = requester id minus this issuer.
    Issuer(String),
    /// Client id from relay state; this is the trusted SP entity id.
    RelayState(String),
    /// A caller-supplied resolver.
    Custom,
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Issuer(issuer) => write!(f, "oidc issuer ({issuer})"),
            Self::RelayState(sp) => write!(f, "relay state (trusted sp {sp})"),
            Self::Custom => f.write_str("custom"),
        }
    }
}

/// A policy set together with the resolver that selects from it.
#[derive(Debug)]
pub struct CompiledPolicy {
    mode: DeploymentMode,
    policies: PolicySet,
    resolver: Box<dyn SubjectResolver>,
}

impl CompiledPolicy {
    /// Pairs a policy set with a caller-supplied resolution strategy.
    pub fn custom(policies: PolicySet, resolver: Box<dyn SubjectResolver>) -> Self {
        Self {
            mode: DeploymentMode::Custom,
            policies,
            resolver,
        }
    }

    /// A single global scope.
    pub fn global(scope: PolicyScope) -> Self {
        Self {
            mode: DeploymentMode::Global,
            policies: PolicySet::Global(scope),
            resolver: Box::new(GlobalResolver),
        }
    }

    pub fn mode(&self) -> &DeploymentMode {
        &self.mode
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    pub fn resolver(&self) -> &dyn SubjectResolver {
        self.resolver.as_ref()
    }
}

/// Compiles a filter configuration.
///
/// # Errors
///
/// Any [`ConfigError`]; nothing is returned for a partially valid config.
pub fn compile(config: &Map<String, Value>) -> Result<CompiledPolicy, ConfigError> {
    let issuer = config.get(OIDC_ISSUER);
    let trusted_sp = config.get(TRUSTED_SP);

    match (issuer, trusted_sp) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingModes),
        (Some(issuer), None) => {
            let issuer = non_empty_str(issuer).ok_or(ConfigError::MissingIssuer)?;
            Ok(CompiledPolicy {
                mode: DeploymentMode::Issuer(issuer.to_string()),
                policies: compile_clients(config)?,
                resolver: Box::new(IssuerResolver::new(issuer)),
            })
        }
        (None, Some(sp)) => {
            let sp = non_empty_str(sp).ok_or(ConfigError::MissingTrustedSp)?;
            Ok(CompiledPolicy {
                mode: DeploymentMode::RelayState(sp.to_string()),
                policies: compile_clients(config)?,
                resolver: Box::new(RelayStateResolver::new(sp)),
            })
        }
        (None, None) if config.contains_key(CLIENTS) => Err(ConfigError::ClientsWithoutMode),
        (None, None) => Ok(CompiledPolicy::global(compile_scope(config, false)?)),
    }
}

/// Compiles one scope body.
///
/// `snake_case_aliases` enables the `reject_msg`/`logo_url` spellings used by
/// client blocks.
pub fn compile_scope(
    body: &Map<String, Value>,
    snake_case_aliases: bool,
) -> Result<PolicyScope, ConfigError> {
    let accepted = if snake_case_aliases { 2 } else { 1 };
    let mut builder = PolicyScope::builder();

    for (key, value) in body {
        let key = key.as_str();
        if key == DENY {
            builder = builder.deny_on_match(expect_bool(key, value)?);
        } else if key == REGEX {
            let mode = if expect_bool(key, value)? {
                MatchMode::Regex
            } else {
                MatchMode::Literal
            };
            builder = builder.match_mode(mode);
        } else if REJECT_MSG[..accepted].contains(&key) {
            builder = builder.reject_message(localized_text(key, value)?);
        } else if LOGO_URL[..accepted].contains(&key) {
            let logo = value.as_str().ok_or_else(|| ConfigError::InvalidOption {
                key: key.to_string(),
                expected: "a string",
            })?;
            builder = builder.logo(logo);
        } else {
            builder = builder.rule(key, attribute_patterns(key, value)?);
        }
    }

    builder.build()
}

fn compile_clients(config: &Map<String, Value>) -> Result<PolicySet, ConfigError> {
    for key in config.keys() {
        if key != OIDC_ISSUER && key != TRUSTED_SP && key != CLIENTS {
            warn!(key = %key, "Ignoring top-level option in client-scoped policy");
        }
    }

    let clients = match config.get(CLIENTS) {
        None => return Err(ConfigError::MissingClients),
        Some(Value::Object(clients)) => clients,
        Some(_) => {
            return Err(ConfigError::InvalidOption {
                key: CLIENTS.to_string(),
                expected: "a mapping of client id to configuration",
            });
        }
    };

    let mut scopes = HashMap::with_capacity(clients.len());
    for (client, block) in clients {
        let Value::Object(body) = block else {
            return Err(ConfigError::InvalidClientBlock {
                client: client.clone(),
            });
        };
        scopes.insert(client.clone(), compile_scope(body, true)?);
    }

    Ok(PolicySet::PerClient(scopes))
}

fn attribute_patterns(attribute: &str, value: &Value) -> Result<Vec<String>, ConfigError> {
    match value {
        Value::String(pattern) => Ok(vec![pattern.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(pattern) => Ok(pattern.clone()),
                other => Err(ConfigError::NonStringValue {
                    attribute: attribute.to_string(),
                    value: other.to_string(),
                }),
            })
            .collect(),
        _ => Err(ConfigError::AttributeValueShape {
            attribute: attribute.to_string(),
        }),
    }
}

fn localized_text(key: &str, value: &Value) -> Result<LocalizedText, ConfigError> {
    let invalid = || ConfigError::InvalidOption {
        key: key.to_string(),
        expected: "a mapping of language code to text",
    };

    let entries = value.as_object().ok_or_else(invalid)?;
    let mut text = LocalizedText::new();
    for (lang, message) in entries {
        text.insert(lang, message.as_str().ok_or_else(invalid)?);
    }
    Ok(text)
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, ConfigError> {
    value.as_bool().ok_or_else(|| ConfigError::InvalidOption {
        key: key.to_string(),
        expected: "a boolean",
    })
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

// ============================================================================
// Tests
// ============================================================================
