//! Authorization policy definitions.
//!
//! A [`PolicyScope`] is one self-contained bundle: an ordered list of match
//! rules, the allow-list/deny-list switch, the pattern mode, and the payload
//! shown to a rejected user. A [`PolicySet`] holds either one global scope or
//! one scope per client id.
//!
//! Scopes are only obtainable through [`ScopeBuilder::build`], which compiles
//! every pattern up front. A built scope is immutable.

use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;
use crate::pattern::Pattern;
use crate::resolver::Subject;

// ============================================================================
// Effect
// ============================================================================

/// The outcome of a decision: allow or deny access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Let the session continue to the service.
    Allow,
    /// Stop the session and show the rejection page.
    Deny,
}

// ============================================================================
// Match Mode
// ============================================================================

/// How the patterns of a scope are interpreted. Shared by every rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchMode {
    /// Patterns are regular expressions searched within each value.
    #[default]
    Regex,
    /// Patterns must equal the value exactly.
    Literal,
}

// ============================================================================
// Localized Text
// ============================================================================

/// Rejection text keyed by language code, in configuration order.
///
/// Order matters: the rejection page falls back to the first entry when
/// neither the user's language nor the default language is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedText {
    entries: Vec<(String, String)>,
}

impl LocalizedText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a translation (builder pattern). A repeated language replaces the
    /// earlier text in place.
    pub fn with(mut self, language: &str, text: &str) -> Self {
        self.insert(language, text);
        self
    }

    pub fn insert(&mut self, language: &str, text: &str) {
        match self.entries.iter_mut().find(|(lang, _)| lang == language) {
            Some(entry) => entry.1 = text.to_string(),
            None => self.entries.push((language.to_string(), text.to_string())),
        }
    }

    /// Text for exactly `language`, if configured.
    pub fn get(&self, language: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(lang, _)| lang == language)
            .map(|(_, text)| text.as_str())
    }

    /// The first configured translation.
    pub fn first(&self) -> Option<&str> {
        self.entries.first().map(|(_, text)| text.as_str())
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(lang, _)| lang.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for LocalizedText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (lang, text) in &self.entries {
            map.serialize_entry(lang, text)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LocalizedText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LocalizedTextVisitor;

        impl<'de> Visitor<'de> for LocalizedTextVisitor {
            type Value = LocalizedText;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of language code to text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut text = LocalizedText::new();
                while let Some((lang, value)) = access.next_entry::<String, String>()? {
                    text.insert(&lang, &value);
                }
                Ok(text)
            }
        }

        deserializer.deserialize_map(LocalizedTextVisitor)
    }
}

// ============================================================================
// Match Rule
// ============================================================================

/// Patterns configured for one attribute.
///
/// A rule with no patterns never matches.
#[derive(Debug, Clone)]
pub struct MatchRule {
    attribute: String,
    patterns: Vec<Pattern>,
}

impl MatchRule {
    /// The attribute this rule inspects.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Patterns in configuration order.
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }
}

// ============================================================================
// Policy Scope
// ============================================================================

/// The policy that applies to one decision.
///
/// Built with [`PolicyScope::builder`]. The default scope is an empty
/// allow-list, which denies every request.
#[derive(Debug, Clone, Default)]
pub struct PolicyScope {
    match_mode: MatchMode,
    deny_on_match: bool,
    reject_message: LocalizedText,
    logo: Option<String>,
    rules: Vec<MatchRule>,
}

impl PolicyScope {
    pub fn builder() -> ScopeBuilder {
        ScopeBuilder::default()
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    /// True for a deny-list scope: a match forbids access.
    pub fn deny_on_match(&self) -> bool {
        self.deny_on_match
    }

    /// Rejection text; empty means the caller's default text is used.
    pub fn reject_message(&self) -> &LocalizedText {
        &self.reject_message
    }

    pub fn logo(&self) -> Option<&str> {
        self.logo.as_deref()
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }
}

/// Collects scope settings and compiles them into a [`PolicyScope`].
///
/// Settings may be given in any order; patterns are compiled in
/// [`build`](Self::build) against the final match mode.
#[derive(Debug, Clone, Default)]
pub struct ScopeBuilder {
    match_mode: MatchMode,
    deny_on_match: bool,
    reject_message: LocalizedText,
    logo: Option<String>,
    rules: Vec<(String, Vec<String>)>,
}

impl ScopeBuilder {
    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    pub fn deny_on_match(mut self, deny: bool) -> Self {
        self.deny_on_match = deny;
        self
    }

    pub fn reject_message(mut self, message: LocalizedText) -> Self {
        self.reject_message = message;
        self
    }

    pub fn logo(mut self, logo: &str) -> Self {
        self.logo = Some(logo.to_string());
        self
    }

    /// Appends a rule. Rules are evaluated in the order they are added;
    /// repeating an attribute adds an independent rule.
    pub fn rule<I, S>(mut self, attribute: &str, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.push((
            attribute.to_string(),
            patterns.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Compiles all patterns and freezes the scope.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidPattern`] if a regular expression fails to compile.
    pub fn build(self) -> Result<PolicyScope, ConfigError> {
        let mut rules = Vec::with_capacity(self.rules.len());
        for (attribute, sources) in self.rules {
            let patterns = sources
                .iter()
                .map(|source| match self.match_mode {
                    MatchMode::Regex => Pattern::regex(&attribute, source),
                    MatchMode::Literal => Ok(Pattern::literal(source)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            rules.push(MatchRule {
                attribute,
                patterns,
            });
        }

        Ok(PolicyScope {
            match_mode: self.match_mode,
            deny_on_match: self.deny_on_match,
            reject_message: self.reject_message,
            logo: self.logo.filter(|logo| !logo.is_empty()),
            rules,
        })
    }
}

// ============================================================================
// Policy Set
// ============================================================================

/// All compiled policy for one filter instance.
#[derive(Debug, Clone)]
pub enum PolicySet {
    /// One scope for every request.
    Global(PolicyScope),
    /// One scope per client id.
    PerClient(HashMap<String, PolicyScope>),
}

impl PolicySet {
    /// Looks up the scope for a resolved subject.
    ///
    /// Returns `None` when the subject has no configured scope, including a
    /// subject kind that does not fit this set.
    pub fn select(&self, subject: &Subject) -> Option<&PolicyScope> {
        match (self, subject) {
            (Self::Global(scope), Subject::Global) => Some(scope),
            (Self::PerClient(scopes), Subject::Client(id)) => scopes.get(id),
            _ => None,
        }
    }

    /// Number of scopes in the set.
    pub fn len(&self) -> usize {
        match self {
            Self::Global(_) => 1,
            Self::PerClient(scopes) => scopes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured client ids, sorted. Empty for a global set.
    pub fn client_ids(&self) -> Vec<&str> {
        match self {
            Self::Global(_) => Vec::new(),
            Self::PerClient(scopes) => {
                let mut ids: Vec<&str> = scopes.keys().map(String::as_str).collect();
                ids.sort_unstable();
                ids
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
