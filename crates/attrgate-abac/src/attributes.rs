//! Request-side inputs for authorization.
//!
//! Two shapes arrive from the SSO pipeline with every request:
//! - **Attribute bag**: the identity attributes released by the IdP
//! - **Request context**: the bag plus the routing fields used to pick a
//!   client-scoped policy (requester ids, relay state, destination entity)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Attribute Bag
// ============================================================================

/// Asserted identity attributes, keyed by case-sensitive attribute name.
///
/// A missing key means the attribute was not asserted at all, which is
/// different from an attribute asserted with an empty value list. Both
/// cases make the corresponding rule inert during evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeBag {
    values: HashMap<String, Vec<String>>,
}

impl AttributeBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute with its values (builder pattern).
    ///
    /// Replaces any values previously stored under `name`.
    pub fn with<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, values);
        self
    }

    /// Stores `values` under `name`, replacing whatever was there.
    pub fn insert<I, S>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
    }

    /// Returns the values asserted for `name`, or `None` if not asserted.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// Returns true if `name` was asserted (even with no values).
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<String>)> for AttributeBag {
    fn from_iter<T: IntoIterator<Item = (S, Vec<String>)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ============================================================================
// Request Context
// ============================================================================

/// Everything the filter reads from the pipeline for one request.
///
/// Only `attributes` is consulted by the evaluator. The remaining fields feed
/// subject resolution in the client-scoped deployment modes, and
/// `auth_source` is carried through to the rejection page for the logout link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestContext {
    /// Identity attributes released for the authenticated user.
    pub attributes: AttributeBag,
    /// Requester ids forwarded by the proxy; the first one names the client.
    pub requester_ids: Vec<String>,
    /// Opaque relay state round-tripped through the identity flow.
    pub relay_state: Option<String>,
    /// Entity id of the service provider the response is destined for.
    pub destination: Option<String>,
    /// Authentication source that produced the session.
    pub auth_source: Option<String>,
}

impl RequestContext {
    /// Creates a context carrying only an attribute bag.
    pub fn new(attributes: AttributeBag) -> Self {
        Self {
            attributes,
            ..Self::default()
        }
    }

    /// Sets the requester id list.
    pub fn with_requester_id(mut self, requester_id: &str) -> Self {
        self.requester_ids.push(requester_id.to_string());
        self
    }

    /// Sets the relay state.
    pub fn with_relay_state(mut self, relay_state: &str) -> Self {
        self.relay_state = Some(relay_state.to_string());
        self
    }

    /// Sets the destination entity id.
    pub fn with_destination(mut self, destination: &str) -> Self {
        self.destination = Some(destination.to_string());
        self
    }

    /// Sets the authentication source id.
    pub fn with_auth_source(mut self, auth_source: &str) -> Self {
        self.auth_source = Some(auth_source.to_string());
        self
    }

    /// Returns the first requester id if it is present and non-empty.
    pub fn requester_id(&self) -> Option<&str> {
        self.requester_ids
            .first()
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_empty_are_distinct() {
        let bag = AttributeBag::new().with("mail", Vec::<String>::new());

        assert!(bag.contains("mail"));
        assert_eq!(bag.get("mail"), Some(&[][..]));
        assert!(!bag.contains("uid"));
        assert_eq!(bag.get("uid"), None);
    }

    #[test]
    fn test_attribute_names_are_case_sensitive() {
        let bag = AttributeBag::new().with("eduPersonAffiliation", ["staff"]);
        assert!(bag.get("edupersonaffiliation").is_none());
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_bag_deserializes_from_plain_map() {
        let bag: AttributeBag =
            serde_json::from_str(r#"{"affiliation": ["staff", "member"]}"#).expect("parse bag");
        assert_eq!(
            bag.get("affiliation"),
            Some(&["staff".to_string(), "member".to_string()][..])
        );
    }

    #[test]
    fn test_requester_id_skips_empty_first_entry() {
        let ctx = RequestContext::default().with_requester_id("");
        assert!(ctx.requester_id().is_none());

        let ctx = RequestContext::default()
            .with_requester_id("https://op.example.org/client-a")
            .with_requester_id("ignored");
        assert_eq!(ctx.requester_id(), Some("https://op.example.org/client-a"));
    }

    #[test]
    fn test_context_deserializes_with_defaults() {
        let ctx: RequestContext =
            serde_json::from_str(r#"{"attributes": {"uid": ["alice"]}}"#).expect("parse context");
        assert!(ctx.requester_ids.is_empty());
        assert!(ctx.relay_state.is_none());
        assert_eq!(ctx.attributes.get("uid"), Some(&["alice".to_string()][..]));
    }
}
