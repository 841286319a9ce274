//! The rejection flow that runs after a deny.
//!
//! On deny, a [`RejectionDispatcher`] takes over the request. The stock
//! [`SuspendingDispatcher`] parks the request in a [`StateStore`] under an
//! opaque id and answers with a [`Redirect`] to the rejection endpoint. The
//! endpoint later loads the suspended request and builds a [`RejectionPage`].
//!
//! Persisting beyond the process and issuing the HTTP redirect belong to the
//! host; [`InMemoryStateStore`] is enough for a single process and for tests.
//! Suspended requests expire after a time-to-live; expired entries are
//! refused on load and swept on save or by [`StateStore::cleanup_expired`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attributes::RequestContext;
use crate::error::DispatchError;
use crate::evaluator::Rejection;

/// Stage tag under which rejected requests are suspended.
pub const REJECTION_STAGE: &str = "attrgate:authorize";

/// How long a suspended request stays loadable by default.
pub const DEFAULT_STATE_TTL: TimeDelta = TimeDelta::minutes(30);

// ============================================================================
// Suspended State
// ============================================================================

/// A rejected request parked until the rejection page is shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendedRequest {
    /// Which pipeline stage suspended the request.
    pub stage: String,
    pub request: RequestContext,
    pub rejection: Rejection,
    pub suspended_at: DateTime<Utc>,
}

impl SuspendedRequest {
    /// True once `ttl` has elapsed since suspension.
    pub fn is_expired(&self, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
        now - self.suspended_at >= ttl
    }
}

/// Persists suspended requests under opaque ids.
pub trait StateStore: fmt::Debug + Send + Sync {
    /// Stores `state` and returns its id.
    fn save(&self, state: SuspendedRequest) -> Result<String, DispatchError>;

    /// Loads the state saved under `id`, checking it was saved by `stage`
    /// and has not expired.
    fn load(&self, id: &str, stage: &str) -> Result<SuspendedRequest, DispatchError>;

    /// Drops expired states and returns how many were removed.
    fn cleanup_expired(&self) -> Result<usize, DispatchError>;
}

/// Process-local state store keyed by random UUIDs.
#[derive(Debug)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<String, SuspendedRequest>>,
    ttl: TimeDelta,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_STATE_TTL)
    }

    pub fn with_ttl(ttl: TimeDelta) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Number of stored states, expired or not.
    pub fn len(&self) -> usize {
        self.states.read().map_or(0, |states| states.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> DispatchError {
    DispatchError::Store("state store lock poisoned".to_string())
}

impl StateStore for InMemoryStateStore {
    fn save(&self, state: SuspendedRequest) -> Result<String, DispatchError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut states = self.states.write().map_err(|_| poisoned())?;
        states.retain(|_, existing| !existing.is_expired(self.ttl, now));
        states.insert(id.clone(), state);
        Ok(id)
    }

    fn load(&self, id: &str, stage: &str) -> Result<SuspendedRequest, DispatchError> {
        let states = self.states.read().map_err(|_| poisoned())?;
        let state = states
            .get(id)
            .ok_or_else(|| DispatchError::UnknownState(id.to_string()))?;

        if state.is_expired(self.ttl, Utc::now()) {
            return Err(DispatchError::Expired(id.to_string()));
        }
        if state.stage != stage {
            return Err(DispatchError::StageMismatch {
                id: id.to_string(),
                expected: stage.to_string(),
                found: state.stage.clone(),
            });
        }
        Ok(state.clone())
    }

    fn cleanup_expired(&self) -> Result<usize, DispatchError> {
        let now = Utc::now();
        let mut states = self.states.write().map_err(|_| poisoned())?;
        let before = states.len();
        states.retain(|_, state| !state.is_expired(self.ttl, now));
        Ok(before - states.len())
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Where the user agent is sent after a deny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    /// Rejection endpoint, as configured.
    pub endpoint: String,
    /// Id of the suspended request, passed to the endpoint.
    pub state_id: String,
}

/// Takes over a denied request.
///
/// Invoked only on deny. Once it returns, the filter is done with the
/// request; the caller follows the redirect instead of continuing.
pub trait RejectionDispatcher: fmt::Debug + Send + Sync {
    fn dispatch(
        &self,
        request: &RequestContext,
        rejection: &Rejection,
    ) -> Result<Redirect, DispatchError>;
}

/// Suspends denied requests in a [`StateStore`] and redirects to a fixed
/// rejection endpoint.
#[derive(Debug, Clone)]
pub struct SuspendingDispatcher {
    store: Arc<dyn StateStore>,
    endpoint: String,
    stage: String,
}

impl SuspendingDispatcher {
    pub fn new(store: Arc<dyn StateStore>, endpoint: &str) -> Self {
        Self {
            store,
            endpoint: endpoint.to_string(),
            stage: REJECTION_STAGE.to_string(),
        }
    }

    /// Overrides the stage tag (default [`REJECTION_STAGE`]).
    pub fn with_stage(mut self, stage: &str) -> Self {
        self.stage = stage.to_string();
        self
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Stage tag requests are suspended under; pass it to
    /// [`RejectionPage::load`].
    pub fn stage(&self) -> &str {
        &self.stage
    }
}

impl RejectionDispatcher for SuspendingDispatcher {
    fn dispatch(
        &self,
        request: &RequestContext,
        rejection: &Rejection,
    ) -> Result<Redirect, DispatchError> {
        let state_id = self.store.save(SuspendedRequest {
            stage: self.stage.clone(),
            request: request.clone(),
            rejection: rejection.clone(),
            suspended_at: Utc::now(),
        })?;

        Ok(Redirect {
            endpoint: self.endpoint.clone(),
            state_id,
        })
    }
}

// ============================================================================
// Rejection Page
// ============================================================================

/// Language settings for picking the rejection text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPreference<'a> {
    /// Language the page is rendered in.
    pub language: &'a str,
    /// Site default language.
    pub default_language: &'a str,
    /// Text used when the policy has no message at all.
    pub generic_text: &'a str,
}

/// Everything the rejection page displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionPage {
    pub text: String,
    pub logo: Option<String>,
    /// Authentication source to offer a logout from, if known.
    pub logout_source: Option<String>,
}

impl RejectionPage {
    /// Builds the page for a suspended request.
    ///
    /// Text selection: the page language, then the default language, then
    /// the first configured translation, then the generic text.
    pub fn from_suspended(state: &SuspendedRequest, preference: &TextPreference<'_>) -> Self {
        let text = state
            .rejection
            .message
            .as_ref()
            .and_then(|message| {
                message
                    .get(preference.language)
                    .or_else(|| message.get(preference.default_language))
                    .or_else(|| message.first())
            })
            .unwrap_or(preference.generic_text)
            .to_string();

        Self {
            text,
            logo: state.rejection.logo.clone(),
            logout_source: state.request.auth_source.clone(),
        }
    }

    /// Loads the request suspended under `stage` as `state_id` and builds
    /// its page.
    ///
    /// # Errors
    ///
    /// Whatever the store reports for an unknown, expired or foreign state.
    pub fn load(
        store: &dyn StateStore,
        state_id: &str,
        stage: &str,
        preference: &TextPreference<'_>,
    ) -> Result<Self, DispatchError> {
        let state = store.load(state_id, stage)?;
        Ok(Self::from_suspended(&state, preference))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeBag;
    use crate::policy::LocalizedText;

    const GENERIC: &str = "You are not authorized to access this service.";

    fn preference(language: &str) -> TextPreference<'_> {
        TextPreference {
            language,
            default_language: "en",
            generic_text: GENERIC,
        }
    }

    fn suspended(message: Option<LocalizedText>) -> SuspendedRequest {
        SuspendedRequest {
            stage: REJECTION_STAGE.to_string(),
            request: RequestContext::new(AttributeBag::new()).with_auth_source("default-sp"),
            rejection: Rejection {
                message,
                logo: Some("logo.png".to_string()),
            },
            suspended_at: Utc::now(),
        }
    }

    #[test]
    fn text_prefers_page_language() {
        let message = LocalizedText::new().with("en", "No").with("el", "Όχι");
        let page = RejectionPage::from_suspended(&suspended(Some(message)), &preference("el"));
        assert_eq!(page.text, "Όχι");
        assert_eq!(page.logo.as_deref(), Some("logo.png"));
        assert_eq!(page.logout_source.as_deref(), Some("default-sp"));
    }

    #[test]
    fn text_falls_back_to_default_language() {
        let message = LocalizedText::new().with("nl", "Nee").with("en", "No");
        let page = RejectionPage::from_suspended(&suspended(Some(message)), &preference("de"));
        assert_eq!(page.text, "No");
    }

    #[test]
    fn text_falls_back_to_first_translation() {
        let message = LocalizedText::new().with("nl", "Nee").with("fr", "Non");
        let page = RejectionPage::from_suspended(&suspended(Some(message)), &preference("de"));
        assert_eq!(page.text, "Nee");
    }

    #[test]
    fn text_falls_back_to_generic() {
        let page = RejectionPage::from_suspended(&suspended(None), &preference("en"));
        assert_eq!(page.text, GENERIC);
    }

    #[test]
    fn dispatcher_suspends_and_redirects() {
        let store = Arc::new(InMemoryStateStore::new());
        let dispatcher = SuspendingDispatcher::new(store.clone(), "/authorize/403");

        let request = RequestContext::new(AttributeBag::new().with("uid", ["mallory"]));
        let rejection = Rejection {
            message: Some(LocalizedText::new().with("en", "Blocked")),
            logo: None,
        };
        let redirect = dispatcher.dispatch(&request, &rejection).expect("dispatch");

        assert_eq!(redirect.endpoint, "/authorize/403");
        assert_eq!(store.len(), 1);

        let state = store
            .load(&redirect.state_id, REJECTION_STAGE)
            .expect("state saved");
        assert_eq!(state.request, request);
        assert_eq!(state.rejection, rejection);

        let page = RejectionPage::load(
            store.as_ref(),
            &redirect.state_id,
            dispatcher.stage(),
            &preference("en"),
        )
        .expect("page");
        assert_eq!(page.text, "Blocked");
    }

    #[test]
    fn store_rejects_unknown_id_and_foreign_stage() {
        let store = InMemoryStateStore::new();
        assert_eq!(
            store.load("missing", REJECTION_STAGE),
            Err(DispatchError::UnknownState("missing".to_string()))
        );

        let mut state = suspended(None);
        state.stage = "other:stage".to_string();
        let id = store.save(state).expect("save");
        assert!(matches!(
            store.load(&id, REJECTION_STAGE),
            Err(DispatchError::StageMismatch { .. })
        ));
    }

    #[test]
    fn custom_stage_page_renders() {
        let store = Arc::new(InMemoryStateStore::new());
        let dispatcher = SuspendingDispatcher::new(store.clone(), "/403").with_stage("oidc:authorize");
        let rejection = Rejection {
            message: Some(LocalizedText::new().with("en", "Client blocked")),
            logo: None,
        };
        let redirect = dispatcher
            .dispatch(&RequestContext::default(), &rejection)
            .expect("dispatch");

        let page = RejectionPage::load(
            store.as_ref(),
            &redirect.state_id,
            dispatcher.stage(),
            &preference("en"),
        )
        .expect("page under custom stage");
        assert_eq!(page.text, "Client blocked");

        // The default stage does not see it.
        assert!(matches!(
            RejectionPage::load(
                store.as_ref(),
                &redirect.state_id,
                REJECTION_STAGE,
                &preference("en")
            ),
            Err(DispatchError::StageMismatch { .. })
        ));
    }

    fn aged(minutes: i64) -> SuspendedRequest {
        let mut state = suspended(None);
        state.suspended_at = Utc::now() - TimeDelta::minutes(minutes);
        state
    }

    #[test]
    fn expired_state_is_refused_on_load() {
        let store = InMemoryStateStore::new();
        let fresh = store.save(aged(5)).expect("save");
        let stale = store.save(aged(31)).expect("save");

        assert!(store.load(&fresh, REJECTION_STAGE).is_ok());
        assert_eq!(
            store.load(&stale, REJECTION_STAGE),
            Err(DispatchError::Expired(stale.clone()))
        );
    }

    #[test]
    fn cleanup_removes_only_expired_states() {
        let store = InMemoryStateStore::with_ttl(TimeDelta::minutes(10));
        let fresh = store.save(aged(1)).expect("save");
        store.save(aged(20)).expect("save");
        assert_eq!(store.len(), 2);

        assert_eq!(store.cleanup_expired(), Ok(1));
        assert_eq!(store.len(), 1);
        assert!(store.load(&fresh, REJECTION_STAGE).is_ok());
        assert_eq!(store.cleanup_expired(), Ok(0));
    }

    #[test]
    fn save_sweeps_expired_states() {
        let store = InMemoryStateStore::with_ttl(TimeDelta::minutes(10));
        let stale = store.save(aged(20)).expect("save");
        store.save(aged(1)).expect("save");

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.load(&stale, REJECTION_STAGE),
            Err(DispatchError::UnknownState(stale.clone()))
        );
    }

    #[test]
    fn store_stays_bounded_under_repeated_denials() {
        let store = Arc::new(InMemoryStateStore::with_ttl(TimeDelta::zero()));
        let dispatcher = SuspendingDispatcher::new(store.clone(), "/403");

        for _ in 0..1000 {
            dispatcher
                .dispatch(&RequestContext::default(), &Rejection::default())
                .expect("dispatch");
        }

        assert_eq!(store.len(), 1);
        assert_eq!(store.cleanup_expired(), Ok(1));
        assert!(store.is_empty());
    }
}
