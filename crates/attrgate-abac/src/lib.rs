//! # attrgate-abac: Attribute-Based Authorization for SSO pipelines
//!
//! Decides whether an authenticated session may continue to the requesting
//! service, based on declarative rules matched against the attributes the
//! identity provider released.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Request Context                             │
//! │  (Attributes + requester id / relay state)   │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Subject Resolver                            │
//! │  ├─ Global scope, or                         │
//! │  ├─ Client id from requester id, or          │
//! │  └─ Client id from relay state               │
//! └─────────────────┬───────────────────────────┘
//!                   │  (unknown client: pass through)
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Rule Evaluator                              │
//! │  ├─ Rules in configuration order             │
//! │  ├─ First matching value wins                │
//! │  └─ Allow-list or deny-list semantics        │
//! └─────────────────┬───────────────────────────┘
//!                   │  (deny)
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Rejection Dispatcher                        │
//! │  - Suspend request under an opaque id        │
//! │  - Redirect to the rejection page            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use attrgate_abac::attributes::{AttributeBag, RequestContext};
//! use attrgate_abac::dispatch::{InMemoryStateStore, SuspendingDispatcher};
//! use attrgate_abac::filter::{AuthorizeFilter, Outcome};
//! use serde_json::json;
//!
//! let config = json!({
//!     "rejectMsg": { "en": "This service is for staff only." },
//!     "eduPersonAffiliation": ["^staff$", "^faculty$"],
//! });
//! let config = config.as_object().unwrap();
//!
//! let store = Arc::new(InMemoryStateStore::new());
//! let dispatcher = Arc::new(SuspendingDispatcher::new(store, "/authorize/403"));
//! let filter = AuthorizeFilter::from_config(config, dispatcher)?;
//!
//! let request = RequestContext::new(
//!     AttributeBag::new().with("eduPersonAffiliation", ["student"]),
//! );
//! let outcome = filter.process(&request)?;
//! assert!(matches!(outcome, Outcome::Rejected { .. }));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod attributes;
pub mod compiler;
pub mod dispatch;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod pattern;
pub mod policy;
pub mod resolver;

// Kani proofs for bounded model checking
#[cfg(any(test, kani))]
mod kani_proofs;

pub use attributes::{AttributeBag, RequestContext};
pub use compiler::{CompiledPolicy, DeploymentMode, compile};
pub use dispatch::{
    InMemoryStateStore, Redirect, RejectionDispatcher, RejectionPage, StateStore,
    SuspendingDispatcher,
};
pub use error::{ConfigError, DispatchError, FilterError, RequestError};
pub use evaluator::{Decision, Rejection, RuleMatch, evaluate};
pub use filter::{AuthorizeFilter, Outcome, Verdict};
pub use policy::{Effect, LocalizedText, MatchMode, PolicyScope, PolicySet};
pub use resolver::{OutOfScope, Subject, SubjectResolver};
