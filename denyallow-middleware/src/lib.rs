//! # Denyallow Middleware
//!
//! Axum integration for deny-all, allow-specific permission policies.
//!
//! A [`PermissionGuard`] wraps a [`Policy`](denyallow_core::Policy) and runs
//! its view-level check before the handler. Handlers that load a resource can
//! pull the guard back out of the request extensions and run the object-level
//! check against it.
//!
//! ## Responses
//!
//! | Outcome | Status | Body |
//! |---------|--------|------|
//! | allowed | handler response | |
//! | denied | `403 Forbidden` | `{"detail": "<deny message>"}` |
//! | denied, anonymous, `DENYALLOW_ANONYMOUS_UNAUTHORIZED=true` | `401 Unauthorized` with `WWW-Authenticate: Bearer` | `{"detail": "<deny message>"}` |
//! | check error | `500 Internal Server Error` | `{"detail": "Permission check failed."}` |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Extension, Router, middleware::from_fn, routing::get};
//! use denyallow_core::{AllowAll, AllowAuthenticated, CheckList, Policy, any_of, predicate};
//! use denyallow_middleware::*;
//!
//! #[derive(Clone)]
//! struct Document {
//!     owner: String,
//! }
//!
//! async fn show(
//!     Extension(guard): Extension<PermissionGuard<Document>>,
//!     ctx: RequestContext,
//! ) -> Result<String, Rejection> {
//!     let doc = Document { owner: "alice".into() };
//!     guard.check_object(&ctx, &doc)?;
//!     Ok(doc.owner)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let is_owner: CheckList<RequestContext, Document> = any_of![predicate(
//!         "is_owner",
//!         |ctx: &RequestContext, doc: Option<&Document>| {
//!             matches!((ctx.principal(), doc), (Some(p), Some(d)) if p.user_id == d.owner)
//!         },
//!     )];
//!
//!     let policy = Policy::read_write()
//!         .read(any_of![AllowAll])
//!         .write(any_of![AllowAuthenticated])
//!         .object_read(is_owner.clone())
//!         .object_write(is_owner);
//!
//!     let guard = PermissionGuard::new(policy, GuardConfig::from_env()?)?;
//!
//!     let app: Router = Router::new()
//!         .route("/documents/1", get(show))
//!         .layer(from_fn(permission_middleware(guard)));
//!
//!     // Server setup...
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod middleware;

pub use config::{ConfigSummary, GuardConfig};
pub use context::{Principal, RequestContext};
pub use error::{GuardError, GuardResult};
pub use middleware::{AUTHENTICATE_CHALLENGE, PermissionGuard, Rejection, permission_middleware};
