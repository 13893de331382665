//! # Denyallow Core
//!
//! Deny-all, allow-specific permission evaluation.
//!
//! Most authorization layers require every registered check to pass. This
//! crate inverts the rule: access is granted as soon as ANY check passes, and
//! denied when none does. An empty list denies.
//!
//! ## Features
//!
//! - **Disjunctive Evaluation**: ordered checks, short-circuit on the first grant
//! - **Errors Propagate**: a failing check is reported, never read as a denial
//! - **Built-in Checks**: authenticated, staff, superuser and shared-key checks
//! - **Method Policies**: read/write or CRUD dispatch at view and object level
//! - **Async Checks**: the same rule for checks that await I/O
//!
//! ## Quick Start
//!
//! ```rust
//! use denyallow_core::{CheckList, Decision, predicate};
//!
//! struct Request {
//!     user: String,
//!     owner: String,
//!     admin: bool,
//! }
//!
//! let checks: CheckList<Request> = CheckList::new()
//!     .with(predicate("is_owner", |req: &Request, _: Option<&()>| req.user == req.owner))
//!     .with(predicate("is_admin", |req: &Request, _: Option<&()>| req.admin));
//!
//! let req = Request { user: "bob".into(), owner: "alice".into(), admin: true };
//! assert_eq!(checks.evaluate(&req, None).unwrap(), Decision::Allow);
//!
//! let req = Request { user: "bob".into(), owner: "alice".into(), admin: false };
//! assert_eq!(checks.evaluate(&req, None).unwrap(), Decision::Deny);
//! ```

pub mod asynchronous;
pub mod builtin;
pub mod check;
pub mod context;
pub mod decision;
pub mod error;
pub mod evaluate;
pub mod list;
pub mod policy;

pub use asynchronous::{AsyncCheck, Blocking, evaluate_async, evaluate_async_verdict};
pub use builtin::{
    AllowAll, AllowAuthenticated, AllowAuthorizedKey, AllowStaff, AllowSuperuser, Authenticated,
    DenyAll,
};
pub use check::{Check, FnCheck, from_fn, predicate};
pub use context::{Identity, RequestInfo};
pub use decision::{Decision, Verdict};
pub use error::{CheckError, CheckResult};
pub use evaluate::{evaluate, evaluate_verdict};
pub use list::CheckList;
pub use policy::{MethodScheme, Operation, Policy};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
