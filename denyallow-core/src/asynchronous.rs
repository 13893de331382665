//! The disjunctive evaluator for checks that await I/O.
//!
//! Same rules as [`evaluate`](crate::evaluate()): checks run one after
//! another in list order, the first `true` wins, an error stops everything.

use crate::check::Check;
use crate::decision::{Decision, Verdict};
use crate::error::CheckResult;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, trace};

/// A permission predicate that needs to await, e.g. a membership lookup
#[async_trait]
pub trait AsyncCheck<C: ?Sized + Sync, T: ?Sized + Sync = ()>: Send + Sync {
    /// Stable name used in diagnostics
    fn name(&self) -> &str;

    /// Decide whether access should be granted
    async fn check(&self, ctx: &C, target: Option<&T>) -> CheckResult<bool>;
}

/// Lifts a synchronous [`Check`] into an [`AsyncCheck`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Blocking<K>(pub K);

#[async_trait]
impl<C, T, K> AsyncCheck<C, T> for Blocking<K>
where
    C: ?Sized + Sync,
    T: ?Sized + Sync,
    K: Check<C, T>,
{
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn check(&self, ctx: &C, target: Option<&T>) -> CheckResult<bool> {
        self.0.check(ctx, target)
    }
}

/// Decide whether any of `checks` grants access, awaiting each in turn
pub async fn evaluate_async<C, T>(
    checks: &[Arc<dyn AsyncCheck<C, T>>],
    ctx: &C,
    target: Option<&T>,
) -> CheckResult<Decision>
where
    C: ?Sized + Sync,
    T: ?Sized + Sync,
{
    evaluate_async_verdict(checks, ctx, target)
        .await
        .map(|verdict| verdict.decision)
}

/// Same as [`evaluate_async`], but also reports which check granted access
pub async fn evaluate_async_verdict<C, T>(
    checks: &[Arc<dyn AsyncCheck<C, T>>],
    ctx: &C,
    target: Option<&T>,
) -> CheckResult<Verdict>
where
    C: ?Sized + Sync,
    T: ?Sized + Sync,
{
    let mut evaluated = 0;

    for check in checks {
        evaluated += 1;

        match check.check(ctx, target).await {
            Ok(true) => {
                debug!(check = check.name(), position = evaluated, "permission granted");
                return Ok(Verdict::allowed(check.name(), evaluated));
            }
            Ok(false) => {
                trace!(check = check.name(), "check declined");
            }
            Err(e) => {
                debug!(check = check.name(), error = %e, "check raised, aborting evaluation");
                return Err(e);
            }
        }
    }

    debug!(evaluated, "no check granted permission");
    Ok(Verdict::denied(evaluated))
}
