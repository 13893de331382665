//! The disjunctive evaluator

use crate::check::Check;
use crate::decision::{Decision, Verdict};
use crate::error::CheckResult;
use std::sync::Arc;
use tracing::{debug, trace};

/// Decide whether any of `checks` grants access.
///
/// Checks run in order. The first one that answers `true` wins and the rest
/// are skipped. If none does, or there are none at all, access is denied.
/// An error from a check is returned unchanged and stops the evaluation.
pub fn evaluate<C, T>(
    checks: &[Arc<dyn Check<C, T>>],
    ctx: &C,
    target: Option<&T>,
) -> CheckResult<Decision>
where
    C: ?Sized,
    T: ?Sized,
{
    evaluate_verdict(checks, ctx, target).map(|verdict| verdict.decision)
}

/// Same as [`evaluate`], but also reports which check granted access
pub fn evaluate_verdict<C, T>(
    checks: &[Arc<dyn Check<C, T>>],
    ctx: &C,
    target: Option<&T>,
) -> CheckResult<Verdict>
where
    C: ?Sized,
    T: ?Sized,
{
    let mut evaluated = 0;

    for check in checks {
        evaluated += 1;

        match check.check(ctx, target) {
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

#[cfg(test)]
#[path = "evaluate_tests.rs"]
mod evaluate_tests;
