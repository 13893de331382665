//! The `Check` capability and closure adapters

use crate::error::CheckResult;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A single permission predicate.
///
/// A check looks at a read-only context and an optional target and answers
/// whether access should be granted. Checks hold no mutable shared state, so
/// one instance can serve any number of concurrent requests.
///
/// Returning `Err` means the check could not answer. The evaluator passes the
/// error straight back to its caller and runs no further checks.
pub trait Check<C: ?Sized, T: ?Sized = ()>: Send + Sync {
    /// Stable name used in diagnostics
    fn name(&self) -> &str;

    /// Decide whether access should be granted
    fn check(&self, ctx: &C, target: Option<&T>) -> CheckResult<bool>;
}

impl<C: ?Sized, T: ?Sized, K: Check<C, T> + ?Sized> Check<C, T> for Arc<K> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn check(&self, ctx: &C, target: Option<&T>) -> CheckResult<bool> {
        (**self).check(ctx, target)
    }
}

impl<C: ?Sized, T: ?Sized, K: Check<C, T> + ?Sized> Check<C, T> for Box<K> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn check(&self, ctx: &C, target: Option<&T>) -> CheckResult<bool> {
        (**self).check(ctx, target)
    }
}

/// A named check backed by a closure, see [`from_fn`]
pub struct FnCheck<C: ?Sized, T: ?Sized, F> {
    name: Cow<'static, str>,
    f: F,
    _marker: PhantomData<fn(&C, Option<&T>)>,
}

impl<C: ?Sized, T: ?Sized, F> Check<C, T> for FnCheck<C, T, F>
where
    F: Fn(&C, Option<&T>) -> CheckResult<bool> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, ctx: &C, target: Option<&T>) -> CheckResult<bool> {
        (self.f)(ctx, target)
    }
}

impl<C: ?Sized, T: ?Sized, F> fmt::Debug for FnCheck<C, T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCheck").field("name", &self.name).finish()
    }
}

/// Turn a fallible closure into a named check.
///
/// ```rust
/// use denyallow_core::{Check, from_fn};
///
/// struct Ctx { user: String, owner: String }
///
/// let is_owner = from_fn("is_owner", |ctx: &Ctx, _target: Option<&()>| {
///     Ok(ctx.user == ctx.owner)
/// });
/// let ctx = Ctx { user: "alice".into(), owner: "alice".into() };
/// assert!(is_owner.check(&ctx, None).unwrap());
/// ```
pub fn from_fn<C, T, F>(name: impl Into<Cow<'static, str>>, f: F) -> FnCheck<C, T, F>
where
    C: ?Sized,
    T: ?Sized,
    F: Fn(&C, Option<&T>) -> CheckResult<bool> + Send + Sync,
{
    FnCheck {
        name: name.into(),
        f,
        _marker: PhantomData,
    }
}

/// Turn an infallible closure into a named check
pub fn predicate<C, T, F>(
    name: impl Into<Cow<'static, str>>,
    f: F,
) -> FnCheck<C, T, impl Fn(&C, Option<&T>) -> CheckResult<bool> + Send + Sync>
where
    C: ?Sized,
    T: ?Sized,
    F: Fn(&C, Option<&T>) -> bool + Send + Sync,
{
    from_fn(name, move |ctx: &C, target: Option<&T>| Ok(f(ctx, target)))
}
