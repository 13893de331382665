//! Ordered check lists

use crate::builtin::DenyAll;
use crate::check::Check;
use crate::decision::{Decision, Verdict};
use crate::error::CheckResult;
use crate::evaluate::{evaluate, evaluate_verdict};
use std::fmt;
use std::sync::Arc;

/// An ordered list of checks combined with logical OR.
///
/// Cloning is cheap: the checks themselves are shared.
pub struct CheckList<C: ?Sized, T: ?Sized = ()> {
    checks: Vec<Arc<dyn Check<C, T>>>,
}

impl<C: ?Sized, T: ?Sized> CheckList<C, T> {
    /// Create an empty list, which denies everything
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// A list holding only [`DenyAll`], stating the default-deny intent explicitly
    pub fn deny_all() -> Self {
        Self::new().with(DenyAll)
    }

    /// Append a check and return the list
    pub fn with<K: Check<C, T> + 'static>(mut self, check: K) -> Self {
        self.push(check);
        self
    }

    /// Append a check
    pub fn push<K: Check<C, T> + 'static>(&mut self, check: K) {
        self.checks.push(Arc::new(check));
    }

    /// Append an already shared check
    pub fn push_shared(&mut self, check: Arc<dyn Check<C, T>>) {
        self.checks.push(check);
    }

    /// Append every check of `other`, keeping its order
    pub fn extend(&mut self, other: &CheckList<C, T>) {
        self.checks.extend(other.checks.iter().cloned());
    }

    /// Number of checks
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// True when the list holds no checks
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Check names in evaluation order
    pub fn names(&self) -> Vec<&str> {
        self.checks.iter().map(|check| check.name()).collect()
    }

    /// Iterate over the checks in evaluation order
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<dyn Check<C, T>>> {
        self.checks.iter()
    }

    /// The checks as a slice
    pub fn as_slice(&self) -> &[Arc<dyn Check<C, T>>] {
        &self.checks
    }

    /// Evaluate the list, see [`evaluate`](crate::evaluate())
    pub fn evaluate(&self, ctx: &C, target: Option<&T>) -> CheckResult<Decision> {
        evaluate(&self.checks, ctx, target)
    }

    /// Evaluate the list and report which check granted access
    pub fn verdict(&self, ctx: &C, target: Option<&T>) -> CheckResult<Verdict> {
        evaluate_verdict(&self.checks, ctx, target)
    }
}

impl<C: ?Sized, T: ?Sized> Default for CheckList<C, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized, T: ?Sized> Clone for CheckList<C, T> {
    fn clone(&self) -> Self {
        Self {
            checks: self.checks.clone(),
        }
    }
}

impl<C: ?Sized, T: ?Sized> fmt::Debug for CheckList<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<C: ?Sized, T: ?Sized> FromIterator<Arc<dyn Check<C, T>>> for CheckList<C, T> {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Check<C, T>>>>(iter: I) -> Self {
        Self {
            checks: iter.into_iter().collect(),
        }
    }
}

impl<'a, C: ?Sized, T: ?Sized> IntoIterator for &'a CheckList<C, T> {
    type Item = &'a Arc<dyn Check<C, T>>;
    type IntoIter = std::slice::Iter<'a, Arc<dyn Check<C, T>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.checks.iter()
    }
}

/// Build a [`CheckList`] from check values.
///
/// ```rust
/// use denyallow_core::{AllowAll, CheckList, DenyAll, any_of};
///
/// let checks: CheckList<()> = any_of![DenyAll, AllowAll];
/// assert_eq!(checks.names(), vec!["deny_all", "allow_all"]);
/// assert!(checks.evaluate(&(), None).unwrap().is_allowed());
/// ```
#[macro_export]
macro_rules! any_of {
    () => {
        $crate::CheckList::new()
    };
    ($($check:expr),+ $(,)?) => {
        $crate::CheckList::new()$(.with($check))+
    };
}
