//! Method-dispatched permission policies.
//!
//! A [`Policy`] holds two levels of check lists. The view level is evaluated
//! before a handler runs and sees no target. The object level is evaluated
//! once the handler has loaded the resource and receives it as the target.
//!
//! Each level has an `rw` list consulted for every request. When `rw` does
//! not grant access, the [`MethodScheme`] picks one more list based on the
//! request method. Every list starts out as [`CheckList::deny_all`].

use crate::context::RequestInfo;
use crate::decision::Decision;
use crate::error::{CheckError, CheckResult};
use crate::list::CheckList;
use std::fmt;
use tracing::debug;

/// Methods that only read state
pub const SAFE_METHODS: [&str; 3] = ["GET", "HEAD", "OPTIONS"];

/// Default message reported when a policy denies access
pub const DEFAULT_DENY_MESSAGE: &str = "Permission denied.";

/// What a request method does to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `GET`, `HEAD`, `OPTIONS`
    Read,
    /// `POST`
    Create,
    /// `PUT`, `PATCH`
    Update,
    /// `DELETE`
    Delete,
}

impl Operation {
    /// Classify a method name. Method names are case-sensitive, so `get`
    /// is an unknown method and yields `None`.
    pub fn from_method(method: &str) -> Option<Self> {
        if Self::is_safe_method(method) {
            return Some(Self::Read);
        }

        match method {
            "POST" => Some(Self::Create),
            "PUT" | "PATCH" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Whether `method` is one of [`SAFE_METHODS`]
    pub fn is_safe_method(method: &str) -> bool {
        SAFE_METHODS.iter().any(|safe| *safe == method)
    }

    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the request method selects check lists beyond `rw`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodScheme {
    /// Only the `rw` list is consulted
    #[default]
    Uniform,
    /// Safe methods consult `read`, all others consult `write`
    ReadWrite,
    /// Safe methods consult `read`, `POST` consults `add`, `PUT` and `PATCH`
    /// consult `change`, `DELETE` consults `delete`. Other methods are denied.
    Crud,
}

impl MethodScheme {
    fn uses(self, slot: Slot) -> bool {
        match (self, slot) {
            (_, Slot::Rw) => true,
            (Self::Uniform, _) => false,
            (Self::ReadWrite, slot) => matches!(slot, Slot::Read | Slot::Write),
            (Self::Crud, slot) => !matches!(slot, Slot::Write),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::ReadWrite => "read/write",
            Self::Crud => "crud",
        }
    }
}

impl fmt::Display for MethodScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Rw,
    Read,
    Write,
    Add,
    Change,
    Delete,
}

impl Slot {
    fn as_str(self) -> &'static str {
        match self {
            Self::Rw => "rw",
            Self::Read => "read",
            Self::Write => "write",
            Self::Add => "add",
            Self::Change => "change",
            Self::Delete => "delete",
        }
    }
}

/// Check lists for one level of a policy
struct Rules<C: ?Sized, T: ?Sized> {
    rw: CheckList<C, T>,
    read: CheckList<C, T>,
    write: CheckList<C, T>,
    add: CheckList<C, T>,
    change: CheckList<C, T>,
    delete: CheckList<C, T>,
    configured: Vec<Slot>,
}

impl<C: ?Sized, T: ?Sized> Rules<C, T> {
    fn new() -> Self {
        Self {
            rw: CheckList::deny_all(),
            read: CheckList::deny_all(),
            write: CheckList::deny_all(),
            add: CheckList::deny_all(),
            change: CheckList::deny_all(),
            delete: CheckList::deny_all(),
            configured: Vec::new(),
        }
    }

    fn set(&mut self, slot: Slot, list: CheckList<C, T>) {
        let target = match slot {
            Slot::Rw => &mut self.rw,
            Slot::Read => &mut self.read,
            Slot::Write => &mut self.write,
            Slot::Add => &mut self.add,
            Slot::Change => &mut self.change,
            Slot::Delete => &mut self.delete,
        };
        *target = list;

        if !self.configured.contains(&slot) {
            self.configured.push(slot);
        }
    }

    fn get(&self, slot: Slot) -> &CheckList<C, T> {
        match slot {
            Slot::Rw => &self.rw,
            Slot::Read => &self.read,
            Slot::Write => &self.write,
            Slot::Add => &self.add,
            Slot::Change => &self.change,
            Slot::Delete => &self.delete,
        }
    }

    fn select(&self, scheme: MethodScheme, method: &str) -> Option<Slot> {
        match scheme {
            MethodScheme::Uniform => None,
            MethodScheme::ReadWrite if Operation::is_safe_method(method) => Some(Slot::Read),
            MethodScheme::ReadWrite => Some(Slot::Write),
            MethodScheme::Crud => Operation::from_method(method).map(|op| match op {
                Operation::Read => Slot::Read,
                Operation::Create => Slot::Add,
                Operation::Update => Slot::Change,
                Operation::Delete => Slot::Delete,
            }),
        }
    }

    fn evaluate(
        &self,
        scheme: MethodScheme,
        method: &str,
        ctx: &C,
        target: Option<&T>,
    ) -> CheckResult<Decision> {
        if self.rw.evaluate(ctx, target)?.is_allowed() {
            return Ok(Decision::Allow);
        }

        match self.select(scheme, method) {
            Some(slot) => self.get(slot).evaluate(ctx, target),
            None => {
                if scheme == MethodScheme::Crud {
                    debug!(method, "method has no crud operation, denying");
                }
                Ok(Decision::Deny)
            }
        }
    }

    fn validate(&self, scheme: MethodScheme, level: &str) -> CheckResult<()> {
        for slot in &self.configured {
            if !scheme.uses(*slot) {
                return Err(CheckError::config(format!(
                    "{level}`{}` is set but the {scheme} scheme never consults it",
                    slot.as_str()
                )));
            }
        }
        Ok(())
    }
}

impl<C: ?Sized, T: ?Sized> Clone for Rules<C, T> {
    fn clone(&self) -> Self {
        Self {
            rw: self.rw.clone(),
            read: self.read.clone(),
            write: self.write.clone(),
            add: self.add.clone(),
            change: self.change.clone(),
            delete: self.delete.clone(),
            configured: self.configured.clone(),
        }
    }
}

impl<C: ?Sized, T: ?Sized> fmt::Debug for Rules<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for slot in &self.configured {
            map.entry(&slot.as_str(), self.get(*slot));
        }
        map.finish()
    }
}

/// View-level and object-level check lists for one protected route.
///
/// ```rust
/// use denyallow_core::{AllowAll, AllowAuthenticated, Policy, RequestInfo, any_of};
///
/// struct Req(&'static str);
///
/// impl RequestInfo for Req {
///     fn method(&self) -> &str { self.0 }
///     fn header(&self, _name: &str) -> Option<&str> { None }
/// }
///
/// let policy: Policy<Req> = Policy::read_write().read(any_of![AllowAll]);
/// policy.validate().unwrap();
///
/// assert!(policy.has_permission(&Req("GET")).unwrap().is_allowed());
/// assert!(policy.has_permission(&Req("POST")).unwrap().is_denied());
/// ```
pub struct Policy<C: ?Sized, T: ?Sized = ()> {
    scheme: MethodScheme,
    view: Rules<C, T>,
    object: Rules<C, T>,
    message: Option<String>,
}

impl<C: ?Sized, T: ?Sized> Policy<C, T> {
    /// A policy using the given scheme, denying everything
    pub fn new(scheme: MethodScheme) -> Self {
        Self {
            scheme,
            view: Rules::new(),
            object: Rules::new(),
            message: None,
        }
    }

    /// Policy consulting only the `rw` lists
    pub fn uniform() -> Self {
        Self::new(MethodScheme::Uniform)
    }

    /// Policy split into `read` and `write`
    pub fn read_write() -> Self {
        Self::new(MethodScheme::ReadWrite)
    }

    /// Policy split into `read`, `add`, `change` and `delete`
    pub fn crud() -> Self {
        Self::new(MethodScheme::Crud)
    }

    /// The method scheme
    pub fn scheme(&self) -> MethodScheme {
        self.scheme
    }

    /// Message reported when access is denied
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or(DEFAULT_DENY_MESSAGE)
    }

    /// The message set with [`Policy::with_message`], if any
    pub fn custom_message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Replace the denial message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// View-level list consulted for every method
    pub fn rw(mut self, list: CheckList<C, T>) -> Self {
        self.view.set(Slot::Rw, list);
        self
    }

    /// View-level list for safe methods
    pub fn read(mut self, list: CheckList<C, T>) -> Self {
        self.view.set(Slot::Read, list);
        self
    }

    /// View-level list for unsafe methods under [`MethodScheme::ReadWrite`]
    pub fn write(mut self, list: CheckList<C, T>) -> Self {
        self.view.set(Slot::Write, list);
        self
    }

    /// View-level list for `POST`
    pub fn add(mut self, list: CheckList<C, T>) -> Self {
        self.view.set(Slot::Add, list);
        self
    }

    /// View-level list for `PUT` and `PATCH`
    pub fn change(mut self, list: CheckList<C, T>) -> Self {
        self.view.set(Slot::Change, list);
        self
    }

    /// View-level list for `DELETE`
    pub fn delete(mut self, list: CheckList<C, T>) -> Self {
        self.view.set(Slot::Delete, list);
        self
    }

    /// Object-level list consulted for every method
    pub fn object_rw(mut self, list: CheckList<C, T>) -> Self {
        self.object.set(Slot::Rw, list);
        self
    }

    /// Object-level list for safe methods
    pub fn object_read(mut self, list: CheckList<C, T>) -> Self {
        self.object.set(Slot::Read, list);
        self
    }

    /// Object-level list for unsafe methods under [`MethodScheme::ReadWrite`]
    pub fn object_write(mut self, list: CheckList<C, T>) -> Self {
        self.object.set(Slot::Write, list);
        self
    }

    /// Object-level list for `POST`
    pub fn object_add(mut self, list: CheckList<C, T>) -> Self {
        self.object.set(Slot::Add, list);
        self
    }

    /// Object-level list for `PUT` and `PATCH`
    pub fn object_change(mut self, list: CheckList<C, T>) -> Self {
        self.object.set(Slot::Change, list);
        self
    }

    /// Object-level list for `DELETE`
    pub fn object_delete(mut self, list: CheckList<C, T>) -> Self {
        self.object.set(Slot::Delete, list);
        self
    }

    /// Reject lists the scheme would never consult and an empty message
    pub fn validate(&self) -> CheckResult<()> {
        if matches!(self.message.as_deref(), Some(message) if message.trim().is_empty()) {
            return Err(CheckError::config("deny message must not be empty"));
        }

        self.view.validate(self.scheme, "")?;
        self.object.validate(self.scheme, "object ")?;
        Ok(())
    }
}

impl<C: RequestInfo + ?Sized, T: ?Sized> Policy<C, T> {
    /// View-level decision, evaluated before the handler runs
    pub fn has_permission(&self, ctx: &C) -> CheckResult<Decision> {
        self.view.evaluate(self.scheme, ctx.method(), ctx, None)
    }

    /// Object-level decision for an already loaded target
    pub fn has_object_permission(&self, ctx: &C, obj: &T) -> CheckResult<Decision> {
        self.object.evaluate(self.scheme, ctx.method(), ctx, Some(obj))
    }
}

impl<C: ?Sized, T: ?Sized> Default for Policy<C, T> {
    fn default() -> Self {
        Self::uniform()
    }
}

impl<C: ?Sized, T: ?Sized> Clone for Policy<C, T> {
    fn clone(&self) -> Self {
        Self {
            scheme: self.scheme,
            view: self.view.clone(),
            object: self.object.clone(),
            message: self.message.clone(),
        }
    }
}

impl<C: ?Sized, T: ?Sized> fmt::Debug for Policy<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("scheme", &self.scheme)
            .field("view", &self.view)
            .field("object", &self.object)
            .field("message", &self.message())
            .finish()
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod policy_tests;
