//! Reusable checks for composing into check lists.
//!
//! Every built-in works with any target type. The identity-based checks need a
//! context implementing [`Identity`]; the shared key check needs
//! [`RequestInfo`].

use crate::check::Check;
use crate::context::{Identity, RequestInfo};
use crate::error::{CheckError, CheckResult};
use base64::{Engine as _, engine::general_purpose};
use sha2::{Digest, Sha256};
use std::fmt;

/// Header carrying the shared key for [`AllowAuthorizedKey`]
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Deny everyone.
///
/// An empty list denies just as well, but naming the check makes the intent
/// visible in configuration and diagnostics. On its own it locks the view for
/// every caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl<C: ?Sized, T: ?Sized> Check<C, T> for DenyAll {
    fn name(&self) -> &str {
        "deny_all"
    }

    fn check(&self, _ctx: &C, _target: Option<&T>) -> CheckResult<bool> {
        Ok(false)
    }
}

/// Allow anyone, authenticated or not
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl<C: ?Sized, T: ?Sized> Check<C, T> for AllowAll {
    fn name(&self) -> &str {
        "allow_all"
    }

    fn check(&self, _ctx: &C, _target: Option<&T>) -> CheckResult<bool> {
        Ok(true)
    }
}

/// Allow any authenticated caller
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAuthenticated;

impl<C: Identity + ?Sized, T: ?Sized> Check<C, T> for AllowAuthenticated {
    fn name(&self) -> &str {
        "allow_authenticated"
    }

    fn check(&self, ctx: &C, _target: Option<&T>) -> CheckResult<bool> {
        Ok(ctx.is_authenticated())
    }
}

/// Allow authenticated staff members
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowStaff;

impl<C: Identity + ?Sized, T: ?Sized> Check<C, T> for AllowStaff {
    fn name(&self) -> &str {
        "allow_staff"
    }

    fn check(&self, ctx: &C, _target: Option<&T>) -> CheckResult<bool> {
        Ok(ctx.is_authenticated() && ctx.is_staff())
    }
}

/// Allow authenticated superusers
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowSuperuser;

impl<C: Identity + ?Sized, T: ?Sized> Check<C, T> for AllowSuperuser {
    fn name(&self) -> &str {
        "allow_superuser"
    }

    fn check(&self, ctx: &C, _target: Option<&T>) -> CheckResult<bool> {
        Ok(ctx.is_authenticated() && ctx.is_superuser())
    }
}

/// Run the wrapped check only for authenticated callers.
///
/// Anonymous callers are declined without consulting the inner check, so it
/// can assume an established identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated<K>(pub K);

impl<K> Authenticated<K> {
    /// Wrap a check
    pub fn new(inner: K) -> Self {
        Self(inner)
    }

    /// The wrapped check
    pub fn inner(&self) -> &K {
        &self.0
    }
}

impl<C, T, K> Check<C, T> for Authenticated<K>
where
    C: Identity + ?Sized,
    T: ?Sized,
    K: Check<C, T>,
{
    fn name(&self) -> &str {
        self.0.name()
    }

    fn check(&self, ctx: &C, target: Option<&T>) -> CheckResult<bool> {
        if !ctx.is_authenticated() {
            return Ok(false);
        }

        self.0.check(ctx, target)
    }
}

/// Allow requests whose `Authorization` header carries a shared key.
///
/// Useful between services that talk to each other without a user identity.
/// Only SHA-256 digests of the keys are kept, and every stored digest is
/// compared in constant time.
#[derive(Clone, Default)]
pub struct AllowAuthorizedKey {
    digests: Vec<String>,
}

impl AllowAuthorizedKey {
    /// Build the check from a list of shared keys.
    ///
    /// A blank key is a configuration error. An empty list is accepted and
    /// never matches.
    pub fn new<I, S>(keys: I) -> CheckResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut digests = Vec::new();

        for key in keys {
            let key = key.as_ref();
            if key.trim().is_empty() {
                return Err(CheckError::config("authorized keys must not be blank"));
            }
            digests.push(hash_key(key));
        }

        Ok(Self { digests })
    }

    /// Number of configured keys
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// True when no key is configured
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    fn matches(&self, presented: &str) -> bool {
        let digest = hash_key(presented);
        self.digests
            .iter()
            .fold(false, |found, stored| secure_compare(&digest, stored) | found)
    }
}

impl fmt::Debug for AllowAuthorizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllowAuthorizedKey")
            .field("keys", &format_args!("[REDACTED; {}]", self.digests.len()))
            .finish()
    }
}

impl<C: RequestInfo + ?Sized, T: ?Sized> Check<C, T> for AllowAuthorizedKey {
    fn name(&self) -> &str {
        "allow_authorized_key"
    }

    fn check(&self, ctx: &C, _target: Option<&T>) -> CheckResult<bool> {
        let Some(presented) = ctx.header(AUTHORIZATION_HEADER) else {
            return Ok(false);
        };

        Ok(self.matches(presented))
    }
}

fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    general_purpose::STANDARD.encode(hasher.finalize())
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.bytes().zip(b.bytes()) {
        result |= byte_a ^ byte_b;
    }

    result == 0
}
