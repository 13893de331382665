//! Capabilities a host context can expose to built-in checks.
//!
//! The evaluator itself never looks inside a context. Only the built-in
//! checks and the method-aware policies need to, and they ask for the
//! narrowest trait that answers their question.

/// Who is making the request, as established by the host's authentication
pub trait Identity {
    /// Whether the caller has been authenticated
    fn is_authenticated(&self) -> bool;

    /// Whether the caller is a staff member
    fn is_staff(&self) -> bool {
        false
    }

    /// Whether the caller is a superuser
    fn is_superuser(&self) -> bool {
        false
    }
}

/// Request metadata the host can hand to checks
pub trait RequestInfo {
    /// HTTP method of the request, e.g. `GET`
    fn method(&self) -> &str;

    /// Value of a request header.
    ///
    /// Implementations should match `name` case-insensitively, like HTTP does.
    fn header(&self, name: &str) -> Option<&str>;
}

impl<C: Identity + ?Sized> Identity for &C {
    fn is_authenticated(&self) -> bool {
        (**self).is_authenticated()
    }

    fn is_staff(&self) -> bool {
        (**self).is_staff()
    }

    fn is_superuser(&self) -> bool {
        (**self).is_superuser()
    }
}

impl<C: RequestInfo + ?Sized> RequestInfo for &C {
    fn method(&self) -> &str {
        (**self).method()
    }

    fn header(&self, name: &str) -> Option<&str> {
        (**self).header(name)
    }
}
