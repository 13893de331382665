//! Evaluation outcomes

use std::fmt;

/// Outcome of a permission evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Decision {
    /// Proceed with the operation
    Allow,

    /// Reject the operation
    #[default]
    Deny,
}

impl Decision {
    /// Map a boolean answer onto a decision
    pub fn from_bool(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }

    /// True for [`Decision::Allow`]
    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }

    /// True for [`Decision::Deny`]
    pub fn is_denied(self) -> bool {
        self == Self::Deny
    }

    /// Get the string representation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        Self::from_bool(allowed)
    }
}

impl From<Decision> for bool {
    fn from(decision: Decision) -> Self {
        decision.is_allowed()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision together with how it was reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// The decision itself
    pub decision: Decision,

    /// Name of the check that granted access, if any
    pub granted_by: Option<String>,

    /// Number of checks that ran before the evaluator stopped
    pub evaluated: usize,
}

impl Verdict {
    pub(crate) fn allowed(check: &str, evaluated: usize) -> Self {
        Self {
            decision: Decision::Allow,
            granted_by: Some(check.to_string()),
            evaluated,
        }
    }

    pub(crate) fn denied(evaluated: usize) -> Self {
        Self {
            decision: Decision::Deny,
            granted_by: None,
            evaluated,
        }
    }

    /// True when access was granted
    pub fn is_allowed(&self) -> bool {
        self.decision.is_allowed()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.granted_by {
            Some(check) => write!(
                f,
                "{} (granted by {check} after {} check(s))",
                self.decision, self.evaluated
            ),
            None => write!(f, "{} after {} check(s)", self.decision, self.evaluated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_deny() {
        assert_eq!(Decision::default(), Decision::Deny);
    }

    #[test]
    fn test_bool_conversions() {
        assert_eq!(Decision::from(true), Decision::Allow);
        assert_eq!(Decision::from(false), Decision::Deny);
        assert!(bool::from(Decision::Allow));
        assert!(!bool::from(Decision::Deny));
    }

    #[test]
    fn test_verdict_display() {
        let verdict = Verdict::allowed("is_admin", 2);
        assert_eq!(verdict.to_string(), "allow (granted by is_admin after 2 check(s))");

        let verdict = Verdict::denied(0);
        assert_eq!(verdict.to_string(), "deny after 0 check(s)");
        assert!(!verdict.is_allowed());
    }
}
