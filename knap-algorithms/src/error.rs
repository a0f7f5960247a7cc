use std::fmt;

/// Returned by a solver that observed its [`Interrupt`](crate::Interrupt) being raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "solver interrupted")
    }
}

impl std::error::Error for Interrupted {}

/// A hyperparameter outside its accepted range. Rejected before the solver starts.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidParameter {
    pub name: &'static str,
    pub reason: String,
}

impl InvalidParameter {
    pub fn new(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for InvalidParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.name, self.reason)
    }
}

impl std::error::Error for InvalidParameter {}
