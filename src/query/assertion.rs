use super::outcome::Outcome;
use crate::errors::DbError;
use std::fmt;
use std::sync::Arc;

type Check = dyn Fn(&Outcome) -> Option<String> + Send + Sync;

/// Post-condition checked against the whole result of a forced query.
#[derive(Clone)]
pub struct Assertion {
    check: Arc<Check>,
    description: String,
}

impl Assertion {
    /// Wrap a boolean predicate. Without a message, the failure names the predicate's type.
    pub fn new<F>(predicate: F, message: Option<String>) -> Self
    where
        F: Fn(&Outcome) -> bool + Send + Sync + 'static,
    {
        let description = message.unwrap_or_else(|| std::any::type_name::<F>().to_string());
        let failure = description.clone();
        Self {
            check: Arc::new(move |out| (!predicate(out)).then(|| failure.clone())),
            description,
        }
    }

    /// Result size must equal `n`.
    #[must_use]
    pub fn quantity(n: u64) -> Self {
        Self {
            check: Arc::new(move |out| {
                let got = out.quantity();
                (got != n).then(|| format!("expected {n} result(s), got {got}"))
            }),
            description: format!("expected {n} result(s)"),
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Pass `outcome` through unchanged, or fail with `DbError::AssertionFailure`.
    ///
    /// # Errors
    /// Returns `DbError::AssertionFailure` when the predicate rejects the outcome.
    pub fn verify(&self, outcome: Outcome) -> Result<Outcome, DbError> {
        match (self.check)(&outcome) {
            None => Ok(outcome),
            Some(msg) => {
                log::debug!(
                    "assertion `{}` rejected {} outcome: {msg}",
                    self.description(),
                    outcome.kind_name()
                );
                Err(DbError::AssertionFailure(msg))
            }
        }
    }
}

impl fmt::Debug for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assertion").field("description", &self.description).finish_non_exhaustive()
    }
}
