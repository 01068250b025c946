//! Error Policy
//!
//! How a failed container operation is surfaced to the caller.
//!
//! Every operation returns `Result<T>`; a policy turns that into
//! `Result<Option<T>>`:
//!
//! | Policy | On `Err(e)`                        |
//! |--------|------------------------------------|
//! | Throw  | `Err(e)`                           |
//! | Check  | `Ok(None)`                         |
//! | Ignore | `Ok(None)`, reported via `tracing` |

use parking_lot::Mutex;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Propagate the error
    #[default]
    Throw,
    /// Swallow the error silently; the caller inspects the `None`
    Check,
    /// Report the error and swallow it (expected-failure probes)
    Ignore,
}

impl ErrorPolicy {
    /// Apply this policy to the result of `op`
    pub fn apply<T>(self, op: &str, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) => match self {
                ErrorPolicy::Throw => Err(e),
                ErrorPolicy::Check => {
                    tracing::debug!(op, error = %e, "operation failed (check)");
                    Ok(None)
                }
                ErrorPolicy::Ignore => {
                    tracing::warn!(op, error = %e, "operation failed (ignored)");
                    Ok(None)
                }
            },
        }
    }
}

/// Restores the previous policy of a slot when dropped, including during
/// unwinding.
pub(crate) struct PolicyGuard<'a> {
    slot: &'a Mutex<ErrorPolicy>,
    prior: ErrorPolicy,
}

impl<'a> PolicyGuard<'a> {
    pub(crate) fn push(slot: &'a Mutex<ErrorPolicy>, policy: ErrorPolicy) -> Self {
        let prior = std::mem::replace(&mut *slot.lock(), policy);
        Self { slot, prior }
    }
}

impl Drop for PolicyGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = self.prior;
    }
}
