//! Cooperative cancellation.
//!
//! Long operations check the token between batches. Nothing is rolled
//! back: work committed before the check stays.

use crate::data::{GridError, GridResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested
    pub fn check(&self) -> GridResult<()> {
        if self.is_cancelled() {
            Err(GridError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// True when an optional token has been cancelled
pub(crate) fn is_cancelled(token: Option<&CancellationToken>) -> bool {
    token.map(CancellationToken::is_cancelled).unwrap_or(false)
}
