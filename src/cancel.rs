//! Cooperative cancellation shared between the solution import and its
//! project parse tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable cancellation flag.
///
/// Parsers poll [`is_canceled`](Self::is_canceled) between discrete steps
/// (manifest lines, file-list entries) and unwind with
/// [`VcprojError::Canceled`](crate::error::VcprojError::Canceled).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// `Err(Canceled)` once cancellation has been requested.
    pub(crate) fn check(&self) -> Result<(), crate::error::VcprojError> {
        if self.is_canceled() {
            Err(crate::error::VcprojError::Canceled)
        } else {
            Ok(())
        }
    }
}
