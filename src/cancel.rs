//! Cooperative cancellation for long-running segmentation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, RoiError};

/// Shared flag checked by engines between units of work
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Fail with [`RoiError::Cancelled`] once the token has fired
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(RoiError::cancelled(operation))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(observer.check("slic").is_ok());
        token.cancel();
        assert!(matches!(
            observer.check("slic"),
            Err(RoiError::Cancelled { .. })
        ));
    }
}
