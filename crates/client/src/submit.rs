//! Single-flight submission for a dialog.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::ClientError;

/// One per dialog. While a request is in flight the submit control stays
/// disabled and further submits are refused.
#[derive(Debug, Default)]
pub struct SubmitGuard {
    busy: AtomicBool,
}

/// Held for the duration of one submission; releases the guard on drop.
#[derive(Debug)]
pub struct InFlight<'a> {
    guard: &'a SubmitGuard,
}

impl SubmitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the submit control should be rendered disabled.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn try_begin(&self) -> Option<InFlight<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight { guard: self })
    }

    /// Run `submit` unless another submission is still running.
    pub async fn run<T, F>(&self, submit: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        let _in_flight = self.try_begin().ok_or(ClientError::Busy)?;
        submit.await
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_submit_is_refused_while_busy() {
        let guard = SubmitGuard::new();
        let first = guard.try_begin();
        assert!(first.is_some());
        assert!(guard.is_busy());
        assert!(guard.try_begin().is_none());

        drop(first);
        assert!(!guard.is_busy());
        assert!(guard.try_begin().is_some());
    }

    #[tokio::test]
    async fn run_releases_after_an_error() {
        let guard = SubmitGuard::new();

        let result: Result<(), _> = guard
            .run(async {
                Err(ClientError::NotFound {
                    message: "peça não encontrada".to_string(),
                })
            })
            .await;
        assert!(result.unwrap_err().is_not_found());
        assert!(!guard.is_busy());

        let _held = guard.try_begin().unwrap();
        let refused = guard.run(async { Ok(1) }).await;
        assert!(matches!(refused, Err(ClientError::Busy)));
    }
}
