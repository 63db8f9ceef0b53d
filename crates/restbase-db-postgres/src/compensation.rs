//! Compensating actions for side effects outside the database.
//!
//! A blob written to object storage before its row is inserted has no
//! transactional link to that row. Register an undo action here; it runs if
//! the transaction does not commit.

use std::future::Future;

use futures_util::future::BoxFuture;
use tracing::warn;

/// Error type returned by compensating actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Action = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Undo actions, run in reverse registration order.
///
/// Actions are cleared by [`disarm`](Self::disarm) after a commit. If the
/// registry is dropped while still armed (the request was cancelled), the
/// pending actions are spawned on the current Tokio runtime.
#[derive(Default)]
pub struct Compensations {
    actions: Vec<(String, Action)>,
}

impl std::fmt::Debug for Compensations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<&str> = self.actions.iter().map(|(l, _)| l.as_str()).collect();
        f.debug_struct("Compensations").field("pending", &labels).finish()
    }
}

impl Compensations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an undo action under a label used in logs.
    pub fn register<F, Fut>(&mut self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.actions
            .push((label.into(), Box::new(move || Box::pin(action()))));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Forget all actions; the side effects are now backed by committed rows.
    pub fn disarm(&mut self) {
        self.actions.clear();
    }

    /// Run every pending action, newest first. Returns the number that
    /// failed; failures are logged, never propagated.
    pub async fn run(&mut self) -> usize {
        run_actions(std::mem::take(&mut self.actions)).await
    }
}

async fn run_actions(actions: Vec<(String, Action)>) -> usize {
    let mut failed = 0;
    for (label, action) in actions.into_iter().rev() {
        if let Err(error) = action().await {
            failed += 1;
            warn!(action = %label, error = %error, "compensating action failed");
        }
    }
    failed
}

impl Drop for Compensations {
    fn drop(&mut self) {
        if self.actions.is_empty() {
            return;
        }

        let actions = std::mem::take(&mut self.actions);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(pending = actions.len(), "running compensations for abandoned transaction");
                handle.spawn(run_actions(actions));
            }
            Err(_) => {
                warn!(
                    pending = actions.len(),
                    "compensations dropped outside a Tokio runtime; side effects left in place"
                );
            }
        }
    }
}
