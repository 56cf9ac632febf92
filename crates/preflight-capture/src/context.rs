use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static SUPPRESSED: Vec<u64>;
}

/// Identity under which capture can be switched off for one task's work
///
/// Clones share the identity. Suppression is scoped to the future passed to
/// [`CaptureContext::suppressed`]: statements executed by that future skip
/// capture, while other tasks using the same context keep capturing.
#[derive(Debug, Clone)]
pub struct CaptureContext {
    id: u64,
}

impl Default for CaptureContext {
    fn default() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl CaptureContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the current task runs inside [`Self::suppressed`]
    /// for this context
    pub fn is_suppressed(&self) -> bool {
        SUPPRESSED
            .try_with(|ids| ids.contains(&self.id))
            .unwrap_or(false)
    }

    /// Runs `fut` with capture suppressed for this context
    ///
    /// Scopes nest: suppressing a second context inside keeps the first one
    /// suppressed too.
    pub async fn suppressed<F: Future>(&self, fut: F) -> F::Output {
        let mut ids = SUPPRESSED.try_with(Clone::clone).unwrap_or_default();
        if !ids.contains(&self.id) {
            ids.push(self.id);
        }
        SUPPRESSED.scope(ids, fut).await
    }
}
