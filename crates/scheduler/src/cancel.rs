//! Cooperative cancellation for decode jobs and animations.
//!
//! A token is a shared flag. Decode workers check it before and after the
//! decoder call; animations check it on every tick. Nothing is ever
//! interrupted mid-call.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

/// Cancellation token for cooperative job cancellation
///
/// Clones share the same flag, so the side that cancels and the side that
/// polls each keep their own handle.
///
/// # Example
///
/// ```
/// use tessera_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
///
/// token.cancel();
/// assert!(worker_token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new token in the non-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if `cancel()` has been called on this token or any clone
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Job id allocated by the tile scheduler
pub type JobId = u64;

/// Registry of in-flight jobs
///
/// Associates each job id with its token and a caller-defined tag so jobs
/// can be cancelled by predicate over the tag (for example "every job that
/// is not for the base layer").
pub struct CancellationRegistry<T> {
    jobs: Mutex<HashMap<JobId, (CancellationToken, T)>>,
}

impl<T: Clone> CancellationRegistry<T> {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self { jobs: Mutex::new(HashMap::new()) }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, (CancellationToken, T)>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a job and return the token handed to the worker
    pub fn register(&self, job_id: JobId, tag: T) -> CancellationToken {
        let token = CancellationToken::new();
        self.jobs().insert(job_id, (token.clone(), tag));
        token
    }

    /// Cancel a single job. Returns its tag if it was registered.
    pub fn cancel(&self, job_id: JobId) -> Option<T> {
        let (token, tag) = self.jobs().remove(&job_id)?;
        token.cancel();
        Some(tag)
    }

    /// Cancel and unregister every job whose tag matches
    ///
    /// Returns the tags of the cancelled jobs.
    pub fn cancel_where<F>(&self, mut predicate: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut jobs = self.jobs();
        let matching: Vec<JobId> = jobs
            .iter()
            .filter(|(_, (_, tag))| predicate(tag))
            .map(|(id, _)| *id)
            .collect();

        matching
            .into_iter()
            .filter_map(|id| jobs.remove(&id))
            .map(|(token, tag)| {
                token.cancel();
                tag
            })
            .collect()
    }

    /// Cancel and unregister everything
    pub fn cancel_all(&self) -> Vec<T> {
        self.cancel_where(|_| true)
    }

    /// Remove a finished job without cancelling it
    pub fn unregister(&self, job_id: JobId) {
        self.jobs().remove(&job_id);
    }

    /// Check whether a registered tag satisfies the predicate
    pub fn any<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.jobs().values().any(|(_, tag)| predicate(tag))
    }

    /// Number of registered jobs
    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    /// Check if no jobs are registered
    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }
}

impl<T: Clone> Default for CancellationRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_active() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_shared_by_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();

        clone.cancel();
        clone.cancel();

        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_returns_tag() {
        let registry = CancellationRegistry::new();
        let token = registry.register(1, "base");

        assert_eq!(registry.cancel(1), Some("base"));
        assert!(token.is_cancelled());
        assert_eq!(registry.cancel(1), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_where_filters_by_tag() {
        let registry = CancellationRegistry::new();
        let base = registry.register(1, true);
        let detail_a = registry.register(2, false);
        let detail_b = registry.register(3, false);

        let cancelled = registry.cancel_where(|is_base| !is_base);

        assert_eq!(cancelled.len(), 2);
        assert!(!base.is_cancelled());
        assert!(detail_a.is_cancelled());
        assert!(detail_b.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_does_not_cancel() {
        let registry = CancellationRegistry::new();
        let token = registry.register(9, ());

        registry.unregister(9);

        assert!(!token.is_cancelled());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_all() {
        let registry = CancellationRegistry::new();
        let tokens: Vec<_> = (0..4).map(|id| registry.register(id, id)).collect();

        assert_eq!(registry.cancel_all().len(), 4);
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
        assert!(!registry.any(|_| true));
    }
}
