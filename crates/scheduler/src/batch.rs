use crate::events::EventListener;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct Progress {
    remaining: usize,
    interrupted: bool,
}

/// Progress of one `load_tiles` call.
///
/// Each dispatched job finishes exactly once, whether it decoded, failed or
/// was cancelled, and the last one wakes anyone blocked in
/// [`LoadBatch::wait`]. Only a batch with a reporter talks to the listener,
/// and it reports full-image-loaded only when no job was cancelled or
/// superseded along the way.
pub struct LoadBatch {
    total: usize,
    progress: Mutex<Progress>,
    done: Condvar,
    reporter: Option<Arc<dyn EventListener>>,
}

impl LoadBatch {
    pub fn new(total: usize, reporter: Option<Arc<dyn EventListener>>) -> Arc<Self> {
        Arc::new(Self {
            total,
            progress: Mutex::new(Progress { remaining: total, interrupted: false }),
            done: Condvar::new(),
            reporter,
        })
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Listener for tile and batch events, if this batch reports at all.
    pub fn reporter(&self) -> Option<&Arc<dyn EventListener>> {
        self.reporter.as_ref()
    }

    pub fn remaining(&self) -> usize {
        self.progress().remaining
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    /// True once any job of the batch ended without a committed result.
    pub fn was_interrupted(&self) -> bool {
        self.progress().interrupted
    }

    /// Marks one job terminal: decoded or failed. Returns true for the job
    /// that completed the batch.
    pub fn finish_one(&self) -> bool {
        self.finish(false)
    }

    /// Marks one job as cancelled or stale. The batch still completes, but
    /// will not report the full image as loaded.
    pub fn finish_interrupted(&self) -> bool {
        self.finish(true)
    }

    fn finish(&self, interrupted: bool) -> bool {
        let report = {
            let mut progress = self.progress();
            if progress.remaining == 0 {
                return false;
            }
            progress.interrupted |= interrupted;
            progress.remaining -= 1;
            if progress.remaining > 0 {
                return false;
            }
            !progress.interrupted
        };

        self.done.notify_all();
        if report {
            if let Some(reporter) = &self.reporter {
                reporter.on_full_image_loaded();
            }
        }
        true
    }

    /// Blocks until every job in the batch is terminal.
    pub fn wait(&self) {
        let mut progress = self.progress();
        while progress.remaining > 0 {
            progress = self.done.wait(progress).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`wait`](Self::wait) with an upper bound. Returns true when the
    /// batch finished in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let progress = self.progress();
        let (progress, _) = self
            .done
            .wait_timeout_while(progress, timeout, |progress| progress.remaining > 0)
            .unwrap_or_else(PoisonError::into_inner);
        progress.remaining == 0
    }
}

impl std::fmt::Debug for LoadBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBatch")
            .field("total", &self.total)
            .field("remaining", &self.remaining())
            .field("reports", &self.reporter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl EventListener for Counting {
        fn on_full_image_loaded(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn last_finisher_reports_once() {
        let listener = Arc::new(Counting::default());
        let batch = LoadBatch::new(2, Some(listener.clone() as Arc<dyn EventListener>));

        assert!(!batch.finish_one());
        assert!(batch.finish_one());
        assert!(!batch.finish_one());

        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
        assert!(batch.is_finished());
    }

    #[test]
    fn interrupted_batch_completes_silently() {
        let listener = Arc::new(Counting::default());
        let batch = LoadBatch::new(3, Some(listener.clone() as Arc<dyn EventListener>));

        batch.finish_one();
        batch.finish_interrupted();
        assert!(batch.finish_one());

        assert!(batch.is_finished());
        assert!(batch.was_interrupted());
        assert_eq!(listener.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn batch_without_reporter_stays_quiet() {
        let batch = LoadBatch::new(1, None);
        assert!(batch.finish_one());
        assert!(batch.reporter().is_none());
        assert!(!batch.was_interrupted());
    }

    #[test]
    fn wait_returns_after_workers_finish() {
        let batch = LoadBatch::new(4, None);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let batch = Arc::clone(&batch);
                thread::spawn(move || {
                    batch.finish_one();
                })
            })
            .collect();

        batch.wait();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(batch.remaining(), 0);
    }

    #[test]
    fn wait_timeout_reports_unfinished_batch() {
        let batch = LoadBatch::new(1, None);
        assert!(!batch.wait_timeout(Duration::from_millis(5)));
        batch.finish_one();
        assert!(batch.wait_timeout(Duration::from_millis(5)));
    }
}
