use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_secs(1);

/// Coalesces bursts of mutations into one deferred save.
///
/// Every `schedule` aborts the pending timer and arms a fresh one. The save job
/// passed to `schedule` must call [`SaveScheduler::fire`] with its generation
/// once it holds the owner's state, and skip saving when that returns `false`.
#[derive(Debug)]
pub struct SaveScheduler {
    delay: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl SaveScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Arms the timer. `job` receives the generation it was armed with.
    pub fn schedule<F, Fut>(&mut self, job: F)
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let delay = self.delay;
        let job = job(self.generation);
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job.await;
        }));
    }

    /// Claims the timer for `generation`. Returns `false` if a newer timer replaced it.
    pub fn fire(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        // Detach without aborting: the caller is this very task.
        self.pending = None;
        true
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for SaveScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
