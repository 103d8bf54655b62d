use crate::application::store::TaskStore;
use crate::infrastructure::task_service::TaskService;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration as TokioDuration, MissedTickBehavior, interval};

pub const DEFAULT_POLL_INTERVAL: TokioDuration = TokioDuration::from_secs(5);

// Fixed-interval poll that discovers expired Pomodoro segments. Advancement
// itself happens backend-side against session end timestamps, so polling
// faster or slower never double-advances a cycle; this loop only decides how
// quickly the store notices.
pub struct PomodoroChecker<S: TaskService> {
    store: Arc<TaskStore<S>>,
    poll_interval: TokioDuration,
}

impl<S: TaskService + 'static> PomodoroChecker<S> {
    pub fn new(store: Arc<TaskStore<S>>) -> Self {
        Self {
            store,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: TokioDuration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    // One poll; reloads the store only when some task advanced its cycle.
    pub async fn check_now(&self) -> Vec<String> {
        let advanced = self.store.check_pomodoro_sessions().await;
        if !advanced.is_empty() {
            self.store.reload().await;
        }
        advanced
    }

    pub fn spawn(self) -> CheckerHandle {
        let join = tokio::spawn(async move {
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.check_now().await;
            }
        });
        CheckerHandle { join: Some(join) }
    }
}

// Dropping the handle stops the poll loop.
pub struct CheckerHandle {
    join: Option<JoinHandle<()>>,
}

impl CheckerHandle {
    pub fn is_running(&self) -> bool {
        self.join
            .as_ref()
            .map(|join| !join.is_finished())
            .unwrap_or(false)
    }

    pub async fn shutdown(mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
            let _ = join.await;
        }
    }
}

impl Drop for CheckerHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}
