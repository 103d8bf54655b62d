use crate::domain::duration::Duration;
use crate::domain::models::{Task, TaskStatus};
use crate::infrastructure::command_log::CommandLog;
use crate::infrastructure::task_service::{NowProvider, TaskService};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration as TokioDuration, MissedTickBehavior, interval};

// Local projection anchored to one authoritative backend fetch. Between
// reconciliations the countdown advances purely on wall-clock elapsed time;
// each reconciliation replaces the anchor instead of correcting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownBaseline {
    remaining_at_fetch: i64,
    fetched_at: DateTime<Utc>,
}

impl CountdownBaseline {
    pub fn new(remaining_at_fetch: i64, fetched_at: DateTime<Utc>) -> Self {
        Self {
            remaining_at_fetch,
            fetched_at,
        }
    }

    // Unclamped: overrun keeps counting below zero.
    pub fn projected_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.remaining_at_fetch - (now - self.fetched_at).num_seconds()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownFrame {
    pub task_id: Option<String>,
    pub remaining_seconds: i64,
    pub display: Duration,
    pub frozen: bool,
}

impl CountdownFrame {
    fn new(task_id: Option<String>, remaining_seconds: i64, frozen: bool) -> Self {
        Self {
            task_id,
            remaining_seconds,
            display: Duration::from_seconds(remaining_seconds),
            frozen,
        }
    }
}

pub struct TimingEngine<S: TaskService> {
    service: Arc<S>,
    log: Arc<CommandLog>,
    now_provider: NowProvider,
    tick_interval: TokioDuration,
}

impl<S: TaskService + 'static> TimingEngine<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            log: Arc::new(CommandLog::disabled()),
            now_provider: Arc::new(Utc::now),
            tick_interval: TokioDuration::from_secs(1),
        }
    }

    pub fn with_command_log(mut self, log: Arc<CommandLog>) -> Self {
        self.log = log;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: TokioDuration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    // Budget shown before any consumption is tracked locally.
    pub fn idle_seconds(task: &Task) -> i64 {
        task.estimated_seconds()
    }

    // One authoritative round trip. A failed fetch keeps the previous anchor
    // so the countdown degrades to a pure local projection instead of
    // surfacing an error.
    pub async fn reconcile(
        &self,
        task: &Task,
        previous: Option<CountdownBaseline>,
    ) -> CountdownBaseline {
        let now = (self.now_provider)();
        if matches!(task.status, TaskStatus::Pending | TaskStatus::Completed) {
            return CountdownBaseline::new(Self::idle_seconds(task), now);
        }
        let Some(task_id) = task.id.as_deref() else {
            return previous.unwrap_or_else(|| CountdownBaseline::new(Self::idle_seconds(task), now));
        };

        match self.service.task_remaining_seconds(task_id).await {
            Ok(remaining) => CountdownBaseline::new(remaining, now),
            Err(error) => {
                self.log.error(
                    "get_task_remaining_time",
                    &format!("task_id={task_id}: {error}"),
                );
                previous.unwrap_or_else(|| CountdownBaseline::new(Self::idle_seconds(task), now))
            }
        }
    }

    // One countdown per task status epoch: the caller drops the handle and
    // spawns a fresh one whenever the task transitions, which is what forces
    // a reconciliation on every status change and on mount.
    pub async fn spawn_countdown(&self, task: &Task) -> CountdownHandle {
        let baseline = self.reconcile(task, None).await;
        let now = (self.now_provider)();
        let ticking = task.status.is_active();
        let initial = CountdownFrame::new(
            task.id.clone(),
            baseline.projected_seconds(now),
            !ticking,
        );
        let (sender, receiver) = watch::channel(initial);

        let join = if ticking {
            let now_provider = self.now_provider.clone();
            let task_id = task.id.clone();
            let tick_interval = self.tick_interval;
            Some(tokio::spawn(async move {
                let mut ticker = interval(tick_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let now = now_provider();
                    let frame = CountdownFrame::new(
                        task_id.clone(),
                        baseline.projected_seconds(now),
                        false,
                    );
                    if sender.send(frame).is_err() {
                        break;
                    }
                }
            }))
        } else {
            // Paused and idle tasks get a single frozen frame.
            None
        };

        CountdownHandle { receiver, join }
    }
}

// Subscription handle for one task's countdown. Dropping it aborts the tick
// loop; leaked intervals would keep decrementing a task nobody displays.
pub struct CountdownHandle {
    receiver: watch::Receiver<CountdownFrame>,
    join: Option<JoinHandle<()>>,
}

impl CountdownHandle {
    pub fn subscribe(&self) -> watch::Receiver<CountdownFrame> {
        self.receiver.clone()
    }

    pub fn frame(&self) -> CountdownFrame {
        self.receiver.borrow().clone()
    }

    pub fn is_ticking(&self) -> bool {
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

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}
