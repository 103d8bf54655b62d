use crate::application::bootstrap::bootstrap_workspace;
use crate::application::timing::{CountdownHandle, TimingEngine};
use crate::domain::models::{NewTask, Task, TaskPatch, TaskStatus, TaskWithSessions};
use crate::infrastructure::command_log::CommandLog;
use crate::infrastructure::config::read_pomodoro_policy;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::task_service::{NowProvider, SqliteTaskService, TaskService};
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// Front-facing aggregate: mediates between UI actions and the backend task
// service, and holds the latest loaded snapshot for the selectors. The
// backend status is the single source of truth; this snapshot is only a
// read-through copy refreshed after every mutation.
pub struct TaskStore<S: TaskService> {
    service: Arc<S>,
    log: Arc<CommandLog>,
    now_provider: NowProvider,
    state: Mutex<StoreState>,
    generation: AtomicU64,
}

#[derive(Debug, Default)]
struct StoreState {
    tasks: Vec<Task>,
    tasks_with_sessions: Vec<TaskWithSessions>,
}

impl TaskStore<SqliteTaskService> {
    pub fn open(workspace_root: &Path) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(workspace_root)?;
        let policy = read_pomodoro_policy(&workspace_root.join("config"))?;
        let service = Arc::new(SqliteTaskService::new(&bootstrap.database_path).with_policy(policy));
        Ok(Self::new(service)
            .with_command_log(Arc::new(CommandLog::new(workspace_root.join("logs")))))
    }
}

impl<S: TaskService + 'static> TaskStore<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            log: Arc::new(CommandLog::disabled()),
            now_provider: Arc::new(Utc::now),
            state: Mutex::new(StoreState::default()),
            generation: AtomicU64::new(0),
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

    pub fn service(&self) -> Arc<S> {
        Arc::clone(&self.service)
    }

    pub async fn reload(&self) {
        self.load_tasks().await;
        self.load_tasks_with_sessions().await;
    }

    pub async fn load_tasks(&self) {
        let generation = self.generation.load(Ordering::SeqCst);
        match self.service.load_tasks().await {
            Ok(tasks) => {
                // A response fetched before a newer mutation must not
                // overwrite the fresher snapshot.
                if self.generation.load(Ordering::SeqCst) != generation {
                    self.log.info("load_tasks", "discarded stale snapshot");
                    return;
                }
                self.lock_state().tasks = tasks;
            }
            Err(error) => self.log.error("load_tasks", &error.to_string()),
        }
    }

    pub async fn load_tasks_with_sessions(&self) {
        let generation = self.generation.load(Ordering::SeqCst);
        match self.service.load_tasks_with_sessions().await {
            Ok(bundles) => {
                if self.generation.load(Ordering::SeqCst) != generation {
                    self.log
                        .info("load_tasks_with_sessions", "discarded stale snapshot");
                    return;
                }
                self.lock_state().tasks_with_sessions = bundles;
            }
            Err(error) => self.log.error("load_tasks_with_sessions", &error.to_string()),
        }
    }

    pub async fn add_task(&self, fields: NewTask) -> Result<Task, InfraError> {
        fields.validate().map_err(InfraError::InvalidInput)?;
        let task = match self.service.add_task(fields).await {
            Ok(task) => task,
            Err(error) => {
                self.log.error("add_task", &error.to_string());
                return Err(error);
            }
        };
        self.log.info(
            "add_task",
            &format!("created task_id={}", task.id.as_deref().unwrap_or("?")),
        );
        self.bump_generation();
        self.reload().await;
        Ok(task)
    }

    pub async fn update_task(&self, task_id: &str, patch: TaskPatch) -> Result<Task, InfraError> {
        let task = match self.service.update_task(task_id, patch).await {
            Ok(task) => task,
            Err(error) => {
                self.log.error("update_task", &error.to_string());
                return Err(error);
            }
        };
        self.log.info("update_task", &format!("updated task_id={task_id}"));
        self.bump_generation();
        self.reload().await;
        Ok(task)
    }

    pub async fn start_task(&self, task_id: &str) -> Result<(), InfraError> {
        let result = self.service.start_task(task_id, true).await;
        self.apply("start_task", task_id, result).await
    }

    pub async fn start_task_without_stopping(&self, task_id: &str) -> Result<(), InfraError> {
        let result = self.service.start_task(task_id, false).await;
        self.apply("start_task", task_id, result).await
    }

    pub async fn pause_task(&self, task_id: &str) -> Result<(), InfraError> {
        let result = self.service.pause_task(task_id).await;
        self.apply("pause_task", task_id, result).await
    }

    pub async fn resume_task(&self, task_id: &str) -> Result<(), InfraError> {
        let result = self.service.resume_task(task_id).await;
        self.apply("resume_task", task_id, result).await
    }

    pub async fn complete_task(&self, task_id: &str) -> Result<(), InfraError> {
        let result = self.service.complete_task(task_id).await;
        self.apply("complete_task", task_id, result).await
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<(), InfraError> {
        let result = self.service.delete_task(task_id).await;
        self.apply("delete_task", task_id, result).await
    }

    pub async fn task_remaining_seconds(&self, task_id: &str) -> Result<i64, InfraError> {
        self.service.task_remaining_seconds(task_id).await
    }

    // Transient failures come back as an empty set, same as a poll that found
    // nothing expired; the next interval retries anyway.
    pub async fn check_pomodoro_sessions(&self) -> Vec<String> {
        match self.service.check_pomodoro_sessions().await {
            Ok(advanced) => advanced,
            Err(error) => {
                self.log.error("check_pomodoro_sessions", &error.to_string());
                Vec::new()
            }
        }
    }

    pub async fn spawn_countdown(&self, task: &Task) -> CountdownHandle {
        TimingEngine::new(Arc::clone(&self.service))
            .with_command_log(Arc::clone(&self.log))
            .with_now_provider(self.now_provider.clone())
            .spawn_countdown(task)
            .await
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock_state().tasks.clone()
    }

    pub fn tasks_with_sessions(&self) -> Vec<TaskWithSessions> {
        self.lock_state().tasks_with_sessions.clone()
    }

    pub fn today_tasks(&self) -> Vec<Task> {
        let today = self.today();
        self.lock_state()
            .tasks
            .iter()
            .filter(|task| task.scheduled_date == today)
            .cloned()
            .collect()
    }

    pub fn today_tasks_with_sessions(&self) -> Vec<TaskWithSessions> {
        let today = self.today();
        self.lock_state()
            .tasks_with_sessions
            .iter()
            .filter(|bundle| bundle.task.scheduled_date == today)
            .cloned()
            .collect()
    }

    // "Active" here means still on today's plate, i.e. not completed.
    pub fn today_active_tasks(&self) -> Vec<Task> {
        let today = self.today();
        self.lock_state()
            .tasks
            .iter()
            .filter(|task| task.scheduled_date == today && task.status != TaskStatus::Completed)
            .cloned()
            .collect()
    }

    pub fn today_active_tasks_with_sessions(&self) -> Vec<TaskWithSessions> {
        let today = self.today();
        self.lock_state()
            .tasks_with_sessions
            .iter()
            .filter(|bundle| {
                bundle.task.scheduled_date == today && bundle.task.status != TaskStatus::Completed
            })
            .cloned()
            .collect()
    }

    pub fn has_active_task(&self) -> bool {
        let state = self.lock_state();
        state.tasks.iter().any(|task| task.status.is_active())
            || state
                .tasks_with_sessions
                .iter()
                .any(|bundle| bundle.task.status.is_active())
    }

    pub fn active_task(&self) -> Option<Task> {
        let state = self.lock_state();
        state
            .tasks
            .iter()
            .find(|task| task.status.is_active())
            .cloned()
            .or_else(|| {
                state
                    .tasks_with_sessions
                    .iter()
                    .find(|bundle| bundle.task.status.is_active())
                    .map(|bundle| bundle.task.clone())
            })
    }

    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.lock_state()
            .tasks
            .iter()
            .filter(|task| task.status == status)
            .cloned()
            .collect()
    }

    pub fn tasks_with_sessions_by_status(&self, status: TaskStatus) -> Vec<TaskWithSessions> {
        self.lock_state()
            .tasks_with_sessions
            .iter()
            .filter(|bundle| bundle.task.status == status)
            .cloned()
            .collect()
    }

    pub fn pending_tasks(&self) -> Vec<Task> {
        self.tasks_by_status(TaskStatus::Pending)
    }

    pub fn completed_tasks(&self) -> Vec<Task> {
        self.tasks_by_status(TaskStatus::Completed)
    }

    pub fn in_progress_tasks(&self) -> Vec<Task> {
        self.tasks_by_status(TaskStatus::InProgress)
    }

    pub fn paused_tasks(&self) -> Vec<Task> {
        self.tasks_by_status(TaskStatus::Paused)
    }

    pub fn all_tasks_by_status(&self) -> HashMap<TaskStatus, Vec<Task>> {
        let mut by_status: HashMap<TaskStatus, Vec<Task>> = TaskStatus::ALL
            .into_iter()
            .map(|status| (status, Vec::new()))
            .collect();
        for task in self.lock_state().tasks.iter() {
            by_status.entry(task.status).or_default().push(task.clone());
        }
        by_status
    }

    async fn apply(
        &self,
        command: &str,
        task_id: &str,
        result: Result<(), InfraError>,
    ) -> Result<(), InfraError> {
        match result {
            Ok(()) => {
                self.log.info(command, &format!("task_id={task_id}"));
                self.bump_generation();
                self.reload().await;
                Ok(())
            }
            Err(error) if error.is_transient() => {
                self.log.error(command, &error.to_string());
                Ok(())
            }
            Err(error) => {
                self.log.error(command, &error.to_string());
                Err(error)
            }
        }
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn today(&self) -> NaiveDate {
        (self.now_provider)().date_naive()
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{
        FakeTaskService, fixed_date, fixed_time, sample_task, transient_error,
    };

    fn fixed_now_provider(value: &'static str) -> NowProvider {
        Arc::new(move || fixed_time(value))
    }

    fn store_with_tasks(tasks: Vec<Task>) -> (Arc<FakeTaskService>, TaskStore<FakeTaskService>) {
        let service = Arc::new(FakeTaskService::with_tasks(tasks));
        let store = TaskStore::new(Arc::clone(&service))
            .with_now_provider(fixed_now_provider("2026-03-02T12:00:00Z"));
        (service, store)
    }

    #[tokio::test]
    async fn reload_populates_the_snapshot() {
        let tasks = vec![
            sample_task("1", "A", TaskStatus::Pending, "2026-03-02"),
            sample_task("2", "B", TaskStatus::InProgress, "2026-03-02"),
        ];
        let (_service, store) = store_with_tasks(tasks.clone());

        assert!(store.tasks().is_empty());
        store.reload().await;
        assert_eq!(store.tasks(), tasks);
    }

    #[tokio::test]
    async fn mutations_refresh_both_collections() {
        let (service, store) = store_with_tasks(vec![sample_task(
            "1",
            "A",
            TaskStatus::Pending,
            "2026-03-02",
        )]);

        store.start_task("1").await.expect("start task");
        assert_eq!(
            service.recorded_calls(),
            vec![
                "start_task:1:true".to_string(),
                "load_tasks".to_string(),
                "load_tasks_with_sessions".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn start_without_stopping_passes_the_flag_through() {
        let (service, store) = store_with_tasks(Vec::new());
        store
            .start_task_without_stopping("1")
            .await
            .expect("start task");
        assert_eq!(service.recorded_calls()[0], "start_task:1:false");
    }

    #[tokio::test]
    async fn active_task_conflicts_surface_to_the_caller() {
        let (service, store) = store_with_tasks(Vec::new());
        service.set_mutation_error(InfraError::ActiveTaskConflict {
            active_task_id: "7".to_string(),
        });

        let result = store.start_task_without_stopping("1").await;
        match result {
            Err(InfraError::ActiveTaskConflict { active_task_id }) => {
                assert_eq!(active_task_id, "7");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        // The aborted operation must not refresh state.
        assert_eq!(service.call_count("load_tasks"), 0);
    }

    #[tokio::test]
    async fn transient_failures_are_swallowed_and_keep_prior_state() {
        let tasks = vec![sample_task("1", "A", TaskStatus::Pending, "2026-03-02")];
        let (service, store) = store_with_tasks(tasks.clone());
        store.reload().await;

        service.set_mutation_error(transient_error());
        store.pause_task("1").await.expect("transient pause is absorbed");
        assert_eq!(store.tasks(), tasks);
    }

    #[tokio::test]
    async fn add_task_rejects_invalid_input_before_the_backend() {
        let (service, store) = store_with_tasks(Vec::new());
        let fields = NewTask {
            name: "   ".to_string(),
            description: None,
            user: "gabriel".to_string(),
            estimated_hours: 1.0,
            scheduled_date: fixed_date("2026-03-02"),
            end_date: None,
        };

        assert!(matches!(
            store.add_task(fields).await,
            Err(InfraError::InvalidInput(_))
        ));
        assert_eq!(service.call_count("add_task"), 0);
    }

    #[tokio::test]
    async fn add_task_returns_the_persisted_task() {
        let (_service, store) = store_with_tasks(Vec::new());
        let fields = NewTask {
            name: "Relatório".to_string(),
            description: None,
            user: "gabriel".to_string(),
            estimated_hours: 2.0,
            scheduled_date: fixed_date("2026-03-02"),
            end_date: None,
        };

        let task = store.add_task(fields).await.expect("add task");
        assert_eq!(task.id.as_deref(), Some("1"));
        assert_eq!(store.tasks().len(), 1);
    }

    #[tokio::test]
    async fn today_selectors_filter_by_scheduled_date_and_status() {
        let (_service, store) = store_with_tasks(vec![
            sample_task("1", "today-pending", TaskStatus::Pending, "2026-03-02"),
            sample_task("2", "today-done", TaskStatus::Completed, "2026-03-02"),
            sample_task("3", "tomorrow", TaskStatus::Pending, "2026-03-03"),
        ]);
        store.reload().await;

        let today = store.today_tasks();
        assert_eq!(today.len(), 2);

        let active = store.today_active_tasks();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "today-pending");
    }

    #[tokio::test]
    async fn active_task_lookup_covers_in_progress_and_waiting() {
        let (_service, store) = store_with_tasks(vec![
            sample_task("1", "A", TaskStatus::Paused, "2026-03-02"),
            sample_task("2", "B", TaskStatus::Waiting, "2026-03-02"),
        ]);
        store.reload().await;

        assert!(store.has_active_task());
        assert_eq!(
            store.active_task().expect("active task").id.as_deref(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn status_selectors_partition_the_snapshot() {
        let (_service, store) = store_with_tasks(vec![
            sample_task("1", "A", TaskStatus::Pending, "2026-03-02"),
            sample_task("2", "B", TaskStatus::InProgress, "2026-03-02"),
            sample_task("3", "C", TaskStatus::Paused, "2026-03-02"),
            sample_task("4", "D", TaskStatus::Completed, "2026-03-02"),
        ]);
        store.reload().await;

        assert_eq!(store.pending_tasks().len(), 1);
        assert_eq!(store.in_progress_tasks().len(), 1);
        assert_eq!(store.paused_tasks().len(), 1);
        assert_eq!(store.completed_tasks().len(), 1);

        let by_status = store.all_tasks_by_status();
        assert_eq!(by_status.len(), TaskStatus::ALL.len());
        assert!(by_status[&TaskStatus::Waiting].is_empty());
        assert_eq!(by_status[&TaskStatus::Pending].len(), 1);
    }

    #[tokio::test]
    async fn check_pomodoro_sessions_swallows_backend_failures() {
        let (service, store) = store_with_tasks(Vec::new());
        service.push_check(Err(transient_error()));
        assert!(store.check_pomodoro_sessions().await.is_empty());

        service.push_check(Ok(vec!["3".to_string()]));
        assert_eq!(store.check_pomodoro_sessions().await, vec!["3".to_string()]);
    }
}
