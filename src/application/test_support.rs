use crate::domain::models::{NewTask, Task, TaskPatch, TaskStatus, TaskWithSessions};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::task_service::TaskService;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) fn fixed_time(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .expect("valid datetime")
        .with_timezone(&Utc)
}

pub(crate) fn fixed_date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
}

pub(crate) fn sample_task(id: &str, name: &str, status: TaskStatus, scheduled: &str) -> Task {
    Task {
        id: Some(id.to_string()),
        name: name.to_string(),
        description: None,
        user: "gabriel".to_string(),
        estimated_hours: 1.0,
        scheduled_date: fixed_date(scheduled),
        end_date: None,
        status,
        created_at: fixed_time("2026-03-02T08:00:00Z"),
        started_at: if status == TaskStatus::Pending {
            None
        } else {
            Some(fixed_time("2026-03-02T09:00:00Z"))
        },
        completed_at: if status == TaskStatus::Completed {
            Some(fixed_time("2026-03-02T10:00:00Z"))
        } else {
            None
        },
    }
}

pub(crate) fn transient_error() -> InfraError {
    InfraError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "backend unavailable",
    ))
}

// Scripted stand-in for the backend task service.
#[derive(Default)]
pub(crate) struct FakeTaskService {
    pub tasks: Mutex<Vec<Task>>,
    pub bundles: Mutex<Vec<TaskWithSessions>>,
    pub remaining_responses: Mutex<VecDeque<Result<i64, InfraError>>>,
    pub check_responses: Mutex<VecDeque<Result<Vec<String>, InfraError>>>,
    pub next_mutation_error: Mutex<Option<InfraError>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeTaskService {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Self::default()
        }
    }

    pub fn push_remaining(&self, response: Result<i64, InfraError>) {
        self.remaining_responses
            .lock()
            .expect("remaining lock")
            .push_back(response);
    }

    pub fn push_check(&self, response: Result<Vec<String>, InfraError>) {
        self.check_responses
            .lock()
            .expect("check lock")
            .push_back(response);
    }

    pub fn set_mutation_error(&self, error: InfraError) {
        *self.next_mutation_error.lock().expect("mutation lock") = Some(error);
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|call| call.as_str() == name)
            .count()
    }

    fn record(&self, call: &str) {
        self.calls.lock().expect("calls lock").push(call.to_string());
    }

    fn take_mutation_error(&self) -> Option<InfraError> {
        self.next_mutation_error.lock().expect("mutation lock").take()
    }
}

#[async_trait]
impl TaskService for FakeTaskService {
    async fn load_tasks(&self) -> Result<Vec<Task>, InfraError> {
        self.record("load_tasks");
        Ok(self.tasks.lock().expect("tasks lock").clone())
    }

    async fn load_tasks_with_sessions(&self) -> Result<Vec<TaskWithSessions>, InfraError> {
        self.record("load_tasks_with_sessions");
        Ok(self.bundles.lock().expect("bundles lock").clone())
    }

    async fn add_task(&self, fields: NewTask) -> Result<Task, InfraError> {
        self.record("add_task");
        if let Some(error) = self.take_mutation_error() {
            return Err(error);
        }
        let mut tasks = self.tasks.lock().expect("tasks lock");
        let task = Task {
            id: Some((tasks.len() + 1).to_string()),
            name: fields.name,
            description: fields.description,
            user: fields.user,
            estimated_hours: fields.estimated_hours,
            scheduled_date: fields.scheduled_date,
            end_date: fields.end_date,
            status: TaskStatus::Pending,
            created_at: fixed_time("2026-03-02T08:00:00Z"),
            started_at: None,
            completed_at: None,
        };
        tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, task_id: &str, _patch: TaskPatch) -> Result<Task, InfraError> {
        self.record("update_task");
        if let Some(error) = self.take_mutation_error() {
            return Err(error);
        }
        self.tasks
            .lock()
            .expect("tasks lock")
            .iter()
            .find(|task| task.id.as_deref() == Some(task_id))
            .cloned()
            .ok_or_else(|| InfraError::TaskNotFound(task_id.to_string()))
    }

    async fn start_task(&self, task_id: &str, stop_and_start: bool) -> Result<(), InfraError> {
        self.record(&format!("start_task:{task_id}:{stop_and_start}"));
        match self.take_mutation_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn resume_task(&self, task_id: &str) -> Result<(), InfraError> {
        self.record(&format!("resume_task:{task_id}"));
        match self.take_mutation_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn pause_task(&self, task_id: &str) -> Result<(), InfraError> {
        self.record(&format!("pause_task:{task_id}"));
        match self.take_mutation_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn complete_task(&self, task_id: &str) -> Result<(), InfraError> {
        self.record(&format!("complete_task:{task_id}"));
        match self.take_mutation_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), InfraError> {
        self.record(&format!("delete_task:{task_id}"));
        match self.take_mutation_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn task_remaining_seconds(&self, task_id: &str) -> Result<i64, InfraError> {
        self.record(&format!("get_task_remaining_time:{task_id}"));
        self.remaining_responses
            .lock()
            .expect("remaining lock")
            .pop_front()
            .unwrap_or(Ok(0))
    }

    async fn check_pomodoro_sessions(&self) -> Result<Vec<String>, InfraError> {
        self.record("check_pomodoro_sessions");
        self.check_responses
            .lock()
            .expect("check lock")
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
