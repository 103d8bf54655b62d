use crate::domain::lifecycle::{self, TaskEvent};
use crate::domain::models::{
    ActiveSessionInfo, NewTask, PomodoroPolicy, PomodoroSessionInfo, SessionType, Task, TaskPatch,
    TaskStatus, TaskWithSessions,
};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

// The backend task service: sole arbiter of durable task state. The store and
// timing engine treat everything they hold as an advisory projection of what
// this surface reports.
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn load_tasks(&self) -> Result<Vec<Task>, InfraError>;
    async fn load_tasks_with_sessions(&self) -> Result<Vec<TaskWithSessions>, InfraError>;
    async fn add_task(&self, fields: NewTask) -> Result<Task, InfraError>;
    async fn update_task(&self, task_id: &str, patch: TaskPatch) -> Result<Task, InfraError>;
    async fn start_task(&self, task_id: &str, stop_and_start: bool) -> Result<(), InfraError>;
    async fn resume_task(&self, task_id: &str) -> Result<(), InfraError>;
    async fn pause_task(&self, task_id: &str) -> Result<(), InfraError>;
    async fn complete_task(&self, task_id: &str) -> Result<(), InfraError>;
    async fn delete_task(&self, task_id: &str) -> Result<(), InfraError>;
    async fn task_remaining_seconds(&self, task_id: &str) -> Result<i64, InfraError>;
    async fn check_pomodoro_sessions(&self) -> Result<Vec<String>, InfraError>;
}

#[derive(Clone)]
pub struct SqliteTaskService {
    db_path: PathBuf,
    policy: PomodoroPolicy,
    now_provider: NowProvider,
}

impl SqliteTaskService {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            policy: PomodoroPolicy::default(),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_policy(mut self, policy: PomodoroPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        let connection = Connection::open(&self.db_path)?;
        connection.pragma_update(None, "foreign_keys", "ON")?;
        Ok(connection)
    }

    fn start_internal(
        &self,
        task_id: &str,
        event: TaskEvent,
        stop_and_start: bool,
    ) -> Result<(), InfraError> {
        let id = parse_task_id(task_id)?;
        let mut connection = self.connect()?;
        let tx = connection.transaction()?;
        let now = self.now();

        let row = fetch_task(&tx, id)?.ok_or_else(|| InfraError::TaskNotFound(task_id.to_string()))?;
        lifecycle::next_status(row.task.status, event).map_err(InfraError::InvalidInput)?;

        let active: Option<i64> = tx
            .query_row(
                "SELECT id FROM tasks
                 WHERE status IN ('in_progress', 'waiting') AND id != ?1
                 LIMIT 1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(active_id) = active {
            if !stop_and_start {
                return Err(InfraError::ActiveTaskConflict {
                    active_task_id: active_id.to_string(),
                });
            }
            let active_row = fetch_task(&tx, active_id)?.ok_or_else(|| {
                InfraError::TaskNotFound(active_id.to_string())
            })?;
            suspend_task(&tx, &active_row, now)?;
        }

        // An interrupted segment restarts in full; first start opens work #1.
        let (session_type, session_number) = match last_session(&tx, id)? {
            Some((session_type, session_number)) => (session_type, session_number),
            None => (SessionType::Work, 1),
        };
        let status = match session_type {
            SessionType::Work => TaskStatus::InProgress,
            SessionType::Break => TaskStatus::Waiting,
        };

        tx.execute(
            "UPDATE tasks SET status = ?1,
                 started_at = COALESCE(started_at, ?2),
                 last_resumed_at = ?2
             WHERE id = ?3",
            params![status.as_str(), now.to_rfc3339(), id],
        )?;
        deactivate_sessions(&tx, id)?;
        insert_session(
            &tx,
            id,
            session_type,
            session_number,
            now,
            self.policy.duration_for(session_type),
        )?;

        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl TaskService for SqliteTaskService {
    async fn load_tasks(&self) -> Result<Vec<Task>, InfraError> {
        let connection = self.connect()?;
        let rows = fetch_all_tasks(&connection)?;
        Ok(rows.into_iter().map(|row| row.task).collect())
    }

    async fn load_tasks_with_sessions(&self) -> Result<Vec<TaskWithSessions>, InfraError> {
        let connection = self.connect()?;
        let rows = fetch_all_tasks(&connection)?;

        let mut bundles = Vec::with_capacity(rows.len());
        for row in rows {
            let sessions = fetch_sessions(&connection, row.id)?;
            let active_session = sessions
                .iter()
                .find(|session| session.is_active)
                .and_then(|session| {
                    let started_at = session.started_at?;
                    Some(ActiveSessionInfo {
                        session_type: session.session_type,
                        started_at,
                        ends_at: started_at + Duration::seconds(session.duration_seconds),
                        duration_seconds: session.duration_seconds,
                    })
                });
            bundles.push(TaskWithSessions {
                task: row.task,
                active_session,
                pomodoro_sessions: sessions,
            });
        }
        Ok(bundles)
    }

    async fn add_task(&self, fields: NewTask) -> Result<Task, InfraError> {
        fields.validate().map_err(InfraError::InvalidInput)?;
        let now = self.now();

        let name = fields.name.trim().to_string();
        let user = fields.user.trim().to_string();
        let description = fields
            .description
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO tasks (name, description, user, estimated_hours, scheduled_date,
                                end_date, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7)",
            params![
                name,
                description,
                user,
                fields.estimated_hours,
                fields.scheduled_date.to_string(),
                fields.end_date.map(|date| date.to_string()),
                now.to_rfc3339(),
            ],
        )?;
        let id = connection.last_insert_rowid();

        Ok(Task {
            id: Some(id.to_string()),
            name,
            description,
            user,
            estimated_hours: fields.estimated_hours,
            scheduled_date: fields.scheduled_date,
            end_date: fields.end_date,
            status: TaskStatus::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
        })
    }

    async fn update_task(&self, task_id: &str, patch: TaskPatch) -> Result<Task, InfraError> {
        let id = parse_task_id(task_id)?;
        let connection = self.connect()?;
        let row =
            fetch_task(&connection, id)?.ok_or_else(|| InfraError::TaskNotFound(task_id.to_string()))?;

        let mut task = row.task;
        if let Some(name) = patch.name {
            task.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            task.description = description
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned);
        }
        if let Some(estimated_hours) = patch.estimated_hours {
            task.estimated_hours = estimated_hours;
        }
        if let Some(scheduled_date) = patch.scheduled_date {
            task.scheduled_date = scheduled_date;
        }
        if let Some(end_date) = patch.end_date {
            task.end_date = end_date;
        }
        task.validate().map_err(InfraError::InvalidInput)?;

        connection.execute(
            "UPDATE tasks SET name = ?1, description = ?2, estimated_hours = ?3,
                 scheduled_date = ?4, end_date = ?5
             WHERE id = ?6",
            params![
                task.name,
                task.description,
                task.estimated_hours,
                task.scheduled_date.to_string(),
                task.end_date.map(|date| date.to_string()),
                id,
            ],
        )?;
        Ok(task)
    }

    async fn start_task(&self, task_id: &str, stop_and_start: bool) -> Result<(), InfraError> {
        self.start_internal(task_id, TaskEvent::Start, stop_and_start)
    }

    async fn resume_task(&self, task_id: &str) -> Result<(), InfraError> {
        self.start_internal(task_id, TaskEvent::Resume, false)
    }

    async fn pause_task(&self, task_id: &str) -> Result<(), InfraError> {
        let id = parse_task_id(task_id)?;
        let mut connection = self.connect()?;
        let tx = connection.transaction()?;
        let now = self.now();

        let row = fetch_task(&tx, id)?.ok_or_else(|| InfraError::TaskNotFound(task_id.to_string()))?;
        lifecycle::next_status(row.task.status, TaskEvent::Pause).map_err(InfraError::InvalidInput)?;
        suspend_task(&tx, &row, now)?;

        tx.commit()?;
        Ok(())
    }

    async fn complete_task(&self, task_id: &str) -> Result<(), InfraError> {
        let id = parse_task_id(task_id)?;
        let mut connection = self.connect()?;
        let tx = connection.transaction()?;
        let now = self.now();

        let row = fetch_task(&tx, id)?.ok_or_else(|| InfraError::TaskNotFound(task_id.to_string()))?;
        lifecycle::next_status(row.task.status, TaskEvent::Complete)
            .map_err(InfraError::InvalidInput)?;

        let accrued = accrued_seconds(&row, now);
        tx.execute(
            "UPDATE tasks SET status = 'completed', completed_at = ?1,
                 worked_seconds = worked_seconds + ?2, last_resumed_at = NULL
             WHERE id = ?3",
            params![now.to_rfc3339(), accrued, id],
        )?;
        tx.execute(
            "DELETE FROM pomodoro_sessions WHERE task_id = ?1",
            params![id],
        )?;

        tx.commit()?;
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), InfraError> {
        let id = parse_task_id(task_id)?;
        let connection = self.connect()?;
        let removed = connection.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(InfraError::TaskNotFound(task_id.to_string()));
        }
        Ok(())
    }

    async fn task_remaining_seconds(&self, task_id: &str) -> Result<i64, InfraError> {
        let id = parse_task_id(task_id)?;
        let connection = self.connect()?;
        let row =
            fetch_task(&connection, id)?.ok_or_else(|| InfraError::TaskNotFound(task_id.to_string()))?;
        Ok(remaining_seconds(&row, self.now()))
    }

    async fn check_pomodoro_sessions(&self) -> Result<Vec<String>, InfraError> {
        let mut connection = self.connect()?;
        let tx = connection.transaction()?;
        let now = self.now();

        struct ExpiredSession {
            session_id: i64,
            task_id: i64,
            session_type: SessionType,
            session_number: u32,
            task_status: TaskStatus,
        }

        let expired = {
            let mut statement = tx.prepare(
                "SELECT s.id, s.task_id, s.session_type, s.session_number, s.ends_at, t.status
                 FROM pomodoro_sessions s
                 JOIN tasks t ON t.id = s.task_id
                 WHERE s.is_active = 1
                 ORDER BY s.id",
            )?;
            let raw: Vec<(i64, i64, String, u32, Option<String>, String)> = statement
                .query_map([], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                })?
                .collect::<Result<_, _>>()?;

            let mut expired = Vec::new();
            for (session_id, task_id, session_type, session_number, ends_at, task_status) in raw {
                let Some(ends_at) = ends_at else { continue };
                let ends_at = parse_timestamp(&ends_at, "session.ends_at")?;
                if ends_at > now {
                    continue;
                }
                expired.push(ExpiredSession {
                    session_id,
                    task_id,
                    session_type: SessionType::parse(&session_type)
                        .map_err(InfraError::InvalidInput)?,
                    session_number,
                    task_status: TaskStatus::parse(&task_status)
                        .map_err(InfraError::InvalidInput)?,
                });
            }
            expired
        };

        let mut advanced = Vec::new();
        for session in expired {
            tx.execute(
                "UPDATE pomodoro_sessions SET is_active = 0 WHERE id = ?1",
                params![session.session_id],
            )?;
            // A session left behind by a task that is no longer active is
            // retired without advancing the cycle.
            if !session.task_status.is_active() {
                continue;
            }

            let (next_type, next_number) =
                lifecycle::advance_session(session.session_type, session.session_number);
            let next_status = lifecycle::status_after_advance(session.session_type);
            insert_session(
                &tx,
                session.task_id,
                next_type,
                next_number,
                now,
                self.policy.duration_for(next_type),
            )?;
            tx.execute(
                "UPDATE tasks SET status = ?1 WHERE id = ?2",
                params![next_status.as_str(), session.task_id],
            )?;
            advanced.push(session.task_id.to_string());
        }

        tx.commit()?;
        Ok(advanced)
    }
}

struct TaskRow {
    id: i64,
    task: Task,
    worked_seconds: i64,
    last_resumed_at: Option<DateTime<Utc>>,
}

struct RawTaskRow {
    id: i64,
    name: String,
    description: Option<String>,
    user: String,
    estimated_hours: f64,
    scheduled_date: String,
    end_date: Option<String>,
    status: String,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    worked_seconds: i64,
    last_resumed_at: Option<String>,
}

const TASK_COLUMNS: &str = "id, name, description, user, estimated_hours, scheduled_date, \
                            end_date, status, created_at, started_at, completed_at, \
                            worked_seconds, last_resumed_at";

fn read_raw_task(row: &rusqlite::Row<'_>) -> Result<RawTaskRow, rusqlite::Error> {
    Ok(RawTaskRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        user: row.get(3)?,
        estimated_hours: row.get(4)?,
        scheduled_date: row.get(5)?,
        end_date: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        started_at: row.get(9)?,
        completed_at: row.get(10)?,
        worked_seconds: row.get(11)?,
        last_resumed_at: row.get(12)?,
    })
}

fn into_task_row(raw: RawTaskRow) -> Result<TaskRow, InfraError> {
    let task = Task {
        id: Some(raw.id.to_string()),
        name: raw.name,
        description: raw.description,
        user: raw.user,
        estimated_hours: raw.estimated_hours,
        scheduled_date: parse_date(&raw.scheduled_date, "task.scheduled_date")?,
        end_date: raw
            .end_date
            .as_deref()
            .map(|value| parse_date(value, "task.end_date"))
            .transpose()?,
        status: TaskStatus::parse(&raw.status).map_err(InfraError::InvalidInput)?,
        created_at: parse_timestamp(&raw.created_at, "task.created_at")?,
        started_at: raw
            .started_at
            .as_deref()
            .map(|value| parse_timestamp(value, "task.started_at"))
            .transpose()?,
        completed_at: raw
            .completed_at
            .as_deref()
            .map(|value| parse_timestamp(value, "task.completed_at"))
            .transpose()?,
    };
    Ok(TaskRow {
        id: raw.id,
        task,
        worked_seconds: raw.worked_seconds,
        last_resumed_at: raw
            .last_resumed_at
            .as_deref()
            .map(|value| parse_timestamp(value, "task.last_resumed_at"))
            .transpose()?,
    })
}

fn fetch_task(connection: &Connection, id: i64) -> Result<Option<TaskRow>, InfraError> {
    let raw = connection
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            read_raw_task,
        )
        .optional()?;
    raw.map(into_task_row).transpose()
}

fn fetch_all_tasks(connection: &Connection) -> Result<Vec<TaskRow>, InfraError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at, id"
    ))?;
    let raw: Vec<RawTaskRow> = statement
        .query_map([], read_raw_task)?
        .collect::<Result<_, _>>()?;
    raw.into_iter().map(into_task_row).collect()
}

fn fetch_sessions(connection: &Connection, task_id: i64) -> Result<Vec<PomodoroSessionInfo>, InfraError> {
    let mut statement = connection.prepare(
        "SELECT id, session_number, session_type, duration_seconds, created_at, is_active, started_at
         FROM pomodoro_sessions
         WHERE task_id = ?1
         ORDER BY session_number, id",
    )?;
    let raw: Vec<(i64, u32, String, i64, String, bool, Option<String>)> = statement
        .query_map(params![task_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })?
        .collect::<Result<_, _>>()?;

    raw.into_iter()
        .map(
            |(id, session_number, session_type, duration_seconds, created_at, is_active, started_at)| {
                Ok(PomodoroSessionInfo {
                    id: Some(id),
                    session_number,
                    session_type: SessionType::parse(&session_type)
                        .map_err(InfraError::InvalidInput)?,
                    duration_seconds,
                    created_at: parse_timestamp(&created_at, "session.created_at")?,
                    is_active,
                    started_at: started_at
                        .as_deref()
                        .map(|value| parse_timestamp(value, "session.started_at"))
                        .transpose()?,
                })
            },
        )
        .collect()
}

fn last_session(connection: &Connection, task_id: i64) -> Result<Option<(SessionType, u32)>, InfraError> {
    let raw: Option<(String, u32)> = connection
        .query_row(
            "SELECT session_type, session_number FROM pomodoro_sessions
             WHERE task_id = ?1
             ORDER BY id DESC
             LIMIT 1",
            params![task_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((session_type, session_number)) = raw else {
        return Ok(None);
    };
    Ok(Some((
        SessionType::parse(&session_type).map_err(InfraError::InvalidInput)?,
        session_number,
    )))
}

fn insert_session(
    connection: &Connection,
    task_id: i64,
    session_type: SessionType,
    session_number: u32,
    now: DateTime<Utc>,
    duration_seconds: i64,
) -> Result<(), InfraError> {
    connection.execute(
        "INSERT INTO pomodoro_sessions
             (task_id, session_number, session_type, duration_seconds, created_at,
              is_active, started_at, ends_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?5, ?6)",
        params![
            task_id,
            session_number,
            session_type.as_str(),
            duration_seconds,
            now.to_rfc3339(),
            (now + Duration::seconds(duration_seconds)).to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn deactivate_sessions(connection: &Connection, task_id: i64) -> Result<(), InfraError> {
    connection.execute(
        "UPDATE pomodoro_sessions SET is_active = 0 WHERE task_id = ?1 AND is_active = 1",
        params![task_id],
    )?;
    Ok(())
}

fn suspend_task(connection: &Connection, row: &TaskRow, now: DateTime<Utc>) -> Result<(), InfraError> {
    let accrued = accrued_seconds(row, now);
    connection.execute(
        "UPDATE tasks SET status = 'paused',
             worked_seconds = worked_seconds + ?1, last_resumed_at = NULL
         WHERE id = ?2",
        params![accrued, row.id],
    )?;
    deactivate_sessions(connection, row.id)
}

fn accrued_seconds(row: &TaskRow, now: DateTime<Utc>) -> i64 {
    match row.last_resumed_at {
        Some(resumed_at) => (now - resumed_at).num_seconds().max(0),
        None => 0,
    }
}

fn remaining_seconds(row: &TaskRow, now: DateTime<Utc>) -> i64 {
    row.task.estimated_seconds() - row.worked_seconds - accrued_seconds(row, now)
}

fn parse_task_id(task_id: &str) -> Result<i64, InfraError> {
    let trimmed = task_id.trim();
    if trimmed.is_empty() {
        return Err(InfraError::InvalidInput(
            "task_id must not be empty".to_string(),
        ));
    }
    trimmed
        .parse::<i64>()
        .map_err(|_| InfraError::TaskNotFound(task_id.to_string()))
}

fn parse_timestamp(raw: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| {
            InfraError::InvalidConfig(format!("invalid {field_name} '{raw}': {error}"))
        })
}

fn parse_date(raw: &str, field_name: &str) -> Result<NaiveDate, InfraError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|error| {
        InfraError::InvalidConfig(format!("invalid {field_name} '{raw}': {error}"))
    })
}
