use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Paused,
    Waiting,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Paused,
        TaskStatus::Waiting,
        TaskStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "paused" => Ok(Self::Paused),
            "waiting" => Ok(Self::Waiting),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown task status: {other}")),
        }
    }

    // A task holds the single active slot while in_progress or waiting.
    pub fn is_active(self) -> bool {
        matches!(self, Self::InProgress | Self::Waiting)
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Completed
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Work,
    Break,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Break => "break",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim() {
            "work" => Ok(Self::Work),
            "break" => Ok(Self::Break),
            other => Err(format!("unknown session type: {other}")),
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Work => Self::Break,
            Self::Break => Self::Work,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub user: String,
    pub estimated_hours: f64,
    pub scheduled_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.name, "task.name")?;
        validate_non_empty(&self.user, "task.user")?;
        if !self.estimated_hours.is_finite() || self.estimated_hours <= 0.0 {
            return Err("task.estimated_hours must be > 0".to_string());
        }
        if let Some(end_date) = self.end_date {
            if end_date < self.scheduled_date {
                return Err("task.end_date must be >= task.scheduled_date".to_string());
            }
        }
        if self.status == TaskStatus::Completed && self.completed_at.is_none() {
            return Err("task.completed_at must be set on completed tasks".to_string());
        }
        Ok(())
    }

    pub fn estimated_seconds(&self) -> i64 {
        (self.estimated_hours * 3600.0).round() as i64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub name: String,
    pub description: Option<String>,
    pub user: String,
    pub estimated_hours: f64,
    pub scheduled_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl NewTask {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.name, "task.name")?;
        validate_non_empty(&self.user, "task.user")?;
        if !self.estimated_hours.is_finite() || self.estimated_hours <= 0.0 {
            return Err("task.estimated_hours must be > 0".to_string());
        }
        if let Some(end_date) = self.end_date {
            if end_date < self.scheduled_date {
                return Err("task.end_date must be >= task.scheduled_date".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub estimated_hours: Option<f64>,
    pub scheduled_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.estimated_hours.is_none()
            && self.scheduled_date.is_none()
            && self.end_date.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveSessionInfo {
    pub session_type: SessionType,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl ActiveSessionInfo {
    pub fn validate(&self) -> Result<(), String> {
        if self.duration_seconds <= 0 {
            return Err("session.duration_seconds must be > 0".to_string());
        }
        if self.ends_at <= self.started_at {
            return Err("session.ends_at must be after session.started_at".to_string());
        }
        Ok(())
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> i64 {
        (self.ends_at - now).num_seconds()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PomodoroSessionInfo {
    pub id: Option<i64>,
    pub session_number: u32,
    pub session_type: SessionType,
    pub duration_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub started_at: Option<DateTime<Utc>>,
}

impl PomodoroSessionInfo {
    pub fn validate(&self) -> Result<(), String> {
        if self.session_number == 0 {
            return Err("session.session_number is 1-based".to_string());
        }
        if self.duration_seconds <= 0 {
            return Err("session.duration_seconds must be > 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskWithSessions {
    #[serde(flatten)]
    pub task: Task,
    pub active_session: Option<ActiveSessionInfo>,
    pub pomodoro_sessions: Vec<PomodoroSessionInfo>,
}

impl TaskWithSessions {
    pub fn validate(&self) -> Result<(), String> {
        self.task.validate()?;
        for session in &self.pomodoro_sessions {
            session.validate()?;
        }
        let active_rows = self
            .pomodoro_sessions
            .iter()
            .filter(|session| session.is_active)
            .count();
        if active_rows > 1 {
            return Err("at most one pomodoro session may be active".to_string());
        }
        if self.active_session.is_some() && !self.task.status.is_active() {
            return Err("active_session requires an active task status".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PomodoroPolicy {
    pub work_seconds: i64,
    pub break_seconds: i64,
}

impl Default for PomodoroPolicy {
    fn default() -> Self {
        Self {
            work_seconds: 25 * 60,
            break_seconds: 5 * 60,
        }
    }
}

impl PomodoroPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.work_seconds <= 0 {
            return Err("pomodoro.work_seconds must be > 0".to_string());
        }
        if self.break_seconds <= 0 {
            return Err("pomodoro.break_seconds must be > 0".to_string());
        }
        Ok(())
    }

    pub fn duration_for(&self, session_type: SessionType) -> i64 {
        match session_type {
            SessionType::Work => self.work_seconds,
            SessionType::Break => self.break_seconds,
        }
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn fixed_date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn sample_task() -> Task {
        Task {
            id: Some("1".to_string()),
            name: "Escrever relatório".to_string(),
            description: Some("sprint review".to_string()),
            user: "gabriel".to_string(),
            estimated_hours: 1.5,
            scheduled_date: fixed_date("2026-03-02"),
            end_date: None,
            status: TaskStatus::Pending,
            created_at: fixed_time("2026-03-02T08:00:00Z"),
            started_at: None,
            completed_at: None,
        }
    }

    fn sample_session() -> PomodoroSessionInfo {
        PomodoroSessionInfo {
            id: Some(7),
            session_number: 1,
            session_type: SessionType::Work,
            duration_seconds: 1500,
            created_at: fixed_time("2026-03-02T09:00:00Z"),
            is_active: true,
            started_at: Some(fixed_time("2026-03-02T09:00:00Z")),
        }
    }

    fn sample_active_session() -> ActiveSessionInfo {
        ActiveSessionInfo {
            session_type: SessionType::Work,
            started_at: fixed_time("2026-03-02T09:00:00Z"),
            ends_at: fixed_time("2026-03-02T09:25:00Z"),
            duration_seconds: 1500,
        }
    }

    #[test]
    fn status_parse_and_as_str_round_trip() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()), Ok(status));
        }
        assert!(TaskStatus::parse("deferred").is_err());
    }

    #[test]
    fn only_in_progress_and_waiting_are_active() {
        assert!(TaskStatus::InProgress.is_active());
        assert!(TaskStatus::Waiting.is_active());
        assert!(!TaskStatus::Pending.is_active());
        assert!(!TaskStatus::Paused.is_active());
        assert!(!TaskStatus::Completed.is_active());
    }

    #[test]
    fn session_type_toggles_between_work_and_break() {
        assert_eq!(SessionType::Work.toggled(), SessionType::Break);
        assert_eq!(SessionType::Break.toggled(), SessionType::Work);
    }

    #[test]
    fn task_validate_rejects_empty_name() {
        let mut task = sample_task();
        task.name = "   ".to_string();
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_validate_rejects_end_date_before_schedule() {
        let mut task = sample_task();
        task.end_date = Some(fixed_date("2026-03-01"));
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_validate_rejects_non_positive_estimate() {
        let mut task = sample_task();
        task.estimated_hours = 0.0;
        assert!(task.validate().is_err());
        task.estimated_hours = f64::NAN;
        assert!(task.validate().is_err());
    }

    #[test]
    fn estimated_seconds_rounds_to_nearest() {
        let mut task = sample_task();
        task.estimated_hours = 1.5;
        assert_eq!(task.estimated_seconds(), 5400);
        task.estimated_hours = 0.0001;
        assert_eq!(task.estimated_seconds(), 0);
    }

    #[test]
    fn active_session_remaining_goes_negative_after_ends_at() {
        let session = sample_active_session();
        let before = fixed_time("2026-03-02T09:20:00Z");
        let after = fixed_time("2026-03-02T09:26:40Z");
        assert_eq!(session.remaining_at(before), 300);
        assert_eq!(session.remaining_at(after), -100);
        assert!(!session.is_expired_at(before));
        assert!(session.is_expired_at(after));
    }

    #[test]
    fn task_with_sessions_rejects_two_active_rows() {
        let mut task = sample_task();
        task.status = TaskStatus::InProgress;
        task.started_at = Some(fixed_time("2026-03-02T09:00:00Z"));
        let bundle = TaskWithSessions {
            task,
            active_session: Some(sample_active_session()),
            pomodoro_sessions: vec![sample_session(), sample_session()],
        };
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn task_with_sessions_requires_active_status_for_active_session() {
        let bundle = TaskWithSessions {
            task: sample_task(),
            active_session: Some(sample_active_session()),
            pomodoro_sessions: vec![sample_session()],
        };
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn domain_models_support_serde_roundtrip() {
        let task = sample_task();
        let session = sample_session();
        let active = sample_active_session();

        let task_roundtrip: Task =
            serde_json::from_str(&serde_json::to_string(&task).expect("serialize task"))
                .expect("deserialize task");
        let session_roundtrip: PomodoroSessionInfo =
            serde_json::from_str(&serde_json::to_string(&session).expect("serialize session"))
                .expect("deserialize session");
        let active_roundtrip: ActiveSessionInfo =
            serde_json::from_str(&serde_json::to_string(&active).expect("serialize active"))
                .expect("deserialize active");

        assert_eq!(task_roundtrip, task);
        assert_eq!(session_roundtrip, session);
        assert_eq!(active_roundtrip, active);
    }

    #[test]
    fn status_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).expect("serialize status"),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&SessionType::Break).expect("serialize type"),
            "\"break\""
        );
    }

    proptest! {
        #[test]
        fn estimated_seconds_matches_hours_budget(hours in 0.01f64..200.0f64) {
            let mut task = sample_task();
            task.estimated_hours = hours;
            let seconds = task.estimated_seconds();
            prop_assert!((seconds as f64 - hours * 3600.0).abs() <= 0.5);
        }
    }
}
