pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{BootstrapResult, bootstrap_workspace};
pub use application::modal::{ModalId, ModalManager};
pub use application::pomodoro::{CheckerHandle, DEFAULT_POLL_INTERVAL, PomodoroChecker};
pub use application::store::TaskStore;
pub use application::timing::{CountdownBaseline, CountdownFrame, CountdownHandle, TimingEngine};
pub use domain::duration::{Duration, parse_hms};
pub use domain::lifecycle::{TaskEvent, next_status};
pub use domain::models::{
    ActiveSessionInfo, NewTask, PomodoroPolicy, PomodoroSessionInfo, SessionType, Task, TaskPatch,
    TaskStatus, TaskWithSessions,
};
pub use infrastructure::command_log::CommandLog;
pub use infrastructure::error::InfraError;
pub use infrastructure::storage::initialize_database;
pub use infrastructure::task_service::{NowProvider, SqliteTaskService, TaskService};
