use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("another task is already active: {active_task_id}")]
    ActiveTaskConflict { active_task_id: String },
}

impl InfraError {
    // Transient failures are logged and absorbed; the rest surface to the
    // caller (boundary rejections and invariant violations).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Json(_) | Self::Sqlite(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_failures_are_transient() {
        let io = InfraError::Io(std::io::Error::new(std::io::ErrorKind::Other, "down"));
        let sqlite = InfraError::Sqlite(rusqlite::Error::QueryReturnedNoRows);
        assert!(io.is_transient());
        assert!(sqlite.is_transient());
    }

    #[test]
    fn rejections_and_conflicts_are_not_transient() {
        assert!(!InfraError::InvalidInput("bad".to_string()).is_transient());
        assert!(!InfraError::TaskNotFound("9".to_string()).is_transient());
        assert!(
            !InfraError::ActiveTaskConflict {
                active_task_id: "1".to_string()
            }
            .is_transient()
        );
    }
}
