use crate::domain::models::{SessionType, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    Start,
    Resume,
    Pause,
    Complete,
    WorkSegmentEnd,
    BreakSegmentEnd,
}

impl TaskEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Resume => "resume",
            Self::Pause => "pause",
            Self::Complete => "complete",
            Self::WorkSegmentEnd => "work segment end",
            Self::BreakSegmentEnd => "break segment end",
        }
    }
}

// The transition table. Completed is terminal; everything not listed is
// rejected so callers surface the violation instead of guessing.
pub fn next_status(current: TaskStatus, event: TaskEvent) -> Result<TaskStatus, String> {
    use TaskEvent::*;
    use TaskStatus::*;

    match (current, event) {
        (Pending | Paused, Start) => Ok(InProgress),
        (Paused, Resume) => Ok(InProgress),
        (InProgress | Waiting, Pause) => Ok(Paused),
        (InProgress, WorkSegmentEnd) => Ok(Waiting),
        (Waiting, BreakSegmentEnd) => Ok(InProgress),
        (Completed, _) => Err("task is completed; no further transitions".to_string()),
        (_, Complete) => Ok(Completed),
        (status, event) => Err(format!(
            "cannot {} a task in status {}",
            event.as_str(),
            status.as_str()
        )),
    }
}

// Cycle rule: work segment N is followed by break segment N; finishing the
// break opens work segment N + 1.
pub fn advance_session(session_type: SessionType, session_number: u32) -> (SessionType, u32) {
    match session_type {
        SessionType::Work => (SessionType::Break, session_number),
        SessionType::Break => (SessionType::Work, session_number.saturating_add(1)),
    }
}

pub fn status_after_advance(session_type: SessionType) -> TaskStatus {
    match session_type.toggled() {
        SessionType::Work => TaskStatus::InProgress,
        SessionType::Break => TaskStatus::Waiting,
    }
}
