use std::fmt;

/// Lifecycle of the launched container process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NotStarted,
    Running,
    Exited(i32),
    Terminated,
}

impl Status {
    /// Moves to `next` if the lifecycle allows it. Exited and terminated
    /// processes are final; nothing restarts them.
    pub fn advance(self, next: Status) -> Result<Status, String> {
        match (self, next) {
            (Status::NotStarted, Status::Running)
            | (Status::Running, Status::Exited(_))
            | (Status::Running, Status::Terminated) => Ok(next),
            _ => Err(format!("Invalid status transition: {} -> {}", self, next)),
        }
    }

    /// Process exit code to report for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Status::Exited(code) => *code,
            Status::Terminated => 130,
            Status::NotStarted | Status::Running => 1,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::NotStarted => write!(f, "not started"),
            Status::Running => write!(f, "running"),
            Status::Exited(code) => write!(f, "exited({})", code),
            Status::Terminated => write!(f, "terminated"),
        }
    }
}
