use std::fmt;

/// State of a [`Task`](crate::Task).
///
/// `Success` is the only successful terminal state of a forward run and
/// `NotStarted` the only successful result of an undo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ActionState {
    #[default]
    NotStarted,
    Started,
    StartedTask,
    SuccessTask,
    FailedTask,
    FailedPreCheck,
    FailedPostCheck,
    FailedDependency,
    Success,
    FailedUndoTask,
    FailedUndoDependency,
}

impl ActionState {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Whether the task's own side effects may have happened.
    pub fn task_ran(self) -> bool {
        matches!(
            self,
            Self::StartedTask
                | Self::SuccessTask
                | Self::FailedTask
                | Self::FailedPostCheck
                | Self::Success
                | Self::FailedUndoTask
        )
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not started",
            Self::Started => "started",
            Self::StartedTask => "started task",
            Self::SuccessTask => "task succeeded",
            Self::FailedTask => "task failed",
            Self::FailedPreCheck => "pre-check failed",
            Self::FailedPostCheck => "post-check failed",
            Self::FailedDependency => "dependency failed",
            Self::Success => "success",
            Self::FailedUndoTask => "undo failed",
            Self::FailedUndoDependency => "undo of dependency failed",
        };
        f.write_str(s)
    }
}
