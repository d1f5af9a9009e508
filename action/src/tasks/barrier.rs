use anyhow::Result;

use crate::{Task, TaskCore, TaskRef, TaskResult};

/// Succeeds once all of its dependencies, the steps adding to a repository,
/// succeeded.
pub struct AddToRepoTask {
    core: TaskCore,
}

impl AddToRepoTask {
    pub fn new(dependencies: Vec<TaskRef>) -> Self {
        Self {
            core: TaskCore::new(dependencies),
        }
    }
}

impl Task for AddToRepoTask {
    fn name(&self) -> &'static str {
        "AddToRepoTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        TaskResult::Success(Vec::new())
    }

    fn undo_task(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Succeeds once all of its dependencies, the steps cleaning up after a
/// transaction, succeeded.
pub struct CleanupRepoTask {
    core: TaskCore,
}

impl CleanupRepoTask {
    pub fn new(dependencies: Vec<TaskRef>) -> Self {
        Self {
            core: TaskCore::new(dependencies),
        }
    }
}

impl Task for CleanupRepoTask {
    fn name(&self) -> &'static str {
        "CleanupRepoTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        TaskResult::Success(Vec::new())
    }

    fn undo_task(&mut self) -> Result<()> {
        Ok(())
    }
}
