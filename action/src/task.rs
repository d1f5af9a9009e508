use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;

use crate::{ActionState, Check, CheckError};

/// Tasks are shared between the tasks depending on them and the pipeline
/// that drives them.
pub type Shared<T> = Rc<RefCell<T>>;

/// A type-erased handle to any task.
pub type TaskRef = Shared<dyn Task>;

/// Wrap a task so it can be shared.
pub fn shared<T>(task: T) -> Shared<T> {
    Rc::new(RefCell::new(task))
}

/// Outcome of [`Task::do_task`].
pub enum TaskResult {
    /// Side effects were applied; the given checks validate the result.
    Success(Vec<Box<dyn Check>>),
    Failed(anyhow::Error),
    /// A task this one takes input from did not succeed.
    FailedDependency,
}

impl From<Result<Vec<Box<dyn Check>>>> for TaskResult {
    fn from(result: Result<Vec<Box<dyn Check>>>) -> Self {
        match result {
            Ok(checks) => Self::Success(checks),
            Err(e) => Self::Failed(e),
        }
    }
}

/// State and wiring shared by every task.
#[derive(Default)]
pub struct TaskCore {
    state: ActionState,
    dependencies: Vec<TaskRef>,
    pre_checks: Vec<Box<dyn Check>>,
    post_checks: Vec<Box<dyn Check>>,
    failure: Option<anyhow::Error>,
}

impl TaskCore {
    pub fn new(dependencies: Vec<TaskRef>) -> Self {
        Self {
            dependencies,
            ..Default::default()
        }
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn dependencies(&self) -> &[TaskRef] {
        &self.dependencies
    }

    /// Dependencies run in the order they were added.
    pub fn add_dependency(&mut self, dependency: TaskRef) {
        self.dependencies.push(dependency);
    }

    pub fn add_pre_check(&mut self, check: Box<dyn Check>) {
        self.pre_checks.push(check);
    }

    pub fn post_checks(&self) -> &[Box<dyn Check>] {
        &self.post_checks
    }

    /// The error that caused the most recent failure, if any.
    pub fn failure(&self) -> Option<&anyhow::Error> {
        self.failure.as_ref()
    }

    /// The most recent failure, if it was a failed check.
    pub fn check_failure(&self) -> Option<&CheckError> {
        self.failure.as_ref().and_then(|e| e.downcast_ref())
    }

    fn fail(&mut self, state: ActionState, error: anyhow::Error) -> ActionState {
        self.state = state;
        self.failure = Some(error);
        state
    }
}

/// A unit of work with its own side effects and their inverse.
///
/// Implementors only provide `do_task` and `undo_task`; the protocol around
/// them (dependencies, checks, state transitions) is run by [`call`] and
/// [`undo`].
pub trait Task {
    /// Name used in logs and reports.
    fn name(&self) -> &'static str;

    fn core(&self) -> &TaskCore;

    fn core_mut(&mut self) -> &mut TaskCore;

    /// Apply this task's side effects.
    ///
    /// Expected failures are returned as [`TaskResult::Failed`], never
    /// panics. Earlier side effects of a failed run are left in place for
    /// `undo_task` to revert.
    fn do_task(&mut self) -> TaskResult;

    /// Revert whatever `do_task` did, including after a partial failure.
    fn undo_task(&mut self) -> Result<()>;

    fn state(&self) -> ActionState {
        self.core().state()
    }

    /// Builder-style [`TaskCore::add_dependency`].
    fn with_dependency(mut self, dependency: TaskRef) -> Self
    where
        Self: Sized,
    {
        self.core_mut().add_dependency(dependency);
        self
    }
}

fn run_checks(checks: &[Box<dyn Check>]) -> Result<(), CheckError> {
    for check in checks {
        log::trace!("Running {}", check.name());
        check.check()?;
    }
    Ok(())
}

/// Run `task`: its dependencies depth-first in order, then its pre-checks,
/// its own work and the post-checks that work produced.
///
/// A task that already succeeded is not run again.
pub fn call(task: &TaskRef) -> ActionState {
    let dependencies = task.borrow().core().dependencies.clone();
    for dependency in &dependencies {
        let state = call(dependency);
        if state != ActionState::Success {
            let mut task = task.borrow_mut();
            log::info!(
                "{}: dependency {} ended with state \"{state}\"",
                task.name(),
                dependency.borrow().name()
            );
            let error = anyhow::anyhow!("dependency {} failed", dependency.borrow().name());
            return task.core_mut().fail(ActionState::FailedDependency, error);
        }
    }

    let mut task = task.borrow_mut();
    let name = task.name();
    if task.state() == ActionState::Success {
        log::trace!("{name} already succeeded");
        return ActionState::Success;
    }

    let core = task.core_mut();
    core.state = ActionState::Started;
    core.failure = None;
    if let Err(e) = run_checks(&core.pre_checks) {
        log::info!("{name}: pre-check failed: {e}");
        return core.fail(ActionState::FailedPreCheck, e.into());
    }

    core.state = ActionState::StartedTask;
    log::debug!("Running {name}");
    let result = task.do_task();
    let core = task.core_mut();
    match result {
        TaskResult::Success(checks) => {
            core.state = ActionState::SuccessTask;
            core.post_checks = checks;
        }
        TaskResult::Failed(e) => {
            log::info!("{name} failed: {e:#}");
            return core.fail(ActionState::FailedTask, e);
        }
        TaskResult::FailedDependency => {
            log::info!("{name}: input task did not succeed");
            let error = anyhow::anyhow!("input task of {name} did not succeed");
            return core.fail(ActionState::FailedDependency, error);
        }
    }

    if let Err(e) = run_checks(&core.post_checks) {
        log::info!("{name}: post-check failed: {e}");
        return core.fail(ActionState::FailedPostCheck, e.into());
    }
    core.state = ActionState::Success;
    ActionState::Success
}

/// Revert `task` and then, regardless of the outcome, its dependencies in
/// reverse order.
///
/// Returns `NotStarted` if everything was reverted, `FailedUndoTask` if the
/// task itself could not be reverted and `FailedUndoDependency` if only a
/// dependency could not be reverted.
pub fn undo(task: &TaskRef) -> ActionState {
    let (dependencies, mut result) = {
        let mut task = task.borrow_mut();
        let name = task.name();
        let result = if task.state().task_ran() {
            log::debug!("Undoing {name}");
            match task.undo_task() {
                Ok(()) => ActionState::NotStarted,
                Err(e) => {
                    log::warn!("Undo of {name} failed: {e:#}");
                    task.core_mut().failure = Some(e);
                    ActionState::FailedUndoTask
                }
            }
        } else {
            log::trace!("Nothing to undo for {name} ({})", task.state());
            ActionState::NotStarted
        };
        let core = task.core_mut();
        core.state = result;
        if result == ActionState::NotStarted {
            core.post_checks.clear();
        }
        (core.dependencies.clone(), result)
    };

    for dependency in dependencies.iter().rev() {
        if undo(dependency) != ActionState::NotStarted && result == ActionState::NotStarted {
            result = ActionState::FailedUndoDependency;
        }
    }
    task.borrow_mut().core_mut().state = result;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct Recorder {
        core: TaskCore,
        name: &'static str,
        fail: bool,
        fail_undo: bool,
        post_check: Option<bool>,
        runs: Rc<Cell<u32>>,
        undo_log: Log,
    }

    impl Recorder {
        fn new(name: &'static str, undo_log: &Log) -> Self {
            Self {
                core: TaskCore::default(),
                name,
                fail: false,
                fail_undo: false,
                post_check: None,
                runs: Rc::new(Cell::new(0)),
                undo_log: undo_log.clone(),
            }
        }
    }

    struct Always(bool);

    impl Check for Always {
        fn name(&self) -> &'static str {
            "Always"
        }
        fn check(&self) -> Result<(), CheckError> {
            if self.0 {
                Ok(())
            } else {
                Err(CheckError::NoPackages)
            }
        }
    }

    /// Passes, counting how often it ran.
    struct Counting(Rc<Cell<u32>>);

    impl Check for Counting {
        fn name(&self) -> &'static str {
            "Counting"
        }
        fn check(&self) -> Result<(), CheckError> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    impl Task for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }
        fn core(&self) -> &TaskCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut TaskCore {
            &mut self.core
        }
        fn do_task(&mut self) -> TaskResult {
            self.runs.set(self.runs.get() + 1);
            if self.fail {
                return TaskResult::Failed(anyhow::anyhow!("forced failure"));
            }
            let checks: Vec<Box<dyn Check>> = match self.post_check {
                Some(ok) => vec![Box::new(Always(ok))],
                None => Vec::new(),
            };
            TaskResult::Success(checks)
        }
        fn undo_task(&mut self) -> Result<()> {
            self.undo_log.borrow_mut().push(self.name);
            if self.fail_undo {
                anyhow::bail!("forced undo failure");
            }
            Ok(())
        }
    }

    fn as_ref(task: &Shared<Recorder>) -> TaskRef {
        task.clone()
    }

    #[test]
    fn test_success_is_not_rerun() {
        let log = Log::default();
        let task = shared(Recorder::new("a", &log));
        let runs = task.borrow().runs.clone();
        let task_ref = as_ref(&task);

        assert_eq!(call(&task_ref), ActionState::Success);
        assert_eq!(call(&task_ref), ActionState::Success);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_undo_reverse_order() {
        let log = Log::default();
        let a = shared(Recorder::new("a", &log));
        let b = shared(Recorder::new("b", &log).with_dependency(as_ref(&a)));
        let c = shared(Recorder::new("c", &log).with_dependency(as_ref(&b)));
        let d = shared(
            Recorder::new("d", &log)
                .with_dependency(as_ref(&c))
                .with_dependency(as_ref(&a)),
        );
        let d_ref = as_ref(&d);

        assert_eq!(call(&d_ref), ActionState::Success);
        assert_eq!(undo(&d_ref), ActionState::NotStarted);
        // `a` is undone once: the second visit finds it not started.
        assert_eq!(*log.borrow(), ["d", "a", "c", "b"]);
        assert_eq!(a.borrow().state(), ActionState::NotStarted);
    }

    #[test]
    fn test_dependency_short_circuit() {
        let log = Log::default();
        let mut failing = Recorder::new("failing", &log);
        failing.fail = true;
        let failing = shared(failing);
        let mut dependent = Recorder::new("dependent", &log).with_dependency(as_ref(&failing));
        let pre_checks = Rc::new(Cell::new(0));
        dependent.core.add_pre_check(Box::new(Counting(pre_checks.clone())));
        let dependent = shared(dependent);
        let runs = dependent.borrow().runs.clone();

        assert_eq!(call(&as_ref(&dependent)), ActionState::FailedDependency);
        assert_eq!(failing.borrow().state(), ActionState::FailedTask);
        assert_eq!(pre_checks.get(), 0);
        assert_eq!(runs.get(), 0);

        // undo still reaches the failed dependency
        assert_eq!(undo(&as_ref(&dependent)), ActionState::NotStarted);
        assert_eq!(*log.borrow(), ["failing"]);

        failing.borrow_mut().fail = false;
        assert_eq!(call(&as_ref(&dependent)), ActionState::Success);
        assert_eq!(pre_checks.get(), 1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_checks() {
        let log = Log::default();
        let mut pre = Recorder::new("pre", &log);
        pre.core.add_pre_check(Box::new(Always(false)));
        let pre = shared(pre);
        let runs = pre.borrow().runs.clone();
        assert_eq!(call(&as_ref(&pre)), ActionState::FailedPreCheck);
        assert_eq!(runs.get(), 0);
        assert!(matches!(
            pre.borrow().core().check_failure(),
            Some(CheckError::NoPackages)
        ));

        let mut post = Recorder::new("post", &log);
        post.post_check = Some(false);
        let post = shared(post);
        assert_eq!(call(&as_ref(&post)), ActionState::FailedPostCheck);

        // a rerun replaces the post-checks of the previous run
        post.borrow_mut().post_check = Some(true);
        assert_eq!(call(&as_ref(&post)), ActionState::Success);
        assert_eq!(post.borrow().core().post_checks().len(), 1);
        assert!(post.borrow().core().failure().is_none());
    }

    #[test]
    fn test_failed_undo() {
        let log = Log::default();
        let mut a = Recorder::new("a", &log);
        a.fail_undo = true;
        let a = shared(a);
        let b = shared(Recorder::new("b", &log).with_dependency(as_ref(&a)));

        assert_eq!(call(&as_ref(&b)), ActionState::Success);
        assert_eq!(undo(&as_ref(&b)), ActionState::FailedUndoDependency);
        assert_eq!(a.borrow().state(), ActionState::FailedUndoTask);
        assert_eq!(b.borrow().state(), ActionState::FailedUndoDependency);
    }
}
