use colored::Colorize;

use action::{ActionState, TaskRef};
use util::Timer;

use crate::settings::Settings;

/// All interactions with the text UI should go through this struct.
pub struct Ui {
    /// -v setting, displays extra text info to user
    pub verbose: bool,
    /// keeps track of time for each pipeline stage
    timer: Timer,
}

impl Ui {
    pub fn new(settings: &Settings) -> Self {
        Self {
            verbose: settings.verbose > 0,
            timer: Timer::now(),
        }
    }

    pub fn start_timer(&mut self) {
        if self.verbose {
            self.timer.reset();
        }
    }

    pub fn print_elapsed(&self, stage: &str) {
        if self.verbose {
            eprintln!("{} took {:?}.", stage, self.timer.elapsed());
        }
    }

    pub fn verbose_progress(&self, msg: &str) {
        if self.verbose {
            eprint!("{}... ", msg.magenta());
        }
    }

    pub fn done(&self) {
        if self.verbose {
            eprintln!("{}.", "done".green());
        }
    }

    /// Print the state of every task, plus the failure of any task that has one.
    ///
    /// Tasks that never started are only listed when verbose.
    pub fn report(&self, tasks: &[TaskRef]) {
        for task in tasks {
            let task = task.borrow();
            let state = task.state();
            if state == ActionState::NotStarted && !self.verbose {
                continue;
            }
            let state_str = state.to_string();
            let colored_state = if state.is_success() {
                state_str.green()
            } else if state == ActionState::NotStarted {
                state_str.normal()
            } else {
                state_str.red()
            };
            eprintln!("{:>42} {}", task.name().cyan(), colored_state);
            if let Some(failure) = task.core().failure() {
                eprintln!("{:>42} {:#}", "", failure);
            }
        }
    }

    pub fn success(&self, msg: &str) {
        eprintln!("{}.", msg.green());
    }

    pub fn failure(&self, msg: &str) {
        eprintln!("{}.", msg.red());
    }
}
