use std::io;
use std::rc::Rc;

use anyhow::Result;

use action::ActionState;
use repo::{JsonPackageReader, PackageReader};

use crate::pipeline::Pipeline;
use crate::settings::Settings;
use crate::ui::Ui;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Transaction failed in state {0}; changes were reverted")]
    Failed(ActionState),
    #[error("Transaction failed in state {0}, and reverting it failed in state {1}")]
    UndoFailed(ActionState, ActionState),
}

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// Reads package metadata
    reader: Rc<dyn PackageReader>,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        Self::with_reader(settings, Rc::new(JsonPackageReader))
    }

    /// Create a new `App` reading packages with `reader`.
    pub fn with_reader(settings: Settings, reader: Rc<dyn PackageReader>) -> Self {
        let ui = Ui::new(&settings);
        Self {
            settings,
            reader,
            ui,
        }
    }

    /// Run the app, using settings to determine which pipeline to run.
    pub fn run(mut self) -> Result<()> {
        self.ui.verbose_progress("Creating tasks");
        let pipeline = if self.settings.print {
            Pipeline::print(&self.settings, self.reader.clone(), Box::new(io::stdout()))?
        } else {
            Pipeline::import(&self.settings, self.reader.clone())?
        };
        self.ui.done();
        log::debug!("Pipeline has {} tasks", pipeline.tasks().len());

        if self.ui.verbose {
            eprintln!(
                "Adding {} package(s) to {} ({}, {})",
                self.settings.packages.len(),
                self.settings.repo.name,
                self.settings.repo.architecture,
                self.settings.repo_type,
            );
        }

        self.ui.start_timer();
        let state = pipeline.run();
        self.ui.report(pipeline.tasks());
        self.ui.print_elapsed("Transaction");

        if state.is_success() {
            if !self.settings.print {
                self.ui.success("Transaction complete");
            }
            return Ok(());
        }

        self.ui.failure("Transaction failed; reverting");
        let undo_state = pipeline.undo();
        if self.ui.verbose {
            self.ui.report(pipeline.tasks());
        }
        if undo_state == ActionState::NotStarted {
            Err(Error::Failed(state).into())
        } else {
            Err(Error::UndoFailed(state, undo_state).into())
        }
    }
}
