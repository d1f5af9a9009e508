/// Command-line args
mod args;
pub use args::Args;

/// Settings derived from command-line args
mod settings;
pub use settings::Settings;

/// Task pipelines of a transaction
mod pipeline;
pub use pipeline::Pipeline;

/// Text UI
mod ui;

/// The main app
mod app;
pub use app::App;

use anyhow::Result;
use clap::Parser;

/// Run the command-line app.
pub fn run() -> Result<()> {
    let args = Args::parse();
    let settings: Settings = args.try_into()?;

    let log_level = match settings.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    simple_logging::log_to_stderr(log_level);

    let app = App::new(settings);
    app.run()
}
