use std::path::PathBuf;

use clap::Parser;

/// Plays the built-in demo game headlessly for a fixed number of frames.
#[derive(Parser, Debug)]
#[command(about = "Headless demo of the runtime core", version)]
pub struct Args {
    /// Number of frames to simulate
    #[arg(long, default_value_t = 400)]
    pub frames: u64,

    /// Run unpaced instead of at the native frame rate
    #[arg(long)]
    pub fast_forward: bool,

    /// Path to write the engine event log as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Print the collaborator call log after the run
    #[arg(long)]
    pub verbose: bool,
}
