use std::fs;

use anyhow::{Context, Result};
use clap::Parser;

use ags_engine::demo::build_demo_engine;

mod cli;
use cli::Args;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut fixture = build_demo_engine();
    fixture.engine.set_fast_forward(args.fast_forward);
    fixture.engine.start()?;
    fixture.engine.run_frames(args.frames)?;

    let engine = &fixture.engine;
    println!(
        "simulated {} frames; room {:?}, score {}, {} diagnostics",
        args.frames,
        engine.displayed_room(),
        engine.world.score,
        engine.diag_events().len()
    );

    if args.verbose {
        for line in fixture.log.borrow().iter() {
            println!("  {line}");
        }
    }

    if let Some(path) = args.event_log_json {
        let report = serde_json::to_string_pretty(&engine.event_log())
            .context("serialising the event log")?;
        fs::write(&path, report)
            .with_context(|| format!("writing event log to {}", path.display()))?;
        println!("wrote event log to {}", path.display());
    }
    Ok(())
}
