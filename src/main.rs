use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use grue_vm::prelude::*;

fn main() -> ExitCode {
    let options = Options::parse();

    let level = if options.info {
        tracing::Level::INFO
    } else if options.warn {
        tracing::Level::WARN
    } else {
        tracing::Level::ERROR
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let Some(path) = options.story.clone() else {
        // The interactive story browser is not part of this build.
        eprintln!("usage: grue [OPTIONS] <STORY>");
        return ExitCode::FAILURE;
    };

    let story = match Story::load(&path) {
        Ok(story) => story,
        Err(err) => {
            eprintln!("grue: {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };

    if options.batch {
        let lines = 24;
        let cols = options.width.unwrap_or(80);
        let mut console = BatchConsole::new(lines, u32::from(cols));
        if let Some(input) = &options.input {
            match std::fs::read(input) {
                Ok(bytes) => console.feed(&bytes),
                Err(err) => {
                    eprintln!("grue: {}: {err}", input.display());
                    return ExitCode::FAILURE;
                }
            }
        }
        play(console, options, story)
    } else {
        match TermConsole::new(&options) {
            Ok(console) => play(console, options, story),
            Err(err) => {
                eprintln!("grue: terminal setup failed: {err}");
                ExitCode::FAILURE
            }
        }
    }
}

fn play<C: Console>(console: C, options: Options, story: Story) -> ExitCode {
    let mut machine = Machine::new(console, options, story);
    match machine.play(false) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "execution stopped");
            ExitCode::FAILURE
        }
    }
}
