//! Command-line options

use std::path::PathBuf;

use clap::Parser;

use crate::consts::DEFAULT_UNDO_SLOTS;

/// Command-line options for the interpreter.
#[derive(Debug, Clone, Parser)]
#[command(name = "grue", version, about = "Z-machine interpreter for interactive fiction")]
pub struct Options {
    /// Report information messages
    #[arg(long)]
    pub info: bool,

    /// Report warning messages
    #[arg(long)]
    pub warn: bool,

    /// Override the console width
    #[arg(short, long, value_name = "N")]
    pub width: Option<u16>,

    /// Batch mode, disable output to the screen
    #[arg(short, long)]
    pub batch: bool,

    /// Trace execution to "trace.log"
    #[arg(short = 'T', long)]
    pub trace: bool,

    /// Mirror screen output to "print.log"
    #[arg(short, long)]
    pub print: bool,

    /// Log key presses to "key.log"
    #[arg(short, long)]
    pub key: bool,

    /// Read keyboard input from a file
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Initial random number seed; zero seeds unpredictably
    #[arg(short = 'S', long, value_name = "N", default_value_t = 0)]
    pub seed: u32,

    /// Number of undo buffers
    #[arg(short, long, value_name = "N", default_value_t = DEFAULT_UNDO_SLOTS)]
    pub undo: usize,

    /// Directory for save files
    #[arg(short = 's', long, value_name = "DIR", default_value = "Saves")]
    pub save_dir: PathBuf,

    /// Story file to run (.z1 .. .z8, .zblorb)
    pub story: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            info: false,
            warn: false,
            width: None,
            batch: false,
            trace: false,
            print: false,
            key: false,
            input: None,
            seed: 0,
            undo: DEFAULT_UNDO_SLOTS,
            save_dir: PathBuf::from("Saves"),
            story: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_forms() {
        let options = Options::parse_from(["grue", "-T", "--print", "-S", "7", "-u", "2", "-s", "slots", "story.z5"]);
        assert!(options.trace);
        assert!(options.print);
        assert_eq!(options.seed, 7);
        assert_eq!(options.undo, 2);
        assert_eq!(options.save_dir, PathBuf::from("slots"));
        assert_eq!(options.story, Some(PathBuf::from("story.z5")));
    }

    #[test]
    fn defaults_match_the_manual() {
        let options = Options::parse_from(["grue"]);
        assert_eq!(options.seed, 0);
        assert_eq!(options.undo, DEFAULT_UNDO_SLOTS);
        assert_eq!(options.save_dir, PathBuf::from("Saves"));
        assert!(options.story.is_none());
    }
}
