//! Command-line front end: load a story file, wire up a terminal host, run
//! the engine to completion or quit.

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use zmachine::config::Config;
use zmachine::engine::Engine;
use zmachine::host::{Host, ReadCharReply, ReadLineReply, TextStyle, WindowId};

#[derive(Parser)]
#[command(name = "zmrun", about = "Run a Z-Machine story file")]
struct Args {
    /// Path to a .z3/.z4/.z5/.z7/.z8 story file
    story: PathBuf,

    /// Force predictable RNG seeding regardless of zmachine.toml
    #[arg(long)]
    seed: Option<u64>,
}

/// A terminal `Host`: stdout for printing, stdin for line/char input, no
/// save persistence beyond the current process (an in-memory slot).
struct TerminalHost {
    save_slot: Option<Vec<u8>>,
    cursor: (u16, u16),
}

impl TerminalHost {
    fn new() -> Self {
        TerminalHost {
            save_slot: None,
            cursor: (1, 1),
        }
    }
}

impl Host for TerminalHost {
    fn print(&mut self, _window: WindowId, text: &str) {
        print!("{text}");
        let _ = io::stdout().flush();
    }

    fn split_window(&mut self, _lines: u16) {}
    fn set_window(&mut self, _window: WindowId) {}
    fn clear_screen(&mut self, _window: WindowId) {
        print!("\x1b[2J\x1b[H");
    }
    fn set_cursor(&mut self, row: u16, col: u16) {
        self.cursor = (row, col);
    }
    fn get_cursor(&self) -> (u16, u16) {
        self.cursor
    }
    fn set_text_style(&mut self, style: TextStyle) {
        if style.reverse {
            print!("\x1b[7m");
        } else {
            print!("\x1b[0m");
        }
    }
    fn set_colour(&mut self, _fg: u8, _bg: u8) {}
    fn set_font(&mut self, _id: u8) -> u8 {
        1
    }
    fn erase_line(&mut self) {}
    fn status(&mut self, room_name: &str, value: i16, is_time: bool) {
        let detail = if is_time {
            format!("{:02}:{:02}", value / 100, value % 100)
        } else {
            value.to_string()
        };
        eprintln!("[{room_name} | {detail}]");
    }
    fn sound_effect(&mut self, _id: u16, _effect: u16, _volume: u16) {}

    fn read_line(&mut self, max_chars: usize, initial: &str, _timeout_tenths: u16) -> ReadLineReply {
        print!("{initial}");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => ReadLineReply::Line(String::new()),
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                let mut owned = trimmed.to_string();
                owned.truncate(max_chars);
                ReadLineReply::Line(owned)
            }
            Err(_) => ReadLineReply::Line(String::new()),
        }
    }

    fn read_char(&mut self, _timeout_tenths: u16) -> ReadCharReply {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => ReadCharReply::Char(0),
            _ => ReadCharReply::Char(line.bytes().next().unwrap_or(0)),
        }
    }

    fn save(&mut self, bytes: &[u8]) -> bool {
        self.save_slot = Some(bytes.to_vec());
        true
    }
    fn restore(&mut self) -> Option<Vec<u8>> {
        self.save_slot.clone()
    }

    fn quit(&mut self) {
        log::info!("story requested quit");
    }

    fn error(&mut self, message: &str) {
        eprintln!("zmrun: fatal: {message}");
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = Config::load_near(&args.story);
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.trace.as_filter()),
    )
    .init();

    let bytes = match std::fs::read(&args.story) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("zmrun: could not read {}: {e}", args.story.display());
            return ExitCode::FAILURE;
        }
    };

    let rand = match args.seed {
        Some(seed) => zmachine::zrand::ZRand::new_predictable(seed),
        None => config.build_rand(),
    };

    let mut engine = match Engine::new(bytes, rand) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("zmrun: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut host = TerminalHost::new();
    match engine.run(&mut host) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
