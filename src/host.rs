//! The collaborator interface: everything the engine needs from its
//! surrounding presentation layer (screen, input, save/restore storage).
//!
//! Grounded on the `display_trait.rs`/`display_manager.rs` split (a trait
//! object behind a `DisplayManager`, implementations for headless and
//! terminal output) and `input_v3.rs`/`input_v4.rs`'s read-line/read-char
//! request shapes, collapsed into a single synchronous `Host` trait.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowId {
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextStyle {
    pub reverse: bool,
    pub bold: bool,
    pub italic: bool,
    pub fixed_pitch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLineReply {
    Line(String),
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCharReply {
    Char(u8),
    TimedOut,
}

/// Everything the engine asks of the world outside the interpreter core:
/// screen output, input, and persistence. A fatal internal error is
/// reported via [`Host::error`] rather than through `Result`: the engine
/// halts and reports rather than unwinds through this boundary.
pub trait Host {
    fn print(&mut self, window: WindowId, text: &str);
    fn split_window(&mut self, lines: u16);
    fn set_window(&mut self, window: WindowId);
    fn clear_screen(&mut self, window: WindowId);
    fn set_cursor(&mut self, row: u16, col: u16);
    fn get_cursor(&self) -> (u16, u16);
    fn set_text_style(&mut self, style: TextStyle);
    fn set_colour(&mut self, fg: u8, bg: u8);
    fn set_font(&mut self, id: u8) -> u8;
    fn erase_line(&mut self);
    fn status(&mut self, room_name: &str, value: i16, is_time: bool);
    fn sound_effect(&mut self, id: u16, effect: u16, volume: u16);

    fn read_line(
        &mut self,
        max_chars: usize,
        initial: &str,
        timeout_tenths: u16,
    ) -> ReadLineReply;
    fn read_char(&mut self, timeout_tenths: u16) -> ReadCharReply;

    fn save(&mut self, bytes: &[u8]) -> bool;
    fn restore(&mut self) -> Option<Vec<u8>>;

    fn quit(&mut self);
    fn error(&mut self, message: &str);
}

/// A `Host` that discards all output and answers input requests from
/// nothing (useful for fuzzing/benchmarking the engine without a real
/// front end). Grounded on `display_headless.rs`.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    pub cursor: (u16, u16),
    pub quit_called: bool,
    pub last_error: Option<String>,
}

impl Host for HeadlessHost {
    fn print(&mut self, _window: WindowId, _text: &str) {}
    fn split_window(&mut self, _lines: u16) {}
    fn set_window(&mut self, _window: WindowId) {}
    fn clear_screen(&mut self, _window: WindowId) {}
    fn set_cursor(&mut self, row: u16, col: u16) {
        self.cursor = (row, col);
    }
    fn get_cursor(&self) -> (u16, u16) {
        self.cursor
    }
    fn set_text_style(&mut self, _style: TextStyle) {}
    fn set_colour(&mut self, _fg: u8, _bg: u8) {}
    fn set_font(&mut self, _id: u8) -> u8 {
        1
    }
    fn erase_line(&mut self) {}
    fn status(&mut self, _room_name: &str, _value: i16, _is_time: bool) {}
    fn sound_effect(&mut self, _id: u16, _effect: u16, _volume: u16) {}
    fn read_line(&mut self, _max_chars: usize, _initial: &str, _timeout_tenths: u16) -> ReadLineReply {
        ReadLineReply::Line(String::new())
    }
    fn read_char(&mut self, _timeout_tenths: u16) -> ReadCharReply {
        ReadCharReply::Char(0)
    }
    fn save(&mut self, _bytes: &[u8]) -> bool {
        false
    }
    fn restore(&mut self) -> Option<Vec<u8>> {
        None
    }
    fn quit(&mut self) {
        self.quit_called = true;
    }
    fn error(&mut self, message: &str) {
        self.last_error = Some(message.to_string());
    }
}

/// A `Host` whose input replies and save/restore images are scripted ahead
/// of time, for deterministic engine tests. Grounded on the same
/// headless-testing need `test_utils.rs` serves for the interpreter tests.
#[derive(Debug, Default)]
pub struct ScriptedHost {
    pub lines: std::collections::VecDeque<String>,
    pub chars: std::collections::VecDeque<u8>,
    pub save_slot: Option<Vec<u8>>,
    pub printed: String,
    pub status_lines: Vec<String>,
    pub quit_called: bool,
    pub last_error: Option<String>,
    pub cursor: (u16, u16),
}

impl ScriptedHost {
    pub fn with_lines(lines: Vec<&str>) -> Self {
        ScriptedHost {
            lines: lines.into_iter().map(String::from).collect(),
            ..Default::default()
        }
    }
}

impl Host for ScriptedHost {
    fn print(&mut self, _window: WindowId, text: &str) {
        self.printed.push_str(text);
    }
    fn split_window(&mut self, _lines: u16) {}
    fn set_window(&mut self, _window: WindowId) {}
    fn clear_screen(&mut self, _window: WindowId) {}
    fn set_cursor(&mut self, row: u16, col: u16) {
        self.cursor = (row, col);
    }
    fn get_cursor(&self) -> (u16, u16) {
        self.cursor
    }
    fn set_text_style(&mut self, _style: TextStyle) {}
    fn set_colour(&mut self, _fg: u8, _bg: u8) {}
    fn set_font(&mut self, _id: u8) -> u8 {
        1
    }
    fn erase_line(&mut self) {}
    fn status(&mut self, room_name: &str, value: i16, is_time: bool) {
        self.status_lines
            .push(format!("{room_name} {value} {is_time}"));
    }
    fn sound_effect(&mut self, _id: u16, _effect: u16, _volume: u16) {}
    fn read_line(&mut self, max_chars: usize, _initial: &str, _timeout_tenths: u16) -> ReadLineReply {
        match self.lines.pop_front() {
            Some(mut line) => {
                line.truncate(max_chars);
                ReadLineReply::Line(line)
            }
            None => ReadLineReply::Line(String::new()),
        }
    }
    fn read_char(&mut self, _timeout_tenths: u16) -> ReadCharReply {
        match self.chars.pop_front() {
            Some(c) => ReadCharReply::Char(c),
            None => ReadCharReply::Char(0),
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
        self.quit_called = true;
    }
    fn error(&mut self, message: &str) {
        self.last_error = Some(message.to_string());
    }
}
