//! Output-stream multiplexer with word-wrap buffering

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use crate::console::{Colour, Console, FontStyle, Input};
use crate::consts::{TRANSCRIPT_NEWLINE_LIMIT, WRAP_BUFFER_LEN};
use crate::error::Fault;
use crate::memory::{Address, Memory};
use crate::options::Options;

/// Severity of interpreter messages shown through the screen stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageLevel {
    /// Progress notes, suppressed by default.
    Info,
    /// Recoverable problems.
    Warning,
    /// Fatal faults.
    Error,
}

/// Outcome of a character read through the stream layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A ZSCII character.
    Char(u16),
    /// The read timed out.
    Timeout,
    /// The input source is exhausted; the caller should wind down.
    Eof,
}

/// Append-only log file, opened on first use. Write errors are ignored;
/// logs never interfere with play.
#[derive(Debug)]
struct LogFile {
    path: PathBuf,
    file: Option<File>,
    part_prefix: String,
    part_suffix: String,
}

impl LogFile {
    fn new(path: &str) -> Self {
        Self {
            path: PathBuf::from(path),
            file: None,
            part_prefix: String::new(),
            part_suffix: String::new(),
        }
    }

    fn file(&mut self) -> Option<&mut File> {
        if self.file.is_none() {
            self.file = File::create(&self.path).ok();
        }
        self.file.as_mut()
    }

    fn end_part(&mut self) {
        if !self.part_suffix.is_empty() {
            let suffix = std::mem::take(&mut self.part_suffix);
            self.part_prefix.clear();
            if let Some(f) = self.file() {
                let _ = f.write_all(suffix.as_bytes());
            }
        }
    }

    fn write_ch(&mut self, ch: u8) {
        self.end_part();
        if let Some(f) = self.file() {
            let _ = f.write_all(&[ch]);
        }
    }

    fn write_str(&mut self, text: &str) {
        self.end_part();
        if let Some(f) = self.file() {
            let _ = f.write_all(text.as_bytes());
        }
    }

    /// Merge consecutive single-character writes sharing a prefix into one
    /// bracketed run, e.g. `IN <= "abc"`.
    fn write_part(&mut self, prefix: &str, ch: u8, suffix: &str) {
        if self.part_prefix != prefix {
            self.end_part();
            if let Some(f) = self.file() {
                let _ = f.write_all(prefix.as_bytes());
            }
            self.part_prefix = prefix.into();
            self.part_suffix = suffix.into();
        }
        if let Some(f) = self.file() {
            let _ = f.write_all(&[ch]);
        }
    }
}

/// Multiplexer for the four logical output streams.
///
/// Stream 1 is the screen, stream 2 a transcript log, stream 3 an in-memory
/// table and stream 4 a log of input keystrokes. Screen output passes
/// through a word buffer that breaks lines at word boundaries.
#[derive(Debug)]
pub struct Stream {
    screen_enable: bool,
    extended_colours: bool,
    text_style: u8,

    buffer_enable: bool,
    buffer: Vec<u16>,
    buffer_col: u32,

    printer_enable: bool,
    printer_echo_input: bool,
    printer_newline_count: u32,
    printer: LogFile,

    // Stream 3 redirections nest; the innermost captures output.
    memory_nest: Vec<(Address, Address)>,

    snooper_enable: bool,
    snooper: LogFile,

    trace_enable: bool,
    trace: LogFile,

    message_filter: MessageLevel,
}

impl Stream {
    /// Build the stream set from the command-line options.
    pub fn new(options: &Options, version: u8) -> Self {
        let message_filter = if options.info {
            MessageLevel::Info
        } else if options.warn {
            MessageLevel::Warning
        } else {
            MessageLevel::Error
        };
        Self {
            screen_enable: true,
            extended_colours: version == 6,
            text_style: 0,
            buffer_enable: true,
            buffer: Vec::with_capacity(WRAP_BUFFER_LEN),
            buffer_col: 1,
            printer_enable: options.print,
            printer_echo_input: version <= 5,
            printer_newline_count: 1,
            printer: LogFile::new("print.log"),
            memory_nest: Vec::new(),
            snooper_enable: options.key,
            snooper: LogFile::new("key.log"),
            trace_enable: options.trace,
            trace: LogFile::new("trace.log"),
            message_filter,
        }
    }

    /// Whether screen output is being word-buffered.
    pub fn buffering(&self) -> bool {
        self.buffer_enable
    }

    /// Whether the given stream (1..=4) is enabled.
    pub fn stream_enabled(&self, index: u16) -> Result<bool, Fault> {
        match index {
            1 => Ok(self.screen_enable),
            2 => Ok(self.printer_enable),
            3 => Ok(!self.memory_nest.is_empty()),
            4 => Ok(self.snooper_enable),
            _ => Err(Fault::BadStream),
        }
    }

    /// Enable or disable a stream (1..=4). Disabling stream 3 closes the
    /// innermost memory redirection.
    pub fn enable_stream(&mut self, index: u16, enable: bool) -> Result<(), Fault> {
        match index {
            1 => self.screen_enable = enable,
            2 => self.printer_enable = enable,
            3 => {
                if !enable {
                    self.memory_nest.pop();
                }
            }
            4 => self.snooper_enable = enable,
            _ => return Err(Fault::BadStream),
        }
        Ok(())
    }

    /// Redirect output into the table at `table`; the first word receives
    /// the character count.
    pub fn enable_memory_stream(&mut self, memory: &mut Memory, table: u16, _width: i16) -> Result<(), Fault> {
        let table = Address::from(table);
        memory.write16(table, 0)?;
        self.memory_nest.push((table, table + 2));
        Ok(())
    }

    /// Synchronise the wrap column, e.g. after a cursor move.
    pub fn set_col(&mut self, col: u32) {
        self.buffer_col = col;
    }

    /// Turn word buffering on or off, flushing first.
    pub fn set_buffering(&mut self, console: &mut dyn Console, enable: bool) {
        self.flush(console);
        self.buffer_enable = enable;
    }

    /// Flush any buffered output to the screen.
    pub fn flush(&mut self, console: &mut dyn Console) {
        let pending: Vec<u16> = self.buffer.drain(..).collect();
        for zscii in pending {
            self.send(console, zscii);
        }
    }

    /// Select a font, flushing buffered output first.
    pub fn set_font(&mut self, console: &mut dyn Console, font: u16) -> bool {
        self.flush(console);
        console.set_font(u32::from(font))
    }

    /// Apply a Z-code text style: zero resets, other bits accumulate.
    pub fn set_text_style(&mut self, console: &mut dyn Console, style: u16) {
        self.flush(console);
        if style == 0 {
            self.text_style = 0;
        } else {
            self.text_style |= style as u8;
        }
        let mut font_style = FontStyle::empty();
        if self.text_style & (1 << 0) != 0 {
            font_style |= FontStyle::REVERSE;
        }
        if self.text_style & (1 << 1) != 0 {
            font_style |= FontStyle::BOLD;
        }
        if self.text_style & (1 << 2) != 0 {
            font_style |= FontStyle::ITALIC;
        }
        if self.text_style & (1 << 3) != 0 {
            font_style |= FontStyle::FIXED;
        }
        console.set_font_style(font_style);
    }

    /// Apply Z colour codes to the console.
    pub fn set_colours(&mut self, console: &mut dyn Console, fg: i16, bg: i16) {
        self.flush(console);
        if let Some(colour) = self.convert_colour(fg) {
            console.set_foreground(colour);
        }
        if let Some(colour) = self.convert_colour(bg) {
            console.set_background(colour);
        }
    }

    fn convert_colour(&self, code: i16) -> Option<Colour> {
        match code {
            1 => Some(Colour::Default),
            2 => Some(Colour::Black),
            3 => Some(Colour::Red),
            4 => Some(Colour::Green),
            5 => Some(Colour::Yellow),
            6 => Some(Colour::Blue),
            7 => Some(Colour::Magenta),
            8 => Some(Colour::Cyan),
            9 => Some(Colour::White),
            10 if self.extended_colours => Some(Colour::LightGrey),
            11 if self.extended_colours => Some(Colour::MediumGrey),
            12 if self.extended_colours => Some(Colour::DarkGrey),
            _ => None,
        }
    }

    /// Read one ZSCII character, flushing pending output first.
    ///
    /// Characters outside the legal input set are dropped and the read
    /// retried. With `echo`, accepted characters are copied to the enabled
    /// output streams.
    pub fn read_char(
        &mut self,
        console: &mut dyn Console,
        timeout_cs: u16,
        echo: bool,
    ) -> ReadOutcome {
        self.flush(console);

        loop {
            let ch = match console.read(u32::from(timeout_cs) * 100) {
                Input::Char(ch) => ch,
                Input::Timeout => return ReadOutcome::Timeout,
                Input::Eof => return ReadOutcome::Eof,
            };

            if ch == 8 {
                return ReadOutcome::Char(u16::from(ch));
            }
            let legal = ch == b'\n' || ch == 13 || ch == 27 || (32..=126).contains(&ch) || (129..=254).contains(&ch);
            if !legal {
                continue;
            }

            if echo {
                if self.screen_enable {
                    console.write(ch);
                }
                if self.printer_enable && self.printer_echo_input {
                    self.print(ch);
                }
                if self.snooper_enable {
                    self.snooper.write_ch(ch);
                }
                if self.trace_enable {
                    self.trace.write_part("IN <= \"", ch, "\"\n");
                }
                if ch == b'\n' {
                    self.buffer_col = 1;
                }
            }
            return ReadOutcome::Char(u16::from(ch));
        }
    }

    /// Write one ZSCII character through the enabled streams.
    pub fn write_char(&mut self, console: &mut dyn Console, memory: &mut Memory, zscii: u16) -> Result<(), Fault> {
        if let Some((len_ptr, next)) = self.memory_nest.last_mut() {
            let len_ptr = *len_ptr;
            let at = *next;
            *next += 1;
            memory.write16(len_ptr, memory.read16(len_ptr)?.wrapping_add(1))?;
            memory.write8(at, zscii as u8)?;
        } else if self.buffer_enable {
            self.send_buffered(console, zscii);
        } else {
            self.send(console, zscii);
        }

        if self.trace_enable {
            self.trace.write_part("OUT => \"", zscii as u8, "\"\n");
        }
        Ok(())
    }

    /// Erase the character most recently echoed to the screen.
    pub fn delete_char(&mut self, console: &mut dyn Console) {
        self.send(console, 8);
        self.send(console, u16::from(b' '));
        self.send(console, 8);
    }

    /// Write a signed decimal number.
    pub fn write_number(&mut self, console: &mut dyn Console, memory: &mut Memory, value: i16) -> Result<(), Fault> {
        let mut digits = [0u8; 6];
        let mut n = i32::from(value);
        if n < 0 {
            self.write_char(console, memory, u16::from(b'-'))?;
            n = -n;
        }
        let mut used = 0;
        loop {
            digits[used] = b'0' + (n % 10) as u8;
            used += 1;
            n /= 10;
            if n == 0 {
                break;
            }
        }
        for i in (0..used).rev() {
            self.write_char(console, memory, u16::from(digits[i]))?;
        }
        Ok(())
    }

    /// Report an error-level message.
    pub fn error(&mut self, console: &mut dyn Console, text: &str) {
        self.message(console, MessageLevel::Error, text);
    }

    /// Report a warning-level message.
    pub fn warning(&mut self, console: &mut dyn Console, text: &str) {
        self.message(console, MessageLevel::Warning, text);
    }

    /// Report an info-level message.
    pub fn info(&mut self, console: &mut dyn Console, text: &str) {
        self.message(console, MessageLevel::Info, text);
    }

    /// Whether instruction tracing is enabled.
    pub fn tracing(&self) -> bool {
        self.trace_enable
    }

    /// Append a line to the trace log.
    pub fn trace_line(&mut self, line: &str) {
        self.trace.write_str(line);
        self.trace.write_str("\n");
    }

    fn message(&mut self, console: &mut dyn Console, level: MessageLevel, text: &str) {
        if level < self.message_filter {
            return;
        }

        // Start the message on a fresh line.
        let (_, col) = console.cursor();
        if col != 1 {
            self.send(console, u16::from(b'\n'));
        }

        console.set_font_style(FontStyle::REVERSE);
        self.send_str(console, "GRUE");
        console.set_font_style(FontStyle::empty());

        self.send_str(
            console,
            match level {
                MessageLevel::Info => " ",
                MessageLevel::Warning => " WRN: ",
                MessageLevel::Error => " ERR: ",
            },
        );
        self.send_str(console, text);
        self.send(console, u16::from(b'\n'));
    }

    fn send_str(&mut self, console: &mut dyn Console, text: &str) {
        for b in text.bytes() {
            self.send(console, u16::from(b));
        }
    }

    /// Unbuffered write of one ZSCII character, with output filtering.
    fn send(&mut self, console: &mut dyn Console, zscii: u16) {
        let zscii = match zscii {
            0 => return,
            // Carriage return prints as newline.
            13 => u16::from(b'\n'),
            // v6 sentence space.
            0x11 => u16::from(b' '),
            // Tab, newline, backspace.
            8..=10 => zscii,
            0x20..=0x7E => zscii,
            155..=251 => u16::from(b'?'),
            _ => return,
        };

        let ch = zscii as u8;
        if ch == b'\n' {
            self.buffer_col = 1;
        } else {
            self.buffer_col += 1;
        }

        if self.screen_enable {
            console.write(ch);
        }
        if self.printer_enable {
            self.print(ch);
        }
    }

    /// Buffered write: words are held back until a separator so a line
    /// break can be inserted first when the word would overflow the row.
    fn send_buffered(&mut self, console: &mut dyn Console, zscii: u16) {
        if zscii == u16::from(b' ') || zscii == u16::from(b'\n') || self.buffer.len() == WRAP_BUFFER_LEN {
            if self.buffer_col + self.buffer.len() as u32 > console.attr(crate::console::Attr::Cols) {
                self.send(console, u16::from(b'\n'));
            }
            self.flush(console);
            self.send(console, zscii);
        } else {
            self.buffer.push(zscii);
        }
    }

    /// Transcript write with repeated-newline collapsing.
    fn print(&mut self, ch: u8) {
        let ch = if ch == b'\r' { b'\n' } else { ch };
        if ch == b'\n' {
            self.printer_newline_count += 1;
            if self.printer_newline_count >= TRANSCRIPT_NEWLINE_LIMIT {
                return;
            }
        } else {
            self.printer_newline_count = 0;
        }
        self.printer.write_ch(ch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::BatchConsole;

    fn fixture() -> (Stream, BatchConsole, Memory) {
        let options = Options::default();
        let mut memory = Memory::new();
        memory.resize(0x1000);
        (Stream::new(&options, 3), BatchConsole::new(24, 20), memory)
    }

    fn write_str(stream: &mut Stream, console: &mut BatchConsole, memory: &mut Memory, text: &str) {
        for b in text.bytes() {
            stream.write_char(console, memory, u16::from(b)).unwrap();
        }
    }

    #[test]
    fn wraps_at_word_boundaries() {
        let (mut stream, mut console, mut memory) = fixture();
        write_str(&mut stream, &mut console, &mut memory, "one two three four five six ");
        stream.flush(&mut console);
        // 20 columns: a break lands before a word would overflow.
        assert_eq!(console.output_text(), "one two three four \nfive six ");
    }

    #[test]
    fn break_only_when_the_word_overflows() {
        let (mut stream, mut console, mut memory) = fixture();
        write_str(&mut stream, &mut console, &mut memory, "0123456789012345678 x");
        stream.flush(&mut console);
        assert!(console.output_text().starts_with("0123456789012345678 "));
    }

    #[test]
    fn memory_stream_captures_output() {
        let (mut stream, mut console, mut memory) = fixture();
        stream.enable_memory_stream(&mut memory, 0x100, 0).unwrap();
        write_str(&mut stream, &mut console, &mut memory, "hi");
        stream.enable_stream(3, false).unwrap();
        assert_eq!(memory.read16(0x100).unwrap(), 2);
        assert_eq!(memory.read8(0x102).unwrap(), b'h');
        assert_eq!(memory.read8(0x103).unwrap(), b'i');
        assert!(console.output().is_empty());
    }

    #[test]
    fn memory_streams_nest() {
        let (mut stream, mut console, mut memory) = fixture();
        stream.enable_memory_stream(&mut memory, 0x100, 0).unwrap();
        stream.enable_memory_stream(&mut memory, 0x200, 0).unwrap();
        write_str(&mut stream, &mut console, &mut memory, "x");
        stream.enable_stream(3, false).unwrap();
        write_str(&mut stream, &mut console, &mut memory, "y");
        stream.enable_stream(3, false).unwrap();
        assert_eq!(memory.read8(0x202).unwrap(), b'x');
        assert_eq!(memory.read8(0x102).unwrap(), b'y');
    }

    #[test]
    fn output_filtering() {
        let (mut stream, mut console, mut memory) = fixture();
        stream.set_buffering(&mut console, false);
        for zscii in [0u16, 5, 13, 0x11, 200, b'a' as u16] {
            stream.write_char(&mut console, &mut memory, zscii).unwrap();
        }
        assert_eq!(console.output_text(), "\n ?a");
    }

    #[test]
    fn bad_stream_numbers_fault() {
        let (mut stream, _, _) = fixture();
        assert_eq!(stream.enable_stream(5, true), Err(Fault::BadStream));
        assert_eq!(stream.stream_enabled(0).unwrap_err(), Fault::BadStream);
    }

    #[test]
    fn messages_respect_the_filter() {
        let (mut stream, mut console, _) = fixture();
        stream.info(&mut console, "quiet");
        assert!(console.output().is_empty());
        stream.error(&mut console, "loud");
        assert!(console.output_text().contains("ERR: loud"));
    }
}
