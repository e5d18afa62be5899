//! Windowed screen model

use crate::console::{Console, FontStyle};
use crate::error::Fault;
use crate::stream::Stream;

const LOWER_WINDOW: usize = 0;
const UPPER_WINDOW: usize = 1;
const MAX_WINDOWS: usize = 8;

/// Per-window bookkeeping, including the v6 property slots.
#[derive(Debug, Clone, Copy)]
struct Window {
    pos: (u16, u16),
    size: (u16, u16),
    cursor: (u16, u16),
    left_margin: u16,
    right_margin: u16,
    newline_handler: u16,
    interrupt_countdown: u16,
    text_style: u16,
    colour_data: u16,
    font_number: u16,
    font_size: u16,
    attributes: u16,
    line_count: u16,
    printer_enabled: bool,
    buffering: bool,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            pos: (1, 1),
            size: (0, 0),
            cursor: (1, 1),
            left_margin: 0,
            right_margin: 0,
            newline_handler: 0,
            interrupt_countdown: 0,
            text_style: 0,
            colour_data: 0,
            font_number: 1,
            font_size: 1,
            attributes: 0,
            line_count: 0,
            printer_enabled: false,
            buffering: true,
        }
    }
}

/// Two-window (eight for v6) screen with a status line.
///
/// Window 0 is the scrolling lower window, window 1 the non-scrolling upper
/// one. The console does the drawing; this keeps the geometry, the per
/// window cursor and the stream settings saved with each window.
#[derive(Debug)]
pub struct Screen {
    version: u8,
    windows: [Window; MAX_WINDOWS],
    index: usize,
}

impl Screen {
    /// Create the screen model for a story version.
    pub fn new(version: u8) -> Self {
        Self {
            version,
            windows: [Window::default(); MAX_WINDOWS],
            index: LOWER_WINDOW,
        }
    }

    /// Screen width in columns.
    pub fn width(&self, console: &dyn Console) -> u16 {
        console.attr(crate::console::Attr::Cols) as u16
    }

    /// Screen height in lines.
    pub fn height(&self, console: &dyn Console) -> u16 {
        console.attr(crate::console::Attr::Lines) as u16
    }

    /// Currently selected window.
    pub fn selected(&self) -> u16 {
        self.index as u16
    }

    fn window_count(&self) -> usize {
        if self.version == 6 {
            MAX_WINDOWS
        } else {
            2
        }
    }

    /// Reset the screen to its initial layout.
    pub fn reset(&mut self, console: &mut dyn Console, stream: &mut Stream) -> Result<(), Fault> {
        self.windows = [Window::default(); MAX_WINDOWS];
        self.index = LOWER_WINDOW;

        match self.version {
            1 | 2 => {
                console.clear();
                console.move_cursor(u32::from(self.height(console)), 1);
                stream.set_col(1);
            }
            3 => {
                console.clear();
                let height = self.height(console);
                console.move_cursor(u32::from(height), 1);
                stream.set_col(1);
                self.windows[LOWER_WINDOW].pos = (1, height);
                self.windows[LOWER_WINDOW].size = (self.width(console), height);
                self.windows[LOWER_WINDOW].printer_enabled = stream.stream_enabled(2)?;
            }
            _ => self.erase_window(console, stream, -1)?,
        }
        Ok(())
    }

    /// Draw the prepared status-line text in inverse video on row one.
    pub fn show_status(&mut self, console: &mut dyn Console, stream: &mut Stream, text: &str) -> Result<(), Fault> {
        let printer_enabled = stream.stream_enabled(2)?;
        stream.enable_stream(2, false)?;

        let (row, col) = console.cursor();

        console.set_font_style(FontStyle::REVERSE);
        console.move_cursor(1, 1);
        for b in text.bytes() {
            console.write(b);
        }
        console.set_font_style(FontStyle::empty());
        console.move_cursor(row, col);
        stream.set_col(col);

        stream.enable_stream(2, printer_enabled)
    }

    /// Split the screen: the upper window gets rows 1..=`upper_height`.
    pub fn split_window(&mut self, console: &mut dyn Console, upper_height: u16) {
        let width = self.width(console);
        let height = self.height(console);

        self.windows[LOWER_WINDOW].pos = (1, upper_height + 1);
        self.windows[LOWER_WINDOW].size = (width, height.saturating_sub(upper_height));

        if upper_height != 0 {
            self.windows[UPPER_WINDOW].pos = (1, 1);
            self.windows[UPPER_WINDOW].size = (width, upper_height);
            if self.version == 3 {
                console.clear_lines(1, u32::from(upper_height));
            }
        } else {
            self.windows[UPPER_WINDOW].pos = (0, 0);
            self.windows[UPPER_WINDOW].size = (0, 0);
        }

        let lower = &self.windows[LOWER_WINDOW];
        console.set_scroll_region(u32::from(lower.pos.1), u32::from(lower.pos.1 + lower.size.1));
    }

    /// Select the window output goes to, saving the old window's state.
    pub fn select_window(&mut self, console: &mut dyn Console, stream: &mut Stream, index: u16) -> Result<(), Fault> {
        let index = usize::from(index);
        if index >= self.window_count() {
            return Err(Fault::IllegalOp);
        }

        stream.flush(console);

        let (line, col) = console.cursor();
        let current = &mut self.windows[self.index];
        current.cursor = (col as u16, line as u16);
        current.printer_enabled = stream.stream_enabled(2)?;
        current.buffering = stream.buffering();

        self.index = index;
        let next = &mut self.windows[index];

        if index == UPPER_WINDOW {
            if self.version != 6 {
                next.cursor = (1, 1);
                next.printer_enabled = false;
                next.buffering = false;
            }
        } else if index == LOWER_WINDOW {
            if self.version == 4 {
                next.cursor = (1, next.pos.1 + next.size.1 - 1);
            } else {
                // Clamp the saved cursor into the window's current area.
                next.cursor.1 = next.cursor.1.clamp(next.pos.1, next.pos.1 + next.size.1.saturating_sub(1));
                next.cursor.0 = next.cursor.0.clamp(next.pos.0, next.pos.0 + next.size.0.saturating_sub(1));
            }
        }

        stream.enable_stream(2, next.printer_enabled)?;
        let buffering = next.buffering;
        let cursor = next.cursor;
        stream.set_buffering(console, buffering);
        stream.set_col(u32::from(cursor.0));
        console.move_cursor(u32::from(cursor.1), u32::from(cursor.0));
        Ok(())
    }

    /// Erase a window; -1 unsplits, selects the lower window and clears.
    pub fn erase_window(&mut self, console: &mut dyn Console, stream: &mut Stream, index: i16) -> Result<(), Fault> {
        if index == -1 {
            self.split_window(console, 0);
            self.select_window(console, stream, LOWER_WINDOW as u16)?;
        }
        console.clear();
        Ok(())
    }

    /// Erase from the cursor to the end of the line.
    pub fn erase_line(&mut self, console: &mut dyn Console) {
        console.erase_line();
    }

    /// Move the cursor inside the current window (or `window` in v6).
    ///
    /// In v6 the special rows -1 and -2 hide and show the cursor.
    pub fn move_cursor(
        &mut self,
        console: &mut dyn Console,
        stream: &mut Stream,
        row: i16,
        col: u16,
        window: u16,
    ) -> Result<(), Fault> {
        if self.version == 6 {
            match row {
                -1 => console.set_cursor_visible(false),
                -2 => console.set_cursor_visible(true),
                _ => {
                    let index = usize::from(window);
                    if index >= self.window_count() {
                        return Err(Fault::IllegalOp);
                    }
                    let target = &mut self.windows[index];
                    let y = (i32::from(target.pos.1) - 1 + i32::from(row)).max(0) as u16;
                    target.cursor = (target.pos.0.saturating_sub(1) + col, y);
                    if index == self.index {
                        let cursor = target.cursor;
                        stream.set_col(u32::from(cursor.0));
                        console.move_cursor(u32::from(cursor.1), u32::from(cursor.0));
                    }
                }
            }
        } else if self.index == UPPER_WINDOW {
            stream.set_col(u32::from(col));
            console.move_cursor(row.max(1) as u32, u32::from(col));
        }
        Ok(())
    }

    /// Read a v6 window property slot.
    pub fn window_prop(&self, index: u16, prop: u16) -> u16 {
        let Some(window) = self.windows.get(usize::from(index)) else {
            return 0;
        };
        match prop {
            0 => window.pos.1,
            1 => window.pos.0,
            2 => window.size.1,
            3 => window.size.0,
            4 => window.cursor.1,
            5 => window.cursor.0,
            6 => window.left_margin,
            7 => window.right_margin,
            8 => window.newline_handler,
            9 => window.interrupt_countdown,
            10 => window.text_style,
            11 => window.colour_data,
            12 => window.font_number,
            13 => window.font_size,
            14 => window.attributes,
            15 => window.line_count,
            _ => 0,
        }
    }

    /// Write a v6 window property slot. Rendering side effects are not
    /// modelled; the slot is recorded for later reads.
    pub fn set_window_prop(&mut self, index: u16, prop: u16, value: u16) {
        let Some(window) = self.windows.get_mut(usize::from(index)) else {
            return;
        };
        match prop {
            0 => window.pos.1 = value,
            1 => window.pos.0 = value,
            2 => window.size.1 = value,
            3 => window.size.0 = value,
            4 => window.cursor.1 = value,
            5 => window.cursor.0 = value,
            6 => window.left_margin = value,
            7 => window.right_margin = value,
            8 => window.newline_handler = value,
            9 => window.interrupt_countdown = value,
            10 => window.text_style = value,
            11 => window.colour_data = value,
            12 => window.font_number = value,
            13 => window.font_size = value,
            14 => window.attributes = value,
            15 => window.line_count = value,
            _ => {}
        }
    }

    /// Reposition a v6 window.
    pub fn move_window(&mut self, index: u16, y: u16, x: u16) {
        if let Some(window) = self.windows.get_mut(usize::from(index)) {
            window.pos = (x, y);
        }
    }

    /// Resize a v6 window.
    pub fn resize_window(&mut self, index: u16, height: u16, width: u16) {
        if let Some(window) = self.windows.get_mut(usize::from(index)) {
            window.size = (width, height);
        }
    }

    /// Apply a v6 window attribute operation: set, clear, toggle.
    pub fn set_window_style(&mut self, index: u16, flags: u16, operation: u16) {
        if let Some(window) = self.windows.get_mut(usize::from(index)) {
            window.attributes = match operation {
                0 => flags,
                1 => window.attributes | flags,
                2 => window.attributes & !flags,
                3 => window.attributes ^ flags,
                _ => window.attributes,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::BatchConsole;
    use crate::options::Options;

    fn fixture(version: u8) -> (Screen, Stream, BatchConsole) {
        let options = Options::default();
        (Screen::new(version), Stream::new(&options, version), BatchConsole::new(24, 80))
    }

    #[test]
    fn split_and_select_track_window_state() {
        let (mut screen, mut stream, mut console) = fixture(5);
        screen.split_window(&mut console, 4);
        screen.select_window(&mut console, &mut stream, 1).unwrap();
        // The upper window disables buffering and homes the cursor.
        assert!(!stream.buffering());
        assert_eq!(console.cursor(), (1, 1));

        screen.select_window(&mut console, &mut stream, 0).unwrap();
        assert!(stream.buffering());
        assert!(console.cursor().0 >= 5);
    }

    #[test]
    fn select_rejects_wild_indices() {
        let (mut screen, mut stream, mut console) = fixture(5);
        assert_eq!(screen.select_window(&mut console, &mut stream, 2), Err(Fault::IllegalOp));
        let (mut screen, mut stream, mut console) = fixture(6);
        assert!(screen.select_window(&mut console, &mut stream, 7).is_ok());
    }

    #[test]
    fn window_props_round_trip() {
        let (mut screen, _, _) = fixture(6);
        screen.set_window_prop(3, 6, 11);
        assert_eq!(screen.window_prop(3, 6), 11);
        screen.move_window(3, 5, 7);
        assert_eq!(screen.window_prop(3, 0), 5);
        assert_eq!(screen.window_prop(3, 1), 7);
        screen.set_window_style(3, 0b101, 0);
        screen.set_window_style(3, 0b010, 1);
        assert_eq!(screen.window_prop(3, 14), 0b111);
        assert_eq!(screen.window_prop(9, 0), 0);
    }

    #[test]
    fn status_line_draws_on_row_one_and_restores_the_cursor() {
        let (mut screen, mut stream, mut console) = fixture(3);
        screen.reset(&mut console, &mut stream).unwrap();
        console.move_cursor(10, 3);
        screen.show_status(&mut console, &mut stream, "West of House").unwrap();
        assert_eq!(console.cursor(), (10, 3));
        assert!(console.output_text().contains("West of House"));
    }
}
