//! Input, printing and screen operations

use crate::console::Console;
use crate::error::Fault;
use crate::machine::Machine;
use crate::memory::Address;

impl<C: Console> Machine<C> {
    /// Draw the v1-3 status line from the location object and the score or
    /// clock globals.
    pub(super) fn show_status(&mut self) -> Result<(), Fault> {
        let cols = usize::from(self.screen.width(&self.console));
        let time_game = self.header.is_time_game();
        let limit = cols.saturating_sub(if time_game { 61 } else { 27 });

        let mut line = String::from(" ");
        let location = self.state.var_read(16, false)?;
        if location != 0 {
            let name = self.object.name(&self.state.memory, location)?;
            let (chars, _) = self.text.decode_string(&self.state.memory, name)?;
            for ch in chars {
                if line.len() < limit {
                    if let Some(ch) = char::from_u32(u32::from(ch)) {
                        line.push(ch);
                    }
                }
            }
        }
        while line.len() < limit {
            line.push(' ');
        }

        if time_game {
            let hours = self.state.var_read(17, false)?;
            let mins = self.state.var_read(18, false)?;
            line.push_str(&format!("Time: {hours:02}:{mins:02}"));
        } else {
            let moves = self.state.var_read(18, false)?;
            line.push_str(&format!("Moves: {moves}"));
            while line.len() < cols.saturating_sub(14) {
                line.push(' ');
            }
            let score = self.state.var_read(17, false)? as i16;
            line.push_str(&format!("Score: {score}"));
        }

        while line.len() < cols {
            line.push(' ');
        }
        line.truncate(cols);

        self.screen.show_status(&mut self.console, &mut self.stream, &line)
    }

    /// `sread` (v1-4): read a line into the text buffer and tokenise it.
    pub(super) fn op_sread(&mut self) -> Result<(), Fault> {
        let buffer = Address::from(self.uarg(0));
        let parse = self.uarg(1);
        let (timeout, routine) = if self.header.version >= 4 {
            (self.opt_arg(2, 0), self.opt_arg(3, 0))
        } else {
            (0, 0)
        };

        if self.header.version <= 3 {
            self.show_status()?;
        }

        let max = self.state.memory.read8(buffer)?.saturating_sub(1);
        let start = buffer + 1;
        let mut len: u8 = 0;

        loop {
            if len >= max {
                break;
            }
            let Some(zscii) = self.read_char_zscii(timeout, true, routine)? else {
                return Ok(());
            };
            match zscii {
                8 => {
                    if len > 0 {
                        self.stream.delete_char(&mut self.console);
                        len -= 1;
                    }
                }
                13 => break,
                _ => {
                    let ch = (zscii as u8).to_ascii_lowercase();
                    self.state.memory.write8(start + Address::from(len), ch)?;
                    len += 1;
                }
            }
        }
        self.state.memory.write8(start + Address::from(len), 0)?;

        if parse != 0 {
            let dict = self.header.dict;
            self.parser
                .tokenise(&mut self.state.memory, &self.text, parse, start as u16, 1, dict, false)?;
        }
        Ok(())
    }

    /// `aread` (v5+): line input with a result variable and a preloaded
    /// buffer.
    pub(super) fn op_aread(&mut self) -> Result<(), Fault> {
        let buffer = Address::from(self.uarg(0));
        let parse = self.uarg(1);
        let timeout = self.opt_arg(2, 0);
        let routine = self.opt_arg(3, 0);

        let max = self.state.memory.read8(buffer)?;
        let mut len = self.state.memory.read8(buffer + 1)?;
        let start = buffer + 2;
        let mut status: u16 = 0;

        loop {
            if len >= max {
                break;
            }
            let Some(zscii) = self.read_char_zscii(timeout, true, routine)? else {
                break;
            };
            match zscii {
                8 => {
                    if len > 0 {
                        self.stream.delete_char(&mut self.console);
                        len -= 1;
                    }
                }
                13 => {
                    status = 13;
                    break;
                }
                _ => {
                    let ch = (zscii as u8).to_ascii_lowercase();
                    self.state.memory.write8(start + Address::from(len), ch)?;
                    len += 1;
                }
            }
        }
        self.state.memory.write8(buffer + 1, len)?;
        if len < max {
            self.state.memory.write8(start + Address::from(len), 0)?;
        }

        self.store_result(status)?;

        if parse != 0 {
            let dict = self.header.dict;
            self.parser
                .tokenise(&mut self.state.memory, &self.text, parse, start as u16, 2, dict, false)?;
        }
        Ok(())
    }

    /// `read_char`: one character with an optional timeout interrupt.
    pub(super) fn op_read_char(&mut self) -> Result<(), Fault> {
        // The first operand is the input device and always 1.
        let timeout = self.opt_arg(1, 0);
        let routine = self.opt_arg(2, 0);
        if let Some(zscii) = self.read_char_zscii(timeout, false, routine)? {
            self.store_result(zscii)?;
        }
        Ok(())
    }

    /// `tokenise`: explicit tokenisation with an optional dictionary.
    pub(super) fn op_tokenise(&mut self) -> Result<(), Fault> {
        let text = self.uarg(0);
        let parse = self.uarg(1);
        let dict = self.opt_arg(2, self.header.dict);
        let preserve = self.opt_arg(3, 0) != 0;
        // Skip the maximum and current length bytes.
        self.parser
            .tokenise(&mut self.state.memory, &self.text, parse, text + 2, 2, dict, preserve)
    }

    /// `output_stream`: positive numbers enable, negative disable; stream
    /// 3 takes the table to capture into.
    pub(super) fn op_output_stream(&mut self) -> Result<(), Fault> {
        let number = self.sarg(0);
        if number == 3 {
            if self.num_arg < 2 {
                return Err(Fault::BadStream);
            }
            let table = self.uarg(1);
            let width = self.sarg(2);
            return self.stream.enable_memory_stream(&mut self.state.memory, table, width);
        }

        let index = number.unsigned_abs();
        if index > 4 {
            return Err(Fault::BadStream);
        }
        if number > 0 {
            self.stream.enable_stream(index, true)
        } else if number < 0 {
            self.stream.enable_stream(index, false)
        } else {
            Ok(())
        }
    }

    /// `pull`: pop into a variable; in v6 an operand selects a user stack.
    pub(super) fn op_pull(&mut self) -> Result<(), Fault> {
        if self.header.version == 6 {
            let value = if self.num_arg >= 1 {
                let stack = Address::from(self.uarg(0));
                let free = self.state.memory.read16(stack)?;
                let value = self.state.memory.read16(stack + 2 * (Address::from(free) + 1))?;
                self.state.memory.write16(stack, free + 1)?;
                value
            } else {
                self.state.pop()?
            };
            let var = self.state.fetch8()?;
            self.state.var_write(var, value, true)
        } else {
            let value = self.state.pop()?;
            self.state.var_write(self.uarg(0) as u8, value, true)
        }
    }

    /// `pop_stack` (v6): discard entries from a user stack or the engine's.
    pub(super) fn op_pop_stack(&mut self) -> Result<(), Fault> {
        let items = self.uarg(0);
        if self.num_arg >= 2 {
            let stack = Address::from(self.uarg(1));
            let free = self.state.memory.read16(stack)?;
            self.state.memory.write16(stack, free.wrapping_add(items))?;
        } else {
            for _ in 0..items {
                self.state.pop()?;
            }
        }
        Ok(())
    }

    /// `push_stack` (v6): push onto a user stack, branching on success.
    pub(super) fn op_push_stack(&mut self) -> Result<(), Fault> {
        let value = self.uarg(0);
        let stack = Address::from(self.uarg(1));
        let free = self.state.memory.read16(stack)?;
        if free != 0 {
            self.state.memory.write16(stack + 2 * Address::from(free), value)?;
            self.state.memory.write16(stack, free - 1)?;
        }
        self.branch(free != 0)
    }

    /// `erase_line`: only the "whole line" form is defined in characters.
    pub(super) fn op_erase_line(&mut self) -> Result<(), Fault> {
        if self.uarg(0) == 1 {
            self.screen.erase_line(&mut self.console);
        } else if self.header.version == 6 {
            self.warn_unimplemented("erase_line pixel form unimplemented");
        }
        Ok(())
    }

    /// `set_cursor`: absolute move within the current (or given) window.
    pub(super) fn op_set_cursor(&mut self) -> Result<(), Fault> {
        let row = self.sarg(0);
        let col = self.uarg(1);
        let window = self.opt_arg(2, self.screen.selected());
        self.screen.move_cursor(&mut self.console, &mut self.stream, row, col, window)
    }

    /// `get_cursor`: write the cursor position into a two-word array.
    pub(super) fn op_get_cursor(&mut self) -> Result<(), Fault> {
        let (row, col) = self.console.cursor();
        let array = Address::from(self.uarg(0));
        self.state.memory.write16(array, row as u16)?;
        self.state.memory.write16(array + 2, col as u16)
    }

    /// `print_table`: print a rectangle of ZSCII bytes from memory.
    pub(super) fn op_print_table(&mut self) -> Result<(), Fault> {
        let mut addr = Address::from(self.uarg(0));
        let width = self.uarg(1);
        let height = self.opt_arg(2, 1);
        let skip = self.opt_arg(3, 0);

        let (line, col) = self.console.cursor();
        for row in 0..height {
            for _ in 0..width {
                let ch = self.state.memory.read8(addr)?;
                self.write_zscii(u16::from(ch))?;
                addr += 1;
            }
            self.console.move_cursor(line + u32::from(row) + 1, col);
            addr += Address::from(skip);
        }
        Ok(())
    }

    /// `print_form` (v6): print a formatted table of length-prefixed lines.
    pub(super) fn op_print_form(&mut self) -> Result<(), Fault> {
        let mut addr = Address::from(self.uarg(0));
        loop {
            let length = self.state.memory.read16(addr)?;
            if length == 0 {
                return Ok(());
            }
            addr += 2;
            for _ in 0..length {
                let ch = self.state.memory.read8(addr)?;
                self.write_zscii(u16::from(ch))?;
                addr += 1;
            }
        }
    }

    /// `print_unicode`: approximate a few common code points in ASCII.
    pub(super) fn op_print_unicode(&mut self) -> Result<(), Fault> {
        let code = self.uarg(0);
        match code {
            0x20..=0x7E => self.write_zscii(code),
            // Copyright sign.
            0x00A9 => {
                for ch in *b"(C)" {
                    self.write_zscii(u16::from(ch))?;
                }
                Ok(())
            }
            // Latin small s with comma below.
            0x0219 => self.write_zscii(u16::from(b's')),
            // Em dash and minus sign.
            0x2014 | 0x2212 => self.write_zscii(u16::from(b'-')),
            // Horizontal ellipsis.
            0x2026 => {
                for _ in 0..3 {
                    self.write_zscii(u16::from(b'.'))?;
                }
                Ok(())
            }
            _ => {
                let text = format!("unsupported unicode {code}");
                self.warn_unimplemented(&text);
                self.write_zscii(u16::from(b'?'))
            }
        }
    }

    /// `check_unicode`: report which code points `print_unicode` handles.
    pub(super) fn op_check_unicode(&mut self) -> Result<(), Fault> {
        let code = self.uarg(0);
        let mask = match code {
            0x20..=0x7E => 0b11,
            0x00A9 | 0x0219 | 0x2014 | 0x2026 | 0x2212 => 0b01,
            _ => 0,
        };
        self.store_result(mask)
    }

    /// `picture_data` (v6): no pictures; report none and branch false.
    pub(super) fn op_picture_data(&mut self) -> Result<(), Fault> {
        self.warn_unimplemented("picture_data unimplemented");
        let array = Address::from(self.uarg(1));
        self.state.memory.write16(array, 0)?;
        self.state.memory.write16(array + 2, 0)?;
        self.branch(false)
    }

    /// `read_mouse` (v6): no mouse; report a released button at the origin.
    pub(super) fn op_read_mouse(&mut self) -> Result<(), Fault> {
        self.warn_unimplemented("read_mouse unimplemented");
        let array = Address::from(self.uarg(0));
        for i in 0..4 {
            self.state.memory.write16(array + 2 * i, 0)?;
        }
        Ok(())
    }
}
