//! Shifts and table-scanning operations

use crate::console::Console;
use crate::error::Fault;
use crate::machine::Machine;
use crate::memory::Address;

impl<C: Console> Machine<C> {
    /// `log_shift`: logical shift, left for positive counts.
    pub(super) fn op_log_shift(&mut self) -> Result<(), Fault> {
        let value = self.uarg(0);
        let count = self.sarg(1);
        let result = if count < 0 {
            value.checked_shr(u32::from(count.unsigned_abs())).unwrap_or(0)
        } else {
            value.checked_shl(count as u32).unwrap_or(0)
        };
        self.store_result(result)
    }

    /// `art_shift`: arithmetic shift, preserving the sign on right shifts.
    pub(super) fn op_art_shift(&mut self) -> Result<(), Fault> {
        let value = self.sarg(0);
        let count = self.sarg(1);
        let result = if count < 0 {
            let shift = u32::from(count.unsigned_abs()).min(15);
            value >> shift
        } else {
            value.checked_shl(count as u32).unwrap_or(0)
        };
        self.store_result(result as u16)
    }

    /// `scan_table`: search for a value in a table of words or bytes.
    pub(super) fn op_scan_table(&mut self) -> Result<(), Fault> {
        let target = self.uarg(0);
        let mut addr = Address::from(self.uarg(1));
        let len = self.uarg(2);
        let form = self.opt_arg(3, 0x82);
        let stride = Address::from(form & 0x7F);

        let mut result = 0;
        for _ in 0..len {
            let value = if form & 0x80 != 0 {
                self.state.memory.read16(addr)?
            } else {
                u16::from(self.state.memory.read8(addr)?)
            };
            if value == target {
                result = addr as u16;
                break;
            }
            addr += stride;
        }

        self.store_result(result)?;
        self.branch(result != 0)
    }

    /// `copy_table`: block copy with zero-fill and overlap handling.
    pub(super) fn op_copy_table(&mut self) -> Result<(), Fault> {
        let from = Address::from(self.uarg(0));
        let to = Address::from(self.uarg(1));
        let size = self.sarg(2);

        if to == 0 {
            // A zero destination zeroes the source region instead.
            for i in 0..size.max(0) {
                self.state.memory.write8(from + i as Address, 0)?;
            }
        } else if size < 0 || from > to {
            // Forced or safe forward copy.
            for i in 0..i32::from(size.unsigned_abs()) {
                let byte = self.state.memory.read8(from + i as Address)?;
                self.state.memory.write8(to + i as Address, byte)?;
            }
        } else {
            // Overlapping forward ranges copy backwards.
            for i in (0..i32::from(size)).rev() {
                let byte = self.state.memory.read8(from + i as Address)?;
                self.state.memory.write8(to + i as Address, byte)?;
            }
        }
        Ok(())
    }

    /// `encode_text`: encode a span of the text buffer as a dictionary key.
    pub(super) fn op_encode_text(&mut self) -> Result<(), Fault> {
        let text = Address::from(self.uarg(0));
        let length = self.uarg(1);
        let from = Address::from(self.uarg(2));
        let coded = Address::from(self.uarg(3));

        let mut word = Vec::with_capacity(usize::from(length));
        for i in 0..Address::from(length) {
            word.push(self.state.memory.read8(text + from + i)?);
        }

        let (key, key_words) = self.text.encode_word(&self.state.memory, &word)?;
        for (i, value) in key.iter().enumerate().take(key_words) {
            self.state.memory.write16(coded + 2 * i as Address, *value)?;
        }
        Ok(())
    }
}
