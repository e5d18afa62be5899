//! Branches, routine calls and returns

use num_enum::TryFromPrimitive;

use crate::console::Console;
use crate::error::Fault;
use crate::machine::Machine;
use crate::stream::ReadOutcome;

/// How a routine's return value is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum CallKind {
    /// Store into the variable named by the next instruction byte.
    Store = 0,
    /// Discard the value.
    Discard = 1,
    /// Push onto the evaluation stack.
    Push = 2,
    /// Continuation of an interrupted character read.
    ReadCharInterrupt = 3,
}

impl<C: Console> Machine<C> {
    /// Conditional branch: decode the branch info following the
    /// instruction and take it when `cond` matches the polarity.
    ///
    /// Offsets zero and one return false and true from the current routine
    /// instead of branching.
    pub(super) fn branch(&mut self, cond: bool) -> Result<(), Fault> {
        let info = self.state.fetch8()?;
        let branch_on_true = info & 0x80 != 0;
        let long_branch = info & 0x40 == 0;
        let mut offset = i32::from(info & 0x3F);

        if long_branch {
            offset = offset << 8 | i32::from(self.state.fetch8()?);
            // Sign-extend the 14-bit offset.
            offset = offset << 18 >> 18;
        }

        if cond != branch_on_true {
            return Ok(());
        }
        if offset == 0 || offset == 1 {
            self.sub_ret(offset as u16, None)
        } else {
            self.state.branch(offset - 2);
            Ok(())
        }
    }

    /// Call the routine at the given packed address.
    ///
    /// A zero target is legal and produces the value zero through the call
    /// kind's convention without touching the stack.
    pub(super) fn sub_call(&mut self, call_type: u8, packed: u16, argv: &[u16]) -> Result<(), Fault> {
        let target = self.header.unpack_addr(packed, true);
        if target == 0 {
            return match CallKind::try_from(call_type).map_err(|_| Fault::BadCallType)? {
                CallKind::Store | CallKind::ReadCharInterrupt => self.store_result(0),
                CallKind::Discard => Ok(()),
                CallKind::Push => self.state.push(0),
            };
        }

        if call_type == CallKind::ReadCharInterrupt as u8 {
            // The continuation needs the routine to restart the read.
            self.state.push(packed)?;
        }

        self.state.call(call_type, target)?;

        let num_locals = self.state.fetch8()?;
        self.state.push(argv.len() as u16)?;
        for i in 0..usize::from(num_locals) {
            let mut value = 0;
            if self.header.version <= 4 {
                value = self.state.fetch16()?;
            }
            if i < argv.len() {
                value = argv[i];
            }
            self.state.push(value)?;
        }
        Ok(())
    }

    /// Return `value` from the frame at `frame_ptr` (current frame when
    /// `None`), delivering it per the frame's call kind.
    pub(super) fn sub_ret(&mut self, value: u16, frame_ptr: Option<usize>) -> Result<(), Fault> {
        let fp = frame_ptr.unwrap_or_else(|| self.state.frame_ptr());
        let call_type = self.state.return_from_frame(fp)?;

        match CallKind::try_from(call_type).map_err(|_| Fault::BadCallType)? {
            CallKind::Store => self.store_result(value),
            CallKind::Discard => Ok(()),
            CallKind::Push => self.state.push(value),
            CallKind::ReadCharInterrupt => {
                let routine = self.state.pop()?;
                let timeout = self.state.pop()?;
                if value == 0 {
                    // The interrupt declined to handle it; resume the read.
                    if let Some(zscii) = self.read_char_zscii(timeout, false, routine)? {
                        self.store_result(zscii)?;
                    }
                    Ok(())
                } else {
                    self.store_result(value)
                }
            }
        }
    }

    /// Read one ZSCII character, invoking the timeout interrupt routine if
    /// the read expires. `None` means no character was delivered.
    pub(super) fn read_char_zscii(&mut self, timeout: u16, echo: bool, routine: u16) -> Result<Option<u16>, Fault> {
        match self.stream.read_char(&mut self.console, timeout, echo) {
            ReadOutcome::Char(zscii) => {
                // ZSCII newline.
                Ok(Some(if zscii == u16::from(b'\n') { 13 } else { zscii }))
            }
            ReadOutcome::Timeout => {
                if routine != 0 {
                    self.state.push(timeout)?;
                    self.sub_call(CallKind::ReadCharInterrupt as u8, routine, &[])?;
                }
                Ok(None)
            }
            ReadOutcome::Eof => {
                // Out of scripted input: wind the machine down.
                self.state.quit();
                Ok(None)
            }
        }
    }

    /// `je`: branch when the first operand equals any later one.
    pub(super) fn op_je(&mut self) -> Result<(), Fault> {
        let cond = (1..self.num_arg).any(|i| self.args[i] == self.args[0]);
        self.branch(cond)
    }

    /// Shared `inc`/`dec`: step a variable in signed arithmetic.
    pub(super) fn op_step(&mut self, delta: i16) -> Result<(), Fault> {
        let var = self.uarg(0) as u8;
        let value = (self.state.var_read(var, false)? as i16).wrapping_add(delta);
        self.state.var_write(var, value as u16, false)
    }

    /// Shared `inc_chk`/`dec_chk`: step, then branch on the comparison
    /// against the second operand.
    pub(super) fn op_step_check(&mut self, delta: i16) -> Result<(), Fault> {
        let var = self.uarg(0) as u8;
        let value = (self.state.var_read(var, false)? as i16).wrapping_add(delta);
        self.state.var_write(var, value as u16, false)?;
        let cond = if delta < 0 { value < self.sarg(1) } else { value > self.sarg(1) };
        self.branch(cond)
    }

    /// `call_vs`/`call_vn` family: first operand is the routine, the rest
    /// are arguments.
    pub(super) fn op_call_var(&mut self, call_type: u8) -> Result<(), Fault> {
        let argv = self.args;
        let argc = self.num_arg.max(1);
        self.sub_call(call_type, argv[0], &argv[1..argc])
    }
}
