//! Z-machine core: the fetch-decode-execute loop

mod alu;
mod dispatch;
mod flow;
mod io;
mod save;

pub use dispatch::{DispatchTables, Op};

use tracing::debug;

use crate::config::InterpreterConfig;
use crate::console::Console;
use crate::consts::VM_MAX_OPERANDS;
use crate::disasm::Disassembler;
use crate::error::{Fault, VmError};
use crate::header::{self, Header};
use crate::memory::Address;
use crate::object::ObjectTable;
use crate::options::Options;
use crate::parser::Parser;
use crate::screen::Screen;
use crate::state::State;
use crate::story::Story;
use crate::stream::Stream;
use crate::text::Text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandType {
    LargeConst,
    SmallConst,
    Variable,
}

/// The interpreter: a story, its mutable state and the helper components,
/// driven by a version-conditioned dispatch table.
pub struct Machine<C: Console> {
    console: C,
    options: Options,
    config: InterpreterConfig,

    story: Story,
    header: Header,
    state: State,
    stream: Stream,
    screen: Screen,
    object: ObjectTable,
    text: Text,
    parser: Parser,

    tables: DispatchTables,
    disasm: Disassembler,

    num_arg: usize,
    args: [u16; VM_MAX_OPERANDS],
    inst_addr: Address,
}

impl<C: Console> Machine<C> {
    /// Build a machine around a loaded story.
    pub fn new(console: C, options: Options, story: Story) -> Self {
        let header = *story.header();
        let version = header.version;
        let state = State::new(&story, &options.save_dir, options.undo, options.seed);
        let stream = Stream::new(&options, version);
        Self {
            console,
            config: InterpreterConfig::default(),
            story,
            header,
            state,
            stream,
            screen: Screen::new(version),
            object: ObjectTable::new(&header),
            text: Text::new(&header),
            parser: Parser::new(version),
            tables: DispatchTables::new(version),
            disasm: Disassembler::new(version),
            num_arg: 0,
            args: [0; VM_MAX_OPERANDS],
            inst_addr: 0,
            options,
        }
    }

    /// Run the story to completion.
    ///
    /// On a fault the faulting instruction is disassembled and reported
    /// through the output stream before the error is returned.
    pub fn play(&mut self, restore: bool) -> Result<(), VmError> {
        self.banner();
        self.reset(restore)?;

        let result = self.run_loop();
        if let Err(fault) = result {
            let mut line = self.disasm.line(&self.state.memory, self.inst_addr);
            line.push_str(" \"");
            line.push_str(&fault.to_string());
            line.push('"');
            self.stream.error(&mut self.console, &line);
        }

        self.console.wait_for_key();
        self.stream.info(&mut self.console, "quit");

        result.map_err(VmError::from)
    }

    /// Console access, for inspecting batch output after a run.
    pub fn console(&self) -> &C {
        &self.console
    }

    fn banner(&mut self) {
        let version = format!("version  : z{}", self.header.version);
        self.stream.info(&mut self.console, &version);
        let checksum = format!("checksum : {:04X}", self.header.checksum);
        self.stream.info(&mut self.console, &checksum);

        if self.header.version >= 3 && !self.story.is_checksum_valid() {
            // Several early v3 games shipped without a checksum.
            if self.header.version == 3 {
                self.stream.info(&mut self.console, "checksum fail");
            } else {
                self.stream.warning(&mut self.console, "checksum fail");
            }
        }
    }

    fn run_loop(&mut self) -> Result<(), Fault> {
        while !self.state.is_quit_requested() {
            self.inst_addr = self.state.pc();
            if self.stream.tracing() {
                let line = self.disasm.line(&self.state.memory, self.inst_addr);
                self.stream.trace_line(&line);
            }
            self.fetch_decode_execute()?;
        }

        if self.header.version <= 3 {
            self.show_status()?;
        }
        Ok(())
    }

    /// Reset to initial conditions, or to a saved state with `restore`.
    ///
    /// Restore failures are reported at INFO level and leave the running
    /// state untouched; the caller sees `false`.
    fn reset(&mut self, restore: bool) -> Result<bool, Fault> {
        let ok = if restore {
            match self.state.restore(&self.story) {
                Ok(()) => true,
                Err(err) => {
                    let text = err.to_string();
                    self.stream.info(&mut self.console, &text);
                    false
                }
            }
        } else {
            self.state.reset(&self.story);
            true
        };

        if ok {
            self.screen.reset(&mut self.console, &mut self.stream)?;
            header::reset(&mut self.state.memory, &self.console, &self.config, self.header.version)?;
        }
        Ok(ok)
    }

    fn fetch_decode_execute(&mut self) -> Result<(), Fault> {
        let opcode = self.state.fetch8()?;
        self.num_arg = 0;

        match opcode {
            0x00..=0x7F => {
                // Long form: two operands, types in bits 6 and 5.
                self.fetch_operand(long_type(opcode, 6))?;
                self.fetch_operand(long_type(opcode, 5))?;
                self.execute(self.tables.op2[usize::from(opcode & 0x1F)])
            }
            0x80..=0xAF => {
                // Short form, one operand, type in bits 5-4.
                match (opcode >> 4) & 3 {
                    0 => self.fetch_operand(OperandType::LargeConst)?,
                    1 => self.fetch_operand(OperandType::SmallConst)?,
                    _ => self.fetch_operand(OperandType::Variable)?,
                }
                self.execute(self.tables.op1[usize::from(opcode & 0xF)])
            }
            0xBE => {
                let ext = self.state.fetch8()?;
                self.fetch_var_operands(4)?;
                self.execute(self.tables.ope[usize::from(ext & 0x1F)])
            }
            0xB0..=0xBF => self.execute(self.tables.op0[usize::from(opcode & 0xF)]),
            0xC0..=0xDF => {
                // Variable form of a two-operand instruction.
                self.fetch_var_operands(4)?;
                self.execute(self.tables.op2[usize::from(opcode & 0x1F)])
            }
            _ => {
                let max = if opcode == 0xEC || opcode == 0xFA { 8 } else { 4 };
                self.fetch_var_operands(max)?;
                self.execute(self.tables.opv[usize::from(opcode & 0x1F)])
            }
        }
    }

    fn fetch_operand(&mut self, op_type: OperandType) -> Result<(), Fault> {
        let value = match op_type {
            OperandType::LargeConst => self.state.fetch16()?,
            OperandType::SmallConst => u16::from(self.state.fetch8()?),
            OperandType::Variable => {
                let var = self.state.fetch8()?;
                self.state.var_read(var, false)?
            }
        };
        if self.num_arg >= VM_MAX_OPERANDS {
            return Err(Fault::IllegalOp);
        }
        self.args[self.num_arg] = value;
        self.num_arg += 1;
        Ok(())
    }

    fn fetch_var_operands(&mut self, max: usize) -> Result<(), Fault> {
        let mut types = if max == 8 {
            self.state.fetch16()?
        } else {
            u16::from(self.state.fetch8()?) << 8
        };

        for _ in 0..max {
            match types >> 14 {
                0 => self.fetch_operand(OperandType::LargeConst)?,
                1 => self.fetch_operand(OperandType::SmallConst)?,
                2 => self.fetch_operand(OperandType::Variable)?,
                _ => return Ok(()),
            }
            types <<= 2;
        }
        Ok(())
    }

    /// Operand `i` as unsigned; missing operands read as zero.
    fn uarg(&self, i: usize) -> u16 {
        if i < self.num_arg {
            self.args[i]
        } else {
            0
        }
    }

    /// Operand `i` as signed.
    fn sarg(&self, i: usize) -> i16 {
        self.uarg(i) as i16
    }

    /// Operand `i`, or `default` when fewer operands were supplied.
    fn opt_arg(&self, i: usize, default: u16) -> u16 {
        if i < self.num_arg {
            self.args[i]
        } else {
            default
        }
    }

    /// Store a value into the variable named by the next instruction byte.
    fn store_result(&mut self, value: u16) -> Result<(), Fault> {
        let var = self.state.fetch8()?;
        self.state.var_write(var, value, false)
    }

    /// Write one ZSCII character through the output streams.
    fn write_zscii(&mut self, zscii: u16) -> Result<(), Fault> {
        self.stream.write_char(&mut self.console, &mut self.state.memory, zscii)
    }

    /// Decode and print the Z-string at `addr`; returns the end address.
    fn print_text(&mut self, addr: Address) -> Result<Address, Fault> {
        let (chars, end) = self.text.decode_string(&self.state.memory, addr)?;
        for ch in chars {
            self.write_zscii(ch)?;
        }
        Ok(end)
    }

    fn warn_unimplemented(&mut self, what: &str) {
        debug!(op = what, "unimplemented opcode");
        self.stream.warning(&mut self.console, what);
    }

    fn execute(&mut self, op: Op) -> Result<(), Fault> {
        let argv = self.args;
        match op {
            Op::Illegal => Err(Fault::IllegalOp),

            // Zero-operand instructions.
            Op::Rtrue => self.sub_ret(1, None),
            Op::Rfalse => self.sub_ret(0, None),
            Op::Print => {
                let end = self.print_text(self.state.pc())?;
                self.state.jump(end);
                Ok(())
            }
            Op::PrintRet => {
                let end = self.print_text(self.state.pc())?;
                self.state.jump(end);
                self.write_zscii(u16::from(b'\n'))?;
                self.sub_ret(1, None)
            }
            Op::Nop => Ok(()),
            Op::SaveBranch => self.op_save_branch(),
            Op::SaveStore => self.op_save_store(),
            Op::RestoreBranch => self.op_restore_branch(),
            Op::RestoreStore => self.op_restore_store(),
            Op::Restart => self.reset(false).map(|_| ()),
            Op::RetPopped => {
                let value = self.state.pop()?;
                self.sub_ret(value, None)
            }
            Op::Pop => self.state.pop().map(|_| ()),
            Op::Catch => {
                let fp = self.state.frame_ptr() as u16;
                self.store_result(fp)
            }
            Op::Quit => {
                self.state.quit();
                Ok(())
            }
            Op::NewLine => self.write_zscii(u16::from(b'\n')),
            Op::ShowStatus => self.show_status(),
            Op::Verify => {
                let ok = self.story.is_checksum_valid();
                self.branch(ok)
            }
            Op::Piracy => self.branch(true),

            // One-operand instructions.
            Op::Jz => {
                let cond = self.uarg(0) == 0;
                self.branch(cond)
            }
            Op::GetSibling => {
                let obj = self.object.sibling(&self.state.memory, self.uarg(0))?;
                self.store_result(obj)?;
                self.branch(obj != 0)
            }
            Op::GetChild => {
                let obj = self.object.child(&self.state.memory, self.uarg(0))?;
                self.store_result(obj)?;
                self.branch(obj != 0)
            }
            Op::GetParent => {
                let obj = self.object.parent(&self.state.memory, self.uarg(0))?;
                self.store_result(obj)
            }
            Op::GetPropLen => {
                let len = self.object.prop_len(&self.state.memory, self.uarg(0))?;
                self.store_result(len)
            }
            Op::Inc => self.op_step(1),
            Op::Dec => self.op_step(-1),
            Op::PrintAddr => self.print_text(Address::from(self.uarg(0))).map(|_| ()),
            Op::Call1s => self.sub_call(0, self.uarg(0), &[]),
            Op::RemoveObj => {
                let obj = self.uarg(0);
                self.object.remove(&mut self.state.memory, obj)
            }
            Op::PrintObj => {
                let name = self.object.name(&self.state.memory, self.uarg(0))?;
                self.print_text(name).map(|_| ())
            }
            Op::Ret => self.sub_ret(self.uarg(0), None),
            Op::Jump => {
                self.state.branch(i32::from(self.sarg(0)) - 2);
                Ok(())
            }
            Op::PrintPaddr => {
                let addr = self.header.unpack_addr(self.uarg(0), false);
                self.print_text(addr).map(|_| ())
            }
            Op::Load => {
                let value = self.state.var_read(self.uarg(0) as u8, true)?;
                self.store_result(value)
            }
            Op::Not => {
                let value = !self.uarg(0);
                self.store_result(value)
            }
            Op::Call1n => self.sub_call(1, self.uarg(0), &[]),

            // Two-operand instructions.
            Op::Je => self.op_je(),
            Op::Jl => {
                let cond = self.sarg(0) < self.sarg(1);
                self.branch(cond)
            }
            Op::Jg => {
                let cond = self.sarg(0) > self.sarg(1);
                self.branch(cond)
            }
            Op::DecChk => self.op_step_check(-1),
            Op::IncChk => self.op_step_check(1),
            Op::Jin => {
                let cond = self.object.parent(&self.state.memory, self.uarg(0))? == self.uarg(1);
                self.branch(cond)
            }
            Op::Test => {
                let cond = self.uarg(0) & self.uarg(1) == self.uarg(1);
                self.branch(cond)
            }
            Op::Or => {
                let value = self.uarg(0) | self.uarg(1);
                self.store_result(value)
            }
            Op::And => {
                let value = self.uarg(0) & self.uarg(1);
                self.store_result(value)
            }
            Op::TestAttr => {
                let cond = self.object.attr(&self.state.memory, self.uarg(0), self.uarg(1))?;
                self.branch(cond)
            }
            Op::SetAttr => {
                let (obj, attr) = (self.uarg(0), self.uarg(1));
                self.object.set_attr(&mut self.state.memory, obj, attr, true)
            }
            Op::ClearAttr => {
                let (obj, attr) = (self.uarg(0), self.uarg(1));
                self.object.set_attr(&mut self.state.memory, obj, attr, false)
            }
            Op::Store => self.state.var_write(self.uarg(0) as u8, self.uarg(1), true),
            Op::InsertObj => {
                let (obj, parent) = (self.uarg(0), self.uarg(1));
                self.object.insert(&mut self.state.memory, obj, parent)
            }
            Op::Loadw => {
                let addr = Address::from(self.uarg(0)) + 2 * Address::from(self.uarg(1));
                let value = self.state.memory.read16(addr)?;
                self.store_result(value)
            }
            Op::Loadb => {
                let addr = Address::from(self.uarg(0)) + Address::from(self.uarg(1));
                let value = u16::from(self.state.memory.read8(addr)?);
                self.store_result(value)
            }
            Op::GetProp => {
                let value = self.object.prop(&self.state.memory, self.uarg(0), self.uarg(1))?;
                self.store_result(value)
            }
            Op::GetPropAddr => {
                let addr = self.object.prop_addr(&self.state.memory, self.uarg(0), self.uarg(1))?;
                self.store_result(addr)
            }
            Op::GetNextProp => {
                let next = self.object.prop_next(&self.state.memory, self.uarg(0), self.uarg(1))?;
                self.store_result(next)
            }
            Op::Add => {
                let value = self.sarg(0).wrapping_add(self.sarg(1));
                self.store_result(value as u16)
            }
            Op::Sub => {
                let value = self.sarg(0).wrapping_sub(self.sarg(1));
                self.store_result(value as u16)
            }
            Op::Mul => {
                let value = self.sarg(0).wrapping_mul(self.sarg(1));
                self.store_result(value as u16)
            }
            Op::Div => {
                if self.sarg(1) == 0 {
                    return Err(Fault::DivByZero);
                }
                let value = self.sarg(0).wrapping_div(self.sarg(1));
                self.store_result(value as u16)
            }
            Op::Mod => {
                if self.sarg(1) == 0 {
                    return Err(Fault::DivByZero);
                }
                let value = self.sarg(0).wrapping_rem(self.sarg(1));
                self.store_result(value as u16)
            }
            Op::Call2s => self.sub_call(0, argv[0], &argv[1..self.num_arg.max(1)]),
            Op::Call2n => self.sub_call(1, argv[0], &argv[1..self.num_arg.max(1)]),
            Op::SetColour => {
                let (fg, bg) = (self.sarg(0), self.sarg(1));
                self.stream.set_colours(&mut self.console, fg, bg);
                Ok(())
            }
            Op::Throw => {
                let frame = usize::from(self.uarg(1));
                self.sub_ret(self.uarg(0), Some(frame))
            }

            // Variable-operand instructions.
            Op::CallVs | Op::CallVs2 => self.op_call_var(0),
            Op::CallVn | Op::CallVn2 => self.op_call_var(1),
            Op::Storew => {
                let addr = Address::from(self.uarg(0)) + 2 * Address::from(self.uarg(1));
                self.state.memory.write16(addr, self.uarg(2))
            }
            Op::Storeb => {
                let addr = Address::from(self.uarg(0)) + Address::from(self.uarg(1));
                self.state.memory.write8(addr, self.uarg(2) as u8)
            }
            Op::PutProp => {
                let (obj, prop, value) = (self.uarg(0), self.uarg(1), self.uarg(2));
                self.object.set_prop(&mut self.state.memory, obj, prop, value)
            }
            Op::Sread => self.op_sread(),
            Op::Aread => self.op_aread(),
            Op::PrintChar => self.write_zscii(self.uarg(0)),
            Op::PrintNum => {
                let value = self.sarg(0);
                self.stream.write_number(&mut self.console, &mut self.state.memory, value)
            }
            Op::Random => {
                let value = self.state.random_op(self.sarg(0));
                self.store_result(value)
            }
            Op::Push => self.state.push(self.uarg(0)),
            Op::Pull => self.op_pull(),
            Op::SplitWindow => {
                let upper = self.uarg(0);
                self.screen.split_window(&mut self.console, upper);
                Ok(())
            }
            Op::SetWindow => {
                let window = self.uarg(0);
                self.screen.select_window(&mut self.console, &mut self.stream, window)
            }
            Op::EraseWindow => {
                let window = self.sarg(0);
                self.screen.erase_window(&mut self.console, &mut self.stream, window)
            }
            Op::EraseLine => self.op_erase_line(),
            Op::SetCursor => self.op_set_cursor(),
            Op::GetCursor => self.op_get_cursor(),
            Op::SetTextStyle => {
                let style = self.uarg(0);
                self.stream.set_text_style(&mut self.console, style);
                Ok(())
            }
            Op::BufferMode => {
                let enable = self.uarg(0) != 0;
                self.stream.set_buffering(&mut self.console, enable);
                Ok(())
            }
            Op::OutputStream => self.op_output_stream(),
            Op::InputStream => Err(Fault::UnimplementedOp),
            Op::SoundEffect => {
                self.warn_unimplemented("sound_effect unimplemented");
                Ok(())
            }
            Op::ReadChar => self.op_read_char(),
            Op::ScanTable => self.op_scan_table(),
            Op::Tokenise => self.op_tokenise(),
            Op::EncodeText => self.op_encode_text(),
            Op::CopyTable => self.op_copy_table(),
            Op::PrintTable => self.op_print_table(),
            Op::CheckArgCount => {
                let cond = self.uarg(0) <= self.state.num_frame_args()?;
                self.branch(cond)
            }

            // Extended instructions.
            Op::SaveTable => self.op_save_table(),
            Op::RestoreTable => self.op_restore_table(),
            Op::LogShift => self.op_log_shift(),
            Op::ArtShift => self.op_art_shift(),
            Op::SetFont => {
                let font = self.uarg(0);
                let ok = self.stream.set_font(&mut self.console, font);
                self.store_result(u16::from(ok))
            }
            Op::SaveUndo => self.op_save_undo(),
            Op::RestoreUndo => self.op_restore_undo(),
            Op::PrintUnicode => self.op_print_unicode(),
            Op::CheckUnicode => self.op_check_unicode(),
            Op::DrawPicture => {
                self.warn_unimplemented("draw_picture unimplemented");
                Ok(())
            }
            Op::PictureData => self.op_picture_data(),
            Op::ErasePicture => {
                self.warn_unimplemented("erase_picture unimplemented");
                Ok(())
            }
            Op::SetMargins => {
                self.warn_unimplemented("set_margins unimplemented");
                Ok(())
            }
            Op::MoveWindow => {
                self.screen.move_window(self.uarg(0), self.uarg(1), self.uarg(2));
                Ok(())
            }
            Op::WindowSize => {
                self.screen.resize_window(self.uarg(0), self.uarg(1), self.uarg(2));
                Ok(())
            }
            Op::WindowStyle => {
                self.screen.set_window_style(self.uarg(0), self.uarg(1), self.uarg(2));
                Ok(())
            }
            Op::GetWindProp => {
                let value = self.screen.window_prop(self.uarg(0), self.uarg(1));
                self.store_result(value)
            }
            Op::ScrollWindow => Ok(()),
            Op::PopStack => self.op_pop_stack(),
            Op::ReadMouse => self.op_read_mouse(),
            Op::MouseWindow => {
                self.warn_unimplemented("mouse_window unimplemented");
                Ok(())
            }
            Op::PushStack => self.op_push_stack(),
            Op::PutWindProp => {
                self.screen.set_window_prop(self.uarg(0), self.uarg(1), self.uarg(2));
                Ok(())
            }
            Op::PrintForm => self.op_print_form(),
            Op::MakeMenu => {
                self.warn_unimplemented("make_menu unimplemented");
                self.branch(false)
            }
            Op::PictureTable => {
                self.warn_unimplemented("picture_table unimplemented");
                Ok(())
            }
        }
    }
}

const fn long_type(opcode: u8, bit: u8) -> OperandType {
    if opcode & (1 << bit) != 0 {
        OperandType::Variable
    } else {
        OperandType::SmallConst
    }
}
