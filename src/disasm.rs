//! One-line instruction disassembly for traces and fault reports

use std::fmt::Write;

use crate::error::Fault;
use crate::machine::{DispatchTables, Op};
use crate::memory::{Address, Memory};

/// Stateless disassembler sharing the interpreter's dispatch tables, so a
/// trace always shows the mnemonic the executor would run.
#[derive(Debug, Clone)]
pub struct Disassembler {
    tables: DispatchTables,
}

impl Disassembler {
    /// Build the disassembler for a story version.
    pub fn new(version: u8) -> Self {
        Self {
            tables: DispatchTables::new(version),
        }
    }

    /// Render the instruction at `addr` as `ADDR: mnemonic operands`.
    ///
    /// Undecodable bytes render as `???` rather than failing; the caller
    /// may be reporting a bad-PC fault in the first place.
    pub fn line(&self, memory: &Memory, addr: Address) -> String {
        let mut text = format!("{addr:06X}: ");
        match self.decode(memory, addr) {
            Ok(body) => text.push_str(&body),
            Err(_) => text.push_str("???"),
        }
        text
    }

    fn decode(&self, memory: &Memory, mut addr: Address) -> Result<String, Fault> {
        let opcode = memory.read8(addr)?;
        addr += 1;

        let mut operands = String::new();
        let op = match opcode {
            0x00..=0x7F => {
                let addr = self.long_operand(memory, addr, opcode & 0x40 != 0, &mut operands)?;
                self.long_operand(memory, addr, opcode & 0x20 != 0, &mut operands)?;
                self.tables.op2[usize::from(opcode & 0x1F)]
            }
            0x80..=0xAF => {
                let kind = match (opcode >> 4) & 3 {
                    0 => OperandKind::Large,
                    1 => OperandKind::Small,
                    _ => OperandKind::Variable,
                };
                self.operand(memory, addr, kind, &mut operands)?;
                self.tables.op1[usize::from(opcode & 0xF)]
            }
            0xBE => {
                let ext = memory.read8(addr)?;
                self.var_operands(memory, addr + 1, 4, &mut operands)?;
                self.tables.ope[usize::from(ext & 0x1F)]
            }
            0xB0..=0xBF => self.tables.op0[usize::from(opcode & 0xF)],
            0xC0..=0xDF => {
                self.var_operands(memory, addr, 4, &mut operands)?;
                self.tables.op2[usize::from(opcode & 0x1F)]
            }
            _ => {
                let max = if opcode == 0xEC || opcode == 0xFA { 8 } else { 4 };
                self.var_operands(memory, addr, max, &mut operands)?;
                self.tables.opv[usize::from(opcode & 0x1F)]
            }
        };

        let mut body = op.to_string();
        if !operands.is_empty() {
            body.push(' ');
            body.push_str(&operands);
        }
        Ok(body)
    }

    fn long_operand(&self, memory: &Memory, addr: Address, variable: bool, out: &mut String) -> Result<Address, Fault> {
        let kind = if variable { OperandKind::Variable } else { OperandKind::Small };
        self.operand(memory, addr, kind, out)
    }

    fn var_operands(&self, memory: &Memory, mut addr: Address, max: usize, out: &mut String) -> Result<(), Fault> {
        let mut types = if max == 8 {
            memory.read16(addr)?
        } else {
            u16::from(memory.read8(addr)?) << 8
        };
        addr += if max == 8 { 2 } else { 1 };

        for _ in 0..max {
            let kind = match types >> 14 {
                0 => OperandKind::Large,
                1 => OperandKind::Small,
                2 => OperandKind::Variable,
                _ => return Ok(()),
            };
            addr = self.operand(memory, addr, kind, out)?;
            types <<= 2;
        }
        Ok(())
    }

    fn operand(&self, memory: &Memory, addr: Address, kind: OperandKind, out: &mut String) -> Result<Address, Fault> {
        if !out.is_empty() {
            out.push(',');
        }
        match kind {
            OperandKind::Large => {
                let _ = write!(out, "#{:04X}", memory.read16(addr)?);
                Ok(addr + 2)
            }
            OperandKind::Small => {
                let _ = write!(out, "#{:02X}", memory.read8(addr)?);
                Ok(addr + 1)
            }
            OperandKind::Variable => {
                match memory.read8(addr)? {
                    0 => out.push_str("sp"),
                    var @ 1..=15 => {
                        let _ = write!(out, "l{var}");
                    }
                    var => {
                        let _ = write!(out, "g{}", var - 16);
                    }
                }
                Ok(addr + 1)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum OperandKind {
    Large,
    Small,
    Variable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with(bytes: &[u8]) -> Memory {
        let mut memory = Memory::new();
        memory.resize(64);
        memory.load(0, bytes).unwrap();
        memory
    }

    #[test]
    fn renders_a_long_form_instruction() {
        let dis = Disassembler::new(3);
        // je #05,#01 with a branch byte after.
        let memory = memory_with(&[0x01, 0x05, 0x01, 0x40]);
        assert_eq!(dis.line(&memory, 0), "000000: je #05,#01");
    }

    #[test]
    fn renders_variable_operands() {
        let dis = Disassembler::new(3);
        // call_vs (0xE0), types: large, variable, omitted...
        let memory = memory_with(&[0xE0, 0b0010_1111, 0x12, 0x34, 0x00]);
        assert_eq!(dis.line(&memory, 0), "000000: call_vs #1234,sp");
    }

    #[test]
    fn renders_variables_by_class() {
        let dis = Disassembler::new(5);
        // inc with a variable-form operand naming global 2.
        let memory = memory_with(&[0xA5, 0x12]);
        assert_eq!(dis.line(&memory, 0), "000000: inc g2");
    }

    #[test]
    fn bad_addresses_do_not_panic() {
        let dis = Disassembler::new(3);
        let memory = memory_with(&[0x01]);
        assert_eq!(dis.line(&memory, 0x100), "000100: ???");
    }
}
