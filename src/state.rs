//! Mutable machine state: memory, stack, registers and snapshots

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::consts::{SAVE_FILE_EXT, VM_STACK_SIZE};
use crate::error::{Fault, VmError};
use crate::memory::{Address, Memory};
use crate::quetzal::Quetzal;
use crate::random::Random;
use crate::stack::Stack;
use crate::story::Story;

/// Everything that changes while a story runs.
///
/// The memory and stack are owned here and borrowed out to the components
/// that need them for the duration of one operation. Save, restore and the
/// undo ring snapshot the whole state through the Quetzal codec.
#[derive(Debug)]
pub struct State {
    /// VM memory.
    pub memory: Memory,
    /// VM stack.
    pub stack: Stack,
    /// Pseudo-random generator.
    pub random: Random,

    pc: Address,
    frame_ptr: usize,
    do_quit: bool,

    globals: Address,
    initial_seed: u32,
    save_dir: PathBuf,
    undo_limit: usize,
    undo: VecDeque<Quetzal>,
}

impl State {
    /// Create the state for a loaded story.
    pub fn new(story: &Story, save_dir: &Path, undo_limit: usize, initial_seed: u32) -> Self {
        let mut memory = Memory::new();
        story.prepare_memory(&mut memory);
        Self {
            memory,
            stack: Stack::new(VM_STACK_SIZE),
            random: Random::default(),
            pc: 0,
            frame_ptr: 0,
            do_quit: false,
            globals: Address::from(story.header().glob),
            initial_seed,
            save_dir: save_dir.to_path_buf(),
            undo_limit,
            undo: VecDeque::new(),
        }
    }

    /// Whether the program has requested to stop.
    pub const fn is_quit_requested(&self) -> bool {
        self.do_quit
    }

    /// Signal exit; the main loop stops at its next iteration.
    pub fn quit(&mut self) {
        self.do_quit = true;
    }

    /// Current program counter.
    pub const fn pc(&self) -> Address {
        self.pc
    }

    /// Current frame pointer.
    pub const fn frame_ptr(&self) -> usize {
        self.frame_ptr
    }

    /// Absolute jump.
    pub fn jump(&mut self, target: Address) {
        self.pc = target;
    }

    /// Relative jump.
    pub fn branch(&mut self, offset: i32) {
        self.pc = self.pc.wrapping_add(offset as Address);
    }

    /// Reset to the story's initial conditions.
    pub fn reset(&mut self, story: &Story) {
        self.do_quit = false;
        self.pc = story.entry_point();
        self.frame_ptr = 0;
        story.reset_memory(&mut self.memory);
        self.stack.clear();
        if self.initial_seed != 0 {
            self.random.predictable_seed(self.initial_seed);
        }
    }

    /// Fetch the instruction byte at the PC and advance it.
    pub fn fetch8(&mut self) -> Result<u8, Fault> {
        let byte = self.memory.fetch8(self.pc)?;
        self.pc += 1;
        Ok(byte)
    }

    /// Fetch an instruction word at the PC and advance it.
    pub fn fetch16(&mut self) -> Result<u16, Fault> {
        let word = self.memory.fetch16(self.pc)?;
        self.pc += 2;
        Ok(word)
    }

    /// Push a value onto the evaluation stack.
    pub fn push(&mut self, value: u16) -> Result<(), Fault> {
        self.stack.push16(value)
    }

    /// Pop a value from the evaluation stack.
    pub fn pop(&mut self) -> Result<u16, Fault> {
        self.stack.pop16()
    }

    /// Number of arguments the current frame was called with.
    pub fn num_frame_args(&self) -> Result<u16, Fault> {
        self.stack.read16(self.frame_ptr)
    }

    /// Push a call frame and jump to the routine.
    pub fn call(&mut self, call_type: u8, target: Address) -> Result<(), Fault> {
        self.stack.push8(call_type)?;
        self.stack.push24(self.pc)?;
        self.stack.push16(self.frame_ptr as u16)?;
        self.frame_ptr = self.stack.size();
        self.jump(target);
        Ok(())
    }

    /// Unwind to the given frame; returns the frame's call type.
    pub fn return_from_frame(&mut self, frame_ptr: usize) -> Result<u8, Fault> {
        self.stack.shrink(frame_ptr)?;
        self.frame_ptr = usize::from(self.stack.pop16()?);
        let return_pc = self.stack.pop24()?;
        self.jump(return_pc);
        self.stack.pop8()
    }

    /// Read variable `index`: 0 pops the stack (or peeks), 1..=15 reads a
    /// frame local, 16..=255 reads a global.
    pub fn var_read(&mut self, index: u8, peek: bool) -> Result<u16, Fault> {
        match index {
            0 => {
                if peek {
                    self.stack.peek16()
                } else {
                    self.pop()
                }
            }
            1..=15 => self.stack.read16(self.frame_ptr + 2 * usize::from(index)),
            _ => self.memory.read16(self.globals + (Address::from(index) - 16) * 2),
        }
    }

    /// Write variable `index`; with `peek`, variable 0 replaces the top of
    /// stack instead of pushing.
    pub fn var_write(&mut self, index: u8, value: u16, peek: bool) -> Result<(), Fault> {
        match index {
            0 => {
                if peek {
                    let top = self.stack.size().checked_sub(2).ok_or(Fault::StackEmpty)?;
                    self.stack.write16(top, value)
                } else {
                    self.push(value)
                }
            }
            1..=15 => self.stack.write16(self.frame_ptr + 2 * usize::from(index), value),
            _ => self.memory.write16(self.globals + (Address::from(index) - 16) * 2, value),
        }
    }

    /// The `random` opcode.
    pub fn random_op(&mut self, arg: i16) -> u16 {
        self.random.random_op(arg)
    }

    /// Path of the primary save file.
    pub fn save_path(&self, story: &Story) -> PathBuf {
        self.save_dir.join(format!("{}.{SAVE_FILE_EXT}", story.filename()))
    }

    fn snapshot(&mut self, story: &Story) -> Result<Quetzal, Fault> {
        // The frame pointer rides on the stack while encoded.
        self.stack.push16(self.frame_ptr as u16)?;
        let quetzal = Quetzal::encode(story, &self.memory, &self.stack, &self.random, self.pc);
        self.stack.pop16()?;
        Ok(quetzal)
    }

    fn apply(&mut self, story: &Story, quetzal: &Quetzal) -> Result<(), VmError> {
        let pc = quetzal.decode(story, &mut self.memory, &mut self.stack, &mut self.random)?;
        self.jump(pc);
        self.frame_ptr = usize::from(self.stack.pop16()?);
        Ok(())
    }

    /// Save the live state to the save directory.
    pub fn save(&mut self, story: &Story) -> Result<(), VmError> {
        let quetzal = self.snapshot(story)?;
        fs::create_dir_all(&self.save_dir)?;
        let path = self.save_path(story);
        quetzal.write_to(&path)?;
        info!(path = %path.display(), "state saved");
        Ok(())
    }

    /// Restore the state from the save directory.
    pub fn restore(&mut self, story: &Story) -> Result<(), VmError> {
        let path = self.save_path(story);
        let quetzal = Quetzal::read_from(&path)?;
        self.apply(story, &quetzal)?;
        info!(path = %path.display(), "state restored");
        Ok(())
    }

    /// Push the live state onto the undo ring.
    pub fn save_undo(&mut self, story: &Story) -> Result<bool, Fault> {
        if self.undo_limit == 0 {
            return Ok(false);
        }
        let quetzal = self.snapshot(story)?;
        if self.undo.len() == self.undo_limit {
            self.undo.pop_front();
        }
        self.undo.push_back(quetzal);
        debug!(depth = self.undo.len(), "undo snapshot");
        Ok(true)
    }

    /// Pop the newest undo snapshot back into the live state.
    pub fn restore_undo(&mut self, story: &Story) -> Result<bool, Fault> {
        let Some(quetzal) = self.undo.pop_back() else {
            return Ok(false);
        };
        self.apply(story, &quetzal).map_err(|_| Fault::BadConfig)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};

    use crate::header::offset;

    fn story() -> Story {
        let mut image = vec![0u8; 0x800];
        image[offset::VERSION as usize] = 3;
        BigEndian::write_u16(&mut image[offset::HIMEM as usize..], 0x0400);
        BigEndian::write_u16(&mut image[offset::INIT_PC as usize..], 0x0500);
        BigEndian::write_u16(&mut image[offset::STAT as usize..], 0x0200);
        BigEndian::write_u16(&mut image[offset::GLOB as usize..], 0x0100);
        BigEndian::write_u16(&mut image[offset::LENGTH as usize..], 0x0400);
        let sum = crate::story::checksum(&image);
        BigEndian::write_u16(&mut image[offset::CHECKSUM as usize..], sum);
        Story::from_bytes(image, "state-test".into()).unwrap()
    }

    fn state(story: &Story) -> State {
        let mut state = State::new(story, Path::new("Saves"), 4, 0);
        state.reset(story);
        state
    }

    #[test]
    fn call_and_return_balance_the_stack() {
        let story = story();
        let mut state = state(&story);
        state.push(0xAAAA).unwrap();
        let depth = state.stack.size();

        state.call(1, 0x0600).unwrap();
        assert_eq!(state.pc(), 0x0600);
        state.stack.push16(0).unwrap(); // num-args
        state.stack.push16(7).unwrap(); // one local
        assert_eq!(state.var_read(1, false).unwrap(), 7);

        let call_type = state.return_from_frame(state.frame_ptr()).unwrap();
        assert_eq!(call_type, 1);
        assert_eq!(state.pc(), 0x0500);
        assert_eq!(state.stack.size(), depth);
        assert_eq!(state.pop().unwrap(), 0xAAAA);
    }

    #[test]
    fn empty_frame_unwind_pops_eight_bytes() {
        let story = story();
        let mut state = state(&story);
        state.call(0, 0x0600).unwrap();
        state.stack.push16(0).unwrap(); // num-args
        assert_eq!(state.stack.size(), 8);
        state.return_from_frame(state.frame_ptr()).unwrap();
        assert_eq!(state.stack.size(), 0);
    }

    #[test]
    fn variables_route_to_stack_locals_and_globals() {
        let story = story();
        let mut state = state(&story);

        state.var_write(0, 0x1111, false).unwrap();
        assert_eq!(state.var_read(0, true).unwrap(), 0x1111);
        state.var_write(0, 0x2222, true).unwrap();
        assert_eq!(state.var_read(0, false).unwrap(), 0x2222);

        state.var_write(16, 0x3333, false).unwrap();
        assert_eq!(state.memory.read16(0x100).unwrap(), 0x3333);
        assert_eq!(state.var_read(16, false).unwrap(), 0x3333);

        state.call(0, 0x0600).unwrap();
        state.stack.push16(1).unwrap();
        state.stack.push16(0).unwrap();
        state.var_write(1, 0x4444, false).unwrap();
        assert_eq!(state.var_read(1, false).unwrap(), 0x4444);
    }

    #[test]
    fn undo_ring_rolls_back_state() {
        let story = story();
        let mut state = state(&story);
        state.var_write(16, 1, false).unwrap();
        assert!(state.save_undo(&story).unwrap());
        state.var_write(16, 2, false).unwrap();
        assert!(state.save_undo(&story).unwrap());
        state.var_write(16, 3, false).unwrap();

        assert!(state.restore_undo(&story).unwrap());
        assert_eq!(state.var_read(16, false).unwrap(), 2);
        assert!(state.restore_undo(&story).unwrap());
        assert_eq!(state.var_read(16, false).unwrap(), 1);
        assert!(!state.restore_undo(&story).unwrap());
    }

    #[test]
    fn undo_ring_discards_the_oldest_snapshot() {
        let story = story();
        let mut state = State::new(&story, Path::new("Saves"), 2, 0);
        state.reset(&story);
        for value in 1..=3u16 {
            state.var_write(16, value, false).unwrap();
            assert!(state.save_undo(&story).unwrap());
        }
        assert!(state.restore_undo(&story).unwrap());
        assert_eq!(state.var_read(16, false).unwrap(), 3);
        assert!(state.restore_undo(&story).unwrap());
        assert_eq!(state.var_read(16, false).unwrap(), 2);
        assert!(!state.restore_undo(&story).unwrap());
    }

    #[test]
    fn save_and_restore_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let story = story();
        let mut state = State::new(&story, dir.path(), 4, 0);
        state.reset(&story);

        state.var_write(16, 0xCAFE, false).unwrap();
        state.push(0x0042).unwrap();
        state.random.predictable_seed(1234);
        state.jump(0x0777);
        state.save(&story).unwrap();

        let mut restored = State::new(&story, dir.path(), 4, 0);
        restored.reset(&story);
        restored.restore(&story).unwrap();

        assert_eq!(restored.pc(), 0x0777);
        assert_eq!(restored.frame_ptr(), state.frame_ptr());
        assert_eq!(restored.var_read(16, false).unwrap(), 0xCAFE);
        assert_eq!(restored.pop().unwrap(), 0x0042);
        assert_eq!(restored.random.state(), state.random.state());
    }
}
