//! Save, restore, undo and auxiliary-file operations

use std::fs;
use std::path::PathBuf;

use crate::console::Console;
use crate::error::Fault;
use crate::machine::Machine;
use crate::memory::Address;

impl<C: Console> Machine<C> {
    /// Save through the Quetzal codec, reporting failures at INFO level.
    fn do_save(&mut self) -> bool {
        match self.state.save(&self.story) {
            Ok(()) => true,
            Err(err) => {
                let text = err.to_string();
                self.stream.info(&mut self.console, &text);
                false
            }
        }
    }

    /// `save ?(label)` (v1-3).
    ///
    /// The state is captured with the PC at the branch operand, so a later
    /// restore resumes by taking this branch as a success.
    pub(super) fn op_save_branch(&mut self) -> Result<(), Fault> {
        let ok = self.do_save();
        self.branch(ok)
    }

    /// `save -> (result)` (v4).
    ///
    /// The result variable is primed with 2 before the snapshot is taken;
    /// a restore therefore wakes up reporting 2 where the save reported 1.
    pub(super) fn op_save_store(&mut self) -> Result<(), Fault> {
        let var = self.state.fetch8()?;
        self.state.var_write(var, 2, false)?;
        let ok = self.do_save();
        self.state.var_write(var, u16::from(ok), false)
    }

    /// `restore ?(label)` (v1-3).
    pub(super) fn op_restore_branch(&mut self) -> Result<(), Fault> {
        let ok = self.reset(true)?;
        self.branch(ok)
    }

    /// `restore -> (result)` (v4): stores only on failure, since success
    /// never returns here.
    pub(super) fn op_restore_store(&mut self) -> Result<(), Fault> {
        if !self.reset(true)? {
            self.store_result(0)?;
        }
        Ok(())
    }

    /// `save_undo -> (result)`.
    pub(super) fn op_save_undo(&mut self) -> Result<(), Fault> {
        let var = self.state.fetch8()?;
        self.state.var_write(var, 2, false)?;
        let ok = self.state.save_undo(&self.story)?;
        self.state.var_write(var, u16::from(ok), false)
    }

    /// `restore_undo -> (result)`.
    pub(super) fn op_restore_undo(&mut self) -> Result<(), Fault> {
        if !self.state.restore_undo(&self.story)? {
            self.store_result(0)?;
        }
        Ok(())
    }

    /// `save table bytes name` (EXT:0 with operands): dump a memory region
    /// to an auxiliary file. Without operands this is a full save.
    pub(super) fn op_save_table(&mut self) -> Result<(), Fault> {
        let var = self.state.fetch8()?;

        let ok = if self.num_arg == 3 {
            let table = Address::from(self.uarg(0));
            let bytes = self.uarg(1);
            let name = self.uarg(2);

            let mut data = Vec::with_capacity(usize::from(bytes));
            for i in 0..Address::from(bytes) {
                data.push(self.state.memory.read8(table + i)?);
            }
            let path = self.aux_filename(name)?;
            fs::write(path, data).is_ok()
        } else {
            self.state.var_write(var, 2, false)?;
            self.do_save()
        };

        self.state.var_write(var, u16::from(ok), false)
    }

    /// `restore table bytes name` (EXT:1 with operands): read an auxiliary
    /// file back into memory. Without operands this is a full restore.
    pub(super) fn op_restore_table(&mut self) -> Result<(), Fault> {
        if self.num_arg == 3 {
            let table = Address::from(self.uarg(0));
            let size = self.uarg(1);
            let name = self.uarg(2);

            let mut loaded: u16 = 0;
            let path = self.aux_filename(name)?;
            if let Ok(data) = fs::read(path) {
                for byte in data.iter().take(usize::from(size)) {
                    self.state.memory.write8(table + Address::from(loaded), *byte)?;
                    loaded += 1;
                }
            }
            self.store_result(loaded)
        } else if !self.reset(true)? {
            self.store_result(0)
        } else {
            Ok(())
        }
    }

    /// Build an auxiliary-file path from the length-prefixed name in
    /// memory: uppercased, defaulting to an `.AUX` extension, under the
    /// save directory.
    fn aux_filename(&mut self, name: u16) -> Result<PathBuf, Fault> {
        let name = Address::from(name);
        let len = self.state.memory.read8(name)?;
        let mut filename = String::with_capacity(usize::from(len) + 4);
        for i in 1..=Address::from(len) {
            filename.push(char::from(self.state.memory.read8(name + i)?).to_ascii_uppercase());
        }
        if !filename.contains('.') {
            filename.push_str(".AUX");
        }

        let _ = fs::create_dir_all(&self.options.save_dir);
        Ok(self.options.save_dir.join(filename))
    }
}
