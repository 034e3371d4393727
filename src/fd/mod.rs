//! Per-process descriptor table.
//!
//! Each slot carries exactly one capability. The kernel's I/O paths match on
//! it to reach the file store, the RTC or the terminal.

use crate::config::MAX_FDS;
use crate::error::{SysError, SysResult};
use crate::terminal::TerminalId;

pub const STDIN: usize = 0;
pub const STDOUT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    File { inode: u32 },
    Directory,
    Rtc,
    Terminal(TerminalId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    pub fn can_read(self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileDescriptor {
    pub capability: Capability,
    /// Byte offset for files, entry index for directories.
    pub position: usize,
    pub access: Access,
}

impl FileDescriptor {
    pub fn new(capability: Capability, access: Access) -> Self {
        Self { capability, position: 0, access }
    }
}

pub struct FdTable {
    slots: [Option<FileDescriptor>; MAX_FDS],
}

impl FdTable {
    /// A table with stdin and stdout bound to `terminal`.
    pub fn new(terminal: TerminalId) -> Self {
        let mut slots = [None; MAX_FDS];
        slots[STDIN] = Some(FileDescriptor::new(Capability::Terminal(terminal), Access::ReadOnly));
        slots[STDOUT] = Some(FileDescriptor::new(Capability::Terminal(terminal), Access::WriteOnly));
        Self { slots }
    }

    /// Places `fd` in the lowest free slot.
    pub fn install(&mut self, fd: FileDescriptor) -> SysResult<usize> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(SysError::ResourceExhausted)?;
        self.slots[index] = Some(fd);
        Ok(index)
    }

    pub fn get(&self, fd: usize) -> SysResult<&FileDescriptor> {
        self.slots.get(fd).and_then(Option::as_ref).ok_or(SysError::InvalidArgument)
    }

    pub fn get_mut(&mut self, fd: usize) -> SysResult<&mut FileDescriptor> {
        self.slots.get_mut(fd).and_then(Option::as_mut).ok_or(SysError::InvalidArgument)
    }

    /// Frees a slot on behalf of its owner. stdin and stdout stay bound.
    pub fn remove(&mut self, fd: usize) -> SysResult<FileDescriptor> {
        if fd == STDIN || fd == STDOUT {
            return Err(SysError::PermissionDenied);
        }
        self.slots.get_mut(fd).and_then(Option::take).ok_or(SysError::InvalidArgument)
    }

    /// Empties every slot, stdio included. Used at teardown.
    pub fn drain(&mut self) -> impl Iterator<Item = FileDescriptor> + '_ {
        self.slots.iter_mut().filter_map(Option::take)
    }

    pub fn any(&self, f: impl Fn(&FileDescriptor) -> bool) -> bool {
        self.slots.iter().flatten().any(f)
    }

    pub fn in_use(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}
