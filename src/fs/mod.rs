//! Read-only file store interface and the boot image implementation.

mod bootfs;

pub use bootfs::{BootFs, FsError, BLOCK_SIZE, MAX_DENTRIES};

use crate::config::NAME_LEN;
use crate::error::SysResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// The RTC device node.
    Device,
    Directory,
    Regular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dentry {
    name: [u8; NAME_LEN],
    pub kind: FileKind,
    pub inode: u32,
    /// Length in bytes; zero for anything but regular files.
    pub size: usize,
}

impl Dentry {
    pub fn new(name: &[u8], kind: FileKind, inode: u32, size: usize) -> Self {
        let mut padded = [0; NAME_LEN];
        let len = name.len().min(NAME_LEN);
        padded[..len].copy_from_slice(&name[..len]);
        Self { name: padded, kind, inode, size }
    }

    /// The name without NUL padding. A full-length name has no terminator.
    pub fn name(&self) -> &[u8] {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        &self.name[..len]
    }
}

pub trait FileStore {
    fn lookup(&self, name: &[u8]) -> Option<Dentry>;

    fn dentry_at(&self, index: usize) -> Option<Dentry>;

    /// Copies file bytes starting at `offset`; returns 0 at end of file.
    fn read(&self, inode: u32, offset: usize, buf: &mut [u8]) -> SysResult<usize>;
}
