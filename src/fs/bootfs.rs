//! Block image handed over by the bootloader as a ramdisk.
//!
//! ```text
//! block 0        boot block: dentry count, inode count N, data count D,
//!                52 reserved bytes, then 63 dentries of 64 bytes
//! block 1..=N    inodes: length, then data block numbers
//! block N+1..    D data blocks
//! ```
//!
//! All integers are little-endian `u32`.

use thiserror::Error;

use crate::config::NAME_LEN;
use crate::error::{SysError, SysResult};
use crate::fs::{Dentry, FileKind, FileStore};

pub const BLOCK_SIZE: usize = 4096;
pub const MAX_DENTRIES: usize = 63;
const DENTRY_SIZE: usize = 64;
const DENTRY_BASE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("image shorter than its boot block")]
    Truncated,
    #[error("image declares {0} dentries")]
    TooManyDentries(u32),
    #[error("image needs {needed} bytes but has {actual}")]
    BlocksOutOfRange { needed: usize, actual: usize },
    #[error("dentry {0} has unknown kind")]
    BadKind(usize),
}

fn le_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

pub struct BootFs<'a> {
    image: &'a [u8],
    dentries: usize,
    inodes: u32,
    data_blocks: u32,
}

impl<'a> BootFs<'a> {
    pub fn mount(image: &'a [u8]) -> Result<Self, FsError> {
        if image.len() < BLOCK_SIZE {
            return Err(FsError::Truncated);
        }
        let dentries = le_u32(image, 0).ok_or(FsError::Truncated)?;
        let inodes = le_u32(image, 4).ok_or(FsError::Truncated)?;
        let data_blocks = le_u32(image, 8).ok_or(FsError::Truncated)?;
        if dentries as usize > MAX_DENTRIES {
            return Err(FsError::TooManyDentries(dentries));
        }

        let needed = (1 + inodes as usize + data_blocks as usize) * BLOCK_SIZE;
        if image.len() < needed {
            return Err(FsError::BlocksOutOfRange { needed, actual: image.len() });
        }

        let fs = Self { image, dentries: dentries as usize, inodes, data_blocks };
        for index in 0..fs.dentries {
            if fs.raw_kind(index).is_none() {
                return Err(FsError::BadKind(index));
            }
        }
        log::info!(
            "bootfs: {} entries, {} inodes, {} data blocks",
            fs.dentries,
            inodes,
            data_blocks
        );
        Ok(fs)
    }

    fn dentry_offset(index: usize) -> usize {
        DENTRY_BASE + index * DENTRY_SIZE
    }

    fn raw_kind(&self, index: usize) -> Option<FileKind> {
        match le_u32(self.image, Self::dentry_offset(index) + NAME_LEN)? {
            0 => Some(FileKind::Device),
            1 => Some(FileKind::Directory),
            2 => Some(FileKind::Regular),
            _ => None,
        }
    }

    fn inode_offset(&self, inode: u32) -> Option<usize> {
        (inode < self.inodes).then(|| (1 + inode as usize) * BLOCK_SIZE)
    }

    fn file_len(&self, inode: u32) -> Option<usize> {
        le_u32(self.image, self.inode_offset(inode)?).map(|len| len as usize)
    }

    fn data_block(&self, inode: u32, nth: usize) -> SysResult<&'a [u8]> {
        let base = self.inode_offset(inode).ok_or(SysError::InvalidArgument)?;
        if 4 + (nth + 1) * 4 > BLOCK_SIZE {
            return Err(SysError::InvalidArgument);
        }
        let number = le_u32(self.image, base + 4 + nth * 4).ok_or(SysError::InvalidArgument)?;
        if number >= self.data_blocks {
            return Err(SysError::InvalidArgument);
        }
        let start = (1 + self.inodes as usize + number as usize) * BLOCK_SIZE;
        self.image.get(start..start + BLOCK_SIZE).ok_or(SysError::InvalidArgument)
    }
}

impl FileStore for BootFs<'_> {
    fn lookup(&self, name: &[u8]) -> Option<Dentry> {
        if name.is_empty() || name.len() > NAME_LEN {
            return None;
        }
        (0..self.dentries)
            .filter_map(|i| self.dentry_at(i))
            .find(|d| d.name() == name)
    }

    fn dentry_at(&self, index: usize) -> Option<Dentry> {
        if index >= self.dentries {
            return None;
        }
        let offset = Self::dentry_offset(index);
        let name = self.image.get(offset..offset + NAME_LEN)?;
        let kind = self.raw_kind(index)?;
        let inode = le_u32(self.image, offset + NAME_LEN + 4)?;
        let size = match kind {
            FileKind::Regular => self.file_len(inode)?,
            _ => 0,
        };
        Some(Dentry::new(name, kind, inode, size))
    }

    fn read(&self, inode: u32, offset: usize, buf: &mut [u8]) -> SysResult<usize> {
        let len = self.file_len(inode).ok_or(SysError::InvalidArgument)?;
        if offset >= len {
            return Ok(0);
        }
        let wanted = buf.len().min(len - offset);
        let mut copied = 0;
        while copied < wanted {
            let pos = offset + copied;
            let block = self.data_block(inode, pos / BLOCK_SIZE)?;
            let within = pos % BLOCK_SIZE;
            let n = (BLOCK_SIZE - within).min(wanted - copied);
            buf[copied..copied + n].copy_from_slice(&block[within..within + n]);
            copied += n;
        }
        Ok(copied)
    }
}
