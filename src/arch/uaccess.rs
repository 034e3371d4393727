//! User buffers read straight through the active address space.

use crate::error::SysResult;
use crate::syscalls::{user_range, UserMemory};

/// The program window of whichever process's directory is live.
///
/// The window is one present region, so a range that passes
/// [`user_range`] never faults.
pub struct ActiveUserSpace;

impl UserMemory for ActiveUserSpace {
    fn bytes(&self, addr: u64, len: usize) -> SysResult<&[u8]> {
        if len == 0 {
            return Ok(&[]);
        }
        user_range(addr, len)?;
        Ok(unsafe { core::slice::from_raw_parts(addr as *const u8, len) })
    }

    fn bytes_mut(&mut self, addr: u64, len: usize) -> SysResult<&mut [u8]> {
        if len == 0 {
            return Ok(&mut []);
        }
        user_range(addr, len)?;
        Ok(unsafe { core::slice::from_raw_parts_mut(addr as *mut u8, len) })
    }
}
