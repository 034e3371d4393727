//! Checked access to the running process's memory.

use crate::config::{USER_WINDOW_END, USER_WINDOW_START};
use crate::error::{SysError, SysResult};

/// Fails unless `addr..addr + len` lies inside the program window.
pub fn user_range(addr: u64, len: usize) -> SysResult<()> {
    let end = addr.checked_add(len as u64).ok_or(SysError::InvalidArgument)?;
    if addr < USER_WINDOW_START || end > USER_WINDOW_END {
        return Err(SysError::InvalidArgument);
    }
    Ok(())
}

/// The caller's half of a system call: its buffers and strings.
///
/// Implementations validate with [`user_range`]; an empty range is always
/// accepted.
pub trait UserMemory {
    fn bytes(&self, addr: u64, len: usize) -> SysResult<&[u8]>;

    fn bytes_mut(&mut self, addr: u64, len: usize) -> SysResult<&mut [u8]>;

    /// A NUL-terminated string of at most `max` bytes including the
    /// terminator, returned without it.
    fn c_str(&self, addr: u64, max: usize) -> SysResult<&[u8]> {
        user_range(addr, 1)?;
        let available = (USER_WINDOW_END - addr).min(max as u64) as usize;
        let window = self.bytes(addr, available)?;
        let len = window.iter().position(|&b| b == 0).ok_or(SysError::InvalidArgument)?;
        Ok(&window[..len])
    }

    fn write_u64(&mut self, addr: u64, value: u64) -> SysResult<()> {
        self.bytes_mut(addr, 8)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeUser;

    #[test]
    fn test_user_range_bounds() {
        assert!(user_range(USER_WINDOW_START, 16).is_ok());
        assert!(user_range(USER_WINDOW_END - 8, 8).is_ok());
        assert!(user_range(USER_WINDOW_END - 4, 8).is_err());
        assert!(user_range(USER_WINDOW_START - 1, 2).is_err());
        assert!(user_range(u64::MAX - 1, 8).is_err());
    }

    #[test]
    fn test_c_str_needs_terminator() {
        let mut user = FakeUser::new();
        let at = USER_WINDOW_START + 0x100;
        user.put(at, b"shell\0junk");
        assert_eq!(user.c_str(at, 32), Ok(&b"shell"[..]));
        assert_eq!(user.c_str(at, 5), Err(SysError::InvalidArgument));
        assert_eq!(user.c_str(0, 32), Err(SysError::InvalidArgument));
    }
}
