//! The `int 0x80` system call surface.

pub mod dispatcher;
pub mod numbers;
mod uaccess;

pub use dispatcher::{dispatch, SyscallContext, SyscallOutcome};
pub use numbers::SyscallNumber;
pub use uaccess::{user_range, UserMemory};

/// Vector of the system call gate; callable from ring 3.
pub const SYSCALL_VECTOR: u8 = 0x80;
