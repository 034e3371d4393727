use core::task::Poll;

use crate::config::COMMAND_LEN;
use crate::error::{SysError, SysResult};
use crate::fs::FileStore;
use crate::hw::Hardware;
use crate::kernel::{Kernel, Transfer};
use crate::process::ExitStatus;
use crate::syscalls::numbers::SyscallNumber;
use crate::syscalls::uaccess::UserMemory;

/// Registers of an `int 0x80` call.
#[derive(Debug, Clone, Copy)]
pub struct SyscallContext {
    pub number: usize,
    pub arg0: usize,
    pub arg1: usize,
    pub arg2: usize,
}

impl SyscallContext {
    /// Calling convention:
    ///   rax = number
    ///   rdi = arg0
    ///   rsi = arg1
    ///   rdx = arg2
    ///
    /// The result comes back in rax.
    pub fn from_registers(rax: u64, rdi: u64, rsi: u64, rdx: u64) -> Self {
        Self { number: rax as usize, arg0: rdi as usize, arg1: rsi as usize, arg2: rdx as usize }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallOutcome {
    /// Put this in the caller's rax and return to it.
    Return(isize),
    /// Nothing to hand out yet; wait for an interrupt and dispatch again.
    Block,
    /// The call left the caller's flow.
    Transfer(Transfer),
}

impl From<SysResult<usize>> for SyscallOutcome {
    fn from(result: SysResult<usize>) -> Self {
        match result {
            Ok(n) => Self::Return(n as isize),
            Err(err) => Self::Return(err.as_errno()),
        }
    }
}

impl From<SysResult<Transfer>> for SyscallOutcome {
    fn from(result: SysResult<Transfer>) -> Self {
        match result {
            Ok(transfer) => Self::Transfer(transfer),
            Err(err) => Self::Return(err.as_errno()),
        }
    }
}

/// Main syscall dispatcher
pub fn dispatch<H, F, U>(kernel: &mut Kernel<H, F>, ctx: SyscallContext, user: &mut U) -> SyscallOutcome
where
    H: Hardware,
    F: FileStore,
    U: UserMemory,
{
    let syscall = SyscallNumber::from(ctx.number);
    log::trace!("syscall {syscall:?}({:#x}, {:#x}, {:#x})", ctx.arg0, ctx.arg1, ctx.arg2);

    match syscall {
        SyscallNumber::Halt => kernel.halt(ExitStatus::Code(ctx.arg0 as u8)).into(),
        SyscallNumber::Execute => match user.c_str(ctx.arg0 as u64, COMMAND_LEN + 1) {
            Ok(line) => kernel.execute(line).into(),
            Err(err) => SyscallOutcome::Return(err.as_errno()),
        },

        SyscallNumber::Read => {
            let buf = match user.bytes_mut(ctx.arg1 as u64, ctx.arg2) {
                Ok(buf) => buf,
                Err(err) => return SyscallOutcome::Return(err.as_errno()),
            };
            match kernel.read(ctx.arg0, buf) {
                Poll::Ready(result) => result.into(),
                Poll::Pending => SyscallOutcome::Block,
            }
        }
        SyscallNumber::Write => user
            .bytes(ctx.arg1 as u64, ctx.arg2)
            .and_then(|buf| kernel.write(ctx.arg0, buf))
            .into(),
        SyscallNumber::Open => user
            .c_str(ctx.arg0 as u64, COMMAND_LEN + 1)
            .and_then(|name| kernel.open(name))
            .into(),
        SyscallNumber::Close => kernel.close(ctx.arg0).map(|()| 0usize).into(),

        SyscallNumber::GetArgs => user
            .bytes_mut(ctx.arg0 as u64, ctx.arg1)
            .and_then(|buf| kernel.getargs(buf))
            .map(|()| 0usize)
            .into(),
        SyscallNumber::Vidmap => {
            let out = ctx.arg0 as u64;
            kernel
                .vidmap(out)
                .and_then(|virt| user.write_u64(out, virt).map(|()| virt as usize))
                .into()
        }

        SyscallNumber::SetHandler => kernel.set_handler(ctx.arg0, ctx.arg1 as u64).map(|()| 0usize).into(),
        SyscallNumber::Sigreturn => kernel.sigreturn().map(|()| 0usize).into(),

        SyscallNumber::Unknown => {
            log::warn!("unknown syscall {}", ctx.number);
            SyscallOutcome::Return(SysError::InvalidArgument.as_errno())
        }
    }
}
