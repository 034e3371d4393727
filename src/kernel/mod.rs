//! The process and scheduling core.
//!
//! ```text
//!            PIT ──▶ on_timer ──▶ schedule ─┐
//!       keyboard ──▶ on_key ──▶ switch ─────┤
//!   int 0x80 ──▶ dispatch ──▶ execute/halt ─┼──▶ Transfer ──▶ arch::switch
//!   CPU exception ──▶ fault ────────────────┘
//! ```
//!
//! Nothing here touches the CPU directly. Every entry point that may leave the
//! current flow returns a [`Transfer`] and the arch layer carries it out after
//! dropping the kernel lock.

mod exec;
mod fault;
mod input;
mod io;
mod sched;

pub use fault::FaultKind;

use crate::config::KernelConfig;
use crate::devices::rtc::RtcState;
use crate::error::{SysError, SysResult};
use crate::fs::FileStore;
use crate::hw::Hardware;
use crate::memory::AddressSpaces;
use crate::process::{Boundary, Context, Pid, Process, ProcessTable};
use crate::terminal::Terminals;

/// What the CPU should do once the kernel lock is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Return to whatever was interrupted.
    Continue,
    /// Start a freshly loaded image in user mode. With a `parent`, the
    /// caller's execute-boundary context has to be saved into that parent.
    EnterUser { pid: Pid, parent: Option<Pid>, entry: u64, user_stack: u64 },
    /// Finish the parent's pending `execute` with `status`.
    ReturnToParent { pid: Pid, context: Context, status: u32 },
    /// Resume a process the scheduler preempted earlier.
    Resume { pid: Pid, context: Context },
}

pub struct Kernel<H, F> {
    hw: H,
    fs: F,
    config: KernelConfig,
    procs: ProcessTable,
    spaces: AddressSpaces,
    terms: Terminals,
    rtc: RtcState,
    current: Option<Pid>,
    ticks: u64,
}

impl<H: Hardware, F: FileStore> Kernel<H, F> {
    /// `pool_base` is the 4 MiB aligned start of the frames backing the
    /// kernel region and the program images.
    pub fn new(hw: H, fs: F, config: KernelConfig, pool_base: u64) -> Self {
        Self {
            hw,
            fs,
            config,
            procs: ProcessTable::new(),
            spaces: AddressSpaces::new(pool_base),
            terms: Terminals::new(),
            rtc: RtcState::new(),
            current: None,
            ticks: 0,
        }
    }

    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.procs.get(pid)
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.procs
    }

    pub fn address_spaces(&self) -> &AddressSpaces {
        &self.spaces
    }

    pub fn terminals(&self) -> &Terminals {
        &self.terms
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Where the arch layer stores a context it saves itself.
    pub fn context_slot(&mut self, pid: Pid, boundary: Boundary) -> Option<&mut Context> {
        self.procs.get_mut(pid).map(|p| p.context_mut(boundary))
    }

    fn running(&self) -> SysResult<Pid> {
        self.current.ok_or(SysError::Fault)
    }
}
