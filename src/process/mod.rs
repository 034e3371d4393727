//! Process descriptors and the fixed-capacity table that owns them.

mod command;
mod table;

pub use command::Command;
pub use table::ProcessTable;

use core::fmt;

use arrayvec::ArrayVec;

use crate::config::{COMMAND_LEN, EXCEPTION_STATUS, MAX_PROCESSES, NAME_LEN};
use crate::fd::FdTable;
use crate::terminal::TerminalId;

/// Handle to an occupied process slot.
///
/// Only the process table mints these, so an index is always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u8);

impl Pid {
    /// The boot shell of terminal 0. Never freed.
    pub const ROOT: Pid = Pid(0);

    pub(crate) fn from_index(index: usize) -> Option<Pid> {
        (index < MAX_PROCESSES).then_some(Pid(index as u8))
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid{}", self.0)
    }
}

/// Saved kernel stack pointer of a suspended flow.
///
/// The registers themselves live on the process's kernel stack below `rsp`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    pub rsp: u64,
}

/// Which of the two saved contexts of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Saved by `execute`; resumed when the child halts.
    Execute,
    /// Saved by the scheduler on preemption.
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Code(u8),
    /// Killed by a CPU exception or by the operator.
    Exception,
}

impl ExitStatus {
    /// The value the parent's `execute` returns.
    pub fn widened(self) -> u32 {
        match self {
            ExitStatus::Code(code) => u32::from(code),
            ExitStatus::Exception => EXCEPTION_STATUS,
        }
    }
}

pub struct Process {
    pub pid: Pid,
    /// `None` for the root of a terminal.
    pub parent: Option<Pid>,
    pub terminal: TerminalId,
    /// Set while this is its terminal's process of record.
    pub active: bool,
    pub display_mapped: bool,
    pub exec_context: Context,
    pub tick_context: Context,
    pub name: ArrayVec<u8, NAME_LEN>,
    pub args: ArrayVec<u8, COMMAND_LEN>,
    pub fds: FdTable,
}

impl Process {
    pub fn new(pid: Pid, parent: Option<Pid>, terminal: TerminalId, command: &Command) -> Self {
        Self {
            pid,
            parent,
            terminal,
            active: true,
            display_mapped: false,
            exec_context: Context::default(),
            tick_context: Context::default(),
            name: command.name.clone(),
            args: command.args.clone(),
            fds: FdTable::new(terminal),
        }
    }

    pub fn context_mut(&mut self, boundary: Boundary) -> &mut Context {
        match boundary {
            Boundary::Execute => &mut self.exec_context,
            Boundary::Tick => &mut self.tick_context,
        }
    }

    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name).unwrap_or("?")
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name())
            .field("parent", &self.parent)
            .field("terminal", &self.terminal)
            .field("active", &self.active)
            .finish()
    }
}
