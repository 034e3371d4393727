use core::ops::{Index, IndexMut};

use crate::config::MAX_PROCESSES;
use crate::error::{SysError, SysResult};
use crate::process::{Pid, Process};

/// Fixed registry of process slots. Slot 0 belongs to the terminal-0 root.
pub struct ProcessTable {
    slots: [Option<Process>; MAX_PROCESSES],
}

impl ProcessTable {
    pub fn new() -> Self {
        Self { slots: core::array::from_fn(|_| None) }
    }

    /// Fills the first free slot after the root with `build(pid)`.
    pub fn allocate(&mut self, build: impl FnOnce(Pid) -> Process) -> SysResult<Pid> {
        let index = (1..MAX_PROCESSES)
            .find(|&i| self.slots[i].is_none())
            .ok_or(SysError::ResourceExhausted)?;
        let pid = Pid::from_index(index).ok_or(SysError::ResourceExhausted)?;
        self.slots[index] = Some(build(pid));
        Ok(pid)
    }

    /// (Re)initializes slot 0, replacing whatever it held.
    pub fn claim_root(&mut self, build: impl FnOnce(Pid) -> Process) -> Pid {
        self.slots[Pid::ROOT.index()] = Some(build(Pid::ROOT));
        Pid::ROOT
    }

    /// Returns the slot to the pool. The root slot is never freed.
    pub fn free(&mut self, pid: Pid) -> Option<Process> {
        if pid == Pid::ROOT {
            log::warn!("refusing to free the root slot");
            return None;
        }
        self.slots[pid.index()].take()
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots[1..].iter().any(Option::is_none)
    }

    pub fn occupancy(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.slots[pid.index()].as_ref()
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.slots[pid.index()].as_mut()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Indexing with a stale handle is an invariant violation and panics.
impl Index<Pid> for ProcessTable {
    type Output = Process;

    fn index(&self, pid: Pid) -> &Process {
        match &self.slots[pid.index()] {
            Some(process) => process,
            None => panic!("{pid} is not running"),
        }
    }
}

impl IndexMut<Pid> for ProcessTable {
    fn index_mut(&mut self, pid: Pid) -> &mut Process {
        match &mut self.slots[pid.index()] {
            Some(process) => process,
            None => panic!("{pid} is not running"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Command;
    use crate::terminal::TerminalId;

    fn build(parent: Option<Pid>) -> impl FnOnce(Pid) -> Process {
        move |pid| {
            let cmd = Command::parse(b"shell").unwrap();
            Process::new(pid, parent, TerminalId::FIRST, &cmd)
        }
    }

    #[test]
    fn test_allocate_skips_root_slot() {
        let mut table = ProcessTable::new();
        let pid = table.allocate(build(None)).unwrap();
        assert_eq!(pid.index(), 1);
        assert!(table.get(Pid::ROOT).is_none());
    }

    #[test]
    fn test_exhaustion_and_reuse() {
        let mut table = ProcessTable::new();
        table.claim_root(build(None));
        let mut last = Pid::ROOT;
        for _ in 1..MAX_PROCESSES {
            last = table.allocate(build(Some(Pid::ROOT))).unwrap();
        }
        assert_eq!(table.occupancy(), MAX_PROCESSES);
        assert!(!table.has_free_slot());
        assert_eq!(table.allocate(build(None)), Err(SysError::ResourceExhausted));
        assert_eq!(table.occupancy(), MAX_PROCESSES);

        assert!(table.free(last).is_some());
        assert_eq!(table.allocate(build(None)), Ok(last));
    }

    #[test]
    fn test_root_is_never_freed() {
        let mut table = ProcessTable::new();
        table.claim_root(build(None));
        assert!(table.free(Pid::ROOT).is_none());
        assert_eq!(table.occupancy(), 1);
    }

    #[test]
    #[should_panic]
    fn test_index_stale_handle_panics() {
        let mut table = ProcessTable::new();
        let pid = table.allocate(build(None)).unwrap();
        table.free(pid);
        let _ = &table[pid];
    }
}
