use core::fmt::Write;

use arrayvec::ArrayString;

use crate::config::{
    ENTRY_OFFSET, EXECUTABLE_MAGIC, PROGRAM_CAPACITY, PROGRAM_LOAD_VIRT, USER_STACK_TOP,
    USER_WINDOW_START,
};
use crate::error::{SysError, SysResult};
use crate::fs::{Dentry, FileKind, FileStore};
use crate::hw::{Hardware, Mmu};
use crate::kernel::{FaultKind, Kernel, Transfer};
use crate::process::{Command, ExitStatus, Pid, Process};
use crate::terminal::TerminalId;

/// Bytes moved per file-store read while loading an image.
const STAGING_CHUNK: usize = 1024;

impl<H: Hardware, F: FileStore> Kernel<H, F> {
    /// Launches the boot shell on terminal 0.
    pub fn start(&mut self) -> SysResult<Transfer> {
        log::info!("booting with a {} Hz scheduler", self.config.scheduler_hz());
        self.spawn_root(TerminalId::FIRST)
    }

    /// Loads the program named by `line` as a child of the running process.
    ///
    /// On error nothing has changed: no slot is taken and the caller's
    /// address space is still live.
    pub fn execute(&mut self, line: &[u8]) -> SysResult<Transfer> {
        let caller = self.running()?;
        let command = Command::parse(line)?;
        let terminal = self.procs[caller].terminal;
        self.launch(&command, Some(caller), terminal)
    }

    /// Terminates the running process.
    pub fn halt(&mut self, status: ExitStatus) -> SysResult<Transfer> {
        let pid = self.running()?;
        self.terminate(pid, status)
    }

    /// Kills the running process after a CPU exception in user mode.
    pub fn fault(&mut self, kind: FaultKind) -> SysResult<Transfer> {
        let pid = self.running()?;
        let terminal = self.procs[pid].terminal;
        log::error!("{pid} ({}) raised {kind}", self.procs[pid].name());

        let mut message = ArrayString::<96>::new();
        let _ = writeln!(message, "exception: {kind}");
        self.terms.write(terminal, message.as_bytes(), &mut self.hw);
        self.terminate(pid, ExitStatus::Exception)
    }

    pub(super) fn spawn_root(&mut self, terminal: TerminalId) -> SysResult<Transfer> {
        let command = Command::parse(self.config.shell)?;
        self.launch(&command, None, terminal)
    }

    fn launch(
        &mut self,
        command: &Command,
        parent: Option<Pid>,
        terminal: TerminalId,
    ) -> SysResult<Transfer> {
        let dentry = self.resolve(&command.name)?;

        let build = |pid| Process::new(pid, parent, terminal, command);
        let pid = if parent.is_none() && terminal == TerminalId::FIRST {
            self.procs.claim_root(build)
        } else {
            self.procs.allocate(build)?
        };

        let entry = match self.load_image(pid, &dentry) {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("loading {} failed: {err}", self.procs[pid].name());
                if pid != Pid::ROOT {
                    self.procs.free(pid);
                }
                if let Some(previous) = self.current {
                    self.spaces.make_active(previous, &mut self.hw);
                }
                return Err(err);
            }
        };

        if let Some(parent) = parent {
            self.procs[parent].active = false;
        }
        self.terms[terminal].owner = Some(pid);
        self.current = Some(pid);
        log::info!(
            "{pid} ({}) started on {terminal}, parent {:?}, entry {entry:#x}",
            self.procs[pid].name(),
            parent
        );
        Ok(Transfer::EnterUser { pid, parent, entry, user_stack: USER_STACK_TOP })
    }

    /// Finds an executable by name.
    fn resolve(&self, name: &[u8]) -> SysResult<Dentry> {
        let dentry = self.fs.lookup(name).ok_or(SysError::NotFound)?;
        if dentry.kind != FileKind::Regular
            || dentry.size < ENTRY_OFFSET + 4
            || dentry.size > PROGRAM_CAPACITY
        {
            return Err(SysError::InvalidArgument);
        }
        let mut magic = [0; 4];
        if self.fs.read(dentry.inode, 0, &mut magic)? != magic.len() || magic != EXECUTABLE_MAGIC {
            return Err(SysError::InvalidArgument);
        }
        Ok(dentry)
    }

    /// Builds `pid`'s address space and copies the image in. Returns the
    /// entry point.
    fn load_image(&mut self, pid: Pid, dentry: &Dentry) -> SysResult<u64> {
        self.spaces.create(pid, &mut self.hw);
        let base = self.spaces.image_frame(pid) + (PROGRAM_LOAD_VIRT - USER_WINDOW_START);

        let mut header = [0; ENTRY_OFFSET + 4];
        let mut chunk = [0; STAGING_CHUNK];
        let mut offset = 0;
        while offset < dentry.size {
            let wanted = chunk.len().min(dentry.size - offset);
            let n = self.fs.read(dentry.inode, offset, &mut chunk[..wanted])?;
            if n == 0 {
                return Err(SysError::InvalidArgument);
            }
            if offset < header.len() {
                let m = (header.len() - offset).min(n);
                header[offset..offset + m].copy_from_slice(&chunk[..m]);
            }
            self.hw.write_phys(base + offset as u64, &chunk[..n]);
            offset += n;
        }

        let entry = &header[ENTRY_OFFSET..];
        Ok(u64::from(u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]])))
    }

    /// Tears `pid` down and decides who runs next.
    pub(super) fn terminate(&mut self, pid: Pid, status: ExitStatus) -> SysResult<Transfer> {
        let (parent, terminal, display_mapped) = {
            let process = &mut self.procs[pid];
            let closed = process.fds.drain().count();
            log::info!(
                "{pid} ({}) halted with status {}, closed {closed} descriptors",
                process.name(),
                status.widened()
            );
            (process.parent, process.terminal, process.display_mapped)
        };
        self.rtc.close(pid);
        if display_mapped {
            self.spaces.unmap_display(pid, &mut self.hw);
        }
        // Typed-ahead input belonged to the dead owner.
        self.terms[terminal].reset_input();

        match parent {
            Some(parent) => {
                self.procs.free(pid);
                self.terms[terminal].owner = Some(parent);
                self.procs[parent].active = true;
                self.current = Some(parent);
                self.spaces.make_active(parent, &mut self.hw);
                self.sync_display(parent);
                Ok(Transfer::ReturnToParent {
                    pid: parent,
                    context: self.procs[parent].exec_context,
                    status: status.widened(),
                })
            }
            None => {
                if pid != Pid::ROOT {
                    self.procs.free(pid);
                }
                self.terms[terminal].owner = None;
                self.current = None;
                log::info!("{terminal} has no processes left, respawning its shell");
                self.spawn_root(terminal)
            }
        }
    }
}
