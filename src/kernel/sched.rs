use crate::error::SysResult;
use crate::fs::FileStore;
use crate::hw::{Hardware, InterruptController, Irq, VideoMemory};
use crate::kernel::{Kernel, Transfer};
use crate::process::{Context, ExitStatus, Pid};

impl<H: Hardware, F: FileStore> Kernel<H, F> {
    /// PIT interrupt. `frame` is the interrupted flow's tick-boundary context.
    pub fn on_timer(&mut self, frame: Context) -> SysResult<Transfer> {
        self.hw.disable(Irq::Timer);
        self.hw.end_of_interrupt(Irq::Timer);
        let transfer = self.schedule(frame);
        self.hw.enable(Irq::Timer);
        transfer
    }

    /// RTC base-rate interrupt.
    pub fn on_rtc(&mut self) {
        self.rtc.tick();
        self.hw.end_of_interrupt(Irq::Rtc);
    }

    /// Round-robin over terminals that have a process of record.
    pub fn schedule(&mut self, frame: Context) -> SysResult<Transfer> {
        self.ticks += 1;
        let Some(outgoing) = self.current else {
            return Ok(Transfer::Continue);
        };

        let terminal = self.procs[outgoing].terminal;
        if self.terms[terminal].take_interrupt() {
            log::warn!("{outgoing} on {terminal} interrupted from the keyboard");
            return self.terminate(outgoing, ExitStatus::Exception);
        }

        let Some((_, incoming)) = self.terms.next_owned_after(terminal) else {
            return Ok(Transfer::Continue);
        };
        if incoming == outgoing {
            return Ok(Transfer::Continue);
        }

        self.sync_display(outgoing);
        self.sync_display(incoming);
        self.procs[outgoing].tick_context = frame;
        self.spaces.make_active(incoming, &mut self.hw);
        self.current = Some(incoming);
        log::trace!("tick {}: {outgoing} -> {incoming}", self.ticks);
        Ok(Transfer::Resume { pid: incoming, context: self.procs[incoming].tick_context })
    }

    /// Points `pid`'s display mapping at the page its terminal currently
    /// renders to.
    pub(super) fn sync_display(&mut self, pid: Pid) {
        let process = &self.procs[pid];
        if !process.display_mapped {
            return;
        }
        let phys = self.hw.page_phys(self.terms.page_of(process.terminal));
        self.spaces.remap_display(pid, phys, &mut self.hw);
    }
}
