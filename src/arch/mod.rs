//! Bare-metal x86_64 backend: descriptor tables, interrupts, paging and the
//! screen, plus the global kernel instance the trap handlers share.

pub mod gdt;
pub mod init;
pub mod interrupts;
pub mod paging;
pub mod pic;
pub mod screen;
pub mod serial;
pub mod switch;
pub mod timers;
pub mod uaccess;

use spin::Mutex;

use crate::fs::BootFs;
use crate::hw::{InterruptController, Irq, Mmu, VideoMemory, VideoPage};
use crate::kernel::{Kernel, Transfer};
use crate::memory::PageDirectory;
use crate::process::{Boundary, Context, Pid};
use crate::terminal::TextPage;

pub use init::boot;

/// The machine as the kernel core sees it.
pub struct Platform {
    paging: paging::Paging,
    screen: screen::Screen,
    pic: pic::Pic,
}

impl Platform {
    pub fn present(&mut self) {
        self.screen.present();
    }
}

impl Mmu for Platform {
    fn activate(&mut self, pid: Pid, directory: &PageDirectory) {
        self.paging.activate(pid, directory);
    }

    fn write_phys(&mut self, phys: u64, data: &[u8]) {
        self.paging.write_phys(phys, data);
    }
}

impl VideoMemory for Platform {
    fn page_phys(&self, page: VideoPage) -> u64 {
        self.screen.page_phys(page)
    }

    fn page_mut(&mut self, page: VideoPage) -> &mut TextPage {
        self.screen.page_mut(page)
    }

    fn set_cursor(&mut self, row: usize, col: usize) {
        self.screen.set_cursor(row, col);
    }
}

impl InterruptController for Platform {
    fn enable(&mut self, irq: Irq) {
        self.pic.enable(irq);
    }

    fn disable(&mut self, irq: Irq) {
        self.pic.disable(irq);
    }

    fn end_of_interrupt(&mut self, irq: Irq) {
        self.pic.end_of_interrupt(irq);
    }
}

pub type BareKernel = Kernel<Platform, BootFs<'static>>;

/// Locked only with interrupts disabled.
pub(crate) static KERNEL: Mutex<Option<BareKernel>> = Mutex::new(None);

pub fn with_kernel<R>(f: impl FnOnce(&mut BareKernel) -> R) -> R {
    let mut guard = KERNEL.lock();
    let Some(kernel) = guard.as_mut() else {
        panic!("trap before the kernel was installed");
    };
    f(kernel)
}

/// Carries out `transfer` for a flow trapped at `frame` and returns the
/// context to resume.
pub fn perform(kernel: &mut BareKernel, transfer: Transfer, frame: Context) -> Context {
    match transfer {
        Transfer::Continue => frame,
        Transfer::EnterUser { pid, parent, entry, user_stack } => {
            if let Some(slot) = parent.and_then(|p| kernel.context_slot(p, Boundary::Execute)) {
                *slot = frame;
            }
            switch::select(pid);
            switch::user_entry_frame(pid, entry, user_stack)
        }
        Transfer::ReturnToParent { pid, context, status } => {
            switch::select(pid);
            unsafe { switch::set_return_value(context, u64::from(status)) };
            context
        }
        Transfer::Resume { pid, context } => {
            switch::select(pid);
            context
        }
    }
}

pub fn hlt_loop() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}
