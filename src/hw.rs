//! The hardware the kernel core drives.
//!
//! The arch layer implements these on real x86_64; `testing` fakes them for
//! host unit tests.

use crate::memory::PageDirectory;
use crate::process::Pid;
use crate::terminal::{TerminalId, TextPage};

pub trait Mmu {
    /// Makes `directory` the live translation. Also called after an edit to
    /// the live directory so stale translations get flushed.
    fn activate(&mut self, pid: Pid, directory: &PageDirectory);

    /// Copies `data` into physical memory starting at `phys`.
    fn write_phys(&mut self, phys: u64, data: &[u8]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPage {
    /// What the screen shows.
    Live,
    /// Off-screen contents of a background terminal.
    Backing(TerminalId),
}

pub trait VideoMemory {
    /// Physical address of a page, for mapping it into user space.
    fn page_phys(&self, page: VideoPage) -> u64;

    fn page_mut(&mut self, page: VideoPage) -> &mut TextPage;

    fn set_cursor(&mut self, row: usize, col: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Irq {
    Timer,
    Keyboard,
    Rtc,
}

impl Irq {
    pub fn line(self) -> u8 {
        match self {
            Irq::Timer => 0,
            Irq::Keyboard => 1,
            Irq::Rtc => 8,
        }
    }
}

pub trait InterruptController {
    fn enable(&mut self, irq: Irq);
    fn disable(&mut self, irq: Irq);
    fn end_of_interrupt(&mut self, irq: Irq);
}

pub trait Hardware: Mmu + VideoMemory + InterruptController {}

impl<T: Mmu + VideoMemory + InterruptController> Hardware for T {}
