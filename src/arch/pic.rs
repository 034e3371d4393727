//! # Programmable Interrupt Controller (8259 PIC)
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │   PIC 1     │     │   PIC 2     │
//! │  (Master)   │◀────│  (Slave)    │
//! │ IRQ 0-7     │     │ IRQ 8-15    │
//! └─────────────┘     └─────────────┘
//!       │
//!       ▼
//!     CPU
//! ```
//!
//! | IRQ | Vector | Device    |
//! |-----|--------|-----------|
//! | 0   | 32     | PIT       |
//! | 1   | 33     | Keyboard  |
//! | 2   | 34     | Cascade   |
//! | 8   | 40     | RTC       |
//!
//! Every line starts masked; the kernel unmasks the ones it drives.
use pic8259::ChainedPics;
use spin::Mutex;

use crate::hw::{InterruptController, Irq};

pub const PIC_1_OFFSET: u8 = 32; // Primary PIC handles IRQs 0-7
pub const PIC_2_OFFSET: u8 = 40; // Secondary PIC handles IRQs 8-15
const CASCADE_LINE: u8 = 2;

pub static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

// Interrupt indices - these are the actual vector numbers the CPU sees
#[derive(Debug, Clone, Copy)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC_1_OFFSET,        // 32 - IRQ0
    Keyboard = PIC_1_OFFSET + 1, // 33 - IRQ1
    Rtc = PIC_2_OFFSET,          // 40 - IRQ8
}

impl InterruptIndex {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<Irq> for InterruptIndex {
    fn from(irq: Irq) -> Self {
        match irq {
            Irq::Timer => InterruptIndex::Timer,
            Irq::Keyboard => InterruptIndex::Keyboard,
            Irq::Rtc => InterruptIndex::Rtc,
        }
    }
}

pub fn init() {
    let mut pics = PICS.lock();
    unsafe {
        pics.initialize();
        // Only the cascade stays open until devices are enabled.
        pics.write_masks(!(1 << CASCADE_LINE), 0xff);
    }
}

fn set_masked(line: u8, masked: bool) {
    let mut pics = PICS.lock();
    unsafe {
        let mut masks = pics.read_masks();
        let (chip, bit) = (usize::from(line / 8), line % 8);
        if masked {
            masks[chip] |= 1 << bit;
        } else {
            masks[chip] &= !(1 << bit);
        }
        pics.write_masks(masks[0], masks[1]);
    }
}

/// The 8259 pair as the kernel sees it.
pub struct Pic;

impl InterruptController for Pic {
    fn enable(&mut self, irq: Irq) {
        set_masked(irq.line(), false);
    }

    fn disable(&mut self, irq: Irq) {
        set_masked(irq.line(), true);
    }

    fn end_of_interrupt(&mut self, irq: Irq) {
        unsafe {
            PICS.lock().notify_end_of_interrupt(InterruptIndex::from(irq).as_u8());
        }
    }
}
