//! Boot sequence: bring the machine up in phases, install the kernel and
//! start the terminal-0 shell.
use bootloader_api::info::{MemoryRegion, MemoryRegionKind};
use bootloader_api::BootInfo;
use thiserror::Error;
use x86_64::VirtAddr;

use crate::arch::paging::{Paging, PagingError};
use crate::arch::pic::Pic;
use crate::arch::screen::{FramebufferWriter, Screen};
use crate::arch::{gdt, interrupts, perform, pic, serial, switch, timers, with_kernel, Platform, KERNEL};
use crate::config::{KernelConfig, MAX_PROCESSES, REGION_SIZE};
use crate::fs::{BootFs, FsError};
use crate::hw::{InterruptController, Irq};
use crate::kernel::Kernel;
use crate::process::Context;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("bootloader did not map physical memory")]
    NoPhysicalMemoryMapping,
    #[error("no ramdisk was loaded")]
    NoRamdisk,
    #[error("no usable 4 MiB aligned run of {0:#x} bytes")]
    NoFramePool(u64),
    #[error(transparent)]
    Paging(#[from] PagingError),
    #[error("ramdisk: {0}")]
    FileStore(#[from] FsError),
}

fn init_phase<T>(name: &'static str, init: impl FnOnce() -> Result<T, InitError>) -> Result<T, InitError> {
    log::info!("Initializing {name}...");
    match init() {
        Ok(value) => {
            log::info!("    {name} initialized");
            Ok(value)
        }
        Err(e) => {
            log::error!("    {name} failed: {e}");
            Err(e)
        }
    }
}

/// First usable run that can hold the kernel frame plus one image frame per
/// process slot.
fn find_frame_pool(regions: &[MemoryRegion]) -> Result<u64, InitError> {
    let needed = (MAX_PROCESSES as u64 + 1) * REGION_SIZE;
    regions
        .iter()
        .filter(|r| r.kind == MemoryRegionKind::Usable)
        .find_map(|r| {
            let base = r.start.checked_next_multiple_of(REGION_SIZE)?;
            (base.checked_add(needed)? <= r.end).then_some(base)
        })
        .ok_or(InitError::NoFramePool(needed))
}

fn install(boot_info: &'static mut BootInfo, config: KernelConfig) -> Result<(), InitError> {
    init_phase("descriptor tables", || {
        gdt::init();
        interrupts::init_idt();
        Ok(())
    })?;

    let phys_offset = boot_info
        .physical_memory_offset
        .into_option()
        .map(VirtAddr::new)
        .ok_or(InitError::NoPhysicalMemoryMapping)?;
    let pool_base = init_phase("frame pool", || find_frame_pool(&boot_info.memory_regions))?;
    log::info!("image frames start at {pool_base:#x}");

    let fs = init_phase("boot file store", || {
        let addr = boot_info.ramdisk_addr.into_option().ok_or(InitError::NoRamdisk)?;
        let image = unsafe { core::slice::from_raw_parts(addr as *const u8, boot_info.ramdisk_len as usize) };
        Ok(BootFs::mount(image)?)
    })?;

    // Last use of `boot_info`, so the framebuffer borrow can be 'static.
    let framebuffer = boot_info.framebuffer.as_mut();

    let paging = init_phase("paging", || Ok(unsafe { Paging::new(phys_offset)? }))?;
    let screen = init_phase("screen", || {
        Ok(Screen::new(&paging, framebuffer.map(FramebufferWriter::new))?)
    })?;

    let platform = Platform { paging, screen, pic: Pic };
    *KERNEL.lock() = Some(Kernel::new(platform, fs, config, pool_base));

    init_phase("interrupt controllers", || {
        pic::init();
        timers::init_pit(config.pit_divisor);
        timers::init_rtc();
        let mut controller = Pic;
        for irq in [Irq::Timer, Irq::Keyboard, Irq::Rtc] {
            controller.enable(irq);
        }
        Ok(())
    })
}

/// Never returns: ends by entering the first shell in user mode.
pub fn boot(boot_info: &'static mut BootInfo, config: KernelConfig) -> ! {
    serial::init();
    serial::init_logger(config.log_level);
    crate::serial_println!("triterm: {} terminals, {} process slots", crate::config::TERMINAL_COUNT, MAX_PROCESSES);

    if let Err(e) = install(boot_info, config) {
        panic!("Kernel initialization failed: {e}");
    }

    let first = with_kernel(|k| match k.start() {
        Ok(transfer) => perform(k, transfer, Context::default()),
        Err(err) => panic!("cannot start {:?}: {err}", core::str::from_utf8(config.shell)),
    });
    unsafe { switch::restore(first) }
}
