//! Turns a process's page directory into live x86_64 tables.
//!
//! Every slot owns a fixed set of tables. Activation copies the bootloader's
//! top level (the kernel lives in the upper half), gives the first GiB a
//! private P3/P2, and lays the directory's user regions over it:
//!
//! ```text
//! P4[0] ─▶ P3[0] ─▶ P2[idx]    4 MiB region = two 2 MiB huge pages
//!                   P2[idx] ─▶ P1[0]    one 4 KiB page (display)
//! ```

use core::ptr::addr_of_mut;

use thiserror::Error;
use x86_64::registers::control::{Cr3, Cr3Flags};
use x86_64::structures::paging::page_table::PageTableEntry;
use x86_64::structures::paging::{OffsetPageTable, PageTable, PageTableFlags, PhysFrame, Translate};
use x86_64::{PhysAddr, VirtAddr};

use crate::config::MAX_PROCESSES;
use crate::memory::{PageDirectory, Privilege, RegionSize};
use crate::process::Pid;

const HUGE_PAGE_SIZE: u64 = 2 * 1024 * 1024;
const LOW_GIB: u64 = 1 << 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PagingError {
    #[error("no physical address for kernel object at {0:#x}")]
    Untranslated(u64),
}

#[repr(C)]
struct ProcessTables {
    p4: PageTable,
    p3: PageTable,
    p2: PageTable,
    p1: PageTable,
}

static mut PROCESS_TABLES: [ProcessTables; MAX_PROCESSES] = [const {
    ProcessTables { p4: PageTable::new(), p3: PageTable::new(), p2: PageTable::new(), p1: PageTable::new() }
}; MAX_PROCESSES];

#[derive(Debug, Clone, Copy)]
struct TablesPhys {
    p4: PhysAddr,
    p3: PhysAddr,
    p2: PhysAddr,
    p1: PhysAddr,
}

pub struct Paging {
    phys_offset: VirtAddr,
    boot_p4: PhysAddr,
    /// The bootloader's tables; still authoritative for kernel addresses.
    boot: OffsetPageTable<'static>,
    tables: [TablesPhys; MAX_PROCESSES],
}

impl Paging {
    /// # Safety
    /// All physical memory must be mapped at `phys_offset`, and CR3 must
    /// still hold the bootloader's tables.
    pub unsafe fn new(phys_offset: VirtAddr) -> Result<Self, PagingError> {
        let boot_p4 = Cr3::read().0.start_address();
        let level_4: *mut PageTable = (phys_offset + boot_p4.as_u64()).as_mut_ptr();
        let boot = OffsetPageTable::new(&mut *level_4, phys_offset);

        let mut tables = [TablesPhys {
            p4: PhysAddr::zero(),
            p3: PhysAddr::zero(),
            p2: PhysAddr::zero(),
            p1: PhysAddr::zero(),
        }; MAX_PROCESSES];
        let all = &*addr_of_mut!(PROCESS_TABLES);
        for (slot, t) in tables.iter_mut().zip(all.iter()) {
            let phys = |table: &PageTable| {
                let virt = VirtAddr::from_ptr(table as *const PageTable);
                boot.translate_addr(virt).ok_or(PagingError::Untranslated(virt.as_u64()))
            };
            *slot = TablesPhys { p4: phys(&t.p4)?, p3: phys(&t.p3)?, p2: phys(&t.p2)?, p1: phys(&t.p1)? };
        }

        Ok(Self { phys_offset, boot_p4, boot, tables })
    }

    /// Physical address behind a kernel virtual address.
    pub fn phys_of<T>(&self, ptr: *const T) -> Result<u64, PagingError> {
        let virt = VirtAddr::from_ptr(ptr);
        self.boot
            .translate_addr(virt)
            .map(PhysAddr::as_u64)
            .ok_or(PagingError::Untranslated(virt.as_u64()))
    }

    unsafe fn table_at(&self, phys: PhysAddr) -> &'static PageTable {
        &*(self.phys_offset + phys.as_u64()).as_ptr()
    }

    /// The table an entry points to, unless it is absent or a huge page.
    unsafe fn next_level(&self, entry: &PageTableEntry) -> Option<&'static PageTable> {
        let flags = entry.flags();
        (flags.contains(PageTableFlags::PRESENT) && !flags.contains(PageTableFlags::HUGE_PAGE))
            .then(|| self.table_at(entry.addr()))
    }

    pub fn activate(&mut self, pid: Pid, directory: &PageDirectory) {
        let t = unsafe { &mut (*addr_of_mut!(PROCESS_TABLES))[pid.index()] };
        let phys = self.tables[pid.index()];
        let user = PageTableFlags::PRESENT | PageTableFlags::WRITABLE | PageTableFlags::USER_ACCESSIBLE;

        // The first GiB keeps whatever the bootloader put there.
        let boot_p4 = unsafe { self.table_at(self.boot_p4) };
        t.p4.clone_from(boot_p4);
        t.p3.zero();
        t.p2.zero();
        t.p1.zero();
        if let Some(boot_p3) = unsafe { self.next_level(&boot_p4[0]) } {
            t.p3.clone_from(boot_p3);
            if let Some(boot_p2) = unsafe { self.next_level(&boot_p3[0]) } {
                t.p2.clone_from(boot_p2);
            }
        }
        t.p4[0].set_addr(phys.p3, user);
        t.p3[0].set_addr(phys.p2, user);

        for (virt, mapping) in directory.mappings() {
            // Kernel regions are already present through the boot tables.
            if mapping.privilege == Privilege::Supervisor {
                continue;
            }
            if virt >= LOW_GIB {
                log::warn!("{pid}: region {virt:#x} is outside the first GiB, not mapped");
                continue;
            }
            let index = (virt / HUGE_PAGE_SIZE) as usize;
            match mapping.size {
                RegionSize::Large => {
                    for half in 0..2 {
                        let frame = PhysAddr::new(mapping.phys + half as u64 * HUGE_PAGE_SIZE);
                        t.p2[index + half].set_addr(frame, user | PageTableFlags::HUGE_PAGE);
                    }
                }
                RegionSize::Small => {
                    t.p2[index].set_addr(phys.p1, user);
                    t.p1[0].set_addr(PhysAddr::new(mapping.phys), user);
                }
            }
        }

        unsafe { Cr3::write(PhysFrame::containing_address(phys.p4), Cr3Flags::empty()) };
    }

    pub fn write_phys(&mut self, phys: u64, data: &[u8]) {
        let dst: *mut u8 = (self.phys_offset + phys).as_mut_ptr();
        unsafe { core::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len()) };
    }
}
