//! One page directory per process slot.
//!
//! The directory models a two-level x86 layout: 1024 entries each covering a
//! 4 MiB region. An entry maps either the whole region (`RegionSize::Large`)
//! or only the first 4 KiB page of it (`RegionSize::Small`). The arch layer
//! turns a directory into real page tables when it is activated.

use thiserror::Error;
use x86_64::structures::paging::page_table::PageTableEntry;
use x86_64::structures::paging::PageTableFlags;
use x86_64::PhysAddr;

use crate::config::{
    DIRECTORY_ENTRIES, KERNEL_VIRT, MAX_PROCESSES, REGION_SIZE, SMALL_PAGE_SIZE, USER_WINDOW_START,
    VIDMAP_VIRT,
};
use crate::hw::Mmu;
use crate::process::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSize {
    Large,
    Small,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Supervisor,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub phys: u64,
    pub size: RegionSize,
    pub privilege: Privilege,
}

impl Mapping {
    fn flags(&self) -> PageTableFlags {
        let mut flags = PageTableFlags::PRESENT | PageTableFlags::WRITABLE;
        match self.privilege {
            Privilege::User => flags |= PageTableFlags::USER_ACCESSIBLE,
            Privilege::Supervisor => flags |= PageTableFlags::GLOBAL,
        }
        if self.size == RegionSize::Large {
            flags |= PageTableFlags::HUGE_PAGE;
        }
        flags
    }

    fn from_entry(entry: &PageTableEntry) -> Option<Mapping> {
        let flags = entry.flags();
        if !flags.contains(PageTableFlags::PRESENT) {
            return None;
        }
        Some(Mapping {
            phys: entry.addr().as_u64(),
            size: if flags.contains(PageTableFlags::HUGE_PAGE) {
                RegionSize::Large
            } else {
                RegionSize::Small
            },
            privilege: if flags.contains(PageTableFlags::USER_ACCESSIBLE) {
                Privilege::User
            } else {
                Privilege::Supervisor
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("region {0:#x} is already mapped")]
    Conflict(u64),
    #[error("address {0:#x} is not aligned for its mapping size")]
    Misaligned(u64),
}

#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PageTableEntry; DIRECTORY_ENTRIES],
}

impl PageDirectory {
    pub fn empty() -> Self {
        Self { entries: core::array::from_fn(|_| PageTableEntry::new()) }
    }

    fn index(virt: u64) -> usize {
        (virt / REGION_SIZE) as usize % DIRECTORY_ENTRIES
    }

    pub fn mapping(&self, virt: u64) -> Option<Mapping> {
        Mapping::from_entry(&self.entries[Self::index(virt)])
    }

    /// Present entries as `(region base, mapping)`.
    pub fn mappings(&self) -> impl Iterator<Item = (u64, Mapping)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| Mapping::from_entry(e).map(|m| (i as u64 * REGION_SIZE, m)))
    }

    fn insert(&mut self, virt: u64, mapping: Mapping) -> Result<(), MapError> {
        let align = match mapping.size {
            RegionSize::Large => REGION_SIZE,
            RegionSize::Small => SMALL_PAGE_SIZE,
        };
        if virt % REGION_SIZE != 0 {
            return Err(MapError::Misaligned(virt));
        }
        if mapping.phys % align != 0 {
            return Err(MapError::Misaligned(mapping.phys));
        }
        let entry = &mut self.entries[Self::index(virt)];
        if !entry.is_unused() {
            return Err(MapError::Conflict(virt));
        }
        entry.set_addr(PhysAddr::new(mapping.phys), mapping.flags());
        Ok(())
    }

    fn remove(&mut self, virt: u64) -> Option<Mapping> {
        let entry = &mut self.entries[Self::index(virt)];
        let old = Mapping::from_entry(entry);
        entry.set_unused();
        old
    }
}

/// The directories of every slot plus which one the CPU is using.
pub struct AddressSpaces {
    /// Base of the 4 MiB frame pool. Frame 0 backs the kernel region and
    /// frame `pid + 1` backs that process's image.
    pool_base: u64,
    directories: [PageDirectory; MAX_PROCESSES],
    active: Option<Pid>,
}

impl AddressSpaces {
    pub fn new(pool_base: u64) -> Self {
        debug_assert_eq!(pool_base % REGION_SIZE, 0);
        Self {
            pool_base,
            directories: core::array::from_fn(|_| PageDirectory::empty()),
            active: None,
        }
    }

    pub fn image_frame(&self, pid: Pid) -> u64 {
        self.pool_base + (pid.index() as u64 + 1) * REGION_SIZE
    }

    pub fn active(&self) -> Option<Pid> {
        self.active
    }

    pub fn directory(&self, pid: Pid) -> &PageDirectory {
        &self.directories[pid.index()]
    }

    /// Rebuilds `pid`'s directory from scratch and makes it active.
    pub fn create(&mut self, pid: Pid, mmu: &mut impl Mmu) {
        let kernel = Mapping {
            phys: self.pool_base,
            size: RegionSize::Large,
            privilege: Privilege::Supervisor,
        };
        let image = Mapping {
            phys: self.image_frame(pid),
            size: RegionSize::Large,
            privilege: Privilege::User,
        };
        let directory = &mut self.directories[pid.index()];
        *directory = PageDirectory::empty();
        // Both regions are aligned and the directory is empty.
        let kernel_mapped = directory.insert(KERNEL_VIRT, kernel);
        let image_mapped = directory.insert(USER_WINDOW_START, image);
        debug_assert!(kernel_mapped.is_ok() && image_mapped.is_ok());
        self.make_active(pid, mmu);
    }

    pub fn make_active(&mut self, pid: Pid, mmu: &mut impl Mmu) {
        self.active = Some(pid);
        mmu.activate(pid, &self.directories[pid.index()]);
    }

    fn reload_if_active(&mut self, pid: Pid, mmu: &mut impl Mmu) {
        if self.active == Some(pid) {
            mmu.activate(pid, &self.directories[pid.index()]);
        }
    }

    pub fn map_region(
        &mut self,
        pid: Pid,
        virt: u64,
        phys: u64,
        size: RegionSize,
        privilege: Privilege,
        mmu: &mut impl Mmu,
    ) -> Result<(), MapError> {
        self.directories[pid.index()].insert(virt, Mapping { phys, size, privilege })?;
        self.reload_if_active(pid, mmu);
        Ok(())
    }

    pub fn unmap_display(&mut self, pid: Pid, mmu: &mut impl Mmu) {
        if self.directories[pid.index()].remove(VIDMAP_VIRT).is_some() {
            self.reload_if_active(pid, mmu);
        }
    }

    /// Points an existing display mapping at `phys`. No-op when unmapped or
    /// already there.
    pub fn remap_display(&mut self, pid: Pid, phys: u64, mmu: &mut impl Mmu) {
        let directory = &mut self.directories[pid.index()];
        match directory.mapping(VIDMAP_VIRT) {
            Some(current) if current.phys != phys => {
                directory.remove(VIDMAP_VIRT);
                let remapped = directory.insert(VIDMAP_VIRT, Mapping { phys, ..current });
                debug_assert!(remapped.is_ok());
                self.reload_if_active(pid, mmu);
            }
            _ => {}
        }
    }
}
