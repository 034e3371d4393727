// gdt.rs
use core::ptr::{addr_of, addr_of_mut};

use spin::Lazy;
use x86_64::structures::gdt::{Descriptor, GlobalDescriptorTable, SegmentSelector};
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

pub const DOUBLE_FAULT_IST_INDEX: u16 = 0;
/// CPU exceptions run here so that killing a process may rebuild the top of
/// its kernel stack.
pub const FAULT_IST_INDEX: u16 = 1;

const IST_STACK_SIZE: usize = 4096 * 4;

static mut DOUBLE_FAULT_STACK: [u8; IST_STACK_SIZE] = [0; IST_STACK_SIZE];
static mut FAULT_STACK: [u8; IST_STACK_SIZE] = [0; IST_STACK_SIZE];

// Mutable because rsp0 follows the running process's kernel stack.
static mut TSS: TaskStateSegment = TaskStateSegment::new();

pub struct Selectors {
    pub kernel_code: SegmentSelector,
    pub kernel_data: SegmentSelector,
    pub user_code: SegmentSelector,
    pub user_data: SegmentSelector,
    tss: SegmentSelector,
}

static GDT: Lazy<(GlobalDescriptorTable, Selectors)> = Lazy::new(|| {
    let mut gdt = GlobalDescriptorTable::new();

    let kernel_code = gdt.append(Descriptor::kernel_code_segment());
    let kernel_data = gdt.append(Descriptor::kernel_data_segment());
    let user_data = gdt.append(Descriptor::user_data_segment());
    let user_code = gdt.append(Descriptor::user_code_segment());
    let tss = gdt.append(unsafe { Descriptor::tss_segment_unchecked(addr_of!(TSS)) });

    (gdt, Selectors { kernel_code, kernel_data, user_code, user_data, tss })
});

pub fn selectors() -> &'static Selectors {
    &GDT.1
}

pub fn init() {
    unsafe {
        let tss = &mut *addr_of_mut!(TSS);
        let double_fault = addr_of!(DOUBLE_FAULT_STACK) as u64 + IST_STACK_SIZE as u64;
        tss.interrupt_stack_table[DOUBLE_FAULT_IST_INDEX as usize] = VirtAddr::new(double_fault);
        let fault = addr_of!(FAULT_STACK) as u64 + IST_STACK_SIZE as u64;
        tss.interrupt_stack_table[FAULT_IST_INDEX as usize] = VirtAddr::new(fault);
    }

    let (ref gdt, ref selectors) = *GDT;
    gdt.load();

    unsafe {
        use x86_64::instructions::segmentation::{Segment, CS, DS, ES, SS};

        CS::set_reg(selectors.kernel_code);
        DS::set_reg(selectors.kernel_data);
        ES::set_reg(selectors.kernel_data);
        SS::set_reg(selectors.kernel_data);

        x86_64::instructions::tables::load_tss(selectors.tss);
    }
}

/// Stack the CPU switches to when a ring 3 flow traps.
pub fn set_kernel_stack(top: u64) {
    unsafe {
        (*addr_of_mut!(TSS)).privilege_stack_table[0] = VirtAddr::new(top);
    }
}
