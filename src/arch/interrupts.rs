use spin::{Lazy, Mutex};
use x86_64::instructions::interrupts;
use x86_64::instructions::port::Port;
use x86_64::registers::control::Cr2;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};
use x86_64::{PrivilegeLevel, VirtAddr};

use crate::arch::pic::InterruptIndex;
use crate::arch::switch::{self, TrapFrame};
use crate::arch::uaccess::ActiveUserSpace;
use crate::arch::{gdt, perform, timers, with_kernel};
use crate::devices::keyboard::ScancodeDecoder;
use crate::hw::{InterruptController, Irq};
use crate::kernel::FaultKind;
use crate::process::Context;
use crate::syscalls::{dispatch, SyscallContext, SyscallOutcome, SYSCALL_VECTOR};

static DECODER: Mutex<ScancodeDecoder> = Mutex::new(ScancodeDecoder::new());

static IDT: Lazy<InterruptDescriptorTable> = Lazy::new(|| {
    let mut idt = InterruptDescriptorTable::new();

    // CPU EXCEPTIONS (0-31)
    unsafe {
        let ist = gdt::FAULT_IST_INDEX;
        idt.divide_error.set_handler_fn(divide_error_handler).set_stack_index(ist);
        idt.debug.set_handler_fn(debug_handler).set_stack_index(ist);
        idt.non_maskable_interrupt.set_handler_fn(nmi_handler).set_stack_index(ist);
        idt.breakpoint.set_handler_fn(breakpoint_handler).set_stack_index(ist);
        idt.overflow.set_handler_fn(overflow_handler).set_stack_index(ist);
        idt.bound_range_exceeded.set_handler_fn(bound_range_handler).set_stack_index(ist);
        idt.invalid_opcode.set_handler_fn(invalid_opcode_handler).set_stack_index(ist);
        idt.device_not_available.set_handler_fn(device_not_available_handler).set_stack_index(ist);
        idt.invalid_tss.set_handler_fn(invalid_tss_handler).set_stack_index(ist);
        idt.segment_not_present.set_handler_fn(segment_not_present_handler).set_stack_index(ist);
        idt.stack_segment_fault.set_handler_fn(stack_segment_handler).set_stack_index(ist);
        idt.general_protection_fault.set_handler_fn(general_protection_fault_handler).set_stack_index(ist);
        idt.page_fault.set_handler_fn(page_fault_handler).set_stack_index(ist);
        idt.x87_floating_point.set_handler_fn(x87_handler).set_stack_index(ist);
        idt.alignment_check.set_handler_fn(alignment_check_handler).set_stack_index(ist);
        idt.machine_check.set_handler_fn(machine_check_handler).set_stack_index(ist);
        idt.simd_floating_point.set_handler_fn(simd_handler).set_stack_index(ist);
        idt.virtualization.set_handler_fn(virtualization_handler).set_stack_index(ist);
        // Double fault needs its own stack to avoid cascading failures
        idt.double_fault
            .set_handler_fn(double_fault_handler)
            .set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
    }

    // HARDWARE INTERRUPTS (32-47 after remapping)
    unsafe {
        idt[InterruptIndex::Timer.as_u8()].set_handler_addr(VirtAddr::new(switch::timer_entry as usize as u64));
        idt[InterruptIndex::Keyboard.as_u8()]
            .set_handler_addr(VirtAddr::new(switch::keyboard_entry as usize as u64));
        idt[SYSCALL_VECTOR]
            .set_handler_addr(VirtAddr::new(switch::syscall_entry as usize as u64))
            .set_privilege_level(PrivilegeLevel::Ring3);
    }
    idt[InterruptIndex::Rtc.as_u8()].set_handler_fn(rtc_interrupt_handler);

    idt
});

pub fn init_idt() {
    IDT.load();
}

fn frame_context(frame: &mut TrapFrame) -> Context {
    Context { rsp: frame as *mut TrapFrame as u64 }
}

// Trap stub targets. Each returns the stack pointer of the frame to resume.

pub extern "C" fn timer_trap(frame: &mut TrapFrame) -> u64 {
    let context = frame_context(frame);
    let next = with_kernel(|k| {
        let next = match k.on_timer(context) {
            Ok(transfer) => perform(k, transfer, context),
            Err(err) => panic!("scheduler has nothing to run: {err}"),
        };
        k.hardware_mut().present();
        next
    });
    next.rsp
}

pub extern "C" fn keyboard_trap(frame: &mut TrapFrame) -> u64 {
    let context = frame_context(frame);
    let mut port = Port::<u8>::new(0x60);
    let scancode: u8 = unsafe { port.read() };
    let event = DECODER.lock().process_scancode(scancode);

    let next = with_kernel(|k| match event {
        Some(event) => match k.on_key(event, context) {
            Ok(transfer) => perform(k, transfer, context),
            Err(err) => {
                log::error!("could not start a shell: {err}");
                context
            }
        },
        None => {
            k.hardware_mut().end_of_interrupt(Irq::Keyboard);
            context
        }
    });
    next.rsp
}

enum Step {
    Return(isize),
    Wait,
    Switch(Context),
}

pub extern "C" fn syscall_trap(frame: &mut TrapFrame) -> u64 {
    let context = frame_context(frame);
    let call = SyscallContext::from_registers(frame.rax, frame.rdi, frame.rsi, frame.rdx);
    loop {
        let step = with_kernel(|k| match dispatch(k, call, &mut ActiveUserSpace) {
            SyscallOutcome::Return(value) => Step::Return(value),
            SyscallOutcome::Block => Step::Wait,
            SyscallOutcome::Transfer(transfer) => Step::Switch(perform(k, transfer, context)),
        });
        match step {
            Step::Return(value) => {
                frame.rax = value as u64;
                return context.rsp;
            }
            // Other flows may run before the hlt returns.
            Step::Wait => {
                interrupts::enable_and_hlt();
                interrupts::disable();
            }
            Step::Switch(next) => return next.rsp,
        }
    }
}

extern "x86-interrupt" fn rtc_interrupt_handler(_stack_frame: InterruptStackFrame) {
    timers::acknowledge_rtc();
    with_kernel(|k| k.on_rtc());
}

/// Kills the user process behind `kind`; a kernel-mode fault is fatal.
fn fault(stack_frame: &InterruptStackFrame, kind: FaultKind) {
    if stack_frame.code_segment.rpl() != PrivilegeLevel::Ring3 {
        panic!("EXCEPTION in kernel: {kind}\n{stack_frame:#?}");
    }
    let next = with_kernel(|k| match k.fault(kind) {
        Ok(transfer) => perform(k, transfer, Context::default()),
        Err(err) => panic!("EXCEPTION with no process to blame: {kind} ({err})"),
    });
    unsafe { switch::restore(next) }
}

extern "x86-interrupt" fn divide_error_handler(stack_frame: InterruptStackFrame) {
    fault(&stack_frame, FaultKind::DivideError);
}

extern "x86-interrupt" fn debug_handler(stack_frame: InterruptStackFrame) {
    fault(&stack_frame, FaultKind::Debug);
}

extern "x86-interrupt" fn nmi_handler(stack_frame: InterruptStackFrame) {
    fault(&stack_frame, FaultKind::NonMaskable);
}

extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    if stack_frame.code_segment.rpl() != PrivilegeLevel::Ring3 {
        log::warn!("EXCEPTION: BREAKPOINT\n{stack_frame:#?}");
        return;
    }
    fault(&stack_frame, FaultKind::Breakpoint);
}

extern "x86-interrupt" fn overflow_handler(stack_frame: InterruptStackFrame) {
    fault(&stack_frame, FaultKind::Overflow);
}

extern "x86-interrupt" fn bound_range_handler(stack_frame: InterruptStackFrame) {
    fault(&stack_frame, FaultKind::BoundRange);
}

extern "x86-interrupt" fn invalid_opcode_handler(stack_frame: InterruptStackFrame) {
    fault(&stack_frame, FaultKind::InvalidOpcode);
}

extern "x86-interrupt" fn device_not_available_handler(stack_frame: InterruptStackFrame) {
    fault(&stack_frame, FaultKind::DeviceNotAvailable);
}

extern "x86-interrupt" fn double_fault_handler(stack_frame: InterruptStackFrame, error_code: u64) -> ! {
    panic!("EXCEPTION: DOUBLE FAULT\n{stack_frame:#?}\n CODE{error_code}");
}

extern "x86-interrupt" fn invalid_tss_handler(stack_frame: InterruptStackFrame, error_code: u64) {
    fault(&stack_frame, FaultKind::InvalidTss { selector: error_code });
}

extern "x86-interrupt" fn segment_not_present_handler(stack_frame: InterruptStackFrame, error_code: u64) {
    fault(&stack_frame, FaultKind::SegmentNotPresent { selector: error_code });
}

extern "x86-interrupt" fn stack_segment_handler(stack_frame: InterruptStackFrame, error_code: u64) {
    fault(&stack_frame, FaultKind::StackSegment { selector: error_code });
}

extern "x86-interrupt" fn general_protection_fault_handler(stack_frame: InterruptStackFrame, error_code: u64) {
    fault(&stack_frame, FaultKind::GeneralProtection { code: error_code });
}

extern "x86-interrupt" fn page_fault_handler(stack_frame: InterruptStackFrame, error_code: PageFaultErrorCode) {
    let addr = Cr2::read_raw();
    fault(&stack_frame, FaultKind::PageFault { addr, code: error_code.bits() });
}

extern "x86-interrupt" fn x87_handler(stack_frame: InterruptStackFrame) {
    fault(&stack_frame, FaultKind::X87FloatingPoint);
}

extern "x86-interrupt" fn alignment_check_handler(stack_frame: InterruptStackFrame, _error_code: u64) {
    fault(&stack_frame, FaultKind::AlignmentCheck);
}

extern "x86-interrupt" fn machine_check_handler(stack_frame: InterruptStackFrame) -> ! {
    panic!("EXCEPTION: MACHINE CHECK\n{stack_frame:#?}");
}

extern "x86-interrupt" fn simd_handler(stack_frame: InterruptStackFrame) {
    fault(&stack_frame, FaultKind::SimdFloatingPoint);
}

extern "x86-interrupt" fn virtualization_handler(stack_frame: InterruptStackFrame) {
    fault(&stack_frame, FaultKind::Virtualization);
}
