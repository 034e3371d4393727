//! Trap entry stubs and the one place control moves between flows.
//!
//! Every trap pushes the general-purpose registers below the CPU's
//! interrupt frame, producing a [`TrapFrame`]. Its address is the saved
//! [`Context`] of the interrupted flow. Handlers return the context to
//! resume, and `trap_return` restores it with `iretq`:
//!
//! ```text
//!  high ┌──────────────┐  ◀── kernel stack top (TSS rsp0) for ring 3 traps
//!       │ ss rsp rflags│
//!       │ cs rip       │  pushed by the CPU
//!       ├──────────────┤
//!       │ rax .. r15   │  pushed by the stub
//!  low  └──────────────┘  ◀── Context.rsp
//! ```
//!
//! Entering a new program builds a fresh frame at the top of its kernel
//! stack; returning from `execute` patches `rax` in the parent's saved frame.

use core::arch::global_asm;
use core::mem::size_of;
use core::ptr::addr_of_mut;

use crate::arch::gdt;
use crate::config::MAX_PROCESSES;
use crate::process::{Context, Pid};

/// Register image left on the kernel stack by a trap stub.
#[repr(C)]
#[derive(Debug)]
pub struct TrapFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

/// Interrupts on, reserved bit 1 set.
const USER_RFLAGS: u64 = 0x202;
const KERNEL_STACK_SIZE: usize = 16 * 1024;

#[repr(C, align(16))]
struct KernelStack([u8; KERNEL_STACK_SIZE]);

static mut KERNEL_STACKS: [KernelStack; MAX_PROCESSES] =
    [const { KernelStack([0; KERNEL_STACK_SIZE]) }; MAX_PROCESSES];

pub fn kernel_stack_top(pid: Pid) -> u64 {
    let stacks = unsafe { &*addr_of_mut!(KERNEL_STACKS) };
    stacks[pid.index()].0.as_ptr_range().end as u64
}

/// Makes `pid`'s kernel stack the one ring 3 traps land on.
pub fn select(pid: Pid) {
    gdt::set_kernel_stack(kernel_stack_top(pid));
}

/// Writes a frame at the top of `pid`'s kernel stack that `iretq`s to ring 3
/// at `entry` with `user_stack`.
///
/// The caller may be running on that same stack; it only ever uses the part
/// below the top frame.
pub fn user_entry_frame(pid: Pid, entry: u64, user_stack: u64) -> Context {
    let selectors = gdt::selectors();
    let at = kernel_stack_top(pid) - size_of::<TrapFrame>() as u64;
    let frame = TrapFrame {
        r15: 0,
        r14: 0,
        r13: 0,
        r12: 0,
        r11: 0,
        r10: 0,
        r9: 0,
        r8: 0,
        rbp: 0,
        rdi: 0,
        rsi: 0,
        rdx: 0,
        rcx: 0,
        rbx: 0,
        rax: 0,
        rip: entry,
        cs: u64::from(selectors.user_code.0),
        rflags: USER_RFLAGS,
        rsp: user_stack,
        ss: u64::from(selectors.user_data.0),
    };
    unsafe { (at as *mut TrapFrame).write(frame) };
    Context { rsp: at }
}

/// Sets the value a saved flow sees in `rax` once resumed.
///
/// # Safety
/// `context` must be a frame saved by a trap stub and not yet resumed.
pub unsafe fn set_return_value(context: Context, value: u64) {
    (*(context.rsp as *mut TrapFrame)).rax = value;
}

extern "C" {
    pub fn timer_entry();
    pub fn keyboard_entry();
    pub fn syscall_entry();
    fn trap_return(rsp: u64) -> !;
}

/// Abandons the current flow and resumes `context`.
///
/// # Safety
/// `context` must be a live frame from a trap stub or [`user_entry_frame`].
pub unsafe fn restore(context: Context) -> ! {
    trap_return(context.rsp)
}

global_asm!(
    r#"
.macro TRAP_STUB name, handler
.global \name
\name:
    push rax
    push rbx
    push rcx
    push rdx
    push rsi
    push rdi
    push rbp
    push r8
    push r9
    push r10
    push r11
    push r12
    push r13
    push r14
    push r15
    mov rdi, rsp
    call \handler
    mov rdi, rax
    jmp trap_return
.endm

TRAP_STUB timer_entry, {timer}
TRAP_STUB keyboard_entry, {keyboard}
TRAP_STUB syscall_entry, {syscall}

.global trap_return
trap_return:
    mov rsp, rdi
    pop r15
    pop r14
    pop r13
    pop r12
    pop r11
    pop r10
    pop r9
    pop r8
    pop rbp
    pop rdi
    pop rsi
    pop rdx
    pop rcx
    pop rbx
    pop rax
    iretq
"#,
    timer = sym crate::arch::interrupts::timer_trap,
    keyboard = sym crate::arch::interrupts::keyboard_trap,
    syscall = sym crate::arch::interrupts::syscall_trap,
);
