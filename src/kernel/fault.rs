use core::fmt;

/// CPU exceptions a user process can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    DivideError,
    Debug,
    NonMaskable,
    Breakpoint,
    Overflow,
    BoundRange,
    InvalidOpcode,
    DeviceNotAvailable,
    DoubleFault,
    InvalidTss { selector: u64 },
    SegmentNotPresent { selector: u64 },
    StackSegment { selector: u64 },
    GeneralProtection { code: u64 },
    PageFault { addr: u64, code: u64 },
    X87FloatingPoint,
    AlignmentCheck,
    MachineCheck,
    SimdFloatingPoint,
    Virtualization,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DivideError => f.write_str("divide error"),
            Self::Debug => f.write_str("debug"),
            Self::NonMaskable => f.write_str("non-maskable interrupt"),
            Self::Breakpoint => f.write_str("breakpoint"),
            Self::Overflow => f.write_str("overflow"),
            Self::BoundRange => f.write_str("bound range exceeded"),
            Self::InvalidOpcode => f.write_str("invalid opcode"),
            Self::DeviceNotAvailable => f.write_str("device not available"),
            Self::DoubleFault => f.write_str("double fault"),
            Self::InvalidTss { selector } => write!(f, "invalid TSS ({selector:#x})"),
            Self::SegmentNotPresent { selector } => write!(f, "segment not present ({selector:#x})"),
            Self::StackSegment { selector } => write!(f, "stack segment fault ({selector:#x})"),
            Self::GeneralProtection { code } => write!(f, "general protection fault ({code:#x})"),
            Self::PageFault { addr, code } => write!(f, "page fault at {addr:#x} ({code:#x})"),
            Self::X87FloatingPoint => f.write_str("x87 floating point"),
            Self::AlignmentCheck => f.write_str("alignment check"),
            Self::MachineCheck => f.write_str("machine check"),
            Self::SimdFloatingPoint => f.write_str("SIMD floating point"),
            Self::Virtualization => f.write_str("virtualization"),
        }
    }
}
