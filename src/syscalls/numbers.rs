//! System call numbers, passed in `rax` with `int 0x80`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SyscallNumber {
    // Process control
    Halt = 1,
    Execute = 2,

    // I/O
    Read = 3,
    Write = 4,
    Open = 5,
    Close = 6,

    // Process environment
    GetArgs = 7,
    Vidmap = 8,

    // Signals
    SetHandler = 9,
    Sigreturn = 10,

    Unknown = usize::MAX,
}

impl From<usize> for SyscallNumber {
    fn from(num: usize) -> Self {
        match num {
            1 => Self::Halt,
            2 => Self::Execute,
            3 => Self::Read,
            4 => Self::Write,
            5 => Self::Open,
            6 => Self::Close,
            7 => Self::GetArgs,
            8 => Self::Vidmap,
            9 => Self::SetHandler,
            10 => Self::Sigreturn,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_round_trip() {
        for n in 1..=10usize {
            assert_eq!(SyscallNumber::from(n) as usize, n);
        }
        assert_eq!(SyscallNumber::from(0), SyscallNumber::Unknown);
        assert_eq!(SyscallNumber::from(11), SyscallNumber::Unknown);
    }
}
