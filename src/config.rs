//! Fixed capacities, memory layout and boot-time tunables.

/// Process slots, including the permanent terminal-0 root in slot 0.
pub const MAX_PROCESSES: usize = 7;
/// Descriptor slots per process; 0 and 1 are stdin and stdout.
pub const MAX_FDS: usize = 8;
/// Virtual terminals.
pub const TERMINAL_COUNT: usize = 3;

/// Longest file or program name.
pub const NAME_LEN: usize = 32;
/// Capacity of a command string, an argument buffer and a terminal line.
pub const COMMAND_LEN: usize = 128;
pub const LINE_LEN: usize = 128;

pub const SCREEN_COLS: usize = 80;
pub const SCREEN_ROWS: usize = 25;
pub const TEXT_ATTRIBUTE: u8 = 0x07;

/// Size of one directory region.
pub const REGION_SIZE: u64 = 4 * 1024 * 1024;
pub const SMALL_PAGE_SIZE: u64 = 4096;
pub const DIRECTORY_ENTRIES: usize = 1024;

/// Shared kernel region, present in every address space.
pub const KERNEL_VIRT: u64 = 0x0040_0000;
/// The user program window: one region holding image, data and stack.
pub const USER_WINDOW_START: u64 = 0x0800_0000;
pub const USER_WINDOW_END: u64 = USER_WINDOW_START + REGION_SIZE;
/// Where program images are copied and linked to run.
pub const PROGRAM_LOAD_VIRT: u64 = 0x0804_8000;
pub const PROGRAM_CAPACITY: usize = (USER_WINDOW_END - PROGRAM_LOAD_VIRT) as usize;
pub const USER_STACK_TOP: u64 = USER_WINDOW_END - 16;
/// Where vidmap exposes the display page.
pub const VIDMAP_VIRT: u64 = USER_WINDOW_END;

pub const EXECUTABLE_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
/// Byte offset of the little-endian entry address in an image.
pub const ENTRY_OFFSET: usize = 24;

/// Status reported to a parent whose child died by exception or was killed.
pub const EXCEPTION_STATUS: u32 = 256;

/// Base frequency of the periodic RTC interrupt.
pub const RTC_BASE_HZ: u32 = 1024;
pub const RTC_DEFAULT_HZ: u32 = 2;
pub const RTC_MIN_HZ: u32 = 2;

pub const PIT_INPUT_HZ: u32 = 1_193_182;

/// Tunables chosen at boot.
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    /// Program launched as the root of every terminal.
    pub shell: &'static [u8],
    /// PIT channel 0 reload value; sets the scheduling quantum.
    pub pit_divisor: u16,
    pub log_level: log::LevelFilter,
}

impl KernelConfig {
    pub const DEFAULT: Self = Self {
        shell: b"shell",
        pit_divisor: 25_000,
        log_level: log::LevelFilter::Info,
    };

    pub fn scheduler_hz(&self) -> u32 {
        PIT_INPUT_HZ / u32::from(self.pit_divisor.max(1))
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
