//! Host-side fakes for the hardware traits and a builder for boot images.

use std::collections::BTreeMap;

use crate::config::{
    KernelConfig, ENTRY_OFFSET, EXECUTABLE_MAGIC, NAME_LEN, REGION_SIZE, SCREEN_COLS,
    USER_WINDOW_START,
};
use crate::error::{SysError, SysResult};
use crate::fs::{BootFs, BLOCK_SIZE};
use crate::hw::{InterruptController, Irq, Mmu, VideoMemory, VideoPage};
use crate::kernel::{Kernel, Transfer};
use crate::memory::PageDirectory;
use crate::process::Pid;
use crate::syscalls::{user_range, UserMemory};
use crate::terminal::TextPage;

pub const POOL_BASE: u64 = REGION_SIZE;
pub const SHELL_ENTRY: u32 = 0x0804_8094;
pub const PROG_ENTRY: u32 = 0x0804_80e8;
pub const FRAME0_TEXT: &[u8] = b"/\\/\\/\\/\\/\\/\\/\\/\\\n  fish swims here  \n~~~~~~~~~~~~~~~~~\n";

pub type TestKernel = Kernel<FakeHardware, BootFs<'static>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqEvent {
    Enable(Irq),
    Disable(Irq),
    EndOfInterrupt(Irq),
}

pub struct FakeHardware {
    pub active_space: Option<Pid>,
    pub activations: usize,
    pub memory: BTreeMap<u64, u8>,
    /// Index 0 is the live page, `1 + t` the backing page of terminal `t`.
    pub pages: [TextPage; 4],
    pub cursor: (usize, usize),
    pub irq_log: Vec<IrqEvent>,
}

impl FakeHardware {
    pub fn new() -> Self {
        Self {
            active_space: None,
            activations: 0,
            memory: BTreeMap::new(),
            pages: core::array::from_fn(|_| TextPage::blank()),
            cursor: (0, 0),
            irq_log: Vec::new(),
        }
    }

    pub fn read_phys(&self, phys: u64, len: usize) -> Vec<u8> {
        (phys..phys + len as u64)
            .map(|a| self.memory.get(&a).copied().unwrap_or(0))
            .collect()
    }

    fn slot(page: VideoPage) -> usize {
        match page {
            VideoPage::Live => 0,
            VideoPage::Backing(tid) => 1 + tid.index(),
        }
    }

    pub fn row_text(&self, page: VideoPage, row: usize) -> String {
        let page = &self.pages[Self::slot(page)];
        (0..SCREEN_COLS).map(|col| char::from(page.char_at(row, col))).collect()
    }
}

impl Mmu for FakeHardware {
    fn activate(&mut self, pid: Pid, _directory: &PageDirectory) {
        self.active_space = Some(pid);
        self.activations += 1;
    }

    fn write_phys(&mut self, phys: u64, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.memory.insert(phys + i as u64, b);
        }
    }
}

impl VideoMemory for FakeHardware {
    fn page_phys(&self, page: VideoPage) -> u64 {
        match page {
            VideoPage::Live => 0xb8000,
            VideoPage::Backing(tid) => 0xb9000 + tid.index() as u64 * 0x1000,
        }
    }

    fn page_mut(&mut self, page: VideoPage) -> &mut TextPage {
        &mut self.pages[Self::slot(page)]
    }

    fn set_cursor(&mut self, row: usize, col: usize) {
        self.cursor = (row, col);
    }
}

impl InterruptController for FakeHardware {
    fn enable(&mut self, irq: Irq) {
        self.irq_log.push(IrqEvent::Enable(irq));
    }

    fn disable(&mut self, irq: Irq) {
        self.irq_log.push(IrqEvent::Disable(irq));
    }

    fn end_of_interrupt(&mut self, irq: Irq) {
        self.irq_log.push(IrqEvent::EndOfInterrupt(irq));
    }
}

enum Entry {
    Device,
    Directory,
    File(Vec<u8>),
}

/// Lays out a boot image: boot block, one inode per regular file, then data.
pub struct ImageBuilder {
    entries: Vec<(String, Entry)>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn directory(mut self, name: &str) -> Self {
        self.entries.push((name.to_string(), Entry::Directory));
        self
    }

    pub fn device(mut self, name: &str) -> Self {
        self.entries.push((name.to_string(), Entry::Device));
        self
    }

    pub fn file(mut self, name: &str, contents: &[u8]) -> Self {
        self.entries.push((name.to_string(), Entry::File(contents.to_vec())));
        self
    }

    /// An executable of `len` bytes whose header names `entry`.
    pub fn program(self, name: &str, entry: u32, len: usize) -> Self {
        let mut bytes: Vec<u8> = (0..len).map(|i| (i % 199) as u8).collect();
        bytes[..4].copy_from_slice(&EXECUTABLE_MAGIC);
        bytes[ENTRY_OFFSET..ENTRY_OFFSET + 4].copy_from_slice(&entry.to_le_bytes());
        self.file(name, &bytes)
    }

    pub fn build(self) -> Vec<u8> {
        let files: Vec<&Vec<u8>> = self
            .entries
            .iter()
            .filter_map(|(_, e)| match e {
                Entry::File(bytes) => Some(bytes),
                _ => None,
            })
            .collect();
        let inodes = files.len();
        let data_blocks: usize = files.iter().map(|f| f.len().div_ceil(BLOCK_SIZE)).sum();
        let mut image = vec![0u8; (1 + inodes + data_blocks) * BLOCK_SIZE];

        let put = |image: &mut Vec<u8>, at: usize, v: u32| {
            image[at..at + 4].copy_from_slice(&v.to_le_bytes());
        };
        put(&mut image, 0, self.entries.len() as u32);
        put(&mut image, 4, inodes as u32);
        put(&mut image, 8, data_blocks as u32);

        let mut inode = 0;
        let mut block = 0;
        for (i, (name, entry)) in self.entries.iter().enumerate() {
            let at = 64 + 64 * i;
            let name = name.as_bytes();
            assert!(name.len() <= NAME_LEN);
            image[at..at + name.len()].copy_from_slice(name);
            let (kind, number) = match entry {
                Entry::Device => (0, 0),
                Entry::Directory => (1, 0),
                Entry::File(bytes) => {
                    let inode_at = (1 + inode) * BLOCK_SIZE;
                    put(&mut image, inode_at, bytes.len() as u32);
                    for (nth, chunk) in bytes.chunks(BLOCK_SIZE).enumerate() {
                        put(&mut image, inode_at + 4 + nth * 4, block as u32);
                        let data_at = (1 + inodes + block) * BLOCK_SIZE;
                        image[data_at..data_at + chunk.len()].copy_from_slice(chunk);
                        block += 1;
                    }
                    inode += 1;
                    (2, inode as u32 - 1)
                }
            };
            put(&mut image, at + NAME_LEN, kind);
            put(&mut image, at + NAME_LEN + 4, number);
        }
        image
    }
}

pub fn standard_image() -> ImageBuilder {
    ImageBuilder::new()
        .directory(".")
        .device("rtc")
        .program("shell", SHELL_ENTRY, 5349)
        .program("prog", PROG_ENTRY, 2000)
        .file("frame0.txt", FRAME0_TEXT)
}

/// A kernel over `image` that has not started its shell yet.
pub fn kernel(image: Vec<u8>) -> TestKernel {
    let image: &'static [u8] = Vec::leak(image);
    let fs = BootFs::mount(image).expect("test image mounts");
    Kernel::new(FakeHardware::new(), fs, KernelConfig::DEFAULT, POOL_BASE)
}

/// A kernel with the standard image whose root shell is running.
pub fn booted() -> (TestKernel, Transfer) {
    let mut k = kernel(standard_image().build());
    let transfer = k.start().expect("boot shell starts");
    (k, transfer)
}

/// The first bytes of the user window, backed by a plain buffer.
pub struct FakeUser {
    pub window: Vec<u8>,
}

impl FakeUser {
    pub const SIZE: usize = 64 * 1024;

    pub fn new() -> Self {
        Self { window: vec![0; Self::SIZE] }
    }

    pub fn put(&mut self, addr: u64, bytes: &[u8]) {
        let at = (addr - USER_WINDOW_START) as usize;
        self.window[at..at + bytes.len()].copy_from_slice(bytes);
    }

    pub fn get(&self, addr: u64, len: usize) -> &[u8] {
        let at = (addr - USER_WINDOW_START) as usize;
        &self.window[at..at + len]
    }

    fn offset(&self, addr: u64, len: usize) -> SysResult<usize> {
        user_range(addr, len)?;
        let at = (addr - USER_WINDOW_START) as usize;
        if at + len > self.window.len() {
            return Err(SysError::InvalidArgument);
        }
        Ok(at)
    }
}

impl UserMemory for FakeUser {
    fn bytes(&self, addr: u64, len: usize) -> SysResult<&[u8]> {
        if len == 0 {
            return Ok(&[]);
        }
        let at = self.offset(addr, len)?;
        Ok(&self.window[at..at + len])
    }

    fn bytes_mut(&mut self, addr: u64, len: usize) -> SysResult<&mut [u8]> {
        if len == 0 {
            return Ok(&mut []);
        }
        let at = self.offset(addr, len)?;
        Ok(&mut self.window[at..at + len])
    }
}
