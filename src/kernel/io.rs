use core::task::Poll;

use crate::config::{USER_WINDOW_END, USER_WINDOW_START, VIDMAP_VIRT};
use crate::error::{SysError, SysResult};
use crate::fd::{Access, Capability, FileDescriptor};
use crate::fs::{FileKind, FileStore};
use crate::hw::{Hardware, VideoMemory};
use crate::kernel::Kernel;
use crate::memory::{Privilege, RegionSize};
use crate::process::Pid;

impl<H: Hardware, F: FileStore> Kernel<H, F> {
    pub fn open(&mut self, name: &[u8]) -> SysResult<usize> {
        let pid = self.running()?;
        let dentry = self.fs.lookup(name).ok_or(SysError::NotFound)?;
        let descriptor = match dentry.kind {
            FileKind::Regular => {
                FileDescriptor::new(Capability::File { inode: dentry.inode }, Access::ReadOnly)
            }
            FileKind::Directory => FileDescriptor::new(Capability::Directory, Access::ReadOnly),
            FileKind::Device => FileDescriptor::new(Capability::Rtc, Access::ReadWrite),
        };
        let fd = self.procs[pid].fds.install(descriptor)?;
        if descriptor.capability == Capability::Rtc {
            self.rtc.open(pid);
        }
        log::debug!("{pid} opened fd {fd} as {:?}", descriptor.capability);
        Ok(fd)
    }

    pub fn close(&mut self, fd: usize) -> SysResult<()> {
        let pid = self.running()?;
        let fds = &mut self.procs[pid].fds;
        let closed = fds.remove(fd)?;
        if closed.capability == Capability::Rtc && !fds.any(|d| d.capability == Capability::Rtc) {
            self.rtc.close(pid);
        }
        log::debug!("{pid} closed fd {fd}");
        Ok(())
    }

    fn descriptor(&self, fd: usize) -> SysResult<(Pid, FileDescriptor)> {
        let pid = self.running()?;
        Ok((pid, *self.procs[pid].fds.get(fd)?))
    }

    /// `Pending` means the caller has to wait for an interrupt and retry.
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Poll<SysResult<usize>> {
        let (pid, descriptor) = match self.descriptor(fd) {
            Ok(found) => found,
            Err(err) => return Poll::Ready(Err(err)),
        };
        if !descriptor.access.can_read() {
            return Poll::Ready(Err(SysError::PermissionDenied));
        }

        match descriptor.capability {
            Capability::File { inode } => {
                Poll::Ready(self.read_file(pid, fd, inode, descriptor.position, buf))
            }
            Capability::Directory => Poll::Ready(self.read_directory(pid, fd, descriptor.position, buf)),
            Capability::Rtc => {
                if self.rtc.take_ready(pid) {
                    Poll::Ready(Ok(0))
                } else {
                    Poll::Pending
                }
            }
            Capability::Terminal(tid) => self.terms[tid].take_line(buf).map(Ok),
        }
    }

    fn read_file(
        &mut self,
        pid: Pid,
        fd: usize,
        inode: u32,
        position: usize,
        buf: &mut [u8],
    ) -> SysResult<usize> {
        let n = self.fs.read(inode, position, buf)?;
        self.procs[pid].fds.get_mut(fd)?.position += n;
        Ok(n)
    }

    /// One file name per call; 0 once every entry has been listed.
    fn read_directory(
        &mut self,
        pid: Pid,
        fd: usize,
        position: usize,
        buf: &mut [u8],
    ) -> SysResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let Some(dentry) = self.fs.dentry_at(position) else {
            return Ok(0);
        };
        let name = dentry.name();
        let n = name.len().min(buf.len());
        buf[..n].copy_from_slice(&name[..n]);
        self.procs[pid].fds.get_mut(fd)?.position += 1;
        Ok(n)
    }

    pub fn write(&mut self, fd: usize, buf: &[u8]) -> SysResult<usize> {
        let (pid, descriptor) = self.descriptor(fd)?;
        if !descriptor.access.can_write() {
            return Err(SysError::PermissionDenied);
        }

        match descriptor.capability {
            Capability::Terminal(tid) => {
                self.terms.write(tid, buf, &mut self.hw);
                Ok(buf.len())
            }
            Capability::Rtc => {
                let rate: [u8; 4] = buf.try_into().map_err(|_| SysError::InvalidArgument)?;
                self.rtc.set_rate(pid, u32::from_le_bytes(rate))?;
                Ok(buf.len())
            }
            Capability::File { .. } | Capability::Directory => Err(SysError::PermissionDenied),
        }
    }

    /// Copies the argument string plus a NUL terminator into `buf`.
    pub fn getargs(&mut self, buf: &mut [u8]) -> SysResult<()> {
        let pid = self.running()?;
        let args = &self.procs[pid].args;
        if args.is_empty() || args.len() + 1 > buf.len() {
            return Err(SysError::InvalidArgument);
        }
        buf[..args.len()].copy_from_slice(args);
        buf[args.len()] = 0;
        Ok(())
    }

    /// Maps the caller's display page and returns its user address.
    ///
    /// `out_addr` is where the caller wants the address stored; it has to lie
    /// inside the program window.
    pub fn vidmap(&mut self, out_addr: u64) -> SysResult<u64> {
        let pid = self.running()?;
        let end = out_addr.checked_add(8).ok_or(SysError::InvalidArgument)?;
        if out_addr < USER_WINDOW_START || end > USER_WINDOW_END {
            return Err(SysError::InvalidArgument);
        }

        let process = &self.procs[pid];
        if !process.display_mapped {
            let phys = self.hw.page_phys(self.terms.page_of(process.terminal));
            self.spaces
                .map_region(pid, VIDMAP_VIRT, phys, RegionSize::Small, Privilege::User, &mut self.hw)
                .map_err(|err| {
                    log::error!("vidmap for {pid}: {err}");
                    SysError::Fault
                })?;
            self.procs[pid].display_mapped = true;
        }
        Ok(VIDMAP_VIRT)
    }

    /// Signals are not delivered; registering a handler always fails.
    pub fn set_handler(&mut self, _signum: usize, _handler: u64) -> SysResult<()> {
        Err(SysError::InvalidArgument)
    }

    pub fn sigreturn(&mut self) -> SysResult<()> {
        Err(SysError::InvalidArgument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MAX_FDS, RTC_BASE_HZ};
    use crate::hw::VideoPage;
    use crate::testing::{booted, TestKernel, FRAME0_TEXT};

    fn drain_file(k: &mut TestKernel, fd: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0; 7];
        loop {
            match k.read(fd, &mut buf) {
                Poll::Ready(Ok(0)) => return out,
                Poll::Ready(Ok(n)) => out.extend_from_slice(&buf[..n]),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_close_rules() {
        let (mut k, _) = booted();
        assert_eq!(k.close(0), Err(SysError::PermissionDenied));
        assert_eq!(k.close(1), Err(SysError::PermissionDenied));
        assert_eq!(k.close(2), Err(SysError::InvalidArgument));
        assert_eq!(k.close(MAX_FDS), Err(SysError::InvalidArgument));

        let fd = k.open(b"frame0.txt").unwrap();
        assert_eq!(fd, 2);
        assert_eq!(k.close(fd), Ok(()));
        assert_eq!(k.close(fd), Err(SysError::InvalidArgument));
        assert_eq!(k.open(b"."), Ok(fd));
    }

    #[test]
    fn test_open_missing_and_full() {
        let (mut k, _) = booted();
        assert_eq!(k.open(b"nope"), Err(SysError::NotFound));
        for _ in 2..MAX_FDS {
            k.open(b"frame0.txt").unwrap();
        }
        assert_eq!(k.open(b"frame0.txt"), Err(SysError::ResourceExhausted));
        assert_eq!(k.open(b"nope"), Err(SysError::NotFound));
    }

    #[test]
    fn test_file_read_advances_cursor() {
        let (mut k, _) = booted();
        let fd = k.open(b"frame0.txt").unwrap();
        assert_eq!(drain_file(&mut k, fd), FRAME0_TEXT);
        let again = k.open(b"frame0.txt").unwrap();
        let mut buf = [0; 4];
        assert_eq!(k.read(again, &mut buf), Poll::Ready(Ok(4)));
        assert_eq!(&buf, &FRAME0_TEXT[..4]);
    }

    #[test]
    fn test_directory_lists_names_then_ends() {
        let (mut k, _) = booted();
        let fd = k.open(b".").unwrap();
        let mut names = Vec::new();
        let mut buf = [0; 32];
        while let Poll::Ready(Ok(n)) = k.read(fd, &mut buf) {
            if n == 0 {
                break;
            }
            names.push(String::from_utf8(buf[..n].to_vec()).unwrap());
        }
        assert_eq!(names[0], ".");
        assert!(names.iter().any(|n| n == "shell"));
        assert!(names.iter().any(|n| n == "rtc"));
        assert_eq!(k.read(fd, &mut buf), Poll::Ready(Ok(0)));
    }

    #[test]
    fn test_empty_directory_read_keeps_position() {
        let (mut k, _) = booted();
        let fd = k.open(b".").unwrap();
        assert_eq!(k.read(fd, &mut []), Poll::Ready(Ok(0)));
        let mut buf = [0; 32];
        assert_eq!(k.read(fd, &mut buf), Poll::Ready(Ok(1)));
        assert_eq!(buf[0], b'.');
    }

    #[test]
    fn test_file_store_is_read_only() {
        let (mut k, _) = booted();
        let file = k.open(b"frame0.txt").unwrap();
        let dir = k.open(b".").unwrap();
        assert_eq!(k.write(file, b"x"), Err(SysError::PermissionDenied));
        assert_eq!(k.write(dir, b"x"), Err(SysError::PermissionDenied));
    }

    #[test]
    fn test_stdio_directions() {
        let (mut k, _) = booted();
        let mut buf = [0; 4];
        assert_eq!(k.write(0, b"x"), Err(SysError::PermissionDenied));
        assert_eq!(k.read(1, &mut buf), Poll::Ready(Err(SysError::PermissionDenied)));
        assert_eq!(k.read(0, &mut buf), Poll::Pending);
        assert_eq!(k.read(6, &mut buf), Poll::Ready(Err(SysError::InvalidArgument)));

        assert_eq!(k.write(1, b"391OS> "), Ok(7));
        assert!(k.hardware().row_text(VideoPage::Live, 0).starts_with("391OS> "));
    }

    #[test]
    fn test_rtc_read_blocks_until_rate_tick() {
        let (mut k, _) = booted();
        let fd = k.open(b"rtc").unwrap();
        let mut buf = [0; 4];
        assert_eq!(k.write(fd, &3u32.to_le_bytes()), Err(SysError::InvalidArgument));
        assert_eq!(k.write(fd, &[8, 0]), Err(SysError::InvalidArgument));
        assert_eq!(k.write(fd, &8u32.to_le_bytes()), Ok(4));

        assert_eq!(k.read(fd, &mut buf), Poll::Pending);
        for _ in 0..RTC_BASE_HZ / 8 - 1 {
            k.on_rtc();
        }
        assert_eq!(k.read(fd, &mut buf), Poll::Pending);
        k.on_rtc();
        assert_eq!(k.read(fd, &mut buf), Poll::Ready(Ok(0)));
        assert_eq!(k.read(fd, &mut buf), Poll::Pending);

        k.close(fd).unwrap();
        for _ in 0..RTC_BASE_HZ {
            k.on_rtc();
        }
        assert_eq!(k.read(fd, &mut buf), Poll::Ready(Err(SysError::InvalidArgument)));
    }

    #[test]
    fn test_getargs() {
        let (mut k, _) = booted();
        let mut buf = [0xff; 32];
        assert_eq!(k.getargs(&mut buf), Err(SysError::InvalidArgument));

        k.execute(b"prog a b c").unwrap();
        assert_eq!(k.getargs(&mut buf), Ok(()));
        assert_eq!(&buf[..6], b"a b c\0");

        let mut tight = [0; 5];
        assert_eq!(k.getargs(&mut tight), Err(SysError::InvalidArgument));
        let mut exact = [0; 6];
        assert_eq!(k.getargs(&mut exact), Ok(()));
    }

    #[test]
    fn test_vidmap_validates_pointer() {
        let (mut k, _) = booted();
        let pid = k.current().unwrap();
        for bad in [0, USER_WINDOW_START - 8, USER_WINDOW_END - 4, USER_WINDOW_END, u64::MAX - 2] {
            assert_eq!(k.vidmap(bad), Err(SysError::InvalidArgument));
        }
        assert!(k.address_spaces().directory(pid).mapping(VIDMAP_VIRT).is_none());
        assert!(!k.process(pid).unwrap().display_mapped);
    }

    #[test]
    fn test_vidmap_maps_live_page_for_foreground() {
        let (mut k, _) = booted();
        let pid = k.current().unwrap();
        assert_eq!(k.vidmap(USER_WINDOW_START + 0x1000), Ok(VIDMAP_VIRT));
        let mapping = k.address_spaces().directory(pid).mapping(VIDMAP_VIRT).unwrap();
        assert_eq!(mapping.phys, k.hardware().page_phys(VideoPage::Live));
        assert_eq!(mapping.privilege, Privilege::User);
        assert_eq!(mapping.size, RegionSize::Small);
        assert_eq!(k.vidmap(USER_WINDOW_END - 8), Ok(VIDMAP_VIRT));
    }

    #[test]
    fn test_halt_drops_display_mapping() {
        let (mut k, _) = booted();
        k.execute(b"prog").unwrap();
        let child = k.current().unwrap();
        k.vidmap(USER_WINDOW_START).unwrap();
        k.halt(crate::process::ExitStatus::Code(0)).unwrap();
        assert!(k.address_spaces().directory(child).mapping(VIDMAP_VIRT).is_none());
    }

    #[test]
    fn test_signals_always_fail() {
        let (mut k, _) = booted();
        assert!(k.set_handler(2, 0x0804_8000).is_err());
        assert!(k.sigreturn().is_err());
    }
}
