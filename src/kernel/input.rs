use crate::devices::keyboard::{Key, KeyEvent};
use crate::error::SysResult;
use crate::fs::FileStore;
use crate::hw::{Hardware, InterruptController, Irq};
use crate::kernel::{Kernel, Transfer};
use crate::process::Context;
use crate::terminal::TerminalId;

impl<H: Hardware, F: FileStore> Kernel<H, F> {
    /// Keyboard interrupt with a decoded key. `frame` is the interrupted
    /// flow's context, kept if a terminal switch starts a new shell.
    pub fn on_key(&mut self, event: KeyEvent, frame: Context) -> SysResult<Transfer> {
        self.hw.end_of_interrupt(Irq::Keyboard);
        let fg = self.terms.foreground();

        match event.key {
            Key::Function(n @ 1..=3) if event.alt => {
                if let Some(target) = TerminalId::new(usize::from(n - 1)) {
                    return self.switch_terminal(target, frame);
                }
            }
            Key::Char(b'l' | b'L') if event.ctrl => {
                self.terms.clear(fg, &mut self.hw);
                let mut pending = [0; crate::config::LINE_LEN];
                let typed = self.terms[fg].pending_input();
                let n = typed.len();
                pending[..n].copy_from_slice(typed);
                self.terms.write(fg, &pending[..n], &mut self.hw);
            }
            Key::Char(b'c' | b'C') if event.ctrl => {
                self.terms[fg].request_interrupt();
                self.terms.write(fg, b"^C\n", &mut self.hw);
            }
            Key::Char(byte) if !event.ctrl && !event.alt => {
                if self.terms[fg].push_input(byte) {
                    self.terms.write(fg, &[byte], &mut self.hw);
                }
            }
            Key::Backspace => {
                if self.terms[fg].erase_input() {
                    self.terms.write(fg, b"\x08", &mut self.hw);
                }
            }
            Key::Enter => {
                self.terms[fg].submit_line();
                self.terms.write(fg, b"\n", &mut self.hw);
            }
            _ => {}
        }
        Ok(Transfer::Continue)
    }

    /// Brings `target` to the screen, starting its shell on first use.
    pub fn switch_terminal(&mut self, target: TerminalId, frame: Context) -> SysResult<Transfer> {
        let outgoing = self.terms.foreground();
        if target == outgoing {
            return Ok(Transfer::Continue);
        }
        let needs_shell = self.terms[target].owner.is_none();
        if needs_shell && !self.procs.has_free_slot() {
            log::warn!("no free slot for a shell on {target}, staying on {outgoing}");
            return Ok(Transfer::Continue);
        }

        self.terms.bring_forward(target, &mut self.hw);
        for tid in [outgoing, target] {
            if let Some(owner) = self.terms[tid].owner {
                self.sync_display(owner);
            }
        }
        if !needs_shell {
            return Ok(Transfer::Continue);
        }

        if let Some(interrupted) = self.current {
            self.procs[interrupted].tick_context = frame;
        }
        self.spawn_root(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_PROCESSES;
    use crate::hw::VideoPage;
    use crate::process::Pid;
    use crate::testing::{booted, IrqEvent};

    fn key(key: Key) -> KeyEvent {
        KeyEvent { key, ctrl: false, alt: false, shift: false }
    }

    fn typed(k: &mut crate::testing::TestKernel, text: &[u8]) {
        for &b in text {
            k.on_key(key(Key::Char(b)), Context::default()).unwrap();
        }
    }

    #[test]
    fn test_typing_echoes_and_completes_line() {
        let (mut k, _) = booted();
        typed(&mut k, b"lx");
        k.on_key(key(Key::Backspace), Context::default()).unwrap();
        typed(&mut k, b"s");
        assert_eq!(k.hardware().row_text(VideoPage::Live, 0).trim_end(), "ls");
        k.on_key(key(Key::Enter), Context::default()).unwrap();

        let mut buf = [0; 16];
        assert_eq!(k.read(0, &mut buf), core::task::Poll::Ready(Ok(3)));
        assert_eq!(&buf[..3], b"ls\n");
        assert_eq!(k.hardware().cursor, (1, 0));
    }

    #[test]
    fn test_keyboard_acknowledges_irq() {
        let (mut k, _) = booted();
        k.hardware_mut().irq_log.clear();
        typed(&mut k, b"a");
        assert_eq!(k.hardware().irq_log, vec![IrqEvent::EndOfInterrupt(Irq::Keyboard)]);
    }

    #[test]
    fn test_ctrl_l_clears_and_redraws_pending_input() {
        let (mut k, _) = booted();
        k.write(1, b"old output\n").unwrap();
        typed(&mut k, b"abc");
        let ctrl_l = KeyEvent { key: Key::Char(b'l'), ctrl: true, alt: false, shift: false };
        k.on_key(ctrl_l, Context::default()).unwrap();
        assert_eq!(k.hardware().row_text(VideoPage::Live, 0).trim_end(), "abc");
        assert_eq!(k.hardware().row_text(VideoPage::Live, 1).trim_end(), "");
    }

    #[test]
    fn test_first_switch_spawns_shell_and_saves_interrupted_context() {
        let (mut k, _) = booted();
        let alt_f2 = KeyEvent { key: Key::Function(2), ctrl: false, alt: true, shift: false };
        let transfer = k.on_key(alt_f2, Context { rsp: 0x4242 }).unwrap();
        let Transfer::EnterUser { pid, parent: None, .. } = transfer else {
            panic!("expected a new shell, got {transfer:?}");
        };
        let tty1 = TerminalId::new(1).unwrap();
        assert_eq!(k.process(pid).unwrap().terminal, tty1);
        assert_eq!(k.terminals()[tty1].owner, Some(pid));
        assert_eq!(k.terminals().foreground(), tty1);
        assert_eq!(k.process(Pid::ROOT).unwrap().tick_context.rsp, 0x4242);
        assert!(k.process(Pid::ROOT).unwrap().active);
        assert_eq!(k.current(), Some(pid));

        // A second visit just switches.
        let alt_f1 = KeyEvent { key: Key::Function(1), ..alt_f2 };
        assert_eq!(k.on_key(alt_f1, Context::default()), Ok(Transfer::Continue));
        assert_eq!(k.on_key(alt_f2, Context::default()), Ok(Transfer::Continue));
        assert_eq!(k.processes().occupancy(), 2);
    }

    #[test]
    fn test_switch_round_trip_preserves_screen() {
        let (mut k, _) = booted();
        k.write(1, b"hello from tty0\n391OS> ").unwrap();
        let before = k.hardware().pages[0].clone();
        let cursor = k.hardware().cursor;

        let tty1 = TerminalId::new(1).unwrap();
        k.switch_terminal(tty1, Context::default()).unwrap();
        assert!(k.hardware().pages[0] != before);
        k.switch_terminal(TerminalId::FIRST, Context::default()).unwrap();
        assert!(k.hardware().pages[0] == before);
        assert_eq!(k.hardware().cursor, cursor);
    }

    #[test]
    fn test_switch_refused_when_table_full() {
        let (mut k, _) = booted();
        for _ in 1..MAX_PROCESSES {
            k.execute(b"prog").unwrap();
        }
        let tty2 = TerminalId::new(2).unwrap();
        assert_eq!(k.switch_terminal(tty2, Context::default()), Ok(Transfer::Continue));
        assert_eq!(k.terminals().foreground(), TerminalId::FIRST);
    }
}
