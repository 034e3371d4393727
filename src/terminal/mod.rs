//! Virtual terminals: text pages, the line discipline and the multiplexer.

mod mux;
mod screen;

pub use mux::Terminals;
pub use screen::{Cursor, TextPage};

use core::fmt;
use core::task::Poll;

use arrayvec::ArrayVec;

use crate::config::{LINE_LEN, TERMINAL_COUNT};
use crate::process::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerminalId(u8);

impl TerminalId {
    pub const FIRST: TerminalId = TerminalId(0);

    pub fn new(index: usize) -> Option<TerminalId> {
        (index < TERMINAL_COUNT).then_some(TerminalId(index as u8))
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// The next terminal in circular order.
    pub fn next(self) -> TerminalId {
        TerminalId((self.0 + 1) % TERMINAL_COUNT as u8)
    }

    pub fn all() -> impl Iterator<Item = TerminalId> {
        (0..TERMINAL_COUNT as u8).map(TerminalId)
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tty{}", self.0)
    }
}

/// Per-terminal input and ownership state.
pub struct Terminal {
    /// Process of record: the one reading this terminal's input.
    pub owner: Option<Pid>,
    pub cursor: Cursor,
    editing: ArrayVec<u8, LINE_LEN>,
    completed: ArrayVec<u8, LINE_LEN>,
    ready: bool,
    interrupt: bool,
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            owner: None,
            cursor: Cursor::default(),
            editing: ArrayVec::new(),
            completed: ArrayVec::new(),
            ready: false,
            interrupt: false,
        }
    }

    /// Appends a typed byte. Returns whether it was accepted (and should be
    /// echoed). One byte is held back for the newline.
    pub fn push_input(&mut self, byte: u8) -> bool {
        if self.editing.len() + 1 >= LINE_LEN {
            return false;
        }
        self.editing.push(byte);
        true
    }

    pub fn erase_input(&mut self) -> bool {
        self.editing.pop().is_some()
    }

    /// Publishes the edited line, newline included, for the next read.
    pub fn submit_line(&mut self) {
        self.editing.push(b'\n');
        self.completed.clear();
        self.completed.extend(self.editing.drain(..));
        self.ready = true;
    }

    pub fn pending_input(&self) -> &[u8] {
        &self.editing
    }

    /// Hands out the completed line, truncated to `buf`.
    pub fn take_line(&mut self, buf: &mut [u8]) -> Poll<usize> {
        if !self.ready {
            return Poll::Pending;
        }
        let n = buf.len().min(self.completed.len());
        buf[..n].copy_from_slice(&self.completed[..n]);
        self.completed.clear();
        self.ready = false;
        Poll::Ready(n)
    }

    pub fn request_interrupt(&mut self) {
        self.interrupt = true;
    }

    pub fn take_interrupt(&mut self) -> bool {
        core::mem::take(&mut self.interrupt)
    }

    /// Drops input and pending requests left over by a dead owner.
    pub fn reset_input(&mut self) {
        self.editing.clear();
        self.completed.clear();
        self.ready = false;
        self.interrupt = false;
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_ids_cycle() {
        let ids: Vec<_> = TerminalId::all().collect();
        assert_eq!(ids.len(), TERMINAL_COUNT);
        assert_eq!(ids[TERMINAL_COUNT - 1].next(), TerminalId::FIRST);
        assert!(TerminalId::new(TERMINAL_COUNT).is_none());
    }

    #[test]
    fn test_read_blocks_until_enter() {
        let mut term = Terminal::new();
        let mut buf = [0; 16];
        assert_eq!(term.take_line(&mut buf), Poll::Pending);
        for &b in b"ls" {
            assert!(term.push_input(b));
        }
        assert_eq!(term.take_line(&mut buf), Poll::Pending);
        term.submit_line();
        assert_eq!(term.take_line(&mut buf), Poll::Ready(3));
        assert_eq!(&buf[..3], b"ls\n");
        assert_eq!(term.take_line(&mut buf), Poll::Pending);
    }

    #[test]
    fn test_short_read_truncates() {
        let mut term = Terminal::new();
        for &b in b"hello" {
            term.push_input(b);
        }
        term.submit_line();
        let mut buf = [0; 2];
        assert_eq!(term.take_line(&mut buf), Poll::Ready(2));
        assert_eq!(&buf, b"he");
    }

    #[test]
    fn test_line_capacity_keeps_room_for_newline() {
        let mut term = Terminal::new();
        let accepted = (0..LINE_LEN * 2).filter(|_| term.push_input(b'a')).count();
        assert_eq!(accepted, LINE_LEN - 1);
        term.submit_line();
        let mut buf = [0; LINE_LEN];
        assert_eq!(term.take_line(&mut buf), Poll::Ready(LINE_LEN));
        assert_eq!(buf[LINE_LEN - 1], b'\n');
    }

    #[test]
    fn test_backspace() {
        let mut term = Terminal::new();
        assert!(!term.erase_input());
        term.push_input(b'x');
        term.push_input(b'y');
        assert!(term.erase_input());
        assert_eq!(term.pending_input(), b"x");
    }

    #[test]
    fn test_interrupt_flag_is_consumed() {
        let mut term = Terminal::new();
        assert!(!term.take_interrupt());
        term.request_interrupt();
        assert!(term.take_interrupt());
        assert!(!term.take_interrupt());
    }
}
