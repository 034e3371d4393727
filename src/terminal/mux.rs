use core::ops::{Index, IndexMut};

use crate::config::TERMINAL_COUNT;
use crate::hw::{VideoMemory, VideoPage};
use crate::process::Pid;
use crate::terminal::{Terminal, TerminalId, TextPage};

/// All terminals and which one owns the screen.
pub struct Terminals {
    terms: [Terminal; TERMINAL_COUNT],
    foreground: TerminalId,
}

impl Terminals {
    pub fn new() -> Self {
        Self { terms: core::array::from_fn(|_| Terminal::new()), foreground: TerminalId::FIRST }
    }

    pub fn foreground(&self) -> TerminalId {
        self.foreground
    }

    /// The page a terminal's output currently lands on.
    pub fn page_of(&self, tid: TerminalId) -> VideoPage {
        if tid == self.foreground {
            VideoPage::Live
        } else {
            VideoPage::Backing(tid)
        }
    }

    pub fn write(&mut self, tid: TerminalId, bytes: &[u8], video: &mut impl VideoMemory) {
        let page = self.page_of(tid);
        let term = &mut self.terms[tid.index()];
        video.page_mut(page).write(&mut term.cursor, bytes);
        if page == VideoPage::Live {
            video.set_cursor(term.cursor.row, term.cursor.col);
        }
    }

    pub fn clear(&mut self, tid: TerminalId, video: &mut impl VideoMemory) {
        let page = self.page_of(tid);
        video.page_mut(page).clear();
        self.terms[tid.index()].cursor = Default::default();
        if page == VideoPage::Live {
            video.set_cursor(0, 0);
        }
    }

    /// Moves `target` onto the screen, parking the old foreground's contents
    /// in its backing page. Returns false if `target` was already showing.
    pub fn bring_forward(&mut self, target: TerminalId, video: &mut impl VideoMemory) -> bool {
        let outgoing = self.foreground;
        if outgoing == target {
            return false;
        }
        let live: TextPage = video.page_mut(VideoPage::Live).clone();
        *video.page_mut(VideoPage::Backing(outgoing)) = live;
        let incoming: TextPage = video.page_mut(VideoPage::Backing(target)).clone();
        *video.page_mut(VideoPage::Live) = incoming;

        self.foreground = target;
        let cursor = self.terms[target.index()].cursor;
        video.set_cursor(cursor.row, cursor.col);
        log::debug!("terminal {outgoing} -> {target}");
        true
    }

    /// First terminal after `from`, in circular order and ending with `from`
    /// itself, that has a process of record.
    pub fn next_owned_after(&self, from: TerminalId) -> Option<(TerminalId, Pid)> {
        let mut tid = from;
        for _ in 0..TERMINAL_COUNT {
            tid = tid.next();
            if let Some(pid) = self.terms[tid.index()].owner {
                return Some((tid, pid));
            }
        }
        None
    }
}

impl Default for Terminals {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<TerminalId> for Terminals {
    type Output = Terminal;

    fn index(&self, tid: TerminalId) -> &Terminal {
        &self.terms[tid.index()]
    }
}

impl IndexMut<TerminalId> for Terminals {
    fn index_mut(&mut self, tid: TerminalId) -> &mut Terminal {
        &mut self.terms[tid.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHardware;

    fn tid(i: usize) -> TerminalId {
        TerminalId::new(i).unwrap()
    }

    #[test]
    fn test_background_output_goes_to_backing_page() {
        let mut hw = FakeHardware::new();
        let mut terms = Terminals::new();
        terms.write(tid(1), b"bg", &mut hw);
        assert_eq!(hw.page_mut(VideoPage::Backing(tid(1))).char_at(0, 0), b'b');
        assert_eq!(hw.page_mut(VideoPage::Live).char_at(0, 0), b' ');
    }

    #[test]
    fn test_switch_round_trip_restores_display() {
        let mut hw = FakeHardware::new();
        let mut terms = Terminals::new();
        terms.write(tid(0), b"terminal zero\n> ", &mut hw);
        terms.write(tid(1), b"one", &mut hw);
        let before = hw.page_mut(VideoPage::Live).clone();
        let cursor_before = hw.cursor;

        assert!(terms.bring_forward(tid(1), &mut hw));
        assert_eq!(hw.page_mut(VideoPage::Live).char_at(0, 0), b'o');
        assert_eq!(hw.cursor, (0, 3));
        terms.write(tid(0), b"more", &mut hw);

        assert!(terms.bring_forward(tid(0), &mut hw));
        let after = hw.page_mut(VideoPage::Live).clone();
        assert_eq!(after.char_at(1, 2), b'm');
        assert_eq!(&after.cells()[..80], &before.cells()[..80]);
        assert_eq!(hw.cursor, (cursor_before.0, cursor_before.1 + 4));
    }

    #[test]
    fn test_switch_to_foreground_is_noop() {
        let mut hw = FakeHardware::new();
        let mut terms = Terminals::new();
        assert!(!terms.bring_forward(tid(0), &mut hw));
        assert_eq!(terms.foreground(), tid(0));
    }

    #[test]
    fn test_next_owned_after_wraps() {
        let mut terms = Terminals::new();
        let a = Pid::from_index(0).unwrap();
        let b = Pid::from_index(3).unwrap();
        terms[tid(0)].owner = Some(a);
        terms[tid(2)].owner = Some(b);
        assert_eq!(terms.next_owned_after(tid(0)), Some((tid(2), b)));
        assert_eq!(terms.next_owned_after(tid(2)), Some((tid(0), a)));
        terms[tid(2)].owner = None;
        assert_eq!(terms.next_owned_after(tid(0)), Some((tid(0), a)));
    }
}
