use crate::config::{SCREEN_COLS, SCREEN_ROWS, TEXT_ATTRIBUTE};

const CELLS: usize = SCREEN_COLS * SCREEN_ROWS;

/// One screen of `(ascii | attribute << 8)` cells, page aligned so it can be
/// mapped into user space as is.
#[repr(C, align(4096))]
#[derive(Clone, PartialEq, Eq)]
pub struct TextPage {
    cells: [u16; CELLS],
}

const fn blank_cell() -> u16 {
    b' ' as u16 | (TEXT_ATTRIBUTE as u16) << 8
}

impl TextPage {
    pub const fn blank() -> Self {
        Self { cells: [blank_cell(); CELLS] }
    }

    pub fn clear(&mut self) {
        self.cells.fill(blank_cell());
    }

    pub fn cell(&self, row: usize, col: usize) -> u16 {
        self.cells[row * SCREEN_COLS + col]
    }

    pub fn char_at(&self, row: usize, col: usize) -> u8 {
        (self.cell(row, col) & 0xff) as u8
    }

    pub fn cells(&self) -> &[u16] {
        &self.cells
    }

    fn set(&mut self, row: usize, col: usize, byte: u8) {
        self.cells[row * SCREEN_COLS + col] = u16::from(byte) | (u16::from(TEXT_ATTRIBUTE) << 8);
    }

    fn scroll_up(&mut self) {
        self.cells.copy_within(SCREEN_COLS.., 0);
        self.cells[CELLS - SCREEN_COLS..].fill(blank_cell());
    }

    /// Renders `bytes` at `cursor`, handling newline, backspace, wrap and
    /// scroll.
    pub fn write(&mut self, cursor: &mut Cursor, bytes: &[u8]) {
        for &byte in bytes {
            match byte {
                b'\n' | b'\r' => cursor.newline(self),
                0x08 => {
                    if cursor.col > 0 {
                        cursor.col -= 1;
                    } else if cursor.row > 0 {
                        cursor.row -= 1;
                        cursor.col = SCREEN_COLS - 1;
                    }
                    self.set(cursor.row, cursor.col, b' ');
                }
                0 => {}
                _ => {
                    self.set(cursor.row, cursor.col, byte);
                    cursor.col += 1;
                    if cursor.col == SCREEN_COLS {
                        cursor.newline(self);
                    }
                }
            }
        }
    }
}

impl Default for TextPage {
    fn default() -> Self {
        Self::blank()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub row: usize,
    pub col: usize,
}

impl Cursor {
    fn newline(&mut self, page: &mut TextPage) {
        self.col = 0;
        if self.row + 1 == SCREEN_ROWS {
            page.scroll_up();
        } else {
            self.row += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_text(page: &TextPage, row: usize) -> Vec<u8> {
        (0..SCREEN_COLS).map(|c| page.char_at(row, c)).collect()
    }

    #[test]
    fn test_write_and_newline() {
        let mut page = TextPage::blank();
        let mut cursor = Cursor::default();
        page.write(&mut cursor, b"hi\nyo");
        assert_eq!(page.char_at(0, 0), b'h');
        assert_eq!(page.char_at(1, 1), b'o');
        assert_eq!(cursor, Cursor { row: 1, col: 2 });
        assert_eq!(page.cell(0, 0) >> 8, u16::from(TEXT_ATTRIBUTE));
    }

    #[test]
    fn test_wrap_at_last_column() {
        let mut page = TextPage::blank();
        let mut cursor = Cursor::default();
        page.write(&mut cursor, &[b'x'; SCREEN_COLS + 1]);
        assert_eq!(cursor, Cursor { row: 1, col: 1 });
    }

    #[test]
    fn test_backspace_erases() {
        let mut page = TextPage::blank();
        let mut cursor = Cursor::default();
        page.write(&mut cursor, b"ab\x08");
        assert_eq!(page.char_at(0, 1), b' ');
        assert_eq!(cursor.col, 1);
    }

    #[test]
    fn test_scroll_at_bottom() {
        let mut page = TextPage::blank();
        let mut cursor = Cursor::default();
        page.write(&mut cursor, b"first\n");
        for _ in 0..SCREEN_ROWS - 1 {
            page.write(&mut cursor, b"\n");
        }
        page.write(&mut cursor, b"last");
        assert_eq!(cursor.row, SCREEN_ROWS - 1);
        assert!(!row_text(&page, 0).starts_with(b"first"));
        assert!(row_text(&page, SCREEN_ROWS - 1).starts_with(b"last"));
    }
}
