//! # PS/2 Keyboard Decoding
//!
//! Turns set-1 scancodes from port 0x60 into `KeyEvent`s.
//!
//! ```text
//! IRQ1 ──▶ port 0x60 ──▶ ScancodeDecoder ──▶ KeyEvent ──▶ Kernel::on_key
//!                          - 0xE0 prefix
//!                          - Shift/Ctrl/Alt
//!                          - Caps Lock
//! ```
//!
//! Bit 7 of a scancode marks a release. Only modifier releases matter; other
//! releases are dropped.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A printable ASCII byte, case already applied.
    Char(u8),
    Enter,
    Backspace,
    /// F1 is `Function(1)`.
    Function(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

pub struct ScancodeDecoder {
    is_extended: bool,
    shift_pressed: bool,
    ctrl_pressed: bool,
    alt_pressed: bool,
    caps_lock: bool,
}

impl ScancodeDecoder {
    pub const fn new() -> Self {
        Self {
            is_extended: false,
            shift_pressed: false,
            ctrl_pressed: false,
            alt_pressed: false,
            caps_lock: false,
        }
    }

    pub fn process_scancode(&mut self, scancode: u8) -> Option<KeyEvent> {
        if scancode == 0xE0 {
            self.is_extended = true;
            return None;
        }

        let is_release = scancode & 0x80 != 0;
        let key_code = scancode & 0x7F;

        if core::mem::take(&mut self.is_extended) {
            // Right Ctrl and right Alt share codes with the left keys.
            match key_code {
                0x1D => self.ctrl_pressed = !is_release,
                0x38 => self.alt_pressed = !is_release,
                _ => {}
            }
            return None;
        }

        match key_code {
            0x2A | 0x36 => {
                self.shift_pressed = !is_release;
                return None;
            }
            0x1D => {
                self.ctrl_pressed = !is_release;
                return None;
            }
            0x38 => {
                self.alt_pressed = !is_release;
                return None;
            }
            _ => {}
        }

        if is_release {
            return None;
        }

        let key = match key_code {
            0x3A => {
                self.caps_lock = !self.caps_lock;
                return None;
            }
            0x1C => Key::Enter,
            0x0E => Key::Backspace,
            0x3B..=0x44 => Key::Function(key_code - 0x3B + 1),
            _ => Key::Char(self.scancode_to_ascii(key_code)?),
        };

        Some(KeyEvent {
            key,
            ctrl: self.ctrl_pressed,
            alt: self.alt_pressed,
            shift: self.shift_pressed,
        })
    }

    fn scancode_to_ascii(&self, scancode: u8) -> Option<u8> {
        const LETTERS: &[(u8, u8)] = &[
            (0x10, b'q'), (0x11, b'w'), (0x12, b'e'), (0x13, b'r'), (0x14, b't'),
            (0x15, b'y'), (0x16, b'u'), (0x17, b'i'), (0x18, b'o'), (0x19, b'p'),
            (0x1E, b'a'), (0x1F, b's'), (0x20, b'd'), (0x21, b'f'), (0x22, b'g'),
            (0x23, b'h'), (0x24, b'j'), (0x25, b'k'), (0x26, b'l'), (0x2C, b'z'),
            (0x2D, b'x'), (0x2E, b'c'), (0x2F, b'v'), (0x30, b'b'), (0x31, b'n'),
            (0x32, b'm'),
        ];

        if let Some(&(_, letter)) = LETTERS.iter().find(|(code, _)| *code == scancode) {
            let upper = self.shift_pressed != self.caps_lock;
            return Some(if upper { letter.to_ascii_uppercase() } else { letter });
        }

        let shift = self.shift_pressed;
        let byte = match scancode {
            0x02..=0x0B => {
                let digit = if scancode == 0x0B { b'0' } else { scancode - 0x02 + b'1' };
                if shift {
                    b")!@#$%^&*("[usize::from(digit - b'0')]
                } else {
                    digit
                }
            }
            0x39 => b' ',
            0x0F => b'\t',
            0x1A => if shift { b'{' } else { b'[' },
            0x1B => if shift { b'}' } else { b']' },
            0x27 => if shift { b':' } else { b';' },
            0x28 => if shift { b'"' } else { b'\'' },
            0x29 => if shift { b'~' } else { b'`' },
            0x2B => if shift { b'|' } else { b'\\' },
            0x33 => if shift { b'<' } else { b',' },
            0x34 => if shift { b'>' } else { b'.' },
            0x35 => if shift { b'?' } else { b'/' },
            0x0C => if shift { b'_' } else { b'-' },
            0x0D => if shift { b'+' } else { b'=' },
            _ => return None,
        };
        Some(byte)
    }
}

impl Default for ScancodeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(decoder: &mut ScancodeDecoder, codes: &[u8]) -> Vec<KeyEvent> {
        codes.iter().filter_map(|&c| decoder.process_scancode(c)).collect()
    }

    #[test]
    fn test_plain_and_shifted_letters() {
        let mut d = ScancodeDecoder::new();
        let events = feed(&mut d, &[0x1E, 0x9E, 0x2A, 0x1E, 0xAA, 0x1E]);
        let keys: Vec<_> = events.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![Key::Char(b'a'), Key::Char(b'A'), Key::Char(b'a')]);
    }

    #[test]
    fn test_caps_lock_inverts_shift_for_letters_only() {
        let mut d = ScancodeDecoder::new();
        let events = feed(&mut d, &[0x3A, 0xBA, 0x1E, 0x02, 0x2A, 0x1E]);
        let keys: Vec<_> = events.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![Key::Char(b'A'), Key::Char(b'1'), Key::Char(b'a')]);
    }

    #[test]
    fn test_shifted_digits() {
        let mut d = ScancodeDecoder::new();
        let events = feed(&mut d, &[0x2A, 0x02, 0x0B, 0x0A]);
        let keys: Vec<_> = events.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![Key::Char(b'!'), Key::Char(b')'), Key::Char(b'(')]);
    }

    #[test]
    fn test_alt_function_keys() {
        let mut d = ScancodeDecoder::new();
        let events = feed(&mut d, &[0x38, 0x3C, 0xB8, 0x3B]);
        assert_eq!(events[0], KeyEvent { key: Key::Function(2), ctrl: false, alt: true, shift: false });
        assert_eq!(events[1].key, Key::Function(1));
        assert!(!events[1].alt);
    }

    #[test]
    fn test_ctrl_modifier_and_extended_right_ctrl() {
        let mut d = ScancodeDecoder::new();
        let events = feed(&mut d, &[0xE0, 0x1D, 0x26, 0xE0, 0x9D, 0x26]);
        assert!(events[0].ctrl);
        assert_eq!(events[0].key, Key::Char(b'l'));
        assert!(!events[1].ctrl);
    }

    #[test]
    fn test_extended_keys_are_ignored() {
        let mut d = ScancodeDecoder::new();
        assert!(feed(&mut d, &[0xE0, 0x48, 0xE0, 0xC8]).is_empty());
    }

    #[test]
    fn test_enter_and_backspace() {
        let mut d = ScancodeDecoder::new();
        let keys: Vec<_> = feed(&mut d, &[0x1C, 0x0E]).iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![Key::Enter, Key::Backspace]);
    }
}
