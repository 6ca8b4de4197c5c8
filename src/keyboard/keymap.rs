//! Scancode names and produced characters for a US layout
//!
//! Scancodes follow the Linux evdev numbering. The produced characters are the
//! ones a US QWERTY layout yields, with and without shift held.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Physical key code (evdev scancode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const LEFT_SHIFT: KeyCode = KeyCode(42);
    pub const RIGHT_SHIFT: KeyCode = KeyCode(54);

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    pub fn is_shift(&self) -> bool {
        *self == Self::LEFT_SHIFT || *self == Self::RIGHT_SHIFT
    }

    /// Maps a device_query key to its evdev scancode.
    pub fn from_device_query(keycode: device_query::Keycode) -> Option<Self> {
        use device_query::Keycode as DK;
        let code = match keycode {
            DK::Escape => 1,
            DK::Key1 => 2,
            DK::Key2 => 3,
            DK::Key3 => 4,
            DK::Key4 => 5,
            DK::Key5 => 6,
            DK::Key6 => 7,
            DK::Key7 => 8,
            DK::Key8 => 9,
            DK::Key9 => 10,
            DK::Key0 => 11,
            DK::Minus => 12,
            DK::Equal => 13,
            DK::Backspace => 14,
            DK::Tab => 15,
            DK::Q => 16,
            DK::W => 17,
            DK::E => 18,
            DK::R => 19,
            DK::T => 20,
            DK::Y => 21,
            DK::U => 22,
            DK::I => 23,
            DK::O => 24,
            DK::P => 25,
            DK::LeftBracket => 26,
            DK::RightBracket => 27,
            DK::Enter => 28,
            DK::LControl => 29,
            DK::A => 30,
            DK::S => 31,
            DK::D => 32,
            DK::F => 33,
            DK::G => 34,
            DK::H => 35,
            DK::J => 36,
            DK::K => 37,
            DK::L => 38,
            DK::Semicolon => 39,
            DK::Apostrophe => 40,
            DK::Grave => 41,
            DK::LShift => 42,
            DK::BackSlash => 43,
            DK::Z => 44,
            DK::X => 45,
            DK::C => 46,
            DK::V => 47,
            DK::B => 48,
            DK::N => 49,
            DK::M => 50,
            DK::Comma => 51,
            DK::Dot => 52,
            DK::Slash => 53,
            DK::RShift => 54,
            DK::LAlt => 56,
            DK::Space => 57,
            DK::CapsLock => 58,
            DK::F1 => 59,
            DK::F2 => 60,
            DK::F3 => 61,
            DK::F4 => 62,
            DK::F5 => 63,
            DK::F6 => 64,
            DK::F7 => 65,
            DK::F8 => 66,
            DK::F9 => 67,
            DK::F10 => 68,
            DK::F11 => 87,
            DK::F12 => 88,
            DK::Numpad7 => 71,
            DK::Numpad8 => 72,
            DK::Numpad9 => 73,
            DK::NumpadSubtract => 74,
            DK::Numpad4 => 75,
            DK::Numpad5 => 76,
            DK::Numpad6 => 77,
            DK::NumpadAdd => 78,
            DK::Numpad1 => 79,
            DK::Numpad2 => 80,
            DK::Numpad3 => 81,
            DK::Numpad0 => 82,
            DK::NumpadMultiply => 55,
            DK::NumpadDivide => 98,
            DK::RControl => 97,
            DK::RAlt => 100,
            DK::Home => 102,
            DK::Up => 103,
            DK::PageUp => 104,
            DK::Left => 105,
            DK::Right => 106,
            DK::End => 107,
            DK::Down => 108,
            DK::PageDown => 109,
            DK::Insert => 110,
            DK::Delete => 111,
            DK::LMeta => 125,
            DK::RMeta => 126,
            _ => return None,
        };
        Some(Self(code))
    }
}

/// Name and produced characters of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    pub name: &'static str,
    /// Character produced without shift
    pub plain: Option<char>,
    /// Character produced with shift held
    pub shifted: Option<char>,
}

impl KeyInfo {
    const fn named(name: &'static str) -> Self {
        Self {
            name,
            plain: None,
            shifted: None,
        }
    }

    const fn typing(name: &'static str, plain: char, shifted: char) -> Self {
        Self {
            name,
            plain: Some(plain),
            shifted: Some(shifted),
        }
    }

    pub fn produced(&self, shift: bool) -> Option<char> {
        if shift {
            self.shifted
        } else {
            self.plain
        }
    }
}

pub static KEYMAP: LazyLock<HashMap<KeyCode, KeyInfo>> = LazyLock::new(|| {
    let entries: &[(u16, KeyInfo)] = &[
        (1, KeyInfo::named("Escape")),
        (2, KeyInfo::typing("1", '1', '!')),
        (3, KeyInfo::typing("2", '2', '@')),
        (4, KeyInfo::typing("3", '3', '#')),
        (5, KeyInfo::typing("4", '4', '$')),
        (6, KeyInfo::typing("5", '5', '%')),
        (7, KeyInfo::typing("6", '6', '^')),
        (8, KeyInfo::typing("7", '7', '&')),
        (9, KeyInfo::typing("8", '8', '*')),
        (10, KeyInfo::typing("9", '9', '(')),
        (11, KeyInfo::typing("0", '0', ')')),
        (12, KeyInfo::typing("Minus", '-', '_')),
        (13, KeyInfo::typing("Equals", '=', '+')),
        (14, KeyInfo::named("Backspace")),
        (15, KeyInfo::typing("Tab", '\t', '\t')),
        (16, KeyInfo::typing("Q", 'q', 'Q')),
        (17, KeyInfo::typing("W", 'w', 'W')),
        (18, KeyInfo::typing("E", 'e', 'E')),
        (19, KeyInfo::typing("R", 'r', 'R')),
        (20, KeyInfo::typing("T", 't', 'T')),
        (21, KeyInfo::typing("Y", 'y', 'Y')),
        (22, KeyInfo::typing("U", 'u', 'U')),
        (23, KeyInfo::typing("I", 'i', 'I')),
        (24, KeyInfo::typing("O", 'o', 'O')),
        (25, KeyInfo::typing("P", 'p', 'P')),
        (26, KeyInfo::typing("LeftBracket", '[', '{')),
        (27, KeyInfo::typing("RightBracket", ']', '}')),
        (28, KeyInfo::typing("Enter", '\r', '\r')),
        (29, KeyInfo::named("LeftCtrl")),
        (30, KeyInfo::typing("A", 'a', 'A')),
        (31, KeyInfo::typing("S", 's', 'S')),
        (32, KeyInfo::typing("D", 'd', 'D')),
        (33, KeyInfo::typing("F", 'f', 'F')),
        (34, KeyInfo::typing("G", 'g', 'G')),
        (35, KeyInfo::typing("H", 'h', 'H')),
        (36, KeyInfo::typing("J", 'j', 'J')),
        (37, KeyInfo::typing("K", 'k', 'K')),
        (38, KeyInfo::typing("L", 'l', 'L')),
        (39, KeyInfo::typing("Semicolon", ';', ':')),
        (40, KeyInfo::typing("Apostrophe", '\'', '"')),
        (41, KeyInfo::typing("Grave", '`', '~')),
        (42, KeyInfo::named("LeftShift")),
        (43, KeyInfo::typing("Backslash", '\\', '|')),
        (44, KeyInfo::typing("Z", 'z', 'Z')),
        (45, KeyInfo::typing("X", 'x', 'X')),
        (46, KeyInfo::typing("C", 'c', 'C')),
        (47, KeyInfo::typing("V", 'v', 'V')),
        (48, KeyInfo::typing("B", 'b', 'B')),
        (49, KeyInfo::typing("N", 'n', 'N')),
        (50, KeyInfo::typing("M", 'm', 'M')),
        (51, KeyInfo::typing("Comma", ',', '<')),
        (52, KeyInfo::typing("Period", '.', '>')),
        (53, KeyInfo::typing("Slash", '/', '?')),
        (54, KeyInfo::named("RightShift")),
        (55, KeyInfo::typing("KeypadAsterisk", '*', '*')),
        (56, KeyInfo::named("LeftAlt")),
        (57, KeyInfo::typing("Space", ' ', ' ')),
        (58, KeyInfo::named("CapsLock")),
        (59, KeyInfo::named("F1")),
        (60, KeyInfo::named("F2")),
        (61, KeyInfo::named("F3")),
        (62, KeyInfo::named("F4")),
        (63, KeyInfo::named("F5")),
        (64, KeyInfo::named("F6")),
        (65, KeyInfo::named("F7")),
        (66, KeyInfo::named("F8")),
        (67, KeyInfo::named("F9")),
        (68, KeyInfo::named("F10")),
        (71, KeyInfo::named("Keypad7")),
        (72, KeyInfo::named("Keypad8")),
        (73, KeyInfo::named("Keypad9")),
        (74, KeyInfo::typing("KeypadMinus", '-', '-')),
        (75, KeyInfo::named("Keypad4")),
        (76, KeyInfo::named("Keypad5")),
        (77, KeyInfo::named("Keypad6")),
        (78, KeyInfo::typing("KeypadPlus", '+', '+')),
        (79, KeyInfo::named("Keypad1")),
        (80, KeyInfo::named("Keypad2")),
        (81, KeyInfo::named("Keypad3")),
        (82, KeyInfo::named("Keypad0")),
        (87, KeyInfo::named("F11")),
        (88, KeyInfo::named("F12")),
        (97, KeyInfo::named("RightCtrl")),
        (98, KeyInfo::typing("KeypadSlash", '/', '/')),
        (100, KeyInfo::named("RightAlt")),
        (102, KeyInfo::named("Home")),
        (103, KeyInfo::named("Up")),
        (104, KeyInfo::named("PageUp")),
        (105, KeyInfo::named("Left")),
        (106, KeyInfo::named("Right")),
        (107, KeyInfo::named("End")),
        (108, KeyInfo::named("Down")),
        (109, KeyInfo::named("PageDown")),
        (110, KeyInfo::named("Insert")),
        (111, KeyInfo::named("Delete")),
        (125, KeyInfo::named("LeftMeta")),
        (126, KeyInfo::named("RightMeta")),
    ];
    entries
        .iter()
        .map(|(code, info)| (KeyCode(*code), *info))
        .collect()
});

pub fn get_key_info(code: KeyCode) -> Option<&'static KeyInfo> {
    KEYMAP.get(&code)
}

/// Character a US layout produces for `code`, if any.
pub fn produced_char(code: KeyCode, shift: bool) -> Option<char> {
    get_key_info(code).and_then(|info| info.produced(shift))
}

/// Display label for a recorded scancode.
pub fn scancode_label(code: u16) -> String {
    match get_key_info(KeyCode(code)) {
        Some(info) => info.name.to_string(),
        None => format!("Key{}", code),
    }
}

/// Display label for a recorded produced-character code.
pub fn character_label(code: u16) -> String {
    match char::from_u32(u32::from(code)) {
        Some(' ') => "Space".to_string(),
        Some('\t') => "Tab".to_string(),
        Some('\r') | Some('\n') => "Enter".to_string(),
        Some(c) if !c.is_control() => c.to_string(),
        _ => format!("U+{:04X}", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_follow_shift() {
        assert_eq!(produced_char(KeyCode(30), false), Some('a'));
        assert_eq!(produced_char(KeyCode(30), true), Some('A'));
        assert_eq!(produced_char(KeyCode(2), true), Some('!'));
    }

    #[test]
    fn modifiers_produce_nothing() {
        assert_eq!(produced_char(KeyCode::LEFT_SHIFT, false), None);
        assert_eq!(produced_char(KeyCode(29), true), None);
        assert_eq!(produced_char(KeyCode(240), false), None);
    }

    #[test]
    fn shift_keys() {
        assert!(KeyCode(42).is_shift());
        assert!(KeyCode(54).is_shift());
        assert!(!KeyCode(30).is_shift());
    }

    #[test]
    fn labels() {
        assert_eq!(scancode_label(30), "A");
        assert_eq!(scancode_label(250), "Key250");
        assert_eq!(character_label(u16::from(b'a')), "a");
        assert_eq!(character_label(32), "Space");
        assert_eq!(character_label(0x7f), "U+007F");
        assert_eq!(character_label(0xd800), "U+D800");
    }

    #[test]
    fn device_query_mapping() {
        use device_query::Keycode as DK;
        assert_eq!(KeyCode::from_device_query(DK::A), Some(KeyCode(30)));
        assert_eq!(KeyCode::from_device_query(DK::LShift), Some(KeyCode(42)));
        assert_eq!(KeyCode::from_device_query(DK::Home), Some(KeyCode(102)));
    }
}
