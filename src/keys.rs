use crate::error::Result;
use crate::parser;

use std::fmt;
use std::str::FromStr;

/// A key press as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

/// A shortcut such as `Mod+Shift+S`. `Mod` (or `Ctrl`, `Cmd`, `Meta`) is
/// satisfied by either Ctrl or Cmd, so one binding works on every platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCombo {
    pub command: bool,
    pub shift: bool,
    pub alt: bool,
    pub key: char,
}

impl KeyCombo {
    pub fn matches(&self, event: &KeyEvent) -> bool {
        let mut chars = event.key.chars();
        let key_matches = match (chars.next(), chars.next()) {
            (Some(c), None) => c.eq_ignore_ascii_case(&self.key),
            _ => false,
        };
        key_matches
            && (event.ctrl || event.meta) == self.command
            && event.shift == self.shift
            && event.alt == self.alt
    }
}

impl Default for KeyCombo {
    fn default() -> Self {
        Self {
            command: true,
            shift: true,
            alt: false,
            key: 'S',
        }
    }
}

impl FromStr for KeyCombo {
    type Err = crate::error::OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        parser::parse_key_combo(s)
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if self.command {
            write!(fmt, "Mod+")?;
        }
        if self.alt {
            write!(fmt, "Alt+")?;
        }
        if self.shift {
            write!(fmt, "Shift+")?;
        }
        write!(fmt, "{}", self.key.to_ascii_uppercase())
    }
}
