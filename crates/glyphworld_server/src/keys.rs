//! # Key Decoding
//!
//! Turns raw terminal bytes into player actions. Escape sequences may be
//! split across reads, so the decoder keeps partial input between calls.
//!
//! | Key              | Action                    |
//! |------------------|---------------------------|
//! | `w a s d`, arrows| move                      |
//! | `t`              | open the chat prompt      |
//! | `1 2 3`          | block, half-block, Braille|
//! | `r`              | full redraw               |
//! | `q`, Ctrl-C      | quit                      |
//!
//! In the chat prompt, Enter sends, Esc cancels and Backspace edits. A
//! line starting with `/look ` asks for custom art instead of chatting.

use glyphworld_render::RenderMode;

/// Longest chat line accepted, in bytes.
pub const MAX_CHAT_LEN: usize = 200;

const ESC: u8 = 0x1b;
const CTRL_C: u8 = 0x03;
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// What a key press means.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// Step by a delta.
    Move {
        /// X delta.
        dx: i32,
        /// Y delta.
        dy: i32,
    },
    /// The chat prompt opened.
    ChatOpened,
    /// The chat prompt text changed.
    ChatEdited(String),
    /// The chat prompt closed without sending.
    ChatCancelled,
    /// Send a chat line.
    Chat(String),
    /// Request custom art.
    Describe(String),
    /// Switch cell encoding.
    SetMode(RenderMode),
    /// Repaint everything.
    Redraw,
    /// Leave.
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Walking,
    Typing,
}

/// Stateful byte-to-action decoder, one per session.
#[derive(Debug)]
pub struct KeyDecoder {
    mode: Mode,
    pending: Vec<u8>,
    line: String,
}

impl Default for KeyDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDecoder {
    /// Creates a decoder in walking mode.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: Mode::Walking,
            pending: Vec::new(),
            line: String::new(),
        }
    }

    /// Whether the chat prompt is open.
    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.mode == Mode::Typing
    }

    /// Decodes `bytes`, appending actions to `out`.
    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<KeyAction>) {
        self.pending.extend_from_slice(bytes);
        let input = std::mem::take(&mut self.pending);

        let mut i = 0;
        while i < input.len() {
            let byte = input[i];
            if byte == ESC {
                match (input.get(i + 1).copied(), input.get(i + 2).copied()) {
                    (Some(b'['), Some(code)) => {
                        if let Some(action) = self.arrow(code) {
                            out.push(action);
                        }
                        i += 3;
                        continue;
                    }
                    (None, _) | (Some(b'['), None) => {
                        self.pending.extend_from_slice(&input[i..]);
                        return;
                    }
                    (Some(_), _) => {
                        self.escape(out);
                        i += 1;
                        continue;
                    }
                }
            }
            match self.mode {
                Mode::Walking => self.walking(byte, out),
                Mode::Typing => self.typing(byte, out),
            }
            i += 1;
        }
    }

    /// Treats a held-back lone Esc as a key press.
    pub fn flush(&mut self, out: &mut Vec<KeyAction>) {
        if self.pending.as_slice() == [ESC] {
            self.pending.clear();
            self.escape(out);
        }
    }

    fn arrow(&self, code: u8) -> Option<KeyAction> {
        if self.mode == Mode::Typing {
            return None;
        }
        let (dx, dy) = match code {
            b'A' => (0, -1),
            b'B' => (0, 1),
            b'C' => (1, 0),
            b'D' => (-1, 0),
            _ => return None,
        };
        Some(KeyAction::Move { dx, dy })
    }

    fn escape(&mut self, out: &mut Vec<KeyAction>) {
        if self.mode == Mode::Typing {
            self.mode = Mode::Walking;
            self.line.clear();
            out.push(KeyAction::ChatCancelled);
        }
    }

    fn walking(&mut self, byte: u8, out: &mut Vec<KeyAction>) {
        let action = match byte.to_ascii_lowercase() {
            b'w' => KeyAction::Move { dx: 0, dy: -1 },
            b's' => KeyAction::Move { dx: 0, dy: 1 },
            b'a' => KeyAction::Move { dx: -1, dy: 0 },
            b'd' => KeyAction::Move { dx: 1, dy: 0 },
            b't' => {
                self.mode = Mode::Typing;
                self.line.clear();
                KeyAction::ChatOpened
            }
            b'1' => KeyAction::SetMode(RenderMode::Block),
            b'2' => KeyAction::SetMode(RenderMode::HalfBlock),
            b'3' => KeyAction::SetMode(RenderMode::Braille),
            b'r' => KeyAction::Redraw,
            b'q' | CTRL_C => KeyAction::Quit,
            _ => return,
        };
        out.push(action);
    }

    fn typing(&mut self, byte: u8, out: &mut Vec<KeyAction>) {
        match byte {
            b'\r' | b'\n' => {
                self.mode = Mode::Walking;
                let line = std::mem::take(&mut self.line);
                let line = line.trim();
                if line.is_empty() {
                    out.push(KeyAction::ChatCancelled);
                } else if let Some(description) = line.strip_prefix("/look ") {
                    out.push(KeyAction::Describe(description.trim().to_owned()));
                } else {
                    out.push(KeyAction::Chat(line.to_owned()));
                }
            }
            BACKSPACE | DELETE => {
                if self.line.pop().is_some() {
                    out.push(KeyAction::ChatEdited(self.line.clone()));
                }
            }
            CTRL_C => {
                self.mode = Mode::Walking;
                self.line.clear();
                out.push(KeyAction::Quit);
            }
            b' '..=b'~' if self.line.len() < MAX_CHAT_LEN => {
                self.line.push(char::from(byte));
                out.push(KeyAction::ChatEdited(self.line.clone()));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(decoder: &mut KeyDecoder, bytes: &[u8]) -> Vec<KeyAction> {
        let mut out = Vec::new();
        decoder.feed(bytes, &mut out);
        out
    }

    #[test]
    fn test_wasd_and_arrows() {
        let mut decoder = KeyDecoder::new();
        let actions = decode(&mut decoder, b"wA\x1b[B\x1b[Cd");
        assert_eq!(
            actions,
            vec![
                KeyAction::Move { dx: 0, dy: -1 },
                KeyAction::Move { dx: -1, dy: 0 },
                KeyAction::Move { dx: 0, dy: 1 },
                KeyAction::Move { dx: 1, dy: 0 },
                KeyAction::Move { dx: 1, dy: 0 },
            ]
        );
    }

    #[test]
    fn test_split_escape_sequence() {
        let mut decoder = KeyDecoder::new();
        assert!(decode(&mut decoder, b"\x1b").is_empty());
        assert!(decode(&mut decoder, b"[").is_empty());
        assert_eq!(decode(&mut decoder, b"D"), vec![KeyAction::Move { dx: -1, dy: 0 }]);
    }

    #[test]
    fn test_chat_line() {
        let mut decoder = KeyDecoder::new();
        let actions = decode(&mut decoder, b"thi!\x7fx\r");

        assert_eq!(actions.first(), Some(&KeyAction::ChatOpened));
        assert_eq!(actions.last(), Some(&KeyAction::Chat("hix".into())));
        assert!(!decoder.is_typing());
    }

    #[test]
    fn test_typing_does_not_move() {
        let mut decoder = KeyDecoder::new();
        let actions = decode(&mut decoder, b"twasd\x1b[A");
        assert!(actions
            .iter()
            .all(|a| !matches!(a, KeyAction::Move { .. })));
        assert!(decoder.is_typing());
    }

    #[test]
    fn test_lone_escape_cancels_after_flush() {
        let mut decoder = KeyDecoder::new();
        decode(&mut decoder, b"tabc");
        assert!(decode(&mut decoder, b"\x1b").is_empty());

        let mut out = Vec::new();
        decoder.flush(&mut out);
        assert_eq!(out, vec![KeyAction::ChatCancelled]);
        assert!(!decoder.is_typing());
    }

    #[test]
    fn test_look_command() {
        let mut decoder = KeyDecoder::new();
        let actions = decode(&mut decoder, b"t/look a tiny red dragon\r");
        assert_eq!(
            actions.last(),
            Some(&KeyAction::Describe("a tiny red dragon".into()))
        );
    }

    #[test]
    fn test_quit_and_modes() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(
            decode(&mut decoder, b"3q"),
            vec![KeyAction::SetMode(RenderMode::Braille), KeyAction::Quit]
        );
    }
}
