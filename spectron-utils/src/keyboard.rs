/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Mapping host characters onto the 40-key matrix.
//!
//! Frontends translate their own key codes; this helper covers the
//! common case of typing text into the emulated machine, expanding a
//! character to the matrix key plus an optional modifier.
use spectron_peripherals::keyboard::{Keyboard, ZxKey};

/// A matrix key with an optional modifier to hold alongside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyCombo {
    pub modifier: Option<ZxKey>,
    pub key: ZxKey,
}

impl KeyCombo {
    const fn plain(key: ZxKey) -> KeyCombo {
        KeyCombo { modifier: None, key }
    }

    const fn caps(key: ZxKey) -> KeyCombo {
        KeyCombo { modifier: Some(ZxKey::Caps), key }
    }

    const fn sym(key: ZxKey) -> KeyCombo {
        KeyCombo { modifier: Some(ZxKey::Sym), key }
    }
}

/// The key combination that types `ch`, if the character exists on the
/// machine.
pub fn char_to_combo(ch: char) -> Option<KeyCombo> {
    use ZxKey::*;
    let combo = match ch {
        'a'..='z' | 'A'..='Z' => {
            let key = match ch.to_ascii_lowercase() {
                'a' => A, 'b' => B, 'c' => C, 'd' => D, 'e' => E,
                'f' => F, 'g' => G, 'h' => H, 'i' => I, 'j' => J,
                'k' => K, 'l' => L, 'm' => M, 'n' => N, 'o' => O,
                'p' => P, 'q' => Q, 'r' => R, 's' => S, 't' => T,
                'u' => U, 'v' => V, 'w' => W, 'x' => X, 'y' => Y,
                _ => Z,
            };
            if ch.is_ascii_uppercase() {
                KeyCombo::caps(key)
            }
            else {
                KeyCombo::plain(key)
            }
        }
        '0' => KeyCombo::plain(N0),
        '1' => KeyCombo::plain(N1),
        '2' => KeyCombo::plain(N2),
        '3' => KeyCombo::plain(N3),
        '4' => KeyCombo::plain(N4),
        '5' => KeyCombo::plain(N5),
        '6' => KeyCombo::plain(N6),
        '7' => KeyCombo::plain(N7),
        '8' => KeyCombo::plain(N8),
        '9' => KeyCombo::plain(N9),
        ' ' => KeyCombo::plain(Space),
        '\n' => KeyCombo::plain(Enter),
        ',' => KeyCombo::sym(N),
        '.' => KeyCombo::sym(M),
        ';' => KeyCombo::sym(O),
        '"' => KeyCombo::sym(P),
        '-' => KeyCombo::sym(J),
        '+' => KeyCombo::sym(K),
        '=' => KeyCombo::sym(L),
        ':' => KeyCombo::sym(Z),
        '?' => KeyCombo::sym(C),
        '/' => KeyCombo::sym(V),
        '*' => KeyCombo::sym(B),
        '<' => KeyCombo::sym(R),
        '>' => KeyCombo::sym(T),
        '(' => KeyCombo::sym(N8),
        ')' => KeyCombo::sym(N9),
        '!' => KeyCombo::sym(N1),
        '@' => KeyCombo::sym(N2),
        '#' => KeyCombo::sym(N3),
        '$' => KeyCombo::sym(N4),
        '%' => KeyCombo::sym(N5),
        '&' => KeyCombo::sym(N6),
        '\'' => KeyCombo::sym(N7),
        '_' => KeyCombo::sym(N0),
        _ => return None,
    };
    Some(combo)
}

/// Presses or releases the combination for `ch` on a keyboard state.
pub fn type_char(keyboard: &mut Keyboard, ch: char, pressed: bool) -> bool {
    match char_to_combo(ch) {
        Some(combo) => {
            if let Some(modifier) = combo.modifier {
                keyboard.key_event(modifier, pressed);
            }
            keyboard.key_event(combo.key, pressed);
            true
        }
        None => false,
    }
}
