//! Host keyboard to PS/2 set-2 scancode translation.
//!
//! The guest's keyboard driver consumes raw PS/2 set-2 traffic: a make
//! code per press, `F0` + make code per release, with an `E0` prefix for
//! the extended keys (arrows, navigation block, right-hand modifiers).

use winit::keyboard::KeyCode;

/// Encode one key transition, or `None` for keys the guest has no use for.
#[must_use]
pub fn encode(keycode: KeyCode, down: bool) -> Option<Vec<u8>> {
    let (code, extended) = scancode(keycode)?;
    let mut bytes = Vec::with_capacity(3);
    if extended {
        bytes.push(0xE0);
    }
    if !down {
        bytes.push(0xF0);
    }
    bytes.push(code);
    Some(bytes)
}

/// Set-2 make code and whether it takes the `E0` prefix.
fn scancode(keycode: KeyCode) -> Option<(u8, bool)> {
    use KeyCode::*;
    let plain = |code| Some((code, false));
    let ext = |code| Some((code, true));
    match keycode {
        KeyA => plain(0x1C),
        KeyB => plain(0x32),
        KeyC => plain(0x21),
        KeyD => plain(0x23),
        KeyE => plain(0x24),
        KeyF => plain(0x2B),
        KeyG => plain(0x34),
        KeyH => plain(0x33),
        KeyI => plain(0x43),
        KeyJ => plain(0x3B),
        KeyK => plain(0x42),
        KeyL => plain(0x4B),
        KeyM => plain(0x3A),
        KeyN => plain(0x31),
        KeyO => plain(0x44),
        KeyP => plain(0x4D),
        KeyQ => plain(0x15),
        KeyR => plain(0x2D),
        KeyS => plain(0x1B),
        KeyT => plain(0x2C),
        KeyU => plain(0x3C),
        KeyV => plain(0x2A),
        KeyW => plain(0x1D),
        KeyX => plain(0x22),
        KeyY => plain(0x35),
        KeyZ => plain(0x1A),

        Digit1 => plain(0x16),
        Digit2 => plain(0x1E),
        Digit3 => plain(0x26),
        Digit4 => plain(0x25),
        Digit5 => plain(0x2E),
        Digit6 => plain(0x36),
        Digit7 => plain(0x3D),
        Digit8 => plain(0x3E),
        Digit9 => plain(0x46),
        Digit0 => plain(0x45),

        Backquote => plain(0x0E),
        Minus => plain(0x4E),
        Equal => plain(0x55),
        BracketLeft => plain(0x54),
        BracketRight => plain(0x5B),
        Backslash => plain(0x5D),
        Semicolon => plain(0x4C),
        Quote => plain(0x52),
        Comma => plain(0x41),
        Period => plain(0x49),
        Slash => plain(0x4A),

        Space => plain(0x29),
        Tab => plain(0x0D),
        Enter => plain(0x5A),
        Backspace => plain(0x66),
        Escape => plain(0x76),
        CapsLock => plain(0x58),
        ShiftLeft => plain(0x12),
        ShiftRight => plain(0x59),
        ControlLeft => plain(0x14),
        ControlRight => ext(0x14),
        AltLeft => plain(0x11),
        AltRight => ext(0x11),

        F1 => plain(0x05),
        F2 => plain(0x06),
        F3 => plain(0x04),
        F4 => plain(0x0C),
        F5 => plain(0x03),
        F6 => plain(0x0B),
        F7 => plain(0x83),
        F8 => plain(0x0A),
        F9 => plain(0x01),
        F10 => plain(0x09),

        Insert => ext(0x70),
        Delete => ext(0x71),
        Home => ext(0x6C),
        End => ext(0x69),
        PageUp => ext(0x7D),
        PageDown => ext(0x7A),
        ArrowUp => ext(0x75),
        ArrowDown => ext(0x72),
        ArrowLeft => ext(0x6B),
        ArrowRight => ext(0x74),

        NumLock => plain(0x77),
        Numpad0 => plain(0x70),
        Numpad1 => plain(0x69),
        Numpad2 => plain(0x72),
        Numpad3 => plain(0x7A),
        Numpad4 => plain(0x6B),
        Numpad5 => plain(0x73),
        Numpad6 => plain(0x74),
        Numpad7 => plain(0x6C),
        Numpad8 => plain(0x75),
        Numpad9 => plain(0x7D),
        NumpadMultiply => plain(0x7C),
        NumpadSubtract => plain(0x7B),
        NumpadAdd => plain(0x79),
        NumpadDecimal => plain(0x71),
        NumpadDivide => ext(0x4A),
        NumpadEnter => ext(0x5A),

        _ => None,
    }
}
