//! Key bindings: arrows plus the classic single-letter keys.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Logical key delivered to the game loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Rotate,
    MoveLeft,
    MoveRight,
    SoftDrop,
    HardDrop,
    Pause,
    Quit,
}

/// Map a key event to a game key. Releases, repeats and unbound keys map to `None`.
pub fn key_to_action(key: KeyEvent) -> Option<Key> {
    let KeyEvent {
        code,
        modifiers,
        kind,
        ..
    } = key;
    if kind != KeyEventKind::Press {
        return None;
    }
    // Raw mode swallows SIGINT, so Ctrl-C arrives here.
    if modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(code, KeyCode::Char('c' | 'C')).then_some(Key::Quit);
    }
    match code {
        KeyCode::Up | KeyCode::Char('k') => Some(Key::Rotate),
        KeyCode::Left | KeyCode::Char('j') => Some(Key::MoveLeft),
        KeyCode::Right | KeyCode::Char('l') => Some(Key::MoveRight),
        KeyCode::Down => Some(Key::SoftDrop),
        KeyCode::Char(' ') => Some(Key::HardDrop),
        KeyCode::Tab | KeyCode::Char('p') => Some(Key::Pause),
        KeyCode::Char('q') => Some(Key::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_arrows_map_to_movement() {
        assert_eq!(key_to_action(press(KeyCode::Up)), Some(Key::Rotate));
        assert_eq!(key_to_action(press(KeyCode::Left)), Some(Key::MoveLeft));
        assert_eq!(key_to_action(press(KeyCode::Right)), Some(Key::MoveRight));
        assert_eq!(key_to_action(press(KeyCode::Down)), Some(Key::SoftDrop));
    }

    #[test]
    fn test_literal_keys() {
        assert_eq!(key_to_action(press(KeyCode::Char(' '))), Some(Key::HardDrop));
        assert_eq!(key_to_action(press(KeyCode::Tab)), Some(Key::Pause));
        assert_eq!(key_to_action(press(KeyCode::Char('p'))), Some(Key::Pause));
        assert_eq!(key_to_action(press(KeyCode::Char('q'))), Some(Key::Quit));
        assert_eq!(key_to_action(press(KeyCode::Char('k'))), Some(Key::Rotate));
        assert_eq!(key_to_action(press(KeyCode::Char('x'))), None);
    }

    #[test]
    fn test_ctrl_c_quits() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_to_action(key), Some(Key::Quit));
        let key = KeyEvent::new(KeyCode::Char('p'), KeyModifiers::CONTROL);
        assert_eq!(key_to_action(key), None);
    }

    #[test]
    fn test_release_is_ignored() {
        let key = KeyEvent::new_with_kind(KeyCode::Left, KeyModifiers::NONE, KeyEventKind::Release);
        assert_eq!(key_to_action(key), None);
    }
}
