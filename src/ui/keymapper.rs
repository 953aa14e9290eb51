//! Key mapping for the graph view
//!
//! Converts key and mouse events to view actions.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// What a key press asks the view to do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    Top,
    Bottom,
    ToggleMark,
    ToggleDetails,
    YankChangeId,
    YankCommitId,
    Refresh,
    Quit,
}

/// Key mapper for converting input events to actions
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent to an action
    pub fn map(event: &KeyEvent) -> Option<Action> {
        let mods = Modifiers::from(event.modifiers);

        if mods.contains(Modifiers::CTRL) {
            return match event.code {
                KeyCode::Char('c') => Some(Action::Quit),
                KeyCode::Char('b') | KeyCode::Char('u') => Some(Action::PageUp),
                KeyCode::Char('f') | KeyCode::Char('d') => Some(Action::PageDown),
                KeyCode::Char('r') => Some(Action::Refresh),
                _ => None,
            };
        }
        if mods.contains(Modifiers::ALT) {
            return None;
        }

        match event.code {
            KeyCode::Char(ch) => Self::map_char(ch),

            KeyCode::Up => Some(Action::MoveUp),
            KeyCode::Down => Some(Action::MoveDown),
            KeyCode::PageUp => Some(Action::PageUp),
            KeyCode::PageDown => Some(Action::PageDown),
            KeyCode::Home => Some(Action::Top),
            KeyCode::End => Some(Action::Bottom),

            KeyCode::Enter | KeyCode::Tab => Some(Action::ToggleDetails),
            KeyCode::Esc => Some(Action::Quit),

            _ => None,
        }
    }

    /// Map an unmodified character
    fn map_char(ch: char) -> Option<Action> {
        match ch {
            'k' => Some(Action::MoveUp),
            'j' => Some(Action::MoveDown),
            ' ' => Some(Action::PageDown),
            'g' => Some(Action::Top),
            'G' => Some(Action::Bottom),
            'm' => Some(Action::ToggleMark),
            'd' => Some(Action::ToggleDetails),
            'y' => Some(Action::YankChangeId),
            'Y' => Some(Action::YankCommitId),
            'r' => Some(Action::Refresh),
            'q' => Some(Action::Quit),
            _ => None,
        }
    }

    /// Map mouse wheel scrolling to cursor movement
    pub fn map_mouse(event: &MouseEvent) -> Option<Action> {
        match event.kind {
            MouseEventKind::ScrollUp => Some(Action::MoveUp),
            MouseEventKind::ScrollDown => Some(Action::MoveDown),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn test_movement_keys() {
        let event = key_event(KeyCode::Char('j'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(Action::MoveDown));

        let event = key_event(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(Action::MoveUp));

        // Shifted letters arrive with SHIFT set
        let event = key_event(KeyCode::Char('G'), KeyModifiers::SHIFT);
        assert_eq!(KeyMapper::map(&event), Some(Action::Bottom));

        let event = key_event(KeyCode::Char('f'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), Some(Action::PageDown));
    }

    #[test]
    fn test_command_keys() {
        let event = key_event(KeyCode::Char('y'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(Action::YankChangeId));

        let event = key_event(KeyCode::Char('Y'), KeyModifiers::SHIFT);
        assert_eq!(KeyMapper::map(&event), Some(Action::YankCommitId));

        let event = key_event(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(Action::ToggleDetails));

        let event = key_event(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), Some(Action::Quit));
    }

    #[test]
    fn test_unmapped_keys() {
        let event = key_event(KeyCode::Char('z'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), None);

        let event = key_event(KeyCode::Char('j'), KeyModifiers::ALT);
        assert_eq!(KeyMapper::map(&event), None);

        let event = key_event(KeyCode::F(5), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), None);
    }

    #[test]
    fn test_mouse_wheel() {
        let event = MouseEvent {
            kind: MouseEventKind::ScrollDown,
            column: 3,
            row: 4,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(KeyMapper::map_mouse(&event), Some(Action::MoveDown));
    }
}
