//! Client Flags
//!
//! Capability sets and small enums describing a managed window: what can be
//! drawn around it, what the user may do with it, and which protocol state
//! and stacking layer it is in.

use bitflags::bitflags;
use x11rb::protocol::xproto::Atom;

use crate::wm::ewmh::Atoms;

bitflags! {
    /// Visual elements of the frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Decorations: u32 {
        const TITLEBAR  = 1 << 0;
        const HANDLE    = 1 << 1;
        const GRIP      = 1 << 2;
        const BORDER    = 1 << 3;
        const ICONIFY   = 1 << 4;
        const MAXIMIZE  = 1 << 5;
        const CLOSE     = 1 << 6;
    }
}

bitflags! {
    /// Operations the user or client may perform on the window
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Functions: u32 {
        const RESIZE           = 1 << 0;
        const MOVE             = 1 << 1;
        const ICONIFY          = 1 << 2;
        const MAXIMIZE         = 1 << 3;
        const CLOSE            = 1 << 4;
        const SHADE            = 1 << 5;
        const CHANGE_WORKSPACE = 1 << 6;
        const CHANGE_LAYER     = 1 << 7;
        const FULLSCREEN       = 1 << 8;
    }
}

/// `_NET_WM_WINDOW_TYPE`, reduced to the types with distinct policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowType {
    Desktop,
    Dock,
    Toolbar,
    Menu,
    Utility,
    Splash,
    Dialog,
    #[default]
    Normal,
}

impl WindowType {
    /// Map a single type atom. Unknown atoms yield `None` so the caller can
    /// try the next entry of the property.
    pub fn from_atom(atom: Atom, atoms: &Atoms) -> Option<Self> {
        let kind = if atom == atoms._NET_WM_WINDOW_TYPE_DESKTOP {
            Self::Desktop
        } else if atom == atoms._NET_WM_WINDOW_TYPE_DOCK {
            Self::Dock
        } else if atom == atoms._NET_WM_WINDOW_TYPE_TOOLBAR {
            Self::Toolbar
        } else if atom == atoms._NET_WM_WINDOW_TYPE_MENU {
            Self::Menu
        } else if atom == atoms._NET_WM_WINDOW_TYPE_UTILITY {
            Self::Utility
        } else if atom == atoms._NET_WM_WINDOW_TYPE_SPLASH {
            Self::Splash
        } else if atom == atoms._NET_WM_WINDOW_TYPE_DIALOG {
            Self::Dialog
        } else if atom == atoms._NET_WM_WINDOW_TYPE_NORMAL {
            Self::Normal
        } else {
            return None;
        };
        Some(kind)
    }
}

/// ICCCM `WM_STATE` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WmState {
    #[default]
    Withdrawn,
    Normal,
    Iconic,
}

impl WmState {
    pub fn to_wire(self) -> u32 {
        match self {
            Self::Withdrawn => 0,
            Self::Normal => 1,
            Self::Iconic => 3,
        }
    }

    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Withdrawn),
            1 => Some(Self::Normal),
            3 => Some(Self::Iconic),
            _ => None,
        }
    }
}

/// Stacking layer, bottom to top
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum WindowLayer {
    Desktop,
    Below,
    #[default]
    Normal,
    Above,
    FullScreen,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wm_state_wire_values() {
        assert_eq!(WmState::Iconic.to_wire(), 3);
        assert_eq!(WmState::from_wire(1), Some(WmState::Normal));
        assert_eq!(WmState::from_wire(2), None);
    }

    #[test]
    fn test_window_type_from_atom() {
        let atoms = Atoms::sequential();
        assert_eq!(
            WindowType::from_atom(atoms._NET_WM_WINDOW_TYPE_DOCK, &atoms),
            Some(WindowType::Dock)
        );
        assert_eq!(WindowType::from_atom(1, &atoms), None);
    }

    #[test]
    fn test_layer_order() {
        assert!(WindowLayer::Below < WindowLayer::Normal);
        assert!(WindowLayer::FullScreen > WindowLayer::Above);
    }
}
