//! EWMH / ICCCM atoms
//!
//! Every atom the window control unit reads or writes. Predefined atoms
//! (WM_NAME, WM_HINTS, CARDINAL, ...) come from `AtomEnum` and are not
//! interned here.

use x11rb::protocol::xproto::{Atom, AtomEnum};

/// Value of `_NET_WM_DESKTOP` meaning "on every workspace".
pub const ALL_WORKSPACES: u32 = 0xFFFF_FFFF;

/// Declares the interned `Atoms` set.
macro_rules! window_atoms {
    ($($name:ident),* $(,)?) => {
        x11rb::atom_manager! {
            pub Atoms: AtomsCookie {
                $($name,)*
            }
        }

        impl Atoms {
            /// Distinct fake atom values, for tests that never talk to a server.
            #[cfg(test)]
            pub fn sequential() -> Self {
                let mut next: Atom = 1000;
                let mut take = || {
                    next += 1;
                    next
                };
                Self { $($name: take(),)* }
            }
        }
    };
}

window_atoms! {
    UTF8_STRING,

    // ICCCM
    WM_PROTOCOLS,
    WM_DELETE_WINDOW,
    WM_TAKE_FOCUS,
    WM_STATE,
    WM_CHANGE_STATE,
    _MOTIF_WM_HINTS,

    // root
    _NET_SUPPORTED,
    _NET_SUPPORTING_WM_CHECK,
    _NET_ACTIVE_WINDOW,
    _NET_CLOSE_WINDOW,
    _NET_MOVERESIZE_WINDOW,

    // application window properties
    _NET_WM_NAME,
    _NET_WM_VISIBLE_NAME,
    _NET_WM_ICON_NAME,
    _NET_WM_VISIBLE_ICON_NAME,
    _NET_WM_DESKTOP,
    _NET_WM_STRUT,
    _NET_WM_STRUT_PARTIAL,

    _NET_WM_WINDOW_TYPE,
    _NET_WM_WINDOW_TYPE_DESKTOP,
    _NET_WM_WINDOW_TYPE_DOCK,
    _NET_WM_WINDOW_TYPE_TOOLBAR,
    _NET_WM_WINDOW_TYPE_MENU,
    _NET_WM_WINDOW_TYPE_UTILITY,
    _NET_WM_WINDOW_TYPE_SPLASH,
    _NET_WM_WINDOW_TYPE_DIALOG,
    _NET_WM_WINDOW_TYPE_NORMAL,

    _NET_WM_STATE,
    _NET_WM_STATE_MODAL,
    _NET_WM_STATE_MAXIMIZED_VERT,
    _NET_WM_STATE_MAXIMIZED_HORZ,
    _NET_WM_STATE_SHADED,
    _NET_WM_STATE_SKIP_TASKBAR,
    _NET_WM_STATE_SKIP_PAGER,
    _NET_WM_STATE_HIDDEN,
    _NET_WM_STATE_FULLSCREEN,
    _NET_WM_STATE_ABOVE,
    _NET_WM_STATE_BELOW,

    _NET_WM_ALLOWED_ACTIONS,
    _NET_WM_ACTION_MOVE,
    _NET_WM_ACTION_RESIZE,
    _NET_WM_ACTION_MINIMIZE,
    _NET_WM_ACTION_SHADE,
    _NET_WM_ACTION_MAXIMIZE_HORZ,
    _NET_WM_ACTION_MAXIMIZE_VERT,
    _NET_WM_ACTION_FULLSCREEN,
    _NET_WM_ACTION_CHANGE_DESKTOP,
    _NET_WM_ACTION_CLOSE,
}

impl Atoms {
    /// Atoms advertised in `_NET_SUPPORTED`.
    pub fn supported(&self) -> Vec<Atom> {
        vec![
            self._NET_SUPPORTED,
            self._NET_SUPPORTING_WM_CHECK,
            self._NET_ACTIVE_WINDOW,
            self._NET_CLOSE_WINDOW,
            self._NET_MOVERESIZE_WINDOW,
            self._NET_WM_NAME,
            self._NET_WM_VISIBLE_NAME,
            self._NET_WM_ICON_NAME,
            self._NET_WM_VISIBLE_ICON_NAME,
            self._NET_WM_DESKTOP,
            self._NET_WM_STRUT,
            self._NET_WM_STRUT_PARTIAL,
            self._NET_WM_WINDOW_TYPE,
            self._NET_WM_WINDOW_TYPE_DESKTOP,
            self._NET_WM_WINDOW_TYPE_DOCK,
            self._NET_WM_WINDOW_TYPE_TOOLBAR,
            self._NET_WM_WINDOW_TYPE_MENU,
            self._NET_WM_WINDOW_TYPE_UTILITY,
            self._NET_WM_WINDOW_TYPE_SPLASH,
            self._NET_WM_WINDOW_TYPE_DIALOG,
            self._NET_WM_WINDOW_TYPE_NORMAL,
            self._NET_WM_STATE,
            self._NET_WM_STATE_MODAL,
            self._NET_WM_STATE_MAXIMIZED_VERT,
            self._NET_WM_STATE_MAXIMIZED_HORZ,
            self._NET_WM_STATE_SHADED,
            self._NET_WM_STATE_SKIP_TASKBAR,
            self._NET_WM_STATE_SKIP_PAGER,
            self._NET_WM_STATE_HIDDEN,
            self._NET_WM_STATE_FULLSCREEN,
            self._NET_WM_STATE_ABOVE,
            self._NET_WM_STATE_BELOW,
            self._NET_WM_ALLOWED_ACTIONS,
            self._NET_WM_ACTION_MOVE,
            self._NET_WM_ACTION_RESIZE,
            self._NET_WM_ACTION_MINIMIZE,
            self._NET_WM_ACTION_SHADE,
            self._NET_WM_ACTION_MAXIMIZE_HORZ,
            self._NET_WM_ACTION_MAXIMIZE_VERT,
            self._NET_WM_ACTION_FULLSCREEN,
            self._NET_WM_ACTION_CHANGE_DESKTOP,
            self._NET_WM_ACTION_CLOSE,
        ]
    }
}

/// Shorthand for a predefined atom.
pub fn predefined(atom: AtomEnum) -> Atom {
    atom.into()
}
