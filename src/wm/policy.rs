//! Decoration & function policy
//!
//! A pure mapping from what the client told us (type, transiency, hints)
//! to what may be drawn around it and what may be done with it.

use crate::wm::client_flags::{Decorations, Functions, WindowType};
use crate::wm::hints::{MotifHints, NormalHints, WmProtocols};

/// Inputs the policy depends on. Re-run whenever any of them changes.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub window_type: WindowType,
    pub transient: bool,
    pub motif: &'a MotifHints,
    pub normal: &'a NormalHints,
    pub protocols: &'a WmProtocols,
}

/// Allowed decorations and functions for the given inputs
pub fn update_decorations(input: &PolicyInput<'_>) -> (Decorations, Functions) {
    let mut decorations = Decorations::all();
    let mut functions = Functions::all();

    // transients stay on their parent's workspace
    if input.transient {
        functions.remove(Functions::CHANGE_WORKSPACE);
    }

    match input.window_type {
        WindowType::Dialog => {
            decorations.remove(Decorations::ICONIFY | Decorations::MAXIMIZE);
            functions.remove(
                Functions::SHADE
                    | Functions::ICONIFY
                    | Functions::MAXIMIZE
                    | Functions::CHANGE_LAYER
                    | Functions::FULLSCREEN,
            );
        }
        WindowType::Desktop | WindowType::Dock | WindowType::Splash => {
            decorations = Decorations::empty();
            functions = Functions::empty();
        }
        WindowType::Toolbar | WindowType::Menu => {
            decorations.remove(
                Decorations::HANDLE
                    | Decorations::GRIP
                    | Decorations::BORDER
                    | Decorations::ICONIFY
                    | Decorations::MAXIMIZE,
            );
            functions.remove(
                Functions::RESIZE
                    | Functions::SHADE
                    | Functions::ICONIFY
                    | Functions::MAXIMIZE
                    | Functions::FULLSCREEN,
            );
        }
        WindowType::Utility => {
            decorations.remove(Decorations::ICONIFY | Decorations::MAXIMIZE);
            functions.remove(Functions::SHADE | Functions::ICONIFY | Functions::MAXIMIZE);
        }
        WindowType::Normal => {}
    }

    decorations &= input.motif.decorations;
    functions &= input.motif.functions;

    if !decorations.contains(Decorations::TITLEBAR) {
        functions.remove(Functions::SHADE);
    }

    if input.normal.is_fixed_size() {
        decorations.remove(Decorations::MAXIMIZE | Decorations::GRIP);
        functions.remove(Functions::RESIZE | Functions::MAXIMIZE);
    }

    if !input.protocols.delete_window {
        decorations.remove(Decorations::CLOSE);
        functions.remove(Functions::CLOSE);
    }

    (decorations, functions)
}
