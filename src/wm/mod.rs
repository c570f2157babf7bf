//! Window Manager Module
//!
//! The control unit for one managed top-level window: hint ingestion,
//! decoration policy, geometry constraints, the visibility state machine,
//! transient/group links, interactive move/resize and event dispatch.
//! Everything here talks to the outside world through the collaborator
//! traits carried in [`Context`].

pub mod client;
pub mod client_flags;
pub mod constraints;
pub mod decorations;
pub mod display;
pub mod error;
pub mod events;
pub mod ewmh;
pub mod focus;
pub mod hints;
pub mod moveresize;
pub mod netwm;
pub mod policy;
pub mod screen;
pub mod settings;
pub mod state;
pub mod transients;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ManagedWindow, capture, release_window};
pub use decorations::Renderer;
pub use display::{DisplayConnection, ServerGrab, WindowId};
pub use error::{CaptureError, Result, WmError};
pub use events::{EventResult, WindowEvent, dispatch, map_new_window};
pub use ewmh::Atoms;
pub use screen::ScreenManager;
pub use settings::Settings;
pub use transients::{WindowLookup, WindowTable};

/// Collaborators and settings every operation on a managed window needs
pub struct Context<'a> {
    pub display: &'a mut dyn DisplayConnection,
    pub screen: &'a mut dyn ScreenManager,
    pub renderer: &'a mut dyn Renderer,
    pub atoms: &'a Atoms,
    pub settings: &'a Settings,
    /// Set while the manager exits; released windows keep their state
    pub shutting_down: bool,
}
