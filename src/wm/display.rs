//! Display Module
//!
//! The narrow view of the X connection the window control unit works
//! against. The driver binary implements it over `x11rb`; tests use the
//! recording fake in `wm::testing`.

use std::ops::{Deref, DerefMut};

use bitflags::bitflags;
use tracing::warn;
use x11rb::protocol::xproto::Atom;

use crate::shared::Geometry;
use crate::wm::{Context, Result};

/// X window identifier
pub type WindowId = u32;

/// Attributes read once at capture time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttributes {
    pub geometry: Geometry,
    pub border_width: u32,
    pub override_redirect: bool,
    pub colormap: u32,
    pub root: WindowId,
}

/// Cursor shown over a frame part or during a pointer grab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    Pointer,
    Move,
    ResizeBottomLeft,
    ResizeBottomRight,
}

/// Which kind of frame window to create; selects the event mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRole {
    /// Override-redirect top level holding everything else
    Frame,
    /// Parent of the client; redirects its substructure
    Plate,
    /// Titlebar, label, button, handle or grip
    Decoration(Option<CursorShape>),
}

bitflags! {
    /// Events selected on the client window
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClientEvents: u32 {
        const PROPERTY_CHANGE  = 1 << 0;
        const STRUCTURE_NOTIFY = 1 << 1;
    }
}

impl ClientEvents {
    /// Everything selected while the window is managed
    pub const MANAGED: Self = Self::all();
}

/// Passive button grab installed on a frame window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonGrab {
    pub button: u8,
    pub modifiers: u16,
    /// Synchronous grabs freeze the pointer until replayed
    pub sync: bool,
    pub cursor: Option<CursorShape>,
}

/// Operations the window control unit issues against the display server.
///
/// Reads return `Ok(None)` when the property or window is absent; a broken
/// connection is the only error.
pub trait DisplayConnection {
    fn root(&self) -> WindowId;

    /// Timestamp of the last event seen, used for focus and grabs
    fn time(&self) -> u32;

    fn atom(&mut self, name: &str) -> Result<Atom>;
    fn atom_name(&mut self, atom: Atom) -> Option<String>;

    fn get_window_attributes(&mut self, window: WindowId) -> Result<Option<WindowAttributes>>;

    /// Read a format-32 property. `type_` of 0 accepts any type.
    fn get_property32(
        &mut self,
        window: WindowId,
        property: Atom,
        type_: Atom,
    ) -> Result<Option<Vec<u32>>>;

    /// Read a text property, decoding STRING and UTF8_STRING
    fn get_text_property(&mut self, window: WindowId, property: Atom) -> Result<Option<String>>;

    fn change_property32(
        &mut self,
        window: WindowId,
        property: Atom,
        type_: Atom,
        data: &[u32],
    ) -> Result<()>;

    fn change_utf8_property(&mut self, window: WindowId, property: Atom, value: &str) -> Result<()>;

    fn delete_property(&mut self, window: WindowId, property: Atom) -> Result<()>;

    fn send_client_message(
        &mut self,
        window: WindowId,
        message_type: Atom,
        data: [u32; 5],
    ) -> Result<()>;

    /// Synthetic ConfigureNotify telling the client where it really is
    fn send_configure_notify(
        &mut self,
        window: WindowId,
        geometry: Geometry,
        border_width: u32,
    ) -> Result<()>;

    fn create_window(
        &mut self,
        parent: WindowId,
        geometry: Geometry,
        border_width: u32,
        role: WindowRole,
    ) -> Result<WindowId>;
    fn destroy_window(&mut self, window: WindowId) -> Result<()>;
    fn map_window(&mut self, window: WindowId) -> Result<()>;
    fn unmap_window(&mut self, window: WindowId) -> Result<()>;
    fn map_subwindows(&mut self, window: WindowId) -> Result<()>;
    fn move_window(&mut self, window: WindowId, x: i32, y: i32) -> Result<()>;
    fn resize_window(&mut self, window: WindowId, width: u32, height: u32) -> Result<()>;
    fn move_resize_window(&mut self, window: WindowId, geometry: Geometry) -> Result<()>;
    fn set_border_width(&mut self, window: WindowId, width: u32) -> Result<()>;
    fn reparent_window(&mut self, window: WindowId, parent: WindowId, x: i32, y: i32) -> Result<()>;
    fn select_input(&mut self, window: WindowId, events: ClientEvents) -> Result<()>;
    fn change_save_set(&mut self, window: WindowId, insert: bool) -> Result<()>;

    fn set_input_focus(&mut self, window: WindowId) -> Result<()>;
    /// Returns false when another client holds the pointer
    fn grab_pointer(&mut self, window: WindowId, cursor: CursorShape) -> Result<bool>;
    fn ungrab_pointer(&mut self) -> Result<()>;
    fn grab_button(&mut self, window: WindowId, grab: ButtonGrab) -> Result<()>;
    fn ungrab_button(&mut self, window: WindowId, button: u8, modifiers: u16) -> Result<()>;
    /// Release a frozen synchronous button grab
    fn allow_replay_pointer(&mut self) -> Result<()>;
    fn install_colormap(&mut self, colormap: u32) -> Result<()>;

    fn grab_server(&mut self) -> Result<()>;
    fn ungrab_server(&mut self) -> Result<()>;

    /// Remove a queued LeaveNotify for `window`, reporting whether one was
    /// pending and whether it crossed into an inferior.
    fn take_pending_leave(&mut self, window: WindowId) -> Option<LeaveCrossing>;

    /// Whether a ReparentNotify for `window` is waiting in the queue
    fn has_pending_reparent(&mut self, window: WindowId) -> bool;
}

/// Detail of a LeaveNotify peeked from the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveCrossing {
    pub into_inferior: bool,
}

/// Holds the server grabbed until dropped, so every exit path (including
/// `?` returns) ungrabs. Derefs to the context it guards.
pub struct ServerGrab<'g, 'c> {
    ctx: &'g mut Context<'c>,
}

impl<'g, 'c> ServerGrab<'g, 'c> {
    pub fn new(ctx: &'g mut Context<'c>) -> Result<Self> {
        ctx.display.grab_server()?;
        Ok(Self { ctx })
    }
}

impl<'c> Deref for ServerGrab<'_, 'c> {
    type Target = Context<'c>;

    fn deref(&self) -> &Context<'c> {
        self.ctx
    }
}

impl<'c> DerefMut for ServerGrab<'_, 'c> {
    fn deref_mut(&mut self) -> &mut Context<'c> {
        self.ctx
    }
}

impl Drop for ServerGrab<'_, '_> {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.display.ungrab_server() {
            warn!("Failed to release server grab: {}", e);
        }
    }
}
