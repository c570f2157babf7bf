//! Display connection over x11rb
//!
//! Implements the window control unit's `DisplayConnection` on a live
//! `RustConnection`. Events are pulled into a local queue so the control
//! unit can look ahead for LeaveNotify and ReparentNotify.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, trace, warn};
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT, CURRENT_TIME, NONE};

use area_window::shared::Geometry;
use area_window::wm::decorations::IGNORED_MODIFIERS;
use area_window::wm::display::{
    ButtonGrab, ClientEvents, CursorShape, DisplayConnection, LeaveCrossing, WindowAttributes,
    WindowId, WindowRole,
};
use area_window::wm::{Atoms, Result};

use crate::x11_render::FRAME_COLOR;

// glyphs of the standard cursor font
const XC_BOTTOM_LEFT_CORNER: u16 = 12;
const XC_BOTTOM_RIGHT_CORNER: u16 = 14;
const XC_FLEUR: u16 = 52;
const XC_LEFT_PTR: u16 = 68;

/// Cursors created once from the cursor font
#[derive(Debug, Clone, Copy)]
struct Cursors {
    pointer: Cursor,
    moving: Cursor,
    bottom_left: Cursor,
    bottom_right: Cursor,
}

impl Cursors {
    fn create(conn: &RustConnection) -> Result<Self> {
        let font = conn.generate_id()?;
        conn.open_font(font, b"cursor")?;

        let glyph = |shape: u16| -> Result<Cursor> {
            let cursor = conn.generate_id()?;
            conn.create_glyph_cursor(
                cursor, font, font, shape, shape + 1, 0, 0, 0, 0xffff, 0xffff, 0xffff,
            )?;
            Ok(cursor)
        };

        let cursors = Self {
            pointer: glyph(XC_LEFT_PTR)?,
            moving: glyph(XC_FLEUR)?,
            bottom_left: glyph(XC_BOTTOM_LEFT_CORNER)?,
            bottom_right: glyph(XC_BOTTOM_RIGHT_CORNER)?,
        };
        conn.close_font(font)?;
        Ok(cursors)
    }

    fn get(&self, shape: CursorShape) -> Cursor {
        match shape {
            CursorShape::Pointer => self.pointer,
            CursorShape::Move => self.moving,
            CursorShape::ResizeBottomLeft => self.bottom_left,
            CursorShape::ResizeBottomRight => self.bottom_right,
        }
    }
}

pub struct X11Display {
    conn: Arc<RustConnection>,
    root: Window,
    atoms: Atoms,
    time: Timestamp,
    queue: VecDeque<Event>,
    cursors: Cursors,
}

impl X11Display {
    pub fn new(conn: Arc<RustConnection>, root: Window, atoms: Atoms) -> Result<Self> {
        let cursors = Cursors::create(&conn)?;
        Ok(Self {
            conn,
            root,
            atoms,
            time: CURRENT_TIME,
            queue: VecDeque::new(),
            cursors,
        })
    }

    /// Remember the server time carried by an event
    pub fn note_time(&mut self, time: Timestamp) {
        if time != CURRENT_TIME {
            self.time = time;
        }
    }

    /// Move everything the connection has read into the local queue
    pub fn fill_queue(&mut self) -> Result<()> {
        while let Some(event) = self.conn.poll_for_event()? {
            self.queue.push_back(event);
        }
        Ok(())
    }

    pub fn next_event(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    fn peek_queue(&mut self) {
        if let Err(e) = self.fill_queue() {
            warn!("Failed to read pending events: {}", e);
        }
    }
}

/// `Ok(None)` for a request the server rejected (usually a window that is
/// already gone); only a broken connection is an error.
fn present<T>(reply: std::result::Result<T, ReplyError>) -> Result<Option<T>> {
    match reply {
        Ok(value) => Ok(Some(value)),
        Err(ReplyError::X11Error(e)) => {
            trace!("Request rejected: {:?}", e.error_kind);
            Ok(None)
        }
        Err(ReplyError::ConnectionError(e)) => Err(e.into()),
    }
}

/// Decode a text property value. STRING is Latin-1; UTF8_STRING and
/// anything else (COMPOUND_TEXT in practice) is read as UTF-8.
fn decode_text(type_: Atom, value: &[u8], utf8_string: Atom) -> String {
    if type_ == Atom::from(AtomEnum::STRING) {
        value.iter().map(|&b| char::from(b)).collect()
    } else {
        if type_ != utf8_string {
            trace!("Reading text property of type {} as UTF-8", type_);
        }
        String::from_utf8_lossy(value).into_owned()
    }
}

fn event_mask(events: ClientEvents) -> EventMask {
    let mut mask = EventMask::NO_EVENT;
    if events.contains(ClientEvents::PROPERTY_CHANGE) {
        mask |= EventMask::PROPERTY_CHANGE;
    }
    if events.contains(ClientEvents::STRUCTURE_NOTIFY) {
        mask |= EventMask::STRUCTURE_NOTIFY;
    }
    mask
}

/// `modifiers` combined with every subset of the lock modifiers, so a
/// passive grab fires whatever NumLock/CapsLock/ScrollLock are doing
fn with_ignored_modifiers(modifiers: u16) -> Vec<u16> {
    let locks: Vec<u16> = (0..16)
        .map(|bit| 1u16 << bit)
        .filter(|bit| IGNORED_MODIFIERS & bit != 0)
        .collect();
    (0..1u16 << locks.len())
        .map(|subset| {
            locks
                .iter()
                .enumerate()
                .filter(|(i, _)| subset & (1 << i) != 0)
                .fold(modifiers, |mask, (_, lock)| mask | lock)
        })
        .collect()
}

fn clamp_pos(value: i32) -> i16 {
    value.clamp(i16::MIN.into(), i16::MAX.into()) as i16
}

/// X refuses zero-sized windows
fn clamp_size(value: u32) -> u16 {
    value.clamp(1, u16::MAX.into()) as u16
}

impl DisplayConnection for X11Display {
    fn root(&self) -> WindowId {
        self.root
    }

    fn time(&self) -> u32 {
        self.time
    }

    fn atom(&mut self, name: &str) -> Result<Atom> {
        Ok(self.conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
    }

    fn atom_name(&mut self, atom: Atom) -> Option<String> {
        let reply = self.conn.get_atom_name(atom).ok()?.reply().ok()?;
        String::from_utf8(reply.name).ok()
    }

    fn get_window_attributes(&mut self, window: WindowId) -> Result<Option<WindowAttributes>> {
        let attributes = self.conn.get_window_attributes(window)?;
        let geometry = self.conn.get_geometry(window)?;
        let (Some(attributes), Some(geometry)) =
            (present(attributes.reply())?, present(geometry.reply())?)
        else {
            return Ok(None);
        };

        Ok(Some(WindowAttributes {
            geometry: Geometry::new(
                geometry.x.into(),
                geometry.y.into(),
                geometry.width.into(),
                geometry.height.into(),
            ),
            border_width: geometry.border_width.into(),
            override_redirect: attributes.override_redirect,
            colormap: attributes.colormap,
            root: geometry.root,
        }))
    }

    fn get_property32(
        &mut self,
        window: WindowId,
        property: Atom,
        type_: Atom,
    ) -> Result<Option<Vec<u32>>> {
        let cookie = self
            .conn
            .get_property(false, window, property, type_, 0, u32::MAX)?;
        let Some(reply) = present(cookie.reply())? else {
            return Ok(None);
        };
        if reply.type_ == NONE {
            return Ok(None);
        }
        Ok(reply.value32().map(|values| values.collect()))
    }

    fn get_text_property(&mut self, window: WindowId, property: Atom) -> Result<Option<String>> {
        let cookie =
            self.conn
                .get_property(false, window, property, AtomEnum::ANY, 0, u32::MAX)?;
        let Some(reply) = present(cookie.reply())? else {
            return Ok(None);
        };
        if reply.type_ == NONE || reply.format != 8 {
            return Ok(None);
        }
        Ok(Some(decode_text(reply.type_, &reply.value, self.atoms.UTF8_STRING)))
    }

    fn change_property32(
        &mut self,
        window: WindowId,
        property: Atom,
        type_: Atom,
        data: &[u32],
    ) -> Result<()> {
        self.conn
            .change_property32(PropMode::REPLACE, window, property, type_, data)?;
        Ok(())
    }

    fn change_utf8_property(&mut self, window: WindowId, property: Atom, value: &str) -> Result<()> {
        self.conn.change_property8(
            PropMode::REPLACE,
            window,
            property,
            self.atoms.UTF8_STRING,
            value.as_bytes(),
        )?;
        Ok(())
    }

    fn delete_property(&mut self, window: WindowId, property: Atom) -> Result<()> {
        self.conn.delete_property(window, property)?;
        Ok(())
    }

    fn send_client_message(
        &mut self,
        window: WindowId,
        message_type: Atom,
        data: [u32; 5],
    ) -> Result<()> {
        let event = ClientMessageEvent::new(32, window, message_type, data);
        self.conn
            .send_event(false, window, EventMask::NO_EVENT, event)?;
        Ok(())
    }

    fn send_configure_notify(
        &mut self,
        window: WindowId,
        geometry: Geometry,
        border_width: u32,
    ) -> Result<()> {
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: NONE,
            x: clamp_pos(geometry.x),
            y: clamp_pos(geometry.y),
            width: clamp_size(geometry.width),
            height: clamp_size(geometry.height),
            border_width: border_width.min(u16::MAX.into()) as u16,
            override_redirect: false,
        };
        self.conn
            .send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn create_window(
        &mut self,
        parent: WindowId,
        geometry: Geometry,
        border_width: u32,
        role: WindowRole,
    ) -> Result<WindowId> {
        let window = self.conn.generate_id()?;
        let aux = match role {
            WindowRole::Frame => CreateWindowAux::new()
                .override_redirect(1)
                .background_pixel(FRAME_COLOR)
                .border_pixel(FRAME_COLOR)
                .event_mask(
                    EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::POINTER_MOTION
                        | EventMask::ENTER_WINDOW
                        | EventMask::LEAVE_WINDOW
                        | EventMask::EXPOSURE
                        | EventMask::FOCUS_CHANGE,
                ),
            WindowRole::Plate => CreateWindowAux::new()
                .background_pixel(FRAME_COLOR)
                .event_mask(EventMask::SUBSTRUCTURE_REDIRECT),
            WindowRole::Decoration(cursor) => CreateWindowAux::new()
                .background_pixel(FRAME_COLOR)
                .event_mask(
                    EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::BUTTON_MOTION
                        | EventMask::EXPOSURE,
                )
                .cursor(cursor.map(|shape| self.cursors.get(shape))),
        };

        self.conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            parent,
            clamp_pos(geometry.x),
            clamp_pos(geometry.y),
            clamp_size(geometry.width),
            clamp_size(geometry.height),
            border_width.min(u16::MAX.into()) as u16,
            WindowClass::INPUT_OUTPUT,
            COPY_FROM_PARENT,
            &aux,
        )?;
        trace!("Created {:?} window {} in {}", role, window, parent);
        Ok(window)
    }

    fn destroy_window(&mut self, window: WindowId) -> Result<()> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn map_window(&mut self, window: WindowId) -> Result<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap_window(&mut self, window: WindowId) -> Result<()> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn map_subwindows(&mut self, window: WindowId) -> Result<()> {
        self.conn.map_subwindows(window)?;
        Ok(())
    }

    fn move_window(&mut self, window: WindowId, x: i32, y: i32) -> Result<()> {
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().x(x).y(y))?;
        Ok(())
    }

    fn resize_window(&mut self, window: WindowId, width: u32, height: u32) -> Result<()> {
        let aux = ConfigureWindowAux::new()
            .width(u32::from(clamp_size(width)))
            .height(u32::from(clamp_size(height)));
        self.conn.configure_window(window, &aux)?;
        Ok(())
    }

    fn move_resize_window(&mut self, window: WindowId, geometry: Geometry) -> Result<()> {
        let aux = ConfigureWindowAux::new()
            .x(geometry.x)
            .y(geometry.y)
            .width(u32::from(clamp_size(geometry.width)))
            .height(u32::from(clamp_size(geometry.height)));
        self.conn.configure_window(window, &aux)?;
        Ok(())
    }

    fn set_border_width(&mut self, window: WindowId, width: u32) -> Result<()> {
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().border_width(width))?;
        Ok(())
    }

    fn reparent_window(&mut self, window: WindowId, parent: WindowId, x: i32, y: i32) -> Result<()> {
        self.conn
            .reparent_window(window, parent, clamp_pos(x), clamp_pos(y))?;
        Ok(())
    }

    fn select_input(&mut self, window: WindowId, events: ClientEvents) -> Result<()> {
        let aux = ChangeWindowAttributesAux::new().event_mask(event_mask(events));
        self.conn.change_window_attributes(window, &aux)?;
        Ok(())
    }

    fn change_save_set(&mut self, window: WindowId, insert: bool) -> Result<()> {
        let mode = if insert { SetMode::INSERT } else { SetMode::DELETE };
        self.conn.change_save_set(mode, window)?;
        Ok(())
    }

    fn set_input_focus(&mut self, window: WindowId) -> Result<()> {
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, window, self.time)?;
        Ok(())
    }

    fn grab_pointer(&mut self, window: WindowId, cursor: CursorShape) -> Result<bool> {
        let cookie = self.conn.grab_pointer(
            false,
            window,
            EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
            GrabMode::ASYNC,
            GrabMode::ASYNC,
            NONE,
            self.cursors.get(cursor),
            self.time,
        )?;
        let status = cookie.reply()?.status;
        if status != GrabStatus::SUCCESS {
            debug!("Pointer grab on {} refused: {:?}", window, status);
        }
        Ok(status == GrabStatus::SUCCESS)
    }

    fn ungrab_pointer(&mut self) -> Result<()> {
        self.conn.ungrab_pointer(self.time)?;
        Ok(())
    }

    fn grab_button(&mut self, window: WindowId, grab: ButtonGrab) -> Result<()> {
        let pointer_mode = if grab.sync { GrabMode::SYNC } else { GrabMode::ASYNC };
        let cursor = grab.cursor.map_or(NONE, |shape| self.cursors.get(shape));
        for modifiers in with_ignored_modifiers(grab.modifiers) {
            self.conn.grab_button(
                false,
                window,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::BUTTON_MOTION,
                pointer_mode,
                GrabMode::ASYNC,
                NONE,
                cursor,
                ButtonIndex::from(grab.button),
                ModMask::from(modifiers),
            )?;
        }
        Ok(())
    }

    fn ungrab_button(&mut self, window: WindowId, button: u8, modifiers: u16) -> Result<()> {
        for modifiers in with_ignored_modifiers(modifiers) {
            self.conn
                .ungrab_button(ButtonIndex::from(button), window, ModMask::from(modifiers))?;
        }
        Ok(())
    }

    fn allow_replay_pointer(&mut self) -> Result<()> {
        self.conn.allow_events(Allow::REPLAY_POINTER, self.time)?;
        Ok(())
    }

    fn install_colormap(&mut self, colormap: u32) -> Result<()> {
        if colormap != NONE {
            self.conn.install_colormap(colormap)?;
        }
        Ok(())
    }

    fn grab_server(&mut self) -> Result<()> {
        self.conn.grab_server()?;
        Ok(())
    }

    fn ungrab_server(&mut self) -> Result<()> {
        self.conn.ungrab_server()?;
        self.conn.flush()?;
        Ok(())
    }

    fn take_pending_leave(&mut self, window: WindowId) -> Option<LeaveCrossing> {
        self.peek_queue();
        let index = self
            .queue
            .iter()
            .position(|event| matches!(event, Event::LeaveNotify(e) if e.event == window))?;
        match self.queue.remove(index)? {
            Event::LeaveNotify(e) => Some(LeaveCrossing {
                into_inferior: e.detail == NotifyDetail::INFERIOR,
            }),
            _ => None,
        }
    }

    fn has_pending_reparent(&mut self, window: WindowId) -> bool {
        self.peek_queue();
        self.queue
            .iter()
            .any(|event| matches!(event, Event::ReparentNotify(e) if e.window == window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_latin1_text() {
        let text = decode_text(AtomEnum::STRING.into(), &[b'c', 0xe9, b'!'], 500);
        assert_eq!(text, "c\u{e9}!");
    }

    #[test]
    fn test_decode_utf8_text() {
        let text = decode_text(500, "caf\u{e9}".as_bytes(), 500);
        assert_eq!(text, "caf\u{e9}");
        // unknown encodings are read as UTF-8 and never fail
        assert_eq!(decode_text(7, &[0xff, b'a'], 500), "\u{fffd}a");
    }

    #[test]
    fn test_event_mask_follows_selection() {
        assert_eq!(event_mask(ClientEvents::empty()), EventMask::NO_EVENT);
        assert_eq!(
            event_mask(ClientEvents::MANAGED),
            EventMask::PROPERTY_CHANGE | EventMask::STRUCTURE_NOTIFY
        );
    }

    #[test]
    fn test_grabs_cover_lock_modifiers() {
        let masks = with_ignored_modifiers(1 << 3);
        assert_eq!(masks.len(), 8);
        assert!(masks.contains(&(1 << 3)));
        assert!(masks.contains(&((1 << 3) | IGNORED_MODIFIERS)));
    }

    #[test]
    fn test_window_sizes_are_clamped() {
        assert_eq!(clamp_size(0), 1);
        assert_eq!(clamp_size(100_000), u16::MAX);
        assert_eq!(clamp_pos(-40_000), i16::MIN);
    }
}
