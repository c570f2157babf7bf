//! Recording fakes of the display, screen and renderer, and a harness
//! tying them to a window table.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use x11rb::protocol::xproto::{Atom, AtomEnum};

use crate::shared::Geometry;
use crate::wm::client::{ManagedWindow, capture, release_window};
use crate::wm::client_flags::WindowLayer;
use crate::wm::decorations::{FramePart, PartLook, PixmapId, Renderer, StyleElement};
use crate::wm::display::{
    ButtonGrab, ClientEvents, CursorShape, DisplayConnection, LeaveCrossing, WindowAttributes, WindowId,
    WindowRole,
};
use crate::wm::ewmh::{Atoms, predefined};
use crate::wm::hints::Strut;
use crate::wm::screen::{GeometryFeedback, ScreenManager};
use crate::wm::settings::Settings;
use crate::wm::transients::{WindowLookup, WindowTable};
use crate::wm::{Context, Result, WmError};

pub const ROOT: WindowId = 1;

/// Requests whose order or arguments tests look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Reparent(WindowId, WindowId, i32, i32),
    SaveSet(WindowId, bool),
    ConfigureNotify(WindowId, Geometry),
    Map(WindowId),
    Unmap(WindowId),
    Select(WindowId, ClientEvents),
    ChangeText(WindowId, Atom, String),
    DeleteProperty(WindowId, Atom),
    ClientMessage(WindowId, Atom, [u32; 5]),
    Focus(WindowId),
    UngrabPointer,
    ReplayPointer,
}

pub struct FakeDisplay {
    pub root: WindowId,
    pub time: u32,
    pub attributes: HashMap<WindowId, WindowAttributes>,
    pub properties: HashMap<(WindowId, Atom), Vec<u32>>,
    pub texts: HashMap<(WindowId, Atom), String>,
    pub geometries: HashMap<WindowId, Geometry>,
    pub grabs: HashSet<(WindowId, u8, u16)>,
    pub destroyed: Vec<WindowId>,
    pub pending_reparent: HashSet<WindowId>,
    pub pending_leaves: HashMap<WindowId, LeaveCrossing>,
    pub pointer_busy: bool,
    pub grab_depth: u32,
    pub calls: Vec<Call>,
    atoms: Atoms,
    next_id: WindowId,
}

impl FakeDisplay {
    pub fn new(atoms: Atoms) -> Self {
        Self {
            root: ROOT,
            time: 0,
            attributes: HashMap::new(),
            properties: HashMap::new(),
            texts: HashMap::new(),
            geometries: HashMap::new(),
            grabs: HashSet::new(),
            destroyed: Vec::new(),
            pending_reparent: HashSet::new(),
            pending_leaves: HashMap::new(),
            pointer_busy: false,
            grab_depth: 0,
            calls: Vec::new(),
            atoms,
            next_id: 0x1000,
        }
    }

    /// A top-level client named "client {id}"
    pub fn add_client(&mut self, id: WindowId, geometry: Geometry) {
        self.attributes.insert(
            id,
            WindowAttributes {
                geometry,
                border_width: 1,
                override_redirect: false,
                colormap: 0,
                root: self.root,
            },
        );
        self.geometries.insert(id, geometry);
        self.texts
            .insert((id, predefined(AtomEnum::WM_NAME)), format!("client {}", id));
    }

    pub fn set_property(&mut self, window: WindowId, property: Atom, data: Vec<u32>) {
        self.properties.insert((window, property), data);
    }

    pub fn remove_property(&mut self, window: WindowId, property: Atom) {
        self.properties.remove(&(window, property));
    }

    pub fn property(&self, window: WindowId, property: Atom) -> Option<Vec<u32>> {
        self.properties.get(&(window, property)).cloned()
    }

    pub fn set_text(&mut self, window: WindowId, property: Atom, value: &str) {
        self.texts.insert((window, property), value.to_string());
    }

    pub fn set_transient_for(&mut self, window: WindowId, parent: WindowId) {
        self.set_property(window, predefined(AtomEnum::WM_TRANSIENT_FOR), vec![parent]);
    }

    pub fn set_protocols(&mut self, window: WindowId, delete: bool, take_focus: bool) {
        let mut protocols = Vec::new();
        if delete {
            protocols.push(self.atoms.WM_DELETE_WINDOW);
        }
        if take_focus {
            protocols.push(self.atoms.WM_TAKE_FOCUS);
        }
        let property = self.atoms.WM_PROTOCOLS;
        self.set_property(window, property, protocols);
    }

    pub fn last_geometry(&self, window: WindowId) -> Option<Geometry> {
        self.geometries.get(&window).copied()
    }

    pub fn has_grab(&self, window: WindowId, button: u8, modifiers: u16) -> bool {
        self.grabs.contains(&(window, button, modifiers))
    }
}

impl DisplayConnection for FakeDisplay {
    fn root(&self) -> WindowId {
        self.root
    }

    fn time(&self) -> u32 {
        self.time
    }

    fn atom(&mut self, _name: &str) -> Result<Atom> {
        self.next_id += 1;
        Ok(self.next_id)
    }

    fn atom_name(&mut self, _atom: Atom) -> Option<String> {
        None
    }

    fn get_window_attributes(&mut self, window: WindowId) -> Result<Option<WindowAttributes>> {
        Ok(self.attributes.get(&window).copied())
    }

    fn get_property32(&mut self, window: WindowId, property: Atom, _type: Atom) -> Result<Option<Vec<u32>>> {
        Ok(self.property(window, property))
    }

    fn get_text_property(&mut self, window: WindowId, property: Atom) -> Result<Option<String>> {
        Ok(self.texts.get(&(window, property)).cloned())
    }

    fn change_property32(&mut self, window: WindowId, property: Atom, _type: Atom, data: &[u32]) -> Result<()> {
        self.set_property(window, property, data.to_vec());
        Ok(())
    }

    fn change_utf8_property(&mut self, window: WindowId, property: Atom, value: &str) -> Result<()> {
        self.set_text(window, property, value);
        self.calls.push(Call::ChangeText(window, property, value.to_string()));
        Ok(())
    }

    fn delete_property(&mut self, window: WindowId, property: Atom) -> Result<()> {
        self.remove_property(window, property);
        self.texts.remove(&(window, property));
        self.calls.push(Call::DeleteProperty(window, property));
        Ok(())
    }

    fn send_client_message(&mut self, window: WindowId, message_type: Atom, data: [u32; 5]) -> Result<()> {
        self.calls.push(Call::ClientMessage(window, message_type, data));
        Ok(())
    }

    fn send_configure_notify(&mut self, window: WindowId, geometry: Geometry, _border_width: u32) -> Result<()> {
        self.calls.push(Call::ConfigureNotify(window, geometry));
        Ok(())
    }

    fn create_window(
        &mut self,
        _parent: WindowId,
        geometry: Geometry,
        _border_width: u32,
        _role: WindowRole,
    ) -> Result<WindowId> {
        self.next_id += 1;
        self.geometries.insert(self.next_id, geometry);
        Ok(self.next_id)
    }

    fn destroy_window(&mut self, window: WindowId) -> Result<()> {
        self.destroyed.push(window);
        self.geometries.remove(&window);
        Ok(())
    }

    fn map_window(&mut self, window: WindowId) -> Result<()> {
        self.calls.push(Call::Map(window));
        Ok(())
    }

    fn unmap_window(&mut self, window: WindowId) -> Result<()> {
        self.calls.push(Call::Unmap(window));
        Ok(())
    }

    fn map_subwindows(&mut self, _window: WindowId) -> Result<()> {
        Ok(())
    }

    fn move_window(&mut self, window: WindowId, x: i32, y: i32) -> Result<()> {
        self.geometries.entry(window).or_default().set_pos(x, y);
        Ok(())
    }

    fn resize_window(&mut self, window: WindowId, width: u32, height: u32) -> Result<()> {
        self.geometries.entry(window).or_default().set_size(width, height);
        Ok(())
    }

    fn move_resize_window(&mut self, window: WindowId, geometry: Geometry) -> Result<()> {
        self.geometries.insert(window, geometry);
        Ok(())
    }

    fn set_border_width(&mut self, _window: WindowId, _width: u32) -> Result<()> {
        Ok(())
    }

    fn reparent_window(&mut self, window: WindowId, parent: WindowId, x: i32, y: i32) -> Result<()> {
        self.calls.push(Call::Reparent(window, parent, x, y));
        Ok(())
    }

    fn select_input(&mut self, window: WindowId, events: ClientEvents) -> Result<()> {
        self.calls.push(Call::Select(window, events));
        Ok(())
    }

    fn change_save_set(&mut self, window: WindowId, insert: bool) -> Result<()> {
        self.calls.push(Call::SaveSet(window, insert));
        Ok(())
    }

    fn set_input_focus(&mut self, window: WindowId) -> Result<()> {
        self.calls.push(Call::Focus(window));
        Ok(())
    }

    fn grab_pointer(&mut self, _window: WindowId, _cursor: CursorShape) -> Result<bool> {
        Ok(!self.pointer_busy)
    }

    fn ungrab_pointer(&mut self) -> Result<()> {
        self.calls.push(Call::UngrabPointer);
        Ok(())
    }

    fn grab_button(&mut self, window: WindowId, grab: ButtonGrab) -> Result<()> {
        self.grabs.insert((window, grab.button, grab.modifiers));
        Ok(())
    }

    fn ungrab_button(&mut self, window: WindowId, button: u8, modifiers: u16) -> Result<()> {
        self.grabs.remove(&(window, button, modifiers));
        Ok(())
    }

    fn allow_replay_pointer(&mut self) -> Result<()> {
        self.calls.push(Call::ReplayPointer);
        Ok(())
    }

    fn install_colormap(&mut self, _colormap: u32) -> Result<()> {
        Ok(())
    }

    fn grab_server(&mut self) -> Result<()> {
        self.grab_depth += 1;
        Ok(())
    }

    fn ungrab_server(&mut self) -> Result<()> {
        self.grab_depth = self.grab_depth.saturating_sub(1);
        Ok(())
    }

    fn take_pending_leave(&mut self, window: WindowId) -> Option<LeaveCrossing> {
        self.pending_leaves.remove(&window)
    }

    fn has_pending_reparent(&mut self, window: WindowId) -> bool {
        self.pending_reparent.contains(&window)
    }
}

pub struct FakeScreen {
    pub screen: Geometry,
    pub available: Geometry,
    pub workspace: u32,
    pub workspace_count: u32,
    pub struts: HashMap<WindowId, Strut>,
    pub raised: Vec<WindowId>,
    pub lowered: Vec<WindowId>,
    pub layers: HashMap<WindowId, WindowLayer>,
    pub icons: Vec<WindowId>,
    pub renamed: Vec<WindowId>,
    pub workspace_changes: Vec<(WindowId, u32)>,
    pub focused: Option<WindowId>,
    pub geometry: Option<GeometryFeedback>,
    pub menus: Vec<(WindowId, i32, i32)>,
}

impl Default for FakeScreen {
    fn default() -> Self {
        let screen = Geometry::new(0, 0, 1024, 768);
        Self {
            screen,
            available: screen,
            workspace: 0,
            workspace_count: 4,
            struts: HashMap::new(),
            raised: Vec::new(),
            lowered: Vec::new(),
            layers: HashMap::new(),
            icons: Vec::new(),
            renamed: Vec::new(),
            workspace_changes: Vec::new(),
            focused: None,
            geometry: None,
            menus: Vec::new(),
        }
    }
}

impl ScreenManager for FakeScreen {
    fn screen_rect(&self) -> Geometry {
        self.screen
    }

    /// `available` minus the widest strut on each edge
    fn available_area(&self) -> Geometry {
        let mut area = self.available;
        let edge = |f: fn(&Strut) -> u32| self.struts.values().map(f).max().unwrap_or(0);
        let (left, right) = (edge(|s| s.left), edge(|s| s.right));
        let (top, bottom) = (edge(|s| s.top), edge(|s| s.bottom));
        area.x += left as i32;
        area.y += top as i32;
        area.width = area.width.saturating_sub(left + right);
        area.height = area.height.saturating_sub(top + bottom);
        area
    }

    fn current_workspace(&self) -> u32 {
        self.workspace
    }

    fn set_current_workspace(&mut self, workspace: u32) {
        self.workspace = workspace;
    }

    fn workspace_count(&self) -> u32 {
        self.workspace_count
    }

    fn add_strut(&mut self, window: WindowId, strut: &Strut) {
        self.struts.insert(window, *strut);
    }

    fn update_strut(&mut self, window: WindowId, strut: &Strut) {
        self.struts.insert(window, *strut);
    }

    fn remove_strut(&mut self, window: WindowId) {
        self.struts.remove(&window);
    }

    fn raise_window(&mut self, window: WindowId) {
        self.raised.push(window);
    }

    fn lower_window(&mut self, window: WindowId) {
        self.lowered.push(window);
    }

    fn change_layer(&mut self, window: WindowId, layer: WindowLayer) {
        self.layers.insert(window, layer);
    }

    fn add_icon(&mut self, window: WindowId) {
        self.icons.push(window);
    }

    fn remove_icon(&mut self, window: WindowId) {
        self.icons.retain(|&w| w != window);
    }

    fn propagate_name(&mut self, window: WindowId) {
        self.renamed.push(window);
    }

    fn workspace_changed(&mut self, window: WindowId, workspace: u32) {
        self.workspace_changes.push((window, workspace));
    }

    fn focused_window(&self) -> Option<WindowId> {
        self.focused
    }

    fn set_focused_window(&mut self, window: Option<WindowId>) {
        self.focused = window;
    }

    fn show_geometry(&mut self, feedback: GeometryFeedback) {
        self.geometry = Some(feedback);
    }

    fn hide_geometry(&mut self) {
        self.geometry = None;
    }

    fn show_window_menu(&mut self, window: WindowId, x: i32, y: i32) {
        self.menus.push((window, x, y));
    }
}

/// Characters are 6 pixels wide
#[derive(Default)]
pub struct FakeRenderer {
    pub drawn: Vec<(WindowId, FramePart)>,
    pub outlines: Vec<Geometry>,
    pub released: Vec<PixmapId>,
    /// Makes `draw_outline` fail, as a dead connection would
    pub broken: bool,
    next_pixmap: PixmapId,
}

impl Renderer for FakeRenderer {
    fn find_pixmap(&mut self, _element: StyleElement, _focused: bool, _width: u32, _height: u32) -> Option<PixmapId> {
        self.next_pixmap += 1;
        Some(self.next_pixmap)
    }

    fn release_pixmap(&mut self, pixmap: PixmapId) {
        self.released.push(pixmap);
    }

    fn draw_part(&mut self, window: WindowId, part: FramePart, _look: &PartLook<'_>) -> Result<()> {
        self.drawn.push((window, part));
        Ok(())
    }

    fn draw_outline(&mut self, rect: &Geometry) -> Result<()> {
        if self.broken {
            return Err(WmError::Request("outline".into()));
        }
        self.outlines.push(*rect);
        Ok(())
    }

    fn ellide_text(&self, text: &str, width: u32) -> String {
        let fits = (width / 6) as usize;
        if text.chars().count() <= fits {
            return text.to_string();
        }
        let mut short: String = text.chars().take(fits.saturating_sub(3)).collect();
        short.push_str("...");
        short
    }
}

pub struct Harness {
    pub display: FakeDisplay,
    pub screen: FakeScreen,
    pub renderer: FakeRenderer,
    pub atoms: Atoms,
    pub settings: Settings,
    pub shutting_down: bool,
    pub windows: WindowTable,
    pub now: Instant,
}

impl Harness {
    pub fn new() -> Self {
        let atoms = Atoms::sequential();
        Self {
            display: FakeDisplay::new(atoms),
            screen: FakeScreen::default(),
            renderer: FakeRenderer::default(),
            atoms,
            settings: Settings::default(),
            shutting_down: false,
            windows: WindowTable::new(),
            now: Instant::now(),
        }
    }

    /// Run `f` against the table with a context over the fakes
    pub fn run<T>(&mut self, f: impl FnOnce(&mut dyn WindowLookup, &mut Context<'_>) -> Result<T>) -> Result<T> {
        let mut ctx = Context {
            display: &mut self.display,
            screen: &mut self.screen,
            renderer: &mut self.renderer,
            atoms: &self.atoms,
            settings: &self.settings,
            shutting_down: self.shutting_down,
        };
        f(&mut self.windows, &mut ctx)
    }

    pub fn with_window<T>(
        &mut self,
        id: WindowId,
        f: impl FnOnce(&mut ManagedWindow, &mut Context<'_>) -> Result<T>,
    ) -> Result<T> {
        let w = self.windows.window_mut(id).expect("window is not managed");
        let mut ctx = Context {
            display: &mut self.display,
            screen: &mut self.screen,
            renderer: &mut self.renderer,
            atoms: &self.atoms,
            settings: &self.settings,
            shutting_down: self.shutting_down,
        };
        f(w, &mut ctx)
    }

    pub fn capture(&mut self, window: WindowId) -> Result<WindowId> {
        self.run(|windows, ctx| capture(windows, ctx, window))
    }

    /// Capture a client in NormalState that supports WM_DELETE_WINDOW
    pub fn capture_normal(&mut self, id: WindowId, geometry: Geometry) -> WindowId {
        self.display.add_client(id, geometry);
        self.display.set_protocols(id, true, false);
        let wm_state = self.atoms.WM_STATE;
        self.display.set_property(id, wm_state, vec![1, 0]);
        self.capture(id).expect("capture failed")
    }

    pub fn release(&mut self, id: WindowId, reparented_away: bool) -> Result<()> {
        self.run(|windows, ctx| release_window(windows, ctx, id, reparented_away))
    }
}

/// Bare record, never framed
pub fn window(id: WindowId) -> ManagedWindow {
    let attributes = WindowAttributes {
        geometry: Geometry::new(0, 0, 100, 100),
        border_width: 0,
        override_redirect: false,
        colormap: 0,
        root: ROOT,
    };
    ManagedWindow::new(id, &attributes, &Geometry::new(0, 0, 1024, 768))
}

pub fn table_with(windows: Vec<ManagedWindow>) -> WindowTable {
    let mut table = WindowTable::new();
    for w in windows {
        table.insert(w);
    }
    table
}
