//! Minimal workspace manager
//!
//! Bookkeeping the window control unit expects from its screen: struts and
//! the work area they leave, per-window layers and stacking order, the icon
//! list and the focused window. Stacking is applied to the frames with
//! ConfigureWindow stack-mode requests.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use x11rb::errors::ConnectionError;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use area_window::shared::Geometry;
use area_window::wm::Atoms;
use area_window::wm::client_flags::WindowLayer;
use area_window::wm::display::WindowId;
use area_window::wm::hints::Strut;
use area_window::wm::screen::{GeometryFeedback, ScreenManager};

pub struct Desktop {
    conn: Arc<RustConnection>,
    root: Window,
    atoms: Atoms,
    screen: Geometry,
    workspace: u32,
    workspace_count: u32,
    struts: HashMap<WindowId, Strut>,
    /// Client to frame, for restacking
    frames: HashMap<WindowId, Window>,
    layers: HashMap<WindowId, WindowLayer>,
    /// Bottom to top within each layer
    stack: Vec<WindowId>,
    icons: Vec<WindowId>,
    focused: Option<WindowId>,
}

impl Desktop {
    pub fn new(
        conn: Arc<RustConnection>,
        root: Window,
        atoms: Atoms,
        screen: Geometry,
        workspace_count: u32,
    ) -> Self {
        Self {
            conn,
            root,
            atoms,
            screen,
            workspace: 0,
            workspace_count: workspace_count.max(1),
            struts: HashMap::new(),
            frames: HashMap::new(),
            layers: HashMap::new(),
            stack: Vec::new(),
            icons: Vec::new(),
            focused: None,
        }
    }

    /// Start stacking a freshly captured window's frame
    pub fn track(&mut self, window: WindowId, frame: Window) {
        self.frames.insert(window, frame);
        if !self.stack.contains(&window) {
            self.stack.push(window);
        }
        self.restack();
    }

    /// Drop everything known about a released window
    pub fn forget(&mut self, window: WindowId) {
        self.frames.remove(&window);
        self.layers.remove(&window);
        self.struts.remove(&window);
        self.stack.retain(|&w| w != window);
        self.icons.retain(|&w| w != window);
        if self.focused == Some(window) {
            self.set_focused_window(None);
        }
    }

    fn restack(&self) {
        let frames: Vec<Window> = stacking_order(&self.stack, &self.layers)
            .into_iter()
            .filter_map(|window| self.frames.get(&window).copied())
            .collect();
        if let Err(e) = self.apply_stacking(&frames) {
            warn!("Failed to restack frames: {}", e);
        }
    }

    fn apply_stacking(&self, frames: &[Window]) -> Result<(), ConnectionError> {
        for pair in frames.windows(2) {
            let aux = ConfigureWindowAux::new()
                .sibling(pair[0])
                .stack_mode(StackMode::ABOVE);
            self.conn.configure_window(pair[1], &aux)?;
        }
        Ok(())
    }
}

/// Bottom-to-top order of `stack` once layers are taken into account
fn stacking_order(stack: &[WindowId], layers: &HashMap<WindowId, WindowLayer>) -> Vec<WindowId> {
    let mut order = stack.to_vec();
    // stable, so raise/lower order survives within a layer
    order.sort_by_key(|window| layers.get(window).copied().unwrap_or_default());
    order
}

/// `screen` minus the widest strut on each edge
fn work_area<'a>(screen: &Geometry, struts: impl Iterator<Item = &'a Strut>) -> Geometry {
    let (mut left, mut right, mut top, mut bottom) = (0, 0, 0, 0);
    for strut in struts {
        left = left.max(strut.left);
        right = right.max(strut.right);
        top = top.max(strut.top);
        bottom = bottom.max(strut.bottom);
    }
    Geometry::new(
        screen.x + left.min(screen.width) as i32,
        screen.y + top.min(screen.height) as i32,
        screen.width.saturating_sub(left + right).max(1),
        screen.height.saturating_sub(top + bottom).max(1),
    )
}

impl ScreenManager for Desktop {
    fn screen_rect(&self) -> Geometry {
        self.screen
    }

    fn available_area(&self) -> Geometry {
        work_area(&self.screen, self.struts.values())
    }

    fn current_workspace(&self) -> u32 {
        self.workspace
    }

    fn set_current_workspace(&mut self, workspace: u32) {
        if workspace < self.workspace_count && workspace != self.workspace {
            info!("Switching to workspace {}", workspace);
            self.workspace = workspace;
        }
    }

    fn workspace_count(&self) -> u32 {
        self.workspace_count
    }

    fn add_strut(&mut self, window: WindowId, strut: &Strut) {
        debug!("Window {} reserves {:?}", window, strut);
        self.struts.insert(window, *strut);
    }

    fn update_strut(&mut self, window: WindowId, strut: &Strut) {
        self.add_strut(window, strut);
    }

    fn remove_strut(&mut self, window: WindowId) {
        if self.struts.remove(&window).is_some() {
            debug!("Window {} no longer reserves screen space", window);
        }
    }

    fn raise_window(&mut self, window: WindowId) {
        self.stack.retain(|&w| w != window);
        self.stack.push(window);
        self.restack();
    }

    fn lower_window(&mut self, window: WindowId) {
        self.stack.retain(|&w| w != window);
        self.stack.insert(0, window);
        self.restack();
    }

    fn change_layer(&mut self, window: WindowId, layer: WindowLayer) {
        debug!("Window {} moves to layer {:?}", window, layer);
        self.layers.insert(window, layer);
        self.restack();
    }

    fn add_icon(&mut self, window: WindowId) {
        if !self.icons.contains(&window) {
            self.icons.push(window);
        }
    }

    fn remove_icon(&mut self, window: WindowId) {
        self.icons.retain(|&w| w != window);
    }

    fn propagate_name(&mut self, window: WindowId) {
        debug!("Window {} was renamed", window);
    }

    fn workspace_changed(&mut self, window: WindowId, workspace: u32) {
        debug!("Window {} is now on workspace {:#x}", window, workspace);
    }

    fn focused_window(&self) -> Option<WindowId> {
        self.focused
    }

    fn set_focused_window(&mut self, window: Option<WindowId>) {
        self.focused = window;
        let active = window.unwrap_or(x11rb::NONE);
        if let Err(e) = self.conn.change_property32(
            PropMode::REPLACE,
            self.root,
            self.atoms._NET_ACTIVE_WINDOW,
            AtomEnum::WINDOW,
            &[active],
        ) {
            warn!("Failed to update _NET_ACTIVE_WINDOW: {}", e);
        }
    }

    fn show_geometry(&mut self, feedback: GeometryFeedback) {
        match feedback {
            GeometryFeedback::Position { x, y } => debug!("Position {:+}{:+}", x, y),
            GeometryFeedback::Size { width, height } => debug!("Size {}x{}", width, height),
        }
    }

    fn hide_geometry(&mut self) {}

    fn show_window_menu(&mut self, window: WindowId, x: i32, y: i32) {
        info!("No window menu available for window {} at {},{}", window, x, y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strut(left: u32, right: u32, top: u32, bottom: u32) -> Strut {
        Strut {
            left,
            right,
            top,
            bottom,
            ..Strut::default()
        }
    }

    #[test]
    fn test_work_area_without_struts() {
        let screen = Geometry::new(0, 0, 1024, 768);
        assert_eq!(work_area(&screen, std::iter::empty()), screen);
    }

    #[test]
    fn test_work_area_takes_widest_strut_per_edge() {
        let screen = Geometry::new(0, 0, 1024, 768);
        let panels = [strut(0, 0, 24, 0), strut(0, 0, 30, 0), strut(48, 0, 0, 0)];
        assert_eq!(work_area(&screen, panels.iter()), Geometry::new(48, 30, 976, 738));
    }

    #[test]
    fn test_work_area_never_collapses() {
        let screen = Geometry::new(0, 0, 100, 100);
        let area = work_area(&screen, [strut(80, 80, 0, 0)].iter());
        assert_eq!(area.width, 1);
        assert_eq!(area.height, 100);
    }

    #[test]
    fn test_stacking_order_groups_layers() {
        let layers = HashMap::from([(1, WindowLayer::Above), (3, WindowLayer::Desktop)]);
        assert_eq!(stacking_order(&[1, 2, 3, 4], &layers), vec![3, 2, 4, 1]);
    }
}
