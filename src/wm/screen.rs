//! Screen Module
//!
//! The workspace manager as seen from a single window. It owns stacking,
//! workspaces, the icon list and the strut-reduced work area; windows only
//! report to it and read from it.

use crate::shared::Geometry;
use crate::wm::client_flags::WindowLayer;
use crate::wm::display::WindowId;
use crate::wm::hints::Strut;

/// Text shown in the geometry feedback window during a drag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryFeedback {
    Position { x: i32, y: i32 },
    /// Size in resize increments above the base size
    Size { width: u32, height: u32 },
}

pub trait ScreenManager {
    /// Whole screen in root coordinates
    fn screen_rect(&self) -> Geometry;

    /// Screen minus every registered strut
    fn available_area(&self) -> Geometry;

    fn current_workspace(&self) -> u32;
    fn set_current_workspace(&mut self, workspace: u32);
    fn workspace_count(&self) -> u32;

    fn add_strut(&mut self, window: WindowId, strut: &Strut);
    fn update_strut(&mut self, window: WindowId, strut: &Strut);
    fn remove_strut(&mut self, window: WindowId);

    fn raise_window(&mut self, window: WindowId);
    fn lower_window(&mut self, window: WindowId);
    fn change_layer(&mut self, window: WindowId, layer: WindowLayer);

    fn add_icon(&mut self, window: WindowId);
    fn remove_icon(&mut self, window: WindowId);

    /// The window's title changed; refresh menus and the icon list
    fn propagate_name(&mut self, window: WindowId);

    /// The window moved to another workspace (`ALL_WORKSPACES` included)
    fn workspace_changed(&mut self, window: WindowId, workspace: u32);

    fn focused_window(&self) -> Option<WindowId>;
    fn set_focused_window(&mut self, window: Option<WindowId>);

    fn show_geometry(&mut self, feedback: GeometryFeedback);
    fn hide_geometry(&mut self);

    fn show_window_menu(&mut self, window: WindowId, x: i32, y: i32);
}
