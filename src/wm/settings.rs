//! Settings Module
//!
//! Style metrics and interaction thresholds consumed by the window control
//! unit. Loaded from the `[style]` and `[behavior]` tables of the config file.

use serde::{Deserialize, Serialize};

/// Frame metrics in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleMetrics {
    /// Height of the titlebar
    pub title_height: u32,

    /// Height of the label inside the titlebar
    pub label_height: u32,

    /// Width (and height) of a titlebar button
    pub button_width: u32,

    /// Height of the bottom handle
    pub handle_height: u32,

    /// Width of each resize grip in the handle
    pub grip_width: u32,

    /// Border drawn around the frame when the Border decoration is present
    pub frame_border_width: u32,

    /// Gap between the titlebar edge and its buttons/label
    pub title_margin: u32,
}

impl Default for StyleMetrics {
    fn default() -> Self {
        Self {
            title_height: 20,
            label_height: 16,
            button_width: 16,
            handle_height: 6,
            grip_width: 20,
            frame_border_width: 1,
            title_margin: 2,
        }
    }
}

/// Pointer and focus behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Behavior {
    /// Distance at which a dragged frame snaps to an edge; 0 disables
    pub edge_snap_threshold: i32,

    /// Two titlebar clicks closer than this shade the window
    pub double_click_interval_ms: u32,

    /// Move/resize the real window instead of an outline
    pub opaque_move: bool,

    /// Maximize over struts and snap to screen edges as well as the work area
    pub full_maximization: bool,

    /// Focus follows the pointer
    pub sloppy_focus: bool,

    /// Raise a window after the pointer rested on it (sloppy focus only)
    pub auto_raise: bool,

    pub auto_raise_delay_ms: u64,

    /// Raise on click even with sloppy focus
    pub click_raise: bool,

    /// Give newly mapped windows the focus
    pub focus_new: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            edge_snap_threshold: 10,
            double_click_interval_ms: 250,
            opaque_move: true,
            full_maximization: false,
            sloppy_focus: false,
            auto_raise: false,
            auto_raise_delay_ms: 400,
            click_raise: true,
            focus_new: true,
        }
    }
}

/// Everything a managed window reads from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub style: StyleMetrics,
    pub behavior: Behavior,
}
