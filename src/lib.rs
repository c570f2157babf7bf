//! Area window control unit
//!
//! Per-window management for the area X11 window manager: every top-level
//! client gets a `ManagedWindow` that reads its hints, frames it, keeps its
//! geometry inside the hinted limits and follows it through the ICCCM/EWMH
//! state machine. The `area-window` binary drives it over a live display.

pub mod shared;
pub mod wm;
