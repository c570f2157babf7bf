//! Focus Module
//!
//! Input focus with modal delegation, the focused flag and its visual
//! side effects, and the per-window auto-raise timer used with sloppy
//! focus.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::shared::Geometry;
use crate::wm::client::ManagedWindow;
use crate::wm::client_flags::WindowLayer;
use crate::wm::display::WindowId;
use crate::wm::transients::{self, WindowLookup};
use crate::wm::{Context, Result};

/// Pending raise of a window the pointer entered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoRaiseTimer {
    deadline: Option<Instant>,
}

impl AutoRaiseTimer {
    /// Arm the timer. An armed timer keeps its original deadline.
    pub fn start(&mut self, now: Instant, delay: Duration) {
        if self.deadline.is_none() {
            self.deadline = Some(now + delay);
        }
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_timing(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm and report true once the deadline has passed
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl ManagedWindow {
    /// Update the focused flag and what depends on it. An unmapped window
    /// never counts as focused.
    pub(crate) fn set_focused(&mut self, ctx: &mut Context<'_>, focused: bool) -> Result<()> {
        if self.focused == focused {
            return Ok(());
        }
        self.focused = self.visible && focused;

        if self.visible {
            self.redraw_window_frame(ctx)?;
            if self.focused {
                ctx.display.install_colormap(self.colormap)?;
                if self.is_fullscreen() && self.layer != WindowLayer::FullScreen {
                    self.change_layer(ctx, WindowLayer::FullScreen);
                }
            } else if self.is_fullscreen() && self.layer != WindowLayer::Below {
                // let other windows show over a fullscreen window that lost focus
                self.change_layer(ctx, WindowLayer::Below);
            }
        }
        Ok(())
    }

    /// Give this window the input focus without looking at modal transients
    pub(crate) fn take_focus(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.display.set_input_focus(self.window)?;
        if self.protocols.take_focus {
            let time = ctx.display.time();
            ctx.display.send_client_message(
                self.window,
                ctx.atoms.WM_PROTOCOLS,
                [ctx.atoms.WM_TAKE_FOCUS, time, 0, 0, 0],
            )?;
        }
        ctx.screen.set_focused_window(Some(self.window));
        self.set_focused(ctx, true)
    }
}

/// Focus `id`, or the visible modal transient that must get it instead.
///
/// Returns false when the window is not visible. A window lying completely
/// off screen is centred first.
pub fn set_input_focus(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, id: WindowId) -> Result<bool> {
    let mut seen = HashSet::new();
    focus_or_delegate(windows, ctx, id, &mut seen)
}

fn focus_or_delegate(
    windows: &mut dyn WindowLookup,
    ctx: &mut Context<'_>,
    id: WindowId,
    seen: &mut HashSet<WindowId>,
) -> Result<bool> {
    seen.insert(id);
    let Some(w) = windows.window_mut(id) else {
        return Ok(false);
    };
    if !w.visible {
        return Ok(false);
    }
    if w.focused {
        return Ok(true);
    }

    let screen = ctx.screen.screen_rect();
    if !w.frame_rect.intersects(&screen) {
        let frame = w.frame_rect;
        let centred = Geometry::new(
            screen.x + (screen.width as i32 - frame.width as i32) / 2,
            screen.y + (screen.height as i32 - frame.height as i32) / 2,
            frame.width,
            frame.height,
        );
        debug!("Centring off-screen window {} before focusing it", id);
        w.configure_rect(ctx, centred)?;
    }

    if let Some(modal) = modal_delegate(windows, id).filter(|m| !seen.contains(m)) {
        trace!("Focus for window {} goes to modal window {}", id, modal);
        return focus_or_delegate(windows, ctx, modal, seen);
    }

    let Some(w) = windows.window_mut(id) else {
        return Ok(false);
    };
    ctx.display.set_input_focus(id)?;
    if w.protocols.take_focus {
        let time = ctx.display.time();
        ctx.display.send_client_message(
            id,
            ctx.atoms.WM_PROTOCOLS,
            [ctx.atoms.WM_TAKE_FOCUS, time, 0, 0, 0],
        )?;
    }
    focus_changed(windows, ctx, Some(id))?;
    Ok(true)
}

/// Visible modal window that takes focus in place of `id`: a group modal
/// newer than `id`, else the newest modal direct transient.
fn modal_delegate(windows: &dyn WindowLookup, id: WindowId) -> Option<WindowId> {
    let w = windows.window(id)?;
    let root_parent = w
        .is_transient()
        .then(|| transients::find_non_transient_parent(windows, id));

    for member in transients::group_transients(windows, id) {
        let Some(m) = windows.window(member) else {
            continue;
        };
        if !m.visible || !m.is_modal() {
            continue;
        }
        if member == id || Some(member) == root_parent {
            break;
        }
        return Some(member);
    }

    w.transients.iter().copied().find(|&t| {
        windows
            .window(t)
            .is_some_and(|child| child.visible && child.is_modal())
    })
}

/// Record that focus moved to `focused` (or nowhere) and update the
/// flags of the old and new holder.
pub fn focus_changed(
    windows: &mut dyn WindowLookup,
    ctx: &mut Context<'_>,
    focused: Option<WindowId>,
) -> Result<()> {
    let previous = ctx.screen.focused_window();
    if previous != focused {
        if let Some(old) = previous.and_then(|id| windows.window_mut(id)) {
            old.auto_raise.stop();
            old.set_focused(ctx, false)?;
        }
        ctx.screen.set_focused_window(focused);
    }
    if let Some(w) = focused.and_then(|id| windows.window_mut(id)) {
        w.set_focused(ctx, true)?;
    }
    Ok(())
}

/// Raise every window whose auto-raise delay has run out
pub fn fire_auto_raise(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, now: Instant) {
    for id in windows.ids() {
        let Some(w) = windows.window_mut(id) else {
            continue;
        };
        if w.auto_raise.fire_if_due(now) && w.visible {
            debug!("Auto-raising window {}", id);
            ctx.screen.raise_window(id);
        }
    }
}

/// Earliest pending auto-raise, for the event loop's timeout
pub fn next_auto_raise(windows: &dyn WindowLookup) -> Option<Instant> {
    windows
        .ids()
        .into_iter()
        .filter_map(|id| windows.window(id).and_then(|w| w.auto_raise.deadline()))
        .min()
}
