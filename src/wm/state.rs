//! Window state machine
//!
//! Visibility, iconic, shaded, maximized and fullscreen transitions, and
//! the protocol properties (`WM_STATE`, `_NET_WM_STATE`,
//! `_NET_WM_ALLOWED_ACTIONS`) that mirror them.

use std::collections::HashSet;

use tracing::{debug, warn};
use x11rb::protocol::xproto::{Atom, AtomEnum};

use crate::shared::{Corner, Geometry};
use crate::wm::client::ManagedWindow;
use crate::wm::client_flags::{Functions, WindowLayer, WmState};
use crate::wm::constraints;
use crate::wm::display::{ClientEvents, ServerGrab, WindowId};
use crate::wm::ewmh::{ALL_WORKSPACES, Atoms, predefined};
use crate::wm::focus;
use crate::wm::transients::{self, WindowLookup};
use crate::wm::{Context, Result};

impl ManagedWindow {
    /// `changing` fitted to the size hints with `anchor` held in place
    pub(crate) fn constrain(&self, changing: Geometry, anchor: Corner) -> Geometry {
        constraints::constrain(changing, &changing, &self.margin, &self.normal_hints, anchor)
    }

    /// `_NET_WM_STATE` atoms for the current flags, in protocol order
    pub fn net_state_atoms(&self, atoms: &Atoms) -> Vec<Atom> {
        let state = &self.ewmh.state;
        let mut list = Vec::new();
        if state.modal {
            list.push(atoms._NET_WM_STATE_MODAL);
        }
        if state.shaded {
            list.push(atoms._NET_WM_STATE_SHADED);
        }
        if self.iconic {
            list.push(atoms._NET_WM_STATE_HIDDEN);
        }
        if state.fullscreen {
            list.push(atoms._NET_WM_STATE_FULLSCREEN);
        }
        if state.max_horz {
            list.push(atoms._NET_WM_STATE_MAXIMIZED_HORZ);
        }
        if state.max_vert {
            list.push(atoms._NET_WM_STATE_MAXIMIZED_VERT);
        }
        if state.skip_taskbar {
            list.push(atoms._NET_WM_STATE_SKIP_TASKBAR);
        }
        if state.skip_pager {
            list.push(atoms._NET_WM_STATE_SKIP_PAGER);
        }
        match self.layer {
            WindowLayer::Above => list.push(atoms._NET_WM_STATE_ABOVE),
            WindowLayer::Below => list.push(atoms._NET_WM_STATE_BELOW),
            _ => {}
        }
        list
    }

    /// `_NET_WM_ALLOWED_ACTIONS` atoms; an icon only offers close
    pub fn allowed_action_atoms(&self, atoms: &Atoms) -> Vec<Atom> {
        let mut list = Vec::new();
        if !self.iconic {
            let actions = [
                (Functions::CHANGE_WORKSPACE, atoms._NET_WM_ACTION_CHANGE_DESKTOP),
                (Functions::ICONIFY, atoms._NET_WM_ACTION_MINIMIZE),
                (Functions::SHADE, atoms._NET_WM_ACTION_SHADE),
                (Functions::MOVE, atoms._NET_WM_ACTION_MOVE),
                (Functions::RESIZE, atoms._NET_WM_ACTION_RESIZE),
                (Functions::MAXIMIZE, atoms._NET_WM_ACTION_MAXIMIZE_HORZ),
                (Functions::MAXIMIZE, atoms._NET_WM_ACTION_MAXIMIZE_VERT),
                (Functions::FULLSCREEN, atoms._NET_WM_ACTION_FULLSCREEN),
            ];
            list.extend(
                actions
                    .into_iter()
                    .filter(|(function, _)| self.functions.contains(*function))
                    .map(|(_, atom)| atom),
            );
        }
        if self.functions.contains(Functions::CLOSE) {
            list.push(atoms._NET_WM_ACTION_CLOSE);
        }
        list
    }

    /// Record `state` and rewrite every property that mirrors it
    pub(crate) fn set_state(&mut self, ctx: &mut Context<'_>, state: WmState) -> Result<()> {
        self.current_state = state;
        let atoms = ctx.atoms;
        let atom_type = predefined(AtomEnum::ATOM);

        ctx.display.change_property32(
            self.window,
            atoms.WM_STATE,
            atoms.WM_STATE,
            &[state.to_wire(), 0],
        )?;

        let net_state = self.net_state_atoms(atoms);
        if net_state.is_empty() {
            ctx.display.delete_property(self.window, atoms._NET_WM_STATE)?;
        } else {
            ctx.display
                .change_property32(self.window, atoms._NET_WM_STATE, atom_type, &net_state)?;
        }

        let actions = self.allowed_action_atoms(atoms);
        ctx.display
            .change_property32(self.window, atoms._NET_WM_ALLOWED_ACTIONS, atom_type, &actions)
    }

    /// Remove everything `set_state` and the label ever wrote
    pub(crate) fn clear_state(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let atoms = ctx.atoms;
        for property in [
            atoms.WM_STATE,
            atoms._NET_WM_DESKTOP,
            atoms._NET_WM_STATE,
            atoms._NET_WM_ALLOWED_ACTIONS,
            atoms._NET_WM_VISIBLE_NAME,
            atoms._NET_WM_VISIBLE_ICON_NAME,
        ] {
            ctx.display.delete_property(self.window, property)?;
        }
        Ok(())
    }

    pub(crate) fn change_layer(&mut self, ctx: &mut Context<'_>, layer: WindowLayer) {
        self.layer = layer;
        ctx.screen.change_layer(self.window, layer);
    }

    /// Map this window alone; transients are handled by [`show`]
    fn show_self(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if self.visible {
            return Ok(());
        }
        if self.iconic {
            ctx.screen.remove_icon(self.window);
        }
        self.iconic = false;
        self.visible = true;
        let state = if self.is_shaded() {
            WmState::Iconic
        } else {
            WmState::Normal
        };
        self.set_state(ctx, state)?;

        ctx.display.map_window(self.window)?;
        ctx.display.map_subwindows(self.frame.frame)?;
        ctx.display.map_window(self.frame.frame)
    }

    /// Unmap the frame and the client. The client's own UnmapNotify is
    /// suppressed so it is not mistaken for a withdraw.
    pub fn hide(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if !self.visible {
            return Ok(());
        }
        self.visible = false;
        let state = if self.iconic {
            WmState::Iconic
        } else {
            self.current_state
        };
        self.set_state(ctx, state)?;

        ctx.display.unmap_window(self.frame.frame)?;

        let mut grab = ServerGrab::new(ctx)?;
        grab.display
            .select_input(self.window, ClientEvents::MANAGED - ClientEvents::STRUCTURE_NOTIFY)?;
        grab.display.unmap_window(self.window)?;
        grab.display.select_input(self.window, ClientEvents::MANAGED)
    }

    pub fn close(&self, ctx: &mut Context<'_>) -> Result<()> {
        if !self.has_function(Functions::CLOSE) {
            debug!("Ignoring close for window {}", self.window);
            return Ok(());
        }
        debug!("Asking window {} to close", self.window);
        let time = ctx.display.time();
        ctx.display.send_client_message(
            self.window,
            ctx.atoms.WM_PROTOCOLS,
            [ctx.atoms.WM_DELETE_WINDOW, time, 0, 0, 0],
        )
    }

    pub fn set_workspace(&mut self, ctx: &mut Context<'_>, workspace: u32) -> Result<()> {
        self.ewmh.workspace = workspace;
        ctx.display.change_property32(
            self.window,
            ctx.atoms._NET_WM_DESKTOP,
            predefined(AtomEnum::CARDINAL),
            &[workspace],
        )
    }

    /// Whether the window belongs on the workspace being shown
    pub fn on_current_workspace(&self, ctx: &Context<'_>) -> bool {
        self.workspace() == ALL_WORKSPACES || self.workspace() == ctx.screen.current_workspace()
    }

    /// Maximize per button: 1 both axes, 2 vertical, 3 horizontal. A
    /// maximized window is restored to its pre-maximize rectangle instead.
    pub fn maximize(&mut self, ctx: &mut Context<'_>, button: u8) -> Result<()> {
        if !self.has_function(Functions::MAXIMIZE) {
            debug!("Ignoring maximize for window {}", self.window);
            return Ok(());
        }

        self.ewmh.state.shaded = false;

        if self.is_maximized() {
            self.ewmh.state.max_horz = false;
            self.ewmh.state.max_vert = false;

            if !self.is_fullscreen() {
                // a resize in progress applies its own geometry
                if !self.is_resizing() {
                    let premax = self.premax;
                    self.configure_rect(ctx, premax)?;
                }
                self.redraw_all_buttons(ctx)?;
            }
            debug!("Window {} restored from maximize", self.window);
            return self.set_state(ctx, self.current_state);
        }

        let (horizontal, vertical) = match button {
            1 => (true, true),
            2 => (false, true),
            3 => (true, false),
            _ => {
                debug!("Ignoring maximize with button {} for window {}", button, self.window);
                return Ok(());
            }
        };
        self.ewmh.state.max_horz = horizontal;
        self.ewmh.state.max_vert = vertical;

        if !self.is_fullscreen() {
            let mut changing = ctx.screen.available_area();
            self.upsize(&ctx.settings.style);
            self.premax = self.frame_rect;

            if !horizontal {
                changing.x = self.premax.x;
                changing.width = self.premax.width;
            }
            if !vertical {
                changing.y = self.premax.y;
                changing.height = self.premax.height;
            }

            let changing = self.constrain(changing, Corner::TopLeft);
            // force a full re-layout
            self.frame_rect = Geometry::default();
            self.configure_rect(ctx, changing)?;
            self.redraw_all_buttons(ctx)?;
        }
        debug!(
            "Window {} maximized (horizontal: {}, vertical: {})",
            self.window, horizontal, vertical
        );
        self.set_state(ctx, self.current_state)
    }

    /// Maximize again along the same axes, e.g. after the work area changed
    pub fn remaximize(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if self.is_shaded() {
            return Ok(());
        }
        let state = &self.ewmh.state;
        let button = match (state.max_horz, state.max_vert) {
            (true, true) => 1,
            (false, true) => 2,
            (true, false) => 3,
            (false, false) => 0,
        };
        self.ewmh.state.max_horz = false;
        self.ewmh.state.max_vert = false;

        let premax = self.premax;
        self.maximize(ctx, button)?;
        self.premax = premax;
        Ok(())
    }

    /// Collapse the frame to its titlebar, or bring it back
    pub fn set_shaded(&mut self, ctx: &mut Context<'_>, shaded: bool) -> Result<()> {
        if !self.has_function(Functions::SHADE) {
            debug!("Ignoring shade for window {}", self.window);
            return Ok(());
        }
        if self.is_shaded() == shaded {
            return Ok(());
        }

        self.ewmh.state.shaded = shaded;
        if !shaded {
            if self.is_maximized() {
                self.remaximize(ctx)?;
            } else {
                self.frame_rect.height = self.client_rect.height + self.margin.vertical();
                ctx.display
                    .resize_window(self.frame.frame, self.frame_rect.width, self.frame_rect.height)?;
            }
            debug!("Window {} unshaded", self.window);
            self.set_state(ctx, WmState::Normal)
        } else {
            self.frame_rect.height = ctx.settings.style.title_height;
            ctx.display
                .resize_window(self.frame.frame, self.frame_rect.width, self.frame_rect.height)?;
            debug!("Window {} shaded", self.window);
            self.set_state(ctx, WmState::Iconic)
        }
    }

    /// Cover the whole screen without decorations, or go back to the
    /// previous rectangle (or maximized state).
    pub fn set_fullscreen(&mut self, ctx: &mut Context<'_>, fullscreen: bool) -> Result<()> {
        if !self.has_function(Functions::FULLSCREEN) {
            debug!("Ignoring fullscreen for window {}", self.window);
            return Ok(());
        }
        if self.is_fullscreen() == fullscreen {
            return Ok(());
        }

        let refocus = self.focused;
        self.ewmh.state.fullscreen = fullscreen;
        self.apply_policy();

        if fullscreen {
            if !self.is_maximized() {
                self.premax = self.frame_rect;
            }
            self.upsize(&ctx.settings.style);
            self.frame_rect = Geometry::default();

            let changing = self.constrain(ctx.screen.screen_rect(), Corner::TopLeft);
            self.configure_rect(ctx, changing)?;
            if self.visible {
                self.change_layer(ctx, WindowLayer::FullScreen);
            }
            debug!("Window {} entered fullscreen", self.window);
            self.set_state(ctx, self.current_state)?;
        } else {
            self.upsize(&ctx.settings.style);
            self.frame_rect = Geometry::default();

            if !self.is_maximized() {
                let premax = self.premax;
                self.configure_rect(ctx, premax)?;
                if self.visible {
                    self.change_layer(ctx, WindowLayer::Normal);
                }
                self.set_state(ctx, self.current_state)?;
            } else {
                if self.visible {
                    self.change_layer(ctx, WindowLayer::Normal);
                }
                self.remaximize(ctx)?;
            }
            debug!("Window {} left fullscreen", self.window);
        }

        self.ungrab_buttons(ctx)?;
        self.grab_buttons(ctx)?;

        if refocus {
            self.focused = false;
            self.take_focus(ctx)?;
        }
        Ok(())
    }
}

/// Map `id` and, recursively, its transients
pub fn show(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, id: WindowId) -> Result<()> {
    for member in transients::transient_tree(windows, id) {
        if let Some(w) = windows.window_mut(member) {
            w.show_self(ctx)?;
        }
    }
    Ok(())
}

/// Iconify `id` together with its transient parent and children.
/// Ignored when the window may not be iconified.
pub fn iconify(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, id: WindowId) -> Result<()> {
    match windows.window(id) {
        Some(w) if w.has_function(Functions::ICONIFY) => {}
        Some(_) => {
            debug!("Ignoring iconify for window {}", id);
            return Ok(());
        }
        None => return Ok(()),
    }
    let mut seen = HashSet::new();
    iconify_related(windows, ctx, id, &mut seen)
}

fn iconify_related(
    windows: &mut dyn WindowLookup,
    ctx: &mut Context<'_>,
    id: WindowId,
    seen: &mut HashSet<WindowId>,
) -> Result<()> {
    if !seen.insert(id) {
        return Ok(());
    }
    if windows.window(id).is_none_or(|w| w.iconic) {
        return Ok(());
    }

    if let Some(parent) = transients::find_transient_for(windows, id) {
        if windows.window(parent).is_some_and(|p| !p.iconic) {
            iconify_related(windows, ctx, parent, seen)?;
        }
    }

    let children = match windows.window_mut(id) {
        Some(w) => {
            ctx.screen.add_icon(id);
            w.iconic = true;
            w.hide(ctx)?;
            debug!("Window {} iconified", id);
            w.transients.clone()
        }
        None => return Ok(()),
    };

    for child in children {
        iconify_related(windows, ctx, child, seen)?;
    }
    Ok(())
}

/// Bring `id` to the user: switch to its workspace, deiconify, unshade,
/// focus and raise.
pub fn activate(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, id: WindowId) -> Result<()> {
    let Some(w) = windows.window(id) else {
        return Ok(());
    };
    let workspace = w.workspace();
    let iconic = w.iconic;
    if workspace != ALL_WORKSPACES && workspace != ctx.screen.current_workspace() {
        ctx.screen.set_current_workspace(workspace);
    }
    if iconic {
        show(windows, ctx, id)?;
    }
    if let Some(w) = windows.window_mut(id) {
        if w.is_shaded() {
            w.set_shaded(ctx, false)?;
        }
    }
    if focus::set_input_focus(windows, ctx, id)? {
        ctx.screen.raise_window(id);
    }
    Ok(())
}

/// The work area changed: fit every maximized window to the new one.
/// Fullscreen windows and windows being resized are left alone.
pub fn remaximize_all(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>) {
    for id in windows.ids() {
        let Some(w) = windows.window_mut(id) else {
            continue;
        };
        if !w.is_maximized() || w.is_fullscreen() || w.is_resizing() {
            continue;
        }
        if let Err(e) = w.remaximize(ctx) {
            warn!("Failed to remaximize window {}: {}", id, e);
        }
    }
}
