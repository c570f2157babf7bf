//! Client window management
//!
//! `ManagedWindow` is everything Area knows about one top-level client:
//! its frame, hint snapshot, capabilities and lifecycle flags. Capture and
//! release live here together with the geometry plumbing every other
//! module goes through (`upsize`, `configure`, gravity).

use tracing::{debug, info, warn};

use crate::shared::{Geometry, Margin};
use crate::wm::client_flags::{Decorations, Functions, WindowLayer, WindowType, WmState};
use crate::wm::constraints::{apply_gravity, frame_margin, restore_gravity};
use crate::wm::decorations::{FramePixmaps, FrameWindows};
use crate::wm::display::{ClientEvents, ServerGrab, WindowAttributes, WindowId, WindowRole};
use crate::wm::error::CaptureError;
use crate::wm::ewmh::ALL_WORKSPACES;
use crate::wm::focus::AutoRaiseTimer;
use crate::wm::hints::{EwmhHints, HintsManager, MotifHints, NormalHints, Strut, WmHints, WmProtocols};
use crate::wm::moveresize::DragSession;
use crate::wm::policy::{PolicyInput, update_decorations};
use crate::wm::settings::StyleMetrics;
use crate::wm::state;
use crate::wm::transients::{self, TransientFor, WindowLookup};
use crate::wm::{Context, Result};

/// A managed top-level client and its frame
#[derive(Debug)]
pub struct ManagedWindow {
    pub(crate) window: WindowId,
    pub(crate) frame: FrameWindows,
    pub(crate) pixmaps: FramePixmaps,

    /// Client surface in root coordinates
    pub(crate) client_rect: Geometry,
    /// Frame in root coordinates; the client expanded by `margin`
    pub(crate) frame_rect: Geometry,
    pub(crate) margin: Margin,
    /// Frame rectangle to go back to when leaving maximized or fullscreen
    pub(crate) premax: Geometry,
    pub(crate) old_border_width: u32,
    pub(crate) colormap: u32,

    pub(crate) decorations: Decorations,
    pub(crate) functions: Functions,

    pub(crate) title: String,
    pub(crate) visible_title: String,
    pub(crate) icon_title: String,

    pub(crate) normal_hints: NormalHints,
    pub(crate) wm_hints: WmHints,
    pub(crate) motif: MotifHints,
    pub(crate) protocols: WmProtocols,
    pub(crate) ewmh: EwmhHints,

    pub(crate) transient_for: Option<TransientFor>,
    /// Direct transient children, newest first
    pub(crate) transients: Vec<WindowId>,
    pub(crate) strut: Option<Strut>,

    pub(crate) current_state: WmState,
    pub(crate) visible: bool,
    pub(crate) iconic: bool,
    pub(crate) focused: bool,
    pub(crate) layer: WindowLayer,

    pub(crate) drag: DragSession,
    /// Pointer offset from the frame origin at the last button press
    pub(crate) grab_x: i32,
    pub(crate) grab_y: i32,
    pub(crate) last_button_press: u32,
    pub(crate) auto_raise: AutoRaiseTimer,
}

impl ManagedWindow {
    /// Bare record for `window`, before any hint is read or frame created
    pub fn new(window: WindowId, attributes: &WindowAttributes, screen: &Geometry) -> Self {
        Self {
            window,
            frame: FrameWindows::default(),
            pixmaps: FramePixmaps::default(),
            client_rect: attributes.geometry,
            frame_rect: attributes.geometry,
            margin: Margin::default(),
            premax: attributes.geometry,
            old_border_width: attributes.border_width,
            colormap: attributes.colormap,
            decorations: Decorations::all(),
            functions: Functions::all(),
            title: String::new(),
            visible_title: String::new(),
            icon_title: String::new(),
            normal_hints: NormalHints::defaults(screen),
            wm_hints: WmHints::default(),
            motif: MotifHints::default(),
            protocols: WmProtocols::default(),
            ewmh: EwmhHints::default(),
            transient_for: None,
            transients: Vec::new(),
            strut: None,
            current_state: WmState::Withdrawn,
            visible: false,
            iconic: false,
            focused: false,
            layer: WindowLayer::Normal,
            drag: DragSession::Idle,
            grab_x: 0,
            grab_y: 0,
            last_button_press: 0,
            auto_raise: AutoRaiseTimer::default(),
        }
    }

    pub fn id(&self) -> WindowId {
        self.window
    }

    pub fn frame_window(&self) -> WindowId {
        self.frame.frame
    }

    pub fn frame_windows(&self) -> &FrameWindows {
        &self.frame
    }

    pub fn client_rect(&self) -> Geometry {
        self.client_rect
    }

    pub fn frame_rect(&self) -> Geometry {
        self.frame_rect
    }

    pub fn margin(&self) -> Margin {
        self.margin
    }

    pub fn premax(&self) -> Geometry {
        self.premax
    }

    pub fn decorations(&self) -> Decorations {
        self.decorations
    }

    pub fn functions(&self) -> Functions {
        self.functions
    }

    pub fn has_function(&self, function: Functions) -> bool {
        self.functions.contains(function)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn icon_title(&self) -> &str {
        if self.icon_title.is_empty() {
            &self.title
        } else {
            &self.icon_title
        }
    }

    pub fn window_type(&self) -> WindowType {
        self.ewmh.window_type
    }

    pub fn workspace(&self) -> u32 {
        self.ewmh.workspace
    }

    pub fn layer(&self) -> WindowLayer {
        self.layer
    }

    pub fn state(&self) -> WmState {
        self.current_state
    }

    pub fn strut(&self) -> Option<&Strut> {
        self.strut.as_ref()
    }

    pub fn transients(&self) -> &[WindowId] {
        &self.transients
    }

    pub fn transient_for(&self) -> Option<TransientFor> {
        self.transient_for
    }

    pub fn is_transient(&self) -> bool {
        self.transient_for.is_some()
    }

    pub fn is_group_transient(&self) -> bool {
        self.transient_for.is_some_and(TransientFor::is_group)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_iconic(&self) -> bool {
        self.iconic
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_shaded(&self) -> bool {
        self.ewmh.state.shaded
    }

    pub fn is_maximized(&self) -> bool {
        self.ewmh.state.is_maximized()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.ewmh.state.fullscreen
    }

    pub fn is_modal(&self) -> bool {
        self.ewmh.state.modal
    }

    pub fn is_moving(&self) -> bool {
        matches!(self.drag, DragSession::Moving { .. })
    }

    pub fn is_resizing(&self) -> bool {
        matches!(self.drag, DragSession::Resizing { .. })
    }

    pub fn normal_hints(&self) -> &NormalHints {
        &self.normal_hints
    }

    pub fn ewmh(&self) -> &EwmhHints {
        &self.ewmh
    }

    /// Capabilities the current hints allow
    pub(crate) fn policy(&self) -> (Decorations, Functions) {
        update_decorations(&PolicyInput {
            window_type: self.ewmh.window_type,
            transient: self.is_transient(),
            motif: &self.motif,
            normal: &self.normal_hints,
            protocols: &self.protocols,
        })
    }

    /// Re-run the policy. A fullscreen window keeps its stripped set.
    pub(crate) fn apply_policy(&mut self) {
        let (decorations, functions) = self.policy();
        if self.is_fullscreen() {
            self.decorations = Decorations::empty();
            self.functions = functions & (Functions::CLOSE | Functions::FULLSCREEN);
        } else {
            self.decorations = decorations;
            self.functions = functions;
        }
    }

    /// Recompute the margin and grow the frame around the client
    pub(crate) fn upsize(&mut self, style: &StyleMetrics) {
        self.margin = frame_margin(self.decorations, style);
        let width = self.client_rect.width + self.margin.horizontal();
        let height = if self.is_shaded() {
            style.title_height
        } else {
            self.client_rect.height + self.margin.vertical()
        };
        self.frame_rect.set_size(width, height);
    }

    /// Frame position for the current client position
    pub(crate) fn apply_gravity(&mut self) {
        let (x, y) = apply_gravity(&self.client_rect, &self.margin, self.normal_hints.gravity);
        self.frame_rect.set_pos(x, y);
    }

    /// Client position the current frame stands for
    pub(crate) fn restore_gravity(&mut self) {
        let (x, y) = restore_gravity(&self.frame_rect, &self.margin, self.normal_hints.gravity);
        self.client_rect.set_pos(x, y);
    }

    /// Move and/or resize the frame.
    ///
    /// A size change re-lays the whole frame; a pure move only moves it.
    /// The client is told where it is with a synthetic ConfigureNotify
    /// unless an interactive move is in progress.
    pub fn configure(&mut self, ctx: &mut Context<'_>, x: i32, y: i32, width: u32, height: u32) -> Result<()> {
        let mut send_event = (self.frame_rect.x != x || self.frame_rect.y != y) && !self.is_moving();

        if width != self.frame_rect.width || height != self.frame_rect.height {
            self.frame_rect = Geometry::new(x, y, width, height);
            if self.frame_rect.right() <= 0 || self.frame_rect.bottom() <= 0 {
                self.frame_rect.set_pos(0, 0);
            }
            self.client_rect.set_coords(
                self.frame_rect.x + self.margin.left as i32,
                self.frame_rect.y + self.margin.top as i32,
                self.frame_rect.right() - self.margin.right as i32,
                self.frame_rect.bottom() - self.margin.bottom as i32,
            );
            self.position_windows(ctx)?;
            self.decorate(ctx)?;
            self.redraw_window_frame(ctx)?;
        } else {
            self.frame_rect.set_pos(x, y);
            ctx.display.move_window(self.frame.frame, x, y)?;
            // an opaque move may just have ended here without a notify
            if !self.is_moving() {
                send_event = true;
            }
        }

        if send_event {
            self.client_rect.set_pos(
                self.frame_rect.x + self.margin.left as i32,
                self.frame_rect.y + self.margin.top as i32,
            );
            ctx.display
                .send_configure_notify(self.window, self.client_rect, self.old_border_width)?;
        }
        Ok(())
    }

    pub fn configure_rect(&mut self, ctx: &mut Context<'_>, rect: Geometry) -> Result<()> {
        self.configure(ctx, rect.x, rect.y, rect.width, rect.height)
    }

    /// Re-apply the style and the current capabilities to the frame
    pub fn reconfigure(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        self.restore_gravity();
        self.upsize(&ctx.settings.style);
        self.apply_gravity();
        self.position_windows(ctx)?;
        self.decorate(ctx)?;
        self.redraw_window_frame(ctx)?;

        self.ungrab_buttons(ctx)?;
        self.grab_buttons(ctx)
    }

    /// Put the client inside the plate without reporting our own unmap
    fn associate(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.display.set_border_width(self.window, 0)?;
        ctx.display.change_save_set(self.window, true)?;
        ctx.display
            .select_input(self.window, ClientEvents::MANAGED - ClientEvents::STRUCTURE_NOTIFY)?;
        ctx.display.reparent_window(self.window, self.frame.plate, 0, 0)?;
        ctx.display.select_input(self.window, ClientEvents::MANAGED)
    }

    /// Hand the client back to the root window.
    ///
    /// While shutting down the protocol state is left in place so the next
    /// window manager can pick it up, and the client is mapped again.
    pub(crate) fn restore(&mut self, ctx: &mut Context<'_>, reparented_away: bool) -> Result<()> {
        ctx.display.change_save_set(self.window, false)?;
        ctx.display.select_input(self.window, ClientEvents::empty())?;
        ctx.display.select_input(self.frame.plate, ClientEvents::empty())?;

        self.visible = false;

        if !ctx.shutting_down {
            self.clear_state(ctx)?;
        } else if self.is_shaded() && !self.iconic {
            // a shaded window is not an icon
            self.set_state(ctx, WmState::Normal)?;
        }

        self.restore_gravity();

        {
            let mut grab = ServerGrab::new(ctx)?;
            grab.display.unmap_window(self.frame.frame)?;
            grab.display.unmap_window(self.window)?;
            grab.display.set_border_width(self.window, self.old_border_width)?;

            let x = self.client_rect.x - self.frame_rect.x;
            let y = self.client_rect.y - self.frame_rect.y;
            if self.is_maximized() {
                grab.display.move_resize_window(
                    self.window,
                    Geometry::new(
                        x,
                        y,
                        self.premax.width.saturating_sub(self.margin.horizontal()),
                        self.premax.height.saturating_sub(self.margin.vertical()),
                    ),
                )?;
            } else {
                grab.display.move_window(self.window, x, y)?;
            }
        }

        if !reparented_away && !ctx.display.has_pending_reparent(self.window) {
            let root = ctx.display.root();
            ctx.display
                .reparent_window(self.window, root, self.client_rect.x, self.client_rect.y)?;
        }

        if ctx.shutting_down {
            ctx.display.map_window(self.window)?;
        }
        Ok(())
    }
}

/// Start managing `window`.
///
/// Fails with `CaptureError` when the window vanished or is
/// override-redirect; in that case nothing is left behind.
pub fn capture(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, window: WindowId) -> Result<WindowId> {
    {
        let mut grab = ServerGrab::new(ctx)?;
        let ctx = &mut *grab;

        let attributes = ctx
            .display
            .get_window_attributes(window)?
            .ok_or(CaptureError::NotFound(window))?;
        if attributes.override_redirect {
            return Err(CaptureError::OverrideRedirect(window).into());
        }
        if attributes.root != ctx.display.root() {
            return Err(CaptureError::NoScreen(window).into());
        }

        ctx.display.select_input(window, ClientEvents::MANAGED)?;

        let screen = ctx.screen.screen_rect();
        let mut w = ManagedWindow::new(window, &attributes, &screen);
        read_hints(&mut w, ctx);
        windows.insert(w);

        if let Err(e) = frame_client(windows, ctx, window) {
            warn!("Failed to frame window {}: {}", window, e);
            discard(windows, ctx, window);
            return Err(e);
        }
    }

    if let Err(e) = finish_capture(windows, ctx, window) {
        warn!("Failed to finish managing window {}: {}", window, e);
        discard(windows, ctx, window);
        return Err(e);
    }
    if windows.window(window).is_some_and(|w| w.strut.is_some()) {
        state::remaximize_all(windows, ctx);
    }
    info!("Managing window {}", window);
    Ok(window)
}

fn read_hints(w: &mut ManagedWindow, ctx: &mut Context<'_>) {
    let window = w.window;
    let screen = ctx.screen.screen_rect();
    let workspace = ctx.screen.current_workspace();

    w.title = HintsManager::read_name(ctx.display, ctx.atoms, window);
    w.icon_title = HintsManager::read_icon_name(ctx.display, ctx.atoms, window);
    w.ewmh = HintsManager::read_ewmh(ctx.display, ctx.atoms, window, workspace);
    w.motif = HintsManager::read_motif_hints(ctx.display, ctx.atoms, window);
    w.wm_hints = HintsManager::read_wm_hints(ctx.display, window);
    w.normal_hints = HintsManager::read_normal_hints(ctx.display, window, &screen);
    w.protocols = HintsManager::read_protocols(ctx.display, ctx.atoms, window);
    w.transient_for = HintsManager::read_transient_for(ctx.display, window, w.wm_hints.window_group);
}

/// Relations, policy and the frame, all under the capture grab
fn frame_client(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
    if let Some(parent) = transients::link_transient(windows, window) {
        let workspace = windows.window(parent).map(ManagedWindow::workspace);
        if let (Some(workspace), Some(w)) = (workspace, windows.window_mut(window)) {
            w.ewmh.workspace = workspace;
        }
    }
    transients::join_group(windows, window);

    let Some(w) = windows.window_mut(window) else {
        return Err(CaptureError::NotFound(window).into());
    };

    match w.ewmh.window_type {
        WindowType::Desktop => w.layer = WindowLayer::Desktop,
        WindowType::Dock => w.layer = WindowLayer::Above,
        _ => {}
    }

    (w.decorations, w.functions) = w.policy();

    if w.wm_hints.initial_state == WmState::Iconic && !w.has_function(Functions::ICONIFY) {
        w.wm_hints.initial_state = WmState::Normal;
    }
    if w.is_maximized() && !w.has_function(Functions::MAXIMIZE) {
        w.ewmh.state.max_horz = false;
        w.ewmh.state.max_vert = false;
    }
    if w.is_fullscreen() && !w.has_function(Functions::FULLSCREEN) {
        w.ewmh.state.fullscreen = false;
    }

    let screen = ctx.screen.screen_rect();
    w.strut = HintsManager::read_strut(ctx.display, ctx.atoms, window, &screen);
    if let Some(strut) = &w.strut {
        ctx.screen.add_strut(window, strut);
    }

    let root = ctx.display.root();
    w.frame.frame = ctx
        .display
        .create_window(root, w.frame_rect, 0, WindowRole::Frame)?;
    w.frame.plate = ctx.display.create_window(
        w.frame.frame,
        Geometry::new(0, 0, w.client_rect.width.max(1), w.client_rect.height.max(1)),
        0,
        WindowRole::Plate,
    )?;
    if w.decorations.contains(Decorations::TITLEBAR) {
        w.create_titlebar(ctx)?;
    }
    if w.decorations.contains(Decorations::HANDLE) {
        w.create_handle(ctx)?;
    }

    w.upsize(&ctx.settings.style);
    w.apply_gravity();

    w.associate(ctx)?;

    // keep the state across a restart, otherwise start as asked
    w.current_state = HintsManager::read_wm_state(ctx.display, ctx.atoms, window)
        .unwrap_or(w.wm_hints.initial_state);
    if w.workspace() != ALL_WORKSPACES && w.workspace() != ctx.screen.current_workspace() {
        w.current_state = WmState::Withdrawn;
    }

    let rect = w.frame_rect;
    w.configure_rect(ctx, rect)?;
    w.position_windows(ctx)
}

/// Steps after the capture grab is released
fn finish_capture(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
    let Some(w) = windows.window_mut(window) else {
        return Err(CaptureError::NotFound(window).into());
    };
    w.decorate(ctx)?;
    w.grab_buttons(ctx)?;
    ctx.display.map_subwindows(w.frame.frame)?;

    w.premax = w.frame_rect;

    if w.layer != WindowLayer::Normal {
        ctx.screen.change_layer(window, w.layer);
    }

    if w.is_shaded() {
        w.ewmh.state.shaded = false;
        let saved = w.current_state;
        w.set_shaded(ctx, true)?;
        // only an icon starts out Iconic, not a shaded window
        if saved != WmState::Iconic {
            w.current_state = saved;
        }
    }

    if !w.has_function(Functions::MAXIMIZE) {
        w.ewmh.state.max_horz = false;
        w.ewmh.state.max_vert = false;
    }

    if w.is_fullscreen() {
        w.ewmh.state.fullscreen = false;
        w.set_fullscreen(ctx, true)?;
    } else if w.is_maximized() {
        w.remaximize(ctx)?;
    }
    Ok(())
}

/// Undo a partial capture
fn discard(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, window: WindowId) {
    if windows.window(window).is_some_and(|w| w.strut.is_some()) {
        ctx.screen.remove_strut(window);
    }
    transients::leave_group(windows, window);
    transients::orphan_transients(windows, window);
    if let Some(mut w) = windows.remove(window) {
        if let Err(e) = w.destroy_frame(ctx) {
            warn!("Failed to destroy frame of window {}: {}", window, e);
        }
    }
}

/// Stop managing `id`: end any drag, hand the client back, then drop
/// its strut, group and transient links and the frame.
pub fn release_window(
    windows: &mut dyn WindowLookup,
    ctx: &mut Context<'_>,
    id: WindowId,
    reparented_away: bool,
) -> Result<()> {
    let Some(w) = windows.window_mut(id) else {
        return Ok(());
    };
    debug!("Releasing window {}", id);

    if let Err(e) = w.abort_drag(ctx) {
        warn!("Failed to end drag of window {}: {}", id, e);
    }
    w.auto_raise.stop();
    let restored = w.restore(ctx, reparented_away);

    let had_strut = w.strut.take().is_some();
    if had_strut {
        ctx.screen.remove_strut(id);
    }
    if w.iconic {
        ctx.screen.remove_icon(id);
    }
    if ctx.screen.focused_window() == Some(id) {
        ctx.screen.set_focused_window(None);
    }

    transients::leave_group(windows, id);
    transients::orphan_transients(windows, id);

    if let Some(mut w) = windows.remove(id) {
        w.destroy_frame(ctx)?;
    }
    if had_strut && !ctx.shutting_down {
        state::remaximize_all(windows, ctx);
    }
    info!("Released window {}", id);
    restored
}
