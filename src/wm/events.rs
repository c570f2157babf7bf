//! Events Module
//!
//! The single entry point for display notifications about managed windows.
//! The driver translates protocol events into `WindowEvent`s; `dispatch`
//! routes each one to hint ingestion, the state machine or the drag
//! controller.

use std::time::{Duration, Instant};

use tracing::{debug, trace};
use x11rb::protocol::xproto::{Atom, AtomEnum};

use crate::shared::{Corner, Geometry};
use crate::wm::client::ManagedWindow;
use crate::wm::client_flags::{Functions, WindowType, WmState};
use crate::wm::constraints::{apply_gravity, restore_gravity};
use crate::wm::decorations::{CONTROL_MASK, FramePart, IGNORED_MODIFIERS, MOD1_MASK};
use crate::wm::display::WindowId;
use crate::wm::ewmh::predefined;
use crate::wm::focus::{self, set_input_focus};
use crate::wm::hints::{Gravity, HintsManager, SizeFlags};
use crate::wm::netwm::{ClientRequest, handle_client_message};
use crate::wm::state::{activate, iconify, remaximize_all, show};
use crate::wm::transients::{self, WindowLookup};
use crate::wm::{Context, Result};

/// Pointer button state masks in an event's `state` field
pub const BUTTON1_MASK: u16 = 1 << 8;
pub const BUTTON3_MASK: u16 = 1 << 10;

/// Fields of a ConfigureRequest (or `_NET_MOVERESIZE_WINDOW`) the client
/// asked to change. Positions are client positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryRequest {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub border_width: Option<u32>,
}

/// Restacking part of a ConfigureRequest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMode {
    Above,
    Below,
    TopIf,
    BottomIf,
    Opposite,
}

/// Pointer event on a frame window or the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub window: WindowId,
    pub root_x: i32,
    pub root_y: i32,
    /// Position relative to `window`
    pub event_x: i32,
    pub event_y: i32,
    pub button: u8,
    pub state: u16,
    pub time: u32,
}

impl PointerEvent {
    /// Modifier state without Lock/NumLock/ScrollLock
    fn modifiers(&self) -> u16 {
        self.state & !IGNORED_MODIFIERS
    }
}

/// Notification concerning a (possibly) managed window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    MapRequest(WindowId),
    Unmap(WindowId),
    Destroy(WindowId),
    Reparent { window: WindowId, parent: WindowId },
    ConfigureRequest {
        window: WindowId,
        request: GeometryRequest,
        stack_mode: Option<StackMode>,
    },
    PropertyChange { window: WindowId, atom: Atom },
    ClientMessage {
        window: WindowId,
        message_type: Atom,
        format: u8,
        data: [u32; 5],
    },
    ButtonPress(PointerEvent),
    ButtonRelease(PointerEvent),
    Motion(PointerEvent),
    /// `normal_mode` is false for grab/ungrab crossings
    Enter { window: WindowId, normal_mode: bool },
    Leave { window: WindowId },
    /// `count` is the number of Expose events still to follow
    Expose { window: WindowId, count: u16 },
    FocusIn(WindowId),
}

/// What the driver has to do after `dispatch`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Handled,
    /// Not about a managed window; the driver applies its default
    Ignored,
    /// The client went away; call `release_window`
    Release { window: WindowId, reparented_away: bool },
}

/// Which window of a frame an event arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hit {
    Client,
    Frame,
    Plate,
    Part(FramePart),
}

fn resolve(windows: &dyn WindowLookup, window: WindowId) -> Option<(WindowId, Hit)> {
    if windows.window(window).is_some() {
        return Some((window, Hit::Client));
    }
    let id = windows.owner_of(window)?;
    let frame = windows.window(id)?.frame_windows();
    let hit = if window == frame.frame {
        Hit::Frame
    } else if window == frame.plate {
        Hit::Plate
    } else {
        Hit::Part(frame.part_of(window)?)
    };
    Some((id, hit))
}

/// Route one notification. `now` drives the auto-raise timer.
pub fn dispatch(
    windows: &mut dyn WindowLookup,
    ctx: &mut Context<'_>,
    event: &WindowEvent,
    now: Instant,
) -> Result<EventResult> {
    trace!("Dispatching {:?}", event);

    match *event {
        WindowEvent::MapRequest(window) => map_request(windows, ctx, window),
        WindowEvent::Unmap(window) | WindowEvent::Destroy(window) => {
            if windows.window(window).is_some() {
                Ok(EventResult::Release {
                    window,
                    reparented_away: false,
                })
            } else {
                Ok(EventResult::Ignored)
            }
        }
        WindowEvent::Reparent { window, parent } => match windows.window(window) {
            Some(w) if parent != w.frame_windows().plate => {
                debug!("Window {} was reparented away to {}", window, parent);
                Ok(EventResult::Release {
                    window,
                    reparented_away: true,
                })
            }
            _ => Ok(EventResult::Ignored),
        },
        WindowEvent::ConfigureRequest {
            window,
            request,
            stack_mode,
        } => {
            let Some(w) = windows.window_mut(window) else {
                return Ok(EventResult::Ignored);
            };
            w.configure_request(ctx, &request, stack_mode)?;
            Ok(EventResult::Handled)
        }
        WindowEvent::PropertyChange { window, atom } => {
            if windows.window(window).is_none() {
                return Ok(EventResult::Ignored);
            }
            property_changed(windows, ctx, window, atom)?;
            Ok(EventResult::Handled)
        }
        WindowEvent::ClientMessage {
            window,
            message_type,
            format,
            data,
        } => {
            if windows.window(window).is_none() {
                return Ok(EventResult::Ignored);
            }
            match ClientRequest::decode(message_type, format, data, ctx.atoms) {
                Some(request) => handle_client_message(windows, ctx, window, request)?,
                None => trace!("Unhandled client message {} for window {}", message_type, window),
            }
            Ok(EventResult::Handled)
        }
        WindowEvent::ButtonPress(ev) => with_hit(windows, ev.window, |windows, id, hit| {
            button_press(windows, ctx, id, hit, &ev)
        }),
        WindowEvent::ButtonRelease(ev) => with_hit(windows, ev.window, |windows, id, hit| {
            button_release(windows, ctx, id, hit, &ev)
        }),
        WindowEvent::Motion(ev) => with_hit(windows, ev.window, |windows, id, hit| {
            motion(windows, ctx, id, hit, &ev)
        }),
        WindowEvent::Enter { window, normal_mode } => {
            with_hit(windows, window, |windows, id, hit| {
                if hit == Hit::Frame && normal_mode {
                    enter(windows, ctx, id, now)?;
                }
                Ok(())
            })
        }
        WindowEvent::Leave { window } => with_hit(windows, window, |windows, id, hit| {
            let behavior = ctx.settings.behavior;
            if hit == Hit::Frame && behavior.sloppy_focus && behavior.auto_raise {
                if let Some(w) = windows.window_mut(id) {
                    w.auto_raise.stop();
                }
            }
            Ok(())
        }),
        WindowEvent::Expose { window, count } => with_hit(windows, window, |windows, id, hit| {
            let Some(w) = windows.window(id) else {
                return Ok(());
            };
            if count > 0 || !w.is_visible() {
                return Ok(());
            }
            match hit {
                Hit::Part(part) => w.redraw_part(ctx, part, false),
                Hit::Frame => w.redraw_window_frame(ctx),
                Hit::Client | Hit::Plate => Ok(()),
            }
        }),
        WindowEvent::FocusIn(window) => {
            let focused = resolve(windows, window).map(|(id, _)| id);
            focus::focus_changed(windows, ctx, focused)?;
            Ok(if focused.is_some() {
                EventResult::Handled
            } else {
                EventResult::Ignored
            })
        }
    }
}

fn with_hit<F>(windows: &mut dyn WindowLookup, window: WindowId, handler: F) -> Result<EventResult>
where
    F: FnOnce(&mut dyn WindowLookup, WindowId, Hit) -> Result<()>,
{
    match resolve(windows, window) {
        Some((id, hit)) => {
            handler(windows, id, hit)?;
            Ok(EventResult::Handled)
        }
        None => Ok(EventResult::Ignored),
    }
}

fn map_request(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, window: WindowId) -> Result<EventResult> {
    match windows.window(window) {
        Some(w) if w.is_iconic() || !w.is_visible() => {
            debug!("Map request for managed window {}", window);
            activate(windows, ctx, window)?;
            Ok(EventResult::Handled)
        }
        Some(_) => Ok(EventResult::Handled),
        None => Ok(EventResult::Ignored),
    }
}

/// First map of a freshly captured window, according to its initial state
pub fn map_new_window(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, id: WindowId) -> Result<()> {
    let Some(w) = windows.window_mut(id) else {
        return Ok(());
    };
    match w.state() {
        WmState::Normal => {
            show(windows, ctx, id)?;
            if ctx.settings.behavior.focus_new {
                set_input_focus(windows, ctx, id)?;
            }
            Ok(())
        }
        WmState::Iconic => {
            // never mapped, so there is nothing to hide
            w.iconic = true;
            ctx.screen.add_icon(id);
            w.set_state(ctx, WmState::Iconic)
        }
        WmState::Withdrawn => Ok(()),
    }
}

impl ManagedWindow {
    /// Move and/or resize on behalf of the client. Positions go through
    /// `gravity`; sizes only through the constraint solver.
    pub(crate) fn request_geometry(
        &mut self,
        ctx: &mut Context<'_>,
        request: &GeometryRequest,
        gravity: Gravity,
    ) -> Result<()> {
        if let Some(border_width) = request.border_width {
            self.old_border_width = border_width;
        }

        let shaded = self.is_shaded();
        let mut changing = self.frame_rect;
        if shaded {
            changing.height = self.client_rect.height + self.margin.vertical();
        }
        if request.x.is_some() || request.y.is_some() {
            let (cx, cy) = restore_gravity(&self.frame_rect, &self.margin, gravity);
            let client = Geometry::new(
                request.x.unwrap_or(cx),
                request.y.unwrap_or(cy),
                self.client_rect.width,
                self.client_rect.height,
            );
            let (fx, fy) = apply_gravity(&client, &self.margin, gravity);
            changing.set_pos(fx, fy);
        }
        if let Some(width) = request.width {
            changing.width = width + self.margin.horizontal();
        }
        if let Some(height) = request.height {
            changing.height = height + self.margin.vertical();
        }

        let changing = self.constrain(changing, Corner::TopLeft);
        if !shaded {
            return self.configure_rect(ctx, changing);
        }

        // the new height takes effect when unshaded
        let client_height = changing.height.saturating_sub(self.margin.vertical());
        let rect = Geometry::new(changing.x, changing.y, changing.width, self.frame_rect.height);
        self.configure_rect(ctx, rect)?;
        self.client_rect.height = client_height;
        Ok(())
    }

    fn configure_request(
        &mut self,
        ctx: &mut Context<'_>,
        request: &GeometryRequest,
        stack_mode: Option<StackMode>,
    ) -> Result<()> {
        if self.iconic {
            debug!("Ignoring configure request of iconic window {}", self.window);
            return Ok(());
        }
        let gravity = self.normal_hints.gravity;
        self.request_geometry(ctx, request, gravity)?;

        match stack_mode {
            Some(StackMode::Below | StackMode::BottomIf) => ctx.screen.lower_window(self.window),
            Some(_) => ctx.screen.raise_window(self.window),
            None => {}
        }
        Ok(())
    }
}

fn property_changed(
    windows: &mut dyn WindowLookup,
    ctx: &mut Context<'_>,
    id: WindowId,
    atom: Atom,
) -> Result<()> {
    let atoms = ctx.atoms;
    let screen = ctx.screen.screen_rect();

    if atom == predefined(AtomEnum::WM_TRANSIENT_FOR) {
        return transient_changed(windows, ctx, id);
    }

    if atom == predefined(AtomEnum::WM_HINTS) {
        transients::leave_group(windows, id);
        if let Some(w) = windows.window_mut(id) {
            w.wm_hints = HintsManager::read_wm_hints(ctx.display, id);
        }
        transients::join_group(windows, id);
        return Ok(());
    }

    if atom == atoms._NET_WM_STRUT || atom == atoms._NET_WM_STRUT_PARTIAL {
        strut_changed(windows, ctx, id);
        return Ok(());
    }

    let Some(w) = windows.window_mut(id) else {
        return Ok(());
    };

    if atom == predefined(AtomEnum::WM_ICON_NAME) || atom == atoms._NET_WM_ICON_NAME {
        w.icon_title = HintsManager::read_icon_name(ctx.display, atoms, id);
        if w.iconic {
            ctx.screen.propagate_name(id);
        }
    } else if atom == predefined(AtomEnum::WM_NAME) || atom == atoms._NET_WM_NAME {
        w.title = HintsManager::read_name(ctx.display, atoms, id);
        debug!("Window {} renamed to {:?}", id, w.title);
        if w.frame_windows().title.is_some() {
            w.position_buttons(ctx, false)?;
        }
        ctx.screen.propagate_name(id);
    } else if atom == predefined(AtomEnum::WM_NORMAL_HINTS) {
        w.normal_hints = HintsManager::read_normal_hints(ctx.display, id, &screen);
        if w
            .normal_hints
            .flags
            .intersects(SizeFlags::P_MIN_SIZE | SizeFlags::P_MAX_SIZE)
        {
            // fixed-size status may have changed
            w.apply_policy();
            w.reconfigure(ctx)?;
        }
        let changing = w.constrain(w.frame_rect, Corner::TopLeft);
        if changing != w.frame_rect {
            w.configure_rect(ctx, changing)?;
        }
    } else if atom == atoms.WM_PROTOCOLS {
        w.protocols = HintsManager::read_protocols(ctx.display, atoms, id);
        w.apply_policy();
        if w.frame_windows().title.is_some() {
            w.position_buttons(ctx, false)?;
        }
    } else if atom == atoms._MOTIF_WM_HINTS {
        w.motif = HintsManager::read_motif_hints(ctx.display, atoms, id);
        w.apply_policy();
        w.reconfigure(ctx)?;
    } else {
        trace!("Ignoring property {} on window {}", atom, id);
    }
    Ok(())
}

/// Register, update or drop the reserved space, then refit maximized
/// windows to the work area it leaves
fn strut_changed(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, id: WindowId) {
    let Some(w) = windows.window_mut(id) else {
        return;
    };
    let screen = ctx.screen.screen_rect();
    let strut = HintsManager::read_strut(ctx.display, ctx.atoms, id, &screen);
    match (&w.strut, &strut) {
        (Some(old), Some(new)) if old == new => return,
        (Some(_), Some(new)) => ctx.screen.update_strut(id, new),
        (None, Some(new)) => ctx.screen.add_strut(id, new),
        (Some(_), None) => ctx.screen.remove_strut(id),
        (None, None) => return,
    }
    w.strut = strut;
    debug!("Window {} changed its reserved space", id);
    remaximize_all(windows, ctx);
}

fn transient_changed(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, id: WindowId) -> Result<()> {
    transients::unlink_transient(windows, id);
    if let Some(w) = windows.window_mut(id) {
        w.transient_for = HintsManager::read_transient_for(ctx.display, id, w.wm_hints.window_group);
    }

    if let Some(parent) = transients::link_transient(windows, id) {
        let workspace = windows.window(parent).map(ManagedWindow::workspace);
        if let (Some(workspace), Some(w)) = (workspace, windows.window_mut(id)) {
            if workspace != w.workspace() {
                w.set_workspace(ctx, workspace)?;
                ctx.screen.workspace_changed(id, workspace);
                if !w.on_current_workspace(ctx) {
                    w.hide(ctx)?;
                } else if !w.iconic && w.state() != WmState::Withdrawn {
                    show(windows, ctx, id)?;
                }
            }
        }
    }

    let Some(w) = windows.window_mut(id) else {
        return Ok(());
    };
    w.apply_policy();
    w.reconfigure(ctx)
}

fn button_press(
    windows: &mut dyn WindowLookup,
    ctx: &mut Context<'_>,
    id: WindowId,
    hit: Hit,
    ev: &PointerEvent,
) -> Result<()> {
    let Some(w) = windows.window_mut(id) else {
        return Ok(());
    };
    let modifiers = ev.modifiers();

    match hit {
        Hit::Part(FramePart::MaximizeButton) if ev.button < 4 => {
            return w.redraw_part(ctx, FramePart::MaximizeButton, true);
        }
        Hit::Part(part @ (FramePart::IconifyButton | FramePart::CloseButton)) if ev.button == 1 => {
            return w.redraw_part(ctx, part, true);
        }
        _ => {}
    }

    if ev.button == 1 || (ev.button == 3 && modifiers & MOD1_MASK != 0) {
        w.grab_x = ev.root_x - w.frame_rect.x;
        w.grab_y = ev.root_y - w.frame_rect.y;
        ctx.screen.raise_window(id);

        if !w.is_focused() {
            set_input_focus(windows, ctx, id)?;
        } else {
            ctx.display.install_colormap(w.colormap)?;
        }
        if hit == Hit::Plate {
            ctx.display.allow_replay_pointer()?;
        }

        let Some(w) = windows.window_mut(id) else {
            return Ok(());
        };
        let on_title = hit == Hit::Part(FramePart::Title)
            || (hit == Hit::Part(FramePart::Label) && w.has_function(Functions::SHADE));
        if ev.button == 1 && on_title {
            let interval = ctx.settings.behavior.double_click_interval_ms;
            let double = ev.time.wrapping_sub(w.last_button_press) <= interval;
            if double || modifiers & CONTROL_MASK != 0 {
                let shaded = !w.is_shaded();
                w.set_shaded(ctx, shaded)?;
                w.last_button_press = 0;
            } else {
                w.last_button_press = ev.time;
            }
        }
    } else if ev.button == 2 {
        ctx.screen.lower_window(id);
    } else if ev.button == 3 {
        ctx.screen.show_window_menu(id, ev.root_x, ev.root_y);
    }
    Ok(())
}

fn button_release(
    windows: &mut dyn WindowLookup,
    ctx: &mut Context<'_>,
    id: WindowId,
    hit: Hit,
    ev: &PointerEvent,
) -> Result<()> {
    if let Hit::Part(part) = hit {
        if part.is_button() {
            let size = ctx.settings.style.button_width as i32;
            let inside = (0..size).contains(&ev.event_x) && (0..size).contains(&ev.event_y);
            if let Some(w) = windows.window(id) {
                w.redraw_part(ctx, part, false)?;
            }
            if inside {
                match part {
                    FramePart::MaximizeButton if ev.button < 4 => {
                        if let Some(w) = windows.window_mut(id) {
                            w.maximize(ctx, ev.button)?;
                            ctx.screen.raise_window(id);
                        }
                    }
                    FramePart::IconifyButton if ev.button == 1 => iconify(windows, ctx, id)?,
                    FramePart::CloseButton if ev.button == 1 => {
                        if let Some(w) = windows.window(id) {
                            w.close(ctx)?;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    let Some(w) = windows.window_mut(id) else {
        return Ok(());
    };
    if w.is_moving() || w.is_resizing() {
        w.finish_drag(ctx)?;
    }
    if hit == Hit::Frame && ev.button == 2 && ev.modifiers() & MOD1_MASK != 0 {
        ctx.display.ungrab_pointer()?;
    }
    Ok(())
}

fn motion(
    windows: &mut dyn WindowLookup,
    ctx: &mut Context<'_>,
    id: WindowId,
    hit: Hit,
    ev: &PointerEvent,
) -> Result<()> {
    let Some(w) = windows.window_mut(id) else {
        return Ok(());
    };
    let modifiers = ev.modifiers();

    if w.is_moving() {
        return w.update_move(ctx, ev.root_x, ev.root_y);
    }
    if w.is_resizing() {
        return w.update_resize(ctx, ev.root_x, ev.root_y);
    }

    let button1 = ev.state & BUTTON1_MASK != 0;
    let button3 = ev.state & BUTTON3_MASK != 0;
    let movable = matches!(
        hit,
        Hit::Frame | Hit::Part(FramePart::Title | FramePart::Label | FramePart::Handle)
    );
    let grip = matches!(hit, Hit::Part(FramePart::LeftGrip | FramePart::RightGrip));

    if w.has_function(Functions::MOVE) && button1 && movable {
        w.begin_move(ctx)?;
        w.update_move(ctx, ev.root_x, ev.root_y)
    } else if w.has_function(Functions::RESIZE)
        && ((button1 && grip) || (button3 && modifiers & MOD1_MASK != 0 && hit == Hit::Frame))
    {
        let left = hit == Hit::Part(FramePart::LeftGrip);
        w.begin_resize(ctx, left, ev.root_x, ev.root_y)
    } else {
        Ok(())
    }
}

fn enter(windows: &mut dyn WindowLookup, ctx: &mut Context<'_>, id: WindowId, now: Instant) -> Result<()> {
    let behavior = ctx.settings.behavior;
    let Some(w) = windows.window_mut(id) else {
        return Ok(());
    };
    if !behavior.sloppy_focus
        || !w.is_visible()
        || matches!(w.window_type(), WindowType::Desktop | WindowType::Dock)
    {
        return Ok(());
    }

    let leave = ctx.display.take_pending_leave(w.frame_window());
    let stays = leave.is_none_or(|crossing| crossing.into_inferior);
    if stays && !w.is_focused() {
        set_input_focus(windows, ctx, id)?;
    }

    if behavior.auto_raise {
        if let Some(w) = windows.window_mut(id) {
            w.auto_raise
                .start(now, Duration::from_millis(behavior.auto_raise_delay_ms));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::client::release_window;
    use crate::wm::client_flags::WindowLayer;
    use crate::wm::display::LeaveCrossing;
    use crate::wm::hints::MAX_WINDOW_SIZE;
    use crate::wm::screen::GeometryFeedback;
    use crate::wm::testing::{Call, Harness};

    fn shown(h: &mut Harness, id: WindowId, rect: Geometry) -> WindowId {
        let id = h.capture_normal(id, rect);
        h.run(|windows, ctx| show(windows, ctx, id)).unwrap();
        id
    }

    fn send(h: &mut Harness, event: WindowEvent) -> EventResult {
        let now = h.now;
        h.run(|windows, ctx| dispatch(windows, ctx, &event, now)).unwrap()
    }

    fn pointer(window: WindowId, button: u8, state: u16, root: (i32, i32)) -> PointerEvent {
        PointerEvent {
            window,
            root_x: root.0,
            root_y: root.1,
            event_x: 2,
            event_y: 2,
            button,
            state,
            time: 1000,
        }
    }

    #[test]
    fn test_unmanaged_events_are_ignored() {
        let mut h = Harness::new();
        assert_eq!(send(&mut h, WindowEvent::Unmap(5)), EventResult::Ignored);
        assert_eq!(send(&mut h, WindowEvent::MapRequest(5)), EventResult::Ignored);
        let request = WindowEvent::ConfigureRequest {
            window: 5,
            request: GeometryRequest::default(),
            stack_mode: None,
        };
        assert_eq!(send(&mut h, request), EventResult::Ignored);
    }

    #[test]
    fn test_unmap_and_reparent_release() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let plate = h.windows.window(id).unwrap().frame_windows().plate;

        assert_eq!(
            send(&mut h, WindowEvent::Reparent { window: 100, parent: plate }),
            EventResult::Ignored
        );
        assert_eq!(
            send(&mut h, WindowEvent::Reparent { window: 100, parent: 7 }),
            EventResult::Release {
                window: 100,
                reparented_away: true
            }
        );
        assert_eq!(
            send(&mut h, WindowEvent::Destroy(100)),
            EventResult::Release {
                window: 100,
                reparented_away: false
            }
        );
    }

    #[test]
    fn test_configure_request_goes_through_solver() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        {
            let w = h.windows.window_mut(id).unwrap();
            w.normal_hints.flags |= SizeFlags::P_RESIZE_INC;
            w.normal_hints.width_inc = 10;
            w.normal_hints.height_inc = 10;
        }
        h.display.calls.clear();

        let request = GeometryRequest {
            x: Some(40),
            y: Some(50),
            width: Some(255),
            height: Some(144),
            border_width: None,
        };
        let result = send(
            &mut h,
            WindowEvent::ConfigureRequest {
                window: 100,
                request,
                stack_mode: Some(StackMode::Below),
            },
        );
        assert_eq!(result, EventResult::Handled);

        let w = h.windows.window(id).unwrap();
        assert_eq!((w.frame_rect.x, w.frame_rect.y), (40, 50));
        // min size 1 is the grid base: 1 + 25 * 10, 1 + 14 * 10
        assert_eq!((w.client_rect.width, w.client_rect.height), (251, 141));
        assert_eq!(h.screen.lowered, vec![100]);
    }

    #[test]
    fn test_configure_request_without_change_still_notifies() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        h.display.calls.clear();
        send(
            &mut h,
            WindowEvent::ConfigureRequest {
                window: id,
                request: GeometryRequest::default(),
                stack_mode: None,
            },
        );
        assert!(h.display.calls.iter().any(|c| matches!(c, Call::ConfigureNotify(100, _))));
    }

    #[test]
    fn test_iconic_ignores_configure_request() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        h.run(|windows, ctx| iconify(windows, ctx, id)).unwrap();
        let before = h.windows.window(id).unwrap().frame_rect;
        send(
            &mut h,
            WindowEvent::ConfigureRequest {
                window: id,
                request: GeometryRequest {
                    x: Some(300),
                    ..Default::default()
                },
                stack_mode: None,
            },
        );
        assert_eq!(h.windows.window(id).unwrap().frame_rect, before);
    }

    #[test]
    fn test_map_request_deiconifies() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        h.run(|windows, ctx| iconify(windows, ctx, id)).unwrap();
        assert_eq!(send(&mut h, WindowEvent::MapRequest(100)), EventResult::Handled);
        assert!(h.windows.window(id).unwrap().is_visible());
    }

    #[test]
    fn test_map_new_window_by_state() {
        let mut h = Harness::new();
        h.display.add_client(100, Geometry::new(0, 0, 100, 100));
        let wm_hints = predefined(AtomEnum::WM_HINTS);
        // StateHint with IconicState
        h.display.set_property(100, wm_hints, vec![2, 0, 3, 0, 0, 0, 0, 0, 0]);
        let id = h.capture(100).unwrap();
        h.run(|windows, ctx| map_new_window(windows, ctx, id)).unwrap();
        let w = h.windows.window(id).unwrap();
        assert!(w.is_iconic() && !w.is_visible());
        assert_eq!(h.screen.icons, vec![100]);

        let other = h.capture_normal(101, Geometry::new(0, 0, 100, 100));
        h.run(|windows, ctx| map_new_window(windows, ctx, other)).unwrap();
        let w = h.windows.window(other).unwrap();
        assert!(w.is_visible());
        assert!(w.is_focused());
    }

    #[test]
    fn test_name_change_updates_visible_name() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let wm_name = predefined(AtomEnum::WM_NAME);
        h.display.set_text(100, wm_name, "renamed");
        send(&mut h, WindowEvent::PropertyChange { window: 100, atom: wm_name });

        let w = h.windows.window(id).unwrap();
        assert_eq!(w.title(), "renamed");
        assert_eq!(w.visible_title, "renamed");
        assert_eq!(h.screen.renamed, vec![100]);
        let visible_name = h.atoms._NET_WM_VISIBLE_NAME;
        assert!(h
            .display
            .calls
            .contains(&Call::ChangeText(100, visible_name, "renamed".to_string())));
    }

    #[test]
    fn test_fixed_size_hints_revoke_resize() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let normal_hints = predefined(AtomEnum::WM_NORMAL_HINTS);
        let mut data = vec![0u32; 18];
        data[0] = (SizeFlags::P_MIN_SIZE | SizeFlags::P_MAX_SIZE).bits();
        data[5] = 300;
        data[6] = 200;
        data[7] = 300;
        data[8] = 200;
        h.display.set_property(100, normal_hints, data);
        send(&mut h, WindowEvent::PropertyChange { window: 100, atom: normal_hints });

        let w = h.windows.window(id).unwrap();
        assert!(!w.has_function(Functions::RESIZE));
        assert!(!w.has_function(Functions::MAXIMIZE));
        assert_eq!((w.client_rect.width, w.client_rect.height), (300, 200));
        let frame = w.frame_window();
        assert!(!h.display.has_grab(frame, 3, MOD1_MASK));
    }

    #[test]
    fn test_oversized_min_hint_keeps_geometry_sane() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let normal_hints = predefined(AtomEnum::WM_NORMAL_HINTS);
        let mut data = vec![0u32; 18];
        data[0] = SizeFlags::P_MIN_SIZE.bits();
        data[5] = 0x7fff_ff00;
        data[6] = 1;
        h.display.set_property(100, normal_hints, data);
        send(&mut h, WindowEvent::PropertyChange { window: 100, atom: normal_hints });

        send(
            &mut h,
            WindowEvent::ConfigureRequest {
                window: id,
                request: GeometryRequest {
                    x: Some(1000),
                    y: Some(10),
                    width: Some(400),
                    height: Some(300),
                    border_width: None,
                },
                stack_mode: None,
            },
        );
        let w = h.windows.window(id).unwrap();
        assert_eq!(w.client_rect.width, MAX_WINDOW_SIZE);
        assert!(w.frame_rect.right() > w.frame_rect.x);
    }

    #[test]
    fn test_protocols_change_restores_close() {
        let mut h = Harness::new();
        h.display.add_client(100, Geometry::new(0, 0, 300, 200));
        let id = h.capture(100).unwrap();
        assert!(h.windows.window(id).unwrap().frame_windows().close_button.is_none());

        h.display.set_protocols(100, true, false);
        let protocols = h.atoms.WM_PROTOCOLS;
        send(&mut h, WindowEvent::PropertyChange { window: 100, atom: protocols });
        let w = h.windows.window(id).unwrap();
        assert!(w.has_function(Functions::CLOSE));
        assert!(w.frame_windows().close_button.is_some());
    }

    #[test]
    fn test_strut_lifecycle() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 1024, 30));
        let strut = h.atoms._NET_WM_STRUT;

        h.display.set_property(100, strut, vec![0, 0, 30, 0]);
        send(&mut h, WindowEvent::PropertyChange { window: id, atom: strut });
        assert_eq!(h.screen.struts.get(&100).map(|s| s.top), Some(30));

        h.display.set_property(100, strut, vec![0, 0, 40, 0]);
        send(&mut h, WindowEvent::PropertyChange { window: id, atom: strut });
        assert_eq!(h.screen.struts.get(&100).map(|s| s.top), Some(40));

        h.display.remove_property(100, strut);
        send(&mut h, WindowEvent::PropertyChange { window: id, atom: strut });
        assert!(!h.screen.struts.contains_key(&100));
    }

    #[test]
    fn test_strut_change_refits_maximized_windows() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 100, 300, 200));
        h.with_window(id, |w, ctx| w.maximize(ctx, 1)).unwrap();
        assert_eq!(h.windows.window(id).unwrap().frame_rect.y, 0);

        let dock = shown(&mut h, 101, Geometry::new(0, 0, 1024, 30));
        let strut = h.atoms._NET_WM_STRUT;
        h.display.set_property(dock, strut, vec![0, 0, 30, 0]);
        send(&mut h, WindowEvent::PropertyChange { window: dock, atom: strut });

        let w = h.windows.window(id).unwrap();
        assert!(w.is_maximized());
        assert_eq!(w.frame_rect.y, 30);
        assert!(w.frame_rect.bottom() < 768);

        h.release(dock, false).unwrap();
        let w = h.windows.window(id).unwrap();
        assert_eq!(w.frame_rect.y, 0);
        assert!(w.is_maximized());
    }

    #[test]
    fn test_captured_dock_refits_maximized_windows() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 100, 300, 200));
        h.with_window(id, |w, ctx| w.maximize(ctx, 1)).unwrap();

        h.display.add_client(101, Geometry::new(0, 0, 1024, 30));
        h.display.set_property(101, h.atoms._NET_WM_STRUT, vec![0, 0, 30, 0]);
        h.capture(101).unwrap();
        assert_eq!(h.windows.window(id).unwrap().frame_rect.y, 30);
    }

    #[test]
    fn test_transient_for_change_relinks() {
        let mut h = Harness::new();
        let parent = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let child = shown(&mut h, 101, Geometry::new(0, 0, 100, 100));
        assert!(h.windows.window(child).unwrap().has_function(Functions::CHANGE_WORKSPACE));

        h.display.set_transient_for(101, 100);
        let transient_for = predefined(AtomEnum::WM_TRANSIENT_FOR);
        send(&mut h, WindowEvent::PropertyChange { window: child, atom: transient_for });

        assert_eq!(h.windows.window(parent).unwrap().transients(), &[101]);
        let w = h.windows.window(child).unwrap();
        assert!(w.is_transient());
        assert!(!w.has_function(Functions::CHANGE_WORKSPACE));
    }

    #[test]
    fn test_client_message_dispatch() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let (net_state, shaded) = (h.atoms._NET_WM_STATE, h.atoms._NET_WM_STATE_SHADED);
        let result = send(
            &mut h,
            WindowEvent::ClientMessage {
                window: id,
                message_type: net_state,
                format: 32,
                data: [1, shaded, 0, 0, 0],
            },
        );
        assert_eq!(result, EventResult::Handled);
        assert!(h.windows.window(id).unwrap().is_shaded());
    }

    #[test]
    fn test_double_click_on_title_shades() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let title = h.windows.window(id).unwrap().frame_windows().title.unwrap();

        let mut press = pointer(title, 1, 0, (10, 10));
        send(&mut h, WindowEvent::ButtonPress(press));
        assert!(!h.windows.window(id).unwrap().is_shaded());
        assert!(h.windows.window(id).unwrap().is_focused());
        assert_eq!(h.screen.raised.last(), Some(&100));

        press.time += 100;
        send(&mut h, WindowEvent::ButtonPress(press));
        assert!(h.windows.window(id).unwrap().is_shaded());

        // a slow third click starts over
        press.time += 5000;
        send(&mut h, WindowEvent::ButtonPress(press));
        assert!(h.windows.window(id).unwrap().is_shaded());
    }

    #[test]
    fn test_control_click_shades_with_numlock() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let title = h.windows.window(id).unwrap().frame_windows().title.unwrap();
        // Mod2 (NumLock) must not matter
        let press = pointer(title, 1, CONTROL_MASK | (1 << 4), (10, 10));
        send(&mut h, WindowEvent::ButtonPress(press));
        assert!(h.windows.window(id).unwrap().is_shaded());
    }

    #[test]
    fn test_other_buttons() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let title = h.windows.window(id).unwrap().frame_windows().title.unwrap();

        send(&mut h, WindowEvent::ButtonPress(pointer(title, 2, 0, (10, 10))));
        assert_eq!(h.screen.lowered, vec![100]);
        send(&mut h, WindowEvent::ButtonPress(pointer(title, 3, 0, (15, 12))));
        assert_eq!(h.screen.menus, vec![(100, 15, 12)]);
    }

    #[test]
    fn test_plate_click_replays_pointer() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let plate = h.windows.window(id).unwrap().frame_windows().plate;
        send(&mut h, WindowEvent::ButtonPress(pointer(plate, 1, 0, (50, 50))));
        assert!(h.display.calls.contains(&Call::ReplayPointer));
        assert!(h.windows.window(id).unwrap().is_focused());
    }

    #[test]
    fn test_button_release_inside_runs_action() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let frame = h.windows.window(id).unwrap().frame_windows().clone();

        let maximize = frame.maximize_button.unwrap();
        send(&mut h, WindowEvent::ButtonPress(pointer(maximize, 3, 0, (0, 0))));
        send(&mut h, WindowEvent::ButtonRelease(pointer(maximize, 3, 0, (0, 0))));
        let w = h.windows.window(id).unwrap();
        assert!(w.ewmh().state.max_horz && !w.ewmh().state.max_vert);

        // released outside the button: nothing happens
        let iconify_button = frame.iconify_button.unwrap();
        let mut outside = pointer(iconify_button, 1, 0, (0, 0));
        outside.event_x = -5;
        send(&mut h, WindowEvent::ButtonRelease(outside));
        assert!(!h.windows.window(id).unwrap().is_iconic());

        send(&mut h, WindowEvent::ButtonRelease(pointer(iconify_button, 1, 0, (0, 0))));
        assert!(h.windows.window(id).unwrap().is_iconic());
    }

    #[test]
    fn test_title_drag_moves_window() {
        let mut h = Harness::new();
        h.settings.behavior.opaque_move = true;
        h.settings.behavior.edge_snap_threshold = 0;
        let id = shown(&mut h, 100, Geometry::new(100, 100, 300, 200));
        let title = h.windows.window(id).unwrap().frame_windows().title.unwrap();

        send(&mut h, WindowEvent::ButtonPress(pointer(title, 1, 0, (110, 105))));
        send(&mut h, WindowEvent::Motion(pointer(title, 0, BUTTON1_MASK, (210, 205))));
        assert!(h.windows.window(id).unwrap().is_moving());
        send(&mut h, WindowEvent::Motion(pointer(title, 0, BUTTON1_MASK, (310, 305))));
        send(&mut h, WindowEvent::ButtonRelease(pointer(title, 1, 0, (310, 305))));

        let w = h.windows.window(id).unwrap();
        assert!(!w.is_moving());
        assert_eq!((w.frame_rect.x, w.frame_rect.y), (300, 300));
    }

    #[test]
    fn test_grip_drag_resizes() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(100, 100, 300, 200));
        let grip = h.windows.window(id).unwrap().frame_windows().right_grip.unwrap();

        send(&mut h, WindowEvent::Motion(pointer(grip, 0, BUTTON1_MASK, (500, 400))));
        assert!(h.windows.window(id).unwrap().is_resizing());
        send(&mut h, WindowEvent::Motion(pointer(grip, 0, BUTTON1_MASK, (520, 410))));
        assert_eq!(
            h.screen.geometry,
            Some(GeometryFeedback::Size { width: 320, height: 210 })
        );
        send(&mut h, WindowEvent::ButtonRelease(pointer(grip, 1, 0, (520, 410))));

        let w = h.windows.window(id).unwrap();
        assert_eq!((w.client_rect.width, w.client_rect.height), (320, 210));
        assert_eq!(h.display.grab_depth, 0);
    }

    #[test]
    fn test_sloppy_enter_focuses_and_arms_raise() {
        let mut h = Harness::new();
        h.settings.behavior.sloppy_focus = true;
        h.settings.behavior.auto_raise = true;
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let frame = h.windows.window(id).unwrap().frame_window();

        send(&mut h, WindowEvent::Enter { window: frame, normal_mode: true });
        let w = h.windows.window(id).unwrap();
        assert!(w.is_focused());
        assert!(w.auto_raise.is_timing());

        send(&mut h, WindowEvent::Leave { window: frame });
        assert!(!h.windows.window(id).unwrap().auto_raise.is_timing());
    }

    #[test]
    fn test_enter_immediately_left_does_not_focus() {
        let mut h = Harness::new();
        h.settings.behavior.sloppy_focus = true;
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let frame = h.windows.window(id).unwrap().frame_window();
        h.display.pending_leaves.insert(frame, LeaveCrossing { into_inferior: false });

        send(&mut h, WindowEvent::Enter { window: frame, normal_mode: true });
        assert!(!h.windows.window(id).unwrap().is_focused());

        h.display.pending_leaves.insert(frame, LeaveCrossing { into_inferior: true });
        send(&mut h, WindowEvent::Enter { window: frame, normal_mode: true });
        assert!(h.windows.window(id).unwrap().is_focused());
    }

    #[test]
    fn test_enter_without_sloppy_focus() {
        let mut h = Harness::new();
        h.settings.behavior.sloppy_focus = false;
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let frame = h.windows.window(id).unwrap().frame_window();
        send(&mut h, WindowEvent::Enter { window: frame, normal_mode: true });
        assert!(!h.windows.window(id).unwrap().is_focused());
    }

    #[test]
    fn test_expose_redraws_part() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        let label = h.windows.window(id).unwrap().frame_windows().label.unwrap();
        h.renderer.drawn.clear();

        send(&mut h, WindowEvent::Expose { window: label, count: 1 });
        assert!(h.renderer.drawn.is_empty());
        send(&mut h, WindowEvent::Expose { window: label, count: 0 });
        assert_eq!(h.renderer.drawn, vec![(label, FramePart::Label)]);
    }

    #[test]
    fn test_focus_in_tracks_holder() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(0, 0, 300, 200));
        send(&mut h, WindowEvent::FocusIn(100));
        assert!(h.windows.window(id).unwrap().is_focused());
        let root = h.display.root;
        assert_eq!(send(&mut h, WindowEvent::FocusIn(root)), EventResult::Ignored);
        assert!(!h.windows.window(id).unwrap().is_focused());
    }

    #[test]
    fn test_destroy_mid_drag_cleans_up() {
        let mut h = Harness::new();
        let id = shown(&mut h, 100, Geometry::new(100, 100, 300, 200));
        let grip = h.windows.window(id).unwrap().frame_windows().right_grip.unwrap();
        send(&mut h, WindowEvent::Motion(pointer(grip, 0, BUTTON1_MASK, (500, 400))));
        assert_eq!(h.display.grab_depth, 1);

        let result = send(&mut h, WindowEvent::Destroy(100));
        let EventResult::Release { window, reparented_away } = result else {
            panic!("expected a release");
        };
        h.run(|windows, ctx| release_window(windows, ctx, window, reparented_away))
            .unwrap();
        assert!(h.windows.window(id).is_none());
        assert_eq!(h.display.grab_depth, 0);
        assert!(h.display.calls.contains(&Call::UngrabPointer));
        assert_eq!(h.screen.geometry, None);
    }

    #[test]
    fn test_dock_has_no_layer_change_by_client() {
        let mut h = Harness::new();
        h.display.add_client(100, Geometry::new(0, 0, 1024, 30));
        let (window_type, dock) = (h.atoms._NET_WM_WINDOW_TYPE, h.atoms._NET_WM_WINDOW_TYPE_DOCK);
        h.display.set_property(100, window_type, vec![dock]);
        let id = h.capture(100).unwrap();
        let (net_state, below) = (h.atoms._NET_WM_STATE, h.atoms._NET_WM_STATE_BELOW);
        send(
            &mut h,
            WindowEvent::ClientMessage {
                window: id,
                message_type: net_state,
                format: 32,
                data: [1, below, 0, 0, 0],
            },
        );
        assert_eq!(h.windows.window(id).unwrap().layer(), WindowLayer::Above);
    }
}
