//! NetWM Module
//!
//! Client messages a managed window (or a pager acting on it) sends to the
//! window manager: ICCCM `WM_CHANGE_STATE` and the EWMH requests.

use tracing::debug;
use x11rb::protocol::xproto::Atom;

use crate::wm::client_flags::{Functions, WindowLayer, WmState};
use crate::wm::display::WindowId;
use crate::wm::ewmh::{ALL_WORKSPACES, Atoms};
use crate::wm::events::GeometryRequest;
use crate::wm::hints::Gravity;
use crate::wm::state::{activate, iconify, show};
use crate::wm::transients::WindowLookup;
use crate::wm::{Context, Result};

/// `_NET_WM_STATE` action in `data[0]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    Remove,
    Add,
    Toggle,
}

impl StateAction {
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Remove),
            1 => Some(Self::Add),
            2 => Some(Self::Toggle),
            _ => None,
        }
    }

    /// New value of a flag currently set to `current`
    pub fn apply(self, current: bool) -> bool {
        match self {
            Self::Remove => false,
            Self::Add => true,
            Self::Toggle => !current,
        }
    }
}

/// A decoded client message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRequest {
    /// `WM_CHANGE_STATE`
    ChangeState(WmState),
    /// `_NET_ACTIVE_WINDOW`
    Activate,
    /// `_NET_CLOSE_WINDOW`
    Close,
    /// `_NET_MOVERESIZE_WINDOW`; `gravity` of `None` means the window's own
    MoveResize {
        gravity: Option<Gravity>,
        geometry: GeometryRequest,
    },
    /// `_NET_WM_DESKTOP`
    SetWorkspace(u32),
    /// `_NET_WM_STATE` for one or two properties (0 for none)
    ChangeNetState {
        action: StateAction,
        first: Atom,
        second: Atom,
    },
}

impl ClientRequest {
    /// Decode a client message. Anything not 32-bit formatted or not
    /// understood yields `None`.
    pub fn decode(message_type: Atom, format: u8, data: [u32; 5], atoms: &Atoms) -> Option<Self> {
        if format != 32 {
            return None;
        }

        if message_type == atoms.WM_CHANGE_STATE {
            WmState::from_wire(data[0]).map(Self::ChangeState)
        } else if message_type == atoms._NET_ACTIVE_WINDOW {
            Some(Self::Activate)
        } else if message_type == atoms._NET_CLOSE_WINDOW {
            Some(Self::Close)
        } else if message_type == atoms._NET_MOVERESIZE_WINDOW {
            Some(Self::decode_moveresize(data))
        } else if message_type == atoms._NET_WM_DESKTOP {
            Some(Self::SetWorkspace(data[0]))
        } else if message_type == atoms._NET_WM_STATE {
            StateAction::from_wire(data[0]).map(|action| Self::ChangeNetState {
                action,
                first: data[1],
                second: data[2],
            })
        } else {
            None
        }
    }

    fn decode_moveresize(data: [u32; 5]) -> Self {
        let gravity = match data[0] & 0xff {
            0 => None,
            value => Gravity::from_wire(value),
        };
        let mut mask = (data[0] >> 8) & 0xf;
        // no value bits: the request carries all four
        if mask == 0 {
            mask = 0xf;
        }
        let pick = |bit: u32, value: u32| (mask & bit != 0).then_some(value);

        Self::MoveResize {
            gravity,
            geometry: GeometryRequest {
                x: pick(1, data[1]).map(|v| v as i32),
                y: pick(2, data[2]).map(|v| v as i32),
                width: pick(4, data[3]),
                height: pick(8, data[4]),
                border_width: None,
            },
        }
    }
}

/// Act on a client message addressed to managed window `id`
pub fn handle_client_message(
    windows: &mut dyn WindowLookup,
    ctx: &mut Context<'_>,
    id: WindowId,
    request: ClientRequest,
) -> Result<()> {
    debug!("Client message for window {}: {:?}", id, request);

    match request {
        ClientRequest::ChangeState(WmState::Iconic) => iconify(windows, ctx, id),
        ClientRequest::ChangeState(WmState::Normal) => activate(windows, ctx, id),
        ClientRequest::ChangeState(WmState::Withdrawn) => Ok(()),
        ClientRequest::Activate => activate(windows, ctx, id),
        ClientRequest::Close => match windows.window(id) {
            Some(w) => w.close(ctx),
            None => Ok(()),
        },
        ClientRequest::MoveResize { gravity, geometry } => match windows.window_mut(id) {
            Some(w) => {
                let gravity = gravity.unwrap_or(w.normal_hints.gravity);
                w.request_geometry(ctx, &geometry, gravity)
            }
            None => Ok(()),
        },
        ClientRequest::SetWorkspace(workspace) => set_workspace(windows, ctx, id, workspace),
        ClientRequest::ChangeNetState { action, first, second } => {
            change_net_state(windows, ctx, id, action, [first, second])
        }
    }
}

fn set_workspace(
    windows: &mut dyn WindowLookup,
    ctx: &mut Context<'_>,
    id: WindowId,
    workspace: u32,
) -> Result<()> {
    let Some(w) = windows.window_mut(id) else {
        return Ok(());
    };
    if !w.has_function(Functions::CHANGE_WORKSPACE) {
        debug!("Ignoring workspace change for window {}", id);
        return Ok(());
    }
    if workspace != ALL_WORKSPACES && workspace >= ctx.screen.workspace_count() {
        debug!("Ignoring workspace {} for window {}: no such workspace", workspace, id);
        return Ok(());
    }

    w.set_workspace(ctx, workspace)?;
    ctx.screen.workspace_changed(id, workspace);

    if w.on_current_workspace(ctx) {
        if !w.iconic {
            show(windows, ctx, id)?;
        }
        Ok(())
    } else {
        w.hide(ctx)
    }
}

fn change_net_state(
    windows: &mut dyn WindowLookup,
    ctx: &mut Context<'_>,
    id: WindowId,
    action: StateAction,
    properties: [Atom; 2],
) -> Result<()> {
    let Some(w) = windows.window_mut(id) else {
        return Ok(());
    };
    let atoms = ctx.atoms;
    let names = |atom: Atom| properties.contains(&atom);

    if names(atoms._NET_WM_STATE_MODAL) {
        if w.is_transient() {
            w.ewmh.state.modal = action.apply(w.ewmh.state.modal);
        } else {
            debug!("Ignoring modal state for non-transient window {}", id);
        }
    }

    if names(atoms._NET_WM_STATE_MAXIMIZED_HORZ) || names(atoms._NET_WM_STATE_MAXIMIZED_VERT) {
        let state = w.ewmh.state;
        let horizontal = if names(atoms._NET_WM_STATE_MAXIMIZED_HORZ) {
            action.apply(state.max_horz)
        } else {
            state.max_horz
        };
        let vertical = if names(atoms._NET_WM_STATE_MAXIMIZED_VERT) {
            action.apply(state.max_vert)
        } else {
            state.max_vert
        };

        if (horizontal, vertical) != (state.max_horz, state.max_vert) {
            if w.is_maximized() {
                w.maximize(ctx, 0)?;
            }
            let button = match (horizontal, vertical) {
                (true, true) => Some(1),
                (false, true) => Some(2),
                (true, false) => Some(3),
                (false, false) => None,
            };
            if let Some(button) = button {
                w.maximize(ctx, button)?;
            }
        }
    }

    if names(atoms._NET_WM_STATE_SHADED) {
        let shaded = action.apply(w.is_shaded());
        w.set_shaded(ctx, shaded)?;
    }

    if names(atoms._NET_WM_STATE_SKIP_TASKBAR) {
        w.ewmh.state.skip_taskbar = action.apply(w.ewmh.state.skip_taskbar);
    }
    if names(atoms._NET_WM_STATE_SKIP_PAGER) {
        w.ewmh.state.skip_pager = action.apply(w.ewmh.state.skip_pager);
    }

    if names(atoms._NET_WM_STATE_FULLSCREEN) {
        let fullscreen = action.apply(w.is_fullscreen());
        w.set_fullscreen(ctx, fullscreen)?;
    }

    for (atom, layer) in [
        (atoms._NET_WM_STATE_ABOVE, WindowLayer::Above),
        (atoms._NET_WM_STATE_BELOW, WindowLayer::Below),
    ] {
        if !names(atom) {
            continue;
        }
        if !w.has_function(Functions::CHANGE_LAYER) {
            debug!("Ignoring layer change for window {}", id);
            continue;
        }
        let target = if action.apply(w.layer == layer) {
            layer
        } else if w.layer == layer {
            WindowLayer::Normal
        } else {
            w.layer
        };
        if target != w.layer {
            w.change_layer(ctx, target);
        }
    }

    // hidden is owned by the window manager and never taken from clients
    let state = w.current_state;
    w.set_state(ctx, state)
}
