//! Hints Module
//!
//! Reads and decodes the client-set properties (WM_NORMAL_HINTS, WM_HINTS,
//! _MOTIF_WM_HINTS, WM_PROTOCOLS, EWMH type/state/desktop, struts, names)
//! into typed records. Every reader returns a fully-populated record: a
//! missing or malformed property yields the documented defaults.

use bitflags::bitflags;
use tracing::trace;
use x11rb::protocol::xproto::{Atom, AtomEnum};

use crate::shared::Geometry;
use crate::wm::client_flags::{Decorations, Functions, WindowType, WmState};
use crate::wm::display::{DisplayConnection, WindowId};
use crate::wm::ewmh::{predefined, Atoms, ALL_WORKSPACES};
use crate::wm::transients::TransientFor;

/// Title used when the client sets none
pub const DEFAULT_TITLE: &str = "Unnamed";

/// Largest width or height the protocol can express
pub const MAX_WINDOW_SIZE: u32 = u16::MAX as u32;

bitflags! {
    /// `WM_NORMAL_HINTS` flags field
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SizeFlags: u32 {
        const US_POSITION  = 1 << 0;
        const US_SIZE      = 1 << 1;
        const P_POSITION   = 1 << 2;
        const P_SIZE       = 1 << 3;
        const P_MIN_SIZE   = 1 << 4;
        const P_MAX_SIZE   = 1 << 5;
        const P_RESIZE_INC = 1 << 6;
        const P_ASPECT     = 1 << 7;
        const P_BASE_SIZE  = 1 << 8;
        const P_WIN_GRAVITY = 1 << 9;
    }
}

/// Window gravity, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    Forget,
    #[default]
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
    Static,
}

impl Gravity {
    pub fn from_wire(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Forget,
            1 => Self::NorthWest,
            2 => Self::North,
            3 => Self::NorthEast,
            4 => Self::West,
            5 => Self::Center,
            6 => Self::East,
            7 => Self::SouthWest,
            8 => Self::South,
            9 => Self::SouthEast,
            10 => Self::Static,
            _ => return None,
        })
    }
}

/// Size hints (`WM_NORMAL_HINTS`), with defaults filled in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalHints {
    pub flags: SizeFlags,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub width_inc: u32,
    pub height_inc: u32,
    pub min_aspect_x: u32,
    pub min_aspect_y: u32,
    pub max_aspect_x: u32,
    pub max_aspect_y: u32,
    pub base_width: u32,
    pub base_height: u32,
    pub gravity: Gravity,
}

impl NormalHints {
    /// Hints of a client that sets none. The maximum is the full screen,
    /// not the strut-reduced area, so it stays valid when struts change.
    pub fn defaults(screen: &Geometry) -> Self {
        Self {
            flags: SizeFlags::empty(),
            min_width: 1,
            min_height: 1,
            max_width: screen.width,
            max_height: screen.height,
            width_inc: 1,
            height_inc: 1,
            min_aspect_x: 1,
            min_aspect_y: 1,
            max_aspect_x: 1,
            max_aspect_y: 1,
            base_width: 0,
            base_height: 0,
            gravity: Gravity::NorthWest,
        }
    }

    /// Decode the raw property. Pre-ICCCM clients send 15 values (no base
    /// size or gravity); anything shorter is ignored.
    pub fn decode(data: &[u32], screen: &Geometry) -> Self {
        let mut hints = Self::defaults(screen);
        if data.len() < 15 {
            return hints;
        }

        let mut flags = SizeFlags::from_bits_truncate(data[0]);
        // window sizes are CARD16 on the wire; anything larger is nonsense
        let size = |i: usize| (data[i] as i32).clamp(0, MAX_WINDOW_SIZE as i32) as u32;

        if flags.contains(SizeFlags::P_MIN_SIZE) {
            if size(5) > 0 {
                hints.min_width = size(5);
            }
            if size(6) > 0 {
                hints.min_height = size(6);
            }
        }

        if flags.contains(SizeFlags::P_MAX_SIZE) {
            hints.max_width = size(7).max(hints.min_width);
            hints.max_height = size(8).max(hints.min_height);
        }

        if flags.contains(SizeFlags::P_RESIZE_INC) {
            // a zero or negative increment would stall the solver
            hints.width_inc = size(9).max(1);
            hints.height_inc = size(10).max(1);
        }

        if flags.contains(SizeFlags::P_ASPECT) {
            if data[11..15].iter().all(|&v| v as i32 > 0) {
                hints.min_aspect_x = data[11];
                hints.min_aspect_y = data[12];
                hints.max_aspect_x = data[13];
                hints.max_aspect_y = data[14];
            } else {
                flags.remove(SizeFlags::P_ASPECT);
            }
        }

        if data.len() >= 18 {
            if flags.contains(SizeFlags::P_BASE_SIZE) {
                hints.base_width = size(15);
                hints.base_height = size(16);
            }
            if flags.contains(SizeFlags::P_WIN_GRAVITY) {
                hints.gravity = Gravity::from_wire(data[17]).unwrap_or_default();
            }
        } else {
            flags.remove(SizeFlags::P_BASE_SIZE | SizeFlags::P_WIN_GRAVITY);
        }

        hints.flags = flags;
        hints
    }

    /// Both limits set and the maximum not larger than the minimum
    pub fn is_fixed_size(&self) -> bool {
        self.flags
            .contains(SizeFlags::P_MIN_SIZE | SizeFlags::P_MAX_SIZE)
            && self.max_width <= self.min_width
            && self.max_height <= self.min_height
    }

    /// Size the increment grid starts from
    pub fn base_size(&self) -> (u32, u32) {
        let w = if self.base_width != 0 { self.base_width } else { self.min_width };
        let h = if self.base_height != 0 { self.base_height } else { self.min_height };
        (w, h)
    }
}

/// `WM_HINTS`, with defaults filled in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WmHints {
    pub accept_focus: bool,
    pub initial_state: WmState,
    pub window_group: Option<WindowId>,
}

impl Default for WmHints {
    fn default() -> Self {
        Self {
            accept_focus: false,
            initial_state: WmState::Normal,
            window_group: None,
        }
    }
}

impl WmHints {
    const INPUT_HINT: u32 = 1 << 0;
    const STATE_HINT: u32 = 1 << 1;
    const WINDOW_GROUP_HINT: u32 = 1 << 6;

    /// A group pointing at the root window is meaningless and dropped.
    pub fn decode(data: &[u32], root: WindowId) -> Self {
        let mut hints = Self::default();
        let Some(&flags) = data.first() else {
            return hints;
        };

        if flags & Self::INPUT_HINT != 0 {
            if let Some(&input) = data.get(1) {
                hints.accept_focus = input != 0;
            }
        }
        if flags & Self::STATE_HINT != 0 {
            if let Some(state) = data.get(2).and_then(|&s| WmState::from_wire(s)) {
                hints.initial_state = state;
            }
        }
        if flags & Self::WINDOW_GROUP_HINT != 0 {
            if let Some(&group) = data.get(8) {
                if group != 0 && group != root {
                    hints.window_group = Some(group);
                }
            }
        }
        hints
    }
}

/// Explicit Motif override of decorations and functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotifHints {
    pub decorations: Decorations,
    pub functions: Functions,
}

impl Default for MotifHints {
    fn default() -> Self {
        Self {
            decorations: Decorations::all(),
            functions: Functions::all(),
        }
    }
}

impl MotifHints {
    const HINTS_FUNCTIONS: u32 = 1 << 0;
    const HINTS_DECORATIONS: u32 = 1 << 1;

    const FUNC_ALL: u32 = 1 << 0;
    const FUNC_RESIZE: u32 = 1 << 1;
    const FUNC_MOVE: u32 = 1 << 2;
    const FUNC_MINIMIZE: u32 = 1 << 3;
    const FUNC_MAXIMIZE: u32 = 1 << 4;
    const FUNC_CLOSE: u32 = 1 << 5;

    const DECOR_ALL: u32 = 1 << 0;
    const DECOR_BORDER: u32 = 1 << 1;
    const DECOR_RESIZEH: u32 = 1 << 2;
    const DECOR_TITLE: u32 = 1 << 3;
    const DECOR_MINIMIZE: u32 = 1 << 5;
    const DECOR_MAXIMIZE: u32 = 1 << 6;

    /// Only the first three fields (flags, functions, decorations) matter.
    pub fn decode(data: &[u32]) -> Self {
        let mut motif = Self::default();
        if data.len() < 3 {
            return motif;
        }
        let (flags, funcs, decor) = (data[0], data[1], data[2]);

        if flags & Self::HINTS_FUNCTIONS != 0 && funcs & Self::FUNC_ALL == 0 {
            let mut f = Functions::empty();
            if funcs & Self::FUNC_RESIZE != 0 {
                f |= Functions::RESIZE;
            }
            if funcs & Self::FUNC_MOVE != 0 {
                f |= Functions::MOVE;
            }
            if funcs & Self::FUNC_MINIMIZE != 0 {
                f |= Functions::ICONIFY;
            }
            if funcs & Self::FUNC_MAXIMIZE != 0 {
                f |= Functions::MAXIMIZE;
            }
            if funcs & Self::FUNC_CLOSE != 0 {
                f |= Functions::CLOSE;
            }
            motif.functions = f;
        }

        if flags & Self::HINTS_DECORATIONS != 0 && decor & Self::DECOR_ALL == 0 {
            let mut d = Decorations::empty();
            if decor & Self::DECOR_BORDER != 0 {
                d |= Decorations::BORDER;
            }
            if decor & Self::DECOR_RESIZEH != 0 {
                d |= Decorations::HANDLE | Decorations::GRIP;
            }
            if decor & Self::DECOR_TITLE != 0 {
                d |= Decorations::TITLEBAR | Decorations::CLOSE;
            }
            if decor & Self::DECOR_MINIMIZE != 0 {
                d |= Decorations::ICONIFY;
            }
            if decor & Self::DECOR_MAXIMIZE != 0 {
                d |= Decorations::MAXIMIZE;
            }
            motif.decorations = d;
        }

        motif
    }
}

/// `WM_PROTOCOLS` entries the window manager acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WmProtocols {
    pub delete_window: bool,
    pub take_focus: bool,
}

impl WmProtocols {
    pub fn decode(data: &[u32], atoms: &Atoms) -> Self {
        Self {
            delete_window: data.contains(&atoms.WM_DELETE_WINDOW),
            take_focus: data.contains(&atoms.WM_TAKE_FOCUS),
        }
    }
}

/// Boolean `_NET_WM_STATE` flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetState {
    pub modal: bool,
    pub max_vert: bool,
    pub max_horz: bool,
    pub shaded: bool,
    pub skip_taskbar: bool,
    pub skip_pager: bool,
    pub hidden: bool,
    pub fullscreen: bool,
    pub above: bool,
    pub below: bool,
}

impl NetState {
    /// `_NET_WM_STATE_HIDDEN` is owned by the window manager and ignored.
    pub fn decode(data: &[u32], atoms: &Atoms) -> Self {
        let mut state = Self::default();
        for &atom in data {
            if atom == atoms._NET_WM_STATE_MODAL {
                state.modal = true;
            } else if atom == atoms._NET_WM_STATE_MAXIMIZED_VERT {
                state.max_vert = true;
            } else if atom == atoms._NET_WM_STATE_MAXIMIZED_HORZ {
                state.max_horz = true;
            } else if atom == atoms._NET_WM_STATE_SHADED {
                state.shaded = true;
            } else if atom == atoms._NET_WM_STATE_SKIP_TASKBAR {
                state.skip_taskbar = true;
            } else if atom == atoms._NET_WM_STATE_SKIP_PAGER {
                state.skip_pager = true;
            } else if atom == atoms._NET_WM_STATE_FULLSCREEN {
                state.fullscreen = true;
            } else if atom == atoms._NET_WM_STATE_ABOVE {
                state.above = true;
            } else if atom == atoms._NET_WM_STATE_BELOW {
                state.below = true;
            }
        }
        state
    }

    pub fn is_maximized(&self) -> bool {
        self.max_horz || self.max_vert
    }
}

/// Extended hints: window type, workspace and state flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EwmhHints {
    pub window_type: WindowType,
    pub workspace: u32,
    pub state: NetState,
}

impl EwmhHints {
    /// The first recognised type wins. Desktop and Dock windows live on
    /// every workspace; others default to the current one.
    pub fn decode(
        types: &[u32],
        states: &[u32],
        desktop: Option<u32>,
        current_workspace: u32,
        atoms: &Atoms,
    ) -> Self {
        let window_type = types
            .iter()
            .find_map(|&atom| WindowType::from_atom(atom, atoms))
            .unwrap_or_default();

        let workspace = match window_type {
            WindowType::Desktop | WindowType::Dock => ALL_WORKSPACES,
            _ => desktop.unwrap_or(current_workspace),
        };

        Self {
            window_type,
            workspace,
            state: NetState::decode(states, atoms),
        }
    }
}

/// Screen-edge space reserved by a window (`_NET_WM_STRUT[_PARTIAL]`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Strut {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
    pub left_start: u32,
    pub left_end: u32,
    pub right_start: u32,
    pub right_end: u32,
    pub top_start: u32,
    pub top_end: u32,
    pub bottom_start: u32,
    pub bottom_end: u32,
}

impl Strut {
    /// Decode either the 12-value partial form or the 4-value legacy form.
    /// The legacy form spans the whole edge.
    pub fn decode(data: &[u32], screen: &Geometry) -> Option<Self> {
        if data.len() >= 12 {
            return Some(Self {
                left: data[0],
                right: data[1],
                top: data[2],
                bottom: data[3],
                left_start: data[4],
                left_end: data[5],
                right_start: data[6],
                right_end: data[7],
                top_start: data[8],
                top_end: data[9],
                bottom_start: data[10],
                bottom_end: data[11],
            });
        }
        if data.len() >= 4 {
            let w = screen.width.saturating_sub(1);
            let h = screen.height.saturating_sub(1);
            return Some(Self {
                left: data[0],
                right: data[1],
                top: data[2],
                bottom: data[3],
                left_end: h,
                right_end: h,
                top_end: w,
                bottom_end: w,
                ..Self::default()
            });
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.left == 0 && self.right == 0 && self.top == 0 && self.bottom == 0
    }
}

/// Resolve a raw `WM_TRANSIENT_FOR` value. Pointing at itself means not
/// transient; pointing at nothing or the root means a group transient
/// (only meaningful when the window has a group).
pub fn decode_transient_for(
    value: Option<WindowId>,
    window: WindowId,
    root: WindowId,
    group: Option<WindowId>,
) -> Option<TransientFor> {
    let target = value?;
    if target == window {
        return None;
    }
    if target == 0 || target == root {
        return group.map(TransientFor::Group);
    }
    if Some(target) == group {
        return Some(TransientFor::Group(target));
    }
    Some(TransientFor::Window(target))
}

/// Hints manager
pub struct HintsManager;

impl HintsManager {
    fn fetch32(
        display: &mut dyn DisplayConnection,
        window: WindowId,
        property: Atom,
        type_: Atom,
    ) -> Option<Vec<u32>> {
        match display.get_property32(window, property, type_) {
            Ok(value) => value,
            Err(e) => {
                trace!("Reading property {} of window {} failed: {}", property, window, e);
                None
            }
        }
    }

    fn fetch_text(display: &mut dyn DisplayConnection, window: WindowId, property: Atom) -> Option<String> {
        match display.get_text_property(window, property) {
            Ok(value) => value.filter(|s| !s.is_empty()),
            Err(e) => {
                trace!("Reading text {} of window {} failed: {}", property, window, e);
                None
            }
        }
    }

    pub fn read_normal_hints(
        display: &mut dyn DisplayConnection,
        window: WindowId,
        screen: &Geometry,
    ) -> NormalHints {
        let normal_hints = predefined(AtomEnum::WM_NORMAL_HINTS);
        let size_hints = predefined(AtomEnum::WM_SIZE_HINTS);
        match Self::fetch32(display, window, normal_hints, size_hints) {
            Some(data) => NormalHints::decode(&data, screen),
            None => NormalHints::defaults(screen),
        }
    }

    pub fn read_wm_hints(display: &mut dyn DisplayConnection, window: WindowId) -> WmHints {
        let root = display.root();
        let wm_hints = predefined(AtomEnum::WM_HINTS);
        Self::fetch32(display, window, wm_hints, wm_hints)
            .map(|data| WmHints::decode(&data, root))
            .unwrap_or_default()
    }

    pub fn read_motif_hints(
        display: &mut dyn DisplayConnection,
        atoms: &Atoms,
        window: WindowId,
    ) -> MotifHints {
        Self::fetch32(display, window, atoms._MOTIF_WM_HINTS, atoms._MOTIF_WM_HINTS)
            .map(|data| MotifHints::decode(&data))
            .unwrap_or_default()
    }

    pub fn read_protocols(
        display: &mut dyn DisplayConnection,
        atoms: &Atoms,
        window: WindowId,
    ) -> WmProtocols {
        Self::fetch32(display, window, atoms.WM_PROTOCOLS, predefined(AtomEnum::ATOM))
            .map(|data| WmProtocols::decode(&data, atoms))
            .unwrap_or_default()
    }

    pub fn read_ewmh(
        display: &mut dyn DisplayConnection,
        atoms: &Atoms,
        window: WindowId,
        current_workspace: u32,
    ) -> EwmhHints {
        let atom_type = predefined(AtomEnum::ATOM);
        let types = Self::fetch32(display, window, atoms._NET_WM_WINDOW_TYPE, atom_type)
            .unwrap_or_default();
        let states = Self::fetch32(display, window, atoms._NET_WM_STATE, atom_type)
            .unwrap_or_default();
        let desktop = Self::fetch32(
            display,
            window,
            atoms._NET_WM_DESKTOP,
            predefined(AtomEnum::CARDINAL),
        )
        .and_then(|data| data.first().copied());

        EwmhHints::decode(&types, &states, desktop, current_workspace, atoms)
    }

    /// Partial strut first, legacy strut as fallback
    pub fn read_strut(
        display: &mut dyn DisplayConnection,
        atoms: &Atoms,
        window: WindowId,
        screen: &Geometry,
    ) -> Option<Strut> {
        let cardinal = predefined(AtomEnum::CARDINAL);
        Self::fetch32(display, window, atoms._NET_WM_STRUT_PARTIAL, cardinal)
            .and_then(|data| Strut::decode(&data, screen))
            .or_else(|| {
                Self::fetch32(display, window, atoms._NET_WM_STRUT, cardinal)
                    .and_then(|data| Strut::decode(&data, screen))
            })
    }

    pub fn read_transient_for(
        display: &mut dyn DisplayConnection,
        window: WindowId,
        group: Option<WindowId>,
    ) -> Option<TransientFor> {
        let root = display.root();
        let value = Self::fetch32(
            display,
            window,
            predefined(AtomEnum::WM_TRANSIENT_FOR),
            predefined(AtomEnum::WINDOW),
        )
        .and_then(|data| data.first().copied());
        decode_transient_for(value, window, root, group)
    }

    /// Previously stored `WM_STATE`, kept across window manager restarts
    pub fn read_wm_state(
        display: &mut dyn DisplayConnection,
        atoms: &Atoms,
        window: WindowId,
    ) -> Option<WmState> {
        Self::fetch32(display, window, atoms.WM_STATE, atoms.WM_STATE)
            .and_then(|data| data.first().copied())
            .and_then(WmState::from_wire)
    }

    /// `_NET_WM_NAME`, then `WM_NAME`, then a placeholder
    pub fn read_name(display: &mut dyn DisplayConnection, atoms: &Atoms, window: WindowId) -> String {
        Self::fetch_text(display, window, atoms._NET_WM_NAME)
            .or_else(|| Self::fetch_text(display, window, predefined(AtomEnum::WM_NAME)))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string())
    }

    /// `_NET_WM_ICON_NAME`, then `WM_ICON_NAME`; empty when neither is set
    pub fn read_icon_name(
        display: &mut dyn DisplayConnection,
        atoms: &Atoms,
        window: WindowId,
    ) -> String {
        Self::fetch_text(display, window, atoms._NET_WM_ICON_NAME)
            .or_else(|| Self::fetch_text(display, window, predefined(AtomEnum::WM_ICON_NAME)))
            .unwrap_or_default()
    }
}
