//! area-window: X11 driver for the area window control unit
//!
//! Takes over window management on the default display, frames every
//! top-level client and feeds display events to the control unit.

mod config;
mod desktop;
mod x11_async;
mod x11_display;
mod x11_render;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    self, AtomEnum, ChangeWindowAttributesAux, ConfigWindow, ConfigureRequestEvent,
    ConfigureWindowAux, ConnectionExt as _, CreateWindowAux, EventMask, MapState, NotifyDetail,
    NotifyMode, Window, WindowClass,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use area_window::shared::Geometry;
use area_window::wm::client_flags::WmState;
use area_window::wm::events::{GeometryRequest, PointerEvent, StackMode};
use area_window::wm::{
    Atoms, CaptureError, Context, DisplayConnection, EventResult, Settings, WindowEvent,
    WindowLookup, WindowTable, WmError, capture, dispatch, focus, map_new_window,
    release_window,
};

use crate::config::Config;
use crate::desktop::Desktop;
use crate::x11_async::X11EventStream;
use crate::x11_display::X11Display;
use crate::x11_render::X11Renderer;

/// Bit set in `response_type` for events sent with SendEvent
const SYNTHETIC_EVENT: u8 = 0x80;

struct AreaWindow {
    conn: Arc<RustConnection>,
    root: Window,
    check_window: Window,
    x11_stream: X11EventStream,
    display: X11Display,
    desktop: Desktop,
    renderer: X11Renderer,
    atoms: Atoms,
    settings: Settings,
    windows: WindowTable,
}

impl AreaWindow {
    fn new(config: &Config) -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(None).context("Failed to connect to X11 server")?;
        let conn = Arc::new(conn);

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let screen_rect = Geometry::new(
            0,
            0,
            screen.width_in_pixels.into(),
            screen.height_in_pixels.into(),
        );
        let (black, white) = (screen.black_pixel, screen.white_pixel);
        info!(
            "Connected to screen {} ({}x{})",
            screen_num, screen_rect.width, screen_rect.height
        );

        // only one client may redirect the root's substructure
        conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new().event_mask(
                EventMask::SUBSTRUCTURE_REDIRECT
                    | EventMask::SUBSTRUCTURE_NOTIFY
                    | EventMask::PROPERTY_CHANGE,
            ),
        )?
        .check()
        .context("Another window manager is already running")?;

        let atoms = Atoms::new(conn.as_ref())?
            .reply()
            .context("Failed to intern atoms")?;
        let check_window = Self::advertise(&conn, root, &atoms)?;

        let display = X11Display::new(conn.clone(), root, atoms)
            .context("Failed to set up the display connection")?;
        let desktop = Desktop::new(
            conn.clone(),
            root,
            atoms,
            screen_rect,
            config.desktop.workspaces,
        );
        let renderer = X11Renderer::new(conn.clone(), root, black, white)
            .context("Failed to set up the decoration renderer")?;
        let x11_stream = X11EventStream::new(conn.clone())?;

        let mut app = Self {
            conn,
            root,
            check_window,
            x11_stream,
            display,
            desktop,
            renderer,
            atoms,
            settings: config.settings(),
            windows: WindowTable::new(),
        };
        app.scan_existing_windows()?;
        Ok(app)
    }

    /// EWMH supporting-WM check window and `_NET_SUPPORTED`
    fn advertise(conn: &RustConnection, root: Window, atoms: &Atoms) -> Result<Window> {
        let check_window = conn.generate_id()?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            check_window,
            root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new().override_redirect(1),
        )?;

        for window in [root, check_window] {
            conn.change_property32(
                xproto::PropMode::REPLACE,
                window,
                atoms._NET_SUPPORTING_WM_CHECK,
                AtomEnum::WINDOW,
                &[check_window],
            )?;
        }
        conn.change_property8(
            xproto::PropMode::REPLACE,
            check_window,
            atoms._NET_WM_NAME,
            atoms.UTF8_STRING,
            b"area-window",
        )?;
        conn.change_property32(
            xproto::PropMode::REPLACE,
            root,
            atoms._NET_SUPPORTED,
            AtomEnum::ATOM,
            &atoms.supported(),
        )?;
        conn.flush()?;
        Ok(check_window)
    }

    /// Collaborators for one call into the control unit
    fn split(&mut self, shutting_down: bool) -> (&mut WindowTable, Context<'_>) {
        (
            &mut self.windows,
            Context {
                display: &mut self.display,
                screen: &mut self.desktop,
                renderer: &mut self.renderer,
                atoms: &self.atoms,
                settings: &self.settings,
                shutting_down,
            },
        )
    }

    /// Manage windows that were mapped (or iconified by a previous window
    /// manager) before we started
    fn scan_existing_windows(&mut self) -> Result<()> {
        let tree = self.conn.query_tree(self.root)?.reply()?;
        info!("Scanning {} existing windows", tree.children.len());

        for window in tree.children {
            if window == self.check_window {
                continue;
            }
            let Ok(attributes) = self.conn.get_window_attributes(window)?.reply() else {
                continue;
            };
            if attributes.override_redirect {
                trace!("Skipping override-redirect window {}", window);
                continue;
            }
            let iconic = self
                .display
                .get_property32(window, self.atoms.WM_STATE, self.atoms.WM_STATE)?
                .and_then(|state| state.first().copied())
                == Some(WmState::Iconic.to_wire());
            if attributes.map_state == MapState::VIEWABLE || iconic {
                if let Err(e) = self.manage(window) {
                    warn!("Failed to manage existing window {}: {}", window, e);
                }
            }
        }
        Ok(())
    }

    /// Capture a new client and map it according to its initial state
    fn manage(&mut self, window: Window) -> area_window::wm::Result<()> {
        let captured = {
            let (windows, mut ctx) = self.split(false);
            capture(windows, &mut ctx, window)
        };
        let id = match captured {
            Ok(id) => id,
            Err(WmError::Capture(e @ (CaptureError::NotFound(_) | CaptureError::OverrideRedirect(_)))) => {
                debug!("Not managing window: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if let Some(w) = self.windows.window(id) {
            self.desktop.track(id, w.frame_windows().frame);
        }

        let (windows, mut ctx) = self.split(false);
        map_new_window(windows, &mut ctx, id)
    }

    fn release(&mut self, window: Window, reparented_away: bool) -> area_window::wm::Result<()> {
        {
            let (windows, mut ctx) = self.split(false);
            release_window(windows, &mut ctx, window, reparented_away)?;
        }
        self.desktop.forget(window);
        Ok(())
    }

    fn handle_event(&mut self, event: Event) -> area_window::wm::Result<()> {
        if let Some(time) = event_time(&event) {
            self.display.note_time(time);
        }

        let Some(window_event) = translate(&event, self.root) else {
            if let Event::Error(e) = &event {
                debug!("X error: {:?}", e);
            }
            return Ok(());
        };

        let result = {
            let (windows, mut ctx) = self.split(false);
            dispatch(windows, &mut ctx, &window_event, Instant::now())?
        };

        match result {
            EventResult::Handled => Ok(()),
            EventResult::Release {
                window,
                reparented_away,
            } => self.release(window, reparented_away),
            EventResult::Ignored => self.handle_unmanaged(&event),
        }
    }

    /// Default handling for events about windows we do not manage
    fn handle_unmanaged(&mut self, event: &Event) -> area_window::wm::Result<()> {
        match event {
            Event::MapRequest(e) => self.manage(e.window),
            Event::ConfigureRequest(e) => {
                trace!("Passing through configure request for window {}", e.window);
                self.conn
                    .configure_window(e.window, &ConfigureWindowAux::from_configure_request(e))?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn fire_auto_raise(&mut self) {
        let (windows, mut ctx) = self.split(false);
        focus::fire_auto_raise(windows, &mut ctx, Instant::now());
    }

    /// Give every client back to the root, keeping its state for the next
    /// window manager
    fn shutdown(&mut self) -> Result<()> {
        info!("Releasing {} windows", self.windows.ids().len());
        for window in self.windows.ids() {
            let (windows, mut ctx) = self.split(true);
            if let Err(e) = release_window(windows, &mut ctx, window, false) {
                warn!("Failed to release window {}: {}", window, e);
            }
        }
        self.conn.destroy_window(self.check_window)?;
        self.conn.flush()?;
        Ok(())
    }

    async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        info!("Starting main event loop");

        loop {
            self.x11_stream.flush()?;

            // x11rb may have read events while waiting for a reply; those
            // never wake the socket poll, so drain before waiting
            self.display.fill_queue().context("X11 connection lost")?;
            if let Some(event) = self.display.next_event() {
                match self.handle_event(event) {
                    Ok(()) => {}
                    Err(WmError::Connection(e)) => {
                        return Err(e).context("X11 connection lost");
                    }
                    Err(e) => error!("Error handling event: {}", e),
                }
                continue;
            }

            let auto_raise = focus::next_auto_raise(&self.windows);

            tokio::select! {
                () = self.x11_stream.wait_readable() => {}

                () = async {
                    match auto_raise {
                        Some(deadline) => {
                            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
                        }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    self.fire_auto_raise();
                }

                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, cleaning up...");
                    return self.shutdown();
                }
            }
        }
    }
}

/// Server time carried by an event, if any
fn event_time(event: &Event) -> Option<u32> {
    match event {
        Event::ButtonPress(e) | Event::ButtonRelease(e) => Some(e.time),
        Event::MotionNotify(e) => Some(e.time),
        Event::EnterNotify(e) | Event::LeaveNotify(e) => Some(e.time),
        Event::PropertyNotify(e) => Some(e.time),
        _ => None,
    }
}

fn geometry_request(e: &ConfigureRequestEvent) -> GeometryRequest {
    let has = |field: ConfigWindow| e.value_mask.contains(field);
    GeometryRequest {
        x: has(ConfigWindow::X).then_some(e.x.into()),
        y: has(ConfigWindow::Y).then_some(e.y.into()),
        width: has(ConfigWindow::WIDTH).then_some(e.width.into()),
        height: has(ConfigWindow::HEIGHT).then_some(e.height.into()),
        border_width: has(ConfigWindow::BORDER_WIDTH).then_some(e.border_width.into()),
    }
}

fn stack_mode(e: &ConfigureRequestEvent) -> Option<StackMode> {
    if !e.value_mask.contains(ConfigWindow::STACK_MODE) {
        return None;
    }
    Some(match e.stack_mode {
        xproto::StackMode::BELOW => StackMode::Below,
        xproto::StackMode::TOP_IF => StackMode::TopIf,
        xproto::StackMode::BOTTOM_IF => StackMode::BottomIf,
        xproto::StackMode::OPPOSITE => StackMode::Opposite,
        _ => StackMode::Above,
    })
}

/// Pointer fields shared by button and motion events
macro_rules! pointer_event {
    ($e:expr, $button:expr) => {
        PointerEvent {
            window: $e.event,
            root_x: $e.root_x.into(),
            root_y: $e.root_y.into(),
            event_x: $e.event_x.into(),
            event_y: $e.event_y.into(),
            button: $button,
            state: $e.state.into(),
            time: $e.time,
        }
    };
}

/// Turn a protocol event into the control unit's vocabulary. Events it has
/// no use for yield `None`.
fn translate(event: &Event, root: Window) -> Option<WindowEvent> {
    Some(match event {
        Event::MapRequest(e) => WindowEvent::MapRequest(e.window),
        // the client's own selection, or the ICCCM synthetic withdraw on
        // the root; anything else is a frame or a reparent
        Event::UnmapNotify(e)
            if e.event == e.window
                || (e.event == root && e.response_type & SYNTHETIC_EVENT != 0) =>
        {
            WindowEvent::Unmap(e.window)
        }
        Event::DestroyNotify(e) => WindowEvent::Destroy(e.window),
        Event::ReparentNotify(e) => WindowEvent::Reparent {
            window: e.window,
            parent: e.parent,
        },
        Event::ConfigureRequest(e) => WindowEvent::ConfigureRequest {
            window: e.window,
            request: geometry_request(e),
            stack_mode: stack_mode(e),
        },
        Event::PropertyNotify(e) => WindowEvent::PropertyChange {
            window: e.window,
            atom: e.atom,
        },
        Event::ClientMessage(e) => WindowEvent::ClientMessage {
            window: e.window,
            message_type: e.type_,
            format: e.format,
            data: e.data.as_data32(),
        },
        Event::ButtonPress(e) => WindowEvent::ButtonPress(pointer_event!(e, e.detail)),
        Event::ButtonRelease(e) => WindowEvent::ButtonRelease(pointer_event!(e, e.detail)),
        Event::MotionNotify(e) => WindowEvent::Motion(pointer_event!(e, 0)),
        Event::EnterNotify(e) => WindowEvent::Enter {
            window: e.event,
            normal_mode: e.mode == NotifyMode::NORMAL,
        },
        Event::LeaveNotify(e) => WindowEvent::Leave { window: e.event },
        Event::Expose(e) => WindowEvent::Expose {
            window: e.window,
            count: e.count,
        },
        Event::FocusIn(e) if e.mode == NotifyMode::NORMAL && e.detail != NotifyDetail::POINTER => {
            WindowEvent::FocusIn(e.event)
        }
        _ => return None,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "area_window=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting area window manager");

    let config = Config::load().context("Failed to load configuration")?;

    // Setup signal handlers for graceful shutdown
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            }
            let _ = shutdown_tx.send(()).await;
        });
    }

    let app = AreaWindow::new(&config)?;
    if let Err(e) = app.run(shutdown_rx).await {
        error!("Window manager error: {:#}", e);
        return Err(e);
    }

    info!("Window manager stopped");
    Ok(())
}
