//! X11 socket readiness
//!
//! A blocking mio poll on the connection's file descriptor runs on tokio's
//! blocking pool and wakes the event loop through a `Notify` whenever the
//! server has sent something.

use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{Notify, oneshot};
use tracing::{info, warn};
use x11rb::connection::Connection;
use x11rb::rust_connection::RustConnection;

const SOCKET_TOKEN: mio::Token = mio::Token(0);

/// Wakes the event loop when the X socket becomes readable
pub struct X11EventStream {
    conn: Arc<RustConnection>,
    notify: Arc<Notify>,
    /// Dropping the stream closes this and stops the poll thread
    _poll_guard: oneshot::Receiver<()>,
}

impl X11EventStream {
    pub fn new(conn: Arc<RustConnection>) -> Result<Self> {
        let fd = conn.stream().as_raw_fd();
        let notify = Arc::new(Notify::new());
        let poll_notify = notify.clone();

        let (guard, poll_guard) = oneshot::channel::<()>();
        let mut poll = mio::Poll::new().context("Failed to create mio Poll")?;
        let mut events = mio::Events::with_capacity(1);

        poll.registry()
            .register(&mut mio::unix::SourceFd(&fd), SOCKET_TOKEN, mio::Interest::READABLE)
            .context("Failed to register the X socket with mio")?;

        // the timeout bounds how long a dropped stream keeps the thread alive
        let timeout = Duration::from_millis(100);
        tokio::task::spawn_blocking(move || {
            loop {
                if guard.is_closed() {
                    info!("X socket poll thread stopping");
                    return;
                }

                if let Err(err) = poll.poll(&mut events, Some(timeout)) {
                    warn!("X socket poll failed: {:?}", err);
                    continue;
                }

                if events.iter().any(|event| event.token() == SOCKET_TOKEN) {
                    poll_notify.notify_one();
                }
            }
        });

        Ok(Self {
            conn,
            notify,
            _poll_guard: poll_guard,
        })
    }

    /// Resolves once the socket has been seen readable since the last wait.
    /// Events x11rb already buffered while waiting for a reply do not wake
    /// this; drain the connection before waiting.
    pub async fn wait_readable(&self) {
        self.notify.notified().await;
    }

    /// Send every queued request
    pub fn flush(&self) -> Result<()> {
        self.conn.flush().context("Failed to flush X requests")?;
        Ok(())
    }
}
