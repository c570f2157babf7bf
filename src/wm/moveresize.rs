//! MoveResize Module
//!
//! Pointer-driven moving and resizing of a frame. A move is opaque or
//! outlined depending on the `opaque_move` setting; a resize always drags
//! an outline with the server grabbed and applies the size on release.

use tracing::debug;

use crate::shared::{Corner, Geometry, Margin};
use crate::wm::client::ManagedWindow;
use crate::wm::display::CursorShape;
use crate::wm::hints::{NormalHints, SizeFlags};
use crate::wm::screen::GeometryFeedback;
use crate::wm::{Context, Result};

/// Interactive operation in progress on a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragSession {
    #[default]
    Idle,
    Moving {
        /// Frame rectangle the drag currently proposes
        changing: Geometry,
        /// Opaque moves configure the frame directly and hold no server grab
        opaque: bool,
    },
    Resizing {
        changing: Geometry,
        /// Dragging the left grip, so the right edge stays put
        left: bool,
    },
}

impl DragSession {
    /// Whether an outline is on screen and the server is grabbed
    fn has_outline(&self) -> bool {
        matches!(
            self,
            DragSession::Moving { opaque: false, .. } | DragSession::Resizing { .. }
        )
    }

    fn changing(&self) -> Option<Geometry> {
        match *self {
            DragSession::Idle => None,
            DragSession::Moving { changing, .. } | DragSession::Resizing { changing, .. } => Some(changing),
        }
    }
}

/// Snap `rect` to the edges of `area` when within `threshold` pixels.
///
/// Each axis snaps to the nearer edge; on a tie the left/top edge wins.
pub fn collision_adjust(rect: &mut Geometry, area: &Geometry, threshold: i32) {
    if threshold <= 0 {
        return;
    }

    let d_left = (rect.x - area.x).abs();
    let d_right = (rect.right() - area.right()).abs();
    if d_left < threshold && d_left <= d_right {
        rect.x = area.x;
    } else if d_right < threshold {
        rect.x = area.right() - rect.width as i32 + 1;
    }

    let d_top = (rect.y - area.y).abs();
    let d_bottom = (rect.bottom() - area.bottom()).abs();
    if d_top < threshold && d_top <= d_bottom {
        rect.y = area.y;
    } else if d_bottom < threshold {
        rect.y = area.bottom() - rect.height as i32 + 1;
    }
}

/// Client size of `frame` in resize increments above the base size
pub fn size_feedback(frame: &Geometry, margin: &Margin, hints: &NormalHints) -> GeometryFeedback {
    let mut width = frame.width.saturating_sub(margin.horizontal());
    let mut height = frame.height.saturating_sub(margin.vertical());

    if hints.flags.contains(SizeFlags::P_RESIZE_INC) {
        if hints.flags.intersects(SizeFlags::P_MIN_SIZE | SizeFlags::P_BASE_SIZE) {
            let (base_width, base_height) = hints.base_size();
            width = width.saturating_sub(base_width);
            height = height.saturating_sub(base_height);
        }
        width /= hints.width_inc.max(1);
        height /= hints.height_inc.max(1);
    }
    GeometryFeedback::Size { width, height }
}

impl ManagedWindow {
    /// Smallest frame that still shows one client pixel
    fn min_frame_size(&self) -> (u32, u32) {
        (
            self.margin.horizontal() + 1,
            self.margin.vertical() + 1,
        )
    }

    /// Grab the server for an outlined drag; gives the pointer back if that fails
    fn grab_server_or_release(ctx: &mut Context<'_>) -> Result<()> {
        if let Err(e) = ctx.display.grab_server() {
            ctx.display.ungrab_pointer()?;
            return Err(e);
        }
        Ok(())
    }

    /// Start moving; `grab_x`/`grab_y` already hold the pointer offset
    pub(crate) fn begin_move(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if !ctx.display.grab_pointer(self.frame.frame, CursorShape::Move)? {
            debug!("Pointer busy, not moving window {}", self.window);
            return Ok(());
        }

        let opaque = ctx.settings.behavior.opaque_move;
        if !opaque {
            Self::grab_server_or_release(ctx)?;
        }
        let changing = self.frame_rect;
        self.drag = DragSession::Moving { changing, opaque };

        if !opaque {
            ctx.screen.show_geometry(GeometryFeedback::Position {
                x: changing.x,
                y: changing.y,
            });
            ctx.renderer.draw_outline(&changing)?;
        }
        debug!("Moving window {}", self.window);
        Ok(())
    }

    pub(crate) fn update_move(&mut self, ctx: &mut Context<'_>, root_x: i32, root_y: i32) -> Result<()> {
        let DragSession::Moving { changing, opaque } = self.drag else {
            return Ok(());
        };

        let mut rect = Geometry::new(
            root_x - self.grab_x,
            root_y - self.grab_y,
            changing.width,
            changing.height,
        );
        let snap = ctx.settings.behavior.edge_snap_threshold;
        collision_adjust(&mut rect, &ctx.screen.available_area(), snap);
        if !ctx.settings.behavior.full_maximization {
            collision_adjust(&mut rect, &ctx.screen.screen_rect(), snap);
        }

        if rect == changing {
            return Ok(());
        }
        self.drag = DragSession::Moving { changing: rect, opaque };

        if opaque {
            self.configure_rect(ctx, rect)
        } else {
            // the outline is drawn inverted; drawing it again erases it
            ctx.renderer.draw_outline(&changing)?;
            ctx.renderer.draw_outline(&rect)?;
            ctx.screen.show_geometry(GeometryFeedback::Position { x: rect.x, y: rect.y });
            Ok(())
        }
    }

    /// Start resizing from a grip (or with Mod1 + button 3).
    /// `grab_x`/`grab_y` are set to the pointer's root position.
    pub(crate) fn begin_resize(&mut self, ctx: &mut Context<'_>, left: bool, root_x: i32, root_y: i32) -> Result<()> {
        let cursor = if left {
            CursorShape::ResizeBottomLeft
        } else {
            CursorShape::ResizeBottomRight
        };
        if !ctx.display.grab_pointer(self.frame.frame, cursor)? {
            debug!("Pointer busy, not resizing window {}", self.window);
            return Ok(());
        }
        Self::grab_server_or_release(ctx)?;

        self.grab_x = root_x;
        self.grab_y = root_y;
        self.drag = DragSession::Resizing {
            changing: self.frame_rect,
            left,
        };

        // resizing a maximized window starts from its maximized size
        if self.is_maximized() {
            self.maximize(ctx, 0)?;
        }

        let anchor = if left { Corner::TopRight } else { Corner::TopLeft };
        let changing = self.constrain(self.frame_rect, anchor);
        self.drag = DragSession::Resizing { changing, left };

        ctx.renderer.draw_outline(&changing)?;
        ctx.screen
            .show_geometry(size_feedback(&changing, &self.margin, &self.normal_hints));
        debug!("Resizing window {}", self.window);
        Ok(())
    }

    pub(crate) fn update_resize(&mut self, ctx: &mut Context<'_>, root_x: i32, root_y: i32) -> Result<()> {
        let DragSession::Resizing { changing, left } = self.drag else {
            return Ok(());
        };

        let frame = self.frame_rect;
        let (min_width, min_height) = self.min_frame_size();
        let height = (root_y - self.grab_y + frame.height as i32).max(min_height as i32);

        let (rect, anchor) = if left {
            let new_left = (frame.x + root_x - self.grab_x).min(frame.right() - min_width as i32 + 1);
            let mut rect = frame;
            rect.set_coords(new_left, frame.y, frame.right(), frame.y + height - 1);
            (rect, Corner::TopRight)
        } else {
            let width = (root_x - self.grab_x + frame.width as i32).max(min_width as i32);
            (
                Geometry::new(frame.x, frame.y, width as u32, height as u32),
                Corner::TopLeft,
            )
        };
        let rect = self.constrain(rect, anchor);

        if rect == changing {
            return Ok(());
        }
        self.drag = DragSession::Resizing { changing: rect, left };

        ctx.renderer.draw_outline(&changing)?;
        ctx.renderer.draw_outline(&rect)?;
        ctx.screen
            .show_geometry(size_feedback(&rect, &self.margin, &self.normal_hints));
        Ok(())
    }

    /// Button released: apply the dragged rectangle and end the session
    pub(crate) fn finish_drag(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let Some(changing) = self.drag.changing() else {
            return Ok(());
        };
        self.end_session(ctx)?;

        debug!("Finished dragging window {} to {:?}", self.window, changing);
        // also tells the client its final position after an opaque move
        self.configure_rect(ctx, changing)
    }

    /// Drop an interactive operation without applying it
    pub(crate) fn abort_drag(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if self.drag.changing().is_none() {
            return Ok(());
        }
        let ended = self.end_session(ctx);
        debug!("Aborted drag of window {}", self.window);
        ended
    }

    /// Erase the outline and release the server and pointer grabs. Every
    /// step runs even when an earlier one fails; the first error is returned.
    fn end_session(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let session = std::mem::take(&mut self.drag);
        let mut result = Ok(());

        if let Some(changing) = session.changing().filter(|_| session.has_outline()) {
            result = ctx.renderer.draw_outline(&changing);
            let ungrabbed = ctx.display.ungrab_server();
            result = result.and(ungrabbed);
        }
        ctx.screen.hide_geometry();
        let released = ctx.display.ungrab_pointer();
        result.and(released)
    }
}
