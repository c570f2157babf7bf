//! Solid-color decoration renderer
//!
//! Paints every frame part by setting its background pixel from the Nord
//! palette, draws titles with the core "fixed" font and the rubber band
//! outline with an XOR GC on the root window. No textures are used, so
//! the pixmap cache is always empty.

use std::sync::Arc;

use tracing::trace;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use area_window::shared::Geometry;
use area_window::wm::decorations::{FramePart, PartLook, PixmapId, Renderer, StyleElement};
use area_window::wm::display::WindowId;
use area_window::wm::Result;

// Nord Theme Colors
pub const FRAME_COLOR: u32 = 0x2e3440; // Polar Night Darkest
const TITLE_COLOR: u32 = 0x3b4252; // Polar Night Lighter
const TITLE_FOCUSED_COLOR: u32 = 0x434c5e;
const LABEL_COLOR: u32 = 0x3b4252;
const LABEL_FOCUSED_COLOR: u32 = 0x5e81ac; // Frost Blue
const BUTTON_COLOR: u32 = 0x4c566a;
const PRESSED_COLOR: u32 = 0x88c0d0; // Frost Light
const CLOSE_COLOR: u32 = 0xbf616a; // Aurora Red
const MAXIMIZE_COLOR: u32 = 0xa3be8c; // Aurora Green
const ICONIFY_COLOR: u32 = 0xebcb8b; // Aurora Yellow
const GRIP_COLOR: u32 = 0x5e81ac;
const TEXT_COLOR: u32 = 0xeceff4; // Snow Storm

/// Cell size of the "fixed" font
const CHAR_WIDTH: u32 = 6;
const FONT_ASCENT: i32 = 10;
const FONT_DESCENT: i32 = 3;
const TEXT_INDENT: i16 = 4;
/// Gap between a button's edge and its glyph
const GLYPH_INSET: i16 = 4;

pub struct X11Renderer {
    conn: Arc<RustConnection>,
    root: Window,
    text_gc: Gcontext,
    outline_gc: Gcontext,
}

impl X11Renderer {
    pub fn new(conn: Arc<RustConnection>, root: Window, black: u32, white: u32) -> Result<Self> {
        let font = conn.generate_id()?;
        conn.open_font(font, b"fixed")?;

        let text_gc = conn.generate_id()?;
        conn.create_gc(
            text_gc,
            root,
            &CreateGCAux::new()
                .foreground(TEXT_COLOR)
                .background(FRAME_COLOR)
                .font(font)
                .line_width(2)
                .graphics_exposures(0),
        )?;
        conn.close_font(font)?;

        let outline_gc = conn.generate_id()?;
        conn.create_gc(
            outline_gc,
            root,
            &CreateGCAux::new()
                .function(GX::XOR)
                .foreground(black ^ white)
                .subwindow_mode(SubwindowMode::INCLUDE_INFERIORS)
                .line_width(2),
        )?;

        Ok(Self {
            conn,
            root,
            text_gc,
            outline_gc,
        })
    }

    fn size_of(&self, window: WindowId) -> Result<(i16, i16)> {
        let geometry = self.conn.get_geometry(window)?.reply()?;
        Ok((geometry.width as i16, geometry.height as i16))
    }

    fn draw_label(&self, window: WindowId, text: &str, background: u32) -> Result<()> {
        let (_, height) = self.size_of(window)?;
        let baseline = (i32::from(height) + FONT_ASCENT - FONT_DESCENT) / 2;
        self.conn
            .change_gc(self.text_gc, &ChangeGCAux::new().background(background))?;
        self.conn.image_text8(
            window,
            self.text_gc,
            TEXT_INDENT,
            baseline as i16,
            &latin1(text),
        )?;
        Ok(())
    }

    fn draw_glyph(&self, window: WindowId, part: FramePart, maximized: bool) -> Result<()> {
        let (width, height) = self.size_of(window)?;
        let (left, top) = (GLYPH_INSET, GLYPH_INSET);
        let (right, bottom) = (width - GLYPH_INSET - 1, height - GLYPH_INSET - 1);
        if right <= left || bottom <= top {
            return Ok(());
        }

        let segment = |x1, y1, x2, y2| Segment { x1, y1, x2, y2 };
        let segments = match part {
            FramePart::IconifyButton => vec![segment(left, bottom, right, bottom)],
            FramePart::CloseButton => vec![
                segment(left, top, right, bottom),
                segment(left, bottom, right, top),
            ],
            FramePart::MaximizeButton => {
                let mut box_segments = vec![
                    segment(left, top, right, top),
                    segment(left, top, left, bottom),
                    segment(left, bottom, right, bottom),
                    segment(right, top, right, bottom),
                ];
                if maximized {
                    // restore glyph: a second, offset frame behind the first
                    box_segments.push(segment(left + 2, top - 2, right + 2, top - 2));
                    box_segments.push(segment(right + 2, top - 2, right + 2, bottom - 2));
                }
                box_segments
            }
            _ => return Ok(()),
        };
        self.conn
            .change_gc(self.text_gc, &ChangeGCAux::new().foreground(FRAME_COLOR))?;
        self.conn.poly_segment(window, self.text_gc, &segments)?;
        self.conn
            .change_gc(self.text_gc, &ChangeGCAux::new().foreground(TEXT_COLOR))?;
        Ok(())
    }
}

/// Background pixel of a frame part
fn part_color(part: FramePart, look: &PartLook<'_>) -> u32 {
    match part {
        _ if part.is_button() && look.pressed => PRESSED_COLOR,
        _ if part.is_button() && !look.focused => BUTTON_COLOR,
        FramePart::CloseButton => CLOSE_COLOR,
        FramePart::MaximizeButton => MAXIMIZE_COLOR,
        FramePart::IconifyButton => ICONIFY_COLOR,
        FramePart::Title | FramePart::Handle if look.focused => TITLE_FOCUSED_COLOR,
        FramePart::Title | FramePart::Handle => TITLE_COLOR,
        FramePart::Label if look.focused => LABEL_FOCUSED_COLOR,
        FramePart::Label => LABEL_COLOR,
        FramePart::LeftGrip | FramePart::RightGrip if look.focused => GRIP_COLOR,
        FramePart::LeftGrip | FramePart::RightGrip => BUTTON_COLOR,
    }
}

/// The core font is Latin-1; anything outside it shows as '?'.
/// ImageText8 takes at most 255 bytes.
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .take(255)
        .collect()
}

/// `text` shortened with "..." so that it fits in `width` pixels
fn ellide(text: &str, width: u32) -> String {
    let fits = (width / CHAR_WIDTH) as usize;
    let length = text.chars().count();
    if length <= fits {
        return text.to_string();
    }
    if fits <= 3 {
        return ".".repeat(fits);
    }
    let mut shortened: String = text.chars().take(fits - 3).collect();
    shortened.push_str("...");
    shortened
}

impl Renderer for X11Renderer {
    fn find_pixmap(
        &mut self,
        _element: StyleElement,
        _focused: bool,
        _width: u32,
        _height: u32,
    ) -> Option<PixmapId> {
        None
    }

    fn release_pixmap(&mut self, pixmap: PixmapId) {
        trace!("Ignoring release of pixmap {}", pixmap);
    }

    fn draw_part(&mut self, window: WindowId, part: FramePart, look: &PartLook<'_>) -> Result<()> {
        let color = part_color(part, look);
        self.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new().background_pixel(color),
        )?;
        self.conn.clear_area(false, window, 0, 0, 0, 0)?;

        if let Some(text) = look.text {
            self.draw_label(window, text, color)?;
        }
        if part.is_button() {
            self.draw_glyph(window, part, look.maximized)?;
        }
        Ok(())
    }

    fn draw_outline(&mut self, rect: &Geometry) -> Result<()> {
        let rectangle = Rectangle {
            x: rect.x.clamp(i16::MIN.into(), i16::MAX.into()) as i16,
            y: rect.y.clamp(i16::MIN.into(), i16::MAX.into()) as i16,
            width: rect.width.saturating_sub(1).min(u16::MAX.into()) as u16,
            height: rect.height.saturating_sub(1).min(u16::MAX.into()) as u16,
        };
        self.conn
            .poly_rectangle(self.root, self.outline_gc, &[rectangle])?;
        self.conn.flush()?;
        Ok(())
    }

    fn ellide_text(&self, text: &str, width: u32) -> String {
        ellide(text, width)
    }
}
