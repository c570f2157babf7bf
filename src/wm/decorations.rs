//! Window decorations for Area WM
//!
//! Frame layout (frame, plate, titlebar with label and buttons, handle with
//! grips) and the pixmaps the renderer hands out for each part. Painting
//! itself is the renderer's business.

use std::collections::HashMap;

use tracing::trace;

use crate::shared::Geometry;
use crate::wm::client::ManagedWindow;
use crate::wm::client_flags::{Decorations, Functions};
use crate::wm::display::{ButtonGrab, CursorShape, WindowId, WindowRole};
use crate::wm::{Context, Result};

/// X modifier masks used by the frame's passive grabs
pub const MOD1_MASK: u16 = 1 << 3;
pub const CONTROL_MASK: u16 = 1 << 2;
/// Lock, Mod2 (NumLock) and Mod5 (ScrollLock) never change what a click means
pub const IGNORED_MODIFIERS: u16 = (1 << 1) | (1 << 4) | (1 << 7);

/// Themed element a pixmap is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleElement {
    Title,
    Label,
    Button,
    PressedButton,
    Handle,
    Grip,
}

/// Server-side pixmap handed out by the renderer
pub type PixmapId = u32;

/// Individually drawn piece of the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePart {
    Title,
    Label,
    IconifyButton,
    MaximizeButton,
    CloseButton,
    Handle,
    LeftGrip,
    RightGrip,
}

impl FramePart {
    pub fn is_button(self) -> bool {
        matches!(
            self,
            FramePart::IconifyButton | FramePart::MaximizeButton | FramePart::CloseButton
        )
    }

    fn element(self, pressed: bool) -> StyleElement {
        match self {
            FramePart::Title => StyleElement::Title,
            FramePart::Label => StyleElement::Label,
            _ if self.is_button() && pressed => StyleElement::PressedButton,
            FramePart::IconifyButton | FramePart::MaximizeButton | FramePart::CloseButton => {
                StyleElement::Button
            }
            FramePart::Handle => StyleElement::Handle,
            FramePart::LeftGrip | FramePart::RightGrip => StyleElement::Grip,
        }
    }
}

/// What the renderer needs to paint one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartLook<'a> {
    pub focused: bool,
    pub pressed: bool,
    /// Maximize button shows the restore glyph
    pub maximized: bool,
    pub pixmap: Option<PixmapId>,
    /// Label text, already ellipsized
    pub text: Option<&'a str>,
}

/// Paints decorations and owns the texture cache.
pub trait Renderer {
    /// Texture for `element` at the given size, shared through the cache.
    /// `None` means the element is a solid color.
    fn find_pixmap(
        &mut self,
        element: StyleElement,
        focused: bool,
        width: u32,
        height: u32,
    ) -> Option<PixmapId>;

    fn release_pixmap(&mut self, pixmap: PixmapId);

    fn draw_part(&mut self, window: WindowId, part: FramePart, look: &PartLook<'_>) -> Result<()>;

    /// XOR rubber band on the root; drawing the same rectangle twice erases it
    fn draw_outline(&mut self, rect: &Geometry) -> Result<()>;

    /// `text` shortened with an ellipsis to fit in `width` pixels
    fn ellide_text(&self, text: &str, width: u32) -> String;
}

/// Ids of the windows making up a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameWindows {
    pub frame: WindowId,
    pub plate: WindowId,
    pub title: Option<WindowId>,
    pub label: Option<WindowId>,
    pub iconify_button: Option<WindowId>,
    pub maximize_button: Option<WindowId>,
    pub close_button: Option<WindowId>,
    pub handle: Option<WindowId>,
    pub left_grip: Option<WindowId>,
    pub right_grip: Option<WindowId>,
    pub label_width: u32,
}

impl FrameWindows {
    pub fn window_of(&self, part: FramePart) -> Option<WindowId> {
        match part {
            FramePart::Title => self.title,
            FramePart::Label => self.label,
            FramePart::IconifyButton => self.iconify_button,
            FramePart::MaximizeButton => self.maximize_button,
            FramePart::CloseButton => self.close_button,
            FramePart::Handle => self.handle,
            FramePart::LeftGrip => self.left_grip,
            FramePart::RightGrip => self.right_grip,
        }
    }

    fn slot(&mut self, part: FramePart) -> &mut Option<WindowId> {
        match part {
            FramePart::Title => &mut self.title,
            FramePart::Label => &mut self.label,
            FramePart::IconifyButton => &mut self.iconify_button,
            FramePart::MaximizeButton => &mut self.maximize_button,
            FramePart::CloseButton => &mut self.close_button,
            FramePart::Handle => &mut self.handle,
            FramePart::LeftGrip => &mut self.left_grip,
            FramePart::RightGrip => &mut self.right_grip,
        }
    }

    pub fn part_of(&self, window: WindowId) -> Option<FramePart> {
        const PARTS: [FramePart; 8] = [
            FramePart::Title,
            FramePart::Label,
            FramePart::IconifyButton,
            FramePart::MaximizeButton,
            FramePart::CloseButton,
            FramePart::Handle,
            FramePart::LeftGrip,
            FramePart::RightGrip,
        ];
        PARTS
            .into_iter()
            .find(|&part| window != 0 && self.window_of(part) == Some(window))
    }

    pub fn contains(&self, window: WindowId) -> bool {
        window != 0 && (window == self.frame || window == self.plate || self.part_of(window).is_some())
    }
}

/// Pixmaps currently held for a frame, per element and focus
#[derive(Debug, Default)]
pub struct FramePixmaps {
    slots: HashMap<(StyleElement, bool), PixmapId>,
}

impl FramePixmaps {
    pub fn get(&self, element: StyleElement, focused: bool) -> Option<PixmapId> {
        self.slots.get(&(element, focused)).copied()
    }

    fn refresh(
        &mut self,
        renderer: &mut dyn Renderer,
        element: StyleElement,
        focused: bool,
        width: u32,
        height: u32,
    ) {
        let key = (element, focused);
        let new = renderer.find_pixmap(element, focused, width, height);
        let old = match new {
            Some(pixmap) => self.slots.insert(key, pixmap),
            None => self.slots.remove(&key),
        };
        if let Some(old) = old {
            if Some(old) != new {
                renderer.release_pixmap(old);
            }
        }
    }

    fn refresh_both(&mut self, renderer: &mut dyn Renderer, element: StyleElement, width: u32, height: u32) {
        self.refresh(renderer, element, true, width, height);
        self.refresh(renderer, element, false, width, height);
    }

    fn release(&mut self, renderer: &mut dyn Renderer, elements: &[StyleElement]) {
        self.slots.retain(|(element, _), pixmap| {
            if elements.contains(element) {
                renderer.release_pixmap(*pixmap);
                false
            } else {
                true
            }
        });
    }
}

const TITLE_ELEMENTS: [StyleElement; 4] = [
    StyleElement::Title,
    StyleElement::Label,
    StyleElement::Button,
    StyleElement::PressedButton,
];

impl ManagedWindow {
    fn create_child(ctx: &mut Context<'_>, parent: WindowId, cursor: Option<CursorShape>) -> Result<WindowId> {
        ctx.display
            .create_window(parent, Geometry::new(0, 0, 1, 1), 0, WindowRole::Decoration(cursor))
    }

    fn destroy_part(&mut self, ctx: &mut Context<'_>, part: FramePart) -> Result<()> {
        if let Some(window) = self.frame.slot(part).take() {
            ctx.display.destroy_window(window)?;
        }
        Ok(())
    }

    fn create_button(&mut self, ctx: &mut Context<'_>, part: FramePart) -> Result<WindowId> {
        if let Some(window) = self.frame.window_of(part) {
            return Ok(window);
        }
        let Some(title) = self.frame.title else {
            return Ok(0);
        };
        let window = Self::create_child(ctx, title, None)?;
        *self.frame.slot(part) = Some(window);
        Ok(window)
    }

    pub(crate) fn create_titlebar(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let title = Self::create_child(ctx, self.frame.frame, None)?;
        self.frame.title = Some(title);
        self.frame.label = Some(Self::create_child(ctx, title, None)?);

        if self.decorations.contains(Decorations::ICONIFY) {
            self.create_button(ctx, FramePart::IconifyButton)?;
        }
        if self.decorations.contains(Decorations::MAXIMIZE) {
            self.create_button(ctx, FramePart::MaximizeButton)?;
        }
        if self.decorations.contains(Decorations::CLOSE) {
            self.create_button(ctx, FramePart::CloseButton)?;
        }
        Ok(())
    }

    pub(crate) fn destroy_titlebar(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        for part in [
            FramePart::CloseButton,
            FramePart::IconifyButton,
            FramePart::MaximizeButton,
            FramePart::Label,
            FramePart::Title,
        ] {
            self.destroy_part(ctx, part)?;
        }
        self.pixmaps.release(ctx.renderer, &TITLE_ELEMENTS);
        Ok(())
    }

    pub(crate) fn create_handle(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        self.frame.handle = Some(Self::create_child(ctx, self.frame.frame, None)?);
        if self.decorations.contains(Decorations::GRIP) {
            self.create_grips(ctx)?;
        }
        Ok(())
    }

    pub(crate) fn destroy_handle(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        self.destroy_grips(ctx)?;
        self.pixmaps.release(ctx.renderer, &[StyleElement::Handle]);
        self.destroy_part(ctx, FramePart::Handle)
    }

    fn create_grips(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let Some(handle) = self.frame.handle else {
            return Ok(());
        };
        if self.frame.left_grip.is_none() {
            self.frame.left_grip = Some(Self::create_child(
                ctx,
                handle,
                Some(CursorShape::ResizeBottomLeft),
            )?);
        }
        if self.frame.right_grip.is_none() {
            self.frame.right_grip = Some(Self::create_child(
                ctx,
                handle,
                Some(CursorShape::ResizeBottomRight),
            )?);
        }
        Ok(())
    }

    fn destroy_grips(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        self.pixmaps.release(ctx.renderer, &[StyleElement::Grip]);
        self.destroy_part(ctx, FramePart::LeftGrip)?;
        self.destroy_part(ctx, FramePart::RightGrip)
    }

    /// Lay out every frame window from `frame_rect`, `client_rect` and the
    /// margin, creating or destroying parts the decorations call for.
    pub(crate) fn position_windows(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let style = ctx.settings.style;
        let bw = if self.decorations.contains(Decorations::BORDER) {
            style.frame_border_width
        } else {
            0
        };

        ctx.display.move_resize_window(self.frame.frame, self.frame_rect)?;
        ctx.display.move_resize_window(
            self.frame.plate,
            Geometry::new(
                self.margin.left as i32 - bw as i32,
                self.margin.top as i32 - bw as i32,
                self.client_rect.width,
                self.client_rect.height,
            ),
        )?;
        ctx.display.set_border_width(self.frame.plate, bw)?;
        ctx.display.move_resize_window(
            self.window,
            Geometry::new(0, 0, self.client_rect.width, self.client_rect.height),
        )?;
        self.client_rect.set_pos(
            self.frame_rect.x + self.margin.left as i32,
            self.frame_rect.y + self.margin.top as i32,
        );

        if self.decorations.contains(Decorations::TITLEBAR) {
            if self.frame.title.is_none() {
                self.create_titlebar(ctx)?;
            }
            if let Some(title) = self.frame.title {
                ctx.display.move_resize_window(
                    title,
                    Geometry::new(0, 0, self.frame_rect.width, style.title_height),
                )?;
                self.position_buttons(ctx, false)?;
                ctx.display.map_subwindows(title)?;
                ctx.display.map_window(title)?;
            }
        } else if self.frame.title.is_some() {
            self.destroy_titlebar(ctx)?;
        }

        if self.decorations.contains(Decorations::HANDLE) {
            if self.frame.handle.is_none() {
                self.create_handle(ctx)?;
            }
            if let Some(handle) = self.frame.handle {
                // client height so the handle stays put while shaded
                ctx.display.move_resize_window(
                    handle,
                    Geometry::new(
                        0,
                        (self.client_rect.height + self.margin.top) as i32,
                        self.frame_rect.width,
                        style.handle_height,
                    ),
                )?;

                if self.decorations.contains(Decorations::GRIP) {
                    self.create_grips(ctx)?;
                    if let (Some(left), Some(right)) = (self.frame.left_grip, self.frame.right_grip) {
                        ctx.display.move_resize_window(
                            left,
                            Geometry::new(0, 0, style.grip_width, style.handle_height),
                        )?;
                        let nx = self.frame_rect.width as i32 - style.grip_width as i32;
                        ctx.display.move_resize_window(
                            right,
                            Geometry::new(nx, 0, style.grip_width, style.handle_height),
                        )?;
                    }
                    ctx.display.map_subwindows(handle)?;
                } else {
                    self.destroy_grips(ctx)?;
                }
                ctx.display.map_window(handle)?;
            }
        } else if self.frame.handle.is_some() {
            self.destroy_handle(ctx)?;
        }
        Ok(())
    }

    /// Iconify on the left, close then maximize on the right, the label in
    /// whatever is left over.
    pub(crate) fn position_buttons(&mut self, ctx: &mut Context<'_>, redecorate_label: bool) -> Result<()> {
        let style = ctx.settings.style;
        let bw = (style.button_width + style.title_margin) as i32;
        let by = style.title_margin as i32;
        let button = style.button_width;
        let mut lx = by;
        let mut lw = self.frame_rect.width as i32 - by;

        if self.decorations.contains(Decorations::ICONIFY) {
            let window = self.create_button(ctx, FramePart::IconifyButton)?;
            ctx.display.move_resize_window(window, Geometry::new(by, by, button, button))?;
            ctx.display.map_window(window)?;
            lx += bw;
            lw -= bw;
        } else {
            self.destroy_part(ctx, FramePart::IconifyButton)?;
        }

        let mut bx = self.frame_rect.width as i32 - bw;

        for (decoration, part) in [
            (Decorations::CLOSE, FramePart::CloseButton),
            (Decorations::MAXIMIZE, FramePart::MaximizeButton),
        ] {
            if self.decorations.contains(decoration) {
                let window = self.create_button(ctx, part)?;
                ctx.display.move_resize_window(window, Geometry::new(bx, by, button, button))?;
                ctx.display.map_window(window)?;
                bx -= bw;
                lw -= bw;
            } else {
                self.destroy_part(ctx, part)?;
            }
        }

        if let Some(label) = self.frame.label {
            if lw > by {
                self.frame.label_width = (lw - by) as u32;
                ctx.display.move_resize_window(
                    label,
                    Geometry::new(lx, by, self.frame.label_width, style.label_height),
                )?;
                ctx.display.map_window(label)?;

                if redecorate_label {
                    self.pixmaps.refresh_both(
                        ctx.renderer,
                        StyleElement::Label,
                        self.frame.label_width,
                        style.label_height,
                    );
                }

                let ellided = ctx.renderer.ellide_text(&self.title, self.frame.label_width);
                if ellided != self.visible_title {
                    self.visible_title = ellided;
                    ctx.display.change_utf8_property(
                        self.window,
                        ctx.atoms._NET_WM_VISIBLE_NAME,
                        &self.visible_title,
                    )?;
                }
            } else {
                ctx.display.unmap_window(label)?;
            }
        }

        self.redraw_part(ctx, FramePart::Label, false)?;
        self.redraw_all_buttons(ctx)
    }

    /// Fetch pixmaps for every decorated part at its current size
    pub(crate) fn decorate(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let style = ctx.settings.style;
        let width = self.frame_rect.width;

        if self.decorations.contains(Decorations::TITLEBAR) {
            let button = style.button_width;
            self.pixmaps.refresh_both(ctx.renderer, StyleElement::Button, button, button);
            self.pixmaps
                .refresh(ctx.renderer, StyleElement::PressedButton, true, button, button);
            self.pixmaps
                .refresh_both(ctx.renderer, StyleElement::Title, width, style.title_height);
            self.pixmaps.refresh_both(
                ctx.renderer,
                StyleElement::Label,
                self.frame.label_width,
                style.label_height,
            );
        }

        if self.decorations.contains(Decorations::HANDLE) {
            self.pixmaps
                .refresh_both(ctx.renderer, StyleElement::Handle, width, style.handle_height);
        }

        if self.decorations.contains(Decorations::GRIP) {
            self.pixmaps.refresh_both(
                ctx.renderer,
                StyleElement::Grip,
                style.grip_width,
                style.handle_height,
            );
        }
        trace!("Decorated frame of window {}", self.window);
        Ok(())
    }

    pub(crate) fn redraw_part(&self, ctx: &mut Context<'_>, part: FramePart, pressed: bool) -> Result<()> {
        let Some(window) = self.frame.window_of(part) else {
            return Ok(());
        };
        let element = part.element(pressed);
        let focused = self.focused;
        let pixmap = match element {
            StyleElement::PressedButton => self.pixmaps.get(element, true),
            _ => self.pixmaps.get(element, focused),
        };
        let look = PartLook {
            focused,
            pressed,
            maximized: self.is_maximized(),
            pixmap,
            text: (part == FramePart::Label).then_some(self.visible_title.as_str()),
        };
        ctx.renderer.draw_part(window, part, &look)
    }

    pub(crate) fn redraw_all_buttons(&self, ctx: &mut Context<'_>) -> Result<()> {
        for part in [
            FramePart::IconifyButton,
            FramePart::MaximizeButton,
            FramePart::CloseButton,
        ] {
            self.redraw_part(ctx, part, false)?;
        }
        Ok(())
    }

    pub(crate) fn redraw_window_frame(&self, ctx: &mut Context<'_>) -> Result<()> {
        if self.decorations.contains(Decorations::TITLEBAR) {
            self.redraw_part(ctx, FramePart::Title, false)?;
            self.redraw_part(ctx, FramePart::Label, false)?;
            self.redraw_all_buttons(ctx)?;
        }
        if self.decorations.contains(Decorations::HANDLE) {
            self.redraw_part(ctx, FramePart::Handle, false)?;
            if self.decorations.contains(Decorations::GRIP) {
                self.redraw_part(ctx, FramePart::LeftGrip, false)?;
                self.redraw_part(ctx, FramePart::RightGrip, false)?;
            }
        }
        Ok(())
    }

    /// Passive grabs: click-to-focus on the plate, Mod1 drags on the frame
    pub(crate) fn grab_buttons(&self, ctx: &mut Context<'_>) -> Result<()> {
        let behavior = ctx.settings.behavior;
        if !behavior.sloppy_focus || behavior.click_raise {
            ctx.display.grab_button(
                self.frame.plate,
                ButtonGrab {
                    button: 1,
                    modifiers: 0,
                    sync: true,
                    cursor: None,
                },
            )?;
        }
        if self.functions.contains(Functions::MOVE) {
            ctx.display.grab_button(
                self.frame.frame,
                ButtonGrab {
                    button: 1,
                    modifiers: MOD1_MASK,
                    sync: false,
                    cursor: Some(CursorShape::Move),
                },
            )?;
        }
        if self.functions.contains(Functions::RESIZE) {
            ctx.display.grab_button(
                self.frame.frame,
                ButtonGrab {
                    button: 3,
                    modifiers: MOD1_MASK,
                    sync: false,
                    cursor: Some(CursorShape::ResizeBottomRight),
                },
            )?;
        }
        // Mod1 + middle lowers
        ctx.display.grab_button(
            self.frame.frame,
            ButtonGrab {
                button: 2,
                modifiers: MOD1_MASK,
                sync: false,
                cursor: None,
            },
        )
    }

    pub(crate) fn ungrab_buttons(&self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.display.ungrab_button(self.frame.plate, 1, 0)?;
        ctx.display.ungrab_button(self.frame.frame, 1, MOD1_MASK)?;
        ctx.display.ungrab_button(self.frame.frame, 2, MOD1_MASK)?;
        ctx.display.ungrab_button(self.frame.frame, 3, MOD1_MASK)
    }

    /// Tear down every frame window and give back all pixmaps
    pub(crate) fn destroy_frame(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if self.frame.title.is_some() {
            self.destroy_titlebar(ctx)?;
        }
        if self.frame.handle.is_some() {
            self.destroy_handle(ctx)?;
        }
        let all: Vec<StyleElement> = self.pixmaps.slots.keys().map(|(e, _)| *e).collect();
        self.pixmaps.release(ctx.renderer, &all);
        if self.frame.plate != 0 {
            ctx.display.destroy_window(self.frame.plate)?;
            self.frame.plate = 0;
        }
        if self.frame.frame != 0 {
            ctx.display.destroy_window(self.frame.frame)?;
            self.frame.frame = 0;
        }
        Ok(())
    }
}
