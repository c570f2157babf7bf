//! Geometry constraint solver
//!
//! Normalizes proposed frame rectangles against the client's size hints and
//! translates between client and frame positions according to gravity.

use crate::shared::{Corner, Geometry, Margin};
use crate::wm::client_flags::Decorations;
use crate::wm::hints::{Gravity, NormalHints, SizeFlags};
use crate::wm::settings::StyleMetrics;

/// Margin the frame adds around the client for the given decorations.
pub fn frame_margin(decorations: Decorations, style: &StyleMetrics) -> Margin {
    let bw = if decorations.contains(Decorations::BORDER) {
        style.frame_border_width
    } else {
        0
    };
    let mut margin = Margin::uniform(bw);
    if decorations.contains(Decorations::TITLEBAR) {
        margin.top = margin.top + style.title_height - bw.min(style.title_height);
    }
    if decorations.contains(Decorations::HANDLE) {
        margin.bottom = margin.bottom + style.handle_height - bw.min(style.handle_height);
    }
    margin
}

/// Constrain `changing` (a proposed frame rectangle) to the size hints,
/// keeping `anchor` of the `current` frame fixed.
///
/// Order: strip margin, clamp to min/max, snap to the increment grid, fix
/// the aspect ratio, re-add margin, re-anchor. Snapping happens before the
/// aspect step, and the aspect deltas are truncated exactly as written.
pub fn constrain(
    changing: Geometry,
    current: &Geometry,
    margin: &Margin,
    hints: &NormalHints,
    anchor: Corner,
) -> Geometry {
    let mut rect = changing;
    rect.set_coords(
        changing.x + margin.left as i32,
        changing.y + margin.top as i32,
        changing.right() - margin.right as i32,
        changing.bottom() - margin.bottom as i32,
    );

    let (base_width, base_height) = hints.base_size();
    let mut dw = rect.width.clamp(hints.min_width, hints.max_width.max(hints.min_width));
    let mut dh = rect.height.clamp(hints.min_height, hints.max_height.max(hints.min_height));

    if hints.flags.contains(SizeFlags::P_RESIZE_INC) {
        dw = (dw.saturating_sub(base_width) / hints.width_inc) * hints.width_inc + base_width;
        dh = (dh.saturating_sub(base_height) / hints.height_inc) * hints.height_inc + base_height;
    }

    if hints.flags.contains(SizeFlags::P_ASPECT) {
        (dw, dh) = fix_aspect(dw, dh, hints);
    }

    rect.set_size(dw, dh);

    let mut out = Geometry::default();
    out.set_coords(
        rect.x - margin.left as i32,
        rect.y - margin.top as i32,
        rect.right() + margin.right as i32,
        rect.bottom() + margin.bottom as i32,
    );

    let dx = current.right() - out.right();
    let dy = current.bottom() - out.bottom();
    match anchor {
        Corner::TopLeft => {}
        Corner::TopRight => out.x += dx,
        Corner::BottomLeft => out.y += dy,
        Corner::BottomRight => {
            out.x += dx;
            out.y += dy;
        }
    }
    out
}

/// minX/minY <= w/h <= maxX/maxY, compared by cross-multiplication.
/// An adjustment that would leave [min, max] is skipped.
fn fix_aspect(mut dw: u32, mut dh: u32, hints: &NormalHints) -> (u32, u32) {
    let min_x = hints.min_aspect_x as u64;
    let min_y = hints.min_aspect_y as u64;
    let max_x = hints.max_aspect_x as u64;
    let max_y = hints.max_aspect_y as u64;
    let w_inc = hints.width_inc as u64;
    let h_inc = hints.height_inc as u64;

    let (mut w, mut h) = (dw as u64, dh as u64);

    if min_x * h > min_y * w {
        let delta = ((min_x * h / min_y).saturating_sub(w) * w_inc) / w_inc;
        if w + delta <= hints.max_width as u64 {
            w += delta;
        } else {
            let delta = (h.saturating_sub(w * min_y / min_x) * h_inc) / h_inc;
            if h >= delta && h - delta >= hints.min_height as u64 {
                h -= delta;
            }
        }
    }

    if max_x * h < max_y * w {
        let delta = ((max_y * w / max_x).saturating_sub(h) * h_inc) / h_inc;
        if h + delta <= hints.max_height as u64 {
            h += delta;
        } else {
            let delta = (w.saturating_sub(h * max_x / max_y) * w_inc) / w_inc;
            if w >= delta && w - delta >= hints.min_width as u64 {
                w -= delta;
            }
        }
    }

    dw = w.min(u32::MAX as u64) as u32;
    dh = h.min(u32::MAX as u64) as u32;
    (dw, dh)
}

/// Frame position for a client at `client` (frame from client position).
pub fn apply_gravity(client: &Geometry, margin: &Margin, gravity: Gravity) -> (i32, i32) {
    let horizontal = margin.horizontal() as i32;
    let vertical = margin.vertical() as i32;

    let x = match gravity {
        Gravity::NorthWest | Gravity::SouthWest | Gravity::West => client.x,
        Gravity::North | Gravity::South | Gravity::Center => client.x - horizontal / 2,
        Gravity::NorthEast | Gravity::SouthEast | Gravity::East => client.x - horizontal + 2,
        Gravity::Forget | Gravity::Static => client.x - margin.left as i32,
    };

    let y = match gravity {
        Gravity::NorthWest | Gravity::NorthEast | Gravity::North => client.y,
        Gravity::Center | Gravity::East | Gravity::West => client.y - vertical / 2,
        Gravity::SouthWest | Gravity::SouthEast | Gravity::South => client.y - vertical + 2,
        Gravity::Forget | Gravity::Static => client.y - margin.top as i32,
    };

    (x, y)
}

/// Client reference position for a frame at `frame`; inverse of
/// [`apply_gravity`].
pub fn restore_gravity(frame: &Geometry, margin: &Margin, gravity: Gravity) -> (i32, i32) {
    let horizontal = margin.horizontal() as i32;
    let vertical = margin.vertical() as i32;

    let x = match gravity {
        Gravity::NorthWest | Gravity::SouthWest | Gravity::West => frame.x,
        Gravity::North | Gravity::South | Gravity::Center => frame.x + horizontal / 2,
        Gravity::NorthEast | Gravity::SouthEast | Gravity::East => frame.x + horizontal - 2,
        Gravity::Forget | Gravity::Static => frame.x + margin.left as i32,
    };

    let y = match gravity {
        Gravity::NorthWest | Gravity::NorthEast | Gravity::North => frame.y,
        Gravity::Center | Gravity::East | Gravity::West => frame.y + vertical / 2,
        Gravity::SouthWest | Gravity::SouthEast | Gravity::South => frame.y + vertical - 2,
        Gravity::Forget | Gravity::Static => frame.y + margin.top as i32,
    };

    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints() -> NormalHints {
        NormalHints::defaults(&Geometry::new(0, 0, 1920, 1080))
    }

    fn margin() -> Margin {
        Margin {
            top: 20,
            bottom: 6,
            left: 1,
            right: 1,
        }
    }

    fn client_size(frame: &Geometry, m: &Margin) -> (u32, u32) {
        (frame.width - m.horizontal(), frame.height - m.vertical())
    }

    #[test]
    fn test_frame_margin() {
        let style = StyleMetrics::default();
        let m = frame_margin(Decorations::all(), &style);
        assert_eq!(m, Margin { top: 20, bottom: 6, left: 1, right: 1 });
        assert_eq!(frame_margin(Decorations::empty(), &style), Margin::default());
        let border_only = frame_margin(Decorations::BORDER, &style);
        assert_eq!(border_only, Margin::uniform(1));
    }

    #[test]
    fn test_clamps_to_min_and_max() {
        let mut h = hints();
        h.flags = SizeFlags::P_MIN_SIZE | SizeFlags::P_MAX_SIZE;
        h.min_width = 100;
        h.min_height = 50;
        h.max_width = 400;
        h.max_height = 300;
        let m = margin();
        let cur = Geometry::new(0, 0, 200, 200);

        let small = constrain(Geometry::new(0, 0, 10, 10), &cur, &m, &h, Corner::TopLeft);
        assert_eq!(client_size(&small, &m), (100, 50));

        let big = constrain(Geometry::new(0, 0, 2000, 2000), &cur, &m, &h, Corner::TopLeft);
        assert_eq!(client_size(&big, &m), (400, 300));
    }

    #[test]
    fn test_snaps_to_increment_above_base() {
        let mut h = hints();
        h.flags = SizeFlags::P_RESIZE_INC | SizeFlags::P_BASE_SIZE;
        h.width_inc = 8;
        h.height_inc = 16;
        h.base_width = 4;
        h.base_height = 2;
        let m = margin();
        let cur = Geometry::new(0, 0, 100, 100);
        let out = constrain(Geometry::new(0, 0, 2 + 103, 26 + 100), &cur, &m, &h, Corner::TopLeft);
        let (w, hgt) = client_size(&out, &m);
        assert_eq!((w - 4) % 8, 0);
        assert_eq!((hgt - 2) % 16, 0);
        assert_eq!((w, hgt), (100, 98));
    }

    #[test]
    fn test_aspect_widens_when_too_tall() {
        let mut h = hints();
        h.flags = SizeFlags::P_ASPECT;
        h.min_aspect_x = 2;
        h.min_aspect_y = 1;
        h.max_aspect_x = 2;
        h.max_aspect_y = 1;
        let m = Margin::default();
        let cur = Geometry::new(0, 0, 10, 10);
        let out = constrain(Geometry::new(0, 0, 100, 100), &cur, &m, &h, Corner::TopLeft);
        assert_eq!((out.width, out.height), (200, 100));
    }

    #[test]
    fn test_aspect_shrinks_height_when_width_is_capped() {
        let mut h = hints();
        h.flags = SizeFlags::P_ASPECT | SizeFlags::P_MAX_SIZE;
        h.max_width = 150;
        h.min_aspect_x = 2;
        h.min_aspect_y = 1;
        h.max_aspect_x = 2;
        h.max_aspect_y = 1;
        let m = Margin::default();
        let cur = Geometry::new(0, 0, 10, 10);
        let out = constrain(Geometry::new(0, 0, 100, 100), &cur, &m, &h, Corner::TopLeft);
        assert_eq!((out.width, out.height), (100, 50));
        assert!(2 * out.height <= out.width);
    }

    #[test]
    fn test_aspect_is_noop_when_it_would_break_limits() {
        let mut h = hints();
        h.flags = SizeFlags::P_ASPECT | SizeFlags::P_MIN_SIZE | SizeFlags::P_MAX_SIZE;
        h.min_width = 100;
        h.min_height = 100;
        h.max_width = 100;
        h.max_height = 100;
        h.min_aspect_x = 2;
        h.min_aspect_y = 1;
        h.max_aspect_x = 2;
        h.max_aspect_y = 1;
        let m = Margin::default();
        let cur = Geometry::new(0, 0, 100, 100);
        let out = constrain(cur, &cur, &m, &h, Corner::TopLeft);
        assert_eq!((out.width, out.height), (100, 100));
    }

    #[test]
    fn test_constrain_is_idempotent() {
        let mut grid = hints();
        grid.flags = SizeFlags::P_RESIZE_INC | SizeFlags::P_MIN_SIZE;
        grid.min_width = 30;
        grid.min_height = 20;
        grid.width_inc = 7;
        grid.height_inc = 13;

        let mut ratio = hints();
        ratio.flags = SizeFlags::P_ASPECT;
        ratio.min_aspect_x = 1;
        ratio.min_aspect_y = 2;
        ratio.max_aspect_x = 3;
        ratio.max_aspect_y = 1;

        let m = margin();
        let cur = Geometry::new(10, 10, 200, 200);
        for h in [grid, ratio] {
            for (w, hgt) in [(50, 900), (900, 50), (333, 333), (40, 40)] {
                let once = constrain(Geometry::new(10, 10, w, hgt), &cur, &m, &h, Corner::TopLeft);
                let twice = constrain(once, &cur, &m, &h, Corner::TopLeft);
                assert_eq!(once, twice);
            }
        }
    }

    #[test]
    fn test_anchor_keeps_corner() {
        let mut h = hints();
        h.flags = SizeFlags::P_MAX_SIZE;
        h.max_width = 100;
        h.max_height = 100;
        let m = Margin::default();
        let cur = Geometry::new(100, 100, 300, 300);

        let tr = constrain(cur, &cur, &m, &h, Corner::TopRight);
        assert_eq!(tr.right(), cur.right());
        assert_eq!(tr.y, cur.y);

        let bl = constrain(cur, &cur, &m, &h, Corner::BottomLeft);
        assert_eq!(bl.bottom(), cur.bottom());
        assert_eq!(bl.x, cur.x);

        let br = constrain(cur, &cur, &m, &h, Corner::BottomRight);
        assert_eq!((br.right(), br.bottom()), (cur.right(), cur.bottom()));
    }

    #[test]
    fn test_gravity_round_trip() {
        let m = margin();
        let gravities = [
            Gravity::NorthWest,
            Gravity::North,
            Gravity::NorthEast,
            Gravity::West,
            Gravity::Center,
            Gravity::East,
            Gravity::SouthWest,
            Gravity::South,
            Gravity::SouthEast,
            Gravity::Static,
            Gravity::Forget,
        ];
        for g in gravities {
            let client = Geometry::new(300, 200, 50, 50);
            let (fx, fy) = apply_gravity(&client, &m, g);
            let frame = Geometry::new(fx, fy, 52, 76);
            assert_eq!(restore_gravity(&frame, &m, g), (300, 200), "{:?}", g);
        }
    }

    #[test]
    fn test_static_gravity_offsets_by_margin() {
        let m = margin();
        let client = Geometry::new(300, 200, 50, 50);
        assert_eq!(apply_gravity(&client, &m, Gravity::Static), (299, 180));
        assert_eq!(apply_gravity(&client, &m, Gravity::SouthEast), (300 - 2 + 2, 200 - 26 + 2));
    }
}
