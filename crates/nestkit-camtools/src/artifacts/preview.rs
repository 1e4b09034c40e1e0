//! Sheet preview images
//!
//! Drawn in sheet millimetres through a transform that flips Y, so the
//! image shows the sheet the way the machine sees it: origin bottom-left.

use super::pixmap_to_rgb;
use crate::sheet_packer::SheetLayout;
use image::RgbImage;
use nestkit_core::Offcut;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

fn sheet_color() -> Color {
    Color::from_rgba8(235, 235, 235, 255)
}
fn part_color() -> Color {
    Color::from_rgba8(222, 184, 135, 255)
}
fn offcut_color() -> Color {
    Color::from_rgba8(170, 215, 170, 255)
}
fn outline_color() -> Color {
    Color::from_rgba8(40, 40, 40, 255)
}

/// Render a sheet with its parts and offcuts, `width_px` pixels wide
pub fn render_sheet_preview(layout: &SheetLayout, offcuts: &[Offcut], width_px: u32) -> RgbImage {
    let width_px = width_px.max(1);
    let scale = width_px as f32 / layout.width as f32;
    let height_px = ((layout.height as f32 * scale).ceil() as u32).max(1);

    let Some(mut pixmap) = Pixmap::new(width_px, height_px) else {
        return RgbImage::new(width_px, height_px);
    };
    pixmap.fill(Color::WHITE);

    // Sheet mm -> pixels, Y up
    let transform = Transform::from_scale(scale, -scale).post_translate(0.0, height_px as f32);

    let mut fill = Paint::default();
    fill.anti_alias = false;
    let mut outline = Paint::default();
    outline.set_color(outline_color());
    outline.anti_alias = true;
    let stroke = Stroke {
        width: 1.5 / scale,
        ..Default::default()
    };

    let mut draw_rect = |x: f64, y: f64, w: f64, h: f64, color: Color| {
        let Some(rect) = Rect::from_xywh(x as f32, y as f32, w as f32, h as f32) else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        fill.set_color(color);
        pixmap.fill_path(&path, &fill, FillRule::Winding, transform, None);
        pixmap.stroke_path(&path, &outline, &stroke, transform, None);
    };

    draw_rect(0.0, 0.0, layout.width, layout.height, sheet_color());
    for offcut in offcuts {
        draw_rect(offcut.x, offcut.y, offcut.width, offcut.height, offcut_color());
    }
    for placed in &layout.placements {
        draw_rect(placed.x, placed.y, placed.length, placed.width, part_color());
    }

    pixmap_to_rgb(&pixmap)
}
