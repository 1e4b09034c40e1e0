//! Part and offcut labels
//!
//! A label is a small raster with the fields of a [`LabelLayout`] printed at
//! fixed pixel positions. Text uses a sans-serif system font found through
//! fontdb; when the system has none, every field is drawn as a grey bar of
//! the text's approximate size so the label layout is still visible.

use super::pixmap_to_rgb;
use image::RgbImage;
use nestkit_core::units::format_dimension;
use nestkit_core::{LabelFieldKind, LabelLayout, Offcut, PlacedPart};
use rusttype::{point as rt_point, Font, Scale};
use std::fs;
use std::sync::OnceLock;
use tiny_skia::{Color, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};
use tracing::{debug, warn};

/// Field values printed on one label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelValues {
    pub part_name: String,
    pub dimensions: String,
    pub material: String,
    pub thickness: String,
    pub client: String,
    pub project: String,
    pub comment: String,
    pub sheet: String,
    pub program_code: String,
}

impl LabelValues {
    /// Values for a placed part; `sheet_number` counts from 1
    pub fn for_part(placed: &PlacedPart, sheet_number: usize) -> Self {
        let part = &placed.part;
        Self {
            part_name: part.name.clone(),
            dimensions: format!(
                "{} x {} x {}",
                format_dimension(part.length),
                format_dimension(part.width),
                format_dimension(part.thickness)
            ),
            material: part.material.clone(),
            thickness: format_dimension(part.thickness),
            client: part.client.clone(),
            project: part.project.clone(),
            comment: part.comment.clone(),
            sheet: sheet_number.to_string(),
            program_code: part.program_code.clone(),
        }
    }

    /// Values for an offcut; `number` counts from 1 within its sheet
    pub fn for_offcut(offcut: &Offcut, number: usize) -> Self {
        Self {
            part_name: format!("Sobra {}", number),
            dimensions: format!(
                "{} x {} x {}",
                format_dimension(offcut.width),
                format_dimension(offcut.height),
                format_dimension(offcut.thickness)
            ),
            material: offcut.material.clone(),
            thickness: format_dimension(offcut.thickness),
            sheet: (offcut.sheet_index + 1).to_string(),
            ..Self::default()
        }
    }

    fn get(&self, kind: LabelFieldKind) -> &str {
        match kind {
            LabelFieldKind::PartName => &self.part_name,
            LabelFieldKind::Dimensions => &self.dimensions,
            LabelFieldKind::Material => &self.material,
            LabelFieldKind::Thickness => &self.thickness,
            LabelFieldKind::Client => &self.client,
            LabelFieldKind::Project => &self.project,
            LabelFieldKind::Comment => &self.comment,
            LabelFieldKind::Sheet => &self.sheet,
            LabelFieldKind::ProgramCode => &self.program_code,
        }
    }
}

fn label_font() -> Option<&'static Font<'static>> {
    static FONT: OnceLock<Option<Font<'static>>> = OnceLock::new();
    FONT.get_or_init(|| {
        let font = load_system_sans();
        if font.is_none() {
            warn!("No sans-serif system font found; labels are drawn without text");
        }
        font
    })
    .as_ref()
}

fn load_system_sans() -> Option<Font<'static>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    let query = fontdb::Query {
        families: &[fontdb::Family::SansSerif],
        ..fontdb::Query::default()
    };
    let id = db.query(&query)?;
    let face = db.face(id)?;
    debug!(font = ?face.families.first(), "Label font");

    match &face.source {
        fontdb::Source::File(path) | fontdb::Source::SharedFile(path, _) => {
            Font::try_from_vec_and_index(fs::read(path).ok()?, face.index)
        }
        fontdb::Source::Binary(bytes) => {
            Font::try_from_vec_and_index(bytes.as_ref().as_ref().to_vec(), face.index)
        }
    }
}

/// Blend black text coverage into an opaque pixmap
fn draw_text(pixmap: &mut Pixmap, font: &Font<'_>, text: &str, x: i32, y: i32, size: f32) {
    let scale = Scale::uniform(size);
    let v_metrics = font.v_metrics(scale);
    let start = rt_point(x as f32, y as f32 + v_metrics.ascent);
    let (width, height) = (pixmap.width() as i32, pixmap.height() as i32);

    for glyph in font.layout(text, scale, start) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        let data = pixmap.data_mut();
        glyph.draw(|gx, gy, coverage| {
            let px = gx as i32 + bb.min.x;
            let py = gy as i32 + bb.min.y;
            if px < 0 || py < 0 || px >= width || py >= height {
                return;
            }
            let idx = ((py * width + px) * 4) as usize;
            let keep = 1.0 - coverage.clamp(0.0, 1.0);
            for channel in &mut data[idx..idx + 3] {
                *channel = (*channel as f32 * keep) as u8;
            }
        });
    }
}

fn draw_placeholder(pixmap: &mut Pixmap, text: &str, x: i32, y: i32, size: f32) {
    let width = size * 0.5 * text.chars().count() as f32;
    let Some(rect) = Rect::from_xywh(x as f32, y as f32 + size * 0.2, width, size * 0.6) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(160, 160, 160, 255));
    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
}

/// Render one label
pub fn render_label(layout: &LabelLayout, values: &LabelValues) -> RgbImage {
    let (width, height) = (layout.width_px.max(1), layout.height_px.max(1));
    let Some(mut pixmap) = Pixmap::new(width, height) else {
        return RgbImage::new(width, height);
    };
    pixmap.fill(Color::WHITE);

    if let Some(border) = Rect::from_xywh(0.5, 0.5, width as f32 - 1.0, height as f32 - 1.0) {
        let mut paint = Paint::default();
        paint.set_color(Color::BLACK);
        let stroke = Stroke::default();
        pixmap.stroke_path(
            &PathBuilder::from_rect(border),
            &paint,
            &stroke,
            Transform::identity(),
            None,
        );
    }

    let font = label_font();
    for field in &layout.fields {
        let value = values.get(field.kind);
        if value.is_empty() {
            continue;
        }
        let text = format!("{}{}", field.prefix, value);
        match font {
            Some(font) => draw_text(&mut pixmap, font, &text, field.x, field.y, field.size),
            None => draw_placeholder(&mut pixmap, &text, field.x, field.y, field.size),
        }
    }

    pixmap_to_rgb(&pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestkit_core::Part;

    #[test]
    fn test_values_for_part() {
        let mut part = Part::new("Lateral", 600.0, 300.5, 18.0, "MDF-18");
        part.client = "Silva".to_string();
        let placed = PlacedPart::new(part, 0, 0.0, 0.0, true);

        let values = LabelValues::for_part(&placed, 3);
        assert_eq!(values.dimensions, "600 x 300.5 x 18");
        assert_eq!(values.get(LabelFieldKind::Client), "Silva");
        assert_eq!(values.get(LabelFieldKind::Sheet), "3");
    }

    #[test]
    fn test_label_has_configured_size_and_ink() {
        let layout = LabelLayout::default();
        let values = LabelValues {
            part_name: "Porta Esquerda".to_string(),
            ..LabelValues::default()
        };
        let image = render_label(&layout, &values);
        assert_eq!(image.dimensions(), (400, 200));
        // Something darker than the background was drawn in the name's row
        let inked = (10..300).any(|x| (10..40).any(|y| image.get_pixel(x, y).0[0] < 200));
        assert!(inked);
    }
}
