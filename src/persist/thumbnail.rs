//! Low-resolution surface thumbnails.
//!
//! Rasterizes object bounding boxes onto an RGBA buffer and encodes it as a
//! PNG data URL. This is an overview for template pickers, not a faithful
//! render: text becomes bars, images become placeholders, and QR placeholders
//! are drawn from their sample payload.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageEncoder, Rgba, RgbaImage};

use crate::MailcraftError;
use crate::document::{GraphicObject, ObjectBody, Rect, ShapeKind};
use crate::format::PrintFormat;

const TEXT_COLOR: [u8; 4] = [17, 24, 39, 255];
const IMAGE_PLACEHOLDER: [u8; 4] = [203, 213, 225, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`. `None` for anything else,
/// including `"transparent"`.
pub fn parse_color(s: &str) -> Option<[u8; 4]> {
    let hex = s.trim().strip_prefix('#')?;
    let channel = |i: usize, len: usize| u8::from_str_radix(hex.get(i..i + len)?, 16).ok();
    match hex.len() {
        3 => {
            let r = channel(0, 1)?;
            let g = channel(1, 1)?;
            let b = channel(2, 1)?;
            Some([r * 17, g * 17, b * 17, 255])
        }
        6 => Some([channel(0, 2)?, channel(2, 2)?, channel(4, 2)?, 255]),
        8 => Some([channel(0, 2)?, channel(2, 2)?, channel(4, 2)?, channel(6, 2)?]),
        _ => None,
    }
}

/// Thumbnail height for a given width, following the format's aspect ratio.
pub fn thumbnail_height(format: &PrintFormat, width: u32) -> u32 {
    let scale = f64::from(width) / f64::from(format.width_pixels.max(1));
    ((f64::from(format.height_pixels) * scale).round() as u32).max(1)
}

/// Render a surface to PNG bytes, `width` pixels wide.
pub fn render_png(
    objects: &[GraphicObject],
    background: &str,
    format: &PrintFormat,
    width: u32,
) -> Result<Vec<u8>, MailcraftError> {
    if format.is_degenerate() {
        return Err(MailcraftError::Thumbnail(format!(
            "cannot render {} with zero size",
            format.id
        )));
    }
    let width = width.max(1);
    let height = thumbnail_height(format, width);
    let scale = f64::from(width) / f64::from(format.width_pixels);

    let mut img = RgbaImage::from_pixel(width, height, Rgba(parse_color(background).unwrap_or(WHITE)));
    for obj in objects {
        draw_object(&mut img, obj, scale);
    }

    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .map_err(|e: image::ImageError| MailcraftError::Thumbnail(e.to_string()))?;

    Ok(png_bytes)
}

/// Render a surface to a `data:image/png;base64,...` URL.
pub fn render_data_url(
    objects: &[GraphicObject],
    background: &str,
    format: &PrintFormat,
    width: u32,
) -> Result<String, MailcraftError> {
    let png = render_png(objects, background, format, width)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

fn scaled(rect: Rect, scale: f64) -> Rect {
    Rect::new(rect.x * scale, rect.y * scale, rect.width * scale, rect.height * scale)
}

fn draw_object(img: &mut RgbaImage, obj: &GraphicObject, scale: f64) {
    let rect = scaled(obj.bounds(), scale);
    let alpha = obj.style.opacity.clamp(0.0, 1.0);
    let fill = obj.style.fill.as_deref().and_then(parse_color);

    match &obj.body {
        ObjectBody::Text(text) => {
            let color = fill.unwrap_or(TEXT_COLOR);
            let line_h = (text.font_size * text.line_height * scale).max(1.0);
            // Only lines that land on the image.
            let skipped = (-rect.y / line_h).floor().max(0.0);
            let mut y = rect.y + skipped * line_h;
            let limit = rect.bottom().min(f64::from(img.height()));
            while y < limit {
                let bar = Rect::new(rect.x, y + line_h * 0.2, rect.width, line_h * 0.6);
                fill_rect(img, bar, color, alpha);
                y += line_h;
            }
        }
        ObjectBody::Image(_) => fill_rect(img, rect, IMAGE_PLACEHOLDER, alpha),
        ObjectBody::Shape(shape) => {
            let color = fill.unwrap_or(IMAGE_PLACEHOLDER);
            match shape.shape {
                ShapeKind::Rect | ShapeKind::Line => fill_rect(img, rect, color, alpha),
                ShapeKind::Ellipse => fill_ellipse(img, rect, color, alpha),
                ShapeKind::Qr => {
                    let payload = shape.qr_payload.as_deref().unwrap_or(&obj.id);
                    if !draw_qr(img, rect, payload, alpha) {
                        fill_rect(img, rect, color, alpha);
                    }
                }
            }
        }
    }
}

/// Draw QR modules for `payload` into `rect`. Returns false if encoding failed.
fn draw_qr(img: &mut RgbaImage, rect: Rect, payload: &str, alpha: f64) -> bool {
    use qrcode::QrCode;

    let Ok(code) = QrCode::new(payload.as_bytes()) else {
        return false;
    };
    let modules = code.width();
    let cell_w = rect.width / modules as f64;
    let cell_h = rect.height / modules as f64;

    fill_rect(img, rect, WHITE, alpha);
    for qy in 0..modules {
        for qx in 0..modules {
            if code[(qx, qy)] == qrcode::Color::Dark {
                let cell = Rect::new(
                    rect.x + qx as f64 * cell_w,
                    rect.y + qy as f64 * cell_h,
                    cell_w,
                    cell_h,
                );
                fill_rect(img, cell, [0, 0, 0, 255], alpha);
            }
        }
    }
    true
}

fn pixel_span(start: f64, len: f64, max: u32) -> (u32, u32) {
    let lo = start.floor().max(0.0) as u32;
    let hi = (start + len).ceil().clamp(0.0, f64::from(max)) as u32;
    (lo.min(max), hi)
}

fn blend(img: &mut RgbaImage, x: u32, y: u32, color: [u8; 4], alpha: f64) {
    let a = alpha * f64::from(color[3]) / 255.0;
    let px = img.get_pixel_mut(x, y);
    for c in 0..3 {
        let src = f64::from(color[c]);
        let dst = f64::from(px.0[c]);
        px.0[c] = (src * a + dst * (1.0 - a)).round() as u8;
    }
}

fn fill_rect(img: &mut RgbaImage, rect: Rect, color: [u8; 4], alpha: f64) {
    let (x0, x1) = pixel_span(rect.x, rect.width, img.width());
    let (y0, y1) = pixel_span(rect.y, rect.height, img.height());
    for y in y0..y1 {
        for x in x0..x1 {
            blend(img, x, y, color, alpha);
        }
    }
}

fn fill_ellipse(img: &mut RgbaImage, rect: Rect, color: [u8; 4], alpha: f64) {
    let (cx, cy) = rect.center();
    let rx = (rect.width / 2.0).max(0.5);
    let ry = (rect.height / 2.0).max(0.5);
    let (x0, x1) = pixel_span(rect.x, rect.width, img.width());
    let (y0, y1) = pixel_span(rect.y, rect.height, img.height());
    for y in y0..y1 {
        for x in x0..x1 {
            let dx = (f64::from(x) + 0.5 - cx) / rx;
            let dy = (f64::from(y) + 0.5 - cy) / ry;
            if dx * dx + dy * dy <= 1.0 {
                blend(img, x, y, color, alpha);
            }
        }
    }
}
