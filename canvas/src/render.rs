//! Rendering: turns a [`Drawing`] into pixels or SVG markup.
//!
//! Every stroke becomes one open polyline path, `M x0 y0 L x1 y1 ...`, stroked
//! with its own color and width and never filled. The background image sits
//! underneath at a fixed 400×400.
//!
//! [`draw`] is the only place that touches [`web_sys::CanvasRenderingContext2d`];
//! [`svg_document`] produces the same picture as standalone markup for the
//! command line export. Neither mutates application state.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlImageElement, Path2d};

use crate::consts::{BACKGROUND_SIZE, BACKGROUND_URL};
use crate::coords::Point;
use crate::doc::{Drawing, Stroke};

/// SVG path data for a polyline through `points`. Empty input yields an empty string.
#[must_use]
pub fn path_data(points: &[Point]) -> String {
    let mut out = String::new();
    for (i, point) in points.iter().enumerate() {
        let command = if i == 0 { "M" } else { " L" };
        out.push_str(&format!("{command} {} {}", point.x, point.y));
    }
    out
}

/// Standalone SVG document: background image plus one `<path>` per stroke.
#[must_use]
pub fn svg_document(drawing: &Drawing) -> String {
    let size = BACKGROUND_SIZE;
    let mut out = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{size}" height="{size}" viewBox="0 0 {size} {size}">"#
    );
    out.push_str(&format!(
        r#"<image x="0" y="0" width="{size}" height="{size}" xlink:href="{}"/>"#,
        escape_attr(BACKGROUND_URL)
    ));
    for stroke in drawing.strokes().iter().filter(|s| !s.points.is_empty()) {
        out.push_str(&format!(
            r#"<path d="{}" stroke="{}" stroke-width="{}" fill="none" stroke-linecap="round" stroke-linejoin="round"/>"#,
            path_data(&stroke.points),
            escape_attr(stroke.color.as_str()),
            stroke.width
        ));
    }
    out.push_str("</svg>");
    out
}

/// Draw the background and every stroke, in order, onto `ctx`.
///
/// The background is skipped until the image has finished loading.
///
/// # Errors
///
/// Returns `Err` if any `Canvas2D` call fails (e.g. a broken image or invalid path data).
pub fn draw(ctx: &CanvasRenderingContext2d, drawing: &Drawing, background: Option<&HtmlImageElement>) -> Result<(), JsValue> {
    let (width, height) = ctx
        .canvas()
        .map_or((BACKGROUND_SIZE, BACKGROUND_SIZE), |c| (f64::from(c.width()), f64::from(c.height())));
    ctx.clear_rect(0.0, 0.0, width, height);

    if let Some(image) = background.filter(|img| img.complete() && img.natural_width() > 0) {
        ctx.draw_image_with_html_image_element_and_dw_and_dh(image, 0.0, 0.0, BACKGROUND_SIZE, BACKGROUND_SIZE)?;
    }

    for stroke in drawing.strokes() {
        draw_stroke(ctx, stroke)?;
    }
    Ok(())
}

fn draw_stroke(ctx: &CanvasRenderingContext2d, stroke: &Stroke) -> Result<(), JsValue> {
    if stroke.points.is_empty() {
        return Ok(());
    }
    let path = Path2d::new_with_path_string(&path_data(&stroke.points))?;
    ctx.set_stroke_style_str(stroke.color.as_str());
    ctx.set_line_width(f64::from(stroke.width));
    ctx.set_line_cap("round");
    ctx.set_line_join("round");
    ctx.stroke_with_path(&path);
    Ok(())
}

fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
