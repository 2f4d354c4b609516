//! Canvas entropy source.
//!
//! Renders two fixed reference scenes and reads them back as PNG data-URLs.
//! On WebKit 616+ Safari the readback is poisoned with neighbourhood-clamped
//! noise; the 3×3 oversampling exploit (see [`crate::stabilize::denoise`])
//! recovers the clean image. On other hosts that inject unclampable
//! per-readback randomness the source reports the `Unstable` sentinel
//! instead of a meaningless value.
//!
//! Scratch canvases are never attached to the document and are dropped as
//! soon as the readback completes.

use serde::{Serialize, Serializer};
use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast};
use web_sys::{CanvasRenderingContext2d, CanvasWindingRule, HtmlCanvasElement, ImageData};

use crate::environment::EnvironmentClass;
use crate::stabilize::denoise;

const TEXT_WIDTH: u32 = 240;
const TEXT_HEIGHT: u32 = 60;
const GEOMETRY_WIDTH: u32 = 122;
const GEOMETRY_HEIGHT: u32 = 110;

/// The emoji pins the text scene to a specific glyph (U+1F603). Nothing is
/// drawn to its right: some engines render trailing glyphs unstably.
const SCENE_TEXT: &str = "Cwm fjordbank gly \u{1F603}";

/// One rendered reference image: a PNG data-URL, or a sentinel explaining
/// why none could be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasImage {
    DataUrl(String),
    /// The host lacks canvas or 2D-context support.
    Unsupported,
    /// The host clamps or rewrites canvas geometry; rendering was skipped.
    Skipped,
    /// The host injects per-readback randomness this source cannot defeat.
    Unstable,
}

impl CanvasImage {
    pub fn as_str(&self) -> &str {
        match self {
            CanvasImage::DataUrl(url) => url,
            CanvasImage::Unsupported => "unsupported",
            CanvasImage::Skipped => "skipped",
            CanvasImage::Unstable => "unstable",
        }
    }

    pub fn is_data_url(&self) -> bool {
        matches!(self, CanvasImage::DataUrl(_))
    }
}

impl Serialize for CanvasImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Result record. Both image fields are always either sentinels together or
/// data-URLs together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasFingerprint {
    pub winding: bool,
    pub geometry: CanvasImage,
    pub text: CanvasImage,
}

impl CanvasFingerprint {
    fn unsupported() -> Self {
        Self {
            winding: false,
            geometry: CanvasImage::Unsupported,
            text: CanvasImage::Unsupported,
        }
    }
}

/// Render both reference scenes and read them back.
///
/// Deterministic across repeated invocations within a page load on every
/// supported browser, including Safari 17+ where readback noise is active.
/// Never throws.
pub fn get_canvas_fingerprint() -> CanvasFingerprint {
    canvas_fingerprint_with_env(&EnvironmentClass::detect())
}

pub(crate) fn canvas_fingerprint_with_env(env: &EnvironmentClass) -> CanvasFingerprint {
    let Ok(Some((canvas, context))) = create_canvas(1, 1) else {
        return CanvasFingerprint::unsupported();
    };

    let winding = probe_winding(&context);

    match render_images(&canvas, &context, env) {
        Ok((geometry, text)) => CanvasFingerprint {
            winding,
            geometry,
            text,
        },
        // Readback threw mid-pipeline; report both images unsupported
        // rather than a half-record.
        Err(_) => CanvasFingerprint {
            winding,
            geometry: CanvasImage::Unsupported,
            text: CanvasImage::Unsupported,
        },
    }
}

fn render_images(
    canvas: &HtmlCanvasElement,
    context: &CanvasRenderingContext2d,
    env: &EnvironmentClass,
) -> Result<(CanvasImage, CanvasImage), JsValue> {
    if !prepare_scene(canvas, TEXT_WIDTH, TEXT_HEIGHT) {
        return Ok((CanvasImage::Skipped, CanvasImage::Skipped));
    }
    render_text_scene(context)?;

    if env.clamped_canvas_noise() {
        let text = denoised_data_url(canvas)?;
        if !prepare_scene(canvas, GEOMETRY_WIDTH, GEOMETRY_HEIGHT) {
            return Ok((CanvasImage::Skipped, CanvasImage::Skipped));
        }
        render_geometry_scene(context)?;
        let geometry = denoised_data_url(canvas)?;
        return Ok((CanvasImage::DataUrl(geometry), CanvasImage::DataUrl(text)));
    }

    // Encoding the same pixels twice exposes hosts that randomize every
    // readback; that noise has no neighbourhood structure to exploit.
    let text = canvas.to_data_url()?;
    if text != canvas.to_data_url()? {
        return Ok((CanvasImage::Unstable, CanvasImage::Unstable));
    }

    if !prepare_scene(canvas, GEOMETRY_WIDTH, GEOMETRY_HEIGHT) {
        return Ok((CanvasImage::Skipped, CanvasImage::Skipped));
    }
    render_geometry_scene(context)?;
    let geometry = canvas.to_data_url()?;
    Ok((CanvasImage::DataUrl(geometry), CanvasImage::DataUrl(text)))
}

/// Winding feature-test: outer and inner rect on one path; with `evenodd`
/// the inner point is outside the filled region iff winding rules work.
fn probe_winding(context: &CanvasRenderingContext2d) -> bool {
    context.begin_path();
    context.rect(0.0, 0.0, 10.0, 10.0);
    context.rect(2.0, 2.0, 6.0, 6.0);
    !context.is_point_in_path_with_f64_and_canvas_winding_rule(
        5.0,
        5.0,
        CanvasWindingRule::Evenodd,
    )
}

fn render_text_scene(context: &CanvasRenderingContext2d) -> Result<(), JsValue> {
    context.set_fill_style_str("#f60");
    context.fill_rect(100.0, 1.0, 62.0, 20.0);

    // Explicit built-in fonts: the host's font preferences are their own
    // entropy source and must not bleed into the canvas signal.
    context.set_fill_style_str("#069");
    context.set_font("11pt \"Times New Roman\"");
    context.fill_text(SCENE_TEXT, 2.0, 15.0)?;

    context.set_fill_style_str("rgba(102, 204, 0, 0.2)");
    context.set_font("18pt Arial");
    context.fill_text(SCENE_TEXT, 4.0, 45.0)?;
    Ok(())
}

fn render_geometry_scene(context: &CanvasRenderingContext2d) -> Result<(), JsValue> {
    const TAU: f64 = std::f64::consts::TAU;

    context.set_global_composite_operation("multiply")?;
    for (color, x, y) in [
        ("#f2f", 40.0, 40.0),
        ("#2ff", 80.0, 40.0),
        ("#ff2", 60.0, 80.0),
    ] {
        context.set_fill_style_str(color);
        context.begin_path();
        context.arc(x, y, 40.0, 0.0, TAU)?;
        context.close_path();
        context.fill();
    }

    context.set_fill_style_str("#f9c");
    context.begin_path();
    context.arc(60.0, 60.0, 60.0, 0.0, TAU)?;
    context.arc(60.0, 60.0, 20.0, 0.0, TAU)?;
    context.fill_with_canvas_winding_rule(CanvasWindingRule::Evenodd);
    Ok(())
}

/// Readback through the 3×3 oversampling exploit.
///
/// The scaled scratch canvas is where `getImageData` applies the host's
/// noise, exactly once; block centers are immune to it. If the scratch
/// canvas cannot be allocated, falls back to a direct (noisy) readback.
fn denoised_data_url(source: &HtmlCanvasElement) -> Result<String, JsValue> {
    let width = source.width();
    let height = source.height();
    let scale = denoise::SCALE as u32;

    let Ok(Some((_scratch, scratch_context))) =
        create_canvas(width * scale, height * scale)
    else {
        log::debug!("scratch canvas allocation failed; returning direct readback");
        return source.to_data_url();
    };

    scratch_context.set_image_smoothing_enabled(false);
    scratch_context.draw_image_with_html_canvas_element_and_dw_and_dh(
        source,
        0.0,
        0.0,
        (width * scale) as f64,
        (height * scale) as f64,
    )?;

    let noisy = scratch_context.get_image_data(
        0.0,
        0.0,
        (width * scale) as f64,
        (height * scale) as f64,
    )?;
    let noisy_bytes = noisy.data();

    let Some(clean) =
        denoise::extract_block_centers(&noisy_bytes, width as usize, height as usize)
    else {
        log::debug!("unexpected scaled readback geometry; returning direct readback");
        return source.to_data_url();
    };

    let Ok(Some((output, output_context))) = create_canvas(width, height) else {
        return source.to_data_url();
    };
    let image =
        ImageData::new_with_u8_clamped_array_and_sh(Clamped(clean.as_slice()), width, height)?;
    output_context.put_image_data(&image, 0.0, 0.0)?;
    output.to_data_url()
}

/// Resize for the next scene; a resize also clears all context state.
/// Returns false when the host rewrites canvas geometry.
fn prepare_scene(canvas: &HtmlCanvasElement, width: u32, height: u32) -> bool {
    canvas.set_width(width);
    canvas.set_height(height);
    canvas.width() == width && canvas.height() == height
}

fn create_canvas(
    width: u32,
    height: u32,
) -> Result<Option<(HtmlCanvasElement, CanvasRenderingContext2d)>, JsValue> {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return Ok(None);
    };
    let Ok(element) = document.create_element("canvas") else {
        return Ok(None);
    };
    let canvas: HtmlCanvasElement = element
        .dyn_into()
        .map_err(|_| JsValue::from_str("created element is not a canvas"))?;
    canvas.set_width(width);
    canvas.set_height(height);
    let Some(context) = canvas.get_context("2d")? else {
        return Ok(None);
    };
    let context: CanvasRenderingContext2d = context
        .dyn_into()
        .map_err(|_| JsValue::from_str("2d context has an unexpected type"))?;
    Ok(Some((canvas, context)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_serialize_as_strings() {
        assert_eq!(CanvasImage::Unsupported.as_str(), "unsupported");
        assert_eq!(CanvasImage::Skipped.as_str(), "skipped");
        assert_eq!(CanvasImage::Unstable.as_str(), "unstable");
        assert!(CanvasImage::DataUrl("data:image/png;base64,AAAA".into()).is_data_url());
    }

    #[test]
    fn record_serializes_with_camel_case_fields() {
        let record = CanvasFingerprint {
            winding: true,
            geometry: CanvasImage::Unstable,
            text: CanvasImage::Unstable,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"winding":true,"geometry":"unstable","text":"unstable"}"#
        );
    }

    #[test]
    fn scene_text_ends_with_the_pinned_emoji() {
        assert!(SCENE_TEXT.ends_with('\u{1F603}'));
    }
}
