/// DOM reads and writes used by the content script

use crate::images::{ImageCandidate, MARKER_ATTRIBUTE, Rect};
use crate::selection::{Anchor, SelectionRect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    CanvasRenderingContext2d, Document, HtmlAnchorElement, HtmlCanvasElement, HtmlElement,
    HtmlImageElement, Window,
};

/// Edge of the square the image is scaled to before reading alpha
const ALPHA_SAMPLE_SIZE: u32 = 16;

/// Append an invisible 1x1 marker at `anchor` for the popover to hang from
pub fn place_marker(document: &Document, anchor: &Anchor) -> Result<HtmlElement, JsValue> {
    let marker: HtmlElement = document.create_element("span")?.dyn_into()?;
    let style = marker.style();
    style.set_property("position", "absolute")?;
    style.set_property("left", &format!("{}px", anchor.left))?;
    style.set_property("top", &format!("{}px", anchor.top))?;
    style.set_property("width", "1px")?;
    style.set_property("height", "1px")?;
    style.set_property("pointer-events", "none")?;

    document
        .body()
        .ok_or_else(|| JsValue::from_str("document has no body"))?
        .append_child(&marker)?;
    Ok(marker)
}

/// Current selection text and its viewport rectangle
pub fn current_selection(window: &Window) -> Option<(String, SelectionRect)> {
    let selection = window.get_selection().ok()??;
    if selection.range_count() == 0 {
        return None;
    }
    let text: String = selection.to_string().into();
    let bounds = selection.get_range_at(0).ok()?.get_bounding_client_rect();

    Some((
        text,
        SelectionRect {
            left: bounds.left(),
            top: bounds.top(),
            width: bounds.width(),
            height: bounds.height(),
        },
    ))
}

pub fn scroll_offsets(window: &Window) -> (f64, f64) {
    (
        window.scroll_x().unwrap_or(0.0),
        window.scroll_y().unwrap_or(0.0),
    )
}

pub fn viewport_size(window: &Window) -> (f64, f64) {
    let width = window
        .inner_width()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    let height = window
        .inner_height()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    (width, height)
}

pub fn image_rect(image: &HtmlImageElement) -> Rect {
    let bounds = image.get_bounding_client_rect();
    Rect {
        left: bounds.left(),
        top: bounds.top(),
        width: bounds.width(),
        height: bounds.height(),
    }
}

pub fn marker_key(image: &HtmlImageElement) -> Option<String> {
    image.dataset().get(MARKER_ATTRIBUTE)
}

pub fn set_marker_key(image: &HtmlImageElement, key: &str) -> Result<(), JsValue> {
    image.dataset().set(MARKER_ATTRIBUTE, key)
}

pub fn clear_marker_key(image: &HtmlImageElement) {
    image.dataset().delete(MARKER_ATTRIBUTE);
}

/// Snapshot of an image for the overlay filter. Pixels are only sampled
/// once the cheap checks have passed.
pub fn read_candidate(window: &Window, document: &Document, image: &HtmlImageElement) -> ImageCandidate {
    let (viewport_width, viewport_height) = viewport_size(window);
    let pending_source = image
        .get_attribute("data-src")
        .or_else(|| image.get_attribute("data-lazy-src"));

    let mut candidate = ImageCandidate {
        src: image.current_src(),
        id: image.id(),
        class_names: image
            .class_name()
            .split_whitespace()
            .map(str::to_string)
            .collect(),
        width: image.width() as f64,
        height: image.height() as f64,
        rect: image_rect(image),
        viewport_width,
        viewport_height,
        loaded: image.complete() && image.natural_width() > 0,
        pending_source,
        processed: marker_key(image).is_some(),
        alpha_samples: None,
    };

    if candidate.skip_reason().is_none() {
        candidate.alpha_samples = sample_alpha(document, image);
    }
    candidate
}

/// Alpha channel of the image scaled onto a small canvas. Cross-origin
/// images taint the canvas; those return None and count as opaque.
pub fn sample_alpha(document: &Document, image: &HtmlImageElement) -> Option<Vec<u8>> {
    let canvas: HtmlCanvasElement = document.create_element("canvas").ok()?.dyn_into().ok()?;
    canvas.set_width(ALPHA_SAMPLE_SIZE);
    canvas.set_height(ALPHA_SAMPLE_SIZE);

    let context: CanvasRenderingContext2d = canvas.get_context("2d").ok()??.dyn_into().ok()?;
    let size = ALPHA_SAMPLE_SIZE as f64;
    context
        .draw_image_with_html_image_element_and_dw_and_dh(image, 0.0, 0.0, size, size)
        .ok()?;

    let data = context.get_image_data(0.0, 0.0, size, size).ok()?.data();
    Some(data.0.iter().skip(3).step_by(4).copied().collect())
}

pub fn download(document: &Document, url: &str, file_name: &str) -> Result<(), JsValue> {
    let link: HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
    link.set_href(url);
    link.set_download(file_name);

    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("document has no body"))?;
    body.append_child(&link)?;
    link.click();
    body.remove_child(&link)?;
    Ok(())
}

pub fn open_in_new_tab(url: &str) {
    if let Some(window) = web_sys::window() {
        if let Err(e) = window.open_with_url_and_target(url, "_blank") {
            log::warn!("Failed to open {}: {:?}", url, e);
        }
    }
}

pub fn copy_to_clipboard(text: String) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let promise = window.navigator().clipboard().write_text(&text);
    spawn_local(async move {
        if let Err(e) = JsFuture::from(promise).await {
            log::warn!("Clipboard write failed: {:?}", e);
        }
    });
}
