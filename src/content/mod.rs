/// Content script: text popover and image overlays on the current page

pub mod dom;

use crate::api::ApiClient;
use crate::browser::{self, ChromeStore};
use crate::images::OverlayRegistry;
use crate::settings::{ApiConfig, ContentConfig, SharedConfig};
use crate::storage::KeyValueStore;
use crate::ui::components::after;
use crate::ui::overlay::{self, ImageOverlay, ImageOverlayProps};
use crate::ui::popover::{PopoverProps, SelectionApp};
use crate::watcher::{MutationWatcher, PageWatcher};
use crate::workflow::Extractor;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use uuid::Uuid;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Element, ErrorEvent, HtmlElement, HtmlImageElement, Node};
use yew::AppHandle;

const POPOVER_ROOT_ID: &str = "plotset-snap-root";
const STYLE_ID: &str = "plotset-snap-styles";
const SCAN_DELAY_MS: i32 = 150;
const OWN_UI_SELECTOR: &str = ".plotset-snap-overlay, .plotset-snap-popover";

const STYLES: &str = r#"
@keyframes plotset-snap-spin { to { transform: rotate(360deg); } }
.plotset-snap-loading { display: flex; flex-direction: column; align-items: center; gap: 8px; padding: 8px; }
.plotset-snap-spinner { width: 24px; height: 24px; border: 3px solid rgba(255, 255, 255, 0.2); border-top-color: #14b8a6; border-radius: 50%; animation: plotset-snap-spin 0.8s linear infinite; }
.plotset-snap-loading-message { margin: 0; font-size: 12px; }
.plotset-snap-menu-item:hover { background: #f3f4f6; }
"#;

fn document() -> Result<Document, JsValue> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))
}

fn body() -> Result<HtmlElement, JsValue> {
    document()?
        .body()
        .ok_or_else(|| JsValue::from_str("document has no body"))
}

fn describe(e: &JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

pub fn start() {
    install_error_listener();
    if let Err(e) = inject_styles() {
        log::warn!("Failed to inject styles: {}", describe(&e));
    }

    spawn_local(async {
        if let Err(e) = run().await {
            browser::report_error("content_script", &describe(&e), None);
        }
    });
}

async fn run() -> Result<(), JsValue> {
    let store: Rc<dyn KeyValueStore> = Rc::new(ChromeStore);
    let api = Rc::new(ApiClient::new(ApiConfig::default()));
    let extractor = Extractor::new(store.clone(), api);

    let config: SharedConfig = Rc::new(RefCell::new(ContentConfig::load(store.as_ref()).await));
    ContentConfig::follow(store.as_ref(), &config);
    log::debug!("Content config loaded: {:?}", config.borrow().settings);

    mount_popover(extractor.clone(), config)?;

    let instrumenter = Rc::new(ImageInstrumenter::new(extractor));
    instrumenter.scan();
    listen_for_layout_changes(&instrumenter)?;

    let body = body()?;
    let watcher = MutationWatcher::observe(&body, instrumenter)?;
    // Observes for the lifetime of the page
    std::mem::forget(watcher);
    Ok(())
}

/// Uncaught page errors go to the background log sink
fn install_error_listener() {
    let Some(window) = web_sys::window() else {
        return;
    };
    let listener = Closure::<dyn Fn(ErrorEvent)>::new(|event: ErrorEvent| {
        let stack = js_sys::Reflect::get(&event.error(), &JsValue::from_str("stack"))
            .ok()
            .and_then(|s| s.as_string());
        browser::report_error("content_script", &event.message(), stack);
    });
    if let Err(e) = window.add_event_listener_with_callback("error", listener.as_ref().unchecked_ref()) {
        log::warn!("Failed to add error listener: {}", describe(&e));
    }
    listener.forget();
}

fn inject_styles() -> Result<(), JsValue> {
    let document = document()?;
    if document.get_element_by_id(STYLE_ID).is_some() {
        return Ok(());
    }
    let style = document.create_element("style")?;
    style.set_id(STYLE_ID);
    style.set_text_content(Some(STYLES));
    document
        .document_element()
        .ok_or_else(|| JsValue::from_str("no document element"))?
        .append_child(&style)?;
    Ok(())
}

fn mount_popover(extractor: Extractor, config: SharedConfig) -> Result<(), JsValue> {
    let document = document()?;
    if document.get_element_by_id(POPOVER_ROOT_ID).is_some() {
        log::warn!("Popover already mounted");
        return Ok(());
    }

    let root = document.create_element("div")?;
    root.set_id(POPOVER_ROOT_ID);
    root.set_attribute("style", "position: absolute; top: 0; left: 0; width: 0; height: 0;")?;
    body()?.append_child(&root)?;

    yew::Renderer::<SelectionApp>::with_root_and_props(root, PopoverProps { extractor, config }).render();
    Ok(())
}

fn listen_for_layout_changes(instrumenter: &Rc<ImageInstrumenter>) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    for event in ["load", "scroll", "resize"] {
        let instrumenter = instrumenter.clone();
        let listener = Closure::<dyn Fn()>::new(move || schedule_scan(&instrumenter));
        window.add_event_listener_with_callback(event, listener.as_ref().unchecked_ref())?;
        listener.forget();
    }
    Ok(())
}

/// Coalesce bursts of scroll and resize events into one pass
fn schedule_scan(instrumenter: &Rc<ImageInstrumenter>) {
    if instrumenter.scan_pending.replace(true) {
        return;
    }
    let instrumenter = instrumenter.clone();
    after(SCAN_DELAY_MS, move || {
        instrumenter.scan_pending.set(false);
        instrumenter.reposition();
        instrumenter.scan();
    });
}

struct OverlayHandle {
    image: HtmlImageElement,
    host: HtmlElement,
    app: AppHandle<ImageOverlay>,
}

/// Finds qualifying images and keeps one overlay per image
pub struct ImageInstrumenter {
    extractor: Extractor,
    overlays: RefCell<OverlayRegistry<OverlayHandle>>,
    scan_pending: Cell<bool>,
}

impl ImageInstrumenter {
    pub fn new(extractor: Extractor) -> Self {
        ImageInstrumenter {
            extractor,
            overlays: RefCell::new(OverlayRegistry::new()),
            scan_pending: Cell::new(false),
        }
    }

    pub fn scan(&self) {
        let Ok(document) = document() else {
            return;
        };
        let images = match document.query_selector_all("img") {
            Ok(images) => images,
            Err(e) => {
                browser::report_error("scan_images", &describe(&e), None);
                return;
            }
        };

        for i in 0..images.length() {
            let Some(image) = images.get(i).and_then(|n| n.dyn_into::<HtmlImageElement>().ok()) else {
                continue;
            };
            // One bad image must not stop the rest of the pass
            if let Err(e) = self.instrument(&document, image) {
                browser::report_error("create_image_overlay", &describe(&e), None);
            }
        }
    }

    fn instrument(&self, document: &Document, image: HtmlImageElement) -> Result<(), JsValue> {
        // Our own thumbnails never get an overlay
        if image.closest(OWN_UI_SELECTOR)?.is_some() {
            return Ok(());
        }

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let candidate = dom::read_candidate(&window, document, &image);
        if let Some(reason) = candidate.skip_reason() {
            log::trace!("Skipping {}: {:?}", candidate.src, reason);
            return Ok(());
        }

        let key = Uuid::new_v4().to_string();
        let host: HtmlElement = document.create_element("div")?.dyn_into()?;
        overlay::place_host(&host, &image)?;
        body()?.append_child(&host)?;
        dom::set_marker_key(&image, &key)?;

        let app = yew::Renderer::<ImageOverlay>::with_root_and_props(
            host.clone().into(),
            ImageOverlayProps {
                extractor: self.extractor.clone(),
                image: image.clone(),
            },
        )
        .render();

        self.overlays
            .borrow_mut()
            .insert(key, OverlayHandle { image, host, app });
        Ok(())
    }

    pub fn reposition(&self) {
        for handle in self.overlays.borrow().handles() {
            if let Err(e) = overlay::place_host(&handle.host, &handle.image) {
                log::warn!("Failed to reposition overlay: {}", describe(&e));
            }
        }
    }

    /// Tear down overlays whose image left the document
    pub fn sweep(&self) {
        let detached = self
            .overlays
            .borrow_mut()
            .sweep(|handle| handle.image.is_connected());

        if detached.is_empty() {
            return;
        }
        log::debug!("Removing {} detached overlays", detached.len());
        for handle in detached {
            handle.app.destroy();
            handle.host.remove();
            dom::clear_marker_key(&handle.image);
        }
    }
}

fn contains_image(node: &Node) -> bool {
    let Some(element) = node.dyn_ref::<Element>() else {
        return false;
    };
    element.tag_name().eq_ignore_ascii_case("img")
        || element.query_selector("img").ok().flatten().is_some()
}

impl PageWatcher for ImageInstrumenter {
    type Node = Node;

    fn nodes_added(&self, nodes: &[Node]) {
        if nodes.iter().any(contains_image) {
            self.scan();
        }
    }

    fn nodes_removed(&self, nodes: &[Node]) {
        if nodes.iter().any(contains_image) {
            self.sweep();
        }
    }
}
