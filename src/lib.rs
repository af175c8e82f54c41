/// PlotSet Snap - Chrome extension that turns page text and images into datasets
/// Built with Rust + WASM + Yew

pub mod activity;
pub mod api;
pub mod background;
pub mod browser;
pub mod content;
pub mod images;
pub mod notice;
pub mod selection;
pub mod session;
pub mod settings;
pub mod storage;
pub mod watcher;
pub mod workflow;
pub mod ui;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

// Attach the selection popover and image overlays to the current page
#[wasm_bindgen]
pub fn start_content() {
    content::start();
}

#[wasm_bindgen]
pub fn start_background() {
    background::start();
}
