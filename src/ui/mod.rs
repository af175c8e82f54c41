/// UI module exports
pub mod components;
pub mod overlay;
pub mod popover;
pub mod popup;
