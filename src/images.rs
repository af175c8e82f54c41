/// Which page images get an overlay button

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

pub const MIN_IMAGE_SIZE: f64 = 100.0;
pub const ALPHA_THRESHOLD: u8 = 50;
pub const TRANSPARENT_RATIO: f64 = 0.6;

/// Name of the `data-*` attribute marking an instrumented image
pub const MARKER_ATTRIBUTE: &str = "snapOverlay";

static ICON_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(ico|svg)(\?.*)?$").expect("valid icon pattern"));

const ICON_MARKERS: [&str; 3] = ["logo", "favicon", "icon"];
const PLACEHOLDER_MARKERS: [&str; 5] = ["placeholder", "lazy", "spacer", "blank.gif", "loading"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Everything the filter needs to know about one `<img>`
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCandidate {
    pub src: String,
    pub id: String,
    pub class_names: Vec<String>,
    pub width: f64,
    pub height: f64,
    /// Viewport-relative bounding box
    pub rect: Rect,
    pub viewport_width: f64,
    pub viewport_height: f64,
    /// `complete` and a non-zero natural size
    pub loaded: bool,
    /// A `data-src`/`data-srcset` value still waiting to be swapped in
    pub pending_source: Option<String>,
    /// Marker attribute already present
    pub processed: bool,
    /// Alpha channel samples, when the pixels could be read
    pub alpha_samples: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyProcessed,
    TooSmall,
    IconLike,
    Placeholder,
    NotVisible,
    MostlyTransparent,
}

impl ImageCandidate {
    pub fn is_small(&self) -> bool {
        self.width < MIN_IMAGE_SIZE || self.height < MIN_IMAGE_SIZE
    }

    pub fn is_icon_like(&self) -> bool {
        let by_class = self
            .class_names
            .iter()
            .any(|c| c == "logo" || c == "icon");
        let id = self.id.to_lowercase();
        let by_id = id.contains("logo") || id.contains("icon");
        let src = self.src.to_lowercase();
        let by_src = ICON_MARKERS.iter().any(|m| src.contains(m)) || ICON_FILE.is_match(&src);

        by_class || by_id || by_src
    }

    pub fn is_placeholder(&self) -> bool {
        if !self.loaded || self.src.is_empty() {
            return true;
        }
        if self
            .pending_source
            .as_deref()
            .is_some_and(|pending| !pending.is_empty() && pending != self.src)
        {
            return true;
        }

        let src = self.src.to_lowercase();
        if src.starts_with("data:image/gif") || src.starts_with("data:image/svg") {
            return true;
        }
        PLACEHOLDER_MARKERS.iter().any(|m| src.contains(m))
            || self
                .class_names
                .iter()
                .any(|c| c.contains("lazy") || c.contains("placeholder") || c.contains("blur"))
    }

    pub fn is_fully_visible(&self) -> bool {
        self.rect.width > 0.0
            && self.rect.height > 0.0
            && self.rect.top >= 0.0
            && self.rect.left >= 0.0
            && self.rect.bottom() <= self.viewport_height
            && self.rect.right() <= self.viewport_width
    }

    pub fn is_mostly_transparent(&self) -> bool {
        self.alpha_samples
            .as_deref()
            .is_some_and(is_mostly_transparent)
    }

    /// First reason to skip this image, or None if it should get an overlay
    pub fn skip_reason(&self) -> Option<SkipReason> {
        if self.processed {
            Some(SkipReason::AlreadyProcessed)
        } else if self.is_small() {
            Some(SkipReason::TooSmall)
        } else if self.is_icon_like() {
            Some(SkipReason::IconLike)
        } else if self.is_placeholder() {
            Some(SkipReason::Placeholder)
        } else if !self.is_fully_visible() {
            Some(SkipReason::NotVisible)
        } else if self.is_mostly_transparent() {
            Some(SkipReason::MostlyTransparent)
        } else {
            None
        }
    }
}

/// More than 60% of samples below alpha 50
pub fn is_mostly_transparent(alphas: &[u8]) -> bool {
    if alphas.is_empty() {
        return false;
    }
    let transparent = alphas.iter().filter(|&&a| a < ALPHA_THRESHOLD).count();
    transparent as f64 / alphas.len() as f64 > TRANSPARENT_RATIO
}

/// Document position of an overlay button: 10px from the top, 40px in from
/// the right edge of the image
pub fn overlay_position(rect: &Rect, scroll_x: f64, scroll_y: f64) -> (f64, f64) {
    (scroll_y + rect.top + 10.0, scroll_x + rect.right() - 40.0)
}

/// Overlays currently attached, keyed by the id stored in the image's marker
pub struct OverlayRegistry<H> {
    overlays: HashMap<String, H>,
}

impl<H> OverlayRegistry<H> {
    pub fn new() -> Self {
        OverlayRegistry {
            overlays: HashMap::new(),
        }
    }

    /// Returns false and drops nothing if `key` is already registered
    pub fn insert(&mut self, key: String, handle: H) -> bool {
        if self.overlays.contains_key(&key) {
            return false;
        }
        self.overlays.insert(key, handle);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.overlays.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = &H> {
        self.overlays.values()
    }

    /// Remove and return every overlay whose handle fails `attached`
    pub fn sweep(&mut self, attached: impl Fn(&H) -> bool) -> Vec<H> {
        let detached: Vec<String> = self
            .overlays
            .iter()
            .filter(|(_, handle)| !attached(handle))
            .map(|(key, _)| key.clone())
            .collect();

        detached
            .into_iter()
            .filter_map(|key| self.overlays.remove(&key))
            .collect()
    }
}

impl<H> Default for OverlayRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
