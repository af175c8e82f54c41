/// Text selection rules for the popover

use crate::settings::Settings;
use regex::Regex;
use std::sync::LazyLock;

/// Hebrew, Arabic, Arabic Supplement and Arabic Extended-A
static RTL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\u{0590}-\u{05FF}\u{0600}-\u{06FF}\u{0750}-\u{077F}\u{08A0}-\u{08FF}]")
        .expect("valid RTL pattern")
});

pub const PANEL_WIDTH: f64 = 400.0;
pub const PANEL_OFFSET: f64 = 10.0;
pub const VIEWPORT_PADDING: f64 = 8.0;

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Whether a mouse-up should open the popover for `text`
pub fn should_open(inside_popover: bool, text: &str, settings: &Settings) -> bool {
    !inside_popover && settings.enabled && word_count(text) > settings.min_words
}

pub fn is_rtl(text: &str) -> bool {
    RTL_PATTERN.is_match(text)
}

/// Viewport rectangle of the selected range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SelectionRect {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Document position of the invisible marker the panel hangs from:
/// horizontally centered on the selection, just below it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub left: f64,
    pub top: f64,
}

impl Anchor {
    pub fn below(rect: &SelectionRect, scroll_y: f64) -> Anchor {
        Anchor {
            left: rect.left + rect.width / 2.0,
            top: rect.bottom() + scroll_y,
        }
    }

    /// Top-left corner of the panel, kept inside the viewport width
    pub fn panel_position(&self, viewport_width: f64) -> (f64, f64) {
        let max_left = (viewport_width - PANEL_WIDTH - VIEWPORT_PADDING).max(VIEWPORT_PADDING);
        let left = (self.left - PANEL_WIDTH / 2.0).clamp(VIEWPORT_PADDING, max_left);
        (left, self.top + PANEL_OFFSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(min_words: usize) -> Settings {
        Settings {
            min_words,
            ..Settings::default()
        }
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
        assert_eq!(word_count(" one  two\nthree\tfour "), 4);
    }

    #[test]
    fn test_should_open_threshold() {
        let settings = settings(5);

        assert!(!should_open(false, "one two three four five", &settings));
        assert!(should_open(false, "one two three four five six", &settings));
    }

    #[test]
    fn test_should_not_open_inside_popover() {
        let settings = settings(1);
        assert!(!should_open(true, "plenty of words selected here", &settings));
    }

    #[test]
    fn test_should_not_open_when_disabled() {
        let mut settings = settings(1);
        settings.enabled = false;
        assert!(!should_open(false, "plenty of words selected here", &settings));
    }

    #[test]
    fn test_is_rtl() {
        assert!(is_rtl("مرحبا بالعالم"));
        assert!(is_rtl("שלום"));
        assert!(!is_rtl("hello world"));
    }

    #[test]
    fn test_anchor_below_selection() {
        let rect = SelectionRect {
            left: 100.0,
            top: 50.0,
            width: 200.0,
            height: 20.0,
        };

        let anchor = Anchor::below(&rect, 300.0);

        assert_eq!(anchor, Anchor { left: 200.0, top: 370.0 });
    }

    #[test]
    fn test_panel_position_clamped() {
        let anchor = Anchor { left: 20.0, top: 100.0 };
        assert_eq!(anchor.panel_position(1200.0), (8.0, 110.0));

        let anchor = Anchor { left: 1190.0, top: 100.0 };
        assert_eq!(anchor.panel_position(1200.0), (792.0, 110.0));

        let anchor = Anchor { left: 600.0, top: 0.0 };
        assert_eq!(anchor.panel_position(1200.0), (400.0, 10.0));
    }
}
