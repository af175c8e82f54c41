/// Extension configuration: API host, user settings and style catalog

use crate::storage::{self, KeyValueStore};
use std::cell::RefCell;
use std::rc::Rc;
use url::Url;

/// Storage key names used in chrome.storage.local
pub mod keys {
    pub const USER_TOKEN: &str = "userToken";
    pub const IS_LOGGED_IN: &str = "isLoggedIn";
    pub const ENABLED: &str = "enabled";
    pub const MIN_WORDS: &str = "minWords";
    pub const DEFAULT_STYLE: &str = "defaultStyle";
    pub const STYLE: &str = "style";
    pub const ACTIVITIES: &str = "activities";
    pub const USER: &str = "user";
}

pub const DEFAULT_BASE_URL: &str = "https://plotset.com";
pub const DEFAULT_MIN_WORDS: usize = 5;
pub const ORIGINAL_STYLE: &str = "Original";

/// Remote host configuration. Every endpoint and derived link is built from the base.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    base: String,
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(base_url)?;
        Ok(ApiConfig {
            base: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn preview_link(&self, project_id: &str) -> String {
        format!("{}/ai/edit-data/{}", self.base, project_id)
    }

    pub fn dataset_download_url(&self, dataset_url: &str) -> String {
        format!("{}/api/{}", self.base, dataset_url)
    }

    pub fn thumbnail_url(&self, thumbnail: &str) -> String {
        format!("{}/api/{}", self.base, thumbnail)
    }

    pub fn share_url(&self, share_id: &str) -> String {
        format!("{}/share/{}", self.base, share_id)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// User-editable settings, each persisted under its own key
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub enabled: bool,
    pub min_words: usize,
    pub default_style: String,
    pub style_map: String,
}

impl Settings {
    pub async fn load(store: &dyn KeyValueStore) -> Settings {
        Settings {
            enabled: storage::get_value(store, keys::ENABLED, true).await,
            min_words: storage::get_value(store, keys::MIN_WORDS, DEFAULT_MIN_WORDS).await,
            default_style: storage::get_value(store, keys::DEFAULT_STYLE, String::new()).await,
            style_map: storage::get_value(store, keys::STYLE, String::new()).await,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            enabled: true,
            min_words: DEFAULT_MIN_WORDS,
            default_style: String::new(),
            style_map: String::new(),
        }
    }
}

/// Named styles parsed from the `name: value` lines of the style map text
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleCatalog {
    styles: Vec<(String, String)>,
}

impl StyleCatalog {
    pub fn parse(content: &str) -> StyleCatalog {
        let mut styles: Vec<(String, String)> = Vec::new();

        for line in content.split('\n') {
            let mut parts = line.split(':');
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                continue;
            }

            // Later lines override earlier ones but keep the first position
            match styles.iter_mut().find(|(k, _)| k == key) {
                Some(existing) => existing.1 = value.to_string(),
                None => styles.push((key.to_string(), value.to_string())),
            }
        }

        StyleCatalog { styles }
    }

    /// Selector labels: every style name followed by "Original"
    pub fn labels(&self) -> Vec<String> {
        self.styles
            .iter()
            .map(|(k, _)| k.clone())
            .chain(std::iter::once(ORIGINAL_STYLE.to_string()))
            .collect()
    }

    /// Index of the stored default style, falling back to "Original"
    pub fn label_index(&self, default_style: &str) -> usize {
        self.styles
            .iter()
            .position(|(k, _)| k == default_style)
            .unwrap_or(self.styles.len())
    }
}

/// Configuration handed to the content script. Loaded once at startup and
/// refreshed from storage change notifications.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentConfig {
    pub settings: Settings,
    pub styles: StyleCatalog,
}

pub type SharedConfig = Rc<RefCell<ContentConfig>>;

impl ContentConfig {
    pub fn new(settings: Settings) -> ContentConfig {
        let styles = StyleCatalog::parse(&settings.style_map);
        ContentConfig { settings, styles }
    }

    pub async fn load(store: &dyn KeyValueStore) -> ContentConfig {
        ContentConfig::new(Settings::load(store).await)
    }

    /// Keep `shared` in sync with the persisted settings
    pub fn follow(store: &dyn KeyValueStore, shared: &SharedConfig) {
        let config = shared.clone();
        storage::subscribe_value(store, keys::ENABLED, true, move |enabled| {
            config.borrow_mut().settings.enabled = enabled;
        });

        let config = shared.clone();
        storage::subscribe_value(store, keys::MIN_WORDS, DEFAULT_MIN_WORDS, move |min_words| {
            config.borrow_mut().settings.min_words = min_words;
        });

        let config = shared.clone();
        storage::subscribe_value(store, keys::DEFAULT_STYLE, String::new(), move |style| {
            config.borrow_mut().settings.default_style = style;
        });

        let config = shared.clone();
        storage::subscribe_value(store, keys::STYLE, String::new(), move |style_map: String| {
            let mut config = config.borrow_mut();
            config.styles = StyleCatalog::parse(&style_map);
            config.settings.style_map = style_map;
        });
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_api_config_links() {
        let config = ApiConfig::default();

        assert_eq!(config.endpoint("/api/snap/text"), "https://plotset.com/api/snap/text");
        assert_eq!(config.preview_link("p1"), "https://plotset.com/ai/edit-data/p1");
        assert_eq!(
            config.dataset_download_url("uploads/data.csv"),
            "https://plotset.com/api/uploads/data.csv"
        );
        assert_eq!(config.share_url("s9"), "https://plotset.com/share/s9");
    }

    #[test]
    fn test_api_config_trims_trailing_slash() {
        let config = ApiConfig::new("http://127.0.0.1:8080/").unwrap();
        assert_eq!(config.endpoint("/api/login"), "http://127.0.0.1:8080/api/login");
        assert_eq!(config.thumbnail_url("t.png"), "http://127.0.0.1:8080/api/t.png");
    }

    #[test]
    fn test_api_config_rejects_invalid_url() {
        assert!(ApiConfig::new("not a url").is_err());
    }

    #[test]
    fn test_style_catalog_parse() {
        let catalog = StyleCatalog::parse("Short: one line\nBullets : as a list\n\ngarbage\nEmpty:");

        assert_eq!(catalog.labels(), vec!["Short", "Bullets", "Original"]);
        assert_eq!(catalog.styles[1], ("Bullets".to_string(), "as a list".to_string()));
        assert!(catalog.styles.iter().all(|(k, _)| k != "garbage"));
    }

    #[test]
    fn test_style_catalog_duplicate_keeps_position() {
        let catalog = StyleCatalog::parse("A: 1\nB: 2\nA: 3");

        assert_eq!(catalog.labels(), vec!["A", "B", "Original"]);
        assert_eq!(catalog.styles[0], ("A".to_string(), "3".to_string()));
    }

    #[test]
    fn test_style_label_index() {
        let catalog = StyleCatalog::parse("A: 1\nB: 2");

        assert_eq!(catalog.label_index("B"), 1);
        assert_eq!(catalog.label_index("missing"), 2);
        assert_eq!(catalog.label_index(""), 2);
    }

    #[tokio::test]
    async fn test_settings_defaults_when_empty() {
        let store = MemoryStore::new();
        let settings = Settings::load(&store).await;

        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_content_config_follows_changes() {
        let store = MemoryStore::new();
        let shared: SharedConfig = Rc::new(RefCell::new(ContentConfig::load(&store).await));
        ContentConfig::follow(&store, &shared);

        storage::set_value(&store, keys::MIN_WORDS, &12usize).await;
        storage::set_value(&store, keys::ENABLED, &false).await;
        storage::set_value(&store, keys::STYLE, &"Short: brief".to_string()).await;

        let config = shared.borrow();
        assert_eq!(config.settings.min_words, 12);
        assert!(!config.settings.enabled);
        assert_eq!(config.styles.labels(), vec!["Short", "Original"]);
    }
}
