/// Recent activity log, capped to the last 20 runs (most recent first)

use crate::settings::keys;
use crate::storage::{self, KeyValueStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_ACTIVITIES: usize = 20;

/// Longest text excerpt kept for a text activity
const TEXT_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Extract,
    Chart,
    Analyze,
    Text,
}

impl ActivityAction {
    pub fn label(&self) -> &'static str {
        match self {
            ActivityAction::Extract => "Data Extraction",
            ActivityAction::Chart => "Chart Creation",
            ActivityAction::Analyze => "Image Analysis",
            ActivityAction::Text => "Text Extraction",
        }
    }

    /// Parse a menu `data-action` value
    pub fn from_menu(action: &str) -> Option<ActivityAction> {
        match action {
            "extract" => Some(ActivityAction::Extract),
            "chart" => Some(ActivityAction::Chart),
            "analyze" => Some(ActivityAction::Analyze),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub action: ActivityAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub timestamp: f64,
    pub status: ActivityStatus,
}

impl Activity {
    pub fn for_image(action: ActivityAction, image_url: &str, timestamp: f64) -> Activity {
        Activity {
            id: Uuid::new_v4().to_string(),
            action,
            image_url: Some(image_url.to_string()),
            text: None,
            timestamp,
            status: ActivityStatus::Processing,
        }
    }

    pub fn for_text(text: &str, timestamp: f64) -> Activity {
        Activity {
            id: Uuid::new_v4().to_string(),
            action: ActivityAction::Text,
            image_url: None,
            text: Some(text.chars().take(TEXT_EXCERPT_CHARS).collect()),
            timestamp,
            status: ActivityStatus::Processing,
        }
    }
}

/// Stored activity list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityLog {
    pub activities: Vec<Activity>,
}

impl ActivityLog {
    pub fn new() -> Self {
        ActivityLog {
            activities: Vec::new(),
        }
    }

    /// Insert at the front, evicting the oldest entries beyond the cap
    pub fn record(&mut self, activity: Activity) {
        self.activities.insert(0, activity);
        self.activities.truncate(MAX_ACTIVITIES);
    }

    pub fn update_status(&mut self, id: &str, status: ActivityStatus) -> bool {
        self.activities
            .iter_mut()
            .find(|a| a.id == id)
            .map(|activity| {
                activity.status = status;
            })
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.activities
            .iter()
            .filter(|a| a.status == ActivityStatus::Completed)
            .count()
    }

    pub async fn load(store: &dyn KeyValueStore) -> ActivityLog {
        storage::get_value(store, keys::ACTIVITIES, ActivityLog::new()).await
    }

    pub async fn save(&self, store: &dyn KeyValueStore) {
        storage::set_value(store, keys::ACTIVITIES, self).await;
    }
}

/// Load, record and save in one step
pub async fn record_activity(store: &dyn KeyValueStore, activity: Activity) {
    let mut log = ActivityLog::load(store).await;
    log.record(activity);
    log.save(store).await;
}

pub async fn finish_activity(store: &dyn KeyValueStore, id: &str, status: ActivityStatus) {
    let mut log = ActivityLog::load(store).await;
    if log.update_status(id, status) {
        log.save(store).await;
    } else {
        log::debug!("Activity {} already evicted", id);
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn create_test_activity(n: usize) -> Activity {
        Activity::for_image(
            ActivityAction::Extract,
            &format!("https://example.com/{}.png", n),
            1698508200000.0 + n as f64,
        )
    }

    #[test]
    fn test_record_most_recent_first() {
        let mut log = ActivityLog::new();
        log.record(create_test_activity(1));
        log.record(create_test_activity(2));

        assert_eq!(log.len(), 2);
        assert_eq!(log.activities[0].image_url.as_deref(), Some("https://example.com/2.png"));
        assert_eq!(log.activities[1].image_url.as_deref(), Some("https://example.com/1.png"));
    }

    #[test]
    fn test_record_caps_at_twenty() {
        for n in [1usize, 19, 20, 21, 45] {
            let mut log = ActivityLog::new();
            for i in 0..n {
                log.record(create_test_activity(i));
            }

            assert_eq!(log.len(), n.min(MAX_ACTIVITIES));
            let newest = format!("https://example.com/{}.png", n - 1);
            assert_eq!(log.activities[0].image_url.as_deref(), Some(newest.as_str()));
        }
    }

    #[test]
    fn test_update_status() {
        let mut log = ActivityLog::new();
        let activity = create_test_activity(1);
        let id = activity.id.clone();
        log.record(activity);

        assert!(log.update_status(&id, ActivityStatus::Completed));
        assert_eq!(log.activities[0].status, ActivityStatus::Completed);
        assert_eq!(log.completed_count(), 1);
        assert!(!log.update_status("nonexistent", ActivityStatus::Failed));
    }

    #[test]
    fn test_text_activity_excerpt() {
        let long = "word ".repeat(100);
        let activity = Activity::for_text(&long, 0.0);

        assert_eq!(activity.action, ActivityAction::Text);
        assert_eq!(activity.text.unwrap().chars().count(), 200);
        assert!(activity.image_url.is_none());
    }

    #[test]
    fn test_serialization_shape() {
        let mut activity = create_test_activity(3);
        activity.id = "a-1".to_string();

        let json = serde_json::to_value(&activity).unwrap();

        assert_eq!(json["imageUrl"], "https://example.com/3.png");
        assert_eq!(json["action"], "extract");
        assert_eq!(json["status"], "processing");
        assert!(json.get("text").is_none());
    }

    #[test]
    fn test_from_menu() {
        assert_eq!(ActivityAction::from_menu("chart"), Some(ActivityAction::Chart));
        assert_eq!(ActivityAction::from_menu("delete"), None);
    }

    #[tokio::test]
    async fn test_record_and_finish_through_store() {
        let store = MemoryStore::new();
        let activity = create_test_activity(1);
        let id = activity.id.clone();

        record_activity(&store, activity).await;
        finish_activity(&store, &id, ActivityStatus::Failed).await;

        let log = ActivityLog::load(&store).await;
        assert_eq!(log.len(), 1);
        assert_eq!(log.activities[0].status, ActivityStatus::Failed);
    }

    #[tokio::test]
    async fn test_store_holds_at_most_twenty() {
        let store = MemoryStore::new();
        for i in 0..25 {
            record_activity(&store, create_test_activity(i)).await;
        }

        let log = ActivityLog::load(&store).await;
        assert_eq!(log.len(), MAX_ACTIVITIES);
        assert_eq!(log.activities[0].image_url.as_deref(), Some("https://example.com/24.png"));
    }
}
