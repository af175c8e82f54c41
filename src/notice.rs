/// User-facing notices raised by the workflow and the popup

use crate::workflow::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeKind {
    pub fn css_suffix(&self) -> &'static str {
        match self {
            NoticeKind::Info => "info",
            NoticeKind::Success => "success",
            NoticeKind::Warning => "warning",
            NoticeKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn new(title: &str, message: &str, kind: NoticeKind) -> Notice {
        Notice {
            title: title.to_string(),
            message: message.to_string(),
            kind,
        }
    }

    pub fn auth_required() -> Notice {
        Notice::new(
            "Authentication Required",
            "Please log in to the extension to use this feature",
            NoticeKind::Warning,
        )
    }

    pub fn no_credits() -> Notice {
        Notice::new(
            "No Credits",
            "You have no credits left. Please purchase more credits.",
            NoticeKind::Warning,
        )
    }

    pub fn rate_limited() -> Notice {
        Notice::new(
            "Rate Limited",
            "Too many requests. Please wait a moment and try again.",
            NoticeKind::Error,
        )
    }

    pub fn processing_failed() -> Notice {
        Notice::new("Processing Failed", "Failed to extract data.", NoticeKind::Error)
    }

    pub fn started(label: &str) -> Notice {
        Notice::new(
            "Processing Started",
            &format!("{} has started. You will be notified when it's complete.", label),
            NoticeKind::Info,
        )
    }

    pub fn completed(label: &str) -> Notice {
        Notice::new(
            "Processing Complete",
            &format!("{} finished. Your dataset and chart are ready.", label),
            NoticeKind::Success,
        )
    }

    pub fn from_error(error: &WorkflowError) -> Notice {
        match error {
            WorkflowError::AuthRequired => Notice::auth_required(),
            WorkflowError::NoCredits => Notice::no_credits(),
            WorkflowError::Api(e) if e.is_rate_limited() => Notice::rate_limited(),
            WorkflowError::Api(_) => Notice::processing_failed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;

    #[test]
    fn test_rate_limit_notice_is_distinct() {
        let limited = Notice::from_error(&WorkflowError::Api(ApiError::RateLimited {
            endpoint: "/api/snap/text".to_string(),
        }));
        let failed = Notice::from_error(&WorkflowError::Api(ApiError::Status {
            endpoint: "/api/snap/text".to_string(),
            status: 500,
            body: String::new(),
        }));

        assert_eq!(limited, Notice::rate_limited());
        assert_eq!(failed, Notice::processing_failed());
        assert_ne!(limited.message, failed.message);
    }

    #[test]
    fn test_auth_notice() {
        let notice = Notice::from_error(&WorkflowError::AuthRequired);
        assert_eq!(notice.kind, NoticeKind::Warning);
        assert!(notice.message.contains("log in"));
    }

    #[test]
    fn test_started_message() {
        let notice = Notice::started("Chart Creation");
        assert!(notice.message.starts_with("Chart Creation has started"));
    }
}
