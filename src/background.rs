/// Background script: session check on startup and the error log sink

use crate::api::ApiClient;
use crate::browser::{self, ChromeStore, ErrorReport, RuntimeMessage};
use crate::session;
use crate::settings::ApiConfig;
use wasm_bindgen_futures::spawn_local;

pub fn start() {
    browser::on_install_or_startup(|reason| {
        log::info!("Extension {}, validating session", reason);
        spawn_local(async {
            let api = ApiClient::new(ApiConfig::default());
            let authenticated = session::validate_session(&ChromeStore, &api).await;
            log::info!("Session valid: {}", authenticated);
        });
    });

    browser::on_message(|message| match message {
        RuntimeMessage::LogError { error } => log_report(&error),
    });
}

fn log_report(report: &ErrorReport) {
    match &report.stack {
        Some(stack) => log::error!("[{}] {}\n{}", report.source, report.message, stack),
        None => log::error!("[{}] {}", report.source, report.message),
    }
}
