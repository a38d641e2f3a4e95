//! Common test utilities for download-sync integration tests

#[allow(dead_code)]
pub mod agent;
#[allow(dead_code)]
pub mod assertions;

pub use agent::*;
#[allow(unused_imports)]
pub use assertions::*;

use download_sync::{Config, DownloadManager};

/// Manager wired to a mock agent over both the socket and the HTTP api
#[allow(dead_code)]
pub fn create_manager(agent: &MockAgent) -> DownloadManager {
    let mut config = Config::default();
    config.server.api_url = agent.api_url();
    DownloadManager::connect(config).unwrap()
}
