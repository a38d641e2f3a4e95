//! Shared test helpers for creating DownloadManager instances in tests.

use crate::config::Config;
use crate::manager::DownloadManager;
use crate::test_helpers::{FakeAgent, RecordingApi, closed_port_url};
use crate::types::{Event, TaskId, TaskState, VideoRecord};
use crate::video::{SharedVideo, TrackedVideo};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use url::Url;

/// Default configuration pointed at a socket base URL
pub(crate) fn test_config(socket_base: &Url) -> Config {
    let mut config = Config::default();
    config.server.socket_url = Some(socket_base.to_string());
    config
}

/// Manager connected to a fresh local agent, with a recording api
pub(crate) async fn create_test_manager() -> (DownloadManager, FakeAgent, Arc<RecordingApi>) {
    create_test_manager_with(|_| {}).await
}

/// Like [`create_test_manager`], with a configuration tweak applied first
pub(crate) async fn create_test_manager_with(
    configure: impl FnOnce(&mut Config),
) -> (DownloadManager, FakeAgent, Arc<RecordingApi>) {
    let agent = FakeAgent::spawn().await;
    let mut config = test_config(&agent.base_url());
    configure(&mut config);

    let api = Arc::new(RecordingApi::default());
    let manager = DownloadManager::new(config, api.clone()).unwrap();
    (manager, agent, api)
}

/// Manager whose socket never connects; messages are fed with `dispatch`
pub(crate) async fn create_offline_manager(api: Arc<RecordingApi>) -> DownloadManager {
    let mut base = closed_port_url().await;
    base.set_path("/");
    DownloadManager::new(test_config(&base), api).unwrap()
}

/// Next event, failing the test after two seconds
pub(crate) async fn next_event(events: &mut broadcast::Receiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// A video with the given task ids, tracked by `manager`
pub(crate) fn track_video(
    manager: &DownloadManager,
    video_dl_id: Option<&str>,
    thumb_dl_id: Option<&str>,
) -> SharedVideo {
    let video = TrackedVideo::shared(VideoRecord {
        id: 7,
        title: "test video".to_string(),
        author_id: Some("author".to_string()),
        file: "video.mp4".to_string(),
        thumb: "thumb.jpg".to_string(),
        video_dl_id: video_dl_id.map(TaskId::from),
        thumb_dl_id: thumb_dl_id.map(TaskId::from),
        created: None,
    });
    manager.track(video.clone());
    video
}

/// A task record as the agent sends it
pub(crate) fn task_json(id: &str, state: TaskState, loaded: u64, size: u64) -> serde_json::Value {
    json!({"id": id, "state": state, "loaded": loaded, "size": size})
}
