//! # download-sync
//!
//! Client-side synchronization engine for download tasks run by a remote agent.
//!
//! ## Design Philosophy
//!
//! download-sync is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Identity-preserving** - Task handles stay live across snapshots
//! - **Sensible defaults** - Works out of the box against a local agent
//!
//! The agent pushes periodic snapshots of its tasks over a WebSocket. A
//! [`DownloadManager`] merges them into a [`TaskRegistry`](task::TaskRegistry),
//! derives progress and a smoothed speed per task, and keeps tracked entities
//! (such as [`TrackedVideo`]) linked to the tasks they reference.
//!
//! ## Quick Start
//!
//! ```no_run
//! use download_sync::{Config, DownloadManager, TrackedVideo, VideoRecord};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = DownloadManager::connect(Config::default())?;
//!
//!     // Follow a video's download tasks
//!     let record: VideoRecord = serde_json::from_str(
//!         r#"{"id": 1, "title": "clip", "video_dl_id": "t1", "thumb_dl_id": "t2"}"#,
//!     )?;
//!     let video = TrackedVideo::shared(record);
//!     manager.track(video.clone());
//!
//!     // Subscribe to events
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     download_sync::run_with_shutdown(manager).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Entity to task linkage
pub mod link;
/// Synchronization controller
pub mod manager;
/// Remote task actions
pub mod remote;
/// Typed streaming socket
pub mod socket;
/// Task model, speed estimation, and registry
pub mod task;
/// Core types and events
pub mod types;
/// Videos linked to their download tasks
pub mod video;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{Config, ServerConfig, SpeedConfig, SyncConfig};
pub use error::{Error, Result, SocketError, TaskError};
pub use link::{SharedLink, TaskLink};
pub use manager::{DownloadManager, SessionEnd};
pub use remote::{HttpTaskApi, TaskApi};
pub use socket::{SocketState, TypedSocket};
pub use task::{DownloadTask, SharedTask, TaskRegistry};
pub use types::{Event, ServerMessage, TaskId, TaskRecord, TaskState, VideoRecord};
pub use video::{SharedVideo, TrackedVideo};

/// Run the manager until a termination signal arrives or its session ends.
///
/// Either way the manager is destroyed before this returns, and the way the
/// session ended is reported.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use download_sync::{Config, DownloadManager, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = DownloadManager::connect(Config::default())?;
///
///     // Run with automatic signal handling
///     let end = run_with_shutdown(manager).await;
///     println!("session ended: {:?}", end);
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: DownloadManager) -> Option<SessionEnd> {
    tokio::select! {
        _ = wait_for_signal() => {}
        end = manager.join() => {
            tracing::info!(end = ?end, "download session ended before shutdown signal");
        }
    }

    manager.destroy();
    manager.join().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
