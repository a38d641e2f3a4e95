//! Waiting helpers for manager events

use download_sync::Event;
use std::time::Duration;
use tokio::sync::broadcast;

/// Default wait for an event
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for the first event matching `predicate`, skipping others
///
/// Returns `None` on timeout or if the channel closes first.
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<Event>,
    predicate: F,
) -> Option<Event>
where
    F: Fn(&Event) -> bool,
{
    let result = tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => {
                    return Some(event);
                }
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    })
    .await;

    result.ok().flatten()
}

/// Wait for the next `tasks` event
pub async fn wait_for_snapshot(events: &mut broadcast::Receiver<Event>) -> Option<Event> {
    wait_for_event(events, |event| matches!(event, Event::Tasks(_))).await
}
