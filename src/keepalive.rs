use std::time::Duration;

/// Spawn the periodic self-ping used to stop a hosting platform from idling
/// the process. Failures are logged and never affect the server.
pub fn spawn(url: String, interval_secs: u64) {
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        // The first tick fires immediately; skip it so we don't ping before
        // the listener is up.
        interval.tick().await;

        loop {
            interval.tick().await;
            match client.get(&url).send().await {
                Ok(resp) => tracing::debug!(status = %resp.status(), "keep-alive ping"),
                Err(e) => tracing::warn!("keep-alive ping to {url} failed: {e}"),
            }
        }
    });
}
