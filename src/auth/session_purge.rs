use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::auth::models::Session;
use crate::auth::sessions::SESSIONS;
use crate::db::models::Lookup;
use crate::error::AppError;
use crate::resource::service::Resources;

/// Removes sessions whose last activity is older than the expiry window.
#[derive(Debug, Clone, Copy)]
pub struct RemoveExpiredSessions {
    expiry: chrono::Duration,
}

impl RemoveExpiredSessions {
    pub fn new(expiry: chrono::Duration) -> Self {
        Self { expiry }
    }

    /// Run one sweep. Returns how many sessions were removed.
    pub async fn run(&self, resources: &Resources) -> Result<usize, AppError> {
        let cutoff = Session::expiry_cutoff(Utc::now(), self.expiry);
        tracing::info!("Deleting sessions not updated since {cutoff}");

        let removed = resources
            .service(SESSIONS)?
            .delete(&Lookup::UpdatedBefore(cutoff))
            .await?;

        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "expired sessions removed");
        }
        Ok(removed.len())
    }
}

/// Run the sweep every `every`, for as long as the runtime lives.
///
/// A failing run is logged and the schedule carries on.
pub fn spawn_session_purge(
    resources: Arc<Resources>,
    sweep: RemoveExpiredSessions,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            session_purge(&resources, &sweep).await;
        }
    })
}

/// One scheduled sweep. Errors never escape.
pub async fn session_purge(resources: &Resources, sweep: &RemoveExpiredSessions) {
    if let Err(e) = sweep.run(resources).await {
        tracing::error!("session purge failed: {e}");
    }
}
