use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::{formatting::announcement, Result};

use super::RelayEngine;

/// Outcome of one broadcast fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl BroadcastReport {
    pub fn summary(&self) -> String {
        format!(
            "📢 Broadcast sent to {} users ({} delivered, {} failed).",
            self.attempted, self.delivered, self.failed
        )
    }
}

impl RelayEngine {
    /// Fan `body` out to a snapshot of every known user.
    ///
    /// A failed recipient (blocked the bot, deleted account) is counted and skipped;
    /// it never stops the others. A recipient counts as delivered only once every
    /// chunk of a long announcement went through.
    pub async fn broadcast(&self, body: &str) -> Result<BroadcastReport> {
        let users = self.directory.list_all().await?;
        if users.is_empty() {
            self.notify(self.admin, "❌ No users to broadcast to.").await;
            return Ok(BroadcastReport::default());
        }

        let html = announcement(body);
        let attempted = users.len();
        let delivered = stream::iter(users)
            .map(|user| {
                let html = &html;
                async move {
                    match self.send_chunked(user.id, html).await {
                        Ok(_) => true,
                        Err(e) => {
                            debug!(chat_id = user.id.0, error = %e, "broadcast recipient skipped");
                            false
                        }
                    }
                }
            })
            .buffer_unordered(self.broadcast_concurrency)
            .filter(|ok| futures::future::ready(*ok))
            .count()
            .await;

        let report = BroadcastReport {
            attempted,
            delivered,
            failed: attempted - delivered,
        };
        info!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "broadcast finished"
        );
        self.notify(self.admin, &report.summary()).await;
        Ok(report)
    }
}
