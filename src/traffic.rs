use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::{thread_rng, Rng};
use tokio::time::sleep;

use crate::messages::save_record::SaveRecord;
use crate::node::NodeService;
use crate::transport::Transport;

/// Periodically sends a SAVE record to the believed leader.
///
/// Ticks are no-ops while this node is the leader or while an election is running. Returns once
/// the configured number of ticks has elapsed, otherwise runs for the process lifetime.
pub async fn traffic_loop<T>(service: Arc<NodeService<T>>)
where
    T: Transport,
{
    let traffic = service.config().traffic.clone();
    let mut ticks = 0u64;

    loop {
        if traffic.limit.is_some_and(|limit| ticks >= limit) {
            tracing::info!(ticks, "traffic generator done");
            return;
        }
        ticks += 1;

        sleep(next_pause(&traffic.interval)).await;

        let snapshot = service.snapshot().await;
        if snapshot.is_elected_self || snapshot.election_in_progress {
            tracing::trace!(
                is_elected_self = snapshot.is_elected_self,
                election_in_progress = snapshot.election_in_progress,
                "not sending"
            );
            continue;
        }

        let config = service.config();
        let record = SaveRecord {
            device_id: config.node_id,
            hostname: config.hostname.clone(),
            ip: config.ip.clone(),
            timestamp: Utc::now(),
            leader: snapshot.believed_leader,
        };

        if service.send_to_leader(&record.to_string()).await {
            tracing::trace!(leader = snapshot.believed_leader, "record sent");
        }
    }
}

fn next_pause(interval: &Range<Duration>) -> Duration {
    if interval.is_empty() {
        interval.start
    } else {
        thread_rng().gen_range(interval.clone())
    }
}
