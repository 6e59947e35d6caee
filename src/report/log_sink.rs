//! Snapshot subscriber that writes structured `tracing` events

use std::sync::Arc;
use tracing::{debug, info};

use crate::core::{PostureSnapshot, Status};
use crate::engine::{SnapshotPublisher, SubscriptionId};

pub struct LogSink;

impl LogSink {
    /// Subscribe to `publisher`; every published snapshot is logged
    pub fn attach(publisher: &SnapshotPublisher) -> SubscriptionId {
        publisher.subscribe(|snapshot: Arc<PostureSnapshot>| Self::record(&snapshot))
    }

    pub fn record(snapshot: &PostureSnapshot) {
        let count = |status: Status| snapshot.results.iter().filter(|r| r.status == status).count();

        info!(
            sequence = snapshot.sequence,
            score = snapshot.score,
            band = %snapshot.band,
            ok = count(Status::Ok),
            warn = count(Status::Warn),
            critical = count(Status::Critical),
            unknown = count(Status::Unknown),
            "Posture snapshot"
        );

        for result in snapshot.results.iter().filter(|r| r.status != Status::Ok) {
            debug!(
                probe = %result.id,
                section = %result.section,
                status = %result.status,
                stale = result.staleness,
                detail = %result.detail,
                "Posture finding"
            );
        }
    }
}
