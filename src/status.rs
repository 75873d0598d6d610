//! Point-in-time status shared between the control loop and the status server.

use std::sync::Arc;

use tokio::sync::RwLock;

/// Everything the remote monitor receives for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub min_temp: f64,
    pub current_temp: f64,
    pub max_temp: f64,
    /// 0-based; shown 1-based on the wire.
    pub day_index: usize,
    pub state_label: String,
    /// Recent log records, oldest first.
    pub recent: Vec<String>,
}

impl StatusSnapshot {
    /// `min,current,max,day,state,log_1,...,log_k` without a trailing delimiter.
    pub fn to_wire_line(&self) -> String {
        [
            format_temp(self.min_temp),
            format_temp(self.current_temp),
            format_temp(self.max_temp),
            (self.day_index + 1).to_string(),
            self.state_label.clone(),
        ]
        .into_iter()
        .chain(self.recent.iter().cloned())
        .collect::<Vec<_>>()
        .join(",")
    }
}

/// Shortest round-trip rendering that always keeps a fractional digit (`12.0`).
pub fn format_temp(value: f64) -> String {
    format!("{value:?}")
}

/// Single-writer, many-reader hand-off of the latest [`StatusSnapshot`].
///
/// The whole snapshot is replaced under one write lock and cloned under one
/// read lock, so readers never see fields from two different iterations.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard(Arc<RwLock<StatusSnapshot>>);

impl StatusBoard {
    pub fn new(initial: StatusSnapshot) -> Self {
        Self(Arc::new(RwLock::new(initial)))
    }

    pub async fn publish(&self, snapshot: StatusSnapshot) {
        *self.0.write().await = snapshot;
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.0.read().await.clone()
    }
}
