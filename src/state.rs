use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::models::courier::Courier;
use crate::models::drop_point::DropPoint;
use crate::models::event::OrderEvent;
use crate::observability::metrics::Metrics;
use crate::store::OrderStore;

pub struct AppState {
    pub orders: OrderStore,
    pub couriers: DashMap<Uuid, Courier>,
    pub drop_points: DashMap<Uuid, DropPoint>,
    pub blob_store: Arc<dyn BlobStore>,
    pub order_events_tx: broadcast::Sender<OrderEvent>,
    pub metrics: Metrics,
    /// Serializes `accept` per courier so the busy check and the status
    /// write happen as one step.
    pub courier_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    pub order_number_prefix: String,
    pub loyalty_point_rate: f64,
    pub max_upload_bytes: usize,
    pub upload_dir: String,
    pub upload_base_url: String,
}

impl AppState {
    pub fn new(config: &Config, blob_store: Arc<dyn BlobStore>) -> Self {
        let (order_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            orders: OrderStore::new(),
            couriers: DashMap::new(),
            drop_points: DashMap::new(),
            blob_store,
            order_events_tx,
            metrics: Metrics::new(),
            courier_locks: DashMap::new(),
            order_number_prefix: config.order_number_prefix.clone(),
            loyalty_point_rate: config.loyalty_point_rate,
            max_upload_bytes: config.max_upload_bytes,
            upload_dir: config.upload_dir.clone(),
            upload_base_url: config.upload_base_url.clone(),
        }
    }

    pub fn courier_lock(&self, courier_id: Uuid) -> Arc<Mutex<()>> {
        self.courier_locks
            .entry(courier_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop points in creation order, so distance ties resolve the same way
    /// on every call.
    pub fn drop_points_snapshot(&self) -> Vec<DropPoint> {
        let mut points: Vec<DropPoint> = self
            .drop_points
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        points.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        points
    }
}
