//! in-process backend: keeps the last `capacity` points, nothing survives a restart

use super::ReadingStore;
use crate::domain::StoredPoint;
use crate::error::StorageError;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

pub struct MemoryStore {
    capacity: usize,
    points: Mutex<VecDeque<StoredPoint>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            points: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
        }
    }

    /// append a point with an explicit timestamp, evicting the oldest when full
    pub fn insert(&self, point: StoredPoint) {
        let mut points = self.points.lock().unwrap_or_else(|e| e.into_inner());
        if points.len() == self.capacity {
            points.pop_front();
        }
        points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn write(&self, color: &str) -> Result<(), StorageError> {
        self.insert(StoredPoint { value: color.to_string(), time: Utc::now() });
        Ok(())
    }

    async fn query_recent(
        &self,
        window_minutes: u32,
        limit: usize,
    ) -> Result<Vec<StoredPoint>, StorageError> {
        let cutoff = Utc::now() - Duration::minutes(i64::from(window_minutes));
        let mut recent: Vec<StoredPoint> = {
            let points = self.points.lock().unwrap_or_else(|e| e.into_inner());
            points.iter().filter(|p| p.time >= cutoff).cloned().collect()
        };
        recent.sort_by_key(|p| p.time);

        let skip = recent.len().saturating_sub(limit);
        Ok(recent.split_off(skip))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(value: &str, minutes_ago: i64) -> StoredPoint {
        StoredPoint { value: value.into(), time: Utc::now() - Duration::minutes(minutes_ago) }
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let store = MemoryStore::new(8);
        assert!(store.query_recent(10, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn window_excludes_old_points() {
        let store = MemoryStore::new(8);
        store.insert(point("old", 30));
        store.insert(point("new", 1));

        let recent = store.query_recent(10, 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].value, "new");
    }

    #[tokio::test]
    async fn limit_keeps_most_recent_oldest_first() {
        let store = MemoryStore::new(64);
        for i in 0..15 {
            store.insert(point(&format!("c{}", i), 15 - i));
        }
        // c0..c5 fall outside the 10 minute window
        let recent = store.query_recent(10, 3).await.unwrap();
        let values: Vec<_> = recent.iter().map(|p| p.value.as_str()).collect();
        assert_eq!(values, ["c12", "c13", "c14"]);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest() {
        let store = MemoryStore::new(2);
        store.write("a").await.unwrap();
        store.write("b").await.unwrap();
        store.write("c").await.unwrap();

        assert_eq!(store.len(), 2);
        let values: Vec<_> =
            store.query_recent(10, 10).await.unwrap().into_iter().map(|p| p.value).collect();
        assert_eq!(values, ["b", "c"]);
    }
}
