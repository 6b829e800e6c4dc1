//! 时序写入内存实现

use crate::error::StorageError;
use crate::traits::{TimePrecision, TimeSeriesStore};
use domain::Measurement;
use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// 一次写请求的记录。
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub database: String,
    pub precision: TimePrecision,
    pub points: Vec<Measurement>,
}

/// 时序写入内存存储
#[derive(Default)]
pub struct InMemoryTimeSeriesStore {
    databases: RwLock<HashSet<String>>,
    writes: RwLock<Vec<WriteRequest>>,
    connect_attempts: AtomicUsize,
    write_attempts: AtomicUsize,
    failing_connects: AtomicUsize,
    failing_writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryTimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接下来 `count` 次 `create_database` 失败。
    pub fn fail_next_connects(&self, count: usize) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    /// 接下来 `count` 次 `write_points` 失败。
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// 模拟存储持续不可用。
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.databases
            .read()
            .map(|items| items.contains(name))
            .unwrap_or(false)
    }

    /// 已成功写入的请求（按写入顺序）。
    pub fn writes(&self) -> Vec<WriteRequest> {
        self.writes.read().map(|items| items.clone()).unwrap_or_default()
    }

    /// 已成功写入的测量值总数。
    pub fn len(&self) -> usize {
        self.writes
            .read()
            .map(|items| items.iter().map(|item| item.points.len()).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn should_fail(&self, counter: &AtomicUsize) -> bool {
        if self.unavailable.load(Ordering::SeqCst) {
            return true;
        }
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait::async_trait]
impl TimeSeriesStore for InMemoryTimeSeriesStore {
    async fn create_database(&self, name: &str) -> Result<(), StorageError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail(&self.failing_connects) {
            return Err(StorageError::new("connection refused"));
        }
        let mut databases = self
            .databases
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        databases.insert(name.to_string());
        Ok(())
    }

    async fn write_points(
        &self,
        points: &[Measurement],
        database: &str,
        precision: TimePrecision,
    ) -> Result<(), StorageError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail(&self.failing_writes) {
            return Err(StorageError::new("store unavailable"));
        }
        if !self.has_database(database) {
            return Err(StorageError::new(format!("database not found: {}", database)));
        }
        let mut writes = self
            .writes
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        writes.push(WriteRequest {
            database: database.to_string(),
            precision,
            points: points.to_vec(),
        });
        Ok(())
    }
}
