//! # Homepoll Storage 模块
//!
//! 时序存储抽象层：流水线只依赖 [`TimeSeriesStore`]，线格式由具体实现负责。
//!
//! ## 模块说明
//!
//! - [`traits`]：存储接口（`create_database` 幂等、`write_points` 单请求批量写入）
//! - [`error`]：存储错误类型
//! - [`line_protocol`]：InfluxDB 行协议编码
//! - [`influx`]：InfluxDB 1.x HTTP 实现（reqwest，带请求超时）
//! - [`in_memory`]：内存实现，记录每次写请求，可注入故障，供测试使用
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use homepoll_storage::{InfluxConfig, InfluxStore, TimePrecision, TimeSeriesStore};
//!
//! let store = InfluxStore::new(InfluxConfig {
//!     url: "http://localhost:8086".to_string(),
//!     username: Some("root".to_string()),
//!     password: Some("root".to_string()),
//!     timeout: std::time::Duration::from_secs(10),
//! })?;
//! store.create_database("local").await?;
//! store.write_points(&points, "local", TimePrecision::Milliseconds).await?;
//! ```

pub mod error;
pub mod in_memory;
pub mod influx;
pub mod line_protocol;
pub mod traits;

pub use error::*;
pub use in_memory::{InMemoryTimeSeriesStore, WriteRequest};
pub use influx::{InfluxConfig, InfluxStore};
pub use traits::*;
