//! 内存存储实现模块
//!
//! 仅用于本地测试和演示；支持注入连接 / 写入故障。

pub mod timeseries;

pub use timeseries::*;
