// workspace_client/src/conversion/mod.rs

//! 设备测量载荷 → 规范化测量的转换管线。
//!
//! - `codec`: Base64 编码的小端 32 位浮点数组编解码。
//! - `geometry`: 几何条件名称与 45/0 光源滤光片组合的解析表。
//! - `pipeline`: 字段校验、逐条转换与结果汇总。

pub mod codec;
pub mod geometry;
pub mod pipeline;

pub use pipeline::convert;
