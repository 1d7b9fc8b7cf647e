// workspace_client/src/rpc/mod.rs

//! 套接字 RPC 客户端、会话池与错误码表。

pub mod error_codes;
pub mod pool;
pub mod service;

pub use pool::SessionPool;
pub use service::{RpcClient, UploadOutcome};
