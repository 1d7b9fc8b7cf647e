// workspace_client/src/workspace/mod.rs

//! 工作区 REST 接口访问。

pub mod service;

pub use service::{WorkspaceService, APPLICATION_ID_HEADER, AUTH_TOKEN_HEADER};
