// workspace_client/src/conversion/codec.rs

//! 光谱数据的二进制编解码：Base64 文本 ↔ 小端 IEEE-754 单精度浮点数组。

use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Base64 解码失败: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("字节长度 {0} 不是 4 的整数倍")]
    Length(usize),
}

/// 解码 Base64 文本为 `f32` 数组，逐位保持原始比特。
pub fn decode_f32_base64(encoded: &str) -> Result<Vec<f32>, DecodeError> {
    let bytes = general_purpose::STANDARD.decode(encoded.trim())?;
    if bytes.len() % 4 != 0 {
        return Err(DecodeError::Length(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// `decode_f32_base64` 的逆操作。
pub fn encode_f32_base64(values: &[f32]) -> String {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    general_purpose::STANDARD.encode(bytes)
}
