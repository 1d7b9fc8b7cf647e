// workspace_client/tests/common/mod.rs

//! 集成测试共用的转换/导入服务替身。

#![allow(dead_code)]

use base64::{engine::general_purpose, Engine as _};
use common_models::ws_payloads::{
    ImportObjectParameters, PantoneLiveCredentials, ParseFileParameters, SelectPaletteParameters,
    IMPORT_FROM_WORKSPACE_COMMAND, LIST_PANTONE_LIVE_PALETTES_COMMAND, PARSE_FILE_COMMAND,
    SELECT_PANTONE_LIVE_PALETTE_COMMAND, SET_PANTONE_LIVE_CREDENTIALS_COMMAND,
};
use rust_websocket_utils::server::transport::{receive_request, send_reply, ServerTransport, WsStream};
use rust_websocket_utils::InboundFrame;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;

pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 启动替身服务端，返回 `ws://` 地址。
pub async fn start_import_service() -> String {
    let listener = ServerTransport::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
    let addr = listener.local_addr().expect("无法获取本地监听地址");
    tokio::spawn(ServerTransport::serve(listener, import_service));
    format!("ws://{}", addr)
}

/// 按命令做出固定反应：
/// - `import-from-workspace`: ID 以 `missing` 开头返回 OBJECT_NOT_FOUND，以 `hang` 开头不回复，其余短暂延迟后成功；
/// - `parse-file`: 先推送进度；`.json` 文件把内容作为结果返回，其余返回文件信息；
/// - PantoneLIVE 命令：密码为 `wrong` 时认证失败，色板 `p-missing` 不存在。
pub async fn import_service(mut ws: WsStream, _peer: SocketAddr) {
    while let Some(Ok(request)) = receive_request(&mut ws).await {
        let id = request.id.clone();
        let reply = match request.command.as_str() {
            IMPORT_FROM_WORKSPACE_COMMAND => {
                let params: ImportObjectParameters = match request.parameters_as() {
                    Ok(p) => p,
                    Err(_) => {
                        let _ = send_reply(&mut ws, &InboundFrame::failure(id, Some("BAD_REQUEST"), None)).await;
                        continue;
                    }
                };
                if params.object_id.starts_with("hang") {
                    continue;
                }
                if params.object_id.starts_with("missing") {
                    InboundFrame::failure(id, Some("OBJECT_NOT_FOUND"), Some(&format!("no such {}", params.object_id)))
                } else {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    InboundFrame::success(
                        id,
                        json!({ "imported": params.object_id, "type": params.object_type, "applicationId": params.application_id }),
                    )
                }
            }
            PARSE_FILE_COMMAND => {
                let params: ParseFileParameters = request.parameters_as().expect("parse-file 参数无效");
                let _ = send_reply(&mut ws, &InboundFrame::progress(id.clone(), 0.5)).await;
                let bytes = general_purpose::STANDARD.decode(&params.content).expect("文件内容不是有效的 base64");
                if params.file_name.ends_with(".json") {
                    let data: Value = serde_json::from_slice(&bytes).expect("测试文件不是有效的 JSON");
                    InboundFrame::success(id, data)
                } else {
                    InboundFrame::success(id, json!({ "fileName": params.file_name, "size": bytes.len() }))
                }
            }
            SET_PANTONE_LIVE_CREDENTIALS_COMMAND => {
                let params: PantoneLiveCredentials = request.parameters_as().expect("凭据参数无效");
                if params.password == "wrong" {
                    InboundFrame::failure(id, Some("PANTONE_LIVE_AUTH_FAILED"), None)
                } else {
                    InboundFrame::success(id, json!({}))
                }
            }
            LIST_PANTONE_LIVE_PALETTES_COMMAND => InboundFrame::success(
                id,
                json!({ "palettes": [
                    { "id": "p1", "name": "Spring", "colorCount": 12 },
                    { "id": "p2", "name": "Autumn" }
                ] }),
            ),
            SELECT_PANTONE_LIVE_PALETTE_COMMAND => {
                let params: SelectPaletteParameters = request.parameters_as().expect("色板参数无效");
                if params.palette_id == "p-missing" {
                    InboundFrame::failure(id, Some("PANTONE_LIVE_PALETTE_NOT_FOUND"), Some(&params.palette_id))
                } else {
                    InboundFrame::success(id, json!({ "selected": params.palette_id }))
                }
            }
            other => InboundFrame::failure(id, Some("UNKNOWN_COMMAND"), Some(other)),
        };
        if send_reply(&mut ws, &reply).await.is_err() {
            break;
        }
    }
}

/// 一份只含一个 ma9x 光谱条目的设备测量载荷。
pub fn measurement_payload_json() -> Value {
    let values: Vec<f32> = (0..31).map(|i| i as f32 / 100.0).collect();
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    json!({
        "measurementData": {
            "device": { "model": "MA-T12", "serialNumber": "SN-042", "firmwareVersion": "2.1" },
            "measurementSet": {
                "id": "set-1",
                "timestamp": 1_700_000_000,
                "measurements": [{
                    "colorValues": {
                        "ma9x": [{
                            "geometry": "r45as15",
                            "spectral": {
                                "wavelengthStart": 400,
                                "wavelengthInterval": 10,
                                "values": general_purpose::STANDARD.encode(bytes)
                            }
                        }]
                    }
                }]
            }
        }
    })
}
