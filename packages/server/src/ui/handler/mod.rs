//! axum ハンドラ

pub mod http;
pub mod websocket;
