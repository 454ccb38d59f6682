//! MessagePusher trait 定義
//!
//! ドメイン層が必要とするメッセージ通知のインターフェースを定義します。
//! 具体的な実装（WebSocket）は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::MessagePushError;
use super::value_object::PeerId;

/// 接続ごとの送信チャンネルに流れるフレーム
///
/// テキストのほかに liveness 監視が使うプロトコルフレームを運ぶ。
/// `Close` を受けた pusher ループはフレーム送信後に停止し、接続を
/// 通常の切断経路へ導く。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// JSON 制御メッセージ
    Text(String),
    /// liveness probe
    Ping,
    /// 強制切断
    Close,
}

/// クライアントへの送信チャンネル
pub type PusherChannel = mpsc::UnboundedSender<OutboundFrame>;

/// MessagePusher trait
///
/// ルーティング（どのピアに届けるか）は UseCase 層が決め、この trait は
/// 配送だけを担う。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// クライアントの送信チャンネルを登録
    async fn register_client(&self, peer_id: PeerId, sender: PusherChannel);

    /// クライアントの送信チャンネルを登録解除
    async fn unregister_client(&self, peer_id: &PeerId);

    /// 特定のピアへテキストフレームを届ける
    async fn push_to(&self, peer_id: &PeerId, content: &str) -> Result<(), MessagePushError>;

    /// 複数のピアへテキストフレームを届ける（部分失敗を許容）
    async fn broadcast(&self, targets: Vec<PeerId>, content: &str)
    -> Result<(), MessagePushError>;

    /// liveness probe（ping フレーム）を送る
    async fn ping(&self, peer_id: &PeerId) -> Result<(), MessagePushError>;

    /// 接続を強制的に閉じる（close フレームを送り pusher ループを止める）
    async fn close(&self, peer_id: &PeerId) -> Result<(), MessagePushError>;
}
