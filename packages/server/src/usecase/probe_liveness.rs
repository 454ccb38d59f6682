//! UseCase: liveness 監視処理
//!
//! 周期スイープ 1 回分のロジック。フラグが既に false の接続は強制切断し、
//! それ以外はフラグを落として probe（ping）を送る。pong 応答がフラグを
//! true に戻す。応答しない接続は最悪 2 周期以内に追放される。
//!
//! 追放は close フレームの送信のみを行う。レジストリからの削除と退出通知は
//! ソケットタスクの終了に伴う通常の切断経路（DisconnectPeerUseCase）に
//! 任せる。二重の後始末を避けるため。

use std::sync::Arc;

use crate::domain::{BrokerRepository, MessagePusher, PeerId};

/// スイープ 1 回分の結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivenessSweep {
    /// probe を送った接続
    pub pinged: Vec<PeerId>,
    /// 強制切断した接続
    pub evicted: Vec<PeerId>,
}

/// liveness 監視のユースケース
pub struct ProbeLivenessUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn BrokerRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
}

impl ProbeLivenessUseCase {
    pub fn new(
        repository: Arc<dyn BrokerRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
        }
    }

    /// スイープを 1 回実行
    pub async fn execute(&self) -> LivenessSweep {
        let snapshot = self.repository.liveness_snapshot().await;
        let mut sweep = LivenessSweep::default();

        for (peer_id, alive) in snapshot {
            if !alive {
                tracing::info!(
                    "Peer '{}' failed liveness probe, terminating connection",
                    peer_id.as_str()
                );
                if let Err(e) = self.message_pusher.close(&peer_id).await {
                    tracing::warn!(
                        "Failed to close unresponsive peer '{}': {}",
                        peer_id.as_str(),
                        e
                    );
                }
                sweep.evicted.push(peer_id);
                continue;
            }

            self.repository.set_alive(&peer_id, false).await;
            if let Err(e) = self.message_pusher.ping(&peer_id).await {
                tracing::warn!("Failed to ping peer '{}': {}", peer_id.as_str(), e);
            }
            sweep.pinged.push(peer_id);
        }

        sweep
    }

    /// probe 応答を記録（liveness フラグを true に戻す）
    pub async fn mark_alive(&self, peer_id: &PeerId) {
        self.repository.set_alive(peer_id, true).await;
    }
}
