//! UseCase: ピア登録処理
//!
//! 接続ごとに一意な peer id を払い出し、接続レコードと送信チャンネルを
//! 登録します。払い出した id はハンドラが welcome メッセージで返します。

use std::sync::Arc;

use kakehashi_shared::time::get_unix_timestamp;

use crate::domain::{
    BrokerRepository, MessagePusher, Peer, PeerId, PeerIdFactory, PusherChannel, Timestamp,
};

/// ピア登録のユースケース
pub struct RegisterPeerUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn BrokerRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
}

impl RegisterPeerUseCase {
    pub fn new(
        repository: Arc<dyn BrokerRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
        }
    }

    /// ピア登録を実行
    ///
    /// # Arguments
    ///
    /// * `sender` - クライアントへのフレーム送信用チャンネル
    ///
    /// # Returns
    ///
    /// 払い出された peer id（Domain Model）
    pub async fn execute(&self, sender: PusherChannel) -> PeerId {
        let peer_id = PeerIdFactory::generate();
        let connected_at = Timestamp::new(get_unix_timestamp());

        self.repository
            .register_peer(Peer::new(peer_id.clone(), connected_at))
            .await;
        self.message_pusher
            .register_client(peer_id.clone(), sender)
            .await;

        peer_id
    }
}
