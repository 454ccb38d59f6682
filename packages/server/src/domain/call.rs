//! ルームごとの通話状態機械
//!
//! 呼び出しリクエスト / 応諾 / 拒否 / 切断のワークフローを純粋な遷移関数と
//! して実装します。副作用を持たないため単体テストが容易です。
//!
//! ブローカーは遷移を記録するだけで、遷移に合致しないシグナリングの転送を
//! 拒否しません（参照実装の寛容な挙動を保存）。合致しないイベントは
//! `CallTransition::Ignored` として呼び出し側に返り、ログに残ります。

use serde::Serialize;

use super::value_object::PeerId;

/// 通話状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    /// 通話なし
    Idle,
    /// 呼び出し中（リクエスト送信済み、応答待ち）
    Ringing,
    /// 通話確立済み
    Active,
}

/// 状態機械への入力イベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// initiator が target を呼び出した
    Requested { initiator: PeerId, target: PeerId },
    /// 呼び出しが応諾された
    Accepted { by: PeerId },
    /// 呼び出しが拒否された
    Rejected { by: PeerId },
    /// どちらかが切断した
    HungUp { by: PeerId },
    /// メンバーがルームから退出した（強制終了）
    MemberDeparted { peer: PeerId },
}

/// 遷移の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTransition {
    /// 状態が遷移した
    Applied { from: CallState, to: CallState },
    /// 現在の状態では意味を持たないイベント（転送自体は行われる）
    Ignored { state: CallState },
}

/// ルームに 1 つ埋め込まれる通話セッション
#[derive(Debug, Clone, Serialize)]
pub struct CallSession {
    pub state: CallState,
    pub initiator: Option<PeerId>,
    pub responder: Option<PeerId>,
}

impl CallSession {
    pub fn new() -> Self {
        Self {
            state: CallState::Idle,
            initiator: None,
            responder: None,
        }
    }

    /// イベントを適用し、遷移の有無を返す
    pub fn apply(&mut self, event: CallEvent) -> CallTransition {
        let from = self.state;
        match (self.state, event) {
            (CallState::Idle, CallEvent::Requested { initiator, target }) => {
                self.initiator = Some(initiator);
                self.responder = Some(target);
                self.state = CallState::Ringing;
                CallTransition::Applied {
                    from,
                    to: self.state,
                }
            }
            (CallState::Ringing, CallEvent::Accepted { .. }) => {
                self.state = CallState::Active;
                CallTransition::Applied {
                    from,
                    to: self.state,
                }
            }
            (CallState::Ringing, CallEvent::Rejected { .. }) => {
                self.reset();
                CallTransition::Applied {
                    from,
                    to: self.state,
                }
            }
            (CallState::Active, CallEvent::HungUp { .. }) => {
                self.reset();
                CallTransition::Applied {
                    from,
                    to: self.state,
                }
            }
            (CallState::Ringing | CallState::Active, CallEvent::MemberDeparted { .. }) => {
                self.reset();
                CallTransition::Applied {
                    from,
                    to: self.state,
                }
            }
            (state, _) => CallTransition::Ignored { state },
        }
    }

    fn reset(&mut self) {
        self.state = CallState::Idle;
        self.initiator = None;
        self.responder = None;
    }
}

impl Default for CallSession {
    fn default() -> Self {
        Self::new()
    }
}
