//! ドメイン層の Value Object 定義
//!
//! PeerId / RoomCode / Username / Timestamp の不変条件をコンストラクタで
//! 保証します。不正な値は Domain Model として存在できません。

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Value Object のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{field} must be at most {max} characters (got {len})")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },
}

/// ブローカーが接続時に割り当てる不透明なピア ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub const MAX_LEN: usize = 64;

    pub fn new(value: String) -> Result<Self, ValidationError> {
        if value.is_empty() {
            return Err(ValidationError::Empty("peer id"));
        }
        if value.len() > Self::MAX_LEN {
            return Err(ValidationError::TooLong {
                field: "peer id",
                max: Self::MAX_LEN,
                len: value.len(),
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// PeerId の生成ファクトリ
///
/// v4 UUID をエントロピー源として 12 文字の 16 進トークンを切り出す。
/// プロセス寿命内でユニークであれば十分な空間。
pub struct PeerIdFactory;

impl PeerIdFactory {
    pub fn generate() -> PeerId {
        let token: String = Uuid::new_v4().simple().to_string().chars().take(12).collect();
        PeerId(token)
    }
}

/// 2 者ペアリングを識別する短いルームコード
///
/// 大文字・小文字を区別しない。コンストラクタで大文字に正規化する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomCode(String);

impl RoomCode {
    pub const MAX_LEN: usize = 16;

    pub fn new(value: String) -> Result<Self, ValidationError> {
        let canonical = value.trim().to_uppercase();
        if canonical.is_empty() {
            return Err(ValidationError::Empty("room code"));
        }
        if canonical.len() > Self::MAX_LEN {
            return Err(ValidationError::TooLong {
                field: "room code",
                max: Self::MAX_LEN,
                len: canonical.len(),
            });
        }
        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// RoomCode の生成ファクトリ
pub struct RoomCodeFactory;

impl RoomCodeFactory {
    const CHARSET: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    const CODE_LEN: usize = 6;

    /// 36^6 の空間から 6 文字のコードを生成する
    pub fn generate() -> RoomCode {
        let uuid = Uuid::new_v4();
        let code: String = uuid.as_bytes()[..Self::CODE_LEN]
            .iter()
            .map(|b| Self::CHARSET[(*b as usize) % Self::CHARSET.len()] as char)
            .collect();
        RoomCode(code)
    }
}

/// クライアントが申告する表示名
///
/// 空文字は "anonymous" にフォールバックする（参照実装と同じ既定値）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    pub const MAX_LEN: usize = 64;
    pub const DEFAULT: &'static str = "anonymous";

    pub fn new(value: String) -> Result<Self, ValidationError> {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            return Ok(Self(Self::DEFAULT.to_string()));
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(ValidationError::TooLong {
                field: "username",
                max: Self::MAX_LEN,
                len: trimmed.len(),
            });
        }
        Ok(Self(trimmed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Default for Username {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

/// Unix ミリ秒タイムスタンプ（UTC）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_rejects_empty() {
        // テスト項目: 空の peer id がエラーになる
        // given (前提条件):
        let value = "".to_string();

        // when (操作):
        let result = PeerId::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(ValidationError::Empty("peer id")));
    }

    #[test]
    fn test_peer_id_factory_generates_unique_ids() {
        // テスト項目: ファクトリが毎回異なる ID を生成する
        // given (前提条件):

        // when (操作):
        let a = PeerIdFactory::generate();
        let b = PeerIdFactory::generate();

        // then (期待する結果):
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 12);
    }

    #[test]
    fn test_room_code_is_canonicalized_to_uppercase() {
        // テスト項目: ルームコードが大文字に正規化される
        // given (前提条件):
        let value = "ab12cd".to_string();

        // when (操作):
        let code = RoomCode::new(value).unwrap();

        // then (期待する結果):
        assert_eq!(code.as_str(), "AB12CD");
    }

    #[test]
    fn test_room_code_rejects_empty() {
        // テスト項目: 空白のみのルームコードがエラーになる
        // given (前提条件):
        let value = "   ".to_string();

        // when (操作):
        let result = RoomCode::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(ValidationError::Empty("room code")));
    }

    #[test]
    fn test_room_code_factory_generates_six_chars() {
        // テスト項目: 生成されたコードが 6 文字の英大文字・数字である
        // given (前提条件):

        // when (操作):
        let code = RoomCodeFactory::generate();

        // then (期待する結果):
        assert_eq!(code.as_str().len(), 6);
        assert!(
            code.as_str()
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_username_falls_back_to_anonymous() {
        // テスト項目: 空の表示名が "anonymous" にフォールバックする
        // given (前提条件):
        let value = "  ".to_string();

        // when (操作):
        let username = Username::new(value).unwrap();

        // then (期待する結果):
        assert_eq!(username.as_str(), Username::DEFAULT);
    }

    #[test]
    fn test_username_rejects_oversized_input() {
        // テスト項目: 上限を超える表示名がエラーになる
        // given (前提条件):
        let value = "x".repeat(Username::MAX_LEN + 1);

        // when (操作):
        let result = Username::new(value);

        // then (期待する結果):
        assert!(matches!(result, Err(ValidationError::TooLong { .. })));
    }

    #[test]
    fn test_username_is_trimmed() {
        // テスト項目: 前後の空白が取り除かれる
        // given (前提条件):
        let value = "  alice  ".to_string();

        // when (操作):
        let username = Username::new(value).unwrap();

        // then (期待する結果):
        assert_eq!(username.as_str(), "alice");
    }
}
