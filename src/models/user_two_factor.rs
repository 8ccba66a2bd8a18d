use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// ユーザーの二要素認証（TOTP）状態
///
/// 行が存在しない = 未設定、enabled = false = シークレット発行済み（確認待ち）、
/// enabled = true = 有効。enabled とシークレットが同一行にあるため
/// 「有効なのにシークレットがない」状態は構造上存在しない。
///
/// シークレットは AES-256-GCM で暗号化されて保存される。
/// 平文シークレットはログに出力禁止。
#[derive(Debug, FromRow, Serialize)]
pub struct UserTwoFactor {
    pub user_id: Uuid,
    #[serde(skip)]
    pub secret_encrypted: Vec<u8>,
    pub enabled: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
