use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// パスワードリセットトークン
///
/// トークン自体はハッシュ化してDBに保存（token_hash）。
/// 平文トークンはユーザーにメールで送信し、DBには保存しない。
/// 使用済み・期限切れの行も監査証跡として残す（削除しない）。
#[derive(Debug, FromRow, Serialize)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip)]
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
    pub used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl PasswordResetToken {
    /// 未使用かつ有効期限内かどうか
    ///
    /// 保存済み状態と渡された現在時刻のみで判定する（状態は変更しない）
    pub fn is_usable(&self, now: OffsetDateTime) -> bool {
        self.used_at.is_none() && now <= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn token_created_at(created_at: OffsetDateTime) -> PasswordResetToken {
        PasswordResetToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "dummy".to_string(),
            expires_at: created_at + Duration::hours(1),
            used_at: None,
            created_at,
        }
    }

    #[test]
    fn test_usable_before_expiry() {
        let created = OffsetDateTime::now_utc();
        let token = token_created_at(created);
        assert!(token.is_usable(created + Duration::minutes(59)));
    }

    #[test]
    fn test_unusable_after_expiry() {
        let created = OffsetDateTime::now_utc();
        let token = token_created_at(created);
        assert!(!token.is_usable(created + Duration::hours(1) + Duration::seconds(1)));
    }

    #[test]
    fn test_usable_exactly_at_expiry() {
        let created = OffsetDateTime::now_utc();
        let token = token_created_at(created);
        assert!(token.is_usable(created + Duration::hours(1)));
    }

    #[test]
    fn test_unusable_once_used() {
        let created = OffsetDateTime::now_utc();
        let mut token = token_created_at(created);
        token.used_at = Some(created + Duration::minutes(1));
        // 使用済みなら期限内でも無効
        assert!(!token.is_usable(created + Duration::minutes(2)));
    }
}
