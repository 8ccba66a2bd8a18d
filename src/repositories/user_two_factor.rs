use sqlx::PgPool;
use uuid::Uuid;

use crate::models::UserTwoFactor;

#[derive(Clone)]
pub struct UserTwoFactorRepository {
    pool: PgPool,
}

impl UserTwoFactorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// ユーザーIDで2FA状態を検索
    pub async fn find_by_user_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<UserTwoFactor>, sqlx::Error> {
        sqlx::query_as::<_, UserTwoFactor>(
            r#"
            SELECT user_id, secret_encrypted, enabled, created_at, updated_at
            FROM user_two_factor
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// 確認待ちシークレットを登録（既存行は無条件で上書き）
    ///
    /// 設定開始のたびに新しいシークレットを発行するため upsert にしている。
    /// 上書きされた古い未確認シークレット（スキャン前のQRコード）は無効になる。
    /// enabled は必ず false に戻る。
    pub async fn upsert_pending(
        &self,
        user_id: Uuid,
        secret_encrypted: &[u8],
    ) -> Result<UserTwoFactor, sqlx::Error> {
        sqlx::query_as::<_, UserTwoFactor>(
            r#"
            INSERT INTO user_two_factor (user_id, secret_encrypted)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET secret_encrypted = EXCLUDED.secret_encrypted,
                enabled = false,
                updated_at = NOW()
            RETURNING user_id, secret_encrypted, enabled, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(secret_encrypted)
        .fetch_one(&self.pool)
        .await
    }

    /// 2FAを有効化（シークレットはそのまま）
    pub async fn enable(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE user_two_factor
            SET enabled = true, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 2FA状態を削除（enabled フラグとシークレットを同時に消す）
    pub async fn delete(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            DELETE FROM user_two_factor
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
