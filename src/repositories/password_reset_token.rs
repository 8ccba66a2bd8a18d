use sqlx::{PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::PasswordResetToken;

#[derive(Clone)]
pub struct PasswordResetTokenRepository {
    pool: PgPool,
}

impl PasswordResetTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 新しいパスワードリセットトークンを作成
    ///
    /// 既存トークンの無効化と同一トランザクションで実行できるよう executor を受け取る
    ///
    /// # Arguments
    /// * `user_id` - 対象ユーザーのID
    /// * `token_hash` - トークンのSHA256ハッシュ
    /// * `expires_at` - 有効期限
    pub async fn create(
        &self,
        executor: impl PgExecutor<'_>,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<PasswordResetToken, sqlx::Error> {
        sqlx::query_as::<_, PasswordResetToken>(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at, used_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(executor)
        .await
    }

    /// 対象ユーザーの未使用トークンをすべて使用済みにする
    ///
    /// 新しいトークン発行時に呼び出し、有効な未使用トークンが
    /// 同時に複数存在しないようにする
    ///
    /// # Returns
    /// 無効化された行数
    pub async fn invalidate_unused_for_user(
        &self,
        executor: impl PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE password_reset_tokens
            SET used_at = NOW()
            WHERE user_id = $1 AND used_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// トークンハッシュでトークンを検索
    ///
    /// # Note
    /// 有効期限や使用済みフラグの検証は呼び出し側で行う
    pub async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<PasswordResetToken>, sqlx::Error> {
        sqlx::query_as::<_, PasswordResetToken>(
            r#"
            SELECT id, user_id, token_hash, expires_at, used_at, created_at
            FROM password_reset_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
    }

    /// トークンを消費（未使用の場合のみ使用済みにマーク）
    ///
    /// used_at IS NULL を条件に含めることで、同一トークンへの並行リクエストは
    /// どちらか一方だけが成功する
    ///
    /// # Returns
    /// 消費に成功したかどうか（false = 既に別のリクエストが消費済み）
    pub async fn consume(
        &self,
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE password_reset_tokens
            SET used_at = NOW()
            WHERE id = $1 AND used_at IS NULL
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
