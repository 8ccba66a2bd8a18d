use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::{PasswordResetTokenRepository, UserRepository};
use crate::services::auth::hash_password;
use crate::services::email::EmailService;
use crate::services::notify::NotifyClient;

/// パスワードリセットサービス
#[derive(Clone)]
pub struct PasswordResetService {
    pool: PgPool,
    user_repo: UserRepository,
    token_repo: PasswordResetTokenRepository,
    email_service: EmailService,
    notify_client: NotifyClient,
    config: Arc<Config>,
}

impl PasswordResetService {
    /// 新しい PasswordResetService を作成
    pub fn new(
        pool: PgPool,
        user_repo: UserRepository,
        token_repo: PasswordResetTokenRepository,
        email_service: EmailService,
        notify_client: NotifyClient,
        config: Arc<Config>,
    ) -> Self {
        Self {
            pool,
            user_repo,
            token_repo,
            email_service,
            notify_client,
            config,
        }
    }

    /// パスワードリセットをリクエスト
    ///
    /// 既存の未使用トークンの無効化と新規トークンの作成を同一トランザクションで
    /// 行い、有効な未使用トークンが常に高々1つになるようにする。
    ///
    /// # Returns
    /// ユーザーが存在した場合は平文トークン。レスポンスに含めるかどうかは
    /// ハンドラー側が expose_reset_token 設定で決める。
    ///
    /// # Security
    /// - ユーザーが存在しない場合も成功として返す（存在有無の漏洩防止）
    /// - トークン（平文）はログに出力しない
    pub async fn request_reset(&self, email: &str) -> Result<Option<String>, AppError> {
        tracing::info!(email = %email, "パスワードリセットリクエスト");

        let user = self.user_repo.find_by_email(email).await?;

        // ユーザーが存在しない場合も成功を返す（情報漏洩防止）
        let user = match user {
            Some(u) => u,
            None => {
                tracing::info!(email = %email, "パスワードリセット: ユーザー不在（成功レスポンス返却）");
                return Ok(None);
            }
        };

        // 32バイトランダムトークン生成
        let token = generate_token();

        // SHA256ハッシュ化（DBには平文を置かない）
        let token_hash = hash_token(&token);

        let expires_at = OffsetDateTime::now_utc()
            + Duration::seconds(self.config.password_reset_token_ttl_secs);

        // 既存トークンの無効化と新規作成をアトミックに行う
        let mut tx = self.pool.begin().await?;
        let superseded = self
            .token_repo
            .invalidate_unused_for_user(&mut *tx, user.id)
            .await?;
        self.token_repo
            .create(&mut *tx, user.id, &token_hash, expires_at)
            .await?;
        tx.commit().await?;

        if superseded > 0 {
            tracing::info!(user_id = %user.id, count = superseded, "既存の未使用トークンを無効化");
        }

        let reset_url = self.build_reset_url(&token);

        self.email_service
            .send_password_reset_email(email, &reset_url)
            .await?;

        tracing::info!(email = %email, "パスワードリセットメール送信完了");

        Ok(Some(token))
    }

    /// パスワードをリセット
    ///
    /// トークン消費とパスワード更新は同一トランザクションで行う。
    /// 片方だけ成功した状態（パスワードは変わったがトークンは未使用のまま等）を
    /// 作らないため。
    ///
    /// # Security
    /// - 不存在・使用済み・期限切れはすべて同じエラーにまとめる（区別はログのみ）
    /// - トークン・新パスワードはログに出力しない
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        let token_hash = hash_token(token);

        let reset_token = match self.token_repo.find_by_token_hash(&token_hash).await? {
            Some(t) => t,
            None => {
                tracing::warn!("リセットトークン不一致");
                return Err(AppError::TokenInvalidOrExpired);
            }
        };

        if !reset_token.is_usable(OffsetDateTime::now_utc()) {
            tracing::warn!(
                token_id = %reset_token.id,
                used = reset_token.used_at.is_some(),
                "使用済みまたは期限切れトークン"
            );
            return Err(AppError::TokenInvalidOrExpired);
        }

        // パスワードをargon2ハッシュ化
        let password_hash = hash_password(new_password)?;

        let mut tx = self.pool.begin().await?;

        // 条件付きUPDATE: 並行リクエストに消費されていたらここで止まる
        if !self.token_repo.consume(&mut *tx, reset_token.id).await? {
            tracing::warn!(token_id = %reset_token.id, "トークンは並行リクエストが消費済み");
            return Err(AppError::TokenInvalidOrExpired);
        }

        self.user_repo
            .update_password(&mut *tx, reset_token.user_id, &password_hash)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %reset_token.user_id, "パスワードリセット完了");

        let notify = self.notify_client.clone();
        let user_id = reset_token.user_id;
        tokio::spawn(async move {
            notify
                .send(
                    user_id,
                    "パスワードが変更されました",
                    "パスワードリセットによりパスワードが変更されました。心当たりがない場合はサポートに連絡してください。",
                )
                .await;
        });

        Ok(())
    }

    /// リセットURLを構築
    fn build_reset_url(&self, token: &str) -> String {
        match &self.config.password_reset_url_base {
            Some(base) => format!("{}?token={}", base, token),
            None => format!("http://localhost:3000/password-reset?token={}", token),
        }
    }
}

/// 32バイトのランダムトークンを生成（URLセーフBase64、パディングなし）
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// トークンをSHA256でハッシュ化（16進文字列）
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_is_url_safe() {
        let token = generate_token();
        // 32バイトのパディングなしBase64 = 43文字
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_generate_token_is_unique() {
        let first = generate_token();
        let second = generate_token();
        assert_ne!(first, second);
    }

    #[test]
    fn test_hash_token_is_deterministic() {
        let token = "some-reset-token";
        assert_eq!(hash_token(token), hash_token(token));
    }

    #[test]
    fn test_hash_token_is_hex_sha256() {
        let hash = hash_token("some-reset-token");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        // 平文とは一致しない
        assert_ne!(hash, "some-reset-token");
    }
}
