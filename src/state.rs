use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::{PasswordResetTokenRepository, UserRepository, UserTwoFactorRepository};
use crate::services::{EmailService, NotifyClient, TotpService, TwoFactorSessionCache};
use secrecy::ExposeSecret;

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL コネクションプール
    pub db_pool: PgPool,
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// ユーザーリポジトリ
    pub user_repo: UserRepository,
    /// パスワードリセットトークンリポジトリ
    pub token_repo: PasswordResetTokenRepository,
    /// 2FA状態リポジトリ
    pub user_2fa_repo: UserTwoFactorRepository,
    /// メールサービス
    pub email_service: EmailService,
    /// TOTPサービス
    pub totp_service: TotpService,
    /// ログイン中の2FA確認済みマーカー
    pub two_factor_session: TwoFactorSessionCache,
    /// CampusFix本体の通知APIクライアント
    pub notify_client: NotifyClient,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(db_pool: PgPool, config: Config) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let user_repo = UserRepository::new(db_pool.clone());
        let token_repo = PasswordResetTokenRepository::new(db_pool.clone());
        let user_2fa_repo = UserTwoFactorRepository::new(db_pool.clone());
        let email_service = EmailService::new(config.clone());
        let totp_service = TotpService::new(
            config.totp_issuer.clone(),
            config.encryption_key.expose_secret(),
        )?;
        let two_factor_session =
            TwoFactorSessionCache::new(Duration::from_secs(config.two_factor_session_ttl_secs));
        let notify_client = NotifyClient::new(config.notification_api_url.clone());

        Ok(Self {
            db_pool,
            config,
            user_repo,
            token_repo,
            user_2fa_repo,
            email_service,
            totp_service,
            two_factor_session,
            notify_client,
        })
    }
}
