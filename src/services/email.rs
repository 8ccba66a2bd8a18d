use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;

/// メール送信サービス
///
/// email フィーチャが有効で SMTP 設定が揃っていれば lettre で実際に送信する。
/// それ以外はリセットURLをログに残すだけの開発モードで動く。
#[derive(Clone)]
pub struct EmailService {
    config: Arc<Config>,
}

impl EmailService {
    /// 新しい EmailService を作成
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// パスワードリセットメールを送信
    ///
    /// # Security
    /// - リセットURLにはトークンが含まれる。本番（SMTP送信）ではログに出さない。
    ///   ログ出力するのは SMTP 未設定の開発モードのみ
    pub async fn send_password_reset_email(
        &self,
        to: &str,
        reset_url: &str,
    ) -> Result<(), AppError> {
        #[cfg(feature = "email")]
        if self.smtp_configured() {
            return self.send_via_smtp(to, reset_url).await;
        }

        #[cfg(not(feature = "email"))]
        if self.config.smtp_host.is_some() {
            tracing::warn!("SMTP設定が存在しますが email フィーチャが無効です");
        }

        // 開発モード: メール送信せずログ出力のみ
        tracing::info!(to = %to, "パスワードリセットメール送信（開発モード）");
        tracing::info!("リセットURL: {}", reset_url);

        Ok(())
    }

    #[cfg(feature = "email")]
    fn smtp_configured(&self) -> bool {
        self.config.smtp_host.is_some()
            && self.config.smtp_username.is_some()
            && self.config.smtp_password.is_some()
            && self.config.smtp_from_address.is_some()
    }

    #[cfg(feature = "email")]
    async fn send_via_smtp(&self, to: &str, reset_url: &str) -> Result<(), AppError> {
        use lettre::message::Mailbox;
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
        use secrecy::ExposeSecret;

        let (Some(host), Some(username), Some(password), Some(from)) = (
            self.config.smtp_host.as_deref(),
            self.config.smtp_username.as_ref(),
            self.config.smtp_password.as_ref(),
            self.config.smtp_from_address.as_deref(),
        ) else {
            return Err(AppError::Internal(anyhow::anyhow!("smtp not configured")));
        };

        let message = Message::builder()
            .from(from.parse::<Mailbox>().map_err(|e| {
                tracing::error!(error = ?e, "送信元アドレスのパースエラー");
                AppError::Internal(anyhow::anyhow!("invalid smtp from address"))
            })?)
            .to(to.parse::<Mailbox>().map_err(|e| {
                tracing::error!(error = ?e, "宛先アドレスのパースエラー");
                AppError::Internal(anyhow::anyhow!("invalid recipient address"))
            })?)
            .subject("【CampusFix】パスワードリセットのご案内")
            .body(format!(
                "パスワードリセットのリクエストを受け付けました。\n\n\
                 以下のURLから新しいパスワードを設定してください。\n\
                 このURLは一定時間が経過すると無効になります。\n\n\
                 {}\n\n\
                 心当たりがない場合はこのメールを破棄してください。",
                reset_url
            ))
            .map_err(|e| {
                tracing::error!(error = ?e, "メールメッセージの構築エラー");
                AppError::Internal(anyhow::anyhow!("failed to build email message"))
            })?;

        let credentials = Credentials::new(
            username.expose_secret().clone(),
            password.expose_secret().clone(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| {
                tracing::error!(error = ?e, "SMTPトランスポートの構築エラー");
                AppError::Internal(anyhow::anyhow!("failed to build smtp transport"))
            })?
            .port(self.config.smtp_port)
            .credentials(credentials)
            .build();

        mailer.send(message).await.map_err(|e| {
            tracing::error!(error = ?e, "メール送信エラー");
            AppError::Internal(anyhow::anyhow!("failed to send email"))
        })?;

        tracing::info!(to = %to, "パスワードリセットメール送信完了");

        Ok(())
    }
}
