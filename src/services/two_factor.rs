use uuid::Uuid;

use crate::error::AppError;
use crate::models::User;
use crate::repositories::UserTwoFactorRepository;
use crate::services::auth::verify_password;
use crate::services::backup_codes::generate_backup_codes;
use crate::services::notify::NotifyClient;
use crate::services::totp::TotpService;
use crate::services::two_factor_session::TwoFactorSessionCache;

/// 設定開始リクエストの結果
#[derive(Debug)]
pub enum SetupOutcome {
    /// 既に有効。現状を報告するのみで、動作中の設定は触らない
    AlreadyEnabled,
    /// 新しいシークレットを発行した
    Issued {
        secret: String,
        qr_code: String,
        backup_codes: Vec<String>,
    },
}

/// 二要素認証サービス
///
/// 未設定 → シークレット発行済み → 有効 の状態遷移を管理する。
/// 無効化は有効状態からパスワード再確認を経た場合のみ。
#[derive(Clone)]
pub struct TwoFactorService {
    user_2fa_repo: UserTwoFactorRepository,
    totp_service: TotpService,
    session_cache: TwoFactorSessionCache,
    notify_client: NotifyClient,
}

impl TwoFactorService {
    /// 新しい TwoFactorService を作成
    pub fn new(
        user_2fa_repo: UserTwoFactorRepository,
        totp_service: TotpService,
        session_cache: TwoFactorSessionCache,
        notify_client: NotifyClient,
    ) -> Self {
        Self {
            user_2fa_repo,
            totp_service,
            session_cache,
            notify_client,
        }
    }

    /// ユーザーの2FAが有効かどうか
    pub async fn is_enabled(&self, user_id: Uuid) -> Result<bool, AppError> {
        let record = self.user_2fa_repo.find_by_user_id(user_id).await?;
        Ok(record.map(|r| r.enabled).unwrap_or(false))
    }

    /// 2FA設定を開始（シークレット発行、QRコード・バックアップコード返却）
    ///
    /// 既に有効な場合は現状報告のみ（再発行すると動作中の設定が壊れるため）。
    /// 確認待ちのシークレットが残っていても無条件で再発行する。
    /// スキャン前のQRコードが無効になるだけで、設定は完了していないので問題ない。
    ///
    /// # Security
    /// - シークレット平文はログ出力禁止
    pub async fn initiate_setup(&self, user: &User) -> Result<SetupOutcome, AppError> {
        if let Some(existing) = self.user_2fa_repo.find_by_user_id(user.id).await?
            && existing.enabled
        {
            tracing::info!(user_id = %user.id, "2FA設定開始: 既に有効");
            return Ok(SetupOutcome::AlreadyEnabled);
        }

        let secret = TotpService::generate_secret();

        // 暗号化してDB保存（enabled = false の確認待ち状態）
        let encrypted = self.totp_service.encrypt_secret(&secret)?;
        self.user_2fa_repo.upsert_pending(user.id, &encrypted).await?;

        let qr_code = self.totp_service.provisioning_qr(&user.email, &secret)?;
        let backup_codes = generate_backup_codes();

        tracing::info!(user_id = %user.id, "2FA設定開始");

        Ok(SetupOutcome::Issued {
            secret,
            qr_code,
            backup_codes,
        })
    }

    /// 2FA設定を確認（初回コード検証で有効化）
    ///
    /// 検証失敗時はシークレットを保持したまま失敗を返す（ユーザーは再試行できる）
    ///
    /// # Security
    /// - コードはログ出力禁止
    pub async fn confirm_setup(&self, user_id: Uuid, code: &str) -> Result<(), AppError> {
        let record = self
            .user_2fa_repo
            .find_by_user_id(user_id)
            .await?
            .ok_or(AppError::TotpSetupNotInitiated)?;

        if record.enabled {
            return Err(AppError::TotpAlreadyEnabled);
        }

        let secret = self.totp_service.decrypt_secret(&record.secret_encrypted)?;

        if !self.totp_service.verify_code(&secret, code)? {
            return Err(AppError::TotpInvalid);
        }

        self.user_2fa_repo.enable(user_id).await?;

        tracing::info!(user_id = %user_id, "2FA有効化完了");

        let notify = self.notify_client.clone();
        tokio::spawn(async move {
            notify
                .send(
                    user_id,
                    "二要素認証を有効化しました",
                    "アカウントの二要素認証が有効になりました。心当たりがない場合はパスワードを変更してください。",
                )
                .await;
        });

        Ok(())
    }

    /// ログイン時の第二要素を検証し、確認済みマーカーを記録
    ///
    /// 有効化済みユーザー専用。成功するとセッションキャッシュに
    /// 短時間の確認済みマーカーが書き込まれる。
    pub async fn verify_login(&self, user: &User, code: &str) -> Result<(), AppError> {
        let record = self
            .user_2fa_repo
            .find_by_user_id(user.id)
            .await?
            .ok_or(AppError::TotpNotEnabled)?;

        if !record.enabled {
            return Err(AppError::TotpNotEnabled);
        }

        let secret = self.totp_service.decrypt_secret(&record.secret_encrypted)?;

        if !self.totp_service.verify_code(&secret, code)? {
            tracing::warn!(user_id = %user.id, "ログイン時の2FAコード不一致");
            return Err(AppError::TotpInvalid);
        }

        self.session_cache.mark_verified(user.id).await;

        tracing::info!(user_id = %user.id, "ログイン時の2FA検証成功");

        Ok(())
    }

    /// 2FAを無効化（パスワード再確認必須）
    ///
    /// パスワード不一致なら何も変更しない。成功時は enabled フラグと
    /// シークレットを一括で消し、確認済みマーカーも破棄する。
    pub async fn disable(&self, user: &User, password: &str) -> Result<(), AppError> {
        if !verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "2FA無効化失敗: パスワード不一致");
            return Err(AppError::InvalidPassword);
        }

        let record = self
            .user_2fa_repo
            .find_by_user_id(user.id)
            .await?
            .ok_or(AppError::TotpNotEnabled)?;

        if !record.enabled {
            return Err(AppError::TotpNotEnabled);
        }

        self.user_2fa_repo.delete(user.id).await?;
        self.session_cache.clear(user.id).await;

        tracing::info!(user_id = %user.id, "2FA無効化完了");

        let notify = self.notify_client.clone();
        let user_id = user.id;
        tokio::spawn(async move {
            notify
                .send(
                    user_id,
                    "二要素認証を無効化しました",
                    "アカウントの二要素認証が無効になりました。心当たりがない場合はすぐにパスワードを変更してください。",
                )
                .await;
        });

        Ok(())
    }
}
