use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::User;
use crate::services::TwoFactorService;
use crate::services::auth::{normalize_email, verify_password};
use crate::services::two_factor::SetupOutcome;
use crate::state::AppState;

/// 設定開始時にユーザーへ表示する案内文
const SETUP_INSTRUCTIONS: &str =
    "認証アプリでQRコードをスキャンするか、シークレットキーを手動で入力してください";

// === 2FA Setup ===

#[derive(Debug, Deserialize)]
pub struct SetupRequest {
    pub user_id: Uuid,
    pub password: String,
}

/// 設定開始レスポンス
///
/// 既に有効な場合は現状報告のみ（シークレットは再発行しない）
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SetupResponse {
    AlreadyEnabled {
        already_enabled: bool,
        message: String,
    },
    Issued {
        secret: String,
        qr_code: String,
        backup_codes: Vec<String>,
        instructions: String,
    },
}

/// POST /api/2fa/setup
///
/// 2FA設定を開始（シークレット生成、QRコード・バックアップコード返却）
///
/// # Security
/// - パスワード確認必須
/// - シークレット平文はログ出力禁止
pub async fn setup_2fa(
    State(state): State<AppState>,
    Json(request): Json<SetupRequest>,
) -> Result<Json<SetupResponse>, AppError> {
    // バリデーション
    validate_password(&request.password)?;

    // パスワード確認
    let user = confirm_user_password(&state, request.user_id, &request.password).await?;

    let service = two_factor_service(&state);

    match service.initiate_setup(&user).await? {
        SetupOutcome::AlreadyEnabled => Ok(Json(SetupResponse::AlreadyEnabled {
            already_enabled: true,
            message: "二要素認証は既に有効です".to_string(),
        })),
        SetupOutcome::Issued {
            secret,
            qr_code,
            backup_codes,
        } => Ok(Json(SetupResponse::Issued {
            secret,
            qr_code,
            backup_codes,
            instructions: SETUP_INSTRUCTIONS.to_string(),
        })),
    }
}

// === 2FA Verify ===

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub user_id: Uuid,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub two_factor_enabled: bool,
    pub message: String,
}

/// POST /api/2fa/verify
///
/// 2FA設定確認（初回コード検証で有効化）
///
/// # Security
/// - コードはログ出力禁止
pub async fn verify_2fa(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    // バリデーション
    validate_totp_code(&request.code)?;

    let service = two_factor_service(&state);
    service.confirm_setup(request.user_id, &request.code).await?;

    Ok(Json(VerifyResponse {
        two_factor_enabled: true,
        message: "二要素認証を有効化しました".to_string(),
    }))
}

// === 2FA Login（多段ログインの第二ステップ） ===

#[derive(Debug, Deserialize)]
pub struct TwoFactorLoginRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct TwoFactorLoginResponse {
    pub user_id: Uuid,
    pub message: String,
}

/// POST /api/2fa/login
///
/// ログイン時の第二要素を検証する。成功すると確認済みマーカーが
/// 短時間キャッシュされ、続く /api/login はコードなしで完了する。
///
/// # Security
/// - コードはログ出力禁止
pub async fn login_2fa(
    State(state): State<AppState>,
    Json(request): Json<TwoFactorLoginRequest>,
) -> Result<Json<TwoFactorLoginResponse>, AppError> {
    // バリデーション
    validate_totp_code(&request.code)?;

    let email = normalize_email(&request.email);

    let user = state
        .user_repo
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::Authentication("user not found".to_string()))?;

    let service = two_factor_service(&state);
    service.verify_login(&user, &request.code).await?;

    Ok(Json(TwoFactorLoginResponse {
        user_id: user.id,
        message: "二要素認証に成功しました".to_string(),
    }))
}

// === 2FA Disable ===

#[derive(Debug, Deserialize)]
pub struct DisableRequest {
    pub user_id: Uuid,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct DisableResponse {
    pub two_factor_enabled: bool,
    pub message: String,
}

/// POST /api/2fa/disable
///
/// 2FA無効化
///
/// # Security
/// - パスワード確認必須。不一致なら状態は一切変更しない
pub async fn disable_2fa(
    State(state): State<AppState>,
    Json(request): Json<DisableRequest>,
) -> Result<Json<DisableResponse>, AppError> {
    // バリデーション
    validate_password(&request.password)?;

    // ユーザー取得（パスワード照合は service 側で行う）
    let user = state
        .user_repo
        .find_by_id(request.user_id)
        .await?
        .ok_or_else(|| AppError::Authentication("user not found".to_string()))?;

    let service = two_factor_service(&state);
    service.disable(&user, &request.password).await?;

    Ok(Json(DisableResponse {
        two_factor_enabled: false,
        message: "二要素認証を無効化しました".to_string(),
    }))
}

// === Helper Functions ===

/// AppState から TwoFactorService を組み立てる
fn two_factor_service(state: &AppState) -> TwoFactorService {
    TwoFactorService::new(
        state.user_2fa_repo.clone(),
        state.totp_service.clone(),
        state.two_factor_session.clone(),
        state.notify_client.clone(),
    )
}

/// ユーザーを取得し、パスワードを再確認する
async fn confirm_user_password(
    state: &AppState,
    user_id: Uuid,
    password: &str,
) -> Result<User, AppError> {
    let user = state
        .user_repo
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Authentication("user not found".to_string()))?;

    if !verify_password(password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "パスワード再確認失敗");
        return Err(AppError::InvalidPassword);
    }

    Ok(user)
}

/// パスワードバリデーション
fn validate_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::Validation("パスワードは必須です".to_string()));
    }
    if password.len() < 8 {
        return Err(AppError::Validation(
            "パスワードは8文字以上で入力してください".to_string(),
        ));
    }
    Ok(())
}

/// TOTPコードバリデーション
fn validate_totp_code(code: &str) -> Result<(), AppError> {
    if code.is_empty() {
        return Err(AppError::Validation("認証コードは必須です".to_string()));
    }
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "認証コードは6桁の数字で入力してください".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_password() {
        let result = validate_password("");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_short_password() {
        let result = validate_password("short");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_valid_password() {
        let result = validate_password("password123");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_empty_code() {
        let result = validate_totp_code("");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_short_code() {
        let result = validate_totp_code("12345");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_non_digit_code() {
        let result = validate_totp_code("12345a");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_valid_code() {
        let result = validate_totp_code("123456");
        assert!(result.is_ok());
    }

    #[test]
    fn test_setup_response_issued_shape() {
        let response = SetupResponse::Issued {
            secret: "SECRET".to_string(),
            qr_code: "data:image/png;base64,xxxx".to_string(),
            backup_codes: vec!["12345678".to_string()],
            instructions: SETUP_INSTRUCTIONS.to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("secret").is_some());
        assert!(json.get("already_enabled").is_none());
    }

    #[test]
    fn test_setup_response_already_enabled_shape() {
        let response = SetupResponse::AlreadyEnabled {
            already_enabled: true,
            message: "二要素認証は既に有効です".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json.get("already_enabled").unwrap(), true);
        assert!(json.get("secret").is_none());
    }
}
