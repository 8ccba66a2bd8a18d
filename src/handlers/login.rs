use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::TwoFactorService;
use crate::services::auth::{AuthService, normalize_email};
use crate::state::AppState;

/// ログインリクエスト
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// ユーザーのメールアドレス
    pub email: String,
    /// ユーザーのパスワード
    pub password: String,
    /// 2FA認証コード（2FA有効ユーザーのみ必須）
    pub code: Option<String>,
}

/// ログインレスポンス
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// 2FAコードの入力が必要かどうか
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_2fa: Option<bool>,
    /// ユーザーID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    /// メールアドレス（認証完了時のみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// ロール（認証完了時のみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub message: String,
}

/// ログインハンドラー
///
/// POST /api/login
///
/// 処理フロー:
/// 1. リクエストバリデーション
/// 2. ユーザー認証（DB照合）
/// 3. 2FA有効チェック
/// 4. コードがあれば検証、なければ確認済みマーカーを確認
/// 5. 認証完了を返却（セッション/JWT発行はAPIゲートウェイ側で行う）
///
/// 2FA有効ユーザーがコードなしでリクエストした場合、直近5分以内に
/// /api/2fa/login で第二要素を通過していればそのまま完了する。
/// それ以外は requires_2fa: true を返してコード入力を求める。
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    // 1. リクエストバリデーション
    validate_login_request(&request)?;

    let email = normalize_email(&request.email);

    // 2. ユーザー認証（DB照合）
    let auth_service = AuthService::new(state.user_repo.clone());
    let user = auth_service.authenticate(&email, &request.password).await?;

    // 3. 2FA有効チェック
    let two_factor_service = TwoFactorService::new(
        state.user_2fa_repo.clone(),
        state.totp_service.clone(),
        state.two_factor_session.clone(),
        state.notify_client.clone(),
    );

    if two_factor_service.is_enabled(user.id).await? {
        match &request.code {
            Some(code) => {
                // 4a. 2FAコード検証（成功で確認済みマーカーが書き込まれる）
                validate_totp_code(code)?;
                two_factor_service.verify_login(&user, code).await?;
            }
            None => {
                // 4b. コードなし。確認済みマーカーがあれば再入力不要
                if state.two_factor_session.is_verified(user.id).await {
                    tracing::debug!(user_id = %user.id, "2FA確認済みマーカーあり、コード入力を省略");
                } else {
                    return Ok(Json(LoginResponse {
                        requires_2fa: Some(true),
                        user_id: Some(user.id),
                        email: None,
                        role: None,
                        message: "認証コードを入力してください".to_string(),
                    }));
                }
            }
        }
    }

    tracing::info!(user_id = %user.id, "ログイン完了");

    // 5. 認証完了
    Ok(Json(LoginResponse {
        requires_2fa: None,
        user_id: Some(user.id),
        email: Some(user.email),
        role: Some(user.role),
        message: "ログインに成功しました".to_string(),
    }))
}

/// TOTPコードバリデーション
fn validate_totp_code(code: &str) -> Result<(), AppError> {
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "認証コードは6桁の数字で入力してください".to_string(),
        ));
    }
    Ok(())
}

/// ログインリクエストのバリデーション
fn validate_login_request(request: &LoginRequest) -> Result<(), AppError> {
    // email: 必須、メール形式
    if request.email.trim().is_empty() {
        return Err(AppError::Validation("メールアドレスは必須です".to_string()));
    }

    // 簡易的なメール形式チェック（@ が含まれているか）
    if !request.email.contains('@') {
        return Err(AppError::Validation(
            "有効なメールアドレスを入力してください".to_string(),
        ));
    }

    // password: 必須、8文字以上
    if request.password.is_empty() {
        return Err(AppError::Validation("パスワードは必須です".to_string()));
    }

    if request.password.len() < 8 {
        return Err(AppError::Validation(
            "パスワードは8文字以上で入力してください".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_email() {
        let request = LoginRequest {
            email: "".to_string(),
            password: "password123".to_string(),
            code: None,
        };

        let result = validate_login_request(&request);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_invalid_email() {
        let request = LoginRequest {
            email: "invalid-email".to_string(),
            password: "password123".to_string(),
            code: None,
        };

        let result = validate_login_request(&request);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_short_password() {
        let request = LoginRequest {
            email: "test@example.com".to_string(),
            password: "short".to_string(),
            code: None,
        };

        let result = validate_login_request(&request);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_valid_request() {
        let request = LoginRequest {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
            code: None,
        };

        let result = validate_login_request(&request);
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_code_length() {
        assert!(validate_totp_code("123456").is_ok());
        assert!(validate_totp_code("12345").is_err());
        assert!(validate_totp_code("12345a").is_err());
    }
}
