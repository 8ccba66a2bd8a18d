use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::auth::{hash_password, verify_password};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub user_id: Uuid,
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordResponse {
    pub message: String,
}

/// パスワード変更ハンドラー
///
/// POST /api/password/change
///
/// # Security
/// - 現在のパスワードの再確認必須
/// - パスワードはログに出力しない
pub async fn change_password(
    State(state): State<AppState>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<ChangePasswordResponse>, AppError> {
    // バリデーション
    validate_change_password_request(&request)?;

    // ユーザー取得
    let user = state
        .user_repo
        .find_by_id(request.user_id)
        .await?
        .ok_or_else(|| AppError::Authentication("user not found".to_string()))?;

    // 現在のパスワードを確認
    if !verify_password(&request.current_password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "パスワード変更失敗: 現在のパスワード不一致");
        return Err(AppError::InvalidPassword);
    }

    // 新パスワードをハッシュ化して更新
    let password_hash = hash_password(&request.new_password)?;
    state
        .user_repo
        .update_password(&state.db_pool, user.id, &password_hash)
        .await?;

    tracing::info!(user_id = %user.id, "パスワード変更完了");

    Ok(Json(ChangePasswordResponse {
        message: "パスワードを変更しました".to_string(),
    }))
}

/// パスワード変更リクエストのバリデーション
fn validate_change_password_request(request: &ChangePasswordRequest) -> Result<(), AppError> {
    if request.current_password.is_empty() {
        return Err(AppError::Validation(
            "現在のパスワードは必須です".to_string(),
        ));
    }
    if request.new_password.len() < 8 {
        return Err(AppError::Validation(
            "新しいパスワードは8文字以上で入力してください".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_current_password() {
        let request = ChangePasswordRequest {
            user_id: Uuid::new_v4(),
            current_password: "".to_string(),
            new_password: "password123".to_string(),
        };
        let result = validate_change_password_request(&request);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_short_new_password() {
        let request = ChangePasswordRequest {
            user_id: Uuid::new_v4(),
            current_password: "oldpassword".to_string(),
            new_password: "short".to_string(),
        };
        let result = validate_change_password_request(&request);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_valid_request() {
        let request = ChangePasswordRequest {
            user_id: Uuid::new_v4(),
            current_password: "oldpassword".to_string(),
            new_password: "newpassword123".to_string(),
        };
        let result = validate_change_password_request(&request);
        assert!(result.is_ok());
    }
}
