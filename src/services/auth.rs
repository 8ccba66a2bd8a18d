use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::AppError;
use crate::models::User;
use crate::repositories::UserRepository;

/// タイミング攻撃対策用のダミーハッシュ
///
/// ユーザー不在時にも同等の計算コストを支払うために使う
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHQ$RWh6";

/// メールアドレスを正規化（前後空白除去 + 小文字化）
///
/// 保存・検索の前に必ず通すこと。大文字小文字違いの登録や
/// 検索漏れを防ぐ。
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// パスワードをargon2idでハッシュ化
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = ?e, "パスワードハッシュ生成エラー");
            AppError::Internal(anyhow::anyhow!("password hash error"))
        })?;
    Ok(hash.to_string())
}

/// パスワードをハッシュと照合
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        tracing::error!(error = ?e, "パスワードハッシュのパースエラー");
        AppError::Internal(anyhow::anyhow!("password hash parse error"))
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// 認証サービス
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
}

impl AuthService {
    /// 新しい AuthService を作成
    pub fn new(user_repo: UserRepository) -> Self {
        Self { user_repo }
    }

    /// ユーザー認証を実行
    ///
    /// タイミング攻撃対策: ユーザーが存在しない場合もダミーのパスワード検証を実行
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let user = self.user_repo.find_by_email(email).await?;

        match user {
            Some(user) => {
                if verify_password(password, &user.password_hash)? {
                    tracing::info!(email = %email, "認証成功");
                    Ok(user)
                } else {
                    tracing::warn!(email = %email, "認証失敗: パスワード不一致");
                    Err(AppError::Authentication("invalid_credentials".to_string()))
                }
            }
            None => {
                // ユーザーが存在しない場合もダミーのパスワード検証を実行し、
                // 存在有無を応答時間から推測できなくする
                let _ = verify_password(password, DUMMY_HASH);
                tracing::warn!(email = %email, "認証失敗: ユーザー不在");
                Err(AppError::Authentication("invalid_credentials".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Taro@Example.COM "), "taro@example.com");
    }

    #[test]
    fn test_normalize_email_idempotent() {
        let once = normalize_email("Hanako@Campus.ac.jp");
        assert_eq!(normalize_email(&once), once);
    }

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash_format() {
        let result = verify_password("password123", "invalid_hash_format");
        assert!(result.is_err());
    }
}
