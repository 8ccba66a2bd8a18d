use aes_gcm::{
    Aes256Gcm, KeyInit, Nonce,
    aead::{Aead, OsRng},
};
use data_encoding::BASE32;
use rand::RngCore;
use totp_rs::{Algorithm, TOTP};

use crate::error::AppError;

/// TOTPコードの桁数
const DIGITS: usize = 6;
/// タイムステップ（秒）
const STEP: u64 = 30;
/// 許容する前後のステップ数
///
/// ±1ステップ（±30秒）は時計ずれ対策として許容する。
/// リプレイ許容時間が延びるため、これより広げないこと。
const SKEW: u8 = 1;
/// シークレットのバイト長（160ビット）
const SECRET_BYTES: usize = 20;

/// TOTP (Time-based One-Time Password) サービス
///
/// # Security
/// - シークレットはAES-256-GCMで暗号化してDB保存
/// - シークレット平文はログに出力しない
#[derive(Clone)]
pub struct TotpService {
    issuer: String,
    encryption_key: [u8; 32],
}

impl TotpService {
    /// 新しい TotpService を作成
    ///
    /// # Arguments
    /// * `issuer` - TOTP発行者名（認証アプリに表示されるアプリ名）
    /// * `encryption_key_base64` - Base64エンコードされた32バイトの暗号化キー
    pub fn new(issuer: String, encryption_key_base64: &str) -> Result<Self, AppError> {
        use base64::{Engine as _, engine::general_purpose::STANDARD};

        let key_bytes = STANDARD.decode(encryption_key_base64).map_err(|e| {
            tracing::error!(error = ?e, "TOTP暗号化キーのBase64デコードエラー");
            AppError::Internal(anyhow::anyhow!("invalid encryption key format"))
        })?;

        let encryption_key: [u8; 32] = key_bytes.try_into().map_err(|v: Vec<u8>| {
            tracing::error!(expected = 32, actual = v.len(), "TOTP暗号化キーの長さが不正");
            AppError::Internal(anyhow::anyhow!("encryption key must be 32 bytes"))
        })?;

        Ok(Self {
            issuer,
            encryption_key,
        })
    }

    /// 160ビットのランダムシークレットを生成し、Base32でエンコード
    pub fn generate_secret() -> String {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        BASE32.encode(&bytes)
    }

    /// シークレットをAES-256-GCMで暗号化
    ///
    /// # Returns
    /// 96ビットnonce (12バイト) + 暗号文
    pub fn encrypt_secret(&self, secret: &str) -> Result<Vec<u8>, AppError> {
        let cipher = Aes256Gcm::new_from_slice(&self.encryption_key).map_err(|e| {
            tracing::error!(error = ?e, "AES-GCM暗号化器の初期化エラー");
            AppError::Internal(anyhow::anyhow!("cipher initialization error"))
        })?;

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher.encrypt(nonce, secret.as_bytes()).map_err(|e| {
            tracing::error!(error = ?e, "シークレット暗号化エラー");
            AppError::Internal(anyhow::anyhow!("encryption error"))
        })?;

        let mut result = Vec::with_capacity(12 + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }

    /// 暗号化されたシークレットを復号
    pub fn decrypt_secret(&self, encrypted: &[u8]) -> Result<String, AppError> {
        if encrypted.len() < 12 {
            tracing::error!(len = encrypted.len(), "暗号化データが短すぎる");
            return Err(AppError::Internal(anyhow::anyhow!(
                "encrypted data too short"
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.encryption_key).map_err(|e| {
            tracing::error!(error = ?e, "AES-GCM暗号化器の初期化エラー");
            AppError::Internal(anyhow::anyhow!("cipher initialization error"))
        })?;

        let (nonce_bytes, ciphertext) = encrypted.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|e| {
            tracing::error!(error = ?e, "シークレット復号エラー");
            AppError::Internal(anyhow::anyhow!("decryption error"))
        })?;

        String::from_utf8(plaintext).map_err(|e| {
            tracing::error!(error = ?e, "復号データのUTF-8変換エラー");
            AppError::Internal(anyhow::anyhow!("invalid utf8 after decryption"))
        })
    }

    /// 登録用QRコードを生成
    ///
    /// otpauth:// キーURI（発行者 + アカウント識別子）をPNGにレンダリングし、
    /// そのままHTMLに埋め込める data URI として返す
    ///
    /// # Arguments
    /// * `email` - ユーザーのメールアドレス（アカウント識別子）
    /// * `secret` - Base32エンコードされたシークレット
    pub fn provisioning_qr(&self, email: &str, secret: &str) -> Result<String, AppError> {
        let totp = self.build_totp(secret, Some(email))?;

        let qr_base64 = totp.get_qr_base64().map_err(|e| {
            tracing::error!(error = %e, "QRコード生成エラー");
            AppError::Internal(anyhow::anyhow!("qr code generation error"))
        })?;

        Ok(format!("data:image/png;base64,{}", qr_base64))
    }

    /// TOTPコードを検証（現在時刻、前後1ステップを許容）
    pub fn verify_code(&self, secret: &str, code: &str) -> Result<bool, AppError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| {
                tracing::error!(error = ?e, "システム時刻取得エラー");
                AppError::Internal(anyhow::anyhow!("system time error"))
            })?
            .as_secs();

        self.verify_code_at(secret, code, now)
    }

    /// 指定時刻を基準にTOTPコードを検証
    ///
    /// 桁数違い・数字以外はエラーではなく不一致として扱う
    fn verify_code_at(&self, secret: &str, code: &str, timestamp: u64) -> Result<bool, AppError> {
        if code.len() != DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let totp = self.build_totp(secret, None)?;

        // check は skew を考慮して前後1ステップまで照合する
        Ok(totp.check(code, timestamp))
    }

    /// TOTP オブジェクトを作成
    ///
    /// account にメールアドレスを渡すとQRコード向けにラベル付きで構築する
    fn build_totp(&self, secret: &str, account: Option<&str>) -> Result<TOTP, AppError> {
        let secret_bytes = BASE32.decode(secret.as_bytes()).map_err(|e| {
            tracing::error!(error = ?e, "シークレットのBase32デコードエラー");
            AppError::Internal(anyhow::anyhow!("invalid base32 secret"))
        })?;

        let (issuer, account_name) = match account {
            Some(email) => (Some(self.issuer.clone()), email.to_string()),
            None => (None, String::new()),
        };

        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            STEP,
            secret_bytes,
            issuer,
            account_name,
        )
        .map_err(|e| {
            tracing::error!(error = %e, "TOTP作成エラー");
            AppError::Internal(anyhow::anyhow!("totp creation error"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    /// 30の倍数のテスト基準時刻（ステップ境界に揃える）
    const TEST_TS: u64 = 1_699_999_980;
    /// 固定シークレット（20バイト相当のBase32）
    const TEST_SECRET: &str = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP";

    fn create_test_service() -> TotpService {
        let key = [0u8; 32];
        let key_base64 = STANDARD.encode(key);
        TotpService::new("TestApp".to_string(), &key_base64).unwrap()
    }

    /// 検証と独立にコードを生成するためのTOTPオブジェクト
    fn generator(secret: &str) -> TOTP {
        let bytes = BASE32.decode(secret.as_bytes()).unwrap();
        TOTP::new(Algorithm::SHA1, DIGITS, SKEW, STEP, bytes, None, String::new()).unwrap()
    }

    #[test]
    fn test_generate_secret() {
        let secret = TotpService::generate_secret();
        // Base32エンコードされた20バイト = 32文字
        assert_eq!(secret.len(), 32);
        assert!(
            secret
                .chars()
                .all(|c| "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567".contains(c))
        );
    }

    #[test]
    fn test_encrypt_decrypt_secret() {
        let service = create_test_service();
        let original = TotpService::generate_secret();

        let encrypted = service.encrypt_secret(&original).unwrap();
        // 12バイトnonce + 暗号文 + 16バイトtag
        assert!(encrypted.len() > 12);

        let decrypted = service.decrypt_secret(&encrypted).unwrap();
        assert_eq!(original, decrypted);
    }

    #[test]
    fn test_provisioning_qr() {
        let service = create_test_service();
        let secret = TotpService::generate_secret();

        let qr = service
            .provisioning_qr("test@example.com", &secret)
            .unwrap();
        assert!(qr.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_verify_accepts_current_step() {
        let service = create_test_service();
        let code = generator(TEST_SECRET).generate(TEST_TS);

        assert!(service.verify_code_at(TEST_SECRET, &code, TEST_TS).unwrap());
    }

    #[test]
    fn test_verify_accepts_adjacent_steps() {
        let service = create_test_service();

        // 1ステップ前後（±30秒）のコードは時計ずれとして許容される
        let previous = generator(TEST_SECRET).generate(TEST_TS - 30);
        let next = generator(TEST_SECRET).generate(TEST_TS + 30);

        assert!(service.verify_code_at(TEST_SECRET, &previous, TEST_TS).unwrap());
        assert!(service.verify_code_at(TEST_SECRET, &next, TEST_TS).unwrap());
    }

    #[test]
    fn test_verify_rejects_distant_steps() {
        let service = create_test_service();

        // 2ステップ以上離れたコードは拒否
        let stale = generator(TEST_SECRET).generate(TEST_TS - 60);
        let future = generator(TEST_SECRET).generate(TEST_TS + 60);

        assert!(!service.verify_code_at(TEST_SECRET, &stale, TEST_TS).unwrap());
        assert!(!service.verify_code_at(TEST_SECRET, &future, TEST_TS).unwrap());
    }

    #[test]
    fn test_verify_invalid_code_format() {
        let service = create_test_service();
        let secret = TotpService::generate_secret();

        // 6桁でない
        assert!(!service.verify_code(&secret, "12345").unwrap());
        // 数字以外を含む
        assert!(!service.verify_code(&secret, "12345a").unwrap());
        // 空文字
        assert!(!service.verify_code(&secret, "").unwrap());
    }

    #[test]
    fn test_new_with_invalid_key_length() {
        let short_key = STANDARD.encode([0u8; 16]);
        let result = TotpService::new("TestApp".to_string(), &short_key);
        assert!(result.is_err());
    }

    #[test]
    fn test_new_with_invalid_base64() {
        let result = TotpService::new("TestApp".to_string(), "not-valid-base64!!!");
        assert!(result.is_err());
    }
}
