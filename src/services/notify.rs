use serde::Serialize;
use uuid::Uuid;

/// 通知作成リクエスト（campusfix-auth → CampusFix本体API）
#[derive(Debug, Serialize)]
pub struct NotificationPayload {
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
}

/// CampusFix本体の通知APIクライアント
///
/// セキュリティイベント（パスワード変更、2FAの有効化・無効化）を
/// ユーザー通知として本体側に作成させる。fire-and-forget であり、
/// 送信失敗はログに残すだけで呼び出し元には伝播しない。
#[derive(Clone)]
pub struct NotifyClient {
    client: reqwest::Client,
    api_url: Option<String>,
}

impl NotifyClient {
    /// 新しい NotifyClient を作成
    ///
    /// api_url が未設定の場合、send は何もしない（開発環境向け）
    pub fn new(api_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// 通知を送信（失敗しても戻り値では伝えない）
    pub async fn send(&self, user_id: Uuid, title: &str, message: &str) {
        let Some(api_url) = &self.api_url else {
            tracing::debug!(user_id = %user_id, "通知API未設定（スキップ）");
            return;
        };

        let url = format!("{}/internal/notifications", api_url);
        let payload = NotificationPayload {
            user_id,
            notification_type: "system".to_string(),
            title: title.to_string(),
            message: message.to_string(),
        };

        match self.client.post(&url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(user_id = %user_id, "通知送信成功");
            }
            Ok(response) => {
                tracing::warn!(
                    user_id = %user_id,
                    status = %response.status(),
                    "通知APIがエラーを返却"
                );
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = ?e, "通知送信に失敗");
            }
        }
    }
}
