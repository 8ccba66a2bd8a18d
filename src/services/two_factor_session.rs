use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

/// ログイン中の2FA確認済みマーカー
///
/// パスワード認証 → TOTP入力 の多段ログインで「第二要素を通過済み」を
/// 短時間だけ覚えておくためのキャッシュ。期限切れはキャッシュ自身の
/// TTLで消える（呼び出し側でタイムスタンプ比較はしない）。
///
/// 揮発性のベストエフォート状態であり、失われてもユーザーがコードを
/// 再入力するだけで済む。重要操作の唯一のゲートにしてはならない。
#[derive(Clone)]
pub struct TwoFactorSessionCache {
    inner: Cache<Uuid, bool>,
}

impl TwoFactorSessionCache {
    /// 指定TTLでキャッシュを作成
    pub fn new(ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();

        Self { inner }
    }

    /// 第二要素の通過を記録（既存マーカーは上書き、TTLは書き込みから再計測）
    pub async fn mark_verified(&self, user_id: Uuid) {
        self.inner.insert(user_id, true).await;
    }

    /// 第二要素を通過済みか（未記録・期限切れは false）
    pub async fn is_verified(&self, user_id: Uuid) -> bool {
        self.inner.get(&user_id).await.unwrap_or(false)
    }

    /// マーカーを破棄（2FA無効化時など）
    pub async fn clear(&self, user_id: Uuid) {
        self.inner.invalidate(&user_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_reads_false() {
        let cache = TwoFactorSessionCache::new(Duration::from_secs(300));
        assert!(!cache.is_verified(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_mark_then_read() {
        let cache = TwoFactorSessionCache::new(Duration::from_secs(300));
        let user_id = Uuid::new_v4();

        cache.mark_verified(user_id).await;
        assert!(cache.is_verified(user_id).await);
        // 他ユーザーには影響しない
        assert!(!cache.is_verified(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_expires_after_ttl() {
        let cache = TwoFactorSessionCache::new(Duration::from_millis(20));
        let user_id = Uuid::new_v4();

        cache.mark_verified(user_id).await;
        assert!(cache.is_verified(user_id).await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        cache.inner.run_pending_tasks().await;

        assert!(!cache.is_verified(user_id).await);
    }

    #[tokio::test]
    async fn test_clear_removes_marker() {
        let cache = TwoFactorSessionCache::new(Duration::from_secs(300));
        let user_id = Uuid::new_v4();

        cache.mark_verified(user_id).await;
        cache.clear(user_id).await;

        assert!(!cache.is_verified(user_id).await);
    }
}
