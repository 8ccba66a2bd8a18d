use rand::Rng;

/// 発行するバックアップコードの個数
const CODE_COUNT: usize = 10;
/// 各コードの桁数
const CODE_DIGITS: usize = 8;

/// 2FAリカバリ用のバックアップコードを生成
///
/// 8桁の数字コードを10個、それぞれ独立に生成する。
/// 設定開始時に一度だけ返却され、サーバー側には保存しない。
/// ユーザー自身に安全な場所へ控えてもらう前提。
pub fn generate_backup_codes() -> Vec<String> {
    let mut rng = rand::thread_rng();

    (0..CODE_COUNT)
        .map(|_| {
            (0..CODE_DIGITS)
                .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_ten_codes() {
        let codes = generate_backup_codes();
        assert_eq!(codes.len(), 10);
    }

    #[test]
    fn test_codes_are_eight_digits() {
        let codes = generate_backup_codes();
        assert!(codes.iter().all(|c| c.len() == 8));
        assert!(
            codes
                .iter()
                .all(|c| c.chars().all(|ch| ch.is_ascii_digit()))
        );
    }

    #[test]
    fn test_two_batches_differ() {
        // 10^80 分の1の衝突を踏まない限り別の組になる
        let first = generate_backup_codes();
        let second = generate_backup_codes();
        assert_ne!(first, second);
    }
}
