pub mod auth;
pub mod backup_codes;
pub mod email;
pub mod notify;
pub mod password_reset;
pub mod totp;
pub mod two_factor;
pub mod two_factor_session;

pub use email::EmailService;
pub use notify::NotifyClient;
pub use password_reset::PasswordResetService;
pub use totp::TotpService;
pub use two_factor::TwoFactorService;
pub use two_factor_session::TwoFactorSessionCache;
