pub mod password_reset_token;
pub mod user;
pub mod user_two_factor;

pub use password_reset_token::PasswordResetTokenRepository;
pub use user::UserRepository;
pub use user_two_factor::UserTwoFactorRepository;
