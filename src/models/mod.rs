pub mod password_reset_token;
pub mod user;
pub mod user_two_factor;

pub use password_reset_token::PasswordResetToken;
pub use user::User;
pub use user_two_factor::UserTwoFactor;
