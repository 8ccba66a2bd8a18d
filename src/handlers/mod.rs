pub mod change_password;
pub mod health;
pub mod login;
pub mod password_reset;
pub mod register;
pub mod two_factor;

pub use change_password::change_password;
pub use health::health_check;
pub use login::login;
pub use password_reset::{request_password_reset, reset_password};
pub use register::register;
pub use two_factor::{disable_2fa, login_2fa, setup_2fa, verify_2fa};
