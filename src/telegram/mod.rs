//! Telegram integration: login widget verification and outbound chat messages.

pub mod login;
pub mod notifier;

pub use login::{data_check_string, verify_login};
pub use notifier::{LogNotifier, Notifier, NotifyError, TelegramNotifier};
