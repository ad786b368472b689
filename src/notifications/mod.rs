pub mod email;
pub mod templates;

pub use email::spawn_password_reset_email;
pub use templates::NotificationTemplates;
