pub mod admin_handler;
pub mod auth_handler;
pub mod support_handler;
pub mod users_handler;
