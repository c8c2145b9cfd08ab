pub mod dispatch;
pub mod templates;
pub mod views;
