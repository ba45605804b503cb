//! # TuitionBell Channels
//! Delivery channels for parent notifications.

pub mod email;

pub use email::SmtpMailer;
