pub mod client;
pub mod driver;

pub use client::{split_message, TelegramClient, TransportError, Update, MAX_MESSAGE_LEN};
