pub mod console;
pub mod tasks;
pub mod telegram;
