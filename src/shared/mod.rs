pub mod error;
pub mod security;
pub mod time;
