//! Application services layer.

pub mod error;
pub mod locks;
pub mod nonce;
pub mod player;
pub mod reader;
pub mod repos;
pub mod settings;
pub mod synthesis;
pub mod tts;
