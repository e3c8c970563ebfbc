//! Infrastructure adapters and runtime bootstrap.

pub mod assets;
pub mod audio_store;
pub mod db;
pub mod error;
pub mod http;
pub mod telemetry;
pub mod tts;
