pub mod client;
pub mod image;
pub mod prompt;
pub mod protocol;

pub use client::GeminiClient;
