//! Routechat core library — threads, the chat controller, the model catalog and the
//! OpenRouter client, shared by the CLI and desktop applications.

pub mod catalog;
pub mod chat;
pub mod config;
pub mod init;
pub mod llm;
pub mod session;
