pub mod config;
pub mod conversation;
pub mod history;
pub mod lock;
pub mod remote;
pub mod scanner;
pub mod security;
pub mod sync;
