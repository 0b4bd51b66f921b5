//! API handlers module

pub mod chat;
pub mod health;
pub mod sessions;
pub mod stores;
