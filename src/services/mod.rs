pub mod app_config;
pub mod cache;
pub mod discord;
pub mod duration;
pub mod error;
pub mod event_manager;
pub mod gate;
pub mod help;
pub mod locks;
pub mod platform;
pub mod reply;
pub mod store;
pub mod timers;
pub mod webhook;

#[cfg(test)]
pub mod testing;
