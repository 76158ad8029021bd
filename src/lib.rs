pub mod api;
pub mod app;
pub mod channel;
pub mod codec;
pub mod config;
pub mod consumers;
pub mod dispatch;
pub mod hub;
pub mod model;
pub mod notifications;
pub mod signals;
