pub mod app;
pub mod command;
pub mod config;
pub mod install;
pub mod notify;
pub mod pactl;
pub mod probe;
pub mod provision;
