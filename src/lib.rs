#![deny(clippy::unwrap_used)]

pub mod browser;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod control;
