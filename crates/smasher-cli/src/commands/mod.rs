//! Command handlers

pub mod config;
pub mod link;
pub mod shortcut;
pub mod tag;
