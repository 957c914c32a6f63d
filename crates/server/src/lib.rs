//! HTTP surface for the herd prediction service

pub mod api;
pub mod config;
