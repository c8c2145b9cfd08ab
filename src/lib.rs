//! Snippetbox: a small snippet store served through runtime-compiled page templates.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
