//! Library exports for the shortlink service
//!
//! This module exposes internal components for testing and potential library usage.

pub mod config;
pub mod creation;
pub mod database;
pub mod error;
pub mod events;
pub mod geo;
pub mod handler;
pub mod model;
pub mod resolver;
pub mod route;
pub mod shortcode;
pub mod store;
