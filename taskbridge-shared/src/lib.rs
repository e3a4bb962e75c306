#![cfg_attr(not(test), forbid(unsafe_code))]

//! Shared building blocks for the TaskBridge chat core: the wire models used
//! by persistence, push, and REST layers, credential helpers, and the layered
//! application configuration.

pub mod auth;
pub mod config;
pub mod models;
