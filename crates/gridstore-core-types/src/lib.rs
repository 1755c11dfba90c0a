//! Core types shared across gridstore facilities
//!
//! This crate provides the canonical schema constants used by both the
//! error facility and the structured logging facility, so every crate in
//! the workspace emits the same field keys and event names.

pub mod schema;
