//! tasksync - bidirectional task synchronization with Microsoft To Do
//!
//! This library reconciles a locally owned task store with a remote to-do
//! provider. It detects divergence between both copies of a task, decides a
//! merge action per task, records field-level provenance, and keeps going
//! when single items fail.
//!
//! # Modules
//!
//! * [`auth`] - OAuth token leases and refresh
//! * [`provider`] - Remote provider interface and the Graph To Do client
//! * [`sync`] - Reconciliation engine and sync passes
//! * [`coordinator`] - Rounds over all connected users
//! * [`storage`] - Local database and the store interfaces the engine consumes
//! * [`config`] - Application configuration management

/// OAuth2 token handling
pub mod auth;

/// Configuration module for managing application settings
pub mod config;

/// Application constants and default values
pub mod constants;

/// Multi-user sync scheduling
pub mod coordinator;

/// SeaORM entity models for database tables
pub mod entities;

/// Errors that abort a sync pass
pub mod error;

/// Logging setup for the binary
pub mod logger;

/// Remote task provider abstraction
pub mod provider;

/// Repository layer for database operations
pub mod repositories;

/// Local storage layer
pub mod storage;

/// Synchronization engine for keeping local and remote data in sync
pub mod sync;

/// Utility functions for date/time handling and other helpers
pub mod utils;

// Re-export entity models for convenient access
pub use entities::{change_event, connection, project, task};
pub use error::SyncError;
