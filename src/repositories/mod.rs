//! Repository layer for database operations.
//!
//! This module provides repository structs that encapsulate database queries
//! and operations, following the Data Mapper pattern recommended by SeaORM.
//! Repositories keep entities as pure data models while providing reusable
//! database access methods.

pub mod change_event;
pub mod connection;
pub mod project;
pub mod task;

pub use change_event::ChangeEventRepository;
pub use connection::ConnectionRepository;
pub use project::ProjectRepository;
pub use task::TaskRepository;
