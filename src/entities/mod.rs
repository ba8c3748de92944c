pub mod change_event;
pub mod connection;
pub mod project;
pub mod task;

pub use change_event::Entity as ChangeEvent;
pub use connection::Entity as Connection;
pub use project::Entity as Project;
pub use task::Entity as Task;
pub use task::{TaskPriority, TaskStatus};
