pub mod matcher;
pub mod scheduler;
pub mod watcher;
pub mod workflow;

pub use matcher::*;
pub use scheduler::*;
pub use watcher::*;
pub use workflow::*;
