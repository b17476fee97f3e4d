pub mod audit;
pub mod traits;

#[cfg(feature = "memory-store")]
pub mod memory;

#[cfg(feature = "file-store")]
pub mod file;

pub use audit::*;
pub use traits::*;

#[cfg(feature = "memory-store")]
pub use memory::*;

#[cfg(feature = "file-store")]
pub use file::*;
