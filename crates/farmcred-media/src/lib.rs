pub mod probe;
pub mod rules;
pub mod upload;

pub use probe::*;
pub use rules::*;
pub use upload::*;
