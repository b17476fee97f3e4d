pub mod agent;
pub mod error;
pub mod geo;
pub mod report;
pub mod request;

pub use agent::*;
pub use error::*;
pub use geo::*;
pub use report::*;
pub use request::*;
