pub mod capture;
pub mod distance;
pub mod geocode;

pub use capture::*;
pub use distance::*;
pub use geocode::*;
