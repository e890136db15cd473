pub mod frame;
pub mod gps;
pub mod track;

pub use frame::*;
pub use gps::*;
pub use track::*;
