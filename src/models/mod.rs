pub mod enums;
pub mod expense;

pub use enums::*;
pub use expense::*;
