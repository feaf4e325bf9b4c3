pub mod implementors;
pub mod register;
pub mod search;

pub use implementors::*;
pub use register::*;
pub use search::*;
