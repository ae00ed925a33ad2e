pub mod backstop;
pub mod pool;
pub mod position;

pub use backstop::*;
pub use pool::*;
pub use position::*;
