mod memory;
mod postgrest;
mod rows;
mod seed;

pub use memory::*;
pub use postgrest::*;
pub use seed::*;
