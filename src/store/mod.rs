pub mod filter;
pub mod memory;
pub mod mongo;
pub mod traits;

pub use filter::*;
pub use memory::*;
pub use mongo::*;
pub use traits::*;
