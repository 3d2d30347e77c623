//! API request handlers

mod events;
mod parties;
mod rides;
mod system;

pub use events::*;
pub use parties::*;
pub use rides::*;
pub use system::*;
