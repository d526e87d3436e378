#![forbid(unsafe_code)]

mod agents;
mod jobs;
mod scope;
mod services;
mod sweep;

pub use agents::*;
pub use jobs::*;
pub use scope::*;
pub use services::*;
pub use sweep::*;
