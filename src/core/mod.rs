pub mod provider;
pub mod traits;

pub use provider::ResourceProvider;
pub use traits::{Association, Capabilities, DeletionPolicy, LoadFuture, Record, Resource};
