pub mod import;
pub mod state;

pub use import::ImportFormat;
pub use state::{Instance, MalformedStateError, ResourceState, StateDocument};
