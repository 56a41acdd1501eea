// Pergamon common library - main library exports

pub mod crypto;
pub mod hash;
pub mod messages;
pub mod params;
pub mod types;

// Flattened re-exports
pub use self::hash::Hash32;
pub use self::types::*;
