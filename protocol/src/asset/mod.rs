//! Asset definitions and the wallet-local registry that names them.

pub mod definition;
pub mod registry;

pub use definition::{AssetDefinition, AssetError};
pub use registry::AssetRegistry;
