pub mod artifacts;
pub mod catalog;

pub use artifacts::Artifacts;
pub use catalog::Catalog;
