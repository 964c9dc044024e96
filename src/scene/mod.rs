pub mod node;
pub mod registry;

mod property_tests;

pub use node::{NodeEntry, Props};
pub use registry::NodeRegistry;
