pub mod address;
pub mod registry;

pub use address::{AddressCluster, ClusterId};
pub use registry::Registry;
