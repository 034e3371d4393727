mod address_space;

pub use address_space::{AddressSpaces, MapError, Mapping, PageDirectory, Privilege, RegionSize};
