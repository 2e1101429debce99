pub mod convert;
pub mod inventory;
pub mod mathml;
pub mod registry;
