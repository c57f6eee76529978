pub mod wdc_65c02_bus;

pub use wdc_65c02_bus::{BusAccess, BusCycle, Registers, Status, Wdc65c02Bus};
