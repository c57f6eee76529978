pub mod sdc6502;

pub use sdc6502::Sdc6502;
