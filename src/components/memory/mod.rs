pub mod static_ram;

pub use static_ram::StaticRam;
