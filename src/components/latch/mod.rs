pub mod signal_latch;

pub use signal_latch::SignalLatch;
