//! # Rusty SDC
//!
//! A cycle-exact software-defined 6502 computer.
//!
//! The heart of the crate is a bus sequencer that generates the
//! two-phase clock for an external CMOS 6502, drives its control
//! lines, and arbitrates its access to a shared static RAM — all at
//! fixed tick offsets per phase, so that other execution contexts
//! sharing the same port can synchronize against it. The sequencer has
//! three modes selected by a declarative patch table: reset
//! initialization, normal running, and a direct-memory-write mode that
//! steals bus cycles from the processor with a synthetic interrupt.
//!
//! This library provides:
//! - The timing-critical sequencer core with its mode machinery
//! - A shared wired-OR port model with claimable execution contexts
//! - A lock-free signal channel for processor control lines
//! - JSON-configurable board description (pins, timing, opcodes)
//! - Bus-level models of the processor, RAM and signal latch, wired
//!   into a complete board for end-to-end simulation

pub mod components;
pub mod config;
pub mod pin;
pub mod port;
pub mod sequencer;
pub mod signal;
pub mod systems;
pub mod ticks;

// Re-export commonly used items for easier importing
pub use config::BoardConfig;
pub use pin::{PinLayout, PinMasks};
pub use port::{BusDevice, Port, PortContext};
pub use sequencer::Sequencer;
pub use signal::{SignalChannel, SignalLine};
pub use systems::Sdc6502;
pub use ticks::{HostTicks, SimTicks, TickSource};
