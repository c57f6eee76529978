//! Direct memory writes behind the processor's back.
//!
//! Load mode forces a non-maskable interrupt, feeds the processor a
//! fabricated vector that points at the target area, then keeps it
//! busy with fill instructions while the payload is written straight
//! into RAM during the dead half of each cycle. A return-from-interrupt
//! is fed at the end; the first read from the stack page proves the
//! processor is restoring its saved state, and the sequencer drops
//! back into the normal loop.
//!
//! The whole trick assumes exclusive ownership of the written range
//! for its duration. A context virtualizing part of that range, or a
//! transaction in flight on the very first cycle, is not detected.

use crate::config::FeedConfig;
use crate::pin::PinMasks;
use crate::port::PortContext;

use super::core::CallState;
use super::patch::{LoopSlots, Phi2Op};

/// What the Phi2 half of the current cycle should do with the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phi2Plan {
    /// Enable the RAM for the processor, read or write per R/W.
    Ram,
    /// Drive a fabricated byte onto the data bus instead.
    Feed(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    /// Waiting for the vector-low fetch.
    VectorLow,
    /// Waiting for the vector-high fetch.
    VectorHigh,
    /// Writing payload bytes while feeding fill instructions.
    Fill,
    /// Waiting for the processor to fetch at the end of the area.
    Return,
    /// Feeding return instructions until the stack is touched.
    Drain,
}

/// Call-local state of one load.
pub(crate) struct Loader {
    phase: LoadPhase,
    /// Address the processor is expected to fetch from next.
    expected: u16,
    target: u16,
    source: Vec<u8>,
    pos: usize,
    feed: FeedConfig,
}

impl Loader {
    pub(crate) fn new(target: u16, source: &[u8], feed: FeedConfig) -> Self {
        Loader {
            phase: LoadPhase::VectorLow,
            expected: feed.vector_nmi,
            target,
            source: source.to_vec(),
            pos: 0,
            feed,
        }
    }

    /// Bytes not yet written to RAM.
    pub(crate) fn remaining(&self) -> usize {
        self.source.len() - self.pos
    }
}

/// Per-cycle dispatch, substituted into the Phi1 alternate slot.
///
/// Cycles that don't concern the state machine (the processor is
/// finishing an instruction, or pushing its registers) fall through to
/// a normal RAM cycle.
pub(crate) fn phi1_dispatch(
    ctx: &PortContext,
    masks: &PinMasks,
    state: &mut CallState,
    sampled: u32,
    reading: bool,
    slots: &mut LoopSlots,
) {
    let CallState {
        loader,
        plan,
        signals,
        load_done,
        ..
    } = state;
    let loader = match loader.as_mut() {
        Some(loader) => loader,
        None => return,
    };

    let addr = masks.addr_from(sampled);
    let matched = reading && addr == loader.expected;

    match loader.phase {
        LoadPhase::VectorLow => {
            if matched {
                loader.expected = loader.expected.wrapping_add(1);
                loader.phase = LoadPhase::VectorHigh;
                *plan = Phi2Plan::Feed(loader.target as u8);
            } else {
                *plan = Phi2Plan::Ram;
            }
        }
        LoadPhase::VectorHigh => {
            if matched {
                loader.expected = loader.target;
                loader.phase = LoadPhase::Fill;
                *plan = Phi2Plan::Feed((loader.target >> 8) as u8);
            } else {
                *plan = Phi2Plan::Ram;
            }
        }
        LoadPhase::Fill => {
            if matched {
                // The processor is fetching at the expected address,
                // which is also what the RAM sees: write the next
                // payload byte now, while the data bus is dead.
                let byte = loader.source[loader.pos];
                ctx.or_out(masks.data_value(byte));
                ctx.or_dir(masks.data);
                ctx.andn_out(masks.ramwe);
                ctx.or_out(masks.ramwe);
                ctx.andn_dir(masks.data);
                ctx.andn_out(masks.data);

                loader.pos += 1;
                loader.expected = loader.expected.wrapping_add(1);
                if loader.pos == loader.source.len() {
                    loader.phase = LoadPhase::Return;
                }
                *plan = Phi2Plan::Feed(loader.feed.opcode_fill);
            } else {
                *plan = Phi2Plan::Ram;
            }
        }
        LoadPhase::Return => {
            if matched {
                loader.phase = LoadPhase::Drain;
                *plan = Phi2Plan::Feed(loader.feed.opcode_return);
            } else {
                *plan = Phi2Plan::Ram;
            }
        }
        LoadPhase::Drain => {
            if (addr >> 8) as u8 == loader.feed.stack_page {
                // The processor is pulling its saved state: the return
                // instruction has been accepted. Release the interrupt
                // line and finish this cycle as a normal one; the loop
                // exits at the next check.
                *signals |= masks.nmi;
                slots.phi2 = Phi2Op::SampleSignals;
                *plan = Phi2Plan::Ram;
                *load_done = true;
            } else {
                // Not ready yet, keep offering the return instruction.
                *plan = Phi2Plan::Feed(loader.feed.opcode_return);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;

    #[test]
    fn test_loader_expects_vector_first() {
        let loader = Loader::new(0x0300, &[1, 2, 3], FeedConfig::default());
        assert_eq!(loader.phase, LoadPhase::VectorLow);
        assert_eq!(loader.expected, 0xFFFA);
        assert_eq!(loader.remaining(), 3);
    }

    #[test]
    fn test_remaining_counts_down_with_pos() {
        let mut loader = Loader::new(0x0300, &[1, 2, 3], FeedConfig::default());
        loader.pos = 2;
        assert_eq!(loader.remaining(), 1);
    }
}
