use std::sync::atomic::{AtomicU32, Ordering};

use crate::pin::PinMasks;

/// The processor control lines carried by the signal flip-flops.
///
/// All lines are active-low on the board; `Bank` is a plain level
/// (high selects the upper RAM bank).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalLine {
    Sel0,
    Setup,
    Bank,
    Nmi,
    Irq,
    Rdy,
    Res,
    So,
}

/// The shared signal word.
///
/// Any number of contexts publish; the sequencer samples exactly once
/// per bus cycle, during the second half-cycle. There is no locking:
/// last write wins, and a published value may be observed up to one
/// full cycle late. That staleness is part of the contract.
///
/// Writers must only touch the signal bits. The word is deliberately
/// not masked on publish — a writer that sets a non-signal bit will
/// see it propagated onto the port, as on the real hardware.
pub struct SignalChannel {
    word: AtomicU32,
    masks: PinMasks,
}

impl SignalChannel {
    /// All lines inactive (high).
    pub fn new(masks: PinMasks) -> Self {
        SignalChannel {
            word: AtomicU32::new(masks.signals),
            masks,
        }
    }

    /// Overwrite the shared word. Concurrent writers race benignly:
    /// last write wins, no ordering across writers.
    pub fn publish(&self, word: u32) {
        self.word.store(word, Ordering::SeqCst);
    }

    /// Read the latest published word.
    pub fn sample(&self) -> u32 {
        self.word.load(Ordering::SeqCst)
    }

    pub fn line_mask(&self, line: SignalLine) -> u32 {
        match line {
            SignalLine::Sel0 => self.masks.sel0,
            SignalLine::Setup => self.masks.setup,
            SignalLine::Bank => self.masks.rama16,
            SignalLine::Nmi => self.masks.nmi,
            SignalLine::Irq => self.masks.irq,
            SignalLine::Rdy => self.masks.rdy,
            SignalLine::Res => self.masks.res,
            SignalLine::So => self.masks.so,
        }
    }

    /// Drive one line active (low).
    pub fn assert_line(&self, line: SignalLine) {
        self.word
            .fetch_and(!self.line_mask(line), Ordering::SeqCst);
    }

    /// Return one line to its inactive level (high).
    pub fn deassert_line(&self, line: SignalLine) {
        self.word.fetch_or(self.line_mask(line), Ordering::SeqCst);
    }

    pub fn is_asserted(&self, line: SignalLine) -> bool {
        self.sample() & self.line_mask(line) == 0
    }

    pub fn masks(&self) -> &PinMasks {
        &self.masks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::PinLayout;

    fn channel() -> SignalChannel {
        SignalChannel::new(PinLayout::default().masks())
    }

    #[test]
    fn test_starts_all_inactive() {
        let ch = channel();
        assert_eq!(ch.sample(), ch.masks().signals);
        assert!(!ch.is_asserted(SignalLine::Nmi));
        assert!(!ch.is_asserted(SignalLine::Res));
    }

    #[test]
    fn test_assert_clears_bit() {
        let ch = channel();
        ch.assert_line(SignalLine::Irq);
        assert!(ch.is_asserted(SignalLine::Irq));
        assert_eq!(ch.sample() & ch.masks().irq, 0);

        ch.deassert_line(SignalLine::Irq);
        assert!(!ch.is_asserted(SignalLine::Irq));
    }

    #[test]
    fn test_assert_leaves_other_lines() {
        let ch = channel();
        ch.assert_line(SignalLine::Rdy);
        let others = ch.masks().signals & !ch.masks().rdy;
        assert_eq!(ch.sample() & others, others);
    }

    #[test]
    fn test_publish_is_unmasked() {
        // The channel does not police writers; stray bits propagate.
        let ch = channel();
        ch.publish(0xDEAD_BEEF);
        assert_eq!(ch.sample(), 0xDEAD_BEEF);
    }

    #[test]
    fn test_last_write_wins() {
        let ch = channel();
        ch.publish(ch.masks().halt);
        ch.publish(ch.masks().reset);
        assert_eq!(ch.sample(), ch.masks().reset);
    }
}
