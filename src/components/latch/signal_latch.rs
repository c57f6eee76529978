use crate::pin::PinMasks;

/// The bank of flip-flops between the signal lines and the processor.
///
/// The sequencer drives the signal levels onto the shared bus lines
/// during the first half-cycle and clocks this latch; the processor
/// only ever sees the latched side. Powers up with reset asserted.
pub struct SignalLatch {
    masks: PinMasks,
    q: u32,
    last_clock: bool,
}

impl SignalLatch {
    pub fn new(masks: PinMasks) -> Self {
        SignalLatch {
            masks,
            q: masks.reset,
            last_clock: false,
        }
    }

    /// Present the latch clock level and the current input levels; the
    /// inputs transfer on a rising clock edge only.
    pub fn clock(&mut self, clock_high: bool, inputs: u32) {
        if clock_high && !self.last_clock {
            self.q = inputs & self.masks.signals;
        }
        self.last_clock = clock_high;
    }

    /// The latched word (signal bits only).
    pub fn word(&self) -> u32 {
        self.q
    }

    pub fn nmi(&self) -> bool {
        self.q & self.masks.nmi != 0
    }

    pub fn irq(&self) -> bool {
        self.q & self.masks.irq != 0
    }

    pub fn rdy(&self) -> bool {
        self.q & self.masks.rdy != 0
    }

    pub fn res(&self) -> bool {
        self.q & self.masks.res != 0
    }

    pub fn so(&self) -> bool {
        self.q & self.masks.so != 0
    }

    pub fn bank(&self) -> bool {
        self.q & self.masks.rama16 != 0
    }
}
