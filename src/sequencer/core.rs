//! The bus sequencer main loop.
//!
//! One iteration is one processor clock cycle: drive the clock low,
//! capture the address and R/W, hand the signal word to the
//! flip-flops, drive the clock high, enable the RAM, count down, wait
//! out the cycle time. Two slots inside the iteration and two around
//! its exit are patchable per mode (see [`super::patch`]); everything
//! else is identical across Init, Run and Load, which is what keeps
//! the cycle timing exact in all three.
//!
//! Every step happens at a fixed tick offset from the falling clock
//! edge. Other contexts synchronize against those offsets, so they are
//! part of the external contract, not an implementation detail.

use std::sync::Arc;

use crate::config::BoardConfig;
use crate::pin::PinMasks;
use crate::port::PortContext;
use crate::signal::SignalChannel;
use crate::ticks::TickSource;

use super::loader::{self, Loader, Phi2Plan};
use super::patch::{EndOp, LoopOp, LoopSlots, Mode, ModeInit, PatchTable, Phi1Op, Phi2Op};

/// Init mode generates this many clock cycles: reset is active for
/// two, and the processor needs six more before it is ready to start
/// its reset sequence.
const INIT_CYCLES: u32 = 8;
/// Countdown value at which the reset line is released again.
const INIT_RELEASE_AT: u32 = 6;

/// Parameters of one control call. Supplied fresh per invocation; the
/// sequencer keeps no state across calls apart from the port levels
/// and the resident loop slots.
struct ControlParams<'a> {
    mode: Mode,
    cycle_count: u32,
    cycle_time: u32,
    start_addr: u16,
    source: &'a [u8],
}

/// Call-local working state, shared with the load dispatch.
pub(crate) struct CallState {
    /// Remaining-cycle counter.
    pub(crate) count: u32,
    /// Local image of the signal word, driven during Phi1.
    pub(crate) signals: u32,
    /// What this cycle's Phi2 does with the bus.
    pub(crate) plan: Phi2Plan,
    pub(crate) loader: Option<Loader>,
    pub(crate) load_done: bool,
}

/// The bus sequencer.
///
/// Owns one port context and drives the external processor's clock,
/// signal and memory-enable lines with cycle-exact timing. At the
/// start and end of every call the clock line is high, so the
/// processor sits in the second half-cycle and keeps its state across
/// mode changes.
///
/// Calls are not reentrant; serializing requests is the caller's job.
pub struct Sequencer {
    ctx: PortContext,
    signals: Arc<SignalChannel>,
    ticks: Arc<dyn TickSource>,
    config: BoardConfig,
    masks: PinMasks,
    slots: LoopSlots,
    patches: PatchTable,
}

impl Sequencer {
    pub fn new(
        ctx: PortContext,
        signals: Arc<SignalChannel>,
        ticks: Arc<dyn TickSource>,
        config: BoardConfig,
    ) -> Result<Self, String> {
        config.validate()?;
        let masks = config.pins.masks();
        Ok(Sequencer {
            ctx,
            signals,
            ticks,
            config,
            masks,
            slots: LoopSlots::default(),
            patches: PatchTable::new(),
        })
    }

    /// Establish safe output levels and directions and reset the
    /// processor with a short timed pulse sequence.
    ///
    /// Must be called once before the first `run` or `load`; may be
    /// called again later to reset the processor.
    pub fn initialize(&mut self) -> Result<(), String> {
        self.control(ControlParams {
            mode: Mode::Init,
            cycle_count: 0,
            cycle_time: 0,
            start_addr: 0,
            source: &[],
        })?;
        Ok(())
    }

    /// Generate `cycle_count` processor clock cycles (0 = unbounded)
    /// at `cycle_time` controller ticks per cycle (0 = fastest; values
    /// below the hard minimum are silently clamped up).
    ///
    /// Returns the number of cycles left undone: 0 means the call ran
    /// to completion, non-zero that another context paused the
    /// sequencer by holding the clock line high. An unbounded run
    /// returns 0 either way.
    pub fn run(&mut self, cycle_count: u32, cycle_time: u32) -> Result<u32, String> {
        self.control(ControlParams {
            mode: Mode::Run,
            cycle_count,
            cycle_time,
            start_addr: 0,
            source: &[],
        })
    }

    /// Copy `source` into memory at `target` without processor
    /// cooperation, by forcing a synthetic interrupt.
    ///
    /// Returns the number of bytes not yet written: 0 means the whole
    /// payload landed in RAM, non-zero that the transfer was paused
    /// mid-way and the region must not be assumed written. An empty
    /// source returns 0 immediately without touching the interrupt
    /// line.
    ///
    /// The transfer assumes exclusive ownership of the target range
    /// and a processor that can take the interrupt: a stopped
    /// processor must be reset first, or the call never completes.
    pub fn load(&mut self, source: &[u8], target: u16) -> Result<u32, String> {
        if source.is_empty() {
            return Ok(0);
        }
        self.control(ControlParams {
            mode: Mode::Load,
            cycle_count: 0,
            cycle_time: 0,
            start_addr: target,
            source,
        })
    }

    /// The resident loop slot ops (diagnostics).
    pub fn slots(&self) -> LoopSlots {
        self.slots
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    fn control(&mut self, params: ControlParams) -> Result<u32, String> {
        let timing = self.config.timing;
        let cycle_time = params.cycle_time.max(timing.min_cycle_ticks) as u64;

        let mut state = CallState {
            count: params.cycle_count,
            signals: self.signals.sample(),
            plan: Phi2Plan::Ram,
            loader: None,
            load_done: false,
        };

        // Patch the loop for non-Run modes; Run executes the resident
        // ops as they are.
        let mode_init = if params.mode == Mode::Run {
            ModeInit::Run
        } else {
            let init = self.patches.apply(&mut self.slots, params.mode)?;
            log::debug!("loop patched for {:?}", params.mode);
            init
        };

        match mode_init {
            ModeInit::Run => {}
            ModeInit::Init => {
                // Safe levels and directions, reset asserted in the
                // local image; the shared channel is ignored until the
                // pulse sequence is over.
                self.ctx.set_out(self.masks.out_init);
                self.ctx.set_dir(self.masks.dir_init);
                state.signals = self.masks.reset;
                state.count = INIT_CYCLES;
            }
            ModeInit::Load => {
                state.count = 0;
                // The interrupt is asserted in the local image only:
                // the shared channel never observes a load.
                state.signals &= !self.masks.nmi;
                state.loader = Some(Loader::new(
                    params.start_addr,
                    params.source,
                    self.config.feed,
                ));
            }
        }

        // Arm or disarm the countdown. Like everything mode-specific
        // this touches a slot, not the loop body.
        if params.mode != Mode::Load {
            self.slots.loop_op = if state.count == 0 {
                LoopOp::Free
            } else {
                LoopOp::Countdown
            };
        }

        // The first iteration gets extra slack to line up with the
        // shared-memory round; all later iterations take exactly
        // `cycle_time` ticks.
        let mut deadline = self.ticks.now() + cycle_time.max(timing.first_cycle_min_ticks as u64);

        let interrupted = loop {
            // --- Phi1 ---
            self.ctx.andn_out(self.masks.clk0);
            let t0 = self.ticks.now();

            // If the line is still high, another context is holding it:
            // the pause request. Outputs are untouched since the edge,
            // so the processor never notices the aborted cycle.
            if self.ctx.ina() & self.masks.clk0 != 0 {
                break true;
            }
            self.ctx.andn_dir(self.masks.data);

            self.ticks.wait_until(t0 + timing.phi1_out as u64);
            self.ctx.set_out(self.masks.out_phi1);

            self.ticks.wait_until(t0 + timing.addr_sample as u64);
            let sampled = self.ctx.ina();
            let reading = sampled & self.masks.rw != 0;

            self.ticks.wait_until(t0 + timing.aen_off as u64);
            self.ctx.or_out(self.masks.aen);

            // Present the signal levels to the flip-flop inputs. The
            // word is driven as-is; a writer that published stray bits
            // gets them on the lines.
            self.ticks.wait_until(t0 + timing.sig_drive as u64);
            self.ctx.or_out(state.signals);
            self.ctx.or_dir(self.masks.signals);

            self.ticks.wait_until(t0 + timing.phi1_alt as u64);
            match self.slots.phi1 {
                Phi1Op::Nop => {}
                Phi1Op::ResetCountdown => {
                    if state.count == INIT_RELEASE_AT {
                        state.signals |= self.masks.res;
                    }
                }
                Phi1Op::LoadDispatch => {
                    loader::phi1_dispatch(
                        &self.ctx,
                        &self.masks,
                        &mut state,
                        sampled,
                        reading,
                        &mut self.slots,
                    );
                }
            }

            self.ticks.wait_until(t0 + timing.slc_rise as u64);
            self.ctx.or_out(self.masks.slc);

            // --- Phi2 ---
            self.ticks.wait_until(t0 + timing.clk_rise as u64);
            self.ctx.or_out(self.masks.clk0);

            self.ticks.wait_until(t0 + timing.sig_release as u64);
            self.ctx.andn_dir(self.masks.signals);

            self.ticks.wait_until(t0 + timing.phi2_alt as u64);
            match self.slots.phi2 {
                Phi2Op::SampleSignals => state.signals = self.signals.sample(),
                Phi2Op::HoldSignals => {}
            }

            // Enable the RAM late, so downstream contexts have had
            // their window to override or redirect the access.
            self.ticks.wait_until(t0 + timing.ram_enable as u64);
            match state.plan {
                Phi2Plan::Ram => {
                    if reading {
                        self.ctx.andn_out(self.masks.ramoe);
                    } else {
                        self.ctx.andn_out(self.masks.ramwe);
                    }
                }
                Phi2Plan::Feed(byte) => {
                    self.ctx.or_out(self.masks.data_value(byte));
                    self.ctx.or_dir(self.masks.data);
                }
            }
            state.plan = Phi2Plan::Ram;

            self.ticks.wait_until(t0 + timing.loop_check as u64);
            match self.slots.loop_op {
                LoopOp::Countdown => {
                    state.count -= 1;
                    if state.count == 0 {
                        break false;
                    }
                }
                LoopOp::Free => {}
                LoopOp::UntilLoadDone => {
                    if state.load_done {
                        break false;
                    }
                }
            }

            // --- WaitEnd ---
            self.ticks.wait_until(deadline);
            deadline += cycle_time;
            // The write pulse must go away before the clock falls: the
            // processor may still be holding address and data, and the
            // pulse must not span the edge.
            self.ctx.or_out(self.masks.ramwe);
        };

        if !interrupted {
            // The last iteration lasts as long as all the others.
            self.ticks.wait_until(deadline);
        }

        // Leave in the second half-cycle, whatever happened.
        self.ctx.or_out(self.masks.clk0);

        if self.slots.end == EndOp::Restore {
            self.patches.restore(&mut self.slots);
            log::debug!("loop restored after {:?}", params.mode);
        }

        Ok(match state.loader {
            Some(loader) => loader.remaining() as u32,
            None => state.count,
        })
    }
}
