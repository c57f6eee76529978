//! Board configuration.
//!
//! Everything the sequencer must know about the target platform —
//! pin placement, per-phase tick budgets, the synthetic instruction
//! encodings fed to the external processor — lives here, so the core
//! can be retargeted to another board revision or processor family
//! from a JSON description instead of a recompile.

use serde::{Deserialize, Serialize};

use crate::pin::PinLayout;

/// Per-phase tick offsets of one bus cycle, relative to the falling
/// clock edge, plus the hard cycle-time minimums.
///
/// The offsets are the contract other contexts synchronize against:
/// the address is only readable between `phi1_out` and `aen_off`, the
/// RAM enables only move at `ram_enable`, and so on. Deviating from
/// them breaks every cooperating context, not just this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Hard lower bound for the configured cycle time. Requests below
    /// it are silently clamped up.
    pub min_cycle_ticks: u32,
    /// Lower bound for the first iteration only, which needs extra
    /// slack to synchronize with the shared-memory round.
    pub first_cycle_min_ticks: u32,

    /// Phi1 baseline image driven.
    pub phi1_out: u32,
    /// Address bus and R/W sampled.
    pub addr_sample: u32,
    /// Address buffer disabled again.
    pub aen_off: u32,
    /// Signal levels driven onto the flip-flop inputs.
    pub sig_drive: u32,
    /// First patchable slot.
    pub phi1_alt: u32,
    /// Signal latch clocked; the processor sees the signals now.
    pub slc_rise: u32,
    /// Clock driven high: Phi2 begins.
    pub clk_rise: u32,
    /// Signal drivers released.
    pub sig_release: u32,
    /// Second patchable slot.
    pub phi2_alt: u32,
    /// RAM enabled for read or write.
    pub ram_enable: u32,
    /// Remaining-cycle check.
    pub loop_check: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            min_cycle_ticks: 80,
            first_cycle_min_ticks: 95,
            phi1_out: 8,
            addr_sample: 12,
            aen_off: 20,
            sig_drive: 24,
            phi1_alt: 32,
            slc_rise: 36,
            clk_rise: 40,
            sig_release: 44,
            phi2_alt: 48,
            ram_enable: 55,
            loop_check: 59,
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<(), String> {
        let offsets = [
            self.phi1_out,
            self.addr_sample,
            self.aen_off,
            self.sig_drive,
            self.phi1_alt,
            self.slc_rise,
            self.clk_rise,
            self.sig_release,
            self.phi2_alt,
            self.ram_enable,
            self.loop_check,
        ];
        for pair in offsets.windows(2) {
            if pair[0] >= pair[1] {
                return Err(format!(
                    "phase offsets must be strictly increasing ({} then {})",
                    pair[0], pair[1]
                ));
            }
        }
        if self.loop_check >= self.min_cycle_ticks {
            return Err(format!(
                "loop check at tick {} does not fit a {}-tick cycle",
                self.loop_check, self.min_cycle_ticks
            ));
        }
        if self.first_cycle_min_ticks < self.min_cycle_ticks {
            return Err("first-cycle minimum below the cycle minimum".to_string());
        }
        Ok(())
    }
}

/// Values fed to the external processor during a direct memory write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Fill instruction: legal, flag-mutating but otherwise harmless,
    /// two bytes in two cycles so the program counter advances one
    /// address per cycle. Compare-immediate on the reference CPU.
    pub opcode_fill: u8,
    /// Return-from-interrupt encoding.
    pub opcode_return: u8,
    /// Interrupt vector the processor fetches after the forced
    /// interrupt.
    pub vector_nmi: u16,
    /// High byte of the stack area; a read there means the processor
    /// has accepted the return instruction.
    pub stack_page: u8,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            opcode_fill: 0xC9,
            opcode_return: 0x40,
            vector_nmi: 0xFFFA,
            stack_page: 0x01,
        }
    }
}

/// Complete description of one board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub name: String,
    pub description: String,
    pub pins: PinLayout,
    pub timing: TimingConfig,
    pub feed: FeedConfig,
}

impl Default for BoardConfig {
    fn default() -> Self {
        BoardConfig {
            name: "sdc6502-rev8".to_string(),
            description: "Software-defined 6502 board, hardware revision 8".to_string(),
            pins: PinLayout::default(),
            timing: TimingConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

impl BoardConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.pins.validate()?;
        self.timing.validate()?;
        Ok(())
    }

    /// Parse and validate a configuration from JSON text.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let config: BoardConfig =
            serde_json::from_str(json).map_err(|e| format!("invalid board config: {}", e))?;
        config.validate()?;
        log::debug!("loaded board config '{}'", config.name);
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: &str) -> Result<Self, String> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read board config {}: {}", path, e))?;
        Self::from_json(&json)
    }
}
