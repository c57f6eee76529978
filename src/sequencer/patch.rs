//! Patch and mode tables.
//!
//! The main loop has four substitution points. Each point holds a
//! small op tag that the loop consults once per iteration; selecting a
//! mode swaps the tags in from a declarative table and backs the old
//! ones up, so one tight loop serves three protocols without a mode
//! branch anywhere else on the timed path.

/// Operating mode of a control call.
///
/// `None` is never requested; it terminates the mode table scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    None,
    Init,
    Run,
    Load,
}

/// Op resident in the Phi1 alternate slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phi1Op {
    /// Plain cycle; other contexts own this moment.
    Nop,
    /// Release the reset line partway through the init countdown.
    ResetCountdown,
    /// Direct-memory-write state machine dispatch.
    LoadDispatch,
}

/// Op resident in the Phi2 alternate slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phi2Op {
    /// Pick up a fresh word from the shared signal channel.
    SampleSignals,
    /// Keep the call-local signal image; the channel is not consulted.
    HoldSignals,
}

/// Op resident in the loop-check slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOp {
    /// Decrement the remaining-cycle counter, leave at zero.
    Countdown,
    /// Free-running; the counter is never stored.
    Free,
    /// Leave when the load state machine reports completion.
    UntilLoadDone,
}

/// Op resident in the end-of-loop slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOp {
    /// Plain return; nothing was patched.
    Return,
    /// Undo the patches before returning.
    Restore,
}

/// One-shot set-up selector, run after patching and before the first
/// cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeInit {
    Run,
    Init,
    Load,
}

/// The four patchable slots of the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSlots {
    pub phi1: Phi1Op,
    pub phi2: Phi2Op,
    pub loop_op: LoopOp,
    pub end: EndOp,
}

impl Default for LoopSlots {
    /// The resident (Run mode) ops.
    fn default() -> Self {
        LoopSlots {
            phi1: Phi1Op::Nop,
            phi2: Phi2Op::SampleSignals,
            loop_op: LoopOp::Countdown,
            end: EndOp::Return,
        }
    }
}

/// One mode's row: a replacement op per patch slot plus its set-up.
pub struct ModeEntry {
    pub mode: Mode,
    pub phi1: Phi1Op,
    pub phi2: Phi2Op,
    pub loop_op: LoopOp,
    pub end: EndOp,
    pub init: ModeInit,
}

/// Replacement ops per mode, terminated by the `None` tag. Run mode
/// has no row: it executes with the resident ops.
pub const MODE_TABLE: &[ModeEntry] = &[
    ModeEntry {
        mode: Mode::Load,
        phi1: Phi1Op::LoadDispatch,
        phi2: Phi2Op::HoldSignals,
        loop_op: LoopOp::UntilLoadDone,
        end: EndOp::Restore,
        init: ModeInit::Load,
    },
    ModeEntry {
        mode: Mode::Init,
        phi1: Phi1Op::ResetCountdown,
        phi2: Phi2Op::HoldSignals,
        loop_op: LoopOp::Countdown,
        end: EndOp::Restore,
        init: ModeInit::Init,
    },
    // Terminator.
    ModeEntry {
        mode: Mode::None,
        phi1: Phi1Op::Nop,
        phi2: Phi2Op::SampleSignals,
        loop_op: LoopOp::Countdown,
        end: EndOp::Return,
        init: ModeInit::Run,
    },
];

/// Backups of the resident slot ops while a mode is applied.
///
/// Filled by [`apply`](PatchTable::apply), emptied again by
/// [`restore`](PatchTable::restore); restoring with nothing patched is
/// a no-op.
#[derive(Debug, Default)]
pub struct PatchTable {
    phi1: Option<Phi1Op>,
    phi2: Option<Phi2Op>,
    loop_op: Option<LoopOp>,
    end: Option<EndOp>,
}

impl PatchTable {
    pub fn new() -> Self {
        PatchTable::default()
    }

    /// Install the given mode's ops, backing up the resident ones.
    ///
    /// An unknown mode (including `None`) is a hard error and leaves
    /// the slots untouched; there is deliberately no silent fallback
    /// to whatever is resident.
    pub fn apply(&mut self, slots: &mut LoopSlots, mode: Mode) -> Result<ModeInit, String> {
        let entry = Self::find(mode)?;

        self.phi1 = Some(slots.phi1);
        slots.phi1 = entry.phi1;
        self.phi2 = Some(slots.phi2);
        slots.phi2 = entry.phi2;
        self.loop_op = Some(slots.loop_op);
        slots.loop_op = entry.loop_op;
        self.end = Some(slots.end);
        slots.end = entry.end;

        Ok(entry.init)
    }

    /// Write the backed-up ops back, in table order.
    pub fn restore(&mut self, slots: &mut LoopSlots) {
        if let Some(op) = self.phi1.take() {
            slots.phi1 = op;
        }
        if let Some(op) = self.phi2.take() {
            slots.phi2 = op;
        }
        if let Some(op) = self.loop_op.take() {
            slots.loop_op = op;
        }
        if let Some(op) = self.end.take() {
            slots.end = op;
        }
    }

    pub fn is_patched(&self) -> bool {
        self.phi1.is_some() || self.phi2.is_some() || self.loop_op.is_some() || self.end.is_some()
    }

    fn find(mode: Mode) -> Result<&'static ModeEntry, String> {
        for entry in MODE_TABLE {
            if entry.mode == Mode::None {
                break;
            }
            if entry.mode == mode {
                return Ok(entry);
            }
        }
        Err(format!("no mode table entry for {:?}", mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_then_restore_is_idempotent() {
        for mode in [Mode::Init, Mode::Load] {
            let mut slots = LoopSlots::default();
            let before = slots;
            let mut patches = PatchTable::new();

            patches.apply(&mut slots, mode).unwrap();
            assert!(patches.is_patched());
            assert_ne!(slots, before);

            patches.restore(&mut slots);
            assert!(!patches.is_patched());
            assert_eq!(slots, before);
        }
    }

    #[test]
    fn test_restore_with_nothing_patched_is_noop() {
        let mut slots = LoopSlots {
            loop_op: LoopOp::Free,
            ..LoopSlots::default()
        };
        let before = slots;
        let mut patches = PatchTable::new();

        patches.restore(&mut slots);
        assert_eq!(slots, before);
    }

    #[test]
    fn test_none_mode_is_rejected() {
        let mut slots = LoopSlots::default();
        let before = slots;
        let mut patches = PatchTable::new();

        assert!(patches.apply(&mut slots, Mode::None).is_err());
        assert_eq!(slots, before);
        assert!(!patches.is_patched());
    }

    #[test]
    fn test_run_mode_has_no_row() {
        let mut slots = LoopSlots::default();
        let mut patches = PatchTable::new();
        // Run executes unpatched; asking the table for it must fail
        // loudly rather than install something.
        assert!(patches.apply(&mut slots, Mode::Run).is_err());
    }

    #[test]
    fn test_load_row_ops() {
        let mut slots = LoopSlots::default();
        let mut patches = PatchTable::new();
        let init = patches.apply(&mut slots, Mode::Load).unwrap();

        assert_eq!(init, ModeInit::Load);
        assert_eq!(slots.phi1, Phi1Op::LoadDispatch);
        assert_eq!(slots.phi2, Phi2Op::HoldSignals);
        assert_eq!(slots.loop_op, LoopOp::UntilLoadDone);
        assert_eq!(slots.end, EndOp::Restore);
    }

    #[test]
    fn test_backups_track_resident_ops() {
        // The backup must hold whatever was resident, not the default.
        let mut slots = LoopSlots {
            loop_op: LoopOp::Free,
            ..LoopSlots::default()
        };
        let mut patches = PatchTable::new();

        patches.apply(&mut slots, Mode::Init).unwrap();
        patches.restore(&mut slots);
        assert_eq!(slots.loop_op, LoopOp::Free);
    }
}
