use serde::{Deserialize, Serialize};

/// Bit position of every bus function on the 32-bit I/O port.
///
/// The low sixteen lines are time-multiplexed: the processor's address
/// appears on them during the first half-cycle (while the address
/// buffer is enabled), the data bus uses the low eight during the
/// second half-cycle, and the signal flip-flop inputs share the upper
/// eight. All enable, latch and signal lines are active-low; the clock
/// is active-high and R/W reads high for a processor read.
///
/// Positions are configuration, not hard-coded constants, so the
/// sequencer can be retargeted to a different board revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinLayout {
    /// Lowest data-bus line (8 consecutive lines).
    pub data_lsb: u32,
    /// Lowest address-bus line (16 consecutive lines).
    pub addr_lsb: u32,
    /// Spare select output 0 (bus-enable on newer boards).
    pub sel0: u32,
    /// Spare select output 1.
    pub setup: u32,
    /// RAM bank switch.
    pub rama16: u32,
    /// Non-maskable interrupt (edge-triggered).
    pub nmi: u32,
    /// Interrupt request (level-triggered).
    pub irq: u32,
    /// Hold the processor (read cycles only).
    pub rdy: u32,
    /// Processor reset.
    pub res: u32,
    /// Set overflow.
    pub so: u32,
    /// RAM read enable.
    pub ramoe: u32,
    /// RAM write enable.
    pub ramwe: u32,
    /// Read / not-write, driven by the processor.
    pub rw: u32,
    /// Address buffer enable.
    pub aen: u32,
    /// Signal latch clock; a rising edge transfers the signal lines.
    pub slc: u32,
    /// Processor clock, shared with the serial-memory clock. Also the
    /// pseudo-interrupt line: another context holding it high pauses
    /// the sequencer.
    pub clk0: u32,
    /// Serial-memory data line, held at its idle level during runs.
    pub sda: u32,
}

impl Default for PinLayout {
    /// Reference board pinout (hardware revision 8).
    fn default() -> Self {
        PinLayout {
            data_lsb: 0,
            addr_lsb: 0,
            sel0: 8,
            setup: 9,
            rama16: 10,
            nmi: 11,
            irq: 12,
            rdy: 13,
            res: 14,
            so: 15,
            ramoe: 20,
            ramwe: 22,
            rw: 23,
            aen: 24,
            slc: 25,
            clk0: 28,
            sda: 29,
        }
    }
}

fn pmask(pin: u32) -> u32 {
    1 << pin
}

impl PinLayout {
    /// Precompute the working masks for this layout.
    pub fn masks(&self) -> PinMasks {
        let data = 0xFF << self.data_lsb;
        let addr = 0xFFFF << self.addr_lsb;
        let signals = pmask(self.sel0)
            | pmask(self.setup)
            | pmask(self.rama16)
            | pmask(self.nmi)
            | pmask(self.irq)
            | pmask(self.rdy)
            | pmask(self.res)
            | pmask(self.so);
        let ram = pmask(self.ramoe) | pmask(self.ramwe);
        let outputs =
            ram | pmask(self.aen) | pmask(self.slc) | pmask(self.clk0) | pmask(self.sda);

        PinMasks {
            data,
            addr,
            signals,
            ram,
            outputs,
            data_lsb: self.data_lsb,
            addr_lsb: self.addr_lsb,
            sel0: pmask(self.sel0),
            setup: pmask(self.setup),
            rama16: pmask(self.rama16),
            nmi: pmask(self.nmi),
            irq: pmask(self.irq),
            rdy: pmask(self.rdy),
            res: pmask(self.res),
            so: pmask(self.so),
            ramoe: pmask(self.ramoe),
            ramwe: pmask(self.ramwe),
            rw: pmask(self.rw),
            aen: pmask(self.aen),
            slc: pmask(self.slc),
            clk0: pmask(self.clk0),
            sda: pmask(self.sda),
            // End of a second half-cycle: clock high, buffer and RAM off.
            out_init: pmask(self.clk0) | pmask(self.aen) | pmask(self.sda) | ram,
            // Start of a first half-cycle: buffer on, RAM off.
            out_phi1: pmask(self.sda) | ram,
            // Idle levels while the processor is not in use.
            out_safe: pmask(self.aen) | pmask(self.sda) | ram,
            dir_init: outputs,
            halt: signals & !pmask(self.rdy),
            reset: signals & !pmask(self.res),
        }
    }

    /// Check the overlap invariant: control outputs, the R/W input and
    /// the signal lines must be pairwise disjoint, and none of them may
    /// land on a bus line; the only sanctioned overlaps are the
    /// time-multiplexed bus lines themselves.
    pub fn validate(&self) -> Result<(), String> {
        let m = self.masks();

        let singles = [
            ("RAMOE", m.ramoe),
            ("RAMWE", m.ramwe),
            ("RW", m.rw),
            ("AEN", m.aen),
            ("SLC", m.slc),
            ("CLK0", m.clk0),
            ("SDA", m.sda),
        ];
        let mut seen = 0u32;
        for (name, mask) in singles {
            if seen & mask != 0 {
                return Err(format!("pin {} overlaps another control pin", name));
            }
            seen |= mask;
        }

        if (m.outputs | m.rw) & (m.addr | m.data) != 0 {
            return Err("control pin placed on a bus line".to_string());
        }
        if (m.outputs | m.rw) & m.signals != 0 {
            return Err("control pin overlaps a signal line".to_string());
        }
        // Data is the low half of the address bus, by construction of
        // the board: the same physical lines carry both.
        if m.data & m.addr != m.data {
            return Err("data bus must share the low address lines".to_string());
        }

        let signal_pins = [
            self.sel0, self.setup, self.rama16, self.nmi, self.irq, self.rdy, self.res, self.so,
        ];
        let mut seen = 0u32;
        for pin in signal_pins {
            let mask = pmask(pin);
            if seen & mask != 0 {
                return Err(format!("signal pin {} assigned twice", pin));
            }
            seen |= mask;
        }

        Ok(())
    }
}

/// Working bit masks derived from a [`PinLayout`].
///
/// The composite images mirror the port states the sequencer moves
/// through: `out_init` is the end-of-Phi2 idle image, `out_phi1` the
/// start-of-Phi1 image, `out_safe` the parked image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMasks {
    pub data: u32,
    pub addr: u32,
    pub signals: u32,
    pub ram: u32,
    pub outputs: u32,

    pub sel0: u32,
    pub setup: u32,
    pub rama16: u32,
    pub nmi: u32,
    pub irq: u32,
    pub rdy: u32,
    pub res: u32,
    pub so: u32,

    pub ramoe: u32,
    pub ramwe: u32,
    pub rw: u32,
    pub aen: u32,
    pub slc: u32,
    pub clk0: u32,
    pub sda: u32,

    pub out_init: u32,
    pub out_phi1: u32,
    pub out_safe: u32,
    pub dir_init: u32,
    pub halt: u32,
    pub reset: u32,

    data_lsb: u32,
    addr_lsb: u32,
}

impl PinMasks {
    /// Place a data byte on its port lines.
    pub fn data_value(&self, byte: u8) -> u32 {
        (byte as u32) << self.data_lsb
    }

    /// Extract the data byte from a port word.
    pub fn data_from(&self, word: u32) -> u8 {
        ((word & self.data) >> self.data_lsb) as u8
    }

    /// Extract the address from a port word.
    pub fn addr_from(&self, word: u32) -> u16 {
        ((word & self.addr) >> self.addr_lsb) as u16
    }

    /// Place an address on its port lines.
    pub fn addr_value(&self, addr: u16) -> u32 {
        (addr as u32) << self.addr_lsb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_valid() {
        let layout = PinLayout::default();
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn test_default_masks_match_board() {
        let m = PinLayout::default().masks();

        assert_eq!(m.data, 0x0000_00FF);
        assert_eq!(m.addr, 0x0000_FFFF);
        assert_eq!(m.signals, 0x0000_FF00);
        assert_eq!(m.ram, (1 << 20) | (1 << 22));
        assert_eq!(m.clk0, 1 << 28);
        assert_eq!(m.out_phi1, (1 << 29) | (1 << 20) | (1 << 22));
        assert_eq!(m.out_init, m.out_phi1 | (1 << 28) | (1 << 24));
        // Parked: like the idle image but with the clock released.
        assert_eq!(m.out_safe, m.out_init & !m.clk0);
        assert_eq!(m.dir_init, m.outputs);
    }

    #[test]
    fn test_halt_and_reset_images() {
        let m = PinLayout::default().masks();

        // Halt drops only RDY, reset drops only RES.
        assert_eq!(m.halt, m.signals & !(1 << 13));
        assert_eq!(m.reset, m.signals & !(1 << 14));
        assert_eq!(m.halt & m.rdy, 0);
        assert_eq!(m.reset & m.res, 0);
    }

    #[test]
    fn test_exhaustive_control_pin_overlap() {
        let m = PinLayout::default().masks();
        let controls = [m.ramoe, m.ramwe, m.rw, m.aen, m.slc, m.clk0, m.sda];

        for (i, a) in controls.iter().enumerate() {
            for (j, b) in controls.iter().enumerate() {
                if i != j {
                    assert_eq!(a & b, 0, "control pins {} and {} overlap", i, j);
                }
            }
            assert_eq!(a & m.signals, 0);
            assert_eq!(a & m.addr, 0);
        }
    }

    #[test]
    fn test_duplicate_signal_pin_rejected() {
        let layout = PinLayout {
            irq: 11, // collides with nmi
            ..PinLayout::default()
        };
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_control_pin_on_bus_line_rejected() {
        let layout = PinLayout {
            slc: 5, // inside the address bus
            ..PinLayout::default()
        };
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_data_helpers_round_trip() {
        let m = PinLayout::default().masks();
        assert_eq!(m.data_value(0xA5), 0xA5);
        assert_eq!(m.data_from(0xFFFF_FFA5), 0xA5);
        assert_eq!(m.addr_from(0x3F00_C123), 0xC123);
        assert_eq!(m.addr_value(0xC123), 0xC123);
    }

    #[test]
    fn test_layout_serde_round_trip() {
        let layout = PinLayout::default();
        let json = serde_json::to_string(&layout).unwrap();
        let back: PinLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(layout, back);
    }
}
