//! The complete software-defined computer: port, sequencer, processor,
//! RAM and signal latch wired together.

use std::sync::{Arc, Mutex};

use crate::components::cpu::{BusAccess, BusCycle, Wdc65c02Bus};
use crate::components::latch::SignalLatch;
use crate::components::memory::StaticRam;
use crate::config::BoardConfig;
use crate::pin::PinMasks;
use crate::port::{BusDevice, Port, PortContext};
use crate::sequencer::Sequencer;
use crate::signal::SignalChannel;
use crate::ticks::TickSource;

/// The board glue: reacts to port level changes and keeps the
/// processor, RAM and signal latch consistent with them.
///
/// - a falling clock edge turns the processor's bus cycle over;
/// - a rising signal-latch clock transfers the signal levels;
/// - a falling RAM write enable commits a write (address and data are
///   stable across the whole enable window in every sequenced access);
/// - the processor's address reaches the shared lines only while the
///   address buffer is enabled during the first half-cycle, and the
///   RAM drives the data lines only while read-enabled.
struct BusWiring {
    name: String,
    slot: usize,
    masks: PinMasks,
    cpu: Arc<Mutex<Wdc65c02Bus>>,
    ram: Arc<Mutex<StaticRam>>,
    latch: Arc<Mutex<SignalLatch>>,
    prev: u32,
    cycle: BusCycle,
}

impl BusDevice for BusWiring {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_port_change(&mut self, port: &Port) -> bool {
        let levels = port.ina();
        if levels == self.prev {
            return false;
        }
        let fell = self.prev & !levels;
        let m = self.masks;

        let mut cpu = match self.cpu.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        let mut latch = match self.latch.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        let mut ram = match self.ram.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };

        latch.clock(levels & m.slc != 0, levels);
        cpu.set_inputs(latch.nmi(), latch.irq(), latch.rdy(), latch.res(), latch.so());

        if fell & m.clk0 != 0 {
            // End of a cycle: the byte on the bus during the second
            // half-cycle is what the processor takes away.
            let data = m.data_from(self.prev);
            self.cycle = cpu.step(data);
        }

        if fell & m.ramwe != 0 {
            let address = StaticRam::banked(self.cycle.addr, latch.bank());
            ram.write_byte(address, m.data_from(levels));
        }

        let mut out = 0u32;
        let mut dir = m.rw;
        if self.cycle.access == BusAccess::Read {
            out |= m.rw;
        }

        let clk_high = levels & m.clk0 != 0;
        if !clk_high && levels & m.aen == 0 {
            out |= m.addr_value(self.cycle.addr);
            dir |= m.addr;
        }
        if clk_high && self.cycle.access == BusAccess::Write {
            out |= m.data_value(self.cycle.data);
            dir |= m.data;
        }
        if levels & m.ramoe == 0 && self.cycle.access == BusAccess::Read {
            let address = StaticRam::banked(self.cycle.addr, latch.bank());
            out |= m.data_value(ram.read_byte(address));
            dir |= m.data;
        }

        self.prev = levels;
        port.drive_raw(self.slot, out, dir)
    }
}

/// A software-defined 6502 computer.
///
/// Owns the shared port and all on-board chips, plus the sequencer
/// context. Other execution contexts join via
/// [`claim_context`](Sdc6502::claim_context) and cooperate purely
/// through port levels and the shared signal word.
pub struct Sdc6502 {
    port: Arc<Port>,
    config: BoardConfig,
    signals: Arc<SignalChannel>,
    sequencer: Sequencer,
    cpu: Arc<Mutex<Wdc65c02Bus>>,
    ram: Arc<Mutex<StaticRam>>,
    latch: Arc<Mutex<SignalLatch>>,
}

impl Sdc6502 {
    /// Reference board with default configuration.
    pub fn new(ticks: Arc<dyn TickSource>) -> Result<Self, String> {
        Self::with_config(BoardConfig::default(), ticks)
    }

    pub fn with_config(config: BoardConfig, ticks: Arc<dyn TickSource>) -> Result<Self, String> {
        config.validate()?;
        let masks = config.pins.masks();
        let port = Port::new();
        let signals = Arc::new(SignalChannel::new(masks));
        let cpu = Arc::new(Mutex::new(Wdc65c02Bus::new(format!("{}_CPU", config.name))));
        let ram = Arc::new(Mutex::new(StaticRam::new(format!("{}_RAM", config.name))));
        let latch = Arc::new(Mutex::new(SignalLatch::new(masks)));

        let slot = port.claim_device_slot()?;
        port.attach(Box::new(BusWiring {
            name: format!("{}_WIRING", config.name),
            slot,
            masks,
            cpu: cpu.clone(),
            ram: ram.clone(),
            latch: latch.clone(),
            prev: 0,
            cycle: BusCycle {
                addr: 0,
                access: BusAccess::Read,
                data: 0,
            },
        }));

        let ctx = port.claim()?;
        let sequencer = Sequencer::new(ctx, signals.clone(), ticks, config.clone())?;
        log::debug!("board '{}' assembled", config.name);

        Ok(Sdc6502 {
            port,
            config,
            signals,
            sequencer,
            cpu,
            ram,
            latch,
        })
    }

    pub fn initialize(&mut self) -> Result<(), String> {
        self.sequencer.initialize()
    }

    pub fn run(&mut self, cycle_count: u32, cycle_time: u32) -> Result<u32, String> {
        self.sequencer.run(cycle_count, cycle_time)
    }

    pub fn load(&mut self, source: &[u8], target: u16) -> Result<u32, String> {
        self.sequencer.load(source, target)
    }

    pub fn port(&self) -> &Arc<Port> {
        &self.port
    }

    pub fn signals(&self) -> &Arc<SignalChannel> {
        &self.signals
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn cpu(&self) -> &Arc<Mutex<Wdc65c02Bus>> {
        &self.cpu
    }

    pub fn ram(&self) -> &Arc<Mutex<StaticRam>> {
        &self.ram
    }

    /// Claim a port context for a cooperating execution context.
    pub fn claim_context(&self) -> Result<PortContext, String> {
        self.port.claim()
    }

    /// The signal word as latched for the processor.
    pub fn latched_word(&self) -> u32 {
        self.latch.lock().map(|latch| latch.word()).unwrap_or(0)
    }

    /// Read memory through the currently selected bank.
    pub fn ram_read(&self, addr: u16, length: usize) -> Result<Vec<u8>, String> {
        let bank = self
            .latch
            .lock()
            .map_err(|_| "latch lock poisoned".to_string())?
            .bank();
        let ram = self
            .ram
            .lock()
            .map_err(|_| "RAM lock poisoned".to_string())?;
        ram.read_range(StaticRam::banked(addr, bank), length)
    }

    /// Write memory directly, bypassing the bus (vectors, test data).
    pub fn ram_write(&self, addr: u16, data: &[u8]) -> Result<(), String> {
        let bank = self
            .latch
            .lock()
            .map_err(|_| "latch lock poisoned".to_string())?
            .bank();
        let mut ram = self
            .ram
            .lock()
            .map_err(|_| "RAM lock poisoned".to_string())?;
        ram.load_data(data, StaticRam::banked(addr, bank))
    }
}
