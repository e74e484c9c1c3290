use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info, warn};

/// Tokens the interrupt handler can park before the consumer must catch up.
pub const IRQ_QUEUE_DEPTH: usize = 5;

/// Identifies which GPIO line fired. The power chip's active-low interrupt
/// line is the only producer today.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IrqToken(pub u8);

/// Bounded FIFO between the hardware interrupt context and the consumer.
/// The producer never blocks; overflow drops the newest token.
pub struct IrqQueue {
    ch: Channel<CriticalSectionRawMutex, IrqToken, IRQ_QUEUE_DEPTH>,
}

impl IrqQueue {
    pub const fn new() -> Self {
        Self { ch: Channel::new() }
    }

    /// Interrupt-safe enqueue. A dropped token is harmless: the next
    /// periodic poll re-reads the chip status anyway.
    pub fn push_from_isr(&self, token: IrqToken) {
        let _ = self.ch.try_send(token);
    }

    pub fn pop(&self) -> Option<IrqToken> {
        self.ch.try_receive().ok()
    }
}

impl Default for IrqQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Latched interrupt conditions, cleared by the read that returned them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IrqFlags(pub u16);

impl IrqFlags {
    pub const BAT_INSERT: u16 = 1 << 0;
    pub const BAT_REMOVE: u16 = 1 << 1;
    pub const VBUS_INSERT: u16 = 1 << 2;
    pub const VBUS_REMOVE: u16 = 1 << 3;
    pub const PKEY_SHORT: u16 = 1 << 4;
    pub const PKEY_LONG: u16 = 1 << 5;
    pub const CHG_START: u16 = 1 << 6;
    pub const CHG_DONE: u16 = 1 << 7;

    pub fn contains(self, mask: u16) -> bool {
        self.0 & mask != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerError {
    /// A two-wire transaction exceeded its 1 second budget.
    BusTimeout,
}

/// The vendor power-management chip driver. Register-level access is out of
/// scope; these are the semantic accessors the engine consumes.
pub trait PowerChip {
    /// Reads and clears the latched interrupt-status register. Conditions
    /// the hardware coalesced into the same read are reported once.
    fn read_irq_status(&mut self) -> Result<IrqFlags, PowerError>;
    fn battery_percent(&mut self) -> Result<u8, PowerError>;
    fn is_charging(&mut self) -> Result<bool, PowerError>;
}

/// Last-polled battery state. A single writer (the consumer) overwrites it
/// wholesale; readers are lock-free and may observe a stale value between
/// polls, which is fine.
pub struct PowerSnapshot {
    percent: AtomicU8,
    charging: AtomicBool,
}

impl PowerSnapshot {
    pub const fn new() -> Self {
        Self {
            percent: AtomicU8::new(0),
            charging: AtomicBool::new(false),
        }
    }

    pub fn battery_percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    pub fn is_charging(&self) -> bool {
        self.charging.load(Ordering::Relaxed)
    }
}

impl Default for PowerSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer side of the pipeline: drains interrupt tokens, reads the chip's
/// latched conditions and refreshes the snapshot on every iteration.
pub struct PowerMonitor<P: PowerChip> {
    chip: P,
    snapshot: PowerSnapshot,
}

impl<P: PowerChip> PowerMonitor<P> {
    pub fn new(chip: P) -> Self {
        Self {
            chip,
            snapshot: PowerSnapshot::new(),
        }
    }

    pub fn snapshot(&self) -> &PowerSnapshot {
        &self.snapshot
    }

    /// One consumer iteration. Repeated bus timeouts only leave the snapshot
    /// stale; nothing in here is fatal.
    pub fn service(&mut self, queue: &IrqQueue) {
        while let Some(token) = queue.pop() {
            debug!("pmu interrupt on gpio {}", token.0);
        }

        match self.chip.read_irq_status() {
            Ok(flags) => log_conditions(flags),
            Err(PowerError::BusTimeout) => warn!("pmu status read timed out"),
        }

        // Refresh the snapshot whatever conditions fired; last value wins.
        match self.chip.battery_percent() {
            Ok(percent) => self.snapshot.percent.store(percent.min(100), Ordering::Relaxed),
            Err(PowerError::BusTimeout) => warn!("battery percent read timed out"),
        }
        match self.chip.is_charging() {
            Ok(charging) => self.snapshot.charging.store(charging, Ordering::Relaxed),
            Err(PowerError::BusTimeout) => warn!("charge state read timed out"),
        }
    }
}

fn log_conditions(flags: IrqFlags) {
    if flags.is_empty() {
        return;
    }
    if flags.contains(IrqFlags::BAT_INSERT) {
        info!("battery inserted");
    }
    if flags.contains(IrqFlags::BAT_REMOVE) {
        info!("battery removed");
    }
    if flags.contains(IrqFlags::VBUS_INSERT) {
        info!("supply present");
    }
    if flags.contains(IrqFlags::VBUS_REMOVE) {
        info!("supply absent");
    }
    if flags.contains(IrqFlags::PKEY_SHORT) {
        info!("power key short press");
    }
    if flags.contains(IrqFlags::PKEY_LONG) {
        info!("power key long press");
    }
    if flags.contains(IrqFlags::CHG_START) {
        info!("charge started");
    }
    if flags.contains(IrqFlags::CHG_DONE) {
        info!("charge done");
    }
}

/// Status-bar glyph for the current snapshot, thresholds as shipped on the
/// device. While charging the caller alternates the bolt with the level
/// glyph every tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatteryIcon {
    Full,
    ThreeQuarters,
    Half,
    Quarter,
    Low,
    Charging,
}

impl BatteryIcon {
    pub fn pick(percent: u8, charging_blink: bool) -> Self {
        if charging_blink {
            BatteryIcon::Charging
        } else if percent > 90 {
            BatteryIcon::Full
        } else if percent > 70 {
            BatteryIcon::ThreeQuarters
        } else if percent > 40 {
            BatteryIcon::Half
        } else if percent > 10 {
            BatteryIcon::Quarter
        } else {
            BatteryIcon::Low
        }
    }
}
