#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

/*! # DS2482
 *
 * Driver for the Analog Devices (Maxim) DS2482 I2C to 1-Wire bridge.
 *
 * The bridge generates all 1-Wire timing itself. The host sends one command
 * (with at most one argument byte) per I2C write, reads the one byte reply, and
 * polls the status register until the 1-Wire busy bit clears.
 * [`Ds2482`] implements the [`OneWire`] trait, so the search engine of
 * [`embedded_onewire`] runs on top of it:
 *
 * ```ignore
 * let mut bridge = Ds2482Builder::default().build(i2c, delay)?;
 * let mut search = OneWireSearch::new(&mut bridge, OneWireSearchKind::Normal);
 * while let Some(rom) = search.next()? {
 *     // ...
 * }
 * ```
 */

pub use embedded_onewire::{OneWire, OneWireError, OneWireResult, PowerLevel};
mod error;
mod onewire;
mod registers;
mod traits;

pub use error::Ds2482Error;
pub use registers::{Command, DeviceConfiguration, DeviceStatus, Ds2482Builder, Register};
pub use traits::Interact;

/// Results of DS2482-specific function calls.
pub type Ds2482Result<T, E> = Result<T, Ds2482Error<E>>;

/// I2C address of a DS2482-100 with AD0 and AD1 tied low.
pub const DEFAULT_ADDRESS: u8 = 0x18;

/// Status re-reads allowed before a 1-Wire operation is declared stuck.
pub const DEFAULT_POLL_LIMIT: u8 = 10;

/// A DS2482 I2C to 1-Wire bridge device.
///
/// Takes ownership of an I2C bus (implementing [`I2c`](embedded_hal::i2c::I2c) trait)
/// and a timer object implementing the [`DelayNs`](embedded_hal::delay::DelayNs) trait.
///
/// The handle caches the device configuration last written and the short
/// flag of the last 1-Wire reset. Commands from two handles to the same chip
/// must not interleave.
pub struct Ds2482<I, D> {
    pub(crate) i2c: I,
    pub(crate) addr: u8,
    pub(crate) delay: D,
    pub(crate) poll_limit: u8,
    pub(crate) poll_interval_us: u32,
    pub(crate) config: DeviceConfiguration,
    pub(crate) short_detected: bool,
}

impl<I, D> Ds2482<I, D> {
    /// Creates a new instance of `Ds2482` with the given I2C interface.
    ///
    /// No I/O is performed; call [`Ds2482::detect`] before using the bus, or
    /// build the handle with [`Ds2482Builder`].
    pub fn new(i2c: I, delay: D) -> Self {
        Ds2482 {
            i2c,
            addr: DEFAULT_ADDRESS,
            delay,
            poll_limit: DEFAULT_POLL_LIMIT,
            poll_interval_us: 0,
            config: DeviceConfiguration::new(),
            short_detected: false,
        }
    }

    /// Set the 7-bit I2C address.
    pub fn with_address(mut self, addr: u8) -> Self {
        self.addr = addr;
        self
    }

    /// Set the poll limit.
    ///
    /// The poll limit is the number of status re-reads the host performs
    /// while the 1-Wire busy bit is set before it resets the bridge.
    pub fn with_poll_limit(mut self, poll_limit: u8) -> Self {
        self.poll_limit = poll_limit;
        self
    }

    /// Set a delay between two status re-reads, in microseconds.
    pub fn with_poll_interval_us(mut self, interval: u32) -> Self {
        self.poll_interval_us = interval;
        self
    }

    /// The 7-bit I2C address of the bridge.
    pub fn i2c_address(&self) -> u8 {
        self.addr
    }

    /// The device configuration last written to the bridge.
    pub fn config(&self) -> DeviceConfiguration {
        self.config
    }

    /// Whether the last 1-Wire reset detected a short on the bus.
    pub fn short_detected(&self) -> bool {
        self.short_detected
    }

    /// Releases the I2C bus and the delay.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}
