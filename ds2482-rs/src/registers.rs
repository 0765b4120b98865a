use crate::{DEFAULT_ADDRESS, DEFAULT_POLL_LIMIT, Ds2482, Ds2482Error, Ds2482Result, traits::Interact};
use bitfield_struct::bitfield;
use embedded_hal::{
    delay::DelayNs,
    i2c::{I2c, SevenBitAddress},
};
use embedded_onewire::OneWireStatus;
use log::{debug, warn};

pub(crate) const DEVICE_RST_CMD: u8 = 0xf0; // Reset the device
pub(crate) const WRITE_CONFIG_CMD: u8 = 0xd2; // Write the device configuration
pub(crate) const READ_PTR_CMD: u8 = 0xe1; // Set the read pointer
pub(crate) const ONEWIRE_RESET_CMD: u8 = 0xb4;
pub(crate) const ONEWIRE_SINGLE_BIT: u8 = 0x87;
pub(crate) const ONEWIRE_WRITE_BYTE: u8 = 0xa5;
pub(crate) const ONEWIRE_READ_BYTE: u8 = 0x96;
pub(crate) const ONEWIRE_TRIPLET: u8 = 0x78;

/// Acknowledge of a device reset: RST set, everything but LL clear.
const DEVICE_RST_ACK: u8 = 0x10;
const DEVICE_RST_ACK_MASK: u8 = 0xf7;

/// Registers selected by [`Command::SetReadPointer`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// Status register, [`DeviceStatus`].
    Status = 0xf0,
    /// Read data register, holds the result of a 1-Wire Read Byte.
    Data = 0xe1,
    /// Device configuration register, [`DeviceConfiguration`].
    Configuration = 0xc3,
}

/// A DS2482 command, with its argument.
///
/// Every command is one I2C write of the opcode and the optional argument,
/// followed by a one byte read of the register the read pointer lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Global reset of the bridge state machine. Terminates any 1-Wire communication.
    DeviceReset,
    /// Write the device configuration. The reply is the configuration register.
    WriteConfig(DeviceConfiguration),
    /// Reset/presence-detect cycle on the 1-Wire line.
    OneWireReset,
    /// One 1-Wire time slot; `true` leaves the line released (read).
    SingleBit(bool),
    /// Write one byte on the 1-Wire line.
    WriteByte(u8),
    /// Read one byte from the 1-Wire line into the read data register.
    ReadByte,
    /// Move the read pointer.
    SetReadPointer(Register),
    /// Two read slots and one write slot of a ROM search, with the direction used
    /// when both read slots are 0.
    Triplet(bool),
}

impl Command {
    /// Opcode and argument as sent on the I2C bus.
    pub(crate) fn frame(&self) -> ([u8; 2], usize) {
        let bit = |b: bool| if b { 0x80 } else { 0x0 };
        match *self {
            Command::DeviceReset => ([DEVICE_RST_CMD, 0], 1),
            Command::WriteConfig(cfg) => ([WRITE_CONFIG_CMD, cfg.wire_byte()], 2),
            Command::OneWireReset => ([ONEWIRE_RESET_CMD, 0], 1),
            Command::SingleBit(b) => ([ONEWIRE_SINGLE_BIT, bit(b)], 2),
            Command::WriteByte(byte) => ([ONEWIRE_WRITE_BYTE, byte], 2),
            Command::ReadByte => ([ONEWIRE_READ_BYTE, 0], 1),
            Command::SetReadPointer(reg) => ([READ_PTR_CMD, reg as u8], 2),
            Command::Triplet(dir) => ([ONEWIRE_TRIPLET, bit(dir)], 2),
        }
    }
}

/// Builder for creating a [`Ds2482`] instance with custom configuration.
pub struct Ds2482Builder {
    pub(crate) addr: u8,
    pub(crate) poll_limit: u8,
    pub(crate) poll_interval_us: u32,
    pub(crate) config: DeviceConfiguration,
}

impl Default for Ds2482Builder {
    fn default() -> Self {
        Ds2482Builder {
            addr: DEFAULT_ADDRESS,
            poll_limit: DEFAULT_POLL_LIMIT,
            poll_interval_us: 0,
            config: DeviceConfiguration::standard(),
        }
    }
}

impl Ds2482Builder {
    /// Sets the 7-bit I2C address of the bridge.
    pub fn with_address(mut self, addr: u8) -> Self {
        self.addr = addr;
        self
    }

    /// Sets the poll limit for the device.
    ///
    /// The poll limit is the number of status re-reads the host performs
    /// while the 1-Wire busy bit is set before it resets the bridge.
    pub fn with_poll_limit(mut self, poll_limit: u8) -> Self {
        self.poll_limit = poll_limit;
        self
    }

    /// Sets a delay between two status re-reads, in microseconds.
    pub fn with_poll_interval_us(mut self, interval: u32) -> Self {
        self.poll_interval_us = interval;
        self
    }

    /// Sets the device configuration.
    pub fn with_config(mut self, config: DeviceConfiguration) -> Self {
        self.config = config;
        self
    }

    /// Builds a new `Ds2482` instance: resets the bridge and writes the configuration.
    ///
    /// # Errors
    /// [`Ds2482Error::NotDetected`] if the bridge does not acknowledge the reset
    /// or does not echo the configuration.
    pub fn build<I: I2c<SevenBitAddress>, D: DelayNs>(
        self,
        i2c: I,
        delay: D,
    ) -> Ds2482Result<Ds2482<I, D>, I::Error> {
        let mut dev = Ds2482::new(i2c, delay)
            .with_address(self.addr)
            .with_poll_limit(self.poll_limit)
            .with_poll_interval_us(self.poll_interval_us);
        if dev.device_reset()? && dev.write_config(self.config)? {
            Ok(dev)
        } else {
            Err(Ds2482Error::NotDetected)
        }
    }
}

impl<I: I2c<SevenBitAddress>, D: DelayNs> Ds2482<I, D> {
    /// Sends a command and returns the one byte reply.
    pub fn command(&mut self, cmd: Command) -> Ds2482Result<u8, I::Error> {
        let (frame, len) = cmd.frame();
        self.i2c.write(self.addr, &frame[..len])?;
        let mut reply = [0; 1];
        self.i2c.read(self.addr, &mut reply)?;
        Ok(reply[0])
    }

    /// Sends a 1-Wire command and polls the status register until the 1-Wire
    /// line is idle.
    ///
    /// At most `poll_limit` re-reads are done. If the line is still busy then, the
    /// bridge is reset and an all-zero status is returned: no presence, no bit read.
    pub fn command_wait(&mut self, cmd: Command) -> Ds2482Result<DeviceStatus, I::Error> {
        let mut status = DeviceStatus::from_bits(self.command(cmd)?);
        let mut polls = 0;
        while status.onewire_busy() && polls < self.poll_limit {
            if self.poll_interval_us > 0 {
                self.delay.delay_us(self.poll_interval_us);
            }
            let mut reply = [0; 1];
            self.i2c.read(self.addr, &mut reply)?;
            status = DeviceStatus::from_bits(reply[0]);
            polls += 1;
        }
        if status.onewire_busy() {
            warn!("{cmd:?}: 1-Wire still busy after {polls} polls, resetting bridge");
            self.device_reset()?;
            return Ok(DeviceStatus::new());
        }
        debug!("{cmd:?}: {status:?} after {polls} polls");
        Ok(status)
    }

    /// Reset the device.
    ///
    /// Performs a global reset of device state machine logic. Terminates any ongoing 1-Wire
    /// communication. After a successful reset the configuration register reads 00h.
    ///
    /// # Returns
    /// `true` if the bridge acknowledged the reset.
    pub fn device_reset(&mut self) -> Ds2482Result<bool, I::Error> {
        let status = self.command(Command::DeviceReset)?;
        let ack = status & DEVICE_RST_ACK_MASK == DEVICE_RST_ACK;
        if ack {
            self.config = DeviceConfiguration::new();
        } else {
            warn!("device reset not acknowledged, status {status:#04x}");
        }
        Ok(ack)
    }

    /// Write the device configuration.
    ///
    /// The bridge echoes the configuration it accepted; if the echo differs, the bridge
    /// is reset and `false` is returned.
    pub fn write_config(&mut self, config: DeviceConfiguration) -> Ds2482Result<bool, I::Error> {
        let echo = self.command(Command::WriteConfig(config))?;
        if echo & 0x0f != config.nibble() {
            warn!("configuration echo {echo:#04x}, expected {:#04x}", config.nibble());
            self.device_reset()?;
            return Ok(false);
        }
        self.config = config;
        Ok(true)
    }

    /// Resets the bridge and writes the [standard](DeviceConfiguration::standard)
    /// configuration.
    ///
    /// # Returns
    /// `true` if the bridge answered both steps.
    pub fn detect(&mut self) -> Ds2482Result<bool, I::Error> {
        Ok(self.device_reset()? && self.write_config(DeviceConfiguration::standard())?)
    }

    /// Read a register through the read pointer.
    pub fn read_register<R: Interact>(&mut self) -> Ds2482Result<R, I::Error> {
        let value = self.command(Command::SetReadPointer(R::REGISTER))?;
        Ok(R::from_register(value))
    }

    /// Get the status of the device.
    pub fn get_status(&mut self) -> Ds2482Result<DeviceStatus, I::Error> {
        self.read_register()
    }
}

/// Status register for DS2482
/// The read-only Status register is the general means for
/// the DS2482 to report bit-type data from the 1-Wire side,
/// 1-Wire busy status, and its own reset status to the host
/// processor. All 1-Wire communication commands and the Device
/// Reset command position the read pointer at the Status register.
/// Status information is updated during the execution of certain
/// commands only.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct DeviceStatus {
    /// 1WB: the 1-Wire line is busy with a command. Returns to 0 once the
    /// command has completed.
    pub onewire_busy: bool,
    /// PPD: updated with every 1-Wire Reset. Set if a presence pulse was
    /// detected.
    pub presence_pulse_detect: bool,
    /// SD: updated with every 1-Wire Reset. Set if the line was low at the
    /// short-detect sampling point. A shorted line also sets PPD.
    pub short_detect: bool,
    /// LL: logic state of the 1-Wire line, sampled when the status register is read.
    pub logic_level: bool,
    /// RST: the bridge has performed an internal reset (power-on or Device Reset).
    /// Cleared by Write Device Configuration.
    pub device_reset: bool,
    /// SBR: line state sampled in a 1-Wire Single Bit command, or the first bit of
    /// a 1-Wire Triplet.
    pub single_bit_result: bool,
    /// TSB: line state sampled in the second bit of a 1-Wire Triplet.
    pub triplet_second_bit: bool,
    /// DIR: search direction written by the third bit of a 1-Wire Triplet.
    pub branch_dir_taken: bool,
}

impl OneWireStatus for DeviceStatus {
    fn presence(&self) -> bool {
        self.presence_pulse_detect()
    }

    fn shortcircuit(&self) -> bool {
        self.short_detect()
    }
}

impl Interact for DeviceStatus {
    const REGISTER: Register = Register::Status;

    fn from_register(value: u8) -> Self {
        Self::from_bits(value)
    }
}

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
/// # Device configuration register
///
/// The DS2482 supports four 1-Wire features that are
/// enabled or selected through the Device Configuration
/// register. APU, SPU, and 1WS can be selected in any combination.
/// While APU, PPM and 1WS maintain their states, SPU returns to
/// its inactive state as soon as the strong pullup has ended.
///
/// On the wire, the upper nibble carries the one's complement of
/// the lower nibble; the register reads back the lower nibble only.
/// After a device reset the register reads 00h.
pub struct DeviceConfiguration {
    /// APU: drive the 1-Wire line from low to high with a low impedance
    /// transistor instead of the weak pullup resistor.
    pub active_pullup: bool,
    /// PPM: presence pulse masking. The bridge reports a presence pulse
    /// on every reset without sampling the line.
    pub presence_pulse_masking: bool,
    /// SPU: strong pullup after the next 1-Wire Write Byte or Single Bit
    /// command, for devices that draw power from the line.
    pub strong_pullup: bool,
    /// 1WS: overdrive 1-Wire speed.
    pub onewire_speed: bool,
    #[bits(4)]
    __: u8,
}

impl DeviceConfiguration {
    /// Standard speed, no strong pullup, no presence pulse masking, active pullup on.
    pub fn standard() -> Self {
        Self::new().with_active_pullup(true)
    }

    /// The configuration bits, in the lower nibble.
    pub fn nibble(&self) -> u8 {
        self.into_bits() & 0x0f
    }

    /// The byte sent with Write Device Configuration.
    pub fn wire_byte(&self) -> u8 {
        cfg_to_u8(self.into_bits())
    }
}

const fn cfg_to_u8(cfg: u8) -> u8 {
    (cfg & 0x0f) | ((!cfg & 0x0f) << 4)
}

impl Interact for DeviceConfiguration {
    const REGISTER: Register = Register::Configuration;

    fn from_register(value: u8) -> Self {
        Self::from_bits(value & 0x0f)
    }
}
