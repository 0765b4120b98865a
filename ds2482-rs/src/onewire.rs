use crate::{Command, Ds2482, Ds2482Error, Register, registers::DeviceStatus};
use embedded_hal::{
    delay::DelayNs,
    i2c::{I2c, SevenBitAddress},
};
use embedded_onewire::{OneWire, OneWireResult, PowerLevel};
use log::warn;

impl<I2C: I2c<SevenBitAddress>, D: DelayNs> OneWire for Ds2482<I2C, D> {
    type Status = DeviceStatus;

    type BusError = Ds2482Error<I2C::Error>;

    /// Resets the 1-Wire bus and records the short flag.
    ///
    /// A short does not fail the reset; check [`Ds2482::short_detected`] before
    /// talking to the bus.
    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError> {
        let status = self.command_wait(Command::OneWireReset)?;
        self.short_detected = status.short_detect();
        if self.short_detected {
            warn!("short detected on the 1-Wire line");
        }
        Ok(status)
    }

    fn touch_bit(&mut self, bit: bool) -> OneWireResult<bool, Self::BusError> {
        Ok(self
            .command_wait(Command::SingleBit(bit))?
            .single_bit_result())
    }

    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        self.command_wait(Command::WriteByte(byte))?;
        Ok(())
    }

    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError> {
        self.command_wait(Command::ReadByte)?;
        Ok(self.command(Command::SetReadPointer(Register::Data))?)
    }

    fn read_triplet(&mut self, direction: bool) -> OneWireResult<(bool, bool, bool), Self::BusError> {
        let status = self.command_wait(Command::Triplet(direction))?;
        Ok((
            status.single_bit_result(),
            status.triplet_second_bit(),
            status.branch_dir_taken(),
        ))
    }

    fn set_level(&mut self, level: PowerLevel) -> OneWireResult<PowerLevel, Self::BusError> {
        if level != PowerLevel::Standard {
            return Ok(PowerLevel::Strong);
        }
        // A rejected write resets the bridge, which clears SPU as well.
        self.write_config(self.config.with_strong_pullup(false))?;
        Ok(PowerLevel::Standard)
    }

    fn read_bit_power(&mut self, expected: bool) -> OneWireResult<bool, Self::BusError> {
        if !self.write_config(self.config.with_strong_pullup(true))? {
            return Ok(false);
        }
        if self.read_bit()? != expected {
            self.set_level(PowerLevel::Standard)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn write_byte_power(&mut self, byte: u8) -> OneWireResult<bool, Self::BusError> {
        if !self.write_config(self.config.with_strong_pullup(true))? {
            return Ok(false);
        }
        self.write_byte(byte)?;
        Ok(true)
    }
}
