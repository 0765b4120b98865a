use crate::{
    OneWireError, OneWireResult,
    consts::{ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SKIP_ROM_CMD},
};

/// Status reported by a bus master after a 1-Wire reset.
pub trait OneWireStatus {
    /// A presence pulse was detected after the reset.
    fn presence(&self) -> bool;

    /// The bus was shorted during the presence-detect cycle.
    fn shortcircuit(&self) -> bool;
}

/// Pullup level of the 1-Wire line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerLevel {
    /// Normal (resistive or active) pullup.
    Standard,
    /// Strong pullup, sourcing extra current for parasitically powered devices.
    Strong,
}

/// Trait for 1-Wire communication.
/// This trait defines the basic operations required for 1-Wire communication, such as resetting the bus,
/// writing and reading bytes, and writing and reading bits.
///
/// Every operation blocks until the bus master has completed the transfer.
pub trait OneWire {
    /// The status type returned by the reset operation.
    /// This type must implement the [OneWireStatus] trait.
    type Status: OneWireStatus;
    /// The error type returned by the operations of this trait.
    /// This type is used to indicate errors in the underlying hardware or communication.
    type BusError;

    /// Resets the 1-Wire bus and returns the status of the bus.
    ///
    /// A missing presence pulse or a short circuit is not an error; inspect the
    /// returned status.
    ///
    /// # Errors
    /// This method returns an error if the bus master could not be reached.
    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError>;

    /// Sends one bit and returns the bit sampled on the bus in the same time slot.
    ///
    /// Sending a `1` leaves the line released, so a device may pull it low:
    /// this is how bits are read.
    fn touch_bit(&mut self, bit: bool) -> OneWireResult<bool, Self::BusError>;

    /// Writes a single bit to the 1-Wire bus.
    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
        self.touch_bit(bit).map(|_| ())
    }

    /// Reads a single bit from the 1-Wire bus.
    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
        self.touch_bit(true)
    }

    /// Writes a byte to the 1-Wire bus, LSB first.
    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError>;

    /// Reads a byte from the 1-Wire bus.
    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError>;

    /// Reads a byte if `byte` is `0xff`, otherwise writes it and echoes it back.
    ///
    /// Writing all ones and reading are the same time slots on the wire.
    fn touch_byte(&mut self, byte: u8) -> OneWireResult<u8, Self::BusError> {
        if byte == 0xff {
            self.read_byte()
        } else {
            self.write_byte(byte)?;
            Ok(byte)
        }
    }

    /// Transfers a block in place, applying [`OneWire::touch_byte`] to each byte.
    ///
    /// Fill positions to be read with `0xff`.
    fn block(&mut self, buf: &mut [u8]) -> OneWireResult<(), Self::BusError> {
        for byte in buf.iter_mut() {
            *byte = self.touch_byte(*byte)?;
        }
        Ok(())
    }

    /// # Note: Not intended for public API use.
    /// ## This method is internally used by the [search algorithm](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html).
    ///
    /// Generates three time slots: two read time slots and one write time slot at the 1-Wire line. The
    /// type of write time slot depends on the result of the read time slots and the direction bit. The
    /// direction bit determines the type of write time slot if both read time slots are 0 (a typical
    /// case).
    /// If the read time slots are 0 and 1, they are followed by a write-zero time slot.
    /// If the read time slots are 1 and 0, they are followed by a write-one time slot.
    /// If the read time slots are both 1 (error case), the subsequent write time slot is a write-one.
    ///
    /// # Returns
    /// A tuple of the id bit, the complement bit and the direction written.
    ///
    /// # Errors
    /// [`OneWireError::Unimplemented`] if the bus master has no triplet primitive.
    fn read_triplet(
        &mut self,
        _direction: bool,
    ) -> OneWireResult<(bool, bool, bool), Self::BusError> {
        Err(OneWireError::Unimplemented)
    }

    /// Sets the pullup level of the bus.
    ///
    /// Only [`PowerLevel::Standard`] can be requested; the strong pullup is armed by
    /// [`OneWire::read_bit_power`] and [`OneWire::write_byte_power`]. Requesting
    /// [`PowerLevel::Strong`] changes nothing and returns [`PowerLevel::Strong`].
    ///
    /// # Returns
    /// The level of the bus after the call.
    fn set_level(&mut self, _level: PowerLevel) -> OneWireResult<PowerLevel, Self::BusError> {
        Err(OneWireError::Unimplemented)
    }

    /// Reads a bit with the strong pullup armed.
    ///
    /// If the bit read differs from `expected`, the bus is returned to the standard
    /// level and `false` is returned. Otherwise the strong pullup stays engaged until
    /// the caller calls [`OneWire::set_level`].
    fn read_bit_power(&mut self, _expected: bool) -> OneWireResult<bool, Self::BusError> {
        Err(OneWireError::Unimplemented)
    }

    /// Writes a byte with the strong pullup armed, leaving it engaged afterwards.
    fn write_byte_power(&mut self, _byte: u8) -> OneWireResult<bool, Self::BusError> {
        Err(OneWireError::Unimplemented)
    }

    /// Addresses devices on the 1-Wire bus.
    /// Note: A [`OneWire::read_byte`] or [`OneWire::read_bit`] call will return garbage data if this method is called without specifying a ROM address on a bus with multiple devices.
    /// # Arguments
    /// * `rom` - The ROM address of the device to address. Pass [`None`] to skip ROM addressing and address all devices on the bus.
    ///
    /// # Returns
    /// `true` if a presence pulse answered the reset and the ROM command was sent.
    fn address(&mut self, rom: Option<u64>) -> OneWireResult<bool, Self::BusError> {
        if !self.reset()?.presence() {
            return Ok(false);
        }
        match rom {
            Some(rom) => {
                self.write_byte(ONEWIRE_MATCH_ROM_CMD)?;
                for &b in rom.to_le_bytes().iter() {
                    self.write_byte(b)?;
                }
            }
            None => self.write_byte(ONEWIRE_SKIP_ROM_CMD)?,
        }
        Ok(true)
    }
}
