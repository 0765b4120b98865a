use crate::{
    OneWire, OneWireStatus,
    consts::{ONEWIRE_CONDITIONAL_SEARCH_CMD, ONEWIRE_SEARCH_CMD},
    error::OneWireError,
    utils::OneWireCrc,
};

/// Position of the search in the ROM binary tree.
///
/// Bit positions are numbered 1 to 64, 0 meaning "none".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchState {
    /// Bit position where the next pass takes the `1` branch.
    pub last_discrepancy: u8,
    /// Last zero-branch discrepancy inside the family code byte.
    pub last_family_discrepancy: u8,
    /// The previous pass found the last device of the tree.
    pub last_device: bool,
    /// CRC accumulated over the ROM bytes of the last pass.
    pub crc: OneWireCrc,
}

/// A structure for searching devices on a 1-Wire bus.
/// This structure implements the search algorithm for discovering devices on the 1-Wire bus.
/// It maintains the state of the search and the ROM buffer of the last device found.
pub struct OneWireSearch<'a, T> {
    onewire: &'a mut T,
    cmd: u8,
    family: Option<u8>,
    state: SearchState,
    rom: [u8; 8],
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Type of search performed using [`OneWireSearch`].
pub enum OneWireSearchKind {
    /// Normal search
    Normal = ONEWIRE_SEARCH_CMD,
    /// Search only for devices with alarm
    Alarmed = ONEWIRE_CONDITIONAL_SEARCH_CMD,
}

impl<'a, T> OneWireSearch<'a, T> {
    /// Creates a new [`OneWireSearch`] instance.
    ///
    /// # Arguments
    /// * `onewire` - A mutable reference to a type that implements the `OneWire` trait.
    /// * `cmd` - The kind of search to run.
    pub fn new(onewire: &'a mut T, cmd: OneWireSearchKind) -> Self {
        Self {
            onewire,
            cmd: cmd as _,
            family: None,
            state: SearchState::default(),
            rom: [0; 8],
        }
    }

    /// Creates a new [`OneWireSearch`] instance limited to one family code.
    ///
    /// The search starts at the first device of the family and reports the end of
    /// the search as soon as a device of another family is reached.
    pub fn with_family(onewire: &'a mut T, cmd: OneWireSearchKind, family: u8) -> Self {
        let mut search = Self::new(onewire, cmd);
        search.family = Some(family);
        search.target_family(family);
        search
    }

    /// ROM bytes of the last device found, family code first.
    pub fn rom(&self) -> &[u8; 8] {
        &self.rom
    }

    /// Current search state.
    pub fn state(&self) -> SearchState {
        self.state
    }

    /// `true` once the last device of the tree has been reported.
    pub fn last_device(&self) -> bool {
        self.state.last_device
    }

    /// Sets up the next search to start at the first device of `family`.
    ///
    /// If no such device exists, the next search returns the first device of a
    /// higher family in search order, or nothing.
    pub fn target_family(&mut self, family: u8) {
        self.rom = [family, 0, 0, 0, 0, 0, 0, 0];
        self.state = SearchState {
            last_discrepancy: 64,
            ..SearchState::default()
        };
    }

    /// Sets up the next search to skip the remaining devices of the current family.
    pub fn skip_family(&mut self) {
        self.state.last_discrepancy = self.state.last_family_discrepancy;
        self.state.last_family_discrepancy = 0;
        if self.state.last_discrepancy == 0 {
            self.state.last_device = true;
        }
    }

    fn restart(&mut self) {
        match self.family {
            Some(family) => self.target_family(family),
            None => self.state = SearchState::default(),
        }
    }
}

impl<T: OneWire> OneWireSearch<'_, T> {
    /// Restarts the enumeration and returns the first device on the bus.
    pub fn first(&mut self) -> Result<Option<u64>, OneWireError<T::BusError>> {
        self.restart();
        self.filtered()
    }

    /// Returns the next device on the bus, continuing from the previous call.
    ///
    /// At the end of the search, calling this method returns `None`.
    /// Calling it again afterwards starts a new enumeration.
    ///
    /// # Returns
    /// A result containing the ROM code of the found device as a `u64` value.
    ///
    /// | Bit | Description |
    /// |-----|-------------|
    /// | 0-7 | Family code (e.g., 0x28 for DS18B20) |
    /// | 8-55 | Serial number |
    /// | 56-63 | CRC-8 (`0b1_0011_0001` poly) |
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<u64>, OneWireError<T::BusError>> {
        self.filtered()
    }

    fn filtered(&mut self) -> Result<Option<u64>, OneWireError<T::BusError>> {
        let found = self.search()?;
        if let (Some(family), Some(_)) = (self.family, found) {
            if self.rom[0] != family {
                self.restart();
                return Ok(None);
            }
        }
        Ok(found)
    }

    /// Runs one pass of the [1-Wire search algorithm](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html).
    ///
    /// Each pass walks the 64-bit ROM tree from the root, replaying the branches of
    /// the previous pass up to the last discrepancy, taking the `1` branch there and
    /// the `0` branch at every new discrepancy after it. Devices are therefore found
    /// in ascending order of their ROM read LSB first.
    ///
    /// Returns `None` if the previous pass found the last device, if no device answers
    /// the reset, or if the pass failed (no device answered a bit, bad CRC, zero
    /// family code). In every case the search state is rewound, to the targeted
    /// family if there is one, so the following pass starts a new enumeration.
    /// The end of an enumeration is reported without touching the bus.
    pub fn search(&mut self) -> Result<Option<u64>, OneWireError<T::BusError>> {
        if self.state.last_device {
            self.restart();
            return Ok(None);
        }
        if !self.onewire.reset()?.presence() {
            self.restart();
            return Ok(None);
        }
        self.onewire.write_byte(self.cmd)?;

        self.state.crc = OneWireCrc::default();
        let mut id_bit_num: u8 = 1;
        let mut last_zero: u8 = 0;
        let mut idx: usize = 0; // Index in the ROM array
        let mut rom_mask: u8 = 1; // Mask for the current bit in the ROM byte
        let complete = loop {
            let dir = if id_bit_num < self.state.last_discrepancy {
                self.rom[idx] & rom_mask > 0
            } else {
                id_bit_num == self.state.last_discrepancy
            };
            let Some((id_bit, complement_bit, taken)) = self.triplet(dir)? else {
                break false;
            };
            if !id_bit && !complement_bit && !taken {
                last_zero = id_bit_num;
                if last_zero < 9 {
                    self.state.last_family_discrepancy = last_zero;
                }
            }
            if taken {
                self.rom[idx] |= rom_mask;
            } else {
                self.rom[idx] &= !rom_mask;
            }

            id_bit_num += 1;
            rom_mask <<= 1;
            if rom_mask == 0 {
                self.state.crc.update(self.rom[idx]);
                idx += 1;
                rom_mask = 1;
                if idx == self.rom.len() {
                    break true;
                }
            }
        };

        if !complete || self.state.crc.value() != 0 || self.rom[0] == 0 {
            self.restart();
            return Ok(None);
        }
        self.state.last_discrepancy = last_zero;
        self.state.last_device = last_zero == 0;
        Ok(Some(u64::from_le_bytes(self.rom)))
    }

    /// One search step: id bit, complement bit and the direction written.
    ///
    /// `None` if no device answered the step. Falls back to single bit slots when the
    /// bus master has no triplet primitive.
    fn triplet(
        &mut self,
        dir: bool,
    ) -> Result<Option<(bool, bool, bool)>, OneWireError<T::BusError>> {
        let (id_bit, complement_bit, taken) = match self.onewire.read_triplet(dir) {
            Ok(triplet) => triplet,
            Err(OneWireError::Unimplemented) => {
                let id_bit = self.onewire.read_bit()?;
                let complement_bit = self.onewire.read_bit()?;
                if id_bit && complement_bit {
                    return Ok(None);
                }
                let taken = if id_bit != complement_bit { id_bit } else { dir };
                self.onewire.write_bit(taken)?;
                (id_bit, complement_bit, taken)
            }
            Err(e) => return Err(e),
        };
        if id_bit && complement_bit {
            return Ok(None);
        }
        Ok(Some((id_bit, complement_bit, taken)))
    }

    /// Verifies if the device with the given ROM code is present on the 1-Wire bus.
    ///
    /// The enumeration in progress is not disturbed: the search state and ROM buffer
    /// are restored before returning.
    pub fn verify(&mut self, rom: u64) -> Result<bool, OneWireError<T::BusError>> {
        let saved = (self.state, self.rom);
        self.state = SearchState {
            last_discrepancy: 64,
            ..SearchState::default()
        };
        self.rom = rom.to_le_bytes();
        let res = self.search();
        (self.state, self.rom) = saved;
        Ok(res? == Some(rom))
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::{OneWireResult, utils::OneWireCrc};
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use std::{collections::BTreeSet, vec, vec::Vec};

    struct SimStatus {
        presence: bool,
    }

    impl OneWireStatus for SimStatus {
        fn presence(&self) -> bool {
            self.presence
        }

        fn shortcircuit(&self) -> bool {
            false
        }
    }

    /// Devices on a wired-AND bus, answering the ROM search.
    struct SimBus {
        roms: Vec<[u8; 8]>,
        alarmed: Vec<bool>,
        active: Vec<bool>,
        searching: bool,
        bit: usize,
        slot: u8,
        triplet: bool,
        resets: usize,
        /// Resets answered without a presence pulse.
        silent_resets: usize,
    }

    impl SimBus {
        fn new(roms: Vec<[u8; 8]>) -> Self {
            let n = roms.len();
            Self {
                roms,
                alarmed: vec![false; n],
                active: vec![false; n],
                searching: false,
                bit: 0,
                slot: 0,
                triplet: true,
                resets: 0,
                silent_resets: 0,
            }
        }

        fn rom_bit(&self, dev: usize) -> bool {
            self.roms[dev][self.bit / 8] & (1 << (self.bit % 8)) != 0
        }

        fn wired_and(&self, complement: bool) -> bool {
            (0..self.roms.len())
                .filter(|&d| self.active[d])
                .all(|d| self.rom_bit(d) != complement)
        }

        fn select(&mut self, dir: bool) {
            for d in 0..self.roms.len() {
                if self.active[d] && self.rom_bit(d) != dir {
                    self.active[d] = false;
                }
            }
            self.bit += 1;
        }
    }

    impl OneWire for SimBus {
        type Status = SimStatus;
        type BusError = ();

        fn reset(&mut self) -> OneWireResult<SimStatus, ()> {
            self.resets += 1;
            self.searching = false;
            self.active.iter_mut().for_each(|a| *a = true);
            if self.silent_resets > 0 {
                self.silent_resets -= 1;
                return Ok(SimStatus { presence: false });
            }
            Ok(SimStatus {
                presence: !self.roms.is_empty(),
            })
        }

        fn touch_bit(&mut self, bit: bool) -> OneWireResult<bool, ()> {
            if !self.searching {
                return Ok(bit);
            }
            let res = match self.slot {
                0 => self.wired_and(false),
                1 => self.wired_and(true),
                _ => {
                    self.select(bit);
                    bit
                }
            };
            self.slot = (self.slot + 1) % 3;
            Ok(res)
        }

        fn write_byte(&mut self, byte: u8) -> OneWireResult<(), ()> {
            if byte == ONEWIRE_CONDITIONAL_SEARCH_CMD {
                for (a, &alarm) in self.active.iter_mut().zip(&self.alarmed) {
                    *a &= alarm;
                }
            }
            self.searching = byte == ONEWIRE_SEARCH_CMD || byte == ONEWIRE_CONDITIONAL_SEARCH_CMD;
            self.bit = 0;
            self.slot = 0;
            Ok(())
        }

        fn read_byte(&mut self) -> OneWireResult<u8, ()> {
            Ok(0xff)
        }

        fn read_triplet(&mut self, direction: bool) -> OneWireResult<(bool, bool, bool), ()> {
            if !self.triplet {
                return Err(OneWireError::Unimplemented);
            }
            let id_bit = self.wired_and(false);
            let complement_bit = self.wired_and(true);
            let taken = if id_bit != complement_bit {
                id_bit
            } else {
                id_bit || direction
            };
            self.select(taken);
            Ok((id_bit, complement_bit, taken))
        }
    }

    fn make_rom(family: u8, serial: [u8; 6]) -> [u8; 8] {
        let mut rom = [family, 0, 0, 0, 0, 0, 0, 0];
        rom[1..7].copy_from_slice(&serial);
        rom[7] = OneWireCrc::compute(&rom[..7]);
        rom
    }

    fn random_roms(seed: u64, count: usize, families: &[u8]) -> Vec<[u8; 8]> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut roms = BTreeSet::new();
        while roms.len() < count {
            let mut serial = [0u8; 6];
            rng.fill(&mut serial);
            let family = families[rng.random_range(0..families.len())];
            roms.insert(make_rom(family, serial));
        }
        roms.into_iter().collect()
    }

    /// Order in which the search visits ROMs: LSB first, `0` branch first.
    fn search_order(roms: &[[u8; 8]]) -> Vec<u64> {
        let mut ids: Vec<u64> = roms.iter().map(|r| u64::from_le_bytes(*r)).collect();
        ids.sort_by_key(|id| id.reverse_bits());
        ids
    }

    fn enumerate(bus: &mut SimBus) -> Vec<u64> {
        let mut search = OneWireSearch::new(bus, OneWireSearchKind::Normal);
        let mut found = Vec::new();
        let mut next = search.first().unwrap();
        while let Some(rom) = next {
            found.push(rom);
            next = search.next().unwrap();
        }
        found
    }

    #[test]
    fn enumerates_every_device_in_order() {
        for (seed, count) in [(1, 1), (2, 2), (3, 7), (4, 32)] {
            let roms = random_roms(seed, count, &[0x10, 0x28, 0x42]);
            let mut bus = SimBus::new(roms.clone());
            assert_eq!(enumerate(&mut bus), search_order(&roms));
        }
    }

    #[test]
    fn last_device_flag_set_on_last_find() {
        let roms = random_roms(5, 5, &[0x28]);
        let mut bus = SimBus::new(roms);
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal);
        assert!(search.first().unwrap().is_some());
        for _ in 0..3 {
            assert!(search.next().unwrap().is_some());
            assert!(!search.last_device());
        }
        assert!(search.next().unwrap().is_some());
        assert!(search.last_device());
        assert_eq!(search.next().unwrap(), None);
        assert!(!search.last_device());
    }

    #[test]
    fn exhausted_search_does_not_touch_bus() {
        let mut bus = SimBus::new(random_roms(6, 1, &[0x28]));
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal);
        assert!(search.next().unwrap().is_some());
        assert!(search.last_device());
        assert_eq!(search.next().unwrap(), None);
        drop(search);
        assert_eq!(bus.resets, 1);
    }

    #[test]
    fn next_after_end_starts_over() {
        let roms = random_roms(10, 2, &[0x28]);
        let order = search_order(&roms);
        let mut bus = SimBus::new(roms);
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal);
        assert_eq!(search.first().unwrap(), Some(order[0]));
        assert_eq!(search.next().unwrap(), Some(order[1]));
        assert_eq!(search.next().unwrap(), None);
        assert_eq!(search.state(), SearchState::default());
        assert_eq!(search.next().unwrap(), Some(order[0]));
        assert_eq!(search.next().unwrap(), Some(order[1]));
    }

    #[test]
    fn no_presence_resets_state() {
        let mut bus = SimBus::new(Vec::new());
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal);
        assert_eq!(search.first().unwrap(), None);
        assert_eq!(search.state(), SearchState::default());
    }

    #[test]
    fn bit_slot_fallback_matches_triplet() {
        let roms = random_roms(7, 9, &[0x01, 0x28]);
        let mut bus = SimBus::new(roms.clone());
        bus.triplet = false;
        assert_eq!(enumerate(&mut bus), search_order(&roms));
    }

    #[test]
    fn bad_crc_is_not_reported() {
        let mut rom = make_rom(0x28, [1, 2, 3, 4, 5, 6]);
        rom[7] ^= 0x01;
        let mut bus = SimBus::new(vec![rom]);
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal);
        assert_eq!(search.first().unwrap(), None);
        assert_eq!(search.state().last_discrepancy, 0);
        assert!(!search.last_device());
    }

    #[test]
    fn zero_family_is_not_reported() {
        let mut bus = SimBus::new(vec![make_rom(0x00, [9, 8, 7, 6, 5, 4])]);
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal);
        assert_eq!(search.first().unwrap(), None);
        assert_eq!(search.state(), SearchState::default());
    }

    #[test]
    fn alarm_search_finds_alarmed_only() {
        let roms = random_roms(8, 6, &[0x28]);
        let mut bus = SimBus::new(roms.clone());
        bus.alarmed = vec![false, true, false, false, true, false];
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Alarmed);
        let mut found = Vec::new();
        while let Some(rom) = search.next().unwrap() {
            found.push(rom);
        }
        assert_eq!(found, search_order(&[roms[1], roms[4]]));
    }

    #[test]
    fn family_search_and_skip() {
        let roms = vec![
            make_rom(0x10, [1, 0, 0, 0, 0, 0]),
            make_rom(0x28, [2, 0, 0, 0, 0, 0]),
            make_rom(0x28, [3, 0, 0, 0, 0, 0]),
            make_rom(0x42, [4, 0, 0, 0, 0, 0]),
        ];
        let mut bus = SimBus::new(roms.clone());
        let mut search = OneWireSearch::with_family(&mut bus, OneWireSearchKind::Normal, 0x28);
        let mut found = Vec::new();
        while let Some(rom) = search.next().unwrap() {
            found.push(rom);
        }
        assert_eq!(found, search_order(&roms[1..3]));
        assert_eq!(search.next().unwrap(), Some(found[0]));
        drop(search);

        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal);
        search.target_family(0x28);
        assert_eq!(search.next().unwrap().map(|r| r as u8), Some(0x28));
        search.skip_family();
        assert_eq!(search.next().unwrap().map(|r| r as u8), Some(0x42));
    }

    #[test]
    fn family_search_survives_failed_pass() {
        let roms = vec![
            make_rom(0x10, [1, 0, 0, 0, 0, 0]),
            make_rom(0x28, [2, 0, 0, 0, 0, 0]),
        ];
        let mut bus = SimBus::new(roms.clone());
        bus.silent_resets = 1;
        let mut search = OneWireSearch::with_family(&mut bus, OneWireSearchKind::Normal, 0x28);
        assert_eq!(search.next().unwrap(), None);
        assert_eq!(search.rom()[0], 0x28);
        assert_eq!(search.state().last_discrepancy, 64);
        assert_eq!(search.next().unwrap(), Some(u64::from_le_bytes(roms[1])));
        assert_eq!(search.next().unwrap(), None);
    }

    #[test]
    fn verify_keeps_enumeration() {
        let roms = random_roms(9, 4, &[0x28, 0x3a]);
        let order = search_order(&roms);
        let mut bus = SimBus::new(roms);
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal);
        assert_eq!(search.first().unwrap(), Some(order[0]));
        assert!(search.verify(order[3]).unwrap());
        let absent = u64::from_le_bytes(make_rom(0x3a, [0xee; 6]));
        assert!(!search.verify(absent).unwrap());
        assert_eq!(search.next().unwrap(), Some(order[1]));
    }
}
