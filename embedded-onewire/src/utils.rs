#[cfg(feature = "crc-table")]
const CRC8_TABLE: [u8; 256] = [
    0, 94, 188, 226, 97, 63, 221, 131, 194, 156, 126, 32, 163, 253, 31, 65, 157, 195, 33, 127,
    252, 162, 64, 30, 95, 1, 227, 189, 62, 96, 130, 220, 35, 125, 159, 193, 66, 28, 254, 160, 225,
    191, 93, 3, 128, 222, 60, 98, 190, 224, 2, 92, 223, 129, 99, 61, 124, 34, 192, 158, 29, 67,
    161, 255, 70, 24, 250, 164, 39, 121, 155, 197, 132, 218, 56, 102, 229, 187, 89, 7, 219, 133,
    103, 57, 186, 228, 6, 88, 25, 71, 165, 251, 120, 38, 196, 154, 101, 59, 217, 135, 4, 90, 184,
    230, 167, 249, 27, 69, 198, 152, 122, 36, 248, 166, 68, 26, 153, 199, 37, 123, 58, 100, 134,
    216, 91, 5, 231, 185, 140, 210, 48, 110, 237, 179, 81, 15, 78, 16, 242, 172, 47, 113, 147,
    205, 17, 79, 173, 243, 112, 46, 204, 146, 211, 141, 111, 49, 178, 236, 14, 80, 175, 241, 19,
    77, 206, 144, 114, 44, 109, 51, 209, 143, 12, 82, 176, 238, 50, 108, 142, 208, 83, 13, 239,
    177, 240, 174, 76, 18, 145, 207, 45, 115, 202, 148, 118, 40, 171, 245, 23, 73, 8, 86, 180,
    234, 105, 55, 213, 139, 87, 9, 235, 181, 54, 104, 138, 212, 149, 203, 41, 119, 244, 170, 72,
    22, 233, 183, 85, 11, 136, 214, 52, 106, 43, 117, 151, 201, 74, 20, 246, 168, 116, 42, 200,
    150, 21, 75, 169, 247, 182, 232, 10, 84, 215, 137, 107, 53,
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Calculate CRC-8 used in 1-Wire communications.
///
/// Dallas/Maxim polynomial `x^8 + x^5 + x^4 + 1`, processed LSB first.
/// Starting from zero, a sequence that ends with its own CRC folds to zero.
pub struct OneWireCrc(u8);

impl OneWireCrc {
    /// Get the current CRC value
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Update the CRC with the incoming byte and return the running value.
    #[cfg(feature = "crc-table")]
    pub fn update(&mut self, byte: u8) -> u8 {
        self.0 = CRC8_TABLE[(self.0 ^ byte) as usize];
        self.0
    }

    /// Update the CRC with the incoming byte and return the running value.
    #[cfg(not(feature = "crc-table"))]
    pub fn update(&mut self, byte: u8) -> u8 {
        let mut crc = self.0 ^ byte;
        for _ in 0..8 {
            if crc & 0x1 == 0x1 {
                crc = (crc >> 1) ^ 0x8c;
            } else {
                crc >>= 1;
            }
        }
        self.0 = crc;
        self.0
    }

    /// Compute the CRC of a byte sequence.
    pub fn compute(sequence: &[u8]) -> u8 {
        let mut crc = OneWireCrc::default();
        for &byte in sequence {
            crc.update(byte);
        }
        crc.0
    }

    /// Validate a sequence of bytes where the last byte is the 1-Wire CRC of
    /// the previous bytes.
    pub fn validate(sequence: &[u8]) -> bool {
        Self::compute(sequence) == 0x0
    }
}

#[cfg(test)]
mod tests {
    use super::OneWireCrc;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn bitwise(sequence: &[u8]) -> u8 {
        let mut crc = 0u8;
        for &byte in sequence {
            crc ^= byte;
            for _ in 0..8 {
                crc = if crc & 1 == 1 { (crc >> 1) ^ 0x8c } else { crc >> 1 };
            }
        }
        crc
    }

    #[test]
    fn known_rom() {
        // DS18B20 ROM from the Maxim application note 27 example
        let rom = [0x02, 0x1c, 0xb8, 0x01, 0x00, 0x00, 0x00, 0xa2];
        assert_eq!(OneWireCrc::compute(&rom[..7]), 0xa2);
        assert!(OneWireCrc::validate(&rom));
    }

    #[test]
    fn update_returns_running_value() {
        let mut crc = OneWireCrc::default();
        assert_eq!(crc.update(0x01), 0x5e);
        assert_eq!(crc.value(), 0x5e);
    }

    #[test]
    fn matches_shift_register() {
        for byte in 0..=255u8 {
            assert_eq!(OneWireCrc::compute(&[byte]), bitwise(&[byte]));
        }
        let seq = [0x28, 0xff, 0x4b, 0x91, 0x60, 0x17, 0x05];
        assert_eq!(OneWireCrc::compute(&seq), bitwise(&seq));
    }

    #[test]
    fn rom_with_crc_folds_to_zero() {
        let mut rng = StdRng::seed_from_u64(0x2482);
        for _ in 0..256 {
            let mut rom = [0u8; 8];
            rng.fill(&mut rom[..7]);
            rom[7] = OneWireCrc::compute(&rom[..7]);
            assert!(OneWireCrc::validate(&rom));
        }
    }

    #[test]
    fn single_bit_error_detected() {
        let mut rng = StdRng::seed_from_u64(18);
        for _ in 0..32 {
            let mut rom = [0u8; 8];
            rng.fill(&mut rom[..7]);
            rom[7] = OneWireCrc::compute(&rom[..7]);
            for bit in 0..64 {
                let mut corrupt = rom;
                corrupt[bit / 8] ^= 1 << (bit % 8);
                assert_ne!(OneWireCrc::compute(&corrupt), 0, "bit {bit} flip undetected");
            }
        }
    }
}
