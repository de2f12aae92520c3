//! CRC-16/CCITT-FALSE checksum shared by every application record.
//!
//! Polynomial 0x1021, initial value 0xFFFF, MSB first, no reflection and no
//! final XOR.

const POLY: u16 = 0x1021;
const INIT: u16 = 0xFFFF;

/// Incremental CRC-16/CCITT-FALSE hasher
#[derive(Debug, Clone, Copy)]
pub struct Crc16 {
    state: u16,
}

impl Crc16 {
    /// Create a hasher in its initial state
    pub fn new() -> Self {
        Self { state: INIT }
    }

    /// Feed more bytes into the running checksum
    pub fn update(&mut self, bytes: &[u8]) {
        let mut crc = self.state;
        for &b in bytes {
            crc ^= (b as u16) << 8;
            for _ in 0..8 {
                if (crc & 0x8000) != 0 {
                    crc = (crc << 1) ^ POLY;
                } else {
                    crc <<= 1;
                }
            }
        }
        self.state = crc;
    }

    /// Return the checksum of everything fed so far
    pub fn finalize(self) -> u16 {
        self.state
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the CRC-16/CCITT-FALSE of `bytes`
pub fn crc16(bytes: &[u8]) -> u16 {
    let mut hasher = Crc16::new();
    hasher.update(bytes);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_vector() {
        assert_eq!(crc16(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_empty_input_is_init() {
        assert_eq!(crc16(b""), 0xFFFF);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut hasher = Crc16::new();
        hasher.update(b"1234");
        hasher.update(b"56789");
        assert_eq!(hasher.finalize(), crc16(b"123456789"));
    }
}
