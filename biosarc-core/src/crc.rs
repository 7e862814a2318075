//! CRC-16 (IBM/ARC polynomial) as used by LHA level-1 headers.
//!
//! Award images embed complete LHA archives whose headers carry a CRC-16
//! of the expanded data, reflected polynomial 0xA001, initial value 0.

const POLY: u16 = 0xA001;

/// Streaming CRC-16 accumulator.
///
/// # Example
///
/// ```
/// use biosarc_core::crc::Crc16;
///
/// let mut crc = Crc16::new();
/// crc.update(b"123456789");
/// assert_eq!(crc.value(), 0xBB3D);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc16 {
    value: u16,
}

impl Crc16 {
    /// Create a fresh accumulator (initial value 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `data` into the running value.
    pub fn update(&mut self, data: &[u8]) {
        let mut crc = self.value;
        for &byte in data {
            crc ^= byte as u16;
            for _ in 0..8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ POLY;
                } else {
                    crc >>= 1;
                }
            }
        }
        self.value = crc;
    }

    /// Current CRC value.
    pub fn value(&self) -> u16 {
        self.value
    }
}

/// Compute the CRC-16 of `data` in one shot.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(data);
    crc.value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(crc16(b"123456789"), 0xBB3D);
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(crc16(&[]), 0);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut crc = Crc16::new();
        crc.update(b"1234");
        crc.update(b"56789");
        assert_eq!(crc.value(), crc16(b"123456789"));
    }
}
