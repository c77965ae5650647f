//! Persisted calibration record
//!
//! A profile captured by the calibration procedure is wrapped with a header
//! and checksum and stored as postcard binary data, so a reboot does not
//! require recalibrating.

use serde::{Deserialize, Serialize};

use super::profile::CalibrationProfile;

/// Magic number to identify a valid touch calibration record
pub const RECORD_MAGIC: u32 = 0x5443_414C; // "TCAL"

/// Current record format version
pub const RECORD_VERSION: u8 = 1;

/// Upper bound on the encoded size of a record
pub const RECORD_MAX_LEN: usize = 32;

/// Record errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// Output buffer too small
    BufferTooSmall,
    /// Bytes are not a record, or the profile inside is invalid
    Malformed,
    /// Header does not match this firmware
    BadHeader,
    /// Checksum mismatch
    BadChecksum,
}

/// Calibration profile with a validation header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationRecord {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    /// Stored profile
    pub profile: CalibrationProfile,
    /// CRC32 over magic, version and profile bounds
    pub crc: u32,
}

impl CalibrationRecord {
    /// Wrap a profile with a fresh header and checksum
    pub fn new(profile: CalibrationProfile) -> Self {
        let mut record = Self {
            magic: RECORD_MAGIC,
            version: RECORD_VERSION,
            profile,
            crc: 0,
        };
        record.crc = record.calculate_crc();
        record
    }

    /// Check if the header matches this firmware
    pub fn is_valid(&self) -> bool {
        self.magic == RECORD_MAGIC && self.version == RECORD_VERSION
    }

    /// CRC32 over everything except the crc field itself
    pub fn calculate_crc(&self) -> u32 {
        let p = &self.profile;
        let mut crc: u32 = 0xFFFF_FFFF;
        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version]);
        for bound in [p.x_min(), p.x_max(), p.y_min(), p.y_max()] {
            crc = crc32_update(crc, &bound.to_le_bytes());
        }
        crc = crc32_update(crc, &[u8::from(p.rotate())]);
        !crc
    }

    /// Encode into `buf`, returning the used prefix
    pub fn encode<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], RecordError> {
        postcard::to_slice(self, buf).map_err(|_| RecordError::BufferTooSmall)
    }

    /// Decode and validate a stored record
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let record: Self = postcard::from_bytes(bytes).map_err(|_| RecordError::Malformed)?;
        if !record.is_valid() {
            return Err(RecordError::BadHeader);
        }
        if record.crc != record.calculate_crc() {
            return Err(RecordError::BadChecksum);
        }
        Ok(record)
    }
}

/// CRC32 update (IEEE 802.3 polynomial, reflected)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc = crc;

    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> CalibrationProfile {
        CalibrationProfile::new(310, 3790, 280, 3810, true).unwrap()
    }

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(!crc32_update(0xFFFF_FFFF, b"123456789"), 0xCBF4_3926);
        assert_eq!(!crc32_update(0xFFFF_FFFF, b""), 0);
    }

    #[test]
    fn test_record_survives_storage() {
        let mut buf = [0u8; RECORD_MAX_LEN];
        let record = CalibrationRecord::new(profile());
        let len = record.encode(&mut buf).unwrap().len();

        let restored = CalibrationRecord::decode(&buf[..len]).unwrap();
        assert_eq!(restored.profile, profile());
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let mut record = CalibrationRecord::new(profile());
        record.magic = 0x5049_4443;
        record.crc = record.calculate_crc();

        let mut buf = [0u8; RECORD_MAX_LEN];
        let len = record.encode(&mut buf).unwrap().len();
        assert_eq!(
            CalibrationRecord::decode(&buf[..len]),
            Err(RecordError::BadHeader)
        );
    }

    #[test]
    fn test_checksum_detects_tampering() {
        let mut record = CalibrationRecord::new(profile());
        record.profile = record.profile.with_rotate(false);

        let mut buf = [0u8; RECORD_MAX_LEN];
        let len = record.encode(&mut buf).unwrap().len();
        assert_eq!(
            CalibrationRecord::decode(&buf[..len]),
            Err(RecordError::BadChecksum)
        );
    }

    #[test]
    fn test_small_buffer_and_garbage() {
        let mut tiny = [0u8; 2];
        assert_eq!(
            CalibrationRecord::new(profile()).encode(&mut tiny),
            Err(RecordError::BufferTooSmall)
        );
        assert_eq!(
            CalibrationRecord::decode(&[0xFF; 3]),
            Err(RecordError::Malformed)
        );
    }

    #[test]
    fn test_erased_flash_is_not_a_record() {
        assert!(CalibrationRecord::decode(&[0xFF; RECORD_MAX_LEN]).is_err());
    }
}
