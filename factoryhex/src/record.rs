//! The `record` module defines the [`Record`] and [`RecordType`] which are used for parsing
//! (and generating) single Intel HEX lines.

use crate::error::FormatErrorKind;
use std::fmt;

mod sizes {
    pub const BYTE_CHAR_LEN: usize = 2;
    pub const HEADER_BYTES: usize = 1 + 2 + 1; // len + addr + rtype
    pub const SMALLEST_RECORD: usize = (HEADER_BYTES + 1) * BYTE_CHAR_LEN; // + checksum
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    Data = 0x0,
    EndOfFile = 0x1,
    ExtendedSegmentAddress = 0x2,
    StartSegmentAddress = 0x3,
    ExtendedLinearAddress = 0x4,
    StartLinearAddress = 0x5,
}

impl TryFrom<u8> for RecordType {
    type Error = FormatErrorKind;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Data),
            0x01 => Ok(Self::EndOfFile),
            0x02 => Ok(Self::ExtendedSegmentAddress),
            0x03 => Ok(Self::StartSegmentAddress),
            0x04 => Ok(Self::ExtendedLinearAddress),
            0x05 => Ok(Self::StartLinearAddress),
            _ => Err(FormatErrorKind::InvalidRecordType(value)),
        }
    }
}

/// One line of an Intel HEX file. Length and checksum are derived from the contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub(crate) address: u16,
    pub(crate) rtype: RecordType,
    pub(crate) data: Vec<u8>,
}

impl Record {
    /// Creates a record from its address, type and payload.
    ///
    /// # Errors
    /// Returns an error if the payload is longer than 255 bytes.
    ///
    /// # Example
    /// ```
    /// use factoryhex::{Record, RecordType};
    ///
    /// let record = Record::new(0x0100, RecordType::Data, vec![0xAA, 0xBB]).unwrap();
    /// assert_eq!(record.to_string(), ":02010000AABB98");
    /// ```
    pub fn new(address: u16, rtype: RecordType, data: Vec<u8>) -> Result<Self, FormatErrorKind> {
        if data.len() > u8::MAX as usize {
            return Err(FormatErrorKind::RecordInvalidPayloadLength);
        }
        Ok(Self {
            address,
            rtype,
            data,
        })
    }

    /// End-of-file record (`:00000001FF`).
    #[must_use]
    pub const fn end_of_file() -> Self {
        Self {
            address: 0,
            rtype: RecordType::EndOfFile,
            data: Vec::new(),
        }
    }

    /// Extended linear address record holding bits 16-31 of the following data addresses.
    #[must_use]
    pub fn extended_linear_address(upper: u16) -> Self {
        Self {
            address: 0,
            rtype: RecordType::ExtendedLinearAddress,
            data: upper.to_be_bytes().to_vec(),
        }
    }

    #[must_use]
    pub const fn address(&self) -> u16 {
        self.address
    }

    #[must_use]
    pub const fn rtype(&self) -> RecordType {
        self.rtype
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[allow(clippy::cast_possible_truncation)]
    /// Calculate checksum from the Record instance.
    #[must_use]
    pub fn checksum(&self) -> u8 {
        let [addr_high_byte, addr_low_byte] = self.address.to_be_bytes();
        let header = [
            self.data.len() as u8,
            addr_high_byte,
            addr_low_byte,
            self.rtype as u8,
        ];
        Self::calculate_checksum(header.iter().chain(&self.data))
    }

    /// Calculate checksum over a sequence of bytes.
    pub(crate) fn calculate_checksum<'a>(data: impl IntoIterator<Item = &'a u8>) -> u8 {
        let sum = data.into_iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        (!sum).wrapping_add(1) // two's complement
    }

    /// Parse one record line (without line terminator) into a Record.
    ///
    /// # Errors
    /// Returns an error if the line is not a well-formed record.
    ///
    /// # Example
    /// ```
    /// use factoryhex::{Record, RecordType};
    ///
    /// let record = Record::parse(b":020000040FE00B").unwrap();
    /// assert_eq!(record.rtype(), RecordType::ExtendedLinearAddress);
    /// assert_eq!(record.data(), &[0x0F, 0xE0]);
    /// ```
    pub fn parse(line: &[u8]) -> Result<Self, FormatErrorKind> {
        // Check for start code
        let Some(hexdigit_part) = line.strip_prefix(b":") else {
            return Err(FormatErrorKind::MissingStartCode);
        };

        // Validate all characters are hexadecimal
        if !hexdigit_part.iter().all(u8::is_ascii_hexdigit) {
            return Err(FormatErrorKind::ContainsInvalidCharacters);
        }

        // Validate record's size
        if hexdigit_part.len() < sizes::SMALLEST_RECORD {
            return Err(FormatErrorKind::RecordTooShort);
        } else if hexdigit_part.len() % sizes::BYTE_CHAR_LEN != 0 {
            return Err(FormatErrorKind::RecordNotEvenLength);
        }

        let bytes = decode_hex(hexdigit_part).ok_or(FormatErrorKind::ContainsInvalidCharacters)?;

        // Length byte must match the number of payload bytes
        let length = bytes[0] as usize;
        if bytes.len() != sizes::HEADER_BYTES + length + 1 {
            return Err(FormatErrorKind::RecordInvalidPayloadLength);
        }

        let (body, checksum) = bytes.split_at(bytes.len() - 1);
        let calc_checksum = Self::calculate_checksum(body);
        if calc_checksum != checksum[0] {
            return Err(FormatErrorKind::RecordChecksumMismatch(
                calc_checksum,
                checksum[0],
            ));
        }

        let rtype = RecordType::try_from(body[3])?;

        Ok(Self {
            address: u16::from_be_bytes([body[1], body[2]]),
            rtype,
            data: body[sizes::HEADER_BYTES..].to_vec(),
        })
    }

    /// Serialize the record followed by the given line terminator.
    #[must_use]
    pub fn serialize(&self, line_ending: &str) -> String {
        format!("{self}{line_ending}")
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            ":{:02X}{:04X}{:02X}{}{:02X}",
            self.data.len(),
            self.address,
            self.rtype as u8,
            self.data
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect::<String>(),
            self.checksum()
        )
    }
}

/// Decode pairs of ASCII hex digits into bytes. Returns `None` on odd length or non-hex input.
pub(crate) fn decode_hex(digits: &[u8]) -> Option<Vec<u8>> {
    const fn nibble(c: u8) -> Option<u8> {
        match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        }
    }

    if digits.len() % sizes::BYTE_CHAR_LEN != 0 {
        return None;
    }

    digits
        .chunks_exact(sizes::BYTE_CHAR_LEN)
        .map(|pair| Some((nibble(pair[0])? << 4) | nibble(pair[1])?))
        .collect()
}
