//! The `error` module defines the [`HexError`] enum that describes the errors that
//! can occur when parsing, flashing, validating, or encoding tokens into a [`HexImage`].
//! It contains the three pieces of information:
//! 1. What class of error occurred, e.g., a malformed record stream or an address overlap.
//! 2. What exactly was encountered (via [`FormatErrorKind`] and [`SizeErrorKind`]).
//! 3. What is the line number (if applicable), e.g., at which line in a hex file the parsing failed.
//!
//! [`HexImage`]: crate::HexImage

use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    /// Malformed record or record stream, with the 1-based line number when parsing text
    FormatError(FormatErrorKind, Option<usize>),
    /// Two flashed byte ranges intersect
    OverlapError { start: usize, previous_end: usize },
    /// A value does not fit its declared size
    SizeError(SizeErrorKind),
    /// Requested token name is not in the manufacturing token table
    LookupError(String),
}

impl fmt::Display for HexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FormatError(base_err, Some(line)) => {
                write!(
                    f,
                    "Error encountered during record parsing at line #{line} of the hex file:\n{base_err}",
                )
            }
            Self::FormatError(base_err, None) => {
                write!(f, "Malformed hex image:\n{base_err}")
            }
            Self::OverlapError {
                start,
                previous_end,
            } => {
                write!(
                    f,
                    "Flashed data at 0x{start:08X} overlaps previous data ending at 0x{previous_end:08X}",
                )
            }
            Self::SizeError(base_err) => {
                write!(f, "Size mismatch:\n{base_err}")
            }
            Self::LookupError(name) => {
                write!(f, "Unknown manufacturing token: {name}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatErrorKind {
    /// Record does not begin with a ':'
    MissingStartCode,
    /// Record contains non-hexadecimal characters
    ContainsInvalidCharacters,
    /// Record is shorter than the smallest valid
    RecordTooShort,
    /// Record length is odd
    RecordNotEvenLength,
    /// Payload (data bytes) size differs from record's length byte
    RecordInvalidPayloadLength,
    /// Record checksum mismatch (expected, found)
    RecordChecksumMismatch(u8, u8),
    /// Record type byte is not one of the known types
    InvalidRecordType(u8),
    /// Record's payload length does not match the record type (type, expected, found)
    RecordLengthInvalidForType(u8, usize, usize),
    /// Record payload exceeds the configured record size (found, max)
    RecordSizeExceeded(usize, usize),
    /// Record stream does not contain an end-of-file record
    MissingEndOfFile,
    /// Record found after the end-of-file record (0-based index of the record)
    RecordAfterEndOfFile(usize),
    /// More than one start address record in the stream
    DuplicateStartAddress,
    /// Flashed data does not fit into the 32-bit address space (end address)
    AddressOverflow(u64),
    /// Token value is not a valid hex string
    TokenValueNotHex(String),
}

impl fmt::Display for FormatErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStartCode => {
                write!(f, "Missing start code ':'")
            }
            Self::ContainsInvalidCharacters => {
                write!(f, "Record contains invalid character(s)")
            }
            Self::RecordTooShort => {
                write!(f, "Record too short")
            }
            Self::RecordNotEvenLength => {
                write!(f, "Record with uneven length")
            }
            Self::RecordInvalidPayloadLength => {
                write!(f, "Payload (data bytes) size differs from record's length")
            }
            Self::RecordChecksumMismatch(expected, actual) => {
                write!(
                    f,
                    "Invalid record checksum - expected: 0x{expected:02X}, found: 0x{actual:02X}"
                )
            }
            Self::InvalidRecordType(rtype) => {
                write!(f, "Invalid record type: 0x{rtype:02X}")
            }
            Self::RecordLengthInvalidForType(rtype, expected, actual) => {
                write!(
                    f,
                    "For record type 0x{rtype:02X} expected data length is {expected} bytes, found {actual}"
                )
            }
            Self::RecordSizeExceeded(actual, max) => {
                write!(
                    f,
                    "Record holds {actual} data bytes, configured record size is {max}"
                )
            }
            Self::MissingEndOfFile => {
                write!(f, "No end-of-file record found")
            }
            Self::RecordAfterEndOfFile(index) => {
                write!(
                    f,
                    "Record at index {index} follows the end-of-file record"
                )
            }
            Self::DuplicateStartAddress => {
                write!(f, "Encountered second start address record")
            }
            Self::AddressOverflow(end) => {
                write!(
                    f,
                    "Data ends at 0x{end:X}, beyond the 32-bit address space"
                )
            }
            Self::TokenValueNotHex(value) => {
                write!(f, "Token value is not a hex string: {value:?}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeErrorKind {
    /// String token is longer than allowed (token, max bytes, found bytes)
    TokenStringTooLong(String, usize, usize),
    /// Raw token value has the wrong size (token, expected bytes, found bytes)
    TokenSizeMismatch(String, usize, usize),
    /// Configured record size is zero
    InvalidRecordSize,
}

impl fmt::Display for SizeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenStringTooLong(name, max, actual) => {
                write!(
                    f,
                    "Token {name} holds at most {max} UTF-8 bytes, found {actual}"
                )
            }
            Self::TokenSizeMismatch(name, expected, actual) => {
                write!(f, "Token {name} is {expected} bytes, found {actual}")
            }
            Self::InvalidRecordSize => {
                write!(f, "Record size must be between 1 and 255 bytes")
            }
        }
    }
}

impl Error for HexError {}
impl Error for FormatErrorKind {}
impl Error for SizeErrorKind {}
