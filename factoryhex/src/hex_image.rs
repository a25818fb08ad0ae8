//! The `hex_image` module provides the [`HexImage`] struct, an ordered stream of Intel HEX
//! records that is built up by flashing byte buffers at absolute addresses.
//!
//! Records are kept exactly as they will be written out. The authoritative view of which
//! bytes end up where is computed on demand by [`HexImage::validate`], which replays the
//! record stream into sorted, non-overlapping [`Extent`]s.

use crate::error::{FormatErrorKind, HexError, SizeErrorKind};
use crate::record::{Record, RecordType};
use log::{debug, trace};

const DEFAULT_RECORD_SIZE: usize = 16;
const SEGMENT_SIZE: usize = 0x1_0000;
const ADDRESS_SPACE_END: u64 = 1 << 32;

/// Line terminator used when serializing records.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LineEnding {
    #[default]
    CrLf,
    Lf,
}

impl LineEnding {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CrLf => "\r\n",
            Self::Lf => "\n",
        }
    }
}

/// Contiguous run of flashed bytes starting at `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extent {
    pub start: usize,
    pub data: Vec<u8>,
}

impl Extent {
    /// First address past the extent.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.data.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexImage {
    /// Records in the order they are written out
    records: Vec<Record>,
    /// Maximum payload size for data records
    record_size: usize,
    /// Line terminator used by `to_text`
    line_ending: LineEnding,
}

impl Default for HexImage {
    fn default() -> Self {
        Self::new()
    }
}

impl HexImage {
    /// Creates an empty `HexImage` with a record size of 16 bytes and CRLF line endings.
    ///
    /// # Examples
    /// ```
    /// use factoryhex::HexImage;
    ///
    /// let image = HexImage::new();
    /// assert!(image.records().is_empty());
    /// assert_eq!(image.record_size(), 16);
    /// ```
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
            record_size: DEFAULT_RECORD_SIZE,
            line_ending: LineEnding::CrLf,
        }
    }

    /// Parses the raw contents of a hex file into a new `HexImage` with default settings.
    ///
    /// # Errors
    /// Returns an error if any record is malformed or holds more data than the
    /// default record size.
    ///
    /// # Example
    /// ```
    /// use factoryhex::HexImage;
    ///
    /// let image = HexImage::from_text(b":0400100001020304E2\r\n:00000001FF\r\n").unwrap();
    /// assert_eq!(image.records().len(), 2);
    /// ```
    pub fn from_text(raw_bytes: &[u8]) -> Result<Self, HexError> {
        let mut image = Self::new();
        image.parse(raw_bytes)?;
        Ok(image)
    }

    /// Parses the raw contents of a hex file and appends the records to `self`.
    /// Blank lines are skipped. Nothing is appended if an error is returned.
    ///
    /// # Errors
    /// - Returns an error if a record is corrupted (with its line number)
    /// - Returns an error if a record holds more data than the configured record size
    ///
    pub fn parse(&mut self, raw_bytes: &[u8]) -> Result<(), HexError> {
        let mut records = Vec::new();
        let mut oversized: Option<(usize, usize)> = None;

        // Iterate over lines of records
        for (index, line) in raw_bytes.split(|&b| b == b'\n').enumerate() {
            // Only the terminator and trailing blanks are stripped
            let line = line.trim_ascii_end();

            if line.is_empty() {
                continue;
            }

            let record = Record::parse(line)
                .map_err(|err| HexError::FormatError(err, Some(index + 1)))?;

            // Remember the first record that breaks the configured record size
            if oversized.is_none() && record.data.len() > self.record_size {
                oversized = Some((record.data.len(), index + 1));
            }

            records.push(record);
        }

        if let Some((size, line)) = oversized {
            return Err(HexError::FormatError(
                FormatErrorKind::RecordSizeExceeded(size, self.record_size),
                Some(line),
            ));
        }

        debug!("Parsed {} records", records.len());
        self.records.extend(records);

        Ok(())
    }

    /// Serializes all records using the configured line ending.
    ///
    /// # Example
    /// ```
    /// use factoryhex::HexImage;
    ///
    /// let mut image = HexImage::new();
    /// image.finalize();
    /// assert_eq!(image.to_text(), b":00000001FF\r\n");
    /// ```
    #[must_use]
    pub fn to_text(&self) -> Vec<u8> {
        self.to_text_with(self.line_ending)
    }

    /// Serializes all records using the provided line ending.
    #[must_use]
    pub fn to_text_with(&self, line_ending: LineEnding) -> Vec<u8> {
        self.records
            .iter()
            .map(|record| record.serialize(line_ending.as_str()))
            .collect::<String>()
            .into_bytes()
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Appends a record as is. No checks are done until [`HexImage::validate`].
    pub fn push_record(&mut self, record: Record) {
        self.records.push(record);
    }

    #[must_use]
    pub const fn record_size(&self) -> usize {
        self.record_size
    }

    /// Update the max payload size (number of bytes) per data record. Default = 16.
    ///
    /// # Errors
    /// Returns an error if the provided record size is 0.
    ///
    /// # Example
    /// ```
    /// use factoryhex::HexImage;
    ///
    /// let mut image = HexImage::new();
    /// image.set_record_size(32).unwrap();
    /// image.flash_data(0x0, &[0xAA; 32]).unwrap();
    ///
    /// // One address record + one data record
    /// assert_eq!(image.records().len(), 2);
    /// ```
    pub const fn set_record_size(&mut self, size: u8) -> Result<(), HexError> {
        if size == 0 {
            return Err(HexError::SizeError(SizeErrorKind::InvalidRecordSize));
        }
        self.record_size = size as usize;
        Ok(())
    }

    #[must_use]
    pub const fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub const fn set_line_ending(&mut self, line_ending: LineEnding) {
        self.line_ending = line_ending;
    }

    #[allow(clippy::cast_possible_truncation)]
    /// Writes `data` at the absolute `address`, appending extended linear address and data
    /// records. Data is split into records of at most `record_size` bytes that never cross
    /// a 64 KiB boundary.
    ///
    /// Each call starts without an address base, so it always emits its own extended
    /// linear address record before the first data record.
    ///
    /// # Errors
    /// Returns an error if the data does not fit below 4 GiB. The image is left unchanged.
    ///
    /// # Example
    /// ```
    /// use factoryhex::{HexImage, RecordType};
    ///
    /// let mut image = HexImage::new();
    /// image.flash_data(0xFFF8, &[0x55; 16]).unwrap();
    ///
    /// let types: Vec<RecordType> = image.records().iter().map(|r| r.rtype()).collect();
    /// assert_eq!(
    ///     types,
    ///     [
    ///         RecordType::ExtendedLinearAddress,
    ///         RecordType::Data,
    ///         RecordType::ExtendedLinearAddress,
    ///         RecordType::Data,
    ///     ]
    /// );
    /// ```
    pub fn flash_data(&mut self, address: u32, data: &[u8]) -> Result<(), HexError> {
        let end = u64::from(address) + data.len() as u64;
        if end > ADDRESS_SPACE_END {
            return Err(HexError::FormatError(
                FormatErrorKind::AddressOverflow(end),
                None,
            ));
        }

        let records_before = self.records.len();
        let mut extended_linear_address: Option<u32> = None;
        let mut offset = 0;

        while offset < data.len() {
            let position = address + offset as u32;
            let to_boundary = SEGMENT_SIZE - (position as usize & 0xFFFF);
            let chunk_len = self
                .record_size
                .min(data.len() - offset)
                .min(to_boundary);

            let base = match extended_linear_address {
                Some(base) if position - base <= 0xFFFF => base,
                _ => {
                    let upper = (position >> 16) as u16;
                    trace!("Extended linear address 0x{upper:04X}");
                    self.records.push(Record::extended_linear_address(upper));

                    let base = position & 0xFFFF_0000;
                    extended_linear_address = Some(base);
                    base
                }
            };

            self.records.push(Record {
                address: (position - base) as u16,
                rtype: RecordType::Data,
                data: data[offset..offset + chunk_len].to_vec(),
            });

            offset += chunk_len;
        }

        debug!(
            "Flashed {} bytes at 0x{address:08X} into {} records",
            data.len(),
            self.records.len() - records_before
        );

        Ok(())
    }

    /// Appends the end-of-file record. Call once, after all data is flashed.
    pub fn finalize(&mut self) {
        self.records.push(Record::end_of_file());
    }

    /// Replays the record stream and returns the flashed extents, sorted by address,
    /// with back-to-back ranges merged.
    ///
    /// # Errors
    /// - `FormatError` if a record exceeds the record size, an extended linear address record
    ///   is not 2 bytes long, the end-of-file record is missing, or records follow it
    /// - `FormatError` if more than one start address record precedes the end-of-file record
    /// - `OverlapError` if two flashed ranges intersect
    ///
    /// # Example
    /// ```
    /// use factoryhex::HexImage;
    ///
    /// let mut image = HexImage::new();
    /// image.flash_data(0x1000, &[0x11; 16]).unwrap();
    /// image.flash_data(0x1010, &[0x22; 16]).unwrap();
    /// image.finalize();
    ///
    /// let extents = image.validate().unwrap();
    /// assert_eq!(extents.len(), 1);
    /// assert_eq!((extents[0].start, extents[0].end()), (0x1000, 0x1020));
    /// ```
    pub fn validate(&self) -> Result<Vec<Extent>, HexError> {
        if let Some(record) = self
            .records
            .iter()
            .find(|record| record.data.len() > self.record_size)
        {
            return Err(HexError::FormatError(
                FormatErrorKind::RecordSizeExceeded(record.data.len(), self.record_size),
                None,
            ));
        }

        let mut base_address: usize = 0;
        let mut end_of_file: Option<usize> = None;
        let mut start_address: Option<&Record> = None;
        let mut extents = Vec::new();

        for (index, record) in self.records.iter().enumerate() {
            match record.rtype {
                RecordType::Data => {
                    if record.data.is_empty() {
                        continue;
                    }
                    extents.push(Extent {
                        start: base_address + record.address as usize,
                        data: record.data.clone(),
                    });
                }
                RecordType::ExtendedLinearAddress => {
                    let &[high, low] = record.data.as_slice() else {
                        return Err(HexError::FormatError(
                            FormatErrorKind::RecordLengthInvalidForType(
                                record.rtype as u8,
                                2,
                                record.data.len(),
                            ),
                            None,
                        ));
                    };
                    base_address = (u16::from_be_bytes([high, low]) as usize) << 16;
                }
                RecordType::EndOfFile => {
                    end_of_file = Some(index);
                    break;
                }
                RecordType::ExtendedSegmentAddress => {
                    debug!("Ignoring extended segment address record at index {index}");
                }
                RecordType::StartSegmentAddress | RecordType::StartLinearAddress => {
                    if start_address.replace(record).is_some() {
                        return Err(HexError::FormatError(
                            FormatErrorKind::DuplicateStartAddress,
                            None,
                        ));
                    }
                }
            }
        }

        match end_of_file {
            None => {
                return Err(HexError::FormatError(
                    FormatErrorKind::MissingEndOfFile,
                    None,
                ));
            }
            Some(index) if index + 1 < self.records.len() => {
                return Err(HexError::FormatError(
                    FormatErrorKind::RecordAfterEndOfFile(index + 1),
                    None,
                ));
            }
            Some(_) => {}
        }

        let merged = merge_extents(extents)?;
        debug!(
            "Validated {} records into {} extents",
            self.records.len(),
            merged.len()
        );

        Ok(merged)
    }

    /// Flashes every extent of a validated `other` image into `self` and carries over
    /// its start address record, if any.
    ///
    /// # Errors
    /// - Returns an error if `other` does not validate
    /// - Returns `DuplicateStartAddress` if both images hold different start address
    ///   records. `self` is left unchanged in that case.
    ///
    /// # Example
    /// ```
    /// use factoryhex::HexImage;
    ///
    /// let mut bootloader = HexImage::new();
    /// bootloader.flash_data(0x0, &[0xAA; 32]).unwrap();
    /// bootloader.finalize();
    ///
    /// let mut image = HexImage::new();
    /// image.merge_image(&bootloader).unwrap();
    /// image.finalize();
    ///
    /// assert_eq!(image.validate().unwrap(), bootloader.validate().unwrap());
    /// ```
    pub fn merge_image(&mut self, other: &Self) -> Result<(), HexError> {
        let extents = other.validate()?;

        let start_address = match (self.start_address(), other.start_address()) {
            (Some(existing), Some(incoming)) if existing != incoming => {
                return Err(HexError::FormatError(
                    FormatErrorKind::DuplicateStartAddress,
                    None,
                ));
            }
            (None, incoming) => incoming.cloned(),
            _ => None,
        };

        for extent in extents {
            let address = u32::try_from(extent.start).map_err(|_| {
                HexError::FormatError(FormatErrorKind::AddressOverflow(extent.end() as u64), None)
            })?;
            self.flash_data(address, &extent.data)?;
        }

        if let Some(record) = start_address {
            debug!("Carrying over start address record {record}");
            self.records.push(record);
        }

        Ok(())
    }

    /// First start address record before the end-of-file record.
    fn start_address(&self) -> Option<&Record> {
        self.records
            .iter()
            .take_while(|record| record.rtype != RecordType::EndOfFile)
            .find(|record| {
                matches!(
                    record.rtype,
                    RecordType::StartSegmentAddress | RecordType::StartLinearAddress
                )
            })
    }
}

/// Sort extents by start address and merge back-to-back ranges.
fn merge_extents(mut extents: Vec<Extent>) -> Result<Vec<Extent>, HexError> {
    extents.sort_by_key(|extent| extent.start);

    let mut merged: Vec<Extent> = Vec::with_capacity(extents.len());
    for extent in extents {
        match merged.last_mut() {
            Some(previous) if extent.start < previous.end() => {
                return Err(HexError::OverlapError {
                    start: extent.start,
                    previous_end: previous.end(),
                });
            }
            Some(previous) if extent.start == previous.end() => {
                previous.data.extend(extent.data);
            }
            _ => merged.push(extent),
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_types(image: &HexImage) -> Vec<RecordType> {
        image.records.iter().map(|record| record.rtype).collect()
    }

    #[test]
    fn test_set_record_size_valid() {
        // Arrange
        let mut image = HexImage::new();
        let new_record_size = 2;

        // Act
        let res = image.set_record_size(new_record_size);

        // Assert
        assert!(res.is_ok());
        assert_eq!(image.record_size, new_record_size as usize);
    }

    #[test]
    fn test_set_record_size_invalid() {
        // Arrange
        let mut image = HexImage::new();
        let default_record_size = image.record_size;

        // Act
        let res = image.set_record_size(0);

        // Assert
        assert_eq!(
            res,
            Err(HexError::SizeError(SizeErrorKind::InvalidRecordSize))
        );
        assert_eq!(image.record_size, default_record_size);
    }

    #[test]
    fn test_flash_data_chunks_by_record_size() {
        // Arrange
        let mut image = HexImage::new();
        let data: Vec<u8> = (0..40).collect();

        // Act
        let res = image.flash_data(0x0800_0000, &data);

        // Assert
        assert!(res.is_ok());
        assert_eq!(
            record_types(&image),
            [
                RecordType::ExtendedLinearAddress,
                RecordType::Data,
                RecordType::Data,
                RecordType::Data,
            ]
        );
        assert_eq!(image.records[0].data, [0x08, 0x00]);
        assert_eq!(image.records[1].address, 0x0000);
        assert_eq!(image.records[2].address, 0x0010);
        assert_eq!(image.records[3].address, 0x0020);
        assert_eq!(image.records[3].data, &data[32..]);
    }

    #[test]
    fn test_flash_data_emits_base_per_call() {
        // Arrange
        let mut image = HexImage::new();

        // Act
        let res1 = image.flash_data(0x1000, &[0x11; 4]);
        let res2 = image.flash_data(0x1004, &[0x22; 4]);

        // Assert
        assert!(res1.is_ok() && res2.is_ok());
        assert_eq!(
            record_types(&image),
            [
                RecordType::ExtendedLinearAddress,
                RecordType::Data,
                RecordType::ExtendedLinearAddress,
                RecordType::Data,
            ]
        );
    }

    #[test]
    fn test_flash_data_crosses_segment_boundary() {
        // Arrange
        let mut image = HexImage::new();
        let data: Vec<u8> = (0..16).collect();

        // Act
        let res = image.flash_data(0xFFF8, &data);
        image.finalize();

        // Assert
        assert!(res.is_ok());
        assert_eq!(image.records[0], Record::extended_linear_address(0x0000));
        assert_eq!(image.records[1].address, 0xFFF8);
        assert_eq!(image.records[1].data, &data[..8]);
        assert_eq!(image.records[2], Record::extended_linear_address(0x0001));
        assert_eq!(image.records[3].address, 0x0000);
        assert_eq!(image.records[3].data, &data[8..]);

        assert_eq!(
            image.validate(),
            Ok(vec![Extent {
                start: 0xFFF8,
                data,
            }])
        );
    }

    #[test]
    fn test_flash_data_top_of_address_space() {
        // Arrange
        let mut image = HexImage::new();

        // Act
        let res = image.flash_data(0xFFFF_FFF0, &[0xEE; 16]);
        image.finalize();

        // Assert
        assert!(res.is_ok());
        let extents = image.validate().unwrap_or_default();
        assert_eq!(extents.len(), 1);
        assert_eq!(extents[0].start, 0xFFFF_FFF0);
        assert_eq!(extents[0].end(), 0x1_0000_0000);
    }

    #[test]
    fn test_flash_data_address_overflow() {
        // Arrange
        let mut image = HexImage::new();

        // Act
        let res = image.flash_data(0xFFFF_FFF0, &[0xEE; 17]);

        // Assert
        assert_eq!(
            res,
            Err(HexError::FormatError(
                FormatErrorKind::AddressOverflow(0x1_0000_0001),
                None
            ))
        );
        assert!(image.records.is_empty());
    }

    #[test]
    fn test_flash_empty_data() {
        // Arrange
        let mut image = HexImage::new();

        // Act
        let res = image.flash_data(0x1234, &[]);

        // Assert
        assert!(res.is_ok());
        assert!(image.records.is_empty());
    }

    #[test]
    fn test_validate_contiguous_merge() {
        // Arrange
        let mut image = HexImage::new();
        let _ = image.flash_data(0x1000, &[0x11; 16]);
        let _ = image.flash_data(0x1010, &[0x22; 16]);
        image.finalize();

        // Act
        let res = image.validate();

        // Assert
        let mut expected_data = vec![0x11; 16];
        expected_data.extend([0x22; 16]);
        assert_eq!(
            res,
            Ok(vec![Extent {
                start: 0x1000,
                data: expected_data,
            }])
        );
    }

    #[test]
    fn test_validate_sorts_extents() {
        // Arrange
        let mut image = HexImage::new();
        let _ = image.flash_data(0x2000, &[0x22; 8]);
        let _ = image.flash_data(0x1000, &[0x11; 8]);
        image.finalize();

        // Act
        let extents = image.validate().unwrap_or_default();

        // Assert
        let ranges: Vec<(usize, usize)> = extents.iter().map(|e| (e.start, e.end())).collect();
        assert_eq!(ranges, [(0x1000, 0x1008), (0x2000, 0x2008)]);
    }

    #[test]
    fn test_validate_overlap() {
        // Arrange
        let mut image = HexImage::new();
        let _ = image.flash_data(0x1000, &[0x11; 16]);
        let _ = image.flash_data(0x1008, &[0x22; 16]);
        image.finalize();

        // Act
        let res = image.validate();

        // Assert
        assert_eq!(
            res,
            Err(HexError::OverlapError {
                start: 0x1008,
                previous_end: 0x1010,
            })
        );
    }

    #[test]
    fn test_validate_missing_end_of_file() {
        // Arrange
        let mut image = HexImage::new();
        let _ = image.flash_data(0x0, &[0x11; 4]);

        // Act
        let res = image.validate();

        // Assert
        assert_eq!(
            res,
            Err(HexError::FormatError(
                FormatErrorKind::MissingEndOfFile,
                None
            ))
        );
    }

    #[test]
    fn test_validate_record_after_end_of_file() {
        // Arrange
        let mut image = HexImage::new();
        let _ = image.flash_data(0x0, &[0x11; 4]);
        image.finalize();
        let _ = image.flash_data(0x10, &[0x22; 4]);

        // Act
        let res = image.validate();

        // Assert
        assert_eq!(
            res,
            Err(HexError::FormatError(
                FormatErrorKind::RecordAfterEndOfFile(3),
                None
            ))
        );
    }

    #[test]
    fn test_validate_record_size_exceeded() {
        // Arrange
        let mut image = HexImage::new();
        let _ = image.set_record_size(32);
        let _ = image.flash_data(0x0, &[0x11; 32]);
        image.finalize();
        let _ = image.set_record_size(16);

        // Act
        let res = image.validate();

        // Assert
        assert_eq!(
            res,
            Err(HexError::FormatError(
                FormatErrorKind::RecordSizeExceeded(32, 16),
                None
            ))
        );
    }

    #[test]
    fn test_validate_bad_extended_linear_address() {
        // Arrange
        let mut image = HexImage::new();
        image.push_record(Record {
            address: 0,
            rtype: RecordType::ExtendedLinearAddress,
            data: vec![0x01],
        });
        image.finalize();

        // Act
        let res = image.validate();

        // Assert
        assert_eq!(
            res,
            Err(HexError::FormatError(
                FormatErrorKind::RecordLengthInvalidForType(0x04, 2, 1),
                None
            ))
        );
    }

    #[test]
    fn test_validate_empty_image() {
        // Arrange
        let mut image = HexImage::new();
        image.finalize();

        // Act
        let res = image.validate();

        // Assert
        assert_eq!(res, Ok(vec![]));
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        // Arrange
        let raw = b"\r\n:020000040000FA\r\n   \r\n:0400100001020304E2\n\n:00000001FF";

        // Act
        let res = HexImage::from_text(raw);

        // Assert
        let image = res.unwrap_or_else(|err| panic!("Expected a parsed image, got {err:?}"));
        assert_eq!(
            record_types(&image),
            [
                RecordType::ExtendedLinearAddress,
                RecordType::Data,
                RecordType::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_parse_reports_line_number() {
        // Arrange
        let raw = b":020000040000FA\r\n\r\n:0400100001020304E3\r\n:00000001FF\r\n";

        // Act
        let res = HexImage::from_text(raw);

        // Assert
        assert_eq!(
            res,
            Err(HexError::FormatError(
                FormatErrorKind::RecordChecksumMismatch(0xE2, 0xE3),
                Some(3)
            ))
        );
    }

    #[test]
    fn test_parse_mixed_record_sizes() {
        // Arrange
        let mut source = HexImage::new();
        let _ = source.set_record_size(32);
        let _ = source.flash_data(0x0, &[0x33; 32]);
        source.finalize();
        let text = source.to_text();

        // Act
        let res = HexImage::from_text(&text);

        // Assert
        assert_eq!(
            res,
            Err(HexError::FormatError(
                FormatErrorKind::RecordSizeExceeded(32, 16),
                Some(2)
            ))
        );
    }

    #[test]
    fn test_parse_leaves_image_untouched_on_error() {
        // Arrange
        let mut image = HexImage::new();
        image.finalize();

        // Act
        let res = image.parse(b":00000001FF\r\n:00000001FE\r\n");

        // Assert
        assert!(res.is_err());
        assert_eq!(image.records.len(), 1);
    }

    #[test]
    fn test_to_text_line_endings() {
        // Arrange
        let mut image = HexImage::new();
        let _ = image.flash_data(0x0FE0_0100, &[0x12, 0x34]);
        image.finalize();

        // Act
        let crlf = image.to_text();
        image.set_line_ending(LineEnding::Lf);
        let lf = image.to_text();

        // Assert
        assert_eq!(
            crlf,
            b":020000040FE00B\r\n:020100001234B7\r\n:00000001FF\r\n"
        );
        assert_eq!(lf, b":020000040FE00B\n:020100001234B7\n:00000001FF\n");
    }

    #[test]
    fn test_merge_image() {
        // Arrange
        let mut bootloader = HexImage::new();
        let _ = bootloader.flash_data(0x0, &[0xAA; 20]);
        bootloader.finalize();

        let mut application = HexImage::new();
        let _ = application.flash_data(0x8000, &[0xBB; 20]);
        application.finalize();

        // Act
        let mut image = HexImage::new();
        let res1 = image.merge_image(&bootloader);
        let res2 = image.merge_image(&application);
        image.finalize();

        // Assert
        assert!(res1.is_ok() && res2.is_ok());
        let ranges: Vec<(usize, usize)> = image
            .validate()
            .unwrap_or_default()
            .iter()
            .map(|e| (e.start, e.end()))
            .collect();
        assert_eq!(ranges, [(0x0, 0x14), (0x8000, 0x8014)]);
    }

    #[test]
    fn test_merge_image_rejects_unfinished_source() {
        // Arrange
        let mut source = HexImage::new();
        let _ = source.flash_data(0x0, &[0xAA; 4]);

        // Act
        let mut image = HexImage::new();
        let res = image.merge_image(&source);

        // Assert
        assert_eq!(
            res,
            Err(HexError::FormatError(
                FormatErrorKind::MissingEndOfFile,
                None
            ))
        );
        assert!(image.records.is_empty());
    }

    #[test]
    fn test_validate_ignores_segment_and_start_records() {
        // Arrange
        let raw = b":020000040000FA\r\n:0400100001020304E2\r\n:020000021000EC\r\n\
:02002000AABB79\r\n:0400000508000131BD\r\n:00000001FF\r\n";
        let image = HexImage::from_text(raw).unwrap_or_default();

        // Act
        let res = image.validate();

        // Assert
        assert_eq!(
            res,
            Ok(vec![
                Extent {
                    start: 0x10,
                    data: vec![0x01, 0x02, 0x03, 0x04],
                },
                Extent {
                    start: 0x20,
                    data: vec![0xAA, 0xBB],
                },
            ])
        );
        assert_eq!(image.to_text(), raw);
    }

    #[test]
    fn test_validate_duplicate_start_address() {
        // Arrange
        let raw = b":0400000508000131BD\r\n:0400000508000141AD\r\n:00000001FF\r\n";
        let image = HexImage::from_text(raw).unwrap_or_default();

        // Act
        let res = image.validate();

        // Assert
        assert_eq!(
            res,
            Err(HexError::FormatError(
                FormatErrorKind::DuplicateStartAddress,
                None
            ))
        );
    }

    #[test]
    fn test_parse_rejects_leading_whitespace() {
        // Act
        let res = HexImage::from_text(b":020000040000FA\r\n  :00000001FF\r\n");

        // Assert
        assert_eq!(
            res,
            Err(HexError::FormatError(
                FormatErrorKind::MissingStartCode,
                Some(2)
            ))
        );
    }

    #[test]
    fn test_merge_image_keeps_start_address() {
        // Arrange
        let application =
            HexImage::from_text(b":0400100001020304E2\r\n:0400000508000131BD\r\n:00000001FF\r\n")
                .unwrap_or_default();

        // Act
        let mut image = HexImage::new();
        let res = image.merge_image(&application);
        image.finalize();

        // Assert
        assert!(res.is_ok());
        assert_eq!(
            image.to_text(),
            b":020000040000FA\r\n:0400100001020304E2\r\n:0400000508000131BD\r\n:00000001FF\r\n"
        );
        assert_eq!(image.validate(), application.validate());
    }

    #[test]
    fn test_merge_image_same_start_address_twice() {
        // Arrange
        let application =
            HexImage::from_text(b":0400100001020304E2\r\n:0400000508000131BD\r\n:00000001FF\r\n")
                .unwrap_or_default();
        let mut image = HexImage::new();
        image.push_record(
            Record::parse(b":0400000508000131BD")
                .unwrap_or_else(|err| panic!("Expected a start address record, got {err:?}")),
        );

        // Act
        let res = image.merge_image(&application);
        image.finalize();

        // Assert
        assert!(res.is_ok());
        let start_records = image
            .records
            .iter()
            .filter(|record| record.rtype == RecordType::StartLinearAddress)
            .count();
        assert_eq!(start_records, 1);
        assert!(image.validate().is_ok());
    }

    #[test]
    fn test_merge_image_conflicting_start_address() {
        // Arrange
        let bootloader =
            HexImage::from_text(b":0400000508000131BD\r\n:00000001FF\r\n").unwrap_or_default();
        let application =
            HexImage::from_text(b":0400100001020304E2\r\n:0400000508000141AD\r\n:00000001FF\r\n")
                .unwrap_or_default();
        let mut image = HexImage::new();
        let _ = image.merge_image(&bootloader);
        let records_before = image.records.clone();

        // Act
        let res = image.merge_image(&application);

        // Assert
        assert_eq!(
            res,
            Err(HexError::FormatError(
                FormatErrorKind::DuplicateStartAddress,
                None
            ))
        );
        assert_eq!(image.records, records_before);
    }
}
