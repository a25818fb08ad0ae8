//! Manufacturing tokens: fixed-offset, fixed-size fields in the device's user-data page
//! that are programmed at the factory alongside the bootloader and application.
//!
//! Offsets follow the Series 2 manufacturing token map. The whole user-data page is
//! 2 KiB mapped at [`USERDATA_BASE`].

use crate::error::{FormatErrorKind, HexError, SizeErrorKind};
use crate::hex_image::HexImage;
use crate::record::decode_hex;
use log::debug;

/// Base address of the user-data page (0x0FE00000 - 0x0FE007FF).
pub const USERDATA_BASE: u32 = 0x0FE0_0000;
/// Size of the user-data page in bytes.
pub const USERDATA_SIZE: usize = 0x800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManufacturingToken {
    pub name: &'static str,
    /// Offset within the user-data page
    pub address: u16,
    /// Size in bytes
    pub size: usize,
    /// Value is a NUL-terminated UTF-8 string padded with 0xFF instead of raw hex bytes
    pub string: bool,
}

const fn token(name: &'static str, address: u16, size: usize) -> ManufacturingToken {
    ManufacturingToken {
        name,
        address,
        size,
        string: false,
    }
}

const fn string_token(name: &'static str, address: u16, size: usize) -> ManufacturingToken {
    ManufacturingToken {
        name,
        address,
        size,
        string: true,
    }
}

#[rustfmt::skip]
pub const MANUFACTURING_TOKENS: &[ManufacturingToken] = &[
    token("TOKEN_MFG_EMBER_EUI_64",                      0x1F0,  8),
    token("TOKEN_MFG_CUSTOM_EUI_64",                     0x002,  8),
    token("TOKEN_MFG_CUSTOM_VERSION",                    0x00C,  2),
    string_token("TOKEN_MFG_STRING",                     0x010, 16),
    string_token("TOKEN_MFG_BOARD_NAME",                 0x020, 16),
    token("TOKEN_MFG_MANUF_ID",                          0x030,  2),
    token("TOKEN_MFG_PHY_CONFIG",                        0x034,  2),
    token("TOKEN_MFG_ASH_CONFIG",                        0x038, 40),
    token("TOKEN_MFG_SYNTH_FREQ_OFFSET",                 0x060,  2),
    token("TOKEN_MFG_CCA_THRESHOLD",                     0x064,  2),
    token("TOKEN_MFG_EZSP_STORAGE",                      0x068,  8),
    token("TOKEN_MFG_XO_TUNE",                           0x070,  2),
    token("TOKEN_MFG_ZWAVE_COUNTRY_FREQ",                0x074,  1),
    token("TOKEN_MFG_ZWAVE_HW_VERSION",                  0x078,  1),
    token("TOKEN_MFG_ZWAVE_PSEUDO_RANDOM_NUMBER",        0x07C, 16),
    token("TOKEN_MFG_SERIAL_NUMBER",                     0x08C, 16),
    token("TOKEN_MFG_LFXO_TUNE",                         0x09C,  1),
    token("TOKEN_MFG_CTUNE",                             0x100,  2),
    token("TOKEN_MFG_KIT_SIGNATURE",                     0x104,  4),
];

/// Looks up a token descriptor by name.
///
/// # Errors
/// Returns `LookupError` if the name is not in [`MANUFACTURING_TOKENS`].
///
/// # Example
/// ```
/// use factoryhex::tokens;
///
/// let ctune = tokens::lookup("TOKEN_MFG_CTUNE").unwrap();
/// assert_eq!(ctune.absolute_address(), 0x0FE0_0100);
/// assert!(tokens::lookup("TOKEN_MFG_NOPE").is_err());
/// ```
pub fn lookup(name: &str) -> Result<&'static ManufacturingToken, HexError> {
    MANUFACTURING_TOKENS
        .iter()
        .find(|token| token.name == name)
        .ok_or_else(|| HexError::LookupError(name.to_string()))
}

impl ManufacturingToken {
    /// Physical address of the token inside the user-data page.
    #[must_use]
    pub const fn absolute_address(&self) -> u32 {
        USERDATA_BASE | self.address as u32
    }

    /// Encodes a token value into exactly `size` bytes.
    ///
    /// String tokens are UTF-8 encoded, NUL-terminated and padded with 0xFF.
    /// All other tokens are given as hex strings and must decode to `size` bytes.
    ///
    /// # Errors
    /// - `SizeError` if the value does not fit (strings) or does not match (raw bytes) the size
    /// - `FormatError` if a raw value is not a hex string
    ///
    /// # Example
    /// ```
    /// use factoryhex::tokens;
    ///
    /// let board = tokens::lookup("TOKEN_MFG_BOARD_NAME").unwrap();
    /// let mut expected = b"ABC\x00".to_vec();
    /// expected.extend([0xFF; 12]);
    /// assert_eq!(board.encode("ABC").unwrap(), expected);
    ///
    /// let ctune = tokens::lookup("TOKEN_MFG_CTUNE").unwrap();
    /// assert_eq!(ctune.encode("1234").unwrap(), [0x12, 0x34]);
    /// ```
    pub fn encode(&self, value: &str) -> Result<Vec<u8>, HexError> {
        if self.string {
            // Reserve one byte for the terminator
            let max_len = self.size.saturating_sub(1);
            let text = value.as_bytes();
            if text.len() > max_len {
                return Err(HexError::SizeError(SizeErrorKind::TokenStringTooLong(
                    self.name.to_string(),
                    max_len,
                    text.len(),
                )));
            }

            let mut bytes = Vec::with_capacity(self.size);
            bytes.extend_from_slice(text);
            bytes.push(0x00);
            bytes.resize(self.size, 0xFF);
            return Ok(bytes);
        }

        let bytes = decode_hex(value.trim().as_bytes()).ok_or_else(|| {
            HexError::FormatError(FormatErrorKind::TokenValueNotHex(value.to_string()), None)
        })?;

        if bytes.len() != self.size {
            return Err(HexError::SizeError(SizeErrorKind::TokenSizeMismatch(
                self.name.to_string(),
                self.size,
                bytes.len(),
            )));
        }

        Ok(bytes)
    }
}

/// Encodes every `(name, value)` pair and flashes it at the token's user-data address.
///
/// # Errors
/// Returns the first lookup, encoding or flashing error. Tokens flashed before the
/// failing one stay in the image.
///
/// # Example
/// ```
/// use factoryhex::{HexImage, tokens};
///
/// let mut image = HexImage::new();
/// tokens::flash_tokens(&mut image, [("TOKEN_MFG_CTUNE", "1234")]).unwrap();
/// image.finalize();
///
/// let extents = image.validate().unwrap();
/// assert_eq!(extents[0].start, 0x0FE0_0100);
/// assert_eq!(extents[0].data, [0x12, 0x34]);
/// ```
pub fn flash_tokens<I, N, V>(image: &mut HexImage, tokens: I) -> Result<(), HexError>
where
    I: IntoIterator<Item = (N, V)>,
    N: AsRef<str>,
    V: AsRef<str>,
{
    for (name, value) in tokens {
        let token = lookup(name.as_ref())?;
        let bytes = token.encode(value.as_ref())?;

        debug!(
            "Token {} -> 0x{:08X} ({} bytes)",
            token.name,
            token.absolute_address(),
            bytes.len()
        );
        image.flash_data(token.absolute_address(), &bytes)?;
    }

    Ok(())
}
