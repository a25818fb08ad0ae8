//! # `factoryhex`
//!
//! `factoryhex` is a Rust library for assembling factory firmware images in the Intel HEX
//! format: a bootloader, an application and a block of manufacturing tokens merged into one
//! file that a production programmer flashes in a single pass.
//!
//! The library provides:
//! - Record codec for single Intel HEX lines (via [`Record`]).
//! - Record stream model that flashes byte buffers at absolute addresses and validates
//!   the result (via [`HexImage`]).
//! - Manufacturing token table and encoding (via [`tokens`]).
//! - Hex dump of the validated image (via [`dump`]).
//! - Error handling with [`HexError`].
//!
//! ## Example
//!
//! ```
//! use factoryhex::{HexImage, tokens};
//!
//! let mut image = HexImage::new();
//! image.flash_data(0x0000_0000, &[0xAA; 32]).unwrap();
//! image.flash_data(0x0000_8000, &[0xBB; 64]).unwrap();
//! tokens::flash_tokens(&mut image, [("TOKEN_MFG_CTUNE", "1234")]).unwrap();
//! image.finalize();
//!
//! let extents = image.validate().unwrap();
//! assert_eq!(extents.len(), 3);
//!
//! let text = image.to_text();
//! assert!(text.ends_with(b":00000001FF\r\n"));
//! ```

pub mod dump;
mod error;
mod hex_image;
mod record;
pub mod tokens;

// Public APIs
pub use error::{FormatErrorKind, HexError, SizeErrorKind};
pub use hex_image::{Extent, HexImage, LineEnding};
pub use record::{Record, RecordType};
