//! # Iconvert - Character Encoding Conversion over Platform iconv
//!
//! A safe wrapper around the platform's iconv subsystem for converting
//! in-memory byte sequences between named character encodings.
//!
//! ## Features
//!
//! - **Any encoding the platform knows** - GBK, UTF-8, UTF-16LE, UTF-32LE,
//!   ASCII and everything else the host iconv implementation supports
//! - **Reusable converters** - one descriptor per encoding pair, converted
//!   through as many times as needed
//! - **No panics across the public surface** - every failure is returned
//!   as a structured error carrying the raw subsystem errno
//! - **Exact partial-progress accounting** - output is assembled from
//!   fixed-size scratch refills with no gaps or duplicates
//!
//! ## Quick Start
//!
//! ```rust
//! use iconvert::Converter;
//!
//! // Create a converter from UTF-8 to GBK
//! let mut converter = Converter::new("UTF-8", "GBK").unwrap();
//!
//! // "你好" in GBK
//! let gbk = converter.convert("你好".as_bytes()).unwrap();
//! assert_eq!(gbk, [0xC4, 0xE3, 0xBA, 0xC3]);
//! ```

#![deny(missing_docs)]

use std::fmt;

use serde::Serialize;

mod sys;

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Default scratch buffer size, in bytes.
///
/// The scratch size is a throughput knob, not a correctness parameter:
/// any size of at least one byte produces identical output, it only
/// changes how many refill rounds a conversion takes.
pub const DEFAULT_SCRATCH_LEN: usize = 10;

/// Errors that can occur while acquiring a converter or converting
///
/// Every variant retains the raw errno reported by the iconv subsystem,
/// available through [`Error::raw_os_error`] for diagnostic parity with
/// the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Error {
    /// The subsystem does not recognize one of the encoding names
    UnsupportedEncoding {
        /// Requested source encoding name
        from: String,
        /// Requested target encoding name
        to: String,
        /// Raw errno from the acquisition call
        code: i32,
    },
    /// The subsystem could not allocate the conversion descriptor
    OutOfMemory {
        /// Raw errno from the acquisition call
        code: i32,
    },
    /// Descriptor acquisition failed for an unclassified reason
    OpenFailed {
        /// Raw errno from the acquisition call
        code: i32,
    },
    /// The input contains a byte sequence that is not valid in the
    /// source encoding
    InvalidSequence {
        /// Raw errno from the conversion step
        code: i32,
    },
    /// The input ends in the middle of a multibyte sequence
    IncompleteSequence {
        /// Raw errno from the conversion step
        code: i32,
    },
    /// A conversion step failed for an unclassified reason
    ConversionFailed {
        /// Raw errno from the conversion step
        code: i32,
    },
}

impl Error {
    /// The raw errno the iconv subsystem reported for this error.
    ///
    /// The value is platform-defined; the enum variant is the portable
    /// classification.
    pub fn raw_os_error(&self) -> i32 {
        match *self {
            Error::UnsupportedEncoding { code, .. }
            | Error::OutOfMemory { code }
            | Error::OpenFailed { code }
            | Error::InvalidSequence { code }
            | Error::IncompleteSequence { code }
            | Error::ConversionFailed { code } => code,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedEncoding { from, to, code } => {
                write!(
                    f,
                    "unsupported encoding conversion from {} to {} (errno {})",
                    from, to, code
                )
            }
            Error::OutOfMemory { code } => {
                write!(
                    f,
                    "out of memory while acquiring conversion descriptor (errno {})",
                    code
                )
            }
            Error::OpenFailed { code } => {
                write!(f, "failed to acquire conversion descriptor (errno {})", code)
            }
            Error::InvalidSequence { code } => {
                write!(
                    f,
                    "input contains a byte sequence that is invalid in the source encoding (errno {})",
                    code
                )
            }
            Error::IncompleteSequence { code } => {
                write!(
                    f,
                    "input ends with an incomplete multibyte sequence (errno {})",
                    code
                )
            }
            Error::ConversionFailed { code } => {
                write!(f, "conversion failed with an unknown error (errno {})", code)
            }
        }
    }
}

impl std::error::Error for Error {}

/// Reusable converter bound to one (source, target) encoding pair
///
/// A `Converter` owns a unique iconv descriptor: the type cannot be
/// cloned, ownership transfers on move, and the descriptor is released
/// exactly once when the converter is dropped, on every path.
///
/// A converter is `Send` but conversion takes `&mut self`; for
/// concurrent work use one converter per thread or the one-shot
/// [`convert`] function.
pub struct Converter {
    cd: sys::Descriptor,
    from: String,
    to: String,
    scratch_len: usize,
}

impl Converter {
    /// Create a converter from `from` into `to` with the default
    /// scratch size
    ///
    /// Encoding names are passed to the platform subsystem verbatim;
    /// anything it recognizes ("UTF-8", "GBK", "UTF-16LE", ...) works.
    pub fn new(from: &str, to: &str) -> Result<Self> {
        Self::with_scratch_len(from, to, DEFAULT_SCRATCH_LEN)
    }

    /// Create a converter with an explicit scratch buffer size
    ///
    /// Sizes below one byte are treated as one. Larger scratch buffers
    /// mean fewer refill rounds for the same output.
    pub fn with_scratch_len(from: &str, to: &str, scratch_len: usize) -> Result<Self> {
        let cd = sys::Descriptor::open(from, to).map_err(|code| classify_open(from, to, code))?;
        Ok(Self {
            cd,
            from: from.to_string(),
            to: to.to_string(),
            scratch_len: scratch_len.max(1),
        })
    }

    /// Source encoding name this converter was created with
    pub fn from_encoding(&self) -> &str {
        &self.from
    }

    /// Target encoding name this converter was created with
    pub fn to_encoding(&self) -> &str {
        &self.to
    }

    /// Convert `input` from the source into the target encoding
    ///
    /// On success the returned buffer holds the complete converted
    /// output. On failure nothing of the partial output is returned;
    /// the error carries the classification and the raw errno. The
    /// converter stays usable for further calls either way.
    pub fn convert(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        drain(&mut self.cd, input, self.scratch_len)
    }
}

/// One-shot conversion of `input` from `from` into `to`
///
/// Acquires a converter internally and releases it before returning,
/// on every path. Equivalent to [`Converter::convert`] for callers that
/// do not need to reuse the descriptor.
///
/// ```rust
/// let utf16 = iconvert::convert(b"Hi", "UTF-8", "UTF-16LE").unwrap();
/// assert_eq!(utf16, [0x48, 0x00, 0x69, 0x00]);
/// ```
pub fn convert(input: &[u8], from: &str, to: &str) -> Result<Vec<u8>> {
    let mut converter = Converter::new(from, to)?;
    converter.convert(input)
}

/// Version of this crate as a dotted `major.minor.patch` string
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

fn classify_open(from: &str, to: &str, code: i32) -> Error {
    match code {
        libc::EINVAL => Error::UnsupportedEncoding {
            from: from.to_string(),
            to: to.to_string(),
            code,
        },
        libc::ENOMEM => Error::OutOfMemory { code },
        _ => Error::OpenFailed { code },
    }
}

/// The buffer-draining loop shared by the one-shot and reusable paths.
///
/// Feeds the remaining input window through the subsystem one scratch
/// buffer at a time, appending whatever each step produced before
/// looking at why the step stopped. A full scratch buffer is the
/// expected steady state, not an error; only malformed input halts the
/// loop.
fn drain(cd: &mut sys::Descriptor, input: &[u8], scratch_len: usize) -> Result<Vec<u8>> {
    let mut scratch = vec![0u8; scratch_len];
    let mut output = Vec::with_capacity(input.len());
    let mut pos = 0;

    while pos < input.len() {
        let step = cd.step(&input[pos..], &mut scratch);
        output.extend_from_slice(&scratch[..step.written]);
        pos += step.consumed;

        match step.stop {
            None => {}
            Some(libc::E2BIG) => {
                // A single output unit can be wider than the scratch;
                // grow until one fits, otherwise the loop cannot advance.
                if step.consumed == 0 && step.written == 0 {
                    let grown = scratch.len() * 2;
                    scratch.resize(grown, 0);
                }
            }
            Some(libc::EILSEQ) => return Err(Error::InvalidSequence { code: libc::EILSEQ }),
            Some(libc::EINVAL) => {
                return Err(Error::IncompleteSequence { code: libc::EINVAL });
            }
            Some(code) => return Err(Error::ConversionFailed { code }),
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_to_gbk() {
        let mut converter = Converter::new("UTF-8", "GBK").unwrap();

        // "你好" in GBK
        let output = converter.convert("你好".as_bytes()).unwrap();
        assert_eq!(output, [0xC4, 0xE3, 0xBA, 0xC3]);
    }

    #[test]
    fn test_gbk_to_utf8() {
        let mut converter = Converter::new("GBK", "UTF-8").unwrap();

        let output = converter.convert(&[0xC4, 0xE3, 0xBA, 0xC3]).unwrap();
        assert_eq!(output, "你好".as_bytes());
    }

    #[test]
    fn test_utf8_gbk_round_trip() {
        let original = "Hello 世界! 这是一个UTF-8字符串。123 ABC abc";

        let gbk = convert(original.as_bytes(), "UTF-8", "GBK").unwrap();
        let back = convert(&gbk, "GBK", "UTF-8").unwrap();

        assert_eq!(back, original.as_bytes());
    }

    #[test]
    fn test_utf8_to_utf16le_exact_bytes() {
        let output = convert("A€".as_bytes(), "UTF-8", "UTF-16LE").unwrap();
        assert_eq!(output, [0x41, 0x00, 0xAC, 0x20]);
    }

    #[test]
    fn test_utf8_utf32le_round_trip() {
        let output = convert(b"A", "UTF-8", "UTF-32LE").unwrap();
        assert_eq!(output, [0x41, 0x00, 0x00, 0x00]);

        let original = "Hello 世界 🌍";
        let utf32 = convert(original.as_bytes(), "UTF-8", "UTF-32LE").unwrap();
        assert_eq!(utf32.len(), original.chars().count() * 4);
        let back = convert(&utf32, "UTF-32LE", "UTF-8").unwrap();
        assert_eq!(back, original.as_bytes());
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        assert_eq!(convert(b"", "UTF-8", "GBK").unwrap(), Vec::<u8>::new());

        let mut converter = Converter::new("UTF-16LE", "UTF-8").unwrap();
        assert_eq!(converter.convert(b"").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_unsupported_source_encoding() {
        let err = convert(b"anything", "INVALID_ENCODING", "UTF-8").unwrap_err();
        assert!(matches!(err, Error::UnsupportedEncoding { .. }));
        assert_ne!(err.raw_os_error(), 0);
    }

    #[test]
    fn test_unsupported_target_encoding() {
        let err = convert(b"anything", "UTF-8", "INVALID_ENCODING").unwrap_err();
        match err {
            Error::UnsupportedEncoding {
                ref from,
                ref to,
                code,
            } => {
                assert_eq!(from, "UTF-8");
                assert_eq!(to, "INVALID_ENCODING");
                assert_ne!(code, 0);
            }
            other => panic!("expected UnsupportedEncoding, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_sequence_classification() {
        // 0xFF can never start a UTF-8 sequence
        let err = convert(&[0xFF, 0x28], "UTF-8", "GBK").unwrap_err();
        assert_eq!(err, Error::InvalidSequence { code: libc::EILSEQ });
    }

    #[test]
    fn test_incomplete_sequence_classification() {
        // First two bytes of the three-byte encoding of '你'
        let err = convert(&[0xE4, 0xBD], "UTF-8", "GBK").unwrap_err();
        assert_eq!(err, Error::IncompleteSequence { code: libc::EINVAL });
    }

    #[test]
    fn test_odd_length_utf16_is_incomplete() {
        let err = convert(&[0x48, 0x00, 0x69], "UTF-16LE", "UTF-8").unwrap_err();
        assert!(matches!(err, Error::IncompleteSequence { .. }));
    }

    #[test]
    fn test_converter_reuse_across_calls() {
        let mut converter = Converter::new("UTF-8", "GBK").unwrap();

        let inputs = ["第一次转换", "第二次转换 with English", "第三次转换 123!@#"];
        for input in inputs {
            let gbk = converter.convert(input.as_bytes()).unwrap();
            let back = convert(&gbk, "GBK", "UTF-8").unwrap();
            assert_eq!(back, input.as_bytes());
        }
    }

    #[test]
    fn test_converter_usable_after_failed_call() {
        let mut converter = Converter::new("UTF-8", "GBK").unwrap();

        assert!(converter.convert(&[0xFF]).is_err());
        assert_eq!(converter.convert(b"abc").unwrap(), b"abc");
    }

    fn pass_through(converter: Converter) -> Converter {
        converter
    }

    #[test]
    fn test_converter_survives_moves() {
        let converter = Converter::new("UTF-8", "UTF-16LE").unwrap();

        let mut held = Vec::new();
        held.push(pass_through(converter));
        let mut converter = held.pop().unwrap();

        assert_eq!(converter.convert(b"A").unwrap(), [0x41, 0x00]);
        assert_eq!(converter.from_encoding(), "UTF-8");
        assert_eq!(converter.to_encoding(), "UTF-16LE");
    }

    #[test]
    fn test_many_converters_created_and_dropped() {
        let mut converters: Vec<Converter> = (0..64)
            .map(|_| Converter::new("UTF-8", "GBK").unwrap())
            .collect();

        for converter in &mut converters {
            assert_eq!(converter.convert("好".as_bytes()).unwrap(), [0xBA, 0xC3]);
        }
        // all 64 descriptors are released here
    }

    #[test]
    fn test_output_is_independent_of_scratch_size() {
        let input = "Hello 世界! mixed 内容 with ascii 123. ".repeat(8);
        let expected = convert(input.as_bytes(), "UTF-8", "UTF-16LE").unwrap();

        for scratch_len in [1, 2, 3, 10, 4096] {
            let mut converter =
                Converter::with_scratch_len("UTF-8", "UTF-16LE", scratch_len).unwrap();
            assert_eq!(converter.convert(input.as_bytes()).unwrap(), expected);
        }
    }

    #[test]
    fn test_long_input_spanning_many_refills() {
        let original = "All work and no play 使人迟钝. ".repeat(512);

        let gbk = convert(original.as_bytes(), "UTF-8", "GBK").unwrap();
        assert!(gbk.len() > DEFAULT_SCRATCH_LEN * 100);
        let back = convert(&gbk, "GBK", "UTF-8").unwrap();
        assert_eq!(back, original.as_bytes());
    }

    #[test]
    fn test_version_is_three_dotted_parts() {
        let parts: Vec<&str> = version().split('.').collect();
        assert_eq!(parts.len(), 3);
        for part in parts {
            part.parse::<u32>().unwrap();
        }
    }
}
