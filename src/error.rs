use std::borrow::Cow;
use std::io;

/// Result type used across the reader.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced while decoding a SAS7BDAT stream.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure while reading from the underlying byte source.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The first 32 bytes did not match the SAS7BDAT magic number.
    #[error("not a SAS7BDAT file: bad magic number")]
    BadMagic,

    /// Fewer than 288 bytes were available for the fixed header region.
    #[error("header truncated: expected at least 288 bytes")]
    HeaderTooShort,

    /// A read returned fewer bytes than requested.
    #[error("short read while processing {section}")]
    ShortRead { section: Section },

    /// A page did not contain the full `page_length` bytes declared by the header.
    #[error("incomplete page {index}: expected {expected} bytes, got {actual}")]
    IncompleteRead {
        index: u64,
        expected: usize,
        actual: usize,
    },

    /// More than one RowSize subheader was encountered.
    #[error("duplicate RowSize subheader")]
    DuplicateRowSize,

    /// More than one ColumnSize subheader was encountered.
    #[error("duplicate ColumnSize subheader")]
    DuplicateColumnSize,

    /// The RowSize subheader's `col_count_p1` field was set twice.
    #[error("duplicate column count (part 1) in RowSize subheader")]
    DuplicateColCountP1,

    /// The RowSize subheader's `col_count_p2` field was set twice.
    #[error("duplicate column count (part 2) in RowSize subheader")]
    DuplicateColCountP2,

    /// The RowSize subheader's `mix_page_row_count` field was set twice.
    #[error("duplicate mix-page row count in RowSize subheader")]
    DuplicateMixPageRowCount,

    /// An RLE control byte's high nibble did not match any known operation.
    #[error("unknown RLE control byte 0x{byte:02X} in page {page_index}")]
    UnknownControlByte { page_index: u64, byte: u8 },

    /// A decompressed row did not equal the declared `row_length`.
    #[error("decompressed row {row_index} has length {actual}, expected {expected}")]
    DecompressedLengthMismatch {
        row_index: u64,
        expected: usize,
        actual: usize,
    },

    /// The current page's type is not one this reader knows how to consume.
    #[error("unknown page type 0x{page_type:04X} at page {index}")]
    UnknownPageType { index: u64, page_type: u16 },

    /// Metadata could not be interpreted according to the format's invariants.
    #[error("invalid SAS7BDAT metadata: {details}")]
    InvalidMetadata { details: Cow<'static, str> },

    /// The file declares a compression scheme this reader does not implement.
    #[error("unsupported compression scheme: {scheme}")]
    UnsupportedCompression { scheme: Cow<'static, str> },

    /// The configured `encoding` option does not name a known character set.
    #[error("unrecognized encoding label {label:?}")]
    UnknownEncoding { label: String },
}

/// Logical section of the file being processed, attached to errors for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Header,
    Page { index: u64 },
    Subheader { kind: &'static str },
    Row { index: u64 },
    Column { index: u32 },
}

impl Section {
    /// Helper constructor for subheader-field sections, named by which kind
    /// of subheader the field belongs to.
    #[must_use]
    pub const fn subheader(kind: &'static str) -> Self {
        Self::Subheader { kind }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Header => write!(f, "file header"),
            Self::Page { index } => write!(f, "page {index}"),
            Self::Subheader { kind } => write!(f, "{kind} subheader"),
            Self::Row { index } => write!(f, "row {index}"),
            Self::Column { index } => write!(f, "column {index}"),
        }
    }
}
