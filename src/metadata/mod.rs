use time::OffsetDateTime;

/// Byte order of integer and floating-point fields in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Producing platform family, read from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    Unix,
    Windows,
    #[default]
    Unknown,
}

/// Row compression scheme declared by the first ColumnText subheader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Rle,
    Rdc,
}

/// Semantic type of a column's stored bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Number,
    String,
}

/// File-level properties populated during header parsing and metadata walking.
#[derive(Debug, Clone)]
pub struct Properties {
    pub u64: bool,
    pub endianness: Endianness,
    pub platform: Platform,
    pub header_length: u32,
    pub page_length: u32,
    pub page_count: u64,

    pub row_length: u64,
    pub row_count: u64,
    pub column_count: u64,

    pub col_count_p1: Option<u64>,
    pub col_count_p2: Option<u64>,
    pub mix_page_row_count: Option<i64>,

    pub lcs: u16,
    pub lcp: u16,

    pub compression: Compression,

    pub name: String,
    pub file_type: String,
    pub date_created: Option<OffsetDateTime>,
    pub date_modified: Option<OffsetDateTime>,
    pub sas_release: String,
    pub server_type: String,
    pub os_type: String,
    pub os_name: String,
    pub creator: String,
    pub creator_proc: String,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            u64: false,
            endianness: Endianness::Little,
            platform: Platform::Unknown,
            header_length: 0,
            page_length: 0,
            page_count: 0,
            row_length: 0,
            row_count: 0,
            column_count: 0,
            col_count_p1: None,
            col_count_p2: None,
            mix_page_row_count: None,
            lcs: 0,
            lcp: 0,
            compression: Compression::None,
            name: String::new(),
            file_type: String::new(),
            date_created: None,
            date_modified: None,
            sas_release: String::new(),
            server_type: String::new(),
            os_type: String::new(),
            os_name: String::new(),
            creator: String::new(),
            creator_proc: String::new(),
        }
    }
}

impl Properties {
    /// Size in bytes of the integer fields in this layout (4 for 32-bit, 8 for 64-bit).
    #[must_use]
    pub const fn int_size(&self) -> usize {
        if self.u64 { 8 } else { 4 }
    }

    /// Size in bytes of a subheader pointer record.
    #[must_use]
    pub const fn subheader_pointer_size(&self) -> usize {
        if self.u64 { 24 } else { 12 }
    }

    /// Offset of the page-header fields (type/block count/subheader count)
    /// within a page.
    #[must_use]
    pub const fn page_bit_offset(&self) -> usize {
        if self.u64 { 32 } else { 16 }
    }
}

/// A single column's schema: name, label, format, semantic type and byte width.
#[derive(Debug, Clone)]
pub struct Column {
    pub index: usize,
    pub name: String,
    pub label: String,
    pub format: String,
    pub column_type: ColumnType,
    pub offset: u64,
    pub length: u32,
}
