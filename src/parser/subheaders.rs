//! Subheader signature table and the nine per-kind handlers (SPEC_FULL §4.4).
//!
//! Handlers take a `&mut ParseContext` rather than holding a reference back
//! to an owning reader, per the design note against cyclic back-references.

use encoding_rs::Encoding;

use crate::error::{Error, Result, Section};
use crate::logger::Logger;
use crate::metadata::{Compression, Properties};
use crate::parser::column::{ColumnBuilder, TextRef, TextStore};
use crate::parser::primitives::read_uint;

/// Which of the nine subheader kinds a signature identifies, or that a
/// pointer should be treated as a packed data subheader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubheaderKind {
    RowSize,
    ColumnSize,
    SubheaderCounts,
    ColumnText,
    ColumnName,
    ColumnAttributes,
    FormatAndLabel,
    ColumnList,
    Data,
}

const SIG_ROW_SIZE_32: u64 = 0xF7F7_F7F7;
const SIG_ROW_SIZE_64: u64 = 0xF7F7_F7F7_0000_0000;
const SIG_COLUMN_SIZE_32: u64 = 0xF6F6_F6F6;
const SIG_COLUMN_SIZE_64: u64 = 0xF6F6_F6F6_0000_0000;
const SIG_SUBHEADER_COUNTS_32: u64 = 0xFFFF_FC00;
const SIG_SUBHEADER_COUNTS_64: u64 = 0xFFFF_FFFF_FFFF_FC00;
const SIG_COLUMN_TEXT_32: u64 = 0xFFFF_FFFD;
const SIG_COLUMN_TEXT_64: u64 = 0xFFFF_FFFF_FFFF_FFFD;
const SIG_COLUMN_NAME_32: u64 = 0xFFFF_FFFF;
const SIG_COLUMN_NAME_64: u64 = 0xFFFF_FFFF_FFFF_FFFF;
const SIG_COLUMN_ATTRS_32: u64 = 0xFFFF_FFFC;
const SIG_COLUMN_ATTRS_64: u64 = 0xFFFF_FFFF_FFFF_FFFC;
const SIG_FORMAT_LABEL_32: u64 = 0xFFFF_FBFE;
const SIG_FORMAT_LABEL_64: u64 = 0xFFFF_FFFF_FFFF_FBFE;
const SIG_COLUMN_LIST_32: u64 = 0xFFFF_FFFE;
const SIG_COLUMN_LIST_64: u64 = 0xFFFF_FFFF_FFFF_FFFE;

/// Reads the 4- or 8-byte signature at the start of a subheader's data slice
/// and classifies it. Returns `None` when the signature matches none of the
/// known kinds and the pointer also fails the data-subheader heuristic.
#[must_use]
pub fn identify(data: &[u8], properties: &Properties, compression: i8, subheader_type: i8) -> Option<SubheaderKind> {
    let sig_len = properties.int_size();
    if data.len() < sig_len {
        return None;
    }
    let signature = read_uint(&data[..sig_len], properties.endianness);

    let kind = if properties.u64 {
        match signature {
            SIG_ROW_SIZE_64 => Some(SubheaderKind::RowSize),
            SIG_COLUMN_SIZE_64 => Some(SubheaderKind::ColumnSize),
            SIG_SUBHEADER_COUNTS_64 => Some(SubheaderKind::SubheaderCounts),
            SIG_COLUMN_TEXT_64 => Some(SubheaderKind::ColumnText),
            SIG_COLUMN_NAME_64 => Some(SubheaderKind::ColumnName),
            SIG_COLUMN_ATTRS_64 => Some(SubheaderKind::ColumnAttributes),
            SIG_FORMAT_LABEL_64 => Some(SubheaderKind::FormatAndLabel),
            SIG_COLUMN_LIST_64 => Some(SubheaderKind::ColumnList),
            _ => None,
        }
    } else {
        match signature {
            SIG_ROW_SIZE_32 => Some(SubheaderKind::RowSize),
            SIG_COLUMN_SIZE_32 => Some(SubheaderKind::ColumnSize),
            SIG_SUBHEADER_COUNTS_32 => Some(SubheaderKind::SubheaderCounts),
            SIG_COLUMN_TEXT_32 => Some(SubheaderKind::ColumnText),
            SIG_COLUMN_NAME_32 => Some(SubheaderKind::ColumnName),
            SIG_COLUMN_ATTRS_32 => Some(SubheaderKind::ColumnAttributes),
            SIG_FORMAT_LABEL_32 => Some(SubheaderKind::FormatAndLabel),
            SIG_COLUMN_LIST_32 => Some(SubheaderKind::ColumnList),
            _ => None,
        }
    };

    kind.or_else(|| {
        let is_data = properties.compression != Compression::None
            && matches!(compression, 4 | 0)
            && subheader_type == 1;
        is_data.then_some(SubheaderKind::Data)
    })
}

/// Tracks which RowSize/ColumnSize fields have already been set, so a
/// duplicate subheader is caught field-by-field rather than as one coarse
/// "seen this subheader before" flag.
#[derive(Debug, Default)]
pub struct SeenFlags {
    pub row_size: bool,
    pub column_size: bool,
    pub col_count_p1: bool,
    pub col_count_p2: bool,
    pub mix_page_row_count: bool,
}

/// Mutable state threaded through subheader handlers, avoiding a back-pointer
/// to an owning reader.
pub struct ParseContext<'a> {
    pub properties: &'a mut Properties,
    pub text_store: &'a mut TextStore,
    pub columns: &'a mut ColumnBuilder,
    pub logger: &'a mut Logger,
    pub seen: &'a mut SeenFlags,
    pub encoding: &'static Encoding,
}

fn field<'a>(data: &'a [u8], start: usize, len: usize, kind: &'static str) -> Result<&'a [u8]> {
    data.get(start..start + len).ok_or_else(|| Error::ShortRead {
        section: Section::subheader(kind),
    })
}

fn read_field_uint(data: &[u8], start: usize, len: usize, properties: &Properties, kind: &'static str) -> Result<u64> {
    Ok(read_uint(field(data, start, len, kind)?, properties.endianness))
}

/// RowSize subheader: row geometry, mix-page capacity, creator-string
/// lengths. Each field may only be set once across the whole file.
pub fn handle_row_size(ctx: &mut ParseContext<'_>, data: &[u8]) -> Result<()> {
    let l = ctx.properties.int_size();
    if ctx.seen.row_size {
        return Err(Error::DuplicateRowSize);
    }
    ctx.seen.row_size = true;

    ctx.properties.row_length = read_field_uint(data, 5 * l, l, ctx.properties, "RowSize")?;
    ctx.properties.row_count = read_field_uint(data, 6 * l, l, ctx.properties, "RowSize")?;

    if ctx.seen.mix_page_row_count {
        return Err(Error::DuplicateMixPageRowCount);
    }
    ctx.seen.mix_page_row_count = true;
    let mix_page_row_count = read_field_uint(data, 15 * l, l, ctx.properties, "RowSize")? as i64;
    ctx.properties.mix_page_row_count = Some(mix_page_row_count);

    if ctx.seen.col_count_p1 {
        return Err(Error::DuplicateColCountP1);
    }
    ctx.seen.col_count_p1 = true;
    ctx.properties.col_count_p1 = Some(read_field_uint(data, 9 * l, l, ctx.properties, "RowSize")?);

    if ctx.seen.col_count_p2 {
        return Err(Error::DuplicateColCountP2);
    }
    ctx.seen.col_count_p2 = true;
    ctx.properties.col_count_p2 = Some(read_field_uint(data, 10 * l, l, ctx.properties, "RowSize")?);

    let lcs_offset = if ctx.properties.u64 { 682 } else { 354 };
    let lcp_offset = if ctx.properties.u64 { 706 } else { 378 };
    ctx.properties.lcs = read_field_uint(data, lcs_offset, 2, ctx.properties, "RowSize")? as u16;
    ctx.properties.lcp = read_field_uint(data, lcp_offset, 2, ctx.properties, "RowSize")? as u16;
    Ok(())
}

/// ColumnSize subheader: total column count.
pub fn handle_column_size(ctx: &mut ParseContext<'_>, data: &[u8]) -> Result<()> {
    let l = ctx.properties.int_size();
    if ctx.seen.column_size {
        return Err(Error::DuplicateColumnSize);
    }
    ctx.seen.column_size = true;
    ctx.properties.column_count = read_field_uint(data, l, l, ctx.properties, "ColumnSize")?;
    Ok(())
}

fn contains_subsequence(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0 || b == b' ')
}

/// ColumnText subheader: appends one text blob to the pool; the first blob
/// additionally carries the compression signature and creator strings.
pub fn handle_column_text(ctx: &mut ParseContext<'_>, data: &[u8]) -> Result<()> {
    let l = ctx.properties.int_size();
    let block_size = read_field_uint(data, l, 2, ctx.properties, "ColumnText")? as usize;
    let blob = field(data, l + 2, block_size, "ColumnText")?.to_vec();
    let is_first = ctx.text_store.is_empty();
    ctx.text_store.push_blob(blob.clone());

    if is_first {
        if contains_subsequence(&blob, b"SASYZCRL") {
            ctx.properties.compression = Compression::Rle;
        } else if contains_subsequence(&blob, b"SASYZCR2") {
            ctx.properties.compression = Compression::Rdc;
        }

        let sig_field_offset = if ctx.properties.u64 { 20 } else { 16 };
        if let Ok(sig_field) = field(data, sig_field_offset, 8, "ColumnText") {
            if is_blank(sig_field) {
                ctx.properties.lcs = 0;
                let start = sig_field_offset + 16;
                if let Ok(bytes) = field(data, start, ctx.properties.lcp as usize, "ColumnText") {
                    ctx.properties.creator_proc = crate::parser::primitives::read_text(bytes, ctx.encoding);
                }
            } else if sig_field == b"SASYZCRL" {
                let start = sig_field_offset + 24;
                if let Ok(bytes) = field(data, start, ctx.properties.lcp as usize, "ColumnText") {
                    ctx.properties.creator_proc = crate::parser::primitives::read_text(bytes, ctx.encoding);
                }
            } else if ctx.properties.lcs > 0 {
                ctx.properties.lcp = 0;
                if let Ok(bytes) = field(data, sig_field_offset, ctx.properties.lcs as usize, "ColumnText") {
                    ctx.properties.creator = crate::parser::primitives::read_text(bytes, ctx.encoding);
                }
            }
        }
    }
    Ok(())
}

/// ColumnName subheader: one 8-byte pointer record per column, each naming a
/// `TextRef` into the text pool.
pub fn handle_column_name(ctx: &mut ParseContext<'_>, data: &[u8]) -> Result<()> {
    let l = ctx.properties.int_size();
    if data.len() < 2 * l + 12 {
        return Ok(());
    }
    let count = (data.len() - 2 * l - 12) / 8;
    let base = l + 8;
    for i in 0..count {
        let record = field(data, base + i * 8, 8, "ColumnName")?;
        let text_index = read_uint(&record[0..2], ctx.properties.endianness) as u16;
        let name_offset = read_uint(&record[2..4], ctx.properties.endianness) as u16;
        let name_length = read_uint(&record[4..6], ctx.properties.endianness) as u16;
        ctx.columns.names.push(TextRef {
            index: text_index,
            offset: name_offset,
            length: name_length,
        });
    }
    Ok(())
}

/// ColumnAttributes subheader: one record per column with data offset,
/// length, and semantic type.
pub fn handle_column_attributes(ctx: &mut ParseContext<'_>, data: &[u8]) -> Result<()> {
    let l = ctx.properties.int_size();
    let record_len = l + 8;
    if data.len() < 2 * l + 12 {
        return Ok(());
    }
    let count = (data.len() - 2 * l - 12) / record_len;
    let base = l + 8;
    for i in 0..count {
        let record = field(data, base + i * record_len, record_len, "ColumnAttributes")?;
        let data_offset = read_uint(&record[0..l], ctx.properties.endianness);
        let data_length = read_uint(&record[l..l + 4], ctx.properties.endianness) as u32;
        let type_byte = record[l + 4];
        let column_type = if type_byte == 2 {
            crate::metadata::ColumnType::String
        } else {
            crate::metadata::ColumnType::Number
        };
        ctx.columns.data_offsets.push(data_offset);
        ctx.columns.data_lengths.push(data_length);
        ctx.columns.types.push(column_type);
    }
    Ok(())
}

/// FormatAndLabel subheader: materializes one `Column` from previously
/// accumulated name/attribute state plus this subheader's format and label.
pub fn handle_format_and_label(ctx: &mut ParseContext<'_>, data: &[u8]) -> Result<()> {
    let l = ctx.properties.int_size();
    let base = 3 * l;
    let record = field(data, base, 12, "FormatAndLabel")?;
    let max_index = ctx.text_store.len().saturating_sub(1) as u16;

    let format_text_index = (read_uint(&record[0..2], ctx.properties.endianness) as u16).min(max_index);
    let format_offset = read_uint(&record[2..4], ctx.properties.endianness) as u16;
    let format_length = read_uint(&record[4..6], ctx.properties.endianness) as u16;
    let label_text_index = (read_uint(&record[6..8], ctx.properties.endianness) as u16).min(max_index);
    let label_offset = read_uint(&record[8..10], ctx.properties.endianness) as u16;
    let label_length = read_uint(&record[10..12], ctx.properties.endianness) as u16;

    let position = ctx.columns.columns.len();
    ctx.columns.finalize_column(
        position,
        ctx.text_store,
        ctx.encoding,
        TextRef {
            index: format_text_index,
            offset: format_offset,
            length: format_length,
        },
        TextRef {
            index: label_text_index,
            offset: label_offset,
            length: label_length,
        },
    )
}
