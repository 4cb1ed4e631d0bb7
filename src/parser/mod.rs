//! Binary-format decoder: header, pages, metadata subheaders, RLE
//! decompression, and the primitives they all share.

pub mod column;
pub mod header;
pub mod page;
pub mod primitives;
pub mod rle;
pub mod subheaders;

use std::io::{Read, Seek, SeekFrom};

use encoding_rs::Encoding;

use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::metadata::{Column, Properties};
use column::{ColumnBuilder, TextStore};
use page::{read_page_header, read_subheader_pointers};
use subheaders::{identify, ParseContext, SeenFlags, SubheaderKind};

/// Schema resulting from walking every metadata page: file-level properties
/// plus the ordered column list.
pub struct ParsedMetadata {
    pub properties: Properties,
    pub columns: Vec<Column>,
}

struct CollectedSubheader {
    kind: SubheaderKind,
    data: Vec<u8>,
}

fn read_page<R: Read + Seek>(
    reader: &mut R,
    properties: &Properties,
    page_index: u64,
    buffer: &mut [u8],
) -> Result<()> {
    let offset = u64::from(properties.header_length) + page_index * u64::from(properties.page_length);
    reader.seek(SeekFrom::Start(offset))?;

    let mut total_read = 0usize;
    while total_read < buffer.len() {
        let n = reader.read(&mut buffer[total_read..])?;
        if n == 0 {
            break;
        }
        total_read += n;
    }
    if total_read < buffer.len() {
        return Err(Error::IncompleteRead {
            index: page_index,
            expected: buffer.len(),
            actual: total_read,
        });
    }
    Ok(())
}

/// Walks the header and every metadata page, returning the fully resolved
/// schema. Row data subheaders are skipped here; row decoding re-reads
/// DATA/MIX pages lazily as the row stream advances (SPEC_FULL §5).
///
/// # Errors
///
/// Returns an error if the header is malformed, a page is short, or the
/// subheaders violate the format's structural invariants (duplicate RowSize,
/// mismatched column counts beyond a warning, ...).
pub fn parse_metadata<R: Read + Seek>(
    reader: &mut R,
    encoding: &'static Encoding,
    logger: &mut Logger,
) -> Result<ParsedMetadata> {
    let mut properties = header::parse_header(reader, encoding)?;

    let mut collected: Vec<CollectedSubheader> = Vec::new();
    let mut page_buf = vec![0u8; properties.page_length as usize];

    for page_index in 0..properties.page_count {
        read_page(reader, &properties, page_index, &mut page_buf)?;

        let page_header = read_page_header(&page_buf, &properties, page_index)?;
        if !page_header.page_type.carries_subheaders() {
            continue;
        }
        let pointers = read_subheader_pointers(&page_buf, &properties, &page_header, page_index)?;
        for pointer in pointers {
            let end = pointer.offset + pointer.length;
            if end > page_buf.len() {
                continue;
            }
            let data = &page_buf[pointer.offset..end];
            match identify(data, &properties, pointer.compression, pointer.subheader_type) {
                Some(SubheaderKind::Data) => {}
                Some(kind) => collected.push(CollectedSubheader {
                    kind,
                    data: data.to_vec(),
                }),
                None => {
                    logger.debug(format_args!(
                        "unknown subheader signature on page {page_index}"
                    ));
                }
            }
        }
    }

    let mut text_store = TextStore::default();
    let mut columns = ColumnBuilder::default();
    let mut seen = SeenFlags::default();

    {
        let mut ctx = ParseContext {
            properties: &mut properties,
            text_store: &mut text_store,
            columns: &mut columns,
            logger,
            seen: &mut seen,
            encoding,
        };

        for item in collected.iter().filter(|c| c.kind == SubheaderKind::RowSize) {
            subheaders::handle_row_size(&mut ctx, &item.data)?;
        }
        for item in collected.iter().filter(|c| c.kind == SubheaderKind::ColumnSize) {
            subheaders::handle_column_size(&mut ctx, &item.data)?;
        }
        for item in collected.iter().filter(|c| c.kind == SubheaderKind::ColumnText) {
            subheaders::handle_column_text(&mut ctx, &item.data)?;
        }
        for item in collected.iter().filter(|c| c.kind == SubheaderKind::ColumnName) {
            subheaders::handle_column_name(&mut ctx, &item.data)?;
        }
        for item in collected
            .iter()
            .filter(|c| c.kind == SubheaderKind::ColumnAttributes)
        {
            subheaders::handle_column_attributes(&mut ctx, &item.data)?;
        }
        for item in collected
            .iter()
            .filter(|c| c.kind == SubheaderKind::FormatAndLabel)
        {
            subheaders::handle_format_and_label(&mut ctx, &item.data)?;
        }
        // SubheaderCounts and ColumnList carry no behavior required by the
        // row/column model (SPEC_FULL §4.4).
    }

    if let (Some(p1), Some(p2)) = (properties.col_count_p1, properties.col_count_p2) {
        if p1 + p2 != properties.column_count {
            logger.warning(format_args!(
                "column count mismatch: col_count_p1 ({p1}) + col_count_p2 ({p2}) != column_count ({})",
                properties.column_count
            ));
        }
    }

    columns.columns.truncate(properties.column_count as usize);
    if (columns.columns.len() as u64) < properties.column_count {
        return Err(Error::InvalidMetadata {
            details: "fewer columns materialized than declared column_count".into(),
        });
    }

    Ok(ParsedMetadata {
        properties,
        columns: columns.columns,
    })
}
