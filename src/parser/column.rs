//! Text-blob pool and column-schema accumulator used while walking metadata
//! subheaders. Columns arrive over three subheader types (name, attributes,
//! format/label) in that order; `ColumnBuilder` accumulates the partial state
//! until a FormatAndLabel subheader materializes each `Column`.

use encoding_rs::Encoding;

use crate::error::{Error, Result, Section};
use crate::metadata::{Column, ColumnType};

/// A reference into one of the text blobs collected from ColumnText
/// subheaders: `column_names_strings[index][offset..offset+length]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRef {
    pub index: u16,
    pub offset: u16,
    pub length: u16,
}

impl TextRef {
    pub const EMPTY: Self = Self {
        index: 0,
        offset: 0,
        length: 0,
    };
}

/// Append-only pool of raw text blobs read from ColumnText subheaders.
#[derive(Debug, Default)]
pub struct TextStore {
    blobs: Vec<Vec<u8>>,
}

impl TextStore {
    pub fn push_blob(&mut self, blob: Vec<u8>) {
        self.blobs.push(blob);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    #[must_use]
    pub fn blob(&self, index: usize) -> Option<&[u8]> {
        self.blobs.get(index).map(Vec::as_slice)
    }

    /// Resolves a `TextRef` to decoded text, clamping the blob index to the
    /// last available blob (producers occasionally emit an out-of-range
    /// index for an unused field). `column_index` is attached to the error
    /// if the reference runs past the blob's bounds.
    pub fn resolve(&self, text_ref: TextRef, encoding: &'static Encoding, column_index: usize) -> Result<String> {
        if self.blobs.is_empty() {
            return Ok(String::new());
        }
        let index = (text_ref.index as usize).min(self.blobs.len() - 1);
        let blob = &self.blobs[index];
        let start = text_ref.offset as usize;
        let end = start + text_ref.length as usize;
        if end > blob.len() {
            return Err(Error::ShortRead {
                section: Section::Column {
                    index: column_index as u32,
                },
            });
        }
        Ok(crate::parser::primitives::read_text(&blob[start..end], encoding))
    }
}

/// Partial column state accumulated across ColumnName / ColumnAttributes /
/// FormatAndLabel subheaders, in that processing order.
#[derive(Debug, Default)]
pub struct ColumnBuilder {
    pub names: Vec<TextRef>,
    pub data_offsets: Vec<u64>,
    pub data_lengths: Vec<u32>,
    pub types: Vec<ColumnType>,
    pub columns: Vec<Column>,
}

impl ColumnBuilder {
    /// Materializes the column at `position` once its format/label arrive.
    pub fn finalize_column(
        &mut self,
        position: usize,
        text_store: &TextStore,
        encoding: &'static Encoding,
        format: TextRef,
        label: TextRef,
    ) -> Result<()> {
        let name_ref = self
            .names
            .get(position)
            .copied()
            .ok_or_else(|| Error::InvalidMetadata {
                details: "FormatAndLabel subheader arrived before ColumnName".into(),
            })?;
        let data_offset = *self
            .data_offsets
            .get(position)
            .ok_or_else(|| Error::InvalidMetadata {
                details: "FormatAndLabel subheader arrived before ColumnAttributes".into(),
            })?;
        let data_length = *self
            .data_lengths
            .get(position)
            .ok_or_else(|| Error::InvalidMetadata {
                details: "FormatAndLabel subheader arrived before ColumnAttributes".into(),
            })?;
        let column_type = *self
            .types
            .get(position)
            .ok_or_else(|| Error::InvalidMetadata {
                details: "FormatAndLabel subheader arrived before ColumnAttributes".into(),
            })?;

        let name = text_store.resolve(name_ref, encoding, position)?;
        let format_text = text_store.resolve(format, encoding, position)?;
        let label_text = text_store.resolve(label, encoding, position)?;

        self.columns.push(Column {
            index: position,
            name,
            label: label_text,
            format: format_text,
            column_type,
            offset: data_offset,
            length: data_length,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_text_ref_within_blob() {
        let mut store = TextStore::default();
        store.push_blob(b"hello world".to_vec());
        let text_ref = TextRef {
            index: 0,
            offset: 6,
            length: 5,
        };
        assert_eq!(store.resolve(text_ref, encoding_rs::UTF_8, 0).unwrap(), "world");
    }

    #[test]
    fn clamps_out_of_range_blob_index() {
        let mut store = TextStore::default();
        store.push_blob(b"only".to_vec());
        let text_ref = TextRef {
            index: 9,
            offset: 0,
            length: 4,
        };
        assert_eq!(store.resolve(text_ref, encoding_rs::UTF_8, 0).unwrap(), "only");
    }

    #[test]
    fn out_of_bounds_ref_errors() {
        let mut store = TextStore::default();
        store.push_blob(b"shrt".to_vec());
        let text_ref = TextRef {
            index: 0,
            offset: 0,
            length: 50,
        };
        let err = store.resolve(text_ref, encoding_rs::UTF_8, 2).unwrap_err();
        assert!(matches!(
            err,
            Error::ShortRead {
                section: Section::Column { index: 2 }
            }
        ));
    }
}
