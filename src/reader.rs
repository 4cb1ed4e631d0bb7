//! Public reading surface: `ReadOptions`, `SasReader`, and the lazy
//! `RowIterator` (SPEC_FULL §4.5, §4.7).

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io::{Read, Seek};
use std::sync::Arc;

use encoding_rs::Encoding;
use smallvec::SmallVec;
use time::{Date, Duration, Month, OffsetDateTime, Time};

use crate::error::{Error, Result, Section};
use crate::logger::LogLevel;
use crate::metadata::{Column, ColumnType, Properties};
use crate::parser::page::{read_page_header, read_subheader_pointers, PageHeader, PageType, SubheaderPointer};
use crate::parser::primitives::{read_int, read_text, read_uint, resolve_encoding};
use crate::parser::rle::decompress_rle;
use crate::parser::subheaders::{identify, SubheaderKind};
use crate::parser::ParsedMetadata;
use crate::value::Value;

/// Columns beyond this count spill the per-row accumulator onto the heap;
/// most SAS7BDAT schemas fit comfortably within it.
const INLINE_ROW_COLUMNS: usize = 16;

const DEFAULT_TIME_FORMATS: &[&str] = &["TIME"];
const DEFAULT_DATETIME_FORMATS: &[&str] = &["DATETIME"];
const DEFAULT_DATE_FORMATS: &[&str] = &[
    "YYMMDD", "MMDDYY", "DDMMYY", "DATE", "JULIAN", "MONYY", "WEEKDATE",
];

/// How a non-header row is shaped when handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowFormat {
    #[default]
    Array,
    Map,
}

/// One item yielded by [`RowIterator::next_row`].
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Header(Vec<String>),
    Array(Vec<Value>),
    Map(HashMap<String, Value>),
}

/// Which kind of temporal value a custom [`DateFormatter`] is being asked to
/// render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    Date,
    Time,
    DateTime,
}

/// Custom rendering for date/time/datetime columns, given the raw SAS
/// numeric value (days-since-epoch for dates, seconds-since-midnight for
/// times, seconds-since-epoch for datetimes).
pub type DateFormatter = Arc<dyn Fn(TemporalKind, f64) -> String + Send + Sync>;

/// Tunables for decoding a SAS7BDAT stream (SPEC_FULL §6).
#[derive(Clone)]
pub struct ReadOptions {
    log_level: LogLevel,
    extra_time_format_strings: Vec<String>,
    extra_datetime_format_strings: Vec<String>,
    extra_date_format_strings: Vec<String>,
    skip_header: bool,
    encoding: String,
    align_correction: bool,
    date_formatter: Option<DateFormatter>,
    row_format: RowFormat,
}

impl fmt::Debug for ReadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOptions")
            .field("log_level", &self.log_level)
            .field("extra_time_format_strings", &self.extra_time_format_strings)
            .field("extra_datetime_format_strings", &self.extra_datetime_format_strings)
            .field("extra_date_format_strings", &self.extra_date_format_strings)
            .field("skip_header", &self.skip_header)
            .field("encoding", &self.encoding)
            .field("align_correction", &self.align_correction)
            .field("date_formatter", &self.date_formatter.is_some())
            .field("row_format", &self.row_format)
            .finish()
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Warning,
            extra_time_format_strings: Vec::new(),
            extra_datetime_format_strings: Vec::new(),
            extra_date_format_strings: Vec::new(),
            skip_header: false,
            encoding: "utf-8".to_owned(),
            align_correction: true,
            date_formatter: None,
            row_format: RowFormat::Array,
        }
    }
}

impl ReadOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    #[must_use]
    pub fn with_extra_time_format_strings(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.extra_time_format_strings.extend(values);
        self
    }

    #[must_use]
    pub fn with_extra_datetime_format_strings(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.extra_datetime_format_strings.extend(values);
        self
    }

    #[must_use]
    pub fn with_extra_date_format_strings(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.extra_date_format_strings.extend(values);
        self
    }

    #[must_use]
    pub const fn with_skip_header(mut self, skip: bool) -> Self {
        self.skip_header = skip;
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    #[must_use]
    pub const fn with_align_correction(mut self, enabled: bool) -> Self {
        self.align_correction = enabled;
        self
    }

    #[must_use]
    pub const fn with_row_format(mut self, format: RowFormat) -> Self {
        self.row_format = format;
        self
    }

    #[must_use]
    pub fn with_date_formatter(mut self, formatter: DateFormatter) -> Self {
        self.date_formatter = Some(formatter);
        self
    }

    fn is_time_format(&self, format_upper: &str) -> bool {
        DEFAULT_TIME_FORMATS.contains(&format_upper)
            || self.extra_time_format_strings.iter().any(|f| f == format_upper)
    }

    fn is_datetime_format(&self, format_upper: &str) -> bool {
        DEFAULT_DATETIME_FORMATS.contains(&format_upper)
            || self
                .extra_datetime_format_strings
                .iter()
                .any(|f| f == format_upper)
    }

    fn is_date_format(&self, format_upper: &str) -> bool {
        DEFAULT_DATE_FORMATS.contains(&format_upper)
            || self.extra_date_format_strings.iter().any(|f| f == format_upper)
    }
}

fn sas_epoch_date() -> Date {
    Date::from_calendar_date(1960, Month::January, 1).expect("1960-01-01 is a valid calendar date")
}

fn datetime_from_seconds(seconds: f64) -> Option<OffsetDateTime> {
    let base = sas_epoch_date().with_hms(0, 0, 0).ok()?.assume_utc();
    let delta = Duration::checked_seconds_f64(seconds)?;
    base.checked_add(delta)
}

fn date_from_days(days: f64) -> Option<Date> {
    // Reuses the seconds-based epoch arithmetic (and its overflow checking)
    // by treating a day count as seconds-since-midnight scaled by 86400;
    // for integral day counts this lands exactly on midnight.
    datetime_from_seconds(days * 86_400.0).map(|dt| dt.date())
}

fn time_from_seconds(seconds: f64) -> Option<Time> {
    let total = seconds.rem_euclid(86_400.0) as i64;
    let hour = u8::try_from(total / 3600).ok()?;
    let minute = u8::try_from((total % 3600) / 60).ok()?;
    let second = u8::try_from(total % 60).ok()?;
    Time::from_hms(hour, minute, second).ok()
}

fn format_date(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

fn format_time(time: Time) -> String {
    format!("{:02}:{:02}:{:02}", time.hour(), time.minute(), time.second())
}

fn format_datetime(dt: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        dt.year(),
        u8::from(dt.month()),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}

fn render_date(raw: f64) -> String {
    if let Some(date) = date_from_days(raw) {
        return format_date(date);
    }
    if let Some(dt) = datetime_from_seconds(raw) {
        return format_date(dt.date());
    }
    String::new()
}

fn render_datetime(raw: f64) -> String {
    datetime_from_seconds(raw).map_or_else(String::new, format_datetime)
}

fn render_time(raw: f64) -> String {
    time_from_seconds(raw).map_or_else(String::new, format_time)
}

fn render_temporal(kind: TemporalKind, raw: f64, options: &ReadOptions) -> String {
    if let Some(formatter) = &options.date_formatter {
        return formatter(kind, raw);
    }
    match kind {
        TemporalKind::Date => render_date(raw),
        TemporalKind::Time => render_time(raw),
        TemporalKind::DateTime => render_datetime(raw),
    }
}

fn decode_value(
    raw: &[u8],
    column: &Column,
    properties: &Properties,
    options: &ReadOptions,
    encoding: &'static Encoding,
) -> Value {
    match column.column_type {
        ColumnType::String => Value::String(read_text(raw, encoding)),
        ColumnType::Number => {
            if column.length <= 2 {
                Value::Number(read_int(raw, properties.endianness) as f64)
            } else {
                let number = crate::parser::primitives::read_double(raw, properties.endianness);
                if number.is_nan() {
                    return Value::Null;
                }
                let format_upper = column.format.to_ascii_uppercase();
                if options.is_time_format(&format_upper) {
                    Value::Time(render_temporal(TemporalKind::Time, number, options))
                } else if options.is_datetime_format(&format_upper) {
                    Value::DateTime(render_temporal(TemporalKind::DateTime, number, options))
                } else if options.is_date_format(&format_upper) {
                    Value::Date(render_temporal(TemporalKind::Date, number, options))
                } else {
                    Value::Number(number)
                }
            }
        }
    }
}

enum RowSource {
    None,
    Direct {
        base_offset: usize,
        consumed: u64,
        rows_remaining: u64,
    },
    Pointers(VecDeque<SubheaderPointer>),
}

/// Lazily reads pages from the byte source and decodes rows one at a time;
/// no more than one page is held in memory at once.
pub struct RowIterator<R> {
    reader: R,
    properties: Properties,
    columns: Vec<Column>,
    options: ReadOptions,
    encoding: &'static Encoding,
    page_buf: Vec<u8>,
    current_page_index: u64,
    row_source: RowSource,
    rows_emitted: u64,
    header_pending: bool,
    finished: bool,
}

impl<R: Read + Seek> RowIterator<R> {
    pub(crate) fn new(reader: R, metadata: ParsedMetadata, options: ReadOptions, encoding: &'static Encoding) -> Self {
        let page_buf = vec![0u8; metadata.properties.page_length as usize];
        Self {
            reader,
            properties: metadata.properties,
            columns: metadata.columns,
            options,
            encoding,
            page_buf,
            current_page_index: 0,
            row_source: RowSource::None,
            rows_emitted: 0,
            header_pending: true,
            finished: false,
        }
    }

    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn load_next_page(&mut self) -> Result<bool> {
        if self.current_page_index >= self.properties.page_count {
            return Ok(false);
        }
        let offset =
            u64::from(self.properties.header_length) + self.current_page_index * u64::from(self.properties.page_length);
        self.reader.seek(std::io::SeekFrom::Start(offset))?;

        let mut total_read = 0usize;
        while total_read < self.page_buf.len() {
            let n = self.reader.read(&mut self.page_buf[total_read..])?;
            if n == 0 {
                break;
            }
            total_read += n;
        }
        if total_read < self.page_buf.len() {
            return Err(Error::IncompleteRead {
                index: self.current_page_index,
                expected: self.page_buf.len(),
                actual: total_read,
            });
        }

        let page_index = self.current_page_index;
        let page_header = read_page_header(&self.page_buf, &self.properties, page_index)?;
        if let PageType::Unknown(raw) = page_header.page_type {
            return Err(Error::UnknownPageType {
                index: page_index,
                page_type: raw as u16,
            });
        }
        self.row_source = self.classify_row_source(&page_header, page_index)?;
        self.current_page_index += 1;
        Ok(true)
    }

    fn classify_row_source(&self, page_header: &PageHeader, page_index: u64) -> Result<RowSource> {
        if page_header.page_type.carries_subheaders() {
            let pointers = read_subheader_pointers(&self.page_buf, &self.properties, page_header, page_index)?;
            let data_pointers: VecDeque<SubheaderPointer> = pointers
                .into_iter()
                .filter(|pointer| {
                    let end = pointer.offset + pointer.length;
                    end <= self.page_buf.len()
                        && matches!(
                            identify(
                                &self.page_buf[pointer.offset..end],
                                &self.properties,
                                pointer.compression,
                                pointer.subheader_type,
                            ),
                            Some(SubheaderKind::Data)
                        )
                })
                .collect();
            if !data_pointers.is_empty() {
                return Ok(RowSource::Pointers(data_pointers));
            }
        }

        if page_header.page_type.carries_rows_directly() {
            let ptr_len = self.properties.subheader_pointer_size();
            let prefix =
                self.properties.page_bit_offset() + 8 + page_header.subheader_count as usize * ptr_len;
            let align_correction = if self.options.align_correction && page_header.page_type == PageType::Mix {
                prefix % 8
            } else {
                0
            };
            let rows_remaining = match page_header.page_type {
                PageType::Data => u64::from(page_header.block_count),
                PageType::Mix => {
                    let cap = self.properties.mix_page_row_count.unwrap_or(0).max(0) as u64;
                    if cap == 0 {
                        self.properties.row_count
                    } else {
                        cap
                    }
                }
                _ => 0,
            };
            return Ok(RowSource::Direct {
                base_offset: prefix + align_correction,
                consumed: 0,
                rows_remaining,
            });
        }

        Ok(RowSource::None)
    }

    fn decode_row(&mut self, raw_row: &[u8], row_index: u64) -> Result<Vec<Value>> {
        let mut values = SmallVec::<[Value; INLINE_ROW_COLUMNS]>::with_capacity(self.columns.len());
        for column in &self.columns {
            if column.length == 0 {
                break;
            }
            let start = column.offset as usize;
            let end = start + column.length as usize;
            if end > raw_row.len() {
                return Err(Error::ShortRead {
                    section: Section::Row { index: row_index },
                });
            }
            values.push(decode_value(
                &raw_row[start..end],
                column,
                &self.properties,
                &self.options,
                self.encoding,
            ));
        }
        Ok(values.into_vec())
    }

    fn next_direct_row(&mut self) -> Result<Option<Vec<Value>>> {
        let RowSource::Direct {
            base_offset,
            consumed,
            rows_remaining,
        } = &mut self.row_source
        else {
            return Ok(None);
        };
        if *rows_remaining == 0 {
            self.row_source = RowSource::None;
            return Ok(None);
        }
        let row_length = self.properties.row_length as usize;
        let start = *base_offset + (*consumed as usize) * row_length;
        let end = start + row_length;
        let page_index = self.current_page_index.saturating_sub(1);
        if end > self.page_buf.len() {
            return Err(Error::ShortRead {
                section: Section::Page { index: page_index },
            });
        }
        let row_index = self.rows_emitted;
        let raw = self.page_buf[start..end].to_vec();
        *consumed += 1;
        *rows_remaining -= 1;
        self.decode_row(&raw, row_index).map(Some)
    }

    fn next_pointer_row(&mut self) -> Result<Option<Vec<Value>>> {
        let RowSource::Pointers(pointers) = &mut self.row_source else {
            return Ok(None);
        };
        let Some(pointer) = pointers.pop_front() else {
            self.row_source = RowSource::None;
            return Ok(None);
        };
        let page_index = self.current_page_index.saturating_sub(1);
        let row_index = self.rows_emitted;
        let end = pointer.offset + pointer.length;
        if end > self.page_buf.len() {
            return Err(Error::ShortRead {
                section: Section::Page { index: page_index },
            });
        }
        let raw_slice = &self.page_buf[pointer.offset..end];
        let row_length = self.properties.row_length as usize;
        let raw = if self.properties.compression != crate::metadata::Compression::None
            && raw_slice.len() < row_length
        {
            decompress_rle(raw_slice, row_length, page_index, row_index)?
        } else {
            raw_slice.to_vec()
        };
        self.decode_row(&raw, row_index).map(Some)
    }

    /// Returns the next row, or `None` once every declared row has been
    /// emitted. The first call returns a header row unless
    /// [`ReadOptions::with_skip_header`] disabled it.
    ///
    /// # Errors
    ///
    /// Returns an error if a page is short/corrupt, a subheader violates a
    /// structural invariant, or row decompression fails.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.header_pending {
            self.header_pending = false;
            if !self.options.skip_header {
                return Ok(Some(Row::Header(self.column_names())));
            }
        }

        if self.finished || self.rows_emitted >= self.properties.row_count {
            self.finished = true;
            return Ok(None);
        }

        loop {
            if matches!(self.row_source, RowSource::Pointers(_)) {
                if let Some(values) = self.next_pointer_row()? {
                    self.rows_emitted += 1;
                    return Ok(Some(self.shape_row(values)));
                }
            }
            if matches!(self.row_source, RowSource::Direct { .. }) {
                if let Some(values) = self.next_direct_row()? {
                    self.rows_emitted += 1;
                    return Ok(Some(self.shape_row(values)));
                }
            }
            if !self.load_next_page()? {
                self.finished = true;
                return Ok(None);
            }
        }
    }

    fn shape_row(&self, values: Vec<Value>) -> Row {
        match self.options.row_format {
            RowFormat::Array => Row::Array(values),
            RowFormat::Map => {
                let map = self
                    .columns
                    .iter()
                    .zip(values)
                    .map(|(column, value)| (column.name.clone(), value))
                    .collect();
                Row::Map(map)
            }
        }
    }
}

/// Entry point: parses the header and metadata, then hands back a
/// [`RowIterator`] over the remaining pages.
pub struct SasReader;

impl SasReader {
    /// Opens `reader` and decodes its metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the header or metadata cannot be parsed.
    pub fn open<R: Read + Seek>(mut reader: R, options: ReadOptions) -> Result<RowIterator<R>> {
        let encoding = resolve_encoding(&options.encoding)?;
        let mut logger = crate::logger::Logger::new(options.log_level);
        let metadata = crate::parser::parse_metadata(&mut reader, encoding, &mut logger)?;
        Ok(RowIterator::new(reader, metadata, options, encoding))
    }
}
