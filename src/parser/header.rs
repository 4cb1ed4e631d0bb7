//! Fixed-layout file header: magic check, alignment/word-size/endianness
//! detection, and the geometry + informational fields needed before any page
//! can be read.

use std::io::{Read, Seek, SeekFrom};

use encoding_rs::Encoding;
use time::{Duration, OffsetDateTime};

use crate::error::{Error, Result, Section};
use crate::metadata::{Endianness, Platform, Properties};
use crate::parser::primitives::{read_int, read_text, read_uint};

const MAGIC: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC2, 0xEA, 0x81, 0x60,
    0xB3, 0x14, 0x11, 0xCF, 0xBD, 0x92, 0x08, 0x00, 0x09, 0xC7, 0x31, 0x8C, 0x18, 0x1F, 0x10, 0x11,
];

const ALIGNMENT_MARKER: u8 = b'3';
const ENDIAN_LITTLE: u8 = 0x01;
const PLATFORM_UNIX: u8 = b'1';
const PLATFORM_WINDOWS: u8 = b'2';

const SAS_EPOCH_OFFSET_SECONDS: i64 = -3653 * 86_400;

fn read_at<R: Read + Seek>(reader: &mut R, offset: u64, buf: &mut [u8]) -> Result<()> {
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::ShortRead {
                section: Section::Header,
            }
        } else {
            Error::Io(err)
        }
    })
}

fn read_byte<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<u8> {
    let mut buf = [0u8; 1];
    read_at(reader, offset, &mut buf)?;
    Ok(buf[0])
}

fn sas_seconds_to_datetime(seconds: f64) -> Option<OffsetDateTime> {
    let delta = Duration::checked_seconds_f64(seconds)?;
    let offset = Duration::seconds(SAS_EPOCH_OFFSET_SECONDS);
    let total = offset.checked_add(delta)?;
    OffsetDateTime::UNIX_EPOCH.checked_add(total)
}

/// Parses the fixed-position header fields into a partially-populated
/// `Properties`. Schema fields (`row_length`, `column_count`, ...) are left
/// at their defaults; the metadata decoder fills them in from subheaders.
///
/// # Errors
///
/// Returns [`Error::HeaderTooShort`] if the file is smaller than the fixed
/// header region, [`Error::BadMagic`] if the magic number does not match, or
/// an I/O error from the underlying reader.
pub fn parse_header<R: Read + Seek>(reader: &mut R, encoding: &'static Encoding) -> Result<Properties> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    if file_len < 288 {
        return Err(Error::HeaderTooShort);
    }
    reader.seek(SeekFrom::Start(0))?;

    let mut magic = [0u8; 32];
    read_at(reader, 0, &mut magic)?;
    if magic != MAGIC {
        return Err(Error::BadMagic);
    }

    let u64_mode = read_byte(reader, 32)? == ALIGNMENT_MARKER;
    let align2: u64 = if u64_mode { 4 } else { 0 };
    let align1: u64 = if read_byte(reader, 35)? == ALIGNMENT_MARKER { 4 } else { 0 };
    let total = align1 + align2;

    let endianness = if read_byte(reader, 37)? == ENDIAN_LITTLE {
        Endianness::Little
    } else {
        Endianness::Big
    };

    let platform = match read_byte(reader, 39)? {
        PLATFORM_UNIX => Platform::Unix,
        PLATFORM_WINDOWS => Platform::Windows,
        _ => Platform::Unknown,
    };

    let mut name_buf = [0u8; 64];
    read_at(reader, 92, &mut name_buf)?;
    let name = read_text(&name_buf, encoding);

    let mut file_type_buf = [0u8; 8];
    read_at(reader, 156, &mut file_type_buf)?;
    let file_type = read_text(&file_type_buf, encoding);

    let mut date_created_buf = [0u8; 8];
    read_at(reader, 164 + align1, &mut date_created_buf)?;
    let date_created = sas_seconds_to_datetime(crate::parser::primitives::read_double(
        &date_created_buf,
        endianness,
    ));

    let mut date_modified_buf = [0u8; 8];
    read_at(reader, 172 + align1, &mut date_modified_buf)?;
    let date_modified = sas_seconds_to_datetime(crate::parser::primitives::read_double(
        &date_modified_buf,
        endianness,
    ));

    let mut header_length_buf = [0u8; 4];
    read_at(reader, 196 + align1, &mut header_length_buf)?;
    let header_length = read_uint(&header_length_buf, endianness) as u32;

    let mut page_length_buf = [0u8; 4];
    read_at(reader, 200 + align1, &mut page_length_buf)?;
    let page_length = read_uint(&page_length_buf, endianness) as u32;

    let page_count_len = (4 + align2) as usize;
    let mut page_count_buf = [0u8; 8];
    read_at(
        reader,
        204 + align1,
        &mut page_count_buf[..page_count_len],
    )?;
    let page_count = read_uint(&page_count_buf[..page_count_len], endianness);

    let mut sas_release_buf = [0u8; 8];
    read_at(reader, 216 + total, &mut sas_release_buf)?;
    let sas_release = read_text(&sas_release_buf, encoding);

    let mut server_type_buf = [0u8; 16];
    read_at(reader, 224 + total, &mut server_type_buf)?;
    let server_type = read_text(&server_type_buf, encoding);

    let mut os_type_buf = [0u8; 16];
    read_at(reader, 240 + total, &mut os_type_buf)?;
    let os_type = read_text(&os_type_buf, encoding);

    let mut os_maker_buf = [0u8; 16];
    read_at(reader, 256 + total, &mut os_maker_buf)?;
    let os_maker = read_text(&os_maker_buf, encoding);

    let mut os_name_buf = [0u8; 16];
    read_at(reader, 272 + total, &mut os_name_buf)?;
    let mut os_name = read_text(&os_name_buf, encoding);
    if os_name.is_empty() {
        os_name = os_maker;
    }

    if (header_length as u64) < 288 {
        return Err(Error::HeaderTooShort);
    }
    reader.seek(SeekFrom::Start(u64::from(header_length)))?;

    let mut properties = Properties {
        u64: u64_mode,
        endianness,
        platform,
        header_length,
        page_length,
        page_count,
        name,
        file_type,
        date_created,
        date_modified,
        sas_release,
        server_type,
        os_type,
        os_name,
        ..Properties::default()
    };
    properties.row_length = 0;
    properties.row_count = 0;
    properties.column_count = 0;
    Ok(properties)
}
