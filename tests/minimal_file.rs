//! End-to-end scenarios against hand-assembled in-memory SAS7BDAT byte
//! buffers: scenario 1 (minimal 32-bit file) and scenario 4 (same content,
//! 64-bit layout) from the testable-properties section of the spec.

use std::io::Cursor;

use sas7bdat_reader::{ReadOptions, Row, SasReader, Value};

const MAGIC: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC2, 0xEA, 0x81, 0x60,
    0xB3, 0x14, 0x11, 0xCF, 0xBD, 0x92, 0x08, 0x00, 0x09, 0xC7, 0x31, 0x8C, 0x18, 0x1F, 0x10, 0x11,
];

fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_int(buf: &mut [u8], at: usize, len: usize, value: u64) {
    buf[at..at + len].copy_from_slice(&value.to_le_bytes()[..len]);
}

fn put_text(buf: &mut [u8], at: usize, text: &[u8]) {
    buf[at..at + text.len()].copy_from_slice(text);
}

/// Builds a page-sized buffer holding the single META page's worth of
/// subheaders for a 2-column schema (`id` number length 8, `name` string
/// length 10), and a DATA page with 5 rows.
fn build_minimal_file(u64_mode: bool) -> Vec<u8> {
    let l = if u64_mode { 8 } else { 4 };
    let ptr_len = if u64_mode { 24 } else { 12 };
    let page_bit_offset = if u64_mode { 32 } else { 16 };
    let align1: usize = 4;
    let align2: usize = if u64_mode { 4 } else { 0 };
    let total = align1 + align2;

    let header_length: u32 = 1024;
    let page_length: u32 = 4096;
    let page_count: u32 = 2;

    // ---- header ----
    let mut header = vec![0u8; header_length as usize];
    header[0..32].copy_from_slice(&MAGIC);
    header[32] = if u64_mode { b'3' } else { b'2' };
    header[35] = b'3'; // align1 marker present
    header[37] = 0x01; // little-endian
    header[39] = b'1'; // unix
    put_u32(&mut header, 196 + align1, header_length);
    put_u32(&mut header, 200 + align1, page_length);
    put_int(&mut header, 204 + align1, 4 + align2, u64::from(page_count));

    // ---- META page ----
    let mut meta = vec![0u8; page_length as usize];
    put_u16(&mut meta, page_bit_offset, 0); // page type META
    put_u16(&mut meta, page_bit_offset + 2, 0); // block_count
    put_u16(&mut meta, page_bit_offset + 4, 7); // subheader_count

    let lcs_offset = if u64_mode { 682 } else { 354 };
    let lcp_offset = if u64_mode { 706 } else { 378 };
    let sig_field_offset = if u64_mode { 20 } else { 16 };

    let row_size_len = lcp_offset + 2;
    let col_size_len = 2 * l;
    let column_text_len = (l + 2 + 6).max(sig_field_offset + 8);
    let column_name_len = 2 * l + 28;
    let column_attrs_len = 4 * l + 28;
    let format_label_len = 3 * l + 12;

    let pointer_array_base = page_bit_offset + 8;
    let pointer_array_len = 7 * ptr_len;
    let data_area_start = pointer_array_base + pointer_array_len;

    let row_size_off = data_area_start;
    let col_size_off = row_size_off + row_size_len;
    let col_text_off = col_size_off + col_size_len;
    let col_name_off = col_text_off + column_text_len;
    let col_attrs_off = col_name_off + column_name_len;
    let fmt1_off = col_attrs_off + column_attrs_len;
    let fmt2_off = fmt1_off + format_label_len;
    let total_needed = fmt2_off + format_label_len;
    assert!(total_needed <= page_length as usize, "synthetic page too small");

    // RowSize subheader
    {
        let data = &mut meta[row_size_off..row_size_off + row_size_len];
        put_int(data, 0, l, if u64_mode { 0xF7F7_F7F7_0000_0000 } else { 0xF7F7_F7F7 });
        put_int(data, 5 * l, l, 18); // row_length
        put_int(data, 6 * l, l, 5); // row_count
        put_int(data, 9 * l, l, 2); // col_count_p1
        put_int(data, 10 * l, l, 0); // col_count_p2
        put_int(data, 15 * l, l, 1000); // mix_page_row_count (unused by DATA pages)
        put_u16(data, lcs_offset, 0);
        put_u16(data, lcp_offset, 0);
    }

    // ColumnSize subheader
    {
        let data = &mut meta[col_size_off..col_size_off + col_size_len];
        put_int(data, 0, l, if u64_mode { 0xF6F6_F6F6_0000_0000 } else { 0xF6F6_F6F6 });
        put_int(data, l, l, 2); // column_count
    }

    // ColumnText subheader: blob "idname", signature region left blank (zero).
    {
        let data = &mut meta[col_text_off..col_text_off + column_text_len];
        let sig = if u64_mode { 0xFFFF_FFFF_FFFF_FFFDu64 } else { 0xFFFF_FFFD };
        put_int(data, 0, l, sig);
        put_u16(data, l, 6);
        put_text(data, l + 2, b"idname");
    }

    // ColumnName subheader: two 8-byte pointer records into the text blob.
    {
        let data = &mut meta[col_name_off..col_name_off + column_name_len];
        let sig = if u64_mode { 0xFFFF_FFFF_FFFF_FFFFu64 } else { 0xFFFF_FFFF };
        put_int(data, 0, l, sig);
        let base = l + 8;
        put_u16(data, base, 0); // text_index
        put_u16(data, base + 2, 0); // name_offset ("id" at 0)
        put_u16(data, base + 4, 2); // name_length
        put_u16(data, base + 8, 0);
        put_u16(data, base + 10, 2); // name_offset ("name" at 2)
        put_u16(data, base + 12, 4); // name_length
    }

    // ColumnAttributes subheader: two records (id: number/8B, name: string/10B).
    {
        let data = &mut meta[col_attrs_off..col_attrs_off + column_attrs_len];
        let sig = if u64_mode { 0xFFFF_FFFF_FFFF_FFFCu64 } else { 0xFFFF_FFFC };
        put_int(data, 0, l, sig);
        let record_len = l + 8;
        let base = l + 8;
        put_int(data, base, l, 0); // id: data_offset
        put_u32(data, base + l, 8); // id: data_length
        data[base + l + 4] = 1; // id: number
        let r1 = base + record_len;
        put_int(data, r1, l, 8); // name: data_offset
        put_u32(data, r1 + l, 10); // name: data_length
        data[r1 + l + 4] = 2; // name: string
    }

    // Two FormatAndLabel subheaders (one per column), both with empty format/label.
    for off in [fmt1_off, fmt2_off] {
        let data = &mut meta[off..off + format_label_len];
        let sig = if u64_mode { 0xFFFF_FFFF_FFFF_FBFEu64 } else { 0xFFFF_FBFE };
        put_int(data, 0, l, sig);
    }

    // Subheader pointer array.
    let entries = [
        (row_size_off, row_size_len),
        (col_size_off, col_size_len),
        (col_text_off, column_text_len),
        (col_name_off, column_name_len),
        (col_attrs_off, column_attrs_len),
        (fmt1_off, format_label_len),
        (fmt2_off, format_label_len),
    ];
    for (i, (off, len)) in entries.iter().enumerate() {
        let rec_start = pointer_array_base + i * ptr_len;
        put_int(&mut meta, rec_start, l, *off as u64);
        put_int(&mut meta, rec_start + l, l, *len as u64);
        // compression = 0, subheader_type = 0 (left zeroed)
    }

    // ---- DATA page ----
    let mut data_page = vec![0u8; page_length as usize];
    put_u16(&mut data_page, page_bit_offset, 256); // page type DATA
    put_u16(&mut data_page, page_bit_offset + 2, 5); // block_count
    put_u16(&mut data_page, page_bit_offset + 4, 0); // subheader_count

    let row_base = page_bit_offset + 8;
    let row_length = 18usize;
    let names: [&[u8]; 5] = [b"alpha", b"beta", b"", b"delta", b"epsilon"];
    for (k, name) in names.iter().enumerate() {
        let row_off = row_base + k * row_length;
        let id_bytes = ((k + 1) as f64).to_le_bytes();
        data_page[row_off..row_off + 8].copy_from_slice(&id_bytes);
        let name_field = &mut data_page[row_off + 8..row_off + 18];
        name_field.fill(0);
        name_field[..name.len()].copy_from_slice(name);
    }

    let mut file = header;
    file.extend_from_slice(&meta);
    file.extend_from_slice(&data_page);
    file
}

fn expected_values() -> Vec<Vec<Value>> {
    vec![
        vec![Value::Number(1.0), Value::String("alpha".into())],
        vec![Value::Number(2.0), Value::String("beta".into())],
        vec![Value::Number(3.0), Value::String(String::new())],
        vec![Value::Number(4.0), Value::String("delta".into())],
        vec![Value::Number(5.0), Value::String("epsilon".into())],
    ]
}

fn run_scenario(u64_mode: bool) {
    let bytes = build_minimal_file(u64_mode);
    let mut rows = SasReader::open(Cursor::new(bytes), ReadOptions::new()).unwrap();

    assert_eq!(rows.properties().row_count, 5);
    assert_eq!(rows.properties().column_count, 2);
    assert_eq!(rows.columns().len(), 2);

    let header = rows.next_row().unwrap().unwrap();
    match header {
        Row::Header(names) => assert_eq!(names, vec!["id".to_string(), "name".to_string()]),
        other => panic!("expected header row, got {other:?}"),
    }

    let expected = expected_values();
    for expected_row in expected {
        let row = rows.next_row().unwrap().unwrap();
        match row {
            Row::Array(values) => assert_eq!(values, expected_row),
            other => panic!("expected array row, got {other:?}"),
        }
    }

    assert!(rows.next_row().unwrap().is_none());
}

#[test]
fn scenario_one_minimal_32bit_file() {
    run_scenario(false);
}

#[test]
fn scenario_four_64bit_layout_matches_32bit_content() {
    run_scenario(true);
}

#[test]
fn skip_header_suppresses_the_initial_row() {
    let bytes = build_minimal_file(false);
    let options = ReadOptions::new().with_skip_header(true);
    let mut rows = SasReader::open(Cursor::new(bytes), options).unwrap();
    let first = rows.next_row().unwrap().unwrap();
    assert!(matches!(first, Row::Array(_)));
}

#[test]
fn map_row_format_keys_values_by_column_name() {
    let bytes = build_minimal_file(false);
    let options = ReadOptions::new().with_row_format(sas7bdat_reader::RowFormat::Map);
    let mut rows = SasReader::open(Cursor::new(bytes), options).unwrap();
    let _header = rows.next_row().unwrap().unwrap();
    let row = rows.next_row().unwrap().unwrap();
    match row {
        Row::Map(map) => {
            assert_eq!(map.get("id"), Some(&Value::Number(1.0)));
            assert_eq!(map.get("name"), Some(&Value::String("alpha".into())));
        }
        other => panic!("expected map row, got {other:?}"),
    }
}
