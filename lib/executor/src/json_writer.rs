//! Compact JSON output for composed responses and subgraph request bodies.
//! String escaping follows https://github.com/zotta/json-writer-rs/blob/f45e2f25cede0e06be76a94f6e45608780a835d4/src/lib.rs#L853
use bytes::BufMut;
use sonic_rs::{JsonNumberTrait, Value, ValueRef};

use crate::utils::consts::{
    CLOSE_BRACE, CLOSE_BRACKET, COLON, COMMA, FALSE, NULL, OPEN_BRACE, OPEN_BRACKET, TRUE,
};

const fn get_replacements() -> [u8; 256] {
    // NOTE: Only characters smaller than 128 are allowed here.
    // Trying to escape values above 128 would generate invalid utf-8 output
    let mut result = [0u8; 256];
    let mut i = 0;
    while i < 0x20 {
        result[i] = b'u';
        i += 1;
    }
    result[b'\"' as usize] = b'"';
    result[b'\\' as usize] = b'\\';
    result[8] = b'b';
    result[0xc] = b'f';
    result[b'\n' as usize] = b'n';
    result[b'\r' as usize] = b'r';
    result[b'\t' as usize] = b't';

    result
}

static REPLACEMENTS: [u8; 256] = get_replacements();
static HEX: [u8; 16] = *b"0123456789ABCDEF";

#[inline(always)]
pub fn write_and_escape_string<T: BufMut>(buffer: &mut T, input: &str) {
    buffer.put_u8(b'"');

    let bytes = input.as_bytes();
    let mut last_write = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        let replacement = REPLACEMENTS[byte as usize];
        if replacement == 0 {
            continue;
        }

        if last_write < i {
            buffer.put(&bytes[last_write..i]);
        }

        if replacement == b'u' {
            let hex_bytes: [u8; 6] = [
                b'\\',
                b'u',
                b'0',
                b'0',
                HEX[((byte / 16) & 0xF) as usize],
                HEX[(byte & 0xF) as usize],
            ];
            buffer.put(&hex_bytes[..]);
        } else {
            buffer.put(&[b'\\', replacement][..]);
        }
        last_write = i + 1;
    }

    if last_write < bytes.len() {
        buffer.put(&bytes[last_write..]);
    }

    buffer.put_u8(b'"');
}

#[inline(always)]
pub fn write_f64<T: BufMut>(buffer: &mut T, value: f64) {
    if !value.is_finite() {
        // JSON has no representation for NaN or infinities.
        buffer.put(NULL);
        return;
    }

    let mut buf = ryu::Buffer::new();
    buffer.put(buf.format_finite(value).as_bytes());
}

#[inline(always)]
pub fn write_u64<T: BufMut>(buffer: &mut T, value: u64) {
    let mut buf = itoa::Buffer::new();
    buffer.put(buf.format(value).as_bytes());
}

#[inline(always)]
pub fn write_i64<T: BufMut>(buffer: &mut T, value: i64) {
    let mut buf = itoa::Buffer::new();
    buffer.put(buf.format(value).as_bytes());
}

/// Writes a raw subgraph value as-is.
pub fn write_json_value<T: BufMut>(buffer: &mut T, value: &Value) {
    match value.as_ref() {
        ValueRef::Null => buffer.put(NULL),
        ValueRef::Bool(true) => buffer.put(TRUE),
        ValueRef::Bool(false) => buffer.put(FALSE),
        ValueRef::Number(number) => {
            if let Some(num) = number.as_i64() {
                write_i64(buffer, num);
            } else if let Some(num) = number.as_u64() {
                write_u64(buffer, num);
            } else if let Some(num) = number.as_f64() {
                write_f64(buffer, num);
            } else {
                buffer.put(NULL);
            }
        }
        ValueRef::String(value) => write_and_escape_string(buffer, value),
        ValueRef::Array(items) => {
            buffer.put(OPEN_BRACKET);
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    buffer.put(COMMA);
                }
                write_json_value(buffer, item);
            }
            buffer.put(CLOSE_BRACKET);
        }
        ValueRef::Object(fields) => {
            buffer.put(OPEN_BRACE);
            for (index, (key, field)) in fields.iter().enumerate() {
                if index > 0 {
                    buffer.put(COMMA);
                }
                write_and_escape_string(buffer, key);
                buffer.put(COLON);
                write_json_value(buffer, field);
            }
            buffer.put(CLOSE_BRACE);
        }
    }
}
