//! Самоописывающий префикс длины.
//!
//! Два старших бита первого байта выбирают форму:
//! - `00` - 6-битная длина в этом же байте;
//! - `01` - 14-битная длина, младшие 8 бит в следующем байте;
//! - `10` - 32-битная (0x80) или 64-битная (0x81) длина big-endian;
//! - `11` - не длина, а тег специальной кодировки строки.

use byteorder::BigEndian;
use zrdb_error::RdbError;

use super::{
    tags::{LEN_32BIT, LEN_64BIT},
    ByteSource, DecodeResult,
};

/// Результат разбора префикса длины.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdbLength {
    /// Обычная длина или счётчик.
    Len(u64),
    /// Тег специальной кодировки строки (6 младших бит).
    Encoded(u8),
}

impl RdbLength {
    /// Пара (значение, признак специальной кодировки).
    pub fn into_parts(self) -> (u64, bool) {
        match self {
            Self::Len(n) => (n, false),
            Self::Encoded(tag) => (u64::from(tag), true),
        }
    }
}

/// Читает префикс длины, допуская специальные кодировки.
pub fn read_length_with_encoding<S: ByteSource>(src: &mut S) -> DecodeResult<RdbLength> {
    let start = src.offset();
    let first = src.read_u8("reading length prefix")?;

    match (first & 0xC0) >> 6 {
        0 => Ok(RdbLength::Len(u64::from(first & 0x3F))),
        1 => {
            let next = src.read_u8("reading 14-bit length")?;
            Ok(RdbLength::Len(
                (u64::from(first & 0x3F) << 8) | u64::from(next),
            ))
        }
        2 => match first {
            LEN_32BIT => Ok(RdbLength::Len(u64::from(
                src.read_u32::<BigEndian>("reading 32-bit length")?,
            ))),
            LEN_64BIT => Ok(RdbLength::Len(
                src.read_u64::<BigEndian>("reading 64-bit length")?,
            )),
            other => Err(RdbError::BadEncoding {
                structure: "length".to_string(),
                reason: format!("reserved length prefix 0x{other:02X}"),
                offset: Some(start),
                key: None,
            }),
        },
        _ => Ok(RdbLength::Encoded(first & 0x3F)),
    }
}

/// Читает длину там, где специальная кодировка недопустима.
pub fn read_length<S: ByteSource>(src: &mut S) -> DecodeResult<u64> {
    let start = src.offset();
    match read_length_with_encoding(src)? {
        RdbLength::Len(n) => Ok(n),
        RdbLength::Encoded(tag) => Err(RdbError::BadEncoding {
            structure: "length".to_string(),
            reason: format!("special encoding {tag} where a plain length is required"),
            offset: Some(start),
            key: None,
        }),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
