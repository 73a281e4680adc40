//! Listpack: заголовок из 6 байт, записи с обратной длиной, терминатор 0xFF.
//!
//! Каждая запись - это байт(ы) кодировки, полезная нагрузка и backlen из
//! 1..=5 байт, хранящий размер кодировки вместе с нагрузкой. Backlen нужен
//! только для обхода с конца, при чтении вперёд он пропускается.

use byteorder::LittleEndian;
use zrdb_error::RdbError;

use super::{Walk, ZipEntry};
use crate::rdb::{ByteCursor, ByteSource, DecodeResult};

/// Терминатор listpack.
pub const LISTPACK_END: u8 = 0xFF;
/// Счётчик элементов, означающий «неизвестно».
pub const LISTPACK_UNKNOWN_LEN: u16 = 0xFFFF;

const LP_ENCODING_32BIT_STR: u8 = 0xF0;
const LP_ENCODING_16BIT_INT: u8 = 0xF1;
const LP_ENCODING_24BIT_INT: u8 = 0xF2;
const LP_ENCODING_32BIT_INT: u8 = 0xF3;
const LP_ENCODING_64BIT_INT: u8 = 0xF4;

/// Число байт backlen для записи размера `len`.
pub fn backlen_size(len: u64) -> usize {
    match len {
        0..=127 => 1,
        128..=16382 => 2,
        16383..=2_097_150 => 3,
        2_097_151..=268_435_454 => 4,
        _ => 5,
    }
}

/// Итератор по записям listpack.
#[derive(Debug, Clone)]
pub struct ListpackIter<'a> {
    cursor: ByteCursor<'a>,
    total_bytes: u32,
    declared: u16,
    done: bool,
}

impl<'a> ListpackIter<'a> {
    pub fn new(
        blob: &'a [u8],
        base: u64,
    ) -> DecodeResult<Self> {
        let mut cursor = ByteCursor::with_base(blob, base);
        let total_bytes = cursor.read_u32::<LittleEndian>("reading listpack total bytes")?;
        let declared = cursor.read_u16::<LittleEndian>("reading listpack length")?;
        Ok(Self {
            cursor,
            total_bytes,
            declared,
            done: false,
        })
    }

    /// Размер из заголовка.
    pub fn total_bytes(&self) -> u32 {
        self.total_bytes
    }

    /// Счётчик из заголовка, если он известен.
    pub fn declared_len(&self) -> Option<u64> {
        (self.declared != LISTPACK_UNKNOWN_LEN).then_some(u64::from(self.declared))
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    fn next_entry(&mut self) -> DecodeResult<Option<ZipEntry<'a>>> {
        let start = self.cursor.offset();
        let Some(first) = self.cursor.peek() else {
            return Err(RdbError::BadEncoding {
                structure: "listpack".to_string(),
                reason: "blob ends without terminator".to_string(),
                offset: Some(start),
                key: None,
            });
        };
        if first == LISTPACK_END {
            self.cursor.skip(1, "reading listpack terminator")?;
            return Ok(None);
        }

        let cur = &mut self.cursor;
        let b = cur.read_u8("reading listpack encoding")?;

        let (entry, size) = if b & 0x80 == 0 {
            (ZipEntry::Int(i64::from(b & 0x7F)), 1)
        } else if b & 0xC0 == 0x80 {
            let len = usize::from(b & 0x3F);
            (
                ZipEntry::Bytes(cur.take(len, "reading listpack string")?),
                1 + len as u64,
            )
        } else if b & 0xE0 == 0xC0 {
            let low = cur.read_u8("reading listpack int13")?;
            let raw = (i64::from(b & 0x1F) << 8) | i64::from(low);
            let v = if raw >= 1 << 12 { raw - (1 << 13) } else { raw };
            (ZipEntry::Int(v), 2)
        } else if b & 0xF0 == 0xE0 {
            let low = cur.read_u8("reading listpack 12-bit length")?;
            let len = (usize::from(b & 0x0F) << 8) | usize::from(low);
            (
                ZipEntry::Bytes(cur.take(len, "reading listpack string")?),
                2 + len as u64,
            )
        } else {
            match b {
                LP_ENCODING_32BIT_STR => {
                    let len = cur.read_u32::<LittleEndian>("reading listpack 32-bit length")?;
                    (
                        ZipEntry::Bytes(cur.take(len as usize, "reading listpack string")?),
                        5 + u64::from(len),
                    )
                }
                LP_ENCODING_16BIT_INT => (
                    ZipEntry::Int(i64::from(
                        cur.read_i16::<LittleEndian>("reading listpack int16")?,
                    )),
                    3,
                ),
                LP_ENCODING_24BIT_INT => (
                    ZipEntry::Int(i64::from(
                        cur.read_i24::<LittleEndian>("reading listpack int24")?,
                    )),
                    4,
                ),
                LP_ENCODING_32BIT_INT => (
                    ZipEntry::Int(i64::from(
                        cur.read_i32::<LittleEndian>("reading listpack int32")?,
                    )),
                    5,
                ),
                LP_ENCODING_64BIT_INT => (
                    ZipEntry::Int(cur.read_i64::<LittleEndian>("reading listpack int64")?),
                    9,
                ),
                other => {
                    return Err(RdbError::BadEncoding {
                        structure: "listpack".to_string(),
                        reason: format!("reserved entry encoding 0x{other:02X}"),
                        offset: Some(start),
                        key: None,
                    });
                }
            }
        };

        cur.skip(backlen_size(size), "reading listpack backlen")?;
        Ok(Some(entry))
    }
}

impl<'a> Iterator for ListpackIter<'a> {
    type Item = DecodeResult<ZipEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Обходит listpack целиком.
pub fn walk_listpack(
    blob: &[u8],
    base: u64,
) -> DecodeResult<Walk<'_>> {
    let iter = ListpackIter::new(blob, base)?;
    let declared = iter.declared_len();
    let entries = iter.collect::<DecodeResult<Vec<_>>>()?;
    Ok(Walk { entries, declared })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(
        entries: &[&[u8]],
        count: u16,
    ) -> Vec<u8> {
        let mut body = Vec::new();
        for e in entries {
            body.extend_from_slice(e);
            // значение backlen при чтении вперёд не проверяется
            body.extend(std::iter::repeat(0u8).take(backlen_size(e.len() as u64)));
        }
        let mut out = Vec::new();
        out.extend_from_slice(&((6 + body.len() + 1) as u32).to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&body);
        out.push(LISTPACK_END);
        out
    }

    /// Тест проверяет границы размеров backlen.
    #[test]
    fn test_backlen_size() {
        assert_eq!(backlen_size(1), 1);
        assert_eq!(backlen_size(127), 1);
        assert_eq!(backlen_size(128), 2);
        assert_eq!(backlen_size(16383), 3);
        assert_eq!(backlen_size(1 << 30), 5);
    }

    /// Тест проверяет целочисленные кодировки listpack.
    #[test]
    fn test_integer_encodings() {
        let blob = build(
            &[
                &[0x05],
                &[0xDF, 0xFF],
                &[0xC0, 0x64],
                &[0xF1, 0x00, 0x80],
                &[0xF2, 0xFF, 0xFF, 0x7F],
                &[0xF3, 0xFF, 0xFF, 0xFF, 0xFF],
                &[0xF4, 0, 0, 0, 0, 0, 0, 0, 0x80],
            ],
            7,
        );
        let walk = walk_listpack(&blob, 0).unwrap();
        assert_eq!(
            walk.entries,
            vec![
                ZipEntry::Int(5),
                ZipEntry::Int(-1),
                ZipEntry::Int(100),
                ZipEntry::Int(-32768),
                ZipEntry::Int(8_388_607),
                ZipEntry::Int(-1),
                ZipEntry::Int(i64::MIN),
            ]
        );
    }

    /// Тест проверяет строковые кодировки, включая длинный backlen.
    #[test]
    fn test_string_encodings() {
        let mid = vec![b'm'; 200];
        let mut e12 = vec![0xE0, 200];
        e12.extend_from_slice(&mid);
        let mut e32 = vec![0xF0, 3, 0, 0, 0];
        e32.extend_from_slice(b"big");

        let blob = build(&[&[0x82, b'f', b'1'], &e12, &e32], 3);
        let walk = walk_listpack(&blob, 0).unwrap();
        assert_eq!(walk.entries[0], ZipEntry::Bytes(b"f1"));
        assert_eq!(walk.entries[1], ZipEntry::Bytes(&mid[..]));
        assert_eq!(walk.entries[2], ZipEntry::Bytes(b"big"));
        assert_eq!(walk.finding("listpack"), None);
    }

    /// Тест проверяет зарезервированную кодировку.
    #[test]
    fn test_reserved_encoding() {
        let blob = build(&[&[0xF5]], 1);
        let err = walk_listpack(&blob, 0).unwrap_err();
        assert!(matches!(err, RdbError::BadEncoding { offset: Some(6), .. }));
    }

    #[test]
    fn test_missing_terminator() {
        let mut blob = build(&[&[0x01]], 1);
        blob.pop();
        assert!(walk_listpack(&blob, 0).is_err());
    }
}
