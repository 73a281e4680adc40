//! Ziplist: заголовок из 10 байт, записи и терминатор 0xFF.
//!
//! Запись начинается длиной предыдущей записи (1 байт, либо 0xFE и u32 LE),
//! за ней байт кодировки, определяющий строку или целое.

use byteorder::{BigEndian, LittleEndian};
use zrdb_error::RdbError;

use super::{Walk, ZipEntry};
use crate::rdb::{ByteCursor, ByteSource, DecodeResult};

/// Терминатор ziplist.
pub const ZIPLIST_END: u8 = 0xFF;
/// Признак 4-байтовой длины предыдущей записи.
const ZIPLIST_BIG_PREVLEN: u8 = 0xFE;
/// Счётчик записей, означающий «не помещается в u16».
pub const ZIPLIST_UNKNOWN_LEN: u16 = 0xFFFF;

const ZIP_INT_16B: u8 = 0xC0;
const ZIP_INT_32B: u8 = 0xD0;
const ZIP_INT_64B: u8 = 0xE0;
const ZIP_INT_24B: u8 = 0xF0;
const ZIP_INT_8B: u8 = 0xFE;
const ZIP_INT_IMM_MIN: u8 = 0xF1;
const ZIP_INT_IMM_MAX: u8 = 0xFD;

/// Заголовок ziplist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZiplistHeader {
    pub total_bytes: u32,
    pub tail_offset: u32,
    pub entry_count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    Running,
    Terminated,
    Failed,
}

/// Итератор по записям ziplist.
///
/// Останавливается на терминаторе. Если блоб кончился раньше терминатора,
/// отдаёт [`RdbError::BadEncoding`].
#[derive(Debug, Clone)]
pub struct ZiplistIter<'a> {
    cursor: ByteCursor<'a>,
    header: ZiplistHeader,
    state: WalkState,
}

impl<'a> ZiplistIter<'a> {
    /// Читает заголовок и готовит обход.
    pub fn new(
        blob: &'a [u8],
        base: u64,
    ) -> DecodeResult<Self> {
        let mut cursor = ByteCursor::with_base(blob, base);
        let header = ZiplistHeader {
            total_bytes: cursor.read_u32::<LittleEndian>("reading ziplist total bytes")?,
            tail_offset: cursor.read_u32::<LittleEndian>("reading ziplist tail offset")?,
            entry_count: cursor.read_u16::<LittleEndian>("reading ziplist length")?,
        };
        Ok(Self {
            cursor,
            header,
            state: WalkState::Running,
        })
    }

    pub fn header(&self) -> &ZiplistHeader {
        &self.header
    }

    /// Счётчик из заголовка, если он известен.
    pub fn declared_len(&self) -> Option<u64> {
        (self.header.entry_count != ZIPLIST_UNKNOWN_LEN).then_some(u64::from(self.header.entry_count))
    }

    /// Позиция курсора внутри блоба.
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    /// Обход дошёл до терминатора.
    pub fn is_terminated(&self) -> bool {
        self.state == WalkState::Terminated
    }

    fn bad(
        &self,
        reason: String,
        offset: u64,
    ) -> RdbError {
        RdbError::BadEncoding {
            structure: "ziplist".to_string(),
            reason,
            offset: Some(offset),
            key: None,
        }
    }

    fn next_entry(&mut self) -> DecodeResult<Option<ZipEntry<'a>>> {
        let Some(first) = self.cursor.peek() else {
            return Err(self.bad(
                "blob ends without terminator".to_string(),
                self.cursor.offset(),
            ));
        };
        if first == ZIPLIST_END {
            self.cursor.skip(1, "reading ziplist terminator")?;
            return Ok(None);
        }

        let prevlen = self.cursor.read_u8("reading ziplist prevlen")?;
        if prevlen == ZIPLIST_BIG_PREVLEN {
            self.cursor
                .read_u32::<LittleEndian>("reading ziplist prevlen")?;
        }

        let enc_offset = self.cursor.offset();
        let enc = self.cursor.read_u8("reading ziplist entry encoding")?;
        let entry = match enc >> 6 {
            0 => {
                let len = usize::from(enc & 0x3F);
                ZipEntry::Bytes(self.cursor.take(len, "reading ziplist string")?)
            }
            1 => {
                let low = self.cursor.read_u8("reading ziplist 14-bit length")?;
                let len = (usize::from(enc & 0x3F) << 8) | usize::from(low);
                ZipEntry::Bytes(self.cursor.take(len, "reading ziplist string")?)
            }
            2 => {
                let len = self
                    .cursor
                    .read_u32::<BigEndian>("reading ziplist 32-bit length")?;
                ZipEntry::Bytes(self.cursor.take(len as usize, "reading ziplist string")?)
            }
            _ => match enc {
                ZIP_INT_16B => ZipEntry::Int(i64::from(
                    self.cursor.read_i16::<LittleEndian>("reading ziplist int16")?,
                )),
                ZIP_INT_32B => ZipEntry::Int(i64::from(
                    self.cursor.read_i32::<LittleEndian>("reading ziplist int32")?,
                )),
                ZIP_INT_64B => ZipEntry::Int(
                    self.cursor.read_i64::<LittleEndian>("reading ziplist int64")?,
                ),
                ZIP_INT_24B => ZipEntry::Int(i64::from(
                    self.cursor.read_i24::<LittleEndian>("reading ziplist int24")?,
                )),
                ZIP_INT_8B => ZipEntry::Int(i64::from(self.cursor.read_i8("reading ziplist int8")?)),
                ZIP_INT_IMM_MIN..=ZIP_INT_IMM_MAX => ZipEntry::Int(i64::from(enc - ZIP_INT_IMM_MIN)),
                other => {
                    return Err(self.bad(format!("reserved entry encoding 0x{other:02X}"), enc_offset));
                }
            },
        };
        Ok(Some(entry))
    }
}

impl<'a> Iterator for ZiplistIter<'a> {
    type Item = DecodeResult<ZipEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != WalkState::Running {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.state = WalkState::Terminated;
                None
            }
            Err(e) => {
                self.state = WalkState::Failed;
                Some(Err(e))
            }
        }
    }
}

/// Обходит ziplist целиком.
pub fn walk_ziplist(
    blob: &[u8],
    base: u64,
) -> DecodeResult<Walk<'_>> {
    let iter = ZiplistIter::new(blob, base)?;
    let declared = iter.declared_len();
    let entries = iter.collect::<DecodeResult<Vec<_>>>()?;
    Ok(Walk { entries, declared })
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
