use byteorder::LittleEndian;
use zrdb_error::RdbError;

use super::Finding;
use crate::rdb::{ByteCursor, ByteSource, DecodeResult};

const INTSET_HEADER_LEN: usize = 8;

/// Разобранный intset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntSet {
    /// Ширина элемента: 2, 4 или 8 байт.
    pub width: u32,
    pub values: Vec<i64>,
    /// Байты после последнего элемента.
    pub trailing_bytes: usize,
}

impl IntSet {
    /// Лишние байты в хвосте как расхождение размеров.
    pub fn finding(&self) -> Option<Finding> {
        if self.trailing_bytes == 0 {
            return None;
        }
        let declared = (INTSET_HEADER_LEN + self.values.len() * self.width as usize) as u64;
        Some(Finding {
            structure: "intset",
            declared,
            observed: declared + self.trailing_bytes as u64,
        })
    }
}

/// Разбирает intset: ширина (u32 LE), счётчик (u32 LE), затем значения LE.
pub fn parse_intset(
    blob: &[u8],
    base: u64,
) -> DecodeResult<IntSet> {
    let mut cur = ByteCursor::with_base(blob, base);

    let width = cur.read_u32::<LittleEndian>("reading intset encoding")?;
    if !matches!(width, 2 | 4 | 8) {
        return Err(RdbError::BadEncoding {
            structure: "intset".to_string(),
            reason: format!("invalid element width {width}"),
            offset: Some(base),
            key: None,
        });
    }
    let count = cur.read_u32::<LittleEndian>("reading intset length")? as usize;

    let mut values = Vec::with_capacity(count.min(cur.remaining() / width as usize));
    for _ in 0..count {
        let v = match width {
            2 => i64::from(cur.read_i16::<LittleEndian>("reading intset element")?),
            4 => i64::from(cur.read_i32::<LittleEndian>("reading intset element")?),
            _ => cur.read_i64::<LittleEndian>("reading intset element")?,
        };
        values.push(v);
    }

    Ok(IntSet {
        width,
        values,
        trailing_bytes: cur.remaining(),
    })
}
