use byteorder::LittleEndian;
use zrdb_error::RdbError;

use super::Finding;
use crate::rdb::{ByteCursor, ByteSource, DecodeResult};

const ZIPMAP_BIGLEN: u8 = 254;
const ZIPMAP_END: u8 = 255;

/// Разобранный zipmap (устаревшая кодировка хэша, тип 9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zipmap<'a> {
    /// Число пар из заголовка, если оно меньше 254.
    pub declared: Option<u64>,
    pub pairs: Vec<(&'a [u8], &'a [u8])>,
}

impl Zipmap<'_> {
    pub fn finding(&self) -> Option<Finding> {
        let observed = self.pairs.len() as u64;
        self.declared
            .filter(|&d| d != observed)
            .map(|declared| Finding {
                structure: "zipmap",
                declared,
                observed,
            })
    }
}

fn read_len(
    cur: &mut ByteCursor<'_>,
    what: &str,
) -> DecodeResult<usize> {
    let start = cur.offset();
    match cur.read_u8(what)? {
        ZIPMAP_BIGLEN => Ok(cur.read_u32::<LittleEndian>(what)? as usize),
        ZIPMAP_END => Err(RdbError::BadEncoding {
            structure: "zipmap".to_string(),
            reason: format!("unexpected end marker while {what}"),
            offset: Some(start),
            key: None,
        }),
        n => Ok(usize::from(n)),
    }
}

/// Разбирает zipmap: zmlen, затем пары `len key len free value` до 0xFF.
pub fn parse_zipmap(
    blob: &[u8],
    base: u64,
) -> DecodeResult<Zipmap<'_>> {
    let mut cur = ByteCursor::with_base(blob, base);
    let zmlen = cur.read_u8("reading zipmap length")?;
    let declared = (zmlen < ZIPMAP_BIGLEN).then_some(u64::from(zmlen));

    let mut pairs = Vec::new();
    loop {
        match cur.peek() {
            None => {
                return Err(RdbError::BadEncoding {
                    structure: "zipmap".to_string(),
                    reason: "blob ends without terminator".to_string(),
                    offset: Some(cur.offset()),
                    key: None,
                });
            }
            Some(ZIPMAP_END) => {
                cur.skip(1, "reading zipmap terminator")?;
                break;
            }
            Some(_) => {}
        }

        let klen = read_len(&mut cur, "reading zipmap field length")?;
        let field = cur.take(klen, "reading zipmap field")?;
        let vlen = read_len(&mut cur, "reading zipmap value length")?;
        let free = cur.read_u8("reading zipmap free count")?;
        let value = cur.take(vlen, "reading zipmap value")?;
        cur.skip(usize::from(free), "skipping zipmap free space")?;
        pairs.push((field, value));
    }

    Ok(Zipmap { declared, pairs })
}
