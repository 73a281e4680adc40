use byteorder::LittleEndian;
use bytes::Bytes;
use zrdb_error::RdbError;

use super::{
    length::{read_length, read_length_with_encoding, RdbLength},
    lzf,
    tags::{DOUBLE_NAN, DOUBLE_NEG_INF, DOUBLE_POS_INF, ENC_INT16, ENC_INT32, ENC_INT8, ENC_LZF},
    ByteSource, DecodeResult,
};

/// Как строка была записана на диске.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    /// Сырые байты заданной длины
    Raw,
    /// Целое i8/i16/i32, развёрнутое в десятичный текст
    Int,
    /// LZF-сжатый блок
    Lzf,
}

/// Читает строку и возвращает её байты.
pub fn read_string<S: ByteSource>(src: &mut S) -> DecodeResult<Bytes> {
    read_string_with_encoding(src).map(|(data, _)| data)
}

/// Читает строку вместе с признаком кодировки.
///
/// Строки не обязаны быть UTF-8 и возвращаются байт в байт.
pub fn read_string_with_encoding<S: ByteSource>(
    src: &mut S
) -> DecodeResult<(Bytes, StringEncoding)> {
    let start = src.offset();

    let len = match read_length_with_encoding(src)? {
        RdbLength::Len(n) => n,
        RdbLength::Encoded(ENC_INT8) => {
            let v = src.read_i8("reading int8 string")?;
            return Ok((int_text(i64::from(v)), StringEncoding::Int));
        }
        RdbLength::Encoded(ENC_INT16) => {
            let v = src.read_i16::<LittleEndian>("reading int16 string")?;
            return Ok((int_text(i64::from(v)), StringEncoding::Int));
        }
        RdbLength::Encoded(ENC_INT32) => {
            let v = src.read_i32::<LittleEndian>("reading int32 string")?;
            return Ok((int_text(i64::from(v)), StringEncoding::Int));
        }
        RdbLength::Encoded(ENC_LZF) => {
            let data = read_lzf(src, start)?;
            return Ok((data, StringEncoding::Lzf));
        }
        RdbLength::Encoded(other) => {
            return Err(RdbError::BadEncoding {
                structure: "string".to_string(),
                reason: format!("unknown string encoding {other}"),
                offset: Some(start),
                key: None,
            });
        }
    };

    let data = src.read_blob(len, "reading string payload")?;
    Ok((data, StringEncoding::Raw))
}

/// Читает строку с вложенным контейнером и смещение начала её данных.
///
/// Для сжатых строк смещением служит начало записи: позиции внутри
/// распакованного блоба не соответствуют байтам файла.
pub fn read_container_blob<S: ByteSource>(src: &mut S) -> DecodeResult<(Bytes, u64)> {
    let start = src.offset();
    let (data, encoding) = read_string_with_encoding(src)?;
    let base = match encoding {
        StringEncoding::Raw => src.offset() - data.len() as u64,
        StringEncoding::Int | StringEncoding::Lzf => start,
    };
    Ok((data, base))
}

fn read_lzf<S: ByteSource>(
    src: &mut S,
    start: u64,
) -> DecodeResult<Bytes> {
    let compressed_len = read_length(src)?;
    let raw_len = read_length(src)?;

    let limit = src.max_blob_size().min(usize::MAX as u64);
    if raw_len > limit {
        return Err(RdbError::SizeLimit {
            what: "LZF output".to_string(),
            size: raw_len,
            limit,
            offset: Some(start),
        });
    }
    let compressed = src.read_blob(compressed_len, "reading LZF payload")?;
    let expected = raw_len as usize;

    lzf::decompress(&compressed, expected)
        .map(Bytes::from)
        .map_err(|e| e.with_offset(start))
}

/// Читает double в текстовой форме ZSet-v1.
///
/// Байт длины 253/254/255 кодирует NaN, +inf и -inf, иначе следует столько же
/// ASCII-байт числа.
pub fn read_double<S: ByteSource>(src: &mut S) -> DecodeResult<f64> {
    let start = src.offset();
    let len = src.read_u8("reading double length")?;
    match len {
        DOUBLE_NAN => Ok(f64::NAN),
        DOUBLE_POS_INF => Ok(f64::INFINITY),
        DOUBLE_NEG_INF => Ok(f64::NEG_INFINITY),
        n => {
            let text = src.read_blob(u64::from(n), "reading double text")?;
            parse_f64(&text).ok_or_else(|| RdbError::BadEncoding {
                structure: "double".to_string(),
                reason: format!("not a number: {:?}", String::from_utf8_lossy(&text)),
                offset: Some(start),
                key: None,
            })
        }
    }
}

/// Разбирает текстовое число с плавающей точкой.
pub(crate) fn parse_f64(text: &[u8]) -> Option<f64> {
    std::str::from_utf8(text).ok()?.trim().parse::<f64>().ok()
}

/// Десятичное представление целого как байтовая строка.
pub(crate) fn int_text(v: i64) -> Bytes {
    Bytes::from(v.to_string())
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
