//! Распаковка LZF-строк.
//!
//! Сам алгоритм берётся из крейта `lzf`. Здесь только проверки вокруг него:
//! заявленная длина должна быть достижима из размера входа и совпасть с
//! фактической.

use zrdb_error::RdbError;

use super::DecodeResult;

/// Наибольший выход на байт входа: ссылка из 3 байт даёт до 264 байт.
pub const MAX_EXPANSION: usize = 88;

/// Распаковывает `input` ровно в `expected_len` байт.
pub fn decompress(
    input: &[u8],
    expected_len: usize,
) -> DecodeResult<Vec<u8>> {
    if expected_len > input.len().saturating_mul(MAX_EXPANSION) {
        return Err(failed(
            "declared length unreachable from input size".to_string(),
            expected_len,
            None,
        ));
    }

    let out = lzf::decompress(input, expected_len)
        .map_err(|e| failed(format!("{e:?}"), expected_len, None))?;

    if out.len() != expected_len {
        return Err(failed(
            "output shorter than declared length".to_string(),
            expected_len,
            Some(out.len()),
        ));
    }
    Ok(out)
}

fn failed(
    reason: String,
    expected: usize,
    got: Option<usize>,
) -> RdbError {
    RdbError::DecompressionFailed {
        reason,
        offset: None,
        key: None,
        expected_len: Some(expected as u64),
        got_len: got.map(|n| n as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет чистый литеральный отрезок.
    #[test]
    fn test_literal_only() {
        let input = [0x04, b'h', b'e', b'l', b'l', b'o'];
        assert_eq!(decompress(&input, 5).unwrap(), b"hello");
    }

    /// Тест проверяет обратную ссылку с перекрытием (повтор одного байта).
    #[test]
    fn test_overlapping_backref() {
        // "a" литералом, затем ссылка len=3+2=5 на смещение 1
        let input = [0x00, b'a', 0x60, 0x00];
        assert_eq!(decompress(&input, 6).unwrap(), b"aaaaaa");
    }

    /// Тест проверяет длинную ссылку с байтом продолжения длины.
    #[test]
    fn test_extended_length_backref() {
        // "ab", затем ссылка: 7 + 3 + 2 = 12 байт со смещением 2
        let input = [0x01, b'a', b'b', 0xE0, 0x03, 0x01];
        let out = decompress(&input, 14).unwrap();
        assert_eq!(out, b"ababababababab");
    }

    /// Тест проверяет, что несовпадение с заявленной длиной - ошибка.
    #[test]
    fn test_length_mismatch() {
        let input = [0x02, b'a', b'b', b'c'];
        let err = decompress(&input, 4).unwrap_err();
        assert!(matches!(
            err,
            RdbError::DecompressionFailed {
                expected_len: Some(4),
                ..
            }
        ));
    }

    /// Тест проверяет, что недостижимая длина отклоняется до распаковки.
    #[test]
    fn test_unreachable_length_rejected() {
        let input = [0x00, b'a'];
        let err = decompress(&input, 2 * MAX_EXPANSION + 1).unwrap_err();
        assert!(matches!(
            err,
            RdbError::DecompressionFailed { ref reason, got_len: None, .. }
                if reason.contains("unreachable")
        ));
    }

    /// Тест проверяет ссылку за начало вывода.
    #[test]
    fn test_backref_out_of_bounds() {
        let input = [0x00, b'a', 0x20, 0x05];
        assert!(decompress(&input, 4).is_err());
    }

    /// Тест проверяет обрезанный литерал.
    #[test]
    fn test_truncated_literal() {
        let input = [0x05, b'a'];
        assert!(decompress(&input, 6).is_err());
    }
}
