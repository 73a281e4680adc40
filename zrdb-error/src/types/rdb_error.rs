use std::any::Any;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::{ErrorExt, StatusCode};

/// Ошибка разбора RDB-дампа с контекстом для диагностики.
#[derive(Debug, Clone, PartialEq)]
pub enum RdbError {
    /// Данные закончились посреди поля
    TruncatedInput {
        context: String,
        offset: Option<u64>,
        key: Option<String>,
        expected_bytes: Option<u64>,
        got_bytes: Option<u64>,
    },

    /// Неверная сигнатура в заголовке
    BadMagic { expected: [u8; 5], got: Vec<u8> },

    /// Неизвестный опкод внешнего потока
    UnknownOpcode { opcode: u8, offset: Option<u64> },

    /// Недопустимая кодировка длины, строки или контейнера
    BadEncoding {
        structure: String,
        reason: String,
        offset: Option<u64>,
        key: Option<String>,
    },

    /// Запись модуля или стрима, которую парсер не разбирает
    UnsupportedRecord {
        what: String,
        offset: Option<u64>,
        key: Option<String>,
    },

    /// LZF-блок не распаковался в заявленную длину
    DecompressionFailed {
        reason: String,
        offset: Option<u64>,
        key: Option<String>,
        expected_len: Option<u64>,
        got_len: Option<u64>,
    },

    /// Версия формата новее поддерживаемой
    UnsupportedVersion { found: u32, max: u32 },

    /// Контрольная сумма в хвосте не совпала с вычисленной
    ChecksumMismatch { computed: u64, recorded: u64 },

    /// Превышен лимит размера блока
    SizeLimit {
        what: String,
        size: u64,
        limit: u64,
        offset: Option<u64>,
    },
}

/// Плоская классификация [`RdbError`] для события ошибки парсера.
///
/// У каждого варианта ошибки свой вид, включая `SizeLimit`.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RdbErrorKind {
    TruncatedInput,
    BadMagic,
    UnknownOpcode,
    BadEncoding,
    UnsupportedRecord,
    DecompressionFailed,
    UnsupportedVersion,
    ChecksumMismatch,
    SizeLimit,
    /// Ошибка, пришедшая не из декодера (например, из handler'а)
    Other,
}

impl RdbError {
    /// Добавляет контекст offset к ошибке.
    pub fn with_offset(
        mut self,
        offset: u64,
    ) -> Self {
        match &mut self {
            Self::TruncatedInput { offset: o, .. }
            | Self::UnknownOpcode { offset: o, .. }
            | Self::BadEncoding { offset: o, .. }
            | Self::UnsupportedRecord { offset: o, .. }
            | Self::DecompressionFailed { offset: o, .. }
            | Self::SizeLimit { offset: o, .. } => {
                *o = Some(offset);
            }
            _ => {}
        }
        self
    }

    /// Добавляет контекст ключа к ошибке, если ключ ещё не задан.
    pub fn with_key(
        mut self,
        key: impl Into<String>,
    ) -> Self {
        match &mut self {
            Self::TruncatedInput { key: k, .. }
            | Self::BadEncoding { key: k, .. }
            | Self::UnsupportedRecord { key: k, .. }
            | Self::DecompressionFailed { key: k, .. } => {
                if k.is_none() {
                    *k = Some(key.into());
                }
            }
            _ => {}
        }
        self
    }

    /// Смещение, на котором была обнаружена ошибка.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::TruncatedInput { offset, .. }
            | Self::UnknownOpcode { offset, .. }
            | Self::BadEncoding { offset, .. }
            | Self::UnsupportedRecord { offset, .. }
            | Self::DecompressionFailed { offset, .. }
            | Self::SizeLimit { offset, .. } => *offset,
            Self::BadMagic { .. } => Some(0),
            Self::UnsupportedVersion { .. } => Some(5),
            Self::ChecksumMismatch { .. } => None,
        }
    }

    /// Вид ошибки без полей.
    pub fn kind(&self) -> RdbErrorKind {
        match self {
            Self::TruncatedInput { .. } => RdbErrorKind::TruncatedInput,
            Self::BadMagic { .. } => RdbErrorKind::BadMagic,
            Self::UnknownOpcode { .. } => RdbErrorKind::UnknownOpcode,
            Self::BadEncoding { .. } => RdbErrorKind::BadEncoding,
            Self::UnsupportedRecord { .. } => RdbErrorKind::UnsupportedRecord,
            Self::DecompressionFailed { .. } => RdbErrorKind::DecompressionFailed,
            Self::UnsupportedVersion { .. } => RdbErrorKind::UnsupportedVersion,
            Self::ChecksumMismatch { .. } => RdbErrorKind::ChecksumMismatch,
            Self::SizeLimit { .. } => RdbErrorKind::SizeLimit,
        }
    }

    /// Возвращает recovery hint для пользователя.
    pub fn recovery_hint(&self) -> Option<&'static str> {
        match self {
            Self::TruncatedInput { .. } => Some("File may be truncated. Check file integrity"),
            Self::BadMagic { .. } => Some("The input is not an RDB snapshot"),
            Self::UnsupportedVersion { .. } => {
                Some("The snapshot was written by a newer server version")
            }
            Self::UnsupportedRecord { .. } => {
                Some("Enable stop_on_unsupported to keep the keys read so far")
            }
            Self::ChecksumMismatch { .. } => {
                Some("File may be corrupted. Try re-downloading or using a backup")
            }
            Self::SizeLimit { .. } => Some("Increase max_blob_size in the parser configuration"),
            _ => None,
        }
    }
}

impl std::fmt::Display for RdbError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::TruncatedInput {
                context,
                offset,
                key,
                expected_bytes,
                got_bytes,
            } => {
                write!(f, "Truncated input: {context}")?;
                if let (Some(exp), Some(got)) = (expected_bytes, got_bytes) {
                    write!(f, " (expected {exp} bytes, got {got})")?;
                }
                write_context(f, *offset, key.as_deref())
            }
            Self::BadMagic { expected, got } => {
                write!(
                    f,
                    "Bad magic: expected {:?}, got {:?}",
                    String::from_utf8_lossy(expected),
                    String::from_utf8_lossy(got),
                )
            }
            Self::UnknownOpcode { opcode, offset } => {
                write!(f, "Unknown opcode 0x{opcode:02X}")?;
                write_context(f, *offset, None)
            }
            Self::BadEncoding {
                structure,
                reason,
                offset,
                key,
            } => {
                write!(f, "Bad encoding in {structure}: {reason}")?;
                write_context(f, *offset, key.as_deref())
            }
            Self::UnsupportedRecord { what, offset, key } => {
                write!(f, "Unsupported record: {what}")?;
                write_context(f, *offset, key.as_deref())
            }
            Self::DecompressionFailed {
                reason,
                offset,
                key,
                expected_len,
                got_len,
            } => {
                write!(f, "LZF decompression failed: {reason}")?;
                if let (Some(exp), Some(got)) = (expected_len, got_len) {
                    write!(f, " (expected {exp} bytes, got {got})")?;
                }
                write_context(f, *offset, key.as_deref())
            }
            Self::UnsupportedVersion { found, max } => {
                write!(f, "Unsupported RDB version {found} (max supported: {max})")
            }
            Self::ChecksumMismatch { computed, recorded } => {
                write!(
                    f,
                    "Checksum mismatch: computed 0x{computed:016X}, recorded 0x{recorded:016X}",
                )
            }
            Self::SizeLimit {
                what,
                size,
                limit,
                offset,
            } => {
                write!(f, "{what} size {size} exceeds limit {limit} bytes")?;
                write_context(f, *offset, None)
            }
        }
    }
}

/// Форматирование контекста (offset, key).
fn write_context(
    f: &mut std::fmt::Formatter<'_>,
    offset: Option<u64>,
    key: Option<&str>,
) -> std::fmt::Result {
    let mut parts = Vec::new();
    if let Some(o) = offset {
        parts.push(format!("offset: 0x{o:X}"));
    }
    if let Some(k) = key {
        parts.push(format!("key: {k}"));
    }
    if !parts.is_empty() {
        write!(f, " [{}]", parts.join(", "))?;
    }
    Ok(())
}

impl std::error::Error for RdbError {}

impl std::fmt::Display for RdbErrorKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl ErrorExt for RdbError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::TruncatedInput { .. } => StatusCode::UnexpectedEof,
            Self::BadMagic { .. } => StatusCode::InvalidData,
            Self::UnknownOpcode { .. } => StatusCode::ParseError,
            Self::BadEncoding { .. } => StatusCode::DecodingError,
            Self::UnsupportedRecord { .. } => StatusCode::Unsupported,
            Self::DecompressionFailed { .. } => StatusCode::CompressionFailed,
            Self::UnsupportedVersion { .. } => StatusCode::UnsupportedVersion,
            Self::ChecksumMismatch { .. } => StatusCode::CorruptedData,
            Self::SizeLimit { .. } => StatusCode::SizeLimit,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// Конверсия в std::io::Error для кода, работающего с io::Result
impl From<RdbError> for std::io::Error {
    fn from(e: RdbError) -> Self {
        let kind = match &e {
            RdbError::TruncatedInput { .. } => std::io::ErrorKind::UnexpectedEof,
            RdbError::UnsupportedRecord { .. } | RdbError::UnsupportedVersion { .. } => {
                std::io::ErrorKind::Unsupported
            }
            RdbError::SizeLimit { .. } => std::io::ErrorKind::InvalidInput,
            _ => std::io::ErrorKind::InvalidData,
        };

        std::io::Error::new(kind, e.to_string())
    }
}
