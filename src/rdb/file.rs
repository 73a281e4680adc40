use serde::Serialize;
use tracing::warn;
use zrdb_error::RdbError;

use super::DecodeResult;

/// Сигнатура в начале файла: ASCII «REDIS».
pub const RDB_MAGIC: &[u8; 5] = b"REDIS";

/// Полная длина заголовка: сигнатура плюс четыре ASCII-цифры версии.
pub const HEADER_LEN: usize = 9;

/// Версия формата снапшота из заголовка.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FormatVersion(u32);

impl FormatVersion {
    /// Старейшая принимаемая версия.
    pub const MIN: u32 = 1;
    /// Новейшая поддерживаемая версия.
    pub const MAX: u32 = 12;
    /// Версия, где появились 32/64-битные длины. Более старые принимаются с
    /// предупреждением.
    pub const WIDE_LENGTHS: u32 = 7;
    /// Версия, где появились listpack-кодировки и библиотеки функций.
    pub const LISTPACKS: u32 = 10;
    /// Версия, где появились хэши с TTL полей и опкод слотов.
    pub const FIELD_TTL: u32 = 12;

    /// Создаёт версию, проверяя верхнюю границу.
    pub fn new(number: u32) -> DecodeResult<Self> {
        if number > Self::MAX {
            return Err(RdbError::UnsupportedVersion {
                found: number,
                max: Self::MAX,
            });
        }
        if number < Self::MIN {
            return Err(RdbError::BadMagic {
                expected: *RDB_MAGIC,
                got: format!("{number:04}").into_bytes(),
            });
        }
        Ok(Self(number))
    }

    /// Разбирает 9-байтовый заголовок `REDIS` + `NNNN`.
    pub fn from_header(header: &[u8; HEADER_LEN]) -> DecodeResult<Self> {
        let (magic, digits) = header.split_at(RDB_MAGIC.len());
        if magic != RDB_MAGIC {
            return Err(RdbError::BadMagic {
                expected: *RDB_MAGIC,
                got: magic.to_vec(),
            });
        }

        let mut number = 0u32;
        for &d in digits {
            if !d.is_ascii_digit() {
                return Err(RdbError::BadMagic {
                    expected: *RDB_MAGIC,
                    got: header.to_vec(),
                });
            }
            number = number * 10 + u32::from(d - b'0');
        }

        let version = Self::new(number)?;
        if version.is_legacy() {
            warn!(
                version = number,
                "Snapshot predates 64-bit lengths, decoding anyway"
            );
        }
        Ok(version)
    }

    /// Числовое значение версии.
    pub fn number(self) -> u32 {
        self.0
    }

    /// Версия ниже 7 (без 32/64-битных длин).
    pub fn is_legacy(self) -> bool {
        self.0 < Self::WIDE_LENGTHS
    }

    /// Допустимы ли опкоды и типы, появившиеся в `min`.
    pub fn supports(
        self,
        min: u32,
    ) -> bool {
        self.0 >= min
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
