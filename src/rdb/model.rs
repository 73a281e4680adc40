use bytes::Bytes;
use num_enum::TryFromPrimitive;
use ordered_float::OrderedFloat;
use serde::Serialize;
use zrdb_error::RdbErrorKind;

use super::FormatVersion;

/// Логический вид значения ключа.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum KeyKind {
    String,
    List,
    Set,
    Hash,
    ZSet,
}

/// Байт типа значения на диске.
///
/// `num_enum::TryFromPrimitive` даёт `TryFrom<u8>`; байт 8 не назначен и
/// потому не конвертируется.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TryFromPrimitive)]
#[repr(u8)]
pub enum ValueType {
    String = 0,
    List = 1,
    Set = 2,
    ZSet = 3,
    Hash = 4,
    ZSet2 = 5,
    ModulePreGa = 6,
    Module2 = 7,
    HashZipmap = 9,
    ListZiplist = 10,
    SetIntset = 11,
    ZSetZiplist = 12,
    HashZiplist = 13,
    ListQuicklist = 14,
    StreamListpacks = 15,
    HashListpack = 16,
    ZSetListpack = 17,
    ListQuicklist2 = 18,
    StreamListpacks2 = 19,
    SetListpack = 20,
    StreamListpacks3 = 21,
    /// Хэши с TTL полей (7.4): предварительные и финальные раскладки
    HashMetadataPreGa = 22,
    HashListpackExPreGa = 23,
    HashMetadata = 24,
    HashListpackEx = 25,
}

impl ValueType {
    /// Логический вид; `None` для модулей, стримов и хэшей с TTL полей.
    pub fn kind(self) -> Option<KeyKind> {
        use ValueType::*;
        match self {
            String => Some(KeyKind::String),
            List | ListZiplist | ListQuicklist | ListQuicklist2 => Some(KeyKind::List),
            Set | SetIntset | SetListpack => Some(KeyKind::Set),
            ZSet | ZSet2 | ZSetZiplist | ZSetListpack => Some(KeyKind::ZSet),
            Hash | HashZipmap | HashZiplist | HashListpack => Some(KeyKind::Hash),
            ModulePreGa | Module2 | StreamListpacks | StreamListpacks2 | StreamListpacks3
            | HashMetadataPreGa | HashListpackExPreGa | HashMetadata | HashListpackEx => None,
        }
    }

    /// Минимальная версия формата, в которой тип допустим.
    pub fn min_version(self) -> u32 {
        match self {
            Self::HashListpack
            | Self::ZSetListpack
            | Self::ListQuicklist2
            | Self::StreamListpacks2
            | Self::SetListpack => FormatVersion::LISTPACKS,
            Self::StreamListpacks3 => 11,
            Self::HashMetadataPreGa
            | Self::HashListpackExPreGa
            | Self::HashMetadata
            | Self::HashListpackEx => FormatVersion::FIELD_TTL,
            _ => FormatVersion::MIN,
        }
    }
}

/// Сводка по одному логическому ключу.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeySummary {
    /// Номер базы из последнего select-db.
    pub db: u64,
    /// Имя ключа; произвольные байты.
    pub name: Bytes,
    pub kind: KeyKind,
    /// Байт типа, которым значение было записано.
    pub encoding: ValueType,
    pub element_count: u64,
    /// Для строки - длина после декодирования; для контейнеров - суммарный
    /// размер внутренних блобов либо элементов.
    pub value_bytes: Option<u64>,
    /// Абсолютное время истечения, мс с эпохи.
    pub expire_at_ms: Option<u64>,
    pub idle_seconds: Option<u64>,
    pub frequency: Option<u8>,
}

impl KeySummary {
    /// Имя ключа для логов и сообщений об ошибках.
    pub fn display_name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Раскрытые элементы значения.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Elements {
    /// Строковое значение целиком.
    String(Bytes),
    List(Vec<Bytes>),
    /// Члены intset представлены десятичным текстом.
    Set(Vec<Bytes>),
    Hash(Vec<(Bytes, Bytes)>),
    ZSet(Vec<(Bytes, OrderedFloat<f64>)>),
}

impl Elements {
    /// Число логических элементов.
    pub fn len(&self) -> usize {
        match self {
            Self::String(_) => 1,
            Self::List(v) | Self::Set(v) => v.len(),
            Self::Hash(v) => v.len(),
            Self::ZSet(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Событие потокового разбора снапшота.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Заголовок прочитан
    HeaderSeen { version: u32 },
    /// Пара метаданных
    AuxPair { key: Bytes, value: Bytes },
    /// Смена текущей базы
    DbSelected { db: u64 },
    /// Подсказка размеров базы
    ResizeHint { total: u64, expire: u64 },
    /// Пропущенные данные модуля
    ModuleAux { module_id: u64 },
    /// Библиотека функций
    Function { code: Bytes },
    /// Ключ со сводкой и, при включённом сборе, элементами
    Key {
        summary: KeySummary,
        elements: Option<Elements>,
    },
    /// Значение модуля или стрима; разбор остановлен без ошибки
    Unsupported {
        key: Bytes,
        value_type: ValueType,
        offset: u64,
    },
    /// Конец потока и сырые байты контрольной суммы
    Eof { checksum: [u8; 8] },
    /// Фатальная ошибка; после неё событий нет
    Error {
        kind: RdbErrorKind,
        offset: Option<u64>,
        message: String,
    },
}

impl Event {
    /// После этого события итератор больше ничего не отдаёт.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Eof { .. } | Self::Error { .. } | Self::Unsupported { .. }
        )
    }
}
