//! Байтовые константы внешнего потока RDB.
//!
//! Опкоды 0xF4..=0xFF отвечают за разметку потока, значения 0..=25 являются
//! типами значений (см. [`ValueType`](super::ValueType)). Диспетчер обязан
//! сравнивать сырой байт с этими константами до любой интерпретации.

/// Размеры слота кластера, версия >= 12
pub const OPCODE_SLOT_INFO: u8 = 0xF4;
/// Библиотека функций (код скрипта), версия >= 10
pub const OPCODE_FUNCTION2: u8 = 0xF5;
/// Вспомогательные данные модуля
pub const OPCODE_MODULE_AUX: u8 = 0xF7;
/// LRU idle-время следующего ключа (секунды)
pub const OPCODE_IDLE: u8 = 0xF8;
/// LFU-частота следующего ключа
pub const OPCODE_FREQ: u8 = 0xF9;
/// Пара метаданных (aux)
pub const OPCODE_AUX: u8 = 0xFA;
/// Подсказка размеров хэш-таблиц базы
pub const OPCODE_RESIZEDB: u8 = 0xFB;
/// Абсолютное время истечения в миллисекундах
pub const OPCODE_EXPIRETIME_MS: u8 = 0xFC;
/// Абсолютное время истечения в секундах
pub const OPCODE_EXPIRETIME: u8 = 0xFD;
/// Выбор базы данных
pub const OPCODE_SELECTDB: u8 = 0xFE;
/// Конец потока, за ним 8 байт контрольной суммы
pub const OPCODE_EOF: u8 = 0xFF;

/// Длина следует 32-битным big-endian числом
pub const LEN_32BIT: u8 = 0x80;
/// Длина следует 64-битным big-endian числом
pub const LEN_64BIT: u8 = 0x81;

/// Строка хранится как i8
pub const ENC_INT8: u8 = 0;
/// Строка хранится как i16 LE
pub const ENC_INT16: u8 = 1;
/// Строка хранится как i32 LE
pub const ENC_INT32: u8 = 2;
/// Строка сжата LZF
pub const ENC_LZF: u8 = 3;

/// Опкоды самоописывающего потока значения модуля.
pub const MODULE_OPCODE_EOF: u64 = 0;
pub const MODULE_OPCODE_SINT: u64 = 1;
pub const MODULE_OPCODE_UINT: u64 = 2;
pub const MODULE_OPCODE_FLOAT: u64 = 3;
pub const MODULE_OPCODE_DOUBLE: u64 = 4;
pub const MODULE_OPCODE_STRING: u64 = 5;

/// Длина double в ZSet-v1, означающая NaN
pub const DOUBLE_NAN: u8 = 253;
/// Длина double в ZSet-v1, означающая +inf
pub const DOUBLE_POS_INF: u8 = 254;
/// Длина double в ZSet-v1, означающая -inf
pub const DOUBLE_NEG_INF: u8 = 255;

/// Контейнер узла quicklist v2: одиночный элемент
pub const QUICKLIST_NODE_PLAIN: u64 = 1;
/// Контейнер узла quicklist v2: listpack
pub const QUICKLIST_NODE_PACKED: u64 = 2;
