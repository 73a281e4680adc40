//! Разбор RDB-снапшотов.
//!
//! ## Архитектура
//!
//! Снизу вверх:
//! - [`reader`], [`cursor`] - чтение целых фиксированной ширины из внешнего
//!   потока и из внутренних блобов;
//! - [`length`], [`string`], [`lzf`] - самоописывающие длины и строки;
//! - [`containers`] - intset, ziplist, listpack, quicklist, zipmap;
//! - [`value`], [`module`] - декодеры значений по байту типа;
//! - [`parser`] - цикл по опкодам записей;
//! - [`handler`] - обработчики событий;
//! - [`file`], [`crc64`] - заголовок и контрольная сумма.
//!
//! #### Streaming API
//!
//! ```no_run
//! use std::fs::File;
//!
//! use zrdb::rdb::{KeyCollector, SnapshotParser};
//!
//! let file = File::open("dump.rdb")?;
//! let mut parser = SnapshotParser::new(file);
//! let mut handler = KeyCollector::new();
//! parser.parse(&mut handler)?;
//! # Ok::<(), zrdb_error::StackError>(())
//! ```
//!
//! #### Итератор событий
//!
//! ```no_run
//! use std::fs::File;
//!
//! use zrdb::rdb::{Event, SnapshotParser};
//!
//! for event in SnapshotParser::new(File::open("dump.rdb")?) {
//!     if let Event::Key { summary, .. } = event {
//!         println!("{} {:?}", summary.display_name(), summary.kind);
//!     }
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io::Read;

use zrdb_error::{RdbError, ZrdbResult};

pub mod containers;
pub mod crc64;
pub mod cursor;
pub mod file;
pub mod handler;
pub mod length;
pub mod lzf;
pub mod model;
pub mod module;
pub mod parser;
pub mod reader;
pub mod state;
pub mod string;
pub mod tags;
pub mod value;

pub use cursor::ByteCursor;
pub use file::*;
pub use handler::*;
pub use length::{read_length, read_length_with_encoding, RdbLength};
pub use model::*;
pub use parser::SnapshotParser;
pub use reader::{ByteSource, SnapshotReader, DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_BLOB_SIZE};
pub use state::*;
pub use string::{read_double, read_string, read_string_with_encoding, StringEncoding};
pub use value::{read_value, DecodedValue};

use crate::config::ParserConfig;

/// Результат низкоуровневых декодеров. Ошибка остаётся [`RdbError`], чтобы
/// парсер мог дописать в неё имя ключа.
pub type DecodeResult<T> = Result<T, RdbError>;

/// Разбирает снапшот целиком с настройками по умолчанию.
pub fn parse_snapshot<R: Read>(reader: R) -> ZrdbResult<KeyCollector> {
    parse_snapshot_with(reader, ParserConfig::default())
}

/// Разбирает снапшот целиком с явными настройками.
pub fn parse_snapshot_with<R: Read>(
    reader: R,
    config: ParserConfig,
) -> ZrdbResult<KeyCollector> {
    config.validate()?;
    let mut parser = SnapshotParser::with_config(reader, config);
    let mut collector = KeyCollector::new();
    parser.parse(&mut collector)?;
    Ok(collector)
}
