//! Декодеры контейнеров, вложенных в значение как непрозрачная строка.
//!
//! Каждый блоб сначала целиком читается строкой (с возможной LZF-распаковкой),
//! а затем разбирается отдельным курсором. Позиция внешнего потока при этом
//! не используется, элементы заимствуются из блоба без копирования.
//!
//! - [`intset`] - массив знаковых целых фиксированной ширины
//! - [`ziplist`] - список записей со ссылкой на длину предыдущей
//! - [`listpack`] - список записей с обратной длиной (версия >= 10)
//! - [`quicklist`] - цепочка узлов-ziplist/listpack во внешнем потоке
//! - [`zipmap`] - устаревшая компактная кодировка хэша

pub mod intset;
pub mod listpack;
pub mod quicklist;
pub mod ziplist;
pub mod zipmap;

use bytes::Bytes;
pub use intset::*;
pub use listpack::*;
pub use quicklist::*;
pub use ziplist::*;
pub use zipmap::*;

use super::string::{int_text, parse_f64};

/// Запись ziplist/listpack: байты или целое.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZipEntry<'a> {
    Bytes(&'a [u8]),
    Int(i64),
}

impl ZipEntry<'_> {
    /// Владеющее байтовое представление; целые становятся десятичным текстом.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Bytes(b) => Bytes::copy_from_slice(b),
            Self::Int(v) => int_text(*v),
        }
    }

    /// Значение как f64 (для очков ZSet).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bytes(b) => parse_f64(b),
            Self::Int(v) => Some(*v as f64),
        }
    }
}

/// Несовпадение заявленного в заголовке и фактически прочитанного.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finding {
    pub structure: &'static str,
    pub declared: u64,
    pub observed: u64,
}

/// Результат полного обхода ziplist или listpack.
#[derive(Debug, Clone, PartialEq)]
pub struct Walk<'a> {
    pub entries: Vec<ZipEntry<'a>>,
    /// Счётчик из заголовка; `None`, если заголовок пишет «неизвестно».
    pub declared: Option<u64>,
}

impl Walk<'_> {
    /// Расхождение счётчика заголовка с числом записей, если оно есть.
    pub fn finding(
        &self,
        structure: &'static str,
    ) -> Option<Finding> {
        let observed = self.entries.len() as u64;
        self.declared
            .filter(|&declared| declared != observed)
            .map(|declared| Finding {
                structure,
                declared,
                observed,
            })
    }
}
