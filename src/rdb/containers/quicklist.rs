use bytes::Bytes;
use zrdb_error::RdbError;

use super::{walk_listpack, walk_ziplist, Walk, ZipEntry};
use crate::rdb::{
    length::read_length,
    string::read_container_blob,
    tags::{QUICKLIST_NODE_PACKED, QUICKLIST_NODE_PLAIN},
    ByteSource, DecodeResult,
};

/// Формат узлов quicklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuicklistFormat {
    /// Тип 14: каждый узел - ziplist.
    Ziplist,
    /// Тип 18: перед каждым узлом длина-контейнер (PLAIN или PACKED).
    Listpack,
}

/// Узел quicklist, прочитанный из внешнего потока.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuicklistNode {
    /// Одиночный большой элемент без упаковки.
    Plain(Bytes),
    Ziplist { blob: Bytes, base: u64 },
    Listpack { blob: Bytes, base: u64 },
}

impl QuicklistNode {
    /// Размер блоба узла.
    pub fn blob_len(&self) -> u64 {
        match self {
            Self::Plain(b) => b.len() as u64,
            Self::Ziplist { blob, .. } | Self::Listpack { blob, .. } => blob.len() as u64,
        }
    }

    /// Обходит элементы узла.
    pub fn walk(&self) -> DecodeResult<Walk<'_>> {
        match self {
            Self::Plain(b) => Ok(Walk {
                entries: vec![ZipEntry::Bytes(b)],
                declared: None,
            }),
            Self::Ziplist { blob, base } => walk_ziplist(blob, *base),
            Self::Listpack { blob, base } => walk_listpack(blob, *base),
        }
    }
}

/// Итератор по узлам quicklist.
///
/// Узлы читаются из внешнего потока по одному, так что в памяти держится
/// только текущий блоб.
pub struct QuicklistNodes<'s, S: ByteSource> {
    src: &'s mut S,
    format: QuicklistFormat,
    remaining: u64,
    failed: bool,
}

impl<'s, S: ByteSource> QuicklistNodes<'s, S> {
    /// Читает число узлов и готовит обход.
    pub fn new(
        src: &'s mut S,
        format: QuicklistFormat,
    ) -> DecodeResult<Self> {
        let remaining = read_length(src)?;
        Ok(Self {
            src,
            format,
            remaining,
            failed: false,
        })
    }

    /// Сколько узлов ещё не прочитано.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn read_node(&mut self) -> DecodeResult<QuicklistNode> {
        match self.format {
            QuicklistFormat::Ziplist => {
                let (blob, base) = read_container_blob(&mut *self.src)?;
                Ok(QuicklistNode::Ziplist { blob, base })
            }
            QuicklistFormat::Listpack => {
                let start = self.src.offset();
                let container = read_length(&mut *self.src)?;
                let (blob, base) = read_container_blob(&mut *self.src)?;
                match container {
                    QUICKLIST_NODE_PLAIN => Ok(QuicklistNode::Plain(blob)),
                    QUICKLIST_NODE_PACKED => Ok(QuicklistNode::Listpack { blob, base }),
                    other => Err(RdbError::BadEncoding {
                        structure: "quicklist".to_string(),
                        reason: format!("unknown node container {other}"),
                        offset: Some(start),
                        key: None,
                    }),
                }
            }
        }
    }
}

impl<S: ByteSource> Iterator for QuicklistNodes<'_, S> {
    type Item = DecodeResult<QuicklistNode>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let node = self.read_node();
        self.failed = node.is_err();
        Some(node)
    }
}
