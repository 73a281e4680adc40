use bytes::Bytes;

use super::{reader::truncated, ByteSource, DecodeResult};

/// Курсор по внутреннему блобу контейнера.
///
/// Заимствует блоб без копирования. `base` задаёт абсолютное смещение начала
/// блоба во внешнем потоке, чтобы ошибки внутри контейнера указывали на
/// реальную позицию в файле.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    pub fn with_base(
        data: &'a [u8],
        base: u64,
    ) -> Self {
        Self { data, pos: 0, base }
    }

    /// Позиция относительно начала блоба.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Следующий байт без сдвига курсора.
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Непрочитанный хвост.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Заимствует следующие `n` байт.
    pub fn take(
        &mut self,
        n: usize,
        context: &str,
    ) -> DecodeResult<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(truncated(
                context,
                self.offset(),
                n as u64,
                available as u64,
            ));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(
        &mut self,
        n: usize,
        context: &str,
    ) -> DecodeResult<()> {
        self.take(n, context).map(|_| ())
    }
}

impl ByteSource for ByteCursor<'_> {
    fn offset(&self) -> u64 {
        self.base + self.pos as u64
    }

    fn read_exact_into(
        &mut self,
        buf: &mut [u8],
        context: &str,
    ) -> DecodeResult<()> {
        let src = self.take(buf.len(), context)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn read_blob(
        &mut self,
        len: u64,
        context: &str,
    ) -> DecodeResult<Bytes> {
        let n = usize::try_from(len).unwrap_or(usize::MAX);
        self.take(n, context).map(Bytes::copy_from_slice)
    }
}
