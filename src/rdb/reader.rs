//! Примитивное чтение: целые фиксированной ширины в явном порядке байт и
//! блоки заданной длины.
//!
//! Формат смешивает порядки: длины от 32 бит пишутся big-endian, а
//! целочисленные строки и поля внутри контейнеров little-endian. Поэтому
//! порядок байт всегда передаётся параметром типа
//! ([`LittleEndian`](byteorder::LittleEndian) / [`BigEndian`](byteorder::BigEndian)).

use std::io::{self, BufReader, Read};

use byteorder::ByteOrder;
use bytes::Bytes;
use zrdb_error::RdbError;

use crc::Digest;

use super::{crc64, DecodeResult};

/// Размер буфера чтения по умолчанию (8 МиБ).
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024 * 1024;

/// Максимальный размер одного блока по умолчанию (512 МиБ).
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 512 * 1024 * 1024;

/// Сколько памяти резервировать под блок заранее, пока данные не прочитаны.
const PREALLOC_LIMIT: u64 = 64 * 1024;

/// Общий интерфейс чтения для внешнего потока и внутренних блобов.
///
/// Любое недочитанное поле превращается в [`RdbError::TruncatedInput`] со
/// смещением начала поля.
pub trait ByteSource {
    /// Абсолютное смещение следующего байта.
    fn offset(&self) -> u64;

    /// Заполняет `buf` целиком.
    fn read_exact_into(
        &mut self,
        buf: &mut [u8],
        context: &str,
    ) -> DecodeResult<()>;

    /// Читает блок из `len` байт во владеющий буфер.
    fn read_blob(
        &mut self,
        len: u64,
        context: &str,
    ) -> DecodeResult<Bytes>;

    /// Наибольший допустимый размер одного блока, в том числе после
    /// распаковки. Внутренние блобы уже ограничены своей длиной.
    fn max_blob_size(&self) -> u64 {
        u64::MAX
    }

    fn read_u8(
        &mut self,
        context: &str,
    ) -> DecodeResult<u8> {
        let mut b = [0u8; 1];
        self.read_exact_into(&mut b, context)?;
        Ok(b[0])
    }

    fn read_i8(
        &mut self,
        context: &str,
    ) -> DecodeResult<i8> {
        Ok(self.read_u8(context)? as i8)
    }

    fn read_u16<B: ByteOrder>(
        &mut self,
        context: &str,
    ) -> DecodeResult<u16> {
        let mut b = [0u8; 2];
        self.read_exact_into(&mut b, context)?;
        Ok(B::read_u16(&b))
    }

    fn read_i16<B: ByteOrder>(
        &mut self,
        context: &str,
    ) -> DecodeResult<i16> {
        let mut b = [0u8; 2];
        self.read_exact_into(&mut b, context)?;
        Ok(B::read_i16(&b))
    }

    /// Знаковое 24-битное целое, расширенное до i32.
    fn read_i24<B: ByteOrder>(
        &mut self,
        context: &str,
    ) -> DecodeResult<i32> {
        let mut b = [0u8; 3];
        self.read_exact_into(&mut b, context)?;
        Ok(B::read_i24(&b))
    }

    fn read_u32<B: ByteOrder>(
        &mut self,
        context: &str,
    ) -> DecodeResult<u32> {
        let mut b = [0u8; 4];
        self.read_exact_into(&mut b, context)?;
        Ok(B::read_u32(&b))
    }

    fn read_i32<B: ByteOrder>(
        &mut self,
        context: &str,
    ) -> DecodeResult<i32> {
        let mut b = [0u8; 4];
        self.read_exact_into(&mut b, context)?;
        Ok(B::read_i32(&b))
    }

    fn read_u64<B: ByteOrder>(
        &mut self,
        context: &str,
    ) -> DecodeResult<u64> {
        let mut b = [0u8; 8];
        self.read_exact_into(&mut b, context)?;
        Ok(B::read_u64(&b))
    }

    fn read_i64<B: ByteOrder>(
        &mut self,
        context: &str,
    ) -> DecodeResult<i64> {
        let mut b = [0u8; 8];
        self.read_exact_into(&mut b, context)?;
        Ok(B::read_i64(&b))
    }

    fn read_f32<B: ByteOrder>(
        &mut self,
        context: &str,
    ) -> DecodeResult<f32> {
        let mut b = [0u8; 4];
        self.read_exact_into(&mut b, context)?;
        Ok(B::read_f32(&b))
    }

    fn read_f64<B: ByteOrder>(
        &mut self,
        context: &str,
    ) -> DecodeResult<f64> {
        let mut b = [0u8; 8];
        self.read_exact_into(&mut b, context)?;
        Ok(B::read_f64(&b))
    }
}

/// Ошибка нехватки байт.
pub(crate) fn truncated(
    context: &str,
    offset: u64,
    expected: u64,
    got: u64,
) -> RdbError {
    RdbError::TruncatedInput {
        context: context.to_string(),
        offset: Some(offset),
        key: None,
        expected_bytes: Some(expected),
        got_bytes: Some(got),
    }
}

/// Reader внешнего потока снапшота.
///
/// Буферизует источник, считает абсолютное смещение и на лету обновляет
/// CRC-64 по всем прочитанным байтам, кроме хвостовой контрольной суммы.
pub struct SnapshotReader<R: Read> {
    inner: BufReader<R>,
    offset: u64,
    digest: Digest<'static, u64>,
    max_blob_size: u64,
}

impl<R: Read> SnapshotReader<R> {
    /// Создаёт reader с размерами по умолчанию.
    pub fn new(reader: R) -> Self {
        Self::with_limits(reader, DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_BLOB_SIZE)
    }

    /// Создаёт reader с заданным буфером и лимитом размера блока.
    pub fn with_limits(
        reader: R,
        buffer_capacity: usize,
        max_blob_size: u64,
    ) -> Self {
        Self {
            inner: BufReader::with_capacity(buffer_capacity, reader),
            offset: 0,
            digest: crc64::digest(),
            max_blob_size,
        }
    }

    /// CRC-64 всех байт, прочитанных до сих пор.
    pub fn checksum(&self) -> u64 {
        self.digest.clone().finalize()
    }

    /// Читает 8 байт контрольной суммы, не добавляя их в CRC.
    pub fn read_trailer(&mut self) -> DecodeResult<[u8; 8]> {
        let mut trailer = [0u8; 8];
        self.read_raw(&mut trailer, "reading checksum trailer", false)?;
        Ok(trailer)
    }

    /// Дочитывает источник до конца и возвращает число лишних байт.
    pub fn drain_remaining(&mut self) -> DecodeResult<u64> {
        let start = self.offset;
        let n = io::copy(&mut self.inner, &mut io::sink())
            .map_err(|e| io_failure("draining trailing bytes", start, 0, e))?;
        self.offset += n;
        Ok(n)
    }

    /// Потребляет reader и возвращает исходный источник.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    fn read_raw(
        &mut self,
        buf: &mut [u8],
        context: &str,
        digest: bool,
    ) -> DecodeResult<()> {
        let start = self.offset;
        let expected = buf.len() as u64;

        let mut got = 0;
        while got < buf.len() {
            match self.inner.read(&mut buf[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_failure(context, start, expected, e)),
            }
        }

        if digest {
            self.digest.update(&buf[..got]);
        }
        self.offset += got as u64;

        if got < buf.len() {
            return Err(truncated(context, start, expected, got as u64));
        }
        Ok(())
    }
}

impl<R: Read> ByteSource for SnapshotReader<R> {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn read_exact_into(
        &mut self,
        buf: &mut [u8],
        context: &str,
    ) -> DecodeResult<()> {
        self.read_raw(buf, context, true)
    }

    fn max_blob_size(&self) -> u64 {
        self.max_blob_size
    }

    fn read_blob(
        &mut self,
        len: u64,
        context: &str,
    ) -> DecodeResult<Bytes> {
        let start = self.offset;
        if len > self.max_blob_size {
            return Err(RdbError::SizeLimit {
                what: context.to_string(),
                size: len,
                limit: self.max_blob_size,
                offset: Some(start),
            });
        }

        // Буфер растёт по мере чтения: заявленная длина может быть ложной.
        let mut data = Vec::with_capacity(len.min(PREALLOC_LIMIT) as usize);
        (&mut self.inner)
            .take(len)
            .read_to_end(&mut data)
            .map_err(|e| io_failure(context, start, len, e))?;

        self.digest.update(&data);
        self.offset += data.len() as u64;

        if (data.len() as u64) < len {
            return Err(truncated(context, start, len, data.len() as u64));
        }
        Ok(Bytes::from(data))
    }
}

/// Ошибка источника тоже считается обрывом входа: поток закрыт извне.
fn io_failure(
    context: &str,
    offset: u64,
    expected: u64,
    err: io::Error,
) -> RdbError {
    RdbError::TruncatedInput {
        context: format!("{context}: {err}"),
        offset: Some(offset),
        key: None,
        expected_bytes: Some(expected),
        got_bytes: None,
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
