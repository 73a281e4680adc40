//! CRC-64 снапшота (Jones, отражённый, init = 0, xorout = 0).
//!
//! Сумма считается по всем байтам от сигнатуры до опкода EOF включительно и
//! пишется в хвост little-endian.

use crc::{Crc, Digest, CRC_64_REDIS};

/// Параметры суммы, которой сервер подписывает снапшот.
pub static SNAPSHOT_CRC: Crc<u64> = Crc::<u64>::new(&CRC_64_REDIS);

/// Потоковый вычислитель суммы.
pub fn digest() -> Digest<'static, u64> {
    SNAPSHOT_CRC.digest()
}

/// CRC-64 одного буфера.
pub fn crc64(data: &[u8]) -> u64 {
    SNAPSHOT_CRC.checksum(data)
}
