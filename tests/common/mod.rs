//! Сборщик снапшотов для интеграционных тестов.
//!
//! Пишет байты формата вручную: длины, строки, контейнеры и хвост с
//! настоящей CRC-64.

#![allow(dead_code)]

use zrdb::rdb::{crc64::crc64, tags::*};

/// Запись ziplist/listpack для сборки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Item<'a> {
    Str(&'a [u8]),
    Int(i64),
}

/// Префикс длины в самой короткой форме.
pub fn length(n: u64) -> Vec<u8> {
    if n < 64 {
        vec![n as u8]
    } else if n < 16384 {
        vec![0x40 | (n >> 8) as u8, (n & 0xFF) as u8]
    } else if n <= u64::from(u32::MAX) {
        let mut out = vec![LEN_32BIT];
        out.extend_from_slice(&(n as u32).to_be_bytes());
        out
    } else {
        let mut out = vec![LEN_64BIT];
        out.extend_from_slice(&n.to_be_bytes());
        out
    }
}

/// Обычная строка: длина и байты.
pub fn string(data: &[u8]) -> Vec<u8> {
    let mut out = length(data.len() as u64);
    out.extend_from_slice(data);
    out
}

/// Строка, закодированная целым минимальной ширины.
pub fn int_string(v: i64) -> Vec<u8> {
    if let Ok(v) = i8::try_from(v) {
        vec![0xC0 | ENC_INT8, v as u8]
    } else if let Ok(v) = i16::try_from(v) {
        let mut out = vec![0xC0 | ENC_INT16];
        out.extend_from_slice(&v.to_le_bytes());
        out
    } else {
        let v = i32::try_from(v).expect("integer string must fit in i32");
        let mut out = vec![0xC0 | ENC_INT32];
        out.extend_from_slice(&v.to_le_bytes());
        out
    }
}

/// LZF-строка из одних литеральных отрезков (до 32 байт каждый).
pub fn lzf_string(data: &[u8]) -> Vec<u8> {
    let mut compressed = Vec::new();
    for chunk in data.chunks(32) {
        compressed.push((chunk.len() - 1) as u8);
        compressed.extend_from_slice(chunk);
    }
    let mut out = vec![0xC0 | ENC_LZF];
    out.extend(length(compressed.len() as u64));
    out.extend(length(data.len() as u64));
    out.extend(compressed);
    out
}

fn ziplist_entry(
    item: Item<'_>,
    prev: usize,
) -> Vec<u8> {
    let mut out = Vec::new();
    if prev < 254 {
        out.push(prev as u8);
    } else {
        out.push(0xFE);
        out.extend_from_slice(&(prev as u32).to_le_bytes());
    }
    match item {
        Item::Str(s) => {
            let n = s.len();
            if n < 64 {
                out.push(n as u8);
            } else if n < 16384 {
                out.push(0x40 | (n >> 8) as u8);
                out.push((n & 0xFF) as u8);
            } else {
                out.push(0x80);
                out.extend_from_slice(&(n as u32).to_be_bytes());
            }
            out.extend_from_slice(s);
        }
        Item::Int(v @ 0..=12) => out.push(0xF1 + v as u8),
        Item::Int(v) => {
            if let Ok(v) = i8::try_from(v) {
                out.push(0xFE);
                out.push(v as u8);
            } else if let Ok(v) = i16::try_from(v) {
                out.push(0xC0);
                out.extend_from_slice(&v.to_le_bytes());
            } else if (-(1 << 23)..(1 << 23)).contains(&v) {
                out.push(0xF0);
                out.extend_from_slice(&(v as i32).to_le_bytes()[..3]);
            } else if let Ok(v) = i32::try_from(v) {
                out.push(0xD0);
                out.extend_from_slice(&v.to_le_bytes());
            } else {
                out.push(0xE0);
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    out
}

/// Ziplist с заданным счётчиком в заголовке.
pub fn ziplist_with_count(
    items: &[Item<'_>],
    count: u16,
) -> Vec<u8> {
    let mut body = Vec::new();
    let mut prev = 0;
    let mut tail = 10;
    for &item in items {
        tail = 10 + body.len();
        let entry = ziplist_entry(item, prev);
        prev = entry.len();
        body.extend(entry);
    }
    let mut out = Vec::new();
    out.extend_from_slice(&((10 + body.len() + 1) as u32).to_le_bytes());
    out.extend_from_slice(&(tail as u32).to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend(body);
    out.push(0xFF);
    out
}

pub fn ziplist(items: &[Item<'_>]) -> Vec<u8> {
    ziplist_with_count(items, items.len().min(0xFFFF) as u16)
}

fn backlen(size: usize) -> Vec<u8> {
    let n = zrdb::rdb::containers::backlen_size(size as u64);
    let mut out = vec![0u8; n];
    out[0] = (size & 0x7F) as u8;
    out
}

fn listpack_entry(item: Item<'_>) -> Vec<u8> {
    let mut out = Vec::new();
    match item {
        Item::Int(v @ 0..=127) => out.push(v as u8),
        Item::Int(v) => {
            out.push(0xF4);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Item::Str(s) if s.len() < 64 => {
            out.push(0x80 | s.len() as u8);
            out.extend_from_slice(s);
        }
        Item::Str(s) if s.len() < 4096 => {
            out.push(0xE0 | (s.len() >> 8) as u8);
            out.push((s.len() & 0xFF) as u8);
            out.extend_from_slice(s);
        }
        Item::Str(s) => {
            out.push(0xF0);
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(s);
        }
    }
    let size = out.len();
    out.extend(backlen(size));
    out
}

/// Listpack с заданным счётчиком в заголовке.
pub fn listpack_with_count(
    items: &[Item<'_>],
    count: u16,
) -> Vec<u8> {
    let body: Vec<u8> = items.iter().flat_map(|&i| listpack_entry(i)).collect();
    let mut out = Vec::new();
    out.extend_from_slice(&((6 + body.len() + 1) as u32).to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend(body);
    out.push(0xFF);
    out
}

pub fn listpack(items: &[Item<'_>]) -> Vec<u8> {
    listpack_with_count(items, items.len().min(0xFFFF) as u16)
}

/// Intset заданной ширины.
pub fn intset(
    width: u32,
    values: &[i64],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for &v in values {
        match width {
            2 => out.extend_from_slice(&(v as i16).to_le_bytes()),
            4 => out.extend_from_slice(&(v as i32).to_le_bytes()),
            _ => out.extend_from_slice(&v.to_le_bytes()),
        }
    }
    out
}

fn zipmap_len(n: usize) -> Vec<u8> {
    if n < 254 {
        vec![n as u8]
    } else {
        let mut out = vec![254];
        out.extend_from_slice(&(n as u32).to_le_bytes());
        out
    }
}

/// Zipmap без свободного места в значениях.
pub fn zipmap(pairs: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut out = vec![pairs.len().min(254) as u8];
    for (field, value) in pairs {
        out.extend(zipmap_len(field.len()));
        out.extend_from_slice(field);
        out.extend(zipmap_len(value.len()));
        out.push(0);
        out.extend_from_slice(value);
    }
    out.push(0xFF);
    out
}

/// Пошаговая сборка снапшота.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    buf: Vec<u8>,
}

impl SnapshotBuilder {
    pub fn new(version: u32) -> Self {
        Self {
            buf: format!("REDIS{version:04}").into_bytes(),
        }
    }

    pub fn raw(
        mut self,
        bytes: &[u8],
    ) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn aux(
        self,
        key: &[u8],
        value: &[u8],
    ) -> Self {
        self.raw(&[OPCODE_AUX]).raw(&string(key)).raw(&string(value))
    }

    pub fn select_db(
        self,
        db: u64,
    ) -> Self {
        self.raw(&[OPCODE_SELECTDB]).raw(&length(db))
    }

    pub fn resize_db(
        self,
        total: u64,
        expire: u64,
    ) -> Self {
        self.raw(&[OPCODE_RESIZEDB])
            .raw(&length(total))
            .raw(&length(expire))
    }

    pub fn expire_ms(
        self,
        ms: u64,
    ) -> Self {
        self.raw(&[OPCODE_EXPIRETIME_MS]).raw(&ms.to_le_bytes())
    }

    pub fn expire_s(
        self,
        secs: u32,
    ) -> Self {
        self.raw(&[OPCODE_EXPIRETIME]).raw(&secs.to_le_bytes())
    }

    pub fn idle(
        self,
        secs: u64,
    ) -> Self {
        self.raw(&[OPCODE_IDLE]).raw(&length(secs))
    }

    pub fn freq(
        self,
        freq: u8,
    ) -> Self {
        self.raw(&[OPCODE_FREQ, freq])
    }

    /// Ключ: байт типа, имя и уже закодированное значение.
    pub fn key(
        self,
        type_byte: u8,
        name: &[u8],
        payload: &[u8],
    ) -> Self {
        self.raw(&[type_byte]).raw(&string(name)).raw(payload)
    }

    pub fn string_key(
        self,
        name: &[u8],
        value: &[u8],
    ) -> Self {
        self.key(0, name, &string(value))
    }

    /// Ключ, значение которого - строка-блоб контейнера.
    pub fn blob_key(
        self,
        type_byte: u8,
        name: &[u8],
        blob: &[u8],
    ) -> Self {
        self.key(type_byte, name, &string(blob))
    }

    /// Тело без EOF и хвоста.
    pub fn body(self) -> Vec<u8> {
        self.buf
    }

    /// EOF и корректная CRC-64.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.push(OPCODE_EOF);
        let crc = crc64(&self.buf);
        self.buf.extend_from_slice(&crc.to_le_bytes());
        self.buf
    }

    /// EOF и произвольный хвост.
    pub fn finish_with_trailer(
        mut self,
        trailer: [u8; 8],
    ) -> Vec<u8> {
        self.buf.push(OPCODE_EOF);
        self.buf.extend_from_slice(&trailer);
        self.buf
    }
}
