//! Декодирование значения по байту типа.
//!
//! Хэш-табличные варианты читаются прямо из внешнего потока, компактные
//! кодировки сначала читаются строкой-блобом и разбираются декодерами из
//! [`containers`](super::containers).

use byteorder::LittleEndian;
use bytes::Bytes;
use ordered_float::OrderedFloat;
use zrdb_error::RdbError;

use super::{
    containers::{
        parse_intset, parse_zipmap, walk_listpack, walk_ziplist, Finding, QuicklistFormat,
        QuicklistNodes, Walk, ZipEntry,
    },
    length::read_length,
    string::{int_text, read_container_blob, read_double, read_string, read_string_with_encoding},
    ByteSource, DecodeResult, Elements, ValueType,
};

/// Результат декодирования одного значения.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedValue {
    pub element_count: u64,
    pub value_bytes: Option<u64>,
    /// `None`, если сбор элементов выключен.
    pub elements: Option<Elements>,
    /// Расхождения заголовков контейнеров с фактическим содержимым.
    pub findings: Vec<Finding>,
}

/// Компактная упаковка блоба.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Packing {
    Ziplist,
    Listpack,
}

impl Packing {
    fn name(self) -> &'static str {
        match self {
            Self::Ziplist => "ziplist",
            Self::Listpack => "listpack",
        }
    }

    fn walk(
        self,
        blob: &[u8],
        base: u64,
    ) -> DecodeResult<Walk<'_>> {
        match self {
            Self::Ziplist => walk_ziplist(blob, base),
            Self::Listpack => walk_listpack(blob, base),
        }
    }
}

/// Считает элементы и, если нужно, складывает их.
struct Sink<T> {
    items: Option<Vec<T>>,
    count: u64,
}

impl<T> Sink<T> {
    fn new(collect: bool) -> Self {
        Self {
            items: collect.then(Vec::new),
            count: 0,
        }
    }

    fn push_with(
        &mut self,
        make: impl FnOnce() -> T,
    ) {
        self.count += 1;
        if let Some(items) = &mut self.items {
            items.push(make());
        }
    }

    fn finish(
        self,
        wrap: fn(Vec<T>) -> Elements,
        value_bytes: u64,
        findings: Vec<Finding>,
    ) -> DecodedValue {
        DecodedValue {
            element_count: self.count,
            value_bytes: Some(value_bytes),
            elements: self.items.map(wrap),
            findings,
        }
    }
}

/// Декодирует значение типа `value_type` из внешнего потока.
///
/// Модули и стримы не раскрываются: для них возвращается
/// [`RdbError::UnsupportedRecord`].
pub fn read_value<S: ByteSource>(
    src: &mut S,
    value_type: ValueType,
    collect: bool,
) -> DecodeResult<DecodedValue> {
    let offset = src.offset();
    match value_type {
        ValueType::String => read_plain_string(src, collect),
        ValueType::List => read_string_seq(src, collect, Elements::List),
        ValueType::Set => read_string_seq(src, collect, Elements::Set),
        ValueType::Hash => read_hash_table(src, collect),
        ValueType::ZSet => read_zset_table(src, collect, false),
        ValueType::ZSet2 => read_zset_table(src, collect, true),
        ValueType::HashZipmap => read_zipmap_hash(src, collect),
        ValueType::SetIntset => read_intset(src, collect),
        ValueType::ListZiplist => read_packed_seq(src, collect, Packing::Ziplist, Elements::List),
        ValueType::SetListpack => read_packed_seq(src, collect, Packing::Listpack, Elements::Set),
        ValueType::HashZiplist => read_packed_hash(src, collect, Packing::Ziplist),
        ValueType::HashListpack => read_packed_hash(src, collect, Packing::Listpack),
        ValueType::ZSetZiplist => read_packed_zset(src, collect, Packing::Ziplist),
        ValueType::ZSetListpack => read_packed_zset(src, collect, Packing::Listpack),
        ValueType::ListQuicklist => read_quicklist(src, collect, QuicklistFormat::Ziplist),
        ValueType::ListQuicklist2 => read_quicklist(src, collect, QuicklistFormat::Listpack),
        ValueType::ModulePreGa
        | ValueType::Module2
        | ValueType::StreamListpacks
        | ValueType::StreamListpacks2
        | ValueType::StreamListpacks3
        | ValueType::HashMetadataPreGa
        | ValueType::HashListpackExPreGa
        | ValueType::HashMetadata
        | ValueType::HashListpackEx => Err(RdbError::UnsupportedRecord {
            what: format!("{value_type:?} value"),
            offset: Some(offset),
            key: None,
        }),
    }
}

fn read_plain_string<S: ByteSource>(
    src: &mut S,
    collect: bool,
) -> DecodeResult<DecodedValue> {
    let (data, _) = read_string_with_encoding(src)?;
    Ok(DecodedValue {
        element_count: 1,
        value_bytes: Some(data.len() as u64),
        elements: collect.then(|| Elements::String(data)),
        findings: Vec::new(),
    })
}

fn read_string_seq<S: ByteSource>(
    src: &mut S,
    collect: bool,
    wrap: fn(Vec<Bytes>) -> Elements,
) -> DecodeResult<DecodedValue> {
    let count = read_length(src)?;
    let mut sink = Sink::new(collect);
    let mut bytes = 0;
    for _ in 0..count {
        let item = read_string(src)?;
        bytes += item.len() as u64;
        sink.push_with(|| item);
    }
    Ok(sink.finish(wrap, bytes, Vec::new()))
}

fn read_hash_table<S: ByteSource>(
    src: &mut S,
    collect: bool,
) -> DecodeResult<DecodedValue> {
    let count = read_length(src)?;
    let mut sink = Sink::new(collect);
    let mut bytes = 0;
    for _ in 0..count {
        let field = read_string(src)?;
        let value = read_string(src)?;
        bytes += (field.len() + value.len()) as u64;
        sink.push_with(|| (field, value));
    }
    Ok(sink.finish(Elements::Hash, bytes, Vec::new()))
}

fn read_zset_table<S: ByteSource>(
    src: &mut S,
    collect: bool,
    binary_scores: bool,
) -> DecodeResult<DecodedValue> {
    let count = read_length(src)?;
    let mut sink = Sink::new(collect);
    let mut bytes = 0;
    for _ in 0..count {
        let member = read_string(src)?;
        let score = if binary_scores {
            src.read_f64::<LittleEndian>("reading zset score")?
        } else {
            read_double(src)?
        };
        bytes += member.len() as u64;
        sink.push_with(|| (member, OrderedFloat(score)));
    }
    Ok(sink.finish(Elements::ZSet, bytes, Vec::new()))
}

fn read_zipmap_hash<S: ByteSource>(
    src: &mut S,
    collect: bool,
) -> DecodeResult<DecodedValue> {
    let (blob, base) = read_container_blob(src)?;
    let map = parse_zipmap(&blob, base)?;
    let mut sink = Sink::new(collect);
    for (field, value) in &map.pairs {
        sink.push_with(|| (Bytes::copy_from_slice(field), Bytes::copy_from_slice(value)));
    }
    let findings = map.finding().into_iter().collect();
    Ok(sink.finish(Elements::Hash, blob.len() as u64, findings))
}

fn read_intset<S: ByteSource>(
    src: &mut S,
    collect: bool,
) -> DecodeResult<DecodedValue> {
    let (blob, base) = read_container_blob(src)?;
    let set = parse_intset(&blob, base)?;
    let mut sink = Sink::new(collect);
    for &v in &set.values {
        sink.push_with(|| int_text(v));
    }
    let findings = set.finding().into_iter().collect();
    Ok(sink.finish(Elements::Set, blob.len() as u64, findings))
}

fn read_packed_seq<S: ByteSource>(
    src: &mut S,
    collect: bool,
    packing: Packing,
    wrap: fn(Vec<Bytes>) -> Elements,
) -> DecodeResult<DecodedValue> {
    let (blob, base) = read_container_blob(src)?;
    let walk = packing.walk(&blob, base)?;
    let mut sink = Sink::new(collect);
    for entry in &walk.entries {
        sink.push_with(|| entry.to_bytes());
    }
    let findings = walk.finding(packing.name()).into_iter().collect();
    Ok(sink.finish(wrap, blob.len() as u64, findings))
}

/// Разбивает записи на пары; непарная последняя запись отбрасывается с
/// отметкой о расхождении.
fn pairs<'w, 'a>(
    entries: &'w [ZipEntry<'a>],
    structure: &'static str,
    findings: &mut Vec<Finding>,
) -> std::slice::ChunksExact<'w, ZipEntry<'a>> {
    if entries.len() % 2 != 0 {
        findings.push(Finding {
            structure,
            declared: entries.len() as u64,
            observed: (entries.len() - 1) as u64,
        });
    }
    entries.chunks_exact(2)
}

fn read_packed_hash<S: ByteSource>(
    src: &mut S,
    collect: bool,
    packing: Packing,
) -> DecodeResult<DecodedValue> {
    let (blob, base) = read_container_blob(src)?;
    let walk = packing.walk(&blob, base)?;
    let mut findings: Vec<Finding> = walk.finding(packing.name()).into_iter().collect();

    let mut sink = Sink::new(collect);
    for pair in pairs(&walk.entries, "hash pairs", &mut findings) {
        sink.push_with(|| (pair[0].to_bytes(), pair[1].to_bytes()));
    }
    Ok(sink.finish(Elements::Hash, blob.len() as u64, findings))
}

fn read_packed_zset<S: ByteSource>(
    src: &mut S,
    collect: bool,
    packing: Packing,
) -> DecodeResult<DecodedValue> {
    let (blob, base) = read_container_blob(src)?;
    let walk = packing.walk(&blob, base)?;
    let mut findings: Vec<Finding> = walk.finding(packing.name()).into_iter().collect();

    let mut sink = Sink::new(collect);
    for pair in pairs(&walk.entries, "zset pairs", &mut findings) {
        let score = pair[1].as_f64().ok_or_else(|| RdbError::BadEncoding {
            structure: format!("{} zset", packing.name()),
            reason: format!("score is not a number: {:?}", pair[1]),
            offset: Some(base),
            key: None,
        })?;
        sink.push_with(|| (pair[0].to_bytes(), OrderedFloat(score)));
    }
    Ok(sink.finish(Elements::ZSet, blob.len() as u64, findings))
}

fn read_quicklist<S: ByteSource>(
    src: &mut S,
    collect: bool,
    format: QuicklistFormat,
) -> DecodeResult<DecodedValue> {
    let structure = match format {
        QuicklistFormat::Ziplist => "quicklist ziplist",
        QuicklistFormat::Listpack => "quicklist listpack",
    };

    let mut sink = Sink::new(collect);
    let mut findings = Vec::new();
    let mut bytes = 0;
    for node in QuicklistNodes::new(src, format)? {
        let node = node?;
        bytes += node.blob_len();
        let walk = node.walk()?;
        findings.extend(walk.finding(structure));
        for entry in &walk.entries {
            sink.push_with(|| entry.to_bytes());
        }
    }
    Ok(sink.finish(Elements::List, bytes, findings))
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
