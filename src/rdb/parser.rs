//! Потоковый парсер снапшота.
//!
//! Парсер читает поток строго вперёд и отдаёт по одному событию за вызов:
//! заголовок, метаданные, смены баз, ключи и, наконец, хвост с контрольной
//! суммой. Модификаторы (expire, idle, freq) не порождают событий, а
//! применяются к следующему ключу.
//!
//! Есть три способа потреблять события:
//! - [`SnapshotParser::next_event`] - явный `Result` на каждый шаг;
//! - [`Iterator`] - ошибка превращается в [`Event::Error`];
//! - [`SnapshotParser::parse`] - события передаются в [`ParseHandler`].

use std::io::Read;

use byteorder::LittleEndian;
use tracing::{debug, info, trace, warn};
use zrdb_error::{RdbError, RdbErrorKind, ResultExt, StackError, ZrdbResult};

use super::{
    file::HEADER_LEN,
    handler::ParseHandler,
    length::read_length,
    module::{module_type_name, skip_module_aux},
    state::{ChecksumStatus, Inconsistency, ParseStats, ParserState},
    string::read_string,
    tags::*,
    value::read_value,
    ByteSource, DecodeResult, Event, FormatVersion, KeySummary, SnapshotReader, ValueType,
};
use crate::config::ParserConfig;

/// Фаза разбора.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Body(FormatVersion),
    Finished,
}

/// Потоковый парсер RDB-снапшота поверх любого `Read`.
pub struct SnapshotParser<R: Read> {
    reader: SnapshotReader<R>,
    config: ParserConfig,
    state: ParserState,
    stats: ParseStats,
    version: Option<FormatVersion>,
    phase: Phase,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<R: Read> SnapshotParser<R> {
    /// Создаёт парсер с настройками по умолчанию.
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, ParserConfig::default())
    }

    /// Создаёт парсер с явными настройками.
    pub fn with_config(
        reader: R,
        config: ParserConfig,
    ) -> Self {
        let reader =
            SnapshotReader::with_limits(reader, config.buffer_capacity, config.max_blob_size);
        Self {
            reader,
            config,
            state: ParserState::default(),
            stats: ParseStats::default(),
            version: None,
            phase: Phase::Header,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Возвращает статистику разбора.
    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// Версия формата (если заголовок уже прочитан).
    pub fn version(&self) -> Option<FormatVersion> {
        self.version
    }

    /// Текущая база данных.
    pub fn current_db(&self) -> u64 {
        self.state.db
    }

    /// Разбор завершён (EOF, ошибка или остановка на неподдерживаемой записи).
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Потребляет парсер и возвращает исходный reader.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    /// Читает следующее событие.
    ///
    /// `Ok(None)` означает, что разбор завершён. После первой ошибки парсер
    /// больше ничего не читает.
    pub fn next_event(&mut self) -> ZrdbResult<Option<Event>> {
        let result = match self.phase {
            Phase::Finished => return Ok(None),
            Phase::Header => self.read_header(),
            Phase::Body(version) => self.read_record(version),
        };
        self.stats.bytes_read = self.reader.offset();

        match result {
            Ok(event) => {
                if event.is_terminal() {
                    self.phase = Phase::Finished;
                }
                Ok(Some(event))
            }
            Err(err) => {
                self.phase = Phase::Finished;
                self.state.discard_pending();
                Err(StackError::from(err))
            }
        }
    }

    /// Прогоняет весь поток через обработчик.
    ///
    /// При ошибке разбора обработчик сначала получает [`Event::Error`], затем
    /// ошибка возвращается вызывающему.
    pub fn parse<H: ParseHandler>(
        &mut self,
        handler: &mut H,
    ) -> ZrdbResult<()> {
        loop {
            match self.next_event() {
                Ok(Some(event)) => handler
                    .handle_event(event)
                    .context("Handler rejected snapshot event")?,
                Ok(None) => break,
                Err(err) => {
                    handler.handle_event(error_event(&err))?;
                    return Err(err);
                }
            }
        }
        handler.finalize()
    }

    fn read_header(&mut self) -> DecodeResult<Event> {
        let mut header = [0u8; HEADER_LEN];
        self.reader.read_exact_into(&mut header, "reading header")?;
        let version = FormatVersion::from_header(&header)?;

        self.version = Some(version);
        self.stats.version = Some(version.number());
        self.phase = Phase::Body(version);
        debug!(version = version.number(), "Snapshot header accepted");
        Ok(Event::HeaderSeen {
            version: version.number(),
        })
    }

    /// Читает записи, пока не наберётся одно событие.
    fn read_record(
        &mut self,
        version: FormatVersion,
    ) -> DecodeResult<Event> {
        loop {
            let offset = self.reader.offset();
            let opcode = self.reader.read_u8("reading opcode")?;
            match opcode {
                OPCODE_EXPIRETIME_MS => {
                    let ms = self.reader.read_u64::<LittleEndian>("reading expire-ms")?;
                    self.state.pending.expire_at_ms = Some(ms);
                }
                OPCODE_EXPIRETIME => {
                    let secs = self.reader.read_u32::<LittleEndian>("reading expire-s")?;
                    self.state.pending.expire_at_ms = Some(u64::from(secs) * 1000);
                }
                OPCODE_IDLE => {
                    self.state.pending.idle_seconds = Some(read_length(&mut self.reader)?);
                }
                OPCODE_FREQ => {
                    self.state.pending.frequency = Some(self.reader.read_u8("reading freq")?);
                }
                OPCODE_AUX => {
                    self.discard_modifiers(opcode);
                    let key = read_string(&mut self.reader)?;
                    let value = read_string(&mut self.reader)?;
                    self.stats.aux_fields += 1;
                    debug!(
                        key = %String::from_utf8_lossy(&key),
                        value = %String::from_utf8_lossy(&value),
                        "Aux field"
                    );
                    return Ok(Event::AuxPair { key, value });
                }
                OPCODE_SELECTDB => {
                    self.discard_modifiers(opcode);
                    let db = read_length(&mut self.reader)?;
                    self.state.db = db;
                    debug!(db, offset, "Database selected");
                    return Ok(Event::DbSelected { db });
                }
                OPCODE_RESIZEDB => {
                    self.discard_modifiers(opcode);
                    let total = read_length(&mut self.reader)?;
                    let expire = read_length(&mut self.reader)?;
                    debug!(db = self.state.db, total, expire, "Resize hint");
                    return Ok(Event::ResizeHint { total, expire });
                }
                OPCODE_MODULE_AUX => {
                    self.discard_modifiers(opcode);
                    let header = skip_module_aux(&mut self.reader)?;
                    debug!(
                        module = %module_type_name(header.module_id),
                        when = header.when,
                        "Module aux skipped"
                    );
                    return Ok(Event::ModuleAux {
                        module_id: header.module_id,
                    });
                }
                OPCODE_SLOT_INFO if version.supports(FormatVersion::FIELD_TTL) => {
                    self.discard_modifiers(opcode);
                    let slot = read_length(&mut self.reader)?;
                    let size = read_length(&mut self.reader)?;
                    let expires = read_length(&mut self.reader)?;
                    trace!(slot, size, expires, "Slot info skipped");
                }
                OPCODE_FUNCTION2 if version.supports(FormatVersion::LISTPACKS) => {
                    self.discard_modifiers(opcode);
                    let code = read_string(&mut self.reader)?;
                    debug!(bytes = code.len(), "Function library");
                    return Ok(Event::Function { code });
                }
                OPCODE_EOF => {
                    self.discard_modifiers(opcode);
                    return self.read_trailer();
                }
                type_byte => return self.read_key(version, type_byte, offset),
            }
        }
    }

    fn read_key(
        &mut self,
        version: FormatVersion,
        type_byte: u8,
        offset: u64,
    ) -> DecodeResult<Event> {
        let value_type = ValueType::try_from(type_byte)
            .ok()
            .filter(|vt| version.supports(vt.min_version()))
            .ok_or(RdbError::UnknownOpcode {
                opcode: type_byte,
                offset: Some(offset),
            })?;

        let name = read_string(&mut self.reader)?;
        let label = String::from_utf8_lossy(&name).into_owned();

        let Some(kind) = value_type.kind() else {
            self.state.discard_pending();
            if self.config.stop_on_unsupported {
                warn!(key = %label, ?value_type, offset, "Stopping at unsupported value");
                return Ok(Event::Unsupported {
                    key: name,
                    value_type,
                    offset,
                });
            }
            return Err(RdbError::UnsupportedRecord {
                what: format!("{value_type:?} value"),
                offset: Some(offset),
                key: Some(label),
            });
        };

        let decoded = read_value(&mut self.reader, value_type, self.config.collect_elements)
            .map_err(|e| e.with_key(label.clone()))?;
        let pending = self.state.take_pending();

        for finding in decoded.findings {
            warn!(
                key = %label,
                offset,
                structure = finding.structure,
                declared = finding.declared,
                observed = finding.observed,
                "Container header disagrees with its contents"
            );
            self.stats.inconsistencies.push(Inconsistency {
                key: name.clone(),
                offset,
                structure: finding.structure,
                declared: finding.declared,
                observed: finding.observed,
            });
        }

        let summary = KeySummary {
            db: self.state.db,
            name,
            kind,
            encoding: value_type,
            element_count: decoded.element_count,
            value_bytes: decoded.value_bytes,
            expire_at_ms: pending.expire_at_ms,
            idle_seconds: pending.idle_seconds,
            frequency: pending.frequency,
        };
        self.stats.keys_parsed += 1;
        trace!(
            db = summary.db,
            key = %label,
            ?kind,
            elements = summary.element_count,
            "Key decoded"
        );
        Ok(Event::Key {
            summary,
            elements: decoded.elements,
        })
    }

    fn read_trailer(&mut self) -> DecodeResult<Event> {
        let computed = self.reader.checksum();
        let checksum = self.reader.read_trailer()?;
        let recorded = u64::from_le_bytes(checksum);
        self.stats.checksum = self.verify_checksum(computed, recorded)?;

        let trailing = self.reader.drain_remaining()?;
        if trailing > 0 {
            warn!(bytes = trailing, "Unexpected bytes after checksum");
            self.stats.trailing_bytes = trailing;
        }

        info!(
            version = self.stats.version,
            keys = self.stats.keys_parsed,
            aux = self.stats.aux_fields,
            bytes = self.reader.offset(),
            inconsistencies = self.stats.inconsistencies.len(),
            checksum = ?self.stats.checksum,
            "Snapshot parsed"
        );
        Ok(Event::Eof { checksum })
    }

    fn verify_checksum(
        &self,
        computed: u64,
        recorded: u64,
    ) -> DecodeResult<ChecksumStatus> {
        if !self.config.verify_checksum {
            return Ok(ChecksumStatus::NotChecked);
        }
        if recorded == 0 {
            return Ok(ChecksumStatus::Disabled);
        }
        if computed == recorded {
            return Ok(ChecksumStatus::Valid);
        }
        if self.config.strict_checksum {
            return Err(RdbError::ChecksumMismatch { computed, recorded });
        }
        warn!(
            computed = %format_args!("{computed:#018x}"),
            recorded = %format_args!("{recorded:#018x}"),
            "Checksum mismatch"
        );
        Ok(ChecksumStatus::Mismatch { computed, recorded })
    }

    /// Сбрасывает модификаторы, за которыми пришла не типизированная запись.
    fn discard_modifiers(
        &mut self,
        opcode: u8,
    ) {
        if self.state.discard_pending() {
            self.stats.discarded_modifiers += 1;
            debug!(
                opcode = %format_args!("{opcode:#04x}"),
                db = self.state.db,
                "Discarding modifiers not followed by a key"
            );
        }
    }
}

/// Превращает ошибку разбора в терминальное событие.
pub(crate) fn error_event(err: &StackError) -> Event {
    let rdb = err.downcast_ref::<RdbError>();
    Event::Error {
        kind: rdb.map(RdbError::kind).unwrap_or(RdbErrorKind::Other),
        offset: rdb.and_then(RdbError::offset),
        message: err.to_string(),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<R: Read> Iterator for SnapshotParser<R> {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Ok(event) => event,
            Err(err) => Some(error_event(&err)),
        }
    }
}

impl<R: Read> std::iter::FusedIterator for SnapshotParser<R> {}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::Bytes;

    use super::*;
    use crate::rdb::{crc64::crc64, Elements, KeyKind};

    /// Собирает снапшот версии 9 с корректной контрольной суммой.
    fn snapshot(body: &[u8]) -> Vec<u8> {
        snapshot_v(9, body)
    }

    fn snapshot_v(
        version: u32,
        body: &[u8],
    ) -> Vec<u8> {
        let mut out = format!("REDIS{version:04}").into_bytes();
        out.extend_from_slice(body);
        out.push(OPCODE_EOF);
        let crc = crc64(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    fn events(data: Vec<u8>) -> Vec<Event> {
        SnapshotParser::new(Cursor::new(data)).collect()
    }

    /// Тест проверяет пустой снапшот: заголовок и EOF.
    #[test]
    fn test_empty_snapshot() {
        let data = snapshot(&[]);
        let mut parser = SnapshotParser::new(Cursor::new(data.clone()));
        let all: Vec<_> = parser.by_ref().collect();

        assert_eq!(all.len(), 2);
        assert_eq!(all[0], Event::HeaderSeen { version: 9 });
        assert!(matches!(all[1], Event::Eof { .. }));
        assert_eq!(parser.stats().checksum, ChecksumStatus::Valid);
        assert_eq!(parser.stats().bytes_read, data.len() as u64);
        assert!(parser.is_finished());
    }

    /// Тест проверяет строковый ключ с expire-ms в базе 0.
    #[test]
    fn test_string_with_expire() {
        let mut body = vec![OPCODE_SELECTDB, 0x00, OPCODE_EXPIRETIME_MS];
        body.extend_from_slice(&1_700_000_000_000u64.to_le_bytes());
        body.extend_from_slice(&[0x00, 0x03, b'f', b'o', b'o', 0x03, b'b', b'a', b'r']);

        let all = events(snapshot(&body));
        let Event::Key { summary, elements } = &all[2] else {
            panic!("expected key event, got {:?}", all[2]);
        };
        assert_eq!(summary.db, 0);
        assert_eq!(summary.name, Bytes::from_static(b"foo"));
        assert_eq!(summary.kind, KeyKind::String);
        assert_eq!(summary.value_bytes, Some(3));
        assert_eq!(summary.expire_at_ms, Some(1_700_000_000_000));
        assert_eq!(elements, &Some(Elements::String(Bytes::from_static(b"bar"))));
    }

    /// Тест проверяет, что expire-s переводится в миллисекунды.
    #[test]
    fn test_expire_seconds_scaled() {
        let mut body = vec![OPCODE_EXPIRETIME];
        body.extend_from_slice(&10u32.to_le_bytes());
        body.extend_from_slice(&[0x00, 0x01, b'k', 0x01, b'v']);

        let all = events(snapshot(&body));
        let Event::Key { summary, .. } = &all[1] else {
            panic!("expected key event");
        };
        assert_eq!(summary.expire_at_ms, Some(10_000));
    }

    /// Тест проверяет, что модификаторы перед aux отбрасываются и не
    /// достаются следующему ключу.
    #[test]
    fn test_modifiers_discarded_before_aux() {
        let body = [
            OPCODE_IDLE, 0x05, OPCODE_AUX, 0x01, b'a', 0x01, b'b', 0x00, 0x01, b'k', 0x01, b'v',
        ];
        let mut parser = SnapshotParser::new(Cursor::new(snapshot(&body)));
        let all: Vec<_> = parser.by_ref().collect();

        let Event::Key { summary, .. } = &all[2] else {
            panic!("expected key event");
        };
        assert_eq!(summary.idle_seconds, None);
        assert_eq!(parser.stats().discarded_modifiers, 1);
    }

    /// Тест проверяет, что тип 8 - неизвестный опкод.
    #[test]
    fn test_type_eight_rejected() {
        let all = events(snapshot(&[0x08, 0x01, b'k']));
        assert!(matches!(
            all.last(),
            Some(Event::Error {
                kind: RdbErrorKind::UnknownOpcode,
                offset: Some(9),
                ..
            })
        ));
    }

    /// Тест проверяет, что listpack-типы не распознаются до версии 10.
    #[test]
    fn test_listpack_type_gated_by_version() {
        let all = events(snapshot_v(9, &[0x10, 0x01, b'k']));
        assert!(matches!(
            all.last(),
            Some(Event::Error {
                kind: RdbErrorKind::UnknownOpcode,
                ..
            })
        ));
    }

    /// Тест проверяет остановку на модуле без ошибки.
    #[test]
    fn test_stop_on_unsupported() {
        let config = ParserConfig {
            stop_on_unsupported: true,
            ..ParserConfig::default()
        };
        let data = snapshot(&[0x07, 0x01, b'm', 0xAA, 0xBB]);
        let all: Vec<_> = SnapshotParser::with_config(Cursor::new(data), config).collect();

        assert_eq!(
            all.last(),
            Some(&Event::Unsupported {
                key: Bytes::from_static(b"m"),
                value_type: ValueType::Module2,
                offset: 9,
            })
        );
    }

    /// Тест проверяет, что по умолчанию модуль - ошибка с именем ключа.
    #[test]
    fn test_unsupported_is_error_by_default() {
        let mut parser = SnapshotParser::new(Cursor::new(snapshot(&[0x0F, 0x01, b's'])));
        parser.next_event().unwrap();
        let err = parser.next_event().unwrap_err();
        let rdb = err.downcast_ref::<RdbError>().unwrap();
        assert_eq!(rdb.kind(), RdbErrorKind::UnsupportedRecord);
        assert!(rdb.to_string().contains("key: s"));
        assert!(parser.next_event().unwrap().is_none());
    }

    /// Тест проверяет нестрогий и строгий режим при неверной сумме.
    #[test]
    fn test_checksum_mismatch_modes() {
        let mut data = snapshot(&[]);
        let last = data.len() - 1;
        data[last] ^= 0xFF;

        let mut lenient = SnapshotParser::new(Cursor::new(data.clone()));
        lenient.by_ref().for_each(drop);
        assert!(matches!(
            lenient.stats().checksum,
            ChecksumStatus::Mismatch { .. }
        ));

        let config = ParserConfig {
            strict_checksum: true,
            ..ParserConfig::default()
        };
        let all: Vec<_> = SnapshotParser::with_config(Cursor::new(data), config).collect();
        assert!(matches!(
            all.last(),
            Some(Event::Error {
                kind: RdbErrorKind::ChecksumMismatch,
                ..
            })
        ));
    }

    /// Тест проверяет, что нулевая сумма означает «не считалась».
    #[test]
    fn test_zero_checksum_disabled() {
        let mut data = b"REDIS0009".to_vec();
        data.push(OPCODE_EOF);
        data.extend_from_slice(&[0; 8]);

        let mut parser = SnapshotParser::new(Cursor::new(data));
        parser.by_ref().for_each(drop);
        assert_eq!(parser.stats().checksum, ChecksumStatus::Disabled);
    }

    /// Тест проверяет учёт байт после контрольной суммы.
    #[test]
    fn test_trailing_bytes_counted() {
        let mut data = snapshot(&[]);
        data.extend_from_slice(&[1, 2, 3]);

        let mut parser = SnapshotParser::new(Cursor::new(data));
        parser.by_ref().for_each(drop);
        assert_eq!(parser.stats().trailing_bytes, 3);
        assert_eq!(parser.stats().checksum, ChecksumStatus::Valid);
    }

    /// Тест проверяет, что обрыв внутри ключа даёт TruncatedInput и
    /// прекращает выдачу.
    #[test]
    fn test_truncated_key() {
        let data = b"REDIS0009\x00\x05ab".to_vec();
        let all = events(data);
        assert_eq!(all.len(), 2);
        assert!(matches!(
            all[1],
            Event::Error {
                kind: RdbErrorKind::TruncatedInput,
                ..
            }
        ));
    }

    /// Тест проверяет, что размеры слота версии 12 пропускаются без события.
    #[test]
    fn test_slot_info_skipped() {
        let body = [
            OPCODE_SELECTDB, 0x00, OPCODE_SLOT_INFO, 0x07, 0x01, 0x00, 0x00, 0x01, b'k', 0x01,
            b'v',
        ];
        let all = events(snapshot_v(12, &body));
        assert_eq!(all.len(), 4);
        assert_eq!(all[1], Event::DbSelected { db: 0 });
        assert!(matches!(&all[2], Event::Key { summary, .. } if summary.name.as_ref() == b"k"));
        assert!(matches!(all[3], Event::Eof { .. }));
    }

    /// Тест проверяет, что до версии 12 байт 0xF4 остаётся неизвестным.
    #[test]
    fn test_slot_info_rejected_before_v12() {
        let all = events(snapshot_v(11, &[OPCODE_SLOT_INFO, 0x07, 0x01, 0x00]));
        assert!(matches!(
            all[1],
            Event::Error {
                kind: RdbErrorKind::UnknownOpcode,
                offset: Some(9),
                ..
            }
        ));
    }

    /// Тест проверяет хэш с TTL полей версии 12 в обоих режимах.
    #[test]
    fn test_field_ttl_hash_unsupported() {
        let body = [0x19, 0x01, b'h', 0x00];
        let config = ParserConfig {
            stop_on_unsupported: true,
            ..ParserConfig::default()
        };
        let stopped: Vec<_> =
            SnapshotParser::with_config(Cursor::new(snapshot_v(12, &body)), config).collect();
        assert_eq!(
            stopped.last(),
            Some(&Event::Unsupported {
                key: Bytes::from_static(b"h"),
                value_type: ValueType::HashListpackEx,
                offset: 9,
            })
        );

        let failed = events(snapshot_v(12, &body));
        assert!(matches!(
            failed[1],
            Event::Error {
                kind: RdbErrorKind::UnsupportedRecord,
                ..
            }
        ));

        let old = events(snapshot_v(11, &body));
        assert!(matches!(
            old[1],
            Event::Error {
                kind: RdbErrorKind::UnknownOpcode,
                ..
            }
        ));
    }

    /// Тест проверяет событие function для версии 10.
    #[test]
    fn test_function_record() {
        let all = events(snapshot_v(10, &[OPCODE_FUNCTION2, 0x02, b'f', b'n']));
        assert_eq!(
            all[1],
            Event::Function {
                code: Bytes::from_static(b"fn")
            }
        );
    }
}
