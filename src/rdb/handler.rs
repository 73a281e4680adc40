//! Обработчики событий для [`SnapshotParser::parse`](super::SnapshotParser::parse).

use bytes::Bytes;
use zrdb_error::ZrdbResult;

use super::{Elements, Event, KeySummary, ValueType};

/// Трейт для обработки событий разбора.
pub trait ParseHandler {
    /// Вызывается для каждого события.
    fn handle_event(
        &mut self,
        event: Event,
    ) -> ZrdbResult<()>;

    /// Вызывается после последнего события успешного разбора.
    fn finalize(&mut self) -> ZrdbResult<()> {
        Ok(())
    }
}

/// Ключ вместе с раскрытыми элементами.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedKey {
    pub summary: KeySummary,
    pub elements: Option<Elements>,
}

/// Собирает всё, что отдал парсер: ключи, метаданные, версию и сумму.
#[derive(Debug, Default)]
pub struct KeyCollector {
    version: Option<u32>,
    aux: Vec<(Bytes, Bytes)>,
    keys: Vec<CollectedKey>,
    functions: Vec<Bytes>,
    modules: Vec<u64>,
    checksum: Option<[u8; 8]>,
    unsupported: Option<(Bytes, ValueType)>,
}

/// Оставляет только ключи, удовлетворяющие предикату.
pub struct FilterHandler<F>
where
    F: Fn(&KeySummary) -> bool,
{
    predicate: F,
    keys: Vec<CollectedKey>,
}

/// Вызывает замыкание для каждого ключа.
///
/// Ошибка из замыкания прерывает разбор.
pub struct CallbackHandler<F>
where
    F: FnMut(KeySummary, Option<Elements>) -> ZrdbResult<()>,
{
    callback: F,
    calls: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl KeyCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Версия формата из заголовка.
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// Aux-пары в порядке появления.
    pub fn aux(&self) -> &[(Bytes, Bytes)] {
        &self.aux
    }

    /// Значение aux-поля по имени (последнее, если повторялось).
    pub fn aux_value(
        &self,
        name: &[u8],
    ) -> Option<&Bytes> {
        self.aux
            .iter()
            .rev()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    pub fn keys(&self) -> &[CollectedKey] {
        &self.keys
    }

    pub fn into_keys(self) -> Vec<CollectedKey> {
        self.keys
    }

    /// Сводки всех ключей в порядке потока.
    pub fn summaries(&self) -> impl Iterator<Item = &KeySummary> {
        self.keys.iter().map(|k| &k.summary)
    }

    /// Ключи конкретной базы.
    pub fn keys_in_db(
        &self,
        db: u64,
    ) -> impl Iterator<Item = &CollectedKey> {
        self.keys.iter().filter(move |k| k.summary.db == db)
    }

    /// Библиотеки функций.
    pub fn functions(&self) -> &[Bytes] {
        &self.functions
    }

    /// Идентификаторы модулей из пропущенных module-aux записей.
    pub fn modules(&self) -> &[u64] {
        &self.modules
    }

    /// Сырые байты контрольной суммы; `None`, если EOF не был достигнут.
    pub fn checksum(&self) -> Option<[u8; 8]> {
        self.checksum
    }

    /// Ключ, на котором разбор остановился без ошибки.
    pub fn unsupported(&self) -> Option<&(Bytes, ValueType)> {
        self.unsupported.as_ref()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<F> FilterHandler<F>
where
    F: Fn(&KeySummary) -> bool,
{
    /// Создаёт handler с предикатом фильтрации.
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            keys: Vec::new(),
        }
    }

    pub fn keys(&self) -> &[CollectedKey] {
        &self.keys
    }

    pub fn into_keys(self) -> Vec<CollectedKey> {
        self.keys
    }
}

impl<F> CallbackHandler<F>
where
    F: FnMut(KeySummary, Option<Elements>) -> ZrdbResult<()>,
{
    pub fn new(callback: F) -> Self {
        Self { callback, calls: 0 }
    }

    /// Сколько раз было вызвано замыкание.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl ParseHandler for KeyCollector {
    fn handle_event(
        &mut self,
        event: Event,
    ) -> ZrdbResult<()> {
        match event {
            Event::HeaderSeen { version } => self.version = Some(version),
            Event::AuxPair { key, value } => self.aux.push((key, value)),
            Event::Function { code } => self.functions.push(code),
            Event::ModuleAux { module_id } => self.modules.push(module_id),
            Event::Key { summary, elements } => self.keys.push(CollectedKey { summary, elements }),
            Event::Unsupported {
                key, value_type, ..
            } => self.unsupported = Some((key, value_type)),
            Event::Eof { checksum } => self.checksum = Some(checksum),
            Event::DbSelected { .. } | Event::ResizeHint { .. } | Event::Error { .. } => {}
        }
        Ok(())
    }
}

impl<F> ParseHandler for FilterHandler<F>
where
    F: Fn(&KeySummary) -> bool,
{
    fn handle_event(
        &mut self,
        event: Event,
    ) -> ZrdbResult<()> {
        if let Event::Key { summary, elements } = event {
            if (self.predicate)(&summary) {
                self.keys.push(CollectedKey { summary, elements });
            }
        }
        Ok(())
    }
}

impl<F> ParseHandler for CallbackHandler<F>
where
    F: FnMut(KeySummary, Option<Elements>) -> ZrdbResult<()>,
{
    fn handle_event(
        &mut self,
        event: Event,
    ) -> ZrdbResult<()> {
        if let Event::Key { summary, elements } = event {
            self.calls += 1;
            (self.callback)(summary, elements)?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
