use bytes::Bytes;
use serde::Serialize;

/// Модификаторы, ожидающие следующей типизированной записи.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pending {
    pub expire_at_ms: Option<u64>,
    pub idle_seconds: Option<u64>,
    pub frequency: Option<u8>,
}

impl Pending {
    pub fn is_empty(&self) -> bool {
        self.expire_at_ms.is_none() && self.idle_seconds.is_none() && self.frequency.is_none()
    }
}

/// Изменяемое состояние диспетчера между записями.
#[derive(Debug, Clone, Default)]
pub struct ParserState {
    /// Текущая база; 0 до первого select-db.
    pub db: u64,
    pub pending: Pending,
}

impl ParserState {
    /// Забирает модификаторы для записи, оставляя пустые.
    pub fn take_pending(&mut self) -> Pending {
        std::mem::take(&mut self.pending)
    }

    /// Сбрасывает модификаторы, не дождавшиеся записи. Возвращает `true`,
    /// если что-то было отброшено.
    pub fn discard_pending(&mut self) -> bool {
        let had_any = !self.pending.is_empty();
        self.pending = Pending::default();
        had_any
    }
}

/// Расхождение между заголовком контейнера и результатом обхода.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inconsistency {
    pub key: Bytes,
    /// Смещение начала записи ключа.
    pub offset: u64,
    pub structure: &'static str,
    pub declared: u64,
    pub observed: u64,
}

/// Итог проверки контрольной суммы.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ChecksumStatus {
    /// Хвост ещё не прочитан или проверка выключена
    #[default]
    NotChecked,
    /// В хвосте записан ноль: сервер не считал сумму
    Disabled,
    Valid,
    Mismatch { computed: u64, recorded: u64 },
}

/// Статистика разбора снапшота.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseStats {
    /// Кол-во прочитанных байт, включая хвост
    pub bytes_read: u64,
    /// Кол-во выданных ключей
    pub keys_parsed: u64,
    /// Кол-во aux-пар
    pub aux_fields: u64,
    /// Кол-во групп модификаторов, отброшенных без записи
    pub discarded_modifiers: u64,
    pub inconsistencies: Vec<Inconsistency>,
    pub checksum: ChecksumStatus,
    /// Байты после контрольной суммы
    pub trailing_bytes: u64,
    /// Версия из заголовка
    pub version: Option<u32>,
}
