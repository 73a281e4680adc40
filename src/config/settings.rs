use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zrdb_error::{ErrorExt, StatusCode};

use crate::rdb::{DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_BLOB_SIZE};

/// Префикс переменных окружения: `ZRDB_VERIFY_CHECKSUM=false` и т.п.
pub const ENV_PREFIX: &str = "ZRDB";

/// Настройки разбора снапшота.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Размер буфера чтения внешнего потока
    pub buffer_capacity: usize,
    /// Максимальный размер одной строки или блоба
    pub max_blob_size: u64,
    /// Считать и сверять CRC-64 хвоста
    pub verify_checksum: bool,
    /// Несовпадение суммы - фатальная ошибка
    pub strict_checksum: bool,
    /// Складывать элементы значений в события
    pub collect_elements: bool,
    /// Остановиться без ошибки на модуле или стриме
    pub stop_on_unsupported: bool,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Source(#[from] ConfigError),

    #[error("Invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to install log subscriber: {0}")]
    Subscriber(String),
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ParserConfig {
    /// Загружает настройки из значений по умолчанию и переменных окружения с
    /// префиксом `ZRDB_`.
    pub fn load() -> Result<Self, SettingsError> {
        Self::build(None)
    }

    /// То же, что [`load`](Self::load), но сначала читает файл (формат по
    /// расширению). Переменные окружения перекрывают файл.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        Self::build(Some(path.as_ref()))
    }

    fn build(path: Option<&Path>) -> Result<Self, SettingsError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("buffer_capacity", defaults.buffer_capacity as u64)?
            .set_default("max_blob_size", defaults.max_blob_size)?
            .set_default("verify_checksum", defaults.verify_checksum)?
            .set_default("strict_checksum", defaults.strict_checksum)?
            .set_default("collect_elements", defaults.collect_elements)?
            .set_default("stop_on_unsupported", defaults.stop_on_unsupported)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings: Self = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Проверяет согласованность значений.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.buffer_capacity == 0 {
            return Err(SettingsError::Invalid {
                field: "buffer_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_blob_size == 0 {
            return Err(SettingsError::Invalid {
                field: "max_blob_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.strict_checksum && !self.verify_checksum {
            return Err(SettingsError::Invalid {
                field: "strict_checksum",
                reason: "requires verify_checksum".to_string(),
            });
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
            verify_checksum: true,
            strict_checksum: false,
            collect_elements: true,
            stop_on_unsupported: false,
        }
    }
}

impl ErrorExt for SettingsError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Source(_) | Self::Invalid { .. } => StatusCode::InvalidArgs,
            Self::Subscriber(_) => StatusCode::Internal,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
