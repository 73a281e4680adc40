use std::{env, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::config::SettingsError;

/// Допустимые уровни логирования.
const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Формат вывода логов.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Настройки подписчика `tracing`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень для событий парсера (`zrdb=<level>`)
    pub level: String,
    pub format: LogFormat,
    /// Печатать ли target события
    pub with_target: bool,
    /// Цветной вывод
    pub with_ansi: bool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl LoggingConfig {
    /// Применяет `ZRDB_LOG_LEVEL`, `ZRDB_LOG_FORMAT` и `NO_COLOR`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("ZRDB_LOG_LEVEL") {
            self.level = level.to_lowercase();
        }
        if let Some(format) = env::var("ZRDB_LOG_FORMAT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.format = format;
        }
        if env::var_os("NO_COLOR").is_some() {
            self.with_ansi = false;
        }
    }

    /// Проверяет уровень логирования.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !LEVELS.contains(&self.level.as_str()) {
            return Err(SettingsError::Invalid {
                field: "level",
                reason: format!("unknown log level '{}'", self.level),
            });
        }
        Ok(())
    }

    /// Директива `EnvFilter`: указанный уровень для крейта, `warn` для
    /// остальных.
    pub fn build_filter_directive(&self) -> String {
        format!("warn,zrdb={}", self.level)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            with_target: true,
            with_ansi: true,
        }
    }
}

impl FromStr for LogFormat {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(SettingsError::Invalid {
                field: "format",
                reason: format!("unknown log format '{other}'"),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
