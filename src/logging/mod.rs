//! Настройка подписчика `tracing` для программ поверх парсера.
//!
//! Сам парсер только эмитит события; подписчика ставит вызывающий код.

pub mod config;
mod filters;
mod formatter;

pub use config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::SettingsError;

/// Инициализирует глобальный подписчик.
///
/// Возвращает ошибку, если подписчик уже установлен.
pub fn init_logging(mut config: LoggingConfig) -> Result<(), SettingsError> {
    config.apply_env_overrides();
    config.validate()?;

    let env_filter = filters::build_filter_from_config(&config);
    let formatter_layer = formatter::build_formatter_from_config(&config);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatter_layer)
        .try_init()
        .map_err(|e| SettingsError::Subscriber(e.to_string()))?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        format = %config.format,
        "Logging initialized"
    );
    Ok(())
}
