pub mod settings;

pub use settings::{ParserConfig, SettingsError, ENV_PREFIX};
