/// Parser settings loading.
pub mod config;
/// Subscriber setup (formatting, filters).
pub mod logging;
/// Snapshot decoding: reader, containers, record dispatcher, handlers.
pub mod rdb;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Settings.
pub use config::{ParserConfig, SettingsError};
/// Logging setup.
pub use logging::{init_logging, LogFormat, LoggingConfig};
/// Streaming parser, events and handlers.
pub use rdb::{
    parse_snapshot, parse_snapshot_with, CallbackHandler, ChecksumStatus, CollectedKey, Elements,
    Event, FilterHandler, FormatVersion, Inconsistency, KeyCollector, KeyKind, KeySummary,
    ParseHandler, ParseStats, SnapshotParser, ValueType,
};
/// Error types.
pub use zrdb_error::{RdbError, RdbErrorKind, StackError, ZrdbResult};
