//! Печатает ключи снапшота строками JSON.
//!
//! ```text
//! cargo run -p zrdb_demos --bin dump_keys -- dump.rdb [db]
//! ```
//!
//! Настройки разбора берутся из `ZRDB_*`, уровень логов из `ZRDB_LOG_LEVEL`.

use std::{
    env,
    fs::File,
    io::{self, Write},
    process::ExitCode,
};

use serde::Serialize;
use tracing::{error, info};
use zrdb::{
    init_logging, CallbackHandler, KeySummary, LoggingConfig, ParserConfig, RdbError,
    SnapshotParser, ZrdbResult,
};

#[derive(Serialize)]
struct KeyLine<'a> {
    key: String,
    #[serde(flatten)]
    summary: &'a KeySummary,
}

fn main() -> ExitCode {
    if let Err(err) = init_logging(LoggingConfig::default()) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: dump_keys <snapshot.rdb> [db]");
        return ExitCode::from(2);
    };
    let only_db = args.next().and_then(|s| s.parse::<u64>().ok());

    match run(&path, only_db) {
        Ok(count) => {
            info!(path = %path, keys = count, "Snapshot dumped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let hint = err
                .downcast_ref::<RdbError>()
                .and_then(RdbError::recovery_hint)
                .unwrap_or("");
            error!(path = %path, error = %err, hint, "Snapshot dump failed");
            // EX_DATAERR для повреждённого или неподдерживаемого снапшота
            if err.status_code().is_format_error() {
                ExitCode::from(65)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(
    path: &str,
    only_db: Option<u64>,
) -> ZrdbResult<u64> {
    let config = ParserConfig::load()?;
    let file = File::open(path)?;
    let mut parser = SnapshotParser::with_config(file, config);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut handler = CallbackHandler::new(|summary: KeySummary, _elements| {
        if only_db.is_some_and(|db| db != summary.db) {
            return Ok(());
        }
        let line = KeyLine {
            key: summary.display_name(),
            summary: &summary,
        };
        serde_json::to_writer(&mut out, &line).map_err(io::Error::from)?;
        out.write_all(b"\n")?;
        Ok(())
    });

    parser.parse(&mut handler)?;
    Ok(handler.calls())
}
