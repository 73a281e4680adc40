/// Немедленно возвращает ошибку из функции, отдающей
/// [`ZrdbResult`](crate::ZrdbResult).
///
/// - `bail!(err)` - любая ошибка с [`ErrorExt`](crate::ErrorExt);
/// - `bail!(code, "fmt {}", arg)` - [`GenericError`](crate::GenericError) с
///   кодом и сообщением.
///
/// ```ignore
/// use zrdb_error::{bail, StatusCode};
///
/// let mut handler = CallbackHandler::new(|summary, _| {
///     if summary.db > 15 {
///         bail!(StatusCode::InvalidArgs, "unexpected db {}", summary.db);
///     }
///     Ok(())
/// });
/// ```
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($crate::StackError::from($err))
    };
    ($code:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        return Err($crate::StackError::new(
            $crate::GenericError::new($code, format!($fmt $(, $arg)*))
        ))
    };
}

/// `.context(...)` на любом `Result`, ошибка которого сводится к
/// [`StackError`](crate::StackError).
pub trait ResultExt<T> {
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<crate::StackError>,
{
    #[track_caller]
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
    {
        self.map_err(|e| e.into().context(ctx))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RdbError, StatusCode, ZrdbResult};

    /// Тест проверяет, что `bail!` сохраняет тип исходной ошибки.
    #[test]
    fn test_bail_typed_error() {
        fn reject() -> ZrdbResult<()> {
            bail!(RdbError::UnknownOpcode {
                opcode: 0x08,
                offset: Some(9)
            });
        }

        let err = reject().unwrap_err();
        assert!(err.downcast_ref::<RdbError>().is_some());
    }

    /// Тест проверяет форму с кодом и форматированием.
    #[test]
    fn test_bail_with_code() {
        fn reject(db: u64) -> ZrdbResult<()> {
            bail!(StatusCode::InvalidArgs, "unexpected db {}", db);
        }

        let err = reject(16).unwrap_err();
        assert_eq!(err.to_string(), "unexpected db 16");
        assert_eq!(err.status_code(), StatusCode::InvalidArgs);
    }

    /// Тест проверяет, что `context` дописывает сообщение поверх ошибки.
    #[test]
    fn test_result_context() {
        let raw: Result<(), RdbError> = Err(RdbError::ChecksumMismatch {
            computed: 1,
            recorded: 2,
        });
        let err = raw.context("verifying trailer").unwrap_err();

        assert_eq!(err.contexts().len(), 1);
        assert_eq!(err.contexts()[0].message, "verifying trailer");
        assert!(err.to_string().starts_with("verifying trailer: "));
    }
}
