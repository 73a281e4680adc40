use std::{fmt, panic::Location, sync::Arc};

use crate::{ErrorExt, StatusCode};

/// Ошибка публичного API: исходная ошибка плюс цепочка контекстов.
///
/// Контексты добавляются по мере подъёма по стеку, каждый запоминает место
/// вызова. `Display` печатает их через стрелку перед исходной ошибкой.
#[derive(Clone)]
pub struct StackError {
    inner: Arc<dyn ErrorExt>,
    contexts: Arc<Vec<ErrorContext>>,
}

/// Контекст ошибки с location tracking.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub message: String,
    pub location: Option<&'static Location<'static>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StackError {
    /// Создаёт новую ошибку.
    #[track_caller]
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            inner: Arc::new(err),
            contexts: Arc::new(Vec::new()),
        }
    }

    /// Добавляет контекст к ошибке.
    #[track_caller]
    pub fn context(
        mut self,
        msg: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.contexts).push(ErrorContext {
            message: msg.into(),
            location: Some(Location::caller()),
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.inner.status_code()
    }

    /// Контексты от самого внутреннего к внешнему.
    pub fn contexts(&self) -> &[ErrorContext] {
        &self.contexts
    }

    /// Исходная ошибка конкретного типа, например [`RdbError`](crate::RdbError).
    pub fn downcast_ref<T: ErrorExt + 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    fn format_contexts(&self) -> Vec<String> {
        self.contexts
            .iter()
            .map(|ctx| {
                if let Some(loc) = ctx.location {
                    format!("{} ({}:{})", ctx.message, loc.file(), loc.line())
                } else {
                    ctx.message.clone()
                }
            })
            .collect()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StackError
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut debug = f.debug_struct("StackError");
        debug.field("inner", &self.inner.to_string());
        debug.field("status_code", &self.status_code());

        if !self.contexts.is_empty() {
            debug.field("contexts", &self.format_contexts());
        }

        debug.finish()
    }
}

impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if !self.contexts.is_empty() {
            let contexts: Vec<&str> = self.contexts.iter().map(|c| c.message.as_str()).collect();
            write!(f, "{}: {}", contexts.join(" → "), self.inner)
        } else {
            write!(f, "{}", self.inner)
        }
    }
}

impl std::error::Error for StackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    #[track_caller]
    fn from(e: E) -> Self {
        StackError::new(e)
    }
}

impl From<StackError> for std::io::Error {
    fn from(e: StackError) -> Self {
        std::io::Error::other(e.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RdbError;

    fn truncated() -> RdbError {
        RdbError::TruncatedInput {
            context: "reading key".to_string(),
            offset: Some(12),
            key: None,
            expected_bytes: Some(4),
            got_bytes: Some(1),
        }
    }

    #[test]
    fn test_context_chain() {
        let stack = StackError::new(truncated())
            .context("decoding string record")
            .context("snapshot parse");

        assert_eq!(stack.contexts().len(), 2);
        assert_eq!(stack.contexts()[0].message, "decoding string record");
        assert!(stack.contexts()[0].location.is_some());
    }

    #[test]
    fn test_downcast() {
        let stack = StackError::new(RdbError::UnknownOpcode {
            opcode: 0x42,
            offset: Some(9),
        });

        let downcasted = stack.downcast_ref::<RdbError>();
        assert!(matches!(
            downcasted,
            Some(RdbError::UnknownOpcode { opcode: 0x42, .. })
        ));
    }

    #[test]
    fn test_display() {
        let stack = StackError::new(truncated()).context("value of key \"k\"");

        let display = stack.to_string();
        assert!(display.contains("value of key"));
        assert!(display.contains("Truncated input"));
    }

    #[test]
    fn test_into_io_error() {
        let io: std::io::Error = StackError::new(truncated()).into();
        assert!(io.to_string().contains("reading key"));
    }
}
