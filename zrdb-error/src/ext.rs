use std::{any::Any, error::Error};

use crate::StatusCode;

/// Общий трейт ошибок zrdb: код статуса и доступ к конкретному типу.
///
/// Любой тип с этим трейтом превращается в [`StackError`](crate::StackError)
/// через `?`.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// По умолчанию [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Нужен для [`StackError::downcast_ref`](crate::StackError::downcast_ref).
    fn as_any(&self) -> &dyn Any;
}
