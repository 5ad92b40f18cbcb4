//! Conversions from external infrastructure errors into domain errors.

use courier_domain::CourierError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CourierError);

impl From<InfraError> for CourierError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CourierError> for InfraError {
    fn from(value: CourierError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoCourierError {
    fn into_courier(self) -> CourierError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CourierError */
/* -------------------------------------------------------------------------- */

impl IntoCourierError for SqlError {
    fn into_courier(self) -> CourierError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        CourierError::Storage("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        CourierError::Storage("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        CourierError::Storage("unique constraint violation".into())
                    }
                    (ErrorCode::NotADatabase, _) => CourierError::Storage(
                        "file is not a usable database; storage is corrupt or foreign".into(),
                    ),
                    _ => CourierError::Storage(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                CourierError::Storage("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                CourierError::Storage(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CourierError::Storage(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => CourierError::Storage("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidPath(path) => CourierError::Storage(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => CourierError::Storage("invalid SQL query".into()),
            other => CourierError::Storage(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_courier())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CourierError */
/* -------------------------------------------------------------------------- */

impl IntoCourierError for HttpError {
    fn into_courier(self) -> CourierError {
        if self.is_timeout() {
            return CourierError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return CourierError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                400..=499 => CourierError::InvalidInput(message),
                _ => CourierError::Network(message),
            };
        }

        CourierError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_courier())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
