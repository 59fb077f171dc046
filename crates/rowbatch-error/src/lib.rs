use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

use polars_error::PolarsError;

/// Wrapper so that errors built from string literals don't allocate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Cow<'static, str>);

impl ErrString {
    pub const fn new_static(s: &'static str) -> Self {
        ErrString(Cow::Borrowed(s))
    }
}

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        ErrString(msg.into())
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The failure taxonomy of the codec.
///
/// Every variant is unrecoverable at the point of detection: a conversion
/// either yields a fully decoded batch or fails wholesale with one of these.
#[derive(Debug, thiserror::Error)]
pub enum RowbatchError {
    /// A serialized type descriptor could not be decoded into a well-formed
    /// descriptor tree.
    #[error("schema parse: {0}")]
    SchemaParse(ErrString),
    /// A well-formed descriptor names a type this codec does not implement.
    #[error("unsupported type: {0}")]
    UnsupportedType(ErrString),
    /// A row, field-count or offset inconsistency detected at decode time.
    #[error("layout mismatch: {0}")]
    LayoutMismatch(ErrString),
    /// A field ordinal outside the schema bounds.
    #[error("out of bounds: {0}")]
    OutOfBounds(ErrString),
    /// Failure inside the columnar backend while assembling arrays.
    #[error("compute error: {0}")]
    ComputeError(ErrString),
}

impl From<PolarsError> for RowbatchError {
    fn from(err: PolarsError) -> Self {
        RowbatchError::ComputeError(err.to_string().into())
    }
}

pub type RowbatchResult<T> = Result<T, RowbatchError>;

#[macro_export]
macro_rules! rowbatch_err {
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::RowbatchError::$variant(format!($fmt $(, $arg)*).into())
    };
}

#[macro_export]
macro_rules! rowbatch_bail {
    ($($tt:tt)+) => {
        return Err($crate::rowbatch_err!($($tt)+))
    };
}

#[macro_export]
macro_rules! rowbatch_ensure {
    ($cond:expr, $($tt:tt)+) => {
        if !$cond {
            $crate::rowbatch_bail!($($tt)+);
        }
    };
}
