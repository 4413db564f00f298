use std::num::{ParseFloatError, ParseIntError};
use std::string::FromUtf16Error;
use thiserror::Error;
use winapi::shared::ntdef::HRESULT;

/// The error type for everything that can go wrong while talking to WMI.
///
/// Connection setup and query submission surface one variant per failed step,
/// so callers can tell them apart. Conversion failures are only ever visible
/// on the raw channel ([`Instance::raw_property`](crate::Instance::raw_property)
/// and friends); the typed getters absorb them into `None`.
///
/// A useful resource for decoding WMI error codes can be found
/// [here](https://docs.microsoft.com/en-us/windows/win32/wmisdk/wmi-error-constants).
#[derive(Debug, Error)]
pub enum WmiError {
    #[error("failed to initialize the COM library (HRESULT: {hres:#010X})")]
    InitError { hres: HRESULT },
    #[error("failed to create the WBEM locator (HRESULT: {hres:#010X})")]
    LocatorError { hres: HRESULT },
    #[error("failed to connect to namespace {namespace:?} (HRESULT: {hres:#010X})")]
    ConnectError { namespace: String, hres: HRESULT },
    #[error("failed to set the security blanket on the WMI proxy (HRESULT: {hres:#010X})")]
    SecurityError { hres: HRESULT },
    #[error("failed to execute query (HRESULT: {hres:#010X})")]
    QueryError { hres: HRESULT },
    #[error("index {index} is out of range for a result of {len} objects")]
    IndexError { index: usize, len: usize },
    #[error("HRESULT call failed with: {hres:#010X}")]
    HResultError { hres: HRESULT },
    #[error("converting from variant type {0:#X} is not implemented")]
    ConvertError(u16),
    #[error("invalid bool value: {0:#X}")]
    ConvertBoolError(i16),
    #[error("{0}")]
    ConvertVariantError(String),
    #[error("invalid datetime value: {0}")]
    ConvertDatetimeError(String),
    #[error("invalid duration value: {0}")]
    ConvertDurationError(String),
    #[error(transparent)]
    ParseDatetimeError(#[from] chrono::format::ParseError),
    #[error(transparent)]
    ParseIntError(#[from] ParseIntError),
    #[error(transparent)]
    ParseFloatError(#[from] ParseFloatError),
    #[error("invalid UTF-16 string value")]
    ConvertStringError(#[from] FromUtf16Error),
    #[error(transparent)]
    WideStringNulError(#[from] widestring::NulError<u16>),
    #[error("a null pointer was returned as part of the query result")]
    NullPointerResult,
}

pub type WmiResult<T> = Result<T, WmiError>;

pub(crate) fn check_hres(hres: HRESULT) -> WmiResult<()> {
    if hres < 0 {
        return Err(WmiError::HResultError { hres });
    }

    Ok(())
}
