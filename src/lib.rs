//! # wmiq
//!
//! [WMI] is the management and instrumentation API of Windows-based operating
//! systems. This crate wraps the COM plumbing needed to query it: connecting
//! to a namespace, running [WQL] queries and reading typed property values
//! off the result objects.
//!
//! All data is copied into owning Rust values, so nothing returned by a query
//! borrows from WMI's own storage.
//!
//! Connecting takes one call (the namespace path is resolved under
//! `\\.\ROOT\`, and `cimv2` is where the `Win32_*` classes live):
//!
//! ```edition2018
//! # fn main() -> Result<(), wmiq::WmiError> {
//! use wmiq::Session;
//!
//! let session = Session::open("cimv2")?;
//! # Ok(())
//! # }
//! ```
//!
//! Queries return an eagerly materialized [`QueryResult`]; properties are read
//! from it (or from an individual [`Instance`]) as the type you ask for, with
//! `None` for anything that does not exist or is not representable as that
//! type:
//!
//! ```edition2018
//! # fn main() -> Result<(), wmiq::WmiError> {
//! # use wmiq::Session;
//! let session = Session::open("cimv2")?;
//! let result = session.exec_query("SELECT Name FROM Win32_Processor")?;
//!
//! if let Some(name) = result.property::<String>("Name") {
//!     println!("{}", name);
//! }
//! #   Ok(())
//! # }
//! ```
//!
//! # Operating on untyped values
//!
//! WMI's data model is based on COM's [`VARIANT`] type, a struct capable of
//! holding many types of data. This crate decodes it into the analogous
//! [`Variant`] enum, which is what the raw channel returns:
//!
//! ```edition2018
//! # fn main() -> Result<(), wmiq::WmiError> {
//! # use wmiq::Session;
//! let session = Session::open("cimv2")?;
//! let result = session.exec_query("SELECT * FROM Win32_OperatingSystem")?;
//!
//! for os in &result {
//!     println!("{:#?}", os.raw_property("Caption")?);
//! }
//! #   Ok(())
//! # }
//! ```
//!
//! # Internals
//!
//! [`Session`] owns the connection (COM init marker, `IWbemLocator`,
//! `IWbemServices`) behind a reference count; every [`QueryResult`] and
//! [`Instance`] holds a clone of it, so results stay usable after the
//! caller's own session handle is gone, and the connection is torn down
//! exactly once, when the last of them drops. Session handles are
//! deliberately not `Send`: COM is initialized per thread, and each thread
//! that queries WMI should create its own session.
//!
//! The conversion from native data to Rust data happens in two layers:
//! [`Variant::from_variant`] (plus [`safearray`] for array properties)
//! copies a `VARIANT` into an owned [`Variant`], and the `TryFrom<Variant>`
//! implementations in [`variant`] turn that into the requested type.
//!
//! [WMI]: https://docs.microsoft.com/en-us/windows/desktop/wmisdk/about-wmi
//! [WQL]: https://docs.microsoft.com/en-us/windows/win32/wmisdk/querying-with-wql
//! [`VARIANT`]: https://docs.microsoft.com/en-us/windows/desktop/api/oaidl/ns-oaidl-tagvariant
#![cfg(windows)]

pub mod connection;
pub mod datetime;
pub mod duration;
pub mod error;
pub mod instance;
pub mod query;
pub mod result;
pub mod safearray;
pub mod variant;


pub use connection::{ComLibrary, Session};
pub use datetime::WmiDateTime;
pub use duration::WmiDuration;
pub use error::{WmiError, WmiResult};
pub use instance::Instance;
pub use result::QueryResult;
pub use variant::Variant;
