use crate::connection::Session;
use crate::error::{WmiError, WmiResult};
use crate::instance::Instance;
use crate::query::QueryEnumerator;
use crate::variant::Variant;
use std::convert::TryFrom;
use std::fmt;
use std::slice;

/// The materialized result of one query: an ordered, immutable collection of
/// [`Instance`]s.
///
/// The full enumerator is drained once, when the result is constructed, so
/// indexes are stable and iteration can be restarted freely. The result keeps
/// its originating [`Session`] alive even when it is empty.
pub struct QueryResult {
    _session: Session,
    instances: Vec<Instance>,
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.instances.iter()).finish()
    }
}

impl QueryResult {
    pub(crate) fn from_enumerator(enumerator: QueryEnumerator) -> Self {
        let session = enumerator.session().clone();

        let mut instances = Vec::new();

        // A failed pull means the end of the results, not a query failure.
        for instance in enumerator {
            match instance {
                Ok(instance) => instances.push(instance),
                Err(_) => break,
            }
        }

        Self {
            _session: session,
            instances,
        }
    }

    /// The number of objects in the result.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Returns the object at `index`, or [`WmiError::IndexError`] when
    /// `index >= len()`.
    pub fn get_at(&self, index: usize) -> WmiResult<&Instance> {
        self.instances.get(index).ok_or(WmiError::IndexError {
            index,
            len: self.instances.len(),
        })
    }

    /// Scans the objects in order and returns the first value of the named
    /// property that is representable as `T`, skipping objects where it is
    /// absent.
    ///
    /// ```edition2018
    /// # fn main() -> wmiq::WmiResult<()> {
    /// # let session = wmiq::Session::open("cimv2")?;
    /// let result = session.exec_query("SELECT Name FROM Win32_Processor")?;
    ///
    /// let name: Option<String> = result.property("Name");
    /// # Ok(())
    /// # }
    /// ```
    pub fn property<T>(&self, property_name: &str) -> Option<T>
    where
        T: TryFrom<Variant>,
    {
        self.instances
            .iter()
            .find_map(|instance| instance.property(property_name))
    }

    /// Returns the named property of the object at `index`, or `None` when
    /// the index is out of range or the value is not representable as `T`.
    pub fn property_at<T>(&self, property_name: &str, index: usize) -> Option<T>
    where
        T: TryFrom<Variant>,
    {
        self.instances.get(index)?.property(property_name)
    }

    pub fn iter(&self) -> slice::Iter<'_, Instance> {
        self.instances.iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Instance;
    type IntoIter = slice::Iter<'a, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.iter()
    }
}

impl IntoIterator for QueryResult {
    type Item = Instance;
    type IntoIter = std::vec::IntoIter<Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.into_iter()
    }
}
