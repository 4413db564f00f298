use crate::connection::Session;
use crate::error::{check_hres, WmiError, WmiResult};
use crate::instance::Instance;
use crate::result::QueryResult;
use log::{debug, trace};
use std::ptr;
use std::ptr::NonNull;
use widestring::WideCString;
use winapi::{
    shared::ntdef::NULL,
    um::wbemcli::{
        IEnumWbemClassObject, IWbemClassObject, WBEM_FLAG_FORWARD_ONLY,
        WBEM_FLAG_RETURN_IMMEDIATELY, WBEM_INFINITE,
    },
};

impl Session {
    /// Executes a WQL query against the session's namespace and returns the
    /// materialized result set.
    ///
    /// The query text is passed through to WMI unmodified. Submission
    /// failures (for example a malformed query) surface as
    /// [`WmiError::QueryError`]; an accepted query that matches nothing is an
    /// empty result, not an error.
    ///
    /// ```edition2018
    /// # fn main() -> wmiq::WmiResult<()> {
    /// # let session = wmiq::Session::open("cimv2")?;
    /// let result = session.exec_query("SELECT * FROM Win32_OperatingSystem")?;
    ///
    /// assert_eq!(result.len(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn exec_query(&self, query: impl AsRef<str>) -> WmiResult<QueryResult> {
        let enumerator = self.exec_query_native(query.as_ref())?;

        Ok(QueryResult::from_enumerator(enumerator))
    }

    /// Submits the query and wraps the raw result enumerator.
    fn exec_query_native(&self, query: &str) -> WmiResult<QueryEnumerator> {
        let query_language = WideCString::from_str("WQL")?;
        let query = WideCString::from_str(query)?;

        let mut p_enumerator = NULL as *mut IEnumWbemClassObject;

        let hres = unsafe {
            (*self.svc()).ExecQuery(
                query_language.as_ptr() as *mut _,
                query.as_ptr() as *mut _,
                (WBEM_FLAG_FORWARD_ONLY | WBEM_FLAG_RETURN_IMMEDIATELY) as i32,
                ptr::null_mut(),
                &mut p_enumerator,
            )
        };

        if hres < 0 {
            return Err(WmiError::QueryError { hres });
        }

        debug!("Got enumerator {:?}", p_enumerator);

        Ok(QueryEnumerator {
            session: self.clone(),
            p_enumerator: NonNull::new(p_enumerator),
        })
    }
}

/// An owning iterator over the objects produced by one query.
///
/// Only used to drain the enumerator into a [`QueryResult`]; results are
/// never streamed to callers.
pub(crate) struct QueryEnumerator {
    session: Session,
    p_enumerator: Option<NonNull<IEnumWbemClassObject>>,
}

impl QueryEnumerator {
    pub(crate) fn session(&self) -> &Session {
        &self.session
    }
}

impl Drop for QueryEnumerator {
    fn drop(&mut self) {
        if let Some(p_enumerator) = self.p_enumerator {
            unsafe {
                (*p_enumerator.as_ptr()).Release();
            }
        }
    }
}

impl Iterator for QueryEnumerator {
    type Item = WmiResult<Instance>;

    fn next(&mut self) -> Option<Self::Item> {
        let p_enumerator = self.p_enumerator?.as_ptr();

        let mut pcls_obj = NULL as *mut IWbemClassObject;
        let mut return_value = 0;

        let res = unsafe {
            check_hres((*p_enumerator).Next(
                WBEM_INFINITE as i32,
                1,
                &mut pcls_obj,
                &mut return_value,
            ))
        };

        if let Err(e) = res {
            return Some(Err(e));
        }

        if return_value == 0 {
            return None;
        }

        trace!(
            "Got enumerator {:?} and obj {:?}",
            self.p_enumerator,
            pcls_obj
        );

        Some(Ok(Instance::new(
            self.session.clone(),
            NonNull::new(pcls_obj),
        )))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::WmiError;
    use crate::tests::fixtures;

    #[test]
    fn it_executes_a_query() {
        let session = fixtures::session();

        let result = session
            .exec_query("SELECT * FROM Win32_OperatingSystem")
            .unwrap();

        assert_eq!(result.len(), 1);
    }

    #[test]
    fn it_can_reuse_a_session_for_multiple_queries() {
        let session = fixtures::session();

        let first = session.exec_query("SELECT * FROM Win32_OperatingSystem").unwrap();
        let second = session.exec_query("SELECT * FROM Win32_Processor").unwrap();

        assert_eq!(first.len(), 1);
        assert!(!second.is_empty());
    }

    #[test]
    fn it_fails_on_an_invalid_query() {
        let session = fixtures::session();

        let res = session.exec_query("SELECT FROM WHERE");

        assert!(matches!(res, Err(WmiError::QueryError { .. })));
    }

    #[test]
    fn it_returns_an_empty_result_for_an_unmatched_query() {
        let session = fixtures::session();

        let result = session
            .exec_query("SELECT * FROM Win32_Process WHERE Name = 'no_such_process_zz.exe'")
            .unwrap();

        assert_eq!(result.len(), 0);
        assert!(result.is_empty());
    }
}
