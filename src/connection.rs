use crate::error::{WmiError, WmiResult};
use log::debug;
use std::marker::PhantomData;
use std::ptr;
use std::ptr::NonNull;
use std::rc::Rc;
use widestring::WideCString;
use winapi::{
    shared::{
        ntdef::NULL,
        rpcdce::{
            RPC_C_AUTHN_LEVEL_CALL, RPC_C_AUTHN_WINNT, RPC_C_AUTHZ_NONE,
            RPC_C_IMP_LEVEL_IMPERSONATE,
        },
        wtypesbase::CLSCTX_INPROC_SERVER,
    },
    um::{
        combaseapi::{CoCreateInstance, CoInitializeEx, CoSetProxyBlanket, CoUninitialize},
        objbase::COINIT_MULTITHREADED,
        objidlbase::EOAC_NONE,
        wbemcli::{CLSID_WbemLocator, IID_IWbemLocator, IWbemLocator, IWbemServices},
    },
};

/// A marker that COM was initialized for the current thread.
///
/// COM must be initialized separately on each thread that talks to WMI, and
/// `CoUninitialize` must run on that same thread; dropping the last
/// [`Rc<ComLibrary>`] does exactly that, after every [`Session`] derived from
/// it has released its pointers.
pub struct ComLibrary {
    // Each thread must initialize COM separately, so this type is `!Send`.
    _phantom: PhantomData<*mut ()>,
}

impl ComLibrary {
    /// `CoInitialize`s the COM library for use by the calling thread.
    pub fn new() -> WmiResult<Self> {
        let hres = unsafe { CoInitializeEx(ptr::null_mut(), COINIT_MULTITHREADED) };

        if hres < 0 {
            return Err(WmiError::InitError { hres });
        }

        Ok(Self {
            _phantom: PhantomData,
        })
    }
}

impl Drop for ComLibrary {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
    }
}

/// ```compile_fail
/// let com = wmiq::ComLibrary::new().unwrap();
/// fn assert_send(_s: impl Send) {}
/// assert_send(com);
/// ```
struct _ComLibraryIsNotSend;

/// A connection to one WMI namespace on the local machine.
///
/// A `Session` is cheap to clone, and every [`QueryResult`](crate::QueryResult)
/// and [`Instance`](crate::Instance) derived from it holds a clone, so the
/// underlying connection outlives anything still using it. When the last
/// handle drops, the service binding is released, then the locator, then COM
/// itself is uninitialized.
#[derive(Clone)]
pub struct Session {
    inner: Rc<SessionInner>,
}

pub(crate) struct SessionInner {
    p_svc: Option<NonNull<IWbemServices>>,
    p_loc: Option<NonNull<IWbemLocator>>,
    // Kept last so `CoUninitialize` runs after the pointers above are released.
    _com: Rc<ComLibrary>,
}

impl Session {
    /// Initializes COM for the calling thread and connects to the given
    /// namespace in one call.
    ///
    /// The path is resolved under `\\.\ROOT\`, so `"cimv2"` connects to the
    /// standard `ROOT\CIMV2` namespace and `"Microsoft\Windows\Storage"`
    /// works for nested namespaces.
    ///
    /// ```edition2018
    /// # fn main() -> wmiq::WmiResult<()> {
    /// let session = wmiq::Session::open("cimv2")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(namespace_path: &str) -> WmiResult<Self> {
        let com_lib = Rc::new(ComLibrary::new()?);

        Self::with_namespace_path(namespace_path, com_lib)
    }

    /// Connects to the default `cimv2` namespace using an already initialized
    /// COM library.
    pub fn new(com_lib: Rc<ComLibrary>) -> WmiResult<Self> {
        Self::with_namespace_path("cimv2", com_lib)
    }

    /// Connects to the given namespace (relative to `\\.\ROOT\`) using an
    /// already initialized COM library.
    pub fn with_namespace_path(namespace_path: &str, com_lib: Rc<ComLibrary>) -> WmiResult<Self> {
        let mut inner = SessionInner {
            p_svc: None,
            p_loc: None,
            _com: com_lib,
        };

        // Each step fills one pointer; on failure the partially built
        // `SessionInner` is dropped and releases whatever was acquired.
        inner.create_locator()?;
        inner.connect_server(namespace_path)?;
        inner.set_proxy_blanket()?;

        Ok(Self {
            inner: Rc::new(inner),
        })
    }

    pub(crate) fn svc(&self) -> *mut IWbemServices {
        // Always `Some` once the session is constructed.
        self.inner.p_svc.unwrap().as_ptr()
    }
}

impl SessionInner {
    fn create_locator(&mut self) -> WmiResult<()> {
        debug!("Calling CoCreateInstance for CLSID_WbemLocator");

        let mut p_loc = NULL;

        let hres = unsafe {
            CoCreateInstance(
                &CLSID_WbemLocator,
                ptr::null_mut(),
                CLSCTX_INPROC_SERVER,
                &IID_IWbemLocator,
                &mut p_loc,
            )
        };

        if hres < 0 {
            return Err(WmiError::LocatorError { hres });
        }

        self.p_loc = NonNull::new(p_loc as *mut IWbemLocator);

        debug!("Got locator {:?}", self.p_loc);

        match self.p_loc {
            Some(_) => Ok(()),
            None => Err(WmiError::NullPointerResult),
        }
    }

    fn connect_server(&mut self, namespace_path: &str) -> WmiResult<()> {
        debug!("Calling ConnectServer for namespace {:?}", namespace_path);

        let object_path = format!(r"\\.\ROOT\{}", namespace_path);
        let object_path_bstr = WideCString::from_str(&object_path)?;

        let mut p_svc = ptr::null_mut::<IWbemServices>();

        let loc = self.p_loc.unwrap().as_ptr();

        let hres = unsafe {
            (*loc).ConnectServer(
                object_path_bstr.as_ptr() as *mut _,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                0,
                ptr::null_mut(),
                ptr::null_mut(),
                &mut p_svc,
            )
        };

        if hres < 0 {
            return Err(WmiError::ConnectError {
                namespace: namespace_path.to_string(),
                hres,
            });
        }

        self.p_svc = NonNull::new(p_svc);

        debug!("Got service {:?}", self.p_svc);

        match self.p_svc {
            Some(_) => Ok(()),
            None => Err(WmiError::NullPointerResult),
        }
    }

    fn set_proxy_blanket(&mut self) -> WmiResult<()> {
        debug!("Calling CoSetProxyBlanket");

        let hres = unsafe {
            CoSetProxyBlanket(
                self.p_svc.unwrap().as_ptr() as _, // Proxy to set
                RPC_C_AUTHN_WINNT,                 // Authentication service
                RPC_C_AUTHZ_NONE,                  // Authorization service
                ptr::null_mut(),                   // Server principal name
                RPC_C_AUTHN_LEVEL_CALL,            // Authentication level
                RPC_C_IMP_LEVEL_IMPERSONATE,       // Impersonation level
                NULL,                              // Client identity
                EOAC_NONE,                         // Proxy capabilities
            )
        };

        if hres < 0 {
            return Err(WmiError::SecurityError { hres });
        }

        Ok(())
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(svc) = self.p_svc {
            unsafe {
                (*svc.as_ptr()).Release();
            }
        }

        if let Some(loc) = self.p_loc {
            unsafe {
                (*loc.as_ptr()).Release();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures;

    #[test]
    fn it_connects_to_the_default_namespace() {
        let _session = fixtures::session();
    }

    #[test]
    fn it_can_share_a_com_library_between_sessions() {
        let com_lib = Rc::new(ComLibrary::new().unwrap());

        let _first = Session::new(Rc::clone(&com_lib)).unwrap();
        let _second = Session::with_namespace_path("cimv2", com_lib).unwrap();
    }

    #[test]
    fn it_fails_to_connect_to_a_missing_namespace() {
        let com_lib = Rc::new(ComLibrary::new().unwrap());

        let res = Session::with_namespace_path("no_such_namespace_zz", com_lib);

        match res {
            Err(WmiError::ConnectError { namespace, .. }) => {
                assert_eq!(namespace, "no_such_namespace_zz");
            }
            Err(other) => panic!("expected a connection error, got {:?}", other),
            Ok(_) => panic!("expected a connection error, got a session"),
        }
    }
}
