use crate::connection::Session;
use crate::error::{check_hres, WmiError, WmiResult};
use crate::safearray::{safe_array_to_vec_of_strings, SafeArrayDestroy};
use crate::variant::Variant;
use std::convert::TryFrom;
use std::fmt;
use std::mem;
use std::ptr;
use std::ptr::NonNull;
use widestring::WideCString;
use winapi::{
    shared::ntdef::NULL,
    um::{
        oaidl::{SAFEARRAY, VARIANT},
        oleauto::VariantClear,
        wbemcli::{
            IWbemClassObject, WBEM_FLAG_ALWAYS, WBEM_FLAG_IGNORE_OBJECT_SOURCE,
            WBEM_FLAG_IGNORE_QUALIFIERS, WBEM_FLAG_NONSYSTEM_ONLY, WBEM_S_SAME,
        },
    },
};

/// One object from a query result, wrapping a COM pointer to the underlying
/// `IWbemClassObject`.
///
/// Property lookups go against the live object on every call; nothing is
/// cached. The instance keeps its originating [`Session`] alive for as long
/// as it is reachable.
pub struct Instance {
    _session: Session,
    inner: Option<NonNull<IWbemClassObject>>,
}

impl Instance {
    pub(crate) fn new(session: Session, inner: Option<NonNull<IWbemClassObject>>) -> Self {
        Self {
            _session: session,
            inner,
        }
    }

    /// Retrieves the named property as type `T`, or `None` if the property
    /// does not exist or its value is not representable as `T`.
    ///
    /// This is the absorbing channel: a missing name, a COM error and a
    /// type mismatch all come back as `None`. Use [`raw_property`] to tell
    /// them apart.
    ///
    /// Requesting [`Variant`] returns the value as-is.
    ///
    /// ```edition2018
    /// # fn main() -> wmiq::WmiResult<()> {
    /// # let session = wmiq::Session::open("cimv2")?;
    /// # let result = session.exec_query("SELECT * FROM Win32_OperatingSystem")?;
    /// # let os = result.get_at(0)?;
    /// let caption: Option<String> = os.property("Caption");
    /// let missing: Option<u32> = os.property("NoSuchProperty");
    ///
    /// assert!(caption.is_some());
    /// assert!(missing.is_none());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// [`raw_property`]: Instance::raw_property
    pub fn property<T>(&self, property_name: &str) -> Option<T>
    where
        T: TryFrom<Variant>,
    {
        let value = self.raw_property(property_name).ok()?;

        T::try_from(value).ok()
    }

    /// Retrieves the named property as an untyped [`Variant`].
    pub fn raw_property(&self, property_name: &str) -> WmiResult<Variant> {
        let name_prop = WideCString::from_str(property_name)?;

        let p = self.inner.ok_or(WmiError::NullPointerResult)?.as_ptr();

        let mut vt_prop: VARIANT = unsafe { mem::zeroed() };

        unsafe {
            check_hres((*p).Get(
                name_prop.as_ptr() as *mut _,
                0,
                &mut vt_prop,
                ptr::null_mut(),
                ptr::null_mut(),
            ))?;
        }

        let property_value = Variant::from_variant(&vt_prop);

        // The VARIANT is cleared whether or not decoding succeeded, so the
        // data it owns is freed exactly once.
        unsafe { VariantClear(&mut vt_prop) };

        property_value
    }

    /// Returns the names of all the non-system properties of the object.
    pub fn list_properties(&self) -> WmiResult<Vec<String>> {
        // This will store the property names from the GetNames call.
        let mut p_names = NULL as *mut SAFEARRAY;

        let p = self.inner.ok_or(WmiError::NullPointerResult)?.as_ptr();

        unsafe {
            check_hres((*p).GetNames(
                ptr::null(),
                (WBEM_FLAG_ALWAYS | WBEM_FLAG_NONSYSTEM_ONLY) as i32,
                ptr::null_mut(),
                &mut p_names,
            ))
        }?;

        let res = safe_array_to_vec_of_strings(p_names);

        // Unlike property values, the GetNames array is owned by the caller.
        unsafe {
            check_hres(SafeArrayDestroy(p_names))?;
        }

        res
    }
}

impl Clone for Instance {
    fn clone(&self) -> Self {
        if let Some(pcls_obj) = self.inner {
            unsafe {
                (*pcls_obj.as_ptr()).AddRef();
            }
        }

        Self {
            _session: self._session.clone(),
            inner: self.inner,
        }
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if let Some(pcls_obj) = self.inner {
            unsafe {
                (*pcls_obj.as_ptr()).Release();
            }
        }
    }
}

impl PartialEq for Instance {
    /// Compares the underlying objects, ignoring where they came from
    /// (server and namespace) and any qualifiers.
    fn eq(&self, other: &Self) -> bool {
        let flags = (WBEM_FLAG_IGNORE_OBJECT_SOURCE | WBEM_FLAG_IGNORE_QUALIFIERS) as i32;

        match (self.inner, other.inner) {
            (Some(this), Some(that)) => {
                let hres = unsafe { (*this.as_ptr()).CompareTo(flags, that.as_ptr()) };

                hres == WBEM_S_SAME as i32
            }
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("inner", &self.inner).finish()
    }
}
