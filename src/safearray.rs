use crate::error::{check_hres, WmiError, WmiResult};
use crate::variant::Variant;
use std::slice;
use widestring::WideCStr;
use winapi::{
    shared::{
        minwindef::UINT,
        ntdef::{LONG, NULL},
        winerror::HRESULT,
        wtypes::{
            BSTR, VARIANT_BOOL, VARIANT_FALSE, VT_BOOL, VT_BSTR, VT_I1, VT_I2, VT_I4, VT_I8,
            VT_INT, VT_R4, VT_R8, VT_UI1, VT_UI2, VT_UI4, VT_UI8, VT_UINT,
        },
    },
    um::{
        oaidl::SAFEARRAY,
        oleauto::{SafeArrayAccessData, SafeArrayUnaccessData},
    },
};

// TODO: This should be part of winapi-rs.
extern "system" {
    pub fn SafeArrayGetLBound(psa: *mut SAFEARRAY, nDim: UINT, plLbound: *mut LONG) -> HRESULT;

    pub fn SafeArrayGetUBound(psa: *mut SAFEARRAY, nDim: UINT, plUbound: *mut LONG) -> HRESULT;

    pub fn SafeArrayDestroy(psa: *mut SAFEARRAY) -> HRESULT;
}

/// An accessor to SafeArray, which:
/// 1. Locks the array so the data can be read.
/// 2. Unlocks the array once dropped.
///
/// Pointers to a Safe Array can come from different places (like GetNames,
/// WMI property value), which can have different drop behavior
/// (GetNames requires the caller to deallocate the array,
/// while a WMI property must be deallocated via VariantClear).
///
/// For this reason, we don't have a `struct SafeArray`.
///
/// However, accessing the data of the array must be done using a lock,
/// which is the responsibility of this struct.
#[derive(Debug)]
pub struct SafeArrayAccessor<T> {
    arr: *mut SAFEARRAY,
    p_data: *mut T,
    lower_bound: i32,
    upper_bound: i32,
}

impl<T> SafeArrayAccessor<T> {
    /// Creates a new accessor over a one dimensional array.
    ///
    /// # Safety
    ///
    /// The caller must verify that the array holds items of type `T`.
    pub unsafe fn new(arr: *mut SAFEARRAY) -> WmiResult<Self> {
        let mut p_data = NULL;
        let mut lower_bound: LONG = 0;
        let mut upper_bound: LONG = 0;

        check_hres(SafeArrayGetLBound(arr, 1, &mut lower_bound as _))?;
        check_hres(SafeArrayGetUBound(arr, 1, &mut upper_bound as _))?;
        check_hres(SafeArrayAccessData(arr, &mut p_data))?;

        Ok(Self {
            arr,
            p_data: p_data as *mut T,
            lower_bound,
            upper_bound,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.as_slice().iter()
    }

    fn as_slice(&self) -> &[T] {
        // upper_bound is -1 for an empty array, giving a zero length slice.
        let len = (self.upper_bound + 1 - self.lower_bound) as usize;

        unsafe { slice::from_raw_parts(self.p_data, len) }
    }
}

impl<T> Drop for SafeArrayAccessor<T> {
    fn drop(&mut self) {
        // The lock is released here, but the array itself is never freed by
        // the accessor; its owner (a VARIANT, or a GetNames caller) does that.
        unsafe {
            let _result = check_hres(SafeArrayUnaccessData(self.arr));
        }
    }
}

macro_rules! copy_safe_array_items {
    ($arr:expr, $items:ident, $copy_type:ty, $variant_type:ident) => {{
        let accessor = unsafe { SafeArrayAccessor::<$copy_type>::new($arr)? };

        for item in accessor.iter() {
            $items.push(Variant::$variant_type(*item));
        }
    }};
}

/// Copies the items of a one dimensional array of basic typed items into a
/// `Vec` of [`Variant`]s, in order.
pub fn safe_array_to_vec(arr: *mut SAFEARRAY, item_type: u32) -> WmiResult<Vec<Variant>> {
    let mut items = Vec::new();

    match item_type {
        VT_I1 => copy_safe_array_items!(arr, items, i8, I1),
        VT_I2 => copy_safe_array_items!(arr, items, i16, I2),
        VT_I4 | VT_INT => copy_safe_array_items!(arr, items, i32, I4),
        VT_I8 => copy_safe_array_items!(arr, items, i64, I8),
        VT_UI1 => copy_safe_array_items!(arr, items, u8, UI1),
        VT_UI2 => copy_safe_array_items!(arr, items, u16, UI2),
        VT_UI4 | VT_UINT => copy_safe_array_items!(arr, items, u32, UI4),
        VT_UI8 => copy_safe_array_items!(arr, items, u64, UI8),
        VT_R4 => copy_safe_array_items!(arr, items, f32, R4),
        VT_R8 => copy_safe_array_items!(arr, items, f64, R8),
        VT_BOOL => {
            let accessor = unsafe { SafeArrayAccessor::<VARIANT_BOOL>::new(arr)? };

            for item in accessor.iter() {
                items.push(Variant::Bool(*item != VARIANT_FALSE));
            }
        }
        VT_BSTR => {
            let accessor = unsafe { SafeArrayAccessor::<BSTR>::new(arr)? };

            for item_bstr in accessor.iter() {
                let item: &WideCStr = unsafe { WideCStr::from_ptr_str(*item_bstr) };

                items.push(Variant::String(item.to_string()?));
            }
        }
        _ => return Err(WmiError::ConvertError(item_type as u16)),
    };

    Ok(items)
}

/// Extracts a string array, as returned by calls like `GetNames`.
pub fn safe_array_to_vec_of_strings(arr: *mut SAFEARRAY) -> WmiResult<Vec<String>> {
    let items = safe_array_to_vec(arr, VT_BSTR)?;

    let string_items = items
        .into_iter()
        .map(|item| match item {
            Variant::String(s) => s,
            _ => unreachable!(),
        })
        .collect();

    Ok(string_items)
}
