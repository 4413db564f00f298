use crate::error::{WmiError, WmiResult};
use crate::safearray::safe_array_to_vec;
use serde::Serialize;
use std::convert::{TryFrom, TryInto};
use widestring::{U16String, WideCStr};
use winapi::shared::wtypes::{
    BSTR, VARIANT_BOOL, VARIANT_FALSE, VARIANT_TRUE, VARTYPE, VT_ARRAY, VT_BOOL, VT_BSTR,
    VT_EMPTY, VT_I1, VT_I2, VT_I4, VT_I8, VT_NULL, VT_R4, VT_R8, VT_TYPEMASK, VT_UI1, VT_UI2,
    VT_UI4, VT_UI8,
};
use winapi::um::oaidl::VARIANT;

/// An owned value decoded from a COM `VARIANT`.
///
/// This is the untyped representation of a property value as WMI returns it:
/// a tag plus the data for that tag. Requesting a property as a concrete
/// Rust type goes through the `TryFrom<Variant>` implementations below; the
/// typed getters on [`Instance`](crate::Instance) and
/// [`QueryResult`](crate::QueryResult) turn any conversion failure into
/// `None`.
///
/// Date/time values are transported by WMI as CIM-formatted strings and show
/// up here as `Variant::String`; see [`WmiDateTime`](crate::WmiDateTime) and
/// [`WmiDuration`](crate::WmiDuration).
#[derive(Debug, PartialEq, Serialize, Clone)]
#[serde(untagged)]
pub enum Variant {
    Empty,
    Null,

    String(String),

    I1(i8),
    I2(i16),
    I4(i32),
    I8(i64),

    R4(f32),
    R8(f64),

    Bool(bool),

    UI1(u8),
    UI2(u16),
    UI4(u32),
    UI8(u64),

    Array(Vec<Variant>),
}

impl Variant {
    /// Decodes a raw `VARIANT` into an owned `Variant`.
    ///
    /// All data is copied out of the `VARIANT`; the caller remains
    /// responsible for clearing it.
    pub fn from_variant(vt: &VARIANT) -> WmiResult<Variant> {
        let variant_type: VARTYPE = unsafe { vt.n1.n2().vt };

        // variant_type has two 'forms':
        // 1. A simple type like `VT_BSTR`.
        // 2. An array of a certain type like `VT_ARRAY | VT_BSTR`.
        if variant_type as u32 & VT_ARRAY == VT_ARRAY {
            let array = unsafe { vt.n1.n2().n3.parray() };

            let item_type = variant_type as u32 & VT_TYPEMASK;

            return Ok(Variant::Array(safe_array_to_vec(*array, item_type)?));
        }

        // See https://msdn.microsoft.com/en-us/library/cc237865.aspx for more info.
        // Rust can infer the return type of `vt.*Val()` calls,
        // but it's easier to read when the type is named explicitly.
        let variant_value = match variant_type as u32 {
            VT_BSTR => {
                let bstr_ptr: &BSTR = unsafe { vt.n1.n2().n3.bstrVal() };

                let prop_val: &WideCStr = unsafe { WideCStr::from_ptr_str(*bstr_ptr) };

                Variant::String(prop_val.to_string()?)
            }
            VT_I1 => {
                let num: &i8 = unsafe { vt.n1.n2().n3.cVal() };

                Variant::I1(*num)
            }
            VT_I2 => {
                let num: &i16 = unsafe { vt.n1.n2().n3.iVal() };

                Variant::I2(*num)
            }
            VT_I4 => {
                let num: &i32 = unsafe { vt.n1.n2().n3.lVal() };

                Variant::I4(*num)
            }
            VT_I8 => {
                let num: &i64 = unsafe { vt.n1.n2().n3.llVal() };

                Variant::I8(*num)
            }
            VT_R4 => {
                let num: &f32 = unsafe { vt.n1.n2().n3.fltVal() };

                Variant::R4(*num)
            }
            VT_R8 => {
                let num: &f64 = unsafe { vt.n1.n2().n3.dblVal() };

                Variant::R8(*num)
            }
            VT_BOOL => {
                let value: &VARIANT_BOOL = unsafe { vt.n1.n2().n3.boolVal() };

                match *value {
                    VARIANT_FALSE => Variant::Bool(false),
                    VARIANT_TRUE => Variant::Bool(true),
                    _ => return Err(WmiError::ConvertBoolError(*value)),
                }
            }
            VT_UI1 => {
                let num: &u8 = unsafe { vt.n1.n2().n3.bVal() };

                Variant::UI1(*num)
            }
            VT_UI2 => {
                let num: &u16 = unsafe { vt.n1.n2().n3.uiVal() };

                Variant::UI2(*num)
            }
            VT_UI4 => {
                let num: &u32 = unsafe { vt.n1.n2().n3.ulVal() };

                Variant::UI4(*num)
            }
            VT_UI8 => {
                let num: &u64 = unsafe { vt.n1.n2().n3.ullVal() };

                Variant::UI8(*num)
            }
            VT_EMPTY => Variant::Empty,
            VT_NULL => Variant::Null,
            _ => return Err(WmiError::ConvertError(variant_type)),
        };

        Ok(variant_value)
    }

    /// Renders the value as a wide (UTF-16) string, the intermediate form
    /// both text conversions go through.
    ///
    /// Strings pass through unchanged; scalars are rendered the way OLE's
    /// `VariantChangeType` renders them (`True`/`False` for bools, decimal
    /// for numbers). `Empty`, `Null` and arrays have no wide form.
    pub fn to_wide_string(&self) -> Option<U16String> {
        let rendered = match self {
            Variant::String(s) => s.clone(),
            Variant::Bool(true) => "True".to_string(),
            Variant::Bool(false) => "False".to_string(),
            Variant::I1(num) => num.to_string(),
            Variant::I2(num) => num.to_string(),
            Variant::I4(num) => num.to_string(),
            Variant::I8(num) => num.to_string(),
            Variant::UI1(num) => num.to_string(),
            Variant::UI2(num) => num.to_string(),
            Variant::UI4(num) => num.to_string(),
            Variant::UI8(num) => num.to_string(),
            Variant::R4(num) => num.to_string(),
            Variant::R8(num) => num.to_string(),
            Variant::Empty | Variant::Null | Variant::Array(_) => return None,
        };

        Some(U16String::from_str(&rendered))
    }
}

impl TryFrom<Variant> for String {
    type Error = WmiError;

    fn try_from(value: Variant) -> WmiResult<String> {
        match value.to_wide_string() {
            Some(wide) => Ok(wide.to_string()?),
            None => Err(WmiError::ConvertVariantError(format!(
                "Variant {:?} cannot be turned into a String",
                &value
            ))),
        }
    }
}

impl TryFrom<Variant> for U16String {
    type Error = WmiError;

    fn try_from(value: Variant) -> WmiResult<U16String> {
        value.to_wide_string().ok_or_else(|| {
            WmiError::ConvertVariantError(format!(
                "Variant {:?} cannot be turned into a U16String",
                &value
            ))
        })
    }
}

impl TryFrom<Variant> for bool {
    type Error = WmiError;

    fn try_from(value: Variant) -> WmiResult<bool> {
        match value {
            Variant::Bool(b) => Ok(b),
            other => Err(WmiError::ConvertVariantError(format!(
                "Variant {:?} cannot be turned into a bool",
                &other
            ))),
        }
    }
}

// Integer requests accept any integer tag as long as the value fits in the
// requested width, plus a decimal string (WMI transports 64 bit integers as
// strings). Out of range values fail the conversion, they never wrap.
macro_rules! impl_try_int_from_variant {
    ($target_type:ty) => {
        impl TryFrom<Variant> for $target_type {
            type Error = WmiError;

            fn try_from(value: Variant) -> WmiResult<$target_type> {
                let out_of_range = |num: &dyn std::fmt::Display| {
                    WmiError::ConvertVariantError(format!(
                        "Value {} cannot be turned into a {}",
                        num,
                        stringify!($target_type)
                    ))
                };

                match value {
                    Variant::I1(num) => <$target_type>::try_from(num).map_err(|_| out_of_range(&num)),
                    Variant::I2(num) => <$target_type>::try_from(num).map_err(|_| out_of_range(&num)),
                    Variant::I4(num) => <$target_type>::try_from(num).map_err(|_| out_of_range(&num)),
                    Variant::I8(num) => <$target_type>::try_from(num).map_err(|_| out_of_range(&num)),
                    Variant::UI1(num) => <$target_type>::try_from(num).map_err(|_| out_of_range(&num)),
                    Variant::UI2(num) => <$target_type>::try_from(num).map_err(|_| out_of_range(&num)),
                    Variant::UI4(num) => <$target_type>::try_from(num).map_err(|_| out_of_range(&num)),
                    Variant::UI8(num) => <$target_type>::try_from(num).map_err(|_| out_of_range(&num)),
                    Variant::String(s) => Ok(s.parse()?),
                    other => Err(WmiError::ConvertVariantError(format!(
                        "Variant {:?} cannot be turned into a {}",
                        &other,
                        stringify!($target_type)
                    ))),
                }
            }
        }
    };
}

// Float requests accept both float widths and every integer tag, like
// `VariantChangeType` does, plus a string parse.
macro_rules! impl_try_float_from_variant {
    ($target_type:ty) => {
        impl TryFrom<Variant> for $target_type {
            type Error = WmiError;

            fn try_from(value: Variant) -> WmiResult<$target_type> {
                match value {
                    Variant::R4(num) => Ok(num as $target_type),
                    Variant::R8(num) => Ok(num as $target_type),
                    Variant::I1(num) => Ok(num as $target_type),
                    Variant::I2(num) => Ok(num as $target_type),
                    Variant::I4(num) => Ok(num as $target_type),
                    Variant::I8(num) => Ok(num as $target_type),
                    Variant::UI1(num) => Ok(num as $target_type),
                    Variant::UI2(num) => Ok(num as $target_type),
                    Variant::UI4(num) => Ok(num as $target_type),
                    Variant::UI8(num) => Ok(num as $target_type),
                    Variant::String(s) => Ok(s.parse()?),
                    other => Err(WmiError::ConvertVariantError(format!(
                        "Variant {:?} cannot be turned into a {}",
                        &other,
                        stringify!($target_type)
                    ))),
                }
            }
        }
    };
}

// A sequence request needs an array tag; each element is then converted
// individually, in order, and any element failure fails the whole
// conversion, so the result is never partially filled.
macro_rules! impl_try_vec_from_variant {
    ($target_type:ty) => {
        impl TryFrom<Variant> for Vec<$target_type> {
            type Error = WmiError;

            fn try_from(value: Variant) -> WmiResult<Vec<$target_type>> {
                let array = match value {
                    Variant::Array(array) => array,
                    other => {
                        return Err(WmiError::ConvertVariantError(format!(
                            "Cannot convert a non-array Variant {:?} to a Vec",
                            &other
                        )));
                    }
                };

                let mut output_vec = Vec::with_capacity(array.len());

                for item in array {
                    output_vec.push(item.try_into()?);
                }

                Ok(output_vec)
            }
        }
    };
}

/// Infallible conversion from a Rust type into the Variant wrapper for that type.
macro_rules! impl_wrap_type {
    ($target_type:ty, $variant_type:ident) => {
        impl From<$target_type> for Variant {
            fn from(value: $target_type) -> Self {
                Variant::$variant_type(value)
            }
        }

        impl From<Vec<$target_type>> for Variant {
            fn from(value: Vec<$target_type>) -> Self {
                Variant::Array(value.into_iter().map(Variant::$variant_type).collect())
            }
        }
    };
}

macro_rules! int_variant_convert {
    ($target_type:ty, $variant_type:ident) => {
        impl_try_int_from_variant!($target_type);
        impl_try_vec_from_variant!($target_type);
        impl_wrap_type!($target_type, $variant_type);
    };
}

macro_rules! float_variant_convert {
    ($target_type:ty, $variant_type:ident) => {
        impl_try_float_from_variant!($target_type);
        impl_try_vec_from_variant!($target_type);
        impl_wrap_type!($target_type, $variant_type);
    };
}

int_variant_convert!(i8, I1);
int_variant_convert!(i16, I2);
int_variant_convert!(i32, I4);
int_variant_convert!(i64, I8);
int_variant_convert!(u8, UI1);
int_variant_convert!(u16, UI2);
int_variant_convert!(u32, UI4);
int_variant_convert!(u64, UI8);

float_variant_convert!(f32, R4);
float_variant_convert!(f64, R8);

impl_try_vec_from_variant!(bool);
impl_wrap_type!(bool, Bool);
impl_wrap_type!(String, String);

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

// Text arrays come back from WMI as arrays of BSTRs, and only those convert
// to a text sequence; a scalar array is not promoted to text element by
// element.
impl TryFrom<Variant> for Vec<String> {
    type Error = WmiError;

    fn try_from(value: Variant) -> WmiResult<Vec<String>> {
        let array = match value {
            Variant::Array(array) => array,
            other => {
                return Err(WmiError::ConvertVariantError(format!(
                    "Cannot convert a non-array Variant {:?} to a Vec",
                    &other
                )));
            }
        };

        let mut output_vec = Vec::with_capacity(array.len());

        for item in array {
            match item {
                Variant::String(s) => output_vec.push(s),
                other => {
                    return Err(WmiError::ConvertVariantError(format!(
                        "Variant {:?} is not a string array element",
                        &other
                    )));
                }
            }
        }

        Ok(output_vec)
    }
}

impl TryFrom<Variant> for Vec<U16String> {
    type Error = WmiError;

    fn try_from(value: Variant) -> WmiResult<Vec<U16String>> {
        let narrow: Vec<String> = value.try_into()?;

        Ok(narrow
            .into_iter()
            .map(|s| U16String::from_str(&s))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_converts_matching_scalars() {
        let num: i32 = Variant::I4(42).try_into().unwrap();
        assert_eq!(num, 42);

        let flag: bool = Variant::Bool(true).try_into().unwrap();
        assert!(flag);

        let num: f64 = Variant::R8(0.5).try_into().unwrap();
        assert_eq!(num, 0.5);
    }

    #[test]
    fn it_widens_and_narrows_integers_when_the_value_fits() {
        let num: u64 = Variant::UI1(7).try_into().unwrap();
        assert_eq!(num, 7);

        let num: u8 = Variant::I4(255).try_into().unwrap();
        assert_eq!(num, 255);

        let num: i64 = Variant::I1(-3).try_into().unwrap();
        assert_eq!(num, -3);
    }

    #[test]
    fn it_fails_on_out_of_range_integers() {
        let num: Result<u8, _> = Variant::I4(300).try_into();
        assert!(num.is_err());

        let num: Result<u32, _> = Variant::I4(-1).try_into();
        assert!(num.is_err());

        let num: Result<i64, _> = Variant::UI8(u64::max_value()).try_into();
        assert!(num.is_err());
    }

    #[test]
    fn it_parses_numbers_out_of_strings() {
        // WMI returns uint64 properties as strings.
        let num: u64 = Variant::String("18446744073709551615".to_string())
            .try_into()
            .unwrap();
        assert_eq!(num, u64::max_value());

        let num: f32 = Variant::String("1.5".to_string()).try_into().unwrap();
        assert_eq!(num, 1.5);

        let num: Result<u32, _> = Variant::String("not a number".to_string()).try_into();
        assert!(num.is_err());
    }

    #[test]
    fn it_fails_on_mismatched_tags() {
        let flag: Result<bool, _> = Variant::String("true".to_string()).try_into();
        assert!(flag.is_err());

        let num: Result<u32, _> = Variant::Bool(true).try_into();
        assert!(num.is_err());

        let num: Result<u32, _> = Variant::Null.try_into();
        assert!(num.is_err());

        let s: Result<String, _> = Variant::Empty.try_into();
        assert!(s.is_err());
    }

    #[test]
    fn it_converts_both_text_widths_from_the_same_value() {
        let narrow: String = Variant::String("Héllo wörld".to_string()).try_into().unwrap();
        let wide: U16String = Variant::String("Héllo wörld".to_string()).try_into().unwrap();

        assert_eq!(narrow, "Héllo wörld");
        assert_eq!(wide.to_string().unwrap(), narrow);
    }

    #[test]
    fn it_renders_scalars_as_text() {
        let s: String = Variant::I8(-42).try_into().unwrap();
        assert_eq!(s, "-42");

        let s: String = Variant::Bool(true).try_into().unwrap();
        assert_eq!(s, "True");

        let s: String = Variant::R8(1.5).try_into().unwrap();
        assert_eq!(s, "1.5");
    }

    #[test]
    fn it_converts_arrays_in_order() {
        let variant = Variant::Array(vec![Variant::I4(1), Variant::I4(2), Variant::I4(3)]);

        let nums: Vec<i32> = variant.try_into().unwrap();
        assert_eq!(nums, vec![1, 2, 3]);

        let variant = Variant::Array(vec![
            Variant::String("a".to_string()),
            Variant::String("b".to_string()),
        ]);

        let strings: Vec<String> = variant.try_into().unwrap();
        assert_eq!(strings, vec!["a", "b"]);
    }

    #[test]
    fn it_converts_array_elements_individually() {
        // Each element gets the scalar treatment, so widening is fine.
        let variant = Variant::Array(vec![Variant::UI1(1), Variant::UI1(2)]);

        let nums: Vec<u16> = variant.try_into().unwrap();
        assert_eq!(nums, vec![1, 2]);
    }

    #[test]
    fn it_converts_an_empty_array_to_an_empty_vec() {
        let nums: Vec<u32> = Variant::Array(vec![]).try_into().unwrap();
        assert!(nums.is_empty());

        let strings: Vec<String> = Variant::Array(vec![]).try_into().unwrap();
        assert!(strings.is_empty());
    }

    #[test]
    fn it_never_partially_converts_an_array() {
        let variant = Variant::Array(vec![Variant::I4(1), Variant::Bool(true)]);

        let nums: Result<Vec<i32>, _> = variant.try_into();
        assert!(nums.is_err());
    }

    #[test]
    fn it_does_not_promote_scalar_arrays_to_text() {
        let variant = Variant::Array(vec![Variant::I4(1), Variant::I4(2)]);

        let strings: Result<Vec<String>, _> = variant.try_into();
        assert!(strings.is_err());
    }

    #[test]
    fn it_fails_to_convert_a_scalar_to_a_vec() {
        let nums: Result<Vec<i32>, _> = Variant::I4(1).try_into();
        assert!(nums.is_err());
    }

    #[test]
    fn it_passes_the_untyped_value_through() {
        let variant: Variant = Variant::I4(7).try_into().unwrap();
        assert_eq!(variant, Variant::I4(7));
    }

    #[test]
    fn it_wraps_rust_values() {
        assert_eq!(Variant::from(42u32), Variant::UI4(42));
        assert_eq!(Variant::from("abc"), Variant::String("abc".to_string()));
        assert_eq!(
            Variant::from(vec![1i32, 2]),
            Variant::Array(vec![Variant::I4(1), Variant::I4(2)])
        );
    }

    #[test]
    fn it_serializes_untagged() {
        let variant = Variant::Array(vec![
            Variant::I4(1),
            Variant::String("two".to_string()),
            Variant::Bool(false),
        ]);

        let serialized = serde_json::to_string(&variant).unwrap();
        assert_eq!(serialized, r#"[1,"two",false]"#);

        let null = serde_json::to_string(&Variant::Null).unwrap();
        assert_eq!(null, "null");
    }
}
