use std::sync::Arc;

use super::*;

macro_rules! test_text {
    ($name:ident, $val:expr, $expected:expr) => {
        #[test]
        fn $name() {
            let v: Val = $val.into();
            assert_eq!(v.to_text().as_ref(), $expected);
        }
    };
}

test_text!(text_bool, true, "true");
test_text!(text_byte, -8i8, "-8");
test_text!(text_int, 42i32, "42");
test_text!(text_long, -9_000_000_000i64, "-9000000000");
test_text!(text_double, 1.5f64, "1.5");
test_text!(text_whole_double, 2.0f64, "2.0");
test_text!(text_float, 0.25f32, "0.25");
test_text!(text_large_double, 1e20f64, "1.0E20");
test_text!(text_ten_million, 1e7f64, "1.0E7");
test_text!(text_below_ten_million, 9_999_999.5f64, "9999999.5");
test_text!(text_hundred, 100.0f64, "100.0");
test_text!(text_thousandth, 0.001f64, "0.001");
test_text!(text_small_double, -1.5e-7f64, "-1.5E-7");
test_text!(text_negative_zero, -0.0f64, "-0.0");
test_text!(text_float_exponent, 3.0e10f32, "3.0E10");
test_text!(text_infinity, f64::INFINITY, "Infinity");
test_text!(text_negative_infinity, f32::NEG_INFINITY, "-Infinity");
test_text!(text_nan, f64::NAN, "NaN");
test_text!(text_char, 'x', "x");
test_text!(text_null, Option::<i32>::None, "null");

#[test]
fn text_value_is_shared_not_copied() {
    let s: Arc<str> = Arc::from("doc");
    let v = Val::Str(s.clone());
    assert!(Arc::ptr_eq(&v.to_text(), &s));
}

#[test]
fn tags_follow_payload() {
    assert_eq!(Val::from(1i32).tag(), TypeTag::Int);
    assert_eq!(Val::from(1i64).tag(), TypeTag::Long);
    assert_eq!(Val::from("a").tag(), TypeTag::Text);
    assert_eq!(Val::Null.tag(), TypeTag::Null);
    assert_eq!(Val::object("Doc", 3u8).tag(), TypeTag::Object);
}

#[test]
fn type_name_uses_host_class() {
    assert_eq!(Val::object("Doc", ()).type_name(), "Doc");
    assert_eq!(Val::from(1i32).type_name(), "Integer");
    assert_eq!(Val::from("s").type_name(), "String");
}

#[test]
fn objects_compare_by_identity() {
    let a = Val::object("Doc", 1u32);
    let b = Val::object("Doc", 1u32);
    assert_eq!(a, a.clone());
    assert_ne!(a, b);
}

#[test]
fn equal_numbers_of_different_width_are_distinct() {
    assert_ne!(Val::Int(1), Val::Long(1));
    assert_eq!(<i32 as FromVal>::from_val(&Val::Int(7)), Some(7));
    assert_eq!(<i32 as FromVal>::from_val(&Val::Long(7)), None);
}

#[test]
fn host_ref_downcasts_payload() {
    let v = Val::object("Counter", 5u64);
    let obj = v.as_object().unwrap();
    assert_eq!(obj.downcast_ref::<u64>(), Some(&5));
    assert!(obj.downcast_ref::<u32>().is_none());
}
