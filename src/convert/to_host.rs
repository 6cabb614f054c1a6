//! Hand-written conversions to the well-known primitive targets.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use super::number::{NumberInfo, double_to_string, parse_number, string_to_double};
use super::{ConversionStrictness, Converted};
use crate::value::{HostValue, ObjectRef, Value, string_to_boolean};

use super::ConversionStrictness::{DomainChange, Explicit, PrecisionLost};

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

/// Name of the method an object implements to provide its own string form.
pub const TO_STRING_METHOD: &str = "__toString";

pub fn try_to_boolean(value: &Value) -> Converted<bool> {
    match value {
        Value::Bool(b) => Converted::exact(*b),
        Value::Int(i) => Converted::new(*i != 0, DomainChange),
        Value::Long(l) => Converted::new(*l != 0, DomainChange),
        Value::Double(d) => Converted::new(*d != 0.0, DomainChange),
        Value::String(s) => Converted::new(string_to_boolean(s), DomainChange),
        Value::Bytes(bytes) => Converted::new(bytes.is_truthy(), DomainChange),
        _ => Converted::failed(false),
    }
}

pub fn try_to_int32(value: &Value) -> Converted<i32> {
    match value {
        Value::Int(i) => Converted::exact(*i),
        Value::Bool(b) => Converted::new(i32::from(*b), DomainChange),
        Value::Long(l) => match i32::try_from(*l) {
            Ok(v) => Converted::exact(v),
            Err(_) => Converted::failed(*l as i32),
        },
        Value::Double(d) => {
            if *d >= f64::from(i32::MIN) && *d <= f64::from(i32::MAX) {
                Converted::new(*d as i32, PrecisionLost)
            } else {
                Converted::failed(*d as i32)
            }
        }
        _ => match value.as_php_string() {
            Some(s) => {
                let parsed = parse_number(&s);
                if parsed.info.contains(NumberInfo::INTEGER) {
                    Converted::new(parsed.int, DomainChange)
                } else {
                    Converted::failed(parsed.long as i32)
                }
            }
            None => Converted::failed(0),
        },
    }
}

pub fn try_to_int64(value: &Value) -> Converted<i64> {
    match value {
        Value::Int(i) => Converted::exact(i64::from(*i)),
        Value::Long(l) => Converted::exact(*l),
        Value::Bool(b) => Converted::new(i64::from(*b), DomainChange),
        Value::Double(d) => {
            if *d >= -TWO_POW_63 && *d < TWO_POW_63 {
                Converted::new(*d as i64, PrecisionLost)
            } else {
                Converted::failed(*d as i64)
            }
        }
        _ => match value.as_php_string() {
            Some(s) => {
                let parsed = parse_number(&s);
                if parsed.info.contains(NumberInfo::INTEGER) {
                    Converted::new(i64::from(parsed.int), DomainChange)
                } else if parsed.info.contains(NumberInfo::LONG_INTEGER) {
                    Converted::new(parsed.long, DomainChange)
                } else {
                    Converted::failed(parsed.double as i64)
                }
            }
            None => Converted::failed(0),
        },
    }
}

pub fn try_to_uint64(value: &Value) -> Converted<u64> {
    match value {
        Value::Int(i) => non_negative(i64::from(*i)),
        Value::Long(l) => non_negative(*l),
        Value::Bool(b) => Converted::new(u64::from(*b), DomainChange),
        Value::Double(d) => double_to_uint64(*d),
        _ => match value.as_php_string() {
            Some(s) => {
                let parsed = parse_number(&s);
                if parsed.info.contains(NumberInfo::INTEGER) {
                    Converted::new(parsed.int as u64, DomainChange)
                } else if parsed.info.contains(NumberInfo::LONG_INTEGER) {
                    Converted::new(parsed.long as u64, DomainChange)
                } else {
                    double_to_uint64(parsed.double)
                }
            }
            None => Converted::failed(0),
        },
    }
}

fn non_negative(value: i64) -> Converted<u64> {
    if value >= 0 {
        Converted::exact(value as u64)
    } else {
        Converted::failed(value as u64)
    }
}

fn double_to_uint64(value: f64) -> Converted<u64> {
    if value >= 0.0 && value < TWO_POW_64 {
        Converted::new(value as u64, PrecisionLost)
    } else {
        Converted::failed(value as u64)
    }
}

/// Narrows a canonical conversion; an out-of-range result keeps the
/// truncated value but reports `Failed`.
fn narrow<W, N>(wide: Converted<W>) -> Converted<N>
where
    W: Copy + TryInto<N> + WrapInto<N>,
{
    match wide.value.try_into() {
        Ok(narrow) => Converted::new(narrow, wide.strictness),
        Err(_) => Converted::failed(wide.value.wrap_into()),
    }
}

trait WrapInto<N> {
    fn wrap_into(self) -> N;
}

macro_rules! wrap_into {
    ($from:ty => $($to:ty),+) => {
        $(impl WrapInto<$to> for $from {
            fn wrap_into(self) -> $to {
                self as $to
            }
        })+
    };
}

wrap_into!(i32 => i8, i16, u8, u16);
wrap_into!(i64 => u32);

pub fn try_to_int8(value: &Value) -> Converted<i8> {
    narrow(try_to_int32(value))
}

pub fn try_to_int16(value: &Value) -> Converted<i16> {
    narrow(try_to_int32(value))
}

pub fn try_to_uint8(value: &Value) -> Converted<u8> {
    narrow(try_to_int32(value))
}

pub fn try_to_uint16(value: &Value) -> Converted<u16> {
    narrow(try_to_int32(value))
}

pub fn try_to_uint32(value: &Value) -> Converted<u32> {
    narrow(try_to_int64(value))
}

pub fn try_to_double(value: &Value) -> Converted<f64> {
    match value {
        Value::Double(d) => Converted::exact(*d),
        Value::Int(i) => Converted::exact(f64::from(*i)),
        Value::Long(l) => Converted::exact(*l as f64),
        Value::Bool(b) => Converted::new(if *b { 1.0 } else { 0.0 }, DomainChange),
        _ => match value.as_php_string() {
            Some(s) => Converted::new(string_to_double(&s), DomainChange),
            None => Converted::failed(0.0),
        },
    }
}

/// Never better than `PrecisionLost`; finite values outside the `f32`
/// range fail.
pub fn try_to_single(value: &Value) -> Converted<f32> {
    let wide = try_to_double(value);
    let mut strictness = wide.strictness.worst(PrecisionLost);
    let out_of_range = wide.value < f64::from(f32::MIN) || wide.value > f64::from(f32::MAX);
    if wide.value.is_finite() && out_of_range {
        strictness = ConversionStrictness::Failed;
    }
    Converted::new(wide.value as f32, strictness)
}

/// Integers are exact and doubles lose precision. Numeric strings are a
/// domain change. Doubles outside the decimal range fail.
pub fn try_to_decimal(value: &Value) -> Converted<Decimal> {
    match value {
        Value::Int(i) => Converted::exact(Decimal::from(*i)),
        Value::Long(l) => Converted::exact(Decimal::from(*l)),
        Value::Double(d) => double_to_decimal(*d, PrecisionLost),
        Value::Bool(b) => Converted::new(Decimal::from(u8::from(*b)), DomainChange),
        Value::Null => Converted::new(Decimal::ZERO, DomainChange),
        _ => match value.as_php_string() {
            Some(s) => {
                let parsed = parse_number(&s);
                let kind = parsed.info & NumberInfo::TYPE_MASK;
                if kind == NumberInfo::INTEGER {
                    Converted::new(Decimal::from(parsed.int), DomainChange)
                } else if kind == NumberInfo::LONG_INTEGER {
                    Converted::new(Decimal::from(parsed.long), DomainChange)
                } else {
                    double_to_decimal(parsed.double, DomainChange)
                }
            }
            None => Converted::failed(Decimal::ZERO),
        },
    }
}

fn double_to_decimal(d: f64, strictness: ConversionStrictness) -> Converted<Decimal> {
    match Decimal::from_f64(d) {
        Some(decimal) => Converted::new(decimal, strictness),
        None => Converted::failed(Decimal::ZERO),
    }
}

/// Stringy values pass through; references are followed; scalars are
/// formatted; objects may supply their own string form.
pub fn try_to_string(value: &Value) -> Converted<Option<String>> {
    if let Some(s) = value.as_php_string() {
        return Converted::exact(Some(s.into_owned()));
    }
    match value {
        Value::Reference(reference) => try_to_string(&reference.get()),
        Value::Null => Converted::new(None, DomainChange),
        Value::Int(i) => Converted::new(Some(i.to_string()), DomainChange),
        Value::Long(l) => Converted::new(Some(l.to_string()), DomainChange),
        Value::Bool(b) => Converted::new(Some(if *b { "1" } else { "" }.to_string()), DomainChange),
        Value::Double(d) => Converted::new(Some(double_to_string(*d)), DomainChange),
        Value::Object(object) => match explicit_to_string(object) {
            Some(s) => Converted::new(Some(s), Explicit),
            None => Converted::failed(Some(String::new())),
        },
        _ => Converted::failed(Some(String::new())),
    }
}

fn explicit_to_string(object: &ObjectRef) -> Option<String> {
    let method = object.class().find_method(TO_STRING_METHOD)?;
    match (method.callback)(Some(object), &[]) {
        Ok(result) => try_to_string(&result).ok().map(Option::unwrap_or_default),
        Err(_) => None,
    }
}

pub fn try_to_char(value: &Value) -> Converted<char> {
    let converted = try_to_string(value);
    if let Some(s) = converted.value.as_deref() {
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Converted::exact(c);
        }
    }
    Converted::failed('\0')
}

/// A wrapped host date is exact; otherwise the string form is parsed.
pub fn try_to_date_time(value: &Value) -> Converted<NaiveDateTime> {
    if let Value::Host(host) = value {
        if let HostValue::DateTime(date) = host.as_ref() {
            return Converted::exact(*date);
        }
    }
    let converted = try_to_string(value);
    if !converted.is_failed() {
        if let Some(date) = converted.value.as_deref().and_then(parse_date_time) {
            return Converted::new(date, DomainChange);
        }
    }
    Converted::failed(NaiveDateTime::default())
}

fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|date| date.naive_utc()))
}

/// Always succeeds with a domain change.
pub fn try_to_db_null(_value: &Value) -> Converted<HostValue> {
    Converted::new(HostValue::DbNull, DomainChange)
}
