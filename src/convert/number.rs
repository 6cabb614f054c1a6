//! String to number conversion with the language's lenient prefix rules.

use bitflags::bitflags;

bitflags! {
    /// Classification returned by [`parse_number`]. Exactly one of the type
    /// bits is set; `IS_NUMBER` marks strings that are numeric as a whole.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NumberInfo: u8 {
        const INTEGER = 1;
        const LONG_INTEGER = 2;
        const DOUBLE = 4;
        const UNCONVERTIBLE = 16;
        const TYPE_MASK = Self::INTEGER.bits()
            | Self::LONG_INTEGER.bits()
            | Self::DOUBLE.bits()
            | Self::UNCONVERTIBLE.bits();
        const IS_NUMBER = 64;
        const IS_HEXADECIMAL = 128;
    }
}

/// All three readings of a numeric prefix, plus the narrowest type that holds it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedNumber {
    pub info: NumberInfo,
    pub int: i32,
    pub long: i64,
    pub double: f64,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Whitespace,
    Sign,
    Digits,
    Decimals,
    ExponentSign,
    ExponentAfterSign,
    Exponent,
    LeadingZero,
    Hex,
}

/// Reads the longest numeric prefix of `s`.
///
/// Grammar: `ws* [+-]? digits [. digits]? ([eEdD] [+-]? digits)?` or
/// `ws* [+-]? 0[xX] hexdigits`. Strings without a numeric prefix read as
/// integer zero; no string is unconvertible.
pub fn parse_number(s: &str) -> ParsedNumber {
    let bytes = s.as_bytes();
    let limit = bytes.len();
    let mut p = 0usize;
    let mut info = NumberInfo::empty();

    let mut int_value: i32 = 0;
    let mut int_end: Option<usize> = None;
    let mut long_value: i64 = 0;
    let mut long_end: Option<usize> = None;

    let mut exponent: i32 = 0;
    let mut exp_base: f64 = 10.0;
    let mut divisor: f64 = 10.0;
    let mut exponent_start: Option<usize> = None;
    let mut double_value: f64 = 0.0;
    let mut double_end: Option<usize> = None;

    let mut contains_digit = false;
    let mut sign: i64 = 1;
    let mut state = State::Whitespace;

    'scan: while p < limit {
        let c = bytes[p];
        // states that re-dispatch the same character `continue` this loop
        loop {
            match state {
                State::Whitespace => {
                    if !c.is_ascii_whitespace() {
                        state = State::Sign;
                        continue;
                    }
                    break;
                }
                State::Sign => {
                    if c.is_ascii_digit() {
                        state = State::Digits;
                        continue;
                    }
                    if c == b'-' {
                        sign = -1;
                        state = State::Digits;
                        break;
                    }
                    if c == b'+' {
                        state = State::Digits;
                        break;
                    }
                    if long_end.is_none() {
                        long_value = long_value.wrapping_mul(sign);
                        long_end = Some(p);
                    }
                    if int_end.is_none() {
                        int_value = int_value.wrapping_mul(sign as i32);
                        int_end = Some(p);
                    }
                    if c == b'.' {
                        state = State::Decimals;
                        break;
                    }
                    break 'scan;
                }
                State::Digits => {
                    if c == b'0' && !contains_digit {
                        contains_digit = true;
                        state = State::LeadingZero;
                        break;
                    }
                    if c.is_ascii_digit() {
                        let num = i64::from(c - b'0');
                        contains_digit = true;
                        double_value = double_value * 10.0 + num as f64;

                        if long_end.is_none() {
                            if long_value < i64::MAX / 10
                                || (long_value == i64::MAX / 10 && num <= i64::MAX % 10)
                            {
                                long_value = long_value * 10 + num;
                                if int_end.is_none() {
                                    track_int(long_value, sign, p, &mut int_value, &mut int_end);
                                }
                            } else {
                                long_end = Some(p);
                                long_value = if sign == -1 { i64::MIN } else { i64::MAX };
                            }
                        }
                        break;
                    }
                    if long_end.is_none() {
                        long_value = long_value.wrapping_mul(sign);
                        long_end = Some(p);
                    }
                    if int_end.is_none() {
                        int_value = int_value.wrapping_mul(sign as i32);
                        int_end = Some(p);
                    }
                    if c == b'.' {
                        state = State::Decimals;
                        break;
                    }
                    if matches!(c, b'd' | b'D' | b'e' | b'E') {
                        exponent_start = Some(p);
                        state = State::ExponentSign;
                        break;
                    }
                    break 'scan;
                }
                State::Decimals => {
                    if c.is_ascii_digit() {
                        double_value += f64::from(c - b'0') / divisor;
                        divisor *= 10.0;
                        break;
                    }
                    if matches!(c, b'd' | b'D' | b'e' | b'E') {
                        exponent_start = Some(p);
                        state = State::ExponentSign;
                        break;
                    }
                    break 'scan;
                }
                State::ExponentSign => {
                    if c.is_ascii_digit() {
                        state = State::Exponent;
                        continue;
                    }
                    if c == b'-' {
                        exp_base = 0.1;
                        state = State::ExponentAfterSign;
                        break;
                    }
                    if c == b'+' {
                        state = State::ExponentAfterSign;
                        break;
                    }
                    break 'scan;
                }
                State::ExponentAfterSign => {
                    state = State::Exponent;
                    continue;
                }
                State::Exponent => {
                    if c.is_ascii_digit() {
                        // past 400 the result is either infinite (rejected below) or zero
                        if exponent > 400 {
                            break;
                        }
                        exponent = exponent * 10 + i32::from(c - b'0');
                        if double_value * exp_base.powi(exponent) != f64::INFINITY {
                            break;
                        }
                    }
                    break 'scan;
                }
                State::LeadingZero => {
                    if c == b'x' || c == b'X' {
                        double_end = Some(p);
                        state = State::Hex;
                        break;
                    }
                    state = State::Digits;
                    continue;
                }
                State::Hex => {
                    info |= NumberInfo::IS_HEXADECIMAL;
                    let Some(num) = (c as char).to_digit(16).map(i64::from) else {
                        break 'scan;
                    };
                    if long_value < i64::MAX / 16
                        || (long_value == i64::MAX / 16 && num <= i64::MAX % 16)
                    {
                        long_value = long_value * 16 + num;
                        track_int(long_value, sign, p, &mut int_value, &mut int_end);
                    } else {
                        long_end = Some(p);
                        long_value = if sign == -1 { i64::MIN } else { i64::MAX };
                    }
                    break;
                }
            }
        }
        p += 1;
    }

    // an exponent marker without digits is not part of the number
    if matches!(state, State::ExponentSign | State::ExponentAfterSign) {
        if let Some(start) = exponent_start {
            p = start;
        }
    }

    let double_end = double_end.unwrap_or_else(|| {
        double_value *= exp_base.powi(exponent) * sign as f64;
        p
    });
    let long_end = long_end.unwrap_or_else(|| {
        long_value = long_value.wrapping_mul(sign);
        p
    });
    let int_end = int_end.unwrap_or_else(|| {
        int_value = int_value.wrapping_mul(sign as i32);
        p
    });

    if double_end > long_end {
        info |= NumberInfo::DOUBLE;
    } else if long_end > int_end {
        info |= NumberInfo::LONG_INTEGER;
    } else {
        info |= NumberInfo::INTEGER;
    }

    if contains_digit && p == limit {
        info |= NumberInfo::IS_NUMBER;
    }

    if info.contains(NumberInfo::IS_HEXADECIMAL) {
        double_value = long_value as f64;
    }

    ParsedNumber {
        info,
        int: int_value,
        long: long_value,
        double: double_value,
    }
}

/// Updates the 32-bit reading while the accumulated magnitude still fits;
/// marks where it stopped fitting otherwise.
fn track_int(
    long_value: i64,
    sign: i64,
    p: usize,
    int_value: &mut i32,
    int_end: &mut Option<usize>,
) {
    if long_value <= i64::from(i32::MAX) {
        *int_value = long_value as i32;
    } else if sign == -1 {
        *int_end = Some(if -long_value == i64::from(i32::MIN) { p + 1 } else { p });
        *int_value = i32::MIN;
    } else {
        *int_end = Some(p);
        *int_value = i32::MAX;
    }
}

pub fn string_to_integer(s: &str) -> i32 {
    parse_number(s).int
}

pub fn string_to_long(s: &str) -> i64 {
    parse_number(s).long
}

pub fn string_to_double(s: &str) -> f64 {
    parse_number(s).double
}

/// Formats a double with at most 15 significant digits, switching to
/// exponent notation outside `1e-5 ..= 1e15`.
pub fn double_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // round to 15 significant digits first so the exponent reflects the rounded value
    let scientific = format!("{:.14e}", value);
    let (mantissa, exp) = scientific
        .split_once('e')
        .map(|(m, e)| (m.to_string(), e.parse::<i32>().unwrap_or(0)))
        .unwrap_or((scientific.clone(), 0));

    if (-5..15).contains(&exp) {
        let decimals = (14 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value))
    } else {
        let mantissa = trim_fraction(&mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}E{sign}{:02}", exp.abs())
    }
}

fn trim_fraction(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}
