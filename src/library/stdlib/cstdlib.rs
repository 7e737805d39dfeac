//! `<stdlib.h>`: numeric parsing, `abs`, the random generator and
//! environment lookup.

use super::errno::{EINVAL, ERANGE};
use crate::error::BindingError;
use crate::library::{HostContext, Library};
use crate::types::Type;
use crate::value::Value;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const RAND_MAX: i64 = 2147483647;

/// C `strtol`: leading space, optional sign, optional `0x`/`0` prefix
/// when `base` is 0 or 16. Out-of-range values saturate and set `ERANGE`.
fn strtol(context: &mut HostContext, text: &str, base: i64) -> i64 {
    if base != 0 && !(2..=36).contains(&base) {
        context.set_errno(EINVAL);
        return 0;
    }
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let has_hex_prefix = (digits.starts_with("0x") || digits.starts_with("0X"))
        && digits[2..].chars().next().map_or(false, |c| c.is_ascii_hexdigit());
    let (radix, digits) = match base {
        0 if has_hex_prefix => (16, &digits[2..]),
        0 if digits.starts_with('0') => (8, digits),
        0 => (10, digits),
        16 if has_hex_prefix => (16, &digits[2..]),
        other => (other as u32, digits),
    };

    let mut value: i64 = 0;
    let mut overflow = false;
    for c in digits.chars() {
        let digit = match c.to_digit(radix) {
            Some(digit) => digit as i64,
            None => break,
        };
        let next = value
            .checked_mul(radix as i64)
            .and_then(|v| if negative { v.checked_sub(digit) } else { v.checked_add(digit) });
        match next {
            Some(next) => value = next,
            None => {
                overflow = true;
                break;
            }
        }
    }
    if overflow {
        context.set_errno(ERANGE);
        return if negative { i64::MIN } else { i64::MAX };
    }
    value
}

/// Longest prefix of `text` that reads as a C floating literal.
fn atof(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &text[digits_start..end] == "." {
        return 0.0;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    text[..end].parse().unwrap_or(0.0)
}

pub fn register(library: &mut Library) -> Result<(), BindingError> {
    library.constant("RAND_MAX", Type::Int, RAND_MAX)?;
    library.constant("NULL", Type::Any, Value::Null)?;
    library.constant("EXIT_SUCCESS", Type::Int, 0i64)?;
    library.constant("EXIT_FAILURE", Type::Int, 1i64)?;

    library.function("int atoi(string)", |context, args| {
        Ok(Value::Int(strtol(context, &args.string(0)?, 10)))
    })?;
    library.function("long atol(string)", |context, args| {
        Ok(Value::Int(strtol(context, &args.string(0)?, 10)))
    })?;
    library.function("long strtol(string, int)", |context, args| {
        let text = args.string(0)?;
        Ok(Value::Int(strtol(context, &text, args.int(1)?)))
    })?;
    library.function("double atof(string)", |_, args| {
        Ok(Value::Float(atof(&args.string(0)?)))
    })?;
    library.function("int abs(int)", |_, args| Ok(Value::Int(args.int(0)?.wrapping_abs())))?;
    library.function("long labs(long)", |_, args| Ok(Value::Int(args.int(0)?.wrapping_abs())))?;

    library.function("int rand()", |context, _| {
        Ok(Value::Int(context.rng().gen_range(0..=RAND_MAX)))
    })?;
    library.function("void srand(int)", |context, args| {
        *context.rng() = StdRng::seed_from_u64(args.int(0)? as u64);
        Ok(Value::Null)
    })?;
    library.function("string getenv(string)", |_, args| {
        Ok(match std::env::var(&*args.string(0)?) {
            Ok(value) => Value::string(value),
            Err(_) => Value::Null,
        })
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::stdlib::testing::Harness;

    #[test]
    fn test_atoi_and_strtol() {
        let mut h = Harness::new();
        assert_eq!(h.call("atoi", vec![Value::string("  -42abc")]), Value::Int(-42));
        assert_eq!(h.call("atoi", vec![Value::string("x")]), Value::Int(0));
        assert_eq!(
            h.call("strtol", vec![Value::string("0x1F"), Value::Int(0)]),
            Value::Int(31)
        );
        assert_eq!(h.call("strtol", vec![Value::string("017"), Value::Int(0)]), Value::Int(15));
        assert_eq!(h.call("strtol", vec![Value::string("zz"), Value::Int(36)]), Value::Int(1295));
        assert_eq!(
            h.call("strtol", vec![Value::string("99999999999999999999"), Value::Int(10)]),
            Value::Int(i64::MAX)
        );
        assert_eq!(h.call("errno", vec![]), Value::Int(ERANGE));
    }

    #[test]
    fn test_atof_reads_longest_prefix() {
        assert_eq!(atof("3.25xyz"), 3.25);
        assert_eq!(atof(" -1e3"), -1000.0);
        assert_eq!(atof("2e"), 2.0);
        assert_eq!(atof("."), 0.0);
        assert_eq!(atof("abc"), 0.0);
    }

    #[test]
    fn test_rand_is_reproducible_after_srand() {
        let mut h = Harness::new();
        h.call("srand", vec![Value::Int(7)]);
        let first: Vec<Value> = (0..3).map(|_| h.call("rand", vec![])).collect();
        h.call("srand", vec![Value::Int(7)]);
        let second: Vec<Value> = (0..3).map(|_| h.call("rand", vec![])).collect();
        assert_eq!(first, second);
        for value in first {
            let n = value.as_int().unwrap();
            assert!((0..=RAND_MAX).contains(&n));
        }
    }

    #[test]
    fn test_abs_and_null() {
        let mut h = Harness::new();
        assert_eq!(h.call("abs", vec![Value::Int(-5)]), Value::Int(5));
        assert!(h.library.host_constant("NULL").unwrap().value.is_null());
        assert_eq!(h.call("getenv", vec![Value::string("ECI_SURELY_UNSET_VAR")]), Value::Null);
    }
}
