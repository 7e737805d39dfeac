//! `<string.h>` over immutable script strings and arrays.
//!
//! Functions that return a `char *` into their argument in C return a
//! byte index here, -1 when nothing matches. Functions that write into a
//! destination buffer return the new string instead.

use crate::error::BindingError;
use crate::library::{Args, Library};
use crate::value::Value;
use std::cmp::Ordering;

fn index(found: Option<usize>) -> Value {
    Value::Int(found.map_or(-1, |at| at as i64))
}

fn count(args: &Args, index: usize) -> Result<usize, BindingError> {
    let n = args.int(index)?;
    usize::try_from(n).map_err(|_| BindingError::ArgumentType {
        function: args.function().to_string(),
        index,
        expected: "non-negative int".to_string(),
        found: n.to_string(),
    })
}

fn compare(a: &[u8], b: &[u8]) -> i64 {
    for (x, y) in a.iter().zip(b) {
        if x != y {
            return *x as i64 - *y as i64;
        }
    }
    match a.len().cmp(&b.len()) {
        Ordering::Less => -(b[a.len()] as i64),
        Ordering::Greater => a[b.len()] as i64,
        Ordering::Equal => 0,
    }
}

fn byte_set(set: &str) -> impl Fn(&u8) -> bool + '_ {
    move |byte| set.as_bytes().contains(byte)
}

fn array_len(args: &Args, index: usize) -> Result<usize, BindingError> {
    let array = args.array(index)?;
    let len = array.borrow().as_array().map_or(0, Vec::len);
    Ok(len)
}

fn check_span(args: &Args, array: usize, n: usize) -> Result<(), BindingError> {
    let len = array_len(args, array)?;
    if n > len {
        return Err(BindingError::Host(format!(
            "{}: {} elements exceed array length {}",
            args.function(),
            n,
            len
        )));
    }
    Ok(())
}

fn element_order(a: &Value, b: &Value) -> i64 {
    match (a.as_float(), b.as_float()) {
        (Some(x), Some(y)) => match x.partial_cmp(&y) {
            Some(Ordering::Less) => -1,
            Some(Ordering::Greater) => 1,
            _ => 0,
        },
        _ => !a.strict_equals(b) as i64,
    }
}

pub fn register(library: &mut Library) -> Result<(), BindingError> {
    library.function("int strlen(string)", |_, args| {
        Ok(Value::Int(args.string(0)?.len() as i64))
    })?;
    library.function("int strcmp(string, string)", |_, args| {
        Ok(Value::Int(compare(
            args.string(0)?.as_bytes(),
            args.string(1)?.as_bytes(),
        )))
    })?;
    library.function("int strncmp(string, string, int)", |_, args| {
        let n = count(&args, 2)?;
        let (a, b) = (args.string(0)?, args.string(1)?);
        let a = &a.as_bytes()[..n.min(a.len())];
        let b = &b.as_bytes()[..n.min(b.len())];
        Ok(Value::Int(compare(a, b)))
    })?;
    library.function("string strcat(string, string)", |_, args| {
        Ok(Value::string(format!("{}{}", args.string(0)?, args.string(1)?)))
    })?;
    library.function("string strncat(string, string, int)", |_, args| {
        let n = count(&args, 2)?;
        let tail: String = args.string(1)?.chars().take(n).collect();
        Ok(Value::string(format!("{}{}", args.string(0)?, tail)))
    })?;
    library.function("string strcpy(string, string)", |_, args| {
        Ok(Value::String(args.string(1)?))
    })?;
    library.function("string strdup(string)", |_, args| {
        Ok(Value::string(&*args.string(0)?))
    })?;
    library.function("int strchr(string, int)", |_, args| {
        let (text, c) = (args.string(0)?, args.int(1)?);
        Ok(index(text.bytes().position(|b| b as i64 == c)))
    })?;
    library.function("int strrchr(string, int)", |_, args| {
        let (text, c) = (args.string(0)?, args.int(1)?);
        Ok(index(text.bytes().rposition(|b| b as i64 == c)))
    })?;
    library.function("int strstr(string, string)", |_, args| {
        Ok(index(args.string(0)?.find(&*args.string(1)?)))
    })?;
    library.function("int strspn(string, string)", |_, args| {
        let (text, set) = (args.string(0)?, args.string(1)?);
        let inside = byte_set(&set);
        Ok(Value::Int(text.bytes().take_while(|b| inside(b)).count() as i64))
    })?;
    library.function("int strcspn(string, string)", |_, args| {
        let (text, set) = (args.string(0)?, args.string(1)?);
        let inside = byte_set(&set);
        Ok(Value::Int(text.bytes().take_while(|b| !inside(b)).count() as i64))
    })?;
    library.function("int strpbrk(string, string)", |_, args| {
        let (text, set) = (args.string(0)?, args.string(1)?);
        let inside = byte_set(&set);
        Ok(index(text.bytes().position(|b| inside(&b))))
    })?;

    library.function("void *memset(void *, int, int)", |_, args| {
        let n = count(&args, 2)?;
        check_span(&args, 0, n)?;
        let array = args.array(0)?;
        let fill = Value::Int(args.int(1)?);
        if let Some(items) = array.borrow_mut().as_array_mut() {
            for item in items.iter_mut().take(n) {
                *item = fill.clone();
            }
        }
        Ok(Value::Object(array))
    })?;
    library.function("void *memcpy(void *, void *, int)", |_, args| {
        let n = count(&args, 2)?;
        check_span(&args, 0, n)?;
        check_span(&args, 1, n)?;
        let (dest, source) = (args.array(0)?, args.array(1)?);
        let copied: Vec<Value> = source
            .borrow()
            .as_array()
            .map(|items| items[..n].to_vec())
            .unwrap_or_default();
        if let Some(items) = dest.borrow_mut().as_array_mut() {
            for (item, value) in items.iter_mut().zip(copied) {
                *item = value;
            }
        }
        Ok(Value::Object(dest))
    })?;
    library.function("int memcmp(void *, void *, int)", |_, args| {
        let n = count(&args, 2)?;
        check_span(&args, 0, n)?;
        check_span(&args, 1, n)?;
        let (a, b) = (args.array(0)?, args.array(1)?);
        let a = a.borrow();
        let b = b.borrow();
        let order = match (a.as_array(), b.as_array()) {
            (Some(a), Some(b)) => a[..n]
                .iter()
                .zip(&b[..n])
                .map(|(x, y)| element_order(x, y))
                .find(|order| *order != 0)
                .unwrap_or(0),
            _ => 0,
        };
        Ok(Value::Int(order))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::stdlib::testing::Harness;

    fn s(text: &str) -> Value {
        Value::string(text)
    }

    #[test]
    fn test_comparisons() {
        let mut h = Harness::new();
        assert_eq!(h.call("strlen", vec![s("hello")]), Value::Int(5));
        assert_eq!(h.call("strcmp", vec![s("abc"), s("abc")]), Value::Int(0));
        assert!(h.call("strcmp", vec![s("abc"), s("abd")]).as_int().unwrap() < 0);
        assert!(h.call("strcmp", vec![s("abcd"), s("abc")]).as_int().unwrap() > 0);
        assert_eq!(
            h.call("strncmp", vec![s("abcX"), s("abcY"), Value::Int(3)]),
            Value::Int(0)
        );
    }

    #[test]
    fn test_searching_returns_indices() {
        let mut h = Harness::new();
        assert_eq!(h.call("strchr", vec![s("banana"), Value::Int('n' as i64)]), Value::Int(2));
        assert_eq!(h.call("strrchr", vec![s("banana"), Value::Int('n' as i64)]), Value::Int(4));
        assert_eq!(h.call("strchr", vec![s("banana"), Value::Int('z' as i64)]), Value::Int(-1));
        assert_eq!(h.call("strstr", vec![s("haystack"), s("st")]), Value::Int(3));
        assert_eq!(h.call("strspn", vec![s("123abc"), s("0123456789")]), Value::Int(3));
        assert_eq!(h.call("strcspn", vec![s("abc,def"), s(",;")]), Value::Int(3));
        assert_eq!(h.call("strpbrk", vec![s("abc,def"), s(";,")]), Value::Int(3));
    }

    #[test]
    fn test_building_strings() {
        let mut h = Harness::new();
        assert_eq!(h.call("strcat", vec![s("foo"), s("bar")]), s("foobar"));
        assert_eq!(h.call("strncat", vec![s("foo"), s("barbaz"), Value::Int(3)]), s("foobar"));
        assert_eq!(h.call("strcpy", vec![s("old"), s("new")]), s("new"));
        assert_eq!(h.call("strdup", vec![s("same")]), s("same"));
    }

    #[test]
    fn test_memory_functions_work_on_arrays() {
        let mut h = Harness::new();
        let a = Value::Object(h.heap.alloc_array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
        let b = Value::Object(h.heap.alloc_array(vec![Value::Int(9), Value::Int(9), Value::Int(9)]));

        h.call("memset", vec![a.clone(), Value::Int(0), Value::Int(2)]);
        assert_eq!(a.to_string(), "[0, 0, 3]");
        h.call("memcpy", vec![b.clone(), a.clone(), Value::Int(3)]);
        assert_eq!(b.to_string(), "[0, 0, 3]");
        assert_eq!(h.call("memcmp", vec![a.clone(), b.clone(), Value::Int(3)]), Value::Int(0));

        let err = h
            .try_call("memset", vec![a, Value::Int(0), Value::Int(4)])
            .unwrap_err();
        assert!(matches!(err, BindingError::Host(_)));
        assert!(h
            .try_call("strncmp", vec![s("a"), s("b"), Value::Int(-1)])
            .is_err());
    }
}
