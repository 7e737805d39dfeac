//! `<ctype.h>`: byte classification over `int` arguments.

use crate::error::BindingError;
use crate::library::Library;
use crate::value::Value;

fn classify(
    library: &mut Library,
    name: &str,
    predicate: fn(u8) -> bool,
) -> Result<(), BindingError> {
    library.function(&format!("int {}(int)", name), move |_, args| {
        let c = args.int(0)?;
        let hit = u8::try_from(c).map(predicate).unwrap_or(false);
        Ok(Value::Int(hit as i64))
    })?;
    Ok(())
}

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

pub fn register(library: &mut Library) -> Result<(), BindingError> {
    classify(library, "isalnum", |c| c.is_ascii_alphanumeric())?;
    classify(library, "isalpha", |c| c.is_ascii_alphabetic())?;
    classify(library, "isblank", |c| c == b' ' || c == b'\t')?;
    classify(library, "iscntrl", |c| c.is_ascii_control())?;
    classify(library, "isdigit", |c| c.is_ascii_digit())?;
    classify(library, "isgraph", |c| c.is_ascii_graphic())?;
    classify(library, "islower", |c| c.is_ascii_lowercase())?;
    classify(library, "isprint", |c| c.is_ascii_graphic() || c == b' ')?;
    classify(library, "ispunct", |c| c.is_ascii_punctuation())?;
    classify(library, "isspace", is_space)?;
    classify(library, "isupper", |c| c.is_ascii_uppercase())?;
    classify(library, "isxdigit", |c| c.is_ascii_hexdigit())?;

    library.function("int isascii(int)", |_, args| {
        Ok(Value::Int((0..=0x7f).contains(&args.int(0)?) as i64))
    })?;
    library.function("int toascii(int)", |_, args| Ok(Value::Int(args.int(0)? & 0x7f)))?;
    library.function("int tolower(int)", |_, args| {
        let c = args.int(0)?;
        Ok(Value::Int(match u8::try_from(c) {
            Ok(byte) => byte.to_ascii_lowercase() as i64,
            Err(_) => c,
        }))
    })?;
    library.function("int toupper(int)", |_, args| {
        let c = args.int(0)?;
        Ok(Value::Int(match u8::try_from(c) {
            Ok(byte) => byte.to_ascii_uppercase() as i64,
            Err(_) => c,
        }))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::library::stdlib::testing::Harness;
    use crate::value::Value;

    #[test]
    fn test_classification() {
        let mut h = Harness::new();
        let check = |h: &mut Harness, name: &str, c: char| h.call(name, vec![Value::Int(c as i64)]);
        assert_eq!(check(&mut h, "isalpha", 'q'), Value::Int(1));
        assert_eq!(check(&mut h, "isalpha", '1'), Value::Int(0));
        assert_eq!(check(&mut h, "isspace", '\x0b'), Value::Int(1));
        assert_eq!(check(&mut h, "isxdigit", 'F'), Value::Int(1));
        assert_eq!(check(&mut h, "ispunct", '!'), Value::Int(1));
        assert_eq!(h.call("isdigit", vec![Value::Int(-1)]), Value::Int(0));
        assert_eq!(h.call("isascii", vec![Value::Int(200)]), Value::Int(0));
    }

    #[test]
    fn test_case_mapping() {
        let mut h = Harness::new();
        assert_eq!(h.call("toupper", vec![Value::Int('a' as i64)]), Value::Int('A' as i64));
        assert_eq!(h.call("tolower", vec![Value::Int('Z' as i64)]), Value::Int('z' as i64));
        assert_eq!(h.call("tolower", vec![Value::Int('1' as i64)]), Value::Int('1' as i64));
        assert_eq!(h.call("toascii", vec![Value::Int(0x1c1)]), Value::Int(0x41));
    }
}
