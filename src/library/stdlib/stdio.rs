//! `<stdio.h>`: formatted output, line and character I/O on the script's
//! stdin/stdout, and the `FILE` host class.

use super::errno;
use crate::error::BindingError;
use crate::heap::ObjectRef;
use crate::library::{with_handle, Args, HostClass, HostContext, Library};
use crate::types::Type;
use crate::value::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};

pub const EOF: i64 = -1;

/// Widest field width or precision a conversion may ask for.
const MAX_FIELD: usize = 4096;

#[derive(Debug, Default)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alternate: bool,
    width: usize,
    precision: Option<usize>,
}

impl Spec {
    /// Pad a rendered conversion to the field width. `sign` is kept in
    /// front of zero padding.
    fn pad(&self, sign: &str, body: &str, numeric: bool) -> String {
        let len = sign.len() + body.chars().count();
        if len >= self.width {
            return format!("{}{}", sign, body);
        }
        let fill = self.width - len;
        if self.left {
            format!("{}{}{}", sign, body, " ".repeat(fill))
        } else if self.zero && numeric {
            format!("{}{}{}", sign, "0".repeat(fill), body)
        } else {
            format!("{}{}{}", " ".repeat(fill), sign, body)
        }
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        }
    }
}

/// `1.5e2` from Rust becomes C's `1.500000e+02`.
fn exponent_form(value: f64, precision: usize, upper: bool) -> String {
    let rendered = format!("{:.*e}", precision, value);
    let (mantissa, exponent) = rendered.split_once('e').unwrap_or((&rendered, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    let text = format!("{}e{}{:02}", mantissa, sign, exponent.abs());
    if upper {
        text.to_uppercase()
    } else {
        text
    }
}

fn strip_trailing_zeros(text: &str) -> String {
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(at) => text.split_at(at),
        None => (text, ""),
    };
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };
    format!("{}{}", mantissa, exponent)
}

fn general_form(value: f64, precision: usize, alternate: bool, upper: bool) -> String {
    let precision = precision.max(1);
    if value == 0.0 {
        let text = format!("{:.*}", precision - 1, 0.0);
        return if alternate { text } else { strip_trailing_zeros(&text) };
    }
    let exponent = format!("{:.*e}", precision - 1, value)
        .split_once('e')
        .and_then(|(_, e)| e.parse::<i64>().ok())
        .unwrap_or(0);
    let text = if exponent < -4 || exponent >= precision as i64 {
        exponent_form(value, precision - 1, upper)
    } else {
        format!("{:.*}", (precision as i64 - 1 - exponent) as usize, value)
    };
    if alternate {
        text
    } else {
        strip_trailing_zeros(&text)
    }
}

fn float_body(value: f64, conversion: char, spec: &Spec) -> String {
    let upper = conversion.is_ascii_uppercase();
    if !value.is_finite() {
        let text = if value.is_nan() { "nan" } else { "inf" };
        return if upper { text.to_uppercase() } else { text.to_string() };
    }
    let precision = spec.precision.unwrap_or(6);
    match conversion {
        'f' | 'F' => format!("{:.*}", precision, value),
        'e' | 'E' => exponent_form(value, precision, upper),
        _ => general_form(value, precision, spec.alternate, upper),
    }
}

fn integer_argument(function: &str, index: usize, value: &Value) -> Result<i64, BindingError> {
    match value {
        Value::Int(v) => Ok(*v),
        Value::Bool(v) => Ok(*v as i64),
        Value::Float(v) => Ok(*v as i64),
        other => Err(BindingError::ArgumentType {
            function: function.to_string(),
            index,
            expected: "int".to_string(),
            found: other.type_name(),
        }),
    }
}

/// Render a C format string. `first_index` is the argument position of
/// `args[0]`, used to name the offending argument in errors.
pub fn format(
    function: &str,
    template: &str,
    args: &[Value],
    first_index: usize,
) -> Result<String, BindingError> {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    let mut next = 0usize;

    let take = |next: &mut usize| -> Result<(usize, Value), BindingError> {
        let index = *next;
        *next += 1;
        args.get(index)
            .cloned()
            .map(|value| (first_index + index, value))
            .ok_or_else(|| BindingError::Arity {
                function: function.to_string(),
                expected: first_index + index + 1,
                found: first_index + args.len(),
            })
    };

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '0' => spec.zero = true,
                '#' => spec.alternate = true,
                _ => break,
            }
            chars.next();
        }
        if chars.peek() == Some(&'*') {
            chars.next();
            let (index, value) = take(&mut next)?;
            let width = integer_argument(function, index, &value)?;
            if width < 0 {
                spec.left = true;
            }
            spec.width = width.unsigned_abs() as usize;
        } else {
            while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
                spec.width = spec.width.saturating_mul(10).saturating_add(digit as usize);
                chars.next();
            }
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            if chars.peek() == Some(&'*') {
                chars.next();
                let (index, value) = take(&mut next)?;
                let precision = integer_argument(function, index, &value)?;
                spec.precision = usize::try_from(precision).ok();
            } else {
                let mut precision: usize = 0;
                while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
                    precision = precision.saturating_mul(10).saturating_add(digit as usize);
                    chars.next();
                }
                spec.precision = Some(precision);
            }
        }
        if spec.width > MAX_FIELD || spec.precision.is_some_and(|p| p > MAX_FIELD) {
            return Err(BindingError::Host(format!(
                "{}: field width or precision above {}",
                function, MAX_FIELD
            )));
        }
        while matches!(chars.peek(), Some('h' | 'l' | 'L' | 'q' | 'j' | 'z' | 't')) {
            chars.next();
        }

        let conversion = match chars.next() {
            Some(conversion) => conversion,
            None => {
                return Err(BindingError::Host(format!(
                    "{}: format ends inside a conversion",
                    function
                )))
            }
        };
        match conversion {
            '%' => out.push('%'),
            'd' | 'i' => {
                let (index, value) = take(&mut next)?;
                let v = integer_argument(function, index, &value)?;
                let mut digits = v.unsigned_abs().to_string();
                if let Some(precision) = spec.precision {
                    if digits.len() < precision {
                        digits = format!("{}{}", "0".repeat(precision - digits.len()), digits);
                    }
                    if precision == 0 && v == 0 {
                        digits.clear();
                    }
                }
                let numeric = spec.precision.is_none();
                out.push_str(&spec.pad(spec.sign(v < 0), &digits, numeric));
            }
            'u' | 'x' | 'X' | 'o' => {
                let (index, value) = take(&mut next)?;
                let v = integer_argument(function, index, &value)? as u64;
                let mut digits = match conversion {
                    'u' => v.to_string(),
                    'x' => format!("{:x}", v),
                    'X' => format!("{:X}", v),
                    _ => format!("{:o}", v),
                };
                if let Some(precision) = spec.precision {
                    if digits.len() < precision {
                        digits = format!("{}{}", "0".repeat(precision - digits.len()), digits);
                    }
                }
                let prefix = match conversion {
                    'x' if spec.alternate && v != 0 => "0x",
                    'X' if spec.alternate && v != 0 => "0X",
                    'o' if spec.alternate && !digits.starts_with('0') => "0",
                    _ => "",
                };
                out.push_str(&spec.pad(prefix, &digits, spec.precision.is_none()));
            }
            'c' => {
                let (index, value) = take(&mut next)?;
                let c = match &value {
                    Value::String(text) => text.chars().next().unwrap_or('\0'),
                    other => {
                        let code = integer_argument(function, index, other)?;
                        u32::try_from(code & 0xff_ffff)
                            .ok()
                            .and_then(char::from_u32)
                            .unwrap_or('?')
                    }
                };
                out.push_str(&spec.pad("", &c.to_string(), false));
            }
            's' => {
                let (_, value) = take(&mut next)?;
                let text = match &value {
                    Value::Null => "(null)".to_string(),
                    other => other.to_string(),
                };
                let text: String = match spec.precision {
                    Some(precision) => text.chars().take(precision).collect(),
                    None => text,
                };
                out.push_str(&spec.pad("", &text, false));
            }
            'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
                let (index, value) = take(&mut next)?;
                let v = value.as_float().ok_or_else(|| BindingError::ArgumentType {
                    function: function.to_string(),
                    index,
                    expected: "double".to_string(),
                    found: value.type_name(),
                })?;
                let body = float_body(v.abs(), conversion, &spec);
                let negative = v.is_sign_negative() && !v.is_nan();
                out.push_str(&spec.pad(spec.sign(negative), &body, v.is_finite()));
            }
            other => {
                return Err(BindingError::Host(format!(
                    "{}: unsupported conversion '%{}'",
                    function, other
                )))
            }
        }
    }
    Ok(out)
}

/// Opaque state behind a script `FILE`.
#[derive(Debug)]
pub struct FileHandle {
    path: String,
    reader: Option<BufReader<File>>,
    writer: Option<BufWriter<File>>,
    eof: bool,
}

impl FileHandle {
    pub fn open(path: &str, mode: &str) -> std::io::Result<Self> {
        let mode: String = mode.chars().filter(|&c| c != 'b').collect();
        let update = mode.ends_with('+');
        let mut options = OpenOptions::new();
        match mode.trim_end_matches('+') {
            "r" => options.read(true).write(update),
            "w" => options.write(true).create(true).truncate(true).read(update),
            "a" => options.append(true).create(true).read(update),
            _ => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid mode '{}'", mode),
                ))
            }
        };
        let file = options.open(path)?;
        let readable = mode.starts_with('r') || update;
        let writable = !mode.starts_with('r') || update;
        let (reader, writer) = match (readable, writable) {
            (true, true) => (
                Some(BufReader::new(file.try_clone()?)),
                Some(BufWriter::new(file)),
            ),
            (true, false) => (Some(BufReader::new(file)), None),
            _ => (None, Some(BufWriter::new(file))),
        };
        tracing::debug!(path, mode = %mode, "opened file");
        Ok(Self {
            path: path.to_string(),
            reader,
            writer,
            eof: false,
        })
    }

    fn is_open(&self) -> bool {
        self.reader.is_some() || self.writer.is_some()
    }

    fn write(&mut self, text: &str) -> std::io::Result<usize> {
        match &mut self.writer {
            Some(writer) => writer.write_all(text.as_bytes()).map(|_| text.len()),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("'{}' is not open for writing", self.path),
            )),
        }
    }

    /// Next line including its newline, `None` at end of file.
    fn read_line(&mut self) -> std::io::Result<Option<String>> {
        if let Some(writer) = &mut self.writer {
            writer.flush()?;
        }
        let reader = match &mut self.reader {
            Some(reader) => reader,
            None => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    format!("'{}' is not open for reading", self.path),
                ))
            }
        };
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            self.eof = true;
            return Ok(None);
        }
        Ok(Some(line))
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.reader = None;
        match self.writer.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

fn file_puts(context: &mut HostContext, file: &ObjectRef, text: &str) -> Result<i64, BindingError> {
    let result = with_handle::<FileHandle, _>(file, |handle| Ok(handle.write(text)))?;
    Ok(match result {
        Ok(written) => written as i64,
        Err(err) => {
            context.set_errno(errno::from_io(&err));
            EOF
        }
    })
}

fn file_gets(context: &mut HostContext, file: &ObjectRef) -> Result<Value, BindingError> {
    let result = with_handle::<FileHandle, _>(file, |handle| Ok(handle.read_line()))?;
    Ok(match result {
        Ok(Some(line)) => Value::string(line),
        Ok(None) => Value::Null,
        Err(err) => {
            context.set_errno(errno::from_io(&err));
            Value::Null
        }
    })
}

fn file_close(context: &mut HostContext, file: &ObjectRef) -> Result<i64, BindingError> {
    let result = with_handle::<FileHandle, _>(file, |handle| {
        Ok(if handle.is_open() { handle.close().map(|_| true) } else { Ok(false) })
    })?;
    Ok(match result {
        Ok(true) => 0,
        Ok(false) => EOF,
        Err(err) => {
            context.set_errno(errno::from_io(&err));
            EOF
        }
    })
}

fn file_eof(file: &ObjectRef) -> Result<bool, BindingError> {
    with_handle::<FileHandle, _>(file, |handle| Ok(handle.eof))
}

fn file_class() -> Result<HostClass, BindingError> {
    HostClass::new("FILE")
        .constructor("FILE(string path, string mode)", |_, args: Args| {
            let path = args.string(0)?;
            let mode = args.string(1)?;
            let handle = FileHandle::open(&path, &mode)
                .map_err(|err| BindingError::Host(format!("cannot open '{}': {}", path, err)))?;
            Ok(Box::new(handle) as Box<dyn std::any::Any>)
        })?
        .method("int puts(string)", |context, this, args| {
            Ok(Value::Int(file_puts(context, this, &args.string(0)?)?))
        })?
        .method("string gets()", |context, this, _| file_gets(context, this))?
        .method("bool eof()", |_, this, _| Ok(Value::Bool(file_eof(this)?)))?
        .method("int close()", |context, this, _| Ok(Value::Int(file_close(context, this)?)))
}

pub fn register(library: &mut Library) -> Result<(), BindingError> {
    library.constant("EOF", Type::Int, EOF)?;
    library.class(file_class()?)?;

    library.function("int printf(string, ...)", |context, args| {
        let text = format("printf", &args.string(0)?, args.rest(1), 1)?;
        context.write(&text)?;
        Ok(Value::Int(text.len() as i64))
    })?;
    library.function("string sprintf(string, ...)", |_, args| {
        Ok(Value::string(format("sprintf", &args.string(0)?, args.rest(1), 1)?))
    })?;
    library.function("int puts(string)", |context, args| {
        let text = format!("{}\n", args.string(0)?);
        context.write(&text)?;
        Ok(Value::Int(text.len() as i64))
    })?;
    library.function("int putchar(int)", |context, args| {
        let code = args.int(0)?;
        let c = u32::try_from(code).ok().and_then(char::from_u32).unwrap_or('?');
        context.write(&c.to_string())?;
        Ok(Value::Int(code))
    })?;
    library.function("int getchar()", |context, _| {
        Ok(Value::Int(context.read_byte()?.map_or(EOF, i64::from)))
    })?;
    library.function("string gets()", |context, _| {
        Ok(context.read_line()?.map_or(Value::Null, Value::string))
    })?;

    library.function("FILE *fopen(string, string)", |context, args| {
        let path = args.string(0)?;
        match FileHandle::open(&path, &args.string(1)?) {
            Ok(handle) => {
                let file = context.new_instance("FILE", Some(Box::new(handle)))?;
                Ok(Value::Object(file))
            }
            Err(err) => {
                context.set_errno(errno::from_io(&err));
                Ok(Value::Null)
            }
        }
    })?;
    library.function("int fclose(FILE *)", |context, args| {
        Ok(Value::Int(file_close(context, &args.object(0)?)?))
    })?;
    library.function("int fputs(string, FILE *)", |context, args| {
        Ok(Value::Int(file_puts(context, &args.object(1)?, &args.string(0)?)?))
    })?;
    library.function("string fgets(FILE *)", |context, args| {
        file_gets(context, &args.object(0)?)
    })?;
    library.function("int fprintf(FILE *, string, ...)", |context, args| {
        let text = format("fprintf", &args.string(1)?, args.rest(2), 2)?;
        Ok(Value::Int(file_puts(context, &args.object(0)?, &text)?))
    })?;
    library.function("int feof(FILE *)", |_, args| {
        Ok(Value::Int(file_eof(&args.object(0)?)? as i64))
    })?;

    library.function("int remove(string)", |context, args| {
        Ok(Value::Int(match fs::remove_file(&*args.string(0)?) {
            Ok(()) => 0,
            Err(err) => {
                context.set_errno(errno::from_io(&err));
                -1
            }
        }))
    })?;
    library.function("int rename(string, string)", |context, args| {
        Ok(Value::Int(
            match fs::rename(&*args.string(0)?, &*args.string(1)?) {
                Ok(()) => 0,
                Err(err) => {
                    context.set_errno(errno::from_io(&err));
                    -1
                }
            },
        ))
    })?;
    Ok(())
}
