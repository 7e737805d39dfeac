//! `<errno.h>`: the script-visible error number lives in `HostState`.

use crate::error::BindingError;
use crate::library::Library;
use crate::types::Type;
use crate::value::Value;
use std::io;

pub const ENOENT: i64 = 2;
pub const EIO: i64 = 5;
pub const EACCES: i64 = 13;
pub const EEXIST: i64 = 17;
pub const EINVAL: i64 = 22;
pub const EDOM: i64 = 33;
pub const ERANGE: i64 = 34;

/// Error number matching an I/O failure.
pub fn from_io(err: &io::Error) -> i64 {
    match err.kind() {
        io::ErrorKind::NotFound => ENOENT,
        io::ErrorKind::PermissionDenied => EACCES,
        io::ErrorKind::AlreadyExists => EEXIST,
        io::ErrorKind::InvalidInput => EINVAL,
        _ => EIO,
    }
}

pub fn message(errno: i64) -> &'static str {
    match errno {
        0 => "Success",
        ENOENT => "No such file or directory",
        EIO => "Input/output error",
        EACCES => "Permission denied",
        EEXIST => "File exists",
        EINVAL => "Invalid argument",
        EDOM => "Numerical argument out of domain",
        ERANGE => "Numerical result out of range",
        _ => "Unknown error",
    }
}

pub fn register(library: &mut Library) -> Result<(), BindingError> {
    for (name, value) in [
        ("ENOENT", ENOENT),
        ("EIO", EIO),
        ("EACCES", EACCES),
        ("EEXIST", EEXIST),
        ("EINVAL", EINVAL),
        ("EDOM", EDOM),
        ("ERANGE", ERANGE),
    ] {
        library.constant(name, Type::Int, value)?;
    }

    library.function("int errno()", |context, _| Ok(Value::Int(context.errno())))?;
    library.function("void set_errno(int)", |context, args| {
        context.set_errno(args.int(0)?);
        Ok(Value::Null)
    })?;
    library.function("string strerror(int)", |_, args| {
        Ok(Value::string(message(args.int(0)?)))
    })?;
    // Goes to the script's stdout so embedders capture it with the rest.
    library.function("void perror(string)", |context, args| {
        let text = match args.opt_string(0)? {
            Some(prefix) if !prefix.is_empty() => {
                format!("{}: {}\n", prefix, message(context.errno()))
            }
            _ => format!("{}\n", message(context.errno())),
        };
        context.write(&text)?;
        Ok(Value::Null)
    })?;
    Ok(())
}
