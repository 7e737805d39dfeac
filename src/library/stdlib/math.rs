//! `<math.h>` over doubles. Domain and range failures set `errno` the
//! way C does and still return the IEEE result.

use super::errno::{EDOM, ERANGE};
use crate::error::BindingError;
use crate::library::{HostContext, Library};
use crate::types::Type;
use crate::value::Value;

fn report(context: &mut HostContext, inputs: &[f64], result: f64) -> Value {
    let finite_inputs = inputs.iter().all(|x| x.is_finite());
    if result.is_nan() && !inputs.iter().any(|x| x.is_nan()) {
        context.set_errno(EDOM);
    } else if result.is_infinite() && finite_inputs {
        context.set_errno(ERANGE);
    }
    Value::Float(result)
}

fn unary(library: &mut Library, name: &str, f: fn(f64) -> f64) -> Result<(), BindingError> {
    library.function(&format!("double {}(double)", name), move |context, args| {
        let x = args.float(0)?;
        Ok(report(context, &[x], f(x)))
    })?;
    Ok(())
}

fn binary(library: &mut Library, name: &str, f: fn(f64, f64) -> f64) -> Result<(), BindingError> {
    library.function(&format!("double {}(double, double)", name), move |context, args| {
        let (x, y) = (args.float(0)?, args.float(1)?);
        Ok(report(context, &[x, y], f(x, y)))
    })?;
    Ok(())
}

/// C `fmod`: the sign follows the dividend, which is what `%` on f64 does.
fn fmod(x: f64, y: f64) -> f64 {
    x % y
}

pub fn register(library: &mut Library) -> Result<(), BindingError> {
    library.constant("M_PI", Type::Float, std::f64::consts::PI)?;
    library.constant("M_E", Type::Float, std::f64::consts::E)?;
    library.constant("HUGE_VAL", Type::Float, f64::INFINITY)?;

    unary(library, "sin", f64::sin)?;
    unary(library, "cos", f64::cos)?;
    unary(library, "tan", f64::tan)?;
    unary(library, "asin", f64::asin)?;
    unary(library, "acos", f64::acos)?;
    unary(library, "atan", f64::atan)?;
    unary(library, "sinh", f64::sinh)?;
    unary(library, "cosh", f64::cosh)?;
    unary(library, "tanh", f64::tanh)?;
    unary(library, "exp", f64::exp)?;
    unary(library, "log", f64::ln)?;
    unary(library, "log10", f64::log10)?;
    unary(library, "sqrt", f64::sqrt)?;
    unary(library, "ceil", f64::ceil)?;
    unary(library, "floor", f64::floor)?;
    unary(library, "round", f64::round)?;
    unary(library, "fabs", f64::abs)?;
    binary(library, "atan2", f64::atan2)?;
    binary(library, "pow", f64::powf)?;
    binary(library, "fmod", fmod)?;
    binary(library, "hypot", f64::hypot)?;

    library.function("double ldexp(double, int)", |context, args| {
        let x = args.float(0)?;
        let exp = args.int(1)?.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        Ok(report(context, &[x], x * 2f64.powi(exp)))
    })?;
    Ok(())
}
