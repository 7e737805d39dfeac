use crate::ast::{BinaryOperator, FunctionDecl, UnaryOperator};
use crate::heap::{ObjectKind, ObjectRef};
use crate::library::HostFunction;
use crate::types::{Type, TypeRegistry};
use std::fmt;
use std::rc::Rc;

/// A callable value: a top-level script function or a host function.
#[derive(Clone)]
pub enum FunctionRef {
    Script(Rc<FunctionDecl>),
    Host(Rc<HostFunction>),
}

impl FunctionRef {
    pub fn name(&self) -> &str {
        match self {
            FunctionRef::Script(decl) => &decl.name,
            FunctionRef::Host(function) => &function.signature.name,
        }
    }

    fn same(&self, other: &FunctionRef) -> bool {
        match (self, other) {
            (FunctionRef::Script(a), FunctionRef::Script(b)) => Rc::ptr_eq(a, b),
            (FunctionRef::Host(a), FunctionRef::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Runtime value. Primitives copy; objects are shared handles into the heap.
#[derive(Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(Rc<str>),
    Object(ObjectRef),
    Function(FunctionRef),
}

impl Value {
    pub fn string(text: impl AsRef<str>) -> Self {
        Value::String(Rc::from(text.as_ref()))
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::String(_) => "string".to_string(),
            Value::Object(object) => match object.try_borrow() {
                Ok(object) => object.type_name(),
                Err(_) => "object".to_string(),
            },
            Value::Function(_) => "function".to_string(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Bool(v) => *v,
            Value::String(s) => !s.is_empty(),
            Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// `==` / `!=`: numerics promote, strings by content, objects by identity.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            _ => self.strict_equals(other),
        }
    }

    /// `===` / `!==`: same kind and same value.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.same(b),
            _ => false,
        }
    }

    fn write_display(&self, f: &mut fmt::Formatter, depth: usize) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Function(function) => write!(f, "<function {}>", function.name()),
            Value::Object(object) => {
                let Ok(object) = object.try_borrow() else {
                    return write!(f, "<object>");
                };
                match &object.kind {
                    ObjectKind::Instance(instance) => write!(f, "<{} object>", instance.class.name),
                    ObjectKind::Array(_) if depth > 8 => write!(f, "[...]"),
                    ObjectKind::Array(items) => {
                        write!(f, "[")?;
                        for (i, item) in items.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            item.write_display(f, depth + 1)?;
                        }
                        write!(f, "]")
                    }
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.write_display(f, 0)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Float(v) => write!(f, "Float({:?})", v),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Function(function) => write!(f, "Function({})", function.name()),
            Value::Object(object) => match object.try_borrow() {
                Ok(object) => write!(f, "Object(#{} {})", object.id, object.type_name()),
                Err(_) => write!(f, "Object(<borrowed>)"),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Rc::from(v))
    }
}

/// Operand kinds after numeric promotion.
enum Numeric {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn numeric(left: &Value, right: &Value) -> Option<Numeric> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(Numeric::Ints(*a, *b)),
        (Value::Int(a), Value::Float(b)) => Some(Numeric::Floats(*a as f64, *b)),
        (Value::Float(a), Value::Int(b)) => Some(Numeric::Floats(*a, *b as f64)),
        (Value::Float(a), Value::Float(b)) => Some(Numeric::Floats(*a, *b)),
        _ => None,
    }
}

fn incompatible(operator: BinaryOperator, left: &Value, right: &Value) -> String {
    format!(
        "unsupported operand types for {}: {} and {}",
        operator.symbol(),
        left.type_name(),
        right.type_name()
    )
}

/// Apply a non-short-circuit binary operator. Errors are TypeError messages.
pub fn binary_op(operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value, String> {
    use BinaryOperator::*;

    match operator {
        Equal => return Ok(Value::Bool(left.loose_equals(right))),
        NotEqual => return Ok(Value::Bool(!left.loose_equals(right))),
        StrictEqual => return Ok(Value::Bool(left.strict_equals(right))),
        StrictNotEqual => return Ok(Value::Bool(!left.strict_equals(right))),
        And | Or => crate::internal_error!("logical operator reached binary_op"),
        _ => {}
    }

    if operator == Add && (matches!(left, Value::String(_)) || matches!(right, Value::String(_))) {
        return Ok(Value::from(format!("{}{}", left, right)));
    }

    if matches!(operator, Less | LessEqual | Greater | GreaterEqual) {
        if let (Value::String(a), Value::String(b)) = (left, right) {
            let ordering = a.cmp(b);
            return Ok(Value::Bool(match operator {
                Less => ordering.is_lt(),
                LessEqual => ordering.is_le(),
                Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            }));
        }
    }

    if matches!(operator, BitAnd | BitOr | BitXor) {
        if let (Value::Bool(a), Value::Bool(b)) = (left, right) {
            return Ok(Value::Bool(match operator {
                BitAnd => a & b,
                BitOr => a | b,
                _ => a ^ b,
            }));
        }
    }

    let operands = numeric(left, right).ok_or_else(|| incompatible(operator, left, right))?;
    match operands {
        Numeric::Ints(a, b) => match operator {
            Add => Ok(Value::Int(a.wrapping_add(b))),
            Subtract => Ok(Value::Int(a.wrapping_sub(b))),
            Multiply => Ok(Value::Int(a.wrapping_mul(b))),
            Divide if b == 0 => Err("integer division by zero".to_string()),
            Divide => Ok(Value::Int(a.wrapping_div(b))),
            Modulo if b == 0 => Err("integer modulo by zero".to_string()),
            Modulo => Ok(Value::Int(a.wrapping_rem(b))),
            BitAnd => Ok(Value::Int(a & b)),
            BitOr => Ok(Value::Int(a | b)),
            BitXor => Ok(Value::Int(a ^ b)),
            ShiftLeft => Ok(Value::Int(a.wrapping_shl((b & 63) as u32))),
            ShiftRight => Ok(Value::Int(a.wrapping_shr((b & 63) as u32))),
            Less => Ok(Value::Bool(a < b)),
            LessEqual => Ok(Value::Bool(a <= b)),
            Greater => Ok(Value::Bool(a > b)),
            GreaterEqual => Ok(Value::Bool(a >= b)),
            _ => Err(incompatible(operator, left, right)),
        },
        Numeric::Floats(a, b) => match operator {
            Add => Ok(Value::Float(a + b)),
            Subtract => Ok(Value::Float(a - b)),
            Multiply => Ok(Value::Float(a * b)),
            Divide => Ok(Value::Float(a / b)),
            Modulo => Ok(Value::Float(a % b)),
            Less => Ok(Value::Bool(a < b)),
            LessEqual => Ok(Value::Bool(a <= b)),
            Greater => Ok(Value::Bool(a > b)),
            GreaterEqual => Ok(Value::Bool(a >= b)),
            _ => Err(incompatible(operator, left, right)),
        },
    }
}

pub fn unary_op(operator: UnaryOperator, operand: &Value) -> Result<Value, String> {
    match (operator, operand) {
        (UnaryOperator::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOperator::Negate, Value::Int(v)) => Ok(Value::Int(v.wrapping_neg())),
        (UnaryOperator::Negate, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnaryOperator::Plus, Value::Int(_) | Value::Float(_)) => Ok(operand.clone()),
        (UnaryOperator::BitNot, Value::Int(v)) => Ok(Value::Int(!v)),
        (operator, value) => Err(format!(
            "unsupported operand type for unary {}: {}",
            operator.symbol(),
            value.type_name()
        )),
    }
}

/// Zero value of a declared type.
pub fn default_value(ty: &Type, types: &TypeRegistry) -> Value {
    match ty {
        Type::Int => Value::Int(0),
        Type::Float => Value::Float(0.0),
        Type::Bool => Value::Bool(false),
        Type::String => Value::string(""),
        Type::Named(name) if types.is_enum(name) => Value::Int(0),
        _ => Value::Null,
    }
}

/// Implicit conversion applied on every typed store (variables, fields,
/// parameters, returns, host arguments). Errors are TypeError messages.
pub fn coerce(value: Value, ty: &Type, types: &TypeRegistry) -> Result<Value, String> {
    let mismatch = |value: &Value| format!("cannot convert {} to {}", value.type_name(), ty);

    match ty {
        Type::Any => Ok(value),
        Type::Void => Ok(Value::Null),
        Type::Int => match value {
            Value::Int(_) => Ok(value),
            Value::Float(v) => Ok(Value::Int(v as i64)),
            Value::Bool(v) => Ok(Value::Int(v as i64)),
            other => Err(mismatch(&other)),
        },
        Type::Float => match value {
            Value::Float(_) => Ok(value),
            Value::Int(v) => Ok(Value::Float(v as f64)),
            other => Err(mismatch(&other)),
        },
        Type::Bool => match value {
            Value::Bool(_) => Ok(value),
            Value::Int(v) => Ok(Value::Bool(v != 0)),
            Value::Float(v) => Ok(Value::Bool(v != 0.0)),
            other => Err(mismatch(&other)),
        },
        Type::String => match value {
            Value::String(_) | Value::Null => Ok(value),
            other => Err(mismatch(&other)),
        },
        Type::Named(name) if types.is_enum(name) => coerce(value, &Type::Int, types),
        Type::Named(name) => match value {
            Value::Null => Ok(Value::Null),
            Value::Object(object) => {
                let matches = object
                    .borrow()
                    .as_instance()
                    .map(|instance| instance.class.is_subclass_of(name))
                    .unwrap_or(false);
                if matches {
                    Ok(Value::Object(object))
                } else {
                    Err(mismatch(&Value::Object(object)))
                }
            }
            other => Err(mismatch(&other)),
        },
        Type::Array(_) => match value {
            Value::Null => Ok(Value::Null),
            Value::Object(object) => {
                let is_array = object.borrow().as_array().is_some();
                if is_array {
                    Ok(Value::Object(object))
                } else {
                    Err(mismatch(&Value::Object(object)))
                }
            }
            other => Err(mismatch(&other)),
        },
        Type::Function => match value {
            Value::Function(_) | Value::Null => Ok(value),
            other => Err(mismatch(&other)),
        },
    }
}

/// Explicit `(T)e` / `T(e)` conversion; wider than `coerce`.
pub fn cast(value: Value, ty: &Type, types: &TypeRegistry) -> Result<Value, String> {
    match ty {
        Type::Bool => Ok(Value::Bool(value.is_truthy())),
        Type::String => match value {
            Value::String(_) => Ok(value),
            other => Ok(Value::from(other.to_string())),
        },
        Type::Float => match value {
            Value::Bool(v) => Ok(Value::Float(if v { 1.0 } else { 0.0 })),
            other => coerce(other, ty, types),
        },
        _ => coerce(value, ty, types),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;

    fn op(operator: BinaryOperator, a: Value, b: Value) -> Result<Value, String> {
        binary_op(operator, &a, &b)
    }

    #[test]
    fn test_integer_arithmetic_matches_host() {
        let pairs = [(7i64, 3i64), (-7, 3), (7, -3), (0, 5), (123456789, 987)];
        for (a, b) in pairs {
            assert_eq!(op(BinaryOperator::Add, a.into(), b.into()), Ok(Value::Int(a + b)));
            assert_eq!(op(BinaryOperator::Subtract, a.into(), b.into()), Ok(Value::Int(a - b)));
            assert_eq!(op(BinaryOperator::Multiply, a.into(), b.into()), Ok(Value::Int(a * b)));
            assert_eq!(op(BinaryOperator::Divide, a.into(), b.into()), Ok(Value::Int(a / b)));
            assert_eq!(op(BinaryOperator::Modulo, a.into(), b.into()), Ok(Value::Int(a % b)));
            assert_eq!(op(BinaryOperator::BitXor, a.into(), b.into()), Ok(Value::Int(a ^ b)));
            assert_eq!(op(BinaryOperator::Less, a.into(), b.into()), Ok(Value::Bool(a < b)));
        }
    }

    #[test]
    fn test_overflow_wraps() {
        assert_eq!(
            op(BinaryOperator::Add, i64::MAX.into(), 1i64.into()),
            Ok(Value::Int(i64::MIN))
        );
        assert_eq!(
            op(BinaryOperator::Divide, i64::MIN.into(), (-1i64).into()),
            Ok(Value::Int(i64::MIN))
        );
        assert_eq!(
            op(BinaryOperator::ShiftLeft, 1i64.into(), 65i64.into()),
            Ok(Value::Int(2))
        );
    }

    #[test]
    fn test_division_by_zero_differs_between_int_and_float() {
        assert!(op(BinaryOperator::Divide, 1i64.into(), 0i64.into()).is_err());
        assert!(op(BinaryOperator::Modulo, 1i64.into(), 0i64.into()).is_err());
        assert_eq!(
            op(BinaryOperator::Divide, 1.0.into(), 0i64.into()),
            Ok(Value::Float(f64::INFINITY))
        );
    }

    #[test]
    fn test_promotion_and_concatenation() {
        assert_eq!(op(BinaryOperator::Add, 1i64.into(), 0.5.into()), Ok(Value::Float(1.5)));
        assert_eq!(
            op(BinaryOperator::Add, "n=".into(), 4i64.into()),
            Ok(Value::string("n=4"))
        );
        assert!(op(BinaryOperator::Subtract, "a".into(), 1i64.into()).is_err());
        assert!(op(BinaryOperator::Multiply, true.into(), 2i64.into()).is_err());
    }

    #[test]
    fn test_equality_rules() {
        assert!(Value::Int(1).loose_equals(&Value::Float(1.0)));
        assert!(!Value::Int(1).strict_equals(&Value::Float(1.0)));
        assert!(!Value::Int(1).loose_equals(&Value::Bool(true)));
        assert!(Value::string("a").loose_equals(&Value::string("a")));

        let heap = Heap::new();
        let a = heap.alloc_array(Vec::new());
        let b = heap.alloc_array(Vec::new());
        assert!(Value::Object(a.clone()).loose_equals(&Value::Object(a)));
        assert!(!Value::Object(b).loose_equals(&Value::Null));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Float(0.1).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("x").is_truthy());
    }

    #[test]
    fn test_coercion_on_typed_store() {
        let types = TypeRegistry::default();
        assert_eq!(coerce(Value::Float(3.9), &Type::Int, &types), Ok(Value::Int(3)));
        assert_eq!(coerce(Value::Int(2), &Type::Float, &types), Ok(Value::Float(2.0)));
        assert_eq!(coerce(Value::Bool(true), &Type::Int, &types), Ok(Value::Int(1)));
        assert!(coerce(Value::string("x"), &Type::Int, &types).is_err());
        assert!(coerce(Value::Int(1), &Type::String, &types).is_err());
        assert_eq!(coerce(Value::Int(1), &Type::Void, &types), Ok(Value::Null));
    }

    #[test]
    fn test_casts() {
        let types = TypeRegistry::default();
        assert_eq!(cast(Value::Float(-2.7), &Type::Int, &types), Ok(Value::Int(-2)));
        assert_eq!(cast(Value::Int(42), &Type::String, &types), Ok(Value::string("42")));
        assert_eq!(cast(Value::string(""), &Type::Bool, &types), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_display() {
        let heap = Heap::new();
        let array = heap.alloc_array(vec![Value::Int(1), Value::Float(2.5), Value::string("x")]);
        assert_eq!(Value::Object(array).to_string(), "[1, 2.5, x]");
        assert_eq!(Value::Float(2.0).to_string(), "2");
        assert_eq!(Value::Null.to_string(), "null");
    }
}
