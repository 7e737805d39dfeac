//! Converting script values to and from host signatures.

use crate::error::BindingError;
use crate::heap::ObjectRef;
use crate::types::{Signature, Type, TypeRegistry};
use crate::value::{coerce, Value};
use std::rc::Rc;

/// Arguments of one host call, already checked against its signature.
#[derive(Debug, Clone)]
pub struct Args {
    function: String,
    values: Vec<Value>,
}

impl Args {
    pub fn new(function: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            values,
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Arguments from `index` on; the variadic tail of `printf`.
    pub fn rest(&self, index: usize) -> &[Value] {
        self.values.get(index..).unwrap_or(&[])
    }

    pub fn get(&self, index: usize) -> Result<&Value, BindingError> {
        self.values.get(index).ok_or_else(|| BindingError::Arity {
            function: self.function.clone(),
            expected: index + 1,
            found: self.values.len(),
        })
    }

    fn mismatch(&self, index: usize, expected: &str) -> BindingError {
        BindingError::ArgumentType {
            function: self.function.clone(),
            index,
            expected: expected.to_string(),
            found: self
                .values
                .get(index)
                .map(Value::type_name)
                .unwrap_or_else(|| "nothing".to_string()),
        }
    }

    pub fn int(&self, index: usize) -> Result<i64, BindingError> {
        match self.get(index)? {
            Value::Int(v) => Ok(*v),
            Value::Bool(v) => Ok(*v as i64),
            _ => Err(self.mismatch(index, "int")),
        }
    }

    pub fn float(&self, index: usize) -> Result<f64, BindingError> {
        self.get(index)?
            .as_float()
            .ok_or_else(|| self.mismatch(index, "double"))
    }

    pub fn bool(&self, index: usize) -> Result<bool, BindingError> {
        match self.get(index)? {
            Value::Bool(v) => Ok(*v),
            Value::Int(v) => Ok(*v != 0),
            _ => Err(self.mismatch(index, "bool")),
        }
    }

    pub fn string(&self, index: usize) -> Result<Rc<str>, BindingError> {
        match self.get(index)? {
            Value::String(text) => Ok(Rc::clone(text)),
            _ => Err(self.mismatch(index, "string")),
        }
    }

    /// A string argument that may be null.
    pub fn opt_string(&self, index: usize) -> Result<Option<Rc<str>>, BindingError> {
        match self.get(index)? {
            Value::Null => Ok(None),
            _ => self.string(index).map(Some),
        }
    }

    pub fn object(&self, index: usize) -> Result<ObjectRef, BindingError> {
        match self.get(index)? {
            Value::Object(object) => Ok(Rc::clone(object)),
            _ => Err(self.mismatch(index, "object")),
        }
    }

    pub fn array(&self, index: usize) -> Result<ObjectRef, BindingError> {
        let object = self.object(index).map_err(|_| self.mismatch(index, "array"))?;
        let is_array = object.borrow().as_array().is_some();
        if is_array {
            Ok(object)
        } else {
            Err(self.mismatch(index, "array"))
        }
    }
}

/// Check arity and coerce every declared parameter. Extra arguments of a
/// variadic function pass through unchanged.
pub fn marshal_arguments(
    signature: &Signature,
    values: Vec<Value>,
    types: &TypeRegistry,
) -> Result<Args, BindingError> {
    let expected = signature.params.len();
    let found = values.len();
    if found < expected || (found > expected && !signature.variadic) {
        return Err(BindingError::Arity {
            function: signature.name.clone(),
            expected,
            found,
        });
    }

    let mut marshalled = Vec::with_capacity(found);
    for (index, value) in values.into_iter().enumerate() {
        let value = match signature.params.get(index) {
            Some(param_type) => {
                let found = value.type_name();
                coerce(value, param_type, types).map_err(|_| BindingError::ArgumentType {
                    function: signature.name.clone(),
                    index,
                    expected: param_type.to_string(),
                    found,
                })?
            }
            None => value,
        };
        marshalled.push(value);
    }
    Ok(Args::new(signature.name.clone(), marshalled))
}

/// Coerce a host result to the declared return type; `void` yields null.
pub fn marshal_return(
    signature: &Signature,
    value: Value,
    types: &TypeRegistry,
) -> Result<Value, BindingError> {
    if signature.return_type == Type::Void {
        return Ok(Value::Null);
    }
    let found = value.type_name();
    coerce(value, &signature.return_type, types).map_err(|_| BindingError::ReturnType {
        function: signature.name.clone(),
        expected: signature.return_type.to_string(),
        found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::parse_prototype;

    #[test]
    fn test_arguments_are_coerced_to_parameter_types() {
        let types = TypeRegistry::default();
        let sig = parse_prototype("double pow(double, double)").unwrap();
        let args = marshal_arguments(&sig, vec![Value::Int(2), Value::Float(0.5)], &types).unwrap();
        assert_eq!(args.values(), &[Value::Float(2.0), Value::Float(0.5)]);
        assert_eq!(args.float(0).unwrap(), 2.0);
    }

    #[test]
    fn test_arity_and_type_errors_name_the_parameter() {
        let types = TypeRegistry::default();
        let sig = parse_prototype("int strncmp(string, string, int)").unwrap();
        assert_eq!(
            marshal_arguments(&sig, vec![Value::string("a")], &types).unwrap_err(),
            BindingError::Arity {
                function: "strncmp".into(),
                expected: 3,
                found: 1
            }
        );
        let err = marshal_arguments(
            &sig,
            vec![Value::string("a"), Value::Int(1), Value::Int(1)],
            &types,
        )
        .unwrap_err();
        assert_eq!(
            err,
            BindingError::ArgumentType {
                function: "strncmp".into(),
                index: 1,
                expected: "string".into(),
                found: "int".into()
            }
        );
    }

    #[test]
    fn test_variadic_tail_passes_through() {
        let types = TypeRegistry::default();
        let sig = parse_prototype("int printf(string, ...)").unwrap();
        let args = marshal_arguments(
            &sig,
            vec![Value::string("%d %s"), Value::Int(1), Value::string("x")],
            &types,
        )
        .unwrap();
        assert_eq!(args.rest(1).len(), 2);
        assert!(args.rest(9).is_empty());
        assert!(args.int(0).is_err());
    }

    #[test]
    fn test_return_values() {
        let types = TypeRegistry::default();
        let sig = parse_prototype("int f()").unwrap();
        assert_eq!(marshal_return(&sig, Value::Float(2.9), &types), Ok(Value::Int(2)));
        assert!(matches!(
            marshal_return(&sig, Value::string("x"), &types),
            Err(BindingError::ReturnType { .. })
        ));
        let sig = parse_prototype("void g()").unwrap();
        assert_eq!(marshal_return(&sig, Value::Int(1), &types), Ok(Value::Null));
    }
}
