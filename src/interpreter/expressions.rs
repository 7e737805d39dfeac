use super::Interpreter;
use crate::ast::{BinaryOperator, Expression, ExpressionKind};
use crate::error::{RuntimeError, RuntimeResult, SourceLocation};
use crate::heap::{ObjectKind, ObjectRef};
use crate::types::{ClassInfo, Visibility};
use crate::value::{binary_op, cast, coerce, default_value, unary_op, FunctionRef, Value};
use crate::variable::Variable;
use std::rc::Rc;

/// A storage location an assignment or update writes to.
pub(crate) enum Place {
    Variable(String),
    Field(ObjectRef, String),
    Element(ObjectRef, i64),
}

impl Interpreter<'_> {
    pub(crate) fn evaluate(&mut self, expr: &Expression) -> RuntimeResult<Value> {
        let location = expr.location;
        self.guard_stack(location)?;
        match &expr.kind {
            ExpressionKind::Integer(value) => Ok(Value::Int(*value)),
            ExpressionKind::Float(value) => Ok(Value::Float(*value)),
            ExpressionKind::Bool(value) => Ok(Value::Bool(*value)),
            ExpressionKind::String(value) => Ok(Value::string(value)),
            ExpressionKind::Null => Ok(Value::Null),
            ExpressionKind::Identifier(name) => self.lookup_identifier(name, location),
            ExpressionKind::This => match &self.env.frame().this {
                Some(this) => Ok(Value::Object(Rc::clone(this))),
                None => Err(RuntimeError::type_error("'this' used outside of a method", location)),
            },
            ExpressionKind::ArrayLiteral(items) => {
                let values = self.evaluate_all(items)?;
                Ok(Value::Object(self.heap.alloc_array(values)))
            }
            ExpressionKind::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, *operator, right, location),
            ExpressionKind::Unary { operator, operand } => {
                let operand = self.evaluate(operand)?;
                unary_op(*operator, &operand).map_err(|message| RuntimeError::type_error(message, location))
            }
            ExpressionKind::Update {
                increment,
                prefix,
                target,
            } => {
                let place = self.place(target)?;
                let old = self.read_place(&place, location)?;
                let new = match &old {
                    Value::Int(v) if *increment => Value::Int(v.wrapping_add(1)),
                    Value::Int(v) => Value::Int(v.wrapping_sub(1)),
                    Value::Float(v) if *increment => Value::Float(v + 1.0),
                    Value::Float(v) => Value::Float(v - 1.0),
                    other => {
                        return Err(RuntimeError::type_error(
                            format!(
                                "cannot {} a {}",
                                if *increment { "increment" } else { "decrement" },
                                other.type_name()
                            ),
                            location,
                        ))
                    }
                };
                let stored = self.write_place(place, new, location)?;
                Ok(if *prefix { stored } else { old })
            }
            ExpressionKind::Assign {
                target,
                operator,
                value,
            } => {
                let place = self.place(target)?;
                let value = match operator {
                    Some(operator) => {
                        let current = self.read_place(&place, location)?;
                        let right = self.evaluate(value)?;
                        binary_op(*operator, &current, &right)
                            .map_err(|message| RuntimeError::type_error(message, location))?
                    }
                    None => self.evaluate(value)?,
                };
                self.write_place(place, value, location)
            }
            ExpressionKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_expr)
                } else {
                    self.evaluate(else_expr)
                }
            }
            ExpressionKind::Call { callee, args } => self.evaluate_call(callee, args, location),
            ExpressionKind::Member { object, member } => {
                if let Some(value) = self.enum_member(object, member) {
                    return Ok(value);
                }
                let object = self.evaluate(object)?;
                self.read_member(&object, member, location)
            }
            ExpressionKind::Scope { scope, member } => {
                let unit = self.unit;
                match unit.types.enumeration(scope) {
                    Some(enumeration) => enumeration.value(member).map(Value::Int).ok_or_else(|| {
                        RuntimeError::name_error(
                            format!("enum '{}' has no member '{}'", scope, member),
                            location,
                        )
                    }),
                    None => Err(RuntimeError::type_error(
                        format!("'{}::{}' can only be called", scope, member),
                        location,
                    )),
                }
            }
            ExpressionKind::Index { object, index } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                let index = self.index_value(&index, location)?;
                self.read_index(&object, index, location)
            }
            ExpressionKind::New { class, args } => {
                let unit = self.unit;
                let class = match unit.types.class(class) {
                    Some(class) => Rc::clone(class),
                    None => crate::internal_error!("unresolved class '{}' in new", class),
                };
                let args = self.evaluate_all(args)?;
                self.instantiate(&class, args, location)
            }
            ExpressionKind::NewArray { element_type, size } => {
                let size = self.evaluate(size)?;
                let len = match size {
                    Value::Int(len) if len >= 0 => len as usize,
                    other => {
                        return Err(RuntimeError::type_error(
                            format!("array size must be a non-negative int, got {}", other),
                            location,
                        ))
                    }
                };
                let limit = self.config.max_array_len;
                let mut items: Vec<Value> = Vec::new();
                if len > limit || items.try_reserve_exact(len).is_err() {
                    return Err(RuntimeError::type_error(
                        format!("cannot allocate an array of {} elements (limit {})", len, limit),
                        location,
                    ));
                }
                items.resize(len, default_value(element_type, &self.unit.types));
                Ok(Value::Object(self.heap.alloc_array(items)))
            }
            ExpressionKind::SuperCall { method, args } => {
                self.evaluate_super_call(method.as_deref(), args, location)
            }
            ExpressionKind::Cast {
                target_type,
                operand,
            } => {
                let value = self.evaluate(operand)?;
                cast(value, target_type, &self.unit.types)
                    .map_err(|message| RuntimeError::type_error(message, location))
            }
        }
    }

    /// Left to right.
    pub(crate) fn evaluate_all(&mut self, exprs: &[Expression]) -> RuntimeResult<Vec<Value>> {
        exprs.iter().map(|expr| self.evaluate(expr)).collect()
    }

    fn evaluate_binary(
        &mut self,
        left: &Expression,
        operator: BinaryOperator,
        right: &Expression,
        location: SourceLocation,
    ) -> RuntimeResult<Value> {
        match operator {
            BinaryOperator::And => {
                let left = self.evaluate(left)?.is_truthy();
                Ok(Value::Bool(left && self.evaluate(right)?.is_truthy()))
            }
            BinaryOperator::Or => {
                let left = self.evaluate(left)?.is_truthy();
                Ok(Value::Bool(left || self.evaluate(right)?.is_truthy()))
            }
            _ => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary_op(operator, &left, &right)
                    .map_err(|message| RuntimeError::type_error(message, location))
            }
        }
    }

    /// Locals, then fields of `this`, then globals, then unit-level names.
    fn lookup_identifier(&self, name: &str, location: SourceLocation) -> RuntimeResult<Value> {
        if let Some(variable) = self.env.lookup_local(name) {
            return Ok(variable.value.clone());
        }
        if let Some(value) = self.this_field(name) {
            return Ok(value);
        }
        if let Some(variable) = self.env.global(name) {
            return Ok(variable.value.clone());
        }
        let unit = self.unit;
        if let Some(value) = unit.constants.get(name) {
            return Ok(value.clone());
        }
        if let Some(decl) = unit.functions.get(name) {
            return Ok(Value::Function(FunctionRef::Script(Rc::clone(decl))));
        }
        if let Some(function) = unit.host_functions.get(name) {
            return Ok(Value::Function(FunctionRef::Host(Rc::clone(function))));
        }
        Err(RuntimeError::name_error(
            format!("'{}' is not defined", name),
            location,
        ))
    }

    fn this_field(&self, name: &str) -> Option<Value> {
        let this = self.env.frame().this.as_ref()?;
        let object = this.borrow();
        let instance = object.as_instance()?;
        let slot = instance.class.field_slot(name)?;
        Some(instance.fields[slot].clone())
    }

    /// `Color.Red` in the JS grammar, unless a variable shadows the enum.
    fn enum_member(&self, object: &Expression, member: &str) -> Option<Value> {
        let ExpressionKind::Identifier(name) = &object.kind else {
            return None;
        };
        if self.env.lookup(name).is_some() {
            return None;
        }
        let unit = self.unit;
        unit.types.enumeration(name)?.value(member).map(Value::Int)
    }

    /// Private members are reachable from the declaring class only,
    /// protected ones from the declaring class and its subclasses.
    pub(crate) fn check_access(
        &self,
        owner: &str,
        visibility: Visibility,
        member: &str,
        location: SourceLocation,
    ) -> RuntimeResult<()> {
        let caller = self.env.frame().class.as_ref();
        let allowed = match visibility {
            Visibility::Public => true,
            Visibility::Private => caller.map_or(false, |class| class.name == owner),
            Visibility::Protected => caller.map_or(false, |class| class.is_subclass_of(owner)),
        };
        if allowed {
            Ok(())
        } else {
            Err(RuntimeError::type_error(
                format!("'{}' is {} in '{}'", member, visibility, owner),
                location,
            ))
        }
    }

    pub(super) fn read_member(&self, object: &Value, member: &str, location: SourceLocation) -> RuntimeResult<Value> {
        match object {
            Value::String(text) if member == "length" => Ok(Value::Int(text.len() as i64)),
            Value::Object(object) => {
                let object = object.borrow();
                match &object.kind {
                    ObjectKind::Array(items) if member == "length" => Ok(Value::Int(items.len() as i64)),
                    ObjectKind::Instance(instance) => {
                        let Some(slot) = instance.class.field_slot(member) else {
                            let message = if instance.class.find_method(member).is_some() {
                                format!("method '{}' of '{}' must be called", member, instance.class.name)
                            } else {
                                format!("'{}' has no member '{}'", instance.class.name, member)
                            };
                            return Err(RuntimeError::name_error(message, location));
                        };
                        let field = &instance.class.fields[slot];
                        self.check_access(&field.owner, field.visibility, member, location)?;
                        Ok(instance.fields[slot].clone())
                    }
                    ObjectKind::Array(_) => Err(RuntimeError::name_error(
                        format!("array has no member '{}'", member),
                        location,
                    )),
                }
            }
            Value::Null => Err(RuntimeError::type_error(
                format!("cannot read '{}' of null", member),
                location,
            )),
            other => Err(RuntimeError::type_error(
                format!("{} has no member '{}'", other.type_name(), member),
                location,
            )),
        }
    }

    fn index_value(&self, index: &Value, location: SourceLocation) -> RuntimeResult<i64> {
        match index {
            Value::Int(index) => Ok(*index),
            other => Err(RuntimeError::type_error(
                format!("index must be an int, got {}", other.type_name()),
                location,
            )),
        }
    }

    fn read_index(&self, object: &Value, index: i64, location: SourceLocation) -> RuntimeResult<Value> {
        match object {
            // C `char` semantics: the byte at that position.
            Value::String(text) => usize::try_from(index)
                .ok()
                .and_then(|at| text.as_bytes().get(at))
                .map(|byte| Value::Int(*byte as i64))
                .ok_or_else(|| RuntimeError::index_error(index, text.len(), location)),
            Value::Object(object) => match object.borrow().as_array() {
                Some(items) => usize::try_from(index)
                    .ok()
                    .and_then(|at| items.get(at))
                    .cloned()
                    .ok_or_else(|| RuntimeError::index_error(index, items.len(), location)),
                None => Err(RuntimeError::type_error(
                    format!("{} cannot be indexed", object.borrow().type_name()),
                    location,
                )),
            },
            other => Err(RuntimeError::type_error(
                format!("{} cannot be indexed", other.type_name()),
                location,
            )),
        }
    }

    /// Evaluate the sub-expressions of an assignment target, left to right.
    pub(crate) fn place(&mut self, target: &Expression) -> RuntimeResult<Place> {
        let location = target.location;
        match &target.kind {
            ExpressionKind::Identifier(name) => Ok(Place::Variable(name.clone())),
            ExpressionKind::Member { object, member } => match self.evaluate(object)? {
                Value::Object(object) if object.borrow().as_instance().is_some() => {
                    Ok(Place::Field(object, member.clone()))
                }
                other => Err(RuntimeError::type_error(
                    format!("cannot assign '{}' of {}", member, other.type_name()),
                    location,
                )),
            },
            ExpressionKind::Index { object, index } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                let index = self.index_value(&index, location)?;
                match object {
                    Value::Object(object) if object.borrow().as_array().is_some() => {
                        Ok(Place::Element(object, index))
                    }
                    other => Err(RuntimeError::type_error(
                        format!("cannot assign into {}", other.type_name()),
                        location,
                    )),
                }
            }
            _ => crate::internal_error!("assignment to a non-assignable expression"),
        }
    }

    pub(crate) fn read_place(&self, place: &Place, location: SourceLocation) -> RuntimeResult<Value> {
        match place {
            Place::Variable(name) => self.lookup_identifier(name, location),
            Place::Field(object, member) => {
                self.read_member(&Value::Object(Rc::clone(object)), member, location)
            }
            Place::Element(object, index) => {
                self.read_index(&Value::Object(Rc::clone(object)), *index, location)
            }
        }
    }

    /// Store with the declared type's conversion; returns the stored value.
    pub(crate) fn write_place(
        &mut self,
        place: Place,
        value: Value,
        location: SourceLocation,
    ) -> RuntimeResult<Value> {
        let unit = self.unit;
        let type_error = |message: String| RuntimeError::type_error(message, location);
        match place {
            Place::Variable(name) => {
                if let Some(variable) = self.env.lookup_local_mut(&name) {
                    variable.assign(value, &unit.types).map_err(type_error)?;
                    return Ok(variable.value.clone());
                }
                if let Some(this) = self.env.frame().this.clone() {
                    if this
                        .borrow()
                        .as_instance()
                        .map_or(false, |instance| instance.class.field_slot(&name).is_some())
                    {
                        return self.write_field(&this, &name, value, location);
                    }
                }
                if let Some(variable) = self.env.global_mut(&name) {
                    variable.assign(value, &unit.types).map_err(type_error)?;
                    return Ok(variable.value.clone());
                }
                if unit.constants.contains_key(&name)
                    || unit.functions.contains_key(&name)
                    || unit.host_functions.contains_key(&name)
                {
                    return Err(type_error(format!("cannot assign to '{}'", name)));
                }
                // Assigning an undeclared name creates a dynamic global.
                tracing::trace!(name = %name, "implicit global");
                self.env
                    .declare_global(Variable::new(name, None, value.clone(), false));
                Ok(value)
            }
            Place::Field(object, member) => self.write_field(&object, &member, value, location),
            Place::Element(object, index) => {
                let mut object = object.borrow_mut();
                let Some(items) = object.as_array_mut() else {
                    crate::internal_error!("element place on a non-array");
                };
                let len = items.len();
                match usize::try_from(index).ok().and_then(|at| items.get_mut(at)) {
                    Some(slot) => {
                        *slot = value.clone();
                        Ok(value)
                    }
                    None => Err(RuntimeError::index_error(index, len, location)),
                }
            }
        }
    }

    pub(crate) fn write_field(
        &mut self,
        object: &ObjectRef,
        member: &str,
        value: Value,
        location: SourceLocation,
    ) -> RuntimeResult<Value> {
        let (slot, owner, visibility, field_type, class_name) = {
            let object = object.borrow();
            let Some(instance) = object.as_instance() else {
                crate::internal_error!("field place on a non-instance");
            };
            let Some(slot) = instance.class.field_slot(member) else {
                return Err(RuntimeError::name_error(
                    format!("'{}' has no field '{}'", instance.class.name, member),
                    location,
                ));
            };
            let field = &instance.class.fields[slot];
            (
                slot,
                field.owner.clone(),
                field.visibility,
                field.field_type.clone(),
                instance.class.name.clone(),
            )
        };
        self.check_access(&owner, visibility, member, location)?;
        let value = coerce(value, &field_type, &self.unit.types).map_err(|message| {
            RuntimeError::type_error(format!("{}.{}: {}", class_name, member, message), location)
        })?;
        let mut object = object.borrow_mut();
        if let Some(instance) = object.as_instance_mut() {
            instance.fields[slot] = value.clone();
        }
        Ok(value)
    }

    /// Allocate an instance and run field initialisers and constructors.
    pub(crate) fn instantiate(
        &mut self,
        class: &Rc<ClassInfo>,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> RuntimeResult<Value> {
        let abstract_methods = class.abstract_methods();
        if !abstract_methods.is_empty() {
            return Err(RuntimeError::type_error(
                format!(
                    "cannot instantiate abstract class '{}' (missing {})",
                    class.name,
                    abstract_methods.join(", ")
                ),
                location,
            ));
        }

        let unit = self.unit;
        let defaults = class
            .fields
            .iter()
            .map(|field| default_value(&field.field_type, &unit.types))
            .collect();
        let object = self.heap.alloc_instance(Rc::clone(class), defaults, None);
        tracing::trace!(class = %class.name, "instantiated");

        self.initialise_fields(class, &object, location)?;
        self.construct(class, &object, args, location)?;

        // A host base that no constructor reached still needs its handle.
        let missing_handle = object
            .borrow()
            .as_instance()
            .map_or(false, |instance| instance.host.is_none());
        if missing_handle {
            if let Some((_, ctor)) = class.find_host_constructor() {
                let ctor = Rc::clone(ctor);
                self.construct_host(&ctor, &object, Vec::new(), location)?;
            }
        }
        Ok(Value::Object(object))
    }

    fn initialise_fields(
        &mut self,
        class: &Rc<ClassInfo>,
        object: &ObjectRef,
        location: SourceLocation,
    ) -> RuntimeResult<()> {
        for (slot, field) in class.fields.iter().enumerate() {
            let Some(initializer) = &field.initializer else {
                continue;
            };
            let owner = self.class_rc(&field.owner);
            let value = self.in_method_frame(
                format!("{}::{}", field.owner, field.name),
                object,
                owner,
                location,
                |this| this.evaluate(initializer),
            )?;
            let value = coerce(value, &field.field_type, &self.unit.types).map_err(|message| {
                RuntimeError::type_error(format!("{}.{}: {}", field.owner, field.name, message), location)
            })?;
            if let Some(instance) = object.borrow_mut().as_instance_mut() {
                instance.fields[slot] = value;
            }
        }
        Ok(())
    }

    pub(crate) fn class_rc(&self, name: &str) -> Rc<ClassInfo> {
        match self.unit.types.class(name) {
            Some(class) => Rc::clone(class),
            None => crate::internal_error!("class '{}' vanished from the registry", name),
        }
    }
}
