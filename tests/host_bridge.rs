use eci::error::BindingError;
use eci::library::with_handle;
use eci::{Config, Engine, Grammar, HostClass, RuntimeErrorKind, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct Counter {
    total: i64,
    dropped: Rc<Cell<usize>>,
}

impl Drop for Counter {
    fn drop(&mut self) {
        self.dropped.set(self.dropped.get() + 1);
    }
}

fn counter_class(dropped: Rc<Cell<usize>>) -> HostClass {
    HostClass::new("Counter")
        .constructor("Counter(int)", move |_, args| {
            Ok(Box::new(Counter {
                total: args.int(0)?,
                dropped: Rc::clone(&dropped),
            }) as Box<dyn std::any::Any>)
        })
        .unwrap()
        .method("int add(int)", |_, this, args| {
            let by = args.int(0)?;
            with_handle::<Counter, _>(this, |counter| {
                counter.total += by;
                Ok(Value::Int(counter.total))
            })
        })
        .unwrap()
}

fn engine_with_host(dropped: Rc<Cell<usize>>) -> Engine {
    let mut engine = Engine::new(Config::captured());
    let library = engine.library_mut();
    library.class(counter_class(dropped)).unwrap();
    library
        .function("int live()", |context, _| {
            Ok(Value::Int(context.heap().stats().live() as i64))
        })
        .unwrap();
    library
        .function("double mean(int values[])", |_, args| {
            let array = args.array(0)?;
            let array = array.borrow();
            let items = array.as_array().map(Vec::as_slice).unwrap_or_default();
            let sum: f64 = items.iter().filter_map(Value::as_float).sum();
            Ok(Value::Float(sum / items.len().max(1) as f64))
        })
        .unwrap();
    library.constant("LIMIT", eci::types::Type::Int, 99i64).unwrap();
    engine
}

#[test]
fn test_script_class_extends_a_host_class() {
    let dropped = Rc::new(Cell::new(0));
    let mut engine = engine_with_host(Rc::clone(&dropped));
    let source = "
        class Scaled : public Counter {
        public:
            int factor;
            Scaled(int start, int f) : Counter(start), factor(f) {}
            int bump() { return add(factor); }
        };
        Scaled *s = new Scaled(10, 3);
        s->bump();
        s->bump();";
    let unit = engine.compile(source, Grammar::Cpp).unwrap();
    assert_eq!(engine.execute(&unit, None, Vec::new()).unwrap(), Value::Int(16));
    // The instance went away with the globals, taking its handle with it.
    assert_eq!(dropped.get(), 1);
    assert_eq!(engine.heap().stats().live(), 0);
}

#[test]
fn test_host_finalizer_runs_when_the_last_reference_goes() {
    let dropped = Rc::new(Cell::new(0));
    let mut engine = engine_with_host(Rc::clone(&dropped));
    let source = "
        let a = new Counter(1);
        let b = a;
        let c = a;
        b = null;
        c = null;
        let before = live();
        a = null;
        before * 10 + live();";
    let unit = engine.compile(source, Grammar::Js).unwrap();
    assert_eq!(engine.execute(&unit, None, Vec::new()).unwrap(), Value::Int(10));
    assert_eq!(dropped.get(), 1);
}

struct Tag {
    id: i64,
    released: Rc<RefCell<Vec<i64>>>,
}

impl Drop for Tag {
    fn drop(&mut self) {
        self.released.borrow_mut().push(self.id);
    }
}

#[test]
fn test_locals_are_released_last_declared_first() {
    let released = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&released);
    let mut engine = Engine::new(Config::captured());
    engine
        .library_mut()
        .class(
            HostClass::new("Tag")
                .constructor("Tag(int)", move |_, args| {
                    Ok(Box::new(Tag {
                        id: args.int(0)?,
                        released: Rc::clone(&sink),
                    }) as Box<dyn std::any::Any>)
                })
                .unwrap(),
        )
        .unwrap();
    let source = "
        function scene() {
            let a = new Tag(1);
            {
                let b = new Tag(2);
                let c = new Tag(3);
                let d = new Tag(4);
            }
            let e = new Tag(5);
            let f = new Tag(6);
        }
        scene();
        scene();";
    let unit = engine.compile(source, Grammar::Js).unwrap();
    engine.execute(&unit, None, Vec::new()).unwrap();
    assert_eq!(*released.borrow(), vec![4, 3, 2, 6, 5, 1, 4, 3, 2, 6, 5, 1]);
}

#[test]
fn test_arguments_are_marshalled_by_the_prototype() {
    let mut engine = engine_with_host(Rc::new(Cell::new(0)));
    let unit = engine
        .compile("mean([1, 2, 6]) + LIMIT;", Grammar::Js)
        .unwrap();
    assert_eq!(engine.execute(&unit, None, Vec::new()).unwrap(), Value::Float(102.0));

    let unit = engine.compile("mean(\"text\");", Grammar::Js).unwrap();
    let err = engine.execute(&unit, None, Vec::new()).unwrap_err();
    assert!(matches!(
        err.kind,
        RuntimeErrorKind::Binding(BindingError::ArgumentType { ref function, index: 0, .. }) if function == "mean"
    ));

    let unit = engine.compile("live(1, 2);", Grammar::Js).unwrap();
    let err = engine.execute(&unit, None, Vec::new()).unwrap_err();
    assert!(matches!(
        err.kind,
        RuntimeErrorKind::Binding(BindingError::Arity { expected: 0, found: 2, .. })
    ));
}

#[test]
fn test_host_functions_are_values() {
    let mut engine = engine_with_host(Rc::new(Cell::new(0)));
    let source = "
        function apply(f, x) { return f(x); }
        apply(abs, -7) + apply(strlen, \"four\");";
    let unit = engine.compile(source, Grammar::Js).unwrap();
    assert_eq!(engine.execute(&unit, None, Vec::new()).unwrap(), Value::Int(11));
}

#[test]
fn test_registration_rules() {
    let mut engine = Engine::new(Config::captured());
    let err = engine
        .library_mut()
        .function("int printf(int)", |_, _| Ok(Value::Null))
        .unwrap_err();
    assert_eq!(err, BindingError::Duplicate("printf".to_string()));

    let err = engine
        .library_mut()
        .function("int broken(", |_, _| Ok(Value::Null))
        .unwrap_err();
    assert!(matches!(err, BindingError::Prototype { .. }));

    engine.compile("1;", Grammar::Cpp).unwrap();
    let err = engine
        .library_mut()
        .class(HostClass::new("Late"))
        .unwrap_err();
    assert_eq!(err, BindingError::Sealed("Late".to_string()));
}
