use eci::{Config, Engine, Grammar, RuntimeError, RuntimeErrorKind, Value};

fn engine() -> Engine {
    Engine::new(Config::captured())
}

fn run(source: &str, grammar: Grammar) -> Result<Value, RuntimeError> {
    let mut engine = engine();
    let unit = engine.compile(source, grammar).unwrap();
    engine.execute(&unit, None, Vec::new())
}

fn output(source: &str, grammar: Grammar) -> String {
    let mut engine = engine();
    let unit = engine.compile(source, grammar).unwrap();
    engine.execute(&unit, None, Vec::new()).unwrap();
    engine.take_output()
}

#[test]
fn test_point_sum_scenario() {
    let source = "
        class Point { int x; int y; int sum(){ return x+y; } }
        p = new Point(); p.x=2; p.y=3; p.sum();";
    assert_eq!(run(source, Grammar::Cpp).unwrap(), Value::Int(5));

    let source = "
        class Point { x = 0; y = 0; sum() { return this.x + this.y; } }
        p = new Point(); p.x = 2; p.y = 3; p.sum();";
    assert_eq!(run(source, Grammar::Js).unwrap(), Value::Int(5));
}

#[test]
fn test_integer_and_float_division_by_zero_differ() {
    for grammar in [Grammar::Cpp, Grammar::Js] {
        let err = run("1 / 0;", grammar).unwrap_err();
        assert_eq!(err.kind_name(), "TypeError");
        assert_eq!((err.location.line, err.location.column), (1, 3));
        assert_eq!(run("1.0 / 0;", grammar).unwrap(), Value::Float(f64::INFINITY));
        assert_eq!(run("7 % 0;", grammar).unwrap_err().kind_name(), "TypeError");
    }
}

#[test]
fn test_unregistered_function_leaves_the_heap_alone() {
    let mut engine = engine();
    let unit = engine
        .compile("int data[] = {1, 2};\nmissing(new int[8], data);", Grammar::Cpp)
        .unwrap();
    let err = engine.execute(&unit, None, Vec::new()).unwrap_err();
    assert!(matches!(err.kind, RuntimeErrorKind::Name(_)));
    assert_eq!(err.location.line, 2);
    // Only the array literal on line 1 was ever allocated.
    assert_eq!(engine.heap().stats().allocated(), 1);
    assert_eq!(engine.heap().stats().live(), 0);
}

#[test]
fn test_integer_operations_match_host_arithmetic() {
    let cases: &[(i64, i64)] = &[(17, 5), (-17, 5), (17, -5), (0, 3), (123_456, 789)];
    for &(a, b) in cases {
        let source = format!(
            "int a = {a}; int b = {b};\n(a + b) * 1000000 + (a - b) * 1000 + a / b + a % b + (a * b) * 7 + (a & b) + (a | b) + (a ^ b);"
        );
        let expected = (a + b) * 1_000_000 + (a - b) * 1000 + a / b + a % b + (a * b) * 7 + (a & b) + (a | b) + (a ^ b);
        assert_eq!(run(&source, Grammar::Cpp).unwrap(), Value::Int(expected), "{} and {}", a, b);
    }
    assert_eq!(
        run("9223372036854775807 + 1;", Grammar::Cpp).unwrap(),
        Value::Int(i64::MIN)
    );
}

#[test]
fn test_virtual_dispatch_through_a_base_typed_variable() {
    let cpp = "
        class A { public: virtual int m() { return 1; } };
        class B : public A { public: int m() { return 2; } };
        A *a = new B();
        a->m();";
    assert_eq!(run(cpp, Grammar::Cpp).unwrap(), Value::Int(2));

    let js = "
        class A { m() { return 1; } }
        class B extends A { m() { return 2; } }
        let a: A = new B();
        a.m();";
    assert_eq!(run(js, Grammar::Js).unwrap(), Value::Int(2));
}

#[test]
fn test_block_scoping_and_shadowing() {
    let source = "
        int x = 1;
        int seen = 0;
        {
            seen = x;
            int x = 10;
            seen = seen * 100 + x;
        }
        seen * 10 + x;";
    assert_eq!(run(source, Grammar::Cpp).unwrap(), Value::Int(1101));
    let err = run("{ let inner = 1; }\ninner;", Grammar::Js).unwrap_err();
    assert!(matches!(err.kind, RuntimeErrorKind::Name(_)));
}

#[test]
fn test_dual_grammar_equivalence() {
    let cpp = r#"
        class Shape {
        public:
            virtual double area() = 0;
            string describe() { return name() + " " + area(); }
            virtual string name() { return "shape"; }
        };
        class Rect : public Shape {
            double w, h;
        public:
            Rect(double w0, double h0) : w(w0), h(h0) {}
            double area() { return w * h; }
            string name() { return "rect"; }
        };
        class Square : public Rect {
        public:
            Square(double s) : Rect(s, s) {}
            string name() { return "square " + Rect::name(); }
        };
        int collatz(int n) {
            int steps = 0;
            while (n != 1) {
                if (n % 2 == 0) n = n / 2; else n = 3 * n + 1;
                steps++;
            }
            return steps;
        }
        int main() {
            Shape *shapes[] = {new Rect(2, 3), new Square(2)};
            for (int i = 0; i < shapes.length; i++) {
                printf("%s\n", shapes[i]->describe());
            }
            printf("%d\n", collatz(27));
            return 0;
        }
    "#;
    let js = r#"
        class Shape {
            describe(): string { return this.name() + " " + this.area(); }
            name(): string { return "shape"; }
            area(): number { return 0.0; }
        }
        class Rect extends Shape {
            #w: number;
            #h: number;
            constructor(w: number, h: number) { super(); this.#w = w; this.#h = h; }
            area(): number { return this.#w * this.#h; }
            name(): string { return "rect"; }
        }
        class Square extends Rect {
            constructor(s: number) { super(s, s); }
            name(): string { return "square " + super.name(); }
        }
        function collatz(n: int): int {
            let steps = 0;
            while (n != 1) {
                if (n % 2 == 0) n = n / 2; else n = 3 * n + 1;
                steps++;
            }
            return steps;
        }
        function main() {
            let shapes = [new Rect(2, 3), new Square(2)];
            for (let i = 0; i < shapes.length; i++) {
                printf("%s\n", shapes[i].describe());
            }
            printf("%d\n", collatz(27));
            return 0;
        }
    "#;
    let mut results = Vec::new();
    for (source, grammar) in [(cpp, Grammar::Cpp), (js, Grammar::Js)] {
        let mut engine = engine();
        let unit = engine.compile(source, grammar).unwrap();
        let value = engine.execute(&unit, Some("main"), Vec::new()).unwrap();
        results.push((value, engine.take_output()));
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0].1, "rect 6\nsquare rect 4\n111\n");
}

#[test]
fn test_runtime_errors_carry_a_trace() {
    let source = "
function inner(xs) {
    return xs[5];
}
function outer() {
    return inner([1, 2]);
}
outer();";
    let err = run(source, Grammar::Js).unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::Index { index: 5, len: 2 });
    assert_eq!(err.location.line, 3);
    let names: Vec<_> = err.trace.iter().map(|frame| frame.function.as_str()).collect();
    assert_eq!(names, vec!["inner", "outer"]);
    assert_eq!(err.trace[0].location.line, 6);
    assert_eq!(err.trace[1].location.line, 8);
}

#[test]
fn test_strings_and_enums() {
    let source = r#"
        enum Level { Low, Mid = 5, High };
        enum class Mode { Off, On };
        string s = "abc";
        int code = s[1];
        printf("%d %d %d %d %s\n", code, s.length, High, (int)Mode::On, "x" + 1 + true);
    "#;
    assert_eq!(output(source, Grammar::Cpp), "98 3 6 1 x1true\n");
}

#[test]
fn test_compile_errors_are_reported_with_positions() {
    let mut engine = engine();
    let err = engine.compile("int x = 1;\nint y = ;", Grammar::Cpp).unwrap_err();
    assert_eq!(err.kind_name(), "ParseError");
    assert_eq!(err.location().line, 2);

    let err = engine.compile("let s = \"open", Grammar::Js).unwrap_err();
    assert_eq!(err.kind_name(), "LexError");

    let err = engine.compile("class A : public Missing {};", Grammar::Cpp).unwrap_err();
    assert_eq!(err.kind_name(), "ResolutionError");
}
