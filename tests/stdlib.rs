use eci::{Config, Engine, Grammar};
use std::io::Cursor;

fn run_cpp(engine: &mut Engine, source: &str) -> String {
    let unit = engine.compile(source, Grammar::Cpp).unwrap();
    engine.execute(&unit, None, Vec::new()).unwrap();
    engine.take_output()
}

#[test]
fn test_file_round_trip_through_stdio() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    let moved = dir.path().join("moved.txt");
    let source = format!(
        r#"
        string path = {path:?};
        FILE *f = fopen(path, "w");
        fputs("first\n", f);
        fprintf(f, "%d-%s\n", 42, "x");
        fclose(f);

        FILE *r = fopen(path, "r");
        auto a = fgets(r);
        auto b = fgets(r);
        auto c = fgets(r);
        printf("%s%s%d %d\n", a, b, c == nullptr ? 1 : 0, feof(r));
        fclose(r);

        printf("%d %d\n", rename(path, {moved:?}), remove({moved:?}));
        FILE *gone = fopen(path, "r");
        printf("%d\n", gone == nullptr && errno() == ENOENT ? 1 : 0);
        "#,
        path = path.display().to_string(),
        moved = moved.display().to_string(),
    );
    let mut engine = Engine::new(Config::captured());
    assert_eq!(run_cpp(&mut engine, &source), "first\n42-x\n1 1\n0 0\n1\n");
    assert!(!path.exists());
    assert!(!moved.exists());
}

#[test]
fn test_file_methods_on_the_host_class() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.txt").display().to_string();
    let source = format!(
        r#"
        let out = new FILE({path:?}, "w");
        out.puts("one\n");
        out.puts("two\n");
        out.close();
        let input = new FILE({path:?}, "r");
        let lines = 0;
        while (input.gets() != null) lines++;
        printf("%d %s\n", lines, input.eof());
        "#,
    );
    let mut engine = Engine::new(Config::captured());
    let unit = engine.compile(&source, Grammar::Js).unwrap();
    engine.execute(&unit, None, Vec::new()).unwrap();
    assert_eq!(engine.take_output(), "2 true\n");
}

#[test]
fn test_stdin_is_replaceable() {
    let mut engine = Engine::new(Config::captured());
    engine.set_input(Box::new(Cursor::new("alpha\nbeta\n")));
    let out = run_cpp(
        &mut engine,
        r#"
        string first = gets();
        printf("%s|%s|%d\n", first, gets(), gets() == nullptr ? 1 : 0);
        "#,
    );
    assert_eq!(out, "alpha|beta|1\n");
}

#[test]
fn test_math_string_and_ctype() {
    let mut engine = Engine::new(Config::captured());
    let out = run_cpp(
        &mut engine,
        r#"
        printf("%.3f %d %.1f\n", sqrt(2.0), abs(-4), floor(M_PI));
        printf("%d %d %d\n", strlen("hello"), strstr("hello", "ll"), strchr("hello", 122));
        printf("%c%c %d\n", toupper(97), tolower(66), isdigit(55) != 0);
        printf("%s|%5.1f|%-4s|\n", sprintf("%03d", 7), 2.5, "ab");
        printf("%d %d\n", atoi("  -12x"), strtol("ff", 16));
        "#,
    );
    assert_eq!(
        out,
        "1.414 4 3.0\n5 2 -1\nAb 1\n007|  2.5|ab  |\n-12 255\n"
    );
}

#[test]
fn test_time_functions() {
    let mut engine = Engine::new(Config::captured());
    let out = run_cpp(
        &mut engine,
        r#"
        tm *day = gmtime(86400 + 3600);
        printf("%s %d %d\n", strftime("%Y-%m-%d %H", day), day->tm_wday, time(nullptr) > 1600000000);
        day->tm_mday = day->tm_mday + 31;
        printf("%s\n", strftime("%Y-%m-%d", day));
        "#,
    );
    assert_eq!(out, "1970-01-02 01 5 1\n1970-02-02\n");
}
