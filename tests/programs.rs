//! End-to-end scenarios: complete programs through parse, check and run,
//! asserting stdout bytes and exit codes.

use std::fs;
use std::io::Cursor;

use anyhow::{Context, Result};
use indoc::indoc;

use tipy::check::check_program;
use tipy::config::Config;
use tipy::error::{Error, ErrorKind};
use tipy::interpreter::Interpreter;
use tipy::parser::{parse_file, parse_source};

fn run_with_input(source: &str, input: &str) -> Result<(String, i32)> {
    let root = parse_source("program.ti", source, &Config::default())
        .map_err(|error| anyhow::anyhow!("{error}"))
        .context("parsing")?;
    check_program(&root)
        .map_err(|error| anyhow::anyhow!("{error}"))
        .context("checking")?;
    let mut stdin = Cursor::new(input.as_bytes().to_vec());
    let mut stdout = Vec::new();
    let code = Interpreter::new(&mut stdin, &mut stdout)
        .run(&root)
        .map_err(|error| anyhow::anyhow!("{error}"))
        .context("running")?;
    Ok((String::from_utf8(stdout).context("stdout should be UTF-8")?, code))
}

fn run(source: &str) -> Result<(String, i32)> {
    run_with_input(source, "")
}

fn run_expecting_error(source: &str) -> Error {
    let root = parse_source("program.ti", source, &Config::default()).expect("parse should succeed");
    check_program(&root).expect("check should succeed");
    let mut stdin = Cursor::new(Vec::new());
    let mut stdout = Vec::new();
    Interpreter::new(&mut stdin, &mut stdout)
        .run(&root)
        .expect_err("expected runtime failure")
}

#[test]
fn arithmetic_coercion() -> Result<()> {
    let (output, _) = run(indoc! {"
        print 1/2
        print 1/2.0
        print 1.0/2
        print 1/2E0
    "})?;
    assert_eq!(output, "0\n0.5\n0.5\n0.5\n");
    Ok(())
}

#[test]
fn string_slicing_with_negatives() -> Result<()> {
    let (output, _) = run(indoc! {"
        print \"abcdef\"[:-5]
        print \"abcdef\"[1:3]
        print \"abcdef\"[-3:]
    "})?;
    assert_eq!(output, "a\nbc\ndef\n");
    Ok(())
}

#[test]
fn list_multiplication_and_concatenation() -> Result<()> {
    let (output, _) = run(indoc! {"
        print [1,2]+[3,4]
        print [1,2]*2
    "})?;
    assert_eq!(output, "[1,2,3,4]\n[1,2,1,2]\n");
    Ok(())
}

#[test]
fn fibonacci() -> Result<()> {
    let (output, _) = run(indoc! {"
        def fib(count)
            list result = []
            int a = 0, b = 1, tmp
            while result.len() < count
                result.append(a)
                tmp = a + b
                a = b
                b = tmp
            return result

        print fib(10)
    "})?;
    assert_eq!(output, "[0,1,1,2,3,5,8,13,21,34]\n");
    Ok(())
}

#[test]
fn chained_assignment() -> Result<()> {
    let (output, _) = run(indoc! {"
        int a, b, c, d
        a = b = c = d = 9
        print a, b, c, d
    "})?;
    assert_eq!(output, "9 9 9 9\n");
    Ok(())
}

#[test]
fn break_and_continue() -> Result<()> {
    let (output, _) = run(indoc! {"
        int n = 0
        while 1
            n += 1
            if n == 10
                break
        print n
    "})?;
    assert_eq!(output, "10\n");

    let (output, _) = run(indoc! {"
        for i in [0, 1, 2, 3]
            if i == 1
                continue
            print i
    "})?;
    assert_eq!(output, "0\n2\n3\n");
    Ok(())
}

#[test]
fn error_propagation_carries_number_and_diagnostic() {
    let error = run_expecting_error(indoc! {"
        int x
        print x/0
    "});
    assert_eq!(error.exit_code(), 9);
    let rendered = error.to_string();
    assert!(rendered.contains("DivisionByZeroError"), "got: {rendered}");
    assert!(rendered.contains("File program.ti, line 2"), "got: {rendered}");
    assert!(rendered.contains("print x/0"), "got: {rendered}");
}

#[test]
fn arithmetic_coercion_law() -> Result<()> {
    // float wins over int, int wins over char, for every operator.
    let (output, _) = run(indoc! {"
        print type(1 + 1), type(1 + 1.0), type(1.0 + 1), type('a' + 'b'), type('a' + 1)
        print type(2 * 3), type('a' * 'b'), type(7 % 3), type(1 - 0.5)
    "})?;
    assert_eq!(output, "int float float char int\nint char int float\n");
    Ok(())
}

#[test]
fn slice_clamping_property() -> Result<()> {
    // s[i:j] equals s[clamp(i,0,n):clamp(j,0,n)] with negatives mapped by +n.
    let (output, _) = run(indoc! {"
        str s = \"abcde\"
        print s[-100:100]
        print s[3:1]
        print s[2:-1], s[2:4]
        list l = [1, 2, 3]
        print l[-100:100], l[0:3]
    "})?;
    assert_eq!(output, "abcde\n\ncd cd\n[1,2,3] [1,2,3]\n");
    Ok(())
}

#[test]
fn call_by_value_for_composites() -> Result<()> {
    let (output, _) = run(indoc! {"
        def grow(l)
            l.append(99)
            return l

        list a = [1, 2]
        list b = grow(a)
        print a
        print b
    "})?;
    assert_eq!(output, "[1,2]\n[1,2,99]\n");
    Ok(())
}

#[test]
fn scoping_rules() -> Result<()> {
    // Function locals vanish after the call; a for target survives its loop.
    let (output, _) = run(indoc! {"
        int x = 1
        def f()
            int x = 99
            return x
        print f(), x
        for i in [7, 8]
            pass
        print i
    "})?;
    assert_eq!(output, "99 1\n8\n");
    Ok(())
}

#[test]
fn deterministic_evaluation() -> Result<()> {
    let source = indoc! {"
        int n
        input \"n? \" n
        for i in [1, 2, 3]
            print i * n, \"go\" * i
        return n
    "};
    let first = run_with_input(source, "4\n")?;
    let second = run_with_input(source, "4\n")?;
    assert_eq!(first, second);
    assert_eq!(first.1, 4);
    assert_eq!(first.0, "n? 4 go\n8 gogo\n12 gogogo\n");
    Ok(())
}

#[test]
fn membership_and_logic() -> Result<()> {
    let (output, _) = run(indoc! {"
        print 2 in [1, 2, 3], 5 in [1, 2, 3]
        print 'b' in \"abc\", 'z' in \"abc\"
        print 1 and 2, 1 and 0, 0 or 0, 0 or 3
        print !0, !5
    "})?;
    assert_eq!(output, "1 0\n1 0\n1 0 0 1\n1 0\n");
    Ok(())
}

#[test]
fn print_raw_suppresses_separators_and_newline() -> Result<()> {
    let (output, _) = run(indoc! {"
        print -raw 1, 2, 3
        print -raw \"|\"
    "})?;
    assert_eq!(output, "123|");
    Ok(())
}

#[test]
fn write_through_subscripts_and_loop_targets() -> Result<()> {
    let (output, _) = run(indoc! {"
        list grid = [[1, 2], [3, 4]]
        grid[0][1] = 9
        print grid
        for row in grid
            row = [0]
        print grid
    "})?;
    assert_eq!(output, "[[1,9],[3,4]]\n[[0],[0]]\n");
    Ok(())
}

#[test]
fn input_reads_by_current_type() -> Result<()> {
    let (output, code) = run_with_input(
        indoc! {"
            int n
            float f
            str s
            input n, f, s
            print type(n), type(f), type(s)
            print n + 1, f * 2, s + \"!\"
            return n
        "},
        "41\n1.25\nhi\n",
    )?;
    assert_eq!(output, "int float str\n42 2.5 hi!\n");
    assert_eq!(code, 41);
    Ok(())
}

#[test]
fn imports_run_once_and_twice_is_an_error() -> Result<()> {
    let dir = std::env::temp_dir();
    let module_path = dir.join(format!("tipy_shared_{}.ti", std::process::id()));
    fs::write(&module_path, "int shared = 7\nprint \"loaded\"\n").context("writing module")?;
    let module_path = module_path.to_string_lossy().into_owned();

    let source = format!("import \"{module_path}\"\nprint shared + 1\n");
    let (output, _) = run(&source)?;
    assert_eq!(output, "loaded\n8\n");

    let doubled = format!("import \"{module_path}\"\nimport \"{module_path}\"\n");
    let error = parse_source("program.ti", &doubled, &Config::default())
        .expect_err("expected double import failure");
    assert_eq!(error.kind(), ErrorKind::Syntax);
    assert!(error.to_string().contains("already loaded"));

    fs::remove_file(&module_path).ok();
    Ok(())
}

#[test]
fn parse_file_reports_missing_module_as_system_error() {
    let error = parse_file("definitely_missing_module.ti", &Config::default())
        .expect_err("expected load failure");
    assert_eq!(error.kind(), ErrorKind::System);
    assert_eq!(error.exit_code(), 5);
}

#[test]
fn checker_failures_use_stable_exit_codes() {
    let root = parse_source("program.ti", "print ghost\n", &Config::default())
        .expect("parse should succeed");
    let error = check_program(&root).expect_err("expected check failure");
    assert_eq!(error.kind(), ErrorKind::Name);
    assert_eq!(error.exit_code(), 1);

    let rendered = error.to_string();
    assert!(rendered.contains("NameError: identifier ghost is not defined"));
    assert!(rendered.contains("File program.ti, line 1"));
}

#[test]
fn index_errors_are_fatal_but_remove_is_not() {
    let error = run_expecting_error("list l = [1]\nprint l[3]\n");
    assert_eq!(error.exit_code(), 6);

    let (output, _) = run("list l = [1]\nprint l.remove(3)\n").expect("run should succeed");
    assert_eq!(output, "none\n");
}

#[test]
fn mod_on_floats_has_its_own_error() {
    let error = run_expecting_error("print 1.5 % 2\n");
    assert_eq!(error.kind(), ErrorKind::ModNotAllowed);
    assert_eq!(error.exit_code(), 8);
}

#[test]
fn do_while_with_a_function_mutating_a_global() -> Result<()> {
    let (output, _) = run(indoc! {"
        int total = 0
        def add(n)
            total += n
            return total
        int i = 0
        do
            i += 1
            add(i)
        while i < 4
        print total
    "})?;
    assert_eq!(output, "10\n");
    Ok(())
}

#[test]
fn float_output_uses_up_to_15_significant_digits() -> Result<()> {
    let (output, _) = run(indoc! {"
        print 1.0 / 3
        print 2E20
        print 0.00001
    "})?;
    assert_eq!(output, "0.333333333333333\n2E+20\n1E-05\n");
    Ok(())
}
