pub mod ast;
pub mod error;
pub mod lexer;
#[allow(clippy::single_match_else, clippy::needless_pass_by_value)]
pub mod lower;
pub mod operators;
#[allow(clippy::single_match_else, clippy::needless_pass_by_value)]
pub mod parser;
pub mod resolve;
pub mod scope;
pub mod session;
pub mod state;

use crate::backend::ir::{IrBuilder, Program};
use crate::config::CompilerConfig;
use error::CompileError;
use lexer::Lexer;
use parser::Parser;
use session::Session;

/// Compile a source string into a [`Program`].
///
/// This is the primary entry point for the pipeline:
/// source → lex → parse → lower (one function at a time) → `Program`.
/// Functions that fail are left out; any error makes the whole call fail.
pub fn compile_source(source: &str, config: &CompilerConfig) -> Result<Program, Vec<CompileError>> {
    let (program, errors) = compile_source_lossy(source, config);
    if errors.is_empty() {
        Ok(program)
    } else {
        Err(errors)
    }
}

/// Like [`compile_source`] but always returns what did compile, together
/// with the errors.
pub fn compile_source_lossy(source: &str, config: &CompilerConfig) -> (Program, Vec<CompileError>) {
    let mut ir = IrBuilder::new();
    let mut errors: Vec<CompileError> = Vec::new();
    let mut parser = Parser::new(Lexer::from_source(source).with_escapes(config.text_escapes));

    let mut session = Session::new(&mut ir, config);
    let bodies = session.compile_all(&mut parser, &mut errors);
    session.finish(&mut errors);

    (ir.into_program(bodies, &config.entry), errors)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use super::*;
    use crate::backend::vm::{Value, Vm};
    use crate::frontend::error::ErrorKind;

    fn run_with_output(src: &str, args: Vec<f64>) -> (Value, String) {
        let config = CompilerConfig::default();
        let program = compile_source(src, &config).unwrap();
        let mut vm = Vm::new(&program, config.vm, Vec::new());
        let args = args.into_iter().map(Value::Number).collect();
        let value = vm.run_entry(&config.entry, args).unwrap();
        (value, String::from_utf8(vm.into_output()).unwrap())
    }

    fn run(src: &str) -> f64 {
        match run_with_output(src, vec![]).0 {
            Value::Number(n) => n,
            Value::Text(t) => panic!("expected a number, got {t:?}"),
        }
    }

    fn errors(src: &str) -> Vec<CompileError> {
        compile_source(src, &CompilerConfig::default()).unwrap_err()
    }

    #[test]
    fn var_block_and_assignment() {
        assert_eq!(run("FUNC main(){ VAR x = 3 x := x + 2 RETURN x }"), 5.0);
    }

    #[test]
    fn main_has_zero_params() {
        let program = compile_source("FUNC main(){ RETURN 1 }", &CompilerConfig::default()).unwrap();
        assert_eq!(program.entry().unwrap().params, 0);
    }

    #[test]
    fn forward_reference_then_definition() {
        let src = "FUNC main() RETURN callee(1, 2)\nFUNC callee(x, y) RETURN x * 10 + y";
        assert_eq!(run(src), 12.0);
    }

    #[test]
    fn forward_reference_arity_mismatch() {
        let src = "FUNC main() RETURN callee(1, 2)\nFUNC callee(x, y, z) RETURN x";
        let errs = errors(src);
        assert_eq!(errs[0].kind, ErrorKind::Signature);
        assert!(errs[0].message.contains("inconsistent arguments"));
        // The placeholder is still pending, so it is also undefined at the end.
        assert!(errs.iter().any(|e| e.message == "undefined function 'callee'"));
    }

    #[test]
    fn redefinition_skips_second_body() {
        let src = "FUNC f(a,b){ RETURN a } FUNC f(a){ RETURN a }";
        let (program, errs) = compile_source_lossy(src, &CompilerConfig::default());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ErrorKind::Signature);
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].params, 2);
    }

    #[test]
    fn if_without_else_observes_pre_if_value() {
        assert_eq!(run("FUNC main() { IF 0 THEN RETURN 1 FI }"), 0.0);
        assert_eq!(run("FUNC main() { VAR r = 7 IF 0 THEN r := 1 FI RETURN r }"), 7.0);
    }

    #[test]
    fn if_else_value() {
        let src = "FUNC pick(c) IF c THEN c := 10 ELSE c := 20 FI\nFUNC main() RETURN pick(1) + pick(0)";
        assert_eq!(run(src), 30.0);
    }

    #[test]
    fn while_false_never_runs_body() {
        let (value, out) = run_with_output("FUNC main() { WHILE 0 DO PRINT \"body\" DONE RETURN 3 }", vec![]);
        assert_eq!(value, Value::Number(3.0));
        assert!(out.is_empty());
    }

    #[test]
    fn while_loop_counts() {
        let src = "FUNC main() { VAR i = 0, sum = 0 WHILE i < 5 DO { i := i + 1 sum := sum + i } DONE RETURN sum }";
        assert_eq!(run(src), 15.0);
    }

    #[test]
    fn continue_retests_condition() {
        // If CONTINUE skipped the re-test this would never terminate.
        let src = "FUNC main() { VAR i = 0, count = 0 \
            WHILE i < 6 DO { i := i + 1 IF i < 4 THEN CONTINUE FI count := count + 1 } DONE \
            RETURN count }";
        assert_eq!(run(src), 3.0);
    }

    #[test]
    fn nested_loops_continue_innermost() {
        let src = "FUNC main() { VAR i = 0, hits = 0 \
            WHILE i < 3 DO { i := i + 1 VAR j = 0 WHILE j < 3 DO { j := j + 1 IF j < 2 THEN CONTINUE FI hits := hits + 1 } DONE } DONE \
            RETURN hits }";
        assert_eq!(run(src), 6.0);
    }

    #[test]
    fn continue_outside_loop() {
        let errs = errors("FUNC main() { CONTINUE }");
        assert_eq!(errs[0].kind, ErrorKind::Lowering);
    }

    #[test]
    fn shadowing_in_nested_blocks() {
        let src = "FUNC main() { VAR x = 1 { VAR x = 2 x := x + 1 } RETURN x }";
        assert_eq!(run(src), 1.0);
    }

    #[test]
    fn initializer_sees_outer_binding() {
        let src = "FUNC main() { VAR x = 4 { VAR x = x * 2 RETURN x } }";
        assert_eq!(run(src), 8.0);
    }

    #[test]
    fn var_expression_and_assignment_operator() {
        assert_eq!(run("FUNC main() RETURN VAR a = 2, b = a + 1 a * b"), 6.0);
        assert_eq!(run("FUNC main() { VAR a RETURN (a = 4) + a }"), 8.0);
    }

    #[test]
    fn bad_assignment_target() {
        let errs = errors("FUNC main() RETURN 1 = 2");
        assert_eq!(errs[0].kind, ErrorKind::Lowering);
        assert!(errs[0].message.contains("destination"));
    }

    #[test]
    fn unknown_variable() {
        let errs = errors("FUNC main() { y := 1 }");
        assert_eq!(errs[0].kind, ErrorKind::Binding);
        assert_eq!(errs[0].message, "unknown variable 'y'");
    }

    #[test]
    fn user_operators() {
        let src = "FUNC unary!(v) IF v THEN RETURN 0 ELSE RETURN 1 FI\n\
            FUNC binary& 6 (a, b) IF !a THEN RETURN 0 ELSE RETURN !!b FI\n\
            FUNC main() RETURN (1 & 2 < 3) + !0";
        assert_eq!(run(src), 2.0);
    }

    #[test]
    fn recursion() {
        let src = "FUNC fib(n) IF n < 2 THEN RETURN n ELSE RETURN fib(n - 1) + fib(n - 2) FI\n\
            FUNC main() RETURN fib(10)";
        assert_eq!(run(src), 55.0);
    }

    #[test]
    fn print_text_and_numbers() {
        let (_, out) = run_with_output("FUNC main(a) { PRINT \"a = \", a, \"\\n\" RETURN a }", vec![2.5]);
        assert_eq!(out, "a = 2.5\n\n");
    }

    #[test]
    fn entry_called_with_wrong_arity() {
        let errs = errors("FUNC helper() RETURN main(1)\nFUNC main() RETURN 0");
        assert!(errs.iter().all(|e| e.kind == ErrorKind::Signature));
        assert!(!errs.is_empty());
    }

    #[test]
    fn failed_body_does_not_fix_entry_arity() {
        let src = "FUNC helper() RETURN main(1) + nope\nFUNC main() RETURN 7";
        let (program, errs) = compile_source_lossy(src, &CompilerConfig::default());
        assert_eq!(errs.len(), 1, "{errs:?}");
        assert_eq!(errs[0].kind, ErrorKind::Binding);
        assert_eq!(program.entry().unwrap().params, 0);
        assert!(program.find("helper").is_none());
    }

    #[test]
    fn store_then_load_at_every_depth() {
        let src = "FUNC main() { VAR a = 1 \
            { VAR a = 2 { VAR a = 3 a := a + 10 PRINT a } a := a + 20 PRINT a } \
            a := a + 30 RETURN a }";
        let (value, out) = run_with_output(src, vec![]);
        assert_eq!(value, Value::Number(31.0));
        assert_eq!(out, "13\n22\n");
    }

    #[test]
    fn fall_through_returns_last_statement_value() {
        assert_eq!(run("FUNC main() { VAR a = 1 a := a + 41 }"), 42.0);
        assert_eq!(run("FUNC main() { }"), 0.0);
    }
}
