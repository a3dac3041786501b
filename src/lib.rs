//! toyc: a front end for the toy scripting language, with a reference
//! region IR and interpreter behind the [`backend::CodeEmitter`] seam.

pub mod backend;
pub mod config;
pub mod error;
pub mod frontend;

use std::io::Write;

use backend::vm::{Value, Vm};
use config::CompilerConfig;
use error::ToyError;

pub use frontend::parser::parse_source;
pub use frontend::{compile_source, compile_source_lossy};

/// Compile `source` and run its entry function with `args`. Output of
/// `PRINT` goes to `out`.
pub fn run_source<W: Write>(
    source: &str,
    config: &CompilerConfig,
    args: Vec<f64>,
    out: W,
) -> Result<Value, ToyError> {
    let program = compile_source(source, config)?;
    if program.entry().is_none() {
        return Err(ToyError::MissingEntry(config.entry.clone()));
    }
    let mut vm = Vm::new(&program, config.vm, out);
    let args = args.into_iter().map(Value::Number).collect();
    Ok(vm.run_entry(&config.entry, args)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn runs_entry_with_arguments() {
        let src = "FUNC main(a, b) { PRINT \"sum \", a + b RETURN a * b }";
        let mut out = Vec::new();
        let value = run_source(src, &CompilerConfig::default(), vec![3.0, 4.0], &mut out).unwrap();
        assert_eq!(value, Value::Number(12.0));
        assert_eq!(String::from_utf8(out).unwrap(), "sum 7\n");
    }

    #[test]
    fn custom_entry_name() {
        let config = CompilerConfig { entry: "start".into(), ..CompilerConfig::default() };
        let value = run_source("FUNC start() RETURN 9", &config, vec![], std::io::sink()).unwrap();
        assert_eq!(value, Value::Number(9.0));
    }

    #[test]
    fn missing_entry() {
        let err = run_source("FUNC other() RETURN 1", &CompilerConfig::default(), vec![], std::io::sink())
            .unwrap_err();
        assert!(matches!(err, ToyError::MissingEntry(ref name) if name == "main"));
    }

    #[test]
    fn compile_errors_surface() {
        let err = run_source("FUNC main() RETURN x", &CompilerConfig::default(), vec![], std::io::sink())
            .unwrap_err();
        assert!(matches!(err, ToyError::Compile(ref errors) if errors.len() == 1));
    }

    #[test]
    fn runtime_errors_surface() {
        let err = run_source("FUNC main() RETURN 1 / 0", &CompilerConfig::default(), vec![], std::io::sink())
            .unwrap_err();
        assert!(matches!(err, ToyError::Runtime(backend::vm::VmError::DivisionByZero)));
    }

    #[test]
    fn runaway_recursion_is_stopped() {
        let err = run_source("FUNC main() RETURN main()", &CompilerConfig::default(), vec![], std::io::sink())
            .unwrap_err();
        assert!(matches!(err, ToyError::Runtime(backend::vm::VmError::StackOverflow { .. })));
    }
}
