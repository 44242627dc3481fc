//! # Transform Scripts
//!
//! The `interpreted-script` implementation kind. A script is a set of
//! `fn` definitions; `process` is the entry point and receives one
//! parameter per input slot, bound by name. It returns an object mapping
//! output slot to an array of row objects.
//!
//! ```text
//! fn process(x) {
//!     let out = [];
//!     for row in x {
//!         out = push(out, {value: row.value * 2});
//!     }
//!     return {y: out};
//! }
//! ```
//!
//! The language has no I/O. Runs are bounded by a step budget, a call
//! depth limit and a wall-clock deadline.

mod ast;
mod builtins;
mod interpreter;
mod lexer;
mod parser;
mod token;
mod value;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

pub use interpreter::ScriptLimits;
pub use parser::ParseError;

use super::errors::{FunctionError, FunctionResult};
use ast::Program;
use interpreter::Interpreter;

/// Name of the entry point
pub const ENTRY_POINT: &str = "process";

/// A compiled transform script
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    program: Program,
}

impl Script {
    /// Lex and parse `source`; requires a `process` definition
    pub fn compile(source: &str) -> FunctionResult<Self> {
        let program =
            parser::parse(source).map_err(|e| FunctionError::CompilationError(e.to_string()))?;

        if let Some(def) = program
            .functions
            .iter()
            .find(|f| builtins::is_builtin(&f.name))
        {
            return Err(FunctionError::CompilationError(format!(
                "Function '{}' at {} shadows a built-in",
                def.name, def.span
            )));
        }
        if program.function(ENTRY_POINT).is_none() {
            return Err(FunctionError::CompilationError(format!(
                "Script must define fn {}(...)",
                ENTRY_POINT
            )));
        }

        Ok(Self { program })
    }

    /// Parameter names of `process`
    pub fn entry_params(&self) -> &[String] {
        self.program
            .function(ENTRY_POINT)
            .map(|f| f.params.as_slice())
            .unwrap_or(&[])
    }

    /// `process` parameters must be exactly the input slot names
    pub fn check_inputs<'a>(&self, slots: impl IntoIterator<Item = &'a String>) -> FunctionResult<()> {
        let expected: BTreeSet<&str> = slots.into_iter().map(String::as_str).collect();
        let declared: BTreeSet<&str> = self.entry_params().iter().map(String::as_str).collect();
        if expected != declared {
            return Err(FunctionError::InvalidBinding(format!(
                "{}({}) does not match input slots [{}]",
                ENTRY_POINT,
                self.entry_params().join(", "),
                expected.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }
        Ok(())
    }

    /// Run `process` with slot rows bound to its parameters
    pub fn run(&self, inputs: &BTreeMap<String, Value>, limits: ScriptLimits) -> FunctionResult<Map<String, Value>> {
        self.check_inputs(inputs.keys())?;
        let entry = self
            .program
            .function(ENTRY_POINT)
            .ok_or_else(|| FunctionError::CompilationError(format!("missing fn {}", ENTRY_POINT)))?;

        let args = entry
            .params
            .iter()
            .map(|p| inputs.get(p).cloned().unwrap_or(Value::Null))
            .collect();

        let mut interpreter = Interpreter::new(&self.program, limits);
        match interpreter.call(entry, args, entry.span)? {
            Value::Object(outputs) => Ok(outputs),
            other => Err(FunctionError::InvocationFailure(format!(
                "{} must return an object of output slots, got {}",
                ENTRY_POINT,
                value::type_name(&other)
            ))),
        }
    }
}
