//! Tree-walking evaluator for transform scripts

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use super::ast::*;
use super::builtins::{self, BuiltinError};
use super::token::Span;
use super::value::{self, truthy, type_name, Num, OpError, MAX_COLLECTION_LEN, MAX_VALUE_DEPTH};
use crate::functions::errors::{FunctionError, FunctionResult};

/// Steps between wall-clock checks
const CLOCK_CHECK_INTERVAL: u64 = 256;

/// Execution bounds for one script run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    pub max_steps: u64,
    pub max_call_depth: usize,
    pub timeout: Duration,
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Block scopes of one call frame
struct Frame {
    scopes: Vec<HashMap<String, Value>>,
}

impl Frame {
    fn new(bindings: HashMap<String, Value>) -> Self {
        Self {
            scopes: vec![bindings],
        }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.scopes.iter_mut().rev().find_map(|s| s.get_mut(name))
    }

    fn declare(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }
}

enum PathSegment {
    Field(String),
    Index(Value, Span),
}

fn fail(span: Span, message: impl std::fmt::Display) -> FunctionError {
    FunctionError::InvocationFailure(format!("{} at {}", message, span))
}

fn op_error(span: Span, err: OpError) -> FunctionError {
    match err {
        OpError::Invalid(message) => fail(span, message),
        OpError::TooLarge(what) => FunctionError::ResourceExhausted(format!(
            "{} larger than {} elements at {}",
            what, MAX_COLLECTION_LEN, span
        )),
    }
}

/// Reject `value` if nesting it `levels` deeper would pass `MAX_VALUE_DEPTH`
fn check_depth(value: &Value, levels: usize, span: Span) -> FunctionResult<()> {
    if value::depth(value) + levels > MAX_VALUE_DEPTH {
        return Err(FunctionError::ResourceExhausted(format!(
            "value nested deeper than {} levels at {}",
            MAX_VALUE_DEPTH, span
        )));
    }
    Ok(())
}

fn builtin_error(span: Span, err: BuiltinError) -> FunctionError {
    match err {
        BuiltinError::Op(e) => op_error(span, e),
        BuiltinError::Raised(message) => fail(span, message),
    }
}

pub struct Interpreter<'p> {
    program: &'p Program,
    limits: ScriptLimits,
    deadline: Instant,
    steps: u64,
    depth: usize,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program, limits: ScriptLimits) -> Self {
        Self {
            program,
            limits,
            deadline: Instant::now() + limits.timeout,
            steps: 0,
            depth: 0,
        }
    }

    /// Call a user function with positional arguments
    pub fn call(&mut self, def: &FnDef, args: Vec<Value>, span: Span) -> FunctionResult<Value> {
        if args.len() != def.params.len() {
            return Err(fail(
                span,
                format!(
                    "{}() takes {} argument(s), got {}",
                    def.name,
                    def.params.len(),
                    args.len()
                ),
            ));
        }
        if self.depth >= self.limits.max_call_depth {
            return Err(FunctionError::ResourceExhausted(format!(
                "call depth limit of {} exceeded at {}",
                self.limits.max_call_depth, span
            )));
        }

        let bindings = def.params.iter().cloned().zip(args).collect();
        let mut frame = Frame::new(bindings);

        self.depth += 1;
        let flow = self.exec_block(&def.body, &mut frame);
        self.depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Null),
        }
    }

    fn tick(&mut self) -> FunctionResult<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(FunctionError::ResourceExhausted(format!(
                "script step limit of {} exceeded",
                self.limits.max_steps
            )));
        }
        if self.steps % CLOCK_CHECK_INTERVAL == 0 && Instant::now() >= self.deadline {
            return Err(FunctionError::Timeout(self.limits.timeout.as_millis() as u64));
        }
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt], frame: &mut Frame) -> FunctionResult<Flow> {
        frame.scopes.push(HashMap::new());
        let mut result = Ok(Flow::Normal);
        for stmt in stmts {
            match self.exec(stmt, frame) {
                Ok(Flow::Normal) => continue,
                other => {
                    result = other;
                    break;
                }
            }
        }
        frame.scopes.pop();
        result
    }

    fn exec(&mut self, stmt: &Stmt, frame: &mut Frame) -> FunctionResult<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Let { name, value } => {
                let value = self.eval(value, frame)?;
                frame.declare(name, value);
                Ok(Flow::Normal)
            }
            Stmt::Assign { target, value } => {
                let value = self.eval(value, frame)?;
                self.assign(target, value, frame)?;
                Ok(Flow::Normal)
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    if truthy(&self.eval(condition, frame)?) {
                        return self.exec_block(body, frame);
                    }
                }
                match otherwise {
                    Some(body) => self.exec_block(body, frame),
                    None => Ok(Flow::Normal),
                }
            }
            Stmt::For {
                var,
                iterable,
                body,
            } => {
                let items = match self.eval(iterable, frame)? {
                    Value::Array(items) => items,
                    Value::Object(map) => map.into_iter().map(|(k, _)| Value::String(k)).collect(),
                    other => {
                        return Err(fail(
                            iterable.span,
                            format!("cannot iterate over {}", type_name(&other)),
                        ))
                    }
                };
                for item in items {
                    frame.scopes.push(HashMap::from([(var.clone(), item)]));
                    let flow = self.exec_block(body, frame);
                    frame.scopes.pop();
                    match flow? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::While { condition, body } => {
                while truthy(&self.eval(condition, frame)?) {
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Continue(_) => Ok(Flow::Continue),
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, frame)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Expr(expr) => {
                self.eval(expr, frame)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn eval(&mut self, expr: &Expr, frame: &mut Frame) -> FunctionResult<Value> {
        self.tick()?;
        let span = expr.span;
        match &expr.kind {
            ExprKind::Literal(value) => Ok(value.clone()),
            ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.eval(item, frame)?;
                    check_depth(&value, 1, span)?;
                    values.push(value);
                }
                Ok(Value::Array(values))
            }
            ExprKind::Object(entries) => {
                let mut map = Map::new();
                for (key, item) in entries {
                    let value = self.eval(item, frame)?;
                    check_depth(&value, 1, span)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
            ExprKind::Var(name) => frame
                .lookup(name)
                .cloned()
                .ok_or_else(|| fail(span, format!("undefined variable '{}'", name))),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, frame)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                    UnaryOp::Neg => value::negate(&value).map_err(|e| op_error(span, e)),
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left, frame)?;
                match op {
                    BinaryOp::And if !truthy(&left) => Ok(Value::Bool(false)),
                    BinaryOp::Or if truthy(&left) => Ok(Value::Bool(true)),
                    BinaryOp::And | BinaryOp::Or => {
                        let right = self.eval(right, frame)?;
                        Ok(Value::Bool(truthy(&right)))
                    }
                    _ => {
                        let right = self.eval(right, frame)?;
                        value::binary(*op, &left, &right).map_err(|e| op_error(span, e))
                    }
                }
            }
            ExprKind::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, frame)?);
                }
                if builtins::is_builtin(name) {
                    let result = builtins::call(name, values).map_err(|e| builtin_error(span, e))?;
                    check_depth(&result, 0, span)?;
                    return Ok(result);
                }
                let program = self.program;
                let def = program
                    .function(name)
                    .ok_or_else(|| fail(span, format!("unknown function '{}'", name)))?;
                self.call(def, values, span)
            }
            ExprKind::Field { target, name } => {
                let target = self.eval(target, frame)?;
                match target {
                    Value::Object(mut map) => Ok(map.remove(name).unwrap_or(Value::Null)),
                    other => Err(fail(
                        span,
                        format!("cannot read field '{}' of {}", name, type_name(&other)),
                    )),
                }
            }
            ExprKind::Index { target, index } => {
                let target = self.eval(target, frame)?;
                let index = self.eval(index, frame)?;
                read_index(target, &index, span)
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: Value, frame: &mut Frame) -> FunctionResult<()> {
        let mut path = Vec::new();
        let mut cursor = target;
        let root = loop {
            match &cursor.kind {
                ExprKind::Var(name) => break name,
                ExprKind::Field { target, name } => {
                    path.push(PathSegment::Field(name.clone()));
                    cursor = target;
                }
                ExprKind::Index { target, index } => {
                    let key = self.eval(index, frame)?;
                    path.push(PathSegment::Index(key, index.span));
                    cursor = target;
                }
                _ => return Err(fail(cursor.span, "invalid assignment target")),
            }
        };
        path.reverse();
        check_depth(&value, path.len(), target.span)?;

        let mut place = frame
            .lookup_mut(root)
            .ok_or_else(|| fail(target.span, format!("undefined variable '{}'", root)))?;

        for segment in &path {
            place = match (place, segment) {
                (Value::Object(map), PathSegment::Field(name)) => {
                    map.entry(name.clone()).or_insert(Value::Null)
                }
                (Value::Object(map), PathSegment::Index(Value::String(key), _)) => {
                    map.entry(key.clone()).or_insert(Value::Null)
                }
                (Value::Array(items), PathSegment::Index(key, span)) => {
                    let len = items.len();
                    match Num::of(key) {
                        Some(Num::Int(i)) if i >= 0 && (i as usize) < len => &mut items[i as usize],
                        _ => {
                            return Err(fail(
                                *span,
                                format!("index {} out of range for array of length {}", key, len),
                            ))
                        }
                    }
                }
                (other, PathSegment::Field(name)) => {
                    return Err(fail(
                        target.span,
                        format!("cannot set field '{}' on {}", name, type_name(other)),
                    ))
                }
                (other, PathSegment::Index(key, span)) => {
                    return Err(fail(
                        *span,
                        format!("cannot index {} with {}", type_name(other), type_name(key)),
                    ))
                }
            };
        }

        *place = value;
        Ok(())
    }
}

fn read_index(target: Value, index: &Value, span: Span) -> FunctionResult<Value> {
    match (target, index) {
        (Value::Array(mut items), _) => {
            let len = items.len();
            match Num::of(index) {
                Some(Num::Int(i)) if i >= 0 && (i as usize) < len => {
                    Ok(items.swap_remove(i as usize))
                }
                _ => Err(fail(
                    span,
                    format!("index {} out of range for array of length {}", index, len),
                )),
            }
        }
        (Value::Object(mut map), Value::String(key)) => Ok(map.remove(key).unwrap_or(Value::Null)),
        (Value::String(s), _) => match Num::of(index) {
            Some(Num::Int(i)) if i >= 0 => s
                .chars()
                .nth(i as usize)
                .map(|c| Value::String(c.to_string()))
                .ok_or_else(|| fail(span, format!("index {} out of range for string", i))),
            _ => Err(fail(span, "string index must be a non-negative integer")),
        },
        (other, _) => Err(fail(
            span,
            format!("cannot index {} with {}", type_name(&other), type_name(index)),
        )),
    }
}
