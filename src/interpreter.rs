//! The tree evaluator.
//!
//! Statements execute through `exec`, which yields a `Flow` marker: `Normal`
//! to continue, `Break`/`Continue` for the enclosing loop, `Return` for the
//! enclosing call. A block stops at the first non-normal flow; loops consume
//! `Break` and `Continue`; a function call consumes `Return` (and yields 0
//! when the body falls off the end).
//!
//! Expressions evaluate through `eval` to shared value slots. A reference
//! yields the variable's own slot and subscripting a list yields a
//! write-through handle, which is what makes `x = v` inside a `for` loop and
//! `l[i] = v` update in place. Everything checked by the semantic pass is
//! relied upon here without re-checking.

use std::io::{BufRead, Write};
use std::rc::Rc;

use crate::builtins::BuiltinFunction;
use crate::error::{Error, ErrorKind, Result};
use crate::parser::ast::{
    AssignmentOperator, BinaryOperator, FunctionDef, LiteralValue, MethodCall, Node, NodeKind,
};

pub(crate) mod ops;
pub(crate) mod scope;
pub mod value;

use ops::{binary, item, sequence_length, slice, unary};
use scope::ScopeStack;
use value::{
    Value, ValueRef, parse_float_prefix, parse_int_prefix, resolve, slot, str_to_char,
};

/// What a variable or function name is bound to.
enum Binding {
    Variable(ValueRef),
    Function(Rc<FunctionDef>),
}

/// Control-flow marker returned by statement execution.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(ValueRef),
}

pub struct Interpreter<'io> {
    scopes: ScopeStack<Binding>,
    stdin: &'io mut dyn BufRead,
    stdout: &'io mut dyn Write,
}

impl<'io> Interpreter<'io> {
    pub fn new(stdin: &'io mut dyn BufRead, stdout: &'io mut dyn Write) -> Self {
        Self {
            scopes: ScopeStack::new(),
            stdin,
            stdout,
        }
    }

    /// Execute a checked program and produce the process exit code: the
    /// value of a top-level `return` when numeric, else 0.
    pub fn run(&mut self, root: &Node) -> Result<i32> {
        match self.exec(root)? {
            Flow::Return(value) => {
                let resolved = resolve(&value);
                let value = resolved.borrow();
                if value.is_number() {
                    Ok(value.as_int()? as i32)
                } else {
                    Ok(0)
                }
            }
            _ => Ok(0),
        }
    }

    fn exec(&mut self, node: &Node) -> Result<Flow> {
        self.exec_kind(node)
            .map_err(|error| error.with_source(&node.source))
    }

    fn exec_kind(&mut self, node: &Node) -> Result<Flow> {
        match &node.kind {
            NodeKind::Block { statements } => {
                for statement in statements {
                    match self.exec(statement)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            NodeKind::ExpressionStmnt { expression } => {
                // Expression statements have no result.
                self.eval(expression)?;
                Ok(Flow::Normal)
            }
            NodeKind::FunctionDeclaration { function } => {
                self.scopes
                    .insert(&function.name, Binding::Function(Rc::clone(function)));
                Ok(Flow::Normal)
            }
            NodeKind::VariableDeclaration { defvars } => {
                for defvar in defvars {
                    self.exec(defvar)?;
                }
                Ok(Flow::Normal)
            }
            NodeKind::DefVar {
                vtype,
                name,
                initial,
            } => {
                let cell = slot(Value::default_for(*vtype));
                self.scopes
                    .insert(name, Binding::Variable(Rc::clone(&cell)));
                if let Some(initial) = initial {
                    let value = self.eval(initial)?;
                    assign(&cell, &value)?;
                }
                Ok(Flow::Normal)
            }
            NodeKind::If {
                condition,
                consequent,
                alternative,
            } => {
                let value = self.eval(condition)?;
                let taken = value.borrow().as_bool()?;
                if taken {
                    self.exec(consequent)
                } else if let Some(alternative) = alternative {
                    self.exec(alternative)
                } else {
                    Ok(Flow::Normal)
                }
            }
            NodeKind::While { condition, block } => {
                loop {
                    let value = self.eval(condition)?;
                    let keep_going = value.borrow().as_bool()?;
                    if !keep_going {
                        break;
                    }
                    match self.exec(block)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            NodeKind::DoWhile { condition, block } => {
                loop {
                    match self.exec(block)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    let value = self.eval(condition)?;
                    let keep_going = value.borrow().as_bool()?;
                    if !keep_going {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            NodeKind::For {
                target,
                sequence,
                block,
            } => self.exec_for(target, sequence, block),
            NodeKind::Print { raw, expressions } => {
                for (index, expression) in expressions.iter().enumerate() {
                    if index > 0 && !raw {
                        let _ = self.stdout.write_all(b" ");
                    }
                    let value = self.eval(expression)?;
                    let bytes = value.borrow().display_bytes();
                    let _ = self.stdout.write_all(&bytes);
                }
                if !raw {
                    let _ = self.stdout.write_all(b"\n");
                }
                let _ = self.stdout.flush();
                Ok(Flow::Normal)
            }
            NodeKind::Return { value } => {
                let result = match value {
                    Some(value) => self.eval(value)?,
                    None => slot(Value::Int(0)),
                };
                Ok(Flow::Return(result))
            }
            NodeKind::Import { code, .. } => self.exec(code),
            NodeKind::Input { targets } => {
                for (prompt, name) in targets {
                    self.read_input(prompt.as_deref(), name)?;
                }
                Ok(Flow::Normal)
            }
            NodeKind::Pass => Ok(Flow::Normal),
            NodeKind::Break => Ok(Flow::Break),
            NodeKind::Continue => Ok(Flow::Continue),
            _ => {
                self.eval(node)?;
                Ok(Flow::Normal)
            }
        }
    }

    /// `for target in sequence`: the target is created on demand, left
    /// `none` for an empty sequence, and survives the loop. List iteration
    /// binds the element slot itself, so assigning to the target writes into
    /// the list; string iteration binds a fresh char per step. The length is
    /// taken once, but each step re-checks the access.
    fn exec_for(&mut self, target: &str, sequence: &Node, block: &Node) -> Result<Flow> {
        if self.scopes.lookup(target).is_none() {
            self.scopes
                .insert(target, Binding::Variable(slot(Value::None)));
        } else {
            self.rebind(target, slot(Value::None))?;
        }

        let sequence = self.eval(sequence)?;
        let length = sequence_length(&sequence)?;

        for index in 0..length {
            let element = item(&sequence, index)?;
            self.rebind(target, element)?;
            match self.exec(block)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    /// One `input` target: prompt, read a line, convert to the type the
    /// variable currently holds, rebind.
    fn read_input(&mut self, prompt: Option<&str>, name: &str) -> Result<()> {
        if let Some(prompt) = prompt {
            let _ = self.stdout.write_all(prompt.as_bytes());
            let _ = self.stdout.flush();
        }

        let mut line = String::new();
        if self.stdin.read_line(&mut line).is_err() {
            line.clear();
        }
        let line = line.trim_end_matches(['\n', '\r']);

        let value = match self.scopes.lookup(name) {
            Some(Binding::Variable(cell)) => match &*cell.borrow() {
                Value::Char(_) => Value::Char(str_to_char(line.as_bytes())?),
                Value::Int(_) => Value::Int(parse_int_prefix(line.as_bytes())?),
                Value::Float(_) => Value::Float(parse_float_prefix(line.as_bytes())?),
                Value::Str(_) => Value::Str(line.as_bytes().to_vec()),
                other => {
                    return Err(Error::new(
                        ErrorKind::Type,
                        format!("unsupported type for input: {}", other.type_name()),
                    ));
                }
            },
            _ => {
                return Err(Error::new(
                    ErrorKind::Design,
                    format!("input target {name} escaped checking"),
                ));
            }
        };

        self.rebind(name, slot(value))
    }

    /// Replace a variable's binding (not the value in its slot).
    fn rebind(&mut self, name: &str, value: ValueRef) -> Result<()> {
        match self.scopes.lookup_mut(name) {
            Some(Binding::Variable(cell)) => {
                *cell = value;
                Ok(())
            }
            Some(Binding::Function(_)) => Err(Error::new(
                ErrorKind::Type,
                format!("identifier {name} is not a variable"),
            )),
            None => Err(Error::new(
                ErrorKind::Name,
                format!("identifier {name} is not defined"),
            )),
        }
    }

    fn eval(&mut self, node: &Node) -> Result<ValueRef> {
        let value = self
            .eval_kind(node)
            .map_err(|error| error.with_source(&node.source))?;
        if let Some(method) = &node.method {
            return self
                .call_method(&value, method)
                .map_err(|error| error.with_source(&node.source));
        }
        Ok(value)
    }

    fn eval_kind(&mut self, node: &Node) -> Result<ValueRef> {
        match &node.kind {
            NodeKind::Literal(literal) => {
                let value = match literal {
                    LiteralValue::Char(c) => Value::Char(*c),
                    LiteralValue::Int(text) => Value::Int(parse_int_prefix(text.as_bytes())?),
                    LiteralValue::Float(text) => {
                        Value::Float(parse_float_prefix(text.as_bytes())?)
                    }
                    LiteralValue::Str(text) => Value::Str(text.clone().into_bytes()),
                };
                Ok(slot(value))
            }
            NodeKind::ListDisplay { elements } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    let value = self.eval(element)?;
                    items.push(slot(resolve(&value).borrow().deep_copy()));
                }
                Ok(slot(Value::List(items)))
            }
            NodeKind::Unary { operator, operand } => {
                let value = self.eval(operand)?;
                unary(*operator, &value)
            }
            NodeKind::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*operator, &left, &right)
            }
            NodeKind::CommaExpr { expressions } => {
                let mut result = None;
                for expression in expressions {
                    result = Some(self.eval(expression)?);
                }
                result.ok_or_else(|| {
                    Error::new(ErrorKind::Design, "empty comma expression")
                })
            }
            NodeKind::Index { sequence, index } => {
                let sequence = self.eval(sequence)?;
                let index = self.eval(index)?;
                let index = index.borrow().as_int()?;
                item(&sequence, index)
            }
            NodeKind::Slice {
                sequence,
                start,
                end,
            } => {
                let sequence = self.eval(sequence)?;
                let start = self.eval(start)?;
                let start = start.borrow().as_int()?;
                let end = self.eval(end)?;
                let end = end.borrow().as_int()?;
                slice(&sequence, start, end)
            }
            NodeKind::Assignment {
                operator,
                target,
                expression,
            } => {
                let target = self.eval(target)?;
                let value = self.eval(expression)?;
                let result = match operator {
                    AssignmentOperator::Assign => slot(resolve(&value).borrow().deep_copy()),
                    AssignmentOperator::AddAssign => binary(BinaryOperator::Add, &target, &value)?,
                    AssignmentOperator::SubAssign => binary(BinaryOperator::Sub, &target, &value)?,
                    AssignmentOperator::MulAssign => binary(BinaryOperator::Mul, &target, &value)?,
                    AssignmentOperator::DivAssign => binary(BinaryOperator::Div, &target, &value)?,
                    AssignmentOperator::ModAssign => binary(BinaryOperator::Mod, &target, &value)?,
                };
                assign(&target, &result)?;
                // The target comes back so assignments chain.
                Ok(target)
            }
            NodeKind::Reference { name } => match self.scopes.lookup(name) {
                Some(Binding::Variable(cell)) => Ok(Rc::clone(cell)),
                Some(Binding::Function(_)) => Err(Error::new(
                    ErrorKind::Type,
                    format!("identifier {name} is not a variable"),
                )),
                None => Err(Error::new(
                    ErrorKind::Name,
                    format!("identifier {name} is not defined"),
                )),
            },
            NodeKind::FunctionCall {
                name,
                arguments,
                builtin,
                ..
            } => self.eval_call(name, arguments, *builtin),
            other => Err(Error::new(
                ErrorKind::Design,
                format!("{} is not an expression", other.name()),
            )),
        }
    }

    /// Call a declared function or a builtin. Arguments evaluate left to
    /// right before the call; declared functions receive deep copies
    /// (call-by-value for every type) in a fresh scope level.
    fn eval_call(&mut self, name: &str, arguments: &[Node], builtin: bool) -> Result<ValueRef> {
        let mut actuals = Vec::with_capacity(arguments.len());
        for argument in arguments {
            actuals.push(self.eval(argument)?);
        }

        if builtin {
            return self.call_builtin(name, &actuals);
        }

        let function = match self.scopes.lookup(name) {
            Some(Binding::Function(function)) => Rc::clone(function),
            Some(Binding::Variable(_)) => {
                return Err(Error::new(
                    ErrorKind::Type,
                    format!("identifier {name} is not a function"),
                ));
            }
            None => {
                return Err(Error::new(
                    ErrorKind::Name,
                    format!("identifier {name} is not defined"),
                ));
            }
        };

        self.scopes.push_level();
        for (parameter, actual) in function.parameters.iter().zip(&actuals) {
            let copy = slot(resolve(actual).borrow().deep_copy());
            self.scopes.insert(parameter, Binding::Variable(copy));
        }
        let flow = self.exec(&function.body);
        self.scopes.pop_level();

        match flow? {
            Flow::Return(value) => Ok(value),
            // A body that falls off the end, or escapes through a stray
            // break/continue, yields 0.
            _ => Ok(slot(Value::Int(0))),
        }
    }

    fn call_builtin(&mut self, name: &str, actuals: &[ValueRef]) -> Result<ValueRef> {
        let builtin = BuiltinFunction::from_name(name).ok_or_else(|| {
            Error::new(ErrorKind::Design, format!("{name} is not a builtin"))
        })?;
        let argument = actuals.first().ok_or_else(|| {
            Error::new(ErrorKind::Design, format!("builtin {name} called without arguments"))
        })?;

        match builtin {
            BuiltinFunction::Type => {
                let resolved = resolve(argument);
                let name = resolved.borrow().type_name();
                Ok(slot(Value::Str(name.as_bytes().to_vec())))
            }
            BuiltinFunction::Chr => {
                let byte = argument.borrow().as_char()?;
                Ok(slot(Value::Str(vec![byte])))
            }
            BuiltinFunction::Ord => {
                let resolved = resolve(argument);
                let value = resolved.borrow();
                match &*value {
                    Value::Str(bytes) => match bytes.first() {
                        Some(byte) => Ok(slot(Value::Int(*byte as i64))),
                        None => {
                            Err(Error::new(ErrorKind::Syntax, "empty character constant"))
                        }
                    },
                    other => Err(Error::new(
                        ErrorKind::Type,
                        format!("expected string but found {}", other.type_name()),
                    )),
                }
            }
        }
    }

    /// The method trailer: evaluate the argument list, then dispatch on the
    /// receiver's type. `len` works on strings and lists; `append`,
    /// `insert` and `remove` mutate lists in place.
    fn call_method(&mut self, receiver: &ValueRef, method: &MethodCall) -> Result<ValueRef> {
        let mut actuals = Vec::with_capacity(method.arguments.len());
        for argument in &method.arguments {
            actuals.push(self.eval(argument)?);
        }

        let receiver = resolve(receiver);
        let type_name = receiver.borrow().type_name();
        let is_list = matches!(&*receiver.borrow(), Value::List(_));
        let is_str = matches!(&*receiver.borrow(), Value::Str(_));

        let arity = |expected: usize| -> Result<()> {
            if actuals.len() != expected {
                Err(Error::new(
                    ErrorKind::Syntax,
                    format!("method {} takes {} argument(s)", method.name, expected),
                ))
            } else {
                Ok(())
            }
        };

        match method.name.as_str() {
            "len" if is_str || is_list => {
                arity(0)?;
                let length = sequence_length(&receiver)?;
                Ok(slot(Value::Int(length)))
            }
            "append" if is_list => {
                arity(1)?;
                let copy = slot(resolve(&actuals[0]).borrow().deep_copy());
                if let Value::List(items) = &mut *receiver.borrow_mut() {
                    items.push(copy);
                }
                Ok(slot(Value::None))
            }
            "insert" if is_list => {
                arity(2)?;
                let index = actuals[0].borrow().as_int()?;
                let copy = slot(resolve(&actuals[1]).borrow().deep_copy());
                if let Value::List(items) = &mut *receiver.borrow_mut() {
                    let len = items.len() as i64;
                    let index = if index < 0 { index + len } else { index };
                    let position = index.clamp(0, len) as usize;
                    items.insert(position, copy);
                }
                Ok(slot(Value::None))
            }
            "remove" if is_list => {
                arity(1)?;
                let index = actuals[0].borrow().as_int()?;
                if let Value::List(items) = &mut *receiver.borrow_mut() {
                    let len = items.len() as i64;
                    let index = if index < 0 { index + len } else { index };
                    if index < 0 || index >= len {
                        // Out of range removals yield none, not an error.
                        Ok(slot(Value::None))
                    } else {
                        Ok(items.remove(index as usize))
                    }
                } else {
                    Ok(slot(Value::None))
                }
            }
            name => Err(Error::new(
                ErrorKind::Syntax,
                format!("objecttype {type_name} has no method {name}"),
            )),
        }
    }
}

/// Write a value into an assignment target.
///
/// A write-through handle target replaces the list slot with a copy of the
/// value, whatever its type. A variable slot coerces the value to the slot's
/// current type, which is how declared variables keep their type for life.
fn assign(target: &ValueRef, source: &ValueRef) -> Result<()> {
    let source = resolve(source);
    let source_value = source.borrow().clone();

    let through = match &*target.borrow() {
        Value::ListNode(inner) => Some(Rc::clone(inner)),
        _ => None,
    };
    if let Some(inner) = through {
        let copied = source_value.deep_copy();
        *inner.borrow_mut() = copied;
        return Ok(());
    }

    let new_value = match &*target.borrow() {
        Value::Char(_) => Value::Char(source_value.as_char()?),
        Value::Int(_) => Value::Int(source_value.as_int()?),
        Value::Float(_) => Value::Float(source_value.as_float()?),
        Value::Str(_) => Value::Str(source_value.coerce_str_bytes()),
        Value::List(_) => match &source_value {
            Value::List(_) => source_value.deep_copy(),
            other => {
                return Err(Error::new(
                    ErrorKind::Value,
                    format!("cannot convert {} to list", other.type_name()),
                ));
            }
        },
        other => {
            return Err(Error::new(
                ErrorKind::Type,
                format!(
                    "unsupported operand type(s) for operation =: {} and {}",
                    other.type_name(),
                    source_value.type_name()
                ),
            ));
        }
    };
    *target.borrow_mut() = new_value;
    Ok(())
}
