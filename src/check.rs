//! Static checks, run once over the AST before execution.
//!
//! The pass binds function and variable names, validates every reference and
//! call, and proves literals convertible to their type. Anything verified
//! here is not re-verified during evaluation. Scope handling mirrors the
//! evaluator: a level per function body, with only the innermost and global
//! levels visible to lookups.
//!
//! A function body is checked at its declaration and again at the first call
//! site of each call node; the `checked` latch on call nodes keeps recursive
//! and mutually recursive call graphs from looping forever.

use std::rc::Rc;

use crate::builtins::BuiltinFunction;
use crate::error::{Error, ErrorKind, Result};
use crate::interpreter::scope::ScopeStack;
use crate::interpreter::value::{parse_float_prefix, parse_int_prefix};
use crate::parser::ast::{FunctionDef, LiteralValue, Node, NodeKind};

enum Declared {
    Variable,
    Function(Rc<FunctionDef>),
}

pub struct Checker {
    scopes: ScopeStack<Declared>,
}

/// Check a parsed program.
pub fn check_program(root: &Node) -> Result<()> {
    Checker::new().check(root)
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker {
    pub fn new() -> Self {
        Self {
            scopes: ScopeStack::new(),
        }
    }

    pub fn check(&mut self, node: &Node) -> Result<()> {
        self.check_kind(node)
            .map_err(|error| error.with_source(&node.source))?;
        if let Some(method) = &node.method {
            for argument in &method.arguments {
                self.check(argument)?;
            }
        }
        Ok(())
    }

    fn check_kind(&mut self, node: &Node) -> Result<()> {
        match &node.kind {
            NodeKind::Block { statements } => {
                for statement in statements {
                    self.check(statement)?;
                }
                Ok(())
            }
            NodeKind::Literal(value) => self.check_literal(value),
            NodeKind::ListDisplay { elements } => {
                for element in elements {
                    self.check(element)?;
                }
                Ok(())
            }
            NodeKind::Unary { operand, .. } => self.check(operand),
            NodeKind::Binary { left, right, .. } => {
                self.check(left)?;
                self.check(right)
            }
            NodeKind::CommaExpr { expressions } => {
                for expression in expressions {
                    self.check(expression)?;
                }
                Ok(())
            }
            NodeKind::Index { sequence, index } => {
                self.check(sequence)?;
                self.check(index)
            }
            NodeKind::Slice {
                sequence,
                start,
                end,
            } => {
                self.check(sequence)?;
                self.check(start)?;
                self.check(end)
            }
            NodeKind::Assignment {
                target, expression, ..
            } => {
                self.check(target)?;
                self.check(expression)
            }
            NodeKind::Reference { name } => self.check_reference(name),
            NodeKind::FunctionCall {
                name,
                arguments,
                builtin,
                checked,
            } => {
                for argument in arguments {
                    self.check(argument)?;
                }
                if *builtin {
                    self.check_builtin_call(name, arguments.len())
                } else {
                    self.check_function_call(name, arguments.len(), checked)
                }
            }
            NodeKind::ExpressionStmnt { expression } => self.check(expression),
            NodeKind::FunctionDeclaration { function } => self.check_function_declaration(function),
            NodeKind::VariableDeclaration { defvars } => {
                for defvar in defvars {
                    self.check(defvar)?;
                }
                Ok(())
            }
            NodeKind::DefVar { name, initial, .. } => {
                if BuiltinFunction::from_name(name).is_some() {
                    return Err(Error::new(
                        ErrorKind::Name,
                        format!("{name} is a builtin function"),
                    ));
                }
                if !self.scopes.declare(name, Declared::Variable) {
                    return Err(Error::new(
                        ErrorKind::Name,
                        format!("identifier {name} already declared"),
                    ));
                }
                match initial {
                    Some(initial) => self.check(initial),
                    None => Ok(()),
                }
            }
            NodeKind::If {
                condition,
                consequent,
                alternative,
            } => {
                self.check(condition)?;
                self.check(consequent)?;
                match alternative {
                    Some(alternative) => self.check(alternative),
                    None => Ok(()),
                }
            }
            NodeKind::While { condition, block } | NodeKind::DoWhile { condition, block } => {
                self.check(condition)?;
                self.check(block)
            }
            NodeKind::For {
                target,
                sequence,
                block,
            } => {
                if self.scopes.lookup(target).is_none() {
                    self.scopes.declare(target, Declared::Variable);
                }
                self.check(sequence)?;
                self.check(block)
            }
            NodeKind::Print { expressions, .. } => {
                for expression in expressions {
                    self.check(expression)?;
                }
                Ok(())
            }
            NodeKind::Return { value } => match value {
                Some(value) => self.check(value),
                None => Ok(()),
            },
            NodeKind::Import { code, .. } => self.check(code),
            NodeKind::Input { targets } => {
                for (_, identifier) in targets {
                    match self.scopes.lookup(identifier) {
                        None => {
                            return Err(Error::new(
                                ErrorKind::Name,
                                format!("identifier {identifier} is not defined"),
                            ));
                        }
                        Some(Declared::Function(_)) => {
                            return Err(Error::new(
                                ErrorKind::Type,
                                format!("identifier {identifier} is not a variable"),
                            ));
                        }
                        Some(Declared::Variable) => {}
                    }
                }
                Ok(())
            }
            NodeKind::Pass | NodeKind::Break | NodeKind::Continue => Ok(()),
        }
    }

    /// Literal lexemes must convert to their type; surfacing conversion
    /// failures here keeps them out of the evaluator.
    fn check_literal(&self, value: &LiteralValue) -> Result<()> {
        match value {
            LiteralValue::Int(text) => parse_int_prefix(text.as_bytes()).map(|_| ()),
            LiteralValue::Float(text) => parse_float_prefix(text.as_bytes()).map(|_| ()),
            LiteralValue::Char(_) | LiteralValue::Str(_) => Ok(()),
        }
    }

    fn check_reference(&self, name: &str) -> Result<()> {
        match self.scopes.lookup(name) {
            None => Err(Error::new(
                ErrorKind::Name,
                format!("identifier {name} is not defined"),
            )),
            Some(Declared::Function(_)) => Err(Error::new(
                ErrorKind::Type,
                format!("identifier {name} is not a variable"),
            )),
            Some(Declared::Variable) => Ok(()),
        }
    }

    fn check_builtin_call(&self, name: &str, argc: usize) -> Result<()> {
        let builtin = BuiltinFunction::from_name(name).ok_or_else(|| {
            Error::new(ErrorKind::Design, format!("{name} is not a builtin"))
        })?;
        if argc != builtin.arity() {
            return Err(Error::new(
                ErrorKind::Syntax,
                format!(
                    "builtin function {} expects {} argument(s) but {} were given",
                    name,
                    builtin.arity(),
                    argc
                ),
            ));
        }
        Ok(())
    }

    fn check_function_call(
        &mut self,
        name: &str,
        argc: usize,
        checked: &std::cell::Cell<bool>,
    ) -> Result<()> {
        if checked.get() {
            return Ok(());
        }
        checked.set(true);

        let function = match self.scopes.lookup(name) {
            None => {
                return Err(Error::new(
                    ErrorKind::Name,
                    format!("identifier {name} is not defined"),
                ));
            }
            Some(Declared::Variable) => {
                return Err(Error::new(
                    ErrorKind::Type,
                    format!("identifier {name} is not a function"),
                ));
            }
            Some(Declared::Function(function)) => Rc::clone(function),
        };

        if function.parameters.len() != argc {
            return Err(Error::new(
                ErrorKind::Syntax,
                format!(
                    "{} argument(s) expected, {} found",
                    function.parameters.len(),
                    argc
                ),
            ));
        }

        self.check_body_in_new_level(&function)
    }

    fn check_function_declaration(&mut self, function: &Rc<FunctionDef>) -> Result<()> {
        if BuiltinFunction::from_name(&function.name).is_some() {
            return Err(Error::new(
                ErrorKind::Name,
                format!("builtin function {} cannot be redefined", function.name),
            ));
        }
        if !self
            .scopes
            .declare(&function.name, Declared::Function(Rc::clone(function)))
        {
            return Err(Error::new(
                ErrorKind::Name,
                format!("identifier {} already declared", function.name),
            ));
        }
        self.check_body_in_new_level(function)
    }

    fn check_body_in_new_level(&mut self, function: &Rc<FunctionDef>) -> Result<()> {
        self.scopes.push_level();
        for parameter in &function.parameters {
            self.scopes.declare(parameter, Declared::Variable);
        }
        let result = self.check(&function.body);
        self.scopes.pop_level();
        result
    }
}
