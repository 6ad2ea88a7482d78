//! LL(1) recursive-descent parser.
//!
//! Each grammar non-terminal is one method. `accept` consumes on match,
//! `expect` consumes or fails. The grammar has no block colons: a block is
//! `NEWLINE INDENT statement+ DEDENT` directly after the header expression.
//!
//! Imports are resolved at parse time: the named module is loaded, parsed
//! recursively (the lexer is swapped out and restored around the recursion)
//! and its tree attached to the import statement. A module can be imported
//! at most once per run.

use std::mem;
use std::rc::Rc;

use crate::builtins::BuiltinFunction;
use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::lexer::{Lexer, Token};
use crate::module::{ModuleCode, Source};

pub mod ast;

use ast::{
    AssignmentOperator, BinaryOperator, FunctionDef, LiteralValue, MethodCall, Node, NodeKind,
    UnaryOperator, VariableType,
};
use std::cell::Cell;

pub struct Parser {
    lexer: Lexer,
    config: Config,
    /// Modules already imported this run, keyed by filename.
    loaded: Vec<String>,
}

/// Parse a loaded module into its block node.
pub fn parse(module: Rc<ModuleCode>, config: &Config) -> Result<Node> {
    let mut parser = Parser {
        lexer: Lexer::new(Rc::clone(&module), config),
        config: *config,
        loaded: vec![module.name.clone()],
    };
    parser.lexer.advance()?;
    parser.block()
}

/// Parse an in-memory source text.
pub fn parse_source(name: &str, source: &str, config: &Config) -> Result<Node> {
    parse(ModuleCode::from_source(name, source), config)
}

/// Load a module from disk and parse it.
pub fn parse_file(path: &str, config: &Config) -> Result<Node> {
    parse(ModuleCode::load(path)?, config)
}

impl Parser {
    fn source(&self) -> Source {
        self.lexer.source()
    }

    fn syntax_error(&self, detail: impl Into<String>) -> Error {
        Error::new(ErrorKind::Syntax, detail).with_source(&self.lexer.source())
    }

    /// Consume the current token if it matches.
    fn accept(&mut self, token: Token) -> Result<bool> {
        if *self.lexer.current() == token {
            self.lexer.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consume the current token or fail.
    fn expect(&mut self, token: Token) -> Result<()> {
        if self.accept(token.clone())? {
            Ok(())
        } else {
            Err(self.syntax_error(format!(
                "expected {} instead of {}",
                token.name(),
                self.lexer.current().name()
            )))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        if let Token::Identifier(name) = self.lexer.current() {
            let name = name.clone();
            self.lexer.advance()?;
            Ok(name)
        } else {
            Err(self.syntax_error(format!(
                "expected identifier instead of {}",
                self.lexer.current().name()
            )))
        }
    }

    fn int_literal(&self, source: &Source, value: i64) -> Node {
        Node::new(
            NodeKind::Literal(LiteralValue::Int(value.to_string())),
            source.clone(),
        )
    }

    /// statement+ until DEDENT or ENDMARKER.
    fn block(&mut self) -> Result<Node> {
        let source = self.source();
        let mut statements = Vec::new();
        loop {
            if let Some(statement) = self.statement()? {
                statements.push(statement);
            }
            if matches!(self.lexer.current(), Token::Dedent | Token::Endmarker) {
                break;
            }
        }
        Ok(Node::new(NodeKind::Block { statements }, source))
    }

    /// NEWLINE INDENT statement+ DEDENT
    fn indented_block(&mut self) -> Result<Node> {
        self.expect(Token::Newline)?;
        self.expect(Token::Indent)?;
        let block = self.block()?;
        self.expect(Token::Dedent)?;
        Ok(block)
    }

    /// Dispatch on the first token of a statement. `None` marks the end
    /// marker and terminates the enclosing block.
    fn statement(&mut self) -> Result<Option<Node>> {
        let node = if self.accept(Token::DefChar)? {
            self.variable_declaration(VariableType::Char)?
        } else if self.accept(Token::DefInt)? {
            self.variable_declaration(VariableType::Int)?
        } else if self.accept(Token::DefFloat)? {
            self.variable_declaration(VariableType::Float)?
        } else if self.accept(Token::DefStr)? {
            self.variable_declaration(VariableType::Str)?
        } else if self.accept(Token::DefList)? {
            self.variable_declaration(VariableType::List)?
        } else if self.accept(Token::DefFunc)? {
            self.function_declaration()?
        } else if self.accept(Token::If)? {
            self.if_stmnt()?
        } else if self.accept(Token::While)? {
            self.while_stmnt()?
        } else if self.accept(Token::Do)? {
            self.do_stmnt()?
        } else if self.accept(Token::Print)? {
            self.print_stmnt()?
        } else if self.accept(Token::Return)? {
            self.return_stmnt()?
        } else if self.accept(Token::Pass)? {
            self.zero_argument_stmnt(NodeKind::Pass)?
        } else if self.accept(Token::For)? {
            self.for_stmnt()?
        } else if self.accept(Token::Break)? {
            self.zero_argument_stmnt(NodeKind::Break)?
        } else if self.accept(Token::Continue)? {
            self.zero_argument_stmnt(NodeKind::Continue)?
        } else if self.accept(Token::Import)? {
            self.import_stmnt()?
        } else if self.accept(Token::Input)? {
            self.input_stmnt()?
        } else if self.accept(Token::Endmarker)? {
            return Ok(None);
        } else {
            self.expression_stmnt()?
        };
        Ok(Some(node))
    }

    /// Syntax: expression NEWLINE
    fn expression_stmnt(&mut self) -> Result<Node> {
        let source = self.source();
        let expression = self.comma_expr()?;
        self.expect(Token::Newline)?;
        Ok(Node::new(
            NodeKind::ExpressionStmnt {
                expression: Box::new(expression),
            },
            source,
        ))
    }

    /// Syntax: 'def' identifier '(' (identifier (',' identifier)*)? ')' block
    fn function_declaration(&mut self) -> Result<Node> {
        let source = self.source();
        let name = self.expect_identifier()?;
        self.expect(Token::LPar)?;

        let mut parameters = Vec::new();
        while !self.accept(Token::RPar)? {
            loop {
                parameters.push(self.expect_identifier()?);
                if *self.lexer.current() == Token::RPar {
                    break;
                }
                self.expect(Token::Comma)?;
            }
        }

        let body = self.indented_block()?;
        Ok(Node::new(
            NodeKind::FunctionDeclaration {
                function: Rc::new(FunctionDef {
                    name,
                    parameters,
                    body,
                }),
            },
            source,
        ))
    }

    /// Syntax: type identifier ('=' assignment_expr)?
    ///              (',' identifier ('=' assignment_expr)?)* NEWLINE
    fn variable_declaration(&mut self, vtype: VariableType) -> Result<Node> {
        let source = self.source();
        let mut defvars = Vec::new();

        loop {
            let defvar_source = self.source();
            let name = self.expect_identifier()?;
            let initial = if self.accept(Token::Equal)? {
                Some(Box::new(self.assignment_expr()?))
            } else {
                None
            };
            defvars.push(Node::new(
                NodeKind::DefVar {
                    vtype,
                    name,
                    initial,
                },
                defvar_source,
            ));

            if self.accept(Token::Newline)? {
                break;
            }
            self.expect(Token::Comma)?;
        }

        Ok(Node::new(NodeKind::VariableDeclaration { defvars }, source))
    }

    /// Syntax: 'if' expression block ('else' block)?
    fn if_stmnt(&mut self) -> Result<Node> {
        let source = self.source();
        let condition = self.comma_expr()?;
        let consequent = self.indented_block()?;
        let alternative = if self.accept(Token::Else)? {
            Some(Box::new(self.indented_block()?))
        } else {
            None
        };
        Ok(Node::new(
            NodeKind::If {
                condition: Box::new(condition),
                consequent: Box::new(consequent),
                alternative,
            },
            source,
        ))
    }

    /// Syntax: 'while' expression block
    fn while_stmnt(&mut self) -> Result<Node> {
        let source = self.source();
        let condition = self.comma_expr()?;
        let block = self.indented_block()?;
        Ok(Node::new(
            NodeKind::While {
                condition: Box::new(condition),
                block: Box::new(block),
            },
            source,
        ))
    }

    /// Syntax: 'do' block 'while' expression NEWLINE
    fn do_stmnt(&mut self) -> Result<Node> {
        let source = self.source();
        let block = self.indented_block()?;
        self.expect(Token::While)?;
        let condition = self.comma_expr()?;
        self.expect(Token::Newline)?;
        Ok(Node::new(
            NodeKind::DoWhile {
                condition: Box::new(condition),
                block: Box::new(block),
            },
            source,
        ))
    }

    /// Syntax: 'for' identifier 'in' sequence NEWLINE block
    fn for_stmnt(&mut self) -> Result<Node> {
        let source = self.source();
        let target = self.expect_identifier()?;
        self.expect(Token::In)?;
        let sequence = self.comma_expr()?;
        if *self.lexer.current() != Token::Newline {
            return Err(self.syntax_error("expected newline"));
        }
        let block = self.indented_block()?;
        Ok(Node::new(
            NodeKind::For {
                target,
                sequence: Box::new(sequence),
                block: Box::new(block),
            },
            source,
        ))
    }

    /// Syntax: 'print' '-raw'? (assignment_expr (',' assignment_expr)*)? NEWLINE
    fn print_stmnt(&mut self) -> Result<Node> {
        let source = self.source();
        let mut raw = false;
        if *self.lexer.current() == Token::Minus {
            let is_raw_flag = matches!(self.lexer.peek()?, Token::Identifier(name) if name == "raw");
            if is_raw_flag {
                self.lexer.advance()?;
                self.lexer.advance()?;
                raw = true;
            }
        }

        let mut expressions = Vec::new();
        while !self.accept(Token::Newline)? {
            loop {
                expressions.push(self.assignment_expr()?);
                if *self.lexer.current() == Token::Newline {
                    break;
                }
                self.expect(Token::Comma)?;
            }
        }

        Ok(Node::new(NodeKind::Print { raw, expressions }, source))
    }

    /// Syntax: 'return' expression? NEWLINE
    fn return_stmnt(&mut self) -> Result<Node> {
        let source = self.source();
        let value = if *self.lexer.current() != Token::Newline {
            Some(Box::new(self.comma_expr()?))
        } else {
            None
        };
        self.expect(Token::Newline)?;
        Ok(Node::new(NodeKind::Return { value }, source))
    }

    /// Syntax: 'input' (string? identifier) (',' string? identifier)* NEWLINE
    fn input_stmnt(&mut self) -> Result<Node> {
        let source = self.source();
        let mut targets = Vec::new();

        loop {
            let prompt = if let Token::StrLit(text) = self.lexer.current() {
                let text = text.clone();
                self.lexer.advance()?;
                Some(text)
            } else {
                None
            };
            let identifier = self.expect_identifier()?;
            targets.push((prompt, identifier));
            if !self.accept(Token::Comma)? {
                break;
            }
        }

        self.expect(Token::Newline)?;
        Ok(Node::new(NodeKind::Input { targets }, source))
    }

    /// Syntax: 'import' string_literal NEWLINE
    ///
    /// The module is loaded and parsed here, not at run time.
    fn import_stmnt(&mut self) -> Result<Node> {
        let source = self.source();
        let name = match self.lexer.current() {
            Token::StrLit(name) => name.clone(),
            other => {
                return Err(self.syntax_error(format!(
                    "expected STRING LITERAL instead of {}",
                    other.name()
                )));
            }
        };

        if self.loaded.iter().any(|loaded| *loaded == name) {
            return Err(self.syntax_error(format!("module {name} already loaded")));
        }
        let module = ModuleCode::load(&name)?;
        self.loaded.push(name.clone());
        let code = self.parse_nested(module)?;

        self.lexer.advance()?; // the module name literal
        self.expect(Token::Newline)?;

        Ok(Node::new(
            NodeKind::Import {
                name,
                code: Box::new(code),
            },
            source,
        ))
    }

    /// Recursively parse another module, preserving the current scanner
    /// state around the recursion.
    fn parse_nested(&mut self, module: Rc<ModuleCode>) -> Result<Node> {
        let saved = mem::replace(&mut self.lexer, Lexer::new(module, &self.config));
        let primed = self.lexer.advance().map(|_| ());
        let result = match primed {
            Ok(()) => self.block(),
            Err(error) => Err(error),
        };
        self.lexer = saved;
        result
    }

    /// Syntax: ('pass' | 'break' | 'continue') NEWLINE
    fn zero_argument_stmnt(&mut self, kind: NodeKind) -> Result<Node> {
        let source = self.source();
        self.expect(Token::Newline)?;
        Ok(Node::new(kind, source))
    }

    /// Syntax: assignment_expr (',' assignment_expr)+
    fn comma_expr(&mut self) -> Result<Node> {
        let source = self.source();
        let first = self.assignment_expr()?;

        if *self.lexer.current() != Token::Comma {
            return Ok(first);
        }

        let mut expressions = vec![first];
        while self.accept(Token::Comma)? {
            expressions.push(self.assignment_expr()?);
        }
        Ok(Node::new(NodeKind::CommaExpr { expressions }, source))
    }

    /// Syntax: logical_or_expr (('=' | '+=' | '-=' | '*=' | '/=' | '%=') …)*
    ///
    /// Plain `=` chains right-associatively; the shorthand forms take a
    /// single logical-or expression on the right.
    fn assignment_expr(&mut self) -> Result<Node> {
        let source = self.source();
        let mut value = self.logical_or_expr()?;

        loop {
            let (operator, right) = if self.accept(Token::Equal)? {
                (AssignmentOperator::Assign, self.assignment_expr()?)
            } else if self.accept(Token::PlusEqual)? {
                (AssignmentOperator::AddAssign, self.logical_or_expr()?)
            } else if self.accept(Token::MinusEqual)? {
                (AssignmentOperator::SubAssign, self.logical_or_expr()?)
            } else if self.accept(Token::StarEqual)? {
                (AssignmentOperator::MulAssign, self.logical_or_expr()?)
            } else if self.accept(Token::SlashEqual)? {
                (AssignmentOperator::DivAssign, self.logical_or_expr()?)
            } else if self.accept(Token::PercentEqual)? {
                (AssignmentOperator::ModAssign, self.logical_or_expr()?)
            } else {
                break;
            };
            value = Node::new(
                NodeKind::Assignment {
                    operator,
                    target: Box::new(value),
                    expression: Box::new(right),
                },
                source.clone(),
            );
        }

        Ok(value)
    }

    /// Syntax: logical_and_expr ('or' logical_or_expr)*
    fn logical_or_expr(&mut self) -> Result<Node> {
        let source = self.source();
        let mut value = self.logical_and_expr()?;
        while self.accept(Token::Or)? {
            value = Node::new(
                NodeKind::Binary {
                    operator: BinaryOperator::Or,
                    left: Box::new(value),
                    right: Box::new(self.logical_or_expr()?),
                },
                source.clone(),
            );
        }
        Ok(value)
    }

    /// Syntax: equality_expr ('and' logical_and_expr)*
    fn logical_and_expr(&mut self) -> Result<Node> {
        let source = self.source();
        let mut value = self.equality_expr()?;
        while self.accept(Token::And)? {
            value = Node::new(
                NodeKind::Binary {
                    operator: BinaryOperator::And,
                    left: Box::new(value),
                    right: Box::new(self.logical_and_expr()?),
                },
                source.clone(),
            );
        }
        Ok(value)
    }

    /// Syntax: relational_expr (('==' | '!=' | '<>' | 'in') relational_expr)*
    fn equality_expr(&mut self) -> Result<Node> {
        let source = self.source();
        let mut value = self.relational_expr()?;
        loop {
            let operator = if self.accept(Token::EqEqual)? {
                BinaryOperator::Equal
            } else if self.accept(Token::NotEqual)? {
                BinaryOperator::NotEqual
            } else if self.accept(Token::In)? {
                BinaryOperator::In
            } else {
                break;
            };
            value = Node::new(
                NodeKind::Binary {
                    operator,
                    left: Box::new(value),
                    right: Box::new(self.relational_expr()?),
                },
                source.clone(),
            );
        }
        Ok(value)
    }

    /// Syntax: addition_expr (('<' | '<=' | '>' | '>=') relational_expr)*
    fn relational_expr(&mut self) -> Result<Node> {
        let source = self.source();
        let mut value = self.addition_expr()?;
        loop {
            let operator = if self.accept(Token::Less)? {
                BinaryOperator::Less
            } else if self.accept(Token::LessEqual)? {
                BinaryOperator::LessEqual
            } else if self.accept(Token::Greater)? {
                BinaryOperator::Greater
            } else if self.accept(Token::GreaterEqual)? {
                BinaryOperator::GreaterEqual
            } else {
                break;
            };
            value = Node::new(
                NodeKind::Binary {
                    operator,
                    left: Box::new(value),
                    right: Box::new(self.relational_expr()?),
                },
                source.clone(),
            );
        }
        Ok(value)
    }

    /// Syntax: multiplication_expr (('+' | '-') multiplication_expr)*
    fn addition_expr(&mut self) -> Result<Node> {
        let source = self.source();
        let mut value = self.multiplication_expr()?;
        loop {
            let operator = if self.accept(Token::Plus)? {
                BinaryOperator::Add
            } else if self.accept(Token::Minus)? {
                BinaryOperator::Sub
            } else {
                break;
            };
            value = Node::new(
                NodeKind::Binary {
                    operator,
                    left: Box::new(value),
                    right: Box::new(self.multiplication_expr()?),
                },
                source.clone(),
            );
        }
        Ok(value)
    }

    /// Syntax: unary_expr (('*' | '/' | '%') unary_expr)*
    fn multiplication_expr(&mut self) -> Result<Node> {
        let source = self.source();
        let mut value = self.unary_expr()?;
        loop {
            let operator = if self.accept(Token::Star)? {
                BinaryOperator::Mul
            } else if self.accept(Token::Slash)? {
                BinaryOperator::Div
            } else if self.accept(Token::Percent)? {
                BinaryOperator::Mod
            } else {
                break;
            };
            value = Node::new(
                NodeKind::Binary {
                    operator,
                    left: Box::new(value),
                    right: Box::new(self.unary_expr()?),
                },
                source.clone(),
            );
        }
        Ok(value)
    }

    /// Syntax: ('+' | '-' | '!')? primary_expr
    fn unary_expr(&mut self) -> Result<Node> {
        let source = self.source();
        let operator = if self.accept(Token::Not)? {
            Some(UnaryOperator::Not)
        } else if self.accept(Token::Minus)? {
            Some(UnaryOperator::Minus)
        } else if self.accept(Token::Plus)? {
            Some(UnaryOperator::Plus)
        } else {
            None
        };

        match operator {
            Some(operator) => Ok(Node::new(
                NodeKind::Unary {
                    operator,
                    operand: Box::new(self.primary_expr()?),
                },
                source,
            )),
            None => self.primary_expr(),
        }
    }

    /// Syntax: (function_call | variable | literal | list_display |
    ///          '(' expression ')') trailer
    fn primary_expr(&mut self) -> Result<Node> {
        let source = self.source();
        let node = match self.lexer.current().clone() {
            Token::CharLit(value) => {
                self.lexer.advance()?;
                Node::new(NodeKind::Literal(LiteralValue::Char(value)), source)
            }
            Token::IntLit(text) => {
                self.lexer.advance()?;
                Node::new(NodeKind::Literal(LiteralValue::Int(text)), source)
            }
            Token::FloatLit(text) => {
                self.lexer.advance()?;
                Node::new(NodeKind::Literal(LiteralValue::Float(text)), source)
            }
            Token::StrLit(text) => {
                self.lexer.advance()?;
                Node::new(NodeKind::Literal(LiteralValue::Str(text)), source)
            }
            Token::LSqb => {
                self.lexer.advance()?;
                let mut elements = Vec::new();
                while !self.accept(Token::RSqb)? {
                    loop {
                        elements.push(self.assignment_expr()?);
                        if *self.lexer.current() == Token::RSqb {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }
                Node::new(NodeKind::ListDisplay { elements }, source)
            }
            Token::Identifier(name) => {
                self.lexer.advance()?;
                if self.accept(Token::LPar)? {
                    let mut arguments = Vec::new();
                    while !self.accept(Token::RPar)? {
                        loop {
                            arguments.push(self.assignment_expr()?);
                            if *self.lexer.current() == Token::RPar {
                                break;
                            }
                            self.expect(Token::Comma)?;
                        }
                    }
                    let builtin = BuiltinFunction::from_name(&name).is_some();
                    Node::new(
                        NodeKind::FunctionCall {
                            name,
                            arguments,
                            builtin,
                            checked: Cell::new(false),
                        },
                        source,
                    )
                } else {
                    Node::new(NodeKind::Reference { name }, source)
                }
            }
            Token::LPar => {
                self.lexer.advance()?;
                let inner = self.comma_expr()?;
                self.expect(Token::RPar)?;
                inner
            }
            _ => return Err(self.syntax_error("expression expected")),
        };

        self.trailer(node)
    }

    /// Subscripts and the optional single method call following a primary.
    ///
    /// Any number of `[index]` / `[start:end]` subscripts may be chained;
    /// absent slice bounds default to 0 and the maximum integer. At most one
    /// `.method(args)` is recorded, on the node itself.
    fn trailer(&mut self, mut node: Node) -> Result<Node> {
        if self.accept(Token::LSqb)? {
            loop {
                let source = node.source.clone();
                let mut is_slice = false;

                let start = if self.accept(Token::Colon)? {
                    is_slice = true;
                    self.int_literal(&source, 0)
                } else {
                    self.logical_or_expr()?
                };
                if self.accept(Token::Colon)? {
                    is_slice = true;
                }

                node = if is_slice {
                    let end = if self.accept(Token::RSqb)? {
                        self.int_literal(&source, i64::MAX)
                    } else {
                        let end = self.logical_or_expr()?;
                        self.expect(Token::RSqb)?;
                        end
                    };
                    Node::new(
                        NodeKind::Slice {
                            sequence: Box::new(node),
                            start: Box::new(start),
                            end: Box::new(end),
                        },
                        source,
                    )
                } else {
                    self.expect(Token::RSqb)?;
                    Node::new(
                        NodeKind::Index {
                            sequence: Box::new(node),
                            index: Box::new(start),
                        },
                        source,
                    )
                };

                if !self.accept(Token::LSqb)? {
                    break;
                }
            }
        }

        if self.accept(Token::Dot)? {
            let name = match self.lexer.current() {
                Token::Identifier(name) => name.clone(),
                _ => return Err(self.syntax_error("expected method")),
            };
            self.lexer.advance()?;
            self.expect(Token::LPar)?;

            let mut arguments = Vec::new();
            while !self.accept(Token::RPar)? {
                loop {
                    arguments.push(self.logical_or_expr()?);
                    if *self.lexer.current() == Token::RPar {
                        break;
                    }
                    self.expect(Token::Comma)?;
                }
            }

            node.method = Some(MethodCall { name, arguments });
        }

        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse_ok(source: &str) -> Node {
        parse_source("test", source, &Config::default()).expect("parse should succeed")
    }

    fn parse_err(source: &str) -> Error {
        parse_source("test", source, &Config::default()).expect_err("expected parse failure")
    }

    fn statements(node: Node) -> Vec<Node> {
        match node.kind {
            NodeKind::Block { statements } => statements,
            other => panic!("expected block, got {}", other.name()),
        }
    }

    fn expression(node: Node) -> Node {
        match node.kind {
            NodeKind::ExpressionStmnt { expression } => *expression,
            NodeKind::Print { mut expressions, .. } => expressions.remove(0),
            other => panic!("expected expression statement, got {}", other.name()),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = expression(statements(parse_ok("1 + 2 * 3\n")).remove(0));
        match expr.kind {
            NodeKind::Binary {
                operator: BinaryOperator::Add,
                right,
                ..
            } => match right.kind {
                NodeKind::Binary {
                    operator: BinaryOperator::Mul,
                    ..
                } => {}
                other => panic!("expected MUL on the right, got {}", other.name()),
            },
            other => panic!("expected ADD at the top, got {}", other.name()),
        }
    }

    #[test]
    fn assignment_is_right_associative_and_chains() {
        let expr = expression(statements(parse_ok("a = b = 3\n")).remove(0));
        match expr.kind {
            NodeKind::Assignment {
                operator: AssignmentOperator::Assign,
                target,
                expression,
            } => {
                assert!(matches!(
                    target.kind,
                    NodeKind::Reference { ref name } if name == "a"
                ));
                assert!(matches!(
                    expression.kind,
                    NodeKind::Assignment {
                        operator: AssignmentOperator::Assign,
                        ..
                    }
                ));
            }
            other => panic!("expected assignment, got {}", other.name()),
        }
    }

    #[test]
    fn assignment_is_an_expression() {
        let expr = expression(statements(parse_ok("print a = 3\n")).remove(0));
        assert!(matches!(expr.kind, NodeKind::Assignment { .. }));
    }

    #[test]
    fn slice_defaults_are_zero_and_max_int() {
        let expr = expression(statements(parse_ok("s[:]\n")).remove(0));
        match expr.kind {
            NodeKind::Slice { start, end, .. } => {
                assert_eq!(
                    start.kind,
                    NodeKind::Literal(LiteralValue::Int("0".to_string()))
                );
                assert_eq!(
                    end.kind,
                    NodeKind::Literal(LiteralValue::Int(i64::MAX.to_string()))
                );
            }
            other => panic!("expected slice, got {}", other.name()),
        }
    }

    #[test]
    fn subscripts_chain_and_method_attaches_to_the_last() {
        let expr = expression(statements(parse_ok("m[0][1].len()\n")).remove(0));
        match &expr.kind {
            NodeKind::Index { sequence, .. } => {
                assert!(matches!(sequence.kind, NodeKind::Index { .. }));
            }
            other => panic!("expected chained index, got {}", other.name()),
        }
        assert_eq!(expr.method.as_ref().map(|m| m.name.as_str()), Some("len"));
    }

    #[test]
    fn method_arguments_are_recorded() {
        let expr = expression(statements(parse_ok("l.insert(0, x + 1)\n")).remove(0));
        let method = expr.method.expect("method expected");
        assert_eq!(method.name, "insert");
        assert_eq!(method.arguments.len(), 2);
    }

    #[test]
    fn function_call_is_tagged_builtin_by_registry() {
        let expr = expression(statements(parse_ok("type(1)\n")).remove(0));
        assert!(matches!(
            expr.kind,
            NodeKind::FunctionCall { builtin: true, .. }
        ));

        let expr = expression(statements(parse_ok("Type(1)\n")).remove(0));
        assert!(matches!(
            expr.kind,
            NodeKind::FunctionCall { builtin: false, .. }
        ));
    }

    #[test]
    fn print_raw_flag_is_recognized() {
        let node = statements(parse_ok("print -raw 1, 2\n")).remove(0);
        match node.kind {
            NodeKind::Print { raw, expressions } => {
                assert!(raw);
                assert_eq!(expressions.len(), 2);
            }
            other => panic!("expected print, got {}", other.name()),
        }

        // `print -x` is a unary minus, not a flag.
        let node = statements(parse_ok("int x = 1\nprint -x\n")).remove(1);
        match node.kind {
            NodeKind::Print { raw, expressions } => {
                assert!(!raw);
                assert!(matches!(expressions[0].kind, NodeKind::Unary { .. }));
            }
            other => panic!("expected print, got {}", other.name()),
        }
    }

    #[test]
    fn parses_block_structure() {
        let nodes = statements(parse_ok(indoc! {"
            def twice(n)
                return n * 2
            print twice(4)
        "}));
        assert_eq!(nodes.len(), 2);
        match &nodes[0].kind {
            NodeKind::FunctionDeclaration { function } => {
                assert_eq!(function.name, "twice");
                assert_eq!(function.parameters, vec!["n".to_string()]);
            }
            other => panic!("expected function declaration, got {}", other.name()),
        }
    }

    #[test]
    fn parses_variable_declaration_list() {
        let node = statements(parse_ok("int a, b = 2, c\n")).remove(0);
        match node.kind {
            NodeKind::VariableDeclaration { defvars } => {
                assert_eq!(defvars.len(), 3);
                assert!(matches!(
                    defvars[1].kind,
                    NodeKind::DefVar {
                        initial: Some(_),
                        ..
                    }
                ));
            }
            other => panic!("expected variable declaration, got {}", other.name()),
        }
    }

    #[test]
    fn comma_expression_only_when_comma_present() {
        let expr = expression(statements(parse_ok("(1, 2)\n")).remove(0));
        assert!(matches!(
            expr.kind,
            NodeKind::CommaExpr { ref expressions } if expressions.len() == 2
        ));

        let expr = expression(statements(parse_ok("(1)\n")).remove(0));
        assert!(matches!(expr.kind, NodeKind::Literal(_)));
    }

    #[test]
    fn reports_expected_token() {
        let error = parse_err("if 1\nprint 1\n");
        assert_eq!(error.kind(), ErrorKind::Syntax);
        assert!(
            error
                .to_string()
                .contains("expected INDENT instead of PRINT")
        );
    }

    #[test]
    fn reports_missing_expression() {
        let error = parse_err("print ,\n");
        assert!(error.to_string().contains("expression expected"));
    }

    #[test]
    fn input_requires_an_identifier_after_prompt() {
        let error = parse_err("input \"n? \"\n");
        assert_eq!(error.kind(), ErrorKind::Syntax);
        assert!(error.to_string().contains("expected identifier"));
    }

    #[test]
    fn import_of_missing_file_is_a_system_error() {
        let error = parse_err("import \"no_such_module.ti\"\n");
        assert_eq!(error.kind(), ErrorKind::System);
    }
}
