//! The abstract syntax tree.
//!
//! One tagged variant covers every node kind; the parser attaches a source
//! position to each node and, on expression nodes, an optional single-level
//! method trailer (`expr.method(args)`).

use std::cell::Cell;
use std::io::Write;
use std::rc::Rc;

use crate::module::Source;

#[derive(Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub source: Source,
    pub method: Option<MethodCall>,
}

impl Node {
    pub fn new(kind: NodeKind, source: Source) -> Self {
        Self {
            kind,
            source,
            method: None,
        }
    }
}

/// The `.name(args)` trailer recorded on the node it follows.
#[derive(Debug, PartialEq)]
pub struct MethodCall {
    pub name: String,
    pub arguments: Vec<Node>,
}

/// A function declaration shared between its AST node and the identifier
/// bindings that refer to it.
#[derive(Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: Node,
}

#[derive(Debug, PartialEq)]
pub enum NodeKind {
    Block {
        statements: Vec<Node>,
    },
    Literal(LiteralValue),
    /// A `[a, b, …]` list display; elements may be arbitrary expressions.
    ListDisplay {
        elements: Vec<Node>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Node>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
    CommaExpr {
        expressions: Vec<Node>,
    },
    Index {
        sequence: Box<Node>,
        index: Box<Node>,
    },
    Slice {
        sequence: Box<Node>,
        start: Box<Node>,
        end: Box<Node>,
    },
    Assignment {
        operator: AssignmentOperator,
        target: Box<Node>,
        expression: Box<Node>,
    },
    Reference {
        name: String,
    },
    FunctionCall {
        name: String,
        arguments: Vec<Node>,
        builtin: bool,
        /// Latch preventing endless descent into recursive call graphs
        /// during checking.
        checked: Cell<bool>,
    },
    ExpressionStmnt {
        expression: Box<Node>,
    },
    FunctionDeclaration {
        function: Rc<FunctionDef>,
    },
    VariableDeclaration {
        defvars: Vec<Node>,
    },
    DefVar {
        vtype: VariableType,
        name: String,
        initial: Option<Box<Node>>,
    },
    If {
        condition: Box<Node>,
        consequent: Box<Node>,
        alternative: Option<Box<Node>>,
    },
    While {
        condition: Box<Node>,
        block: Box<Node>,
    },
    DoWhile {
        condition: Box<Node>,
        block: Box<Node>,
    },
    For {
        target: String,
        sequence: Box<Node>,
        block: Box<Node>,
    },
    Print {
        raw: bool,
        expressions: Vec<Node>,
    },
    Return {
        value: Option<Box<Node>>,
    },
    Import {
        name: String,
        code: Box<Node>,
    },
    Input {
        /// One `(optional prompt, identifier)` pair per value read.
        targets: Vec<(Option<String>, String)>,
    },
    Pass,
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Stored decoded: the byte the constant denotes.
    Char(u8),
    /// Stored as the scanned lexeme, converted on evaluation.
    Int(String),
    Float(String),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    Char,
    Int,
    Float,
    Str,
    List,
}

impl VariableType {
    pub fn name(self) -> &'static str {
        match self {
            VariableType::Char => "CHAR",
            VariableType::Int => "INT",
            VariableType::Float => "FLOAT",
            VariableType::Str => "STR",
            VariableType::List => "LIST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Not => "!",
            UnaryOperator::Minus => "-",
            UnaryOperator::Plus => "+",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UnaryOperator::Not => "NOT",
            UnaryOperator::Minus => "MINUS",
            UnaryOperator::Plus => "PLUS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    In,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::In => "in",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BinaryOperator::Add => "ADD",
            BinaryOperator::Sub => "SUB",
            BinaryOperator::Mul => "MUL",
            BinaryOperator::Div => "DIV",
            BinaryOperator::Mod => "MOD",
            BinaryOperator::And => "LOGICAL_AND",
            BinaryOperator::Or => "LOGICAL_OR",
            BinaryOperator::Less => "LSS",
            BinaryOperator::LessEqual => "LEQ",
            BinaryOperator::Greater => "GTR",
            BinaryOperator::GreaterEqual => "GEQ",
            BinaryOperator::Equal => "EQ",
            BinaryOperator::NotEqual => "NEQ",
            BinaryOperator::In => "IN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
}

impl AssignmentOperator {
    pub fn name(self) -> &'static str {
        match self {
            AssignmentOperator::Assign => "ASSIGN",
            AssignmentOperator::AddAssign => "ADDASSIGN",
            AssignmentOperator::SubAssign => "SUBASSIGN",
            AssignmentOperator::MulAssign => "MULASSIGN",
            AssignmentOperator::DivAssign => "DIVASSIGN",
            AssignmentOperator::ModAssign => "MODASSIGN",
        }
    }
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Block { .. } => "BLOCK",
            NodeKind::Literal(_) => "LITERAL",
            NodeKind::ListDisplay { .. } => "ARGLIST",
            NodeKind::Unary { .. } => "UNARY",
            NodeKind::Binary { .. } => "BINARY",
            NodeKind::CommaExpr { .. } => "COMMA_EXPR",
            NodeKind::Index { .. } => "INDEX",
            NodeKind::Slice { .. } => "SLICE",
            NodeKind::Assignment { .. } => "ASSIGNMENT",
            NodeKind::Reference { .. } => "REFERENCE",
            NodeKind::FunctionCall { .. } => "FUNCTION_CALL",
            NodeKind::ExpressionStmnt { .. } => "EXPRESSION_STMNT",
            NodeKind::FunctionDeclaration { .. } => "FUNCTION_DECLARATION",
            NodeKind::VariableDeclaration { .. } => "VARIABLE_DECLARATION",
            NodeKind::DefVar { .. } => "DEF_VAR",
            NodeKind::If { .. } => "IF_STMNT",
            NodeKind::While { .. } => "WHILE_STMNT",
            NodeKind::DoWhile { .. } => "DO_STMNT",
            NodeKind::For { .. } => "FOR_STMNT",
            NodeKind::Print { .. } => "PRINT_STMNT",
            NodeKind::Return { .. } => "RETURN_STMNT",
            NodeKind::Import { .. } => "IMPORT_STMNT",
            NodeKind::Input { .. } => "INPUT_STMNT",
            NodeKind::Pass => "PASS_STMNT",
            NodeKind::Break => "BREAK_STMNT",
            NodeKind::Continue => "CONTINUE_STMNT",
        }
    }
}

/// Pretty-print a tree for the `-d` AST dump, one node per line with `| `
/// markers per nesting level.
pub fn dump(node: &Node, out: &mut dyn Write) {
    dump_node(node, out, 0);
}

fn indent(out: &mut dyn Write, level: usize) {
    for _ in 0..level {
        let _ = write!(out, "| ");
    }
}

fn line(out: &mut dyn Write, level: usize, text: &str) {
    indent(out, level);
    let _ = writeln!(out, "{text}");
}

fn dump_node(node: &Node, out: &mut dyn Write, level: usize) {
    line(out, level, node.kind.name());

    match &node.kind {
        NodeKind::Block { statements } => {
            for statement in statements {
                dump_node(statement, out, level + 1);
            }
        }
        NodeKind::Literal(value) => {
            let (vtype, text) = match value {
                LiteralValue::Char(c) => ("CHAR", format!("'{}'", *c as char)),
                LiteralValue::Int(text) => ("INT", text.clone()),
                LiteralValue::Float(text) => ("FLOAT", text.clone()),
                LiteralValue::Str(text) => ("STR", format!("\"{text}\"")),
            };
            line(out, level + 1, &format!("TYPE {vtype}"));
            line(out, level + 1, &format!("VALUE {text}"));
        }
        NodeKind::ListDisplay { elements } => {
            for element in elements {
                dump_node(element, out, level + 1);
            }
        }
        NodeKind::Unary { operator, operand } => {
            line(out, level + 1, &format!("OPERATOR {}", operator.name()));
            dump_node(operand, out, level + 1);
        }
        NodeKind::Binary {
            operator,
            left,
            right,
        } => {
            line(out, level + 1, &format!("OPERATOR {}", operator.name()));
            dump_node(left, out, level + 1);
            dump_node(right, out, level + 1);
        }
        NodeKind::CommaExpr { expressions } => {
            for expression in expressions {
                dump_node(expression, out, level + 1);
            }
        }
        NodeKind::Index { sequence, index } => {
            dump_node(sequence, out, level + 1);
            dump_node(index, out, level + 1);
        }
        NodeKind::Slice {
            sequence,
            start,
            end,
        } => {
            dump_node(sequence, out, level + 1);
            dump_node(start, out, level + 1);
            dump_node(end, out, level + 1);
        }
        NodeKind::Assignment {
            operator,
            target,
            expression,
        } => {
            line(out, level + 1, &format!("OPERATOR {}", operator.name()));
            dump_node(target, out, level + 1);
            dump_node(expression, out, level + 1);
        }
        NodeKind::Reference { name } => {
            line(out, level + 1, &format!("NAME {name}"));
        }
        NodeKind::FunctionCall {
            name,
            arguments,
            builtin,
            ..
        } => {
            line(out, level + 1, &format!("NAME {name}"));
            line(
                out,
                level + 1,
                &format!("BUILTIN = {}", if *builtin { "TRUE" } else { "FALSE" }),
            );
            for argument in arguments {
                dump_node(argument, out, level + 1);
            }
        }
        NodeKind::ExpressionStmnt { expression } => {
            dump_node(expression, out, level + 1);
        }
        NodeKind::FunctionDeclaration { function } => {
            line(out, level + 1, &format!("NAME {}", function.name));
            line(
                out,
                level + 1,
                &format!("ARGUMENTS {}", function.parameters.join(", ")),
            );
            dump_node(&function.body, out, level + 1);
        }
        NodeKind::VariableDeclaration { defvars } => {
            for defvar in defvars {
                dump_node(defvar, out, level + 1);
            }
        }
        NodeKind::DefVar {
            vtype,
            name,
            initial,
        } => {
            line(out, level + 1, &format!("NAME {name}"));
            line(out, level + 1, &format!("TYPE {}", vtype.name()));
            if let Some(initial) = initial {
                dump_node(initial, out, level + 1);
            }
        }
        NodeKind::If {
            condition,
            consequent,
            alternative,
        } => {
            dump_node(condition, out, level + 1);
            dump_node(consequent, out, level + 1);
            if let Some(alternative) = alternative {
                dump_node(alternative, out, level + 1);
            }
        }
        NodeKind::While { condition, block } => {
            dump_node(condition, out, level + 1);
            dump_node(block, out, level + 1);
        }
        NodeKind::DoWhile { condition, block } => {
            dump_node(block, out, level + 1);
            dump_node(condition, out, level + 1);
        }
        NodeKind::For {
            target,
            sequence,
            block,
        } => {
            line(out, level + 1, &format!("TARGET {target}"));
            dump_node(sequence, out, level + 1);
            dump_node(block, out, level + 1);
        }
        NodeKind::Print { raw, expressions } => {
            line(
                out,
                level + 1,
                &format!("RAW = {}", if *raw { "TRUE" } else { "FALSE" }),
            );
            for expression in expressions {
                dump_node(expression, out, level + 1);
            }
        }
        NodeKind::Return { value } => {
            if let Some(value) = value {
                dump_node(value, out, level + 1);
            }
        }
        NodeKind::Import { name, code } => {
            line(out, level + 1, &format!("MODULE {name}"));
            dump_node(code, out, level + 1);
        }
        NodeKind::Input { targets } => {
            for (prompt, identifier) in targets {
                if let Some(prompt) = prompt {
                    line(out, level + 1, &format!("PROMPT {prompt}"));
                }
                line(out, level + 1, &format!("IDENTIFIER {identifier}"));
            }
        }
        NodeKind::Pass | NodeKind::Break | NodeKind::Continue => {}
    }

    if let Some(method) = &node.method {
        line(out, level + 1, &format!("METHOD {}", method.name));
        for argument in &method.arguments {
            dump_node(argument, out, level + 2);
        }
    }
}
