//! Infix expression compiler.
//!
//! Expressions compile into a private sub-graph of ordinary modules, so an
//! expression is evaluated (and box filtered) through the same module
//! contract as a hand-built procedure.
//!
//! ```text
//! x, y, z, t          coordinates of the query point
//! input1..input3      inputs of the expression module
//! e, pi               constants
//! a + b, a - b        lowest precedence
//! a * b, a / b, a % b
//! a ^ b               left associative
//! -a                  binds tighter than ^, so -x^2 is (-x)^2
//! sin cos sqrt log exp abs (1 argument)
//! pow min max angle bias gain (2 arguments)
//! ```

use std::collections::HashMap;
use std::f64::consts::{E, PI};

use thiserror::Error;

use crate::module::Module;
use crate::modules::{
    AbsModule, AngleModule, CoordinateModule, DifferenceModule, ExpressionInputModule,
    ModModule, NumberModule, PowerModule, ProductModule, RatioModule, SelectModule,
    ShapingModule, SumModule, Transcendental, TranscendentalModule,
};
use crate::point::Axis;
use crate::procedure::{ModuleSlot, Source};

/// Number of `inputN` variables an expression can reference.
pub const EXPRESSION_INPUTS: usize = 3;

/// Deepest syntax tree, and deepest parenthesis or unary nesting, accepted.
pub const MAX_EXPRESSION_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected '{0}'")]
    UnexpectedToken(String),
    #[error("unmatched parenthesis")]
    UnmatchedParen,
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("{function} takes {expected} argument(s), got {got}")]
    WrongArgCount {
        function: String,
        expected: usize,
        got: usize,
    },
    #[error("expression nests deeper than {} levels", MAX_EXPRESSION_DEPTH)]
    TooDeep,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Variable(String),
    /// An identifier directly followed by `(`; the parenthesis is consumed.
    Call(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Variable(name) => name.clone(),
            Token::Call(name) => format!("{name}("),
            Token::Op(c) => c.to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Comma => ",".to_string(),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' | '%' | '^' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let run: String = chars[start..i].iter().collect();
                let value = run
                    .parse::<f64>()
                    .map_err(|_| ExprError::InvalidNumber(run.clone()))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                let mut next = i;
                while next < chars.len() && chars[next].is_whitespace() {
                    next += 1;
                }
                if chars.get(next) == Some(&'(') {
                    tokens.push(Token::Call(name));
                    i = next + 1;
                } else {
                    tokens.push(Token::Variable(name));
                }
            }
            other => return Err(ExprError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Sqrt,
    Log,
    Exp,
    Abs,
    Pow,
    Min,
    Max,
    Angle,
    Bias,
    Gain,
}

impl Function {
    fn from_name(name: &str) -> Option<Function> {
        Some(match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "sqrt" => Function::Sqrt,
            "log" => Function::Log,
            "exp" => Function::Exp,
            "abs" => Function::Abs,
            "pow" => Function::Pow,
            "min" => Function::Min,
            "max" => Function::Max,
            "angle" => Function::Angle,
            "bias" => Function::Bias,
            "gain" => Function::Gain,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Function::Sin
            | Function::Cos
            | Function::Sqrt
            | Function::Log
            | Function::Exp
            | Function::Abs => 1,
            _ => 2,
        }
    }

    fn module(self) -> Box<dyn Module> {
        match self {
            Function::Sin => Box::new(TranscendentalModule::new(Transcendental::Sine)),
            Function::Cos => Box::new(TranscendentalModule::new(Transcendental::Cosine)),
            Function::Sqrt => Box::new(TranscendentalModule::new(Transcendental::Sqrt)),
            Function::Log => Box::new(TranscendentalModule::new(Transcendental::Log)),
            Function::Exp => Box::new(TranscendentalModule::new(Transcendental::Exp)),
            Function::Abs => Box::new(AbsModule::default()),
            Function::Pow => Box::new(PowerModule::default()),
            Function::Min => Box::new(SelectModule::min()),
            Function::Max => Box::new(SelectModule::max()),
            Function::Angle => Box::new(AngleModule::default()),
            Function::Bias => Box::new(ShapingModule::bias()),
            Function::Gain => Box::new(ShapingModule::gain()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    Coordinate(Axis),
    /// Zero-based index of an expression input.
    Input(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Number(f64),
    Variable(Variable),
    Negate(Box<Ast>),
    Binary(BinaryOp, Box<Ast>, Box<Ast>),
    Call(Function, Vec<Ast>),
}

/// A parsed subtree and its depth.
type Parsed = Result<(Ast, usize), ExprError>;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Open parentheses, calls and negations around the current token.
    nesting: usize,
    /// Problems that do not stop parsing.
    errors: Vec<ExprError>,
}

fn deeper(depth: usize) -> Result<usize, ExprError> {
    if depth >= MAX_EXPRESSION_DEPTH {
        return Err(ExprError::TooDeep);
    }
    Ok(depth + 1)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_op(&self, ops: &[char]) -> Option<char> {
        match self.peek() {
            Some(Token::Op(c)) if ops.contains(c) => Some(*c),
            _ => None,
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        if self.nesting >= MAX_EXPRESSION_DEPTH {
            return Err(ExprError::TooDeep);
        }
        self.nesting += 1;
        let parsed = parse(self);
        self.nesting -= 1;
        parsed
    }

    fn expr(&mut self) -> Parsed {
        let (mut left, mut depth) = self.term()?;
        while let Some(op) = self.peek_op(&['+', '-']) {
            self.pos += 1;
            let (right, right_depth) = self.term()?;
            let op = if op == '+' {
                BinaryOp::Add
            } else {
                BinaryOp::Subtract
            };
            depth = deeper(depth.max(right_depth))?;
            left = Ast::Binary(op, Box::new(left), Box::new(right));
        }
        Ok((left, depth))
    }

    fn term(&mut self) -> Parsed {
        let (mut left, mut depth) = self.exponent()?;
        while let Some(op) = self.peek_op(&['*', '/', '%']) {
            self.pos += 1;
            let (right, right_depth) = self.exponent()?;
            let op = match op {
                '*' => BinaryOp::Multiply,
                '/' => BinaryOp::Divide,
                _ => BinaryOp::Modulo,
            };
            depth = deeper(depth.max(right_depth))?;
            left = Ast::Binary(op, Box::new(left), Box::new(right));
        }
        Ok((left, depth))
    }

    fn exponent(&mut self) -> Parsed {
        let (mut left, mut depth) = self.prim()?;
        while self.peek_op(&['^']).is_some() {
            self.pos += 1;
            let (right, right_depth) = self.prim()?;
            depth = deeper(depth.max(right_depth))?;
            left = Ast::Binary(BinaryOp::Power, Box::new(left), Box::new(right));
        }
        Ok((left, depth))
    }

    fn prim(&mut self) -> Parsed {
        match self.next() {
            None => Err(ExprError::UnexpectedEnd),
            Some(Token::Number(value)) => Ok((Ast::Number(value), 1)),
            Some(Token::Variable(name)) => Ok((self.variable(&name), 1)),
            Some(Token::Call(name)) => self.nested(|parser| parser.call(name)),
            Some(Token::LParen) => self.nested(|parser| {
                let inner = parser.expr()?;
                match parser.next() {
                    Some(Token::RParen) => Ok(inner),
                    None => Err(ExprError::UnmatchedParen),
                    Some(other) => Err(ExprError::UnexpectedToken(other.describe())),
                }
            }),
            Some(Token::Op('-')) => self.nested(|parser| {
                let (operand, depth) = parser.prim()?;
                Ok((Ast::Negate(Box::new(operand)), deeper(depth)?))
            }),
            Some(Token::RParen) => Err(ExprError::UnmatchedParen),
            Some(other) => Err(ExprError::UnexpectedToken(other.describe())),
        }
    }

    fn variable(&mut self, name: &str) -> Ast {
        let variable = match name {
            "x" => Variable::Coordinate(Axis::X),
            "y" => Variable::Coordinate(Axis::Y),
            "z" => Variable::Coordinate(Axis::Z),
            "t" => Variable::Coordinate(Axis::T),
            "e" => return Ast::Number(E),
            "pi" => return Ast::Number(PI),
            _ => match name
                .strip_prefix("input")
                .and_then(|n| n.parse::<usize>().ok())
            {
                Some(n) if (1..=EXPRESSION_INPUTS).contains(&n) => Variable::Input(n - 1),
                _ => {
                    self.errors
                        .push(ExprError::UnknownVariable(name.to_string()));
                    return Ast::Number(0.0);
                }
            },
        };
        Ast::Variable(variable)
    }

    fn call(&mut self, name: String) -> Parsed {
        let mut args = Vec::new();
        let mut depth = 0;
        if matches!(self.peek(), Some(Token::RParen)) {
            self.pos += 1;
        } else {
            loop {
                let (arg, arg_depth) = self.expr()?;
                args.push(arg);
                depth = depth.max(arg_depth);
                match self.next() {
                    Some(Token::Comma) => continue,
                    Some(Token::RParen) => break,
                    None => return Err(ExprError::UnmatchedParen),
                    Some(other) => return Err(ExprError::UnexpectedToken(other.describe())),
                }
            }
        }

        let Some(function) = Function::from_name(&name) else {
            self.errors.push(ExprError::UnknownFunction(name));
            return Ok((Ast::Number(0.0), 1));
        };
        if args.len() != function.arity() {
            self.errors.push(ExprError::WrongArgCount {
                function: name,
                expected: function.arity(),
                got: args.len(),
            });
            return Ok((Ast::Number(0.0), 1));
        }
        Ok((Ast::Call(function, args), deeper(depth)?))
    }
}

/// Parses `text`, reporting every problem found.
///
/// Trees deeper than [`MAX_EXPRESSION_DEPTH`] are rejected with
/// [`ExprError::TooDeep`].
pub fn parse(text: &str) -> Result<Ast, Vec<ExprError>> {
    let tokens = tokenize(text).map_err(|err| vec![err])?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
        errors: Vec::new(),
    };
    let ast = parser.expr();
    let mut errors = std::mem::take(&mut parser.errors);
    match ast {
        Ok((ast, _)) => {
            if let Some(extra) = parser.peek() {
                let error = match extra {
                    Token::RParen => ExprError::UnmatchedParen,
                    other => ExprError::UnexpectedToken(other.describe()),
                };
                errors.push(error);
            }
            if errors.is_empty() {
                Ok(ast)
            } else {
                Err(errors)
            }
        }
        Err(err) => {
            errors.push(err);
            Err(errors)
        }
    }
}

/// A compiled expression: module slots wired into a DAG and the output that
/// carries the result.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) slots: Vec<ModuleSlot>,
    pub(crate) root: Source,
}

impl Program {
    /// The program every failed compile falls back to.
    pub fn zero() -> Self {
        Self {
            slots: vec![ModuleSlot::new(Box::new(NumberModule::new(0.0)), [0, 0])],
            root: Source::new(0, 0),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Default)]
struct Builder {
    slots: Vec<ModuleSlot>,
    numbers: HashMap<u64, usize>,
    variables: HashMap<Variable, usize>,
}

impl Builder {
    fn push(&mut self, module: Box<dyn Module>, operands: Vec<usize>) -> usize {
        let mut slot = ModuleSlot::new(module, [0, 0]);
        for (input, operand) in operands.into_iter().enumerate() {
            if let Some(wire) = slot.inputs.get_mut(input) {
                *wire = Some(Source::new(operand, 0));
            }
        }
        self.slots.push(slot);
        self.slots.len() - 1
    }

    fn number(&mut self, value: f64) -> usize {
        if let Some(index) = self.numbers.get(&value.to_bits()) {
            return *index;
        }
        let index = self.push(Box::new(NumberModule::new(value)), Vec::new());
        self.numbers.insert(value.to_bits(), index);
        index
    }

    fn variable(&mut self, variable: Variable) -> usize {
        if let Some(index) = self.variables.get(&variable) {
            return *index;
        }
        let module: Box<dyn Module> = match variable {
            Variable::Coordinate(axis) => Box::new(CoordinateModule::new(axis)),
            Variable::Input(index) => Box::new(ExpressionInputModule::new(index)),
        };
        let index = self.push(module, Vec::new());
        self.variables.insert(variable, index);
        index
    }

    fn build(&mut self, ast: &Ast) -> usize {
        match ast {
            Ast::Number(value) => self.number(*value),
            Ast::Variable(variable) => self.variable(*variable),
            Ast::Negate(operand) => {
                // Difference with an unconnected left operand is 0 - operand.
                let operand = self.build(operand);
                let mut slot = ModuleSlot::new(Box::new(DifferenceModule::default()), [0, 0]);
                slot.inputs[1] = Some(Source::new(operand, 0));
                self.slots.push(slot);
                self.slots.len() - 1
            }
            Ast::Binary(op, left, right) => {
                let operands = vec![self.build(left), self.build(right)];
                let module: Box<dyn Module> = match op {
                    BinaryOp::Add => Box::new(SumModule::default()),
                    BinaryOp::Subtract => Box::new(DifferenceModule::default()),
                    BinaryOp::Multiply => Box::new(ProductModule::default()),
                    BinaryOp::Divide => Box::new(RatioModule::default()),
                    BinaryOp::Modulo => Box::new(ModModule::default()),
                    BinaryOp::Power => Box::new(PowerModule::default()),
                };
                self.push(module, operands)
            }
            Ast::Call(function, args) => {
                let operands = args.iter().map(|arg| self.build(arg)).collect();
                self.push(function.module(), operands)
            }
        }
    }
}

/// Compiles `text` into a module program.
pub fn compile(text: &str) -> Result<Program, Vec<ExprError>> {
    let ast = parse(text)?;
    let mut builder = Builder::default();
    let root = builder.build(&ast);
    Ok(Program {
        slots: builder.slots,
        root: Source::new(root, 0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(op: BinaryOp, left: Ast, right: Ast) -> Ast {
        Ast::Binary(op, Box::new(left), Box::new(right))
    }

    fn x() -> Ast {
        Ast::Variable(Variable::Coordinate(Axis::X))
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(
            parse("1 + 2 * x").expect("parse"),
            binary(
                BinaryOp::Add,
                Ast::Number(1.0),
                binary(BinaryOp::Multiply, Ast::Number(2.0), x())
            )
        );
        assert_eq!(
            parse("x ^ 2 ^ 3").expect("parse"),
            binary(
                BinaryOp::Power,
                binary(BinaryOp::Power, x(), Ast::Number(2.0)),
                Ast::Number(3.0)
            )
        );
        assert_eq!(
            parse("-x^2").expect("parse"),
            binary(BinaryOp::Power, Ast::Negate(Box::new(x())), Ast::Number(2.0))
        );
    }

    #[test]
    fn constants_and_inputs() {
        assert_eq!(parse("pi").expect("parse"), Ast::Number(PI));
        assert_eq!(
            parse("input3").expect("parse"),
            Ast::Variable(Variable::Input(2))
        );
    }

    #[test]
    fn calls_check_names_and_arity() {
        assert_eq!(
            parse("foo(x)"),
            Err(vec![ExprError::UnknownFunction("foo".to_string())])
        );
        assert_eq!(
            parse("sin(x, 1)"),
            Err(vec![ExprError::WrongArgCount {
                function: "sin".to_string(),
                expected: 1,
                got: 2
            }])
        );
        assert!(matches!(parse("min (x, y)").expect("parse"), Ast::Call(Function::Min, _)));
    }

    #[test]
    fn reports_every_semantic_error() {
        let errors = parse("q + input4 + bar()").expect_err("errors");
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn unmatched_parentheses() {
        assert_eq!(parse("(x + 1"), Err(vec![ExprError::UnmatchedParen]));
        assert_eq!(parse("x + 1)"), Err(vec![ExprError::UnmatchedParen]));
        assert_eq!(parse("sin(x"), Err(vec![ExprError::UnmatchedParen]));
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(parse(""), Err(vec![ExprError::UnexpectedEnd]));
        assert_eq!(parse("x $ 2"), Err(vec![ExprError::UnexpectedChar('$')]));
        assert_eq!(
            parse("1..2"),
            Err(vec![ExprError::InvalidNumber("1..2".to_string())])
        );
        assert_eq!(
            parse("x 2"),
            Err(vec![ExprError::UnexpectedToken("2".to_string())])
        );
    }

    #[test]
    fn runaway_nesting_is_an_error() {
        let parens = format!("{}x{}", "(".repeat(200_000), ")".repeat(200_000));
        assert_eq!(parse(&parens), Err(vec![ExprError::TooDeep]));
        let negations = format!("{}x", "-".repeat(200_000));
        assert_eq!(parse(&negations), Err(vec![ExprError::TooDeep]));
        let calls = format!("{}x{}", "abs(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(parse(&calls), Err(vec![ExprError::TooDeep]));
        let chain = vec!["x"; 10_000].join(" + ");
        assert_eq!(compile(&chain).err(), Some(vec![ExprError::TooDeep]));
    }

    #[test]
    fn nesting_up_to_the_limit_parses() {
        let parens = format!("{}x{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(parse(&parens), Ok(x()));
        let chain = vec!["x"; MAX_EXPRESSION_DEPTH].join(" + ");
        assert!(compile(&chain).is_ok());
        let chain = vec!["x"; MAX_EXPRESSION_DEPTH + 1].join(" + ");
        assert_eq!(parse(&chain), Err(vec![ExprError::TooDeep]));
    }

    #[test]
    fn shares_coordinates_and_constants() {
        let program = compile("x * x + x").expect("compile");
        assert_eq!(program.len(), 3);
        let program = compile("2 + 2").expect("compile");
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn negation_leaves_left_operand_unconnected() {
        let program = compile("-x").expect("compile");
        let root = &program.slots[program.root.module];
        assert_eq!(root.input(0), None);
        assert_eq!(root.input(1), Some(Source::new(0, 0)));
    }

    #[test]
    fn operands_feed_inputs_in_order() {
        let program = compile("pow(y, 3)").expect("compile");
        let root = &program.slots[program.root.module];
        assert_eq!(root.input(0), Some(Source::new(0, 0)));
        assert_eq!(root.input(1), Some(Source::new(1, 0)));
    }
}
