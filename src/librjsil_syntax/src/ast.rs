//! The abstract syntax tree handed to the compiler. This crate contains no
//! parser; an external frontend produces these nodes (with source spans
//! already attached) and the compiler consumes them read-only.
//!
//! The shape is deliberately close to the ESTree family of ASTs, with one
//! simplification: binding patterns are always plain identifiers, since
//! destructuring never reaches the compiler as a supported form.

use crate::span::Span;
use std::fmt::Debug;

#[derive(Debug)]
pub struct Spanned<T: Debug> {
    pub data: T,
    pub span: Span,
}

impl<T: Clone + Debug> Clone for Spanned<T> {
    fn clone(&self) -> Spanned<T> {
        Spanned {
            data: self.data.clone(),
            span: self.span,
        }
    }
}

impl<T: PartialEq + Debug> PartialEq for Spanned<T> {
    fn eq(&self, other: &Spanned<T>) -> bool {
        self.span.eq(&other.span) && self.data.eq(&other.data)
    }
}

impl<T: Debug> Spanned<T> {
    pub fn new(span: Span, data: T) -> Spanned<T> {
        Spanned {
            span: span,
            data: data,
        }
    }
}

pub type Identifier = Spanned<String>;

pub type SpannedLiteral = Spanned<Literal>;

#[derive(Clone, PartialEq, Debug)]
pub enum Literal {
    String(String),
    Boolean(bool),
    Null,
    /// A numeric literal. The flag records whether the source text was in
    /// integer form (no decimal point, no exponent); the compiler uses it
    /// to choose between integer and float loads.
    Numeric(f64, bool),
    /// A BigInt literal (`123n`). The parser delivers the digits as a
    /// float, which the compiler re-narrows.
    BigInt(f64),
    RegExp(String, String),
}

#[derive(Clone, PartialEq, Debug)]
pub struct Program {
    pub statements: Vec<SpannedStatement>,
}

pub type SpannedFunction = Spanned<Function>;

#[derive(Clone, PartialEq, Debug)]
pub struct Function {
    pub name: Option<Identifier>,
    pub parameters: Vec<SpannedPattern>,
    pub body: Vec<SpannedStatement>,
}

pub type SpannedStatement = Spanned<Statement>;

#[derive(Clone, PartialEq, Debug)]
pub enum Statement {
    Expression(SpannedExpression),
    Block(Vec<SpannedStatement>),
    Empty,
    Debugger,
    With(SpannedExpression, Box<SpannedStatement>),
    Return(Option<SpannedExpression>),
    Label(Identifier, Box<SpannedStatement>),
    Break(Option<Identifier>),
    Continue(Option<Identifier>),
    If(SpannedExpression, Box<SpannedStatement>, Option<Box<SpannedStatement>>),
    Switch(SpannedExpression, Vec<SwitchCase>),
    Throw(SpannedExpression),
    Try(Box<SpannedStatement>, Option<CatchClause>, Option<Box<SpannedStatement>>),
    While(SpannedExpression, Box<SpannedStatement>),
    DoWhile(SpannedExpression, Box<SpannedStatement>),
    For(Option<ForInit>, Option<SpannedExpression>, Option<SpannedExpression>, Box<SpannedStatement>),
    ForIn(ForInit, SpannedExpression, Box<SpannedStatement>),
    ForOf(ForInit, SpannedExpression, Box<SpannedStatement>),
    Declaration(Declaration),
}

#[derive(Clone, PartialEq, Debug)]
pub struct SwitchCase {
    pub test: Option<SpannedExpression>,
    pub body: Vec<SpannedStatement>,
}

#[derive(Clone, PartialEq, Debug)]
pub enum ForInit {
    VarDec(SpannedDeclaration),
    Expr(SpannedExpression),
    None,
}

#[derive(Clone, PartialEq, Debug)]
pub struct CatchClause {
    pub param: SpannedPattern,
    pub body: Box<SpannedStatement>,
}

pub type SpannedDeclaration = Spanned<Declaration>;

#[derive(Clone, PartialEq, Debug)]
pub enum Declaration {
    Function(Function),
    Variable(Vec<VariableDeclarator>),
    Class(ClassDeclaration),
}

#[derive(Clone, PartialEq, Debug)]
pub struct VariableDeclarator {
    pub id: SpannedPattern,
    pub initial_value: Option<SpannedExpression>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct ClassDeclaration {
    pub name: Identifier,
    pub constructor: Option<Function>,
    pub methods: Vec<ClassMethod>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct ClassMethod {
    pub name: Identifier,
    pub function: Function,
}

pub type SpannedExpression = Spanned<Expression>;

#[derive(Clone, PartialEq, Debug)]
pub enum Expression {
    This,
    Array(Vec<ArrayElement>),
    Object(Vec<ObjectEntry>),
    Function(Box<Function>),
    Unary(UnaryOperator, Box<SpannedExpression>),
    Update(UpdateOperator, bool, Box<SpannedExpression>),
    Binary(BinaryOperator, Box<SpannedExpression>, Box<SpannedExpression>),
    Assignment(AssignmentOperator, PatternOrExpression, Box<SpannedExpression>),
    Logical(LogicalOperator, Box<SpannedExpression>, Box<SpannedExpression>),
    Member(Box<SpannedExpression>, Box<SpannedExpression>, bool),
    Conditional(Box<SpannedExpression>, Box<SpannedExpression>, Box<SpannedExpression>),
    Call(Box<SpannedExpression>, Vec<Argument>),
    New(Box<SpannedExpression>, Vec<Argument>),
    Sequence(Vec<SpannedExpression>),
    Identifier(Identifier),
    Literal(Literal),
}

/// One position of an array literal. Elisions (`[1,,3]`) are preserved by
/// the parser and filled in with `undefined` by the compiler.
#[derive(Clone, PartialEq, Debug)]
pub enum ArrayElement {
    Elision,
    Element(SpannedExpression),
    Spread(SpannedExpression),
}

/// One argument of a call or `new` expression.
#[derive(Clone, PartialEq, Debug)]
pub struct Argument {
    pub value: SpannedExpression,
    pub is_spread: bool,
}

#[derive(Clone, PartialEq, Debug)]
pub enum ObjectEntry {
    Property(Property),
    Spread(SpannedExpression),
}

#[derive(Clone, PartialEq, Debug)]
pub struct Property {
    pub key: LiteralOrIdentifier,
    pub value: Box<SpannedExpression>,
    pub kind: PropertyKind,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum PropertyKind {
    Init,
    Get,
    Set,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum UnaryOperator {
    Minus,
    Plus,
    LogicalNot,
    BitwiseNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum UpdateOperator {
    Increment,
    Decrement,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum BinaryOperator {
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    GreaterThan,
    GreaterThanEq,
    LessThan,
    LessThanEq,
    LeftShift,
    RightShift,
    TripleRightShift,
    Plus,
    Minus,
    Times,
    Div,
    Mod,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    In,
    Instanceof,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum AssignmentOperator {
    Equal,
    PlusEqual,
    MinusEqual,
    TimesEqual,
    DivEqual,
    ModEqual,
    LeftShiftEqual,
    RightShiftEqual,
    TripleRightShiftEqual,
    BitwiseOrEqual,
    BitwiseXorEqual,
    BitwiseAndEqual,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum LogicalOperator {
    Or,
    And,
}

#[derive(Clone, PartialEq, Debug)]
pub enum LiteralOrIdentifier {
    Literal(SpannedLiteral),
    Identifier(Identifier),
}

pub type SpannedPattern = Spanned<Pattern>;

#[derive(Clone, PartialEq, Debug)]
pub enum Pattern {
    Identifier(Identifier),
}

#[derive(Clone, PartialEq, Debug)]
pub enum PatternOrExpression {
    Pattern(SpannedPattern),
    Expr(Box<SpannedExpression>),
}
