//! Source locations attached to AST nodes by the parser. The compiler
//! never inspects them other than to render them in diagnostics.

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub stop: Position,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Position {
    pub col: u32,
    pub line: u32,
}

impl Span {
    pub fn new(start: Position, stop: Position) -> Span {
        Span {
            start: start,
            stop: stop,
        }
    }
}

impl Position {
    pub fn new(line: u32, col: u32) -> Position {
        Position {
            col: col,
            line: line,
        }
    }
}
