use std::fmt;

use thiserror::Error;

use crate::bytecode::{Chunk, OpCode};
use crate::lexer::{Scanner, Token, TokenKind};
use crate::vm::Value;

/// Binding strength of an operator, weakest to tightest.
///
/// Binary operators parse their right operand one level above their own
/// precedence, which makes every level left-associative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call => Precedence::Primary,
            Precedence::Primary => Precedence::Primary,
        }
    }
}

/// What to do when a token appears at the start of an expression.
#[derive(Debug, Clone, Copy)]
enum PrefixRule {
    Grouping,
    Unary,
    Number,
}

/// What to do when a token appears between two operands.
#[derive(Debug, Clone, Copy)]
enum InfixRule {
    Binary,
}

struct ParseRule {
    prefix: Option<PrefixRule>,
    infix: Option<InfixRule>,
    precedence: Precedence,
}

/// The parse rule for a token kind: one row per operator.
///
/// This table is the whole operator grammar; adding an operator means adding
/// a row here and an opcode for it, nothing else.
fn rule_for(kind: TokenKind) -> ParseRule {
    let (prefix, infix, precedence) = match kind {
        TokenKind::LeftParen => (Some(PrefixRule::Grouping), None, Precedence::None),
        TokenKind::Minus => (
            Some(PrefixRule::Unary),
            Some(InfixRule::Binary),
            Precedence::Term,
        ),
        TokenKind::Plus => (None, Some(InfixRule::Binary), Precedence::Term),
        TokenKind::Slash => (None, Some(InfixRule::Binary), Precedence::Factor),
        TokenKind::Star => (None, Some(InfixRule::Binary), Precedence::Factor),
        TokenKind::Number => (Some(PrefixRule::Number), None, Precedence::None),
        _ => (None, None, Precedence::None),
    };
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

/// A single compile diagnostic: source line, location, and message.
///
/// Renders in the form `[line 1] Error at '+': Expect expression.` The
/// parser suppresses every diagnostic after the first in a compile (panic
/// mode), and this grammar has no statement boundary to resynchronize at, so
/// a failed compile carries exactly one diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: u32,
    pub location: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error{}: {}", self.line, self.location, self.message)
    }
}

/// Error type for a failed compile, carrying the collected diagnostics.
#[derive(Error, Debug)]
#[error("compilation failed: {}", first_diagnostic(.diagnostics))]
pub struct CompileError {
    diagnostics: Vec<Diagnostic>,
}

fn first_diagnostic(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .first()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "no diagnostics".to_string())
}

impl CompileError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// Compile a source expression into a chunk.
///
/// On success the chunk is complete and ends in `Return`. On failure the
/// partial chunk is discarded; no partial chunk is ever executed.
pub fn compile(source: &str) -> Result<Chunk, CompileError> {
    let mut compiler = Compiler::new(source);

    compiler.advance();
    compiler.expression();
    compiler.consume(TokenKind::Eof, "Expect end of expression.");
    compiler.end();

    if compiler.had_error {
        Err(CompileError {
            diagnostics: compiler.diagnostics,
        })
    } else {
        Ok(compiler.chunk)
    }
}

/// Single-pass parser and code generator.
///
/// Holds only the current and previous tokens; bytecode is emitted directly
/// while parsing, so there is no AST.
struct Compiler<'src> {
    scanner: Scanner<'src>,
    chunk: Chunk,
    current: Token<'src>,
    previous: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Compiler<'src> {
    fn new(source: &'src str) -> Self {
        let placeholder = Token::new(TokenKind::Eof, "", 1);
        Self {
            scanner: Scanner::new(source),
            chunk: Chunk::new(),
            current: placeholder,
            previous: placeholder,
            had_error: false,
            panic_mode: false,
            diagnostics: Vec::new(),
        }
    }

    /// Step to the next token, reporting and skipping error tokens.
    fn advance(&mut self) {
        self.previous = self.current;

        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme;
            self.error_at_current(message);
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    /// Parse one expression whose operators all bind at least as tightly as
    /// `precedence`.
    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();

        let prefix = match rule_for(self.previous.kind).prefix {
            Some(prefix) => prefix,
            None => {
                self.error("Expect expression.");
                return;
            }
        };
        self.apply_prefix(prefix);

        while precedence <= rule_for(self.current.kind).precedence {
            self.advance();
            if let Some(infix) = rule_for(self.previous.kind).infix {
                self.apply_infix(infix);
            }
        }
    }

    fn apply_prefix(&mut self, rule: PrefixRule) {
        match rule {
            PrefixRule::Grouping => self.grouping(),
            PrefixRule::Unary => self.unary(),
            PrefixRule::Number => self.number(),
        }
    }

    fn apply_infix(&mut self, rule: InfixRule) {
        match rule {
            InfixRule::Binary => self.binary(),
        }
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn number(&mut self) {
        match self.previous.lexeme.parse::<f64>() {
            Ok(value) => self.emit_constant(Value::Number(value)),
            Err(_) => self.error("Invalid number literal."),
        }
    }

    fn unary(&mut self) {
        let operator = self.previous.kind;

        // Compile the operand first; it binds tighter than any binary op
        self.parse_precedence(Precedence::Unary);

        if operator == TokenKind::Minus {
            self.emit_op(OpCode::Negate);
        }
    }

    /// Compile the right operand of an infix operator, then emit the op.
    ///
    /// The right operand parses one precedence level up, so chains of the
    /// same operator group to the left.
    fn binary(&mut self) {
        let operator = self.previous.kind;
        let rule = rule_for(operator);
        self.parse_precedence(rule.precedence.next());

        match operator {
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            _ => {}
        }
    }

    fn end(&mut self) {
        self.emit_op(OpCode::Return);
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.chunk.write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op.to_byte());
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_op(OpCode::Constant);
        self.emit_byte(index);
    }

    /// Add a constant to the pool, enforcing the one-byte operand limit.
    fn make_constant(&mut self, value: Value) -> u8 {
        let index = self.chunk.add_constant(value);
        if index > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        index as u8
    }

    fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;

        let location = match token.kind {
            TokenKind::Eof => " at end".to_string(),
            TokenKind::Error => String::new(),
            _ => format!(" at '{}'", token.lexeme),
        };

        self.diagnostics.push(Diagnostic {
            line: token.line,
            location,
            message: message.to_string(),
        });
        self.had_error = true;
    }
}
