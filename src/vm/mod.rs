mod config;
mod error;
mod value;

pub use config::VmConfig;
pub use error::{RuntimeError, RuntimeErrorKind, VmResult};
pub use value::Value;

use crate::bytecode::{disassemble_instruction, Chunk, OpCode};
use crate::compiler;

/// Fixed capacity of the value stack.
pub const STACK_MAX: usize = 256;

/// Overall outcome of one interpret call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

/// The virtual machine that executes compiled chunks.
///
/// A `Vm` owns only its value stack; the chunk it executes is borrowed for
/// the duration of [`Vm::run`]. Each `Vm` is an independent context, so
/// separate compile/run pairs never share state.
pub struct Vm {
    stack: Vec<Value>,
    config: VmConfig,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            stack: Vec::with_capacity(STACK_MAX),
            config,
        }
    }

    /// Compile and run `source`, reporting diagnostics and the result.
    ///
    /// Compile errors print to stderr and skip execution entirely. Runtime
    /// errors print the message and the offending source line to stderr.
    /// On success the program's result value prints to stdout.
    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        let chunk = match compiler::compile(source) {
            Ok(chunk) => chunk,
            Err(error) => {
                for diagnostic in error.diagnostics() {
                    eprintln!("{}", diagnostic);
                }
                return InterpretResult::CompileError;
            }
        };

        match self.run(&chunk) {
            Ok(value) => {
                println!("{}", value);
                InterpretResult::Ok
            }
            Err(error) => {
                eprintln!("{}", error);
                eprintln!("[line {}] in script", error.line);
                InterpretResult::RuntimeError
            }
        }
    }

    /// Execute a chunk and return the value surfaced by its `Return`.
    ///
    /// On error the stack is reset to empty before returning, so the same
    /// `Vm` can be reused for another run.
    pub fn run(&mut self, chunk: &Chunk) -> VmResult<Value> {
        self.stack.clear();
        let mut ip = 0;

        loop {
            if self.config.trace {
                self.trace(chunk, ip);
            }

            if ip >= chunk.len() {
                return Err(self.fail(RuntimeErrorKind::UnexpectedEnd, chunk, ip));
            }
            let byte = chunk.code[ip];
            ip += 1;

            let op = match OpCode::from_byte(byte) {
                Some(op) => op,
                None => return Err(self.fail(RuntimeErrorKind::UnknownOpcode(byte), chunk, ip)),
            };

            match op {
                OpCode::Constant => {
                    if ip >= chunk.len() {
                        return Err(self.fail(RuntimeErrorKind::UnexpectedEnd, chunk, ip));
                    }
                    let index = chunk.code[ip];
                    ip += 1;

                    let value = match chunk.constants.get(index as usize) {
                        Some(value) => *value,
                        None => {
                            return Err(self.fail(
                                RuntimeErrorKind::InvalidConstantIndex(index),
                                chunk,
                                ip,
                            ))
                        }
                    };
                    if let Err(kind) = self.push(value) {
                        return Err(self.fail(kind, chunk, ip));
                    }
                }

                OpCode::Add => {
                    if let Err(kind) = self.binary_op(|a, b| a + b) {
                        return Err(self.fail(kind, chunk, ip));
                    }
                }
                OpCode::Subtract => {
                    if let Err(kind) = self.binary_op(|a, b| a - b) {
                        return Err(self.fail(kind, chunk, ip));
                    }
                }
                OpCode::Multiply => {
                    if let Err(kind) = self.binary_op(|a, b| a * b) {
                        return Err(self.fail(kind, chunk, ip));
                    }
                }
                OpCode::Divide => {
                    // IEEE-754 semantics: dividing by zero yields an infinity
                    // or NaN rather than an error.
                    if let Err(kind) = self.binary_op(|a, b| a / b) {
                        return Err(self.fail(kind, chunk, ip));
                    }
                }

                OpCode::Negate => {
                    // Negates the top of the stack in place, no pop/push pair
                    let failure = match self.stack.last_mut() {
                        Some(Value::Number(n)) => {
                            *n = -*n;
                            None
                        }
                        Some(_) => Some(RuntimeErrorKind::OperandMustBeNumber),
                        None => Some(RuntimeErrorKind::StackUnderflow),
                    };
                    if let Some(kind) = failure {
                        return Err(self.fail(kind, chunk, ip));
                    }
                }

                OpCode::Return => {
                    return match self.stack.pop() {
                        Some(value) => Ok(value),
                        None => Err(self.fail(RuntimeErrorKind::StackUnderflow, chunk, ip)),
                    };
                }
            }
        }
    }

    /// Pop both operands of a binary arithmetic op, checking types first.
    fn binary_op(&mut self, op: impl Fn(f64, f64) -> f64) -> Result<(), RuntimeErrorKind> {
        let len = self.stack.len();
        if len < 2 {
            return Err(RuntimeErrorKind::StackUnderflow);
        }

        // Right operand was pushed last
        let (a, b) = match (self.stack[len - 2], self.stack[len - 1]) {
            (Value::Number(a), Value::Number(b)) => (a, b),
            _ => return Err(RuntimeErrorKind::OperandsMustBeNumbers),
        };

        self.stack.truncate(len - 2);
        self.stack.push(Value::Number(op(a, b)));
        Ok(())
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeErrorKind> {
        if self.stack.len() >= STACK_MAX {
            return Err(RuntimeErrorKind::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    /// Build a runtime error for the byte just consumed and reset the stack.
    fn fail(&mut self, kind: RuntimeErrorKind, chunk: &Chunk, ip: usize) -> RuntimeError {
        let line = ip
            .checked_sub(1)
            .and_then(|offset| chunk.lines.get(offset))
            .copied()
            .unwrap_or(0);
        self.stack.clear();
        RuntimeError::new(kind, line)
    }

    fn trace(&self, chunk: &Chunk, ip: usize) {
        let mut line = String::from("          stack:");
        for value in &self.stack {
            line.push_str(&format!(" [ {} ]", value));
        }
        eprintln!("{}", line);
        if ip < chunk.len() {
            let (text, _) = disassemble_instruction(chunk, ip);
            eprintln!("{}", text);
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
