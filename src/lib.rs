// Rill - A single-pass expression compiler and stack-based bytecode VM

pub mod bytecode;
pub mod compiler;
pub mod lexer;
pub mod vm;

pub use bytecode::{Chunk, OpCode};
pub use compiler::{compile, CompileError};
pub use vm::{InterpretResult, Value, Vm, VmConfig};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
