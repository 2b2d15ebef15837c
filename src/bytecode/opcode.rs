/// Opcodes for the VM

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    // Control operations
    Return = 0x01,   // Pop the result and end execution

    // Stack manipulation
    Constant = 0x10, // Push constant onto stack (1 operand)

    // Arithmetic operations
    Add = 0x20,      // Add top two values
    Subtract = 0x21, // Subtract top value from second top value
    Multiply = 0x22, // Multiply top two values
    Divide = 0x23,   // Divide second top value by top value
    Negate = 0x24,   // Negate top value in place
}

const RETURN: u8 = OpCode::Return as u8;
const CONSTANT: u8 = OpCode::Constant as u8;
const ADD: u8 = OpCode::Add as u8;
const SUBTRACT: u8 = OpCode::Subtract as u8;
const MULTIPLY: u8 = OpCode::Multiply as u8;
const DIVIDE: u8 = OpCode::Divide as u8;
const NEGATE: u8 = OpCode::Negate as u8;

impl OpCode {
    /// Convert a byte to an opcode
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            RETURN => Some(OpCode::Return),
            CONSTANT => Some(OpCode::Constant),
            ADD => Some(OpCode::Add),
            SUBTRACT => Some(OpCode::Subtract),
            MULTIPLY => Some(OpCode::Multiply),
            DIVIDE => Some(OpCode::Divide),
            NEGATE => Some(OpCode::Negate),
            _ => None,
        }
    }

    /// Convert an opcode to a byte
    pub fn to_byte(&self) -> u8 {
        *self as u8
    }

    /// Get the number of operand bytes that follow the opcode
    pub fn num_operands(&self) -> usize {
        match self {
            OpCode::Constant => 1,
            _ => 0,
        }
    }
}

impl From<OpCode> for u8 {
    fn from(opcode: OpCode) -> Self {
        opcode.to_byte()
    }
}
