//! Unit tests for the bytecode format

mod test_chunk;
mod test_opcode;
