//! Structural verification of emitted IL.
//!
//! The translator promises three things about every program it produces:
//! output variables are numbered `0, 1, 2, …` in emission order with no
//! gaps, every input was defined by a strictly earlier instruction, and
//! the `Begin*`/`End*` block operations are balanced. This module checks
//! all three after the fact; the translator runs it behind a debug
//! assertion and the tests use it directly.

use crate::il::{Instruction, Variable};
use crate::program::Program;
use bit_set::BitSet;
use bit_vec::BitVec;

pub fn validate_program(program: &Program) -> Result<(), String> {
    validate_code(program.code())
}

pub fn validate_code(code: &[Instruction]) -> Result<(), String> {
    let mut defined = BitSet::new();
    let mut next_output: Variable = 0;
    let mut block_depth = 0usize;

    for (index, insn) in code.iter().enumerate() {
        if insn.num_outputs() > insn.inouts.len() {
            return Err(format!("instruction {} ({}) has fewer slots than outputs", index, insn));
        }

        for &input in insn.inputs() {
            if !defined.contains(input as usize) {
                return Err(format!("instruction {} ({}) reads v{} before its definition",
                                   index,
                                   insn,
                                   input));
            }
        }

        for &output in insn.outputs() {
            if output != next_output {
                return Err(format!("instruction {} ({}) defines v{}, expected v{}",
                                   index,
                                   insn,
                                   output,
                                   next_output));
            }
            let _ = defined.insert(output as usize);
            next_output += 1;
        }

        if insn.operation.is_block_end() {
            if block_depth == 0 {
                return Err(format!("instruction {} ({}) closes a block that was never opened",
                                   index,
                                   insn));
            }
            block_depth -= 1;
        }
        if insn.operation.is_block_begin() {
            block_depth += 1;
        }
    }

    if block_depth != 0 {
        return Err(format!("{} blocks left unclosed at the end of the program", block_depth));
    }

    // not an error, but worth surfacing: variables no instruction ever
    // reads are wasted mutation surface for the fuzzer
    let mut read = BitVec::from_elem(next_output as usize, false);
    for insn in code {
        for &input in insn.inputs() {
            read.set(input as usize, true);
        }
    }
    let unread = read.iter().filter(|used| !used).count();
    if unread > 0 {
        debug!(target: "validate", "{} of {} variables are never read", unread, next_output);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::{BinaryOperator, Operation};

    fn insn(operation: Operation, inouts: Vec<Variable>) -> Instruction {
        Instruction::new(operation, inouts)
    }

    #[test]
    fn test_accepts_well_formed_code() {
        let code = vec![
            insn(Operation::LdInt(1), vec![0]),
            insn(Operation::LdInt(2), vec![1]),
            insn(Operation::BinaryOp(BinaryOperator::Add), vec![0, 1, 2]),
            insn(Operation::BeginIf, vec![2]),
            insn(Operation::BeginElse, vec![]),
            insn(Operation::EndIf, vec![]),
        ];
        validate_code(&code).expect("well-formed code should validate");
    }

    #[test]
    fn test_rejects_id_gap() {
        let code = vec![
            insn(Operation::LdInt(1), vec![0]),
            insn(Operation::LdInt(2), vec![2]),
        ];
        assert!(validate_code(&code).is_err());
    }

    #[test]
    fn test_rejects_use_before_definition() {
        let code = vec![
            insn(Operation::LdInt(1), vec![0]),
            insn(Operation::BinaryOp(BinaryOperator::Add), vec![0, 1, 1]),
        ];
        assert!(validate_code(&code).is_err());
    }

    #[test]
    fn test_rejects_reassign_of_undefined_variable() {
        let code = vec![
            insn(Operation::LdInt(1), vec![0]),
            insn(Operation::Reassign, vec![1, 0]),
        ];
        assert!(validate_code(&code).is_err());
    }

    #[test]
    fn test_rejects_unbalanced_blocks() {
        let code = vec![
            insn(Operation::LdBool(true), vec![0]),
            insn(Operation::BeginIf, vec![0]),
        ];
        assert!(validate_code(&code).is_err());

        let code = vec![insn(Operation::EndIf, vec![])];
        assert!(validate_code(&code).is_err());
    }

    #[test]
    fn test_block_outputs_count_as_definitions() {
        let code = vec![
            insn(Operation::CreateArray, vec![0]),
            insn(Operation::BeginForOf, vec![0, 1]),
            insn(Operation::Call, vec![1, 2]),
            insn(Operation::EndForOf, vec![]),
        ];
        validate_code(&code).expect("loop-defined variables are readable in the body");
    }
}
