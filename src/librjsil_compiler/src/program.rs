//! The compiler's final product: an instruction sequence wrapped with the
//! identity and metadata fields the external serializer persists.

use crate::il::Instruction;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(0);

/// An opaque token distinguishing one compiled program from every other
/// program produced by this process.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ProgramId(u64);

impl ProgramId {
    fn next() -> ProgramId {
        ProgramId(NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A compiled program. The type-annotation and comment lists exist for
/// the wire format and stay empty here: this compiler performs no type
/// inference and attaches no commentary. `parent` links a mutated program
/// back to the corpus entry it was derived from, which never applies to
/// freshly compiled code.
#[derive(Debug)]
pub struct Program {
    id: ProgramId,
    code: Vec<Instruction>,
    type_annotations: Vec<String>,
    comments: Vec<String>,
    parent: Option<ProgramId>,
}

impl Program {
    pub fn new(code: Vec<Instruction>) -> Program {
        Program {
            id: ProgramId::next(),
            code: code,
            type_annotations: vec![],
            comments: vec![],
            parent: None,
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    pub fn type_annotations(&self) -> &[String] {
        &self.type_annotations
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn parent(&self) -> Option<ProgramId> {
        self.parent
    }
}
