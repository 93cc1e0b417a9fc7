extern crate librjsil_compiler;
extern crate librjsil_syntax;

pub mod syntax {
    pub use librjsil_syntax::ast;
    pub use librjsil_syntax::Position;
    pub use librjsil_syntax::Span;
}

pub mod compiler {
    pub use librjsil_compiler::compile_program;
    pub use librjsil_compiler::compile_statements;
    pub use librjsil_compiler::il;
    pub use librjsil_compiler::program;
    pub use librjsil_compiler::validate;
    pub use librjsil_compiler::CompileError;
    pub use librjsil_compiler::CompileResult;
    pub use librjsil_compiler::CompilerOptions;
}
