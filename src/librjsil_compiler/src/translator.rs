//! Recursive-descent lowering of the syntax tree into IL instructions.
//!
//! The translator walks statements and expressions in source order,
//! allocating IL variables through the scope tracker and appending to one
//! flat instruction list. Most of JavaScript maps onto the IL directly;
//! the constructs the IL cannot express natively are desugared here:
//!
//! 1. The ternary operator, which becomes a pre-allocated result variable
//!    plus an if/else block whose branches `Reassign` into it,
//! 2. Compound assignment operators (`+=` and friends), which become a
//!    load, a binary operation, and a store or rebind,
//! 3. `while`/`do-while`/`for` conditions, which are lowered twice — once
//!    for the initial guard and once at the end of each iteration, with a
//!    `Reassign` feeding the recomputed value back to the loop header,
//! 4. `void`, which evaluates its operand and produces a fresh
//!    `undefined`,
//! 5. Class bodies, which become plain function definitions stored onto
//!    the prototype object one method at a time.
//!
//! Before a function or program body is lowered, the hoisting analysis
//! runs over it and every name it reports is pre-declared: variables as
//! `undefined` loads, function declarations by lowering their definition
//! eagerly. The tracker remembers those names so the in-order translation
//! of the original declaration turns into a `Reassign` (variables) or a
//! no-op (functions).

use crate::builtins;
use crate::error::CompileResult;
use crate::hoisting;
use crate::il::{BinaryOperator, Instruction, Operation, UnaryOperator, Variable};
use crate::program::Program;
use crate::tracker::{CompilerOptions, ScopeTracker};
use crate::validate;
use librjsil_syntax::ast;
use std::collections::HashSet;

/// Compiles a parsed program into an IL program record.
pub fn compile_program(program: &ast::Program,
                       options: CompilerOptions)
                       -> CompileResult<Program> {
    compile_statements(&program.statements, options)
}

/// Compiles a bare statement list as a top-level program body.
pub fn compile_statements(statements: &[ast::SpannedStatement],
                          options: CompilerOptions)
                          -> CompileResult<Program> {
    debug!(target: "compile", "compiling a body of {} statements", statements.len());
    let mut translator = Translator::new(options);
    translator.lower_body(statements)?;

    let program = Program::new(translator.code);
    debug_assert!(validate::validate_program(&program).is_ok(),
                  "translator produced ill-formed IL");
    Ok(program)
}

struct Translator {
    tracker: ScopeTracker,
    code: Vec<Instruction>,
}

impl Translator {
    fn new(options: CompilerOptions) -> Translator {
        Translator {
            tracker: ScopeTracker::new(options),
            code: vec![],
        }
    }

    fn emit(&mut self, operation: Operation, inouts: Vec<Variable>) {
        self.code.push(Instruction::new(operation, inouts));
    }

    /// Appends an instruction whose final slot is a freshly allocated
    /// result variable, and returns that variable.
    fn emit_output(&mut self,
                   operation: Operation,
                   mut inputs: Vec<Variable>)
                   -> CompileResult<Variable> {
        let result = self.tracker.fresh_variable()?;
        inputs.push(result);
        self.emit(operation, inputs);
        Ok(result)
    }

    /// Lowers a function or program body: hoisting analysis, the
    /// pre-declarations it calls for, then the statements in source
    /// order.
    fn lower_body(&mut self, statements: &[ast::SpannedStatement]) -> CompileResult<()> {
        let hoisted = hoisting::analyze(statements);
        self.tracker.clear_hoisted();

        for name in &hoisted.variables {
            let var = self.emit_output(Operation::LdUndefined, vec![])?;
            self.tracker.bind(name, var);
            self.tracker.mark_hoisted(name);
        }

        for name in &hoisted.functions {
            let func = match find_function_declaration(statements, name) {
                Some(func) => func,
                None => {
                    malformed!("hoisted function {} has no declaration in this body", name)
                }
            };
            let func_var = self.lower_function(func)?;
            self.tracker.bind(name, func_var);
            self.tracker.mark_hoisted(name);
        }

        for stmt in statements {
            self.lower_statement(stmt)?;
        }

        Ok(())
    }

    fn lower_statement(&mut self, stmt: &ast::SpannedStatement) -> CompileResult<()> {
        match stmt.data {
            ast::Statement::Expression(ref expr) => {
                let _ = self.lower_expression(expr)?;
                Ok(())
            }
            // a bare block does not get a scope frame: var bindings are
            // function-scoped and must stay visible to the block's
            // siblings
            ast::Statement::Block(ref stmts) => {
                for stmt in stmts {
                    self.lower_statement(stmt)?;
                }
                Ok(())
            }
            ast::Statement::Empty => {
                self.emit(Operation::Nop, vec![]);
                Ok(())
            }
            ast::Statement::With(ref object, ref body) => self.lower_with_statement(object, body),
            ast::Statement::Return(ref expr) => self.lower_return_statement(expr.as_ref()),
            ast::Statement::Break(None) => {
                self.emit(Operation::LoopBreak, vec![]);
                Ok(())
            }
            ast::Statement::Continue(None) => {
                self.emit(Operation::LoopContinue, vec![]);
                Ok(())
            }
            ast::Statement::If(ref test, ref consequent, ref alternate) => {
                self.lower_if_statement(test, consequent, alternate.as_ref().map(|x| &**x))
            }
            ast::Statement::Throw(ref expr) => {
                let value = self.lower_expression(expr)?;
                self.emit(Operation::Throw, vec![value]);
                Ok(())
            }
            ast::Statement::Try(ref body, ref catch, ref finally) => {
                self.lower_try_statement(body, catch.as_ref(), finally.as_ref().map(|x| &**x))
            }
            ast::Statement::While(ref test, ref body) => {
                self.lower_while_statement(test, body, false)
            }
            ast::Statement::DoWhile(ref test, ref body) => {
                self.lower_while_statement(test, body, true)
            }
            ast::Statement::For(ref init, ref test, ref update, ref body) => {
                self.lower_for_statement(init.as_ref(), test.as_ref(), update.as_ref(), body)
            }
            ast::Statement::ForIn(ref head, ref object, ref body) => {
                self.lower_for_in_statement(head, object, body, false)
            }
            ast::Statement::ForOf(ref head, ref object, ref body) => {
                self.lower_for_in_statement(head, object, body, true)
            }
            ast::Statement::Declaration(ref decl) => self.lower_declaration_statement(decl),
            // everything below has no lowering rule yet
            ast::Statement::Debugger |
            ast::Statement::Label(_, _) |
            ast::Statement::Break(Some(_)) |
            ast::Statement::Continue(Some(_)) |
            ast::Statement::Switch(_, _) => {
                unsupported!("no lowering rule for statement: {:?}", stmt)
            }
        }
    }

    fn lower_with_statement(&mut self,
                            object: &ast::SpannedExpression,
                            body: &ast::SpannedStatement)
                            -> CompileResult<()> {
        let object_var = self.lower_expression(object)?;
        self.emit(Operation::BeginWith, vec![object_var]);
        self.tracker.push_scope();
        self.lower_statement(body)?;
        self.tracker.pop_scope();
        self.emit(Operation::EndWith, vec![]);
        Ok(())
    }

    fn lower_return_statement(&mut self,
                              expr: Option<&ast::SpannedExpression>)
                              -> CompileResult<()> {
        let value = match expr {
            Some(expr) => self.lower_expression(expr)?,
            None => self.emit_output(Operation::LdUndefined, vec![])?,
        };
        self.emit(Operation::Return, vec![value]);
        Ok(())
    }

    fn lower_if_statement(&mut self,
                          test: &ast::SpannedExpression,
                          consequent: &ast::SpannedStatement,
                          alternate: Option<&ast::SpannedStatement>)
                          -> CompileResult<()> {
        let test_var = self.lower_expression(test)?;
        self.emit(Operation::BeginIf, vec![test_var]);
        self.tracker.push_scope();
        self.lower_statement(consequent)?;
        self.tracker.pop_scope();
        // the else block is emitted even without a source-level else
        // clause; the downstream static analysis needs both branches
        self.emit(Operation::BeginElse, vec![]);
        if let Some(alternate) = alternate {
            self.tracker.push_scope();
            self.lower_statement(alternate)?;
            self.tracker.pop_scope();
        }
        self.emit(Operation::EndIf, vec![]);
        Ok(())
    }

    fn lower_try_statement(&mut self,
                           body: &ast::SpannedStatement,
                           catch: Option<&ast::CatchClause>,
                           finally: Option<&ast::SpannedStatement>)
                           -> CompileResult<()> {
        if catch.is_none() && finally.is_none() {
            malformed!("try statement with neither catch nor finally: {:?}", body);
        }

        self.emit(Operation::BeginTry, vec![]);
        self.tracker.push_scope();
        self.lower_statement(body)?;
        self.tracker.pop_scope();

        if let Some(catch) = catch {
            let exception = self.tracker.fresh_variable()?;
            self.emit(Operation::BeginCatch, vec![exception]);
            self.tracker.push_scope();
            let ast::Pattern::Identifier(ref ident) = catch.param.data;
            self.tracker.bind(&ident.data, exception);
            self.lower_statement(&catch.body)?;
            self.tracker.pop_scope();
        }

        if let Some(finally) = finally {
            self.emit(Operation::BeginFinally, vec![]);
            self.tracker.push_scope();
            self.lower_statement(finally)?;
            self.tracker.pop_scope();
        }

        self.emit(Operation::EndTryCatch, vec![]);
        Ok(())
    }

    /// Lowers `while` and `do-while` loops onto the IL's two-variable
    /// loop forms. The IL re-reads the guard variable instead of
    /// re-evaluating a source expression, so the test is lowered twice:
    /// once for the initial guard and once at the end of the body, where
    /// the fresh value is written back into the guard.
    fn lower_while_statement(&mut self,
                             test: &ast::SpannedExpression,
                             body: &ast::SpannedStatement,
                             test_after_body: bool)
                             -> CompileResult<()> {
        let guard = self.lower_expression(test)?;
        let sentinel = self.emit_output(Operation::LdBool(false), vec![])?;
        let begin = if test_after_body {
            Operation::BeginDoWhile
        } else {
            Operation::BeginWhile
        };
        self.emit(begin, vec![guard, sentinel]);

        self.tracker.push_scope();
        self.lower_statement(body)?;
        let fresh = self.lower_expression(test)?;
        self.emit(Operation::Reassign, vec![guard, fresh]);
        self.tracker.pop_scope();

        let end = if test_after_body {
            Operation::EndDoWhile
        } else {
            Operation::EndWhile
        };
        self.emit(end, vec![]);
        Ok(())
    }

    fn lower_for_statement(&mut self,
                           init: Option<&ast::ForInit>,
                           test: Option<&ast::SpannedExpression>,
                           update: Option<&ast::SpannedExpression>,
                           body: &ast::SpannedStatement)
                           -> CompileResult<()> {
        // for(init; test, update) body  becomes  init; while(test) { body; update }
        // with everything inside the loop's own scope
        self.tracker.push_scope();
        match init {
            Some(&ast::ForInit::VarDec(ref decl)) => {
                self.lower_declaration_statement(&decl.data)?
            }
            Some(&ast::ForInit::Expr(ref expr)) => {
                let _ = self.lower_expression(expr)?;
            }
            Some(&ast::ForInit::None) | None => {}
        }

        let guard = self.lower_for_test(test)?;
        let sentinel = self.emit_output(Operation::LdBool(false), vec![])?;
        self.emit(Operation::BeginWhile, vec![guard, sentinel]);

        self.tracker.push_scope();
        self.lower_statement(body)?;
        if let Some(update) = update {
            let _ = self.lower_expression(update)?;
        }
        let fresh = self.lower_for_test(test)?;
        self.emit(Operation::Reassign, vec![guard, fresh]);
        self.tracker.pop_scope();

        self.emit(Operation::EndWhile, vec![]);
        self.tracker.pop_scope();
        Ok(())
    }

    fn lower_for_test(&mut self,
                      test: Option<&ast::SpannedExpression>)
                      -> CompileResult<Variable> {
        match test {
            Some(expr) => self.lower_expression(expr),
            // for(;;) runs until something breaks
            None => self.emit_output(Operation::LdBool(true), vec![]),
        }
    }

    fn lower_for_in_statement(&mut self,
                              head: &ast::ForInit,
                              object: &ast::SpannedExpression,
                              body: &ast::SpannedStatement,
                              of: bool)
                              -> CompileResult<()> {
        let name = self.for_loop_binding_name(head)?;
        let object_var = self.lower_expression(object)?;

        // the loop form defines one variable per iteration; the source's
        // bound name aliases it for the duration of the body
        let loop_var = self.tracker.fresh_variable()?;
        let begin = if of {
            Operation::BeginForOf
        } else {
            Operation::BeginForIn
        };
        self.emit(begin, vec![object_var, loop_var]);

        self.tracker.push_scope();
        self.tracker.bind(&name, loop_var);
        self.lower_statement(body)?;
        self.tracker.pop_scope();

        let end = if of {
            Operation::EndForOf
        } else {
            Operation::EndForIn
        };
        self.emit(end, vec![]);
        Ok(())
    }

    fn for_loop_binding_name(&self, head: &ast::ForInit) -> CompileResult<String> {
        match *head {
            ast::ForInit::VarDec(ref decl) => {
                let declarators = match decl.data {
                    ast::Declaration::Variable(ref declarators) => declarators,
                    ref other => {
                        malformed!("for-in/for-of head is not a variable declaration: {:?}",
                                   other)
                    }
                };
                if declarators.len() != 1 {
                    unsupported!("multiple declarators in a for-in/for-of head: {:?}",
                                 declarators);
                }
                let declarator = &declarators[0];
                if declarator.initial_value.is_some() {
                    unsupported!("initializer in a for-in/for-of head: {:?}", declarator);
                }
                let ast::Pattern::Identifier(ref ident) = declarator.id.data;
                Ok(ident.data.clone())
            }
            ast::ForInit::Expr(ref expr) => {
                if let ast::Expression::Identifier(ref ident) = expr.data {
                    Ok(ident.data.clone())
                } else {
                    unsupported!("for-in/for-of binding is not a plain identifier: {:?}", expr)
                }
            }
            ast::ForInit::None => malformed!("for-in/for-of loop without a bound name"),
        }
    }

    fn lower_declaration_statement(&mut self, decl: &ast::Declaration) -> CompileResult<()> {
        match *decl {
            ast::Declaration::Variable(ref declarators) => {
                for declarator in declarators {
                    self.lower_variable_declarator(declarator)?;
                }
                Ok(())
            }
            ast::Declaration::Function(ref func) => {
                let name = match func.name {
                    Some(ref name) => &name.data,
                    None => malformed!("function declaration without a name: {:?}", func),
                };
                if self.tracker.is_hoisted(name) {
                    // already lowered eagerly at the top of this body
                    return Ok(());
                }
                let func_var = self.lower_function(func)?;
                self.tracker.bind(name, func_var);
                Ok(())
            }
            ast::Declaration::Class(ref class) => self.lower_class_declaration(class),
        }
    }

    fn lower_variable_declarator(&mut self,
                                 declarator: &ast::VariableDeclarator)
                                 -> CompileResult<()> {
        let ast::Pattern::Identifier(ref ident) = declarator.id.data;
        let name = &ident.data;

        if self.tracker.is_hoisted(name) {
            // the binding already exists as a pre-declared undefined;
            // an initializer overwrites it in place
            if let Some(ref init) = declarator.initial_value {
                let value = self.lower_expression(init)?;
                let target = match self.tracker.lookup(name) {
                    Some(var) => var,
                    None => malformed!("hoisted name {} has no binding", name),
                };
                self.emit(Operation::Reassign, vec![target, value]);
            }
            return Ok(());
        }

        let value = match declarator.initial_value {
            Some(ref init) => self.lower_expression(init)?,
            None => self.emit_output(Operation::LdUndefined, vec![])?,
        };
        self.tracker.bind(name, value);
        Ok(())
    }

    /// Lowers a class declaration: the constructor (or an empty function)
    /// becomes the class object, and each method is a plain function
    /// definition stored onto the class's prototype object.
    fn lower_class_declaration(&mut self, class: &ast::ClassDeclaration) -> CompileResult<()> {
        let class_var = match class.constructor {
            Some(ref constructor) => self.lower_function(constructor)?,
            None => {
                let func_var = self.tracker.fresh_variable()?;
                self.emit(Operation::BeginFunction, vec![func_var]);
                self.emit(Operation::EndFunction, vec![]);
                func_var
            }
        };

        let prototype = self.emit_output(Operation::GetProperty("prototype".to_string()),
                                         vec![class_var])?;
        for method in &class.methods {
            let method_var = self.lower_function(&method.function)?;
            self.emit(Operation::PutProperty(method.name.data.clone()),
                      vec![prototype, method_var]);
        }

        self.tracker.bind(&class.name.data, class_var);
        Ok(())
    }

    fn lower_function(&mut self, func: &ast::Function) -> CompileResult<Variable> {
        debug!(target: "compile", "lowering function {:?} with {} parameters",
               func.name.as_ref().map(|name| name.data.as_str()),
               func.parameters.len());

        let func_var = self.tracker.fresh_variable()?;
        self.tracker.push_scope();
        if let Some(ref name) = func.name {
            // a function expression can call itself through its name
            self.tracker.bind(&name.data, func_var);
        }

        let mut inouts = vec![func_var];
        for param in &func.parameters {
            let ast::Pattern::Identifier(ref ident) = param.data;
            let param_var = self.tracker.fresh_variable()?;
            self.tracker.bind(&ident.data, param_var);
            inouts.push(param_var);
        }
        self.emit(Operation::BeginFunction, inouts);

        let saved = self.tracker.replace_hoisted(HashSet::new());
        let result = self.lower_body(&func.body);
        let _ = self.tracker.replace_hoisted(saved);
        self.tracker.pop_scope();
        result?;

        self.emit(Operation::EndFunction, vec![]);
        Ok(func_var)
    }

    fn lower_expression(&mut self, expr: &ast::SpannedExpression) -> CompileResult<Variable> {
        match expr.data {
            ast::Expression::This => {
                self.emit_output(Operation::LdBuiltin("this".to_string()), vec![])
            }
            ast::Expression::Literal(ref literal) => self.lower_literal(literal, expr),
            ast::Expression::Identifier(ref ident) => self.lower_identifier(&ident.data),
            ast::Expression::Array(ref elements) => self.lower_array_literal(elements),
            ast::Expression::Object(ref entries) => self.lower_object_literal(entries),
            ast::Expression::Function(ref func) => self.lower_function(func),
            ast::Expression::Unary(op, ref operand) => self.lower_unary_op(op, operand),
            ast::Expression::Update(op, prefix, ref target) => {
                self.lower_update_op(op, prefix, target)
            }
            ast::Expression::Binary(op, ref left, ref right) => {
                self.lower_binary_op(op, left, right)
            }
            ast::Expression::Logical(op, ref left, ref right) => {
                self.lower_logical_op(op, left, right)
            }
            ast::Expression::Assignment(op, ref target, ref value) => {
                self.lower_assignment(op, target, value)
            }
            ast::Expression::Member(ref base, ref target, computed) => {
                self.lower_member_expression(base, target, computed)
            }
            ast::Expression::Conditional(ref test, ref consequent, ref alternate) => {
                self.lower_conditional_expression(test, consequent, alternate)
            }
            ast::Expression::Call(ref callee, ref arguments) => {
                self.lower_call_expression(callee, arguments)
            }
            ast::Expression::New(ref callee, ref arguments) => {
                self.lower_new_expression(callee, arguments)
            }
            ast::Expression::Sequence(ref expressions) => self.lower_sequence(expressions),
        }
    }

    fn lower_literal(&mut self,
                     literal: &ast::Literal,
                     expr: &ast::SpannedExpression)
                     -> CompileResult<Variable> {
        // 2^63 as a float; everything in [-2^63, 2^63) narrows to i64
        const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

        match *literal {
            ast::Literal::String(ref value) => {
                self.emit_output(Operation::LdString(value.clone()), vec![])
            }
            ast::Literal::Boolean(value) => {
                self.emit_output(Operation::LdBool(value), vec![])
            }
            ast::Literal::Null => self.emit_output(Operation::LdNull, vec![]),
            ast::Literal::Numeric(value, integral) => {
                if integral && value.fract() == 0.0 && value >= -I64_LIMIT && value < I64_LIMIT {
                    self.emit_output(Operation::LdInt(value as i64), vec![])
                } else {
                    self.emit_output(Operation::LdFloat(value), vec![])
                }
            }
            ast::Literal::BigInt(value) => {
                if value.fract().abs() < f64::EPSILON && value >= -I64_LIMIT && value < I64_LIMIT {
                    self.emit_output(Operation::LdBigInt(value as i64), vec![])
                } else {
                    unsupported!("BigInt literal outside the 64-bit range: {:?}", expr)
                }
            }
            ast::Literal::RegExp(ref pattern, ref flags) => {
                self.emit_output(Operation::LdRegex(pattern.clone(), flags.clone()), vec![])
            }
        }
    }

    /// Resolves an identifier read. Scoped bindings win; the rest are
    /// free identifiers resolved against the literal special cases, the
    /// recognized-global tables, and the placeholder policy.
    fn lower_identifier(&mut self, name: &str) -> CompileResult<Variable> {
        if let Some(var) = self.tracker.lookup(name) {
            return Ok(var);
        }

        match name {
            "undefined" => return self.emit_output(Operation::LdUndefined, vec![]),
            "Infinity" => {
                return self.emit_output(Operation::LdFloat(f64::INFINITY), vec![])
            }
            _ => {}
        }

        if !self.tracker.emit_builtins() {
            unsupported!("free identifier {} with builtin loads disabled", name);
        }

        let stripped = name.strip_prefix('%');
        let recognized = match stripped {
            Some(native) => self.tracker.include_v8_natives() && builtins::is_v8_native(native),
            None => builtins::is_recognized_global(name),
        };
        let load_name = stripped.unwrap_or(name);

        if recognized || !self.tracker.use_placeholder() {
            debug!(target: "compile", "resolving free identifier {} as a builtin", load_name);
            self.emit_output(Operation::LdBuiltin(load_name.to_string()), vec![])
        } else {
            debug!(target: "compile", "replacing free identifier {} with the placeholder", name);
            self.emit_output(Operation::LdBuiltin(builtins::PLACEHOLDER.to_string()), vec![])
        }
    }

    fn lower_array_literal(&mut self, elements: &[ast::ArrayElement]) -> CompileResult<Variable> {
        let mut values = vec![];
        let mut spreads = vec![];
        let mut any_spread = false;
        for element in elements {
            match *element {
                ast::ArrayElement::Elision => {
                    values.push(self.emit_output(Operation::LdUndefined, vec![])?);
                    spreads.push(false);
                }
                ast::ArrayElement::Element(ref expr) => {
                    values.push(self.lower_expression(expr)?);
                    spreads.push(false);
                }
                ast::ArrayElement::Spread(ref expr) => {
                    values.push(self.lower_expression(expr)?);
                    spreads.push(true);
                    any_spread = true;
                }
            }
        }

        if any_spread {
            self.emit_output(Operation::CreateArrayWithSpread(spreads), values)
        } else {
            self.emit_output(Operation::CreateArray, values)
        }
    }

    fn lower_object_literal(&mut self, entries: &[ast::ObjectEntry]) -> CompileResult<Variable> {
        let mut names = vec![];
        let mut values = vec![];
        let mut spreads = vec![];
        let mut any_spread = false;
        for entry in entries {
            match *entry {
                ast::ObjectEntry::Property(ref property) => {
                    if property.kind != ast::PropertyKind::Init {
                        unsupported!("getter/setter property: {:?}", property);
                    }
                    names.push(self.property_key_name(&property.key)?);
                    values.push(self.lower_expression(&property.value)?);
                    spreads.push(false);
                }
                ast::ObjectEntry::Spread(ref expr) => {
                    values.push(self.lower_expression(expr)?);
                    spreads.push(true);
                    any_spread = true;
                }
            }
        }

        if any_spread {
            self.emit_output(Operation::CreateObjectWithSpread(names, spreads), values)
        } else {
            self.emit_output(Operation::CreateObject(names), values)
        }
    }

    fn property_key_name(&self, key: &ast::LiteralOrIdentifier) -> CompileResult<String> {
        match *key {
            ast::LiteralOrIdentifier::Identifier(ref ident) => Ok(ident.data.clone()),
            ast::LiteralOrIdentifier::Literal(ref literal) => {
                match literal.data {
                    ast::Literal::String(ref value) => Ok(value.clone()),
                    // null is both a reserved word and a legal property
                    // name; the engines agree on accepting it
                    ast::Literal::Null => Ok("null".to_string()),
                    ast::Literal::Numeric(value, _) => Ok(value.to_string()),
                    ref other => {
                        malformed!("literal {:?} is not a legal property name", other)
                    }
                }
            }
        }
    }

    fn lower_unary_op(&mut self,
                      op: ast::UnaryOperator,
                      operand: &ast::SpannedExpression)
                      -> CompileResult<Variable> {
        let operator = match op {
            ast::UnaryOperator::Typeof => {
                let value = self.lower_expression(operand)?;
                return self.emit_output(Operation::TypeOf, vec![value]);
            }
            ast::UnaryOperator::Void => {
                // evaluate for effect, produce a fresh undefined
                let _ = self.lower_expression(operand)?;
                return self.emit_output(Operation::LdUndefined, vec![]);
            }
            ast::UnaryOperator::Delete => return self.lower_delete(operand),
            ast::UnaryOperator::Minus => UnaryOperator::Minus,
            ast::UnaryOperator::Plus => UnaryOperator::Plus,
            ast::UnaryOperator::LogicalNot => UnaryOperator::LogicalNot,
            ast::UnaryOperator::BitwiseNot => UnaryOperator::BitwiseNot,
        };

        let value = self.lower_expression(operand)?;
        self.emit_output(Operation::UnaryOp(operator), vec![value])
    }

    fn lower_delete(&mut self, target: &ast::SpannedExpression) -> CompileResult<Variable> {
        match target.data {
            ast::Expression::Member(ref base, ref property, false) => {
                let object = self.lower_expression(base)?;
                let name = self.member_property_name(property)?;
                self.emit_output(Operation::DeleteProperty(name), vec![object])
            }
            ast::Expression::Member(ref base, ref key, true) => {
                let object = self.lower_expression(base)?;
                let key_var = self.lower_expression(key)?;
                self.emit_output(Operation::DeleteElement, vec![object, key_var])
            }
            // the IL has no unqualified delete; a bare identifier cannot
            // be expressed
            _ => unsupported!("delete of a non-property expression: {:?}", target),
        }
    }

    fn lower_update_op(&mut self,
                       op: ast::UpdateOperator,
                       prefix: bool,
                       target: &ast::SpannedExpression)
                       -> CompileResult<Variable> {
        let operator = match op {
            ast::UpdateOperator::Increment => BinaryOperator::Add,
            ast::UpdateOperator::Decrement => BinaryOperator::Sub,
        };

        match target.data {
            ast::Expression::Identifier(ref ident) => {
                let name = ident.data.clone();
                if let Some(var) = self.tracker.lookup(&name) {
                    // the postfix result is the value before the rebind,
                    // which has to be copied out before it is clobbered
                    let old = if prefix {
                        None
                    } else {
                        Some(self.emit_output(Operation::Dup, vec![var])?)
                    };
                    let one = self.emit_output(Operation::LdInt(1), vec![])?;
                    let new = self.emit_output(Operation::BinaryOp(operator), vec![var, one])?;
                    self.emit(Operation::Reassign, vec![var, new]);
                    Ok(if prefix { new } else { old.unwrap() })
                } else {
                    let old = self.lower_identifier(&name)?;
                    let one = self.emit_output(Operation::LdInt(1), vec![])?;
                    let new = self.emit_output(Operation::BinaryOp(operator), vec![old, one])?;
                    let bound = self.emit_output(Operation::Dup, vec![new])?;
                    self.tracker.bind(&name, bound);
                    Ok(if prefix { new } else { old })
                }
            }
            ast::Expression::Member(ref base, ref property, false) => {
                let object = self.lower_expression(base)?;
                let name = self.member_property_name(property)?;
                let old = self.emit_output(Operation::GetProperty(name.clone()), vec![object])?;
                let one = self.emit_output(Operation::LdInt(1), vec![])?;
                let new = self.emit_output(Operation::BinaryOp(operator), vec![old, one])?;
                self.emit(Operation::PutProperty(name), vec![object, new]);
                Ok(if prefix { new } else { old })
            }
            ast::Expression::Member(ref base, ref key, true) => {
                let object = self.lower_expression(base)?;
                let key_var = self.lower_expression(key)?;
                let old = self.emit_output(Operation::GetElement, vec![object, key_var])?;
                let one = self.emit_output(Operation::LdInt(1), vec![])?;
                let new = self.emit_output(Operation::BinaryOp(operator), vec![old, one])?;
                self.emit(Operation::PutElement, vec![object, key_var, new]);
                Ok(if prefix { new } else { old })
            }
            _ => malformed!("update of a non-reference expression: {:?}", target),
        }
    }

    fn lower_binary_op(&mut self,
                       op: ast::BinaryOperator,
                       left: &ast::SpannedExpression,
                       right: &ast::SpannedExpression)
                       -> CompileResult<Variable> {
        let left_var = self.lower_expression(left)?;
        let right_var = self.lower_expression(right)?;

        match op {
            ast::BinaryOperator::In => {
                self.emit_output(Operation::In, vec![left_var, right_var])
            }
            ast::BinaryOperator::Instanceof => {
                self.emit_output(Operation::InstanceOf, vec![left_var, right_var])
            }
            _ => {
                let operator = binary_operator(op);
                self.emit_output(Operation::BinaryOp(operator), vec![left_var, right_var])
            }
        }
    }

    fn lower_logical_op(&mut self,
                        op: ast::LogicalOperator,
                        left: &ast::SpannedExpression,
                        right: &ast::SpannedExpression)
                        -> CompileResult<Variable> {
        // the IL's logical operators do not short-circuit; both sides are
        // always evaluated
        let operator = match op {
            ast::LogicalOperator::And => BinaryOperator::LogicAnd,
            ast::LogicalOperator::Or => BinaryOperator::LogicOr,
        };
        let left_var = self.lower_expression(left)?;
        let right_var = self.lower_expression(right)?;
        self.emit_output(Operation::BinaryOp(operator), vec![left_var, right_var])
    }

    fn lower_assignment(&mut self,
                        op: ast::AssignmentOperator,
                        target: &ast::PatternOrExpression,
                        value: &ast::SpannedExpression)
                        -> CompileResult<Variable> {
        if op == ast::AssignmentOperator::Equal {
            return self.lower_plain_assignment(target, value);
        }

        let operator = assignment_operator(op);
        // compound assignment evaluates the right-hand side first
        let rhs = self.lower_expression(value)?;

        match *target {
            ast::PatternOrExpression::Pattern(ref pattern) => {
                let ast::Pattern::Identifier(ref ident) = pattern.data;
                let name = ident.data.clone();
                if let Some(var) = self.tracker.lookup(&name) {
                    let new = self.emit_output(Operation::BinaryOp(operator), vec![var, rhs])?;
                    self.emit(Operation::Reassign, vec![var, new]);
                    Ok(new)
                } else {
                    // assignment to an undeclared identifier creates the
                    // binding; the combined value gets its own variable
                    let old = self.lower_identifier(&name)?;
                    let new = self.emit_output(Operation::BinaryOp(operator), vec![old, rhs])?;
                    let bound = self.emit_output(Operation::Dup, vec![new])?;
                    self.tracker.bind(&name, bound);
                    Ok(new)
                }
            }
            ast::PatternOrExpression::Expr(ref target_expr) => {
                match target_expr.data {
                    ast::Expression::Member(ref base, ref property, false) => {
                        let object = self.lower_expression(base)?;
                        let name = self.member_property_name(property)?;
                        let old = self.emit_output(Operation::GetProperty(name.clone()),
                                                   vec![object])?;
                        let new = self.emit_output(Operation::BinaryOp(operator),
                                                   vec![old, rhs])?;
                        self.emit(Operation::PutProperty(name), vec![object, new]);
                        Ok(new)
                    }
                    ast::Expression::Member(ref base, ref key, true) => {
                        let object = self.lower_expression(base)?;
                        let key_var = self.lower_expression(key)?;
                        let old = self.emit_output(Operation::GetElement,
                                                   vec![object, key_var])?;
                        let new = self.emit_output(Operation::BinaryOp(operator),
                                                   vec![old, rhs])?;
                        self.emit(Operation::PutElement, vec![object, key_var, new]);
                        Ok(new)
                    }
                    _ => {
                        malformed!("assignment target is neither an identifier nor a member \
                                    expression: {:?}",
                                   target_expr)
                    }
                }
            }
        }
    }

    fn lower_plain_assignment(&mut self,
                              target: &ast::PatternOrExpression,
                              value: &ast::SpannedExpression)
                              -> CompileResult<Variable> {
        match *target {
            ast::PatternOrExpression::Pattern(ref pattern) => {
                let ast::Pattern::Identifier(ref ident) = pattern.data;
                let name = ident.data.clone();
                let value_var = self.lower_expression(value)?;
                if let Some(var) = self.tracker.lookup(&name) {
                    self.emit(Operation::Reassign, vec![var, value_var]);
                } else {
                    let bound = self.emit_output(Operation::Dup, vec![value_var])?;
                    self.tracker.bind(&name, bound);
                }
                Ok(value_var)
            }
            ast::PatternOrExpression::Expr(ref target_expr) => {
                match target_expr.data {
                    ast::Expression::Member(ref base, ref property, false) => {
                        let object = self.lower_expression(base)?;
                        let name = self.member_property_name(property)?;
                        let value_var = self.lower_expression(value)?;
                        self.emit(Operation::PutProperty(name), vec![object, value_var]);
                        Ok(value_var)
                    }
                    ast::Expression::Member(ref base, ref key, true) => {
                        let object = self.lower_expression(base)?;
                        let key_var = self.lower_expression(key)?;
                        let value_var = self.lower_expression(value)?;
                        self.emit(Operation::PutElement, vec![object, key_var, value_var]);
                        Ok(value_var)
                    }
                    _ => {
                        malformed!("assignment target is neither an identifier nor a member \
                                    expression: {:?}",
                                   target_expr)
                    }
                }
            }
        }
    }

    fn lower_member_expression(&mut self,
                               base: &ast::SpannedExpression,
                               target: &ast::SpannedExpression,
                               computed: bool)
                               -> CompileResult<Variable> {
        let object = self.lower_expression(base)?;
        if computed {
            let key_var = self.lower_expression(target)?;
            self.emit_output(Operation::GetElement, vec![object, key_var])
        } else {
            let name = self.member_property_name(target)?;
            self.emit_output(Operation::GetProperty(name), vec![object])
        }
    }

    fn member_property_name(&self, property: &ast::SpannedExpression) -> CompileResult<String> {
        if let ast::Expression::Identifier(ref ident) = property.data {
            Ok(ident.data.clone())
        } else {
            malformed!("non-computed member access with a non-identifier property: {:?}",
                       property)
        }
    }

    fn lower_conditional_expression(&mut self,
                                    test: &ast::SpannedExpression,
                                    consequent: &ast::SpannedExpression,
                                    alternate: &ast::SpannedExpression)
                                    -> CompileResult<Variable> {
        // the result variable has to exist before either branch so both
        // can write into it; a throwaway integer load creates it
        let result = self.emit_output(Operation::LdInt(0), vec![])?;
        let test_var = self.lower_expression(test)?;

        self.emit(Operation::BeginIf, vec![test_var]);
        let consequent_var = self.lower_expression(consequent)?;
        self.emit(Operation::Reassign, vec![result, consequent_var]);
        self.emit(Operation::BeginElse, vec![]);
        let alternate_var = self.lower_expression(alternate)?;
        self.emit(Operation::Reassign, vec![result, alternate_var]);
        self.emit(Operation::EndIf, vec![]);

        Ok(result)
    }

    fn lower_call_expression(&mut self,
                             callee: &ast::SpannedExpression,
                             arguments: &[ast::Argument])
                             -> CompileResult<Variable> {
        match callee.data {
            ast::Expression::Member(ref base, ref property, false) => {
                // x.m(...) passes x as the receiver
                let object = self.lower_expression(base)?;
                let name = self.member_property_name(property)?;
                let (argument_vars, spreads, any_spread) = self.lower_arguments(arguments)?;
                let mut inputs = vec![object];
                inputs.extend(argument_vars);
                if any_spread {
                    self.emit_output(Operation::CallMethodWithSpread(name, spreads), inputs)
                } else {
                    self.emit_output(Operation::CallMethod(name), inputs)
                }
            }
            ast::Expression::Member(ref base, ref key, true) => {
                // x[k](...) loads the property and calls it as a plain
                // function
                let object = self.lower_expression(base)?;
                let key_var = self.lower_expression(key)?;
                let callee_var = self.emit_output(Operation::GetElement,
                                                  vec![object, key_var])?;
                self.lower_plain_call(callee_var, arguments)
            }
            _ => {
                let callee_var = self.lower_expression(callee)?;
                self.lower_plain_call(callee_var, arguments)
            }
        }
    }

    fn lower_plain_call(&mut self,
                        callee_var: Variable,
                        arguments: &[ast::Argument])
                        -> CompileResult<Variable> {
        let (argument_vars, spreads, any_spread) = self.lower_arguments(arguments)?;
        let mut inputs = vec![callee_var];
        inputs.extend(argument_vars);
        if any_spread {
            self.emit_output(Operation::CallWithSpread(spreads), inputs)
        } else {
            self.emit_output(Operation::Call, inputs)
        }
    }

    fn lower_new_expression(&mut self,
                            callee: &ast::SpannedExpression,
                            arguments: &[ast::Argument])
                            -> CompileResult<Variable> {
        if arguments.iter().any(|argument| argument.is_spread) {
            unsupported!("spread argument in a new expression: {:?}", callee);
        }

        let callee_var = self.lower_expression(callee)?;
        let (argument_vars, _, _) = self.lower_arguments(arguments)?;
        let mut inputs = vec![callee_var];
        inputs.extend(argument_vars);
        self.emit_output(Operation::New, inputs)
    }

    fn lower_arguments(&mut self,
                       arguments: &[ast::Argument])
                       -> CompileResult<(Vec<Variable>, Vec<bool>, bool)> {
        let mut vars = vec![];
        let mut spreads = vec![];
        let mut any_spread = false;
        for argument in arguments {
            vars.push(self.lower_expression(&argument.value)?);
            spreads.push(argument.is_spread);
            any_spread = any_spread || argument.is_spread;
        }
        Ok((vars, spreads, any_spread))
    }

    fn lower_sequence(&mut self,
                      expressions: &[ast::SpannedExpression])
                      -> CompileResult<Variable> {
        let mut last = None;
        for expr in expressions {
            last = Some(self.lower_expression(expr)?);
        }
        match last {
            Some(var) => Ok(var),
            None => malformed!("empty sequence expression"),
        }
    }
}

fn binary_operator(op: ast::BinaryOperator) -> BinaryOperator {
    match op {
        ast::BinaryOperator::Equal => BinaryOperator::Equal,
        ast::BinaryOperator::NotEqual => BinaryOperator::NotEqual,
        ast::BinaryOperator::StrictEqual => BinaryOperator::StrictEqual,
        ast::BinaryOperator::StrictNotEqual => BinaryOperator::StrictNotEqual,
        ast::BinaryOperator::GreaterThan => BinaryOperator::GreaterThan,
        ast::BinaryOperator::GreaterThanEq => BinaryOperator::GreaterThanEq,
        ast::BinaryOperator::LessThan => BinaryOperator::LessThan,
        ast::BinaryOperator::LessThanEq => BinaryOperator::LessThanEq,
        ast::BinaryOperator::LeftShift => BinaryOperator::LShift,
        ast::BinaryOperator::RightShift => BinaryOperator::RShift,
        ast::BinaryOperator::TripleRightShift => BinaryOperator::UnsignedRShift,
        ast::BinaryOperator::Plus => BinaryOperator::Add,
        ast::BinaryOperator::Minus => BinaryOperator::Sub,
        ast::BinaryOperator::Times => BinaryOperator::Mul,
        ast::BinaryOperator::Div => BinaryOperator::Div,
        ast::BinaryOperator::Mod => BinaryOperator::Mod,
        ast::BinaryOperator::BitwiseOr => BinaryOperator::BitOr,
        ast::BinaryOperator::BitwiseXor => BinaryOperator::BitXor,
        ast::BinaryOperator::BitwiseAnd => BinaryOperator::BitAnd,
        // handled as dedicated operations before the mapping
        ast::BinaryOperator::In | ast::BinaryOperator::Instanceof => {
            unreachable!("{:?} does not map onto a binary operation", op)
        }
    }
}

fn assignment_operator(op: ast::AssignmentOperator) -> BinaryOperator {
    match op {
        ast::AssignmentOperator::Equal => {
            unreachable!("plain assignment is not a compound operator")
        }
        ast::AssignmentOperator::PlusEqual => BinaryOperator::Add,
        ast::AssignmentOperator::MinusEqual => BinaryOperator::Sub,
        ast::AssignmentOperator::TimesEqual => BinaryOperator::Mul,
        ast::AssignmentOperator::DivEqual => BinaryOperator::Div,
        ast::AssignmentOperator::ModEqual => BinaryOperator::Mod,
        ast::AssignmentOperator::LeftShiftEqual => BinaryOperator::LShift,
        ast::AssignmentOperator::RightShiftEqual => BinaryOperator::RShift,
        ast::AssignmentOperator::TripleRightShiftEqual => BinaryOperator::UnsignedRShift,
        ast::AssignmentOperator::BitwiseOrEqual => BinaryOperator::BitOr,
        ast::AssignmentOperator::BitwiseXorEqual => BinaryOperator::BitXor,
        ast::AssignmentOperator::BitwiseAndEqual => BinaryOperator::BitAnd,
    }
}

/// Finds the declaration of a hoisted function by name, descending into
/// nested statements but never into nested function bodies (their
/// declarations belong to their own hoisting pass).
fn find_function_declaration<'a>(statements: &'a [ast::SpannedStatement],
                                 name: &str)
                                 -> Option<&'a ast::Function> {
    for stmt in statements {
        if let Some(func) = find_in_statement(stmt, name) {
            return Some(func);
        }
    }
    None
}

fn find_in_statement<'a>(stmt: &'a ast::SpannedStatement,
                         name: &str)
                         -> Option<&'a ast::Function> {
    match stmt.data {
        ast::Statement::Declaration(ast::Declaration::Function(ref func)) => {
            match func.name {
                Some(ref func_name) if func_name.data == name => Some(func),
                _ => None,
            }
        }
        ast::Statement::Block(ref stmts) => find_function_declaration(stmts, name),
        ast::Statement::If(_, ref consequent, ref alternate) => {
            find_in_statement(consequent, name).or_else(|| {
                alternate.as_ref().and_then(|alt| find_in_statement(alt, name))
            })
        }
        ast::Statement::While(_, ref body) |
        ast::Statement::DoWhile(_, ref body) |
        ast::Statement::With(_, ref body) |
        ast::Statement::Label(_, ref body) |
        ast::Statement::For(_, _, _, ref body) |
        ast::Statement::ForIn(_, _, ref body) |
        ast::Statement::ForOf(_, _, ref body) => find_in_statement(body, name),
        ast::Statement::Try(ref body, ref catch, ref finally) => {
            find_in_statement(body, name)
                .or_else(|| {
                    catch.as_ref().and_then(|catch| find_in_statement(&catch.body, name))
                })
                .or_else(|| {
                    finally.as_ref().and_then(|finally| find_in_statement(finally, name))
                })
        }
        ast::Statement::Switch(_, ref cases) => {
            for case in cases {
                if let Some(func) = find_function_declaration(&case.body, name) {
                    return Some(func);
                }
            }
            None
        }
        _ => None,
    }
}
