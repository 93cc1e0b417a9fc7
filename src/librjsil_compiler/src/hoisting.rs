//! Static hoisting analysis.
//!
//! JavaScript gives `var` and function declarations function-wide scope:
//! a binding introduced inside a conditionally executed block is visible
//! to every other statement of the enclosing function, before and after
//! its lexical position. The translator models scopes as a plain stack of
//! frames, so any binding that has to outlive the block that introduces
//! it must be created up front. This module computes, for one function
//! (or program) body, exactly which names those are.
//!
//! The analysis is a single bottom-up pass; no fixed point is needed.
//! Every AST node produces a [`UseData`] record of five name sets (plus
//! the parallel sets for function declarations, which hoist their whole
//! definition rather than an `undefined` placeholder). Parents combine
//! their children's records with one of two combinators:
//!
//! * sequential combination, for statements executed one after another at
//!   the same nesting level. This is where cross-statement hoisting is
//!   detected: a name used by one sibling while only *conditionally*
//!   declared by another (in either order) must be pre-declared.
//! * nested combination, a plain union, for sub-results that are not
//!   independent siblings (e.g. the operands of one expression).
//!
//! Constructs whose body may not run, or may run a variable number of
//! times, apply [`leave_conditional`] on exit so that their unconditional
//! declares are seen as conditional by the enclosing statement list.
//! Function boundaries discard bound names entirely and let only free
//! uses escape to the enclosing body's analysis.

use librjsil_syntax::ast;
use std::collections::HashSet;
use std::mem;

/// The per-node working record of the analysis.
#[derive(Clone, Debug, Default)]
struct UseData {
    /// Names bound on every execution path through the node.
    declares: HashSet<String>,
    /// Names bound only on some execution path.
    cond_declares: HashSet<String>,
    /// Names bound by a function declaration on every path.
    func_declares: HashSet<String>,
    /// Names bound by a function declaration on some path.
    cond_func_declares: HashSet<String>,
    /// Names referenced by the node.
    uses: HashSet<String>,
    /// Names proven to need a function-level `undefined` pre-declaration.
    to_hoist: HashSet<String>,
    /// Names proven to need their function definition lowered up front.
    funcs_to_hoist: HashSet<String>,
}

/// The analyzer's verdict for one body: the two disjoint sets of names to
/// pre-declare, in deterministic (sorted) order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HoistedNames {
    pub variables: Vec<String>,
    pub functions: Vec<String>,
}

/// Runs the analysis over a function or program body.
pub fn analyze(statements: &[ast::SpannedStatement]) -> HoistedNames {
    let mut acc = UseData::default();
    for stmt in statements {
        acc = combine_sequential(acc, statement_use_data(stmt));
    }

    let mut functions: Vec<String> = acc.funcs_to_hoist.iter().cloned().collect();
    functions.sort();
    let mut variables: Vec<String> = acc.to_hoist
        .difference(&acc.funcs_to_hoist)
        .cloned()
        .collect();
    variables.sort();

    trace!(target: "hoisting", "hoisting {} variables, {} functions",
           variables.len(), functions.len());
    HoistedNames {
        variables: variables,
        functions: functions,
    }
}

/// Combines the records of two sequential siblings, detecting the
/// cross-statement hoisting cases.
fn combine_sequential(first: UseData, second: UseData) -> UseData {
    let cross_vars: Vec<String> = first.uses
        .intersection(&second.cond_declares)
        .chain(second.uses.intersection(&first.cond_declares))
        .cloned()
        .collect();
    let cross_funcs: Vec<String> = first.uses
        .intersection(&second.cond_func_declares)
        .chain(second.uses.intersection(&first.cond_func_declares))
        .cloned()
        .collect();

    let mut combined = combine_nested(first, second);
    combined.to_hoist.extend(cross_vars);
    combined.funcs_to_hoist.extend(cross_funcs);
    combined
}

/// Plain set union of two records, without cross-statement detection. A
/// conditional declare superseded by an unconditional one is dropped.
fn combine_nested(mut first: UseData, second: UseData) -> UseData {
    first.declares.extend(second.declares);
    first.func_declares.extend(second.func_declares);
    first.cond_declares.extend(second.cond_declares);
    first.cond_func_declares.extend(second.cond_func_declares);
    first.uses.extend(second.uses);
    first.to_hoist.extend(second.to_hoist);
    first.funcs_to_hoist.extend(second.funcs_to_hoist);

    let mut cond = mem::take(&mut first.cond_declares);
    cond.retain(|name| !first.declares.contains(name));
    first.cond_declares = cond;

    let mut cond_funcs = mem::take(&mut first.cond_func_declares);
    cond_funcs.retain(|name| !first.func_declares.contains(name));
    first.cond_func_declares = cond_funcs;

    first
}

/// Marks every unconditional declare of a record as conditional. Applied
/// when leaving a construct whose body may not execute.
fn leave_conditional(mut data: UseData) -> UseData {
    let declares = mem::take(&mut data.declares);
    data.cond_declares.extend(declares);
    let funcs = mem::take(&mut data.func_declares);
    data.cond_func_declares.extend(funcs);
    data
}

fn statement_use_data(stmt: &ast::SpannedStatement) -> UseData {
    match stmt.data {
        ast::Statement::Expression(ref expr) => expression_use_data(expr),
        ast::Statement::Block(ref stmts) => {
            let mut acc = UseData::default();
            for stmt in stmts {
                acc = combine_sequential(acc, statement_use_data(stmt));
            }
            acc
        }
        ast::Statement::Empty | ast::Statement::Debugger => UseData::default(),
        ast::Statement::With(ref obj, ref body) => {
            let data = combine_sequential(expression_use_data(obj), statement_use_data(body));
            leave_conditional(data)
        }
        ast::Statement::Return(ref expr) => expr.as_ref()
            .map(expression_use_data)
            .unwrap_or_default(),
        ast::Statement::Label(_, ref body) => statement_use_data(body),
        ast::Statement::Break(_) | ast::Statement::Continue(_) => UseData::default(),
        ast::Statement::If(ref test, ref consequent, ref alternate) => {
            // each branch is conditional on its own; combining the two
            // already-conditional records sequentially catches a name
            // declared in one branch and used in the other. The test
            // always executes, so its record stays unconditional.
            let mut branches = leave_conditional(statement_use_data(consequent));
            if let Some(ref alternate) = *alternate {
                branches = combine_sequential(branches,
                                              leave_conditional(statement_use_data(alternate)));
            }
            combine_sequential(expression_use_data(test), branches)
        }
        ast::Statement::Switch(ref test, ref cases) => {
            // no lowering rule exists for switch; the record is still
            // computed conservatively so an enclosing analysis stays
            // sound if translation of a sibling fails later.
            let mut acc = UseData::default();
            for case in cases {
                if let Some(ref case_test) = case.test {
                    acc = combine_sequential(acc, expression_use_data(case_test));
                }
                for stmt in &case.body {
                    acc = combine_sequential(acc, statement_use_data(stmt));
                }
            }
            combine_sequential(expression_use_data(test), leave_conditional(acc))
        }
        ast::Statement::Throw(ref expr) => expression_use_data(expr),
        ast::Statement::Try(ref body, ref catch, ref finally) => {
            let mut data = statement_use_data(body);
            if let Some(ref catch) = *catch {
                let mut handler = statement_use_data(&catch.body);
                let ast::Pattern::Identifier(ref ident) = catch.param.data;
                // the parameter is scoped to the handler block
                let _ = handler.uses.remove(&ident.data);
                data = combine_sequential(data, handler);
            }
            if let Some(ref finally) = *finally {
                data = combine_sequential(data, statement_use_data(finally));
            }
            leave_conditional(data)
        }
        ast::Statement::While(ref test, ref body) |
        ast::Statement::DoWhile(ref test, ref body) => {
            let data = combine_sequential(expression_use_data(test),
                                          leave_conditional(statement_use_data(body)));
            leave_conditional(data)
        }
        ast::Statement::For(ref init, ref test, ref update, ref body) => {
            let mut data = match *init {
                Some(ast::ForInit::VarDec(ref decl)) => declaration_use_data(&decl.data),
                Some(ast::ForInit::Expr(ref expr)) => expression_use_data(expr),
                Some(ast::ForInit::None) | None => UseData::default(),
            };
            if let Some(ref test) = *test {
                data = combine_sequential(data, expression_use_data(test));
            }
            if let Some(ref update) = *update {
                data = combine_sequential(data, expression_use_data(update));
            }
            data = combine_sequential(data, leave_conditional(statement_use_data(body)));
            leave_conditional(data)
        }
        ast::Statement::ForIn(ref head, ref object, ref body) |
        ast::Statement::ForOf(ref head, ref object, ref body) => {
            let head_data = match *head {
                ast::ForInit::VarDec(ref decl) => declaration_use_data(&decl.data),
                ast::ForInit::Expr(ref expr) => expression_use_data(expr),
                ast::ForInit::None => UseData::default(),
            };
            let mut data = combine_sequential(head_data, expression_use_data(object));
            data = combine_sequential(data, leave_conditional(statement_use_data(body)));
            leave_conditional(data)
        }
        ast::Statement::Declaration(ref decl) => declaration_use_data(decl),
    }
}

fn declaration_use_data(decl: &ast::Declaration) -> UseData {
    match *decl {
        ast::Declaration::Variable(ref declarators) => {
            let mut data = UseData::default();
            for declarator in declarators {
                if let Some(ref init) = declarator.initial_value {
                    data = combine_nested(data, expression_use_data(init));
                }
                let ast::Pattern::Identifier(ref ident) = declarator.id.data;
                let _ = data.declares.insert(ident.data.clone());
            }
            data
        }
        ast::Declaration::Function(ref func) => {
            let mut data = function_use_data(func);
            if let Some(ref name) = func.name {
                let _ = data.func_declares.insert(name.data.clone());
            }
            data
        }
        ast::Declaration::Class(ref class) => {
            let mut data = UseData::default();
            if let Some(ref constructor) = class.constructor {
                data = combine_nested(data, function_use_data(constructor));
            }
            for method in &class.methods {
                data = combine_nested(data, function_use_data(&method.function));
            }
            // classes do not hoist; the name is an ordinary declaration
            let _ = data.declares.insert(class.name.data.clone());
            data
        }
    }
}

/// The function-boundary transform: declares of any kind stay inside the
/// function, and only uses of names not bound anywhere within it remain
/// visible — those are references to an enclosing scope, and the
/// enclosing body's own analysis must still see them.
fn function_use_data(func: &ast::Function) -> UseData {
    let mut body = UseData::default();
    for stmt in &func.body {
        body = combine_sequential(body, statement_use_data(stmt));
    }

    let mut bound = body.declares;
    bound.extend(body.cond_declares);
    bound.extend(body.func_declares);
    bound.extend(body.cond_func_declares);
    for param in &func.parameters {
        let ast::Pattern::Identifier(ref ident) = param.data;
        let _ = bound.insert(ident.data.clone());
    }
    if let Some(ref name) = func.name {
        let _ = bound.insert(name.data.clone());
    }

    let free: HashSet<String> = body.uses
        .into_iter()
        .filter(|name| !bound.contains(name))
        .collect();
    UseData {
        uses: free,
        ..Default::default()
    }
}

fn expression_use_data(expr: &ast::SpannedExpression) -> UseData {
    match expr.data {
        ast::Expression::This | ast::Expression::Literal(_) => UseData::default(),
        ast::Expression::Identifier(ref ident) => {
            let mut data = UseData::default();
            let _ = data.uses.insert(ident.data.clone());
            data
        }
        ast::Expression::Array(ref elements) => {
            let mut data = UseData::default();
            for element in elements {
                match *element {
                    ast::ArrayElement::Elision => {}
                    ast::ArrayElement::Element(ref expr) |
                    ast::ArrayElement::Spread(ref expr) => {
                        data = combine_nested(data, expression_use_data(expr));
                    }
                }
            }
            data
        }
        ast::Expression::Object(ref entries) => {
            let mut data = UseData::default();
            for entry in entries {
                match *entry {
                    ast::ObjectEntry::Property(ref property) => {
                        data = combine_nested(data, expression_use_data(&property.value));
                    }
                    ast::ObjectEntry::Spread(ref expr) => {
                        data = combine_nested(data, expression_use_data(expr));
                    }
                }
            }
            data
        }
        ast::Expression::Function(ref func) => function_use_data(func),
        ast::Expression::Unary(_, ref operand) => expression_use_data(operand),
        ast::Expression::Update(_, _, ref target) => {
            // an update both reads and writes its target; a write to an
            // undeclared identifier creates the binding like any other
            // implicit assignment
            if let ast::Expression::Identifier(ref ident) = target.data {
                let mut data = UseData::default();
                let _ = data.uses.insert(ident.data.clone());
                let _ = data.declares.insert(ident.data.clone());
                data
            } else {
                expression_use_data(target)
            }
        }
        ast::Expression::Binary(_, ref left, ref right) |
        ast::Expression::Logical(_, ref left, ref right) => {
            combine_nested(expression_use_data(left), expression_use_data(right))
        }
        ast::Expression::Assignment(op, ref target, ref value) => {
            let mut data = expression_use_data(value);
            match *target {
                ast::PatternOrExpression::Pattern(ref pattern) => {
                    let ast::Pattern::Identifier(ref ident) = pattern.data;
                    if op != ast::AssignmentOperator::Equal {
                        let _ = data.uses.insert(ident.data.clone());
                    }
                    // assigning to an identifier with no lexical
                    // declaration binds it, so the analysis treats every
                    // identifier target as a declaration site
                    let _ = data.declares.insert(ident.data.clone());
                }
                ast::PatternOrExpression::Expr(ref target) => {
                    data = combine_nested(data, expression_use_data(target));
                }
            }
            data
        }
        ast::Expression::Member(ref base, ref target, computed) => {
            let data = expression_use_data(base);
            if computed {
                combine_nested(data, expression_use_data(target))
            } else {
                data
            }
        }
        ast::Expression::Conditional(ref test, ref consequent, ref alternate) => {
            let data = combine_nested(expression_use_data(test),
                                      expression_use_data(consequent));
            combine_nested(data, expression_use_data(alternate))
        }
        ast::Expression::Call(ref callee, ref arguments) |
        ast::Expression::New(ref callee, ref arguments) => {
            let mut data = expression_use_data(callee);
            for argument in arguments {
                data = combine_nested(data, expression_use_data(&argument.value));
            }
            data
        }
        ast::Expression::Sequence(ref expressions) => {
            let mut data = UseData::default();
            for expr in expressions {
                data = combine_nested(data, expression_use_data(expr));
            }
            data
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use librjsil_syntax::ast::*;
    use librjsil_syntax::Span;

    fn sp<T: std::fmt::Debug>(data: T) -> Spanned<T> {
        Spanned::new(Span::default(), data)
    }

    fn ident_pattern(name: &str) -> SpannedPattern {
        sp(Pattern::Identifier(sp(name.to_string())))
    }

    fn ident_expr(name: &str) -> SpannedExpression {
        sp(Expression::Identifier(sp(name.to_string())))
    }

    fn number(value: f64) -> SpannedExpression {
        sp(Expression::Literal(Literal::Numeric(value, true)))
    }

    fn var_decl(name: &str, init: Option<SpannedExpression>) -> SpannedStatement {
        sp(Statement::Declaration(Declaration::Variable(vec![VariableDeclarator {
            id: ident_pattern(name),
            initial_value: init,
        }])))
    }

    fn expr_stmt(expr: SpannedExpression) -> SpannedStatement {
        sp(Statement::Expression(expr))
    }

    fn call(callee: &str, args: Vec<SpannedExpression>) -> SpannedExpression {
        sp(Expression::Call(Box::new(ident_expr(callee)),
                            args.into_iter()
                                .map(|value| Argument {
                                    value: value,
                                    is_spread: false,
                                })
                                .collect()))
    }

    fn if_stmt(test: SpannedExpression, body: Vec<SpannedStatement>) -> SpannedStatement {
        sp(Statement::If(test, Box::new(sp(Statement::Block(body))), None))
    }

    fn function_decl(name: &str, body: Vec<SpannedStatement>) -> SpannedStatement {
        sp(Statement::Declaration(Declaration::Function(Function {
            name: Some(sp(name.to_string())),
            parameters: vec![],
            body: body,
        })))
    }

    #[test]
    fn test_conditional_declare_with_sibling_use_hoists() {
        // if (false) { var x = 1; } console.log(x);
        let program = vec![
            if_stmt(sp(Expression::Literal(Literal::Boolean(false))),
                    vec![var_decl("x", Some(number(1.0)))]),
            expr_stmt(sp(Expression::Call(
                Box::new(sp(Expression::Member(Box::new(ident_expr("console")),
                                               Box::new(ident_expr("log")),
                                               false))),
                vec![Argument {
                    value: ident_expr("x"),
                    is_spread: false,
                }],
            ))),
        ];

        let hoisted = analyze(&program);
        assert_eq!(hoisted.variables, vec!["x".to_string()]);
        assert!(hoisted.functions.is_empty());
    }

    #[test]
    fn test_unconditional_declare_does_not_hoist() {
        // var y = 1; console.log(y);
        let program = vec![
            var_decl("y", Some(number(1.0))),
            expr_stmt(call("console", vec![ident_expr("y")])),
        ];

        let hoisted = analyze(&program);
        assert!(hoisted.variables.is_empty(), "y has an ordinary sequential binding");
        assert!(hoisted.functions.is_empty());
    }

    #[test]
    fn test_use_before_conditional_declare_hoists() {
        // f(x); if (c) { var x = 2; }
        let program = vec![
            expr_stmt(call("f", vec![ident_expr("x")])),
            if_stmt(ident_expr("c"), vec![var_decl("x", Some(number(2.0)))]),
        ];

        let hoisted = analyze(&program);
        assert_eq!(hoisted.variables, vec!["x".to_string()]);
    }

    #[test]
    fn test_conditional_function_with_sibling_call_hoists_function() {
        // foo(); if (c) { function foo() {} }
        let program = vec![
            expr_stmt(call("foo", vec![])),
            if_stmt(ident_expr("c"), vec![function_decl("foo", vec![])]),
        ];

        let hoisted = analyze(&program);
        assert_eq!(hoisted.functions, vec!["foo".to_string()]);
        assert!(hoisted.variables.is_empty(),
                "a hoisted function must not also be hoisted as a variable");
    }

    #[test]
    fn test_declare_in_one_branch_use_in_other_hoists() {
        // if (c) { var x = 1; } else { f(x); }
        let program = vec![sp(Statement::If(
            ident_expr("c"),
            Box::new(sp(Statement::Block(vec![var_decl("x", Some(number(1.0)))]))),
            Some(Box::new(sp(Statement::Block(vec![
                expr_stmt(call("f", vec![ident_expr("x")])),
            ])))),
        ))];

        let hoisted = analyze(&program);
        assert_eq!(hoisted.variables, vec!["x".to_string()]);
    }

    #[test]
    fn test_loop_test_use_of_body_declare_hoists() {
        // while (done) { var done = g(); }
        let program = vec![sp(Statement::While(
            ident_expr("done"),
            Box::new(sp(Statement::Block(vec![var_decl("done", Some(call("g", vec![])))]))),
        ))];

        let hoisted = analyze(&program);
        assert_eq!(hoisted.variables, vec!["done".to_string()]);
    }

    #[test]
    fn test_function_locals_do_not_escape() {
        // function f() { var inner = free; } if (c) { var free = 1; }
        // `inner` stays local to f; `free` escapes as a use of this body.
        let program = vec![
            function_decl("f", vec![var_decl("inner", Some(ident_expr("free")))]),
            if_stmt(ident_expr("c"), vec![var_decl("free", Some(number(1.0)))]),
        ];

        let hoisted = analyze(&program);
        // the free variable of f is used somewhere in this body while
        // being conditionally declared, so it hoists; f's local does not
        assert_eq!(hoisted.variables, vec!["free".to_string()]);
    }

    #[test]
    fn test_later_unconditional_declare_supersedes_conditional() {
        // if (c) { var x; } var x = 1; f(x);
        let program = vec![
            if_stmt(ident_expr("c"), vec![var_decl("x", None)]),
            var_decl("x", Some(number(1.0))),
            expr_stmt(call("f", vec![ident_expr("x")])),
        ];

        let hoisted = analyze(&program);
        assert!(hoisted.variables.is_empty(),
                "the unconditional declaration makes the pre-declaration unnecessary");
    }

    #[test]
    fn test_catch_parameter_stays_in_handler() {
        // try { g(); } catch (e) { f(e); }
        let program = vec![sp(Statement::Try(
            Box::new(sp(Statement::Block(vec![expr_stmt(call("g", vec![]))]))),
            Some(CatchClause {
                param: ident_pattern("e"),
                body: Box::new(sp(Statement::Block(vec![
                    expr_stmt(call("f", vec![ident_expr("e")])),
                ]))),
            }),
            None,
        ))];

        let hoisted = analyze(&program);
        assert!(hoisted.variables.is_empty(),
                "the catch parameter is not a free use of the body");
    }

    #[test]
    fn test_for_in_declaration_head_hoists_when_used_after() {
        // for (var k in o) {} f(k);
        let program = vec![
            sp(Statement::ForIn(
                ForInit::VarDec(sp(Declaration::Variable(vec![VariableDeclarator {
                    id: ident_pattern("k"),
                    initial_value: None,
                }]))),
                ident_expr("o"),
                Box::new(sp(Statement::Block(vec![]))),
            )),
            expr_stmt(call("f", vec![ident_expr("k")])),
        ];

        let hoisted = analyze(&program);
        assert_eq!(hoisted.variables, vec!["k".to_string()]);
    }
}
