//! The per-function type checker (§4.5).
//!
//! Walks every instruction in a function twice -- once in block order,
//! once in reverse block order -- so that a value referenced before its
//! defining instruction runs (possible across a loop's back edge) has a
//! chance to resolve on the second pass. Each walk resolves whatever it
//! can from the types already known in the environment and leaves
//! anything still unresolved for the next pass; only the final pass
//! treats a still-unresolved destination as a hard error.
//!
//! This is deliberately *not* the CFG dataflow engine in
//! [`crate::dataflow`] -- it is a much simpler two-pass fixed-point
//! tailored to this specific bidirectional inference problem, matching
//! the shape described in §4.5 rather than the general worklist.

use std::collections::HashMap;

use lmlang_core::{Arg, Function, Instruction, Literal, LmType, Module, Op, TypeId, TypeRegistry};

use super::coercion::{is_numeric_or_bool, is_subtype, peer_resolve};
use super::diagnostics::TypeError;

/// Destination name -> concrete type, as handed to the emitter (§6).
pub type TypingEnv = HashMap<String, TypeId>;

/// Ops whose destination is legitimately allowed to remain untyped after
/// checking, per §4.5's "SYSCALL/ASM... stays Inferred unless already
/// constrained" clause. `Multidecl` is included for the same reason: the
/// single-`dest`-field `Instruction` record cannot carry one type per
/// bound name, so we do not require it to resolve one. `Param` block
/// formals are untyped unless the textual front end pre-populated `ty`
/// from a corresponding call-site argument type.
fn dest_may_stay_inferred(op: Op) -> bool {
    matches!(op, Op::Syscall | Op::Asm | Op::Multidecl | Op::Param)
}

/// Type-checks every function in `module`, returning the per-function
/// typing environments keyed by function name. Fails on the first
/// offending function, matching §7's "aggregates local diagnostics into
/// a single error for the first offending instruction and aborts that
/// function" propagation policy.
pub fn check_module(
    module: &mut Module,
    registry: &mut TypeRegistry,
) -> Result<HashMap<String, TypingEnv>, TypeError> {
    let names: Vec<String> = module.functions.keys().cloned().collect();
    let mut envs = HashMap::new();
    for name in names {
        let mut function = module.functions.remove(&name).unwrap();
        let result = check_function(&mut function, module, registry);
        module.functions.insert(name.clone(), function);
        envs.insert(name, result?);
    }
    Ok(envs)
}

/// Type-checks one function, mutating every instruction's `ty` field in
/// place and returning the resulting typing environment.
pub fn check_function(
    function: &mut Function,
    module: &Module,
    registry: &mut TypeRegistry,
) -> Result<TypingEnv, TypeError> {
    let mut env: TypingEnv = HashMap::new();
    for (name, ty) in &function.params {
        env.insert(name.clone(), *ty);
    }

    let block_count = function.blocks.len();
    for pass in 0..2 {
        let order: Box<dyn Iterator<Item = usize>> =
            if pass == 0 { Box::new(0..block_count) } else { Box::new((0..block_count).rev()) };
        for bi in order {
            let block_label = function.blocks[bi].label.clone();
            let instr_count = function.blocks[bi].instructions.len();
            for ii in 0..instr_count {
                let resolved = {
                    let instr = &mut function.blocks[bi].instructions[ii];
                    resolve_instruction(instr, &env, module, registry, &function.name, &block_label, ii)?
                };
                if let Some((name, ty)) = resolved {
                    env.insert(name, ty);
                }
            }
            check_terminator(
                &function.blocks[bi].terminator,
                &env,
                &function.name,
                &block_label,
                function.is_module,
                &function.returns,
                registry,
            )?;
        }
    }

    for block in &function.blocks {
        for (idx, instr) in block.instructions.iter().enumerate() {
            let Some(dest) = &instr.dest else { continue };
            if dest == Instruction::DISCARD || dest_may_stay_inferred(instr.op) {
                continue;
            }
            match env.get(dest) {
                Some(&ty) if ty != TypeId::INFERRED => {}
                _ => {
                    return Err(TypeError::InferredNotResolved {
                        function: function.name.clone(),
                        block: block.label.clone(),
                        index: idx,
                        name: dest.clone(),
                    })
                }
            }
        }
    }

    Ok(env)
}

/// Resolves one instruction against the current environment. Returns
/// `Ok(None)` when the instruction's inputs are not all typed yet (defer
/// to a later pass); `Ok(Some((dest, ty)))` when it resolved; `Err` for a
/// genuine type error (inputs were all known and violated a rule).
fn resolve_instruction(
    instr: &mut Instruction,
    env: &TypingEnv,
    module: &Module,
    registry: &mut TypeRegistry,
    function: &str,
    block: &str,
    index: usize,
) -> Result<Option<(String, TypeId)>, TypeError> {
    let ctx = || (function.to_string(), block.to_string());

    match instr.op {
        Op::Lit => {
            let Some(Arg::Literal(lit)) = instr.args.first() else {
                return Ok(None);
            };
            let ty = match lit {
                Literal::Int(v) => {
                    registry.register(LmType::Literal { value: *v, size_bits: lmlang_core::literal_bit_width(*v) })
                }
                Literal::Bool(_) => TypeId::BOOL,
                Literal::Float(_) => TypeId::F64,
                Literal::Str(s) => registry.register(LmType::Array { element: TypeId::CHAR, length: s.len() as u64 }),
            };
            instr.ty = Some(ty);
            Ok(dest_of(instr, ty))
        }

        op if op.is_arithmetic() => {
            let Some((lhs, rhs)) = binary_refs(instr, env) else { return Ok(None) };
            let (lhs_ty, rhs_ty) = (lhs.1, rhs.1);
            let ty = match (registry.get(lhs_ty), registry.get(rhs_ty)) {
                (Some(LmType::Pointer { .. }), _) if matches!(instr.op, Op::Add | Op::Sub) => lhs_ty,
                (_, Some(LmType::Pointer { .. })) if matches!(instr.op, Op::Add | Op::Sub) => rhs_ty,
                _ => peer_resolve(lhs_ty, rhs_ty, registry).ok_or_else(|| {
                    let (function, block) = ctx();
                    if is_numeric_or_bool(lhs_ty) && is_numeric_or_bool(rhs_ty) {
                        TypeError::IncompatibleOperands { function, block, index, lhs: lhs_ty, rhs: rhs_ty }
                    } else {
                        let offender = if is_numeric_or_bool(lhs_ty) { rhs_ty } else { lhs_ty };
                        TypeError::NonNumericArithmetic { function, block, index, type_id: offender }
                    }
                })?,
            };
            instr.ty = Some(ty);
            Ok(dest_of(instr, ty))
        }

        Op::And | Op::Or => {
            let Some((lhs, rhs)) = binary_refs(instr, env) else { return Ok(None) };
            for (_, ty) in [lhs, rhs] {
                if !is_numeric_or_bool(ty) {
                    let (function, block) = ctx();
                    return Err(TypeError::NonBooleanCondition { function, block, actual: ty });
                }
            }
            instr.ty = Some(TypeId::BOOL);
            Ok(dest_of(instr, TypeId::BOOL))
        }

        Op::Not => {
            let Some(src) = instr.refs.first().and_then(|r| env.get(r).copied()) else { return Ok(None) };
            if !is_numeric_or_bool(src) {
                let (function, block) = ctx();
                return Err(TypeError::NonBooleanCondition { function, block, actual: src });
            }
            instr.ty = Some(TypeId::BOOL);
            Ok(dest_of(instr, TypeId::BOOL))
        }

        Op::Eq | Op::Neq | Op::Gt | Op::Lt | Op::Gte | Op::Lte => {
            let Some((lhs, rhs)) = binary_refs(instr, env) else { return Ok(None) };
            let (lhs_ty, rhs_ty) = (lhs.1, rhs.1);
            let both_pointer = matches!(registry.get(lhs_ty), Some(LmType::Pointer { .. }))
                && matches!(registry.get(rhs_ty), Some(LmType::Pointer { .. }));
            if !both_pointer && peer_resolve(lhs_ty, rhs_ty, registry).is_none() {
                let (function, block) = ctx();
                return Err(TypeError::IncompatibleOperands { function, block, index, lhs: lhs_ty, rhs: rhs_ty });
            }
            instr.ty = Some(TypeId::BOOL);
            Ok(dest_of(instr, TypeId::BOOL))
        }

        Op::Decl => {
            let Some(expr_ty) = instr.refs.first().and_then(|r| env.get(r).copied()) else { return Ok(None) };
            let declared = instr.ty.unwrap_or(TypeId::INFERRED);
            let final_ty = if declared == TypeId::INFERRED {
                expr_ty
            } else {
                if !is_subtype(expr_ty, declared, registry) {
                    let (function, block) = ctx();
                    return Err(TypeError::TypeMismatch {
                        function,
                        block,
                        index,
                        expected: declared,
                        actual: expr_ty,
                        suggestion: None,
                    });
                }
                declared
            };
            instr.ty = Some(final_ty);
            Ok(dest_of(instr, final_ty))
        }

        Op::Assign => {
            let Some((lhs, rhs)) = binary_refs(instr, env) else { return Ok(None) };
            if !is_subtype(rhs.1, lhs.1, registry) {
                let (function, block) = ctx();
                return Err(TypeError::TypeMismatch {
                    function,
                    block,
                    index,
                    expected: lhs.1,
                    actual: rhs.1,
                    suggestion: None,
                });
            }
            Ok(None)
        }

        Op::Call => {
            let Some(callee) = instr.refs.first() else { return Ok(None) };
            let Some(callee_fn) = module.function(callee) else {
                let (function, block) = ctx();
                return Err(TypeError::UndeclaredCallee { function, block, callee: callee.clone() });
            };
            let arg_names = &instr.refs[1..];
            if arg_names.len() != callee_fn.params.len() {
                let (function, block) = ctx();
                return Err(TypeError::WrongArgumentCount {
                    function,
                    block,
                    callee: callee.clone(),
                    expected: callee_fn.params.len(),
                    actual: arg_names.len(),
                });
            }
            let mut arg_types = Vec::with_capacity(arg_names.len());
            for name in arg_names {
                let Some(&ty) = env.get(name) else { return Ok(None) };
                arg_types.push(ty);
            }
            for (actual, (_, formal)) in arg_types.iter().zip(&callee_fn.params) {
                if !is_subtype(*actual, *formal, registry) {
                    let (function, block) = ctx();
                    return Err(TypeError::TypeMismatch {
                        function,
                        block,
                        index,
                        expected: *formal,
                        actual: *actual,
                        suggestion: None,
                    });
                }
            }
            let ty = callee_fn.returns.first().map(|(_, t)| *t).unwrap_or(TypeId::UNIT);
            instr.ty = Some(ty);
            Ok(dest_of(instr, ty))
        }

        Op::Alloc => {
            let ty = instr
                .ty
                .filter(|&t| t != TypeId::INFERRED)
                .unwrap_or_else(|| registry.register(LmType::Pointer { pointee: TypeId::VOID, mutable: true }));
            instr.ty = Some(ty);
            Ok(dest_of(instr, ty))
        }

        Op::Ref => {
            let Some(src) = instr.refs.first().and_then(|r| env.get(r).copied()) else { return Ok(None) };
            let ty = registry.register(LmType::Pointer { pointee: src, mutable: true });
            instr.ty = Some(ty);
            Ok(dest_of(instr, ty))
        }

        Op::Brw => {
            let Some(src) = instr.refs.first().and_then(|r| env.get(r).copied()) else { return Ok(None) };
            let ty = registry.register(LmType::Pointer { pointee: src, mutable: false });
            instr.ty = Some(ty);
            Ok(dest_of(instr, ty))
        }

        Op::Move | Op::Copy => {
            let Some(src) = instr.refs.first().and_then(|r| env.get(r).copied()) else { return Ok(None) };
            instr.ty = Some(src);
            Ok(dest_of(instr, src))
        }

        Op::As => {
            let Some(src) = instr.refs.first().and_then(|r| env.get(r).copied()) else { return Ok(None) };
            let target = instr.ty.unwrap_or(TypeId::INFERRED);
            if target == TypeId::INFERRED {
                return Ok(None);
            }
            if !is_subtype(src, target, registry) {
                let (function, block) = ctx();
                return Err(TypeError::InvalidCast { function, block, index, from: src, to: target });
            }
            instr.ty = Some(target);
            Ok(dest_of(instr, target))
        }

        Op::Dot | Op::Access => {
            let Some(obj_ty) = instr.refs.first().and_then(|r| env.get(r).copied()) else { return Ok(None) };
            let Some(Arg::Literal(Literal::Str(field))) = instr.args.first() else { return Ok(None) };
            let ty = match registry.get(obj_ty) {
                Some(LmType::Array { length, .. }) if field == "len" => {
                    let len = *length as i64;
                    registry.register(LmType::Literal { value: len, size_bits: lmlang_core::literal_bit_width(len) })
                }
                Some(LmType::Struct { fields, .. }) => match fields.get(field) {
                    Some(&t) => t,
                    None => {
                        let (function, block) = ctx();
                        return Err(TypeError::UnknownField {
                            function,
                            block,
                            index,
                            type_id: obj_ty,
                            field: field.clone(),
                        });
                    }
                },
                _ => {
                    let (function, block) = ctx();
                    return Err(TypeError::UnknownField { function, block, index, type_id: obj_ty, field: field.clone() });
                }
            };
            instr.ty = Some(ty);
            Ok(dest_of(instr, ty))
        }

        Op::Index => {
            let (Some(obj), Some(idx)) = (instr.refs.first(), instr.refs.get(1)) else { return Ok(None) };
            let (Some(&obj_ty), Some(_)) = (env.get(obj), env.get(idx)) else { return Ok(None) };
            let ty = match registry.get(obj_ty) {
                Some(LmType::Pointer { pointee, .. }) => *pointee,
                Some(LmType::Array { element, .. }) => *element,
                _ => {
                    let (function, block) = ctx();
                    return Err(TypeError::NotIndexable { function, block, index, type_id: obj_ty });
                }
            };
            instr.ty = Some(ty);
            Ok(dest_of(instr, ty))
        }

        Op::Init => {
            let struct_ty = instr.ty.unwrap_or(TypeId::INFERRED);
            if struct_ty == TypeId::INFERRED {
                return Ok(None);
            }
            let Some(LmType::Struct { name, fields }) = registry.get(struct_ty).cloned() else {
                return Ok(None);
            };
            if instr.refs.len() != fields.len() {
                let (function, block) = ctx();
                return Err(TypeError::WrongInitArity {
                    function,
                    block,
                    index,
                    struct_name: name,
                    expected: fields.len(),
                    actual: instr.refs.len(),
                });
            }
            for (refname, (_, field_ty)) in instr.refs.iter().zip(fields.iter()) {
                let Some(&actual) = env.get(refname) else { return Ok(None) };
                if !is_subtype(actual, *field_ty, registry) {
                    let (function, block) = ctx();
                    return Err(TypeError::TypeMismatch {
                        function,
                        block,
                        index,
                        expected: *field_ty,
                        actual,
                        suggestion: None,
                    });
                }
            }
            instr.ty = Some(struct_ty);
            Ok(dest_of(instr, struct_ty))
        }

        Op::Field => {
            let Some(src) = instr.refs.first().and_then(|r| env.get(r).copied()) else { return Ok(None) };
            instr.ty = Some(src);
            Ok(dest_of(instr, src))
        }

        Op::Param => {
            let ty = instr.ty.unwrap_or(TypeId::INFERRED);
            if ty == TypeId::INFERRED {
                return Ok(None);
            }
            Ok(dest_of(instr, ty))
        }

        Op::Syscall | Op::Asm | Op::Multidecl => {
            if let Some(ty) = instr.ty.filter(|&t| t != TypeId::INFERRED) {
                Ok(dest_of(instr, ty))
            } else {
                Ok(None)
            }
        }

        Op::Print | Op::Free | Op::Set | Op::Nop | Op::Label | Op::Br | Op::Jmp | Op::Ret => Ok(None),
    }
}

fn dest_of(instr: &Instruction, ty: TypeId) -> Option<(String, TypeId)> {
    instr.dest.clone().map(|d| (d, ty))
}

/// Resolves both refs of a binary instruction against `env`, returning
/// `((name, type), (name, type))` only when both are already known.
fn binary_refs<'a>(instr: &'a Instruction, env: &TypingEnv) -> Option<((&'a str, TypeId), (&'a str, TypeId))> {
    let lhs = instr.refs.first()?;
    let rhs = instr.refs.get(1)?;
    let lhs_ty = *env.get(lhs)?;
    let rhs_ty = *env.get(rhs)?;
    Some(((lhs.as_str(), lhs_ty), (rhs.as_str(), rhs_ty)))
}

fn check_terminator(
    terminator: &Instruction,
    env: &TypingEnv,
    function: &str,
    block: &str,
    is_module: bool,
    returns: &[(String, TypeId)],
    registry: &TypeRegistry,
) -> Result<(), TypeError> {
    match terminator.op {
        Op::Br => {
            let Some(cond_ty) = terminator.refs.first().and_then(|r| env.get(r).copied()) else { return Ok(()) };
            if !is_numeric_or_bool(cond_ty) {
                return Err(TypeError::NonBooleanCondition {
                    function: function.to_string(),
                    block: block.to_string(),
                    actual: cond_ty,
                });
            }
            Ok(())
        }
        Op::Ret => {
            if is_module {
                return Ok(());
            }
            if terminator.refs.len() != returns.len() {
                return Err(TypeError::WrongReturnArity {
                    function: function.to_string(),
                    block: block.to_string(),
                    expected: returns.len(),
                    actual: terminator.refs.len(),
                });
            }
            for (name, (_, want)) in terminator.refs.iter().zip(returns) {
                let Some(&actual) = env.get(name) else { continue };
                if !is_subtype(actual, *want, registry) {
                    return Err(TypeError::TypeMismatch {
                        function: function.to_string(),
                        block: block.to_string(),
                        index: 0,
                        expected: *want,
                        actual,
                        suggestion: None,
                    });
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmlang_core::{BasicBlock, Function};

    fn module_with(function: Function) -> Module {
        let mut m = Module::new("m");
        m.insert_function(function);
        m
    }

    #[test]
    fn move_scenario_types_as_int() {
        // @test() $entry x:=32; y:=move x; _:=call print y; ret end
        let mut entry = BasicBlock::new("entry", Instruction::ret(vec![]));
        entry.push(Instruction::lit("x", Literal::Int(32)));
        entry.push(Instruction::mov("y", "x"));
        entry.push(Instruction::print("y"));
        let f = Function::new("test", vec![], vec![], vec![entry]);
        let module = module_with(f.clone());
        let mut function = module.function("test").unwrap().clone();
        let mut registry = TypeRegistry::new();
        let env = check_function(&mut function, &module, &mut registry).unwrap();
        assert_eq!(registry.get(env["x"]), Some(&LmType::Literal { value: 32, size_bits: 8 }));
        assert_eq!(env["x"], env["y"]);
    }

    #[test]
    fn decl_requires_subtype_of_declared_type() {
        let mut entry = BasicBlock::new("entry", Instruction::ret(vec![]));
        entry.push(Instruction::lit("lit", Literal::Bool(true)));
        entry.push(Instruction::decl("x", Some(TypeId::F32), "lit"));
        let mut f = Function::new("test", vec![], vec![], vec![entry]);
        let module = module_with(f.clone());
        let mut registry = TypeRegistry::new();
        assert!(matches!(check_function(&mut f, &module, &mut registry), Err(TypeError::TypeMismatch { .. })));
    }

    #[test]
    fn call_checks_arity_and_argument_types() {
        let callee_entry = BasicBlock::new("entry", Instruction::ret(vec!["p".to_string()]));
        let callee = Function::new(
            "callee",
            vec![("p".to_string(), TypeId::I32)],
            vec![("r".to_string(), TypeId::I32)],
            vec![callee_entry],
        );

        let mut entry = BasicBlock::new("entry", Instruction::ret(vec![]));
        entry.push(Instruction::lit("a", Literal::Int(1)));
        entry.push(Instruction::call("result", "callee", vec!["a".to_string()]));
        let caller = Function::new("caller", vec![], vec![], vec![entry]);

        let mut module = Module::new("m");
        module.insert_function(callee);
        module.insert_function(caller);
        let mut caller = module.function("caller").unwrap().clone();

        let mut registry = TypeRegistry::new();
        let env = check_function(&mut caller, &module, &mut registry).unwrap();
        assert_eq!(env["result"], TypeId::I32);
    }

    #[test]
    fn call_to_undeclared_function_errors() {
        let mut entry = BasicBlock::new("entry", Instruction::ret(vec![]));
        entry.push(Instruction::call("_", "ghost", vec![]));
        let mut f = Function::new("caller", vec![], vec![], vec![entry]);
        let module = module_with(f.clone());
        let mut registry = TypeRegistry::new();
        assert!(matches!(check_function(&mut f, &module, &mut registry), Err(TypeError::UndeclaredCallee { .. })));
    }

    #[test]
    fn ref_produces_mutable_pointer_brw_produces_shared() {
        let mut entry = BasicBlock::new("entry", Instruction::ret(vec![]));
        entry.push(Instruction::lit("x", Literal::Int(1)));
        entry.push(Instruction::reference("r", "x"));
        entry.push(Instruction::brw("s", "x"));
        let mut f = Function::new("test", vec![], vec![], vec![entry]);
        let module = module_with(f.clone());
        let mut registry = TypeRegistry::new();
        let env = check_function(&mut f, &module, &mut registry).unwrap();
        assert!(matches!(registry.get(env["r"]), Some(LmType::Pointer { mutable: true, .. })));
        assert!(matches!(registry.get(env["s"]), Some(LmType::Pointer { mutable: false, .. })));
    }

    #[test]
    fn unresolved_inferred_destination_is_a_hard_error() {
        let mut entry = BasicBlock::new("entry", Instruction::ret(vec![]));
        entry.push(Instruction::decl("x", None, "missing"));
        let mut f = Function::new("test", vec![], vec![], vec![entry]);
        let module = module_with(f.clone());
        let mut registry = TypeRegistry::new();
        assert!(matches!(
            check_function(&mut f, &module, &mut registry),
            Err(TypeError::InferredNotResolved { .. })
        ));
    }

    #[test]
    fn array_access_len_yields_literal_length() {
        let mut entry = BasicBlock::new("entry", Instruction::ret(vec![]));
        entry.push(Instruction::lit("s", Literal::Str("hello".to_string())));
        entry.push(Instruction::access("n", "s", "len"));
        let mut f = Function::new("test", vec![], vec![], vec![entry]);
        let module = module_with(f.clone());
        let mut registry = TypeRegistry::new();
        let env = check_function(&mut f, &module, &mut registry).unwrap();
        assert!(matches!(registry.get(env["n"]), Some(LmType::Literal { value: 5, .. })));
    }

    #[test]
    fn wrong_return_arity_errors() {
        let mut entry = BasicBlock::new("entry", Instruction::ret(vec!["x".to_string(), "x".to_string()]));
        entry.instructions.insert(0, Instruction::lit("x", Literal::Int(1)));
        let mut f = Function::new("test", vec![], vec![("r".to_string(), TypeId::I32)], vec![entry]);
        let module = module_with(f.clone());
        let mut registry = TypeRegistry::new();
        assert!(matches!(
            check_function(&mut f, &module, &mut registry),
            Err(TypeError::WrongReturnArity { .. })
        ));
    }
}
