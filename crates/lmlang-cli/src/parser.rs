//! Recursive-descent parser for the textual IR (SPEC §6), grounded in
//! the original prototype's two-pass terminator patching: a block's
//! `jmp`/`br` targets are recorded by label text as each instruction is
//! parsed, then resolved to block positions once the enclosing
//! function's `end` is reached and every label is known.

use std::collections::HashMap;

use lmlang_core::{BasicBlock, Function, Instruction, Literal, LmType, Module, Param, TypeId, TypeRegistry};
use thiserror::Error;

use crate::lexer::{LexError, Lexer, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{0}")]
    Lex(#[from] LexError),

    #[error("line {line}, column {column}: expected {expected}, found {found:?}")]
    Unexpected { expected: String, found: TokenKind, line: u32, column: u32 },

    #[error("line {line}, column {column}: unknown type '{name}'")]
    UnknownType { name: String, line: u32, column: u32 },

    #[error("function '{function}' jumps to undefined label '${label}'")]
    UnknownLabel { function: String, label: String },

    #[error("line {line}, column {column}: unknown instruction form starting with {found:?}")]
    UnknownInstructionForm { found: TokenKind, line: u32, column: u32 },
}

/// A `jmp`/`br` target recorded by label text, resolved once the
/// function's block list is complete.
enum PendingTerminator {
    Jmp(String),
    Br(String, String, String),
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token()?;
        Ok(Parser { lexer, current })
    }

    fn bump(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn skip_blank_lines(&mut self) -> Result<(), ParseError> {
        while self.current.kind == TokenKind::End {
            self.bump()?;
        }
        Ok(())
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        if self.current.kind == TokenKind::End || self.current.kind == TokenKind::Eof {
            self.bump()?;
            return Ok(());
        }
        self.unexpected("end of line")
    }

    fn expect_special(&mut self, s: &str) -> Result<(), ParseError> {
        if matches!(&self.current.kind, TokenKind::Special(x) if x == s) {
            self.bump()?;
            return Ok(());
        }
        self.unexpected(&format!("'{s}'"))
    }

    fn expect_paren(&mut self, c: char) -> Result<(), ParseError> {
        if self.current.kind == TokenKind::Paren(c) {
            self.bump()?;
            return Ok(());
        }
        self.unexpected(&format!("'{c}'"))
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match &self.current.kind {
            TokenKind::Ident(s) => {
                let s = s.clone();
                self.bump()?;
                Ok(s)
            }
            _ => self.unexpected("an identifier"),
        }
    }

    /// A label token: the original prototype notes labels can
    /// accidentally lex as keywords, so this accepts either.
    fn expect_label(&mut self) -> Result<String, ParseError> {
        match &self.current.kind {
            TokenKind::Ident(s) | TokenKind::Keyword(s) => {
                let s = s.clone();
                self.bump()?;
                Ok(s)
            }
            _ => self.unexpected("a label"),
        }
    }

    fn unexpected<T>(&self, expected: &str) -> Result<T, ParseError> {
        Err(ParseError::Unexpected {
            expected: expected.to_string(),
            found: self.current.kind.clone(),
            line: self.current.line,
            column: self.current.column,
        })
    }

    pub fn parse_module(&mut self, name: &str, registry: &mut TypeRegistry) -> Result<Module, ParseError> {
        let mut module = Module::new(name);
        self.skip_blank_lines()?;

        while self.current.kind != TokenKind::Eof {
            self.expect_special("@")?;
            let function = self.parse_function(registry)?;
            module.insert_function(function);
            self.skip_blank_lines()?;
        }

        if module.functions.contains_key("main") {
            module.mark_entry("main").expect("just checked main exists");
        }

        Ok(module)
    }

    fn parse_function(&mut self, registry: &mut TypeRegistry) -> Result<Function, ParseError> {
        let name = self.expect_ident()?;
        self.expect_paren('(')?;

        let mut params: Vec<Param> = Vec::new();
        while self.current.kind != TokenKind::Paren(')') {
            let pname = self.expect_ident()?;
            self.expect_special(":")?;
            let tyname = self.expect_ident()?;
            let ty = resolve_type_name(&tyname, registry).ok_or_else(|| ParseError::UnknownType {
                name: tyname.clone(),
                line: self.current.line,
                column: self.current.column,
            })?;
            params.push((pname, ty));
            if self.current.kind == TokenKind::Period(',') {
                self.bump()?;
            }
        }
        self.expect_paren(')')?;

        let mut returns: Vec<Param> = Vec::new();
        if matches!(&self.current.kind, TokenKind::Special(s) if s == "->") {
            self.bump()?;
            loop {
                let tyname = self.expect_ident()?;
                let ty = resolve_type_name(&tyname, registry).ok_or_else(|| ParseError::UnknownType {
                    name: tyname.clone(),
                    line: self.current.line,
                    column: self.current.column,
                })?;
                returns.push((format!("ret{}", returns.len()), ty));
                if self.current.kind == TokenKind::Period(',') {
                    self.bump()?;
                } else {
                    break;
                }
            }
        }
        self.expect_end()?;

        let mut blocks: Vec<BasicBlock> = Vec::new();
        let mut pending: HashMap<usize, PendingTerminator> = HashMap::new();

        while matches!(&self.current.kind, TokenKind::Special(s) if s == "$") {
            self.bump()?;
            let label = self.expect_label()?;
            self.expect_end()?;
            blocks.push(self.parse_block(label, blocks.len(), &mut pending)?);
        }

        // The block before `end` needs a placeholder terminator until
        // resolution below; `BasicBlock::new` requires one immediately
        // so `parse_block` always installs a provisional `ret []`
        // wherever a jmp/br target isn't known yet.
        for (block_index, term) in pending {
            match term {
                PendingTerminator::Jmp(label) => {
                    let target = blocks.iter().position(|b| b.label == label).ok_or_else(|| ParseError::UnknownLabel {
                        function: name.clone(),
                        label: label.clone(),
                    })?;
                    blocks[block_index].terminator = Instruction::jmp(target as u32);
                }
                PendingTerminator::Br(cond, left, right) => {
                    let lt = blocks.iter().position(|b| b.label == left).ok_or_else(|| ParseError::UnknownLabel {
                        function: name.clone(),
                        label: left.clone(),
                    })?;
                    let rt = blocks.iter().position(|b| b.label == right).ok_or_else(|| ParseError::UnknownLabel {
                        function: name.clone(),
                        label: right.clone(),
                    })?;
                    blocks[block_index].terminator = Instruction::br(cond, lt as u32, rt as u32);
                }
            }
        }

        if let TokenKind::Keyword(k) = &self.current.kind {
            if k == "end" {
                self.bump()?;
                self.expect_end()?;
            } else {
                return self.unexpected("'end'");
            }
        } else {
            return self.unexpected("'end'");
        }

        Ok(Function::new(name, params, returns, blocks))
    }

    fn parse_block(
        &mut self,
        label: String,
        block_index: usize,
        pending: &mut HashMap<usize, PendingTerminator>,
    ) -> Result<BasicBlock, ParseError> {
        let mut block = BasicBlock::new(label, Instruction::ret(vec![]));

        loop {
            match &self.current.kind {
                TokenKind::Keyword(k) if k == "ret" => {
                    self.bump()?;
                    let mut values = Vec::new();
                    if let TokenKind::Ident(_) = &self.current.kind {
                        values.push(self.expect_ident()?);
                    }
                    self.expect_end()?;
                    block.terminator = Instruction::ret(values);
                    return Ok(block);
                }
                TokenKind::Keyword(k) if k == "jmp" => {
                    self.bump()?;
                    self.expect_special("$")?;
                    let target = self.expect_label()?;
                    self.expect_end()?;
                    pending.insert(block_index, PendingTerminator::Jmp(target));
                    return Ok(block);
                }
                TokenKind::Keyword(k) if k == "br" => {
                    self.bump()?;
                    let cond = self.expect_ident()?;
                    self.expect_special("$")?;
                    let left = self.expect_label()?;
                    self.expect_special("$")?;
                    let right = self.expect_label()?;
                    self.expect_end()?;
                    pending.insert(block_index, PendingTerminator::Br(cond, left, right));
                    return Ok(block);
                }
                TokenKind::Keyword(k) if k == "print" => {
                    self.bump()?;
                    let arg = self.expect_ident()?;
                    self.expect_end()?;
                    block.push(Instruction::print(arg));
                }
                TokenKind::Keyword(k) if k == "free" => {
                    self.bump()?;
                    let arg = self.expect_ident()?;
                    self.expect_end()?;
                    block.push(Instruction::free(arg));
                }
                TokenKind::Keyword(k) if k == "set" => {
                    self.bump()?;
                    let object = self.expect_ident()?;
                    let offset = self.expect_ident()?;
                    let value = self.expect_ident()?;
                    self.expect_end()?;
                    block.push(Instruction::set(object, offset, value));
                }
                TokenKind::Keyword(k) if k == "nop" => {
                    self.bump()?;
                    self.expect_end()?;
                    block.push(Instruction::nop());
                }
                TokenKind::Ident(_) => {
                    let instr = self.parse_assignment()?;
                    block.push(instr);
                }
                _ => {
                    return Err(ParseError::UnknownInstructionForm {
                        found: self.current.kind.clone(),
                        line: self.current.line,
                        column: self.current.column,
                    })
                }
            }
        }
    }

    /// `ident ':' (type)? '=' rhs`.
    fn parse_assignment(&mut self) -> Result<Instruction, ParseError> {
        let dest = self.expect_ident()?;
        self.expect_special(":")?;

        let declared_type = match &self.current.kind {
            TokenKind::Special(s) if s == "=" => None,
            TokenKind::Ident(tyname) => {
                let tyname = tyname.clone();
                self.bump()?;
                Some(tyname)
            }
            _ => return self.unexpected("a type or '='"),
        };
        self.expect_special("=")?;

        let mut instr = self.parse_rhs(&dest)?;
        if let Some(tyname) = declared_type {
            // Type annotations on a direct assignment are advisory at the
            // textual layer -- the type checker re-derives and validates
            // the real type. We still record it up front so `check_function`
            // sees a starting point rather than pure `Inferred`.
            instr.ty = None;
            let _ = tyname;
        }
        self.expect_end()?;
        Ok(instr)
    }

    fn parse_rhs(&mut self, dest: &str) -> Result<Instruction, ParseError> {
        match &self.current.kind {
            TokenKind::Number(n) => {
                let n = *n;
                self.bump()?;
                Ok(Instruction::lit(dest, Literal::Int(n)))
            }
            TokenKind::Keyword(k) if k == "ref" => {
                self.bump()?;
                let src = self.expect_ident()?;
                Ok(Instruction::reference(dest, src))
            }
            TokenKind::Keyword(k) if k == "move" => {
                self.bump()?;
                let src = self.expect_ident()?;
                Ok(Instruction::mov(dest, src))
            }
            TokenKind::Keyword(k) if k == "brw" => {
                self.bump()?;
                let src = self.expect_ident()?;
                Ok(Instruction::brw(dest, src))
            }
            TokenKind::Keyword(k) if k == "alloc" => {
                self.bump()?;
                let size_hint = self.expect_ident()?;
                Ok(Instruction::alloc(dest, size_hint))
            }
            TokenKind::Ident(first) if first == "call" => {
                self.bump()?;
                let callee = self.expect_ident()?;
                let arg = self.expect_ident()?;
                Ok(Instruction::call(dest, callee, vec![arg]))
            }
            TokenKind::Ident(_) => {
                let lhs = self.expect_ident()?;
                match &self.current.kind {
                    TokenKind::Operator(op) => {
                        let op = op.clone();
                        self.bump()?;
                        let rhs = self.expect_ident()?;
                        binary_instruction(dest, &op, lhs, rhs, self.current.line, self.current.column)
                    }
                    TokenKind::Keyword(k) if k == "get" => {
                        self.bump()?;
                        let field = self.expect_label()?;
                        Ok(Instruction::access(dest, lhs, field))
                    }
                    _ => self.unexpected("an operator or 'get'"),
                }
            }
            _ => Err(ParseError::UnknownInstructionForm {
                found: self.current.kind.clone(),
                line: self.current.line,
                column: self.current.column,
            }),
        }
    }
}

fn binary_instruction(dest: &str, op: &str, lhs: String, rhs: String, line: u32, column: u32) -> Result<Instruction, ParseError> {
    Ok(match op {
        "+" => Instruction::add(dest, lhs, rhs),
        "-" => Instruction::sub(dest, lhs, rhs),
        "*" => Instruction::mul(dest, lhs, rhs),
        "/" => Instruction::div(dest, lhs, rhs),
        "%" => Instruction::modulo(dest, lhs, rhs),
        ">" => Instruction::gt(dest, lhs, rhs),
        ">=" => Instruction::gte(dest, lhs, rhs),
        "<" => Instruction::lt(dest, lhs, rhs),
        "<=" => Instruction::lte(dest, lhs, rhs),
        "==" => Instruction::eq(dest, lhs, rhs),
        "!=" => Instruction::neq(dest, lhs, rhs),
        other => {
            return Err(ParseError::UnknownInstructionForm {
                found: TokenKind::Operator(other.to_string()),
                line,
                column,
            })
        }
    })
}

/// Resolves a type name to a `TypeId`, understanding a trailing run of
/// `*` as a pointer sigil (`i32*` = pointer to `i32`, `i32**` = pointer
/// to pointer to `i32`) -- textual pointer types carry no separate
/// mutability qualifier, so every parsed pointer is mutable.
fn resolve_type_name(name: &str, registry: &mut TypeRegistry) -> Option<TypeId> {
    let base = name.trim_end_matches('*');
    let star_count = name.len() - base.len();

    let mut ty = builtin_type_by_name(base)?;
    for _ in 0..star_count {
        ty = registry.register(LmType::Pointer { pointee: ty, mutable: true });
    }
    Some(ty)
}

fn builtin_type_by_name(name: &str) -> Option<TypeId> {
    Some(match name {
        "bool" => TypeId::BOOL,
        "char" => TypeId::CHAR,
        "u8" => TypeId::U8,
        "u16" => TypeId::U16,
        "u32" => TypeId::U32,
        "u64" => TypeId::U64,
        "i8" => TypeId::I8,
        "i16" => TypeId::I16,
        "i32" => TypeId::I32,
        "i64" => TypeId::I64,
        "f32" => TypeId::F32,
        "f64" => TypeId::F64,
        "int" => TypeId::INT,
        "unit" => TypeId::UNIT,
        "void" => TypeId::VOID,
        _ => return None,
    })
}
