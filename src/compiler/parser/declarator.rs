use log::debug;

use crate::compiler::{
    lexer::tokens::{Lex, NumberKind, NumberLiteral, Token},
    types::{ElementKind, Item, NodeKind, TypeId},
    CompileError, CompilerError, StringId,
};

use super::parser::Parser;
use super::{fail, ParserError, ParserResult};

/// One step from a declared name towards its base type, in the order C
/// reads them: `*a[4]` is an array of four pointers.
#[derive(Clone, Debug, PartialEq)]
pub enum Derivation {
    /// The contents of the brackets, not yet evaluated.
    Array(Dimension),
    Function,
    Pointer,
}

/// An array dimension as it appeared in the source.  `text` keeps the
/// original spelling so that `1 << 4` reaches the host compiler intact.
#[derive(Clone, Debug, PartialEq)]
pub struct Dimension {
    pub tokens: Vec<Token>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Declarator {
    pub name: StringId,
    pub line: u32,
    pub derivs: Vec<Derivation>,
}

impl Declarator {
    pub fn new(name: StringId, line: u32) -> Declarator {
        Declarator {
            name,
            line,
            derivs: vec![],
        }
    }

    /// The name declares a function, not a pointer to or array of them.
    pub fn is_function(&self) -> bool {
        self.derivs.first() == Some(&Derivation::Function)
    }
}

impl<'a, 'st> Parser<'a, 'st> {
    pub(super) fn declarator(&mut self) -> ParserResult<Declarator> {
        trace_parse!(self);
        let mut pointers = 0;
        loop {
            self.skip_noise()?;
            if self.stream.next_if_punct('*')?.is_none() {
                break;
            }
            pointers += 1;
        }

        let mut decl = if self.stream.next_if_punct('(')?.is_some() {
            let inner = self.declarator()?;
            self.stream.next_must_be(')')?;
            inner
        } else {
            match self.stream.next_if_id()? {
                Some((name, line)) => Declarator::new(name, line),
                None => {
                    let token = self.stream.peek()?;
                    return fail(
                        token.line,
                        ParserError::DeclaratorExpectedIdentifier(token.sym),
                    );
                }
            }
        };

        loop {
            if self.stream.next_if_punct('[')?.is_some() {
                let dim = self.bracketed()?;
                decl.derivs.push(Derivation::Array(dim));
            } else if self.stream.next_if_punct('(')?.is_some() {
                self.skip_balanced('(', ')')?;
                decl.derivs.push(Derivation::Function);
            } else {
                break;
            }
        }

        decl.derivs
            .extend(std::iter::repeat(Derivation::Pointer).take(pointers));
        Ok(decl)
    }

    /// Collects an array dimension up to the matching `]`.  Called with the
    /// `[` consumed and nothing read ahead.
    fn bracketed(&mut self) -> ParserResult<Dimension> {
        let start = self.stream.position();
        let mut tokens = vec![];
        let mut depth = 0;
        loop {
            let token = self.stream.next()?;
            if token.is_eof() {
                return fail(token.line, ParserError::UnexpectedEof);
            }
            if token.sym.is_punct('[') {
                depth += 1;
            } else if token.sym.is_punct(']') {
                if depth == 0 {
                    let text = match (start, self.stream.position()) {
                        // the cursor sits just past the closing `]`
                        (Some(start), Some(end)) => self
                            .stream
                            .source_text(start, end.saturating_sub(1))
                            .trim()
                            .to_string(),
                        _ => self.spelling(&tokens, token.line)?,
                    };
                    return Ok(Dimension { tokens, text });
                }
                depth -= 1;
            }
            tokens.push(token);
        }
    }

    fn spelling(&self, tokens: &[Token], line: u32) -> ParserResult<String> {
        match tokens
            .iter()
            .map(|t| t.text(self.st))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(parts) => Ok(parts.join(" ")),
            Err(e) => fail(line, ParserError::InvalidArrayDimension(e.to_string())),
        }
    }

    /// Computes the item a declarator contributes to its container.
    pub(super) fn item_for(&self, base: TypeId, decl: &Declarator) -> ParserResult<Item> {
        let mut count: u64 = 1;
        let mut derivs = decl.derivs.iter();
        let mut next = derivs.next();
        while let Some(Derivation::Array(dim)) = next {
            let dim = self.dimension(dim, decl.line)?;
            count = self.scale(count, dim, decl.line)?;
            next = derivs.next();
        }

        match next {
            Some(Derivation::Pointer) => Ok(Item::new(count, ElementKind::Pointer)),
            Some(Derivation::Function) => Ok(Item::new(count, ElementKind::Function)),
            _ => self.element_of(base, count, decl),
        }
    }

    fn element_of(&self, base: TypeId, count: u64, decl: &Declarator) -> ParserResult<Item> {
        let node = self.ctx.table.get(base);
        if node.kind == NodeKind::Base && !node.is_defined() {
            let name = node.name.map(|n| self.spell(n)).unwrap_or_default();
            return fail(decl.line, ParserError::UnsupportedBaseType(name));
        }
        if node.is_void() {
            return fail(decl.line, ParserError::VoidField(decl.name));
        }

        match node.kind {
            NodeKind::Base | NodeKind::Enum | NodeKind::Typedef => match node.items.as_slice() {
                [item] => Ok(Item::new(self.scale(count, item.count, decl.line)?, item.kind)),
                _ => Ok(Item::new(count, ElementKind::StructLink(base))),
            },
            NodeKind::Struct | NodeKind::UnionMember | NodeKind::Union => {
                if !node.is_defined() {
                    return fail(decl.line, ParserError::IncompleteField(self.describe(base)));
                }
                let link = if node.is_union() {
                    ElementKind::UnionLink(base)
                } else {
                    ElementKind::StructLink(base)
                };
                Ok(Item::new(count, link))
            }
        }
    }

    fn scale(&self, count: u64, by: u64, line: u32) -> ParserResult<u64> {
        match count.checked_mul(by) {
            Some(n) => Ok(n),
            None => fail(line, ParserError::InvalidArrayDimension(format!("{} * {}", count, by))),
        }
    }

    /// The value of an array dimension.  A lone integer literal is converted
    /// here, anything else goes to the constant evaluator.
    fn dimension(&self, dim: &Dimension, line: u32) -> ParserResult<u64> {
        let value = match dim.tokens.as_slice() {
            [] => return fail(line, ParserError::ArrayExpectedSize),
            [Token {
                sym: Lex::Number(n),
                ..
            }] => self.literal(n, line)?,
            _ => {
                debug!("L{}: dimension `{}` needs the host compiler", line, dim.text);
                self.evaluator
                    .evaluate(&dim.text)
                    .map_err(|e| CompileError::from(CompilerError::new(line, e)))?
            }
        };

        if value < 0 {
            return fail(line, ParserError::InvalidArrayDimension(value.to_string()));
        }
        Ok(value as u64)
    }

    fn literal(&self, n: &NumberLiteral, line: u32) -> ParserResult<i64> {
        let text = self.spell(n.text);
        let digits = text.trim_end_matches(|c: char| c == 'u' || c == 'U' || c == 'l' || c == 'L');
        let parsed = match n.kind {
            NumberKind::Hex => i64::from_str_radix(&digits[2..], 16),
            NumberKind::Octal => i64::from_str_radix(&digits[1..], 8),
            NumberKind::Decimal => digits.parse::<i64>(),
            NumberKind::Float => return fail(line, ParserError::InvalidArrayDimension(text)),
        };
        match parsed {
            Ok(v) => Ok(v),
            Err(_) => fail(line, ParserError::InvalidArrayDimension(text)),
        }
    }
}
