use std::collections::HashMap;

use log::{debug, warn};

use crate::compiler::{
    constexpr::ConstantEvaluator,
    context::CompileContext,
    lexer::{tokens::Lex, Lexer},
    types::{tag_name, ElementKind, NodeKind, NodeState, TypeId},
    StringId, StringTable,
};

use super::declarator::Declarator;
use super::tokenstream::TokenStream;
use super::{fail, ParserError, ParserResult};

/*
    Grammar
    The parser accepts the declaration subset of C that describes data.
    Anything that cannot change a layout (qualifiers, attributes, function
    bodies, initializers, enumerator lists) is read and thrown away.

    NOISE := const | volatile | static | extern | inline | ... | __attribute__ ( ... )
    BASE := [signed|unsigned] [short|long|long long] [char|int|float|double|void|_Bool]
    TAG_BODY := LBRACE DECLARATION* RBRACE
    STRUCT := (struct|union) [IDENTIFIER] [TAG_BODY]
    ENUM := enum [IDENTIFIER] [LBRACE ... RBRACE]
    SPECIFIERS := [typedef|NOISE]* (BASE | STRUCT | ENUM | TYPEDEF_NAME) [NOISE]*
    SUFFIX := LBRACKET TOKENS RBRACKET | LPAREN ... RPAREN
    DECLARATOR := [* NOISE*]* (IDENTIFIER | LPAREN DECLARATOR RPAREN) SUFFIX*
    INIT_DECLARATOR := DECLARATOR NOISE* [= INITIALIZER]
    DECLARATION := SPECIFIERS [INIT_DECLARATOR [, INIT_DECLARATOR]*] SEMICOLON
                 | SPECIFIERS DECLARATOR LBRACE ... RBRACE
                 | _Static_assert ( ... ) SEMICOLON
    UNIT := DECLARATION*
*/

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) enum Keyword {
    Typedef,
    Struct,
    Union,
    Enum,
    Signed,
    Unsigned,
    Short,
    Long,
    Core(&'static str),
    /// Words that never affect a layout.
    Qualifier,
    /// Words followed by a parenthesized group that never affects a layout.
    Extension,
    StaticAssert,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("typedef", Keyword::Typedef),
    ("struct", Keyword::Struct),
    ("union", Keyword::Union),
    ("enum", Keyword::Enum),
    ("signed", Keyword::Signed),
    ("__signed", Keyword::Signed),
    ("__signed__", Keyword::Signed),
    ("unsigned", Keyword::Unsigned),
    ("short", Keyword::Short),
    ("long", Keyword::Long),
    ("char", Keyword::Core("char")),
    ("int", Keyword::Core("int")),
    ("float", Keyword::Core("float")),
    ("double", Keyword::Core("double")),
    ("void", Keyword::Core("void")),
    ("_Bool", Keyword::Core("_Bool")),
    ("const", Keyword::Qualifier),
    ("__const", Keyword::Qualifier),
    ("__const__", Keyword::Qualifier),
    ("volatile", Keyword::Qualifier),
    ("__volatile", Keyword::Qualifier),
    ("__volatile__", Keyword::Qualifier),
    ("restrict", Keyword::Qualifier),
    ("__restrict", Keyword::Qualifier),
    ("__restrict__", Keyword::Qualifier),
    ("static", Keyword::Qualifier),
    ("extern", Keyword::Qualifier),
    ("register", Keyword::Qualifier),
    ("auto", Keyword::Qualifier),
    ("inline", Keyword::Qualifier),
    ("__inline", Keyword::Qualifier),
    ("__inline__", Keyword::Qualifier),
    ("__extension__", Keyword::Qualifier),
    ("_Noreturn", Keyword::Qualifier),
    ("_Thread_local", Keyword::Qualifier),
    ("__thread", Keyword::Qualifier),
    ("__attribute__", Keyword::Extension),
    ("__attribute", Keyword::Extension),
    ("__asm__", Keyword::Extension),
    ("__asm", Keyword::Extension),
    ("asm", Keyword::Extension),
    ("__declspec", Keyword::Extension),
    ("_Alignas", Keyword::Extension),
    ("_Static_assert", Keyword::StaticAssert),
    ("static_assert", Keyword::StaticAssert),
];

/// The type a declaration's specifiers name, before any declarator is
/// applied to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Specifier {
    pub node: TypeId,
    /// The specifiers defined a struct or union without a tag.
    pub anonymous: bool,
}

/// The keywords that make up a built in type, collected in any order.
#[derive(Debug, Default)]
struct BaseSpec {
    signed: Option<bool>,
    short: bool,
    long: u8,
    core: Option<&'static str>,
}

impl BaseSpec {
    fn is_empty(&self) -> bool {
        self.signed.is_none() && !self.short && self.long == 0 && self.core.is_none()
    }

    fn add(&mut self, kw: Keyword, line: u32) -> ParserResult<()> {
        match kw {
            Keyword::Signed => {
                if self.signed == Some(false) {
                    return fail(line, ParserError::SignedAndUnsigned);
                }
                self.signed = Some(true);
            }
            Keyword::Unsigned => {
                if self.signed == Some(true) {
                    return fail(line, ParserError::SignedAndUnsigned);
                }
                self.signed = Some(false);
            }
            Keyword::Short => {
                if self.short || self.long > 0 {
                    return fail(line, ParserError::ConflictingSpecifiers);
                }
                self.short = true;
            }
            Keyword::Long => {
                if self.short || self.long >= 2 {
                    return fail(line, ParserError::ConflictingSpecifiers);
                }
                self.long += 1;
            }
            Keyword::Core(core) => {
                if self.core.is_some() {
                    return fail(line, ParserError::ConflictingSpecifiers);
                }
                self.core = Some(core);
            }
            _ => (),
        }
        Ok(())
    }

    /// The registry spelling of the collected keywords, e.g. `unsigned long`.
    fn canonical(&self, line: u32) -> ParserResult<String> {
        let core = match (self.core, self.short, self.long) {
            (None, false, 0) | (Some("int"), false, 0) => "int",
            (None, true, 0) | (Some("int"), true, 0) => "short",
            (None, false, 1) | (Some("int"), false, 1) => "long",
            (None, false, 2) | (Some("int"), false, 2) => "long long",
            (Some("double"), false, 1) => "long double",
            (Some(core), false, 0) => core,
            _ => return fail(line, ParserError::ConflictingSpecifiers),
        };

        Ok(match self.signed {
            Some(false) => format!("unsigned {}", core),
            Some(true) if core == "char" => "signed char".into(),
            _ => core.into(),
        })
    }
}

/// Parses every declaration produced by `lexer` into the type graph held by
/// `ctx`.  Dimensions that are not a single integer literal are handed to
/// `evaluator`.
pub fn parse<'a, 'st>(
    lexer: &'a mut Lexer<'st>,
    ctx: &'a mut CompileContext,
    st: &'st StringTable,
    evaluator: &'a dyn ConstantEvaluator,
) -> ParserResult<()> {
    let mut parser = Parser::new(lexer, ctx, st, evaluator);
    parser.unit()
}

pub struct Parser<'a, 'st> {
    pub(super) stream: TokenStream<'a, 'st>,
    pub(super) ctx: &'a mut CompileContext,
    pub(super) st: &'st StringTable,
    pub(super) evaluator: &'a dyn ConstantEvaluator,
    keywords: HashMap<StringId, Keyword>,
}

impl<'a, 'st> Parser<'a, 'st> {
    pub fn new(
        lexer: &'a mut Lexer<'st>,
        ctx: &'a mut CompileContext,
        st: &'st StringTable,
        evaluator: &'a dyn ConstantEvaluator,
    ) -> Parser<'a, 'st> {
        let keywords = KEYWORDS
            .iter()
            .map(|(s, kw)| (st.insert((*s).into()), *kw))
            .collect();

        Parser {
            stream: TokenStream::new(lexer),
            ctx,
            st,
            evaluator,
            keywords,
        }
    }

    pub fn unit(&mut self) -> ParserResult<()> {
        let mut count = 0;
        while !self.stream.peek()?.is_eof() {
            self.declaration(None)?;
            count += 1;
        }
        debug!(
            "Parsed {} declarations into {} type nodes",
            count,
            self.ctx.table.len()
        );
        Ok(())
    }

    /// Parses one declaration.  `container` is the struct or union whose body
    /// is being read, or `None` at file scope.
    fn declaration(&mut self, container: Option<TypeId>) -> ParserResult<()> {
        trace_parse!(self);
        let line = self.stream.peek()?.line;

        if self.stream.next_if_punct(';')?.is_some() {
            return Ok(());
        }

        if self.next_if_keyword(Keyword::StaticAssert)? {
            self.stream.next_must_be('(')?;
            self.skip_balanced('(', ')')?;
            self.stream.next_must_be(';')?;
            return Ok(());
        }

        let (spec, is_typedef) = self.specifiers()?;
        if self.stream.next_if_punct(';')?.is_some() {
            return self.bare_specifier(spec, container, line);
        }

        loop {
            let decl = self.declarator()?;
            self.skip_noise()?;

            if container.is_some() && self.stream.test_punct(':')? {
                return fail(decl.line, ParserError::BitFieldUnsupported(decl.name));
            }
            if self.stream.next_if_punct('=')?.is_some() {
                self.skip_initializer()?;
            }

            self.bind(spec, &decl, container, is_typedef)?;

            if container.is_none() && decl.is_function() && self.stream.test_punct('{')? {
                self.stream.next()?;
                return self.skip_balanced('{', '}');
            }

            if self.stream.next_if_punct(',')?.is_none() {
                break;
            }
        }

        self.stream.next_must_be(';')?;
        Ok(())
    }

    /// A declaration with specifiers and no declarators, e.g. `struct foo;`
    /// or an anonymous struct nested in another one.
    fn bare_specifier(
        &mut self,
        spec: Specifier,
        container: Option<TypeId>,
        line: u32,
    ) -> ParserResult<()> {
        if !spec.anonymous {
            return Ok(());
        }

        match container {
            None => {
                warn!("L{}: anonymous {} declares nothing", line, self.describe(spec.node));
                Ok(())
            }
            Some(container) => {
                let slot = {
                    let c = self.ctx.table.get(container);
                    if c.is_union() {
                        c.members.len()
                    } else {
                        c.items.len()
                    }
                };
                let name = self.st.insert(format!("anon{}", slot));
                self.bind(spec, &Declarator::new(name, line), Some(container), false)
            }
        }
    }

    fn specifiers(&mut self) -> ParserResult<(Specifier, bool)> {
        trace_parse!(self);
        let line = self.stream.peek()?.line;
        let mut is_typedef = false;
        let mut base = BaseSpec::default();
        let mut found: Option<Specifier> = None;

        loop {
            let token = self.stream.peek()?;
            let id = match token.sym {
                Lex::Identifier(id) => id,
                _ => break,
            };

            match self.keywords.get(&id).copied() {
                Some(Keyword::Typedef) => {
                    self.stream.next()?;
                    is_typedef = true;
                }
                Some(Keyword::Qualifier) => {
                    self.stream.next()?;
                }
                Some(Keyword::Extension) => {
                    self.stream.next()?;
                    self.skip_extension()?;
                }
                Some(Keyword::StaticAssert) => break,
                Some(kw @ Keyword::Struct) | Some(kw @ Keyword::Union) | Some(kw @ Keyword::Enum) => {
                    self.stream.next()?;
                    if found.is_some() || !base.is_empty() {
                        return fail(token.line, ParserError::ConflictingSpecifiers);
                    }
                    found = Some(match kw {
                        Keyword::Enum => self.enumeration(token.line)?,
                        Keyword::Union => self.tagged(NodeKind::Union, token.line)?,
                        _ => self.tagged(NodeKind::Struct, token.line)?,
                    });
                }
                Some(kw) => {
                    self.stream.next()?;
                    if found.is_some() {
                        return fail(token.line, ParserError::ConflictingSpecifiers);
                    }
                    base.add(kw, token.line)?;
                }
                None => {
                    // Once a type is known the next identifier is the declarator.
                    if found.is_some() || !base.is_empty() {
                        break;
                    }
                    match self.ctx.registry.lookup(id) {
                        Some(node) => {
                            self.stream.next()?;
                            found = Some(Specifier {
                                node,
                                anonymous: false,
                            });
                        }
                        None => return fail(token.line, ParserError::UnknownType(id)),
                    }
                }
            }
        }

        let spec = match found {
            Some(spec) => spec,
            None if !base.is_empty() => Specifier {
                node: self.base_type(&base, line)?,
                anonymous: false,
            },
            None => {
                let token = self.stream.peek()?;
                return if token.is_eof() {
                    fail(token.line, ParserError::UnexpectedEof)
                } else {
                    fail(token.line, ParserError::ExpectedTypeSpecifier(token.sym))
                };
            }
        };

        Ok((spec, is_typedef))
    }

    fn base_type(&self, base: &BaseSpec, line: u32) -> ParserResult<TypeId> {
        let name = base.canonical(line)?;
        match self.st.find(&name).and_then(|sid| self.ctx.registry.lookup(sid)) {
            Some(node) => Ok(node),
            None if base.signed == Some(false) => {
                fail(line, ParserError::UnknownUnsignedType(name))
            }
            None => fail(line, ParserError::UnsupportedBaseType(name)),
        }
    }

    /// Parses the rest of a `struct` or `union` specifier after its keyword.
    fn tagged(&mut self, kind: NodeKind, line: u32) -> ParserResult<Specifier> {
        trace_parse!(self);
        let keyword = if kind == NodeKind::Union {
            "union"
        } else {
            "struct"
        };

        self.skip_noise()?;
        let name = self.stream.next_if_id()?;
        self.skip_noise()?;
        let has_body = self.stream.test_punct('{')?;

        match name {
            None if has_body => {
                let node = self.ctx.table.add(kind, None, NodeState::Incomplete, line);
                self.body(node)?;
                Ok(Specifier {
                    node,
                    anonymous: true,
                })
            }
            None => fail(line, ParserError::AnonymousTagWithoutBody(keyword)),
            Some((name, _)) => {
                let tag = tag_name(self.st, keyword, name);
                let node = match self.ctx.registry.lookup(tag) {
                    Some(node) => node,
                    None => {
                        let node = self.ctx.table.add(kind, Some(name), NodeState::Incomplete, line);
                        self.ctx.registry.insert(tag, node);
                        node
                    }
                };

                if has_body {
                    if self.ctx.table.get(node).state != NodeState::Incomplete {
                        let spelled = self.spell(tag);
                        return fail(line, ParserError::DuplicateDefinition(spelled));
                    }
                    self.ctx.table.get_mut(node).line = line;
                    self.body(node)?;
                }

                Ok(Specifier {
                    node,
                    anonymous: false,
                })
            }
        }
    }

    fn body(&mut self, node: TypeId) -> ParserResult<()> {
        trace_parse!(self);
        self.stream.next_must_be('{')?;
        self.ctx.table.get_mut(node).state = NodeState::Defining;

        loop {
            let token = self.stream.peek()?;
            if token.sym.is_punct('}') {
                break;
            }
            if token.is_eof() {
                return fail(token.line, ParserError::UnexpectedEof);
            }
            self.declaration(Some(node))?;
        }
        self.stream.next()?;
        self.skip_noise()?;

        self.ctx.table.finish(node);
        let n = self.ctx.table.get(node);
        debug!(
            "L{}: defined {} as {}: {} bytes, align {}, {} items",
            n.line,
            self.describe(node),
            node,
            n.length,
            n.align,
            n.items.len() + n.members.len()
        );
        Ok(())
    }

    /// Enumerations are opaque: only their existence matters, every enum is a
    /// single `int` sized element.
    fn enumeration(&mut self, line: u32) -> ParserResult<Specifier> {
        trace_parse!(self);
        self.skip_noise()?;
        let name = self.stream.next_if_id()?;
        self.skip_noise()?;

        let has_body = self.stream.next_if_punct('{')?.is_some();
        if has_body {
            self.skip_balanced('{', '}')?;
            self.skip_noise()?;
        }

        let node = match name {
            None if has_body => self.ctx.table.add_scalar(NodeKind::Enum, None, ElementKind::Enum),
            None => return fail(line, ParserError::AnonymousTagWithoutBody("enum")),
            Some((name, _)) => {
                let tag = tag_name(self.st, "enum", name);
                match self.ctx.registry.lookup(tag) {
                    Some(node) => {
                        if has_body {
                            if self.ctx.table.get(node).is_defined() {
                                let spelled = self.spell(tag);
                                return fail(line, ParserError::DuplicateDefinition(spelled));
                            }
                            self.ctx.table.get_mut(node).state = NodeState::Defined;
                        }
                        node
                    }
                    None => {
                        let node =
                            self.ctx.table.add_scalar(NodeKind::Enum, Some(name), ElementKind::Enum);
                        let n = self.ctx.table.get_mut(node);
                        n.line = line;
                        if !has_body {
                            n.state = NodeState::Incomplete;
                        }
                        self.ctx.registry.insert(tag, node);
                        node
                    }
                }
            }
        };

        Ok(Specifier {
            node,
            anonymous: false,
        })
    }

    /// Records what a declarator declares: a typedef name, a field of
    /// `container`, or nothing for objects and functions at file scope.
    fn bind(
        &mut self,
        spec: Specifier,
        decl: &Declarator,
        container: Option<TypeId>,
        is_typedef: bool,
    ) -> ParserResult<()> {
        if spec.anonymous {
            let node = self.ctx.table.get_mut(spec.node);
            if node.fragment.is_none() {
                node.fragment = Some(decl.name);
            }
        }

        if is_typedef {
            return self.bind_typedef(spec, decl);
        }

        let container = match container {
            Some(container) => container,
            None => return Ok(()),
        };

        let item = self.item_for(spec.node, decl)?;
        let table = &mut self.ctx.table;
        if table.get(container).is_union() {
            let member = table.add(NodeKind::UnionMember, None, NodeState::Defining, decl.line);
            table.append_item(member, item);
            table.finish(member);
            table.add_member(container, member);
        } else {
            table.append_item(container, item);
        }
        Ok(())
    }

    fn bind_typedef(&mut self, spec: Specifier, decl: &Declarator) -> ParserResult<()> {
        if decl.derivs.is_empty() {
            // A plain alias.  The first alias of an untagged type names it.
            let node = self.ctx.table.get_mut(spec.node);
            if node.name.is_none() {
                node.name = Some(decl.name);
            }
            self.ctx.registry.insert(decl.name, spec.node);
            debug!(
                "L{}: typedef {} names {}",
                decl.line,
                self.spell(decl.name),
                spec.node
            );
        } else {
            let item = self.item_for(spec.node, decl)?;
            let table = &mut self.ctx.table;
            let node = table.add(NodeKind::Typedef, Some(decl.name), NodeState::Defining, decl.line);
            table.append_item(node, item);
            table.finish(node);
            self.ctx.registry.insert(decl.name, node);
            debug!(
                "L{}: typedef {} is {}x{:?}",
                decl.line,
                self.spell(decl.name),
                item.count,
                item.kind
            );
        }
        Ok(())
    }

    fn next_if_keyword(&mut self, kw: Keyword) -> ParserResult<bool> {
        let token = self.stream.peek()?;
        let matches = match token.sym {
            Lex::Identifier(id) => self.keywords.get(&id) == Some(&kw),
            _ => false,
        };
        if matches {
            self.stream.next()?;
        }
        Ok(matches)
    }

    /// Skips qualifiers and attribute groups.
    pub(super) fn skip_noise(&mut self) -> ParserResult<()> {
        loop {
            let id = match self.stream.peek()?.sym {
                Lex::Identifier(id) => id,
                _ => return Ok(()),
            };
            match self.keywords.get(&id) {
                Some(Keyword::Qualifier) => {
                    self.stream.next()?;
                }
                Some(Keyword::Extension) => {
                    self.stream.next()?;
                    self.skip_extension()?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_extension(&mut self) -> ParserResult<()> {
        if self.stream.next_if_punct('(')?.is_some() {
            self.skip_balanced('(', ')')?;
        }
        Ok(())
    }

    /// Skips tokens up to and including the `close` that matches an `open`
    /// which has already been consumed.
    pub(super) fn skip_balanced(&mut self, open: char, close: char) -> ParserResult<()> {
        let mut depth = 1;
        while depth > 0 {
            let token = self.stream.next()?;
            if token.is_eof() {
                return fail(token.line, ParserError::UnexpectedEof);
            }
            if token.sym.is_punct(open) {
                depth += 1;
            } else if token.sym.is_punct(close) {
                depth -= 1;
            }
        }
        Ok(())
    }

    /// Skips an initializer, stopping in front of the `,` or `;` that ends it.
    fn skip_initializer(&mut self) -> ParserResult<()> {
        let mut depth = 0u32;
        loop {
            let token = self.stream.peek()?;
            match token.sym {
                Lex::Eof => return fail(token.line, ParserError::UnexpectedEof),
                Lex::Punct('(') | Lex::Punct('[') | Lex::Punct('{') => depth += 1,
                Lex::Punct(')') | Lex::Punct(']') | Lex::Punct('}') => {
                    depth = depth.saturating_sub(1)
                }
                Lex::Punct(',') | Lex::Punct(';') if depth == 0 => return Ok(()),
                _ => (),
            }
            self.stream.next()?;
        }
    }

    pub(super) fn spell(&self, id: StringId) -> String {
        self.st.get(id).unwrap_or_default()
    }

    /// A readable name for a node, e.g. `struct foo` or `anonymous union`.
    pub(super) fn describe(&self, node: TypeId) -> String {
        let n = self.ctx.table.get(node);
        let kind = match n.kind {
            NodeKind::Struct => "struct",
            NodeKind::Union => "union",
            NodeKind::Enum => "enum",
            NodeKind::UnionMember => "union member",
            NodeKind::Typedef => "typedef",
            NodeKind::Base => "type",
        };
        match n.name {
            Some(name) => format!("{} {}", kind, self.spell(name)),
            None => format!("anonymous {}", kind),
        }
    }
}
