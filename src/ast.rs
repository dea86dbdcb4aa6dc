#![forbid(unsafe_code)]

//! The abstract AST boundary the rule engine depends on, plus a single concrete
//! implementation: an arena-backed syntax tree and a small recursive-descent parser for a
//! minimal illustrative call/expression language.
//!
//! Production callers are expected to supply a real grammar (tree-sitter or otherwise) built
//! the same shape as [`SyntaxTree`]/[`Node`]: node kind, byte range, children in source order,
//! node text, a language tag, and [`SyntaxTree::is_binding_boundary`]. The engine itself only
//! ever touches that surface, never anything language-specific.

use crate::types::Language;
use std::fmt;
use std::ops::Range;

/// Identifies a node within a [`SyntaxTree`]: an opaque arena slot, assigned in allocation
/// order during parsing. Allocation order does *not* track structural (pre-order) position —
/// postfix constructs like member access and calls allocate their wrapping node only after
/// their receiver/callee has already been parsed and allocated, so a wrapping node's id can
/// exceed its own child's. Use [`Node::pre_order_index`] for the engine's emission-order
/// contract instead; it is computed by an explicit traversal once parsing finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

#[derive(Debug)]
struct NodeRecord {
    kind: &'static str,
    byte_range: Range<usize>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    metavar_name: Option<String>,
    pre_order: u32,
}

/// A parsed syntax tree: the source text plus an arena of nodes.
#[derive(Debug)]
pub struct SyntaxTree {
    source: String,
    language: Language,
    nodes: Vec<NodeRecord>,
}

impl SyntaxTree {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn root(&self) -> Node<'_> {
        Node {
            tree: self,
            id: NodeId(0),
        }
    }

    /// The single meaningful root for pattern matching: if the parsed fragment is a
    /// `source_file` wrapping exactly one statement, returns that statement; otherwise
    /// returns the `source_file` node itself (matching would then only succeed against an
    /// entire file, which is never what a pattern author wants but is not an error).
    pub fn pattern_root(&self) -> Node<'_> {
        let root = self.root();
        if root.kind() == SOURCE_FILE {
            let children: Vec<_> = root.children().collect();
            if children.len() == 1 {
                return children.into_iter().next().unwrap();
            }
        }
        root
    }

    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node { tree: self, id }
    }

    /// Language-specific predicate deciding whether `node` introduces a new lexical binding
    /// scope that `cursor` scope must not traverse past. In this minimal language, only block
    /// bodies (`do |..| .. end`) are binding boundaries.
    pub fn is_binding_boundary(&self, node: &Node<'_>) -> bool {
        node.kind() == BLOCK
    }
}

pub const SOURCE_FILE: &str = "source_file";
pub const IDENTIFIER: &str = "identifier";
pub const CONSTANT: &str = "constant";
pub const NUMBER: &str = "number";
pub const STRING: &str = "string";
pub const METAVARIABLE: &str = "metavariable";
pub const MEMBER_ACCESS: &str = "member_access";
pub const CALL: &str = "call";
pub const KEYWORD_ARG: &str = "keyword_arg";
pub const HASH: &str = "hash";
pub const PAIR: &str = "pair";
pub const BLOCK: &str = "block";
pub const BLOCK_PARAMS: &str = "block_params";
pub const PARAM: &str = "param";

/// A borrowed handle to one node of a [`SyntaxTree`]. Cheap to copy; all data lives in the
/// tree's arena.
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl<'t> Node<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        self.record().kind
    }

    pub fn byte_range(&self) -> Range<usize> {
        self.record().byte_range.clone()
    }

    /// The exact source slice covered by this node.
    pub fn text(&self) -> &'t str {
        &self.tree.source[self.record().byte_range.clone()]
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'t>> + 't {
        let tree = self.tree;
        self.record().children.clone().into_iter().map(move |id| Node { tree, id })
    }

    pub fn child(&self, index: usize) -> Option<Node<'t>> {
        self.record().children.get(index).map(|&id| Node { tree: self.tree, id })
    }

    pub fn parent(&self) -> Option<Node<'t>> {
        self.record().parent.map(|id| Node { tree: self.tree, id })
    }

    /// Name of the metavariable this node stands for, if `kind() == METAVARIABLE`.
    pub fn metavar_name(&self) -> Option<&'t str> {
        self.record().metavar_name.as_deref()
    }

    /// 1-indexed (line, column) of the node's first byte.
    pub fn start_position(&self) -> (usize, usize) {
        byte_to_line_col(&self.tree.source, self.record().byte_range.start)
    }

    /// This node's position in a pre-order (root, then children left to right, recursively)
    /// traversal of the whole tree. Distinct from [`NodeId`], which only reflects parser
    /// allocation order; this is what the engine's emission-order contract sorts by.
    pub fn pre_order_index(&self) -> usize {
        self.record().pre_order as usize
    }

    /// Is `other` an ancestor of `self` (inclusive)?
    pub fn is_descendant_of(&self, other: &Node<'_>) -> bool {
        let mut cur = *self;
        loop {
            if cur.id == other.id {
                return true;
            }
            match cur.parent() {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }

    /// The nearest ancestor (inclusive) for which [`SyntaxTree::is_binding_boundary`] holds, or
    /// the tree root if none does. Used for the "detailed context" report rendering.
    pub fn enclosing_binding_boundary(&self) -> Node<'t> {
        let mut cur = *self;
        loop {
            if self.tree.is_binding_boundary(&cur) {
                return cur;
            }
            match cur.parent() {
                Some(p) => cur = p,
                None => return cur,
            }
        }
    }

    /// The single source line containing this node's first byte.
    pub fn line_text(&self) -> &'t str {
        let source = &self.tree.source;
        let offset = self.record().byte_range.start;
        let start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let end = source[offset..].find('\n').map(|i| offset + i).unwrap_or(source.len());
        &source[start..end]
    }

    fn record(&self) -> &'t NodeRecord {
        &self.tree.nodes[self.id.0 as usize]
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}, {:?})", self.kind(), self.text())
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Node<'_> {}

fn byte_to_line_col(source: &str, byte_offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= byte_offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("syntax error at byte {offset}: {message}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

/// Parses `source` as the minimal illustrative language, producing a [`SyntaxTree`].
///
/// Grammar (informally): a program is a sequence of expression statements; expressions are
/// identifiers, constants, numbers, double-quoted strings, `$metavariables`, member access
/// (`a.b`), calls (`f(args)` / `a.f(args)`) with optional keyword arguments (`name: value`) and
/// an optional trailing `do |params| .. end` block, and hash literals (`{ k => v, .. }`).
pub fn parse(source: &str, language: Language) -> Result<SyntaxTree, ParseError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        builder: Builder { nodes: Vec::new() },
    };
    let root = parser.parse_source_file()?;
    parser.expect_eof()?;
    let Builder { mut nodes } = parser.builder;
    nodes[root.0 as usize].parent = None;
    assign_pre_order(&mut nodes, root);
    Ok(SyntaxTree {
        source: source.to_string(),
        language,
        nodes,
    })
}

/// Numbers every node with its pre-order position, root first. Allocation order (the `NodeId`
/// values themselves) cannot be relied on for this: postfix grammar constructs allocate their
/// wrapping node only after recursing into the receiver/callee they wrap.
fn assign_pre_order(nodes: &mut [NodeRecord], root: NodeId) {
    let mut stack = vec![root];
    let mut index = 0u32;
    while let Some(id) = stack.pop() {
        nodes[id.0 as usize].pre_order = index;
        index += 1;
        let children = nodes[id.0 as usize].children.clone();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
}

struct Builder {
    nodes: Vec<NodeRecord>,
}

impl Builder {
    fn alloc(&mut self) -> NodeId {
        self.nodes.push(NodeRecord {
            kind: SOURCE_FILE,
            byte_range: 0..0,
            children: Vec::new(),
            parent: None,
            metavar_name: None,
            pre_order: 0,
        });
        NodeId((self.nodes.len() - 1) as u32)
    }

    fn finish(
        &mut self,
        id: NodeId,
        kind: &'static str,
        byte_range: Range<usize>,
        children: Vec<NodeId>,
        metavar_name: Option<String>,
    ) {
        for &child in &children {
            self.nodes[child.0 as usize].parent = Some(id);
        }
        self.nodes[id.0 as usize] = NodeRecord {
            kind,
            byte_range,
            children,
            parent: None,
            metavar_name,
            pre_order: 0,
        };
    }
}

// --- lexer ---

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokKind {
    Ident(String),
    Constant(String),
    Number(String),
    Str(String),
    MetaVar(String),
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Colon,
    FatArrow,
    Pipe,
    Do,
    End,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokKind,
    start: usize,
    end: usize,
}

fn lex(source: &str) -> Result<Vec<Token>, ParseError> {
    let bytes = source.as_bytes();
    let mut i = 0;
    let mut tokens = Vec::new();
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        match c {
            '.' => {
                tokens.push(Token { kind: TokKind::Dot, start, end: i + 1 });
                i += 1;
            }
            '(' => {
                tokens.push(Token { kind: TokKind::LParen, start, end: i + 1 });
                i += 1;
            }
            ')' => {
                tokens.push(Token { kind: TokKind::RParen, start, end: i + 1 });
                i += 1;
            }
            '{' => {
                tokens.push(Token { kind: TokKind::LBrace, start, end: i + 1 });
                i += 1;
            }
            '}' => {
                tokens.push(Token { kind: TokKind::RBrace, start, end: i + 1 });
                i += 1;
            }
            ',' => {
                tokens.push(Token { kind: TokKind::Comma, start, end: i + 1 });
                i += 1;
            }
            ':' => {
                tokens.push(Token { kind: TokKind::Colon, start, end: i + 1 });
                i += 1;
            }
            '|' => {
                tokens.push(Token { kind: TokKind::Pipe, start, end: i + 1 });
                i += 1;
            }
            '=' if bytes.get(i + 1) == Some(&b'>') => {
                tokens.push(Token { kind: TokKind::FatArrow, start, end: i + 2 });
                i += 2;
            }
            '"' => {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j] != b'"' {
                    j += 1;
                }
                if j >= bytes.len() {
                    return Err(ParseError { offset: i, message: "unterminated string".into() });
                }
                let content = source[i + 1..j].to_string();
                tokens.push(Token { kind: TokKind::Str(content), start, end: j + 1 });
                i = j + 1;
            }
            '$' => {
                let mut j = i + 1;
                while j < bytes.len() && (is_ident_continue(bytes[j] as char)) {
                    j += 1;
                }
                if j == i + 1 {
                    return Err(ParseError { offset: i, message: "empty metavariable name".into() });
                }
                let name = source[i + 1..j].to_string();
                tokens.push(Token { kind: TokKind::MetaVar(name), start, end: j });
                i = j;
            }
            _ if c.is_ascii_digit() => {
                let mut j = i;
                while j < bytes.len() && (bytes[j] as char).is_ascii_digit() {
                    j += 1;
                }
                tokens.push(Token { kind: TokKind::Number(source[i..j].to_string()), start, end: j });
                i = j;
            }
            _ if is_ident_start(c) => {
                let mut j = i;
                while j < bytes.len() && is_ident_continue(bytes[j] as char) {
                    j += 1;
                }
                let word = &source[i..j];
                let kind = match word {
                    "do" => TokKind::Do,
                    "end" => TokKind::End,
                    _ if word.chars().next().unwrap().is_uppercase() => {
                        TokKind::Constant(word.to_string())
                    }
                    _ => TokKind::Ident(word.to_string()),
                };
                tokens.push(Token { kind, start, end: j });
                i = j;
            }
            _ => {
                return Err(ParseError { offset: i, message: format!("unexpected character {c:?}") });
            }
        }
    }
    let end = bytes.len();
    tokens.push(Token { kind: TokKind::Eof, start: end, end });
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// --- parser ---

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    builder: Builder,
}

impl Parser {
    fn peek(&self) -> &TokKind {
        &self.tokens[self.pos].kind
    }

    fn peek_start(&self) -> usize {
        self.tokens[self.pos].start
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if matches!(self.peek(), TokKind::Eof) {
            Ok(())
        } else {
            Err(ParseError { offset: self.peek_start(), message: "trailing input".into() })
        }
    }

    fn parse_source_file(&mut self) -> Result<NodeId, ParseError> {
        let id = self.builder.alloc();
        let start = self.peek_start();
        let mut children = Vec::new();
        while !matches!(self.peek(), TokKind::Eof) {
            children.push(self.parse_expr()?);
        }
        let end = if let Some(&last) = children.last() {
            self.builder.nodes[last.0 as usize].byte_range.end
        } else {
            start
        };
        self.builder.finish(id, SOURCE_FILE, start..end, children, None);
        Ok(id)
    }

    fn parse_expr(&mut self) -> Result<NodeId, ParseError> {
        let mut node = self.parse_primary()?;
        loop {
            match self.peek() {
                TokKind::Dot => {
                    self.bump();
                    let name_tok = self.bump();
                    let prop_name = match name_tok.kind {
                        TokKind::Ident(s) => s,
                        _ => {
                            return Err(ParseError {
                                offset: name_tok.start,
                                message: "expected identifier after '.'".into(),
                            });
                        }
                    };
                    let prop_id = self.builder.alloc();
                    self.builder.finish(
                        prop_id,
                        IDENTIFIER,
                        name_tok.start..name_tok.end,
                        Vec::new(),
                        None,
                    );
                    let start = self.builder.nodes[node.0 as usize].byte_range.start;
                    let access_id = self.builder.alloc();
                    self.builder.finish(
                        access_id,
                        MEMBER_ACCESS,
                        start..name_tok.end,
                        vec![node, prop_id],
                        None,
                    );
                    node = access_id;

                    if matches!(self.peek(), TokKind::LParen) {
                        node = self.parse_call(node, start)?;
                    }
                }
                TokKind::LParen => {
                    let start = self.builder.nodes[node.0 as usize].byte_range.start;
                    node = self.parse_call(node, start)?;
                }
                _ => break,
            }
        }
        Ok(node)
    }

    /// `callee(...)` with optional trailing `do |..| .. end` block. `callee` is either an
    /// `identifier`/`metavariable` (no receiver) or a `member_access` node (receiver.method).
    fn parse_call(&mut self, callee: NodeId, start: usize) -> Result<NodeId, ParseError> {
        self.bump(); // '('
        let mut args = Vec::new();
        if !matches!(self.peek(), TokKind::RParen) {
            loop {
                args.push(self.parse_arg()?);
                if matches!(self.peek(), TokKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        let rparen = self.bump();
        if !matches!(rparen.kind, TokKind::RParen) {
            return Err(ParseError { offset: rparen.start, message: "expected ')'".into() });
        }
        let mut end = rparen.end;

        let mut children = vec![callee];
        children.extend(args);

        if matches!(self.peek(), TokKind::Do) {
            let block_id = self.parse_block()?;
            end = self.builder.nodes[block_id.0 as usize].byte_range.end;
            children.push(block_id);
        }

        let id = self.builder.alloc();
        self.builder.finish(id, CALL, start..end, children, None);
        Ok(id)
    }

    fn parse_arg(&mut self) -> Result<NodeId, ParseError> {
        if let TokKind::Ident(name) = self.peek().clone() {
            if matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokKind::Colon)) {
                let name_tok = self.bump();
                self.bump(); // ':'
                let value = self.parse_expr()?;
                let name_id = self.builder.alloc();
                self.builder.finish(
                    name_id,
                    IDENTIFIER,
                    name_tok.start..name_tok.end,
                    Vec::new(),
                    None,
                );
                let start = name_tok.start;
                let end = self.builder.nodes[value.0 as usize].byte_range.end;
                let _ = name; // silence unused binding in this branch
                let id = self.builder.alloc();
                self.builder.finish(id, KEYWORD_ARG, start..end, vec![name_id, value], None);
                return Ok(id);
            }
        }
        self.parse_expr()
    }

    fn parse_block(&mut self) -> Result<NodeId, ParseError> {
        let do_tok = self.bump(); // 'do'
        let mut params = Vec::new();
        if matches!(self.peek(), TokKind::Pipe) {
            self.bump();
            while !matches!(self.peek(), TokKind::Pipe) {
                let tok = self.bump();
                if let TokKind::Ident(name) = &tok.kind {
                    let _ = name;
                    let pid = self.builder.alloc();
                    self.builder.finish(pid, PARAM, tok.start..tok.end, Vec::new(), None);
                    params.push(pid);
                }
                if matches!(self.peek(), TokKind::Comma) {
                    self.bump();
                }
            }
            self.bump(); // closing '|'
        }
        let params_start = do_tok.start;
        let params_end = self.tokens[self.pos].start;
        let params_id = self.builder.alloc();
        self.builder.finish(params_id, BLOCK_PARAMS, params_start..params_end, params, None);

        let mut body = Vec::new();
        while !matches!(self.peek(), TokKind::End) {
            if matches!(self.peek(), TokKind::Eof) {
                return Err(ParseError { offset: self.peek_start(), message: "unterminated block".into() });
            }
            body.push(self.parse_expr()?);
        }
        let end_tok = self.bump(); // 'end'

        let mut children = vec![params_id];
        children.extend(body);
        let id = self.builder.alloc();
        self.builder.finish(id, BLOCK, do_tok.start..end_tok.end, children, None);
        Ok(id)
    }

    fn parse_hash(&mut self) -> Result<NodeId, ParseError> {
        let lbrace = self.bump(); // '{'
        let mut pairs = Vec::new();
        if !matches!(self.peek(), TokKind::RBrace) {
            loop {
                let key = self.parse_expr()?;
                let arrow = self.bump();
                if !matches!(arrow.kind, TokKind::FatArrow) {
                    return Err(ParseError { offset: arrow.start, message: "expected '=>'".into() });
                }
                let value = self.parse_expr()?;
                let start = self.builder.nodes[key.0 as usize].byte_range.start;
                let end = self.builder.nodes[value.0 as usize].byte_range.end;
                let pair_id = self.builder.alloc();
                self.builder.finish(pair_id, PAIR, start..end, vec![key, value], None);
                pairs.push(pair_id);
                if matches!(self.peek(), TokKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        let rbrace = self.bump();
        if !matches!(rbrace.kind, TokKind::RBrace) {
            return Err(ParseError { offset: rbrace.start, message: "expected '}'".into() });
        }
        let id = self.builder.alloc();
        self.builder.finish(id, HASH, lbrace.start..rbrace.end, pairs, None);
        Ok(id)
    }

    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        let tok = self.bump();
        match tok.kind {
            TokKind::Ident(_) => {
                let id = self.builder.alloc();
                self.builder.finish(id, IDENTIFIER, tok.start..tok.end, Vec::new(), None);
                Ok(id)
            }
            TokKind::Constant(_) => {
                let id = self.builder.alloc();
                self.builder.finish(id, CONSTANT, tok.start..tok.end, Vec::new(), None);
                Ok(id)
            }
            TokKind::Number(_) => {
                let id = self.builder.alloc();
                self.builder.finish(id, NUMBER, tok.start..tok.end, Vec::new(), None);
                Ok(id)
            }
            TokKind::Str(_) => {
                let id = self.builder.alloc();
                self.builder.finish(id, STRING, tok.start..tok.end, Vec::new(), None);
                Ok(id)
            }
            TokKind::MetaVar(name) => {
                let id = self.builder.alloc();
                self.builder.finish(id, METAVARIABLE, tok.start..tok.end, Vec::new(), Some(name));
                Ok(id)
            }
            TokKind::LBrace => {
                self.pos -= 1;
                self.parse_hash()
            }
            _ => Err(ParseError { offset: tok.start, message: format!("unexpected token {:?}", tok.kind) }),
        }
    }
}
