//! Completion candidates at a cursor position
//!
//! Two modes: after a `.` the candidates are the members reachable through
//! the expression left of the dot; anywhere else they are the names in
//! scope plus keywords. Candidates are filtered against the identifier
//! prefix already typed, and descriptions are only built for the ones that
//! survive.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, WorkspaceError};
use crate::semantic::display;
use crate::semantic::types::{MemberId, MemberKind, TypeKind};
use crate::semantic::{CompiledDocument, Compilation, Declarations, Symbol, SymbolKind, TypeId};
use crate::syntax::{finder, text, Keyword, TextSpan, TokenKind};

/// What caused the completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionTrigger {
    /// Explicit request, or a `.` was typed
    Invoke,
    /// A character was typed
    Insertion(char),
}

impl CompletionTrigger {
    /// Classify by the character just before `offset` (a byte offset)
    pub fn at(source: &str, offset: usize) -> Self {
        match text::char_before(source, offset) {
            None | Some('.') => CompletionTrigger::Invoke,
            Some(c) => CompletionTrigger::Insertion(c),
        }
    }
}

/// Coarse kind used for the UI icon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    Field,
    Property,
    Variable,
    Function,
    Class,
    Enum,
    Other,
}

impl From<SymbolKind> for CompletionKind {
    fn from(kind: SymbolKind) -> Self {
        match kind {
            SymbolKind::Field => CompletionKind::Field,
            SymbolKind::Property => CompletionKind::Property,
            SymbolKind::Local => CompletionKind::Variable,
            SymbolKind::Method => CompletionKind::Function,
            SymbolKind::NamedType => CompletionKind::Class,
            SymbolKind::Namespace | SymbolKind::Parameter | SymbolKind::Keyword => {
                CompletionKind::Other
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCandidate {
    pub label: String,
    pub description: Option<String>,
    pub kind: CompletionKind,
    /// Character span the label replaces
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionOptions {
    pub max_items: usize,
    pub include_keywords: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_items: 200,
            include_keywords: true,
        }
    }
}

// ============================================================================
// Raw Candidates
// ============================================================================

#[derive(Debug, Clone)]
enum Source {
    Symbol(Symbol),
    /// A method group; one candidate per name
    Methods(Vec<MemberId>),
    Keyword,
}

#[derive(Debug, Clone)]
struct Raw {
    label: String,
    kind: CompletionKind,
    source: Source,
}

/// Candidates in discovery order, one per label (first wins)
#[derive(Default)]
struct Collector {
    items: Vec<Raw>,
    seen: HashSet<String>,
}

impl Collector {
    fn push(&mut self, label: &str, kind: CompletionKind, source: Source) {
        if label.is_empty() || !self.seen.insert(label.to_string()) {
            return;
        }
        self.items.push(Raw {
            label: label.to_string(),
            kind,
            source,
        });
    }

    fn symbol(&mut self, decls: &Declarations, compiled: &CompiledDocument, label: &str, symbol: Symbol) {
        let kind = kind_of(decls, compiled, &symbol);
        self.push(label, kind, Source::Symbol(symbol));
    }

    /// Members grouped by name; methods become one group candidate
    fn members(&mut self, decls: &Declarations, members: impl IntoIterator<Item = MemberId>) {
        let mut groups: BTreeMap<usize, (String, Vec<MemberId>)> = BTreeMap::new();
        let mut order: HashMap<String, usize> = HashMap::new();
        for id in members {
            let member = decls.member(id);
            if member.kind == MemberKind::Constructor {
                continue;
            }
            let next = order.len();
            let slot = *order.entry(member.name.clone()).or_insert(next);
            groups
                .entry(slot)
                .or_insert_with(|| (member.name.clone(), Vec::new()))
                .1
                .push(id);
        }
        for (_, (name, ids)) in groups {
            let first = decls.member(ids[0]);
            match first.kind {
                MemberKind::Method => self.push(&name, CompletionKind::Function, Source::Methods(ids)),
                MemberKind::Property => {
                    self.push(&name, CompletionKind::Property, Source::Symbol(Symbol::Member(ids[0])))
                }
                _ => self.push(&name, CompletionKind::Field, Source::Symbol(Symbol::Member(ids[0]))),
            }
        }
    }

    fn types(&mut self, decls: &Declarations, types: impl IntoIterator<Item = TypeId>) {
        for id in types {
            let name = decls.type_def(id).name.clone();
            let kind = type_kind(decls, id);
            self.push(&name, kind, Source::Symbol(Symbol::Type(id)));
        }
    }
}

fn type_kind(decls: &Declarations, id: TypeId) -> CompletionKind {
    match decls.type_def(id).kind {
        TypeKind::Enum => CompletionKind::Enum,
        TypeKind::Class | TypeKind::Struct => CompletionKind::Class,
    }
}

fn kind_of(decls: &Declarations, compiled: &CompiledDocument, symbol: &Symbol) -> CompletionKind {
    match symbol {
        Symbol::Type(id) => type_kind(decls, *id),
        other => display::symbol_kind(decls, &compiled.model, other).into(),
    }
}

// ============================================================================
// Query
// ============================================================================

/// Completion candidates for `document` at character `position`
pub fn complete(
    compilation: &Compilation,
    document: &str,
    position: usize,
    options: &CompletionOptions,
    cancel: &CancellationToken,
) -> Result<Vec<CompletionCandidate>> {
    let Some(compiled) = compilation.document(document) else {
        return Ok(Vec::new());
    };
    let tree = &compiled.tree;
    let source = tree.text.as_str();
    let Some(offset) = text::char_to_byte(source, position) else {
        return Ok(Vec::new());
    };

    let trigger = CompletionTrigger::at(source, offset);
    if tree.in_comment_or_literal(offset) {
        return Ok(Vec::new());
    }

    let word_start = identifier_start(source, offset);
    if source[word_start..offset].starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(Vec::new());
    }
    let word_end = identifier_end(source, offset);

    let decls = &compilation.decls;
    let raw = match tree.token_before(word_start) {
        Some(token) if token.kind == TokenKind::Dot => {
            match finder::member_access_at_dot(&tree.root, token.span) {
                Some(access) => member_candidates(decls, compiled, access, offset),
                None => Vec::new(),
            }
        }
        _ => general_candidates(decls, compiled, offset, options.include_keywords),
    };

    // Every candidate replaces the same identifier, so the prefix is sliced once
    let typed = &source[word_start..offset];
    let mut matched: Vec<(u8, Raw)> = raw
        .into_iter()
        .filter_map(|candidate| match_rank(&candidate.label, typed).map(|rank| (rank, candidate)))
        .collect();
    matched.sort_by(|(a_rank, a), (b_rank, b)| {
        a_rank
            .cmp(b_rank)
            .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
            .then_with(|| a.label.cmp(&b.label))
    });
    matched.truncate(options.max_items);

    let (from, to) = text::span_to_chars(source, TextSpan::new(word_start, word_end));
    let mut out = Vec::with_capacity(matched.len());
    for (_, candidate) in matched {
        if cancel.is_cancelled() {
            return Err(WorkspaceError::Cancelled);
        }
        let description = describe(decls, compiled, &candidate);
        out.push(CompletionCandidate {
            label: candidate.label,
            description,
            kind: candidate.kind,
            from,
            to,
        });
    }

    tracing::debug!(
        document = %document,
        position,
        ?trigger,
        candidates = out.len(),
        "completion computed"
    );
    Ok(out)
}

fn member_candidates(
    decls: &Declarations,
    compiled: &CompiledDocument,
    access: &crate::syntax::Expr,
    offset: usize,
) -> Vec<Raw> {
    let crate::syntax::ExprKind::Member { target, .. } = &access.kind else {
        return Vec::new();
    };
    let model = &compiled.model;
    let from_type = model.innermost_scope(offset).and_then(|s| s.enclosing_type);
    let mut collector = Collector::default();

    let accessible = |id: &MemberId| decls.is_accessible(decls.member(*id), from_type);

    match model.symbol(target.id) {
        Some(Symbol::Namespace(namespace)) => {
            for child in decls.child_namespaces(namespace) {
                let full = format!("{}.{}", namespace, child);
                collector.push(&child, CompletionKind::Other, Source::Symbol(Symbol::Namespace(full)));
            }
            let types: Vec<TypeId> = decls
                .types_in(namespace)
                .iter()
                .copied()
                .filter(|id| decls.is_type_accessible(*id))
                .collect();
            collector.types(decls, types);
        }
        Some(Symbol::Type(id)) => {
            let statics: Vec<MemberId> = decls
                .all_members(*id)
                .into_iter()
                .filter(|m| decls.member(*m).is_static)
                .filter(accessible)
                .collect();
            collector.members(decls, statics);
        }
        Some(Symbol::Global(id)) => {
            let members: Vec<MemberId> = decls.all_members(*id).into_iter().filter(accessible).collect();
            collector.members(decls, members);
        }
        _ => {
            let Some(host) = model.expr_type(target.id).and_then(|ty| decls.member_host(ty)) else {
                return Vec::new();
            };
            let instance: Vec<MemberId> = decls
                .all_members(host)
                .into_iter()
                .filter(|m| !decls.member(*m).is_static)
                .filter(accessible)
                .collect();
            collector.members(decls, instance);
        }
    }
    collector.items
}

fn general_candidates(
    decls: &Declarations,
    compiled: &CompiledDocument,
    offset: usize,
    include_keywords: bool,
) -> Vec<Raw> {
    let model = &compiled.model;
    let scopes = model.scopes_at(offset);
    let mut collector = Collector::default();

    // Locals and local functions, innermost scope first so inner names win
    for scope in scopes.iter().rev() {
        for id in &scope.locals {
            let local = model.local(*id);
            if local.visible_from <= offset {
                collector.symbol(decls, compiled, &local.name, Symbol::Local(*id));
            }
        }
        for id in &scope.functions {
            let function = model.function(*id);
            collector.symbol(decls, compiled, &function.name, Symbol::Function(*id));
        }
    }

    let innermost = scopes.last();
    if let Some(scope) = innermost {
        if let Some(owner) = scope.enclosing_type {
            let members: Vec<MemberId> = decls
                .all_members(owner)
                .into_iter()
                .filter(|m| !scope.is_static || decls.member(*m).is_static)
                .collect();
            collector.members(decls, members);
        }
    }

    for id in decls.globals() {
        let name = decls.type_def(*id).name.clone();
        collector.push(&name, CompletionKind::Field, Source::Symbol(Symbol::Global(*id)));
    }

    let namespace = innermost.map(|s| s.namespace.as_str()).unwrap_or("");
    let imports = model.imports.within(namespace);
    collector.types(decls, imports.visible_types(decls));

    for child in decls.child_namespaces("") {
        collector.push(&child, CompletionKind::Other, Source::Symbol(Symbol::Namespace(child.clone())));
    }

    if include_keywords {
        for keyword in Keyword::ALL {
            collector.push(keyword.as_str(), CompletionKind::Other, Source::Keyword);
        }
    }
    collector.items
}

fn describe(decls: &Declarations, compiled: &CompiledDocument, candidate: &Raw) -> Option<String> {
    match &candidate.source {
        Source::Symbol(symbol) => Some(display::describe_symbol(decls, &compiled.model, symbol)),
        Source::Methods(ids) => {
            let first = display::describe_member(decls, decls.member(ids[0]));
            Some(match ids.len() {
                1 => first,
                2 => format!("{} (+ 1 overload)", first),
                n => format!("{} (+ {} overloads)", first, n - 1),
            })
        }
        Source::Keyword => Some(format!("{} keyword", candidate.label)),
    }
}

// ============================================================================
// Matching
// ============================================================================

/// How well `label` matches the typed prefix: 0 prefix, 1 camel humps,
/// 2 substring; `None` when it does not match at all
pub fn match_rank(label: &str, typed: &str) -> Option<u8> {
    if typed.is_empty() {
        return Some(0);
    }
    let label_lower = label.to_lowercase();
    let typed_lower = typed.to_lowercase();
    if label_lower.starts_with(&typed_lower) {
        return Some(0);
    }
    if camel_humps(label).to_lowercase().starts_with(&typed_lower) {
        return Some(1);
    }
    if label_lower.contains(&typed_lower) {
        return Some(2);
    }
    None
}

/// First letter of each word: `GetHashCode` gives `GHC`, `max_items` `mi`
fn camel_humps(label: &str) -> String {
    let mut out = String::new();
    let mut previous: Option<char> = None;
    for c in label.chars() {
        let starts_word = match previous {
            None => c != '_',
            Some('_') => c != '_',
            Some(p) => c.is_uppercase() && !p.is_uppercase(),
        };
        if starts_word {
            out.push(c);
        }
        previous = Some(c);
    }
    out
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn identifier_start(source: &str, offset: usize) -> usize {
    source[..offset]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_identifier_char(*c))
        .last()
        .map_or(offset, |(i, _)| i)
}

fn identifier_end(source: &str, offset: usize) -> usize {
    source[offset..]
        .char_indices()
        .find(|(_, c)| !is_identifier_char(*c))
        .map_or(source.len(), |(i, _)| offset + i)
}
