//! Declaration collection
//!
//! Two passes over every linked source: the first registers types (so
//! signatures may refer to types declared later), the second resolves
//! member signatures.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::library::Assembly;
use super::model::{DocumentFacts, SemanticDiagnostic};
use super::scope::{resolve_type_ref, ImportSet};
use super::types::*;
use crate::syntax::{
    Accessibility, ClassDecl, CompilationUnit, EnumDecl, Item, MemberDecl, Modifiers, NodeId,
    Parameter, PredefinedType, SyntaxTree, TypeDecl,
};

/// Every type and member visible to one compilation
#[derive(Debug, Default)]
pub struct Declarations {
    pub types: Vec<TypeDef>,
    pub members: Vec<MemberDef>,
    namespaces: BTreeSet<String>,
    by_namespace: HashMap<String, Vec<TypeId>>,
    globals: Vec<TypeId>,
    /// Member declared by a node of a document: `(document, node)`
    declared_members: HashMap<(usize, NodeId), MemberId>,
    declared_types: HashMap<(usize, NodeId), TypeId>,
}

impl Declarations {
    pub fn type_def(&self, id: TypeId) -> &TypeDef {
        &self.types[id.0 as usize]
    }

    pub fn member(&self, id: MemberId) -> &MemberDef {
        &self.members[id.0 as usize]
    }

    pub fn find_type(&self, namespace: &str, name: &str) -> Option<TypeId> {
        self.by_namespace
            .get(namespace)?
            .iter()
            .copied()
            .find(|id| self.type_def(*id).name == name)
    }

    pub fn types_in(&self, namespace: &str) -> &[TypeId] {
        self.by_namespace
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn namespace_exists(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }

    /// Immediate child namespace names of `namespace` (`""` for the root)
    pub fn child_namespaces(&self, namespace: &str) -> Vec<String> {
        let prefix = if namespace.is_empty() {
            String::new()
        } else {
            format!("{}.", namespace)
        };
        let mut children: Vec<String> = self
            .namespaces
            .iter()
            .filter_map(|ns| ns.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('.'))
            .map(str::to_string)
            .collect();
        children.dedup();
        children
    }

    /// Host globals: top-level classes of the generated-type document
    pub fn globals(&self) -> &[TypeId] {
        &self.globals
    }

    pub fn global_named(&self, name: &str) -> Option<TypeId> {
        self.globals
            .iter()
            .copied()
            .find(|id| self.type_def(*id).name == name)
    }

    pub fn declared_member(&self, document: usize, node: NodeId) -> Option<MemberId> {
        self.declared_members.get(&(document, node)).copied()
    }

    pub fn declared_type(&self, document: usize, node: NodeId) -> Option<TypeId> {
        self.declared_types.get(&(document, node)).copied()
    }

    pub fn predefined(&self, predefined: PredefinedType) -> Ty {
        if predefined == PredefinedType::Void {
            return Ty::Void;
        }
        self.system_type(predefined.metadata_name())
    }

    /// A type of the `System` namespace, `Error` when the core assembly is
    /// not linked
    pub fn system_type(&self, name: &str) -> Ty {
        self.find_type("System", name)
            .map(Ty::Named)
            .unwrap_or(Ty::Error)
    }

    /// The keyword form of a `System` type, if it has one
    pub fn predefined_of(&self, id: TypeId) -> Option<PredefinedType> {
        let def = self.type_def(id);
        if def.namespace != "System" {
            return None;
        }
        PredefinedType::ALL
            .iter()
            .copied()
            .find(|p| p.metadata_name() == def.name)
    }

    pub fn is_value_type(&self, ty: &Ty) -> bool {
        match ty {
            Ty::Named(id) => self.type_def(*id).is_value_type(),
            Ty::Nullable(_) => true,
            _ => false,
        }
    }

    /// The type whose members a value of `ty` exposes
    pub fn member_host(&self, ty: &Ty) -> Option<TypeId> {
        match ty {
            Ty::Named(id) => Some(*id),
            Ty::Array(_) => self.system_type("Array").as_named(),
            Ty::Nullable(inner) => self.member_host(inner),
            Ty::Null | Ty::Void | Ty::Error => None,
        }
    }

    /// Members of `owner` named `name`. `System.Object` members are
    /// inherited: they fill in when `owner` declares nothing of that name,
    /// and add overloads to a method group with different parameter types.
    pub fn members_named(&self, owner: TypeId, name: &str) -> Vec<MemberId> {
        let mut found: Vec<MemberId> = self
            .type_def(owner)
            .members
            .iter()
            .copied()
            .filter(|m| {
                let member = self.member(*m);
                member.name == name && member.kind != MemberKind::Constructor
            })
            .collect();
        let Some(object) = self.system_type("Object").as_named() else {
            return found;
        };
        if object == owner {
            return found;
        }

        let only_methods = found.iter().all(|m| self.member(*m).is_invocable());
        if !only_methods {
            return found;
        }
        let inherited: Vec<MemberId> = self
            .type_def(object)
            .members
            .iter()
            .copied()
            .filter(|m| {
                let member = self.member(*m);
                member.name == name
                    && (found.is_empty() || member.is_invocable())
                    && !found.iter().any(|own| same_parameters(self.member(*own), member))
            })
            .collect();
        found.extend(inherited);
        found
    }

    /// Every non-constructor member of `owner`, then inherited `Object`
    /// members it does not redeclare, in declaration order
    pub fn all_members(&self, owner: TypeId) -> Vec<MemberId> {
        let mut out: Vec<MemberId> = self
            .type_def(owner)
            .members
            .iter()
            .copied()
            .filter(|m| self.member(*m).kind != MemberKind::Constructor)
            .collect();
        if let Some(object) = self.system_type("Object").as_named() {
            if object != owner {
                let inherited: Vec<MemberId> = self
                    .type_def(object)
                    .members
                    .iter()
                    .copied()
                    .filter(|m| {
                        let name = &self.member(*m).name;
                        !out.iter().any(|own| &self.member(*own).name == name)
                    })
                    .collect();
                out.extend(inherited);
            }
        }
        out
    }

    pub fn constructors(&self, owner: TypeId) -> Vec<MemberId> {
        self.type_def(owner)
            .members
            .iter()
            .copied()
            .filter(|m| self.member(*m).kind == MemberKind::Constructor)
            .collect()
    }

    /// Whether code inside `from` (or script code when `None`) may use
    /// `member`
    pub fn is_accessible(&self, member: &MemberDef, from: Option<TypeId>) -> bool {
        match member.accessibility {
            Accessibility::Public => true,
            Accessibility::Internal => !member.origin.is_assembly(),
            Accessibility::Private | Accessibility::Protected => from == Some(member.owner),
        }
    }

    pub fn is_type_accessible(&self, id: TypeId) -> bool {
        let def = self.type_def(id);
        def.accessibility == Accessibility::Public || !def.origin.is_assembly()
    }

    fn add_namespace(&mut self, namespace: &str) {
        let mut prefix = String::new();
        for part in namespace.split('.').filter(|p| !p.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(part);
            self.namespaces.insert(prefix.clone());
        }
    }

    fn add_member(&mut self, member: MemberDef) -> MemberId {
        let id = member.id;
        let owner = member.owner;
        self.members.push(member);
        self.types[owner.0 as usize].members.push(id);
        id
    }

    fn next_member_id(&self) -> MemberId {
        MemberId(self.members.len() as u32)
    }
}

/// One document to link
pub struct DocumentSource<'a> {
    pub name: &'a str,
    pub tree: &'a SyntaxTree,
}

/// Source of a declaration: an assembly or a document index
#[derive(Clone, Copy)]
enum SourceRef<'a> {
    Assembly(&'a Assembly),
    Document(usize),
}

struct PendingType<'a> {
    id: TypeId,
    decl: &'a TypeDecl,
    source: SourceRef<'a>,
    namespace: String,
    unit: &'a CompilationUnit,
}

/// Collect declarations from the linked assemblies and documents.
/// `generated` is the index of the generated-type document, whose
/// top-level classes become host globals.
pub fn collect(
    assemblies: &[Arc<Assembly>],
    documents: &[DocumentSource<'_>],
    generated: Option<usize>,
    imports: &[String],
    facts: &mut [DocumentFacts],
) -> Declarations {
    let mut decls = Declarations::default();
    decls.namespaces.insert(String::new());
    let mut pending = Vec::new();

    let sources = assemblies
        .iter()
        .map(|a| (SourceRef::Assembly(a), &a.tree.root))
        .chain(
            documents
                .iter()
                .enumerate()
                .map(|(i, d)| (SourceRef::Document(i), &d.tree.root)),
        );

    for (source, unit) in sources {
        for item in &unit.items {
            match item {
                Item::Type(decl) => {
                    register_type(&mut decls, &mut pending, decl, source, "", unit, generated, facts)
                }
                Item::Namespace(ns) => {
                    let name = ns.name.dotted();
                    decls.add_namespace(&name);
                    for decl in &ns.types {
                        register_type(&mut decls, &mut pending, decl, source, &name, unit, generated, facts);
                    }
                }
                Item::Statement(_) => {}
            }
        }
    }

    for using_ns in imports {
        if !decls.namespace_exists(using_ns) {
            tracing::debug!(namespace = %using_ns, "import names an unknown namespace");
        }
    }

    for entry in &pending {
        let import_set = match entry.source {
            SourceRef::Assembly(_) => ImportSet::for_assembly(&entry.namespace),
            SourceRef::Document(_) => ImportSet::for_document(&entry.namespace, entry.unit, imports),
        };
        let mut scratch = DocumentFacts::default();
        let sink = match entry.source {
            SourceRef::Document(index) => &mut facts[index],
            SourceRef::Assembly(_) => &mut scratch,
        };
        match entry.decl {
            TypeDecl::Class(class) => declare_class_members(&mut decls, entry, class, &import_set, sink),
            TypeDecl::Enum(decl) => declare_enum_members(&mut decls, entry, decl, sink),
        }
        if let SourceRef::Assembly(assembly) = entry.source {
            for diagnostic in &scratch.diagnostics {
                tracing::trace!(assembly = %assembly.name, message = %diagnostic.message, "unresolved assembly declaration");
            }
        }
    }

    decls
}

#[allow(clippy::too_many_arguments)]
fn register_type<'a>(
    decls: &mut Declarations,
    pending: &mut Vec<PendingType<'a>>,
    decl: &'a TypeDecl,
    source: SourceRef<'a>,
    namespace: &str,
    unit: &'a CompilationUnit,
    generated: Option<usize>,
    facts: &mut [DocumentFacts],
) {
    let name = decl.name();
    if name.is_missing() {
        return;
    }

    let (kind, modifiers, doc, node) = match decl {
        TypeDecl::Class(c) => (
            if c.is_struct { TypeKind::Struct } else { TypeKind::Class },
            &c.modifiers,
            c.doc.clone(),
            c.id,
        ),
        TypeDecl::Enum(e) => (TypeKind::Enum, &e.modifiers, e.doc.clone(), e.id),
    };

    let origin = match source {
        SourceRef::Assembly(a) => Origin::Assembly(a.name.clone()),
        SourceRef::Document(index) => Origin::Document {
            index,
            span: name.span,
        },
    };

    if let (Some(_), SourceRef::Document(index)) = (decls.find_type(namespace, &name.name), source) {
        let shown = if namespace.is_empty() { "<global namespace>" } else { namespace };
        facts[index].diagnostics.push(SemanticDiagnostic::error(
            "WS0101",
            format!(
                "The namespace '{}' already contains a definition for '{}'",
                shown, name.name
            ),
            name.span,
        ));
    }

    let id = TypeId(decls.types.len() as u32);
    decls.types.push(TypeDef {
        id,
        name: name.name.clone(),
        namespace: namespace.to_string(),
        kind,
        accessibility: modifiers.accessibility.unwrap_or(Accessibility::Internal),
        is_static: modifiers.is_static,
        members: Vec::new(),
        doc,
        origin,
    });
    decls
        .by_namespace
        .entry(namespace.to_string())
        .or_default()
        .push(id);

    if let SourceRef::Document(index) = source {
        decls.declared_types.insert((index, node), id);
        if generated == Some(index) && namespace.is_empty() && kind == TypeKind::Class {
            decls.globals.push(id);
        }
    }

    pending.push(PendingType {
        id,
        decl,
        source,
        namespace: namespace.to_string(),
        unit,
    });
}

fn origin_for(entry: &PendingType<'_>, span: crate::syntax::TextSpan) -> Origin {
    match entry.source {
        SourceRef::Assembly(a) => Origin::Assembly(a.name.clone()),
        SourceRef::Document(index) => Origin::Document { index, span },
    }
}

fn declare_class_members(
    decls: &mut Declarations,
    entry: &PendingType<'_>,
    class: &ClassDecl,
    imports: &ImportSet,
    sink: &mut DocumentFacts,
) {
    let owner = entry.id;
    let class_static = class.modifiers.is_static;

    for member in &class.members {
        match member {
            MemberDecl::Field(field) => {
                let ty = resolve_type_ref(&field.ty, decls, imports, sink);
                for declarator in &field.declarators {
                    if declarator.name.is_missing() {
                        continue;
                    }
                    check_duplicate(decls, owner, &declarator.name.name, declarator.name.span, sink);
                    let def = MemberDef {
                        id: decls.next_member_id(),
                        owner,
                        name: declarator.name.name.clone(),
                        kind: MemberKind::Field,
                        ty: ty.clone(),
                        params: Vec::new(),
                        accessibility: accessibility(&field.modifiers),
                        is_static: field.modifiers.is_static || field.modifiers.is_const || class_static,
                        is_readonly: field.modifiers.is_readonly,
                        is_const: field.modifiers.is_const,
                        has_setter: !field.modifiers.is_readonly && !field.modifiers.is_const,
                        doc: field.doc.clone(),
                        origin: origin_for(entry, declarator.name.span),
                    };
                    let id = decls.add_member(def);
                    record_member(decls, entry, declarator.id, id);
                }
            }
            MemberDecl::Property(property) => {
                if property.name.is_missing() {
                    continue;
                }
                check_duplicate(decls, owner, &property.name.name, property.name.span, sink);
                let ty = resolve_type_ref(&property.ty, decls, imports, sink);
                let def = MemberDef {
                    id: decls.next_member_id(),
                    owner,
                    name: property.name.name.clone(),
                    kind: MemberKind::Property,
                    ty,
                    params: Vec::new(),
                    accessibility: accessibility(&property.modifiers),
                    is_static: property.modifiers.is_static || class_static,
                    is_readonly: !property.has_set,
                    is_const: false,
                    has_setter: property.has_set,
                    doc: property.doc.clone(),
                    origin: origin_for(entry, property.name.span),
                };
                let id = decls.add_member(def);
                record_member(decls, entry, property.id, id);
            }
            MemberDecl::Method(method) => {
                if method.name.is_missing() {
                    continue;
                }
                let ty = resolve_type_ref(&method.return_ty, decls, imports, sink);
                let params = declare_params(&method.params.params, decls, imports, sink);
                let def = MemberDef {
                    id: decls.next_member_id(),
                    owner,
                    name: method.name.name.clone(),
                    kind: MemberKind::Method,
                    ty,
                    params,
                    accessibility: accessibility(&method.modifiers),
                    is_static: method.modifiers.is_static || class_static,
                    is_readonly: false,
                    is_const: false,
                    has_setter: false,
                    doc: method.doc.clone(),
                    origin: origin_for(entry, method.name.span),
                };
                let id = decls.add_member(def);
                record_member(decls, entry, method.id, id);
            }
            MemberDecl::Constructor(ctor) => {
                let params = declare_params(&ctor.params.params, decls, imports, sink);
                let def = MemberDef {
                    id: decls.next_member_id(),
                    owner,
                    name: class.name.name.clone(),
                    kind: MemberKind::Constructor,
                    ty: Ty::Void,
                    params,
                    accessibility: accessibility(&ctor.modifiers),
                    is_static: ctor.modifiers.is_static,
                    is_readonly: false,
                    is_const: false,
                    has_setter: false,
                    doc: ctor.doc.clone(),
                    origin: origin_for(entry, ctor.name.span),
                };
                let id = decls.add_member(def);
                record_member(decls, entry, ctor.id, id);
            }
        }
    }
}

fn declare_enum_members(
    decls: &mut Declarations,
    entry: &PendingType<'_>,
    decl: &EnumDecl,
    sink: &mut DocumentFacts,
) {
    for variant in &decl.variants {
        if variant.name.is_missing() {
            continue;
        }
        check_duplicate(decls, entry.id, &variant.name.name, variant.name.span, sink);
        let def = MemberDef {
            id: decls.next_member_id(),
            owner: entry.id,
            name: variant.name.name.clone(),
            kind: MemberKind::Field,
            ty: Ty::Named(entry.id),
            params: Vec::new(),
            accessibility: Accessibility::Public,
            is_static: true,
            is_readonly: true,
            is_const: true,
            has_setter: false,
            doc: variant.doc.clone(),
            origin: origin_for(entry, variant.name.span),
        };
        let id = decls.add_member(def);
        record_member(decls, entry, variant.id, id);
    }
}

fn declare_params(
    params: &[Parameter],
    decls: &Declarations,
    imports: &ImportSet,
    sink: &mut DocumentFacts,
) -> Vec<ParamDef> {
    params
        .iter()
        .map(|p| ParamDef {
            name: p.name.name.clone(),
            ty: resolve_type_ref(&p.ty, decls, imports, sink),
            has_default: p.default.is_some(),
        })
        .collect()
}

fn same_parameters(a: &MemberDef, b: &MemberDef) -> bool {
    a.params.iter().map(|p| &p.ty).eq(b.params.iter().map(|p| &p.ty))
}

fn accessibility(modifiers: &Modifiers) -> Accessibility {
    modifiers.accessibility.unwrap_or(Accessibility::Private)
}

fn record_member(decls: &mut Declarations, entry: &PendingType<'_>, node: NodeId, id: MemberId) {
    if let SourceRef::Document(index) = entry.source {
        decls.declared_members.insert((index, node), id);
    }
}

/// Fields, properties and enum members must have unique names; methods may
/// overload
fn check_duplicate(
    decls: &Declarations,
    owner: TypeId,
    name: &str,
    span: crate::syntax::TextSpan,
    sink: &mut DocumentFacts,
) {
    let owner_def = decls.type_def(owner);
    let clash = owner_def
        .members
        .iter()
        .any(|m| decls.member(*m).name == name);
    if clash {
        sink.diagnostics.push(SemanticDiagnostic::error(
            "WS0102",
            format!(
                "The type '{}' already contains a definition for '{}'",
                owner_def.name, name
            ),
            span,
        ));
    }
}
