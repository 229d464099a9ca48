//! Text rendering of types and symbols
//!
//! One policy everywhere: predefined aliases (`int`, `string`), other
//! types by simple name, `T[]`, `T?`, `null` for the null literal and `?`
//! for anything unbound.

use super::declare::Declarations;
use super::model::DocumentModel;
use super::types::*;

pub fn ty(decls: &Declarations, ty: &Ty) -> String {
    match ty {
        Ty::Named(id) => type_name(decls, *id),
        Ty::Array(inner) => format!("{}[]", self::ty(decls, inner)),
        Ty::Nullable(inner) => format!("{}?", self::ty(decls, inner)),
        Ty::Null => "null".to_string(),
        Ty::Void => "void".to_string(),
        Ty::Error => "?".to_string(),
    }
}

pub fn type_name(decls: &Declarations, id: TypeId) -> String {
    match decls.predefined_of(id) {
        Some(predefined) => predefined.keyword().to_string(),
        None => decls.type_def(id).name.clone(),
    }
}

/// `int a, string b`
pub fn params(decls: &Declarations, params: &[ParamDef]) -> String {
    params
        .iter()
        .map(|p| param(decls, p))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn param(decls: &Declarations, param: &ParamDef) -> String {
    format!("{} {}", ty(decls, &param.ty), param.name)
}

/// Signature label as shown in signature help: `Name(int a, string b)`,
/// with the return type appended for methods
pub fn signature_label(decls: &Declarations, member: &MemberDef) -> String {
    match member.kind {
        MemberKind::Constructor => format!(
            "{}({})",
            type_name(decls, member.owner),
            params(decls, &member.params)
        ),
        _ => format!(
            "{} {}.{}({})",
            ty(decls, &member.ty),
            type_name(decls, member.owner),
            member.name,
            params(decls, &member.params)
        ),
    }
}

pub fn function_label(decls: &Declarations, function: &FunctionDef) -> String {
    format!(
        "{} {}({})",
        ty(decls, &function.return_ty),
        function.name,
        params(decls, &function.params)
    )
}

/// One-line description of a member, used by hover and completion
pub fn describe_member(decls: &Declarations, member: &MemberDef) -> String {
    let mut modifiers = vec![member.accessibility.as_str()];
    if member.is_static && !member.is_const {
        modifiers.push("static");
    }
    match member.kind {
        MemberKind::Method => format!(
            "(method) {} {}({}) : {}",
            modifiers.join(" "),
            member.name,
            params(decls, &member.params),
            ty(decls, &member.ty)
        ),
        MemberKind::Constructor => format!(
            "(constructor) {} {}({})",
            modifiers.join(" "),
            type_name(decls, member.owner),
            params(decls, &member.params)
        ),
        MemberKind::Field => {
            if member.is_readonly && !member.is_const {
                modifiers.push("readonly");
            }
            if member.is_const {
                modifiers.push("const");
            }
            format!("{} : {} {}", member.name, modifiers.join(" "), ty(decls, &member.ty))
        }
        MemberKind::Property => {
            let accessors = if member.has_setter { "{ get; set; }" } else { "{ get; }" };
            format!(
                "{} : {} {} {}",
                member.name,
                modifiers.join(" "),
                ty(decls, &member.ty),
                accessors
            )
        }
    }
}

pub fn describe_local(decls: &Declarations, local: &LocalDef) -> String {
    let constness = if local.is_const { "const " } else { "" };
    format!("{} : {}{}", local.name, constness, ty(decls, &local.ty))
}

pub fn describe_function(decls: &Declarations, function: &FunctionDef) -> String {
    let staticness = if function.is_static { "static " } else { "" };
    format!(
        "(local function) {}{}({}) : {}",
        staticness,
        function.name,
        params(decls, &function.params),
        ty(decls, &function.return_ty)
    )
}

pub fn describe_type(decls: &Declarations, id: TypeId) -> String {
    let def = decls.type_def(id);
    let keyword = match def.kind {
        TypeKind::Class if def.is_static => "static class",
        TypeKind::Class => "class",
        TypeKind::Struct => "struct",
        TypeKind::Enum => "enum",
    };
    format!("{} {}", keyword, def.full_name())
}

/// Description of whatever a symbol refers to
pub fn describe_symbol(decls: &Declarations, model: &DocumentModel, symbol: &Symbol) -> String {
    match symbol {
        Symbol::Namespace(name) => format!("namespace {}", name),
        Symbol::Type(id) => describe_type(decls, *id),
        Symbol::Member(id) => describe_member(decls, decls.member(*id)),
        Symbol::Local(id) => describe_local(decls, model.local(*id)),
        Symbol::Function(id) => describe_function(decls, model.function(*id)),
        Symbol::Global(id) => format!("{} : {}", decls.type_def(*id).name, type_name(decls, *id)),
    }
}

/// Coarse classification used by completion and hover
pub fn symbol_kind(decls: &Declarations, model: &DocumentModel, symbol: &Symbol) -> SymbolKind {
    match symbol {
        Symbol::Namespace(_) => SymbolKind::Namespace,
        Symbol::Type(_) => SymbolKind::NamedType,
        Symbol::Member(id) => match decls.member(*id).kind {
            MemberKind::Field => SymbolKind::Field,
            MemberKind::Property => SymbolKind::Property,
            MemberKind::Method | MemberKind::Constructor => SymbolKind::Method,
        },
        Symbol::Local(id) if model.local(*id).is_param => SymbolKind::Parameter,
        Symbol::Local(_) => SymbolKind::Local,
        Symbol::Function(_) => SymbolKind::Method,
        Symbol::Global(_) => SymbolKind::Field,
    }
}
