//! Type descriptors for the output module.
//!
//! Descriptors are the erased, linkable encoding of a type. Signatures keep
//! the element type of mutable cells as a generic argument; for every other
//! type they are identical to the descriptor.
//!
//! Both functions expect a finalized type. A hole reaching them is an
//! unconstrained type variable and is lowered to the top object type.

use super::Type;

pub const INTEGER: &str = "Lchoco/lang/Integer;";
pub const BOOLEAN: &str = "Lchoco/lang/Boolean;";
pub const STRING: &str = "Lchoco/lang/String;";
pub const MUTABLE: &str = "Lchoco/lang/Mutable;";
pub const OBJECT: &str = "Lchoco/lang/Object;";
pub const VOID: &str = "V";

/// Owner of the runtime cell helpers.
pub const MUTABLE_OWNER: &str = "choco/lang/Mutable";

/// Cell helpers as `(name, descriptor)`.
pub const CELL_OF: (&str, &str) = ("of", "(Lchoco/lang/Object;)Lchoco/lang/Mutable;");
pub const CELL_DEREF: (&str, &str) = ("deref", "(Lchoco/lang/Mutable;)Lchoco/lang/Object;");
pub const CELL_SET: (&str, &str) = ("set", "(Lchoco/lang/Mutable;Lchoco/lang/Object;)V");

/// Erased descriptor of `ty`.
pub fn descriptor(ty: &Type) -> String {
    let mut out = String::new();
    write_descriptor(ty, false, &mut out);
    out
}

/// Generic signature of `ty`.
pub fn signature(ty: &Type) -> String {
    let mut out = String::new();
    write_descriptor(ty, true, &mut out);
    out
}

fn write_descriptor(ty: &Type, generic: bool, out: &mut String) {
    match ty {
        Type::Int => out.push_str(INTEGER),
        Type::Bool => out.push_str(BOOLEAN),
        Type::String => out.push_str(STRING),
        Type::Void => out.push_str(VOID),
        Type::Hole(_) => out.push_str(OBJECT),
        Type::Mutable(inner) => {
            if generic {
                out.push_str("Lchoco/lang/Mutable<");
                write_descriptor(inner, true, out);
                out.push_str(">;");
            } else {
                out.push_str(MUTABLE);
            }
        }
        Type::Fun(params, ret) => {
            out.push('(');
            for param in params {
                write_descriptor(param, generic, out);
            }
            out.push(')');
            write_descriptor(ret, generic, out);
        }
    }
}

/// Whether `ty` is stored as a reference needing a checked cast after a cell read.
pub fn needs_cast(ty: &Type) -> bool {
    !matches!(ty, Type::Hole(_) | Type::Void)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InferContext;

    #[test]
    fn primitives() {
        assert_eq!(descriptor(&Type::Int), "Lchoco/lang/Integer;");
        assert_eq!(descriptor(&Type::Bool), "Lchoco/lang/Boolean;");
        assert_eq!(descriptor(&Type::String), "Lchoco/lang/String;");
        assert_eq!(descriptor(&Type::Void), "V");
    }

    #[test]
    fn function_descriptor() {
        let ty = Type::fun(vec![Type::Int, Type::Bool], Type::Void);
        assert_eq!(
            descriptor(&ty),
            "(Lchoco/lang/Integer;Lchoco/lang/Boolean;)V"
        );
    }

    #[test]
    fn mutable_is_erased_in_descriptor_only() {
        let ty = Type::fun(vec![Type::mutable(Type::Int)], Type::Void);
        assert_eq!(descriptor(&ty), "(Lchoco/lang/Mutable;)V");
        assert_eq!(
            signature(&ty),
            "(Lchoco/lang/Mutable<Lchoco/lang/Integer;>;)V"
        );
    }

    #[test]
    fn unresolved_hole_is_object() {
        let mut ctx = InferContext::new();
        let h = ctx.fresh_hole();
        assert_eq!(descriptor(&Type::fun(vec![h.clone()], h)), "(Lchoco/lang/Object;)Lchoco/lang/Object;");
    }
}
