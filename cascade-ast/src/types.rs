use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Name of the sole numeric base type. Integers and booleans are `f64`
/// values inside the language.
pub const F64: &str = "f64";
/// Name of the string base type.
pub const STRING: &str = "string";

/// Kind of a structural record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComplexKind {
    Struct,
    Class,
    Dynamic,
}

impl ComplexKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ComplexKind::Struct => "struct",
            ComplexKind::Class => "class",
            ComplexKind::Dynamic => "dynamic",
        }
    }
}

/// Structural type of an expression.
///
/// Equality is structural; the derived total order is deterministic so
/// parameter-type vectors can key overload tables. `Display` prints the
/// type-parser syntax, and printing then re-parsing yields an equal type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Sentinel for "no value"; not assignable, not an operand
    Nothing,
    /// Declaration marker only; never the type of a checked expression
    Auto,
    Base(String),
    Array(Box<Type>),
    Pointer(Box<Type>),
    Const(Box<Type>),
    Func {
        params: Vec<Type>,
        ret: Option<Box<Type>>,
    },
    Complex {
        kind: ComplexKind,
        members: Vec<(String, Type)>,
    },
}

impl Type {
    pub fn f64() -> Self {
        Type::Base(F64.to_string())
    }

    pub fn string() -> Self {
        Type::Base(STRING.to_string())
    }

    pub fn base(name: impl Into<String>) -> Self {
        Type::Base(name.into())
    }

    pub fn array(elem: Type) -> Self {
        Type::Array(Box::new(elem))
    }

    pub fn func(params: Vec<Type>, ret: Option<Type>) -> Self {
        Type::Func {
            params,
            ret: ret.map(Box::new),
        }
    }

    /// True for `f64` and `string`
    pub fn is_builtin_base(name: &str) -> bool {
        name == F64 || name == STRING
    }

    pub fn is_f64(&self) -> bool {
        matches!(self, Type::Base(name) if name == F64)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::Base(name) if name == STRING)
    }

    pub fn is_base(&self) -> bool {
        matches!(self, Type::Base(_))
    }

    pub fn base_name(&self) -> Option<&str> {
        match self {
            Type::Base(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn is_func(&self) -> bool {
        matches!(self, Type::Func { .. })
    }

    pub fn func_params(&self) -> Option<&[Type]> {
        match self {
            Type::Func { params, .. } => Some(params),
            _ => None,
        }
    }

    /// Return type of a function type; `Nothing` when the type declares none
    pub fn func_return(&self) -> Option<Type> {
        match self {
            Type::Func { ret, .. } => {
                Some(ret.as_deref().cloned().unwrap_or(Type::Nothing))
            }
            _ => None,
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Type::Complex { .. })
    }

    pub fn members(&self) -> Option<&[(String, Type)]> {
        match self {
            Type::Complex { members, .. } => Some(members),
            _ => None,
        }
    }

    pub fn member_type(&self, name: &str) -> Option<&Type> {
        self.members()?
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, ty)| ty)
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.member_type(name).is_some()
    }

    /// Unify a template type (self, containing free identifiers from
    /// `params`) against a concrete type. On success the consistent binding
    /// is accumulated in `subst`; inconsistent re-binding rejects.
    pub fn unify(
        &self,
        concrete: &Type,
        params: &BTreeSet<String>,
        subst: &mut BTreeMap<String, Type>,
    ) -> bool {
        match (self, concrete) {
            (Type::Base(name), _) if params.contains(name) => match subst.get(name) {
                Some(bound) => bound == concrete,
                None => {
                    subst.insert(name.clone(), concrete.clone());
                    true
                }
            },
            (Type::Base(a), Type::Base(b)) => a == b,
            (Type::Nothing, Type::Nothing) | (Type::Auto, Type::Auto) => true,
            (Type::Array(a), Type::Array(b))
            | (Type::Pointer(a), Type::Pointer(b))
            | (Type::Const(a), Type::Const(b)) => a.unify(b, params, subst),
            (
                Type::Func {
                    params: p1,
                    ret: r1,
                },
                Type::Func {
                    params: p2,
                    ret: r2,
                },
            ) => {
                if p1.len() != p2.len() {
                    return false;
                }
                if !p1
                    .iter()
                    .zip(p2)
                    .all(|(a, b)| a.unify(b, params, subst))
                {
                    return false;
                }
                match (r1, r2) {
                    (None, None) => true,
                    (Some(a), Some(b)) => a.unify(b, params, subst),
                    _ => false,
                }
            }
            (
                Type::Complex {
                    kind: k1,
                    members: m1,
                },
                Type::Complex {
                    kind: k2,
                    members: m2,
                },
            ) => {
                k1 == k2
                    && m1.len() == m2.len()
                    && m1
                        .iter()
                        .zip(m2)
                        .all(|((n1, t1), (n2, t2))| n1 == n2 && t1.unify(t2, params, subst))
            }
            _ => false,
        }
    }

    /// Apply a binding uniformly, replacing bound free identifiers
    pub fn substitute(&self, subst: &BTreeMap<String, Type>) -> Type {
        match self {
            Type::Base(name) => subst.get(name).cloned().unwrap_or_else(|| self.clone()),
            Type::Nothing | Type::Auto => self.clone(),
            Type::Array(elem) => Type::Array(Box::new(elem.substitute(subst))),
            Type::Pointer(inner) => Type::Pointer(Box::new(inner.substitute(subst))),
            Type::Const(inner) => Type::Const(Box::new(inner.substitute(subst))),
            Type::Func { params, ret } => Type::Func {
                params: params.iter().map(|p| p.substitute(subst)).collect(),
                ret: ret.as_ref().map(|r| Box::new(r.substitute(subst))),
            },
            Type::Complex { kind, members } => Type::Complex {
                kind: *kind,
                members: members
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.substitute(subst)))
                    .collect(),
            },
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Nothing => write!(f, "()"),
            Type::Auto => write!(f, "auto"),
            Type::Base(name) => write!(f, "{name}"),
            Type::Array(elem) => write!(f, "[]{elem}"),
            Type::Pointer(inner) => write!(f, "*{inner}"),
            Type::Const(inner) => write!(f, "const {inner}"),
            Type::Func { params, ret } => {
                write!(f, "func(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ")")?;
                if let Some(ret) = ret {
                    write!(f, ":{ret}")?;
                }
                Ok(())
            }
            Type::Complex { kind, members } => {
                write!(f, "{}{{", kind.keyword())?;
                for (name, ty) in members {
                    write!(f, "{name} {ty};")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_display() {
        let ty = Type::func(
            vec![Type::array(Type::f64()), Type::string()],
            Some(Type::f64()),
        );
        assert_eq!(ty.to_string(), "func([]f64,string):f64");

        let record = Type::Complex {
            kind: ComplexKind::Struct,
            members: vec![
                ("x".to_string(), Type::f64()),
                ("tags".to_string(), Type::array(Type::string())),
            ],
        };
        assert_eq!(record.to_string(), "struct{x f64;tags []string;}");
    }

    #[test]
    fn test_unify_binds_free_ident() {
        let template = Type::func(
            vec![Type::array(Type::base("T")), Type::base("T")],
            None,
        );
        let concrete = Type::func(vec![Type::array(Type::f64()), Type::f64()], None);
        let mut subst = BTreeMap::new();
        assert!(template.unify(&concrete, &free(&["T"]), &mut subst));
        assert_eq!(subst.get("T"), Some(&Type::f64()));
    }

    #[test]
    fn test_unify_rejects_inconsistent_binding() {
        let template = Type::func(vec![Type::base("T"), Type::base("T")], None);
        let concrete = Type::func(vec![Type::f64(), Type::string()], None);
        let mut subst = BTreeMap::new();
        assert!(!template.unify(&concrete, &free(&["T"]), &mut subst));
    }

    #[test]
    fn test_substitute() {
        let template = Type::func(vec![Type::array(Type::base("T"))], Some(Type::base("T")));
        let mut subst = BTreeMap::new();
        subst.insert("T".to_string(), Type::string());
        assert_eq!(
            template.substitute(&subst),
            Type::func(vec![Type::array(Type::string())], Some(Type::string()))
        );
    }

    #[test]
    fn test_total_order_is_deterministic() {
        let mut v = vec![Type::string(), Type::f64(), Type::array(Type::f64())];
        v.sort();
        let mut w = v.clone();
        w.sort();
        assert_eq!(v, w);
    }
}
