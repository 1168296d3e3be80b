//! Operator precedence and overload-related operator sets.
//!
//! The table is keyed by operator spelling so that symbolic overloads and
//! user-defined infix identifiers share one dispatch path: any identifier
//! in operator position parses as infix at `USER_DEFINED_PRIORITY`.

pub type Priority = i32;

pub const USER_DEFINED_PRIORITY: Priority = 5;
pub const ASSIGN_PRIORITY: Priority = 1;

/// Infix precedence; `None` means the token cannot act as a binary operator
pub fn infix_priority(op: &str) -> Option<Priority> {
    Some(match op {
        "*" | "/" | "%" => 100,
        "+" | "-" => 90,
        "<<" | ">>" => 80,
        ">" | "<" | ">=" | "<=" => 70,
        "==" | "!=" => 60,
        "&" => 50,
        "^" | "xor" => 40,
        "|" => 30,
        "and" | "&&" => 20,
        "or" | "||" => 10,
        ":" | "~" | "?" | "->" | ".." => USER_DEFINED_PRIORITY,
        "=" | "<<-" => ASSIGN_PRIORITY,
        _ => return None,
    })
}

pub fn is_assign(op: &str) -> bool {
    infix_priority(op) == Some(ASSIGN_PRIORITY)
}

/// Prefix operators accepted by the parser
pub fn is_prefix(op: &str) -> bool {
    matches!(op, "-" | "!" | "not" | "*" | "&" | "~")
}

/// Unary operators a symbolic definition may overload
pub fn is_overloadable_unary(op: &str) -> bool {
    matches!(op, "-" | "!" | "not" | "*" | "&" | "~")
}

/// Operators that may never be overloaded
pub fn is_reserved(op: &str) -> bool {
    matches!(op, "=" | "<<-" | ":=" | "." | "->")
}
