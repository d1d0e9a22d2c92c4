//! Static checks run before a script is allowed to execute.

use std::collections::VecDeque;

use vibecraft_core::config::SandboxLimits;
use vibecraft_core::{Error, Result};

use crate::ast::{Constant, Expr, Module, Node, Stmt, UnaryOp};
use crate::format::with_commas;
use crate::parser::parse;

/// Attribute names that reach interpreter internals.
pub const BLOCKED_ATTRIBUTES: &[&str] = &[
    // type introspection
    "__class__",
    "__base__",
    "__bases__",
    "__mro__",
    "__subclasses__",
    "__init__",
    "__new__",
    "__del__",
    "__init_subclass__",
    "__class_getitem__",
    "__prepare__",
    // code objects
    "__code__",
    "__globals__",
    "__locals__",
    "__builtins__",
    "__call__",
    "__self__",
    "__func__",
    // attribute protocol
    "__getattr__",
    "__getattribute__",
    "__setattr__",
    "__delattr__",
    "__get__",
    "__set__",
    "__delete__",
    "__set_name__",
    // import machinery
    "__import__",
    "__loader__",
    "__spec__",
    "__path__",
    "__file__",
    "__cached__",
    "__package__",
    "__name__",
    "__qualname__",
    // pickling and layout
    "__reduce__",
    "__reduce_ex__",
    "__getstate__",
    "__setstate__",
    "__sizeof__",
    "__weakref__",
    "__slots__",
    // frames
    "func_globals",
    "func_code",
    "gi_frame",
    "gi_code",
    "co_code",
    "f_globals",
    "f_locals",
    "f_builtins",
];

/// Names that may never be called or even mentioned.
pub const BLOCKED_FUNCTION_NAMES: &[&str] = &[
    "eval",
    "exec",
    "compile",
    "open",
    "input",
    "__import__",
    "globals",
    "locals",
    "vars",
    "dir",
    "getattr",
    "setattr",
    "delattr",
    "hasattr",
    "type",
    "object",
    "super",
    "classmethod",
    "staticmethod",
    "property",
    "memoryview",
    "bytearray",
    "bytes",
    "breakpoint",
    "help",
    "exit",
    "quit",
];

/// Raw substrings rejected before parsing, matched case-insensitively.
pub const FORBIDDEN_SUBSTRINGS: &[&str] = &[
    "__class__",
    "__mro__",
    "__subclasses__",
    "__globals__",
    "__builtins__",
    "__import__",
    "__code__",
    "eval(",
    "exec(",
    "compile(",
    "open(",
    "getattr(",
    "setattr(",
];

/// Node kinds a script may contain.
pub const ALLOWED_NODES: &[&str] = &[
    "Module",
    "Expr",
    "Assign",
    "AugAssign",
    "For",
    "If",
    "Break",
    "Continue",
    "BinOp",
    "UnaryOp",
    "Compare",
    "BoolOp",
    "IfExp",
    "Call",
    "Subscript",
    "Slice",
    "Attribute",
    "Constant",
    "List",
    "Tuple",
    "Dict",
    "Set",
    "Name",
    "Add",
    "Sub",
    "Mult",
    "Div",
    "FloorDiv",
    "Mod",
    "Pow",
    "Lt",
    "Gt",
    "LtE",
    "GtE",
    "Eq",
    "NotEq",
    "And",
    "Or",
    "Not",
    "USub",
    "UAdd",
    "ListComp",
    "comprehension",
    "JoinedStr",
    "FormattedValue",
];

/// Run every static check and hand back the parsed module.
pub fn validate_code(source: &str, limits: &SandboxLimits) -> Result<Module> {
    let length = source.chars().count();
    if length > limits.max_code_length {
        return Err(Error::sandbox_validation(format!(
            "Code too long: {} chars > {} max",
            length, limits.max_code_length
        )));
    }

    let lowered = source.to_lowercase();
    if let Some(pattern) = FORBIDDEN_SUBSTRINGS
        .iter()
        .find(|p| lowered.contains(&p.to_lowercase()))
    {
        return Err(Error::sandbox_validation(format!(
            "Forbidden pattern detected in code: '{}'",
            pattern
        )));
    }

    let module = parse(source)
        .map_err(|e| Error::sandbox_validation(format!("Syntax error in code: {}", e)))?;

    check_nodes(&module)?;
    nesting_depth(Node::Module(&module), 0, limits.max_nesting_depth)?;

    let estimate = estimate_iterations(&module);
    if estimate > limits.max_iterations as u128 {
        return Err(Error::sandbox_validation(format!(
            "Code may execute too many iterations ({} > {}). Please reduce loop sizes.",
            with_commas(estimate),
            with_commas(limits.max_iterations)
        )));
    }
    Ok(module)
}

/// Breadth-first walk applying the whitelist and the name checks.
fn check_nodes(module: &Module) -> Result<()> {
    let mut queue = VecDeque::from([Node::Module(module)]);
    while let Some(node) = queue.pop_front() {
        let kind = node.kind();
        if !ALLOWED_NODES.contains(&kind) {
            return Err(Error::sandbox_validation(format!(
                "Unsafe operation: {} is not allowed. Only basic loops, math, and list operations are permitted.",
                kind
            )));
        }
        if let Node::Expr(expr) = node {
            check_expr(expr)?;
        }
        queue.extend(node.children());
    }
    Ok(())
}

fn check_expr(expr: &Expr) -> Result<()> {
    match expr {
        Expr::Call { func, .. } => match func.as_ref() {
            Expr::Name(name) if BLOCKED_FUNCTION_NAMES.contains(&name.as_str()) => Err(
                Error::sandbox_validation(format!("Blocked function call: {}() is not allowed", name)),
            ),
            _ => Ok(()),
        },
        Expr::Attribute { attr, .. } if BLOCKED_ATTRIBUTES.contains(&attr.as_str()) => Err(
            Error::sandbox_validation(format!("Blocked attribute access: .{} is not allowed", attr)),
        ),
        Expr::Subscript { slice, .. } => match slice.as_ref() {
            Expr::Constant(Constant::Str(key)) if BLOCKED_ATTRIBUTES.contains(&key.as_str()) => {
                Err(Error::sandbox_validation(format!(
                    "Blocked attribute access via subscript: ['{}']",
                    key
                )))
            }
            _ => Ok(()),
        },
        Expr::Name(name) => {
            if name.starts_with("__") && name.ends_with("__") {
                return Err(Error::sandbox_validation(format!(
                    "Dunder variable access not allowed: {}",
                    name
                )));
            }
            if BLOCKED_FUNCTION_NAMES.contains(&name.as_str()) {
                return Err(Error::sandbox_validation(format!(
                    "Access to blocked name: {}",
                    name
                )));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Deepest loop/conditional/comprehension nesting; fails as soon as the
/// limit is crossed.
fn nesting_depth(node: Node<'_>, depth: usize, max: usize) -> Result<usize> {
    if depth > max {
        return Err(Error::sandbox_validation(format!(
            "Code nesting too deep: {} > {}",
            depth, max
        )));
    }
    let mut deepest = depth;
    for child in node.children() {
        let nested = matches!(
            child,
            Node::Stmt(Stmt::For { .. } | Stmt::If { .. }) | Node::Expr(Expr::ListComp { .. })
        );
        let child_depth = if nested { depth + 1 } else { depth };
        deepest = deepest.max(nesting_depth(child, child_depth, max)?);
    }
    Ok(deepest)
}

fn int_literal(expr: &Expr) -> Option<i128> {
    match expr {
        Expr::Constant(Constant::Int(i)) => Some(*i as i128),
        Expr::UnaryOp {
            op: UnaryOp::USub,
            operand,
        } => match operand.as_ref() {
            Expr::Constant(Constant::Int(i)) => Some(-(*i as i128)),
            _ => None,
        },
        _ => None,
    }
}

/// Size of a `range(...)` call whose bounds are all integer literals.
fn literal_range_size(iter: &Expr) -> Option<u128> {
    let Expr::Call { func, args, .. } = iter else {
        return None;
    };
    if !matches!(func.as_ref(), Expr::Name(name) if name == "range") {
        return None;
    }
    let bounds = args.iter().map(int_literal).collect::<Option<Vec<_>>>()?;
    match bounds.as_slice() {
        [stop] => Some((*stop).max(0) as u128),
        [start, stop] => Some(stop.abs_diff(*start)),
        [start, stop, step] if *step != 0 => {
            let span = stop.abs_diff(*start);
            let step = step.unsigned_abs();
            Some(span.div_ceil(step))
        }
        _ => None,
    }
}

/// Product of every literal-bounded `for ... in range(...)` in the script.
/// Loops over anything else are not counted; a zero-sized range counts as one.
fn estimate_iterations(module: &Module) -> u128 {
    let mut total: u128 = 1;
    let mut queue = VecDeque::from([Node::Module(module)]);
    while let Some(node) = queue.pop_front() {
        if let Node::Stmt(Stmt::For { iter, .. }) = node {
            if let Some(size) = literal_range_size(iter) {
                total = total.saturating_mul(size.max(1));
            }
        }
        queue.extend(node.children());
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reject(source: &str) -> String {
        match validate_code(source, &SandboxLimits::default()) {
            Err(Error::SandboxValidation(message)) => message,
            other => panic!("expected a validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_accepts_plain_generator() {
        let source = "commands = []\nfor x in range(100, 110):\n    commands.append(f'/setblock {x} 64 200 stone')\n";
        assert!(validate_code(source, &SandboxLimits::default()).is_ok());
    }

    #[test]
    fn test_length_limit() {
        let limits = SandboxLimits {
            max_code_length: 10,
            ..SandboxLimits::default()
        };
        let err = validate_code("commands = []", &limits).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Sandbox validation failed: Code too long: 13 chars > 10 max"
        );
    }

    #[test]
    fn test_forbidden_substrings_are_case_insensitive() {
        assert_eq!(
            reject("x = EVAL('1')"),
            "Forbidden pattern detected in code: 'eval('"
        );
        assert_eq!(
            reject("x = ''.__CLASS__"),
            "Forbidden pattern detected in code: '__class__'"
        );
    }

    #[test]
    fn test_whitelist() {
        assert_eq!(
            reject("import os"),
            "Unsafe operation: Import is not allowed. Only basic loops, math, and list operations are permitted."
        );
        assert!(reject("f = lambda x: x").starts_with("Unsafe operation: Lambda"));
        assert!(reject("while True:\n    x = 1").starts_with("Unsafe operation: While"));
        assert!(reject("x = 1 in [1]").starts_with("Unsafe operation: In "));
        assert!(reject("x = sorted([1], reverse=True)").starts_with("Unsafe operation: keyword"));
        assert!(reject("x = {k: 1 for k in 'ab'}").starts_with("Unsafe operation: DictComp"));
    }

    #[test]
    fn test_blocked_names_and_attributes() {
        assert_eq!(reject("x = vars()"), "Blocked function call: vars() is not allowed");
        assert_eq!(reject("x = dir"), "Access to blocked name: dir");
        assert_eq!(reject("x = __name__"), "Dunder variable access not allowed: __name__");
        assert_eq!(
            reject("x = [].__sizeof__"),
            "Blocked attribute access: .__sizeof__ is not allowed"
        );
        assert_eq!(
            reject("x = d['__dict__'] + d['__self__']"),
            "Blocked attribute access via subscript: ['__self__']"
        );
    }

    #[test]
    fn test_syntax_error() {
        assert!(reject("for x in").starts_with("Syntax error in code: "));
    }

    #[test]
    fn test_nesting_limit() {
        let limits = SandboxLimits {
            max_nesting_depth: 2,
            ..SandboxLimits::default()
        };
        let ok = "for a in range(2):\n    if a:\n        x = 1\n";
        assert!(validate_code(ok, &limits).is_ok());
        let deep = "for a in range(2):\n    for b in range(2):\n        if a:\n            x = 1\n";
        let err = validate_code(deep, &limits).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Sandbox validation failed: Code nesting too deep: 3 > 2"
        );
    }

    #[test]
    fn test_iteration_estimate() {
        assert_eq!(
            reject("for x in range(1000):\n    for y in range(1000):\n        z = x\n"),
            "Code may execute too many iterations (1,000,000 > 100,000). Please reduce loop sizes."
        );
        let wide = "for x in range(-500, 500):\n    for y in range(0, 1000, 10):\n        z = x\n";
        assert!(validate_code(wide, &SandboxLimits::default()).is_ok());
        let dynamic = "n = 1000\nfor x in range(n):\n    for y in range(n):\n        z = x\n";
        assert!(validate_code(dynamic, &SandboxLimits::default()).is_ok());
    }
}
