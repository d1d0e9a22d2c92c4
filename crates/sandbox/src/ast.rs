//! Syntax tree for generator scripts.
//!
//! Node kind names follow the conventional Python AST names so the
//! validator can report them directly. Constructs the sandbox never runs
//! (functions, imports, while loops, lambdas, ...) are still parsed and kept
//! as `Unsupported` nodes carrying their kind name.

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinaryOp,
        value: Expr,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Break,
    Continue,
    Unsupported(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    BoolOp {
        op: BoolOp,
        values: Vec<Expr>,
    },
    BinOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    /// A `None` key is a `**mapping` entry.
    Dict {
        keys: Vec<Option<Expr>>,
        values: Vec<Expr>,
    },
    Set(Vec<Expr>),
    ListComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    JoinedStr(Vec<FStringPart>),
    Constant(Constant),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        slice: Box<Expr>,
    },
    Starred(Box<Expr>),
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Unsupported(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    Literal(String),
    Formatted {
        value: Box<Expr>,
        conversion: Option<char>,
        spec: Option<Vec<FStringPart>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    USub,
    UAdd,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl BoolOp {
    pub fn name(self) -> &'static str {
        match self {
            BoolOp::And => "And",
            BoolOp::Or => "Or",
        }
    }
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "Add",
            BinaryOp::Sub => "Sub",
            BinaryOp::Mult => "Mult",
            BinaryOp::MatMult => "MatMult",
            BinaryOp::Div => "Div",
            BinaryOp::FloorDiv => "FloorDiv",
            BinaryOp::Mod => "Mod",
            BinaryOp::Pow => "Pow",
            BinaryOp::LShift => "LShift",
            BinaryOp::RShift => "RShift",
            BinaryOp::BitOr => "BitOr",
            BinaryOp::BitXor => "BitXor",
            BinaryOp::BitAnd => "BitAnd",
        }
    }

    /// Operator as written in source.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mult => "*",
            BinaryOp::MatMult => "@",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "** or pow()",
            BinaryOp::LShift => "<<",
            BinaryOp::RShift => ">>",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
        }
    }
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Not => "Not",
            UnaryOp::USub => "USub",
            UnaryOp::UAdd => "UAdd",
            UnaryOp::Invert => "Invert",
        }
    }
}

impl CmpOp {
    pub fn name(self) -> &'static str {
        match self {
            CmpOp::Eq => "Eq",
            CmpOp::NotEq => "NotEq",
            CmpOp::Lt => "Lt",
            CmpOp::LtE => "LtE",
            CmpOp::Gt => "Gt",
            CmpOp::GtE => "GtE",
            CmpOp::Is => "Is",
            CmpOp::IsNot => "IsNot",
            CmpOp::In => "In",
            CmpOp::NotIn => "NotIn",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }
}

// =============================================================================
// Generic traversal
// =============================================================================

/// A borrowed view of any tree node, used for breadth-first walks.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Module(&'a Module),
    Stmt(&'a Stmt),
    Expr(&'a Expr),
    Comprehension(&'a Comprehension),
    Keyword(&'a Keyword),
    FStringPart(&'a FStringPart),
    FormatSpec(&'a [FStringPart]),
    Operator(&'static str),
}

impl<'a> Node<'a> {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Module(_) => "Module",
            Node::Stmt(stmt) => match stmt {
                Stmt::Expr(_) => "Expr",
                Stmt::Assign { .. } => "Assign",
                Stmt::AugAssign { .. } => "AugAssign",
                Stmt::For { .. } => "For",
                Stmt::If { .. } => "If",
                Stmt::Break => "Break",
                Stmt::Continue => "Continue",
                Stmt::Unsupported(kind) => kind,
            },
            Node::Expr(expr) => match expr {
                Expr::BoolOp { .. } => "BoolOp",
                Expr::BinOp { .. } => "BinOp",
                Expr::UnaryOp { .. } => "UnaryOp",
                Expr::IfExp { .. } => "IfExp",
                Expr::Dict { .. } => "Dict",
                Expr::Set(_) => "Set",
                Expr::ListComp { .. } => "ListComp",
                Expr::Compare { .. } => "Compare",
                Expr::Call { .. } => "Call",
                Expr::JoinedStr(_) => "JoinedStr",
                Expr::Constant(_) => "Constant",
                Expr::Attribute { .. } => "Attribute",
                Expr::Subscript { .. } => "Subscript",
                Expr::Starred(_) => "Starred",
                Expr::Name(_) => "Name",
                Expr::List(_) => "List",
                Expr::Tuple(_) => "Tuple",
                Expr::Slice { .. } => "Slice",
                Expr::Unsupported(kind) => kind,
            },
            Node::Comprehension(_) => "comprehension",
            Node::Keyword(_) => "keyword",
            Node::FStringPart(FStringPart::Literal(_)) => "Constant",
            Node::FStringPart(FStringPart::Formatted { .. }) => "FormattedValue",
            Node::FormatSpec(_) => "JoinedStr",
            Node::Operator(name) => name,
        }
    }

    /// Direct children in field order.
    pub fn children(&self) -> Vec<Node<'a>> {
        let mut out = Vec::new();
        match *self {
            Node::Module(module) => out.extend(module.body.iter().map(Node::Stmt)),
            Node::Stmt(stmt) => match stmt {
                Stmt::Expr(value) => out.push(Node::Expr(value)),
                Stmt::Assign { targets, value } => {
                    out.extend(targets.iter().map(Node::Expr));
                    out.push(Node::Expr(value));
                }
                Stmt::AugAssign { target, op, value } => {
                    out.push(Node::Expr(target));
                    out.push(Node::Operator(op.name()));
                    out.push(Node::Expr(value));
                }
                Stmt::For {
                    target,
                    iter,
                    body,
                    orelse,
                } => {
                    out.push(Node::Expr(target));
                    out.push(Node::Expr(iter));
                    out.extend(body.iter().map(Node::Stmt));
                    out.extend(orelse.iter().map(Node::Stmt));
                }
                Stmt::If { test, body, orelse } => {
                    out.push(Node::Expr(test));
                    out.extend(body.iter().map(Node::Stmt));
                    out.extend(orelse.iter().map(Node::Stmt));
                }
                Stmt::Break | Stmt::Continue | Stmt::Unsupported(_) => {}
            },
            Node::Expr(expr) => match expr {
                Expr::BoolOp { op, values } => {
                    out.push(Node::Operator(op.name()));
                    out.extend(values.iter().map(Node::Expr));
                }
                Expr::BinOp { left, op, right } => {
                    out.push(Node::Expr(left));
                    out.push(Node::Operator(op.name()));
                    out.push(Node::Expr(right));
                }
                Expr::UnaryOp { op, operand } => {
                    out.push(Node::Operator(op.name()));
                    out.push(Node::Expr(operand));
                }
                Expr::IfExp { test, body, orelse } => {
                    out.push(Node::Expr(test));
                    out.push(Node::Expr(body));
                    out.push(Node::Expr(orelse));
                }
                Expr::Dict { keys, values } => {
                    out.extend(keys.iter().flatten().map(Node::Expr));
                    out.extend(values.iter().map(Node::Expr));
                }
                Expr::Set(elts) | Expr::List(elts) | Expr::Tuple(elts) => {
                    out.extend(elts.iter().map(Node::Expr))
                }
                Expr::ListComp { elt, generators } => {
                    out.push(Node::Expr(elt));
                    out.extend(generators.iter().map(Node::Comprehension));
                }
                Expr::Compare {
                    left,
                    ops,
                    comparators,
                } => {
                    out.push(Node::Expr(left));
                    out.extend(ops.iter().map(|op| Node::Operator(op.name())));
                    out.extend(comparators.iter().map(Node::Expr));
                }
                Expr::Call {
                    func,
                    args,
                    keywords,
                } => {
                    out.push(Node::Expr(func));
                    out.extend(args.iter().map(Node::Expr));
                    out.extend(keywords.iter().map(Node::Keyword));
                }
                Expr::JoinedStr(parts) => out.extend(parts.iter().map(Node::FStringPart)),
                Expr::Attribute { value, .. } | Expr::Starred(value) => {
                    out.push(Node::Expr(value))
                }
                Expr::Subscript { value, slice } => {
                    out.push(Node::Expr(value));
                    out.push(Node::Expr(slice));
                }
                Expr::Slice { lower, upper, step } => {
                    for part in [lower, upper, step].into_iter().flatten() {
                        out.push(Node::Expr(part));
                    }
                }
                Expr::Constant(_) | Expr::Name(_) | Expr::Unsupported(_) => {}
            },
            Node::Comprehension(comp) => {
                out.push(Node::Expr(&comp.target));
                out.push(Node::Expr(&comp.iter));
                out.extend(comp.ifs.iter().map(Node::Expr));
            }
            Node::Keyword(keyword) => out.push(Node::Expr(&keyword.value)),
            Node::FStringPart(part) => {
                if let FStringPart::Formatted { value, spec, .. } = part {
                    out.push(Node::Expr(value));
                    if let Some(spec) = spec {
                        out.push(Node::FormatSpec(spec));
                    }
                }
            }
            Node::FormatSpec(parts) => out.extend(parts.iter().map(Node::FStringPart)),
            Node::Operator(_) => {}
        }
        out
    }
}
