//! Recursive-descent parser producing [`Module`] trees.

use crate::ast::{
    BinaryOp, BoolOp, CmpOp, Comprehension, Constant, Expr, FStringPart, Keyword, Module, Stmt,
    UnaryOp,
};
use crate::lexer::{self, FPiece, SyntaxError, Token, TokenKind};

const MAX_NESTING: usize = 100;

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

const AUGMENTED: &[(&str, BinaryOp)] = &[
    ("+=", BinaryOp::Add),
    ("-=", BinaryOp::Sub),
    ("*=", BinaryOp::Mult),
    ("@=", BinaryOp::MatMult),
    ("/=", BinaryOp::Div),
    ("//=", BinaryOp::FloorDiv),
    ("%=", BinaryOp::Mod),
    ("**=", BinaryOp::Pow),
    ("<<=", BinaryOp::LShift),
    (">>=", BinaryOp::RShift),
    ("|=", BinaryOp::BitOr),
    ("^=", BinaryOp::BitXor),
    ("&=", BinaryOp::BitAnd),
];

static EOF: TokenKind = TokenKind::Eof;

type ParseResult<T> = std::result::Result<T, SyntaxError>;

/// Parse a whole script.
pub fn parse(source: &str) -> ParseResult<Module> {
    let tokens = lexer::tokenize(source)?;
    Parser::new(tokens, 0).module()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>, depth: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            depth,
        }
    }

    // -------------------------------------------------------------------------
    // Token helpers
    // -------------------------------------------------------------------------

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&EOF)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), TokenKind::Op(o) if *o == op)
    }

    fn is_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), TokenKind::Name(n) if n == kw)
    }

    fn is_newline(&self) -> bool {
        matches!(self.peek(), TokenKind::Newline | TokenKind::Eof)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.is_kw(kw) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expect_op(&mut self, op: &str) -> ParseResult<()> {
        if self.eat_op(op) {
            return Ok(());
        }
        Err(self.error(format!("expected '{}'", op)))
    }

    fn expect_kw(&mut self, kw: &str) -> ParseResult<()> {
        if self.eat_kw(kw) {
            return Ok(());
        }
        Err(self.error(format!("expected '{}'", kw)))
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.line())
    }

    fn invalid(&self) -> SyntaxError {
        self.error("invalid syntax")
    }

    fn name(&mut self) -> ParseResult<String> {
        match self.peek() {
            TokenKind::Name(n) if !KEYWORDS.contains(&n.as_str()) => {
                let n = n.clone();
                self.pos += 1;
                Ok(n)
            }
            _ => Err(self.invalid()),
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("too many nested parentheses"));
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Whether the current token can begin an expression.
    fn starts_expression(&self) -> bool {
        match self.peek() {
            TokenKind::Name(n) => {
                !KEYWORDS.contains(&n.as_str())
                    || matches!(
                        n.as_str(),
                        "None" | "True" | "False" | "not" | "lambda" | "await" | "yield"
                    )
            }
            TokenKind::Int(_)
            | TokenKind::Float(_)
            | TokenKind::Str(_)
            | TokenKind::Bytes
            | TokenKind::FString(_) => true,
            TokenKind::Op(op) => matches!(*op, "(" | "[" | "{" | "-" | "+" | "~" | "*" | "..."),
            _ => false,
        }
    }

    /// Skip tokens up to (not including) a `:` at bracket depth zero.
    fn skip_to_colon(&mut self) -> ParseResult<()> {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                TokenKind::Eof | TokenKind::Newline if depth == 0 => {
                    return Err(self.error("expected ':'"))
                }
                TokenKind::Eof => return Err(self.invalid()),
                TokenKind::Op(":") if depth == 0 => return Ok(()),
                TokenKind::Op("(" | "[" | "{") => depth += 1,
                TokenKind::Op(")" | "]" | "}") => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.pos += 1;
        }
    }

    /// Skip the rest of a simple statement.
    fn skip_simple(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                TokenKind::Eof => return,
                TokenKind::Newline if depth == 0 => return,
                TokenKind::Op(";") if depth == 0 => return,
                TokenKind::Op("(" | "[" | "{") => depth += 1,
                TokenKind::Op(")" | "]" | "}") => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.pos += 1;
        }
    }

    /// Skip a bracketed group starting at the current opening bracket.
    fn skip_group(&mut self) -> ParseResult<()> {
        let mut depth = 0usize;
        loop {
            match self.advance() {
                TokenKind::Eof => return Err(self.invalid()),
                TokenKind::Op("(" | "[" | "{") => depth += 1,
                TokenKind::Op(")" | "]" | "}") => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    // -------------------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------------------

    fn module(&mut self) -> ParseResult<Module> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Eof => break,
                TokenKind::Newline => self.pos += 1,
                TokenKind::Indent => return Err(self.error("unexpected indent")),
                _ => body.extend(self.statement()?),
            }
        }
        Ok(Module { body })
    }

    fn statement(&mut self) -> ParseResult<Vec<Stmt>> {
        let keyword = match self.peek() {
            TokenKind::Name(n) => n.clone(),
            TokenKind::Op("@") => return self.decorated().map(|s| vec![s]),
            _ => String::new(),
        };
        let stmt = match keyword.as_str() {
            "if" => self.if_stmt()?,
            "for" => self.for_stmt("For")?,
            "while" => self.while_stmt()?,
            "def" => self.def_stmt("FunctionDef")?,
            "class" => self.class_stmt()?,
            "try" => self.try_stmt()?,
            "with" => self.with_stmt("With")?,
            "async" => {
                self.pos += 1;
                if self.is_kw("def") {
                    self.def_stmt("AsyncFunctionDef")?
                } else if self.is_kw("for") {
                    self.for_stmt("AsyncFor")?
                } else if self.is_kw("with") {
                    self.with_stmt("AsyncWith")?
                } else {
                    return Err(self.invalid());
                }
            }
            _ => return self.simple_statements(),
        };
        Ok(vec![stmt])
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect_op(":")?;
        if !matches!(self.peek(), TokenKind::Newline) {
            return self.simple_statements();
        }
        self.pos += 1;
        if !matches!(self.peek(), TokenKind::Indent) {
            return Err(self.error("expected an indented block"));
        }
        self.pos += 1;
        let mut body = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Dedent => {
                    self.pos += 1;
                    break;
                }
                TokenKind::Eof => break,
                TokenKind::Newline => self.pos += 1,
                TokenKind::Indent => return Err(self.error("unexpected indent")),
                _ => body.extend(self.statement()?),
            }
        }
        Ok(body)
    }

    fn if_stmt(&mut self) -> ParseResult<Stmt> {
        // `if` or `elif`
        self.pos += 1;
        let test = self.named_expression()?;
        let body = self.block()?;
        let orelse = if self.is_kw("elif") {
            vec![self.if_stmt()?]
        } else if self.eat_kw("else") {
            self.block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If { test, body, orelse })
    }

    fn for_stmt(&mut self, kind: &'static str) -> ParseResult<Stmt> {
        self.expect_kw("for")?;
        let target = self.target_list()?;
        self.check_target(&target)?;
        self.expect_kw("in")?;
        let iter = self.star_expressions()?;
        let body = self.block()?;
        let orelse = if self.eat_kw("else") {
            self.block()?
        } else {
            Vec::new()
        };
        if kind != "For" {
            return Ok(Stmt::Unsupported(kind));
        }
        Ok(Stmt::For {
            target,
            iter,
            body,
            orelse,
        })
    }

    fn while_stmt(&mut self) -> ParseResult<Stmt> {
        self.pos += 1;
        self.named_expression()?;
        self.block()?;
        if self.eat_kw("else") {
            self.block()?;
        }
        Ok(Stmt::Unsupported("While"))
    }

    fn def_stmt(&mut self, kind: &'static str) -> ParseResult<Stmt> {
        self.expect_kw("def")?;
        self.name()?;
        if !self.is_op("(") {
            return Err(self.error("expected '('"));
        }
        self.skip_group()?;
        if self.eat_op("->") {
            self.expression()?;
        }
        self.block()?;
        Ok(Stmt::Unsupported(kind))
    }

    fn class_stmt(&mut self) -> ParseResult<Stmt> {
        self.pos += 1;
        self.name()?;
        if self.is_op("(") {
            self.skip_group()?;
        }
        self.block()?;
        Ok(Stmt::Unsupported("ClassDef"))
    }

    fn try_stmt(&mut self) -> ParseResult<Stmt> {
        self.pos += 1;
        self.block()?;
        let mut handlers = 0;
        while self.eat_kw("except") {
            self.skip_to_colon()?;
            self.block()?;
            handlers += 1;
        }
        if handlers > 0 && self.eat_kw("else") {
            self.block()?;
        }
        let finally = self.eat_kw("finally");
        if finally {
            self.block()?;
        }
        if handlers == 0 && !finally {
            return Err(self.error("expected 'except' or 'finally' block"));
        }
        Ok(Stmt::Unsupported("Try"))
    }

    fn with_stmt(&mut self, kind: &'static str) -> ParseResult<Stmt> {
        self.expect_kw("with")?;
        self.skip_to_colon()?;
        self.block()?;
        Ok(Stmt::Unsupported(kind))
    }

    fn decorated(&mut self) -> ParseResult<Stmt> {
        while self.eat_op("@") {
            self.named_expression()?;
            if !matches!(self.advance(), TokenKind::Newline) {
                return Err(self.invalid());
            }
        }
        if self.is_kw("def") {
            return self.def_stmt("FunctionDef");
        }
        if self.is_kw("class") {
            return self.class_stmt();
        }
        if self.eat_kw("async") && self.is_kw("def") {
            return self.def_stmt("AsyncFunctionDef");
        }
        Err(self.invalid())
    }

    fn simple_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = vec![self.simple_statement()?];
        while self.eat_op(";") {
            if self.is_newline() {
                break;
            }
            stmts.push(self.simple_statement()?);
        }
        match self.peek() {
            TokenKind::Newline => self.pos += 1,
            TokenKind::Eof => {}
            _ => return Err(self.invalid()),
        }
        Ok(stmts)
    }

    fn simple_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = match self.peek() {
            TokenKind::Name(n) => n.clone(),
            _ => String::new(),
        };
        let unsupported = match keyword.as_str() {
            "pass" => Some("Pass"),
            "return" => Some("Return"),
            "import" => Some("Import"),
            "from" => Some("ImportFrom"),
            "global" => Some("Global"),
            "nonlocal" => Some("Nonlocal"),
            "del" => Some("Delete"),
            "raise" => Some("Raise"),
            "assert" => Some("Assert"),
            _ => None,
        };
        if let Some(kind) = unsupported {
            self.pos += 1;
            self.skip_simple();
            return Ok(Stmt::Unsupported(kind));
        }
        match keyword.as_str() {
            "break" => {
                self.pos += 1;
                return Ok(Stmt::Break);
            }
            "continue" => {
                self.pos += 1;
                return Ok(Stmt::Continue);
            }
            "yield" => return Ok(Stmt::Expr(self.yield_expr())),
            _ => {}
        }

        let first = self.star_expressions()?;

        if let Some(op) = AUGMENTED
            .iter()
            .find(|(symbol, _)| self.is_op(symbol))
            .map(|(_, op)| *op)
        {
            self.pos += 1;
            if !matches!(
                first,
                Expr::Name(_) | Expr::Attribute { .. } | Expr::Subscript { .. }
            ) {
                return Err(self.error("illegal expression for augmented assignment"));
            }
            let value = self.assigned_value()?;
            return Ok(Stmt::AugAssign {
                target: first,
                op,
                value,
            });
        }

        if self.is_op(":") {
            self.skip_simple();
            return Ok(Stmt::Unsupported("AnnAssign"));
        }

        if self.is_op("=") {
            let mut items = vec![first];
            while self.eat_op("=") {
                items.push(self.assigned_value()?);
            }
            let value = items.pop().ok_or_else(|| self.invalid())?;
            for target in &items {
                self.check_target(target)?;
            }
            return Ok(Stmt::Assign {
                targets: items,
                value,
            });
        }

        Ok(Stmt::Expr(first))
    }

    fn assigned_value(&mut self) -> ParseResult<Expr> {
        if self.is_kw("yield") {
            return Ok(self.yield_expr());
        }
        self.star_expressions()
    }

    fn yield_expr(&mut self) -> Expr {
        self.pos += 1;
        let kind = if self.eat_kw("from") {
            "YieldFrom"
        } else {
            "Yield"
        };
        self.skip_simple();
        Expr::Unsupported(kind)
    }

    fn check_target(&self, target: &Expr) -> ParseResult<()> {
        match target {
            Expr::Name(_) | Expr::Attribute { .. } | Expr::Subscript { .. } => Ok(()),
            Expr::Tuple(elts) | Expr::List(elts) => {
                elts.iter().try_for_each(|elt| self.check_target(elt))
            }
            Expr::Starred(inner) => self.check_target(inner),
            Expr::Constant(_) | Expr::JoinedStr(_) => Err(self.error("cannot assign to literal")),
            Expr::Call { .. } => Err(self.error("cannot assign to function call")),
            _ => Err(self.error("cannot assign to expression")),
        }
    }

    /// Comma-separated loop targets (stops before `in`).
    fn target_list(&mut self) -> ParseResult<Expr> {
        let first = self.star_target()?;
        if !self.is_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.is_kw("in") {
                break;
            }
            elts.push(self.star_target()?);
        }
        Ok(Expr::Tuple(elts))
    }

    fn star_target(&mut self) -> ParseResult<Expr> {
        if self.eat_op("*") {
            return Ok(Expr::Starred(Box::new(self.bitor()?)));
        }
        self.bitor()
    }

    // -------------------------------------------------------------------------
    // Expressions
    // -------------------------------------------------------------------------

    fn star_expressions(&mut self) -> ParseResult<Expr> {
        let first = self.star_expression()?;
        if !self.is_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if !self.starts_expression() {
                break;
            }
            elts.push(self.star_expression()?);
        }
        Ok(Expr::Tuple(elts))
    }

    fn star_expression(&mut self) -> ParseResult<Expr> {
        if self.eat_op("*") {
            return Ok(Expr::Starred(Box::new(self.bitor()?)));
        }
        self.expression()
    }

    fn star_named_expression(&mut self) -> ParseResult<Expr> {
        if self.eat_op("*") {
            return Ok(Expr::Starred(Box::new(self.bitor()?)));
        }
        self.named_expression()
    }

    fn named_expression(&mut self) -> ParseResult<Expr> {
        if matches!(self.peek(), TokenKind::Name(_))
            && matches!(self.peek_at(1), TokenKind::Op(":="))
        {
            self.pos += 2;
            self.expression()?;
            return Ok(Expr::Unsupported("NamedExpr"));
        }
        self.expression()
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.nested(|p| {
            if p.eat_kw("lambda") {
                p.skip_to_colon()?;
                p.expect_op(":")?;
                p.expression()?;
                return Ok(Expr::Unsupported("Lambda"));
            }
            let body = p.disjunction()?;
            if !p.eat_kw("if") {
                return Ok(body);
            }
            let test = p.disjunction()?;
            p.expect_kw("else")?;
            let orelse = p.expression()?;
            Ok(Expr::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            })
        })
    }

    fn disjunction(&mut self) -> ParseResult<Expr> {
        let first = self.conjunction()?;
        if !self.is_kw("or") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_kw("or") {
            values.push(self.conjunction()?);
        }
        Ok(Expr::BoolOp {
            op: BoolOp::Or,
            values,
        })
    }

    fn conjunction(&mut self) -> ParseResult<Expr> {
        let first = self.inversion()?;
        if !self.is_kw("and") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_kw("and") {
            values.push(self.inversion()?);
        }
        Ok(Expr::BoolOp {
            op: BoolOp::And,
            values,
        })
    }

    fn inversion(&mut self) -> ParseResult<Expr> {
        if self.eat_kw("not") {
            let operand = self.nested(|p| p.inversion())?;
            return Ok(Expr::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let left = self.bitor()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        loop {
            let op = match self.peek() {
                TokenKind::Op("==") => CmpOp::Eq,
                TokenKind::Op("!=") => CmpOp::NotEq,
                TokenKind::Op("<") => CmpOp::Lt,
                TokenKind::Op("<=") => CmpOp::LtE,
                TokenKind::Op(">") => CmpOp::Gt,
                TokenKind::Op(">=") => CmpOp::GtE,
                TokenKind::Name(n) if n == "in" => CmpOp::In,
                TokenKind::Name(n)
                    if n == "not" && matches!(self.peek_at(1), TokenKind::Name(m) if m == "in") =>
                {
                    self.pos += 1;
                    CmpOp::NotIn
                }
                TokenKind::Name(n) if n == "is" => {
                    if matches!(self.peek_at(1), TokenKind::Name(m) if m == "not") {
                        self.pos += 1;
                        CmpOp::IsNot
                    } else {
                        CmpOp::Is
                    }
                }
                _ => break,
            };
            self.pos += 1;
            ops.push(op);
            comparators.push(self.bitor()?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::Compare {
            left: Box::new(left),
            ops,
            comparators,
        })
    }

    fn binary_level(
        &mut self,
        table: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut left = next(self)?;
        loop {
            let Some(op) = table
                .iter()
                .find(|(symbol, _)| self.is_op(symbol))
                .map(|(_, op)| *op)
            else {
                return Ok(left);
            };
            self.pos += 1;
            let right = next(self)?;
            left = Expr::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
    }

    fn bitor(&mut self) -> ParseResult<Expr> {
        self.binary_level(&[("|", BinaryOp::BitOr)], Self::bitxor)
    }

    fn bitxor(&mut self) -> ParseResult<Expr> {
        self.binary_level(&[("^", BinaryOp::BitXor)], Self::bitand)
    }

    fn bitand(&mut self) -> ParseResult<Expr> {
        self.binary_level(&[("&", BinaryOp::BitAnd)], Self::shift)
    }

    fn shift(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            &[("<<", BinaryOp::LShift), (">>", BinaryOp::RShift)],
            Self::sum,
        )
    }

    fn sum(&mut self) -> ParseResult<Expr> {
        self.binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::term)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            &[
                ("*", BinaryOp::Mult),
                ("/", BinaryOp::Div),
                ("//", BinaryOp::FloorDiv),
                ("%", BinaryOp::Mod),
                ("@", BinaryOp::MatMult),
            ],
            Self::factor,
        )
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let op = match self.peek() {
            TokenKind::Op("+") => UnaryOp::UAdd,
            TokenKind::Op("-") => UnaryOp::USub,
            TokenKind::Op("~") => UnaryOp::Invert,
            _ => return self.power(),
        };
        self.pos += 1;
        let operand = self.nested(|p| p.factor())?;
        Ok(Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> ParseResult<Expr> {
        let base = if self.eat_kw("await") {
            self.primary()?;
            Expr::Unsupported("Await")
        } else {
            self.primary()?
        };
        if !self.eat_op("**") {
            return Ok(base);
        }
        let exponent = self.nested(|p| p.factor())?;
        Ok(Expr::BinOp {
            left: Box::new(base),
            op: BinaryOp::Pow,
            right: Box::new(exponent),
        })
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_op(".") {
                let attr = self.name()?;
                expr = Expr::Attribute {
                    value: Box::new(expr),
                    attr,
                };
            } else if self.eat_op("(") {
                let (args, keywords) = self.nested(|p| p.call_arguments())?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                    keywords,
                };
            } else if self.eat_op("[") {
                let slice = self.nested(|p| p.slices())?;
                self.expect_op("]")?;
                expr = Expr::Subscript {
                    value: Box::new(expr),
                    slice: Box::new(slice),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn call_arguments(&mut self) -> ParseResult<(Vec<Expr>, Vec<Keyword>)> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        if self.eat_op(")") {
            return Ok((args, keywords));
        }
        loop {
            if self.eat_op("*") {
                args.push(Expr::Starred(Box::new(self.expression()?)));
            } else if self.eat_op("**") {
                keywords.push(Keyword {
                    arg: None,
                    value: self.expression()?,
                });
            } else if matches!(self.peek(), TokenKind::Name(_))
                && matches!(self.peek_at(1), TokenKind::Op("="))
            {
                let arg = self.name()?;
                self.pos += 1;
                keywords.push(Keyword {
                    arg: Some(arg),
                    value: self.expression()?,
                });
            } else {
                let value = self.named_expression()?;
                if self.is_kw("for") {
                    self.comprehension_clauses()?;
                    args.push(Expr::Unsupported("GeneratorExp"));
                } else {
                    args.push(value);
                }
            }
            if self.eat_op(",") {
                if self.eat_op(")") {
                    break;
                }
                continue;
            }
            self.expect_op(")")?;
            break;
        }
        Ok((args, keywords))
    }

    fn slices(&mut self) -> ParseResult<Expr> {
        let first = self.slice()?;
        if !self.is_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.is_op("]") {
                break;
            }
            elts.push(self.slice()?);
        }
        Ok(Expr::Tuple(elts))
    }

    fn slice(&mut self) -> ParseResult<Expr> {
        let lower = if self.is_op(":") {
            None
        } else {
            let value = self.named_expression()?;
            if !self.is_op(":") {
                return Ok(value);
            }
            Some(Box::new(value))
        };
        self.expect_op(":")?;
        let bound_ends = |p: &Self| p.is_op(":") || p.is_op("]") || p.is_op(",");
        let upper = if bound_ends(self) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        let mut step = None;
        if self.eat_op(":") && !(self.is_op("]") || self.is_op(",")) {
            step = Some(Box::new(self.expression()?));
        }
        Ok(Expr::Slice { lower, upper, step })
    }

    fn comprehension_clauses(&mut self) -> ParseResult<Vec<Comprehension>> {
        let mut generators = Vec::new();
        loop {
            if self.is_kw("async") {
                return Err(self.error(
                    "asynchronous comprehension outside of an asynchronous function",
                ));
            }
            if !self.eat_kw("for") {
                break;
            }
            let target = self.target_list()?;
            self.check_target(&target)?;
            self.expect_kw("in")?;
            let iter = self.disjunction()?;
            let mut ifs = Vec::new();
            while self.eat_kw("if") {
                ifs.push(self.disjunction()?);
            }
            generators.push(Comprehension { target, iter, ifs });
        }
        Ok(generators)
    }

    fn atom(&mut self) -> ParseResult<Expr> {
        match self.peek().clone() {
            TokenKind::Name(n) => {
                self.pos += 1;
                match n.as_str() {
                    "None" => Ok(Expr::Constant(Constant::None)),
                    "True" => Ok(Expr::Constant(Constant::Bool(true))),
                    "False" => Ok(Expr::Constant(Constant::Bool(false))),
                    _ if KEYWORDS.contains(&n.as_str()) => {
                        self.pos -= 1;
                        Err(self.invalid())
                    }
                    _ => Ok(Expr::Name(n)),
                }
            }
            TokenKind::Int(value) => {
                self.pos += 1;
                Ok(Expr::Constant(Constant::Int(value)))
            }
            TokenKind::Float(value) => {
                self.pos += 1;
                Ok(Expr::Constant(Constant::Float(value)))
            }
            TokenKind::Str(_) | TokenKind::FString(_) | TokenKind::Bytes => self.strings(),
            TokenKind::Op("(") => {
                self.pos += 1;
                self.nested(|p| p.parenthesized())
            }
            TokenKind::Op("[") => {
                self.pos += 1;
                self.nested(|p| p.list_display())
            }
            TokenKind::Op("{") => {
                self.pos += 1;
                self.nested(|p| p.brace_display())
            }
            _ => Err(self.invalid()),
        }
    }

    /// Adjacent string literals concatenate; any f-string makes the result a `JoinedStr`.
    fn strings(&mut self) -> ParseResult<Expr> {
        let line = self.line();
        let mut parts: Vec<FStringPart> = Vec::new();
        let mut formatted = false;
        loop {
            match self.peek().clone() {
                TokenKind::Str(text) => push_literal(&mut parts, text),
                TokenKind::FString(pieces) => {
                    formatted = true;
                    for part in self.fstring_parts(pieces, line)? {
                        match part {
                            FStringPart::Literal(text) => push_literal(&mut parts, text),
                            other => parts.push(other),
                        }
                    }
                }
                TokenKind::Bytes => return Err(self.error("bytes literals are not supported")),
                _ => break,
            }
            self.pos += 1;
        }
        if formatted {
            return Ok(Expr::JoinedStr(parts));
        }
        let text = match parts.pop() {
            Some(FStringPart::Literal(text)) => text,
            _ => String::new(),
        };
        Ok(Expr::Constant(Constant::Str(text)))
    }

    fn fstring_parts(&self, pieces: Vec<FPiece>, line: usize) -> ParseResult<Vec<FStringPart>> {
        pieces
            .into_iter()
            .map(|piece| match piece {
                FPiece::Literal(text) => Ok(FStringPart::Literal(text)),
                FPiece::Field {
                    source,
                    conversion,
                    spec,
                } => {
                    let value = self.field_expression(&source, line)?;
                    let spec = spec
                        .map(|spec| self.fstring_parts(spec, line))
                        .transpose()?;
                    Ok(FStringPart::Formatted {
                        value: Box::new(value),
                        conversion,
                        spec,
                    })
                }
            })
            .collect()
    }

    fn field_expression(&self, source: &str, line: usize) -> ParseResult<Expr> {
        let relocate = |mut e: SyntaxError| {
            e.line = line;
            e.message = format!("f-string: {}", e.message);
            e
        };
        let tokens = lexer::tokenize(&format!("({})", source)).map_err(relocate)?;
        let mut parser = Parser::new(tokens, self.depth);
        let expr = parser.atom().map_err(relocate)?;
        if !parser.is_newline() {
            return Err(relocate(parser.invalid()));
        }
        Ok(expr)
    }

    fn parenthesized(&mut self) -> ParseResult<Expr> {
        if self.eat_op(")") {
            return Ok(Expr::Tuple(Vec::new()));
        }
        if self.is_kw("yield") {
            self.pos += 1;
            let kind = if self.is_kw("from") {
                "YieldFrom"
            } else {
                "Yield"
            };
            self.pos -= 1;
            self.skip_to_close()?;
            return Ok(Expr::Unsupported(kind));
        }
        let first = self.star_named_expression()?;
        if self.is_kw("for") {
            self.comprehension_clauses()?;
            self.expect_op(")")?;
            return Ok(Expr::Unsupported("GeneratorExp"));
        }
        if self.eat_op(")") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.is_op(")") {
                break;
            }
            elts.push(self.star_named_expression()?);
        }
        self.expect_op(")")?;
        Ok(Expr::Tuple(elts))
    }

    /// Skip to and consume the `)` closing the current group.
    fn skip_to_close(&mut self) -> ParseResult<()> {
        let mut depth = 0usize;
        loop {
            match self.advance() {
                TokenKind::Eof => return Err(self.invalid()),
                TokenKind::Op("(" | "[" | "{") => depth += 1,
                TokenKind::Op(")") if depth == 0 => return Ok(()),
                TokenKind::Op(")" | "]" | "}") => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
    }

    fn list_display(&mut self) -> ParseResult<Expr> {
        if self.eat_op("]") {
            return Ok(Expr::List(Vec::new()));
        }
        let first = self.star_named_expression()?;
        if self.is_kw("for") {
            let generators = self.comprehension_clauses()?;
            self.expect_op("]")?;
            return Ok(Expr::ListComp {
                elt: Box::new(first),
                generators,
            });
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.is_op("]") {
                break;
            }
            elts.push(self.star_named_expression()?);
        }
        self.expect_op("]")?;
        Ok(Expr::List(elts))
    }

    fn brace_display(&mut self) -> ParseResult<Expr> {
        if self.eat_op("}") {
            return Ok(Expr::Dict {
                keys: Vec::new(),
                values: Vec::new(),
            });
        }

        let mut keys = Vec::new();
        let mut values = Vec::new();
        if self.eat_op("**") {
            keys.push(None);
            values.push(self.bitor()?);
        } else {
            let first = self.star_named_expression()?;
            if !self.eat_op(":") {
                return self.set_display(first);
            }
            let value = self.expression()?;
            if self.is_kw("for") {
                self.comprehension_clauses()?;
                self.expect_op("}")?;
                return Ok(Expr::Unsupported("DictComp"));
            }
            keys.push(Some(first));
            values.push(value);
        }

        while self.eat_op(",") {
            if self.is_op("}") {
                break;
            }
            if self.eat_op("**") {
                keys.push(None);
                values.push(self.bitor()?);
                continue;
            }
            keys.push(Some(self.expression()?));
            self.expect_op(":")?;
            values.push(self.expression()?);
        }
        self.expect_op("}")?;
        Ok(Expr::Dict { keys, values })
    }

    fn set_display(&mut self, first: Expr) -> ParseResult<Expr> {
        if self.is_kw("for") {
            self.comprehension_clauses()?;
            self.expect_op("}")?;
            return Ok(Expr::Unsupported("SetComp"));
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.is_op("}") {
                break;
            }
            elts.push(self.star_named_expression()?);
        }
        self.expect_op("}")?;
        Ok(Expr::Set(elts))
    }
}

fn push_literal(parts: &mut Vec<FStringPart>, text: String) {
    if let Some(FStringPart::Literal(last)) = parts.last_mut() {
        last.push_str(&text);
        return;
    }
    parts.push(FStringPart::Literal(text));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(source: &str) -> Stmt {
        let mut module = parse(source).unwrap();
        assert_eq!(module.body.len(), 1, "{:?}", module.body);
        module.body.remove(0)
    }

    fn expr(source: &str) -> Expr {
        match single(source) {
            Stmt::Expr(e) => e,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let e = expr("1 + 2 * 3 ** -1");
        let Expr::BinOp { op, right, .. } = e else { panic!() };
        assert_eq!(op, BinaryOp::Add);
        let Expr::BinOp { op, right, .. } = *right else { panic!() };
        assert_eq!(op, BinaryOp::Mult);
        let Expr::BinOp { op, right, .. } = *right else { panic!() };
        assert_eq!(op, BinaryOp::Pow);
        assert!(matches!(*right, Expr::UnaryOp { op: UnaryOp::USub, .. }));
    }

    #[test]
    fn test_for_with_tuple_target_and_else() {
        let stmt = single("for i, x in enumerate(xs):\n    pass\nelse:\n    y = 1\n");
        let Stmt::For { target, body, orelse, .. } = stmt else { panic!() };
        assert!(matches!(target, Expr::Tuple(ref t) if t.len() == 2));
        assert_eq!(body, vec![Stmt::Unsupported("Pass")]);
        assert_eq!(orelse.len(), 1);
    }

    #[test]
    fn test_elif_nests_if() {
        let stmt = single("if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n");
        let Stmt::If { orelse, .. } = stmt else { panic!() };
        assert!(matches!(orelse.as_slice(), [Stmt::If { .. }]));
    }

    #[test]
    fn test_comparison_chain_and_membership() {
        let e = expr("0 <= x < 10 not in y");
        let Expr::Compare { ops, .. } = e else { panic!() };
        assert_eq!(ops, vec![CmpOp::LtE, CmpOp::Lt, CmpOp::NotIn]);
    }

    #[test]
    fn test_list_comprehension() {
        let e = expr("[x * 2 for x in range(5) if x % 2 for y in z]");
        let Expr::ListComp { generators, .. } = e else { panic!() };
        assert_eq!(generators.len(), 2);
        assert_eq!(generators[0].ifs.len(), 1);
    }

    #[test]
    fn test_unsupported_constructs_are_tagged() {
        assert_eq!(single("import os\n"), Stmt::Unsupported("Import"));
        assert_eq!(single("def f(a, b=[1]):\n    return a\n"), Stmt::Unsupported("FunctionDef"));
        assert_eq!(single("while True:\n    break\n"), Stmt::Unsupported("While"));
        assert_eq!(
            single("try:\n    x = 1\nexcept Exception as e:\n    x = 2\n"),
            Stmt::Unsupported("Try")
        );
        assert_eq!(expr("lambda x: x"), Expr::Unsupported("Lambda"));
        assert_eq!(expr("(y := 3)"), Expr::Unsupported("NamedExpr"));
        assert_eq!(expr("{k: v for k in a}"), Expr::Unsupported("DictComp"));
        assert_eq!(expr("{k for k in a}"), Expr::Unsupported("SetComp"));
        let Expr::Call { args, .. } = expr("sum(x for x in a)") else { panic!() };
        assert_eq!(args, vec![Expr::Unsupported("GeneratorExp")]);
    }

    #[test]
    fn test_keywords_and_starred_arguments() {
        let Expr::Call { args, keywords, .. } = expr("f(*a, end='', **k)") else { panic!() };
        assert!(matches!(args[0], Expr::Starred(_)));
        assert_eq!(keywords.len(), 2);
        assert_eq!(keywords[0].arg.as_deref(), Some("end"));
        assert_eq!(keywords[1].arg, None);
    }

    #[test]
    fn test_slices() {
        let Expr::Subscript { slice, .. } = expr("a[1:-1:2]") else { panic!() };
        assert!(matches!(*slice, Expr::Slice { lower: Some(_), upper: Some(_), step: Some(_) }));
        let Expr::Subscript { slice, .. } = expr("a[::-1]") else { panic!() };
        assert!(matches!(*slice, Expr::Slice { lower: None, upper: None, step: Some(_) }));
    }

    #[test]
    fn test_fstring_fields_become_expressions() {
        let e = expr(r#"f"/setblock {x + 1} {y:03d}" 'tail'"#);
        let Expr::JoinedStr(parts) = e else { panic!() };
        assert_eq!(parts[0], FStringPart::Literal("/setblock ".into()));
        assert!(matches!(&parts[1], FStringPart::Formatted { value, .. } if matches!(**value, Expr::BinOp { .. })));
        assert!(matches!(&parts[3], FStringPart::Formatted { spec: Some(_), .. }));
        assert_eq!(parts[4], FStringPart::Literal("tail".into()));
    }

    #[test]
    fn test_assignment_chain_and_augmented() {
        let Stmt::Assign { targets, .. } = single("a = b = [1, 2]\n") else { panic!() };
        assert_eq!(targets.len(), 2);
        let Stmt::AugAssign { op, .. } = single("x[0] += 1\n") else { panic!() };
        assert_eq!(op, BinaryOp::Add);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("1 = x\n").unwrap_err().message.contains("literal"));
        assert!(parse("f() += 1\n").is_err());
        assert!(parse("for x in:\n    pass\n").is_err());
        assert!(parse("if x\n    y = 1\n").is_err());
        let deep = format!("x = {}1{}\n", "(".repeat(150), ")".repeat(150));
        assert_eq!(parse(&deep).unwrap_err().message, "too many nested parentheses");
    }
}
