//! Tree-walking evaluator for validated generator scripts.
//!
//! The interpreter owns the script namespace. Every statement and loop
//! iteration checks the wall-clock deadline, and every `for` body run or
//! comprehension element counts against the iteration budget.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use vibecraft_core::config::SandboxLimits;

use crate::ast::{BinaryOp, BoolOp, CmpOp, Comprehension, Constant, Expr, FStringPart, Module, Stmt, UnaryOp};
use crate::builtins::{self, check_size, merge_dict};
use crate::format::{format_value, percent_format, with_commas};
use crate::methods;
use crate::value::{
    collect, contains, iterate, py_cmp, py_eq, Dict, Exec, Fault, Range, Set, Value,
};

enum Flow {
    Normal,
    Break,
    Continue,
}

pub struct Interpreter {
    globals: HashMap<String, Value>,
    /// Comprehension scopes, innermost last.
    scopes: Vec<HashMap<String, Value>>,
    iterations: u64,
    max_iterations: u64,
    deadline: Option<Instant>,
    timeout_secs: u64,
}

impl Interpreter {
    pub fn new(limits: &SandboxLimits) -> Self {
        let deadline = (limits.timeout_secs > 0)
            .then(|| Instant::now() + Duration::from_secs(limits.timeout_secs));
        Self {
            globals: builtins::namespace(),
            scopes: Vec::new(),
            iterations: 0,
            max_iterations: limits.max_iterations,
            deadline,
            timeout_secs: limits.timeout_secs,
        }
    }

    pub fn run(&mut self, module: &Module) -> Exec<()> {
        check_loop_control(&module.body, false)?;
        self.exec_block(&module.body)?;
        Ok(())
    }

    /// A top-level binding after the script finished.
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    fn check_clock(&self) -> Exec<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Fault::limit(format!(
                "Code execution timed out after {} seconds",
                self.timeout_secs
            ))),
            _ => Ok(()),
        }
    }

    fn tick(&mut self) -> Exec<()> {
        self.iterations += 1;
        if self.iterations > self.max_iterations {
            return Err(Fault::limit(format!(
                "Code exceeded the limit of {} loop iterations",
                with_commas(self.max_iterations)
            )));
        }
        self.check_clock()
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn exec_block(&mut self, body: &[Stmt]) -> Exec<Flow> {
        for stmt in body {
            self.check_clock()?;
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Exec<Flow> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::Assign { targets, value } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign(target, value.clone())?;
                }
            }
            Stmt::AugAssign { target, op, value } => self.aug_assign(target, *op, value)?,
            Stmt::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let iterable = self.eval(iter)?;
                for item in iterate(&iterable)? {
                    self.tick()?;
                    self.assign(target, item)?;
                    if let Flow::Break = self.exec_block(body)? {
                        return Ok(Flow::Normal);
                    }
                }
                return self.exec_block(orelse);
            }
            Stmt::If { test, body, orelse } => {
                return if self.eval(test)?.truthy() {
                    self.exec_block(body)
                } else {
                    self.exec_block(orelse)
                };
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Unsupported(kind) => return Err(unsupported(kind)),
        }
        Ok(Flow::Normal)
    }

    fn store(&mut self, name: &str, value: Value) {
        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => &mut self.globals,
        };
        scope.insert(name.to_string(), value);
    }

    fn lookup(&self, name: &str) -> Exec<Value> {
        self.scopes
            .iter()
            .rev()
            .chain(std::iter::once(&self.globals))
            .find_map(|scope| scope.get(name))
            .cloned()
            .ok_or_else(|| {
                Fault::raise("NameError", format!("name '{}' is not defined", name))
            })
    }

    fn assign(&mut self, target: &Expr, value: Value) -> Exec<()> {
        match target {
            Expr::Name(name) => {
                self.store(name, value);
                Ok(())
            }
            Expr::Tuple(targets) | Expr::List(targets) => {
                let items = collect(&value).map_err(|_| {
                    Fault::type_error(format!(
                        "cannot unpack non-iterable {} object",
                        value.type_name()
                    ))
                })?;
                match items.len().cmp(&targets.len()) {
                    Ordering::Greater => Err(Fault::value_error(format!(
                        "too many values to unpack (expected {})",
                        targets.len()
                    ))),
                    Ordering::Less => Err(Fault::value_error(format!(
                        "not enough values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    ))),
                    Ordering::Equal => {
                        for (target, item) in targets.iter().zip(items) {
                            self.assign(target, item)?;
                        }
                        Ok(())
                    }
                }
            }
            Expr::Subscript { value: container, slice } => {
                let container = self.eval(container)?;
                if let Expr::Slice { lower, upper, step } = slice.as_ref() {
                    let bounds = self.slice_bounds(lower, upper, step)?;
                    return assign_slice(&container, bounds, value);
                }
                let key = self.eval(slice)?;
                set_item(&container, key, value)
            }
            Expr::Attribute { value: object, attr } => {
                let object = self.eval(object)?;
                Err(Fault::raise(
                    "AttributeError",
                    format!(
                        "'{}' object has no attribute '{}'",
                        object.type_name(),
                        attr
                    ),
                ))
            }
            Expr::Starred(_) => Err(unsupported("Starred")),
            _ => Err(Fault::raise("SyntaxError", "cannot assign to expression")),
        }
    }

    fn aug_assign(&mut self, target: &Expr, op: BinaryOp, value: &Expr) -> Exec<()> {
        match target {
            Expr::Name(name) => {
                let current = self.lookup(name)?;
                let rhs = self.eval(value)?;
                let updated = in_place(op, current, &rhs)?;
                self.store(name, updated);
                Ok(())
            }
            Expr::Subscript { value: container, slice } => {
                if matches!(slice.as_ref(), Expr::Slice { .. }) {
                    return Err(unsupported("augmented slice assignment"));
                }
                let container = self.eval(container)?;
                let key = self.eval(slice)?;
                let current = get_item(&container, &key)?;
                let rhs = self.eval(value)?;
                let updated = in_place(op, current, &rhs)?;
                set_item(&container, key, updated)
            }
            Expr::Attribute { .. } => self.assign(target, Value::None),
            _ => Err(Fault::raise(
                "SyntaxError",
                "illegal expression for augmented assignment",
            )),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn eval(&mut self, expr: &Expr) -> Exec<Value> {
        match expr {
            Expr::Constant(constant) => Ok(match constant {
                Constant::None => Value::None,
                Constant::Bool(b) => Value::Bool(*b),
                Constant::Int(i) => Value::Int(*i),
                Constant::Float(f) => Value::Float(*f),
                Constant::Str(s) => Value::str(s.as_str()),
            }),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => Ok(Value::list(self.eval_all(items)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(items)?)),
            Expr::Set(items) => {
                let mut set = Set::default();
                for item in self.eval_all(items)? {
                    set.add(item)?;
                }
                Ok(Value::Set(Rc::new(std::cell::RefCell::new(set))))
            }
            Expr::Dict { keys, values } => {
                let mut dict = Dict::default();
                for (key, value) in keys.iter().zip(values) {
                    let value = self.eval(value)?;
                    match key {
                        Some(key) => {
                            let key = self.eval(key)?;
                            dict.insert(key, value)?;
                        }
                        None if matches!(value, Value::Dict(_)) => merge_dict(&mut dict, &value)?,
                        None => {
                            return Err(Fault::type_error(format!(
                                "'{}' object is not a mapping",
                                value.type_name()
                            )))
                        }
                    }
                }
                Ok(Value::Dict(Rc::new(std::cell::RefCell::new(dict))))
            }
            Expr::BoolOp { op, values } => {
                let mut result = Value::None;
                for value in values {
                    result = self.eval(value)?;
                    let decided = match op {
                        BoolOp::And => !result.truthy(),
                        BoolOp::Or => result.truthy(),
                    };
                    if decided {
                        break;
                    }
                }
                Ok(result)
            }
            Expr::BinOp { left, op, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right)
            }
            Expr::UnaryOp { op, operand } => {
                let operand = self.eval(operand)?;
                unary(*op, &operand)
            }
            Expr::IfExp { test, body, orelse } => {
                if self.eval(test)?.truthy() {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }
            Expr::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut left = self.eval(left)?;
                for (op, right) in ops.iter().zip(comparators) {
                    let right = self.eval(right)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                let callee = self.eval(func)?;
                if !keywords.is_empty() {
                    return Err(Fault::type_error(format!(
                        "{}() takes no keyword arguments",
                        callable_name(&callee)
                    )));
                }
                let args = self.eval_all(args)?;
                match &callee {
                    Value::Builtin(builtin) => builtins::call(*builtin, args),
                    Value::Method(method) => methods::call_method(method, args),
                    other => Err(Fault::type_error(format!(
                        "'{}' object is not callable",
                        other.type_name()
                    ))),
                }
            }
            Expr::JoinedStr(parts) => Ok(Value::str(self.render_fstring(parts)?)),
            Expr::Attribute { value, attr } => {
                let value = self.eval(value)?;
                methods::get_attribute(&value, attr)
            }
            Expr::Subscript { value, slice } => {
                let container = self.eval(value)?;
                if let Expr::Slice { lower, upper, step } = slice.as_ref() {
                    let bounds = self.slice_bounds(lower, upper, step)?;
                    return get_slice(&container, bounds);
                }
                let key = self.eval(slice)?;
                get_item(&container, &key)
            }
            Expr::ListComp { elt, generators } => self.list_comp(elt, generators),
            Expr::Starred(_) => Err(unsupported("Starred")),
            Expr::Slice { .. } => Err(unsupported("Slice")),
            Expr::Unsupported(kind) => Err(unsupported(kind)),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Exec<Vec<Value>> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            if let Expr::Starred(_) = expr {
                return Err(unsupported("Starred"));
            }
            values.push(self.eval(expr)?);
        }
        Ok(values)
    }

    fn render_fstring(&mut self, parts: &[FStringPart]) -> Exec<String> {
        let mut out = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(text) => out.push_str(text),
                FStringPart::Formatted {
                    value,
                    conversion,
                    spec,
                } => {
                    let value = self.eval(value)?;
                    let value = match conversion {
                        Some('r') => Value::str(value.repr()?),
                        Some('a') => Value::str(ascii(&value.repr()?)),
                        Some(_) => Value::str(value.to_str()?),
                        None => value,
                    };
                    let spec = match spec {
                        Some(spec) => self.render_fstring(spec)?,
                        None => String::new(),
                    };
                    out.push_str(&format_value(&value, &spec)?);
                }
            }
            check_size(out.len())?;
        }
        Ok(out)
    }

    fn slice_bounds(
        &mut self,
        lower: &Option<Box<Expr>>,
        upper: &Option<Box<Expr>>,
        step: &Option<Box<Expr>>,
    ) -> Exec<SliceBounds> {
        let mut bound = |expr: &Option<Box<Expr>>| -> Exec<Option<i64>> {
            let Some(expr) = expr else {
                return Ok(None);
            };
            match self.eval(expr)? {
                Value::None => Ok(None),
                v => v.as_int().map(Some).ok_or_else(|| {
                    Fault::type_error(
                        "slice indices must be integers or None or have an __index__ method",
                    )
                }),
            }
        };
        Ok(SliceBounds {
            lower: bound(lower)?,
            upper: bound(upper)?,
            step: bound(step)?,
        })
    }

    fn list_comp(&mut self, elt: &Expr, generators: &[Comprehension]) -> Exec<Value> {
        let Some(first) = generators.first() else {
            return Ok(Value::list(Vec::new()));
        };
        // the outermost iterable is evaluated in the enclosing scope
        let iterable = self.eval(&first.iter)?;
        self.scopes.push(HashMap::new());
        let mut out = Vec::new();
        let result = self.comprehend(elt, generators, Some(iterable), &mut out);
        self.scopes.pop();
        result?;
        Ok(Value::list(out))
    }

    fn comprehend(
        &mut self,
        elt: &Expr,
        generators: &[Comprehension],
        iterable: Option<Value>,
        out: &mut Vec<Value>,
    ) -> Exec<()> {
        let Some((generator, rest)) = generators.split_first() else {
            check_size(out.len() + 1)?;
            out.push(self.eval(elt)?);
            return Ok(());
        };
        let iterable = match iterable {
            Some(value) => value,
            None => self.eval(&generator.iter)?,
        };
        'items: for item in iterate(&iterable)? {
            self.tick()?;
            self.assign(&generator.target, item)?;
            for condition in &generator.ifs {
                if !self.eval(condition)?.truthy() {
                    continue 'items;
                }
            }
            self.comprehend(elt, rest, None, out)?;
        }
        Ok(())
    }
}

fn unsupported(kind: &str) -> Fault {
    Fault::raise("SyntaxError", format!("{} is not supported", kind))
}

/// Reject `break`/`continue` outside a loop before anything runs.
fn check_loop_control(body: &[Stmt], in_loop: bool) -> Exec<()> {
    for stmt in body {
        match stmt {
            Stmt::Break if !in_loop => {
                return Err(Fault::raise("SyntaxError", "'break' outside loop"))
            }
            Stmt::Continue if !in_loop => {
                return Err(Fault::raise("SyntaxError", "'continue' not properly in loop"))
            }
            Stmt::For { body, orelse, .. } => {
                check_loop_control(body, true)?;
                check_loop_control(orelse, in_loop)?;
            }
            Stmt::If { body, orelse, .. } => {
                check_loop_control(body, in_loop)?;
                check_loop_control(orelse, in_loop)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn callable_name(value: &Value) -> String {
    match value {
        Value::Builtin(builtin) => builtin.name().to_string(),
        Value::Method(method) => format!("{}.{}", method.receiver.type_name(), method.name),
        other => other.type_name().to_string(),
    }
}

/// `ascii()` applied to an existing repr.
fn ascii(repr: &str) -> String {
    let mut out = String::with_capacity(repr.len());
    for c in repr.chars() {
        match c as u32 {
            0..=0x7f => out.push(c),
            code @ 0x80..=0xff => out.push_str(&format!("\\x{:02x}", code)),
            code @ 0x100..=0xffff => out.push_str(&format!("\\u{:04x}", code)),
            code => out.push_str(&format!("\\U{:08x}", code)),
        }
    }
    out
}

// =============================================================================
// Operators
// =============================================================================

fn operand_error(op: BinaryOp, a: &Value, b: &Value) -> Fault {
    Fault::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        a.type_name(),
        b.type_name()
    ))
}

fn int_overflow() -> Fault {
    Fault::overflow("integer result too large")
}

/// `a <op> b` with Python semantics on the sandbox's value types.
pub fn binary(op: BinaryOp, a: &Value, b: &Value) -> Exec<Value> {
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        if let (Value::Bool(p), Value::Bool(q)) = (a, b) {
            match op {
                BinaryOp::BitAnd => return Ok(Value::Bool(*p & *q)),
                BinaryOp::BitOr => return Ok(Value::Bool(*p | *q)),
                BinaryOp::BitXor => return Ok(Value::Bool(*p ^ *q)),
                _ => {}
            }
        }
        return int_binary(op, x, y, a, b);
    }
    if a.is_number() && b.is_number() {
        let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
        return float_binary(op, x, y, a, b);
    }
    match (op, a, b) {
        (BinaryOp::Add, Value::Str(x), Value::Str(y)) => {
            check_size(x.len() + y.len())?;
            Ok(Value::str(format!("{}{}", x, y)))
        }
        (BinaryOp::Add, Value::Str(_), other) => Err(Fault::type_error(format!(
            "can only concatenate str (not \"{}\") to str",
            other.type_name()
        ))),
        (BinaryOp::Mod, Value::Str(template), args) => {
            percent_format(template, args).map(Value::str)
        }
        (BinaryOp::Mult, Value::Str(s), n) | (BinaryOp::Mult, n, Value::Str(s))
            if n.as_int().is_some() =>
        {
            let count = repeat_count(n, s.len())?;
            Ok(Value::str(s.repeat(count)))
        }
        (BinaryOp::Add, Value::List(x), Value::List(y)) => {
            let mut items = x.borrow().clone();
            items.extend(y.borrow().iter().cloned());
            check_size(items.len())?;
            Ok(Value::list(items))
        }
        (BinaryOp::Add, Value::List(_), other) => Err(Fault::type_error(format!(
            "can only concatenate list (not \"{}\") to list",
            other.type_name()
        ))),
        (BinaryOp::Mult, Value::List(l), n) | (BinaryOp::Mult, n, Value::List(l))
            if n.as_int().is_some() =>
        {
            let items = l.borrow().clone();
            let count = repeat_count(n, items.len())?;
            Ok(Value::list(repeat_items(&items, count)))
        }
        (BinaryOp::Add, Value::Tuple(x), Value::Tuple(y)) => {
            let mut items = x.to_vec();
            items.extend(y.iter().cloned());
            check_size(items.len())?;
            Ok(Value::tuple(items))
        }
        (BinaryOp::Add, Value::Tuple(_), other) => Err(Fault::type_error(format!(
            "can only concatenate tuple (not \"{}\") to tuple",
            other.type_name()
        ))),
        (BinaryOp::Mult, Value::Tuple(t), n) | (BinaryOp::Mult, n, Value::Tuple(t))
            if n.as_int().is_some() =>
        {
            let count = repeat_count(n, t.len())?;
            Ok(Value::tuple(repeat_items(t, count)))
        }
        _ => Err(operand_error(op, a, b)),
    }
}

fn repeat_count(n: &Value, unit: usize) -> Exec<usize> {
    let count = n.as_int().unwrap_or(0).max(0) as usize;
    check_size(unit.saturating_mul(count))?;
    Ok(count)
}

fn repeat_items(items: &[Value], count: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    out
}

fn int_binary(op: BinaryOp, x: i64, y: i64, a: &Value, b: &Value) -> Exec<Value> {
    let int = |r: Option<i64>| r.map(Value::Int).ok_or_else(int_overflow);
    match op {
        BinaryOp::Add => int(x.checked_add(y)),
        BinaryOp::Sub => int(x.checked_sub(y)),
        BinaryOp::Mult => int(x.checked_mul(y)),
        BinaryOp::Div => {
            if y == 0 {
                return Err(Fault::zero_division("division by zero"));
            }
            Ok(Value::Float(x as f64 / y as f64))
        }
        BinaryOp::FloorDiv => {
            if y == 0 {
                return Err(Fault::zero_division("integer division or modulo by zero"));
            }
            let q = x.checked_div(y).ok_or_else(int_overflow)?;
            Ok(Value::Int(if x % y != 0 && (x < 0) != (y < 0) {
                q - 1
            } else {
                q
            }))
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(Fault::zero_division("integer modulo by zero"));
            }
            let r = x.checked_rem(y).unwrap_or(0);
            Ok(Value::Int(if r != 0 && (r < 0) != (y < 0) { r + y } else { r }))
        }
        BinaryOp::Pow => {
            if y < 0 {
                if x == 0 {
                    return Err(Fault::zero_division(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Value::Float((x as f64).powf(y as f64)));
            }
            match x {
                0 | 1 => Ok(Value::Int(if y == 0 { 1 } else { x })),
                -1 => Ok(Value::Int(if y % 2 == 0 { 1 } else { -1 })),
                _ => {
                    let exponent = u32::try_from(y).map_err(|_| int_overflow())?;
                    int(x.checked_pow(exponent))
                }
            }
        }
        BinaryOp::LShift | BinaryOp::RShift => {
            if y < 0 {
                return Err(Fault::value_error("negative shift count"));
            }
            if op == BinaryOp::RShift {
                return Ok(Value::Int(x >> y.min(63)));
            }
            if x == 0 {
                return Ok(Value::Int(0));
            }
            let shifted = u32::try_from(y)
                .ok()
                .filter(|&s| s < 64)
                .and_then(|s| x.checked_mul(1i64.checked_shl(s)?));
            int(shifted.filter(|v| v >> y == x))
        }
        BinaryOp::BitAnd => Ok(Value::Int(x & y)),
        BinaryOp::BitOr => Ok(Value::Int(x | y)),
        BinaryOp::BitXor => Ok(Value::Int(x ^ y)),
        BinaryOp::MatMult => Err(operand_error(op, a, b)),
    }
}

fn float_binary(op: BinaryOp, x: f64, y: f64, a: &Value, b: &Value) -> Exec<Value> {
    let value = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mult => x * y,
        BinaryOp::Div => {
            if y == 0.0 {
                return Err(Fault::zero_division("float division by zero"));
            }
            x / y
        }
        BinaryOp::FloorDiv => {
            if y == 0.0 {
                return Err(Fault::zero_division("float floor division by zero"));
            }
            (x / y).floor()
        }
        BinaryOp::Mod => {
            if y == 0.0 {
                return Err(Fault::zero_division("float modulo by zero"));
            }
            let r = x % y;
            if r != 0.0 && (r < 0.0) != (y < 0.0) {
                r + y
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(Fault::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            if x < 0.0 && y.fract() != 0.0 {
                return Err(Fault::value_error(
                    "negative number cannot be raised to a fractional power",
                ));
            }
            let result = x.powf(y);
            if result.is_infinite() && x.is_finite() && y.is_finite() {
                return Err(Fault::overflow("(34, 'Numerical result out of range')"));
            }
            result
        }
        _ => return Err(operand_error(op, a, b)),
    };
    Ok(Value::Float(value))
}

/// `+=` and friends; lists are extended or repeated in place.
fn in_place(op: BinaryOp, current: Value, rhs: &Value) -> Exec<Value> {
    if let Value::List(list) = &current {
        match op {
            BinaryOp::Add => {
                let extra = collect(rhs)?;
                let mut items = list.borrow_mut();
                check_size(items.len() + extra.len())?;
                items.extend(extra);
                drop(items);
                return Ok(current);
            }
            BinaryOp::Mult if rhs.as_int().is_some() => {
                let snapshot = list.borrow().clone();
                let count = repeat_count(rhs, snapshot.len())?;
                *list.borrow_mut() = repeat_items(&snapshot, count);
                return Ok(current);
            }
            _ => {}
        }
    }
    binary(op, &current, rhs)
}

fn unary(op: UnaryOp, operand: &Value) -> Exec<Value> {
    let bad = || {
        let symbol = match op {
            UnaryOp::USub => "-",
            UnaryOp::UAdd => "+",
            _ => "~",
        };
        Fault::type_error(format!(
            "bad operand type for unary {}: '{}'",
            symbol,
            operand.type_name()
        ))
    };
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.truthy())),
        UnaryOp::USub => match operand {
            Value::Float(f) => Ok(Value::Float(-f)),
            v => match v.as_int() {
                Some(i) => i.checked_neg().map(Value::Int).ok_or_else(int_overflow),
                None => Err(bad()),
            },
        },
        UnaryOp::UAdd => match operand {
            Value::Float(f) => Ok(Value::Float(*f)),
            v => v.as_int().map(Value::Int).ok_or_else(bad),
        },
        UnaryOp::Invert => operand.as_int().map(|i| Value::Int(!i)).ok_or_else(bad),
    }
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> Exec<bool> {
    let ordered = |accept: fn(Ordering) -> bool| -> Exec<bool> {
        Ok(py_cmp(a, b, op.symbol())?.is_some_and(accept))
    };
    match op {
        CmpOp::Eq => py_eq(a, b),
        CmpOp::NotEq => Ok(!py_eq(a, b)?),
        CmpOp::Lt => ordered(Ordering::is_lt),
        CmpOp::LtE => ordered(Ordering::is_le),
        CmpOp::Gt => ordered(Ordering::is_gt),
        CmpOp::GtE => ordered(Ordering::is_ge),
        CmpOp::In => contains(b, a),
        CmpOp::NotIn => Ok(!contains(b, a)?),
        CmpOp::Is => Ok(same_object(a, b)),
        CmpOp::IsNot => Ok(!same_object(a, b)),
    }
}

fn same_object(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => Rc::ptr_eq(x, y),
        (Value::List(x), Value::List(y)) => Rc::ptr_eq(x, y),
        (Value::Tuple(x), Value::Tuple(y)) => Rc::ptr_eq(x, y),
        (Value::Dict(x), Value::Dict(y)) => Rc::ptr_eq(x, y),
        (Value::Set(x), Value::Set(y)) => Rc::ptr_eq(x, y),
        (Value::Iterator(x), Value::Iterator(y)) => Rc::ptr_eq(x, y),
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        _ => false,
    }
}

// =============================================================================
// Subscripts
// =============================================================================

struct SliceBounds {
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
}

impl SliceBounds {
    /// Resolve against a sequence length into `(start, stop, step)`.
    fn resolve(&self, len: i64) -> Exec<(i64, i64, i64)> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(Fault::value_error("slice step cannot be zero"));
        }
        let clamp = |bound: Option<i64>, default: i64| -> i64 {
            match bound {
                None => default,
                Some(i) => {
                    let i = if i < 0 { i.saturating_add(len) } else { i };
                    if i < 0 {
                        if step < 0 {
                            -1
                        } else {
                            0
                        }
                    } else if i >= len {
                        if step < 0 {
                            len - 1
                        } else {
                            len
                        }
                    } else {
                        i
                    }
                }
            }
        };
        let (start_default, stop_default) = if step < 0 { (len - 1, -1) } else { (0, len) };
        Ok((
            clamp(self.lower, start_default),
            clamp(self.upper, stop_default),
            step,
        ))
    }

    fn positions(&self, len: usize) -> Exec<Vec<usize>> {
        let (start, stop, step) = self.resolve(len as i64)?;
        let mut out = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            out.push(i as usize);
            i += step;
        }
        Ok(out)
    }
}

fn get_slice(container: &Value, bounds: SliceBounds) -> Exec<Value> {
    match container {
        Value::List(list) => {
            let items = list.borrow();
            let picked = bounds.positions(items.len())?;
            Ok(Value::list(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Tuple(items) => {
            let picked = bounds.positions(items.len())?;
            Ok(Value::tuple(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let picked = bounds.positions(chars.len())?;
            Ok(Value::str(picked.into_iter().map(|i| chars[i]).collect::<String>()))
        }
        Value::Range(r) => {
            let (start, stop, step) = bounds.resolve(r.len())?;
            Ok(Value::Range(Range {
                start: r.get(start),
                stop: r.get(stop),
                step: r.step * step,
            }))
        }
        other => Err(not_subscriptable(other)),
    }
}

fn assign_slice(container: &Value, bounds: SliceBounds, value: Value) -> Exec<()> {
    let Value::List(list) = container else {
        return Err(Fault::type_error(format!(
            "'{}' object does not support item assignment",
            container.type_name()
        )));
    };
    let replacement = collect(&value)?;
    let mut items = list.borrow_mut();
    let len = items.len();
    if bounds.step.unwrap_or(1) == 1 {
        let (start, stop, _) = bounds.resolve(len as i64)?;
        let start = start as usize;
        let stop = (stop as usize).max(start);
        check_size(len - (stop - start) + replacement.len())?;
        items.splice(start..stop, replacement);
        return Ok(());
    }
    let positions = bounds.positions(len)?;
    if positions.len() != replacement.len() {
        return Err(Fault::value_error(format!(
            "attempt to assign sequence of size {} to extended slice of size {}",
            replacement.len(),
            positions.len()
        )));
    }
    for (i, item) in positions.into_iter().zip(replacement) {
        items[i] = item;
    }
    Ok(())
}

fn not_subscriptable(value: &Value) -> Fault {
    Fault::type_error(format!(
        "'{}' object is not subscriptable",
        value.type_name()
    ))
}

fn sequence_index(kind: &str, key: &Value, len: usize) -> Exec<usize> {
    let Some(index) = key.as_int() else {
        return Err(Fault::type_error(if kind == "string" {
            format!("string indices must be integers, not '{}'", key.type_name())
        } else {
            format!(
                "{} indices must be integers or slices, not {}",
                kind,
                key.type_name()
            )
        }));
    };
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    if !(0..len).contains(&resolved) {
        let what = if kind == "range" { "range object" } else { kind };
        return Err(Fault::index_error(format!("{} index out of range", what)));
    }
    Ok(resolved as usize)
}

fn get_item(container: &Value, key: &Value) -> Exec<Value> {
    match container {
        Value::List(list) => {
            let items = list.borrow();
            Ok(items[sequence_index("list", key, items.len())?].clone())
        }
        Value::Tuple(items) => Ok(items[sequence_index("tuple", key, items.len())?].clone()),
        Value::Str(s) => {
            let len = s.chars().count();
            let index = sequence_index("string", key, len)?;
            Ok(Value::str(
                s.chars().nth(index).map(String::from).unwrap_or_default(),
            ))
        }
        Value::Range(r) => {
            let index = sequence_index("range", key, r.len() as usize)?;
            Ok(Value::Int(r.get(index as i64)))
        }
        Value::Dict(dict) => {
            let found = dict.borrow().get(key)?;
            match found {
                Some(value) => Ok(value),
                None => Err(Fault::raise("KeyError", key.repr()?)),
            }
        }
        other => Err(not_subscriptable(other)),
    }
}

fn set_item(container: &Value, key: Value, value: Value) -> Exec<()> {
    match container {
        Value::List(list) => {
            let mut items = list.borrow_mut();
            let len = items.len();
            let index = sequence_index("list", &key, len).map_err(|fault| match fault {
                Fault::Raise {
                    kind: "IndexError", ..
                } => Fault::index_error("list assignment index out of range"),
                other => other,
            })?;
            items[index] = value;
            Ok(())
        }
        Value::Dict(dict) => dict.borrow_mut().insert(key, value),
        other => Err(Fault::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(source: &str) -> Exec<Interpreter> {
        let module = parse(source).expect("parse");
        let mut interp = Interpreter::new(&SandboxLimits::default());
        interp.run(&module)?;
        Ok(interp)
    }

    fn global_repr(source: &str, name: &str) -> String {
        let interp = run(source).expect("run");
        interp.global(name).expect("bound").repr().expect("repr")
    }

    #[test]
    fn test_arithmetic_semantics() {
        assert_eq!(global_repr("x = 7 // -2", "x"), "-4");
        assert_eq!(global_repr("x = -7 % 3", "x"), "2");
        assert_eq!(global_repr("x = 7 / 2", "x"), "3.5");
        assert_eq!(global_repr("x = 2 ** 10", "x"), "1024");
        assert_eq!(global_repr("x = 2 ** -1", "x"), "0.5");
        assert_eq!(global_repr("x = 5.5 % -2", "x"), "-0.5");
        assert_eq!(global_repr("x = 'ab' * 3", "x"), "'ababab'");
        assert_eq!(global_repr("x = '%s=%d' % ('y', 4)", "x"), "'y=4'");
        assert_eq!(global_repr("x = 1 < 2 < 3 > 2", "x"), "True");
        assert_eq!(global_repr("x = 0 or [] or 'z'", "x"), "'z'");
    }

    #[test]
    fn test_division_by_zero_message() {
        let err = run("x = 1 / 0").err().unwrap();
        assert_eq!(err, Fault::zero_division("division by zero"));
        let err = run("x = 1.0 // 0").err().unwrap();
        assert_eq!(err, Fault::zero_division("float floor division by zero"));
    }

    #[test]
    fn test_overflow_is_reported() {
        let err = run("x = 2 ** 70").err().unwrap();
        assert_eq!(err, Fault::overflow("integer result too large"));
    }

    #[test]
    fn test_loops_and_control_flow() {
        let source = "\
out = []
for i in range(10):
    if i % 2 == 0:
        continue
    if i > 7:
        break
    out.append(i)
else:
    out.append('never')
";
        assert_eq!(global_repr(source, "out"), "[1, 3, 5, 7]");

        let source = "\
out = []
for i in range(2):
    pass_through = i
else:
    out.append('done')
";
        assert_eq!(global_repr(source, "out"), "['done']");
    }

    #[test]
    fn test_unpacking_and_subscripts() {
        let source = "\
a, (b, c) = 1, [2, 3]
grid = [[0] * 3 for _ in range(2)]
grid[1][2] = 9
d = {'k': 1}
d['k'] += 4
xs = list(range(6))
xs[1:3] = ['a']
ys = xs[::-2]
";
        let interp = run(source).unwrap();
        let get = |name: &str| interp.global(name).unwrap().repr().unwrap();
        assert_eq!(get("c"), "3");
        assert_eq!(get("grid"), "[[0, 0, 0], [0, 0, 9]]");
        assert_eq!(get("d"), "{'k': 5}");
        assert_eq!(get("xs"), "[0, 'a', 3, 4, 5]");
        assert_eq!(get("ys"), "[5, 3, 0]");

        let err = run("a, b = [1, 2, 3]").err().unwrap();
        assert_eq!(err, Fault::value_error("too many values to unpack (expected 2)"));
    }

    #[test]
    fn test_comprehension_scope() {
        let source = "\
x = 'outer'
pts = [(x, z) for x in range(3) for z in range(x) if z != 1]
";
        let interp = run(source).unwrap();
        assert_eq!(interp.global("x").unwrap().repr().unwrap(), "'outer'");
        assert_eq!(
            interp.global("pts").unwrap().repr().unwrap(),
            "[(1, 0), (2, 0)]"
        );
    }

    #[test]
    fn test_fstring_rendering() {
        let source = "\
name = 'oak'
n = 3.14159
s = f'{name!r}:{n:.2f}:{7:>4}:{n:{5}.1f}'
";
        assert_eq!(global_repr(source, "s"), "\"'oak':3.14:   7:  3.1\"");
    }

    #[test]
    fn test_iteration_budget() {
        let module = parse("for i in range(10):\n    for j in range(10):\n        x = i").unwrap();
        let limits = SandboxLimits {
            max_iterations: 50,
            ..SandboxLimits::default()
        };
        let mut interp = Interpreter::new(&limits);
        let err = interp.run(&module).unwrap_err();
        assert_eq!(err, Fault::limit("Code exceeded the limit of 50 loop iterations"));
        assert_eq!(interp.iterations(), 51);
    }

    #[test]
    fn test_loop_control_outside_loop() {
        let err = run("if True:\n    break").err().unwrap();
        assert_eq!(err, Fault::raise("SyntaxError", "'break' outside loop"));
    }

    #[test]
    fn test_name_error() {
        let err = run("x = y + 1").err().unwrap();
        assert_eq!(err, Fault::raise("NameError", "name 'y' is not defined"));
    }

    #[test]
    fn test_list_aliasing_with_augmented_assign() {
        let source = "\
a = [1]
b = a
b += [2]
";
        assert_eq!(global_repr(source, "a"), "[1, 2]");
    }
}
