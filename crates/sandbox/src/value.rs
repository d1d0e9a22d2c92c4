//! Runtime values and the operations every part of the interpreter shares:
//! equality, ordering, hashing, truthiness, iteration and `repr`.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::builtins::Builtin;

/// Nesting beyond this while comparing or printing raises `RecursionError`.
const MAX_RECURSION: usize = 500;

// =============================================================================
// Faults
// =============================================================================

/// Why evaluation stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// A script-level exception, reported as `Kind: message`.
    Raise { kind: &'static str, message: String },
    /// A sandbox limit; reported verbatim.
    Limit(String),
}

impl Fault {
    pub fn raise(kind: &'static str, message: impl Into<String>) -> Self {
        Fault::Raise {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::raise("TypeError", message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::raise("ValueError", message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::raise("IndexError", message)
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::raise("ZeroDivisionError", message)
    }

    pub fn overflow(message: impl Into<String>) -> Self {
        Self::raise("OverflowError", message)
    }

    pub fn limit(message: impl Into<String>) -> Self {
        Fault::Limit(message.into())
    }
}

pub type Exec<T> = std::result::Result<T, Fault>;

fn recursion_guard(depth: usize, what: &str) -> Exec<()> {
    if depth > MAX_RECURSION {
        return Err(Fault::raise(
            "RecursionError",
            format!("maximum recursion depth exceeded {}", what),
        ));
    }
    Ok(())
}

// =============================================================================
// Values
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    pub fn len(&self) -> i64 {
        let (start, stop, step) = (self.start as i128, self.stop as i128, self.step as i128);
        let len = if step > 0 && start < stop {
            (stop - start + step - 1) / step
        } else if step < 0 && start > stop {
            (start - stop - step - 1) / -step
        } else {
            0
        };
        len as i64
    }

    pub fn get(&self, index: i64) -> i64 {
        self.start + index * self.step
    }
}

/// An exhaustible iterator object (`enumerate`, `zip`, `reversed`).
#[derive(Debug)]
pub struct IteratorState {
    pub kind: &'static str,
    pub items: VecDeque<Value>,
}

#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<Dict>>),
    Set(Rc<RefCell<Set>>),
    Range(Range),
    Iterator(Rc<RefCell<IteratorState>>),
    Builtin(Builtin),
    Method(Rc<BoundMethod>),
}

impl Value {
    pub fn str(text: impl Into<Rc<str>>) -> Self {
        Value::Str(text.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(items))
    }

    pub fn iterator(kind: &'static str, items: impl IntoIterator<Item = Value>) -> Self {
        Value::Iterator(Rc::new(RefCell::new(IteratorState {
            kind,
            items: items.into_iter().collect(),
        })))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Range(_) => "range",
            Value::Iterator(it) => it.borrow().kind,
            Value::Builtin(_) | Value::Method(_) => "builtin_function_or_method",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            Value::Dict(d) => d.borrow().len() > 0,
            Value::Set(s) => s.borrow().len() > 0,
            Value::Range(r) => r.len() > 0,
            Value::Iterator(_) | Value::Builtin(_) | Value::Method(_) => true,
        }
    }

    /// Integer view (bools count as integers).
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view for mixed arithmetic.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(*b as i64 as f64),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Int(_) | Value::Float(_))
    }

    pub fn repr(&self) -> Exec<String> {
        let mut seen = Vec::new();
        self.repr_inner(&mut seen, 0)
    }

    /// `str()` of the value.
    pub fn to_str(&self) -> Exec<String> {
        match self {
            Value::Str(s) => Ok(s.to_string()),
            other => other.repr(),
        }
    }

    fn repr_inner(&self, seen: &mut Vec<usize>, depth: usize) -> Exec<String> {
        recursion_guard(depth, "while getting the repr of an object")?;
        Ok(match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => float_repr(*f),
            Value::Str(s) => str_repr(s),
            Value::List(list) => {
                let id = Rc::as_ptr(list) as *const () as usize;
                if seen.contains(&id) {
                    return Ok("[...]".to_string());
                }
                seen.push(id);
                let items = list.borrow().clone();
                let parts = join_reprs(&items, seen, depth)?;
                seen.pop();
                format!("[{}]", parts)
            }
            Value::Tuple(items) => {
                let parts = join_reprs(items, seen, depth)?;
                if items.len() == 1 {
                    format!("({},)", parts)
                } else {
                    format!("({})", parts)
                }
            }
            Value::Dict(dict) => {
                let id = Rc::as_ptr(dict) as *const () as usize;
                if seen.contains(&id) {
                    return Ok("{...}".to_string());
                }
                seen.push(id);
                let items = dict.borrow().items();
                let mut parts = Vec::with_capacity(items.len());
                for (key, value) in &items {
                    parts.push(format!(
                        "{}: {}",
                        key.repr_inner(seen, depth + 1)?,
                        value.repr_inner(seen, depth + 1)?
                    ));
                }
                seen.pop();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Set(set) => {
                let items = set.borrow().values();
                if items.is_empty() {
                    "set()".to_string()
                } else {
                    format!("{{{}}}", join_reprs(&items, seen, depth)?)
                }
            }
            Value::Range(r) if r.step == 1 => format!("range({}, {})", r.start, r.stop),
            Value::Range(r) => format!("range({}, {}, {})", r.start, r.stop, r.step),
            Value::Iterator(it) => format!("<{} object>", it.borrow().kind),
            Value::Builtin(b) => format!("<built-in function {}>", b.name()),
            Value::Method(m) => format!(
                "<built-in method {} of {} object>",
                m.name,
                m.receiver.type_name()
            ),
        })
    }
}

fn join_reprs(items: &[Value], seen: &mut Vec<usize>, depth: usize) -> Exec<String> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(item.repr_inner(seen, depth + 1)?);
    }
    Ok(parts.join(", "))
}

/// Shortest round-tripping float text, switching to exponent form outside `1e-4..1e16`.
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let sci = format!("{:e}", f.abs());
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();

    let body = if (-4..16).contains(&exponent) {
        if exponent >= 0 {
            let int_len = exponent as usize + 1;
            if digits.len() <= int_len {
                format!("{}{}.0", digits, "0".repeat(int_len - digits.len()))
            } else {
                format!("{}.{}", &digits[..int_len], &digits[int_len..])
            }
        } else {
            format!("0.{}{}", "0".repeat((-exponent - 1) as usize), digits)
        }
    } else {
        let mut m = digits[..1].to_string();
        if digits.len() > 1 {
            m.push('.');
            m.push_str(&digits[1..]);
        }
        format!(
            "{}e{}{:02}",
            m,
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        )
    };
    if f < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

/// Quoted string literal text.
pub fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32))
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

// =============================================================================
// Hashing and containers
// =============================================================================

/// Hashable projection of a value. Numerically equal keys collide the way
/// `1`, `1.0` and `True` do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Tuple(Vec<HashKey>),
}

impl HashKey {
    pub fn of(value: &Value) -> Exec<HashKey> {
        Ok(match value {
            Value::None => HashKey::None,
            Value::Bool(b) => HashKey::Int(*b as i64),
            Value::Int(i) => HashKey::Int(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 9.2e18 {
                    HashKey::Int(*f as i64)
                } else {
                    HashKey::Float(f.to_bits())
                }
            }
            Value::Str(s) => HashKey::Str(s.clone()),
            Value::Tuple(items) => {
                HashKey::Tuple(items.iter().map(HashKey::of).collect::<Exec<_>>()?)
            }
            other => {
                return Err(Fault::type_error(format!(
                    "unhashable type: '{}'",
                    other.type_name()
                )))
            }
        })
    }
}

/// Insertion-ordered mapping.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: Vec<(HashKey, Value, Value)>,
    index: HashMap<HashKey, usize>,
}

impl Dict {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &Value) -> Exec<Option<Value>> {
        let hash = HashKey::of(key)?;
        Ok(self.index.get(&hash).map(|&i| self.entries[i].2.clone()))
    }

    pub fn contains(&self, key: &Value) -> Exec<bool> {
        Ok(self.index.contains_key(&HashKey::of(key)?))
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Exec<()> {
        let hash = HashKey::of(&key)?;
        match self.index.get(&hash) {
            Some(&i) => self.entries[i].2 = value,
            None => {
                self.index.insert(hash.clone(), self.entries.len());
                self.entries.push((hash, key, value));
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> Exec<Option<Value>> {
        let hash = HashKey::of(key)?;
        let Some(i) = self.index.remove(&hash) else {
            return Ok(None);
        };
        let (_, _, value) = self.entries.remove(i);
        self.reindex();
        Ok(Some(value))
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (hash, _, _))| (hash.clone(), i))
            .collect();
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, _, v)| v.clone()).collect()
    }

    pub fn items(&self) -> Vec<(Value, Value)> {
        self.entries
            .iter()
            .map(|(_, k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Insertion-ordered set.
#[derive(Debug, Clone, Default)]
pub struct Set {
    entries: Vec<(HashKey, Value)>,
    index: HashMap<HashKey, usize>,
}

impl Set {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, value: &Value) -> Exec<bool> {
        Ok(self.index.contains_key(&HashKey::of(value)?))
    }

    pub fn add(&mut self, value: Value) -> Exec<()> {
        let hash = HashKey::of(&value)?;
        if !self.index.contains_key(&hash) {
            self.index.insert(hash.clone(), self.entries.len());
            self.entries.push((hash, value));
        }
        Ok(())
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// `a == b`.
pub fn py_eq(a: &Value, b: &Value) -> Exec<bool> {
    eq_inner(a, b, 0)
}

fn eq_inner(a: &Value, b: &Value, depth: usize) -> Exec<bool> {
    recursion_guard(depth, "in comparison")?;
    Ok(match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Int(x), Value::Int(y)) => x == y,
        (x, y) if x.is_number() && y.is_number() => match (x.as_int(), y.as_int()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return Ok(true);
            }
            let (x, y) = (x.borrow().clone(), y.borrow().clone());
            seq_eq(&x, &y, depth)?
        }
        (Value::Tuple(x), Value::Tuple(y)) => seq_eq(x, y, depth)?,
        (Value::Dict(x), Value::Dict(y)) => {
            let (x, y) = (x.borrow().clone(), y.borrow().clone());
            if x.len() != y.len() {
                return Ok(false);
            }
            for (key, value) in x.items() {
                match y.get(&key)? {
                    Some(other) if eq_inner(&value, &other, depth + 1)? => {}
                    _ => return Ok(false),
                }
            }
            true
        }
        (Value::Set(x), Value::Set(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            if x.len() != y.len() {
                return Ok(false);
            }
            for value in x.values() {
                if !y.contains(&value)? {
                    return Ok(false);
                }
            }
            true
        }
        (Value::Range(x), Value::Range(y)) => {
            let len = x.len();
            len == y.len() && (len == 0 || (x.start == y.start && (len == 1 || x.step == y.step)))
        }
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        (Value::Iterator(x), Value::Iterator(y)) => Rc::ptr_eq(x, y),
        _ => false,
    })
}

fn seq_eq(x: &[Value], y: &[Value], depth: usize) -> Exec<bool> {
    if x.len() != y.len() {
        return Ok(false);
    }
    for (a, b) in x.iter().zip(y) {
        if !eq_inner(a, b, depth + 1)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Ordering for `<`, `<=`, `>`, `>=` and sorting. `None` means unordered (NaN).
pub fn py_cmp(a: &Value, b: &Value, op: &str) -> Exec<Option<Ordering>> {
    cmp_inner(a, b, op, 0)
}

fn cmp_inner(a: &Value, b: &Value, op: &str, depth: usize) -> Exec<Option<Ordering>> {
    recursion_guard(depth, "in comparison")?;
    match (a, b) {
        (x, y) if x.is_number() && y.is_number() => Ok(match (x.as_int(), y.as_int()) {
            (Some(i), Some(j)) => Some(i.cmp(&j)),
            _ => x.as_f64().partial_cmp(&y.as_f64()),
        }),
        (Value::Str(x), Value::Str(y)) => Ok(Some(x.cmp(y))),
        (Value::List(x), Value::List(y)) => {
            let (x, y) = (x.borrow().clone(), y.borrow().clone());
            seq_cmp(&x, &y, op, depth)
        }
        (Value::Tuple(x), Value::Tuple(y)) => seq_cmp(x, y, op, depth),
        _ => Err(Fault::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op,
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn seq_cmp(x: &[Value], y: &[Value], op: &str, depth: usize) -> Exec<Option<Ordering>> {
    for (a, b) in x.iter().zip(y) {
        if !eq_inner(a, b, depth + 1)? {
            return cmp_inner(a, b, op, depth + 1);
        }
    }
    Ok(Some(x.len().cmp(&y.len())))
}

/// Total order used by `sorted`, `min` and `max`.
pub fn order(a: &Value, b: &Value) -> Exec<Ordering> {
    Ok(py_cmp(a, b, "<")?.unwrap_or(Ordering::Equal))
}

/// Sort in place; the first comparison error wins.
pub fn sort_values(items: &mut [Value]) -> Exec<()> {
    let mut failure = None;
    items.sort_by(|a, b| match order(a, b) {
        Ok(ordering) => ordering,
        Err(fault) => {
            failure.get_or_insert(fault);
            Ordering::Equal
        }
    });
    match failure {
        Some(fault) => Err(fault),
        None => Ok(()),
    }
}

/// `needle in haystack`.
pub fn contains(haystack: &Value, needle: &Value) -> Exec<bool> {
    match haystack {
        Value::Str(s) => match needle {
            Value::Str(n) => Ok(s.contains(&**n)),
            other => Err(Fault::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Dict(d) => d.borrow().contains(needle),
        Value::Set(s) => s.borrow().contains(needle),
        Value::Range(r) => Ok(match needle.as_int() {
            Some(n) => {
                let offset = n as i128 - r.start as i128;
                let step = r.step as i128;
                offset % step == 0 && (0..r.len() as i128).contains(&(offset / step))
            }
            None => false,
        }),
        other => {
            for item in collect(other)? {
                if py_eq(&item, needle)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

// =============================================================================
// Iteration
// =============================================================================

/// A live iteration over a value. Lists are read by index so appends made
/// during the loop are visited.
pub enum ValueIter {
    List {
        list: Rc<RefCell<Vec<Value>>>,
        index: usize,
    },
    Range {
        next: i64,
        remaining: i64,
        step: i64,
    },
    Items(std::vec::IntoIter<Value>),
    Shared(Rc<RefCell<IteratorState>>),
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::List { list, index } => {
                let item = list.borrow().get(*index).cloned();
                *index += 1;
                item
            }
            ValueIter::Range {
                next,
                remaining,
                step,
            } => {
                if *remaining <= 0 {
                    return None;
                }
                let value = *next;
                *remaining -= 1;
                *next = next.wrapping_add(*step);
                Some(Value::Int(value))
            }
            ValueIter::Items(items) => items.next(),
            ValueIter::Shared(state) => state.borrow_mut().items.pop_front(),
        }
    }
}

pub fn iterate(value: &Value) -> Exec<ValueIter> {
    Ok(match value {
        Value::List(list) => ValueIter::List {
            list: list.clone(),
            index: 0,
        },
        Value::Range(r) => ValueIter::Range {
            next: r.start,
            remaining: r.len(),
            step: r.step,
        },
        Value::Tuple(items) => ValueIter::Items(items.to_vec().into_iter()),
        Value::Str(s) => ValueIter::Items(
            s.chars()
                .map(|c| Value::str(c.to_string()))
                .collect::<Vec<_>>()
                .into_iter(),
        ),
        Value::Dict(d) => ValueIter::Items(d.borrow().keys().into_iter()),
        Value::Set(s) => ValueIter::Items(s.borrow().values().into_iter()),
        Value::Iterator(state) => ValueIter::Shared(state.clone()),
        other => {
            return Err(Fault::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            )))
        }
    })
}

/// Materialize an iterable.
pub fn collect(value: &Value) -> Exec<Vec<Value>> {
    match value {
        Value::List(list) => Ok(list.borrow().clone()),
        other => Ok(iterate(other)?.collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_repr() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(-2.5), "-2.5");
        assert_eq!(float_repr(123.456), "123.456");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e-7), "1.5e-07");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(1e22), "1e+22");
        assert_eq!(float_repr(f64::INFINITY), "inf");
    }

    #[test]
    fn test_repr_of_containers() {
        let list = Value::list(vec![
            Value::Int(1),
            Value::str("a'b"),
            Value::tuple(vec![Value::Bool(true)]),
            Value::None,
        ]);
        assert_eq!(list.repr().unwrap(), r#"[1, "a'b", (True,), None]"#);

        let mut dict = Dict::default();
        dict.insert(Value::str("k"), Value::Float(2.0)).unwrap();
        assert_eq!(
            Value::Dict(Rc::new(RefCell::new(dict))).repr().unwrap(),
            "{'k': 2.0}"
        );
        assert_eq!(
            Value::Set(Rc::new(RefCell::new(Set::default()))).repr().unwrap(),
            "set()"
        );
    }

    #[test]
    fn test_self_referencing_list_repr() {
        let list = Value::list(Vec::new());
        if let Value::List(inner) = &list {
            inner.borrow_mut().push(list.clone());
        }
        assert_eq!(list.repr().unwrap(), "[[...]]");
    }

    #[test]
    fn test_numeric_keys_collide() {
        let mut dict = Dict::default();
        dict.insert(Value::Int(1), Value::str("int")).unwrap();
        dict.insert(Value::Float(1.0), Value::str("float")).unwrap();
        dict.insert(Value::Bool(true), Value::str("bool")).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get(&Value::Int(1)).unwrap().unwrap().to_str().unwrap(), "bool");
        assert!(dict.insert(Value::list(Vec::new()), Value::None).is_err());
    }

    #[test]
    fn test_equality_and_ordering() {
        assert!(py_eq(&Value::Int(1), &Value::Float(1.0)).unwrap());
        assert!(py_eq(
            &Value::list(vec![Value::Int(1)]),
            &Value::list(vec![Value::Bool(true)])
        )
        .unwrap());
        assert!(!py_eq(&Value::str("1"), &Value::Int(1)).unwrap());
        assert_eq!(
            order(
                &Value::tuple(vec![Value::Int(1), Value::Int(2)]),
                &Value::tuple(vec![Value::Int(1), Value::Int(3)])
            )
            .unwrap(),
            Ordering::Less
        );
        let err = order(&Value::Int(1), &Value::str("a")).unwrap_err();
        assert_eq!(
            err,
            Fault::type_error("'<' not supported between instances of 'int' and 'str'")
        );
    }

    #[test]
    fn test_range_len_and_membership() {
        let r = Range { start: 10, stop: 0, step: -3 };
        assert_eq!(r.len(), 4);
        let items: Vec<i64> = iterate(&Value::Range(r))
            .unwrap()
            .filter_map(|v| v.as_int())
            .collect();
        assert_eq!(items, vec![10, 7, 4, 1]);
        assert!(contains(&Value::Range(r), &Value::Int(4)).unwrap());
        assert!(!contains(&Value::Range(r), &Value::Int(5)).unwrap());
    }

    #[test]
    fn test_list_iteration_sees_appends() {
        let list = Value::list(vec![Value::Int(0)]);
        let mut it = iterate(&list).unwrap();
        assert!(it.next().is_some());
        if let Value::List(inner) = &list {
            inner.borrow_mut().push(Value::Int(1));
        }
        assert_eq!(it.next().and_then(|v| v.as_int()), Some(1));
        assert!(it.next().is_none());
    }
}
