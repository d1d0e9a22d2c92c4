//! The fixed set of functions visible to generator scripts.
//!
//! Nothing here touches the host: no I/O, no imports, no introspection.
//! `range` is capped so a single loop can never be enormous, and `print`
//! discards its arguments.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::format::with_commas;
use crate::value::{
    collect, iterate, order, sort_values, Dict, Exec, Fault, Range, Set, Value,
};

/// Largest span a single `range()` may cover.
pub const MAX_RANGE: i64 = 10_000;

/// Largest list or string an operation may build.
pub const MAX_SEQUENCE: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Range,
    Enumerate,
    Zip,
    Sorted,
    Reversed,
    Len,
    Sum,
    Min,
    Max,
    Any,
    All,
    Int,
    Float,
    Str,
    Bool,
    List,
    Tuple,
    Dict,
    Set,
    Abs,
    Round,
    Pow,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Radians,
    Degrees,
    Floor,
    Ceil,
    Log,
    Log10,
    Exp,
    Print,
}

impl Builtin {
    pub const ALL: [Builtin; 38] = [
        Builtin::Range,
        Builtin::Enumerate,
        Builtin::Zip,
        Builtin::Sorted,
        Builtin::Reversed,
        Builtin::Len,
        Builtin::Sum,
        Builtin::Min,
        Builtin::Max,
        Builtin::Any,
        Builtin::All,
        Builtin::Int,
        Builtin::Float,
        Builtin::Str,
        Builtin::Bool,
        Builtin::List,
        Builtin::Tuple,
        Builtin::Dict,
        Builtin::Set,
        Builtin::Abs,
        Builtin::Round,
        Builtin::Pow,
        Builtin::Sqrt,
        Builtin::Sin,
        Builtin::Cos,
        Builtin::Tan,
        Builtin::Asin,
        Builtin::Acos,
        Builtin::Atan,
        Builtin::Atan2,
        Builtin::Radians,
        Builtin::Degrees,
        Builtin::Floor,
        Builtin::Ceil,
        Builtin::Log,
        Builtin::Log10,
        Builtin::Exp,
        Builtin::Print,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Range => "range",
            Builtin::Enumerate => "enumerate",
            Builtin::Zip => "zip",
            Builtin::Sorted => "sorted",
            Builtin::Reversed => "reversed",
            Builtin::Len => "len",
            Builtin::Sum => "sum",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Any => "any",
            Builtin::All => "all",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Str => "str",
            Builtin::Bool => "bool",
            Builtin::List => "list",
            Builtin::Tuple => "tuple",
            Builtin::Dict => "dict",
            Builtin::Set => "set",
            Builtin::Abs => "abs",
            Builtin::Round => "round",
            Builtin::Pow => "pow",
            Builtin::Sqrt => "sqrt",
            Builtin::Sin => "sin",
            Builtin::Cos => "cos",
            Builtin::Tan => "tan",
            Builtin::Asin => "asin",
            Builtin::Acos => "acos",
            Builtin::Atan => "atan",
            Builtin::Atan2 => "atan2",
            Builtin::Radians => "radians",
            Builtin::Degrees => "degrees",
            Builtin::Floor => "floor",
            Builtin::Ceil => "ceil",
            Builtin::Log => "log",
            Builtin::Log10 => "log10",
            Builtin::Exp => "exp",
            Builtin::Print => "print",
        }
    }
}

/// The initial global namespace of every script.
pub fn namespace() -> HashMap<String, Value> {
    let mut names: HashMap<String, Value> = Builtin::ALL
        .iter()
        .map(|b| (b.name().to_string(), Value::Builtin(*b)))
        .collect();
    names.insert("pi".into(), Value::Float(std::f64::consts::PI));
    names.insert("e".into(), Value::Float(std::f64::consts::E));
    names.insert("commands".into(), Value::list(Vec::new()));
    names
}

pub fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Exec<()> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        format!("exactly {}", min)
    } else if args.len() < min {
        format!("at least {}", min)
    } else {
        format!("at most {}", max)
    };
    let noun = if expected.ends_with(" 1") {
        "argument"
    } else {
        "arguments"
    };
    Err(Fault::type_error(format!(
        "{}() takes {} {} ({} given)",
        name,
        expected,
        noun,
        args.len()
    )))
}

fn real(name: &str, value: &Value) -> Exec<f64> {
    value.as_f64().ok_or_else(|| {
        Fault::type_error(format!(
            "{}() argument must be a real number, not '{}'",
            name,
            value.type_name()
        ))
    })
}

fn domain_error() -> Fault {
    Fault::value_error("math domain error")
}

/// Convert a float result to an int the way `floor`, `ceil` and `round` do.
pub fn float_to_int(f: f64) -> Exec<i64> {
    if f.is_nan() {
        return Err(Fault::value_error("cannot convert float NaN to integer"));
    }
    if f.is_infinite() {
        return Err(Fault::overflow("cannot convert float infinity to integer"));
    }
    if f >= 9.223_372_036_854_775_807e18 || f < -9.223_372_036_854_775_808e18 {
        return Err(Fault::overflow("int too large to convert"));
    }
    Ok(f as i64)
}

pub fn round_half_even(f: f64) -> f64 {
    let rounded = f.round();
    if (f - f.trunc()).abs() == 0.5 {
        2.0 * (f / 2.0).round()
    } else {
        rounded
    }
}

pub fn call(builtin: Builtin, args: Vec<Value>) -> Exec<Value> {
    let name = builtin.name();
    match builtin {
        Builtin::Range => safe_range(&args),
        Builtin::Enumerate => {
            arity(name, &args, 1, 2)?;
            let start = match args.get(1) {
                Some(v) => v.as_int().ok_or_else(|| {
                    Fault::type_error(format!(
                        "'{}' object cannot be interpreted as an integer",
                        v.type_name()
                    ))
                })?,
                None => 0,
            };
            let items = collect(&args[0])?;
            Ok(Value::iterator(
                "enumerate",
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| Value::tuple(vec![Value::Int(start + i as i64), item])),
            ))
        }
        Builtin::Zip => {
            let columns = args.iter().map(collect).collect::<Exec<Vec<_>>>()?;
            let len = columns.iter().map(Vec::len).min().unwrap_or(0);
            Ok(Value::iterator(
                "zip",
                (0..len).map(|i| Value::tuple(columns.iter().map(|c| c[i].clone()).collect())),
            ))
        }
        Builtin::Sorted => {
            arity(name, &args, 1, 1)?;
            let mut items = collect(&args[0])?;
            sort_values(&mut items)?;
            Ok(Value::list(items))
        }
        Builtin::Reversed => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Set(_) | Value::Iterator(_) => Err(Fault::type_error(format!(
                    "'{}' object is not reversible",
                    args[0].type_name()
                ))),
                other => {
                    let mut items = collect(other)?;
                    items.reverse();
                    Ok(Value::iterator("reversed", items))
                }
            }
        }
        Builtin::Len => {
            arity(name, &args, 1, 1)?;
            let len = match &args[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(l) => l.borrow().len(),
                Value::Tuple(t) => t.len(),
                Value::Dict(d) => d.borrow().len(),
                Value::Set(s) => s.borrow().len(),
                Value::Range(r) => r.len() as usize,
                other => {
                    return Err(Fault::type_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Int(len as i64))
        }
        Builtin::Sum => {
            arity(name, &args, 1, 2)?;
            let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
            if matches!(total, Value::Str(_)) {
                return Err(Fault::type_error(
                    "sum() can't sum strings [use ''.join(seq) instead]",
                ));
            }
            for item in iterate(&args[0])? {
                total = crate::interp::binary(crate::ast::BinaryOp::Add, &total, &item)?;
            }
            Ok(total)
        }
        Builtin::Min | Builtin::Max => {
            if args.is_empty() {
                return Err(Fault::type_error(format!(
                    "{} expected at least 1 argument, got 0",
                    name
                )));
            }
            let items = if args.len() == 1 {
                collect(&args[0])?
            } else {
                args
            };
            let mut best: Option<Value> = None;
            for item in items {
                best = Some(match best {
                    None => item,
                    Some(current) => {
                        let ordering = order(&item, &current)?;
                        let better = if builtin == Builtin::Min {
                            ordering.is_lt()
                        } else {
                            ordering.is_gt()
                        };
                        if better {
                            item
                        } else {
                            current
                        }
                    }
                });
            }
            best.ok_or_else(|| Fault::value_error(format!("{}() iterable argument is empty", name)))
        }
        Builtin::Any => {
            arity(name, &args, 1, 1)?;
            Ok(Value::Bool(iterate(&args[0])?.any(|v| v.truthy())))
        }
        Builtin::All => {
            arity(name, &args, 1, 1)?;
            Ok(Value::Bool(iterate(&args[0])?.all(|v| v.truthy())))
        }
        Builtin::Int => to_int(&args),
        Builtin::Float => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Float(0.0)),
                Some(Value::Str(s)) => parse_float(s).map(Value::Float),
                Some(v) => Ok(Value::Float(real(name, v)?)),
            }
        }
        Builtin::Str => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::str("")),
                Some(v) => Ok(Value::str(v.to_str()?)),
            }
        }
        Builtin::Bool => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
        }
        Builtin::List => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::list(Vec::new())),
                Some(v) => Ok(Value::list(collect(v)?)),
            }
        }
        Builtin::Tuple => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::tuple(Vec::new())),
                Some(Value::Tuple(t)) => Ok(Value::Tuple(t.clone())),
                Some(v) => Ok(Value::tuple(collect(v)?)),
            }
        }
        Builtin::Dict => {
            arity(name, &args, 0, 1)?;
            let mut dict = Dict::default();
            if let Some(source) = args.first() {
                merge_dict(&mut dict, source)?;
            }
            Ok(Value::Dict(Rc::new(RefCell::new(dict))))
        }
        Builtin::Set => {
            arity(name, &args, 0, 1)?;
            let mut set = Set::default();
            if let Some(source) = args.first() {
                for item in iterate(source)? {
                    set.add(item)?;
                }
            }
            Ok(Value::Set(Rc::new(RefCell::new(set))))
        }
        Builtin::Abs => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Float(f) => Ok(Value::Float(f.abs())),
                v => match v.as_int() {
                    Some(i) => i
                        .checked_abs()
                        .map(Value::Int)
                        .ok_or_else(|| Fault::overflow("integer overflow in abs()")),
                    None => Err(Fault::type_error(format!(
                        "bad operand type for abs(): '{}'",
                        v.type_name()
                    ))),
                },
            }
        }
        Builtin::Round => round(&args),
        Builtin::Pow => {
            arity(name, &args, 2, 3)?;
            if args.len() == 2 {
                return crate::interp::binary(crate::ast::BinaryOp::Pow, &args[0], &args[1]);
            }
            modular_pow(&args[0], &args[1], &args[2])
        }
        Builtin::Sqrt => unary_math(name, &args, |x| {
            if x < 0.0 {
                Err(domain_error())
            } else {
                Ok(x.sqrt())
            }
        }),
        Builtin::Sin => unary_math(name, &args, |x| finite_arg(x).map(f64::sin)),
        Builtin::Cos => unary_math(name, &args, |x| finite_arg(x).map(f64::cos)),
        Builtin::Tan => unary_math(name, &args, |x| finite_arg(x).map(f64::tan)),
        Builtin::Asin => unary_math(name, &args, |x| {
            if (-1.0..=1.0).contains(&x) {
                Ok(x.asin())
            } else {
                Err(domain_error())
            }
        }),
        Builtin::Acos => unary_math(name, &args, |x| {
            if (-1.0..=1.0).contains(&x) {
                Ok(x.acos())
            } else {
                Err(domain_error())
            }
        }),
        Builtin::Atan => unary_math(name, &args, |x| Ok(x.atan())),
        Builtin::Atan2 => {
            arity(name, &args, 2, 2)?;
            Ok(Value::Float(real(name, &args[0])?.atan2(real(name, &args[1])?)))
        }
        Builtin::Radians => unary_math(name, &args, |x| Ok(x.to_radians())),
        Builtin::Degrees => unary_math(name, &args, |x| Ok(x.to_degrees())),
        Builtin::Floor | Builtin::Ceil => {
            arity(name, &args, 1, 1)?;
            if let Some(i) = args[0].as_int() {
                return Ok(Value::Int(i));
            }
            let x = real(name, &args[0])?;
            let y = if builtin == Builtin::Floor {
                x.floor()
            } else {
                x.ceil()
            };
            Ok(Value::Int(float_to_int(y)?))
        }
        Builtin::Log => {
            arity(name, &args, 1, 2)?;
            let x = real(name, &args[0])?;
            if x <= 0.0 {
                return Err(domain_error());
            }
            match args.get(1) {
                None => Ok(Value::Float(x.ln())),
                Some(base) => {
                    let base = real(name, base)?;
                    if base <= 0.0 {
                        return Err(domain_error());
                    }
                    if base == 1.0 {
                        return Err(Fault::zero_division("float division by zero"));
                    }
                    Ok(Value::Float(x.ln() / base.ln()))
                }
            }
        }
        Builtin::Log10 => unary_math(name, &args, |x| {
            if x <= 0.0 {
                Err(domain_error())
            } else {
                Ok(x.log10())
            }
        }),
        Builtin::Exp => unary_math(name, &args, |x| {
            let y = x.exp();
            if y.is_infinite() && x.is_finite() {
                Err(Fault::overflow("math range error"))
            } else {
                Ok(y)
            }
        }),
        Builtin::Print => Ok(Value::None),
    }
}

fn finite_arg(x: f64) -> Exec<f64> {
    if x.is_infinite() {
        return Err(domain_error());
    }
    Ok(x)
}

fn unary_math(name: &str, args: &[Value], f: impl Fn(f64) -> Exec<f64>) -> Exec<Value> {
    arity(name, args, 1, 1)?;
    f(real(name, &args[0])?).map(Value::Float)
}

/// `range()` with a hard cap on its span. Violations are sandbox limits,
/// not catchable script errors.
fn safe_range(args: &[Value]) -> Exec<Value> {
    let ints = || -> Exec<Vec<i64>> {
        args.iter()
            .map(|a| {
                a.as_int()
                    .ok_or_else(|| Fault::limit("range arguments must be integers"))
            })
            .collect()
    };
    let range = match args.len() {
        1 => match args[0].as_int() {
            Some(stop) if stop <= MAX_RANGE => Range {
                start: 0,
                stop,
                step: 1,
            },
            _ => {
                return Err(Fault::limit(format!(
                    "range stop value too large: {}",
                    args[0].to_str()?
                )))
            }
        },
        2 => {
            let v = ints()?;
            let size = (v[1] as i128 - v[0] as i128).abs();
            if size > MAX_RANGE as i128 {
                return Err(Fault::limit(format!("range size too large: {}", size)));
            }
            Range {
                start: v[0],
                stop: v[1],
                step: 1,
            }
        }
        3 => {
            let v = ints()?;
            if v[2] == 0 {
                return Err(Fault::limit("range step cannot be zero"));
            }
            let (span, step) = (v[1] as i128 - v[0] as i128, v[2] as i128);
            let mut size = span / step;
            if span % step != 0 && (span < 0) != (step < 0) {
                size -= 1;
            }
            let size = size.abs();
            if size > MAX_RANGE as i128 {
                return Err(Fault::limit(format!("range size too large: {}", size)));
            }
            Range {
                start: v[0],
                stop: v[1],
                step: v[2],
            }
        }
        _ => return Err(Fault::limit("range takes 1-3 arguments")),
    };
    Ok(Value::Range(range))
}

fn to_int(args: &[Value]) -> Exec<Value> {
    arity("int", args, 0, 2)?;
    let Some(value) = args.first() else {
        return Ok(Value::Int(0));
    };
    if let Some(base) = args.get(1) {
        let Value::Str(text) = value else {
            return Err(Fault::type_error(
                "int() can't convert non-string with explicit base",
            ));
        };
        let base = base
            .as_int()
            .ok_or_else(|| Fault::type_error("int() base must be an integer"))?;
        if base != 0 && !(2..=36).contains(&base) {
            return Err(Fault::value_error("int() base must be >= 2 and <= 36, or 0"));
        }
        return parse_int(text, base as u32).map(Value::Int);
    }
    match value {
        Value::Str(text) => parse_int(text, 10).map(Value::Int),
        Value::Float(f) => float_to_int(f.trunc()).map(Value::Int),
        other => other.as_int().map(Value::Int).ok_or_else(|| {
            Fault::type_error(format!(
                "int() argument must be a string, a bytes-like object or a real number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn parse_int(text: &str, base: u32) -> Exec<i64> {
    let invalid = || {
        Fault::value_error(format!(
            "invalid literal for int() with base {}: {}",
            base,
            crate::value::str_repr(text)
        ))
    };
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let lower = body.to_lowercase();
    let (base, digits) = match base {
        0 | 16 if lower.starts_with("0x") => (16, &body[2..]),
        0 | 8 if lower.starts_with("0o") => (8, &body[2..]),
        0 | 2 if lower.starts_with("0b") => (2, &body[2..]),
        0 => (10, body),
        b => (b, body),
    };
    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return Err(invalid());
    }
    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    let magnitude = u64::from_str_radix(&cleaned, base).map_err(|_| invalid())?;
    let value = if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    };
    value.ok_or_else(|| Fault::overflow("int too large to convert"))
}

fn parse_float(text: &str) -> Exec<f64> {
    let trimmed = text.trim();
    let valid_underscores = !trimmed.starts_with('_')
        && !trimmed.ends_with('_')
        && !trimmed.contains("__");
    let cleaned: String = trimmed.chars().filter(|&c| c != '_').collect();
    match cleaned.parse::<f64>() {
        Ok(f) if valid_underscores && !cleaned.is_empty() => Ok(f),
        _ => Err(Fault::value_error(format!(
            "could not convert string to float: {}",
            crate::value::str_repr(text)
        ))),
    }
}

fn round(args: &[Value]) -> Exec<Value> {
    arity("round", args, 1, 2)?;
    let digits = match args.get(1) {
        None | Some(Value::None) => None,
        Some(v) => Some(v.as_int().ok_or_else(|| {
            Fault::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                v.type_name()
            ))
        })?),
    };
    match (&args[0], digits) {
        (Value::Float(f), None) => float_to_int(round_half_even(*f)).map(Value::Int),
        (Value::Float(f), Some(n)) => {
            if !f.is_finite() {
                return Ok(Value::Float(*f));
            }
            let rounded = if n >= 0 {
                let n = n.min(300) as usize;
                format!("{:.*}", n, f).parse::<f64>().unwrap_or(*f)
            } else {
                let scale = 10f64.powi((-n).min(308) as i32);
                round_half_even(f / scale) * scale
            };
            Ok(Value::Float(rounded))
        }
        (other, digits) => {
            let Some(i) = other.as_int() else {
                return Err(Fault::type_error(format!(
                    "type {} doesn't define __round__ method",
                    other.type_name()
                )));
            };
            match digits {
                Some(n) if n < 0 => {
                    let scale = 10i128.checked_pow((-n) as u32).unwrap_or(i128::MAX);
                    let value = i as i128;
                    let quotient = value.div_euclid(scale);
                    let remainder = value.rem_euclid(scale);
                    let doubled = remainder * 2;
                    let quotient = if doubled > scale || (doubled == scale && quotient % 2 != 0) {
                        quotient + 1
                    } else {
                        quotient
                    };
                    i64::try_from(quotient * scale)
                        .map(Value::Int)
                        .map_err(|_| Fault::overflow("integer overflow in round()"))
                }
                _ => Ok(Value::Int(i)),
            }
        }
    }
}

fn modular_pow(base: &Value, exponent: &Value, modulus: &Value) -> Exec<Value> {
    let (Some(base), Some(exponent), Some(modulus)) =
        (base.as_int(), exponent.as_int(), modulus.as_int())
    else {
        return Err(Fault::type_error(
            "pow() 3rd argument not allowed unless all arguments are integers",
        ));
    };
    if modulus == 0 {
        return Err(Fault::value_error("pow() 3rd argument cannot be 0"));
    }
    if exponent < 0 {
        return Err(Fault::value_error("base is not invertible for the given modulus"));
    }
    let m = modulus as i128;
    let mut result: i128 = 1 % m.abs();
    let mut b = (base as i128).rem_euclid(m.abs());
    let mut e = exponent;
    while e > 0 {
        if e & 1 == 1 {
            result = result * b % m.abs();
        }
        b = b * b % m.abs();
        e >>= 1;
    }
    // result takes the sign of the modulus
    if m < 0 && result != 0 {
        result += m;
    }
    Ok(Value::Int(result as i64))
}

/// `dict(source)` and `dict.update(source)`.
pub fn merge_dict(dict: &mut Dict, source: &Value) -> Exec<()> {
    if let Value::Dict(other) = source {
        for (key, value) in other.borrow().items() {
            dict.insert(key, value)?;
        }
        return Ok(());
    }
    for (index, pair) in iterate(source)?.enumerate() {
        let items = collect(&pair).map_err(|_| {
            Fault::type_error(format!(
                "cannot convert dictionary update sequence element #{} to a sequence",
                index
            ))
        })?;
        let [key, value]: [Value; 2] = items.try_into().map_err(|items: Vec<Value>| {
            Fault::value_error(format!(
                "dictionary update sequence element #{} has length {}; 2 is required",
                index,
                items.len()
            ))
        })?;
        dict.insert(key, value)?;
    }
    Ok(())
}

/// Refuse to build sequences that would exhaust memory.
pub fn check_size(len: usize) -> Exec<()> {
    if len > MAX_SEQUENCE {
        return Err(Fault::raise(
            "MemoryError",
            format!(
                "sequence of {} items exceeds the limit of {}",
                with_commas(len),
                with_commas(MAX_SEQUENCE)
            ),
        ));
    }
    Ok(())
}
