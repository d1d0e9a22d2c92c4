//! Methods reachable through attribute access on runtime values.

use std::cell::RefCell;
use std::rc::Rc;

use crate::builtins::{arity, check_size, merge_dict};
use crate::format::str_format;
use crate::value::{collect, iterate, py_eq, sort_values, BoundMethod, Exec, Fault, Value};

const LIST_METHODS: &[&str] = &[
    "append", "extend", "insert", "pop", "index", "count", "reverse", "sort", "copy", "clear",
    "remove",
];

const STR_METHODS: &[&str] = &[
    "upper",
    "lower",
    "strip",
    "lstrip",
    "rstrip",
    "split",
    "join",
    "replace",
    "startswith",
    "endswith",
    "format",
    "title",
    "capitalize",
    "zfill",
    "find",
    "count",
];

const DICT_METHODS: &[&str] = &[
    "get",
    "keys",
    "values",
    "items",
    "copy",
    "update",
    "pop",
    "setdefault",
];

const SET_METHODS: &[&str] = &["add"];

/// `value.name`, which is only ever a bound method.
pub fn get_attribute(value: &Value, name: &str) -> Exec<Value> {
    let table = match value {
        Value::List(_) => LIST_METHODS,
        Value::Str(_) => STR_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Set(_) => SET_METHODS,
        _ => &[],
    };
    if !table.contains(&name) {
        return Err(Fault::raise(
            "AttributeError",
            format!(
                "'{}' object has no attribute '{}'",
                value.type_name(),
                name
            ),
        ));
    }
    Ok(Value::Method(Rc::new(BoundMethod {
        receiver: value.clone(),
        name: name.to_string(),
    })))
}

pub fn call_method(method: &BoundMethod, args: Vec<Value>) -> Exec<Value> {
    match &method.receiver {
        Value::List(list) => list_method(list, &method.name, args),
        Value::Str(text) => str_method(text, &method.name, args),
        Value::Dict(dict) => dict_method(dict, &method.name, args),
        Value::Set(set) => {
            arity(&method.name, &args, 1, 1)?;
            set.borrow_mut().add(args[0].clone())?;
            Ok(Value::None)
        }
        other => Err(Fault::type_error(format!(
            "'{}' object is not callable",
            other.type_name()
        ))),
    }
}

fn index_arg(value: &Value) -> Exec<i64> {
    value.as_int().ok_or_else(|| {
        Fault::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

/// Clamp a possibly negative index into `0..=len`.
fn clamp_index(index: i64, len: usize) -> usize {
    let len = len as i64;
    let index = if index < 0 { index + len } else { index };
    index.clamp(0, len) as usize
}

fn list_method(list: &Rc<RefCell<Vec<Value>>>, name: &str, args: Vec<Value>) -> Exec<Value> {
    match name {
        "append" => {
            arity(name, &args, 1, 1)?;
            let mut items = list.borrow_mut();
            check_size(items.len() + 1)?;
            items.extend(args);
        }
        "extend" => {
            arity(name, &args, 1, 1)?;
            // snapshot first so `xs.extend(xs)` terminates
            let extra = collect(&args[0])?;
            let mut items = list.borrow_mut();
            check_size(items.len() + extra.len())?;
            items.extend(extra);
        }
        "insert" => {
            arity(name, &args, 2, 2)?;
            let mut items = list.borrow_mut();
            check_size(items.len() + 1)?;
            let at = clamp_index(index_arg(&args[0])?, items.len());
            items.insert(at, args[1].clone());
        }
        "pop" => {
            arity(name, &args, 0, 1)?;
            let mut items = list.borrow_mut();
            if items.is_empty() {
                return Err(Fault::index_error("pop from empty list"));
            }
            let len = items.len() as i64;
            let index = match args.first() {
                Some(v) => index_arg(v)?,
                None => -1,
            };
            let index = if index < 0 { index + len } else { index };
            if !(0..len).contains(&index) {
                return Err(Fault::index_error("pop index out of range"));
            }
            return Ok(items.remove(index as usize));
        }
        "index" => {
            arity(name, &args, 1, 1)?;
            let items = list.borrow().clone();
            for (i, item) in items.iter().enumerate() {
                if py_eq(item, &args[0])? {
                    return Ok(Value::Int(i as i64));
                }
            }
            return Err(Fault::value_error(format!(
                "{} is not in list",
                args[0].repr()?
            )));
        }
        "count" => {
            arity(name, &args, 1, 1)?;
            let items = list.borrow().clone();
            let mut count = 0;
            for item in &items {
                if py_eq(item, &args[0])? {
                    count += 1;
                }
            }
            return Ok(Value::Int(count));
        }
        "reverse" => {
            arity(name, &args, 0, 0)?;
            list.borrow_mut().reverse();
        }
        "sort" => {
            arity(name, &args, 0, 0)?;
            let mut items = list.borrow().clone();
            sort_values(&mut items)?;
            *list.borrow_mut() = items;
        }
        "copy" => {
            arity(name, &args, 0, 0)?;
            return Ok(Value::list(list.borrow().clone()));
        }
        "clear" => {
            arity(name, &args, 0, 0)?;
            list.borrow_mut().clear();
        }
        "remove" => {
            arity(name, &args, 1, 1)?;
            let items = list.borrow().clone();
            let mut found = None;
            for (i, item) in items.iter().enumerate() {
                if py_eq(item, &args[0])? {
                    found = Some(i);
                    break;
                }
            }
            match found {
                Some(i) => {
                    list.borrow_mut().remove(i);
                }
                None => return Err(Fault::value_error("list.remove(x): x not in list")),
            }
        }
        _ => unreachable_method("list", name)?,
    }
    Ok(Value::None)
}

fn unreachable_method(type_name: &str, name: &str) -> Exec<()> {
    Err(Fault::raise(
        "AttributeError",
        format!("'{}' object has no attribute '{}'", type_name, name),
    ))
}

fn str_arg<'a>(method: &str, value: &'a Value) -> Exec<&'a str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(Fault::type_error(format!(
            "{}() argument must be str, not {}",
            method,
            other.type_name()
        ))),
    }
}

/// Optional `chars` argument for the strip family; `None` strips whitespace.
fn strip_chars(name: &str, args: &[Value]) -> Exec<Option<Vec<char>>> {
    arity(name, args, 0, 1)?;
    match args.first() {
        None | Some(Value::None) => Ok(None),
        Some(v) => Ok(Some(str_arg(name, v)?.chars().collect())),
    }
}

fn str_method(text: &Rc<str>, name: &str, args: Vec<Value>) -> Exec<Value> {
    let text: &str = text;
    let result = match name {
        "upper" => {
            arity(name, &args, 0, 0)?;
            text.to_uppercase()
        }
        "lower" => {
            arity(name, &args, 0, 0)?;
            text.to_lowercase()
        }
        "strip" => match strip_chars(name, &args)? {
            None => text.trim().to_string(),
            Some(chars) => text.trim_matches(chars.as_slice()).to_string(),
        },
        "lstrip" => match strip_chars(name, &args)? {
            None => text.trim_start().to_string(),
            Some(chars) => text.trim_start_matches(chars.as_slice()).to_string(),
        },
        "rstrip" => match strip_chars(name, &args)? {
            None => text.trim_end().to_string(),
            Some(chars) => text.trim_end_matches(chars.as_slice()).to_string(),
        },
        "split" => return split(text, &args),
        "join" => {
            arity(name, &args, 1, 1)?;
            let mut parts = Vec::new();
            for (i, item) in iterate(&args[0])?.enumerate() {
                match item {
                    Value::Str(s) => parts.push(s.to_string()),
                    other => {
                        return Err(Fault::type_error(format!(
                            "sequence item {}: expected str instance, {} found",
                            i,
                            other.type_name()
                        )))
                    }
                }
            }
            parts.join(text)
        }
        "replace" => {
            arity(name, &args, 2, 3)?;
            let old = str_arg(name, &args[0])?;
            let new = str_arg(name, &args[1])?;
            match args.get(2).map(index_arg).transpose()? {
                Some(count) if count >= 0 => text.replacen(old, new, count as usize),
                _ => text.replace(old, new),
            }
        }
        "startswith" | "endswith" => {
            arity(name, &args, 1, 1)?;
            let candidates = match &args[0] {
                Value::Tuple(items) => items.to_vec(),
                other => vec![other.clone()],
            };
            for candidate in &candidates {
                let candidate = match candidate {
                    Value::Str(s) => s,
                    other => {
                        return Err(Fault::type_error(format!(
                            "{} first arg must be str or a tuple of str, not {}",
                            name,
                            other.type_name()
                        )))
                    }
                };
                let hit = if name == "startswith" {
                    text.starts_with(&**candidate)
                } else {
                    text.ends_with(&**candidate)
                };
                if hit {
                    return Ok(Value::Bool(true));
                }
            }
            return Ok(Value::Bool(false));
        }
        "format" => str_format(text, &args)?,
        "title" => {
            arity(name, &args, 0, 0)?;
            let mut out = String::with_capacity(text.len());
            let mut previous_cased = false;
            for c in text.chars() {
                if previous_cased {
                    out.extend(c.to_lowercase());
                } else {
                    out.extend(c.to_uppercase());
                }
                previous_cased = c.is_alphabetic();
            }
            out
        }
        "capitalize" => {
            arity(name, &args, 0, 0)?;
            let mut chars = text.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.as_str().to_lowercase().chars())
                    .collect(),
                None => String::new(),
            }
        }
        "zfill" => {
            arity(name, &args, 1, 1)?;
            let width = index_arg(&args[0])?.max(0) as usize;
            check_size(width)?;
            let len = text.chars().count();
            if len >= width {
                text.to_string()
            } else {
                let (sign, digits) = match text.chars().next() {
                    Some(c @ ('+' | '-')) => (c.to_string(), &text[1..]),
                    _ => (String::new(), text),
                };
                format!("{}{}{}", sign, "0".repeat(width - len), digits)
            }
        }
        "find" => {
            arity(name, &args, 1, 1)?;
            let needle = str_arg(name, &args[0])?;
            let index = text
                .find(needle)
                .map(|byte| text[..byte].chars().count() as i64)
                .unwrap_or(-1);
            return Ok(Value::Int(index));
        }
        "count" => {
            arity(name, &args, 1, 1)?;
            let needle = str_arg(name, &args[0])?;
            let count = if needle.is_empty() {
                text.chars().count() + 1
            } else {
                text.matches(needle).count()
            };
            return Ok(Value::Int(count as i64));
        }
        _ => {
            unreachable_method("str", name)?;
            String::new()
        }
    };
    check_size(result.len())?;
    Ok(Value::str(result))
}

fn split(text: &str, args: &[Value]) -> Exec<Value> {
    arity("split", args, 0, 2)?;
    let max_split = match args.get(1) {
        Some(v) => index_arg(v)?,
        None => -1,
    };
    let parts: Vec<String> = match args.first() {
        None | Some(Value::None) => {
            let mut words = Vec::new();
            let mut rest = text.trim_start();
            while !rest.is_empty() {
                if max_split >= 0 && words.len() as i64 == max_split {
                    words.push(rest.to_string());
                    break;
                }
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                words.push(rest[..end].to_string());
                rest = rest[end..].trim_start();
            }
            words
        }
        Some(sep) => {
            let sep = str_arg("split", sep)?;
            if sep.is_empty() {
                return Err(Fault::value_error("empty separator"));
            }
            if max_split >= 0 {
                text.splitn(max_split as usize + 1, sep)
                    .map(str::to_string)
                    .collect()
            } else {
                text.split(sep).map(str::to_string).collect()
            }
        }
    };
    Ok(Value::list(parts.into_iter().map(Value::str).collect()))
}

fn dict_method(
    dict: &Rc<RefCell<crate::value::Dict>>,
    name: &str,
    args: Vec<Value>,
) -> Exec<Value> {
    match name {
        "get" => {
            arity(name, &args, 1, 2)?;
            let found = dict.borrow().get(&args[0])?;
            Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
        }
        "keys" => {
            arity(name, &args, 0, 0)?;
            Ok(Value::list(dict.borrow().keys()))
        }
        "values" => {
            arity(name, &args, 0, 0)?;
            Ok(Value::list(dict.borrow().values()))
        }
        "items" => {
            arity(name, &args, 0, 0)?;
            Ok(Value::list(
                dict.borrow()
                    .items()
                    .into_iter()
                    .map(|(k, v)| Value::tuple(vec![k, v]))
                    .collect(),
            ))
        }
        "copy" => {
            arity(name, &args, 0, 0)?;
            Ok(Value::Dict(Rc::new(RefCell::new(dict.borrow().clone()))))
        }
        "update" => {
            arity(name, &args, 0, 1)?;
            if let Some(source) = args.first() {
                let mut merged = dict.borrow().clone();
                merge_dict(&mut merged, source)?;
                *dict.borrow_mut() = merged;
            }
            Ok(Value::None)
        }
        "pop" => {
            arity(name, &args, 1, 2)?;
            let removed = dict.borrow_mut().remove(&args[0])?;
            match (removed, args.get(1)) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(Fault::raise("KeyError", args[0].repr()?)),
            }
        }
        "setdefault" => {
            arity(name, &args, 1, 2)?;
            if let Some(existing) = dict.borrow().get(&args[0])? {
                return Ok(existing);
            }
            let default = args.get(1).cloned().unwrap_or(Value::None);
            dict.borrow_mut().insert(args[0].clone(), default.clone())?;
            Ok(default)
        }
        _ => {
            unreachable_method("dict", name)?;
            Ok(Value::None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(receiver: &Value, name: &str, args: Vec<Value>) -> Exec<Value> {
        let Value::Method(method) = get_attribute(receiver, name)? else {
            panic!("expected a bound method");
        };
        call_method(&method, args)
    }

    #[test]
    fn test_unknown_attribute() {
        let err = get_attribute(&Value::Int(3), "real").unwrap_err();
        assert_eq!(
            err,
            Fault::raise("AttributeError", "'int' object has no attribute 'real'")
        );
        assert!(get_attribute(&Value::list(Vec::new()), "upper").is_err());
    }

    #[test]
    fn test_list_mutation() {
        let list = Value::list(vec![Value::Int(3), Value::Int(1)]);
        call(&list, "append", vec![Value::Int(2)]).unwrap();
        call(&list, "insert", vec![Value::Int(-1), Value::Int(9)]).unwrap();
        assert_eq!(list.repr().unwrap(), "[3, 1, 9, 2]");
        call(&list, "sort", vec![]).unwrap();
        assert_eq!(list.repr().unwrap(), "[1, 2, 3, 9]");
        assert_eq!(call(&list, "pop", vec![]).unwrap().as_int(), Some(9));
        assert_eq!(
            call(&list, "index", vec![Value::Int(3)]).unwrap().as_int(),
            Some(2)
        );
        call(&list, "extend", vec![list.clone()]).unwrap();
        assert_eq!(list.repr().unwrap(), "[1, 2, 3, 1, 2, 3]");
        assert_eq!(
            call(&list, "count", vec![Value::Int(2)]).unwrap().as_int(),
            Some(2)
        );
        assert_eq!(
            call(&Value::list(Vec::new()), "pop", vec![]).unwrap_err(),
            Fault::index_error("pop from empty list")
        );
    }

    #[test]
    fn test_string_methods() {
        let s = Value::str("  Hello World  ");
        assert_eq!(call(&s, "strip", vec![]).unwrap().to_str().unwrap(), "Hello World");
        assert_eq!(
            call(&Value::str("a,b,,c"), "split", vec![Value::str(",")])
                .unwrap()
                .repr()
                .unwrap(),
            "['a', 'b', '', 'c']"
        );
        assert_eq!(
            call(&s, "split", vec![]).unwrap().repr().unwrap(),
            "['Hello', 'World']"
        );
        assert_eq!(
            call(
                &Value::str("-"),
                "join",
                vec![Value::list(vec![Value::str("x"), Value::str("y")])]
            )
            .unwrap()
            .to_str()
            .unwrap(),
            "x-y"
        );
        assert_eq!(
            call(&Value::str("oak_log"), "title", vec![]).unwrap().to_str().unwrap(),
            "Oak_Log"
        );
        assert_eq!(
            call(&Value::str("-42"), "zfill", vec![Value::Int(6)])
                .unwrap()
                .to_str()
                .unwrap(),
            "-00042"
        );
        assert_eq!(
            call(&Value::str("stone"), "find", vec![Value::str("one")])
                .unwrap()
                .as_int(),
            Some(2)
        );
        assert!(call(&Value::str("x"), "join", vec![Value::list(vec![Value::Int(1)])]).is_err());
    }

    #[test]
    fn test_dict_methods() {
        let dict = crate::builtins::call(crate::builtins::Builtin::Dict, vec![]).unwrap();
        call(&dict, "setdefault", vec![Value::str("a"), Value::Int(1)]).unwrap();
        call(&dict, "update", vec![Value::list(vec![Value::tuple(vec![
            Value::str("b"),
            Value::Int(2),
        ])])])
        .unwrap();
        assert_eq!(
            call(&dict, "items", vec![]).unwrap().repr().unwrap(),
            "[('a', 1), ('b', 2)]"
        );
        assert_eq!(
            call(&dict, "get", vec![Value::str("z"), Value::Int(0)])
                .unwrap()
                .as_int(),
            Some(0)
        );
        assert_eq!(
            call(&dict, "pop", vec![Value::str("z")]).unwrap_err(),
            Fault::raise("KeyError", "'z'")
        );
    }
}
