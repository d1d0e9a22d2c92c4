//! Format-spec mini-language shared by f-strings, `str.format` and `%`.

use crate::builtins::check_size;
use crate::value::{float_repr, Exec, Fault, Value};

/// `1234567` -> `1,234,567`.
pub fn with_commas(n: impl ToString) -> String {
    let text = n.to_string();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    format!("{}{}", sign, group_digits(digits, ',', 3))
}

fn group_digits(digits: &str, separator: char, size: usize) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let mut out = String::with_capacity(chars.len() + chars.len() / size);
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % size == 0 {
            out.push(separator);
        }
        out.push(*c);
    }
    out
}

#[derive(Debug, Clone, Default)]
struct Spec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    alternate: bool,
    zero: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

impl Spec {
    fn parse(text: &str) -> Exec<Spec> {
        let chars: Vec<char> = text.chars().collect();
        let mut spec = Spec::default();
        let mut i = 0;

        let is_align = |c: char| matches!(c, '<' | '>' | '=' | '^');
        if chars.len() >= 2 && is_align(chars[1]) {
            spec.fill = Some(chars[0]);
            spec.align = Some(chars[1]);
            i = 2;
        } else if !chars.is_empty() && is_align(chars[0]) {
            spec.align = Some(chars[0]);
            i = 1;
        }
        if let Some(&c @ ('+' | '-' | ' ')) = chars.get(i) {
            spec.sign = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'#') {
            spec.alternate = true;
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            spec.zero = true;
            i += 1;
        }
        let start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i > start {
            spec.width = chars[start..i]
                .iter()
                .collect::<String>()
                .parse()
                .map_err(|_| Fault::value_error("Too many decimal digits in format string"))?;
            check_size(spec.width)?;
        }
        if let Some(&c @ (',' | '_')) = chars.get(i) {
            spec.grouping = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            let start = i;
            while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
            if i == start {
                return Err(Fault::value_error("Format specifier missing precision"));
            }
            let precision = chars[start..i]
                .iter()
                .collect::<String>()
                .parse()
                .map_err(|_| Fault::value_error("Too many decimal digits in format string"))?;
            check_size(precision)?;
            spec.precision = Some(precision);
        }
        match chars.len() - i {
            0 => {}
            1 => spec.kind = Some(chars[i]),
            _ => return Err(Fault::value_error("Invalid format specifier")),
        }
        if spec.zero && spec.align.is_none() {
            spec.fill.get_or_insert('0');
        }
        Ok(spec)
    }

    fn unknown_code(&self, value: &Value) -> Fault {
        Fault::value_error(format!(
            "Unknown format code '{}' for object of type '{}'",
            self.kind.unwrap_or(' '),
            value.type_name()
        ))
    }

    fn pad(&self, sign: &str, body: &str, numeric: bool) -> String {
        let len = sign.chars().count() + body.chars().count();
        if self.width <= len {
            return format!("{}{}", sign, body);
        }
        let fill_char = self.fill.unwrap_or(' ');
        let align = self.align.unwrap_or(if numeric && self.zero {
            '='
        } else if numeric {
            '>'
        } else {
            '<'
        });
        let padding = self.width - len;
        let fill = |n: usize| fill_char.to_string().repeat(n);
        match align {
            '<' => format!("{}{}{}", sign, body, fill(padding)),
            '^' => format!(
                "{}{}{}{}",
                fill(padding / 2),
                sign,
                body,
                fill(padding - padding / 2)
            ),
            '=' => format!("{}{}{}", sign, fill(padding), body),
            _ => format!("{}{}{}", fill(padding), sign, body),
        }
    }

    fn sign_for(&self, negative: bool) -> &'static str {
        match (negative, self.sign) {
            (true, _) => "-",
            (false, Some('+')) => "+",
            (false, Some(' ')) => " ",
            _ => "",
        }
    }
}

/// Apply a format spec, like `format(value, spec)`.
pub fn format_value(value: &Value, spec_text: &str) -> Exec<String> {
    if spec_text.is_empty() {
        return value.to_str();
    }
    let spec = Spec::parse(spec_text)?;
    match value {
        Value::Str(s) => {
            if !matches!(spec.kind, None | Some('s')) {
                return Err(spec.unknown_code(value));
            }
            if spec.sign.is_some() {
                return Err(Fault::value_error(
                    "Sign not allowed in string format specifier",
                ));
            }
            let text: String = match spec.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s.to_string(),
            };
            Ok(spec.pad("", &text, false))
        }
        Value::Bool(_) | Value::Int(_) => {
            let i = value.as_int().unwrap_or(0);
            format_int(&spec, i, value)
        }
        Value::Float(f) => format_float(&spec, *f, value),
        other => Err(Fault::type_error(format!(
            "unsupported format string passed to {}.__format__",
            other.type_name()
        ))),
    }
}

fn format_int(spec: &Spec, i: i64, value: &Value) -> Exec<String> {
    let magnitude = i.unsigned_abs();
    let (digits, prefix, group_size) = match spec.kind {
        None | Some('d') | Some('n') => (magnitude.to_string(), "", 3),
        Some('x') => (format!("{:x}", magnitude), "0x", 4),
        Some('X') => (format!("{:X}", magnitude), "0X", 4),
        Some('o') => (format!("{:o}", magnitude), "0o", 4),
        Some('b') => (format!("{:b}", magnitude), "0b", 4),
        Some('c') => {
            let c = u32::try_from(i)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| Fault::overflow("%c arg not in range(0x110000)"))?;
            return Ok(spec.pad("", &c.to_string(), false));
        }
        Some('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%') => {
            return format_float(spec, i as f64, value)
        }
        _ => return Err(spec.unknown_code(value)),
    };
    if spec.precision.is_some() {
        return Err(Fault::value_error(
            "Precision not allowed in integer format specifier",
        ));
    }
    let grouped = match spec.grouping {
        Some(separator) => group_digits(&digits, separator, group_size),
        None => digits,
    };
    let prefix = if spec.alternate { prefix } else { "" };
    let sign = format!("{}{}", spec.sign_for(i < 0), prefix);
    Ok(spec.pad(&sign, &grouped, true))
}

fn format_float(spec: &Spec, f: f64, value: &Value) -> Exec<String> {
    let negative = f.is_sign_negative() && !f.is_nan();
    let magnitude = f.abs();
    let upper = matches!(spec.kind, Some('E' | 'F' | 'G'));

    if !magnitude.is_finite() {
        let text = if magnitude.is_nan() { "nan" } else { "inf" };
        let mut text = if upper {
            text.to_uppercase()
        } else {
            text.to_string()
        };
        if spec.kind == Some('%') {
            text.push('%');
        }
        return Ok(spec.pad(spec.sign_for(negative), &text, true));
    }

    let body = match spec.kind {
        Some('f' | 'F') => format!("{:.*}", spec.precision.unwrap_or(6), magnitude),
        Some('e' | 'E') => exponent_form(magnitude, spec.precision.unwrap_or(6), upper),
        Some('%') => format!("{:.*}%", spec.precision.unwrap_or(6), magnitude * 100.0),
        Some('g' | 'G') => general_form(magnitude, spec.precision, spec.alternate, upper, false),
        None if spec.precision.is_some() => {
            general_form(magnitude, spec.precision, spec.alternate, false, true)
        }
        None => float_repr(magnitude),
        _ => return Err(spec.unknown_code(value)),
    };

    let body = match spec.grouping {
        Some(separator) => {
            let (int_part, rest) = match body.find(|c: char| !c.is_ascii_digit()) {
                Some(at) => body.split_at(at),
                None => (body.as_str(), ""),
            };
            format!("{}{}", group_digits(int_part, separator, 3), rest)
        }
        None => body,
    };
    Ok(spec.pad(spec.sign_for(negative), &body, true))
}

fn exponent_form(magnitude: f64, precision: usize, upper: bool) -> String {
    let text = format!("{:.*e}", precision, magnitude);
    let (mantissa, exponent) = text.split_once('e').unwrap_or((text.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let e = if upper { 'E' } else { 'e' };
    format!(
        "{}{}{}{:02}",
        mantissa,
        e,
        if exponent < 0 { '-' } else { '+' },
        exponent.abs()
    )
}

fn general_form(
    magnitude: f64,
    precision: Option<usize>,
    alternate: bool,
    upper: bool,
    keep_point: bool,
) -> String {
    let p = precision.unwrap_or(6).max(1);
    let exponent = if magnitude == 0.0 {
        0
    } else {
        let text = format!("{:.*e}", p - 1, magnitude);
        text.split_once('e')
            .and_then(|(_, e)| e.parse::<i32>().ok())
            .unwrap_or(0)
    };

    let strip = |text: String| -> String {
        if alternate || !text.contains('.') {
            return text;
        }
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    };

    if (-4..p as i32).contains(&exponent) {
        let decimals = (p as i32 - 1 - exponent).max(0) as usize;
        let mut text = strip(format!("{:.*}", decimals, magnitude));
        if keep_point && !text.contains('.') {
            text.push_str(".0");
        }
        text
    } else {
        let text = exponent_form(magnitude, p - 1, upper);
        let e = if upper { 'E' } else { 'e' };
        match text.split_once(e) {
            Some((mantissa, rest)) => format!("{}{}{}", strip(mantissa.to_string()), e, rest),
            None => text,
        }
    }
}

/// `template.format(*args)`.
pub fn str_format(template: &str, args: &[Value]) -> Exec<String> {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::new();
    let mut auto_index = 0usize;
    let mut numbering: Option<bool> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '{' && chars.get(i + 1) == Some(&'{') {
            out.push('{');
            i += 2;
            continue;
        }
        if c == '}' {
            if chars.get(i + 1) == Some(&'}') {
                out.push('}');
                i += 2;
                continue;
            }
            return Err(Fault::value_error(
                "Single '}' encountered in format string",
            ));
        }
        if c != '{' {
            out.push(c);
            i += 1;
            continue;
        }

        // replacement field
        let mut depth = 1;
        let mut j = i + 1;
        while j < chars.len() {
            match chars[j] {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            j += 1;
        }
        if j >= chars.len() {
            return Err(Fault::value_error(
                "expected '}' before end of string",
            ));
        }
        let field: String = chars[i + 1..j].iter().collect();
        i = j + 1;

        let (head, spec) = match field.split_once(':') {
            Some((head, spec)) => (head.to_string(), spec.to_string()),
            None => (field.clone(), String::new()),
        };
        let (name, conversion) = match head.split_once('!') {
            Some((name, conv)) => (name.to_string(), conv.chars().next()),
            None => (head, None),
        };

        let mut resolve = |name: &str| -> Exec<Value> {
            let index = if name.is_empty() {
                if numbering == Some(false) {
                    return Err(Fault::value_error(
                        "cannot switch from manual field specification to automatic field numbering",
                    ));
                }
                numbering = Some(true);
                auto_index += 1;
                auto_index - 1
            } else if let Ok(index) = name.parse::<usize>() {
                if numbering == Some(true) {
                    return Err(Fault::value_error(
                        "cannot switch from automatic field numbering to manual field specification",
                    ));
                }
                numbering = Some(false);
                index
            } else {
                return Err(Fault::raise("KeyError", format!("'{}'", name)));
            };
            args.get(index).cloned().ok_or_else(|| {
                Fault::index_error(format!(
                    "Replacement index {} out of range for positional args tuple",
                    index
                ))
            })
        };

        let value = resolve(&name)?;
        let value = match conversion {
            None => value,
            Some('s') => Value::str(value.to_str()?),
            Some('r' | 'a') => Value::str(value.repr()?),
            Some(other) => {
                return Err(Fault::value_error(format!(
                    "Unknown conversion specifier {}",
                    other
                )))
            }
        };

        // nested fields inside the spec, e.g. "{:{}}"
        let mut resolved_spec = String::new();
        let spec_chars: Vec<char> = spec.chars().collect();
        let mut k = 0;
        while k < spec_chars.len() {
            if spec_chars[k] == '{' {
                let end = spec_chars[k..]
                    .iter()
                    .position(|&c| c == '}')
                    .map(|p| p + k)
                    .ok_or_else(|| Fault::value_error("unmatched '{' in format spec"))?;
                let inner: String = spec_chars[k + 1..end].iter().collect();
                resolved_spec.push_str(&resolve(&inner)?.to_str()?);
                k = end + 1;
            } else {
                resolved_spec.push(spec_chars[k]);
                k += 1;
            }
        }

        out.push_str(&format_value(&value, &resolved_spec)?);
    }
    Ok(out)
}

/// `template % args`.
pub fn percent_format(template: &str, args: &Value) -> Exec<String> {
    let args: Vec<Value> = match args {
        Value::Tuple(items) => items.to_vec(),
        other => vec![other.clone()],
    };
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::new();
    let mut next = 0usize;
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '%' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        i += 1;
        let mut flags = String::new();
        while let Some(&c @ ('-' | '+' | ' ' | '#' | '0')) = chars.get(i) {
            flags.push(c);
            i += 1;
        }
        let mut width = String::new();
        while let Some(&c) = chars.get(i).filter(|c| c.is_ascii_digit()) {
            width.push(c);
            i += 1;
        }
        let mut precision = None;
        if chars.get(i) == Some(&'.') {
            i += 1;
            let mut digits = String::new();
            while let Some(&c) = chars.get(i).filter(|c| c.is_ascii_digit()) {
                digits.push(c);
                i += 1;
            }
            precision = Some(if digits.is_empty() { "0".to_string() } else { digits });
        }
        let Some(&conversion) = chars.get(i) else {
            return Err(Fault::value_error("incomplete format"));
        };
        i += 1;
        if conversion == '%' {
            out.push('%');
            continue;
        }

        let arg = args.get(next).cloned().ok_or_else(|| {
            Fault::type_error("not enough arguments for format string")
        })?;
        next += 1;

        let left = flags.contains('-');
        let precision = precision.map(|p| format!(".{}", p)).unwrap_or_default();

        let text = match conversion {
            's' | 'r' | 'a' => {
                let text = if conversion == 's' { arg.to_str()? } else { arg.repr()? };
                let align = if left { '<' } else { '>' };
                format_value(&Value::str(text), &format!("{}{}{}", align, width, precision))?
            }
            _ => {
                let mut spec = String::new();
                if left {
                    spec.push('<');
                }
                if flags.contains('+') {
                    spec.push('+');
                } else if flags.contains(' ') {
                    spec.push(' ');
                }
                if flags.contains('#') {
                    spec.push('#');
                }
                if flags.contains('0') && !left {
                    spec.push('0');
                }
                spec.push_str(&width);
                match conversion {
                    'd' | 'i' | 'u' => {
                        let int = match &arg {
                            Value::Float(f) => Value::Int(f.trunc() as i64),
                            other => match other.as_int() {
                                Some(i) => Value::Int(i),
                                None => return Err(real_number_required(conversion, other)),
                            },
                        };
                        format_value(&int, &format!("{}d", spec))?
                    }
                    'x' | 'X' | 'o' | 'e' | 'E' | 'f' | 'F' | 'g' | 'G' | 'c' => {
                        if !arg.is_number() {
                            return Err(real_number_required(conversion, &arg));
                        }
                        format_value(&arg, &format!("{}{}{}", spec, precision, conversion))?
                    }
                    other => {
                        return Err(Fault::value_error(format!(
                            "unsupported format character '{}'",
                            other
                        )))
                    }
                }
            }
        };
        out.push_str(&text);
    }

    if next < args.len() {
        return Err(Fault::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(out)
}

fn real_number_required(conversion: char, value: &Value) -> Fault {
    Fault::type_error(format!(
        "%{} format: a real number is required, not {}",
        conversion,
        value.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(value: Value, spec: &str) -> String {
        format_value(&value, spec).unwrap()
    }

    #[test]
    fn test_grouping() {
        assert_eq!(with_commas(1234567u64), "1,234,567");
        assert_eq!(with_commas(999), "999");
        assert_eq!(with_commas(-1000), "-1,000");
    }

    #[test]
    fn test_int_specs() {
        assert_eq!(fmt(Value::Int(42), ">5"), "   42");
        assert_eq!(fmt(Value::Int(42), "05"), "00042");
        assert_eq!(fmt(Value::Int(-42), "05"), "-0042");
        assert_eq!(fmt(Value::Int(255), "#x"), "0xff");
        assert_eq!(fmt(Value::Int(1234567), ","), "1,234,567");
        assert_eq!(fmt(Value::Int(7), "+d"), "+7");
        assert_eq!(fmt(Value::Int(3), ".2f"), "3.00");
        assert!(format_value(&Value::Int(3), "s").is_err());
    }

    #[test]
    fn test_float_specs() {
        assert_eq!(fmt(Value::Float(3.14159), ".2f"), "3.14");
        assert_eq!(fmt(Value::Float(0.5), ".0%"), "50%");
        assert_eq!(fmt(Value::Float(12345.678), ".3e"), "1.235e+04");
        assert_eq!(fmt(Value::Float(0.0001234), "g"), "0.0001234");
        assert_eq!(fmt(Value::Float(1234567.0), "g"), "1.23457e+06");
        assert_eq!(fmt(Value::Float(2.0), ">6"), "   2.0");
        assert_eq!(fmt(Value::Float(1234.5), ",.1f"), "1,234.5");
    }

    #[test]
    fn test_str_specs() {
        assert_eq!(fmt(Value::str("ab"), "<4"), "ab  ");
        assert_eq!(fmt(Value::str("ab"), "*^6"), "**ab**");
        assert_eq!(fmt(Value::str("abcdef"), ".3"), "abc");
        assert!(format_value(&Value::str("x"), "d").is_err());
    }

    #[test]
    fn test_str_format_method() {
        let args = [Value::Int(1), Value::str("stone")];
        assert_eq!(
            str_format("/setblock {} 64 {} {{x}}", &args).unwrap(),
            "/setblock 1 64 stone {x}"
        );
        assert_eq!(str_format("{1}:{0:>3}", &args).unwrap(), "stone:  1");
        assert_eq!(str_format("{!r}", &args[1..]).unwrap(), "'stone'");
        assert!(str_format("{} {1}", &args).is_err());
        assert!(str_format("{5}", &args).is_err());
    }

    #[test]
    fn test_percent_format() {
        let args = Value::tuple(vec![Value::Int(5), Value::Float(2.5), Value::str("oak")]);
        assert_eq!(
            percent_format("%d %.1f %s %%", &args).unwrap(),
            "5 2.5 oak %"
        );
        assert_eq!(percent_format("%03d", &Value::Int(7)).unwrap(), "007");
        assert!(percent_format("%d %d", &Value::Int(1)).is_err());
    }

    #[test]
    fn test_oversized_width_and_precision_fault() {
        let is_memory_error =
            |result: Exec<String>| matches!(result, Err(Fault::Raise { kind: "MemoryError", .. }));
        assert!(is_memory_error(format_value(&Value::Int(1), "1000000000000")));
        assert!(is_memory_error(format_value(&Value::str("x"), "*^20000000")));
        assert!(is_memory_error(format_value(&Value::Float(1.5), ".20000000f")));
        assert!(is_memory_error(percent_format("%1000000000000d", &Value::Int(1))));
        assert!(is_memory_error(percent_format("%.99999999s", &Value::str("x"))));
        assert!(format_value(&Value::Int(1), "99999999999999999999999").is_err());
        assert_eq!(fmt(Value::Int(1), "8").len(), 8);
    }
}
