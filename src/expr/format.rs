use super::ExprError;
use crate::value::Value;

/// printf-style formatting for value formulas. Supports `%d %i %f %e %g %s`
/// with `-`, `0`, `+` flags, width and precision, and `%%`.
pub fn format_template(template: &str, args: &[Value]) -> Result<String, ExprError> {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut next_arg = args.iter();
    let mut index = 0;

    while index < chars.len() {
        if chars[index] != '%' {
            out.push(chars[index]);
            index += 1;
            continue;
        }

        index += 1;
        if chars.get(index) == Some(&'%') {
            out.push('%');
            index += 1;
            continue;
        }

        let mut spec = Spec::default();
        while let Some(flag) = chars.get(index) {
            match flag {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                _ => break,
            }
            index += 1;
        }
        while let Some(digit) = chars.get(index).and_then(|c| c.to_digit(10)) {
            spec.width = spec.width * 10 + digit as usize;
            index += 1;
        }
        if chars.get(index) == Some(&'.') {
            index += 1;
            let mut precision = 0;
            while let Some(digit) = chars.get(index).and_then(|c| c.to_digit(10)) {
                precision = precision * 10 + digit as usize;
                index += 1;
            }
            spec.precision = Some(precision);
        }

        let Some(conversion) = chars.get(index).copied() else {
            return Err(ExprError::Syntax(format!(
                "incomplete conversion at end of template '{template}'"
            )));
        };
        index += 1;

        let value = next_arg.next().ok_or_else(|| {
            ExprError::Type(format!("not enough arguments for template '{template}'"))
        })?;
        let body = convert(conversion, value, &spec)?;
        out.push_str(&spec.pad(body));
    }

    Ok(out)
}

#[derive(Debug, Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    width: usize,
    precision: Option<usize>,
}

impl Spec {
    fn pad(&self, body: String) -> String {
        let len = body.chars().count();
        if len >= self.width {
            return body;
        }
        let fill = self.width - len;
        if self.left {
            return format!("{body}{}", " ".repeat(fill));
        }
        if self.zero {
            let (sign, digits) = match body.strip_prefix(|c: char| c == '-' || c == '+') {
                Some(rest) => (&body[..1], rest),
                None => ("", body.as_str()),
            };
            return format!("{sign}{}{digits}", "0".repeat(fill));
        }
        format!("{}{body}", " ".repeat(fill))
    }

    fn sign(&self, number: f64, body: String) -> String {
        if self.plus && number >= 0.0 {
            format!("+{body}")
        } else {
            body
        }
    }
}

fn convert(conversion: char, value: &Value, spec: &Spec) -> Result<String, ExprError> {
    let number = || {
        value.as_number().ok_or_else(|| {
            ExprError::Type(format!("%{conversion} expects a number, got '{value}'"))
        })
    };

    match conversion {
        's' => {
            let text = value.to_string();
            Ok(match spec.precision {
                Some(limit) => text.chars().take(limit).collect(),
                None => text,
            })
        }
        'd' | 'i' => {
            let number = number()?;
            Ok(spec.sign(number, format!("{}", number.trunc() as i64)))
        }
        'f' | 'F' => {
            let number = number()?;
            let precision = spec.precision.unwrap_or(6);
            Ok(spec.sign(number, format!("{number:.precision$}")))
        }
        'e' | 'E' => {
            let number = number()?;
            let body = exponent_form(number, spec.precision.unwrap_or(6));
            let body = if conversion == 'E' { body.to_uppercase() } else { body };
            Ok(spec.sign(number, body))
        }
        'g' | 'G' => {
            let number = number()?;
            Ok(spec.sign(number, general_form(number, spec.precision.unwrap_or(6))))
        }
        other => Err(ExprError::Syntax(format!("unsupported conversion '%{other}'"))),
    }
}

/// `1.500000e+03` rather than Rust's `1.5e3`.
fn exponent_form(number: f64, precision: usize) -> String {
    let raw = format!("{number:.precision$e}");
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        return raw;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.abs())
}

fn general_form(number: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if number == 0.0 {
        return "0".to_string();
    }
    let exponent = number.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= precision as i32 {
        let body = exponent_form(number, precision - 1);
        let Some((mantissa, exp)) = body.split_once('e') else {
            return body;
        };
        return format!("{}e{exp}", trim_fraction(mantissa));
    }
    let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
    trim_fraction(&format!("{number:.decimals$}"))
}

fn trim_fraction(text: &str) -> String {
    if !text.contains('.') {
        return text.to_string();
    }
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
