use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Column(String),
    Env(String),
    Calc(String),
    Func(String),
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Power,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

pub(crate) fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

pub(crate) fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        let next = chars.get(index + 1).copied();

        match ch {
            ' ' | '\t' | '\r' | '\n' => index += 1,
            '0'..='9' | '.' if ch != '.' || next.is_some_and(|c| c.is_ascii_digit()) => {
                let (number, consumed) = read_number(&chars[index..])?;
                tokens.push(Token::Number(number));
                index += consumed;
            }
            '"' | '\'' => {
                let (text, consumed) = read_string(&chars[index..])?;
                tokens.push(Token::Str(text));
                index += consumed;
            }
            '$' | '%' | '@' => {
                let (name, consumed) = read_reference(&chars[index + 1..]).ok_or(
                    ExprError::UnexpectedChar {
                        ch,
                        offset: index,
                    },
                )?;
                tokens.push(match ch {
                    '$' => Token::Column(name),
                    '%' => Token::Env(name),
                    _ => Token::Calc(name),
                });
                index += consumed + 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                index += 2;
            }
            '&' => {
                let (name, consumed) = read_reference(&chars[index + 1..])
                    .ok_or(ExprError::UnexpectedChar { ch, offset: index })?;
                tokens.push(Token::Func(name));
                index += consumed + 1;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                index += 2;
            }
            '(' => {
                tokens.push(Token::LParen);
                index += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                index += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                index += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                index += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                index += 1;
            }
            '*' if next == Some('*') => {
                tokens.push(Token::Power);
                index += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                index += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                index += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                index += if next == Some('=') { 2 } else { 1 };
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Ne);
                index += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                index += 1;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::Le);
                index += 2;
            }
            '<' if next == Some('>') => {
                tokens.push(Token::Ne);
                index += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                index += 1;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::Ge);
                index += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                index += 1;
            }
            c if is_ident_start(c) => {
                let start = index;
                while index < chars.len() && is_ident_char(chars[index]) {
                    index += 1;
                }
                tokens.push(Token::Ident(chars[start..index].iter().collect()));
            }
            _ => return Err(ExprError::UnexpectedChar { ch, offset: index }),
        }
    }

    Ok(tokens)
}

/// Reads `NAME` or `{NAME}` right after a sigil. The braced form may carry
/// punctuation, which canonical lookups fold away. Returns the identifier and
/// the number of chars consumed.
pub(crate) fn read_reference(chars: &[char]) -> Option<(String, usize)> {
    match chars.first() {
        Some('{') => {
            let close = chars.iter().position(|c| *c == '}')?;
            let name: String = chars[1..close].iter().collect::<String>().trim().to_string();
            (!name.is_empty()).then_some((name, close + 1))
        }
        Some(c) if is_ident_start(*c) => {
            let len = chars.iter().take_while(|c| is_ident_char(**c)).count();
            Some((chars[..len].iter().collect(), len))
        }
        _ => None,
    }
}

fn read_number(chars: &[char]) -> Result<(f64, usize), ExprError> {
    let mut len = 0;
    while len < chars.len() && (chars[len].is_ascii_digit() || chars[len] == '.') {
        len += 1;
    }
    if len < chars.len() && (chars[len] == 'e' || chars[len] == 'E') {
        let mut probe = len + 1;
        if probe < chars.len() && (chars[probe] == '+' || chars[probe] == '-') {
            probe += 1;
        }
        if probe < chars.len() && chars[probe].is_ascii_digit() {
            len = probe;
            while len < chars.len() && chars[len].is_ascii_digit() {
                len += 1;
            }
        }
    }

    let text: String = chars[..len].iter().collect();
    let number = text
        .parse::<f64>()
        .map_err(|_| ExprError::Syntax(format!("invalid number literal '{text}'")))?;
    Ok((number, len))
}

fn read_string(chars: &[char]) -> Result<(String, usize), ExprError> {
    let quote = chars[0];
    let mut out = String::new();
    let mut index = 1;

    while index < chars.len() {
        match chars[index] {
            '\\' if index + 1 < chars.len() => {
                out.push(match chars[index + 1] {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                index += 2;
            }
            c if c == quote => return Ok((out, index + 1)),
            c => {
                out.push(c);
                index += 1;
            }
        }
    }

    Err(ExprError::UnterminatedString)
}
