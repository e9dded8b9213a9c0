//! CSS selector to XPath conversion
//!
//! Covers the selector subset rule-sets actually use: type, universal, id,
//! class and attribute selectors, a handful of structural pseudo-classes,
//! `:not()`, the four combinators and selector groups. Every alternative is
//! anchored with `descendant-or-self::`, so the expression finds matches at
//! or below whatever context node it is evaluated against.

/// Convert a CSS selector into an equivalent XPath expression
pub fn to_xpath(selector: &str) -> Result<String, String> {
    let mut parser = Parser {
        chars: selector.chars().collect(),
        pos: 0,
    };
    parser.parse_group()
}

/// A type selector plus its predicates, rendered as one location step
#[derive(Debug)]
struct Compound {
    tag: String,
    predicates: Vec<String>,
}

impl Compound {
    fn step(&self) -> String {
        let mut step = self.tag.clone();
        for predicate in &self.predicates {
            step.push('[');
            step.push_str(predicate);
            step.push(']');
        }
        step
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(format!("expected '{expected}', found '{c}'")),
            None => Err(format!("expected '{expected}', found end of selector")),
        }
    }

    /// Skip whitespace, returning whether any was skipped
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_group(&mut self) -> Result<String, String> {
        let mut alternatives = Vec::new();
        loop {
            self.skip_ws();
            alternatives.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                None => break,
                Some(c) => return Err(format!("unexpected '{c}'")),
            }
        }
        Ok(alternatives.join(" | "))
    }

    fn parse_complex(&mut self) -> Result<String, String> {
        let mut xpath = format!("descendant-or-self::{}", self.parse_compound()?.step());

        loop {
            let had_ws = self.skip_ws();
            match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    xpath.push_str(&format!("/{}", self.parse_compound()?.step()));
                }
                Some('+') => {
                    self.pos += 1;
                    self.skip_ws();
                    let step = self.parse_compound()?.step();
                    xpath.push_str(&format!("/following-sibling::*[1]/self::{step}"));
                }
                Some('~') => {
                    self.pos += 1;
                    self.skip_ws();
                    xpath.push_str(&format!("/following-sibling::{}", self.parse_compound()?.step()));
                }
                Some(',') | None => break,
                Some(_) if had_ws => {
                    xpath.push_str(&format!("/descendant::{}", self.parse_compound()?.step()));
                }
                Some(c) => return Err(format!("unexpected '{c}'")),
            }
        }

        Ok(xpath)
    }

    fn parse_compound(&mut self) -> Result<Compound, String> {
        let mut compound = Compound {
            tag: "*".to_string(),
            predicates: Vec::new(),
        };
        let mut parsed_any = false;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                parsed_any = true;
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = self.parse_ident()?.to_ascii_lowercase();
                parsed_any = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    let id = self.parse_ident()?;
                    compound.predicates.push(format!("@id = {}", literal(&id)));
                }
                Some('.') => {
                    self.pos += 1;
                    let class = self.parse_ident()?;
                    compound.predicates.push(contains_word("@class", &class));
                }
                Some('[') => {
                    self.pos += 1;
                    let predicate = self.parse_attribute()?;
                    compound.predicates.push(predicate);
                }
                Some(':') => {
                    self.pos += 1;
                    let predicate = self.parse_pseudo()?;
                    compound.predicates.push(predicate);
                }
                _ => break,
            }
            parsed_any = true;
        }

        if parsed_any {
            Ok(compound)
        } else {
            match self.peek() {
                Some(c) => Err(format!("expected selector, found '{c}'")),
                None => Err("expected selector, found end of selector".to_string()),
            }
        }
    }

    fn parse_ident(&mut self) -> Result<String, String> {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                if let Some(escaped) = self.bump() {
                    ident.push(escaped);
                }
            } else if is_ident_char(c) {
                ident.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if ident.is_empty() {
            Err("expected identifier".to_string())
        } else {
            Ok(ident)
        }
    }

    fn parse_attribute(&mut self) -> Result<String, String> {
        self.skip_ws();
        let name = self.parse_ident()?.to_ascii_lowercase();
        let attr = format!("@{name}");
        self.skip_ws();

        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(attr);
            }
            Some('=') => {
                self.pos += 1;
                "="
            }
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                self.pos += 1;
                self.expect('=')?;
                match c {
                    '~' => "~=",
                    '|' => "|=",
                    '^' => "^=",
                    '$' => "$=",
                    _ => "*=",
                }
            }
            Some(c) => return Err(format!("unexpected '{c}' in attribute selector")),
            None => return Err("unterminated attribute selector".to_string()),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut value = String::new();
                loop {
                    match self.bump() {
                        Some(c) if c == quote => break,
                        Some('\\') => {
                            if let Some(escaped) = self.bump() {
                                value.push(escaped);
                            }
                        }
                        Some(c) => value.push(c),
                        None => return Err("unterminated string in attribute selector".to_string()),
                    }
                }
                value
            }
            _ => self.parse_ident()?,
        };
        self.skip_ws();
        self.expect(']')?;

        let lit = literal(&value);
        Ok(match op {
            "=" => format!("{attr} = {lit}"),
            "~=" => contains_word(&attr, &value),
            "|=" => format!("{attr} = {lit} or starts-with({attr}, {})", literal(&format!("{value}-"))),
            "^=" => format!("starts-with({attr}, {lit})"),
            "$=" => format!("ends-with({attr}, {lit})"),
            _ => format!("contains({attr}, {lit})"),
        })
    }

    fn parse_pseudo(&mut self) -> Result<String, String> {
        let name = self.parse_ident()?.to_ascii_lowercase();
        match name.as_str() {
            "first-child" => Ok("not(preceding-sibling::*)".to_string()),
            "last-child" => Ok("not(following-sibling::*)".to_string()),
            "only-child" => Ok("not(preceding-sibling::*) and not(following-sibling::*)".to_string()),
            "empty" => Ok("not(node())".to_string()),
            "not" => {
                self.expect('(')?;
                self.skip_ws();
                let inner = self.parse_compound()?;
                self.skip_ws();
                self.expect(')')?;
                Ok(format!("not(self::{})", inner.step()))
            }
            other => Err(format!("unsupported pseudo-class ':{other}'")),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

/// `value` as an XPath string literal
fn literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{value}'")
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else {
        let parts: Vec<String> = value.split('\'').map(|part| format!("'{part}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Whitespace-separated word membership, as used by `.class` and `[a~=v]`
fn contains_word(attr: &str, word: &str) -> String {
    format!(
        "contains(concat(' ', normalize-space({attr}), ' '), {})",
        literal(&format!(" {word} "))
    )
}
