//! Lexical scanner for relative `require` calls.
//!
//! The scanner walks JavaScript source once, tracking just enough lexical
//! state (comments, string, template and regular-expression literals, member
//! access) to tell a genuine `require('./x')` call apart from look-alikes
//! such as `loader.require('./x')`, `my_require('./x')` or a `require` inside
//! a comment.
//!
//! Only calls whose sole argument is a single- or double-quoted literal
//! starting with `./` or `../` are reported. The literal is returned as
//! written; escape sequences are not decoded.

use camino::{Utf8Path, Utf8PathBuf};
use log::trace;

/// One relative `require` call found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStatement {
    /// The string argument exactly as written between the quotes.
    pub literal_path: String,
    /// Archive-relative path of the file containing the call.
    pub containing_file: Utf8PathBuf,
    /// 1-based line of the `require` token.
    pub line: usize,
}

/// Returns a lazy iterator over the relative `require` calls in `source`.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use pack_check::scanner::scan_requires;
///
/// let source = "const a = require('./a');\nconst fs = require('fs');\nx.require('./b');";
/// let found: Vec<_> = scan_requires(source, Utf8Path::new("lib/index.js"))
///     .map(|statement| statement.literal_path)
///     .collect();
/// assert_eq!(found, vec!["./a"]);
/// ```
#[must_use]
pub fn scan_requires<'a>(source: &'a str, containing_file: &'a Utf8Path) -> RequireStatements<'a> {
    RequireStatements::new(source, containing_file)
}

/// Iterator returned by [`scan_requires`].
#[derive(Debug)]
pub struct RequireStatements<'a> {
    source: &'a str,
    containing_file: &'a Utf8Path,
    pos: usize,
    regex_allowed: bool,
    after_dot: bool,
    // Brace depth inside each open `${ ... }` template substitution.
    templates: Vec<usize>,
    // One flag per open `(`: whether it opened an `if`/`while`/`for`/`with`
    // condition, after which a `/` starts a regular expression.
    parens: Vec<bool>,
    after_condition_keyword: bool,
    line_mark: (usize, usize),
}

impl<'a> RequireStatements<'a> {
    fn new(source: &'a str, containing_file: &'a Utf8Path) -> Self {
        let mut scanner = Self {
            source,
            containing_file,
            pos: 0,
            regex_allowed: true,
            after_dot: false,
            templates: Vec::new(),
            parens: Vec::new(),
            after_condition_keyword: false,
            line_mark: (0, 1),
        };
        if source.starts_with("#!") {
            scanner.skip_line_comment();
        }
        scanner
    }

    fn rest(&self) -> &'a str {
        self.source.get(self.pos..).unwrap_or_default()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self, c: char) {
        self.pos += c.len_utf8();
    }

    fn advance_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !keep(c)).unwrap_or(rest.len());
        self.pos += len;
        rest.get(..len).unwrap_or_default()
    }

    fn operand(&mut self) {
        self.regex_allowed = false;
        self.after_dot = false;
        self.after_condition_keyword = false;
    }

    fn punct(&mut self, c: char) {
        self.bump(c);
        self.regex_allowed = true;
        self.after_dot = false;
        self.after_condition_keyword = false;
    }

    fn line_of(&mut self, offset: usize) -> usize {
        let (mark, line) = self.line_mark;
        let (from, base) = if offset >= mark { (mark, line) } else { (0, 1) };
        let newlines = self
            .source
            .get(from..offset)
            .map_or(0, |text| text.matches('\n').count());
        self.line_mark = (offset, base + newlines);
        base + newlines
    }

    fn skip_line_comment(&mut self) {
        let rest = self.rest();
        self.pos += rest.find('\n').unwrap_or(rest.len());
    }

    fn skip_block_comment(&mut self) {
        let rest = self.rest();
        self.pos += rest
            .get(2..)
            .and_then(|body| body.find("*/"))
            .map_or(rest.len(), |end| end + 4);
    }

    /// Skips a quoted string. Unterminated strings stop at the line break.
    fn skip_string(&mut self, quote: char) {
        self.bump(quote);
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump(c);
                    if let Some(escaped) = self.peek() {
                        self.bump(escaped);
                    }
                }
                '\n' => return,
                _ if c == quote => {
                    self.bump(c);
                    return;
                }
                _ => self.bump(c),
            }
        }
    }

    /// Skips template text up to the closing backtick or the next `${`.
    fn skip_template_text(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump(c);
                    if let Some(escaped) = self.peek() {
                        self.bump(escaped);
                    }
                }
                '`' => {
                    self.bump(c);
                    self.operand();
                    return;
                }
                '$' if self.peek_second() == Some('{') => {
                    self.pos += 2;
                    self.templates.push(0);
                    self.regex_allowed = true;
                    self.after_dot = false;
                    return;
                }
                _ => self.bump(c),
            }
        }
    }

    /// Skips a regular-expression literal, including its flags.
    fn skip_regex(&mut self) {
        self.bump('/');
        let mut in_class = false;
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump(c);
                    match self.peek() {
                        Some('\n') | None => break,
                        Some(escaped) => self.bump(escaped),
                    }
                }
                '\n' => break,
                '[' => {
                    in_class = true;
                    self.bump(c);
                }
                ']' => {
                    in_class = false;
                    self.bump(c);
                }
                '/' if !in_class => {
                    self.bump(c);
                    break;
                }
                _ => self.bump(c),
            }
        }
        self.advance_while(is_ident_continue);
        self.operand();
    }

    fn close_brace(&mut self) {
        match self.templates.last_mut() {
            Some(0) => {
                self.templates.pop();
                self.bump('}');
                self.skip_template_text();
            }
            Some(depth) => {
                *depth -= 1;
                self.punct('}');
            }
            None => self.punct('}'),
        }
    }

    /// Attempts to read `( <ws> 'literal' <ws> )` after a `require` token.
    ///
    /// On success the cursor moves past the closing parenthesis; otherwise it
    /// is left untouched so the argument is lexed like any other code.
    fn take_call_argument(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let open = rest.trim_start().strip_prefix('(')?.trim_start();
        let mut chars = open.char_indices();
        let (_, quote) = chars.next().filter(|(_, c)| matches!(c, '\'' | '"'))?;
        let mut end = None;
        while let Some((index, c)) = chars.next() {
            match c {
                '\\' => {
                    chars.next();
                }
                '\n' | '\r' => return None,
                _ if c == quote => {
                    end = Some(index);
                    break;
                }
                _ => {}
            }
        }
        let end = end?;
        let literal = open.get(1..end)?;
        if !(literal.starts_with("./") || literal.starts_with("../")) {
            return None;
        }
        let tail = open.get(end + 1..)?.trim_start().strip_prefix(')')?;
        self.pos += rest.len() - tail.len();
        Some(literal)
    }
}

impl Iterator for RequireStatements<'_> {
    type Item = LoadStatement;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let c = self.peek()?;
            match c {
                _ if c.is_whitespace() => self.bump(c),
                '/' => match self.peek_second() {
                    Some('/') => self.skip_line_comment(),
                    Some('*') => self.skip_block_comment(),
                    _ if self.regex_allowed => self.skip_regex(),
                    _ => self.punct(c),
                },
                '\'' | '"' => {
                    self.skip_string(c);
                    self.operand();
                }
                '`' => {
                    self.bump(c);
                    self.skip_template_text();
                }
                '{' => {
                    if let Some(depth) = self.templates.last_mut() {
                        *depth += 1;
                    }
                    self.punct(c);
                }
                '}' => self.close_brace(),
                '(' => {
                    let condition = self.after_condition_keyword;
                    self.parens.push(condition);
                    self.punct(c);
                }
                ')' => {
                    let closes_condition = self.parens.pop().unwrap_or(false);
                    self.bump(c);
                    self.operand();
                    self.regex_allowed = closes_condition;
                }
                ']' => {
                    self.bump(c);
                    self.operand();
                }
                // Postfix increment keeps the expression an operand: `a++ / 2`.
                '+' | '-' if !self.regex_allowed && self.peek_second() == Some(c) => {
                    self.pos += 2;
                    self.after_dot = false;
                }
                '.' if self.rest().starts_with("...") => {
                    self.pos += 3;
                    self.regex_allowed = true;
                    self.after_dot = false;
                }
                '.' if self.peek_second().is_some_and(|next| next.is_ascii_digit()) => {
                    self.bump(c);
                    self.advance_while(is_number_continue);
                    self.operand();
                }
                '.' => {
                    self.bump(c);
                    self.regex_allowed = true;
                    self.after_dot = true;
                }
                _ if c.is_ascii_digit() => {
                    self.advance_while(is_number_continue);
                    self.operand();
                }
                _ if is_ident_start(c) => {
                    let start = self.pos;
                    let member = self.after_dot;
                    let word = self.advance_while(is_ident_continue);
                    self.operand();
                    self.regex_allowed = precedes_expression(word);
                    self.after_condition_keyword = opens_condition(word);
                    if word != "require" {
                        continue;
                    }
                    if member {
                        trace!("skipping member call `.require` at byte {start}");
                        continue;
                    }
                    if let Some(literal) = self.take_call_argument() {
                        let line = self.line_of(start);
                        return Some(LoadStatement {
                            literal_path: literal.to_owned(),
                            containing_file: self.containing_file.to_owned(),
                            line,
                        });
                    }
                    trace!(
                        "require at byte {start} of {} has no relative literal argument",
                        self.containing_file
                    );
                }
                _ => self.punct(c),
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_number_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Keywords whose parenthesized condition may be followed by a regular
/// expression statement.
fn opens_condition(word: &str) -> bool {
    matches!(word, "if" | "while" | "for" | "with")
}

/// Keywords after which a `/` starts a regular expression, not a division.
fn precedes_expression(word: &str) -> bool {
    matches!(
        word,
        "return"
            | "typeof"
            | "instanceof"
            | "in"
            | "of"
            | "new"
            | "delete"
            | "void"
            | "throw"
            | "case"
            | "do"
            | "else"
            | "yield"
            | "await"
    )
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;
