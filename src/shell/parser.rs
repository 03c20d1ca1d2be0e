//! Shell command parsing
//!
//! Just enough of a tokenizer to enumerate the simple commands in a command
//! line: head plus literal word/string arguments, across pipelines, lists,
//! and subshells. Redirection operators and their targets, heredoc bodies,
//! and leading environment assignments are excluded from the argument list;
//! command substitutions stay embedded in their word. Full POSIX semantics
//! are out of scope.

use serde::{Deserialize, Serialize};

use crate::core::error::{CoreError, CoreResult};

/// One simple command: head plus its literal arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleCommand {
    /// The command head (first word)
    pub head: String,
    /// Literal arguments, quotes removed
    pub args: Vec<String>,
}

impl SimpleCommand {
    /// The command re-joined with single spaces, for error messages
    pub fn joined(&self) -> String {
        std::iter::once(self.head.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    /// `|`, `||`, `&&`, `;`, `&`, `(`, `)`, newline
    Separator(&'static str),
    /// `>`, `>>`, `<`, `2>`, `&>`, etc; the following word is a target
    Redirect,
    /// `2>&1`-style duplications with no target word
    RedirectDup,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    paren_depth: i32,
    /// Delimiters of heredocs opened on the current line
    pending_heredocs: Vec<String>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            paren_depth: 0,
            pending_heredocs: Vec::new(),
        }
    }

    fn tokenize(mut self) -> CoreResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_blanks();
            let Some(&c) = self.chars.peek() else { break };
            match c {
                '\n' => {
                    self.chars.next();
                    self.drain_heredocs()?;
                    tokens.push(Token::Separator("\n"));
                }
                '#' => self.skip_comment(),
                '|' => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'|') {
                        self.chars.next();
                        tokens.push(Token::Separator("||"));
                    } else {
                        tokens.push(Token::Separator("|"));
                    }
                }
                '&' => {
                    self.chars.next();
                    match self.chars.peek() {
                        Some('&') => {
                            self.chars.next();
                            tokens.push(Token::Separator("&&"));
                        }
                        Some('>') => {
                            self.chars.next();
                            if self.chars.peek() == Some(&'>') {
                                self.chars.next();
                            }
                            tokens.push(Token::Redirect);
                        }
                        _ => tokens.push(Token::Separator("&")),
                    }
                }
                ';' => {
                    self.chars.next();
                    tokens.push(Token::Separator(";"));
                }
                '(' => {
                    self.chars.next();
                    self.paren_depth += 1;
                    tokens.push(Token::Separator("("));
                }
                ')' => {
                    self.chars.next();
                    self.paren_depth -= 1;
                    if self.paren_depth < 0 {
                        return Err(CoreError::parse("unbalanced ')'"));
                    }
                    tokens.push(Token::Separator(")"));
                }
                '<' | '>' => tokens.push(self.lex_redirect(None)?),
                _ => {
                    let word = self.lex_word()?;
                    // A bare file-descriptor number glued to a redirect
                    // operator (`2>`, `1>>`) is part of the redirect.
                    if !word.is_empty()
                        && word.chars().all(|ch| ch.is_ascii_digit())
                        && matches!(self.chars.peek(), Some('>') | Some('<'))
                    {
                        tokens.push(self.lex_redirect(Some(&word))?);
                    } else {
                        tokens.push(Token::Word(word));
                    }
                }
            }
        }
        if self.paren_depth > 0 {
            return Err(CoreError::parse("unbalanced '('"));
        }
        if !self.pending_heredocs.is_empty() {
            return Err(CoreError::parse("unterminated heredoc"));
        }
        Ok(tokens)
    }

    fn skip_blanks(&mut self) {
        while matches!(self.chars.peek(), Some(' ') | Some('\t') | Some('\r')) {
            self.chars.next();
        }
    }

    fn skip_comment(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.chars.next();
        }
    }

    /// Lex a redirect operator; `fd` is a glued descriptor prefix, if any
    fn lex_redirect(&mut self, _fd: Option<&str>) -> CoreResult<Token> {
        let first = self.chars.next().expect("redirect start");
        if first == '<' {
            if self.chars.peek() == Some(&'<') {
                self.chars.next();
                // `<<-` strips tabs; same handling either way here.
                if self.chars.peek() == Some(&'-') {
                    self.chars.next();
                }
                self.skip_blanks();
                let delimiter = self.lex_word()?;
                if delimiter.is_empty() {
                    return Err(CoreError::parse("heredoc without delimiter"));
                }
                self.pending_heredocs.push(delimiter);
                return Ok(Token::RedirectDup);
            }
            return Ok(Token::Redirect);
        }
        // `>`
        if self.chars.peek() == Some(&'>') {
            self.chars.next();
        } else if self.chars.peek() == Some(&'&') {
            // `>&1` duplicates a descriptor; no target word follows.
            self.chars.next();
            while matches!(self.chars.peek(), Some(c) if c.is_ascii_digit()) {
                self.chars.next();
            }
            return Ok(Token::RedirectDup);
        }
        Ok(Token::Redirect)
    }

    /// Consume heredoc bodies up to each pending delimiter line
    fn drain_heredocs(&mut self) -> CoreResult<()> {
        let delimiters: Vec<String> = self.pending_heredocs.drain(..).collect();
        for delimiter in delimiters {
            loop {
                let Some(line) = self.read_line() else {
                    return Err(CoreError::parse("unterminated heredoc"));
                };
                if line.trim() == delimiter {
                    break;
                }
            }
        }
        Ok(())
    }

    fn read_line(&mut self) -> Option<String> {
        self.chars.peek()?;
        let mut line = String::new();
        for c in self.chars.by_ref() {
            if c == '\n' {
                break;
            }
            line.push(c);
        }
        Some(line)
    }

    /// Lex one word, stripping quotes and keeping substitutions embedded
    fn lex_word(&mut self) -> CoreResult<String> {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' | '|' | '&' | ';' | '(' | ')' | '<' | '>' => break,
                '\'' => {
                    self.chars.next();
                    let mut closed = false;
                    for ch in self.chars.by_ref() {
                        if ch == '\'' {
                            closed = true;
                            break;
                        }
                        word.push(ch);
                    }
                    if !closed {
                        return Err(CoreError::parse("unclosed single quote"));
                    }
                }
                '"' => {
                    self.chars.next();
                    let mut closed = false;
                    while let Some(ch) = self.chars.next() {
                        match ch {
                            '"' => {
                                closed = true;
                                break;
                            }
                            '\\' => {
                                if let Some(escaped) = self.chars.next() {
                                    word.push(escaped);
                                }
                            }
                            _ => word.push(ch),
                        }
                    }
                    if !closed {
                        return Err(CoreError::parse("unclosed double quote"));
                    }
                }
                '\\' => {
                    self.chars.next();
                    if let Some(escaped) = self.chars.next() {
                        if escaped != '\n' {
                            word.push(escaped);
                        }
                    }
                }
                '`' => {
                    self.chars.next();
                    word.push('`');
                    let mut closed = false;
                    for ch in self.chars.by_ref() {
                        word.push(ch);
                        if ch == '`' {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(CoreError::parse("unclosed backquote substitution"));
                    }
                }
                '$' => {
                    self.chars.next();
                    word.push('$');
                    if self.chars.peek() == Some(&'(') {
                        // Command substitution stays embedded in the word.
                        let mut depth = 0;
                        for ch in self.chars.by_ref() {
                            word.push(ch);
                            match ch {
                                '(' => depth += 1,
                                ')' => {
                                    depth -= 1;
                                    if depth == 0 {
                                        break;
                                    }
                                }
                                _ => {}
                            }
                        }
                        if depth != 0 {
                            return Err(CoreError::parse("unclosed command substitution"));
                        }
                    }
                }
                _ => {
                    self.chars.next();
                    word.push(c);
                }
            }
        }
        Ok(word)
    }
}

/// Whether a word is a `NAME=value` environment assignment
fn is_assignment(word: &str) -> bool {
    let Some(eq) = word.find('=') else { return false };
    if eq == 0 {
        return false;
    }
    word[..eq]
        .chars()
        .enumerate()
        .all(|(i, c)| c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()))
}

/// Parse a command line into its simple commands
///
/// Returns an error for unparseable input (unclosed quotes, unbalanced
/// parens, unterminated heredocs) before anything else looks at the line.
pub fn parse_command_line(input: &str) -> CoreResult<Vec<SimpleCommand>> {
    let tokens = Lexer::new(input).tokenize()?;

    let mut commands = Vec::new();
    let mut words: Vec<String> = Vec::new();
    let mut iter = tokens.into_iter().peekable();

    let mut flush = |words: &mut Vec<String>| {
        let mut drained = words.drain(..).peekable();
        // Leading NAME=value assignments are environment, not arguments.
        while matches!(drained.peek(), Some(w) if is_assignment(w)) {
            drained.next();
        }
        if let Some(head) = drained.next() {
            commands.push(SimpleCommand {
                head,
                args: drained.collect(),
            });
        }
    };

    while let Some(token) = iter.next() {
        match token {
            Token::Word(word) if word.is_empty() => {}
            Token::Word(word) => words.push(word),
            Token::Separator(_) => flush(&mut words),
            Token::Redirect => {
                // Discard the redirection target.
                if matches!(iter.peek(), Some(Token::Word(_))) {
                    iter.next();
                }
            }
            Token::RedirectDup => {}
        }
    }
    flush(&mut words);

    Ok(commands)
}
