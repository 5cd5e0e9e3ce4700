//! Filepath: src/core/minify.rs
//! Comment stripping and whitespace collapsing.
//!
//! A line scanner per dialect tracks string literals (including
//! multi-line ones) and block comments. It never edits text
//! inside a literal. When a construct defeats a line scanner
//! (raw strings, heredocs, YAML block scalars, regex literals
//! next to template strings, unterminated single-line strings)
//! the rest of the file passes through unchanged.

/// Syntax family chosen from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Python,
    Shell,
    Yaml,
    Toml,
    Rust,
    Go,
    EcmaScript,
    Cpp,
    Java,
    CSharp,
    Kotlin,
    Swift,
    Scala,
    /// Unknown: only trailing whitespace and blank runs are touched
    Plain,
}

impl Dialect {
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            ".py" | ".pyw" | ".pyi" => Dialect::Python,
            ".sh" | ".bash" | ".zsh" => Dialect::Shell,
            ".yaml" | ".yml" => Dialect::Yaml,
            ".toml" => Dialect::Toml,
            ".rs" => Dialect::Rust,
            ".go" => Dialect::Go,
            ".js" | ".jsx" | ".mjs" | ".cjs" | ".ts" | ".tsx" | ".mts" | ".cts" => {
                Dialect::EcmaScript
            }
            ".c" | ".h" | ".cpp" | ".hpp" | ".cc" | ".cxx" | ".hh" => Dialect::Cpp,
            ".java" => Dialect::Java,
            ".cs" => Dialect::CSharp,
            ".kt" | ".kts" => Dialect::Kotlin,
            ".swift" => Dialect::Swift,
            ".scala" => Dialect::Scala,
            _ => Dialect::Plain,
        }
    }

    fn hash_comments(self) -> bool {
        matches!(
            self,
            Dialect::Python | Dialect::Shell | Dialect::Yaml | Dialect::Toml
        )
    }

    fn slash_comments(self) -> bool {
        !self.hash_comments() && self != Dialect::Plain
    }

    /// `#` only starts a comment at line start or after whitespace
    fn hash_needs_space(self) -> bool {
        matches!(self, Dialect::Shell | Dialect::Yaml | Dialect::Toml)
    }

    fn nested_blocks(self) -> bool {
        matches!(
            self,
            Dialect::Rust | Dialect::Swift | Dialect::Kotlin | Dialect::Scala
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delim {
    Double,
    Single,
    TripleDouble,
    TripleSingle,
    Backtick,
}

impl Delim {
    fn text(self) -> &'static [u8] {
        match self {
            Delim::Double => b"\"",
            Delim::Single => b"'",
            Delim::TripleDouble => b"\"\"\"",
            Delim::TripleSingle => b"'''",
            Delim::Backtick => b"`",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Block(usize),
    Str(Delim),
}

struct Scanner {
    dialect: Dialect,
    state: State,
}

/// What one line turned into
enum LineOut {
    /// Processed text; `had_comment` marks removed comment text
    Text { text: Vec<u8>, had_comment: bool },
    /// Give up: this line and the rest pass through
    Opaque,
}

impl Scanner {
    fn escapes(&self, d: Delim) -> bool {
        match (self.dialect, d) {
            (Dialect::Go, Delim::Backtick) => false,
            (Dialect::Shell | Dialect::Yaml | Dialect::Toml, Delim::Single) => false,
            _ => true,
        }
    }

    fn multiline(&self, d: Delim) -> bool {
        match d {
            Delim::TripleDouble | Delim::TripleSingle | Delim::Backtick => true,
            Delim::Double => self.dialect == Dialect::Rust,
            Delim::Single => false,
        }
    }

    /// Constructs we refuse to scan past
    fn opaque_marker(&self, b: &[u8], i: usize) -> bool {
        let at = |s: &[u8]| b[i..].starts_with(s);
        let prev_ident = i > 0 && (b[i - 1].is_ascii_alphanumeric() || b[i - 1] == b'_');

        match self.dialect {
            Dialect::Rust => {
                !prev_ident && (at(b"r\"") || at(b"r#") || at(b"br\"") || at(b"br#"))
            }
            Dialect::Cpp => at(b"R\""),
            Dialect::CSharp => at(b"@\"") || at(b"\"\"\""),
            Dialect::Java | Dialect::Kotlin | Dialect::Swift | Dialect::Scala => at(b"\"\"\""),
            Dialect::Shell => at(b"<<"),
            Dialect::Toml => at(b"\"\"\"") || at(b"'''"),
            _ => false,
        }
    }

    /// String opener at `i`, if any
    fn string_open(&self, b: &[u8], i: usize, out: &[u8]) -> Option<Delim> {
        let at = |s: &[u8]| b[i..].starts_with(s);
        match (self.dialect, b[i]) {
            (Dialect::Python, b'"') if at(b"\"\"\"") => Some(Delim::TripleDouble),
            (Dialect::Python, b'\'') if at(b"'''") => Some(Delim::TripleSingle),
            (Dialect::Yaml, b'"' | b'\'') => {
                // Quotes only open a scalar at its start
                let prev = out.iter().rev().find(|c| !c.is_ascii_whitespace());
                match prev {
                    None | Some(b':' | b'-' | b'[' | b'{' | b',') => Some(if b[i] == b'"' {
                        Delim::Double
                    } else {
                        Delim::Single
                    }),
                    _ => None,
                }
            }
            (_, b'"') => Some(Delim::Double),
            (Dialect::Swift, b'\'') => None,
            (_, b'\'') => Some(Delim::Single),
            (Dialect::Go | Dialect::EcmaScript, b'`') => Some(Delim::Backtick),
            _ => None,
        }
    }

    /// Rust `'a'` / `'\n'` char literal length at `i`, or None for a lifetime
    fn rust_char_literal(line: &str, i: usize) -> Option<usize> {
        let b = line.as_bytes();
        if b.get(i + 1) == Some(&b'\\') {
            let close = b[i + 2..].iter().position(|&c| c == b'\'')?;
            return Some(close + 3);
        }
        let ch = line.get(i + 1..)?.chars().next()?;
        let after = i + 1 + ch.len_utf8();
        (b.get(after) == Some(&b'\'')).then_some(after - i + 1)
    }

    /// JS: does a `/` at `i` start a regex literal?
    fn regex_start(out: &[u8]) -> bool {
        let trimmed = out.trim_ascii_end();
        match trimmed.last() {
            None => true,
            Some(c) if b"(,=:[!&|?{};+-*%<>~^".contains(c) => true,
            Some(_) => ["return", "typeof", "case", "yield", "await", "void", "delete", "in", "of"]
                .iter()
                .any(|kw| {
                    trimmed.ends_with(kw.as_bytes())
                        && trimmed
                            .len()
                            .checked_sub(kw.len() + 1)
                            .is_none_or(|p| !trimmed[p].is_ascii_alphanumeric())
                }),
        }
    }

    fn scan(&mut self, line: &str) -> LineOut {
        let b = line.as_bytes();
        let mut out: Vec<u8> = Vec::with_capacity(b.len());
        // Lines opening inside a block comment carry comment text
        let mut had_comment = matches!(self.state, State::Block(_));
        let mut i = 0;

        while i < b.len() {
            match self.state {
                State::Code => {
                    if self.opaque_marker(b, i) {
                        return LineOut::Opaque;
                    }

                    let hash_ok = self.dialect.hash_comments()
                        && b[i] == b'#'
                        && (!self.dialect.hash_needs_space()
                            || i == 0
                            || b[i - 1].is_ascii_whitespace());
                    if hash_ok || (self.dialect.slash_comments() && b[i..].starts_with(b"//")) {
                        had_comment = true;
                        break;
                    }

                    if self.dialect.slash_comments() && b[i..].starts_with(b"/*") {
                        self.state = State::Block(1);
                        had_comment = true;
                        i += 2;
                        continue;
                    }

                    if self.dialect == Dialect::EcmaScript && b[i] == b'/' && Self::regex_start(&out)
                    {
                        // Regex literal: keep the line as is, unless it
                        // could also open a template or block comment
                        if line.contains('`') || line[i..].contains("/*") {
                            return LineOut::Opaque;
                        }
                        return LineOut::Text {
                            text: b.to_vec(),
                            had_comment: false,
                        };
                    }

                    if self.dialect == Dialect::Rust && b[i] == b'\'' {
                        match Self::rust_char_literal(line, i) {
                            Some(len) => {
                                out.extend_from_slice(&b[i..i + len]);
                                i += len;
                            }
                            None => {
                                out.push(b'\'');
                                i += 1;
                            }
                        }
                        continue;
                    }

                    if self.dialect != Dialect::Plain
                        && let Some(d) = self.string_open(b, i, &out)
                    {
                        out.extend_from_slice(d.text());
                        i += d.text().len();
                        self.state = State::Str(d);
                        continue;
                    }

                    out.push(b[i]);
                    i += 1;
                }
                State::Block(depth) => {
                    if b[i..].starts_with(b"*/") {
                        i += 2;
                        if depth == 1 {
                            self.state = State::Code;
                            // Keep neighbouring tokens apart
                            if out.last().is_some_and(|c| !c.is_ascii_whitespace()) {
                                out.push(b' ');
                            }
                        } else {
                            self.state = State::Block(depth - 1);
                        }
                    } else if self.dialect.nested_blocks() && b[i..].starts_with(b"/*") {
                        self.state = State::Block(depth + 1);
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                State::Str(d) => {
                    if self.escapes(d) && b[i] == b'\\' {
                        let end = (i + 2).min(b.len());
                        out.extend_from_slice(&b[i..end]);
                        i = end;
                        continue;
                    }
                    if d == Delim::Backtick
                        && self.dialect == Dialect::EcmaScript
                        && b[i..].starts_with(b"${")
                    {
                        return LineOut::Opaque;
                    }
                    if b[i..].starts_with(d.text()) {
                        out.extend_from_slice(d.text());
                        i += d.text().len();
                        self.state = State::Code;
                        continue;
                    }
                    out.push(b[i]);
                    i += 1;
                }
            }
        }

        // A single-line string still open at end of line is a construct
        // we did not understand
        if let State::Str(d) = self.state
            && !self.multiline(d)
        {
            return LineOut::Opaque;
        }

        if self.dialect == Dialect::Yaml && yaml_block_scalar(&out) {
            return LineOut::Opaque;
        }

        LineOut::Text {
            text: out,
            had_comment,
        }
    }
}

/// `key: |`, `- >-`, `key: |2`
fn yaml_block_scalar(code: &[u8]) -> bool {
    let t = code.trim_ascii_end();
    let start = t
        .iter()
        .rposition(|c| c.is_ascii_whitespace())
        .map_or(0, |p| p + 1);
    let token = &t[start..];
    matches!(token.first(), Some(b'|' | b'>'))
        && token[1..]
            .iter()
            .all(|c| matches!(c, b'-' | b'+' | b'0'..=b'9'))
        && token.len() <= 3
}

/// Strip comments and redundant whitespace from `text`.
/// `ext` is the lowercase dotted extension.
pub fn minify(text: &str, ext: &str) -> String {
    let mut scanner = Scanner {
        dialect: Dialect::from_extension(ext),
        state: State::Code,
    };

    let mut out: Vec<String> = Vec::new();
    let mut last_blank = false;
    let lines: Vec<&str> = text.split('\n').collect();

    for (idx, line) in lines.iter().enumerate() {
        let (text, had_comment) = match scanner.scan(line) {
            LineOut::Opaque => {
                tracing::debug!(ext, line = idx + 1, "minifier pass-through from here");
                out.extend(lines[idx..].iter().map(|l| l.to_string()));
                return finish(out);
            }
            LineOut::Text { text, had_comment } => (text, had_comment),
        };

        let text = String::from_utf8_lossy(&text).into_owned();
        let ends_in_string = matches!(scanner.state, State::Str(_));

        // Literal content runs to end of line: never trimmed or dropped
        if ends_in_string {
            out.push(text);
            last_blank = false;
            continue;
        }

        let trimmed = text.trim_end();
        if trimmed.is_empty() {
            // Comment-only lines vanish; blank runs collapse to one
            let in_block = matches!(scanner.state, State::Block(_));
            if had_comment || in_block || last_blank {
                continue;
            }
            out.push(String::new());
            last_blank = true;
        } else {
            out.push(trimmed.to_string());
            last_blank = false;
        }
    }

    finish(out)
}

fn finish(lines: Vec<String>) -> String {
    lines.join("\n").trim_end().to_string()
}
