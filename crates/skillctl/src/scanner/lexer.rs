//! Minimal Python line lexer.
//!
//! Produces a masked copy of each line where string contents and comments
//! are blanked out with spaces, so code patterns never match inside
//! literals. Byte offsets are preserved. Triple-quoted strings carry over
//! between lines.
//!
//! Physical lines are then joined into logical lines (statements) while a
//! bracket is open, a triple-quoted string is open, or the line ends with a
//! backslash, so call arguments that wrap are seen together with the call.

/// A string literal that opens and closes on the same line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    /// Byte offset of the prefix (or the opening quote if none).
    pub start: usize,
    /// Prefix letters such as `f`, `rb`.
    pub prefix: String,
    /// Raw text between the quotes, escapes left as written.
    pub text: String,
}

impl Literal {
    pub fn is_fstring(&self) -> bool {
        self.prefix.bytes().any(|b| b.eq_ignore_ascii_case(&b'f'))
    }
}

#[derive(Debug, Clone)]
pub struct LexedLine<'a> {
    /// 1-based line number.
    pub number: usize,
    pub raw: &'a str,
    /// `raw` with string contents and comments replaced by spaces.
    pub code: String,
    pub literals: Vec<Literal>,
}

impl LexedLine<'_> {
    /// Whole-line comment or blank.
    pub fn is_comment(&self) -> bool {
        let trimmed = self.raw.trim_start();
        trimmed.is_empty() || trimmed.starts_with('#')
    }
}

/// One or more physical lines forming a single statement.
///
/// `code` holds the masked physical lines joined with `\n`; literal offsets
/// point into `code`.
#[derive(Debug, Clone, Default)]
pub struct LogicalLine {
    pub code: String,
    pub literals: Vec<Literal>,
    /// `(offset into code, 1-based line number)` of each physical line.
    starts: Vec<(usize, usize)>,
}

impl LogicalLine {
    /// Physical line number and column of a byte offset into `code`.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let idx = self.starts.partition_point(|(start, _)| *start <= offset);
        self.starts
            .get(idx.saturating_sub(1))
            .map_or((0, offset), |(start, number)| (*number, offset - start))
    }

    /// Literal whose prefix or opening quote sits at the first
    /// non-whitespace byte at or after `pos`.
    pub fn literal_at(&self, pos: usize) -> Option<&Literal> {
        let rest = self.code.get(pos..)?;
        let offset = pos + (rest.len() - rest.trim_start().len());
        self.literals.iter().find(|lit| lit.start == offset)
    }

    fn append(&mut self, line: &LexedLine<'_>) {
        if !self.starts.is_empty() {
            self.code.push('\n');
        }
        let offset = self.code.len();
        self.starts.push((offset, line.number));
        self.code.push_str(&line.code);
        self.literals.extend(line.literals.iter().map(|lit| Literal {
            start: lit.start + offset,
            ..lit.clone()
        }));
    }
}

/// Where the source stops being well formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    /// 1-based line number.
    pub line: usize,
    pub col: usize,
    pub message: String,
}

/// A lexed source file.
#[derive(Debug, Clone)]
pub struct Lexed<'a> {
    pub lines: Vec<LexedLine<'a>>,
    pub logical: Vec<LogicalLine>,
    /// First bracket or string problem, if any.
    pub syntax_issue: Option<SyntaxIssue>,
}

#[derive(Debug, Clone, Copy)]
struct OpenString {
    quote: u8,
    triple: bool,
}

/// Lexes `source` into physical and logical lines.
pub fn lex(source: &str) -> Lexed<'_> {
    let mut open: Option<OpenString> = None;
    let mut triple_start: Option<usize> = None;
    // (opening byte, line, col) of unclosed brackets
    let mut brackets: Vec<(u8, usize, usize)> = Vec::new();
    let mut syntax_issue: Option<SyntaxIssue> = None;

    let mut lines = Vec::new();
    let mut logical = Vec::new();
    let mut current = LogicalLine::default();

    for (idx, raw) in source.lines().enumerate() {
        let number = idx + 1;
        let was_open = open.is_some();
        let (code, literals) = mask_line(raw, &mut open);
        if !was_open && open.is_some() {
            triple_start = Some(number);
        }

        for (col, b) in code.bytes().enumerate() {
            let issue = match b {
                b'(' | b'[' | b'{' => {
                    brackets.push((b, number, col));
                    None
                }
                b')' | b']' | b'}' => match brackets.pop() {
                    Some((opener, _, _)) if closer_of(opener) == b => None,
                    Some((opener, _, _)) => Some(format!(
                        "closing '{}' does not match '{}'",
                        b as char, opener as char
                    )),
                    None => Some(format!("unmatched '{}'", b as char)),
                },
                _ => None,
            };
            if let Some(message) = issue.filter(|_| syntax_issue.is_none()) {
                syntax_issue = Some(SyntaxIssue {
                    line: number,
                    col,
                    message,
                });
            }
        }

        let line = LexedLine {
            number,
            raw,
            code,
            literals,
        };
        current.append(&line);
        let continues = !brackets.is_empty()
            || open.is_some()
            || line.code.trim_end().ends_with('\\');
        if !continues {
            logical.push(std::mem::take(&mut current));
        }
        lines.push(line);
    }

    if !current.starts.is_empty() {
        logical.push(current);
    }

    if syntax_issue.is_none() {
        if let (Some(_), Some(line)) = (open, triple_start) {
            syntax_issue = Some(SyntaxIssue {
                line,
                col: 0,
                message: "unterminated triple-quoted string".to_string(),
            });
        } else if let Some((opener, line, col)) = brackets.first() {
            syntax_issue = Some(SyntaxIssue {
                line: *line,
                col: *col,
                message: format!("'{}' was never closed", *opener as char),
            });
        }
    }

    Lexed {
        lines,
        logical,
        syntax_issue,
    }
}

fn closer_of(opener: u8) -> u8 {
    match opener {
        b'(' => b')',
        b'[' => b']',
        _ => b'}',
    }
}

fn mask_line(raw: &str, open: &mut Option<OpenString>) -> (String, Vec<Literal>) {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut literals = Vec::new();
    // (start, prefix, content start) of a literal opened on this line
    let mut current: Option<(usize, String, usize)> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(state) = *open {
            if b == b'\\' {
                let width = if i + 1 < bytes.len() { 2 } else { 1 };
                out.extend(std::iter::repeat_n(b' ', width));
                i += width;
                continue;
            }
            let closes = if state.triple {
                bytes[i..].starts_with(&[state.quote; 3])
            } else {
                b == state.quote
            };
            if closes {
                if let Some((start, prefix, content_start)) = current.take() {
                    literals.push(Literal {
                        start,
                        prefix,
                        text: raw[content_start..i].to_string(),
                    });
                }
                let width = if state.triple { 3 } else { 1 };
                out.extend(std::iter::repeat_n(state.quote, width));
                i += width;
                *open = None;
                continue;
            }
            out.push(b' ');
            i += 1;
            continue;
        }

        match b {
            b'#' => {
                out.extend(std::iter::repeat_n(b' ', bytes.len() - i));
                break;
            }
            b'"' | b'\'' => {
                let triple = bytes[i..].starts_with(&[b; 3]);
                let width = if triple { 3 } else { 1 };
                let prefix_len = prefix_len(bytes, i);
                current = Some((
                    i - prefix_len,
                    raw[i - prefix_len..i].to_string(),
                    i + width,
                ));
                out.extend(std::iter::repeat_n(b, width));
                i += width;
                *open = Some(OpenString { quote: b, triple });
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }

    // Unterminated single-quoted strings end with the line.
    if open.is_some_and(|state| !state.triple) {
        *open = None;
    }

    (String::from_utf8_lossy(&out).into_owned(), literals)
}

/// Length of a string prefix (`f`, `rb`, ...) ending right before `quote_pos`.
fn prefix_len(bytes: &[u8], quote_pos: usize) -> usize {
    let letters = bytes[..quote_pos]
        .iter()
        .rev()
        .take_while(|b| matches!(b.to_ascii_lowercase(), b'f' | b'r' | b'b' | b'u'))
        .count();
    if letters == 0 || letters > 2 {
        return 0;
    }
    // `elif"x"` is not a prefix: the letters must start a token.
    let before = quote_pos - letters;
    if before > 0 && (bytes[before - 1].is_ascii_alphanumeric() || bytes[before - 1] == b'_') {
        return 0;
    }
    letters
}
