//! Detector rules for Python skill scripts.
//!
//! Each detector walks the logical lines of a file and reports findings in
//! source order. Call names are matched as written (`os.system`, not an
//! alias).

use super::lexer::{Lexed, Literal, LogicalLine};
use regex::Regex;
use skill_core::scan::{Detector, Finding, Severity};
use std::sync::LazyLock;

/// Dotted call name followed by an opening parenthesis.
static CALL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z_]\w*(?:\s*\.\s*[A-Za-z_]\w*)*)\s*\(").unwrap()
});

/// `os.environ[` subscript access.
static ENVIRON_SUBSCRIPT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bos\s*\.\s*environ\s*\[").unwrap()
});

/// `import a, b as c`
static IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*import\s+(.+)$").unwrap()
});

/// `from module import ...`
static FROM_IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*from\s+([\w.]+)\s+import\b").unwrap()
});

/// `[chr(x) for x in ...]`
static CHR_LISTCOMP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*chr\s*\([^\]]*\bfor\b").unwrap()
});

/// `{chr(...)}` replacement field inside an f-string.
static CHR_FSTRING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\s*chr\s*\(").unwrap()
});

/// `data=` / `json=` keyword argument with an optional identifier value.
static PAYLOAD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(data|json)\s*=\s*([A-Za-z_]\w*)?").unwrap()
});

/// Assignment to a variable conventionally used for exfiltration endpoints.
static EXFIL_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(webhook_url|exfil_url|c2_url|remote_url)\s*=[^=]").unwrap()
});

static SUSPICIOUS_URL_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"https?://\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").unwrap(),
            "direct IP address",
        ),
        (
            Regex::new(r"https?://[^\s/:]+:\d{2,5}").unwrap(),
            "non-standard port",
        ),
        (Regex::new(r"https?://.*\.onion").unwrap(), "Tor hidden service"),
    ]
});

const DANGEROUS_CALLS: &[(&str, Severity, &str)] = &[
    ("eval", Severity::Critical, "dynamic code execution"),
    ("exec", Severity::Critical, "dynamic code execution"),
    ("compile", Severity::Critical, "compiles a code object for exec/eval"),
    ("__import__", Severity::High, "dynamic module import"),
    ("os.system", Severity::Critical, "runs a shell command"),
    ("subprocess.run", Severity::Critical, "runs a subprocess"),
    ("subprocess.call", Severity::Critical, "runs a subprocess"),
    ("subprocess.Popen", Severity::Critical, "runs a subprocess"),
    ("subprocess.check_output", Severity::Critical, "runs a subprocess"),
    ("pickle.loads", Severity::Critical, "unpickling can execute arbitrary code"),
    ("pickle.load", Severity::Critical, "unpickling can execute arbitrary code"),
    ("marshal.loads", Severity::Critical, "unmarshalling can execute arbitrary code"),
    ("marshal.load", Severity::Critical, "unmarshalling can execute arbitrary code"),
    ("globals", Severity::Medium, "access to the global namespace"),
    ("locals", Severity::Medium, "access to the local namespace"),
    ("vars", Severity::Low, "access to a variable dictionary"),
];

const NETWORK_CALLS: &[(&str, Severity, &str)] = &[
    ("requests.get", Severity::Medium, "HTTP GET request"),
    ("requests.post", Severity::Medium, "HTTP POST request"),
    ("requests.put", Severity::Medium, "HTTP PUT request"),
    ("requests.delete", Severity::Medium, "HTTP DELETE request"),
    ("requests.patch", Severity::Medium, "HTTP PATCH request"),
    ("requests.request", Severity::Medium, "HTTP request"),
    ("urllib.request.urlopen", Severity::Medium, "opens a URL"),
    ("urllib.request.Request", Severity::Medium, "builds a URL request"),
    ("urllib.request.urlretrieve", Severity::Medium, "downloads a URL"),
    ("httpx.get", Severity::Medium, "HTTP GET request"),
    ("httpx.post", Severity::Medium, "HTTP POST request"),
    ("httpx.request", Severity::Medium, "HTTP request"),
    ("socket.socket", Severity::Medium, "creates a socket"),
    ("socket.connect", Severity::Medium, "socket connection"),
    ("os.popen", Severity::High, "shell pipe that can reach the network"),
];

const NETWORK_IMPORTS: &[&str] = &["socket", "http", "ftplib", "smtplib"];
const NETWORK_FROM_IMPORTS: &[&str] = &["socket", "urllib", "http", "requests", "httpx"];

/// Checked in order; the first match wins.
const SENSITIVE_PATHS: &[(&str, &str, Severity)] = &[
    ("~/.ssh/", "SSH key directory", Severity::Critical),
    (".ssh", "SSH key directory", Severity::Critical),
    ("~/.aws/", "AWS credentials directory", Severity::Critical),
    (".aws", "AWS credentials directory", Severity::Critical),
    ("id_rsa", "SSH private key", Severity::Critical),
    ("id_ed25519", "SSH private key", Severity::Critical),
    ("known_hosts", "SSH known hosts", Severity::High),
    ("credentials", "credentials file", Severity::High),
    (".env", "environment file", Severity::Medium),
    (".secret", "secret file", Severity::High),
    (".token", "token file", Severity::High),
    (".key", "key file", Severity::High),
    ("password", "password file", Severity::High),
    (".claude/", "agent configuration directory", Severity::High),
    (".config/", "user configuration directory", Severity::Medium),
];

const SENSITIVE_ENV_KEYWORDS: &[&str] = &[
    "key",
    "secret",
    "token",
    "password",
    "credential",
    "api",
    "aws",
    "ssh",
    "private",
    "auth",
];

const SENSITIVE_PAYLOAD_KEYWORDS: &[&str] = &["password", "token", "key", "secret", "credential"];

/// Triggers the obfuscation check for many `chr()` calls in one statement.
const MAX_CHR_CALLS: usize = 3;

/// Longest detail excerpt taken from a string literal.
const EXCERPT_CHARS: usize = 50;

/// A call site found in a masked logical line.
#[derive(Debug, Clone)]
struct Call {
    /// Dotted name with inner whitespace removed.
    name: String,
    /// Byte offset of the name in the logical line.
    start: usize,
    /// Byte offset just past the opening parenthesis.
    args_start: usize,
}

fn calls(line: &LogicalLine) -> Vec<Call> {
    CALL_PATTERN
        .captures_iter(&line.code)
        .filter_map(|caps| {
            let name = caps.get(1)?;
            let whole = caps.get(0)?;
            // `foo().bar(` is a method on an expression, not a named call.
            if name.start() > 0 && line.code.as_bytes()[name.start() - 1] == b'.' {
                return None;
            }
            Some(Call {
                name: name.as_str().split_whitespace().collect(),
                start: name.start(),
                args_start: whole.end(),
            })
        })
        .collect()
}

/// Builds findings for one file.
#[derive(Debug)]
struct FindingSink<'f> {
    file: &'f str,
    detector: Detector,
    findings: Vec<Finding>,
}

impl<'f> FindingSink<'f> {
    fn new(file: &'f str, detector: Detector) -> Self {
        Self {
            file,
            detector,
            findings: Vec::new(),
        }
    }

    /// Records a finding at a byte offset into `line.code`.
    fn push(
        &mut self,
        name: impl Into<String>,
        severity: Severity,
        line: &LogicalLine,
        offset: usize,
        details: impl Into<String>,
    ) {
        let (number, col) = line.position(offset);
        self.push_at(name, severity, number, col, details);
    }

    fn push_at(
        &mut self,
        name: impl Into<String>,
        severity: Severity,
        number: usize,
        col: usize,
        details: impl Into<String>,
    ) {
        self.findings.push(Finding {
            detector: self.detector,
            name: name.into(),
            severity,
            file: self.file.to_string(),
            line: number,
            col,
            details: details.into(),
        });
    }
}

fn lookup<'t>(
    table: &'t [(&'t str, Severity, &'t str)],
    name: &str,
) -> Option<&'t (&'t str, Severity, &'t str)> {
    table.iter().find(|(candidate, _, _)| *candidate == name)
}

fn excerpt(text: &str) -> String {
    if text.chars().count() > EXCERPT_CHARS {
        let head: String = text.chars().take(EXCERPT_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

pub(super) fn dangerous_calls(lexed: &Lexed<'_>, file: &str) -> Vec<Finding> {
    let mut sink = FindingSink::new(file, Detector::DangerousCalls);
    for line in &lexed.logical {
        for call in calls(line) {
            if let Some((name, severity, details)) = lookup(DANGEROUS_CALLS, &call.name) {
                sink.push(*name, *severity, line, call.start, *details);
            }
        }
    }

    // Rules above may have missed code past this point.
    if let Some(issue) = &lexed.syntax_issue {
        sink.push_at(
            "syntax_error",
            Severity::Low,
            issue.line,
            issue.col,
            format!("syntax error: {}", issue.message),
        );
    }
    sink.findings
}

pub(super) fn network_ops(lexed: &Lexed<'_>, file: &str) -> Vec<Finding> {
    let mut sink = FindingSink::new(file, Detector::NetworkOps);
    for line in &lexed.logical {
        for call in calls(line) {
            if let Some((name, severity, details)) = lookup(NETWORK_CALLS, &call.name) {
                sink.push(*name, *severity, line, call.start, *details);
            }
        }

        for literal in &line.literals {
            if let Some(desc) = suspicious_url(&literal.text) {
                sink.push(
                    "suspicious_url",
                    Severity::Medium,
                    line,
                    literal.start,
                    format!("{desc}: {}", excerpt(&literal.text)),
                );
            }
        }

        if let Some(caps) = IMPORT_PATTERN.captures(&line.code) {
            let col = line.code.len() - line.code.trim_start().len();
            for module in caps[1].split(',') {
                let module = module.split_whitespace().next().unwrap_or_default();
                if NETWORK_IMPORTS.contains(&module) {
                    sink.push(
                        format!("import {module}"),
                        Severity::Low,
                        line,
                        col,
                        format!("imports network library {module}"),
                    );
                }
            }
        } else if let Some(caps) = FROM_IMPORT_PATTERN.captures(&line.code) {
            let module = &caps[1];
            if NETWORK_FROM_IMPORTS.contains(&module) {
                let col = line.code.len() - line.code.trim_start().len();
                sink.push(
                    format!("from {module} import ..."),
                    Severity::Low,
                    line,
                    col,
                    format!("imports from network library {module}"),
                );
            }
        }
    }
    sink.findings
}

fn suspicious_url(text: &str) -> Option<&'static str> {
    SUSPICIOUS_URL_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, desc)| *desc)
}

pub(super) fn file_ops(lexed: &Lexed<'_>, file: &str) -> Vec<Finding> {
    let mut sink = FindingSink::new(file, Detector::FileOps);
    for line in &lexed.logical {
        for call in calls(line) {
            let Some(literal) = line.literal_at(call.args_start) else {
                continue;
            };
            match call.name.as_str() {
                "open" | "Path.open" => {
                    if let Some((desc, severity)) = sensitive_path(&literal.text) {
                        sink.push(
                            "sensitive_file",
                            severity,
                            line,
                            call.start,
                            format!("opens sensitive file ({desc}): {}", literal.text),
                        );
                    }
                }
                "os.getenv" | "os.environ.get" => {
                    push_env_access(&mut sink, line, call.start, literal);
                }
                _ => {}
            }
        }

        for m in ENVIRON_SUBSCRIPT_PATTERN.find_iter(&line.code) {
            if let Some(literal) = line.literal_at(m.end()) {
                push_env_access(&mut sink, line, m.start(), literal);
            }
        }
    }
    sink.findings
}

fn push_env_access(sink: &mut FindingSink<'_>, line: &LogicalLine, offset: usize, key: &Literal) {
    let lower = key.text.to_lowercase();
    if SENSITIVE_ENV_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        sink.push(
            "env_access",
            Severity::High,
            line,
            offset,
            format!("reads sensitive environment variable: {}", key.text),
        );
    }
}

fn sensitive_path(path: &str) -> Option<(&'static str, Severity)> {
    let lower = path.to_lowercase();
    SENSITIVE_PATHS
        .iter()
        .find(|(pattern, _, _)| lower.contains(pattern))
        .map(|(_, desc, severity)| (*desc, *severity))
}

pub(super) fn obfuscation(lexed: &Lexed<'_>, file: &str, long_line_chars: usize) -> Vec<Finding> {
    let mut sink = FindingSink::new(file, Detector::Obfuscation);
    for line in &lexed.logical {
        let line_calls = calls(line);
        for call in &line_calls {
            match call.name.as_str() {
                "base64.b64decode" | "base64.standard_b64decode" => sink.push(
                    "base64_decode",
                    Severity::High,
                    line,
                    call.start,
                    "base64 decoding of embedded data",
                ),
                "compile" => sink.push(
                    "compile_call",
                    Severity::High,
                    line,
                    call.start,
                    "dynamic compilation, common in obfuscated code",
                ),
                "bytes.fromhex" | "bytearray.fromhex" => sink.push(
                    "hex_bytes",
                    Severity::High,
                    line,
                    call.start,
                    "bytes built from a hex string",
                ),
                _ => {}
            }
        }

        for literal in line.literals.iter().filter(|l| l.is_fstring()) {
            if CHR_FSTRING_PATTERN.is_match(&literal.text) {
                sink.push(
                    "chr_fstring",
                    Severity::High,
                    line,
                    literal.start,
                    "f-string assembled from chr() calls",
                );
            }
        }

        if let Some(m) = CHR_LISTCOMP_PATTERN.find(&line.code) {
            sink.push(
                "chr_listcomp",
                Severity::High,
                line,
                m.start(),
                "list comprehension assembling a string with chr()",
            );
        }

        let chr_calls: Vec<&Call> = line_calls.iter().filter(|c| c.name == "chr").collect();
        if chr_calls.len() > MAX_CHR_CALLS {
            sink.push(
                "multiple_chr",
                Severity::High,
                line,
                chr_calls[0].start,
                format!("{} chr() calls in one statement", chr_calls.len()),
            );
        }
    }

    for line in lexed.lines.iter().filter(|l| !l.is_comment()) {
        let width = line.raw.chars().count();
        if width > long_line_chars {
            sink.push_at(
                "long_line",
                Severity::Low,
                line.number,
                0,
                format!("very long line ({width} chars)"),
            );
        }
    }

    sink.findings.sort_by_key(|f| f.line);
    sink.findings
}

pub(super) fn data_exfil(lexed: &Lexed<'_>, file: &str) -> Vec<Finding> {
    let mut sink = FindingSink::new(file, Detector::DataExfil);
    for line in &lexed.logical {
        for call in calls(line) {
            match call.name.as_str() {
                "requests.post" | "requests.put" | "requests.patch" => {
                    let method = call
                        .name
                        .rsplit('.')
                        .next()
                        .unwrap_or_default()
                        .to_uppercase();
                    check_http_payload(&mut sink, line, &call, &method);
                }
                "socket.send" | "socket.sendall" | "socket.sendto" => sink.push(
                    "socket_send",
                    Severity::Critical,
                    line,
                    call.start,
                    "raw socket send; check the destination",
                ),
                _ => {}
            }
        }

        if let Some(caps) = EXFIL_VAR_PATTERN.captures(&line.code) {
            if let Some(var) = caps.get(1) {
                sink.push(
                    "suspicious_var",
                    Severity::High,
                    line,
                    var.start(),
                    format!("suspicious variable name: {}", var.as_str()),
                );
            }
        }
    }
    sink.findings
}

fn check_http_payload(sink: &mut FindingSink<'_>, line: &LogicalLine, call: &Call, method: &str) {
    let args = call_args(&line.code, call.args_start);
    let mut has_payload = false;
    for caps in PAYLOAD_PATTERN.captures_iter(args) {
        has_payload = true;
        let Some(var) = caps.get(2) else {
            continue;
        };
        let lower = var.as_str().to_lowercase();
        if SENSITIVE_PAYLOAD_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            sink.push(
                "http_exfil",
                Severity::Critical,
                line,
                call.start,
                format!("HTTP {method} sends a possibly sensitive variable: {}", var.as_str()),
            );
            return;
        }
    }
    if has_payload {
        sink.push(
            "http_data_send",
            Severity::Medium,
            line,
            call.start,
            format!("HTTP {method} request carries data; check the destination"),
        );
    }
}

/// Argument text of a call, up to its closing parenthesis or the end of
/// the statement.
fn call_args(code: &str, args_start: usize) -> &str {
    let rest = &code[args_start..];
    let mut depth = 0usize;
    for (idx, b) in rest.bytes().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' if depth == 0 => return &rest[..idx],
            b')' | b']' | b'}' => depth -= 1,
            _ => {}
        }
    }
    rest
}
