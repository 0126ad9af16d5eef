use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories that hold generated or third-party Rust sources.
const SKIPPED_DIRS: [&str; 2] = ["./target", "./examples"];

const FORBIDDEN_WORDS: [&str; 14] = [
    "FIXED",
    "CORRECTED",
    "FIX",
    "FIXES",
    "NEW",
    "CHANGED",
    "CHANGES",
    "CHANGE",
    "MODIFIED",
    "MODIFIES",
    "MODIFY",
    "UPDATED",
    "UPDATES",
    "UPDATE",
];

/// One source hygiene rule: a line regex plus a filter that decides whether a matching
/// line is a real violation.
struct Rule {
    name: &'static str,
    pattern: String,
    include_build_script: bool,
    is_violation: fn(&str) -> bool,
    advice: &'static str,
}

/// Collects the violating lines of a single file.
struct LineCollector {
    is_violation: fn(&str) -> bool,
    violations: Vec<String>,
}

impl Sink for LineCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if (self.is_violation)(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "underscore-prefixed identifiers",
            pattern: r"\b(_[a-zA-Z0-9_]+)\b".to_string(),
            include_build_script: true,
            is_violation: |line| !is_comment(line) && !underscore_only_in_string(line),
            advice: "Use the binding (dropping the underscore) or remove it.",
        },
        Rule {
            name: "forbidden words in comments",
            pattern: format!(r"(//|/\*).*(?:{})", FORBIDDEN_WORDS.join("|")),
            include_build_script: false,
            is_violation: |_| true,
            advice: "Comments describe the code as it is, not its history.",
        },
        Rule {
            name: "'**' in non-doc comments",
            pattern: r"(//|/\*).*\*\*".to_string(),
            include_build_script: false,
            is_violation: |line| !line.trim_start().starts_with("///"),
            advice: "Emphasis markers are only allowed in doc comments.",
        },
        Rule {
            name: "all-uppercase comments",
            pattern: r"(//|/\*).*".to_string(),
            include_build_script: false,
            is_violation: comment_is_all_uppercase,
            advice: "Write comments in sentence case, or delete them.",
        },
        Rule {
            name: "#[allow(dead_code)] attributes",
            pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]".to_string(),
            include_build_script: false,
            is_violation: |_| true,
            advice: "Use the code or remove it.",
        },
    ]
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("//") || trimmed.starts_with("/*")
}

// Odd-numbered pieces after splitting on quotes sit inside string literals.
fn underscore_only_in_string(line: &str) -> bool {
    line.contains('"')
        && line
            .split('"')
            .enumerate()
            .any(|(idx, piece)| idx % 2 == 1 && piece.contains('_'))
}

fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix("///") {
        return Some(rest.trim());
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Some(rest.trim());
    }
    let start = line.find("/*")? + 2;
    let body = &line[start..];
    Some(body.find("*/").map_or(body, |end| &body[..end]).trim())
}

fn comment_is_all_uppercase(line: &str) -> bool {
    let Some(text) = comment_text(line) else {
        return false;
    };
    let mut letters = text.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(char::is_uppercase)
}

fn rust_sources(include_build_script: bool) -> Vec<PathBuf> {
    WalkDir::new(".")
        .into_iter()
        .filter_entry(|e| !SKIPPED_DIRS.iter().any(|dir| e.path().starts_with(dir)))
        .filter_map(|e| e.ok())
        .filter(|e| include_build_script || e.file_name() != "build.rs")
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn check_rule(rule: &Rule) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(&rule.pattern)?;
    let mut searcher = Searcher::new();
    for path in rust_sources(rule.include_build_script) {
        let mut collector = LineCollector {
            is_violation: rule.is_violation,
            violations: Vec::new(),
        };
        searcher.search_path(&matcher, &path, &mut collector)?;
        if !collector.violations.is_empty() {
            return Err(report(rule, &path, &collector.violations).into());
        }
    }
    Ok(())
}

fn report(rule: &Rule, path: &Path, violations: &[String]) -> String {
    let mut message = format!(
        "\n❌ ERROR: Found {} {} in {}:\n",
        violations.len(),
        rule.name,
        path.display()
    );
    for violation in violations {
        message.push_str(&format!("   {violation}\n"));
    }
    message.push_str(&format!("\n⚠️ {}\n", rule.advice));
    message
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=positional");
    println!("cargo:rerun-if-changed=tests");
    println!("cargo:rerun-if-changed=benches");

    for rule in rules() {
        if let Err(e) = check_rule(&rule) {
            // Printed to stderr so cargo shows it with the failed build.
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
