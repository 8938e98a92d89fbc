use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Only the crate's own sources are scanned.
const SOURCE_DIRS: [&str; 5] = ["src", "transform", "multitaper", "tests", "benches"];

#[derive(Clone, Copy)]
enum Rule {
    UnderscorePrefix,
    ForbiddenWord,
    DoubleStar,
    AllCaps,
    AllowDeadCode,
}

impl Rule {
    fn pattern(self) -> &'static str {
        match self {
            Rule::UnderscorePrefix => r"\b(_[a-zA-Z0-9_]+)\b",
            Rule::ForbiddenWord => {
                r"(//|/\*).*(?:FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE)"
            }
            Rule::DoubleStar => r"(//|/\*).*\*\*",
            Rule::AllCaps => r"(//|/\*).*",
            Rule::AllowDeadCode => r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Rule::UnderscorePrefix => "underscore-prefixed identifiers",
            Rule::ForbiddenWord => "comments with change-log markers",
            Rule::DoubleStar => "non-doc comments containing **",
            Rule::AllCaps => "comments written entirely in capitals",
            Rule::AllowDeadCode => "#[allow(dead_code)] attributes",
        }
    }

    fn advice(self) -> &'static str {
        match self {
            Rule::UnderscorePrefix => "Either use the binding (removing the underscore) or remove it completely.",
            Rule::ForbiddenWord => "Describe what the code does, not how it changed.",
            Rule::DoubleStar => "Keep emphasis markup in doc comments.",
            Rule::AllCaps => "Write comments in sentence case.",
            Rule::AllowDeadCode => "Either use the code or remove it completely.",
        }
    }

    // Decides whether a line matched by the pattern is a real violation.
    fn applies(self, line: &str) -> bool {
        let trimmed = line.trim_start();
        let is_comment = trimmed.starts_with("//") || line.contains("/*");
        match self {
            Rule::UnderscorePrefix => !is_comment && !underscore_only_in_strings(line),
            Rule::ForbiddenWord | Rule::AllowDeadCode => true,
            Rule::DoubleStar => !is_doc_comment(trimmed),
            Rule::AllCaps => is_comment && comment_is_all_caps(trimmed),
        }
    }
}

fn is_doc_comment(trimmed: &str) -> bool {
    trimmed.starts_with("///") || trimmed.starts_with("//!")
}

fn underscore_only_in_strings(line: &str) -> bool {
    line.contains('"')
        && line
            .split('"')
            .enumerate()
            .any(|(i, part)| i % 2 == 1 && part.contains('_'))
}

fn comment_is_all_caps(trimmed: &str) -> bool {
    let text = trimmed.trim_start_matches(['/', '!', '*']).trim();
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    !letters.is_empty() && letters.iter().all(|c| c.is_uppercase())
}

// Collects every offending line of one file for one rule.
struct ViolationCollector {
    rule: Rule,
    file_path: PathBuf,
    violations: Vec<String>,
}

impl ViolationCollector {
    fn new(rule: Rule, file_path: &Path) -> Self {
        Self {
            rule,
            file_path: file_path.to_path_buf(),
            violations: Vec::new(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.rule.description(),
            file_name
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!("\n⚠️ {}\n", self.rule.advice()));
        Some(error_msg)
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if self.rule.applies(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn source_files() -> impl Iterator<Item = PathBuf> {
    SOURCE_DIRS.into_iter().flat_map(|dir| {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
            .map(|e| e.path().to_path_buf())
    })
}

fn scan(rule: Rule) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(rule.pattern())?;
    let mut searcher = Searcher::new();
    for path in source_files() {
        let mut collector = ViolationCollector::new(rule, &path);
        searcher.search_path(&matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    let rules = [
        Rule::UnderscorePrefix,
        Rule::ForbiddenWord,
        Rule::DoubleStar,
        Rule::AllCaps,
        Rule::AllowDeadCode,
    ];
    for rule in rules {
        if let Err(e) = scan(rule) {
            // `eprintln!` keeps the report visible in cargo's output.
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
