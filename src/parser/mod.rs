//! Pattern-table extractors, one strategy per language family.
//!
//! None of these are grammars. Each parser scans text with a fixed set of
//! regular expressions and reports what it recognises; missing a construct is
//! acceptable, inventing structure is not.

mod c_family;
mod config_file;
mod markup;
mod python;
mod script;

pub use c_family::CFamilyParser;
pub use config_file::ConfigParser;
pub use markup::{DocumentParser, MarkupParser};
pub use python::PythonParser;
pub use script::ScriptParser;

use crate::error::ExtractError;
use crate::file_discovery::{Language, SourceFile};
use crate::model::{component_id, ComponentNode, ComponentType, Layer};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

/// One structural element recognised in a file.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ComponentType,
    pub name: String,
    pub dependencies: Vec<String>,
    /// Subset of `dependencies` named in an implements clause.
    pub implements: Vec<String>,
    pub exports: Vec<String>,
    pub imports: Vec<String>,
    pub complexity: u32,
    pub lines: u32,
    pub line_number: usize,
    pub description: Option<String>,
}

impl Element {
    pub fn new(kind: ComponentType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            dependencies: Vec::new(),
            implements: Vec::new(),
            exports: Vec::new(),
            imports: Vec::new(),
            complexity: 1,
            lines: 1,
            line_number: 1,
            description: None,
        }
    }
}

/// Everything one file contributed: the file-level element plus the rest.
#[derive(Debug, Clone)]
pub struct FileExtraction {
    pub file: String,
    pub language: Language,
    pub module: Element,
    pub elements: Vec<Element>,
}

/// A component together with the dependency names it implements rather than extends.
#[derive(Debug, Clone)]
pub struct ExtractedComponent {
    pub node: ComponentNode,
    pub implements: Vec<String>,
}

impl FileExtraction {
    /// Assign stable ids and produce unresolved components, file-level first.
    pub fn into_components(self) -> Vec<ExtractedComponent> {
        let mut ordinals: HashMap<(ComponentType, String), usize> = HashMap::new();
        let file = self.file;

        std::iter::once(self.module)
            .chain(self.elements)
            .map(|element| {
                let ordinal = ordinals.entry((element.kind, element.name.clone())).or_insert(0);
                let id = component_id(&file, element.kind, &element.name, *ordinal);
                *ordinal += 1;

                ExtractedComponent {
                    node: ComponentNode {
                        id,
                        name: element.name,
                        component_type: element.kind,
                        file: file.clone(),
                        layer: Layer::Business,
                        dependencies: element.dependencies,
                        exports: element.exports,
                        imports: element.imports,
                        complexity: element.complexity.max(1),
                        lines: element.lines.max(1),
                        description: element.description,
                    },
                    implements: element.implements,
                }
            })
            .collect()
    }
}

pub trait LanguageParser: Send + Sync {
    fn parse(&self, file: &SourceFile) -> Result<FileExtraction, ExtractError>;
}

pub struct ParserRegistry {
    parsers: HashMap<Language, Arc<dyn LanguageParser>>,
}

impl ParserRegistry {
    pub fn new() -> Result<Self, ExtractError> {
        let script: Arc<dyn LanguageParser> = Arc::new(ScriptParser::new()?);
        let c_family: Arc<dyn LanguageParser> = Arc::new(CFamilyParser::new()?);
        let markup: Arc<dyn LanguageParser> = Arc::new(MarkupParser::new()?);
        let documents: Arc<dyn LanguageParser> = Arc::new(DocumentParser::new()?);

        let mut parsers: HashMap<Language, Arc<dyn LanguageParser>> = HashMap::new();
        parsers.insert(Language::JavaScript, script.clone());
        parsers.insert(Language::TypeScript, script);
        parsers.insert(Language::Python, Arc::new(PythonParser::new()?));
        parsers.insert(Language::C, c_family.clone());
        parsers.insert(Language::Cpp, c_family);
        parsers.insert(Language::Json, Arc::new(ConfigParser::new()));
        parsers.insert(Language::Css, markup.clone());
        parsers.insert(Language::Html, markup);
        parsers.insert(Language::Markdown, documents.clone());
        parsers.insert(Language::Yaml, documents);

        Ok(Self { parsers })
    }

    /// Swap in a different strategy for one language.
    pub fn register(&mut self, language: Language, parser: Arc<dyn LanguageParser>) {
        self.parsers.insert(language, parser);
    }

    pub fn parser_for(&self, language: Language) -> Option<&Arc<dyn LanguageParser>> {
        self.parsers.get(&language)
    }

    pub fn parse(&self, file: &SourceFile) -> Option<Result<FileExtraction, ExtractError>> {
        let language = file.language()?;
        let parser = self.parser_for(language)?;
        if file.content.contains('\0') {
            return Some(Err(ExtractError::Binary(file.path.clone())));
        }
        Some(parser.parse(file))
    }
}

/// How nesting is measured for complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestingStyle {
    Braces,
    Indentation,
}

/// Control-flow keyword counter shared by the code parsers.
pub(crate) struct ComplexityRules {
    keywords: Regex,
}

impl ComplexityRules {
    pub(crate) fn new(keywords: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            keywords: Regex::new(keywords)?,
        })
    }

    /// `1 + control-flow keywords + deepest nesting`.
    pub(crate) fn score(&self, text: &str, style: NestingStyle) -> u32 {
        let keywords = self.keywords.find_iter(text).count() as u32;
        let depth = match style {
            NestingStyle::Braces => brace_depth(text),
            NestingStyle::Indentation => indent_depth(text),
        };
        1 + keywords + depth
    }
}

/// C-style comments, plus the quoted spans a comment marker may appear in.
pub(crate) const C_COMMENTS: &str = r#"(?s)"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'|`(?:[^`\\]|\\.)*`|/\*.*?\*/|//[^\n]*"#;

/// Drop comments found by a [`C_COMMENTS`] regex. Quoted text is kept as is
/// and a block comment leaves its line breaks behind, so offsets still map
/// to the right line.
pub(crate) fn strip_comments<'a>(comments: &Regex, content: &'a str) -> Cow<'a, str> {
    comments.replace_all(content, |caps: &Captures| {
        let matched = &caps[0];
        if matched.starts_with(['"', '\'', '`']) {
            matched.to_string()
        } else {
            "\n".repeat(matched.matches('\n').count())
        }
    })
}

pub(crate) fn brace_depth(text: &str) -> u32 {
    let mut depth: u32 = 0;
    let mut max_depth = 0;
    for ch in text.chars() {
        match ch {
            '{' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max_depth
}

/// Nesting levels relative to the least-indented non-blank line.
pub(crate) fn indent_depth(text: &str) -> u32 {
    let indents: Vec<usize> = text
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(indent_width)
        .collect();
    let Some(&base) = indents.iter().min() else {
        return 0;
    };

    let mut levels: Vec<usize> = indents.iter().map(|i| i - base).filter(|i| *i > 0).collect();
    levels.sort_unstable();
    levels.dedup();
    levels.len() as u32
}

pub(crate) fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

pub(crate) fn line_count(text: &str) -> u32 {
    (text.lines().count() as u32).max(1)
}

pub(crate) fn line_number_at(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())].matches('\n').count() + 1
}

/// The `{ … }` block starting at the first brace at or after `from`.
pub(crate) fn brace_block(text: &str, from: usize) -> &str {
    let Some(open) = text[from.min(text.len())..].find('{').map(|i| i + from) else {
        return "";
    };

    let mut depth = 0usize;
    for (i, ch) in text[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return &text[open..open + i + 1];
                }
            }
            _ => {}
        }
    }
    &text[open..]
}

/// Lines indented deeper than the header line starting at `offset`.
pub(crate) fn indented_block(text: &str, offset: usize) -> &str {
    let start = text[..offset.min(text.len())].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let header_end = text[start..].find('\n').map(|i| start + i + 1).unwrap_or(text.len());
    let header_indent = indent_width(&text[start..header_end]);

    let mut end = header_end;
    for line in text[header_end..].split_inclusive('\n') {
        let trimmed = line.trim();
        if !trimmed.is_empty() && indent_width(line) <= header_indent {
            break;
        }
        end += line.len();
    }
    text[start..end].trim_end()
}

pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

pub(crate) fn split_parameters(params: &str) -> Vec<String> {
    params
        .split(',')
        .map(|p| {
            p.trim()
                .trim_start_matches("...")
                .split([':', '='])
                .next()
                .unwrap_or("")
                .trim()
                .to_string()
        })
        .filter(|p| !p.is_empty())
        .collect()
}

/// Canned purpose description keyed by the verb a function name starts with.
pub fn describe_function(name: &str, parameter_count: usize) -> String {
    let subject = humanize(strip_verb(name));
    let params = match parameter_count {
        0 => "no parameters".to_string(),
        1 => "1 parameter".to_string(),
        n => format!("{} parameters", n),
    };

    let verb = VERBS.iter().find(|(verb, _)| has_verb(name, verb));
    let purpose = match verb {
        Some((_, "Handles the")) => format!("Handles the {} event", subject),
        Some((_, template)) => format!("{} {}", template, subject),
        None => format!("Function {}", name),
    };

    format!("{} ({})", purpose, params)
}

const VERBS: [(&str, &str); 23] = [
    ("get", "Retrieves"),
    ("set", "Sets"),
    ("validate", "Validates"),
    ("is", "Validates"),
    ("has", "Validates"),
    ("check", "Validates"),
    ("process", "Processes"),
    ("handle", "Processes"),
    ("create", "Creates"),
    ("build", "Creates"),
    ("make", "Creates"),
    ("update", "Updates"),
    ("delete", "Removes"),
    ("remove", "Removes"),
    ("fetch", "Loads"),
    ("load", "Loads"),
    ("render", "Renders"),
    ("parse", "Parses"),
    ("calculate", "Calculates"),
    ("compute", "Calculates"),
    ("initialize", "Initializes"),
    ("init", "Initializes"),
    ("on", "Handles the"),
];

/// `getUser`, `get_user` and `get` start with "get"; `getaway` does not.
fn has_verb(name: &str, verb: &str) -> bool {
    let Some(rest) = name.get(..verb.len()) else {
        return false;
    };
    if !rest.eq_ignore_ascii_case(verb) {
        return false;
    }
    match name[verb.len()..].chars().next() {
        None => true,
        Some(next) => next.is_uppercase() || next == '_' || next.is_ascii_digit(),
    }
}

fn strip_verb(name: &str) -> &str {
    VERBS
        .iter()
        .find(|(verb, _)| has_verb(name, verb) && name.len() > verb.len())
        .map(|(verb, _)| name[verb.len()..].trim_start_matches('_'))
        .unwrap_or(name)
}

/// `userProfile` / `user_profile` -> `user profile`.
fn humanize(name: &str) -> String {
    let mut out = String::new();
    for (i, ch) in name.chars().enumerate() {
        if ch == '_' || ch == '-' {
            out.push(' ');
        } else if ch.is_uppercase() && i > 0 {
            out.push(' ');
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    let out = out.split_whitespace().collect::<Vec<_>>().join(" ");
    if out.is_empty() {
        "data".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brace_block_matches_nested_braces() {
        let text = "function a() { if (x) { y(); } } trailing";
        let block = brace_block(text, 0);
        assert_eq!(block, "{ if (x) { y(); } }");
    }

    #[test]
    fn indented_block_stops_at_dedent() {
        let text = "def a(x):\n    if x:\n        return 1\n    return 2\n\ndef b():\n    pass\n";
        let block = indented_block(text, 0);
        assert!(block.contains("return 2"));
        assert!(!block.contains("def b"));
    }

    #[test]
    fn comment_markers_inside_strings_survive() {
        let comments = Regex::new(C_COMMENTS).unwrap();
        let text = "const u = \"https://x\"; function foo() {}\nconst g = 'src/**/*.ts'; /* gone\n */ bar(); // tail\n";
        assert_eq!(
            strip_comments(&comments, text),
            "const u = \"https://x\"; function foo() {}\nconst g = 'src/**/*.ts'; \n bar(); \n"
        );
    }

    #[test]
    fn depth_measures() {
        assert_eq!(brace_depth(""), 0);
        assert_eq!(brace_depth("{ { } { { } } }"), 3);
        assert_eq!(indent_depth("a\n  b\n    c\n  d\n"), 2);
    }

    #[test]
    fn complexity_grows_with_keywords_and_depth() {
        let rules = ComplexityRules::new(r"\b(if|for|while)\b").unwrap();
        let flat = rules.score("", NestingStyle::Braces);
        let one_branch = rules.score("if (a) { b(); }", NestingStyle::Braces);
        let nested = rules.score("if (a) { for (;;) { while (c) { } } }", NestingStyle::Braces);
        assert_eq!(flat, 1);
        assert_eq!(one_branch, 3);
        assert!(nested > one_branch);
    }

    #[test]
    fn describes_functions_by_prefix() {
        assert_eq!(describe_function("getUserProfile", 1), "Retrieves user profile (1 parameter)");
        assert_eq!(describe_function("validate_email", 2), "Validates email (2 parameters)");
        assert_eq!(describe_function("onClick", 0), "Handles the click event (no parameters)");
        assert_eq!(describe_function("frobnicate", 0), "Function frobnicate (no parameters)");
    }

    #[test]
    fn splits_typed_parameters() {
        assert_eq!(split_parameters("a: string, b = 2, ...rest"), vec!["a", "b", "rest"]);
        assert!(split_parameters("  ").is_empty());
    }

    #[test]
    fn ordinals_keep_duplicate_names_unique() {
        let mut first = Element::new(ComponentType::Function, "dup");
        first.line_number = 1;
        let second = Element::new(ComponentType::Function, "dup");
        let extraction = FileExtraction {
            file: "a.js".to_string(),
            language: Language::JavaScript,
            module: Element::new(ComponentType::Module, "a.js"),
            elements: vec![first, second],
        };
        let components = extraction.into_components();
        assert_eq!(components.len(), 3);
        assert_ne!(components[1].node.id, components[2].node.id);
    }
}
