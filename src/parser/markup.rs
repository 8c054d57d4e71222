use super::{file_name, line_count, Element, FileExtraction, LanguageParser};
use crate::error::ExtractError;
use crate::file_discovery::{Language, SourceFile};
use crate::model::ComponentType;
use regex::Regex;

/// Stylesheets and HTML: one lightweight component per file.
pub struct MarkupParser {
    css_rule: Regex,
    css_import: Regex,
    css_comments: Regex,
    html_element: Regex,
    html_reference: Regex,
}

impl MarkupParser {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            css_rule: Regex::new(r"[^{};]+\{")?,
            css_import: Regex::new(r#"@(?:import|use|forward)\s+(?:url\()?\s*['"]?([^'")\s;]+)"#)?,
            css_comments: Regex::new(r"(?s)/\*.*?\*/")?,
            html_element: Regex::new(r"<[A-Za-z][\w-]*")?,
            html_reference: Regex::new(r#"<(?:script|link)\b[^>]*?\b(?:src|href)\s*=\s*['"]([^'"]+)['"]"#)?,
        })
    }

    fn parse_css(&self, file: &SourceFile) -> Element {
        let content = self.css_comments.replace_all(&file.content, "");
        let imports: Vec<String> = self
            .css_import
            .captures_iter(&content)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .collect();
        let rules = self.css_rule.find_iter(&content).count() as u32;

        let mut module = Element::new(ComponentType::Module, file_name(&file.path));
        module.dependencies = imports.clone();
        module.imports = imports;
        module.complexity = rules.max(1);
        module.description = Some(format!("Stylesheet with {} rules", rules));
        module
    }

    fn parse_html(&self, file: &SourceFile) -> Element {
        let elements = self.html_element.find_iter(&file.content).count() as u32;
        let references: Vec<String> = self
            .html_reference
            .captures_iter(&file.content)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|r| !r.starts_with("http://") && !r.starts_with("https://") && !r.starts_with("//"))
            .collect();

        let mut module = Element::new(ComponentType::Module, file_name(&file.path));
        module.dependencies = references.clone();
        module.imports = references;
        module.complexity = 1 + elements;
        module.description = Some(format!("Page with {} elements", elements));
        module
    }
}

impl LanguageParser for MarkupParser {
    fn parse(&self, file: &SourceFile) -> Result<FileExtraction, ExtractError> {
        let language = file.language().unwrap_or(Language::Html);
        let mut module = match language {
            Language::Css => self.parse_css(file),
            _ => self.parse_html(file),
        };
        module.lines = line_count(&file.content);

        Ok(FileExtraction {
            file: file.path.clone(),
            language,
            module,
            elements: Vec::new(),
        })
    }
}

/// Markdown and YAML: documents measured by their outline.
pub struct DocumentParser {
    heading: Regex,
    top_level_key: Regex,
}

impl DocumentParser {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            heading: Regex::new(r"(?m)^#{1,6}\s+\S")?,
            top_level_key: Regex::new(r#"(?m)^(?:[A-Za-z_][\w.-]*|"[^"]+"|'[^']+')\s*:"#)?,
        })
    }
}

impl LanguageParser for DocumentParser {
    fn parse(&self, file: &SourceFile) -> Result<FileExtraction, ExtractError> {
        let language = file.language().unwrap_or(Language::Markdown);
        let mut module = match language {
            Language::Yaml => {
                let keys = self.top_level_key.find_iter(&file.content).count() as u32;
                let mut module = Element::new(ComponentType::Config, file_name(&file.path));
                module.complexity = keys.max(1);
                module.description = Some(format!("Configuration with {} top-level keys", keys));
                module
            }
            _ => {
                let headings = self.heading.find_iter(&file.content).count() as u32;
                let mut module = Element::new(ComponentType::Module, file_name(&file.path));
                module.complexity = headings.max(1);
                module.description = Some(format!("Document with {} sections", headings));
                module
            }
        };
        module.lines = line_count(&file.content);

        Ok(FileExtraction {
            file: file.path.clone(),
            language,
            module,
            elements: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_complexity_counts_rules() {
        let parser = MarkupParser::new().unwrap();
        let extraction = parser
            .parse(&SourceFile::new(
                "styles/main.css",
                "@import 'reset.css';\n/* header { } */\nbody { margin: 0; }\n.a, .b { color: red; }\n@media (max-width: 600px) { .a { color: blue; } }\n",
            ))
            .unwrap();
        assert_eq!(extraction.module.complexity, 4);
        assert_eq!(extraction.module.imports, vec!["reset.css"]);
        assert!(extraction.elements.is_empty());
    }

    #[test]
    fn html_counts_elements_and_local_assets() {
        let parser = MarkupParser::new().unwrap();
        let extraction = parser
            .parse(&SourceFile::new(
                "public/index.html",
                "<html><body><div id=\"root\"></div><script src=\"./main.js\"></script><script src=\"https://cdn.example.com/x.js\"></script></body></html>",
            ))
            .unwrap();
        assert_eq!(extraction.module.complexity, 1 + 5);
        assert_eq!(extraction.module.dependencies, vec!["./main.js"]);
        assert_eq!(extraction.language, Language::Html);
    }

    #[test]
    fn empty_stylesheet_is_still_one() {
        let parser = MarkupParser::new().unwrap();
        let extraction = parser.parse(&SourceFile::new("a.css", "")).unwrap();
        assert_eq!(extraction.module.complexity, 1);
    }

    #[test]
    fn markdown_counts_headings() {
        let parser = DocumentParser::new().unwrap();
        let extraction = parser
            .parse(&SourceFile::new("README.md", "# Title\n\nText\n\n## Usage\n\n```sh\n#not a heading\n```\n### API\n"))
            .unwrap();
        assert_eq!(extraction.module.complexity, 3);
        assert_eq!(extraction.module.kind, ComponentType::Module);
    }

    #[test]
    fn yaml_counts_top_level_keys() {
        let parser = DocumentParser::new().unwrap();
        let extraction = parser
            .parse(&SourceFile::new(
                ".github/workflows/ci.yml",
                "name: CI\non:\n  push:\n    branches: [main]\njobs:\n  build:\n    runs-on: ubuntu-latest\n",
            ))
            .unwrap();
        assert_eq!(extraction.module.kind, ComponentType::Config);
        assert_eq!(extraction.module.complexity, 3);
    }
}
