use super::{
    brace_block, describe_function, file_name, line_count, line_number_at, split_parameters, strip_comments,
    ComplexityRules, C_COMMENTS, Element, FileExtraction, LanguageParser, NestingStyle,
};
use crate::error::ExtractError;
use crate::file_discovery::{Language, SourceFile};
use crate::model::ComponentType;
use regex::Regex;

const RESERVED: [&str; 16] = [
    "if", "for", "while", "switch", "catch", "function", "return", "else", "do", "try", "with", "typeof", "new",
    "await", "super", "constructor",
];

/// JavaScript and TypeScript, including JSX/TSX.
pub struct ScriptParser {
    import_patterns: Vec<Regex>,
    export_patterns: Vec<Regex>,
    export_list_patterns: Vec<Regex>,
    function_patterns: Vec<Regex>,
    method_pattern: Regex,
    class_pattern: Regex,
    interface_pattern: Regex,
    comments: Regex,
    complexity: ComplexityRules,
}

impl ScriptParser {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            import_patterns: vec![
                Regex::new(r#"(?m)^\s*import\s+(?:type\s+)?[\w$*{},\s]+?\s+from\s+['"]([^'"]+)['"]"#)?,
                Regex::new(r#"(?m)^\s*import\s+['"]([^'"]+)['"]"#)?,
                Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#)?,
                Regex::new(r#"import\s*\(\s*['"]([^'"]+)['"]\s*\)"#)?,
                Regex::new(r#"(?m)^\s*export\s+(?:type\s+)?(?:\*(?:\s+as\s+\w+)?|\{[^}]*\})\s+from\s+['"]([^'"]+)['"]"#)?,
            ],
            export_patterns: vec![
                Regex::new(
                    r"(?m)^\s*export\s+(?:default\s+)?(?:declare\s+)?(?:async\s+)?(?:abstract\s+)?(?:function\*?|class|const|let|var|interface|type|enum)\s+([A-Za-z_$][\w$]*)",
                )?,
                Regex::new(r"(?m)^\s*export\s+default\s+([A-Za-z_$][\w$]*)\s*;?\s*$")?,
                Regex::new(r"(?m)^\s*(?:module\.)?exports\.([A-Za-z_$][\w$]*)\s*=")?,
            ],
            export_list_patterns: vec![
                Regex::new(r"(?m)^\s*export\s*\{([^}]*)\}")?,
                Regex::new(r"module\.exports\s*=\s*\{([^}]*)\}")?,
            ],
            function_patterns: vec![
                Regex::new(
                    r"(?:\bexport\s+)?(?:default\s+)?(?:async\s+)?\bfunction\b\s*\*?\s*([A-Za-z_$][\w$]*)\s*(?:<[^>(]*>)?\s*\(([^)]*)\)",
                )?,
                Regex::new(
                    r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=\n]+)?=\s*(?:async\s+)?(?:\(([^)]*)\)|([A-Za-z_$][\w$]*))\s*(?::\s*[^=\n]+)?=>",
                )?,
                Regex::new(
                    r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?function\s*\*?\s*[\w$]*\s*\(([^)]*)\)",
                )?,
                Regex::new(r"(?m)^[ \t]*([A-Za-z_$][\w$]*)\s*:\s*(?:async\s+)?function\s*\*?\s*\(([^)]*)\)")?,
            ],
            method_pattern: Regex::new(
                r"(?m)^[ \t]+(?:(?:public|private|protected|static|async|readonly|override|get|set)\s+)*\*?([A-Za-z_$][\w$]*)\s*(?:<[^>(]*>)?\s*\(([^)]*)\)\s*(?::\s*[^{;\n]+)?\{",
            )?,
            class_pattern: Regex::new(
                r"(?m)^[ \t]*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)(?:\s*<[^>{]*>)?(?:\s+extends\s+([A-Za-z_$][\w$.]*)(?:\s*<[^>{]*>)?)?(?:\s+implements\s+([^{]+?))?\s*\{",
            )?,
            interface_pattern: Regex::new(
                r"(?m)^[ \t]*(?:export\s+)?(?:declare\s+)?interface\s+([A-Za-z_$][\w$]*)(?:\s*<[^>{]*>)?(?:\s+extends\s+([^{]+?))?\s*\{",
            )?,
            comments: Regex::new(C_COMMENTS)?,
            complexity: ComplexityRules::new(r"\b(?:if|for|while|case|catch)\b|&&|\|\||\s\?\s")?,
        })
    }

    fn extract_imports(&self, content: &str) -> Vec<String> {
        let mut imports: Vec<(usize, String)> = Vec::new();
        for pattern in &self.import_patterns {
            for captures in pattern.captures_iter(content) {
                if let Some(module) = captures.get(1) {
                    imports.push((module.start(), module.as_str().to_string()));
                }
            }
        }
        imports.sort_by_key(|(offset, _)| *offset);

        let mut seen = Vec::new();
        for (_, module) in imports {
            if !seen.contains(&module) {
                seen.push(module);
            }
        }
        seen
    }

    fn extract_exports(&self, content: &str) -> Vec<String> {
        let mut exports = Vec::new();
        for pattern in &self.export_patterns {
            for captures in pattern.captures_iter(content) {
                if let Some(name) = captures.get(1) {
                    push_unique(&mut exports, name.as_str());
                }
            }
        }
        for pattern in &self.export_list_patterns {
            for captures in pattern.captures_iter(content) {
                let Some(list) = captures.get(1) else { continue };
                for item in list.as_str().split(',') {
                    // `a as b` exports `b`, `{ d: e }` exports `d`
                    let key = item.split(':').next().unwrap_or("");
                    let exported = key.split_whitespace().last().unwrap_or("");
                    if is_identifier(exported) {
                        push_unique(&mut exports, exported);
                    }
                }
            }
        }
        exports.retain(|name| !matches!(name.as_str(), "function" | "class" | "async"));
        exports
    }

    fn extract_functions(&self, file: &SourceFile, content: &str, jsx: bool) -> Vec<Element> {
        let mut functions = Vec::new();

        for pattern in &self.function_patterns {
            for captures in pattern.captures_iter(content) {
                let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                    continue;
                };
                let params = captures
                    .get(2)
                    .or_else(|| captures.get(3))
                    .map(|m| split_parameters(m.as_str()))
                    .unwrap_or_default();
                functions.push(self.function_element(file, content, name.as_str(), &params, whole.start(), whole.end(), jsx));
            }
        }

        for captures in self.method_pattern.captures_iter(content) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if RESERVED.contains(&name.as_str()) {
                continue;
            }
            let params = captures.get(2).map(|m| split_parameters(m.as_str())).unwrap_or_default();
            // the match ends on the opening brace
            let header_end = whole.end() - 1;
            functions.push(self.function_element(file, content, name.as_str(), &params, whole.start(), header_end, jsx));
        }

        functions.sort_by_key(|f| f.line_number);
        functions
    }

    #[allow(clippy::too_many_arguments)]
    fn function_element(
        &self,
        file: &SourceFile,
        content: &str,
        name: &str,
        params: &[String],
        start: usize,
        header_end: usize,
        jsx: bool,
    ) -> Element {
        let body = function_body(content, header_end);
        let renders_markup = body.contains("</") || body.contains("/>");
        let is_component = name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) && (jsx || renders_markup);

        let mut element = Element::new(
            if is_component { ComponentType::Component } else { ComponentType::Function },
            name,
        );
        element.line_number = line_number_at(content, start);
        element.lines = line_count(&content[start..header_end]) + line_count(body) - 1;
        element.complexity = self.complexity.score(body, NestingStyle::Braces);
        element.description = Some(if is_component {
            format!("UI component {} rendered from {}", name, file_name(&file.path))
        } else {
            describe_function(name, params.len())
        });
        element
    }

    fn extract_classes(&self, content: &str) -> Vec<Element> {
        let mut classes = Vec::new();

        for captures in self.class_pattern.captures_iter(content) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let name = name.as_str();
            let parent = captures.get(2).map(|m| m.as_str().to_string());
            let implements: Vec<String> = captures
                .get(3)
                .map(|m| split_type_list(m.as_str()))
                .unwrap_or_default();

            let kind = if parent
                .as_deref()
                .is_some_and(|p| matches!(p, "Component" | "PureComponent" | "React.Component" | "React.PureComponent"))
            {
                ComponentType::Component
            } else if name.ends_with("Service") {
                ComponentType::Service
            } else {
                ComponentType::Class
            };

            let body = brace_block(content, whole.end() - 1);
            let mut element = Element::new(kind, name);
            element.line_number = line_number_at(content, whole.start());
            element.lines = line_count(body);
            element.complexity = self.complexity.score(body, NestingStyle::Braces);
            element.description = Some(describe_class(name, parent.as_deref(), &implements));
            element.dependencies = parent.into_iter().chain(implements.iter().cloned()).collect();
            element.implements = implements;
            classes.push(element);
        }

        for captures in self.interface_pattern.captures_iter(content) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let parents = captures.get(2).map(|m| split_type_list(m.as_str())).unwrap_or_default();
            let body = brace_block(content, whole.end() - 1);

            let mut element = Element::new(ComponentType::Class, name.as_str());
            element.line_number = line_number_at(content, whole.start());
            element.lines = line_count(body);
            element.description = Some(format!("Interface {}", name.as_str()));
            element.dependencies = parents;
            classes.push(element);
        }

        classes.sort_by_key(|c| c.line_number);
        classes
    }
}

impl LanguageParser for ScriptParser {
    fn parse(&self, file: &SourceFile) -> Result<FileExtraction, ExtractError> {
        let content = strip_comments(&self.comments, &file.content);
        let content = content.as_ref();
        let jsx = file.path.ends_with(".jsx") || file.path.ends_with(".tsx");
        let language = if file.path.ends_with(".ts") || file.path.ends_with(".tsx") || file.path.ends_with(".mts") {
            Language::TypeScript
        } else {
            Language::JavaScript
        };

        let imports = self.extract_imports(content);
        let exports = self.extract_exports(content);
        let mut elements = self.extract_functions(file, content, jsx);
        elements.extend(self.extract_classes(content));

        let mut module = Element::new(ComponentType::Module, file_name(&file.path));
        module.dependencies = imports.clone();
        module.imports = imports;
        module.exports = exports;
        module.lines = line_count(&file.content);
        module.complexity = self.complexity.score(content, NestingStyle::Braces);

        Ok(FileExtraction {
            file: file.path.clone(),
            language,
            module,
            elements,
        })
    }
}

/// Body of a function whose header ends at `header_end`: a brace block, or the
/// single expression of a concise arrow function.
fn function_body(content: &str, header_end: usize) -> &str {
    let rest = content[header_end..].trim_start();
    let is_arrow = content[..header_end].trim_end().ends_with("=>");
    if is_arrow && !rest.starts_with('{') {
        let end = rest.find(['\n', ';']).unwrap_or(rest.len());
        return &rest[..end];
    }
    // overload and ambient declarations have no body
    if !rest.starts_with('{') && !rest.starts_with(':') {
        return "";
    }
    brace_block(content, header_end)
}

fn describe_class(name: &str, parent: Option<&str>, implements: &[String]) -> String {
    let mut description = format!("Class {}", name);
    if let Some(parent) = parent {
        description.push_str(&format!(" extending {}", parent));
    }
    if !implements.is_empty() {
        description.push_str(&format!(" implementing {}", implements.join(", ")));
    }
    description
}

fn split_type_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|t| t.split('<').next().unwrap_or("").trim().to_string())
        .filter(|t| is_identifier(t.split('.').last().unwrap_or("")))
        .collect()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str, content: &str) -> FileExtraction {
        ScriptParser::new().unwrap().parse(&SourceFile::new(path, content)).unwrap()
    }

    fn names(extraction: &FileExtraction, kind: ComponentType) -> Vec<String> {
        extraction
            .elements
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.name.clone())
            .collect()
    }

    #[test]
    fn extracts_imports_in_source_order() {
        let extraction = parse(
            "src/app.ts",
            "import React, { useState } from 'react';\nimport './styles.css';\nconst api = require(\"./api\");\nexport * from './types';\n",
        );
        assert_eq!(extraction.module.imports, vec!["react", "./styles.css", "./api", "./types"]);
        assert_eq!(extraction.module.dependencies, extraction.module.imports);
    }

    #[test]
    fn multi_line_import_clause() {
        let extraction = parse("a.ts", "import {\n  a,\n  b,\n} from './lib';\n");
        assert_eq!(extraction.module.imports, vec!["./lib"]);
    }

    #[test]
    fn extracts_function_forms() {
        let extraction = parse(
            "src/util.js",
            "function foo(a, b) {}\nconst bar = (x) => x * 2;\nexport const baz = async () => {\n  if (a) { return 1; }\n};\nconst qux = function (y) { return y; };\n",
        );
        assert_eq!(names(&extraction, ComponentType::Function), vec!["foo", "bar", "baz", "qux"]);
        let foo = &extraction.elements[0];
        assert_eq!(foo.description.as_deref(), Some("Function foo (2 parameters)"));
        let baz = extraction.elements.iter().find(|e| e.name == "baz").unwrap();
        assert!(baz.complexity > 1);
    }

    #[test]
    fn extracts_class_with_parent_and_methods() {
        let extraction = parse(
            "src/models/dog.ts",
            "export class Dog extends Animal implements Pet, Named {\n  bark(times: number) {\n    for (let i = 0; i < times; i++) { console.log('woof'); }\n  }\n}\n",
        );
        let dog = extraction.elements.iter().find(|e| e.name == "Dog").unwrap();
        assert_eq!(dog.kind, ComponentType::Class);
        assert_eq!(dog.dependencies, vec!["Animal", "Pet", "Named"]);
        assert_eq!(dog.implements, vec!["Pet", "Named"]);
        assert_eq!(names(&extraction, ComponentType::Function), vec!["bark"]);
        assert_eq!(extraction.module.exports, vec!["Dog"]);
    }

    #[test]
    fn control_keywords_are_not_methods() {
        let extraction = parse("a.js", "function run() {\n  if (x) {\n    y();\n  }\n  while (z) {\n  }\n}\n");
        assert_eq!(names(&extraction, ComponentType::Function), vec!["run"]);
    }

    #[test]
    fn jsx_components_and_services() {
        let extraction = parse(
            "src/components/Button.tsx",
            "export function Button({ label }) {\n  return <button>{label}</button>;\n}\nexport class UserService {\n}\n",
        );
        assert_eq!(names(&extraction, ComponentType::Component), vec!["Button"]);
        assert_eq!(names(&extraction, ComponentType::Service), vec!["UserService"]);
        assert_eq!(extraction.language, Language::TypeScript);
    }

    #[test]
    fn export_lists_use_aliases() {
        let extraction = parse("a.js", "const a = 1;\nexport { a as alpha, b };\nmodule.exports = { c, d: e };\n");
        assert_eq!(extraction.module.exports, vec!["alpha", "b", "c", "d"]);
    }

    #[test]
    fn commented_code_is_ignored() {
        let extraction = parse("a.js", "// function ghost() {}\n/* import x from 'y'; */\nfunction real() {}\n");
        assert_eq!(names(&extraction, ComponentType::Function), vec!["real"]);
        assert!(extraction.module.imports.is_empty());
    }

    #[test]
    fn comment_markers_in_strings_do_not_hide_code() {
        let extraction = parse(
            "a.js",
            "const api = \"https://example.com\"; function foo() {}\nconst glob = 'src/**/*.ts';\nfunction bar() {}\n/* real */ function baz() {}\n",
        );
        assert_eq!(names(&extraction, ComponentType::Function), vec!["foo", "bar", "baz"]);
        let baz = extraction.elements.iter().find(|e| e.name == "baz").unwrap();
        assert_eq!(baz.line_number, 4);
    }

    #[test]
    fn empty_file_is_one_plain_module() {
        let extraction = parse("empty.ts", "");
        assert!(extraction.elements.is_empty());
        assert_eq!(extraction.module.complexity, 1);
        assert_eq!(extraction.module.lines, 1);
    }
}
