use super::{
    brace_block, describe_function, file_name, line_count, line_number_at, split_parameters, strip_comments,
    ComplexityRules, C_COMMENTS, Element, FileExtraction, LanguageParser, NestingStyle,
};
use crate::error::ExtractError;
use crate::file_discovery::{Language, SourceFile};
use crate::model::ComponentType;
use regex::Regex;

const NOT_FUNCTIONS: [&str; 8] = ["if", "for", "while", "switch", "return", "sizeof", "catch", "else"];

/// C and C++ sources and headers.
pub struct CFamilyParser {
    include: Regex,
    function: Regex,
    class: Regex,
    comments: Regex,
    complexity: ComplexityRules,
}

impl CFamilyParser {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            include: Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*[<"]([^>"]+)[>"]"#)?,
            function: Regex::new(
                r"(?m)^[ \t]*(?:(?:static|inline|extern|virtual|constexpr|const|unsigned|signed|struct)\s+)*[A-Za-z_][\w:<>,]*[\s*&]+([A-Za-z_~][\w:~]*)\s*\(([^)]*)\)\s*(?:const\s*)?(?:noexcept\s*)?(?:override\s*)?\{",
            )?,
            class: Regex::new(
                r"(?m)^[ \t]*(?:typedef\s+)?(class|struct)\s+([A-Za-z_]\w*)(?:\s*final)?(?:\s*:\s*([^{;]+?))?\s*\{",
            )?,
            comments: Regex::new(C_COMMENTS)?,
            complexity: ComplexityRules::new(r"\b(?:if|for|while|case|catch)\b|&&|\|\||\s\?\s")?,
        })
    }

    fn extract_includes(&self, content: &str) -> Vec<String> {
        let mut includes: Vec<String> = Vec::new();
        for captures in self.include.captures_iter(content) {
            if let Some(header) = captures.get(1) {
                let header = header.as_str().trim().to_string();
                if !includes.contains(&header) {
                    includes.push(header);
                }
            }
        }
        includes
    }

    fn extract_functions(&self, content: &str) -> Vec<Element> {
        self.function
            .captures_iter(content)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let qualified = captures.get(1)?.as_str();
                // `Widget::draw` is named `draw`
                let name = qualified.rsplit("::").next().unwrap_or(qualified);
                if NOT_FUNCTIONS.contains(&name) {
                    return None;
                }
                let params: Vec<String> = captures
                    .get(2)
                    .map(|m| split_parameters(m.as_str()))
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|p| p != "void")
                    .collect();

                let body = brace_block(content, whole.end() - 1);
                let mut element = Element::new(ComponentType::Function, name);
                element.line_number = line_number_at(content, whole.start());
                element.lines = line_count(&content[whole.start()..whole.end() - 1]) + line_count(body) - 1;
                element.complexity = self.complexity.score(body, NestingStyle::Braces);
                element.description = Some(describe_function(name, params.len()));
                Some(element)
            })
            .collect()
    }

    fn extract_classes(&self, content: &str) -> Vec<Element> {
        self.class
            .captures_iter(content)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let keyword = captures.get(1)?.as_str();
                let name = captures.get(2)?.as_str();
                let parents: Vec<String> = captures
                    .get(3)
                    .map(|m| {
                        m.as_str()
                            .split(',')
                            .filter_map(|base| base.split_whitespace().last())
                            .map(|base| base.split('<').next().unwrap_or(base).to_string())
                            .filter(|base| !base.is_empty())
                            .collect()
                    })
                    .unwrap_or_default();

                let kind = if name.ends_with("Service") {
                    ComponentType::Service
                } else {
                    ComponentType::Class
                };

                let body = brace_block(content, whole.end() - 1);
                let mut element = Element::new(kind, name);
                element.line_number = line_number_at(content, whole.start());
                element.lines = line_count(body);
                element.complexity = self.complexity.score(body, NestingStyle::Braces);
                element.description = Some(match parents.first() {
                    Some(parent) => format!("{} {} deriving from {}", capitalize(keyword), name, parent),
                    None => format!("{} {}", capitalize(keyword), name),
                });
                element.dependencies = parents;
                Some(element)
            })
            .collect()
    }
}

impl LanguageParser for CFamilyParser {
    fn parse(&self, file: &SourceFile) -> Result<FileExtraction, ExtractError> {
        let content = strip_comments(&self.comments, &file.content);
        let content = content.as_ref();
        let language = file.language().unwrap_or(Language::C);
        let is_header = matches!(
            file.path.rsplit('.').next(),
            Some("h" | "hpp" | "hh" | "hxx")
        );

        let includes = self.extract_includes(content);
        let functions = self.extract_functions(content);
        let exports = if is_header {
            functions.iter().map(|f| f.name.clone()).collect()
        } else {
            Vec::new()
        };

        let mut elements = functions;
        elements.extend(self.extract_classes(content));
        elements.sort_by_key(|e| e.line_number);

        let mut module = Element::new(ComponentType::Module, file_name(&file.path));
        module.dependencies = includes.clone();
        module.imports = includes;
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

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str, content: &str) -> FileExtraction {
        CFamilyParser::new().unwrap().parse(&SourceFile::new(path, content)).unwrap()
    }

    #[test]
    fn includes_become_dependencies() {
        let extraction = parse("src/main.c", "#include <stdio.h>\n#include \"util.h\"\n#include \"util.h\"\n");
        assert_eq!(extraction.module.imports, vec!["stdio.h", "util.h"]);
        assert_eq!(extraction.module.dependencies, extraction.module.imports);
        assert_eq!(extraction.language, Language::C);
    }

    #[test]
    fn comment_openers_inside_strings_are_text() {
        let extraction = parse(
            "src/scan.c",
            "static const char *GLOB = \"src/*.c\";\nint scan(void) {\n  return 0;\n}\nstatic const char *END = \"*/\";\n",
        );
        let names: Vec<&str> = extraction.elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["scan"]);
        assert_eq!(extraction.elements[0].line_number, 2);
    }

    #[test]
    fn functions_with_bodies() {
        let extraction = parse(
            "src/main.c",
            "static int parse_args(int argc, char **argv) {\n  for (int i = 0; i < argc; i++) {\n    if (argv[i]) {}\n  }\n  return 0;\n}\nint main(void) {\n  return parse_args(0, 0);\n}\n",
        );
        let names: Vec<&str> = extraction.elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["parse_args", "main"]);
        assert_eq!(
            extraction.elements[0].description.as_deref(),
            Some("Parses args (2 parameters)")
        );
        assert_eq!(
            extraction.elements[1].description.as_deref(),
            Some("Function main (no parameters)")
        );
        assert!(extraction.elements[0].complexity > extraction.elements[1].complexity);
        assert!(extraction.module.exports.is_empty());
    }

    #[test]
    fn classes_and_structs_with_bases() {
        let extraction = parse(
            "include/shapes.hpp",
            "class Circle : public Shape, private Named {\npublic:\n  double area() const { return 0; }\n};\nstruct Point {\n  int x;\n};\n",
        );
        let circle = extraction.elements.iter().find(|e| e.name == "Circle").unwrap();
        assert_eq!(circle.kind, ComponentType::Class);
        assert_eq!(circle.dependencies, vec!["Shape", "Named"]);
        assert!(extraction.elements.iter().any(|e| e.name == "Point"));
        assert_eq!(extraction.language, Language::Cpp);
        assert_eq!(extraction.module.exports, vec!["area"]);
    }

    #[test]
    fn control_statements_are_not_functions() {
        let extraction = parse("a.c", "void run(void) {\n  while (x) {\n  }\n  if (y) {\n  }\n}\n");
        let names: Vec<&str> = extraction.elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["run"]);
    }
}
