use super::{
    describe_function, file_name, indented_block, line_count, line_number_at, split_parameters, ComplexityRules,
    Element, FileExtraction, LanguageParser, NestingStyle,
};
use crate::error::ExtractError;
use crate::file_discovery::{Language, SourceFile};
use crate::model::ComponentType;
use regex::Regex;

pub struct PythonParser {
    import: Regex,
    from_import: Regex,
    function: Regex,
    class: Regex,
    all_list: Regex,
    top_level_name: Regex,
    comments: Regex,
    complexity: ComplexityRules,
}

impl PythonParser {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            import: Regex::new(r"(?m)^[ \t]*import[ \t]+([\w.]+(?:[ \t]+as[ \t]+\w+)?(?:[ \t]*,[ \t]*[\w.]+(?:[ \t]+as[ \t]+\w+)?)*)")?,
            from_import: Regex::new(r"(?m)^[ \t]*from[ \t]+(\.*[\w.]*)[ \t]+import[ \t]+")?,
            function: Regex::new(r"(?m)^([ \t]*)(?:async[ \t]+)?def[ \t]+(\w+)[ \t]*\(([^)]*)\)")?,
            class: Regex::new(r"(?m)^([ \t]*)class[ \t]+(\w+)[ \t]*(?:\(([^)]*)\))?[ \t]*:")?,
            all_list: Regex::new(r"(?s)__all__\s*=\s*[\[(](.*?)[\])]")?,
            top_level_name: Regex::new(r"(?m)^(?:async[ \t]+)?(?:def|class)[ \t]+([A-Za-z]\w*)")?,
            comments: Regex::new(r"(?m)^[ \t]*#[^\n]*$")?,
            complexity: ComplexityRules::new(r"\b(?:if|elif|for|while|except|and|or)\b")?,
        })
    }

    fn extract_imports(&self, content: &str) -> Vec<String> {
        let mut imports: Vec<(usize, String)> = Vec::new();

        for captures in self.import.captures_iter(content) {
            let Some(list) = captures.get(1) else { continue };
            for item in list.as_str().split(',') {
                // `import a.b as c` depends on `a.b`
                if let Some(module) = item.split_whitespace().next() {
                    imports.push((list.start(), module.to_string()));
                }
            }
        }
        for captures in self.from_import.captures_iter(content) {
            if let Some(module) = captures.get(1).filter(|m| !m.as_str().is_empty()) {
                imports.push((module.start(), module.as_str().to_string()));
            }
        }

        imports.sort_by_key(|(offset, _)| *offset);
        let mut unique: Vec<String> = Vec::new();
        for (_, module) in imports {
            if !unique.contains(&module) {
                unique.push(module);
            }
        }
        unique
    }

    fn extract_exports(&self, content: &str) -> Vec<String> {
        if let Some(list) = self.all_list.captures(content).and_then(|c| c.get(1)) {
            return list
                .as_str()
                .split(',')
                .map(|name| name.trim().trim_matches(['"', '\'']).to_string())
                .filter(|name| !name.is_empty())
                .collect();
        }

        self.top_level_name
            .captures_iter(content)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn extract_functions(&self, content: &str) -> Vec<Element> {
        self.function
            .captures_iter(content)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let name = captures.get(2)?.as_str();
                let params: Vec<String> = captures
                    .get(3)
                    .map(|m| split_parameters(m.as_str()))
                    .unwrap_or_default()
                    .into_iter()
                    .map(|p| p.trim_start_matches('*').to_string())
                    .filter(|p| p != "self" && p != "cls" && p != "/" && !p.is_empty())
                    .collect();

                let body = indented_block(content, whole.start());
                let mut element = Element::new(ComponentType::Function, name);
                element.line_number = line_number_at(content, whole.start());
                element.lines = line_count(body);
                element.complexity = self.complexity.score(body, NestingStyle::Indentation);
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
                let name = captures.get(2)?.as_str();
                let bases: Vec<String> = captures
                    .get(3)
                    .map(|m| {
                        m.as_str()
                            .split(',')
                            .map(str::trim)
                            .filter(|b| !b.is_empty() && !b.contains('=') && *b != "object")
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();

                let kind = if name.ends_with("Service") {
                    ComponentType::Service
                } else {
                    ComponentType::Class
                };

                let body = indented_block(content, whole.start());
                let mut element = Element::new(kind, name);
                element.line_number = line_number_at(content, whole.start());
                element.lines = line_count(body);
                element.complexity = self.complexity.score(body, NestingStyle::Indentation);
                element.description = Some(match bases.first() {
                    Some(base) => format!("Class {} extending {}", name, base),
                    None => format!("Class {}", name),
                });
                element.dependencies = bases;
                Some(element)
            })
            .collect()
    }
}

impl LanguageParser for PythonParser {
    fn parse(&self, file: &SourceFile) -> Result<FileExtraction, ExtractError> {
        let content = self.comments.replace_all(&file.content, "");
        let content = content.as_ref();

        let imports = self.extract_imports(content);
        let mut elements = self.extract_functions(content);
        elements.extend(self.extract_classes(content));
        elements.sort_by_key(|e| e.line_number);

        let mut module = Element::new(ComponentType::Module, file_name(&file.path));
        module.dependencies = imports.clone();
        module.imports = imports;
        module.exports = self.extract_exports(content);
        module.lines = line_count(&file.content);
        module.complexity = self.complexity.score(content, NestingStyle::Indentation);

        Ok(FileExtraction {
            file: file.path.clone(),
            language: Language::Python,
            module,
            elements,
        })
    }
}
