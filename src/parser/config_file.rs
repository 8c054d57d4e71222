use super::{file_name, line_count, Element, FileExtraction, LanguageParser};
use crate::error::ExtractError;
use crate::file_discovery::{Language, SourceFile};
use crate::model::ComponentType;
use serde_json::Value;

const DEPENDENCY_SECTIONS: [&str; 4] = [
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

/// JSON configuration files; package manifests contribute their declared packages.
pub struct ConfigParser;

impl ConfigParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConfigParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for ConfigParser {
    fn parse(&self, file: &SourceFile) -> Result<FileExtraction, ExtractError> {
        let value: Value = serde_json::from_str(&file.content).map_err(|source| ExtractError::InvalidConfig {
            path: file.path.clone(),
            source,
        })?;

        let mut dependencies: Vec<String> = Vec::new();
        for section in DEPENDENCY_SECTIONS {
            if let Some(Value::Object(entries)) = value.get(section) {
                for name in entries.keys() {
                    if !dependencies.contains(name) {
                        dependencies.push(name.clone());
                    }
                }
            }
        }

        let top_level_keys = match &value {
            Value::Object(map) => map.len() as u32,
            _ => 0,
        };

        let mut module = Element::new(ComponentType::Config, file_name(&file.path));
        module.imports = dependencies.clone();
        module.dependencies = dependencies;
        module.lines = line_count(&file.content);
        module.complexity = top_level_keys.max(1);
        module.description = Some(match value.get("name").and_then(Value::as_str) {
            Some(name) => format!("Package manifest for {}", name),
            None => format!("Configuration {}", file_name(&file.path)),
        });

        Ok(FileExtraction {
            file: file.path.clone(),
            language: Language::Json,
            module,
            elements: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_dependency_section() {
        let manifest = r#"{
            "name": "web",
            "dependencies": { "react": "^18.0.0", "lodash": "4" },
            "devDependencies": { "jest": "29", "react": "^18.0.0" },
            "peerDependencies": { "react-dom": "18" }
        }"#;
        let extraction = ConfigParser::new().parse(&SourceFile::new("package.json", manifest)).unwrap();

        assert_eq!(extraction.module.kind, ComponentType::Config);
        assert_eq!(extraction.module.dependencies, vec!["lodash", "react", "jest", "react-dom"]);
        assert_eq!(extraction.module.description.as_deref(), Some("Package manifest for web"));
        assert!(extraction.elements.is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        let result = ConfigParser::new().parse(&SourceFile::new("tsconfig.json", "{ not json"));
        assert!(matches!(result, Err(ExtractError::InvalidConfig { .. })));
    }

    #[test]
    fn plain_config_has_no_dependencies() {
        let extraction = ConfigParser::new()
            .parse(&SourceFile::new("config/settings.json", "[1, 2, 3]"))
            .unwrap();
        assert!(extraction.module.dependencies.is_empty());
        assert_eq!(extraction.module.complexity, 1);
    }
}
