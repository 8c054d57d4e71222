use crate::{
    boundary::group_by_layer,
    config::Config,
    dependency_graph::{DependencyAnalysis, GraphBuilder},
    file_discovery::{ContentFetcher, FileStats, SourceFile, SourceNode, SourceScanner},
    model::{ArchitectureData, ArchitectureMetadata},
    parser::{ExtractedComponent, ParserRegistry},
    progress::{ProgressReporter, ProgressSink, Stage},
    remote::{RemoteClient, RepositoryRef},
};
use crate::error::AnalysisError;
use crate::Result;
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Languages listed in the metadata.
const MAIN_LANGUAGES: usize = 3;

/// Runs scan → extract → resolve → group.
///
/// Holds only configuration and the read-only parser table, so one instance
/// can serve any number of concurrent runs; everything a run accumulates
/// lives in its own [`RunContext`].
pub struct Analyzer {
    config: Config,
    registry: ParserRegistry,
}

/// Result of one run: the frozen snapshot plus what was learned on the way.
#[derive(Debug)]
pub struct Analysis {
    pub data: ArchitectureData,
    pub dependencies: DependencyAnalysis,
    pub stats: FileStats,
    /// Files whose extraction failed; they contribute no components.
    pub skipped_files: Vec<String>,
}

struct RunContext<'a> {
    source_identifier: String,
    progress: ProgressReporter<'a>,
    graph: GraphBuilder,
}

impl<'a> RunContext<'a> {
    fn new(source_identifier: impl Into<String>, sink: &'a dyn ProgressSink) -> Self {
        Self {
            source_identifier: source_identifier.into(),
            progress: ProgressReporter::new(sink),
            graph: GraphBuilder::new(),
        }
    }
}

impl Analyzer {
    pub fn new(config: Config) -> Result<Self> {
        let registry = ParserRegistry::new()?;
        Ok(Self { config, registry })
    }

    /// Use a custom parser table, e.g. with one language's strategy swapped out.
    pub fn with_registry(config: Config, registry: ParserRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Analyze files already in memory.
    pub fn analyze_files(
        &self,
        files: Vec<SourceFile>,
        source_identifier: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Analysis> {
        let mut run = RunContext::new(source_identifier, sink);
        run.progress.stage(Stage::Fetching, "Collecting files");

        let scanner = SourceScanner::new(&self.config);
        let files = scanner.scan_loaded(files);
        self.run_pipeline(&mut run, &scanner, files)
    }

    /// Walk a local directory and analyze what it holds.
    pub fn analyze_directory(&self, root: &Path, sink: &dyn ProgressSink) -> Result<Analysis> {
        let mut run = RunContext::new(root.display().to_string(), sink);
        run.progress.stage(Stage::Fetching, format!("Scanning {}", root.display()));

        let scanner = SourceScanner::new(&self.config);
        let files = scanner.discover_directory(root)?;
        self.run_pipeline(&mut run, &scanner, files)
    }

    /// Analyze a nested tree whose file contents may still need fetching.
    pub async fn analyze_tree(
        &self,
        nodes: Vec<SourceNode>,
        fetcher: Arc<dyn ContentFetcher>,
        source_identifier: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Analysis> {
        let mut run = RunContext::new(source_identifier, sink);
        run.progress.stage(Stage::Fetching, "Fetching file contents");

        let scanner = SourceScanner::new(&self.config);
        let entries = scanner.flatten(nodes);
        let total = entries.len();
        let files = scanner
            .resolve_deferred(entries, fetcher, self.config.remote.concurrency)
            .await
            .map_err(AnalysisError::from)?;

        if files.len() < total {
            warn!(fetched = files.len(), listed = total, "some files could not be fetched");
        }
        run.progress.step(Stage::Fetching, 1, 1, format!("Fetched {} files", files.len()), None);
        self.run_pipeline(&mut run, &scanner, files)
    }

    /// List and fetch a hosted repository, then analyze it.
    ///
    /// Failing to list the tree ends the run; a missing file does not.
    pub async fn analyze_remote(&self, repo: RepositoryRef, sink: &dyn ProgressSink) -> Result<Analysis> {
        let progress = ProgressReporter::new(sink);
        progress.stage(Stage::Fetching, format!("Listing {}", repo));

        let client = RemoteClient::new(&self.config.remote, repo.clone())?;
        let tree = client.fetch_tree().await.map_err(AnalysisError::from)?;
        let fetcher: Arc<dyn ContentFetcher> = Arc::new(client.content_fetcher(&tree.branch));

        let identifier = format!("{}/{}@{}", repo.owner, repo.name, tree.branch);
        self.analyze_tree(tree.nodes, fetcher, &identifier, sink).await
    }

    fn run_pipeline(&self, run: &mut RunContext<'_>, scanner: &SourceScanner, files: Vec<SourceFile>) -> Result<Analysis> {
        let stats = scanner.get_stats(&files);
        info!(files = stats.total_files, bytes = stats.total_size, source = %run.source_identifier, "starting analysis");

        run.progress.stage(Stage::Parsing, format!("Extracting {} files", files.len()));
        let (extracted, skipped_files) = self.extract_all(&files, &run.progress)?;

        run.progress.stage(Stage::Analyzing, "Resolving dependencies");
        let resolved = run.graph.build(extracted);
        let dependencies = run.graph.analyze_dependencies();

        run.progress.stage(Stage::Generating, "Grouping components by layer");
        let boundaries = group_by_layer(&resolved.components);

        let data = ArchitectureData {
            metadata: ArchitectureMetadata {
                total_files: files.len(),
                total_components: resolved.components.len(),
                analysis_date: chrono::Utc::now().to_rfc3339(),
                source_identifier: run.source_identifier.clone(),
                main_languages: stats.main_languages(MAIN_LANGUAGES),
            },
            components: resolved.components,
            boundaries,
            relationships: resolved.relationships,
        };

        info!(
            components = data.components.len(),
            relationships = data.relationships.len(),
            boundaries = data.boundaries.len(),
            skipped = skipped_files.len(),
            "analysis complete"
        );
        run.progress.complete(format!(
            "Found {} components and {} relationships",
            data.components.len(),
            data.relationships.len()
        ));

        Ok(Analysis {
            data,
            dependencies,
            stats,
            skipped_files,
        })
    }

    /// Extract every file, on a worker pool when allowed. Output keeps input order.
    fn extract_all(
        &self,
        files: &[SourceFile],
        progress: &ProgressReporter<'_>,
    ) -> std::result::Result<(Vec<ExtractedComponent>, Vec<String>), AnalysisError> {
        let total = files.len();
        let done = AtomicUsize::new(0);

        let extract = |file: &SourceFile| -> std::result::Result<Vec<ExtractedComponent>, String> {
            let outcome = match self.registry.parse(file) {
                None => {
                    debug!(path = %file.path, "no extractor for file");
                    Ok(Vec::new())
                }
                Some(Ok(extraction)) => Ok(extraction.into_components()),
                Some(Err(e)) => {
                    warn!(path = %file.path, error = %e, "extraction failed, file contributes no components");
                    Err(file.path.clone())
                }
            };

            let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
            progress.step(Stage::Parsing, finished, total, "Extracting components", Some(file.path.as_str()));
            outcome
        };

        let workers = self.worker_count(total);
        let per_file: Vec<_> = if workers > 1 {
            debug!(workers, files = total, "extracting on worker pool");
            let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
            pool.install(|| files.par_iter().map(extract).collect())
        } else {
            files.iter().map(extract).collect()
        };

        let mut components = Vec::new();
        let mut skipped = Vec::new();
        for outcome in per_file {
            match outcome {
                Ok(mut extracted) => components.append(&mut extracted),
                Err(path) => skipped.push(path),
            }
        }
        Ok((components, skipped))
    }

    fn worker_count(&self, files: usize) -> usize {
        if !self.config.analysis.parallel {
            return 1;
        }
        let cpus = rayon::current_num_threads();
        let cap = match self.config.analysis.max_threads {
            0 => cpus,
            max => max.min(cpus),
        };
        files.min(cap).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractError, FetchError};
    use crate::file_discovery::{Language, SourceContent};
    use crate::model::{ComponentType, Layer, RelationshipType};
    use crate::parser::{Element, FileExtraction, LanguageParser};
    use crate::progress::{NoProgress, ProgressUpdate};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn analyzer() -> Analyzer {
        Analyzer::new(Config::default()).unwrap()
    }

    struct MapFetcher {
        files: HashMap<String, std::result::Result<String, FetchError>>,
    }

    #[async_trait]
    impl ContentFetcher for MapFetcher {
        async fn fetch(&self, path: &str) -> std::result::Result<String, FetchError> {
            self.files
                .get(path)
                .cloned()
                .unwrap_or_else(|| Err(FetchError::NotFound(path.to_string())))
        }
    }

    fn deferred(path: &str) -> SourceNode {
        SourceNode::File {
            path: path.to_string(),
            size: 10,
            content: SourceContent::Deferred,
        }
    }

    #[test]
    fn analyzes_in_memory_files() {
        let files = vec![
            SourceFile::new("src/components/App.tsx", "import { api } from '../services/api';\nexport function App() { return <div/>; }\n"),
            SourceFile::new("src/services/api.ts", "export const api = () => fetch('/x');\n"),
            SourceFile::new("node_modules/x/index.js", "module.exports = 1;"),
        ];
        let analysis = analyzer().analyze_files(files, "upload", &NoProgress).unwrap();

        assert_eq!(analysis.data.metadata.total_files, 2);
        assert_eq!(analysis.data.metadata.source_identifier, "upload");
        assert_eq!(analysis.data.metadata.main_languages, vec!["typescript"]);
        assert!(analysis
            .data
            .relationships
            .iter()
            .any(|r| r.relationship_type == RelationshipType::Imports));
        assert_eq!(analysis.data.boundaries[0].id, Layer::Presentation.as_str());
        assert!(analysis.skipped_files.is_empty());
    }

    struct HeadingsOnly;

    impl LanguageParser for HeadingsOnly {
        fn parse(&self, file: &SourceFile) -> std::result::Result<FileExtraction, ExtractError> {
            let elements = file
                .content
                .lines()
                .filter_map(|line| line.strip_prefix("# "))
                .map(|title| Element::new(ComponentType::Module, title.trim()))
                .collect();
            Ok(FileExtraction {
                file: file.path.clone(),
                language: Language::Markdown,
                module: Element::new(ComponentType::Module, file.path.clone()),
                elements,
            })
        }
    }

    #[test]
    fn registered_parser_replaces_the_builtin_one() {
        let mut registry = ParserRegistry::new().unwrap();
        registry.register(Language::Markdown, Arc::new(HeadingsOnly));
        let analyzer = Analyzer::with_registry(Config::default(), registry);

        let files = vec![SourceFile::new("README.md", "# Intro\ntext\n## Ignored\n# Usage\n")];
        let analysis = analyzer.analyze_files(files, "docs", &NoProgress).unwrap();

        let names: Vec<&str> = analysis.data.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["README.md", "Intro", "Usage"]);
    }

    #[test]
    fn broken_config_file_is_skipped_not_fatal() {
        let files = vec![
            SourceFile::new("package.json", "{ not json"),
            SourceFile::new("index.js", "function main() {}\n"),
        ];
        let analysis = analyzer().analyze_files(files, "upload", &NoProgress).unwrap();

        assert_eq!(analysis.skipped_files, vec!["package.json"]);
        assert!(analysis.data.components.iter().all(|c| c.file == "index.js"));
        assert_eq!(analysis.data.metadata.total_files, 2);
    }

    #[test]
    fn serial_and_parallel_runs_agree() {
        let files: Vec<SourceFile> = (0..24)
            .map(|i| SourceFile::new(format!("src/lib/m{}.js", i), format!("import './m{}';\nfunction f{}() {{}}\n", (i + 1) % 24, i)))
            .collect();

        let mut serial = Config::default();
        serial.analysis.parallel = false;
        let a = Analyzer::new(serial).unwrap().analyze_files(files.clone(), "x", &NoProgress).unwrap();
        let b = analyzer().analyze_files(files, "x", &NoProgress).unwrap();

        assert_eq!(a.data.components, b.data.components);
        assert_eq!(a.data.relationships, b.data.relationships);
        assert_eq!(a.data.boundaries, b.data.boundaries);
    }

    #[test]
    fn progress_reports_every_file_in_order() {
        let seen = Mutex::new(Vec::new());
        let sink = |update: &ProgressUpdate| seen.lock().unwrap().push(update.clone());
        let files = vec![
            SourceFile::new("a.js", "function a() {}"),
            SourceFile::new("b.js", "function b() {}"),
            SourceFile::new("c.py", "def c():\n    pass\n"),
        ];
        analyzer().analyze_files(files, "x", &sink).unwrap();

        let updates = seen.into_inner().unwrap();
        let per_file = updates.iter().filter(|u| u.current_file.is_some()).count();
        assert_eq!(per_file, 3);
        assert!(updates.windows(2).all(|w| w[0].progress <= w[1].progress && w[0].stage <= w[1].stage));
        let last = updates.last().unwrap();
        assert_eq!((last.stage, last.progress), (Stage::Complete, 100));
    }

    #[test]
    fn walks_a_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src/models")).unwrap();
        fs::create_dir_all(root.join("dist")).unwrap();
        fs::write(root.join("src/models/user.py"), "class User:\n    pass\n").unwrap();
        fs::write(root.join("dist/bundle.js"), "function x() {}").unwrap();

        let analysis = analyzer().analyze_directory(root, &NoProgress).unwrap();
        assert_eq!(analysis.data.metadata.total_files, 1);
        assert!(analysis.data.components.iter().all(|c| c.layer == Layer::Data));
        assert_eq!(analysis.data.boundaries.len(), 1);
    }

    #[tokio::test]
    async fn fetches_deferred_tree_and_drops_missing_files() {
        let fetcher = MapFetcher {
            files: HashMap::from([
                ("src/a.ts".to_string(), Ok("import { b } from './b';\n".to_string())),
                ("src/b.ts".to_string(), Ok("export const b = 1;\n".to_string())),
            ]),
        };
        let tree = vec![SourceNode::Directory {
            path: "src".to_string(),
            children: vec![deferred("src/a.ts"), deferred("src/b.ts"), deferred("src/gone.ts")],
        }];

        let analysis = analyzer()
            .analyze_tree(tree, Arc::new(fetcher), "acme/app@main", &NoProgress)
            .await
            .unwrap();
        assert_eq!(analysis.data.metadata.total_files, 2);
        assert_eq!(analysis.data.relationships.len(), 1);
    }

    #[tokio::test]
    async fn rate_limit_surfaces_as_error() {
        let fetcher = MapFetcher {
            files: HashMap::from([("a.ts".to_string(), Err(FetchError::RateLimited("a.ts".to_string())))]),
        };
        let err = analyzer()
            .analyze_tree(vec![deferred("a.ts")], Arc::new(fetcher), "acme/app", &NoProgress)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::Fetch(FetchError::RateLimited(_)))
        ));
    }
}
