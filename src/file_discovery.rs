use crate::config::Config;
use crate::error::{AnalysisError, FetchError};
use async_trait::async_trait;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    C,
    Cpp,
    Json,
    Css,
    Html,
    Markdown,
    Yaml,
}

impl Language {
    pub fn from_path(path: &str) -> Option<Self> {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_lowercase())?;

        match extension.as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "tsx" | "mts" | "cts" => Some(Language::TypeScript),
            "py" | "pyw" => Some(Language::Python),
            "c" | "h" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some(Language::Cpp),
            "json" => Some(Language::Json),
            "css" | "scss" | "sass" | "less" => Some(Language::Css),
            "html" | "htm" => Some(Language::Html),
            "md" | "markdown" => Some(Language::Markdown),
            "yaml" | "yml" => Some(Language::Yaml),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Json => "json",
            Language::Css => "css",
            Language::Html => "html",
            Language::Markdown => "markdown",
            Language::Yaml => "yaml",
        }
    }
}

/// A source file with its text already decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
    pub size: u64,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            size: content.len() as u64,
            content,
        }
    }

    pub fn language(&self) -> Option<Language> {
        Language::from_path(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceContent {
    Loaded(String),
    /// Content must be pulled through a [`ContentFetcher`].
    Deferred,
}

/// One node of an input tree, as handed over by an upload or a remote listing.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceNode {
    File {
        path: String,
        size: u64,
        content: SourceContent,
    },
    Directory {
        path: String,
        children: Vec<SourceNode>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanEntry {
    pub path: String,
    pub size: u64,
    pub language: Language,
    pub content: SourceContent,
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<String, FetchError>;
}

pub struct SourceScanner {
    ignore_directories: HashSet<String>,
    ignore_files: HashSet<String>,
    file_extensions: HashSet<String>,
    max_file_size: u64,
}

impl SourceScanner {
    pub fn new(config: &Config) -> Self {
        Self {
            ignore_directories: config.ignore_directories.iter().cloned().collect(),
            ignore_files: config.ignore_files.iter().cloned().collect(),
            file_extensions: config.file_extensions.iter().map(|e| e.to_lowercase()).collect(),
            max_file_size: config.max_file_size as u64,
        }
    }

    /// Flatten a nested input tree into the supported, non-ignored files.
    pub fn flatten(&self, nodes: Vec<SourceNode>) -> Vec<ScanEntry> {
        let mut entries = Vec::new();
        for node in nodes {
            self.flatten_into(node, &mut entries);
        }
        entries
    }

    fn flatten_into(&self, node: SourceNode, entries: &mut Vec<ScanEntry>) {
        match node {
            SourceNode::Directory { path, children } => {
                let dir_name = path.rsplit('/').next().unwrap_or(&path);
                if self.ignore_directories.contains(dir_name) {
                    debug!(path = %path, "skipping ignored directory");
                    return;
                }
                for child in children {
                    self.flatten_into(child, entries);
                }
            }
            SourceNode::File { path, size, content } => {
                if let Some(language) = self.accept(&path, size) {
                    entries.push(ScanEntry {
                        path,
                        size,
                        language,
                        content,
                    });
                }
            }
        }
    }

    /// Filter an already-loaded flat list of files.
    pub fn scan_loaded(&self, files: Vec<SourceFile>) -> Vec<SourceFile> {
        files
            .into_iter()
            .filter(|file| self.accept(&file.path, file.size).is_some())
            .collect()
    }

    /// Returns the language when the path should be analyzed.
    pub fn accept(&self, path: &str, size: u64) -> Option<Language> {
        if self.should_ignore_file(path) || size > self.max_file_size {
            return None;
        }

        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_lowercase())?;
        if !self.file_extensions.contains(&extension) {
            return None;
        }

        Language::from_path(path)
    }

    fn should_ignore_file(&self, path: &str) -> bool {
        let normalized = path.replace('\\', "/");
        let mut segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        let Some(file_name) = segments.pop() else {
            return true;
        };

        if segments.iter().any(|segment| self.ignore_directories.contains(*segment)) {
            return true;
        }
        if self.ignore_files.contains(file_name) {
            return true;
        }

        // Minified bundles and source maps are build output, not source.
        file_name.contains(".min.") || file_name.ends_with(".map") || file_name.ends_with(".d.ts")
    }

    /// Walk a local directory, honouring .gitignore like the rest of the ecosystem.
    pub fn discover_directory(&self, root: &Path) -> Result<Vec<SourceFile>, AnalysisError> {
        let mut files = Vec::new();

        let mut walker_builder = WalkBuilder::new(root);
        walker_builder
            .standard_filters(true)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true);

        for result in walker_builder.build() {
            let entry = result?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(root).unwrap_or(path);
            let relative = relative.to_string_lossy().replace('\\', "/");
            let size = fs::metadata(path)?.len();
            if self.accept(&relative, size).is_none() {
                continue;
            }

            match fs::read_to_string(path) {
                Ok(content) => files.push(SourceFile {
                    path: relative,
                    content,
                    size,
                }),
                Err(e) => warn!(path = %relative, error = %e, "skipping unreadable file"),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Load every deferred entry through `fetcher`, at most `concurrency` at a time.
    ///
    /// Missing files and transport errors drop the file. A rate limit stops new
    /// fetches and is returned to the caller.
    pub async fn resolve_deferred(
        &self,
        entries: Vec<ScanEntry>,
        fetcher: Arc<dyn ContentFetcher>,
        concurrency: usize,
    ) -> Result<Vec<SourceFile>, FetchError> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let halted = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();
        let mut resolved: Vec<(usize, SourceFile)> = Vec::new();

        for (index, entry) in entries.into_iter().enumerate() {
            let ScanEntry { path, size, content, .. } = entry;
            match content {
                SourceContent::Loaded(content) => resolved.push((index, SourceFile { path, content, size })),
                SourceContent::Deferred => {
                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        break;
                    };
                    if halted.load(Ordering::SeqCst) {
                        break;
                    }

                    let fetcher = fetcher.clone();
                    let halted = halted.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        let result = fetcher.fetch(&path).await;
                        if let Err(ref e) = result {
                            if e.halts_run() {
                                halted.store(true, Ordering::SeqCst);
                            }
                        }
                        (index, path, size, result)
                    });
                }
            }
        }

        let mut rate_limit = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, path, size, Ok(content))) => resolved.push((index, SourceFile { path, content, size })),
                Ok((_, _, _, Err(e))) if e.halts_run() => {
                    warn!(error = %e, "rate limited, no further fetches this run");
                    tasks.abort_all();
                    rate_limit.get_or_insert(e);
                }
                Ok((_, path, _, Err(e))) => warn!(path = %path, error = %e, "skipping file that could not be fetched"),
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!(error = %e, "fetch task failed"),
            }
        }

        if let Some(e) = rate_limit {
            return Err(e);
        }

        resolved.sort_by_key(|(index, _)| *index);
        Ok(resolved.into_iter().map(|(_, file)| file).collect())
    }

    pub fn get_stats(&self, files: &[SourceFile]) -> FileStats {
        let mut stats = FileStats::default();

        for file in files {
            stats.total_files += 1;
            stats.total_size += file.size;

            if let Some(language) = file.language() {
                *stats.languages.entry(language.name().to_string()).or_insert(0) += 1;
            }
        }

        stats
    }
}

#[derive(Debug, Default)]
pub struct FileStats {
    pub total_files: usize,
    pub total_size: u64,
    pub languages: HashMap<String, usize>,
}

impl FileStats {
    /// Languages ordered by file count, most common first.
    pub fn main_languages(&self, limit: usize) -> Vec<String> {
        let mut langs: Vec<_> = self.languages.iter().collect();
        langs.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        langs.into_iter().take(limit).map(|(lang, _)| lang.clone()).collect()
    }

    pub fn print_summary(&self) {
        println!("File Discovery Summary:");
        println!("  Total files: {}", self.total_files);
        println!("  Total size: {:.2} MB", self.total_size as f64 / (1024.0 * 1024.0));
        println!("  Languages:");

        let mut langs: Vec<_> = self.languages.iter().collect();
        langs.sort_by(|a, b| b.1.cmp(a.1));

        for (lang, count) in langs {
            println!("    {}: {} files", lang, count);
        }
    }
}
