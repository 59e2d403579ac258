//! Change analysis orchestration
//!
//! Ties the collaborators together for one run:
//! 1. load the project's node set and build the dependency graph
//! 2. list changed model files
//! 3. extract and diff each file's schema at base and head
//! 4. look for dependency cycles
//!
//! Problems confined to one file, or to the graph, become warnings and the
//! run continues. Only an unreadable repository aborts it.

use std::time::{Duration, Instant};

use breakcheck_core::{
    AllowlistRules, AnalysisWarning, ChangeRecord, Config, Report, WarningKind,
};
use breakcheck_dbt::{DependencyGraph, NodeSource};
use breakcheck_sql::{SchemaExtractor, TemplateContext, TemplateRenderer};
use breakcheck_vcs::{VcsError, VersionControl};

use crate::schema_diff::SchemaDiff;

/// Subject used for warnings about the manifest
pub const MANIFEST_SUBJECT: &str = "manifest";

/// Errors that abort an analysis run
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("Repository access failed: {0}")]
    Repository(#[from] VcsError),
}

/// Everything one run found
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisOutcome {
    /// Per-file records in file order, then cycles in discovery order
    pub breaking_changes: Vec<ChangeRecord>,

    pub warnings: Vec<AnalysisWarning>,

    /// Changed files that were extracted and diffed
    pub files_analyzed: usize,

    /// Whether the dependency graph could be built
    pub graph_analyzed: bool,
}

impl AnalysisOutcome {
    pub fn has_breaking_changes(&self) -> bool {
        !self.breaking_changes.is_empty()
    }

    pub fn into_report(self) -> Report {
        Report::new(
            self.breaking_changes,
            self.warnings,
            self.files_analyzed,
            self.graph_analyzed,
        )
    }
}

/// Runs breaking change detection over injected collaborators
pub struct ChangeAnalyzer<'a> {
    vcs: &'a dyn VersionControl,
    nodes: &'a dyn NodeSource,
    extractor: SchemaExtractor,
    allowlist: AllowlistRules,
    time_budget: Option<Duration>,
}

impl<'a> ChangeAnalyzer<'a> {
    pub fn new(vcs: &'a dyn VersionControl, nodes: &'a dyn NodeSource) -> Self {
        Self {
            vcs,
            nodes,
            extractor: SchemaExtractor::new(),
            allowlist: AllowlistRules::default(),
            time_budget: None,
        }
    }

    /// Analyzer set up from a project config (dialect, vars, skip rules, budget)
    pub fn from_config(
        vcs: &'a dyn VersionControl,
        nodes: &'a dyn NodeSource,
        config: &Config,
    ) -> Self {
        let context = TemplateContext {
            vars: config.template_vars(),
            ..TemplateContext::default()
        };
        let extractor = SchemaExtractor::from_dialect(&config.dialect)
            .with_renderer(TemplateRenderer::new(context));

        let mut analyzer = Self::new(vcs, nodes)
            .with_extractor(extractor)
            .with_allowlist(config.allowlist.clone());

        if let Some(secs) = config.time_budget_secs {
            analyzer = analyzer.with_time_budget(Duration::from_secs(secs));
        }

        analyzer
    }

    pub fn with_extractor(mut self, extractor: SchemaExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_allowlist(mut self, allowlist: AllowlistRules) -> Self {
        self.allowlist = allowlist;
        self
    }

    /// Stop diffing new files once `budget` has elapsed
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Run the analysis
    pub fn analyze(&self) -> Result<AnalysisOutcome, AnalyzeError> {
        let deadline = self.time_budget.map(|budget| Instant::now() + budget);
        let mut outcome = AnalysisOutcome::default();

        let graph = match self.nodes.load_nodes() {
            Ok(nodes) => Some(DependencyGraph::build(&nodes)),
            Err(err) => {
                tracing::warn!(error = %err, "skipping dependency analysis");
                outcome.warnings.push(AnalysisWarning::new(
                    MANIFEST_SUBJECT,
                    WarningKind::GraphSkipped,
                    err.to_string(),
                ));
                None
            }
        };
        outcome.graph_analyzed = graph.is_some();

        let changed_files = self.vcs.list_changed_files()?;
        tracing::info!(
            backend = self.vcs.name(),
            files = changed_files.len(),
            "analyzing changed model files"
        );

        for (index, path) in changed_files.iter().enumerate() {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                let remaining = changed_files.len() - index;
                tracing::warn!(remaining, "time budget exceeded");
                outcome.warnings.push(AnalysisWarning::new(
                    path.as_str(),
                    WarningKind::TimeBudgetExceeded,
                    format!("time budget exceeded, {} changed file(s) not analyzed", remaining),
                ));
                break;
            }

            if self.allowlist.is_model_skipped(path) {
                tracing::debug!(file = %path, "skipped by allowlist");
                outcome.warnings.push(AnalysisWarning::new(
                    path.as_str(),
                    WarningKind::Skipped,
                    "matches a skip_models pattern",
                ));
                continue;
            }

            match self.analyze_file(path, graph.as_ref())? {
                Ok(records) => {
                    outcome.files_analyzed += 1;
                    outcome.breaking_changes.extend(records);
                }
                Err(warning) => outcome.warnings.push(warning),
            }
        }

        if let Some(graph) = &graph {
            for cycle in graph.find_cycles() {
                tracing::debug!(cycle = ?cycle, "dependency cycle");
                outcome.breaking_changes.push(ChangeRecord::cyclic_dependency(cycle));
            }
        }

        tracing::info!(
            breaking_changes = outcome.breaking_changes.len(),
            warnings = outcome.warnings.len(),
            "analysis complete"
        );

        Ok(outcome)
    }

    /// Diff one file; the inner error is an isolated per-file failure
    fn analyze_file(
        &self,
        path: &str,
        graph: Option<&DependencyGraph>,
    ) -> Result<Result<Vec<ChangeRecord>, AnalysisWarning>, VcsError> {
        let old_text = self.vcs.read_at_base(path)?;
        let new_text = self.vcs.read_at_head(path)?;

        let schemas = self
            .extractor
            .extract(&old_text)
            .and_then(|old| self.extractor.extract(&new_text).map(|new| (old, new)));

        let (old, new) = match schemas {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(file = %path, error = %err, "could not parse model");
                return Ok(Err(AnalysisWarning::new(
                    path,
                    WarningKind::ParseFailure,
                    err.to_string(),
                )));
            }
        };

        let affected: Vec<String> = graph
            .map(|graph| graph.affected_by(graph.nodes_for_file(path)).into_iter().collect())
            .unwrap_or_default();

        let records = SchemaDiff::compare(path, &old, &new, &affected);
        tracing::debug!(file = %path, changes = records.len(), "diffed model");

        Ok(Ok(records))
    }
}

/// Impact of changing a single model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelImpact {
    /// Resolved unique id
    pub model: String,

    /// Direct dependents
    pub children: Vec<String>,

    /// All downstream models, breadth-first
    pub downstream: Vec<String>,

    /// Cycles the model takes part in
    pub cycles: Vec<Vec<String>>,
}

/// Downstream impact of one model, looked up by unique id or short name
pub fn model_impact(
    nodes: &dyn NodeSource,
    model: &str,
) -> Result<Option<ModelImpact>, breakcheck_dbt::ManifestError> {
    let graph = DependencyGraph::build(&nodes.load_nodes()?);

    let Some(id) = graph.resolve(model) else {
        return Ok(None);
    };

    Ok(Some(ModelImpact {
        model: id.to_string(),
        children: graph.children(id).into_iter().map(str::to_string).collect(),
        downstream: graph.downstream(id),
        cycles: graph
            .find_cycles()
            .into_iter()
            .filter(|cycle| cycle.iter().any(|member| member == id))
            .collect(),
    }))
}
