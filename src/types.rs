//! Core data types for the retrieval and assembly pipeline.

use serde::Deserialize;
use serde::Serialize;

use crate::ids;

/// Structural kind of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpanKind {
    Function,
    Method,
    Class,
    Module,
    Block,
    Doc,
    ConfigSection,
    Other,
}

impl SpanKind {
    pub fn label(&self) -> &'static str {
        match self {
            SpanKind::Function => "function",
            SpanKind::Method => "method",
            SpanKind::Class => "class",
            SpanKind::Module => "module",
            SpanKind::Block => "block",
            SpanKind::Doc => "doc",
            SpanKind::ConfigSection => "config-section",
            SpanKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(SpanKind::Function),
            "method" => Some(SpanKind::Method),
            "class" => Some(SpanKind::Class),
            "module" => Some(SpanKind::Module),
            "block" => Some(SpanKind::Block),
            "doc" => Some(SpanKind::Doc),
            "config-section" => Some(SpanKind::ConfigSection),
            "other" => Some(SpanKind::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of a directed reference edge between spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefKind {
    Call,
    Import,
    TestOf,
    Routes,
    ConfigKey,
}

impl RefKind {
    pub fn label(&self) -> &'static str {
        match self {
            RefKind::Call => "call",
            RefKind::Import => "import",
            RefKind::TestOf => "test-of",
            RefKind::Routes => "routes",
            RefKind::ConfigKey => "config-key",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "call" => Some(RefKind::Call),
            "import" => Some(RefKind::Import),
            "test-of" => Some(RefKind::TestOf),
            "routes" => Some(RefKind::Routes),
            "config-key" => Some(RefKind::ConfigKey),
            _ => None,
        }
    }
}

/// Provenance of a reference edge. Determines its traversal confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefOrigin {
    Scip,
    Lsp,
    Heuristic,
}

impl RefOrigin {
    /// Edge confidence weight used by graph traversal ordering.
    pub fn confidence(&self) -> f32 {
        match self {
            RefOrigin::Scip => 1.0,
            RefOrigin::Lsp => 0.8,
            RefOrigin::Heuristic => 0.6,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RefOrigin::Scip => "scip",
            RefOrigin::Lsp => "lsp",
            RefOrigin::Heuristic => "heuristic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scip" => Some(RefOrigin::Scip),
            "lsp" => Some(RefOrigin::Lsp),
            "heuristic" => Some(RefOrigin::Heuristic),
            _ => None,
        }
    }
}

/// An indexed source file, unique on `(repo, path)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub repo: String,
    pub path: String,
    /// SHA-256 of the raw file bytes.
    pub content_hash: String,
    pub language: String,
}

impl FileRecord {
    pub fn new(
        repo: impl Into<String>,
        path: impl Into<String>,
        raw: &[u8],
        language: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            path: path.into(),
            content_hash: ids::file_content_hash(raw),
            language: language.into(),
        }
    }
}

/// An immutable structural region within a file.
///
/// Spans are produced by language adapters and replaced atomically whenever
/// the containing file's content hash changes. `byte_start..byte_end` is a
/// half-open byte range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanRecord {
    /// Stable content-addressed id (see `ids::span_id`).
    pub id: String,
    pub repo: String,
    pub path: String,
    pub byte_start: u64,
    pub byte_end: u64,
    pub kind: SpanKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Enclosing span names, outermost first.
    #[serde(default)]
    pub parents: Vec<String>,
}

impl SpanRecord {
    /// Build a span, deriving its id from the identity fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: impl Into<String>,
        path: impl Into<String>,
        byte_start: u64,
        byte_end: u64,
        kind: SpanKind,
        name: Option<String>,
        signature: Option<String>,
        doc: Option<String>,
        parents: Vec<String>,
    ) -> Self {
        let repo = repo.into();
        let path = path.into();
        let id = ids::span_id(
            &repo,
            &path,
            byte_start,
            byte_end,
            kind,
            name.as_deref(),
            signature.as_deref(),
            doc.as_deref(),
            &parents,
        );
        Self {
            id,
            repo,
            path,
            byte_start,
            byte_end,
            kind,
            name,
            signature,
            doc,
            parents,
        }
    }

    /// Byte length of the span.
    pub fn len(&self) -> u64 {
        self.byte_end.saturating_sub(self.byte_start)
    }

    pub fn is_empty(&self) -> bool {
        self.byte_start >= self.byte_end
    }
}

/// A materialized text slice derived from a span.
///
/// Owned by its span: removed when the span is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// `sha256(span_id|sha256(content))`.
    pub id: String,
    pub span_id: String,
    pub repo: String,
    pub path: String,
    pub content: String,
    /// Unix seconds.
    pub created_at: i64,
}

impl ChunkRecord {
    pub fn new(span: &SpanRecord, content: impl Into<String>, created_at: i64) -> Self {
        let content = content.into();
        Self {
            id: ids::chunk_id(&span.id, &content),
            span_id: span.id.clone(),
            repo: span.repo.clone(),
            path: span.path.clone(),
            content,
            created_at,
        }
    }
}

/// A stored embedding for one chunk under one model.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub chunk_id: String,
    pub model: String,
    pub dimension: usize,
    pub vector: Vec<f32>,
}

/// A directed reference edge from a span to a position in some file.
///
/// The target is a byte range, not a span id: the target side may not have
/// been indexed yet when the edge is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub src_span_id: String,
    pub dst_path: String,
    pub byte_start: u64,
    pub byte_end: u64,
    pub kind: RefKind,
    #[serde(default = "default_ref_origin")]
    pub origin: RefOrigin,
}

fn default_ref_origin() -> RefOrigin {
    RefOrigin::Heuristic
}

/// Visibility scope of a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryScope {
    Repo,
    Workspace,
    Global,
}

impl MemoryScope {
    pub fn label(&self) -> &'static str {
        match self {
            MemoryScope::Repo => "repo",
            MemoryScope::Workspace => "workspace",
            MemoryScope::Global => "global",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "repo" => Some(MemoryScope::Repo),
            "workspace" => Some(MemoryScope::Workspace),
            "global" => Some(MemoryScope::Global),
            _ => None,
        }
    }
}

/// Kind of a persisted memory note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryKind {
    Fact,
    Gotcha,
    Decision,
    Plan,
    Rule,
    NameAlias,
    Insight,
    Exemplar,
}

impl MemoryKind {
    pub fn label(&self) -> &'static str {
        match self {
            MemoryKind::Fact => "fact",
            MemoryKind::Gotcha => "gotcha",
            MemoryKind::Decision => "decision",
            MemoryKind::Plan => "plan",
            MemoryKind::Rule => "rule",
            MemoryKind::NameAlias => "name-alias",
            MemoryKind::Insight => "insight",
            MemoryKind::Exemplar => "exemplar",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fact" => Some(MemoryKind::Fact),
            "gotcha" => Some(MemoryKind::Gotcha),
            "decision" => Some(MemoryKind::Decision),
            "plan" => Some(MemoryKind::Plan),
            "rule" => Some(MemoryKind::Rule),
            "name-alias" => Some(MemoryKind::NameAlias),
            "insight" => Some(MemoryKind::Insight),
            "exemplar" => Some(MemoryKind::Exemplar),
            _ => None,
        }
    }
}

/// A durable note created by the user or the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub scope: MemoryScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub kind: MemoryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Markdown body.
    pub value: String,
    pub weight: f64,
    pub created_at: i64,
    /// Soft expiry; expired memories are excluded from search by default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Evidence (files/spans/query/bundle) that produced this note.
    #[serde(default)]
    pub source_json: serde_json::Value,
}

impl MemoryRecord {
    pub fn new(
        scope: MemoryScope,
        repo: Option<String>,
        kind: MemoryKind,
        key: Option<String>,
        value: impl Into<String>,
        created_at: i64,
    ) -> Self {
        let value = value.into();
        let id = ids::memory_id(
            scope.label(),
            repo.as_deref(),
            None,
            kind.label(),
            key.as_deref(),
            &value,
        );
        Self {
            id,
            scope,
            repo,
            branch: None,
            kind,
            key,
            value,
            weight: 1.0,
            created_at,
            expires_at: None,
            source_json: serde_json::Value::Null,
        }
    }

    /// Whether the memory is expired at `now` (Unix seconds).
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// A tool session: an append-only sequence of interactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub tool: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub started_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
}

/// One query/outcome pair within a session. Consumed by the learning loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: i64,
    pub session_id: String,
    pub ts: i64,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    /// 1 = satisfied, 0 = not, None = unknown.
    pub satisfied: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Where a fused candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Code,
    Memory,
}

/// A ranked candidate produced by one retrieval lane.
///
/// `id` is a chunk id for code candidates and a memory id for memory
/// candidates. Lanes emit candidates best-first; fusion consumes the rank
/// positions, not the raw scores.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub kind: CandidateKind,
    pub path: String,
    pub symbol: Option<String>,
    pub score: f32,
}

impl Candidate {
    pub fn code(id: impl Into<String>, path: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            kind: CandidateKind::Code,
            path: path.into(),
            symbol: None,
            score,
        }
    }

    pub fn memory(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            kind: CandidateKind::Memory,
            path: String::new(),
            symbol: None,
            score,
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_kind_roundtrip() {
        for kind in [
            SpanKind::Function,
            SpanKind::Method,
            SpanKind::Class,
            SpanKind::Module,
            SpanKind::Block,
            SpanKind::Doc,
            SpanKind::ConfigSection,
            SpanKind::Other,
        ] {
            assert_eq!(SpanKind::parse(kind.label()), Some(kind));
        }
        assert_eq!(SpanKind::parse("bogus"), None);
    }

    #[test]
    fn test_ref_kind_roundtrip() {
        for kind in [
            RefKind::Call,
            RefKind::Import,
            RefKind::TestOf,
            RefKind::Routes,
            RefKind::ConfigKey,
        ] {
            assert_eq!(RefKind::parse(kind.label()), Some(kind));
        }
    }

    #[test]
    fn test_ref_origin_confidence_ordering() {
        assert!(RefOrigin::Scip.confidence() > RefOrigin::Lsp.confidence());
        assert!(RefOrigin::Lsp.confidence() > RefOrigin::Heuristic.confidence());
    }

    #[test]
    fn test_span_record_id_stability() {
        let a = SpanRecord::new(
            "repo",
            "src/auth.rs",
            0,
            120,
            SpanKind::Function,
            Some("login".to_string()),
            None,
            None,
            vec![],
        );
        let b = SpanRecord::new(
            "repo",
            "src/auth.rs",
            0,
            120,
            SpanKind::Function,
            Some("login".to_string()),
            None,
            None,
            vec![],
        );
        assert_eq!(a.id, b.id);
        assert_eq!(a.len(), 120);
    }

    #[test]
    fn test_chunk_record_derives_from_span() {
        let span = SpanRecord::new(
            "repo",
            "src/lib.rs",
            0,
            20,
            SpanKind::Block,
            None,
            None,
            None,
            vec![],
        );
        let chunk = ChunkRecord::new(&span, "fn x() {}", 1_700_000_000);
        assert_eq!(chunk.span_id, span.id);
        assert_eq!(chunk.path, "src/lib.rs");
        assert_eq!(chunk.id, crate::ids::chunk_id(&span.id, "fn x() {}"));
    }

    #[test]
    fn test_memory_expiry() {
        let mut mem = MemoryRecord::new(
            MemoryScope::Repo,
            Some("repo".to_string()),
            MemoryKind::Gotcha,
            None,
            "The auth tests need a live database.",
            1_700_000_000,
        );
        assert!(!mem.is_expired(1_700_000_001));
        mem.expires_at = Some(1_700_000_100);
        assert!(!mem.is_expired(1_700_000_099));
        assert!(mem.is_expired(1_700_000_100));
    }

    #[test]
    fn test_memory_id_dedupes_identical_notes() {
        let a = MemoryRecord::new(
            MemoryScope::Global,
            None,
            MemoryKind::Fact,
            Some("style".to_string()),
            "Use snake_case.",
            1,
        );
        let b = MemoryRecord::new(
            MemoryScope::Global,
            None,
            MemoryKind::Fact,
            Some("style".to_string()),
            "Use snake_case.",
            2,
        );
        assert_eq!(a.id, b.id);
    }
}
