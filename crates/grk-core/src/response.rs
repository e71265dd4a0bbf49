//! Response formatting: turns a model reply into a [`GroundedAnswer`].
//!
//! For every retrieved chunk the formatter decides whether the answer used it
//! and quotes the evidence, extracts limitations, and blends the model's
//! self-reported confidence with citation coverage.

use std::sync::LazyLock;

use grk_model::Completion;
use regex::Regex;
use serde::Serialize;

use crate::config::ResponseConfig;
use crate::prompt::NOT_ENOUGH_CONTEXT;
use crate::retrieval::{QueryAnalysis, RetrievedChunk};
use crate::symbols::{declared_on_line, mentions_word};

static CONFIDENCE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\s>*_#-]*confidence[\s*_]*[:=\-][\s*_]*(high|medium|low|[0-9]+(?:\.[0-9]+)?\s*%?)")
        .expect("Invalid regex")
});

static LIMITATIONS_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\s#*_]*(?:known\s+)?limitations[\s*_]*:?[\s*_]*(.*)$").expect("Invalid regex")
});

static CANNOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[^.!?\n]*\b(?:cannot|can't|can not|could not|couldn't|unable to)\s+(?:be\s+)?(?:determine|determined|find|found|verify|verified|confirm|confirmed)\b[^.!?\n]*[.!?]?",
    )
    .expect("Invalid regex")
});

static INSUFFICIENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[^.!?\n]*\b(?:not\s+enough|insufficient)\s+(?:context|information)\b[^.!?\n]*[.!?]?",
    )
    .expect("Invalid regex")
});

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z0-9_./\-]+\.[A-Za-z0-9]+):L?([0-9]+)(?:-L?([0-9]+))?").expect("Invalid regex")
});

static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("Invalid regex"));

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:#+\s+\S|\*\*[^*]+\*\*\s*:?\s*$)").expect("Invalid regex"));

// ============================================================================
// Types
// ============================================================================

/// Bucketed confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// How a snippet was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SnippetSource {
    /// Window around a `path:L<line>` citation.
    Citation,
    /// A fenced block of the answer found in the chunk.
    FencedBlock,
    /// An inline code span naming a symbol the chunk declares.
    InlineCode,
}

/// Quoted evidence from a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub start_line: u32,
    pub end_line: u32,
    pub text: String,
    pub source: SnippetSource,
}

/// How one retrieved chunk figured in the answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub chunk_id: String,
    pub path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub relevance: f64,
    pub high_relevance: bool,
    pub referenced: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snippets: Vec<Snippet>,
}

/// Size counters of one answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub chunks: usize,
    pub referenced_chunks: usize,
    pub snippets: usize,
    pub prompt_chars: usize,
    pub completion_chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
}

/// An answer with its audit log, limitations and confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundedAnswer {
    pub answer: String,
    pub audit: Vec<AuditEntry>,
    pub limitations: Vec<String>,
    pub confidence: ConfidenceLevel,
    pub confidence_score: f64,
    pub insufficient_context: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    pub usage: Usage,
}

// ============================================================================
// ResponseFormatter
// ============================================================================

const NOT_ENOUGH_CONTEXT_ANSWER: &str =
    "Not enough context: the indexed project does not contain enough evidence to answer this question.";

/// Formats model replies for one configuration.
#[derive(Debug, Clone, Copy)]
pub struct ResponseFormatter<'a> {
    config: &'a ResponseConfig,
}

impl<'a> ResponseFormatter<'a> {
    pub fn new(config: &'a ResponseConfig) -> Self {
        Self { config }
    }

    /// The result for a question that cannot be grounded. No audit log.
    pub fn not_enough_context(&self, analysis: &QueryAnalysis, usage: Usage) -> GroundedAnswer {
        GroundedAnswer {
            answer: NOT_ENOUGH_CONTEXT_ANSWER.to_string(),
            audit: Vec::new(),
            limitations: Vec::new(),
            confidence: ConfidenceLevel::Low,
            confidence_score: 0.0,
            insufficient_context: true,
            suggestions: suggestions(analysis),
            model_id: None,
            usage,
        }
    }

    /// Format a model reply against the chunks it was given.
    pub fn format(
        &self,
        analysis: &QueryAnalysis,
        chunks: &[RetrievedChunk],
        completion: &Completion,
        prompt_chars: usize,
    ) -> GroundedAnswer {
        let mut usage = Usage {
            chunks: chunks.len(),
            prompt_chars,
            completion_chars: completion.text.chars().count(),
            prompt_tokens: completion.prompt_tokens,
            completion_tokens: completion.completion_tokens,
            ..Default::default()
        };

        if chunks.is_empty() || is_insufficient(&completion.text) {
            let mut result = self.not_enough_context(analysis, usage);
            if let Some(explanation) = insufficiency_explanation(&completion.text) {
                result.limitations.push(explanation);
            }
            result.model_id = Some(completion.model_id.clone());
            return result;
        }

        let self_reported = self_reported_confidence(&completion.text);
        let (answer, mut limitations) = split_answer(&completion.text);
        for phrase in cannot_phrases(&answer) {
            if !limitations.contains(&phrase) {
                limitations.push(phrase);
            }
        }

        let mut audit: Vec<AuditEntry> = chunks.iter().map(|c| self.audit_entry(&answer, c)).collect();
        audit.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

        usage.referenced_chunks = audit.iter().filter(|e| e.referenced).count();
        usage.snippets = audit.iter().map(|e| e.snippets.len()).sum();

        // Evidence coverage: entries with a quoted snippet or a high relevance score.
        let covered = audit
            .iter()
            .filter(|e| !e.snippets.is_empty() || e.high_relevance)
            .count();
        let coverage = covered as f64 / audit.len() as f64;
        let score = match self_reported {
            Some(reported) => {
                let w = self.config.self_report_weight;
                w * reported + (1.0 - w) * coverage
            }
            None => coverage,
        };

        GroundedAnswer {
            answer,
            audit,
            limitations,
            confidence: self.bucket(score),
            confidence_score: score,
            insufficient_context: false,
            suggestions: Vec::new(),
            model_id: Some(completion.model_id.clone()),
            usage,
        }
    }

    fn bucket(&self, score: f64) -> ConfidenceLevel {
        if score >= self.config.high_threshold {
            ConfidenceLevel::High
        } else if score >= self.config.medium_threshold {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    fn audit_entry(&self, answer: &str, retrieved: &RetrievedChunk) -> AuditEntry {
        let chunk = &retrieved.chunk;
        let citations: Vec<(u32, u32)> = citations_for(answer, &chunk.path)
            .into_iter()
            .filter(|(s, e)| *s <= chunk.end_line && *e >= chunk.start_line)
            .collect();

        let file_name = chunk.path.rsplit('/').next().unwrap_or(&chunk.path);
        let referenced = answer.contains(chunk.path.as_str())
            || mentions_word(answer, file_name)
            || !citations.is_empty()
            || chunk
                .symbols
                .iter()
                .any(|s| s.chars().count() >= 3 && mentions_word(answer, s));

        let snippets = if referenced {
            self.snippets(answer, retrieved, &citations)
        } else {
            Vec::new()
        };

        AuditEntry {
            chunk_id: chunk.id.clone(),
            path: chunk.path.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            relevance: retrieved.score,
            high_relevance: retrieved.score >= self.config.high_relevance_score,
            referenced,
            snippets,
        }
    }

    fn snippets(&self, answer: &str, retrieved: &RetrievedChunk, citations: &[(u32, u32)]) -> Vec<Snippet> {
        let chunk = &retrieved.chunk;
        let lines: Vec<&str> = retrieved.content.lines().collect();
        let max = self.config.max_snippets;
        let window = self.config.snippet_window;
        let mut out: Vec<Snippet> = Vec::new();

        let push = |out: &mut Vec<Snippet>, start: u32, end: u32, source: SnippetSource| {
            if out.len() >= max || out.iter().any(|s| s.start_line == start && s.end_line == end) {
                return;
            }
            if let Some(text) = slice(&lines, chunk.start_line, start, end) {
                out.push(Snippet {
                    start_line: start,
                    end_line: end,
                    text,
                    source,
                });
            }
        };

        for (cited_start, cited_end) in citations {
            let start = cited_start.saturating_sub(window).max(chunk.start_line);
            let end = (cited_end + window).min(chunk.end_line);
            push(&mut out, start, end, SnippetSource::Citation);
        }

        for block in fenced_blocks(answer) {
            if let Some((offset, len)) = locate_block(&lines, &block) {
                let start = chunk.start_line + offset as u32;
                let end = (start + len as u32).saturating_sub(1).min(chunk.end_line);
                push(&mut out, start, end, SnippetSource::FencedBlock);
            }
        }

        for cap in INLINE_CODE_RE.captures_iter(answer) {
            let span = cap[1].trim();
            let Some(symbol) = chunk.symbols.iter().find(|s| span_names_symbol(span, s)) else {
                continue;
            };
            if let Some(idx) = declaration_line(&lines, symbol) {
                let line = chunk.start_line + idx as u32;
                let start = line.saturating_sub(window).max(chunk.start_line);
                let end = (line + window).min(chunk.end_line);
                push(&mut out, start, end, SnippetSource::InlineCode);
            }
        }

        out
    }
}

// ============================================================================
// Parsing helpers
// ============================================================================

fn first_meaningful_line(text: &str) -> Option<&str> {
    text.lines()
        .map(|l| l.trim().trim_matches(|c| c == '*' || c == '_' || c == '#').trim())
        .find(|l| !l.is_empty())
}

/// Whether the model said, anywhere in the reply, that the context was
/// insufficient.
pub fn is_insufficient(text: &str) -> bool {
    INSUFFICIENT_RE.is_match(text)
}

/// Why the context was insufficient: the text after a leading
/// `NOT ENOUGH CONTEXT` marker, or the sentence carrying the phrase.
fn insufficiency_explanation(text: &str) -> Option<String> {
    let leading = first_meaningful_line(text)
        .is_some_and(|line| line.to_uppercase().starts_with(NOT_ENOUGH_CONTEXT));
    if leading {
        let trimmed = text.trim().trim_start_matches(['*', '_', '#', ' ', '\n']);
        let rest = trimmed.get(NOT_ENOUGH_CONTEXT.len()..)?;
        let rest = rest.trim_start_matches([':', '.', '-', '*', '_', ' ', '\n']);
        let (explanation, _) = split_answer(rest);
        return (!explanation.is_empty()).then_some(explanation);
    }
    INSUFFICIENT_RE
        .find(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Self-reported confidence as a value in `[0, 1]`.
pub fn self_reported_confidence(text: &str) -> Option<f64> {
    text.lines().rev().find_map(|line| {
        let caps = CONFIDENCE_LINE_RE.captures(line)?;
        let value = caps.get(1)?.as_str().trim().to_lowercase();
        match value.as_str() {
            "high" => Some(0.9),
            "medium" => Some(0.6),
            "low" => Some(0.3),
            numeric => {
                let percent = numeric.ends_with('%');
                let n: f64 = numeric.trim_end_matches('%').trim().parse().ok()?;
                let n = if percent || n > 1.0 { n / 100.0 } else { n };
                Some(n.clamp(0.0, 1.0))
            }
        }
    })
}

/// Split a reply into the cleaned answer and its Limitations section.
///
/// Confidence lines are dropped. The Limitations section runs from its
/// heading to the next heading or the end.
pub fn split_answer(text: &str) -> (String, Vec<String>) {
    let mut answer_lines: Vec<&str> = Vec::new();
    let mut limitations: Vec<String> = Vec::new();
    let mut in_limitations = false;
    let mut in_fence = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if !in_fence && CONFIDENCE_LINE_RE.is_match(line) {
            continue;
        }
        if !in_fence {
            if let Some(caps) = LIMITATIONS_HEADING_RE.captures(line) {
                in_limitations = true;
                let inline = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
                if !inline.is_empty() {
                    limitations.push(inline.to_string());
                }
                continue;
            }
            if in_limitations && HEADING_RE.is_match(line) {
                in_limitations = false;
            }
        }
        if in_limitations {
            let item = line.trim().trim_start_matches(['-', '*', '•']).trim();
            if !item.is_empty() {
                limitations.push(item.to_string());
            }
        } else {
            answer_lines.push(line);
        }
    }

    (answer_lines.join("\n").trim().to_string(), limitations)
}

/// Sentences admitting something could not be determined, found or verified.
pub fn cannot_phrases(text: &str) -> Vec<String> {
    let mut phrases: Vec<String> = Vec::new();
    for m in CANNOT_RE.find_iter(text) {
        let phrase = m.as_str().trim().trim_start_matches(['-', '*', ' ']).to_string();
        if !phrase.is_empty() && !phrases.contains(&phrase) {
            phrases.push(phrase);
        }
    }
    phrases
}

/// Line ranges cited for `path` (full path or bare file name).
fn citations_for(answer: &str, path: &str) -> Vec<(u32, u32)> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    CITATION_RE
        .captures_iter(answer)
        .filter_map(|caps| {
            let cited = caps.get(1)?.as_str().trim_start_matches("./");
            let matches = cited == path
                || path.ends_with(&format!("/{}", cited))
                || (!cited.contains('/') && cited == file_name);
            if !matches {
                return None;
            }
            let start: u32 = caps.get(2)?.as_str().parse().ok()?;
            let end: u32 = caps
                .get(3)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(start);
            Some((start.min(end), start.max(end)))
        })
        .collect()
}

/// Bodies of the fenced code blocks in `text`.
fn fenced_blocks(text: &str) -> Vec<Vec<String>> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<String>> = None;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            match current.take() {
                Some(block) => blocks.push(block),
                None => current = Some(Vec::new()),
            }
            continue;
        }
        if let Some(block) = current.as_mut() {
            block.push(line.trim().to_string());
        }
    }
    blocks
}

/// Where a fenced block sits in the chunk: `(line offset, block length)`.
///
/// The block's first non-blank line anchors the match, and every following
/// non-blank line must appear in order.
fn locate_block(lines: &[&str], block: &[String]) -> Option<(usize, usize)> {
    let meaningful: Vec<&String> = block.iter().filter(|l| !l.is_empty()).collect();
    let first = meaningful.first()?;
    for (anchor, line) in lines.iter().enumerate() {
        if line.trim() != first.as_str() {
            continue;
        }
        let mut cursor = anchor;
        let mut matched = true;
        for wanted in &meaningful[1..] {
            match lines[cursor + 1..].iter().position(|l| l.trim() == wanted.as_str()) {
                Some(pos) => cursor += pos + 1,
                None => {
                    matched = false;
                    break;
                }
            }
        }
        if matched {
            return Some((anchor, cursor - anchor + 1));
        }
    }
    None
}

fn span_names_symbol(span: &str, symbol: &str) -> bool {
    let name = span
        .trim_end_matches("()")
        .rsplit(['.', ':', '\\', '>'])
        .next()
        .unwrap_or(span)
        .trim_start_matches('$');
    name == symbol
}

fn declaration_line(lines: &[&str], symbol: &str) -> Option<usize> {
    lines
        .iter()
        .position(|l| declared_on_line(l).as_deref() == Some(symbol))
        .or_else(|| lines.iter().position(|l| mentions_word(l, symbol)))
}

/// Lines `start..=end` (absolute) of a chunk starting at `chunk_start`.
fn slice(lines: &[&str], chunk_start: u32, start: u32, end: u32) -> Option<String> {
    if start < chunk_start || end < start {
        return None;
    }
    let from = (start - chunk_start) as usize;
    let to = ((end - chunk_start) as usize).min(lines.len().checked_sub(1)?);
    (from <= to).then(|| lines[from..=to].join("\n"))
}

/// Where to look next when a question cannot be grounded.
pub fn suggestions(analysis: &QueryAnalysis) -> Vec<String> {
    let mut out = Vec::new();
    for path in &analysis.paths {
        out.push(format!(
            "Check that `{}` exists and is indexed (run `grk build`).",
            path
        ));
    }
    for symbol in &analysis.symbols {
        out.push(format!("Look for the definition of `{}`.", symbol));
    }
    for route in &analysis.routes {
        out.push(format!(
            "Check the route definitions for `{}` (routes/, controllers).",
            route.uri
        ));
    }
    if analysis.domains.auth {
        out.push("Look in authentication code: auth/, login/session controllers, middleware, guards.".to_string());
    }
    if analysis.domains.database {
        out.push("Look in the data layer: models/, migrations/, database/, repositories/.".to_string());
    }
    if analysis.domains.route && analysis.routes.is_empty() {
        out.push("Look in routing code: routes/, controllers/, http/ handlers.".to_string());
    }
    if out.is_empty() {
        out.push("Rephrase the question with a file name, symbol or route.".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::query::analyze;
    use crate::stack::StackFacts;
    use grk_db::ChunkRecord;

    fn login_chunk() -> RetrievedChunk {
        let content = [
            "class LoginController",
            "{",
            "    public function login($request)",
            "    {",
            "        $credentials = $request->only('email', 'password');",
            "        return Auth::attempt($credentials);",
            "    }",
            "}",
        ]
        .join("\n");
        RetrievedChunk {
            chunk: ChunkRecord {
                id: "login".to_string(),
                old_id: None,
                path: "app/Auth/LoginController.php".to_string(),
                start_line: 5,
                end_line: 12,
                sequence: 0,
                file_hash: "h".to_string(),
                content_hash: "c".to_string(),
                is_complete_file: true,
                symbols: vec!["LoginController".to_string(), "login".to_string()],
                used_symbols: Vec::new(),
                imports: Vec::new(),
                references: Vec::new(),
                size_bytes: 0,
            },
            score: 60.0,
            signals: Vec::new(),
            content,
            redacted: false,
        }
    }

    fn cart_chunk() -> RetrievedChunk {
        RetrievedChunk {
            chunk: ChunkRecord {
                id: "cart".to_string(),
                path: "app/Shop/CartController.php".to_string(),
                symbols: vec!["CartController".to_string()],
                ..login_chunk().chunk
            },
            score: 12.0,
            signals: Vec::new(),
            content: "class CartController\n{\n}".to_string(),
            redacted: false,
        }
    }

    fn completion(text: &str) -> Completion {
        Completion {
            text: text.to_string(),
            model_id: "scripted".to_string(),
            prompt_tokens: Some(120),
            completion_tokens: None,
        }
    }

    fn analysis(q: &str) -> QueryAnalysis {
        analyze(q, &StackFacts::default())
    }

    #[test]
    fn test_fully_cited_high_confidence() {
        let config = ResponseConfig::default();
        let reply = "Login is handled by `LoginController` in app/Auth/LoginController.php:L7, \
                     which calls `Auth::attempt`.\n\nConfidence: high";
        let result = ResponseFormatter::new(&config).format(
            &analysis("How does login work?"),
            &[login_chunk()],
            &completion(reply),
            500,
        );
        assert!(!result.insufficient_context);
        assert_eq!(result.confidence, ConfidenceLevel::High);
        assert!(!result.answer.contains("Confidence"));
        assert_eq!(result.audit.len(), 1);
        let entry = &result.audit[0];
        assert!(entry.referenced);
        assert!(entry.high_relevance);
        assert_eq!(entry.snippets[0].source, SnippetSource::Citation);
        assert_eq!((entry.snippets[0].start_line, entry.snippets[0].end_line), (5, 9));
        assert!(entry.snippets.iter().any(|s| s.source == SnippetSource::InlineCode));
        assert_eq!(result.usage.referenced_chunks, 1);
        assert_eq!(result.usage.prompt_tokens, Some(120));
    }

    #[test]
    fn test_insufficient_context_forces_low() {
        let config = ResponseConfig::default();
        let reply = "NOT ENOUGH CONTEXT: the excerpts do not show the session guard.\nConfidence: high";
        let result = ResponseFormatter::new(&config).format(
            &analysis("How does login work?"),
            &[login_chunk()],
            &completion(reply),
            500,
        );
        assert!(result.insufficient_context);
        assert_eq!(result.confidence, ConfidenceLevel::Low);
        assert!(result.audit.is_empty());
        assert!(result.suggestions.iter().any(|s| s.contains("authentication")));
        assert_eq!(result.limitations.len(), 1);
        assert_eq!(result.limitations[0], "the excerpts do not show the session guard.");
    }

    #[test]
    fn test_no_chunks_means_not_enough_context() {
        let config = ResponseConfig::default();
        let result = ResponseFormatter::new(&config).not_enough_context(
            &analysis("What does OrderRepository do in app/Repos/Orders.php?"),
            Usage::default(),
        );
        assert!(result.insufficient_context);
        assert!(result.audit.is_empty());
        assert_eq!(result.confidence, ConfidenceLevel::Low);
        assert!(result.suggestions[0].contains("app/Repos/Orders.php"));
        assert!(result.suggestions[1].contains("OrderRepository"));
    }

    #[test]
    fn test_audit_sorted_and_partial_coverage() {
        let config = ResponseConfig::default();
        let reply = "The `login` method in LoginController.php checks credentials.\n\n\
                     ## Limitations\n- Session storage could not be verified.\n\nConfidence: medium";
        let result = ResponseFormatter::new(&config).format(
            &analysis("How does login work?"),
            &[cart_chunk(), login_chunk()],
            &completion(reply),
            100,
        );
        assert_eq!(result.audit[0].chunk_id, "login");
        assert!(result.audit[0].referenced);
        assert!(!result.audit[1].referenced);
        assert!(result.audit[1].snippets.is_empty());
        assert_eq!(result.limitations, vec!["Session storage could not be verified."]);
        assert!(!result.answer.contains("Limitations"));
        // 0.4 * 0.6 + 0.6 * 0.5
        assert!((result.confidence_score - 0.54).abs() < 1e-9);
        assert_eq!(result.confidence, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_fenced_block_snippet() {
        let config = ResponseConfig::default();
        let reply = "`LoginController::login` delegates to the guard:\n\n```php\n$credentials = $request->only('email', 'password');\nreturn Auth::attempt($credentials);\n```\n";
        let result = ResponseFormatter::new(&config).format(
            &analysis("How does login work?"),
            &[login_chunk()],
            &completion(reply),
            100,
        );
        let entry = &result.audit[0];
        assert!(entry.referenced);
        let fenced = entry
            .snippets
            .iter()
            .find(|s| s.source == SnippetSource::FencedBlock)
            .unwrap();
        assert_eq!((fenced.start_line, fenced.end_line), (9, 10));
        assert!(fenced.text.contains("Auth::attempt"));
    }

    #[test]
    fn test_self_reported_confidence_forms() {
        assert_eq!(self_reported_confidence("x\nConfidence: HIGH"), Some(0.9));
        assert_eq!(self_reported_confidence("**Confidence:** low"), Some(0.3));
        assert_eq!(self_reported_confidence("Confidence: 80%"), Some(0.8));
        assert_eq!(self_reported_confidence("Confidence = 0.5"), Some(0.5));
        assert_eq!(self_reported_confidence("no rating here"), None);
    }

    #[test]
    fn test_cannot_phrases() {
        let text = "The handler is clear. I cannot determine where tokens expire. It could not be verified either!";
        let phrases = cannot_phrases(text);
        assert_eq!(
            phrases,
            vec![
                "I cannot determine where tokens expire.",
                "It could not be verified either!"
            ]
        );
    }

    #[test]
    fn test_is_insufficient() {
        assert!(is_insufficient("NOT ENOUGH CONTEXT"));
        assert!(is_insufficient("\n**Not enough context.** The guard is missing."));
        assert!(is_insufficient("Login works like this. There is not enough context for X."));
        assert!(is_insufficient("The guard has insufficient information to decide."));
        assert!(!is_insufficient("Login is handled by LoginController."));
    }

    #[test]
    fn test_insufficient_phrase_mid_answer_forces_low() {
        let config = ResponseConfig::default();
        let reply = "Login is handled by `LoginController` in app/Auth/LoginController.php:L7. \
                     There is not enough context to verify the session guard.\n\nConfidence: high";
        let result = ResponseFormatter::new(&config).format(
            &analysis("How does login work?"),
            &[login_chunk()],
            &completion(reply),
            500,
        );
        assert!(result.insufficient_context);
        assert_eq!(result.confidence, ConfidenceLevel::Low);
        assert_eq!(
            result.limitations,
            vec!["There is not enough context to verify the session guard."]
        );
    }

    #[test]
    fn test_high_relevance_counts_toward_coverage() {
        let config = ResponseConfig::default();
        let reply = "Sessions are started by the framework middleware.\n\nConfidence: high";
        let result = ResponseFormatter::new(&config).format(
            &analysis("How does login work?"),
            &[login_chunk()],
            &completion(reply),
            100,
        );
        let entry = &result.audit[0];
        assert!(!entry.referenced);
        assert!(entry.snippets.is_empty());
        assert!(entry.high_relevance);
        // 0.4 * 0.9 + 0.6 * 1.0
        assert!((result.confidence_score - 0.96).abs() < 1e-9);
        assert_eq!(result.confidence, ConfidenceLevel::High);
    }
}
