//! Prompt construction for grounded answers.

use serde::Serialize;

use crate::retrieval::RetrievedChunk;
use crate::stack::StackFacts;

/// Exact phrase the model must answer with when the chunks do not suffice.
pub const NOT_ENOUGH_CONTEXT: &str = "NOT ENOUGH CONTEXT";

/// A system/user message pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Total characters sent to the model.
    pub fn char_count(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

/// Builds prompts for one project.
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder<'a> {
    project_name: &'a str,
    stack: &'a StackFacts,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(project_name: &'a str, stack: &'a StackFacts) -> Self {
        Self {
            project_name,
            stack,
        }
    }

    pub fn system_message(&self) -> String {
        let mut out = format!(
            "You answer questions about the software project \"{}\" using only the source \
             excerpts provided by the user.\n",
            self.project_name
        );
        let summary = self.stack.summary();
        if !summary.is_empty() {
            out.push_str("\nProject stack:\n");
            out.push_str(&summary);
            out.push('\n');
        }
        out.push_str(&format!(
            "\nRules:\n\
             - Ground every statement in the excerpts. Do not rely on outside knowledge of the project.\n\
             - Cite evidence as `path:L<line>` (for example `src/main.rs:L42`).\n\
             - If the excerpts are not sufficient to answer, reply with exactly \"{}\" on the first \
             line, followed by what is missing.\n\
             - End with a line `Confidence: high`, `Confidence: medium` or `Confidence: low`.\n\
             - If anything could not be verified, list it under a final `Limitations:` heading.\n",
            NOT_ENOUGH_CONTEXT
        ));
        out
    }

    /// User message: the question followed by the chunks in descending
    /// relevance.
    pub fn user_message(&self, question: &str, chunks: &[RetrievedChunk]) -> String {
        let mut ordered: Vec<&RetrievedChunk> = chunks.iter().collect();
        ordered.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut out = format!("Question: {}\n\n", question.trim());
        out.push_str(&format!("Source excerpts ({}):\n", ordered.len()));

        for (i, chunk) in ordered.iter().enumerate() {
            let c = &chunk.chunk;
            out.push_str(&format!(
                "\n### [{}] {} (L{}-{})\n",
                i + 1,
                c.path,
                c.start_line,
                c.end_line
            ));
            if !chunk.signals.is_empty() {
                let signals: Vec<String> = chunk.signals.iter().map(|s| s.to_string()).collect();
                out.push_str(&format!("Matched: {}\n", signals.join(", ")));
            }
            if !c.symbols.is_empty() {
                out.push_str(&format!("Declares: {}\n", c.symbols.join(", ")));
            }
            let fence = fence_for(&chunk.content);
            out.push_str(&format!(
                "{}{}\n{}\n{}\n",
                fence,
                fence_language(&c.path),
                chunk.content,
                fence
            ));
        }

        out.push_str(
            "\nAnswer the question using the excerpts above. Cite `path:L<line>` for each claim.\n",
        );
        out
    }

    pub fn build(&self, question: &str, chunks: &[RetrievedChunk]) -> Prompt {
        Prompt {
            system: self.system_message(),
            user: self.user_message(question, chunks),
        }
    }
}

/// A backtick fence longer than any backtick run inside `content`.
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}

fn fence_language(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext,
        _ => "",
    }
}
