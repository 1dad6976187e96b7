//! Faculty document preparation for embedding.
//!
//! A faculty member is embedded as one text document combining their profile with the
//! abstracts and terms of their projects. Documents are cut to the model's token budget
//! before being sent to the provider: `tiktoken-rs` is used when the model (or a known
//! encoding) resolves, otherwise whitespace-separated words are counted instead.

use crate::models::{Faculty, Project};
use std::fmt::Write as _;
use std::sync::Arc;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model};

/// Builds token-bounded embedding documents for faculty records.
#[derive(Clone)]
pub struct Preprocessor {
    max_tokens: usize,
    encoding: Option<Arc<CoreBPE>>,
}

impl Preprocessor {
    /// Use the tokenizer of `model`, falling back to `cl100k_base`.
    pub fn new(model: &str, max_tokens: usize) -> Self {
        let encoding = match get_bpe_from_model(model.trim()) {
            Ok(encoding) => Some(encoding),
            Err(model_err) => {
                tracing::debug!(
                    model,
                    error = %model_err,
                    "Tokenizer model lookup failed; falling back to 'cl100k_base'"
                );
                match cl100k_base() {
                    Ok(encoding) => Some(encoding),
                    Err(err) => {
                        tracing::warn!(error = %err, "Tokenizer unavailable; counting words instead");
                        None
                    }
                }
            }
        };

        Self {
            max_tokens: max_tokens.max(1),
            encoding: encoding.map(Arc::new),
        }
    }

    /// Count whitespace-separated words instead of model tokens.
    pub fn whitespace(max_tokens: usize) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
            encoding: None,
        }
    }

    /// Token budget of a document.
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Compose the embedding document for `faculty` and `projects`.
    pub fn faculty_document(&self, faculty: &Faculty, projects: &[Project]) -> String {
        self.truncate(&compose_document(faculty, projects))
    }

    /// Cut `text` down to the token budget.
    pub fn truncate(&self, text: &str) -> String {
        if let Some(encoding) = &self.encoding {
            let tokens = encoding.encode_ordinary(text);
            if tokens.len() <= self.max_tokens {
                return text.to_string();
            }
            match encoding.decode(tokens[..self.max_tokens].to_vec()) {
                Ok(decoded) => return decoded,
                Err(err) => {
                    tracing::debug!(error = %err, "Token boundary split a character; trimming by words")
                }
            }
        }
        truncate_words(text, self.max_tokens)
    }
}

fn compose_document(faculty: &Faculty, projects: &[Project]) -> String {
    let mut document = String::new();
    let _ = writeln!(document, "{}", faculty.name);
    let _ = writeln!(document, "{}, {}", faculty.department, faculty.school);
    if !faculty.about.trim().is_empty() {
        let _ = writeln!(document, "{}", faculty.about.trim());
    }

    for project in projects {
        let _ = write!(document, "\nProject {}", project.project_number);
        if !project.activity_code.is_empty() || !project.agency_ic_admin.is_empty() {
            let _ = write!(
                document,
                " ({} {})",
                project.activity_code, project.agency_ic_admin
            );
        }
        document.push('\n');
        if !project.r#abstract.trim().is_empty() {
            let _ = writeln!(document, "{}", project.r#abstract.trim());
        }
        if !project.relevant_terms.is_empty() {
            let _ = writeln!(document, "Terms: {}", project.relevant_terms.join(", "));
        }
    }

    document
}

fn truncate_words(text: &str, max_words: usize) -> String {
    let mut words = text.split_whitespace();
    let kept: Vec<&str> = words.by_ref().take(max_words).collect();
    if words.next().is_none() {
        return text.to_string();
    }
    kept.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faculty() -> Faculty {
        Faculty {
            name: "Jane Doe".into(),
            school: "SEAS".into(),
            department: "Biomedical Engineering".into(),
            about: "Studies tissue mechanics.".into(),
            email: String::new(),
            profile_url: String::new(),
            projects: Vec::new(),
            embedding_id: None,
        }
    }

    fn project() -> Project {
        Project {
            project_number: "5R01GM000001-03".into(),
            r#abstract: "Mechanobiology of cartilage.".into(),
            relevant_terms: vec!["cartilage".into(), "mechanics".into()],
            start_date: None,
            end_date: None,
            agency_ic_admin: "NIGMS".into(),
            activity_code: "R01".into(),
        }
    }

    #[test]
    fn document_includes_profile_and_projects() {
        let document = Preprocessor::whitespace(1_000).faculty_document(&faculty(), &[project()]);

        assert!(document.starts_with("Jane Doe\nBiomedical Engineering, SEAS\n"));
        assert!(document.contains("Studies tissue mechanics."));
        assert!(document.contains("Project 5R01GM000001-03 (R01 NIGMS)"));
        assert!(document.contains("Mechanobiology of cartilage."));
        assert!(document.contains("Terms: cartilage, mechanics"));
    }

    #[test]
    fn whitespace_budget_keeps_leading_words() {
        let preprocessor = Preprocessor::whitespace(3);
        assert_eq!(preprocessor.truncate("one two three four"), "one two three");
        assert_eq!(preprocessor.truncate("one  two"), "one  two");
    }

    #[test]
    fn tokenizer_budget_truncates_long_documents() {
        let preprocessor = Preprocessor::new("text-embedding-ada-002", 5);
        let truncated =
            preprocessor.truncate("one two three four five six seven eight nine ten");
        assert!(truncated.starts_with("one two"));
        assert!(!truncated.contains("ten"));

        let short = "Jane Doe";
        assert_eq!(preprocessor.truncate(short), short);
    }
}
