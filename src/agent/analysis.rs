//! Batch cataloguing of the downloaded documents
//!
//! Each document is sent, one at a time and in list order, as a structured
//! completion constrained to the catalog record schema. Progress is
//! narrated in a single assistant status message, and the full ordered set
//! of records is attached to that message when every document succeeded.

use crate::agent::conversation::{Conversation, Message};
use crate::agent::state::BatchProgress;
use crate::attachments::MockDocument;
use crate::error::{AcervoError, Result};
use crate::providers::Provider;
use metrics::increment_counter;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Catalog record for one document
///
/// Field names on the wire are fixed by the catalog format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Document type (e.g. "Article", "Recipe")
    #[serde(rename = "tipo")]
    pub doc_type: String,
    /// One-sentence summary
    #[serde(rename = "resumo")]
    pub summary: String,
    /// Access date, `DD/MM/YYYY`
    #[serde(rename = "data")]
    pub access_date: String,
    /// Topical reference (subject area)
    #[serde(rename = "referencia")]
    pub reference: String,
    /// Name of the catalogued file, supplied locally
    #[serde(rename = "nome_original")]
    pub source_name: String,
}

const REQUIRED_FIELDS: [&str; 4] = ["tipo", "resumo", "data", "referencia"];

/// Response schema sent with every cataloguing request
pub fn analysis_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "tipo": {
                "type": "STRING",
                "description": "Document type (e.g. Article, Recipe, Synopsis, Report)"
            },
            "resumo": {
                "type": "STRING",
                "description": "A single summary sentence for the catalog"
            },
            "data": {
                "type": "STRING",
                "description": "Access date in DD/MM/YYYY format"
            },
            "referencia": {
                "type": "STRING",
                "description": "Topical reference or subject area"
            }
        },
        "required": REQUIRED_FIELDS
    })
}

/// Cataloguing prompt for one document
pub fn analysis_prompt(document: &MockDocument) -> String {
    format!(
        "You are a university library assistant. Catalog the following document \
         into a structured record.\n\nDOCUMENT: {}\nCONTENT: {}",
        document.name, document.content
    )
}

/// Validate a structured completion into a catalog record
///
/// Any `nome_original` echoed by the model is ignored in favor of
/// `source_name`.
///
/// # Errors
///
/// Returns `MalformedResult` for invalid JSON, a non-object payload, or a
/// missing or non-string required field.
///
/// # Examples
///
/// ```
/// use acervo::agent::analysis::parse_analysis;
///
/// let raw = r#"{"tipo":"Artigo","resumo":"x","data":"01/01/2024","referencia":"y"}"#;
/// let record = parse_analysis(raw, "a.pdf").unwrap();
/// assert_eq!(record.doc_type, "Artigo");
/// assert_eq!(record.source_name, "a.pdf");
/// ```
pub fn parse_analysis(raw: &str, source_name: &str) -> Result<AnalysisResult> {
    let malformed = |message: String| AcervoError::MalformedResult {
        source_name: source_name.to_string(),
        message,
    };

    let value: serde_json::Value = serde_json::from_str(raw.trim())
        .map_err(|e| malformed(format!("invalid JSON: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| malformed("expected a JSON object".to_string()))?;

    let field = |name: &str| -> Result<String> {
        match object.get(name) {
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            Some(other) => {
                Err(malformed(format!("field `{}` is not a string: {}", name, other)).into())
            }
            None => Err(malformed(format!("missing field `{}`", name)).into()),
        }
    };

    Ok(AnalysisResult {
        doc_type: field("tipo")?,
        summary: field("resumo")?,
        access_date: field("data")?,
        reference: field("referencia")?,
        source_name: source_name.to_string(),
    })
}

/// Result of a catalog run
#[derive(Debug)]
pub enum BatchOutcome {
    /// Every document was catalogued, in list order
    Completed(Vec<AnalysisResult>),
    /// The run stopped at the first failure; partial records were discarded
    Aborted {
        /// Documents catalogued before the failure
        processed: usize,
        /// The failure
        error: anyhow::Error,
    },
}

impl BatchOutcome {
    /// Whether every document was catalogued
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Records of a completed run
    pub fn results(&self) -> Option<&[AnalysisResult]> {
        match self {
            Self::Completed(results) => Some(results),
            Self::Aborted { .. } => None,
        }
    }
}

/// Runs catalog passes against a provider
pub struct BatchAnalyzer<'a> {
    provider: &'a dyn Provider,
    model: &'a str,
    request_timeout: Option<Duration>,
}

impl<'a> BatchAnalyzer<'a> {
    /// Create an analyzer for `model`
    pub fn new(provider: &'a dyn Provider, model: &'a str) -> Self {
        Self {
            provider,
            model,
            request_timeout: None,
        }
    }

    /// Bound every structured call by `timeout`
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Catalog `documents` strictly in order
    ///
    /// `on_progress` is called before each request. Failures are
    /// recorded in the conversation and returned as
    /// [`BatchOutcome::Aborted`]; this method itself does not fail.
    pub async fn run(
        &self,
        documents: &[MockDocument],
        conversation: &mut Conversation,
        on_progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> BatchOutcome {
        let total = documents.len();
        tracing::info!(documents = total, model = self.model, "Starting catalog run");

        let status_id = conversation.append(
            Message::model(format!(
                "Starting systematic cataloguing of {} documents for the library...",
                total
            ))
            .with_model(self.model),
        );

        let mut results = Vec::with_capacity(total);
        for (index, document) in documents.iter().enumerate() {
            on_progress(BatchProgress {
                current: index + 1,
                total,
            });
            conversation.append_text(status_id, &format!("\nProcessing: {}...", document.name));

            match self.analyze(document).await {
                Ok(record) => {
                    increment_counter!("acervo_documents_catalogued_total");
                    tracing::debug!(document = %document.name, doc_type = %record.doc_type, "Catalogued");
                    results.push(record);
                    conversation.append_text(status_id, " Catalogued.");
                }
                Err(error) => return Self::abort(conversation, results.len(), error),
            }
        }

        conversation.append_text(
            status_id,
            "\n\nCataloguing finished. The records are available in the catalog report.",
        );
        conversation.set_analysis_results(status_id, results.clone());
        tracing::info!(documents = total, "Catalog run finished");

        BatchOutcome::Completed(results)
    }

    async fn analyze(&self, document: &MockDocument) -> Result<AnalysisResult> {
        let prompt = analysis_prompt(document);
        let schema = analysis_schema();
        let call = self.provider.generate_structured(self.model, &prompt, &schema);

        let raw = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| AcervoError::Timeout(limit.as_secs()))??,
            None => call.await?,
        };

        parse_analysis(&raw, &document.name)
    }

    fn abort(conversation: &mut Conversation, processed: usize, error: anyhow::Error) -> BatchOutcome {
        tracing::error!(processed, "Catalog run failed: {:#}", error);
        increment_counter!("acervo_catalog_failures_total");
        conversation.append_system_notice(format!("Cataloguing failed: {}", error));
        BatchOutcome::Aborted { processed, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::conversation::MessageRole;
    use crate::attachments::default_documents;
    use crate::test_utils::FakeProvider;

    fn record_json(tipo: &str) -> String {
        json!({"tipo": tipo, "resumo": "s", "data": "01/01/2024", "referencia": "r"}).to_string()
    }

    #[test]
    fn test_parse_analysis_attaches_source_name() {
        let raw = r#"{"tipo":"Artigo","resumo":"x","data":"01/01/2024","referencia":"y"}"#;
        let record = parse_analysis(raw, "a.pdf").unwrap();
        assert_eq!(
            record,
            AnalysisResult {
                doc_type: "Artigo".into(),
                summary: "x".into(),
                access_date: "01/01/2024".into(),
                reference: "y".into(),
                source_name: "a.pdf".into(),
            }
        );
    }

    #[test]
    fn test_parse_analysis_binds_fields_by_name() {
        let raw = r#"{"referencia":"ref","data":"02/03/2024","resumo":"sum","tipo":"Tese"}"#;
        let record = parse_analysis(raw, "t.pdf").unwrap();
        assert_eq!(record.doc_type, "Tese");
        assert_eq!(record.summary, "sum");
        assert_eq!(record.access_date, "02/03/2024");
        assert_eq!(record.reference, "ref");
    }

    #[test]
    fn test_parse_analysis_ignores_echoed_name() {
        let raw = r#"{"tipo":"A","resumo":"b","data":"c","referencia":"d","nome_original":"evil.pdf"}"#;
        assert_eq!(parse_analysis(raw, "real.pdf").unwrap().source_name, "real.pdf");
    }

    #[test]
    fn test_parse_analysis_rejects_bad_payloads() {
        for raw in [
            "",
            "not json",
            "[1,2]",
            r#"{"tipo":"A","resumo":"b","data":"c"}"#,
            r#"{"tipo":1,"resumo":"b","data":"c","referencia":"d"}"#,
        ] {
            let err = parse_analysis(raw, "a.pdf").unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<AcervoError>(),
                    Some(AcervoError::MalformedResult { source_name, .. }) if source_name == "a.pdf"
                ),
                "payload {:?} should be malformed, got {}",
                raw,
                err
            );
        }
    }

    #[test]
    fn test_serialized_record_uses_catalog_keys() {
        let record = parse_analysis(&record_json("Receita"), "doc_final.pdf").unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["tipo"], "Receita");
        assert_eq!(json["nome_original"], "doc_final.pdf");
        assert!(json.get("doc_type").is_none());
    }

    #[test]
    fn test_schema_requires_four_fields() {
        let schema = analysis_schema();
        assert_eq!(schema["required"], json!(["tipo", "resumo", "data", "referencia"]));
    }

    #[tokio::test]
    async fn test_run_processes_documents_in_order() {
        let provider = FakeProvider::new().with_structured(vec![
            Ok(record_json("Sinopse")),
            Ok(record_json("Receita")),
            Ok(record_json("Artigo")),
        ]);
        let documents = default_documents();
        let mut conversation = Conversation::new();
        let mut seen = Vec::new();

        let outcome = BatchAnalyzer::new(&provider, "gemini-2.5-flash-lite")
            .run(&documents, &mut conversation, &mut |p| seen.push(p))
            .await;

        let results = outcome.results().unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.source_name.as_str()).collect();
        assert_eq!(names, vec!["starwars.pdf", "doc_final.pdf", "artigo.pdf"]);
        assert_eq!(results[2].doc_type, "Artigo");

        let prompts = provider.structured_prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("DOCUMENT: starwars.pdf"));
        assert!(prompts[2].contains("DOCUMENT: artigo.pdf"));

        assert_eq!(
            seen,
            vec![
                BatchProgress { current: 1, total: 3 },
                BatchProgress { current: 2, total: 3 },
                BatchProgress { current: 3, total: 3 },
            ]
        );

        assert_eq!(conversation.len(), 1);
        let status = conversation.last().unwrap();
        assert_eq!(status.role, MessageRole::Model);
        assert_eq!(
            status.text,
            "Starting systematic cataloguing of 3 documents for the library...\
             \nProcessing: starwars.pdf... Catalogued.\
             \nProcessing: doc_final.pdf... Catalogued.\
             \nProcessing: artigo.pdf... Catalogued.\
             \n\nCataloguing finished. The records are available in the catalog report."
        );
        assert_eq!(status.analysis_results.as_ref().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_run_aborts_on_malformed_result() {
        let provider = FakeProvider::new().with_structured(vec![
            Ok(record_json("Sinopse")),
            Ok("{\"tipo\":\"Receita\"}".to_string()),
            Ok(record_json("Artigo")),
        ]);
        let documents = default_documents();
        let mut conversation = Conversation::new();

        let outcome = BatchAnalyzer::new(&provider, "m")
            .run(&documents, &mut conversation, &mut |_| {})
            .await;

        match outcome {
            BatchOutcome::Aborted { processed, error } => {
                assert_eq!(processed, 1);
                assert!(error.to_string().contains("doc_final.pdf"));
            }
            other => panic!("expected abort, got {:?}", other),
        }
        assert_eq!(provider.structured_prompts().len(), 2);

        let messages = conversation.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].analysis_results.is_none());
        assert!(messages[0].text.ends_with("\nProcessing: doc_final.pdf..."));
        assert_eq!(messages[1].role, MessageRole::System);
        assert!(messages[1].text.starts_with("Cataloguing failed: "));
        assert!(conversation.analysis_results().is_empty());
    }

    #[tokio::test]
    async fn test_run_aborts_on_provider_error() {
        let provider = FakeProvider::new().with_structured(vec![Err("quota exhausted".to_string())]);
        let documents = default_documents();
        let mut conversation = Conversation::new();

        let outcome = BatchAnalyzer::new(&provider, "m")
            .run(&documents, &mut conversation, &mut |_| {})
            .await;

        assert!(!outcome.is_completed());
        assert!(conversation.last().unwrap().text.contains("quota exhausted"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out_slow_document() {
        let provider = FakeProvider::new().with_structured_hang();
        let documents = vec![MockDocument::new("slow.pdf", "...")];
        let mut conversation = Conversation::new();

        let outcome = BatchAnalyzer::new(&provider, "m")
            .with_request_timeout(Some(Duration::from_secs(1)))
            .run(&documents, &mut conversation, &mut |_| {})
            .await;

        match outcome {
            BatchOutcome::Aborted { error, .. } => assert!(matches!(
                error.downcast_ref::<AcervoError>(),
                Some(AcervoError::Timeout(1))
            )),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_document_list_completes() {
        let provider = FakeProvider::new();
        let mut conversation = Conversation::new();
        let outcome = BatchAnalyzer::new(&provider, "m")
            .run(&[], &mut conversation, &mut |_| {})
            .await;
        assert_eq!(outcome.results().unwrap().len(), 0);
        assert!(conversation.last().unwrap().text.contains("0 documents"));
    }
}
