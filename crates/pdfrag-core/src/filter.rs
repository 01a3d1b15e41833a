//! Store-agnostic metadata filter expressions.
//!
//! The [`Retriever`](crate::retrieve::Retriever) describes *what* to filter
//! on with a small tagged expression; each [`VectorStore`](crate::store::VectorStore)
//! adapter translates it into its own query language (Weaviate `where`
//! clauses, in-memory predicate evaluation).
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | `Equals(field, value)` | property equals `value` (any element, for list properties) |
//! | `ContainsAny(field, values)` | property shares at least one element with `values` |
//! | `And(filters)` | every sub-filter holds |

use serde::Serialize;

use crate::error::{RagError, RagResult};
use crate::models::ChunkProperties;

pub const PROJECT_ID_FIELD: &str = "project_id";
pub const TAGS_FIELD: &str = "tags";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Equals { field: String, value: String },
    ContainsAny { field: String, values: Vec<String> },
    And(Vec<Filter>),
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn contains_any(field: impl Into<String>, values: Vec<String>) -> Self {
        Filter::ContainsAny {
            field: field.into(),
            values,
        }
    }

    /// Reject expressions no store can apply meaningfully.
    pub fn validate(&self) -> RagResult<()> {
        match self {
            Filter::Equals { field, .. } => check_field(field),
            Filter::ContainsAny { field, values } => {
                check_field(field)?;
                if values.is_empty() {
                    return Err(RagError::query(format!(
                        "ContainsAny on '{}' needs at least one value",
                        field
                    )));
                }
                Ok(())
            }
            Filter::And(filters) => {
                if filters.is_empty() {
                    return Err(RagError::query("And needs at least one operand"));
                }
                filters.iter().try_for_each(Filter::validate)
            }
        }
    }

    /// Evaluate the filter against one record's properties.
    ///
    /// Only text and text-list properties are filterable; anything else is a
    /// [`RagError::Query`].
    pub fn matches(&self, props: &ChunkProperties) -> RagResult<bool> {
        match self {
            Filter::Equals { field, value } => Ok(field_values(props, field)?
                .iter()
                .any(|v| *v == value.as_str())),
            Filter::ContainsAny { field, values } => {
                let have = field_values(props, field)?;
                Ok(have.iter().any(|v| values.iter().any(|w| w.as_str() == *v)))
            }
            Filter::And(filters) => {
                for f in filters {
                    if !f.matches(props)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

fn check_field(field: &str) -> RagResult<()> {
    if field.trim().is_empty() {
        return Err(RagError::query("filter field name must not be empty"));
    }
    Ok(())
}

fn field_values<'a>(props: &'a ChunkProperties, field: &str) -> RagResult<Vec<&'a str>> {
    let single = match field {
        "document_id" => &props.document_id,
        "source_uri" => &props.source_uri,
        "project_id" => &props.project_id,
        "created_at" => &props.created_at,
        "content" => &props.content,
        "tags" => return Ok(props.tags.iter().map(String::as_str).collect()),
        other => {
            return Err(RagError::query(format!(
                "unsupported filter field: '{}'",
                other
            )))
        }
    };
    Ok(vec![single.as_str()])
}

/// Build the retrieval filter for an optional project and tag set.
///
/// Both present → `And([Equals(project_id), ContainsAny(tags)])`; one present
/// → that filter alone; neither (or blank project, empty tag set) → `None`.
pub fn build_filter(project_id: Option<&str>, tags: Option<&[String]>) -> Option<Filter> {
    let mut parts = Vec::new();
    if let Some(p) = project_id.filter(|p| !p.trim().is_empty()) {
        parts.push(Filter::equals(PROJECT_ID_FIELD, p));
    }
    if let Some(t) = tags.filter(|t| !t.is_empty()) {
        parts.push(Filter::contains_any(TAGS_FIELD, t.to_vec()));
    }
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(Filter::And(parts)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(project: &str, tags: &[&str]) -> ChunkProperties {
        ChunkProperties {
            document_id: "d".into(),
            source_uri: "doc.pdf".into(),
            project_id: project.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            chunk_index: 0,
            page_number: Some(1),
            created_at: "2026-01-01T00:00:00Z".into(),
            content: "text".into(),
        }
    }

    fn tags(t: &[&str]) -> Vec<String> {
        t.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_filter_when_nothing_given() {
        assert_eq!(build_filter(None, None), None);
        assert_eq!(build_filter(Some("  "), Some(Vec::<String>::new().as_slice())), None);
    }

    #[test]
    fn test_project_only() {
        assert_eq!(
            build_filter(Some("proj-123"), None),
            Some(Filter::equals("project_id", "proj-123"))
        );
    }

    #[test]
    fn test_tags_only() {
        let t = tags(&["a", "b"]);
        assert_eq!(
            build_filter(None, Some(t.as_slice())),
            Some(Filter::contains_any("tags", t.clone()))
        );
    }

    #[test]
    fn test_both_compose_with_and() {
        let t = tags(&["a"]);
        let f = build_filter(Some("p"), Some(t.as_slice())).unwrap();
        assert_eq!(
            f,
            Filter::And(vec![
                Filter::equals("project_id", "p"),
                Filter::contains_any("tags", t.clone()),
            ])
        );
        assert!(f.matches(&props("p", &["a", "z"])).unwrap());
        assert!(!f.matches(&props("q", &["a"])).unwrap());
        assert!(!f.matches(&props("p", &["z"])).unwrap());
    }

    #[test]
    fn test_contains_any_is_intersection_not_superset() {
        let f = Filter::contains_any("tags", tags(&["a", "b"]));
        assert!(f.matches(&props("p", &["b"])).unwrap());
        assert!(f.matches(&props("p", &["a", "b", "c"])).unwrap());
        assert!(!f.matches(&props("p", &["c"])).unwrap());
        assert!(!f.matches(&props("p", &[])).unwrap());
    }

    #[test]
    fn test_malformed_filters_are_query_errors() {
        assert!(matches!(Filter::And(vec![]).validate(), Err(RagError::Query(_))));
        assert!(matches!(
            Filter::contains_any("tags", vec![]).validate(),
            Err(RagError::Query(_))
        ));
        assert!(matches!(
            Filter::equals("", "x").validate(),
            Err(RagError::Query(_))
        ));
        assert!(matches!(
            Filter::And(vec![Filter::equals("project_id", "p"), Filter::And(vec![])]).validate(),
            Err(RagError::Query(_))
        ));
    }

    #[test]
    fn test_unknown_field_fails_evaluation() {
        let f = Filter::equals("chunk_index", "0");
        assert!(matches!(f.matches(&props("p", &[])), Err(RagError::Query(_))));
    }
}
