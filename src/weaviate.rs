//! Weaviate vector store.
//!
//! Implements [`VectorStore`] over Weaviate's HTTP API:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | insert | `POST /v1/objects` with an explicit id and vector |
//! | near_vector | `POST /v1/graphql`, `Get { <Class>(nearVector, limit, where) }` |
//! | ensure_collection | `GET /v1/schema/<Class>`, then `POST /v1/schema` if missing |
//!
//! Weaviate capitalises class names, so the configured collection
//! `newlearn` is queried as `Newlearn`.
//!
//! # API-shape mismatches
//!
//! Responses that indicate this adapter and the server disagree about the
//! API (404/405 on an endpoint, GraphQL `Cannot query field` or
//! `Unknown argument` errors, a response without `data.Get.<Class>`, a
//! record that no longer has the expected properties) are reported as
//! [`RagError::IntegrationMismatch`] rather than a generic failure.

use anyhow::Result;
use async_trait::async_trait;
use pdfrag_core::filter::Filter;
use pdfrag_core::models::{ChunkProperties, ChunkRecord, StoreMatch};
use pdfrag_core::store::{VectorStore, RECORD_PROPERTIES};
use pdfrag_core::{RagError, RagResult};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::config::StoreConfig;
use crate::http::{self, CallError};

const SERVICE: &str = "weaviate";

/// Weaviate data type and tokenization of each record property.
const PROPERTY_SCHEMA: [(&str, &str, Option<&str>); 8] = [
    ("document_id", "text", Some("field")),
    ("source_uri", "text", Some("field")),
    ("project_id", "text", Some("field")),
    ("tags", "text[]", Some("field")),
    ("chunk_index", "int", None),
    ("page_number", "int", None),
    ("created_at", "date", None),
    ("content", "text", None),
];

pub struct WeaviateStore {
    client: reqwest::Client,
    base_url: String,
    class: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl WeaviateStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            class: class_name(&config.collection),
            api_key,
            max_retries: config.max_retries,
        })
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Create the collection if it does not exist. Returns `true` if it was
    /// created by this call.
    pub async fn ensure_collection(&self) -> RagResult<bool> {
        let url = format!("{}/v1/schema/{}", self.base_url, self.class);
        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req
            .send()
            .await
            .map_err(|e| CallError::Transport(e).into_external(SERVICE))?;

        match response.status() {
            s if s.is_success() => return Ok(false),
            StatusCode::NOT_FOUND => {}
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(CallError::Status { status, body }.into_external(SERVICE));
            }
        }

        let schema_url = format!("{}/v1/schema", self.base_url);
        match http::post_json(
            &self.client,
            &schema_url,
            self.api_key.as_deref(),
            &class_definition(&self.class),
        )
        .await
        {
            Ok(_) => {
                tracing::info!(class = %self.class, "created weaviate collection");
                Ok(true)
            }
            // Created concurrently by another process.
            Err(CallError::Status { status, ref body })
                if status == StatusCode::UNPROCESSABLE_ENTITY && body.contains("already") =>
            {
                Ok(false)
            }
            Err(e) => Err(endpoint_error("POST /v1/schema", e)),
        }
    }
}

#[async_trait]
impl VectorStore for WeaviateStore {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn insert(&self, record: ChunkRecord) -> RagResult<()> {
        let body = object_body(&self.class, &record)?;
        let url = format!("{}/v1/objects", self.base_url);
        match http::post_json(&self.client, &url, self.api_key.as_deref(), &body).await {
            Ok(_) => Ok(()),
            Err(CallError::Status { status, ref body })
                if status == StatusCode::UNPROCESSABLE_ENTITY && body.contains("already exists") =>
            {
                Err(RagError::external(
                    SERVICE,
                    format!("record {} already exists", record.id),
                ))
            }
            Err(e) => Err(endpoint_error("POST /v1/objects", e)),
        }
    }

    async fn near_vector(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&Filter>,
    ) -> RagResult<Vec<StoreMatch>> {
        let query = near_vector_query(&self.class, vector, limit, filter)?;
        tracing::debug!(class = %self.class, limit, "weaviate nearVector query");

        let url = format!("{}/v1/graphql", self.base_url);
        let response = http::post_json_with_retry(
            &self.client,
            &url,
            self.api_key.as_deref(),
            &json!({ "query": query }),
            self.max_retries,
        )
        .await
        .map_err(|e| endpoint_error("POST /v1/graphql", e))?;

        parse_get_response(&response, &self.class)
    }
}

/// Weaviate's form of a class name: first letter upper-cased.
pub fn class_name(collection: &str) -> String {
    let mut chars = collection.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Schema for the chunk-record class: no server-side vectorizer, cosine distance.
pub fn class_definition(class: &str) -> Value {
    let properties: Vec<Value> = PROPERTY_SCHEMA
        .iter()
        .map(|(name, data_type, tokenization)| {
            let mut p = json!({ "name": name, "dataType": [data_type] });
            if let Some(t) = tokenization {
                p["tokenization"] = json!(t);
            }
            p
        })
        .collect();
    json!({
        "class": class,
        "vectorizer": "none",
        "vectorIndexConfig": { "distance": "cosine" },
        "properties": properties,
    })
}

/// `POST /v1/objects` body. Null properties are omitted.
fn object_body(class: &str, record: &ChunkRecord) -> RagResult<Value> {
    let mut properties = serde_json::to_value(&record.properties)
        .map_err(|e| RagError::external(SERVICE, format!("cannot encode record: {}", e)))?;
    if let Some(map) = properties.as_object_mut() {
        map.retain(|_, v| !v.is_null());
    }
    Ok(json!({
        "class": class,
        "id": record.id.to_string(),
        "properties": properties,
        "vector": record.vector,
    }))
}

/// 404/405 mean the endpoint this adapter targets is not there.
fn endpoint_error(endpoint: &str, err: CallError) -> RagError {
    match err.status() {
        Some(StatusCode::NOT_FOUND) | Some(StatusCode::METHOD_NOT_ALLOWED) => RagError::mismatch(
            SERVICE,
            format!("{} is not supported by this server: {}", endpoint, err),
        ),
        _ => err.into_external(SERVICE),
    }
}

fn property_type(field: &str) -> RagResult<&'static str> {
    PROPERTY_SCHEMA
        .iter()
        .find(|(name, _, _)| *name == field)
        .map(|(_, data_type, _)| *data_type)
        .ok_or_else(|| RagError::query(format!("unknown property '{}'", field)))
}

fn string_literal(s: &str) -> String {
    // JSON string escaping is valid GraphQL string syntax.
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn value_clause(field: &str, values: &[String], list: bool) -> RagResult<String> {
    match property_type(field)? {
        "int" => {
            let ints = values
                .iter()
                .map(|v| {
                    v.parse::<i64>().map_err(|_| {
                        RagError::query(format!("'{}' is not an integer for '{}'", v, field))
                    })
                })
                .collect::<RagResult<Vec<i64>>>()?;
            let rendered: Vec<String> = ints.iter().map(|i| i.to_string()).collect();
            Ok(if list {
                format!("valueInt: [{}]", rendered.join(", "))
            } else {
                format!("valueInt: {}", rendered.join(""))
            })
        }
        "date" => Err(RagError::query(format!(
            "filtering on '{}' is not supported",
            field
        ))),
        _ => {
            let rendered: Vec<String> = values.iter().map(|v| string_literal(v)).collect();
            Ok(if list {
                format!("valueText: [{}]", rendered.join(", "))
            } else {
                format!("valueText: {}", rendered.join(""))
            })
        }
    }
}

/// Render a [`Filter`] as a GraphQL `where` argument value.
pub fn render_where(filter: &Filter) -> RagResult<String> {
    match filter {
        Filter::Equals { field, value } => Ok(format!(
            "{{path: [{}], operator: Equal, {}}}",
            string_literal(field),
            value_clause(field, std::slice::from_ref(value), false)?
        )),
        Filter::ContainsAny { field, values } => Ok(format!(
            "{{path: [{}], operator: ContainsAny, {}}}",
            string_literal(field),
            value_clause(field, values, true)?
        )),
        Filter::And(filters) => {
            let operands = filters
                .iter()
                .map(render_where)
                .collect::<RagResult<Vec<String>>>()?;
            Ok(format!("{{operator: And, operands: [{}]}}", operands.join(", ")))
        }
    }
}

/// Build the GraphQL `Get` query for a filtered nearest-neighbour search.
pub fn near_vector_query(
    class: &str,
    vector: &[f32],
    limit: usize,
    filter: Option<&Filter>,
) -> RagResult<String> {
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(RagError::external(
            "embedding",
            "query vector contains non-finite values",
        ));
    }
    let vector: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    let mut args = format!(
        "nearVector: {{vector: [{}]}}, limit: {}",
        vector.join(", "),
        limit
    );
    if let Some(f) = filter {
        f.validate()?;
        args.push_str(", where: ");
        args.push_str(&render_where(f)?);
    }
    Ok(format!(
        "{{ Get {{ {}({}) {{ {} _additional {{ id distance }} }} }} }}",
        class,
        args,
        RECORD_PROPERTIES.join(" ")
    ))
}

/// Convert a GraphQL `Get` response into store matches, best first.
pub fn parse_get_response(json: &Value, class: &str) -> RagResult<Vec<StoreMatch>> {
    if let Some(errors) = json.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                .collect();
            return Err(classify_graphql_errors(&messages, class));
        }
    }

    let items = json
        .pointer(&format!("/data/Get/{}", class))
        .ok_or_else(|| {
            RagError::mismatch(
                SERVICE,
                format!("GraphQL response has no data.Get.{}", class),
            )
        })?;
    let items = match items {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => {
            return Err(RagError::mismatch(
                SERVICE,
                format!("data.Get.{} is not a list", class),
            ))
        }
    };

    items.iter().map(parse_match).collect()
}

fn parse_match(item: &Value) -> RagResult<StoreMatch> {
    let mut item = item.clone();
    if item.get("tags").map_or(false, Value::is_null) {
        item["tags"] = json!([]);
    }
    let score = item
        .pointer("/_additional/distance")
        .and_then(|d| d.as_f64())
        .map(|d| (1.0 - d) as f32);
    let properties: ChunkProperties = serde_json::from_value(item).map_err(|e| {
        RagError::mismatch(SERVICE, format!("unexpected record shape: {}", e))
    })?;
    Ok(StoreMatch { properties, score })
}

fn classify_graphql_errors(messages: &[&str], class: &str) -> RagError {
    let joined = messages.join("; ");
    let missing_class = format!("Cannot query field \"{}\"", class);

    if messages.iter().any(|m| m.contains(&missing_class)) {
        RagError::external(
            SERVICE,
            format!(
                "collection '{}' does not exist; run `pdfrag init` ({})",
                class, joined
            ),
        )
    } else if messages
        .iter()
        .any(|m| m.contains("Cannot query field") || m.contains("Unknown argument"))
    {
        RagError::mismatch(SERVICE, joined)
    } else if messages.iter().any(|m| is_filter_rejection(m)) {
        RagError::query(joined)
    } else {
        RagError::external(SERVICE, joined)
    }
}

/// Weaviate's wording when it refuses a `where` clause. Anything else,
/// including failures during a filtered search, is a store failure.
fn is_filter_rejection(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    m.contains("invalid 'where' filter") || m.contains("no such prop with name")
}
