//! Schema introspection and normalization.
//!
//! The platform exposes the same DocType metadata through two structurally
//! different endpoints: a combined bundle (DocType + fields + permissions in
//! one response) and the DocType's own document (whose `fields` and
//! `permissions` child tables carry the same records). Both shapes are
//! reconciled into one [`CanonicalSchema`]; field order always matches the
//! upstream declaration order regardless of which path produced it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::channel::{Channel, ListQuery};
use crate::error::{translate, DocError, ValidationError};

/// Combined metadata endpoint; returns DocType, fields and permissions in
/// one bundle under `docs`.
const META_BUNDLE_METHOD: &str = "frappe.desk.form.load.getdoctype";

/// Maximum documents fetched when resolving Link field options.
const LINK_OPTION_LIMIT: u64 = 50;

/// Normalized DocType schema, identical regardless of fetch path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSchema {
    pub name: String,
    pub label: String,
    pub module: Option<String>,
    pub flags: SchemaFlags,
    /// In upstream declaration order.
    pub fields: Vec<FieldDescriptor>,
    pub permissions: Vec<Value>,
    pub naming: NamingMetadata,
    pub workflow: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaFlags {
    pub single: bool,
    pub table: bool,
    pub custom: bool,
    pub submittable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamingMetadata {
    pub autoname: Option<String>,
    pub naming_rule: Option<String>,
}

/// Normalized field record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub fieldname: String,
    pub label: Option<String>,
    pub field_type: String,
    pub required: bool,
    pub default: Option<Value>,
    pub options: Option<String>,
    /// Target doctype when `field_type` is `Link`.
    pub linked_doctype: Option<String>,
    /// Child doctype when `field_type` is `Table`.
    pub child_doctype: Option<String>,
    pub in_list_view: bool,
    pub bold: bool,
    pub hidden: bool,
    pub read_only: bool,
}

/// One selectable value for a Link or Select field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

/// Fetches and reconciles DocType metadata; derives field-option lookups.
pub struct SchemaService {
    channel: Arc<dyn Channel>,
}

impl SchemaService {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }

    /// Fetch the canonical schema for a doctype.
    ///
    /// The combined metadata endpoint is tried first; when it is
    /// unavailable or errors, an equivalent schema is reconstructed from
    /// the DocType fetched as a plain document. Fails with
    /// [`DocError::SchemaUnavailable`] only when both strategies fail.
    pub async fn get_schema(&self, doctype: &str) -> Result<CanonicalSchema, DocError> {
        require_non_empty(doctype, ValidationError::EmptyDoctype)?;

        let meta_error = match self.schema_from_meta_bundle(doctype).await {
            Ok(schema) => return Ok(schema),
            Err(error) => error,
        };

        debug!(doctype, error = %meta_error, "metadata endpoint unavailable, reconstructing from DocType document");

        match self.schema_from_doctype_document(doctype).await {
            Ok(schema) => Ok(schema),
            Err(doc_error) => Err(DocError::SchemaUnavailable {
                doctype: doctype.to_owned(),
                detail: format!("metadata endpoint: {meta_error}; doctype document: {doc_error}"),
            }),
        }
    }

    async fn schema_from_meta_bundle(&self, doctype: &str) -> Result<CanonicalSchema, DocError> {
        let params = json!({ "doctype": doctype, "with_parent": 1 });
        let bundle = self
            .channel
            .call(META_BUNDLE_METHOD, Some(&params))
            .await
            .map_err(|e| translate(e, "get_schema"))?;

        let docs = bundle
            .get("docs")
            .and_then(Value::as_array)
            .ok_or_else(|| bundle_shape_error(doctype, "missing 'docs' array"))?;

        let raw = docs
            .iter()
            .find(|doc| doc.get("name").and_then(Value::as_str) == Some(doctype))
            .or_else(|| docs.first())
            .ok_or_else(|| bundle_shape_error(doctype, "empty 'docs' array"))?;

        build_schema(doctype, raw).ok_or_else(|| bundle_shape_error(doctype, "missing 'fields' array"))
    }

    async fn schema_from_doctype_document(&self, doctype: &str) -> Result<CanonicalSchema, DocError> {
        let raw = self
            .channel
            .get_doc("DocType", doctype, None)
            .await
            .map_err(|e| translate(e, "get_schema"))?;

        build_schema(doctype, &raw).ok_or_else(|| bundle_shape_error(doctype, "missing 'fields' array"))
    }

    /// Resolve the selectable options for a field.
    ///
    /// Link fields query up to [`LINK_OPTION_LIMIT`] documents of the
    /// linked doctype and compose `"<name> - <display>"` labels; Select
    /// fields split their newline-delimited options string; Table and all
    /// other field types yield an empty sequence.
    pub async fn get_field_options(
        &self,
        doctype: &str,
        fieldname: &str,
        filters: Option<Value>,
    ) -> Result<Vec<FieldOption>, DocError> {
        require_non_empty(doctype, ValidationError::EmptyDoctype)?;
        require_non_empty(fieldname, ValidationError::EmptyFieldname)?;

        let schema = self.get_schema(doctype).await?;
        let field = schema
            .fields
            .iter()
            .find(|f| f.fieldname == fieldname)
            .ok_or_else(|| DocError::UnknownField {
                doctype: doctype.to_owned(),
                fieldname: fieldname.to_owned(),
            })?;

        match field.field_type.as_str() {
            "Link" => self.link_options(field, filters).await,
            "Select" => Ok(select_options(field.options.as_deref().unwrap_or_default())),
            _ => Ok(Vec::new()),
        }
    }

    async fn link_options(
        &self,
        field: &FieldDescriptor,
        filters: Option<Value>,
    ) -> Result<Vec<FieldOption>, DocError> {
        let Some(target) = field.linked_doctype.as_deref() else {
            return Ok(Vec::new());
        };

        match self.labeled_link_options(target, filters.clone()).await {
            Ok(options) => Ok(options),
            Err(error) => {
                warn!(target, %error, "labeled link query failed, falling back to name-only options");
                self.name_only_link_options(target, filters).await
            }
        }
    }

    async fn labeled_link_options(
        &self,
        target: &str,
        filters: Option<Value>,
    ) -> Result<Vec<FieldOption>, DocError> {
        let schema = self.get_schema(target).await?;
        let display = display_field(&schema);

        let mut fields = vec![String::from("name")];
        if let Some(display) = &display {
            fields.push(display.clone());
        }

        let mut query = ListQuery::default().with_limit(LINK_OPTION_LIMIT);
        query.fields = Some(fields);
        query.filters = filters;

        let docs = self
            .channel
            .get_doc_list(target, query)
            .await
            .map_err(|e| translate(e, "get_field_options"))?;

        Ok(docs
            .iter()
            .filter_map(|doc| {
                let name = doc.get("name").and_then(Value::as_str)?;
                let label = display
                    .as_deref()
                    .and_then(|d| doc.get(d))
                    .and_then(Value::as_str)
                    .filter(|text| !text.is_empty())
                    .map(|text| format!("{name} - {text}"))
                    .unwrap_or_else(|| name.to_owned());
                Some(FieldOption {
                    value: name.to_owned(),
                    label,
                })
            })
            .collect())
    }

    async fn name_only_link_options(
        &self,
        target: &str,
        filters: Option<Value>,
    ) -> Result<Vec<FieldOption>, DocError> {
        let mut query = ListQuery::default()
            .with_fields(["name"])
            .with_limit(LINK_OPTION_LIMIT);
        query.filters = filters;

        let docs = self
            .channel
            .get_doc_list(target, query)
            .await
            .map_err(|e| translate(e, "get_field_options"))?;

        Ok(docs
            .iter()
            .filter_map(|doc| doc.get("name").and_then(Value::as_str))
            .map(|name| FieldOption {
                value: name.to_owned(),
                label: name.to_owned(),
            })
            .collect())
    }
}

fn require_non_empty(value: &str, error: ValidationError) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error);
    }
    Ok(())
}

fn bundle_shape_error(doctype: &str, detail: &str) -> DocError {
    DocError::Upstream {
        operation: String::from("get_schema"),
        status: None,
        endpoint: None,
        message: format!("unexpected schema payload for '{doctype}': {detail}"),
    }
}

/// Build a canonical schema from either raw shape. Both the bundle entry
/// and the DocType document carry `fields`/`permissions` arrays with the
/// same records, so one builder serves both strategies.
fn build_schema(doctype: &str, raw: &Value) -> Option<CanonicalSchema> {
    let fields = raw.get("fields")?.as_array()?;

    let permissions = raw
        .get("permissions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Some(CanonicalSchema {
        name: text(raw, "name").unwrap_or_else(|| doctype.to_owned()),
        label: text(raw, "label").unwrap_or_else(|| doctype.to_owned()),
        module: text(raw, "module"),
        flags: SchemaFlags {
            single: flag(raw.get("issingle")),
            table: flag(raw.get("istable")),
            custom: flag(raw.get("custom")),
            submittable: flag(raw.get("is_submittable")),
        },
        fields: fields.iter().filter_map(field_descriptor).collect(),
        permissions,
        naming: NamingMetadata {
            autoname: text(raw, "autoname"),
            naming_rule: text(raw, "naming_rule"),
        },
        workflow: text(raw, "workflow"),
    })
}

fn field_descriptor(raw: &Value) -> Option<FieldDescriptor> {
    let fieldname = text(raw, "fieldname")?;
    let field_type = text(raw, "fieldtype").unwrap_or_else(|| String::from("Data"));
    let options = text(raw, "options");

    let linked_doctype = (field_type == "Link").then(|| options.clone()).flatten();
    let child_doctype = (field_type == "Table").then(|| options.clone()).flatten();

    Some(FieldDescriptor {
        fieldname,
        label: text(raw, "label"),
        required: flag(raw.get("reqd")),
        default: raw.get("default").filter(|v| !v.is_null()).cloned(),
        options,
        linked_doctype,
        child_doctype,
        in_list_view: flag(raw.get("in_list_view")),
        bold: flag(raw.get("bold")),
        hidden: flag(raw.get("hidden")),
        read_only: flag(raw.get("read_only")),
        field_type,
    })
}

/// Normalize the platform's numeric 0/1 flags (which also arrive as
/// strings or booleans) to a plain bool.
fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => s == "1",
        _ => false,
    }
}

fn text(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Display field for Link labels: the first field literally named `title`,
/// else the first field flagged bold.
fn display_field(schema: &CanonicalSchema) -> Option<String> {
    schema
        .fields
        .iter()
        .find(|f| f.fieldname == "title")
        .or_else(|| schema.fields.iter().find(|f| f.bold))
        .map(|f| f.fieldname.clone())
}

/// Split a Select field's newline-delimited options string into distinct,
/// trimmed, non-blank entries, preserving source order.
fn select_options(options: &str) -> Vec<FieldOption> {
    let mut seen: Vec<&str> = Vec::new();
    options
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            if seen.contains(line) {
                false
            } else {
                seen.push(line);
                true
            }
        })
        .map(|line| FieldOption {
            value: line.to_owned(),
            label: line.to_owned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_fields() -> Value {
        json!([
            {
                "fieldname": "title",
                "label": "Title",
                "fieldtype": "Data",
                "reqd": 1,
                "bold": 0,
                "in_list_view": "1"
            },
            {
                "fieldname": "status",
                "label": "Status",
                "fieldtype": "Select",
                "options": "Open\nClosed"
            },
            {
                "fieldname": "customer",
                "label": "Customer",
                "fieldtype": "Link",
                "options": "Customer"
            },
            {
                "fieldname": "items",
                "label": "Items",
                "fieldtype": "Table",
                "options": "Sales Order Item"
            }
        ])
    }

    #[test]
    fn flags_normalize_numbers_strings_and_bools() {
        assert!(flag(Some(&json!(1))));
        assert!(flag(Some(&json!("1"))));
        assert!(flag(Some(&json!(true))));
        assert!(!flag(Some(&json!(0))));
        assert!(!flag(Some(&json!("0"))));
        assert!(!flag(Some(&json!(null))));
        assert!(!flag(None));
    }

    #[test]
    fn link_and_table_fields_derive_target_doctypes() {
        let raw = json!({ "name": "Sales Order", "fields": raw_fields() });
        let schema = build_schema("Sales Order", &raw).expect("schema builds");

        let customer = &schema.fields[2];
        assert_eq!(customer.linked_doctype.as_deref(), Some("Customer"));
        assert_eq!(customer.child_doctype, None);

        let items = &schema.fields[3];
        assert_eq!(items.child_doctype.as_deref(), Some("Sales Order Item"));
        assert_eq!(items.linked_doctype, None);
    }

    #[test]
    fn field_order_matches_declaration_order() {
        let raw = json!({ "name": "Sales Order", "fields": raw_fields() });
        let schema = build_schema("Sales Order", &raw).expect("schema builds");

        let names: Vec<&str> = schema.fields.iter().map(|f| f.fieldname.as_str()).collect();
        assert_eq!(names, vec!["title", "status", "customer", "items"]);
    }

    #[test]
    fn both_raw_shapes_produce_identical_fields() {
        // The bundle entry and the DocType document differ in surrounding
        // structure but carry the same field records.
        let bundle_entry = json!({
            "name": "ToDo",
            "module": "Desk",
            "issingle": 0,
            "fields": raw_fields(),
            "permissions": [{"role": "System Manager", "read": 1}]
        });
        let doctype_document = json!({
            "name": "ToDo",
            "doctype": "DocType",
            "module": "Desk",
            "issingle": "0",
            "fields": raw_fields(),
            "permissions": [{"role": "System Manager", "read": 1}]
        });

        let from_bundle = build_schema("ToDo", &bundle_entry).expect("schema builds");
        let from_document = build_schema("ToDo", &doctype_document).expect("schema builds");

        assert_eq!(from_bundle.fields, from_document.fields);
        assert_eq!(from_bundle.flags, from_document.flags);
    }

    #[test]
    fn select_options_trim_dedupe_and_keep_order() {
        let options = select_options("Low\nMedium\n\nHigh");
        let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["Low", "Medium", "High"]);
        assert!(options.iter().all(|o| o.value == o.label));

        let deduped = select_options("  A \nB\nA\n \nB");
        let values: Vec<&str> = deduped.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["A", "B"]);
    }

    #[test]
    fn display_field_prefers_title_then_bold() {
        let raw = json!({
            "name": "Customer",
            "fields": [
                { "fieldname": "customer_name", "fieldtype": "Data", "bold": 1 },
                { "fieldname": "territory", "fieldtype": "Link", "options": "Territory" }
            ]
        });
        let schema = build_schema("Customer", &raw).expect("schema builds");
        assert_eq!(display_field(&schema).as_deref(), Some("customer_name"));

        let raw = json!({
            "name": "Project",
            "fields": [
                { "fieldname": "title", "fieldtype": "Data" },
                { "fieldname": "owner_name", "fieldtype": "Data", "bold": 1 }
            ]
        });
        let schema = build_schema("Project", &raw).expect("schema builds");
        assert_eq!(display_field(&schema).as_deref(), Some("title"));
    }
}
