use axum::http::Method;
use serde::Deserialize;
use serde_json::Value;

use crate::database::EntityRecord;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::types::RecordId;

/// HTTP verbs a resource controller dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl TryFrom<&Method> for Verb {
    type Error = ApiError;

    fn try_from(method: &Method) -> Result<Self, Self::Error> {
        if method == Method::GET {
            Ok(Verb::Get)
        } else if method == Method::POST {
            Ok(Verb::Post)
        } else if method == Method::PUT {
            Ok(Verb::Put)
        } else if method == Method::PATCH {
            Ok(Verb::Patch)
        } else if method == Method::DELETE {
            Ok(Verb::Delete)
        } else {
            Err(ApiError::bad_request(format!("Unsupported method {}", method)))
        }
    }
}

/// Query string accepted by every collection read
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i32>,
    pub offset: Option<i32>,
    /// `title desc`, `-id`, or comma-separated combinations
    pub order: Option<String>,
    /// JSON text in the where language
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    /// Comma-separated column list
    pub select: Option<String>,
}

impl ListQuery {
    pub fn into_filter_data(self) -> Result<FilterData, ApiError> {
        let where_clause = match self.where_clause.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(
                serde_json::from_str::<Value>(text)
                    .map_err(|e| ApiError::invalid_json(format!("Invalid where parameter: {}", e)))?,
            ),
        };
        let select = self.select.map(|s| {
            s.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
        });

        Ok(FilterData {
            select,
            where_clause,
            order: self.order.filter(|o| !o.trim().is_empty()).map(Value::String),
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// One request as a controller sees it
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub verb: Verb,
    pub id: Option<RecordId>,
    pub payload: Option<Value>,
    pub filters: FilterData,
}

impl ResourceRequest {
    pub fn new(verb: Verb) -> Self {
        Self {
            verb,
            id: None,
            payload: None,
            filters: FilterData::default(),
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_filters(mut self, filters: FilterData) -> Self {
        self.filters = filters;
        self
    }

    /// Payload as a record, rejecting missing or non-object bodies
    pub fn record(&self) -> Result<EntityRecord, ApiError> {
        let payload = self
            .payload
            .clone()
            .ok_or_else(|| ApiError::invalid_json("Request body is required"))?;
        Ok(EntityRecord::from_payload(payload)?)
    }

    /// Payload for an update, with its `id` reconciled against the path
    pub fn update_record(&self) -> Result<EntityRecord, ApiError> {
        let mut record = self.record()?;
        match (self.id, record.id()) {
            (Some(path), Some(body)) if path != body => {
                return Err(ApiError::bad_request(format!(
                    "Payload id {} does not match path id {}",
                    body, path
                )));
            }
            (Some(path), None) => {
                record.set("id", path);
            }
            _ => {}
        }
        Ok(record)
    }
}

/// Terminal states of a controller call; failures travel as `ApiError`
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceResponse {
    Data(Value),
    Created(Value),
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_string_becomes_filter_data() {
        let query = ListQuery {
            limit: Some(5),
            offset: None,
            order: Some("-id".into()),
            where_clause: Some(r#"{"title":{"$like":"D%"}}"#.into()),
            select: Some("id, title".into()),
        };
        let data = query.into_filter_data().unwrap();
        assert_eq!(data.where_clause, Some(json!({ "title": { "$like": "D%" } })));
        assert_eq!(data.order, Some(json!("-id")));
        assert_eq!(data.select, Some(vec!["id".to_string(), "title".to_string()]));
        assert_eq!(data.limit, Some(5));
    }

    #[test]
    fn malformed_where_is_rejected() {
        let query = ListQuery { where_clause: Some("{title".into()), ..Default::default() };
        assert_eq!(query.into_filter_data().unwrap_err().error_code(), "INVALID_JSON");
    }

    #[test]
    fn update_record_takes_id_from_path() {
        let request = ResourceRequest::new(Verb::Patch).with_id(4).with_payload(json!({ "title": "x" }));
        assert_eq!(request.update_record().unwrap().id(), Some(4));

        let conflicting = ResourceRequest::new(Verb::Put).with_id(4).with_payload(json!({ "id": 5 }));
        assert_eq!(conflicting.update_record().unwrap_err().status_code(), 400);
    }
}
