//! Whole-collection listing with fixed-size client-side pages.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    Record,
    error::{GatewayError, MALFORMED_RESPONSE, ProgrammingError, Result},
    gateway::Gateway,
    schema::{ID_KEY, TableSchema, id_to_path},
};

pub const PAGE_SIZE: usize = 10;

/// Number of pages for `count` records; never less than one.
pub fn total_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size).max(1)
}

pub fn page_slice(records: &[Record], page: usize, page_size: usize) -> &[Record] {
    let start = page.saturating_sub(1).saturating_mul(page_size).min(records.len());
    let end = start.saturating_add(page_size).min(records.len());
    &records[start..end]
}

fn malformed() -> GatewayError {
    GatewayError::Transport {
        message: MALFORMED_RESPONSE.to_string(),
    }
}

fn into_records(items: Vec<Value>) -> std::result::Result<Vec<Record>, GatewayError> {
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            _ => Err(malformed()),
        })
        .collect()
}

/// Accepts both a bare array and a `{data: [...]}` envelope.
pub fn parse_collection(body: Value) -> std::result::Result<Vec<Record>, GatewayError> {
    match body {
        Value::Array(items) => into_records(items),
        Value::Object(mut envelope) => match envelope.remove("data") {
            Some(Value::Array(items)) => into_records(items),
            _ => Err(malformed()),
        },
        _ => Err(malformed()),
    }
}

/// Accepts both a bare object and a `{data: {...}}` envelope.
pub fn parse_record(body: Value) -> std::result::Result<Record, GatewayError> {
    match body {
        Value::Object(mut record) => match record.remove("data") {
            Some(Value::Object(inner)) => Ok(inner),
            Some(other) => {
                record.insert("data".to_string(), other);
                Ok(record)
            }
            None => Ok(record),
        },
        _ => Err(malformed()),
    }
}

/// Detail view fetch: `GET /{resource}/{id}`.
pub async fn fetch_record(gateway: &Gateway, schema: &TableSchema, id: &str) -> Result<Record> {
    let body = gateway.get(&schema.endpoint_item(id)?).await?;
    Ok(parse_record(body)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    Idle,
    Loading,
    Deleting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(usize),
    Ignored,
    Stale,
}

/// A delete the user has been asked to confirm. Dropping it declines.
#[derive(Debug)]
#[must_use = "a pending delete does nothing until confirmed"]
pub struct PendingDelete {
    table_id: String,
    id: String,
}

impl PendingDelete {
    pub fn id(&self) -> &str {
        &self.id
    }
}

pub struct ListController<'a> {
    schema: &'a TableSchema,
    records: Vec<Record>,
    page: usize,
    state: ListState,
    generation: u64,
}

impl<'a> ListController<'a> {
    pub fn new(schema: &'a TableSchema) -> Self {
        Self {
            schema,
            records: Vec::new(),
            page: 1,
            state: ListState::Idle,
            generation: 0,
        }
    }

    pub fn schema(&self) -> &'a TableSchema {
        self.schema
    }

    pub fn state(&self) -> ListState {
        self.state
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.records.len(), PAGE_SIZE)
    }

    /// Moves to page `n`, clamped into `[1, total_pages]`.
    pub fn set_page(&mut self, n: usize) {
        self.page = n.clamp(1, self.total_pages());
    }

    pub fn page_records(&self) -> &[Record] {
        page_slice(&self.records, self.page, PAGE_SIZE)
    }

    /// Returns `None` while another request from this list is in flight.
    pub fn begin_load(&mut self) -> Option<LoadTicket> {
        if self.state != ListState::Idle {
            debug!("{} list busy, ignoring reload", self.schema.id);
            return None;
        }
        self.state = ListState::Loading;
        Some(LoadTicket {
            generation: self.generation,
        })
    }

    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: std::result::Result<Value, GatewayError>,
    ) -> Result<LoadOutcome> {
        if ticket.generation != self.generation || self.state != ListState::Loading {
            debug!("Dropping stale load of {}", self.schema.id);
            return Ok(LoadOutcome::Stale);
        }
        self.state = ListState::Idle;
        let records = parse_collection(result?)?;
        info!("Loaded {} {} records", records.len(), self.schema.id);
        self.records = records;
        self.set_page(self.page);
        Ok(LoadOutcome::Loaded(self.records.len()))
    }

    #[tracing::instrument(skip_all, fields(table = %self.schema.id))]
    pub async fn load(&mut self, gateway: &Gateway) -> Result<LoadOutcome> {
        let Some(ticket) = self.begin_load() else {
            return Ok(LoadOutcome::Ignored);
        };
        let result = gateway.get(&self.schema.endpoint_collection()).await;
        self.complete_load(ticket, result)
    }

    /// First half of a delete; the caller must get the user's confirmation
    /// before passing the result to [`ListController::confirm_delete`].
    pub fn request_delete(&self, record: &Record) -> Result<PendingDelete> {
        if self.schema.read_only {
            return Err(ProgrammingError::ReadOnlyTable(self.schema.id.clone()).into());
        }
        let id = record
            .get(ID_KEY)
            .and_then(id_to_path)
            .ok_or(ProgrammingError::MissingRecordId)?;
        self.schema.endpoint_item(&id)?;
        Ok(PendingDelete {
            table_id: self.schema.id.clone(),
            id,
        })
    }

    /// Deletes the record, then reloads the whole collection.
    ///
    /// Returns `Ok(false)` when the list was busy and nothing was sent.
    #[tracing::instrument(skip_all, fields(table = %self.schema.id, id = %pending.id))]
    pub async fn confirm_delete(
        &mut self,
        gateway: &Gateway,
        pending: PendingDelete,
    ) -> Result<bool> {
        if pending.table_id != self.schema.id {
            return Err(ProgrammingError::InvalidState {
                state: "showing another table",
                action: "delete",
            }
            .into());
        }
        if self.state != ListState::Idle {
            debug!("{} list busy, ignoring delete", self.schema.id);
            return Ok(false);
        }
        let path = self.schema.endpoint_item(&pending.id)?;
        self.state = ListState::Deleting;
        let result = gateway.delete(&path).await;
        self.state = ListState::Idle;
        if let Err(e) = result {
            warn!("Delete failed: {e}");
            return Err(e.into());
        }
        info!("Deleted {} {}", self.schema.id, pending.id);
        self.load(gateway).await?;
        Ok(true)
    }

    /// Detaches the view: any response still in flight becomes stale.
    pub fn close(&mut self) {
        self.generation += 1;
        self.state = ListState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::lookup;

    fn numbered(n: usize) -> Value {
        Value::Array((1..=n).map(|i| json!({"id": i})).collect())
    }

    fn loaded(n: usize) -> ListController<'static> {
        let mut list = ListController::new(lookup("productos").unwrap());
        let ticket = list.begin_load().unwrap();
        list.complete_load(ticket, Ok(numbered(n))).unwrap();
        list
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, PAGE_SIZE), 1);
        assert_eq!(total_pages(1, PAGE_SIZE), 1);
        assert_eq!(total_pages(10, PAGE_SIZE), 1);
        assert_eq!(total_pages(11, PAGE_SIZE), 2);
        assert_eq!(total_pages(25, PAGE_SIZE), 3);
    }

    #[test]
    fn test_empty_list_has_one_empty_page() {
        let mut list = loaded(0);
        assert_eq!(list.total_pages(), 1);
        list.set_page(4);
        assert_eq!(list.page(), 1);
        assert!(list.page_records().is_empty());
    }

    #[test]
    fn test_set_page_clamps() {
        let mut list = loaded(25);
        assert_eq!(list.total_pages(), 3);
        list.set_page(99);
        assert_eq!(list.page(), 3);
        assert_eq!(list.page_records().len(), 5);
        assert_eq!(list.page_records()[0]["id"], json!(21));
        list.set_page(0);
        assert_eq!(list.page(), 1);
        assert_eq!(list.page_records().len(), 10);
    }

    #[test]
    fn test_reload_keeps_page_in_range() {
        let mut list = loaded(25);
        list.set_page(3);
        let ticket = list.begin_load().unwrap();
        list.complete_load(ticket, Ok(numbered(12))).unwrap();
        assert_eq!(list.page(), 2);
    }

    #[test]
    fn test_both_collection_shapes_parse_identically() {
        let bare = parse_collection(json!([{"id": 1}, {"id": 2}])).unwrap();
        let enveloped = parse_collection(json!({"data": [{"id": 1}, {"id": 2}]})).unwrap();
        assert_eq!(bare.len(), 2);
        assert_eq!(bare, enveloped);
    }

    #[test]
    fn test_malformed_collections_rejected() {
        for body in [json!({"rows": []}), json!("ok"), json!([1, 2]), Value::Null] {
            assert_eq!(parse_collection(body).unwrap_err().status(), 0);
        }
    }

    #[test]
    fn test_parse_record_shapes() {
        assert_eq!(parse_record(json!({"id": 1})).unwrap()["id"], json!(1));
        assert_eq!(parse_record(json!({"data": {"id": 2}})).unwrap()["id"], json!(2));
        assert!(parse_record(json!([])).is_err());
    }

    #[test]
    fn test_duplicate_load_ignored_and_stale_after_close() {
        let mut list = ListController::new(lookup("roles").unwrap());
        let ticket = list.begin_load().unwrap();
        assert_eq!(list.begin_load(), None);
        list.close();
        assert_eq!(
            list.complete_load(ticket, Ok(numbered(3))).unwrap(),
            LoadOutcome::Stale
        );
        assert!(list.records().is_empty());
    }

    #[test]
    fn test_failed_load_returns_to_idle() {
        let mut list = ListController::new(lookup("roles").unwrap());
        let ticket = list.begin_load().unwrap();
        let err = list
            .complete_load(
                ticket,
                Err(GatewayError::Transport {
                    message: "connection failed".into(),
                }),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "connection failed");
        assert_eq!(list.state(), ListState::Idle);
    }

    #[test]
    fn test_request_delete_guards() {
        let views = ListController::new(lookup("novedades_vistas").unwrap());
        let row = json!({"id": 1}).as_object().cloned().unwrap();
        assert!(matches!(
            views.request_delete(&row),
            Err(crate::Error::Programming(ProgrammingError::ReadOnlyTable(_)))
        ));

        let products = ListController::new(lookup("productos").unwrap());
        let pending = products.request_delete(&row).unwrap();
        assert_eq!(pending.id(), "1");
        let no_id = json!({"nombre": "x"}).as_object().cloned().unwrap();
        assert!(products.request_delete(&no_id).is_err());
    }
}
