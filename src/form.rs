//! Create/edit form state machine.
//!
//! ```text
//! Closed -> Creating -> Submitting -> Closed
//! Closed -> Editing  -> Submitting -> Closed
//! Submitting -> Creating/Editing   (on failure)
//! any -> Closed                    (cancel)
//! ```
//!
//! The draft is a private working copy. Nothing reaches the backend until
//! [`FormController::submit`] (or the `begin_submit`/`complete_submit` pair)
//! runs, so cancelling never has anything to roll back.

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    Record,
    error::{Error, GatewayError, ProgrammingError, Result, ValidationError},
    field::{self, FieldBinding, FieldInput},
    gateway::Gateway,
    schema::{ID_KEY, PASSWORD_KEY, TableSchema, id_to_path},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Creating,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Closed,
    Creating,
    Editing,
    Submitting { resume: Mode },
}

impl FormState {
    fn name(&self) -> &'static str {
        match self {
            FormState::Closed => "closed",
            FormState::Creating => "creating",
            FormState::Editing => "editing",
            FormState::Submitting { .. } => "submitting",
        }
    }

    fn mode(&self) -> Option<Mode> {
        match self {
            FormState::Creating => Some(Mode::Creating),
            FormState::Editing => Some(Mode::Editing),
            _ => None,
        }
    }
}

impl From<Mode> for FormState {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Creating => FormState::Creating,
            Mode::Editing => FormState::Editing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormDraft {
    pub table_id: String,
    pub editing_record: Option<Record>,
    pub values: Record,
}

/// Ties a completion to the form session that started the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitTicket {
    generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub ticket: SubmitTicket,
    pub method: Method,
    pub path: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The backend accepted the record; the list should be reloaded.
    Saved(Value),
    /// A submit was already in flight.
    Ignored,
    /// The form was closed or reopened before the response arrived.
    Stale,
}

/// Fails on the first required field, in schema order, that is blank.
pub fn validate(schema: &TableSchema, values: &Record) -> std::result::Result<(), ValidationError> {
    for field in schema.fields.iter().filter(|f| f.required && f.key != ID_KEY) {
        if field::is_blank(values.get(&field.key)) {
            return Err(ValidationError::MissingRequiredField {
                key: field.key.clone(),
                label: field.label.clone(),
            });
        }
    }
    Ok(())
}

/// Copy of the draft values fit for POST/PUT: never carries `id`, and
/// carries `clave` only when a new password was typed.
pub fn build_payload(values: &Record) -> Record {
    let mut payload = values.clone();
    payload.remove(ID_KEY);
    if matches!(payload.get(PASSWORD_KEY), Some(Value::String(s)) if s.is_empty()) {
        payload.remove(PASSWORD_KEY);
    }
    payload
}

pub struct FormController<'a> {
    state: FormState,
    schema: Option<&'a TableSchema>,
    draft: Option<FormDraft>,
    generation: u64,
}

impl Default for FormController<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> FormController<'a> {
    pub fn new() -> Self {
        Self {
            state: FormState::Closed,
            schema: None,
            draft: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn draft(&self) -> Option<&FormDraft> {
        self.draft.as_ref()
    }

    fn ensure_closed(&self, action: &'static str) -> Result<()> {
        if self.state != FormState::Closed {
            return Err(ProgrammingError::InvalidState {
                state: self.state.name(),
                action,
            }
            .into());
        }
        Ok(())
    }

    fn open(&mut self, schema: &'a TableSchema, draft: FormDraft, mode: Mode) {
        self.generation += 1;
        self.schema = Some(schema);
        self.draft = Some(draft);
        self.state = mode.into();
    }

    pub fn open_create(&mut self, schema: &'a TableSchema) -> Result<()> {
        if schema.read_only {
            return Err(ProgrammingError::ReadOnlyTable(schema.id.clone()).into());
        }
        self.ensure_closed("open a form")?;
        let values = schema
            .fields
            .iter()
            .map(|f| (f.key.clone(), field::default_value(f)))
            .collect();
        self.open(
            schema,
            FormDraft {
                table_id: schema.id.clone(),
                editing_record: None,
                values,
            },
            Mode::Creating,
        );
        Ok(())
    }

    pub fn open_edit(&mut self, schema: &'a TableSchema, record: &Record) -> Result<()> {
        if schema.read_only {
            return Err(ProgrammingError::ReadOnlyTable(schema.id.clone()).into());
        }
        self.ensure_closed("open a form")?;
        if record.get(ID_KEY).and_then(id_to_path).is_none() {
            return Err(ProgrammingError::MissingRecordId.into());
        }
        self.open(
            schema,
            FormDraft {
                table_id: schema.id.clone(),
                editing_record: Some(record.clone()),
                values: record.clone(),
            },
            Mode::Editing,
        );
        Ok(())
    }

    fn editable(&mut self, action: &'static str) -> Result<(&'a TableSchema, &mut FormDraft)> {
        match (self.state.mode(), self.schema, self.draft.as_mut()) {
            (Some(_), Some(schema), Some(draft)) => Ok((schema, draft)),
            _ => Err(ProgrammingError::InvalidState {
                state: self.state.name(),
                action,
            }
            .into()),
        }
    }

    pub fn set_field(&mut self, key: &str, value: Value) -> Result<()> {
        let (schema, draft) = self.editable("edit a field")?;
        if schema.field(key).is_none() {
            return Err(ValidationError::UnknownField(key.to_string()).into());
        }
        draft.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Applies a widget event through the field's coercion rule.
    pub fn change(&mut self, key: &str, input: FieldInput) -> Result<Value> {
        let (schema, draft) = self.editable("edit a field")?;
        let field = schema
            .field(key)
            .ok_or_else(|| ValidationError::UnknownField(key.to_string()))?;
        let current = draft.values.get(key).cloned().unwrap_or(Value::Null);
        let value = field::render(field, &current, false).change(input)?;
        draft.values.insert(key.to_string(), value.clone());
        Ok(value)
    }

    /// Widget bindings for every field of the open draft.
    pub fn bindings(&self) -> Vec<FieldBinding<'a>> {
        let (Some(schema), Some(draft)) = (self.schema, self.draft.as_ref()) else {
            return Vec::new();
        };
        let inert = matches!(self.state, FormState::Submitting { .. });
        schema
            .fields
            .iter()
            .map(|f| {
                let value = draft.values.get(&f.key).cloned().unwrap_or(Value::Null);
                field::render(f, &value, inert)
            })
            .collect()
    }

    /// Discards the draft. Any response still in flight becomes stale.
    pub fn cancel(&mut self) {
        if self.state != FormState::Closed {
            debug!("Discarding {} draft", self.state.name());
        }
        self.close();
    }

    fn close(&mut self) {
        self.generation += 1;
        self.state = FormState::Closed;
        self.schema = None;
        self.draft = None;
    }

    /// Validates and moves into `Submitting`.
    ///
    /// Returns `Ok(None)` while a previous submit is still in flight.
    pub fn begin_submit(&mut self) -> Result<Option<SubmitRequest>> {
        if matches!(self.state, FormState::Submitting { .. }) {
            debug!("Submit already in flight, ignoring");
            return Ok(None);
        }
        let (schema, draft) = self.editable("submit")?;
        validate(schema, &draft.values)?;
        let payload = Value::Object(build_payload(&draft.values));
        let (method, path, resume) = match &draft.editing_record {
            Some(record) => {
                let id = record
                    .get(ID_KEY)
                    .and_then(id_to_path)
                    .ok_or(ProgrammingError::MissingRecordId)?;
                (Method::PUT, schema.endpoint_item(&id)?, Mode::Editing)
            }
            None => (Method::POST, schema.endpoint_collection(), Mode::Creating),
        };
        self.state = FormState::Submitting { resume };
        Ok(Some(SubmitRequest {
            ticket: SubmitTicket {
                generation: self.generation,
            },
            method,
            path,
            payload,
        }))
    }

    /// Applies the backend's answer to a submit started by `begin_submit`.
    ///
    /// On failure the draft is kept and the form returns to the state it
    /// was submitted from; the error carries the server's message if any.
    pub fn complete_submit(
        &mut self,
        ticket: SubmitTicket,
        result: std::result::Result<Value, GatewayError>,
    ) -> Result<SubmitOutcome> {
        let resume = match self.state {
            FormState::Submitting { resume } if ticket.generation == self.generation => resume,
            _ => {
                debug!("Dropping stale submit completion");
                return Ok(SubmitOutcome::Stale);
            }
        };
        match result {
            Ok(saved) => {
                info!(
                    "Saved {} record",
                    self.draft.as_ref().map_or("", |d| d.table_id.as_str())
                );
                self.close();
                Ok(SubmitOutcome::Saved(saved))
            }
            Err(e) => {
                warn!("Submit failed: {e}");
                self.state = resume.into();
                Err(Error::Gateway(e))
            }
        }
    }

    pub async fn submit(&mut self, gateway: &Gateway) -> Result<SubmitOutcome> {
        let Some(request) = self.begin_submit()? else {
            return Ok(SubmitOutcome::Ignored);
        };
        let result = gateway
            .request(request.method, &request.path, Some(&request.payload))
            .await;
        self.complete_submit(request.ticket, result)
    }
}
