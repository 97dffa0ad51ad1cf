//! Field rendering: widget selection, change coercion and display values.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Number, Value};

use crate::{
    Record,
    error::ValidationError,
    schema::{FieldDefinition, FieldKind, TableSchema},
};

/// Shown in place of absent or null data.
pub const PLACEHOLDER: &str = "—";
pub const YES: &str = "Sí";
pub const NO: &str = "No";

const DATE_PLACEHOLDER: &str = "AAAA-MM-DD";
const DATE_DISPLAY: &str = "%d/%m/%Y";
const DATETIME_DISPLAY: &str = "%d/%m/%Y %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Email,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum Widget {
    Input { input: InputKind },
    TextArea,
    Numeric,
    Toggle,
    Choice { options: Vec<String> },
    DateInput { placeholder: String },
    DateTimeInput,
    Static { text: String },
}

/// A change event coming from a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldInput {
    Text(String),
    Toggle,
    Choose(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldBinding<'a> {
    pub field: &'a FieldDefinition,
    #[serde(flatten)]
    pub widget: Widget,
    pub value: Value,
    pub editable: bool,
}

pub fn render<'a>(
    field: &'a FieldDefinition,
    current: &Value,
    read_only_override: bool,
) -> FieldBinding<'a> {
    let editable = !(field.read_only || read_only_override);
    let widget = if !editable {
        Widget::Static {
            text: display_scalar(&field.kind, Some(current)),
        }
    } else {
        match &field.kind {
            FieldKind::Text => Widget::Input {
                input: InputKind::Text,
            },
            FieldKind::Email => Widget::Input {
                input: InputKind::Email,
            },
            FieldKind::Password => Widget::Input {
                input: InputKind::Password,
            },
            FieldKind::Textarea => Widget::TextArea,
            FieldKind::Number => Widget::Numeric,
            FieldKind::Boolean => Widget::Toggle,
            FieldKind::Select { options } => Widget::Choice {
                options: options.clone(),
            },
            FieldKind::Date => Widget::DateInput {
                placeholder: field
                    .placeholder
                    .clone()
                    .unwrap_or_else(|| DATE_PLACEHOLDER.to_string()),
            },
            FieldKind::Datetime => Widget::DateTimeInput,
        }
    };
    FieldBinding {
        field,
        widget,
        value: current.clone(),
        editable,
    }
}

impl FieldBinding<'_> {
    /// Canonicalizes a widget event into the value stored in the draft.
    pub fn change(&self, input: FieldInput) -> Result<Value, ValidationError> {
        if !self.editable {
            return Err(ValidationError::ReadOnlyField(self.field.label.clone()));
        }
        let label = &self.field.label;
        match (&self.field.kind, input) {
            (
                FieldKind::Text
                | FieldKind::Email
                | FieldKind::Password
                | FieldKind::Textarea
                | FieldKind::Date
                | FieldKind::Datetime,
                FieldInput::Text(text),
            ) => Ok(Value::String(text)),
            (FieldKind::Number, FieldInput::Text(text)) => {
                if text.trim().is_empty() {
                    return Ok(Value::String(String::new()));
                }
                parse_number(&text)
                    .map(Value::Number)
                    .ok_or_else(|| ValidationError::InvalidNumber {
                        label: label.clone(),
                        input: text,
                    })
            }
            (FieldKind::Boolean, FieldInput::Toggle) => Ok(Value::Bool(!is_truthy(&self.value))),
            (FieldKind::Select { options }, FieldInput::Choose(choice)) => {
                if options.iter().any(|o| *o == choice) {
                    Ok(Value::String(choice))
                } else {
                    Err(ValidationError::InvalidOption {
                        label: label.clone(),
                        value: choice,
                    })
                }
            }
            _ => Err(ValidationError::InputMismatch {
                label: label.clone(),
            }),
        }
    }
}

/// Value a field takes in a freshly created draft.
pub fn default_value(field: &FieldDefinition) -> Value {
    match field.kind {
        FieldKind::Boolean => Value::Bool(false),
        _ => Value::String(String::new()),
    }
}

fn parse_number(value: &str) -> Option<Number> {
    // Some keyboards produce the unicode minus sign
    let value = value.replace('\u{2212}', "-");
    let value = value.trim();
    if let Ok(i) = value.parse::<i64>() {
        return Some(Number::from(i));
    }
    value.parse::<f64>().ok().and_then(Number::from_f64)
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Blank after string coercion: null, empty or whitespace-only.
pub(crate) fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_date(raw: &str, date_only: bool) -> Option<String> {
    let fmt = if date_only { DATE_DISPLAY } else { DATETIME_DISPLAY };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).format(fmt).to_string());
    }
    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(dt.format(fmt).to_string());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.format(DATE_DISPLAY).to_string())
}

pub fn display_scalar(kind: &FieldKind, value: Option<&Value>) -> String {
    let value = match value {
        None | Some(Value::Null) => return PLACEHOLDER.to_string(),
        Some(v) => v,
    };
    match kind {
        FieldKind::Boolean => {
            if is_truthy(value) {
                YES.to_string()
            } else {
                NO.to_string()
            }
        }
        FieldKind::Date | FieldKind::Datetime => {
            let raw = scalar_text(value);
            if raw.trim().is_empty() {
                return PLACEHOLDER.to_string();
            }
            format_date(raw.trim(), *kind == FieldKind::Date).unwrap_or(raw)
        }
        _ => scalar_text(value),
    }
}

/// Human-readable value of `field` for a persisted record.
pub fn display_value(schema: &TableSchema, record: &Record, field: &FieldDefinition) -> String {
    let value = record.get(&field.key);
    if let Some(label_key) = schema.foreign_key_label(&field.key) {
        if let (Some(id), Some(name)) = (value, record.get(label_key)) {
            if !id.is_null() && !is_blank(Some(name)) {
                return format!("{} ({})", scalar_text(id), scalar_text(name));
            }
        }
    }
    display_scalar(&field.kind, value)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::lookup;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_widget_per_kind() {
        let users = lookup("usuarios").unwrap();
        let widget = |key: &str| render(users.field(key).unwrap(), &json!(""), false).widget;
        assert_eq!(widget("nombre"), Widget::Input { input: InputKind::Text });
        assert_eq!(widget("email"), Widget::Input { input: InputKind::Email });
        assert_eq!(widget("clave"), Widget::Input { input: InputKind::Password });
        assert_eq!(widget("direccion"), Widget::TextArea);
        assert_eq!(widget("activo"), Widget::Toggle);
        assert_eq!(
            widget("rol"),
            Widget::Choice {
                options: vec!["administrador".into(), "productor".into(), "comprador".into()]
            }
        );
        let news = lookup("novedades").unwrap();
        assert_eq!(
            render(news.field("fecha_publicacion").unwrap(), &json!(""), false).widget,
            Widget::DateInput { placeholder: "AAAA-MM-DD".into() }
        );
    }

    #[test]
    fn test_read_only_renders_static() {
        let users = lookup("usuarios").unwrap();
        let id = render(users.field("id").unwrap(), &json!(4), false);
        assert!(!id.editable);
        assert_eq!(id.widget, Widget::Static { text: "4".into() });

        let name = render(users.field("nombre").unwrap(), &json!("Ana"), true);
        assert_eq!(name.widget, Widget::Static { text: "Ana".into() });
        assert_eq!(
            name.change(FieldInput::Text("Eva".into())),
            Err(ValidationError::ReadOnlyField("Nombre".into()))
        );
    }

    #[test]
    fn test_number_coercion() {
        let products = lookup("productos").unwrap();
        let price = products.field("precio").unwrap();
        let binding = render(price, &json!(""), false);
        assert_eq!(binding.change(FieldInput::Text("".into())), Ok(json!("")));
        assert_eq!(binding.change(FieldInput::Text("42".into())), Ok(json!(42)));
        assert_eq!(binding.change(FieldInput::Text(" 3.5 ".into())), Ok(json!(3.5)));
        assert_eq!(binding.change(FieldInput::Text("\u{2212}2".into())), Ok(json!(-2)));
        assert!(matches!(
            binding.change(FieldInput::Text("doce".into())),
            Err(ValidationError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_toggle_negates_current() {
        let users = lookup("usuarios").unwrap();
        let active = users.field("activo").unwrap();
        assert_eq!(
            render(active, &json!(false), false).change(FieldInput::Toggle),
            Ok(json!(true))
        );
        assert_eq!(render(active, &json!(1), false).change(FieldInput::Toggle), Ok(json!(false)));
        assert!(matches!(
            render(active, &json!(false), false).change(FieldInput::Text("x".into())),
            Err(ValidationError::InputMismatch { .. })
        ));
    }

    #[test]
    fn test_select_requires_exact_option() {
        let users = lookup("usuarios").unwrap();
        let role = render(users.field("rol").unwrap(), &json!(""), false);
        assert_eq!(role.change(FieldInput::Choose("productor".into())), Ok(json!("productor")));
        assert!(matches!(
            role.change(FieldInput::Choose("Productor".into())),
            Err(ValidationError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_date_passes_through() {
        let news = lookup("novedades").unwrap();
        let date = render(news.field("fecha_publicacion").unwrap(), &json!(""), false);
        assert_eq!(date.change(FieldInput::Text("mañana".into())), Ok(json!("mañana")));
    }

    #[test]
    fn test_display_boolean_and_null() {
        let users = lookup("usuarios").unwrap();
        let active = users.field("activo").unwrap();
        assert_eq!(display_value(users, &record(json!({"activo": true})), active), YES);
        assert_eq!(display_value(users, &record(json!({"activo": 0})), active), NO);
        let phone = users.field("telefono").unwrap();
        assert_eq!(display_value(users, &record(json!({"telefono": null})), phone), PLACEHOLDER);
        assert_eq!(display_value(users, &record(json!({})), phone), PLACEHOLDER);
    }

    #[test]
    fn test_display_dates() {
        let users = lookup("usuarios").unwrap();
        let registered = users.field("fecha_registro").unwrap();
        let stamped = record(json!({"fecha_registro": "2024-03-05 14:30:00"}));
        assert_eq!(display_value(users, &stamped, registered), "05/03/2024 14:30");
        assert_eq!(
            display_value(users, &record(json!({"fecha_registro": "ayer"})), registered),
            "ayer"
        );
        assert_eq!(
            display_value(users, &record(json!({"fecha_registro": null})), registered),
            PLACEHOLDER
        );
        assert_eq!(
            display_value(users, &record(json!({"fecha_registro": ""})), registered),
            PLACEHOLDER
        );
        let shown = display_value(
            users,
            &record(json!({"fecha_registro": "2024-03-05T12:00:00Z"})),
            registered,
        );
        assert_eq!(shown.len(), "05/03/2024 12:00".len());

        let news = lookup("novedades").unwrap();
        let published = news.field("fecha_publicacion").unwrap();
        assert_eq!(
            display_value(news, &record(json!({"fecha_publicacion": "2024-12-31"})), published),
            "31/12/2024"
        );
    }

    #[test]
    fn test_display_foreign_key_with_sibling() {
        let views = lookup("novedades_vistas").unwrap();
        let row = record(json!({
            "usuario_id": 3,
            "usuario_nombre": "Marta",
            "novedad_id": 9,
            "novedad_titulo": "Feria del cacao",
        }));
        assert_eq!(display_value(views, &row, views.field("usuario_id").unwrap()), "3 (Marta)");
        assert_eq!(
            display_value(views, &row, views.field("novedad_id").unwrap()),
            "9 (Feria del cacao)"
        );

        let bare = record(json!({"usuario_id": 3}));
        assert_eq!(display_value(views, &bare, views.field("usuario_id").unwrap()), "3");
    }

    #[test]
    fn test_default_values() {
        let users = lookup("usuarios").unwrap();
        assert_eq!(default_value(users.field("activo").unwrap()), json!(false));
        assert_eq!(default_value(users.field("nombre").unwrap()), json!(""));
    }
}
