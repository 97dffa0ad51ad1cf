//! Static catalogue of manageable tables and their field definitions.
//!
//! The registry is a process-wide constant: it performs no I/O and is never
//! mutated after first access.

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::error::{ProgrammingError, SchemaError};

pub const ID_KEY: &str = "id";
pub const PASSWORD_KEY: &str = "clave";

/// Foreign-key columns whose display value borrows a descriptive sibling
/// column from the same record. New pairs must be added here explicitly.
pub const FOREIGN_KEY_LABELS: [(&str, &str); 3] = [
    ("usuario_id", "usuario_nombre"),
    ("producto_id", "producto_nombre"),
    ("novedad_id", "novedad_titulo"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Email,
    Password,
    Textarea,
    Boolean,
    Select { options: Vec<String> },
    Date,
    Datetime,
}

impl FieldKind {
    pub fn select<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldKind::Select {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Email => "email",
            FieldKind::Password => "password",
            FieldKind::Textarea => "textarea",
            FieldKind::Boolean => "boolean",
            FieldKind::Select { .. } => "select",
            FieldKind::Date => "date",
            FieldKind::Datetime => "datetime",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDefinition {
    pub key: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub required: bool,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl FieldDefinition {
    pub fn new(key: &str, label: &str, kind: FieldKind) -> Self {
        FieldDefinition {
            key: key.to_string(),
            label: label.to_string(),
            kind,
            required: false,
            read_only: false,
            placeholder: None,
        }
    }

    pub fn id() -> Self {
        FieldDefinition::new(ID_KEY, "ID", FieldKind::Number).read_only()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyLabel {
    pub key: String,
    pub label_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub id: String,
    pub display_name: String,
    pub icon: String,
    pub color: String,
    pub read_only: bool,
    pub resource: String,
    pub fields: Vec<FieldDefinition>,
    pub foreign_keys: Vec<ForeignKeyLabel>,
}

impl TableSchema {
    fn new(
        id: &str,
        display_name: &str,
        icon: &str,
        color: &str,
        fields: Vec<FieldDefinition>,
    ) -> Self {
        let foreign_keys = FOREIGN_KEY_LABELS
            .iter()
            .filter(|(key, _)| fields.iter().any(|f| f.key == *key))
            .map(|(key, label_key)| ForeignKeyLabel {
                key: key.to_string(),
                label_key: label_key.to_string(),
            })
            .collect();
        TableSchema {
            id: id.to_string(),
            display_name: display_name.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
            read_only: false,
            resource: id.to_string(),
            fields,
            foreign_keys,
        }
    }

    fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Sibling column holding the descriptive name for a foreign-key column.
    pub fn foreign_key_label(&self, key: &str) -> Option<&str> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.key == key)
            .map(|fk| fk.label_key.as_str())
    }

    pub fn endpoint_collection(&self) -> String {
        format!("/{}", self.resource)
    }

    /// Path of one record. The id is percent-encoded so it always stays a
    /// single segment under this table's resource.
    pub fn endpoint_item(&self, id: &str) -> Result<String, ProgrammingError> {
        // dot segments are normalized away by URL parsing, even when escaped
        if id.is_empty() || id.chars().all(|c| c == '.') {
            return Err(ProgrammingError::InvalidRecordId(id.to_string()));
        }
        let segment: String = form_urlencoded::byte_serialize(id.as_bytes())
            .map(|chunk| if chunk == "+" { "%20" } else { chunk })
            .collect();
        Ok(format!("/{}/{segment}", self.resource))
    }
}

/// Renders a record id the way it appears in a resource path.
pub fn id_to_path(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct Registry {
    tables: Vec<TableSchema>,
}

impl Registry {
    pub fn lookup(&self, id: &str) -> Result<&TableSchema, SchemaError> {
        self.tables
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| SchemaError::TableNotFound(id.to_string()))
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    fn builtin() -> Self {
        use FieldKind::*;

        let usuarios = TableSchema::new(
            "usuarios",
            "Usuarios",
            "people",
            "#2E7D32",
            vec![
                FieldDefinition::id(),
                FieldDefinition::new("nombre", "Nombre", Text).required(),
                FieldDefinition::new("email", "Correo electrónico", Email)
                    .required()
                    .placeholder("correo@ejemplo.com"),
                FieldDefinition::new(PASSWORD_KEY, "Contraseña", Password)
                    .placeholder("Dejar vacío para no cambiar"),
                FieldDefinition::new("telefono", "Teléfono", Text),
                FieldDefinition::new("direccion", "Dirección", Textarea),
                FieldDefinition::new(
                    "rol",
                    "Rol",
                    FieldKind::select(["administrador", "productor", "comprador"]),
                )
                .required(),
                FieldDefinition::new("activo", "Activo", Boolean),
                FieldDefinition::new("fecha_registro", "Fecha de registro", Datetime).read_only(),
            ],
        );

        let productos = TableSchema::new(
            "productos",
            "Productos",
            "basket",
            "#6D4C41",
            vec![
                FieldDefinition::id(),
                FieldDefinition::new("nombre", "Nombre", Text).required(),
                FieldDefinition::new("descripcion", "Descripción", Textarea),
                FieldDefinition::new("precio", "Precio", Number).required().placeholder("0"),
                FieldDefinition::new(
                    "unidad",
                    "Unidad",
                    FieldKind::select(["kg", "lb", "unidad", "arroba", "bulto"]),
                )
                .required(),
                FieldDefinition::new("stock", "Existencias", Number),
                FieldDefinition::new("categoria_id", "Categoría", Number),
                FieldDefinition::new("imagen", "Imagen", Text),
                FieldDefinition::new("activo", "Activo", Boolean),
            ],
        );

        let categorias = TableSchema::new(
            "categorias",
            "Categorías",
            "pricetags",
            "#F9A825",
            vec![
                FieldDefinition::id(),
                FieldDefinition::new("nombre", "Nombre", Text).required(),
                FieldDefinition::new("descripcion", "Descripción", Textarea),
            ],
        );

        let roles = TableSchema::new(
            "roles",
            "Roles",
            "shield",
            "#5E35B1",
            vec![
                FieldDefinition::id(),
                FieldDefinition::new("nombre", "Nombre", Text).required(),
                FieldDefinition::new("descripcion", "Descripción", Textarea),
            ],
        );

        let novedades = TableSchema::new(
            "novedades",
            "Novedades",
            "megaphone",
            "#00838F",
            vec![
                FieldDefinition::id(),
                FieldDefinition::new("titulo", "Título", Text).required(),
                FieldDefinition::new("contenido", "Contenido", Textarea).required(),
                FieldDefinition::new(
                    "tipo",
                    "Tipo",
                    FieldKind::select(["noticia", "evento", "alerta"]),
                ),
                FieldDefinition::new("fecha_publicacion", "Fecha de publicación", Date)
                    .placeholder("AAAA-MM-DD"),
                FieldDefinition::new("activo", "Activo", Boolean),
            ],
        );

        let productor_productos = TableSchema::new(
            "productor_productos",
            "Productos por productor",
            "leaf",
            "#558B2F",
            vec![
                FieldDefinition::id(),
                FieldDefinition::new("usuario_id", "Productor", Number).required(),
                FieldDefinition::new("producto_id", "Producto", Number).required(),
                FieldDefinition::new("precio", "Precio", Number),
                FieldDefinition::new("disponible", "Disponible", Boolean),
                FieldDefinition::new("fecha_actualizacion", "Última actualización", Datetime)
                    .read_only(),
            ],
        );

        let novedades_vistas = TableSchema::new(
            "novedades_vistas",
            "Novedades vistas",
            "eye",
            "#546E7A",
            vec![
                FieldDefinition::id(),
                FieldDefinition::new("usuario_id", "Usuario", Number).read_only(),
                FieldDefinition::new("novedad_id", "Novedad", Number).read_only(),
                FieldDefinition::new("fecha", "Fecha", Datetime).read_only(),
            ],
        )
        .read_only();

        let novedades_leidas = TableSchema::new(
            "novedades_leidas",
            "Novedades leídas",
            "checkmark-done",
            "#37474F",
            vec![
                FieldDefinition::id(),
                FieldDefinition::new("usuario_id", "Usuario", Number).read_only(),
                FieldDefinition::new("novedad_id", "Novedad", Number).read_only(),
                FieldDefinition::new("fecha_lectura", "Fecha de lectura", Datetime).read_only(),
            ],
        )
        .read_only();

        Registry {
            tables: vec![
                usuarios,
                productos,
                categorias,
                roles,
                novedades,
                productor_productos,
                novedades_vistas,
                novedades_leidas,
            ],
        }
    }
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::builtin);

pub fn registry() -> &'static Registry {
    &REGISTRY
}

pub fn lookup(id: &str) -> Result<&'static TableSchema, SchemaError> {
    REGISTRY.lookup(id)
}
