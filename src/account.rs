use serde_json::{Value, json};
use tracing::info;

use crate::{
    error::{ProgrammingError, Result, ValidationError},
    gateway::Gateway,
    schema::TableSchema,
};

pub struct PasswordChange<'a> {
    pub current: &'a str,
    pub new: &'a str,
    pub confirmation: &'a str,
}

impl PasswordChange<'_> {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        for (key, label, value) in [
            ("currentPassword", "Contraseña actual", self.current),
            ("newPassword", "Nueva contraseña", self.new),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingRequiredField {
                    key: key.to_string(),
                    label: label.to_string(),
                });
            }
        }
        if self.new != self.confirmation {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }
}

/// `POST /{resource}/{id}/cambiar-contrasena`
#[tracing::instrument(skip(gateway, schema, change), fields(table = %schema.id))]
pub async fn change_password(
    gateway: &Gateway,
    schema: &TableSchema,
    id: &str,
    change: &PasswordChange<'_>,
) -> Result<Value> {
    if schema.read_only {
        return Err(ProgrammingError::ReadOnlyTable(schema.id.clone()).into());
    }
    change.validate()?;
    let path = format!("{}/cambiar-contrasena", schema.endpoint_item(id)?);
    let body = json!({
        "currentPassword": change.current,
        "newPassword": change.new,
    });
    let response = gateway.post(&path, &body).await?;
    info!("Password changed");
    Ok(response)
}
