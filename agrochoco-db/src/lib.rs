pub mod prelude;
pub mod session_entries;

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};

async fn create_table<E: EntityTrait>(
    connection: &DatabaseConnection,
    table: E,
) -> Result<(), DbErr> {
    let backend = connection.get_database_backend();
    let schema = Schema::new(backend);
    let mut statement = schema.create_table_from_entity(table);
    statement.if_not_exists();
    connection.execute(backend.build(&statement)).await?;
    Ok(())
}

/// Creates every table used by the local session store.
pub async fn create_tables(connection: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(connection, session_entries::Entity).await
}
