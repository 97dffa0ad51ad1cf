pub use super::session_entries::Entity as SessionEntries;
