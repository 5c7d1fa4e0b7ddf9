use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub mod auth;
pub mod config;
pub mod events;
pub mod mirror;
pub mod permission;
pub mod schema;
pub mod state;
pub mod template;
pub mod util_resp;
pub mod validation;
pub mod widgets;

#[cfg(test)]
mod test;
