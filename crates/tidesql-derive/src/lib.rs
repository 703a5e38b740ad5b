//! Derive macros for tidesql
//!
//! Provides `#[derive(FromRow)]` and `#[derive(Entity)]` macros.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod entity;
mod from_row;

/// Derive `FromRow` trait for a struct.
///
/// # Example
///
/// ```ignore
/// use tidesql::FromRow;
///
/// #[derive(FromRow)]
/// struct User {
///     id: u64,
///     username: String,
///     #[orm(column = "email_address")]
///     email: Option<String>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(column = "name")]` - Map field to a different column name
#[proc_macro_derive(FromRow, attributes(orm))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_row::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive the `Entity` table mapping for a struct.
///
/// The struct must also implement `FromRow` (usually derived alongside).
///
/// # Example
///
/// ```ignore
/// use tidesql::{Entity, FromRow};
///
/// #[derive(FromRow, Entity)]
/// #[orm(table = "user")]
/// struct User {
///     #[orm(id)]
///     id: u64,
///     username: String,
///     status: i32,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Table name (defaults to the snake_case struct name)
/// - `#[orm(id)]` - Mark field as the auto-increment primary key
/// - `#[orm(column = "name")]` - Map field to different column name
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
