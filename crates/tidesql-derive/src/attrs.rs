//! `#[orm(...)]` attribute parsing shared by the derives.

use heck::ToSnakeCase;
use syn::{Data, DeriveInput, Fields, Result};

/// Parsed `#[orm(...)]` contents: bare `id` and `key = "value"` pairs.
#[derive(Default)]
pub struct OrmAttr {
    pub is_id: bool,
    pub table: Option<String>,
    pub column: Option<String>,
}

impl syn::parse::Parse for OrmAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut attr = OrmAttr::default();

        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            if ident == "id" {
                attr.is_id = true;
            } else {
                let _: syn::Token![=] = input.parse()?;
                let value: syn::LitStr = input.parse()?;
                if ident == "table" {
                    attr.table = Some(value.value());
                } else if ident == "column" {
                    attr.column = Some(value.value());
                } else {
                    return Err(syn::Error::new_spanned(
                        ident,
                        "unknown orm attribute; expected `id`, `table` or `column`",
                    ));
                }
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(attr)
    }
}

/// Merge every `#[orm(...)]` on an item.
pub fn parse_orm(attrs: &[syn::Attribute]) -> Result<OrmAttr> {
    let mut merged = OrmAttr::default();
    for attr in attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        let parsed: OrmAttr = attr.parse_args()?;
        merged.is_id |= parsed.is_id;
        if parsed.table.is_some() {
            merged.table = parsed.table;
        }
        if parsed.column.is_some() {
            merged.column = parsed.column;
        }
    }
    Ok(merged)
}

/// A named struct field and its column.
pub struct MappedField<'a> {
    pub ident: &'a syn::Ident,
    pub column: String,
    pub is_id: bool,
}

/// The named fields of a struct with their column names.
pub fn mapped_fields<'a>(input: &'a DeriveInput, derive: &str) -> Result<Vec<MappedField<'a>>> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    format!("{derive} can only be derived for structs with named fields"),
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                format!("{derive} can only be derived for structs"),
            ));
        }
    };

    fields
        .iter()
        .map(|field| {
            let attr = parse_orm(&field.attrs)?;
            let ident = field
                .ident
                .as_ref()
                .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
            Ok(MappedField {
                ident,
                column: attr
                    .column
                    .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string()),
                is_id: attr.is_id,
            })
        })
        .collect()
}

/// `#[orm(table = "...")]`, or the snake_case struct name.
pub fn table_name(input: &DeriveInput) -> Result<String> {
    let attr = parse_orm(&input.attrs)?;
    Ok(attr
        .table
        .unwrap_or_else(|| input.ident.to_string().to_snake_case()))
}
