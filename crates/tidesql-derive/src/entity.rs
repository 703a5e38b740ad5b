//! Entity derive macro implementation

use crate::attrs::{mapped_fields, table_name};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let table = table_name(&input)?;
    let fields = mapped_fields(&input, "Entity")?;

    let mut ids = fields.iter().filter(|f| f.is_id);
    let primary_key = match (ids.next(), ids.next()) {
        (None, _) => quote! { ::core::option::Option::None },
        (Some(id), None) => {
            let column = &id.column;
            quote! { ::core::option::Option::Some(#column) }
        }
        (Some(_), Some(second)) => {
            return Err(syn::Error::new_spanned(
                second.ident,
                "Entity supports a single #[orm(id)] field",
            ));
        }
    };

    let columns: Vec<&String> = fields.iter().map(|f| &f.column).collect();

    let values: Vec<_> = fields
        .iter()
        .map(|f| {
            let ident = f.ident;
            let column = &f.column;
            quote! { (#column, ::tidesql::ToValue::to_value(&self.#ident)) }
        })
        .collect();

    let setters: Vec<_> = fields
        .iter()
        .map(|f| {
            let ident = f.ident;
            let column = &f.column;
            quote! {
                #column => {
                    self.#ident = ::tidesql::FromValue::from_value(column, &value)?;
                    Ok(())
                }
            }
        })
        .collect();

    Ok(quote! {
        impl #impl_generics ::tidesql::entity::Entity for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;
            const PRIMARY_KEY: ::core::option::Option<&'static str> = #primary_key;
            const COLUMNS: &'static [&'static str] = &[#(#columns),*];

            fn values(&self) -> ::std::vec::Vec<(&'static str, ::tidesql::Value)> {
                ::std::vec![#(#values),*]
            }

            fn set_value(
                &mut self,
                column: &str,
                value: ::tidesql::Value,
            ) -> ::tidesql::DbResult<()> {
                match column {
                    #(#setters)*
                    other => Err(::tidesql::DbError::config(::std::format!(
                        "{} has no column `{}`",
                        #table,
                        other
                    ))),
                }
            }
        }
    })
}
