//! FromRow derive macro implementation

use crate::attrs::mapped_fields;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let field_extracts: Vec<_> = mapped_fields(&input, "FromRow")?
        .into_iter()
        .map(|field| {
            let ident = field.ident;
            let column = field.column;
            quote! {
                #ident: row.try_get(#column)?
            }
        })
        .collect();

    Ok(quote! {
        impl #impl_generics ::tidesql::FromRow for #name #ty_generics #where_clause {
            fn from_row(row: &::tidesql::Row) -> ::tidesql::DbResult<Self> {
                Ok(Self {
                    #(#field_extracts),*
                })
            }
        }
    })
}
