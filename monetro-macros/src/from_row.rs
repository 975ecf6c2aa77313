use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{token::{Brace, Paren}, *};

use crate::{attr::column_name, error};

pub fn from_row(input: DeriveInput) -> Result<TokenStream> {
    let DeriveInput { attrs: _, vis: _, ident, mut generics, data } = input;
    let Data::Struct(data) = data else {
        error!("only struct are currently supported")
    };

    let mut head = quote! {};
    let mut matches = quote! {};
    let mut output = quote! {};

    match data.fields {
        Fields::Unnamed(FieldsUnnamed { unnamed, .. }) => {
            head = quote! { let mut iter = ::core::iter::IntoIterator::into_iter(row); };
            let body = (0..unnamed.len())
                .map(|_| quote! { iter.try_next()?.decode()?, });
            Paren::default().surround(&mut output, |e| e.extend(body));
        },
        Fields::Named(FieldsNamed { named, .. }) => {
            let columns = named
                .iter()
                .map(column_name)
                .collect::<Result<Vec<_>>>()?;
            let slots = named
                .iter()
                .enumerate()
                .map(|(i, _)| format_ident!("__slot{i}"))
                .collect::<Vec<_>>();

            head = slots
                .iter()
                .map(|slot| quote! { let mut #slot = ::core::option::Option::None; })
                .collect();

            let arms = columns
                .iter()
                .zip(slots.iter())
                .map(|(name, slot)| quote! { #name => #slot = ::core::option::Option::Some(col.decode()?), });
            matches = quote! {
                for col in row {
                    match col.name() {
                        #(#arms)*
                        _ => {}
                    }
                }
            };

            let body = named
                .iter()
                .zip(slots.iter().zip(columns.iter()))
                .map(|(field, (slot, name))| {
                    let id = field.ident.as_ref();
                    quote! {
                        #id: #slot.ok_or_else(|| ::monetro::DecodeError::ColumnNotFound(#name.into()))?,
                    }
                });
            Brace::default().surround(&mut output, |e| e.extend(body));
        },
        Fields::Unit => head = quote! { let _ = row; },
    };

    for ty in generics.type_params_mut() {
        ty.bounds.push(parse_quote!(::monetro::Decode));
    }

    let (g1, g2, g3) = generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        impl #g1 ::monetro::FromRow for #ident #g2 #g3 {
            fn from_row(row: ::monetro::Row) -> ::core::result::Result<Self, ::monetro::DecodeError> {
                #head
                #matches
                Ok(Self #output)
            }
        }
    }.into())
}
