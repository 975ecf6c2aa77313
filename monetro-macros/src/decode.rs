use proc_macro::TokenStream;
use quote::quote;
use syn::*;

use crate::error;

pub fn decode(input: DeriveInput) -> Result<TokenStream> {
    let DeriveInput { attrs: _, vis: _, ident, mut generics, data } = input;

    let body = match data {
        Data::Struct(st) => match st.fields {
            Fields::Unnamed(FieldsUnnamed { unnamed, .. }) => {
                if unnamed.len() != 1 {
                    error!("only one field struct is supported")
                }
                quote! { Ok(Self(col.decode()?)) }
            },
            Fields::Named(FieldsNamed { named, .. }) => {
                let mut fields = named.into_iter();
                let (Some(field), None) = (fields.next(), fields.next()) else {
                    error!("only one field struct is supported")
                };
                let name = field.ident;
                quote! { Ok(Self { #name: col.decode()? }) }
            },
            Fields::Unit => quote! { Ok(Self) },
        },
        Data::Enum(_) => error!("enum is not yet supported"),
        Data::Union(_) => error!("union is not supported"),
    };

    for ty in generics.type_params_mut() {
        ty.bounds.push(parse_quote!(::monetro::Decode));
    }

    let (g1, g2, g3) = generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        impl #g1 ::monetro::Decode for #ident #g2 #g3 {
            fn decode(col: ::monetro::row::Column) -> ::core::result::Result<Self, ::monetro::DecodeError> {
                #body
            }
        }
    }.into())
}
