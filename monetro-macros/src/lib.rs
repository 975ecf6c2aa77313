//! Derive macros for `monetro`.
use proc_macro::TokenStream;
use syn::DeriveInput;

macro_rules! error {
    ($($tt:tt)*) => {
        return Err(syn::Error::new(proc_macro::Span::call_site().into(), format!($($tt)*)))
    };
}

pub(crate) use error;

mod attr;
mod decode;
mod from_row;

/// Derive `FromRow`.
///
/// Named fields are matched by column name, tuple fields by position.
/// Use `#[monetro(rename = "column")]` when field and column name differ.
#[proc_macro_derive(FromRow, attributes(monetro))]
pub fn from_row(input: TokenStream) -> TokenStream {
    match from_row::from_row(syn::parse_macro_input!(input as DeriveInput)) {
        Ok(ok) => ok,
        Err(err) => err.into_compile_error().into(),
    }
}

/// Derive `Decode` for single field wrapper.
#[proc_macro_derive(Decode)]
pub fn decode(input: TokenStream) -> TokenStream {
    match decode::decode(syn::parse_macro_input!(input as DeriveInput)) {
        Ok(ok) => ok,
        Err(err) => err.into_compile_error().into(),
    }
}
