use syn::*;

/// Column name of a named field, `#[monetro(rename = "...")]` or the field name.
pub fn column_name(field: &Field) -> Result<String> {
    let mut name = None;

    for attr in field.attrs.iter().filter(|e| e.path().is_ident("monetro")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                name = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("possible value are: `rename = \"column\"`"))
            }
        })?;
    }

    match (name, field.ident.as_ref()) {
        (Some(name), _) => Ok(name),
        (None, Some(id)) => Ok(id.to_string()),
        (None, None) => Err(Error::new_spanned(field, "unnamed field cannot be renamed")),
    }
}
