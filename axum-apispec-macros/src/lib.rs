//! Procedural macros for `axum-apispec`.
//!
//! - `#[api_handler]` collects the `docs`, `request_schema`, `response_schema`
//!   (and alias) attributes stacked on a handler and registers the resulting
//!   metadata under the handler's module path.
//! - `#[derive(ApiSchema)]` produces a JSON Schema for a struct or unit enum.

use proc_macro::TokenStream;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{parse_macro_input, Attribute, DeriveInput, Expr, ItemFn, Lit, Meta};

mod derive;
mod handler;

/// Trimmed, non-empty doc comment lines.
pub(crate) fn doc_lines(attrs: &[Attribute]) -> Vec<String> {
    let mut lines = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }
        if let Meta::NameValue(meta) = &attr.meta {
            if let Expr::Lit(lit) = &meta.value {
                if let Lit::Str(s) = &lit.lit {
                    let line = s.value();
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        lines.push(trimmed.to_string());
                    }
                }
            }
        }
    }
    lines
}

/// Tokens building a `serde_json::Value` equal to `value`.
pub(crate) fn json_tokens(value: &serde_json::Value) -> proc_macro2::TokenStream {
    use serde_json::Value;

    match value {
        Value::Null => quote! { ::axum_apispec::serde_json::Value::Null },
        Value::Bool(b) => quote! { ::axum_apispec::serde_json::Value::Bool(#b) },
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                quote! { ::axum_apispec::serde_json::Value::from(#i) }
            } else if let Some(u) = n.as_u64() {
                quote! { ::axum_apispec::serde_json::Value::from(#u) }
            } else {
                let f = n.as_f64().unwrap_or_default();
                quote! { ::axum_apispec::serde_json::Value::from(#f) }
            }
        }
        Value::String(s) => quote! {
            ::axum_apispec::serde_json::Value::String(::std::string::String::from(#s))
        },
        Value::Array(items) => {
            let items = items.iter().map(json_tokens);
            quote! { ::axum_apispec::serde_json::Value::Array(::std::vec![#(#items),*]) }
        }
        Value::Object(fields) => {
            let inserts = fields.iter().map(|(key, value)| {
                let value = json_tokens(value);
                quote! { map.insert(::std::string::String::from(#key), #value); }
            });
            quote! {
                {
                    let mut map = ::axum_apispec::serde_json::Map::new();
                    #(#inserts)*
                    ::axum_apispec::serde_json::Value::Object(map)
                }
            }
        }
    }
}

/// Consume the value of a nested meta item we don't interpret.
pub(crate) fn skip_meta_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        content.parse::<proc_macro2::TokenStream>()?;
    }
    Ok(())
}

/// Attach OpenAPI metadata and request validation to a handler function.
///
/// Must be the first attribute on the function so the helper attributes
/// below it are visible. The first doc comment line becomes the summary and
/// the remaining lines the description.
///
/// ```rust,ignore
/// /// List users
/// #[api_handler]
/// #[docs(tags = ["users"], response(status = 404, description = "Not found"))]
/// #[querystring_schema(Pagination)]
/// #[json_schema(NewUser, example = r#"{"name": "Ada"}"#)]
/// #[response_schema(User, 200, description = "The created user")]
/// async fn create_user(ctx: RequestContext) -> Json<User> { .. }
/// ```
#[proc_macro_attribute]
pub fn api_handler(args: TokenStream, input: TokenStream) -> TokenStream {
    if !args.is_empty() {
        let args = proc_macro2::TokenStream::from(args);
        return syn::Error::new_spanned(args, "api_handler takes no arguments")
            .to_compile_error()
            .into();
    }

    let func = parse_macro_input!(input as ItemFn);
    handler::expand(func)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive `ApiSchema` for a struct with named fields, a newtype or a unit enum.
///
/// Field doc comments become property descriptions. Supported attributes:
///
/// - container: `#[schema(name = "..", deny_unknown)]`, `#[serde(rename_all, deny_unknown_fields)]`
/// - field: `#[schema(rename, description, format, pattern, minimum, maximum,
///   min_length, max_length, min_items, max_items, one_of(..), example)]`,
///   `#[serde(rename, default, skip)]`
#[proc_macro_derive(ApiSchema, attributes(schema, serde))]
pub fn derive_api_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_lines_skip_blank() {
        let item: ItemFn = syn::parse_quote! {
            /// List users
            ///
            /// Returns every user.
            async fn list() {}
        };
        assert_eq!(doc_lines(&item.attrs), vec!["List users", "Returns every user."]);
    }

    #[test]
    fn test_json_tokens_object() {
        let tokens = json_tokens(&serde_json::json!({ "name": "Ada", "age": 36 })).to_string();
        assert!(tokens.contains("\"name\""));
        assert!(tokens.contains("36i64"));
        assert!(tokens.contains("Value :: Object"));
    }
}
