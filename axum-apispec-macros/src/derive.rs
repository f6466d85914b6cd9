//! `#[derive(ApiSchema)]`

use crate::{doc_lines, json_tokens, skip_meta_value};
use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Attribute, Data, DeriveInput, Error, Fields, LitInt, LitStr, Result};

/// Container attributes read from `#[schema(..)]` and `#[serde(..)]`.
#[derive(Default)]
struct ContainerAttrs {
    name: Option<String>,
    deny_unknown: bool,
    rename_all: Option<String>,
}

impl ContainerAttrs {
    fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut parsed = Self::default();
        for attr in attrs {
            if attr.path().is_ident("schema") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("name") {
                        parsed.name = Some(meta.value()?.parse::<LitStr>()?.value());
                    } else if meta.path.is_ident("deny_unknown") {
                        parsed.deny_unknown = true;
                    } else {
                        return Err(meta.error("unsupported schema attribute"));
                    }
                    Ok(())
                })?;
            } else if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("deny_unknown_fields") {
                        parsed.deny_unknown = true;
                    } else if meta.path.is_ident("rename_all") && meta.input.peek(syn::Token![=]) {
                        parsed.rename_all = Some(meta.value()?.parse::<LitStr>()?.value());
                    } else {
                        skip_meta_value(&meta)?;
                    }
                    Ok(())
                })?;
            }
        }
        Ok(parsed)
    }
}

/// Field attributes read from `#[schema(..)]`, `#[serde(..)]` and doc comments.
#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    has_default: bool,
    skip: bool,
    keywords: Vec<(String, TokenStream)>,
}

impl FieldAttrs {
    fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut parsed = Self::default();

        let docs = doc_lines(attrs);
        if !docs.is_empty() {
            let description = docs.join(" ");
            parsed
                .keywords
                .push(("description".to_string(), quote! { #description }));
        }

        for attr in attrs {
            if attr.path().is_ident("schema") {
                attr.parse_nested_meta(|meta| {
                    let key = meta
                        .path
                        .get_ident()
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    match key.as_str() {
                        "rename" => {
                            parsed.rename = Some(meta.value()?.parse::<LitStr>()?.value());
                        }
                        "description" | "format" | "pattern" => {
                            let value = meta.value()?.parse::<LitStr>()?;
                            parsed.set(&key, quote! { #value });
                        }
                        "minimum" | "maximum" => {
                            let value = meta.value()?.parse::<syn::Lit>()?;
                            parsed.set(&key, quote! { #value });
                        }
                        "min_length" | "max_length" | "min_items" | "max_items" => {
                            let value = meta.value()?.parse::<LitInt>()?;
                            let keyword = match key.as_str() {
                                "min_length" => "minLength",
                                "max_length" => "maxLength",
                                "min_items" => "minItems",
                                _ => "maxItems",
                            };
                            parsed.set(keyword, quote! { #value });
                        }
                        "one_of" => {
                            let content;
                            syn::parenthesized!(content in meta.input);
                            let choices = content
                                .parse_terminated(|input| input.parse::<LitStr>(), syn::Token![,])?;
                            let choices = choices.iter();
                            parsed.set("enum", quote! { [#(#choices),*] });
                        }
                        "example" => {
                            let raw = meta.value()?.parse::<LitStr>()?;
                            let value: serde_json::Value = serde_json::from_str(&raw.value())
                                .map_err(|err| Error::new(raw.span(), format!("invalid example JSON: {err}")))?;
                            let tokens = json_tokens(&value);
                            parsed.keywords.push(("example".to_string(), tokens));
                        }
                        _ => return Err(meta.error("unsupported schema attribute")),
                    }
                    Ok(())
                })?;
            } else if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") && meta.input.peek(syn::Token![=]) {
                        parsed.rename = Some(meta.value()?.parse::<LitStr>()?.value());
                    } else if meta.path.is_ident("default") {
                        parsed.has_default = true;
                        skip_meta_value(&meta)?;
                    } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                        parsed.skip = true;
                    } else {
                        skip_meta_value(&meta)?;
                    }
                    Ok(())
                })?;
            }
        }
        Ok(parsed)
    }

    fn set(&mut self, keyword: &str, value: TokenStream) {
        let keyword = keyword.to_string();
        self.keywords.retain(|(k, _)| *k != keyword);
        self.keywords.push((keyword, quote! { ::axum_apispec::serde_json::json!(#value) }));
    }
}

/// Apply a serde `rename_all` rule to a snake_case or PascalCase name.
fn rename(name: &str, rule: Option<&str>) -> String {
    let words: Vec<String> = if name.contains('_') {
        name.split('_').filter(|w| !w.is_empty()).map(str::to_lowercase).collect()
    } else {
        let mut words = Vec::new();
        let mut current = String::new();
        for ch in name.chars() {
            if ch.is_uppercase() && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.extend(ch.to_lowercase());
        }
        if !current.is_empty() {
            words.push(current);
        }
        words
    };

    let capitalize = |word: &String| {
        let mut chars = word.chars();
        chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect::<String>())
            .unwrap_or_default()
    };

    match rule {
        Some("lowercase") => name.to_lowercase(),
        Some("UPPERCASE") => name.to_uppercase(),
        Some("snake_case") => words.join("_"),
        Some("SCREAMING_SNAKE_CASE") => words.join("_").to_uppercase(),
        Some("kebab-case") => words.join("-"),
        Some("SCREAMING-KEBAB-CASE") => words.join("-").to_uppercase(),
        Some("camelCase") => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { w.clone() } else { capitalize(w) })
            .collect(),
        Some("PascalCase") => words.iter().map(capitalize).collect(),
        _ => name.to_string(),
    }
}

pub(crate) fn expand(input: DeriveInput) -> Result<TokenStream> {
    let container = ContainerAttrs::parse(&input.attrs)?;
    let ident = &input.ident;
    let ident_str = ident.to_string();
    let name = container.name.clone().unwrap_or_else(|| {
        ident_str
            .strip_suffix("Schema")
            .filter(|stripped| !stripped.is_empty())
            .unwrap_or(&ident_str)
            .to_string()
    });

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(syn::parse_quote!(::axum_apispec::ApiSchema));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => {
                let mut inserts = Vec::new();
                for field in &fields.named {
                    let attrs = FieldAttrs::parse(&field.attrs)?;
                    if attrs.skip {
                        continue;
                    }
                    let Some(field_ident) = &field.ident else {
                        continue;
                    };
                    let raw = field_ident.to_string();
                    let raw = raw.strip_prefix("r#").unwrap_or(&raw);
                    let field_name = attrs
                        .rename
                        .clone()
                        .unwrap_or_else(|| rename(raw, container.rename_all.as_deref()));
                    let ty = &field.ty;
                    let keywords = attrs.keywords.iter().map(|(key, value)| {
                        quote! { object.insert(#key.to_string(), ::axum_apispec::serde_json::json!(#value)); }
                    });
                    let required = if attrs.has_default {
                        quote! { false }
                    } else {
                        quote! { <#ty as ::axum_apispec::ApiSchema>::is_required() }
                    };
                    inserts.push(quote! {
                        {
                            let mut schema = <#ty as ::axum_apispec::ApiSchema>::schema();
                            if let ::core::option::Option::Some(object) = schema.as_object_mut() {
                                #(#keywords)*
                            }
                            properties.insert(#field_name.to_string(), schema);
                            if #required {
                                required.push(::axum_apispec::serde_json::Value::from(#field_name));
                            }
                        }
                    });
                }

                let deny_unknown = container.deny_unknown;
                quote! {
                    let mut properties = ::axum_apispec::serde_json::Map::new();
                    let mut required = ::std::vec::Vec::new();
                    #(#inserts)*
                    let mut schema = ::axum_apispec::serde_json::Map::new();
                    schema.insert("title".to_string(), #ident_str.into());
                    schema.insert("type".to_string(), "object".into());
                    schema.insert("properties".to_string(), properties.into());
                    if !required.is_empty() {
                        schema.insert("required".to_string(), required.into());
                    }
                    if #deny_unknown {
                        schema.insert("additionalProperties".to_string(), false.into());
                    }
                    ::axum_apispec::serde_json::Value::Object(schema)
                }
            }
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                let ty = &fields.unnamed[0].ty;
                quote! { <#ty as ::axum_apispec::ApiSchema>::schema() }
            }
            Fields::Unit => quote! {
                ::axum_apispec::serde_json::json!({ "title": #ident_str, "type": "object" })
            },
            Fields::Unnamed(fields) => {
                return Err(Error::new(
                    fields.span(),
                    "ApiSchema cannot be derived for tuple structs with more than one field",
                ))
            }
        },
        Data::Enum(data) => {
            let mut variants = Vec::new();
            for variant in &data.variants {
                if !matches!(variant.fields, Fields::Unit) {
                    return Err(Error::new(
                        variant.span(),
                        "ApiSchema can only be derived for enums with unit variants",
                    ));
                }
                let attrs = FieldAttrs::parse(&variant.attrs)?;
                if attrs.skip {
                    continue;
                }
                variants.push(attrs.rename.unwrap_or_else(|| {
                    rename(&variant.ident.to_string(), container.rename_all.as_deref())
                }));
            }
            quote! {
                ::axum_apispec::serde_json::json!({
                    "title": #ident_str,
                    "type": "string",
                    "enum": [#(#variants),*]
                })
            }
        }
        Data::Union(data) => {
            return Err(Error::new(
                data.union_token.span(),
                "ApiSchema cannot be derived for unions",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics ::axum_apispec::ApiSchema for #ident #ty_generics #where_clause {
            fn schema() -> ::axum_apispec::serde_json::Value {
                #body
            }

            fn schema_name() -> ::core::option::Option<::std::borrow::Cow<'static, str>> {
                ::core::option::Option::Some(::std::borrow::Cow::Borrowed(#name))
            }
        }
    })
}
