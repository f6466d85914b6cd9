//! `#[api_handler]` and its helper attributes.

use crate::{doc_lines, json_tokens};
use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::parse::ParseStream;
use syn::spanned::Spanned;
use syn::{Attribute, Error, Ident, ItemFn, Lit, LitBool, LitInt, LitStr, Result, Token, Type};

const HELPERS: [&str; 11] = [
    "docs",
    "request_schema",
    "use_kwargs",
    "match_info_schema",
    "querystring_schema",
    "form_schema",
    "json_schema",
    "headers_schema",
    "cookies_schema",
    "response_schema",
    "marshal_with",
];

const LOCATIONS: [(&str, &str); 9] = [
    ("cookies", "Cookies"),
    ("files", "Files"),
    ("form", "Form"),
    ("headers", "Headers"),
    ("json", "Json"),
    ("match_info", "MatchInfo"),
    ("path", "Path"),
    ("query", "Query"),
    ("querystring", "Querystring"),
];

const PARAM_LOCATIONS: [(&str, &str); 4] = [
    ("query", "Query"),
    ("header", "Header"),
    ("path", "Path"),
    ("cookie", "Cookie"),
];

fn lookup(table: &[(&str, &'static str)], value: &LitStr, what: &str) -> Result<Ident> {
    let name = value.value();
    table
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, variant)| Ident::new(variant, value.span()))
        .ok_or_else(|| {
            let valid: Vec<&str> = table.iter().map(|(key, _)| *key).collect();
            Error::new(
                value.span(),
                format!("invalid {what} `{name}`, expected one of: {}", valid.join(", ")),
            )
        })
}

fn flag(meta: &ParseNestedMeta) -> Result<bool> {
    if meta.input.peek(Token![=]) {
        Ok(meta.value()?.parse::<LitBool>()?.value)
    } else {
        Ok(true)
    }
}

fn string_list(meta: &ParseNestedMeta) -> Result<Vec<LitStr>> {
    let value = meta.value()?;
    let content;
    syn::bracketed!(content in value);
    let items = content.parse_terminated(|input| input.parse::<LitStr>(), Token![,])?;
    Ok(items.into_iter().collect())
}

fn parse_example(raw: &LitStr) -> Result<TokenStream> {
    let value: serde_json::Value = serde_json::from_str(&raw.value())
        .map_err(|err| Error::new(raw.span(), format!("invalid example JSON: {err}")))?;
    Ok(json_tokens(&value))
}

/// Translate one `#[docs(..)]` attribute into a `Docs` builder chain.
fn docs_step(attr: &Attribute) -> Result<TokenStream> {
    let mut calls = Vec::new();

    attr.parse_nested_meta(|meta| {
        let key = meta.path.get_ident().map(ToString::to_string).unwrap_or_default();
        match key.as_str() {
            "tags" | "produces" => {
                let items = string_list(&meta)?;
                let method = format_ident!("{}", key);
                calls.push(quote! { .#method(::std::vec::Vec::<&str>::from([#(#items),*])) });
            }
            "summary" | "description" | "operation_id" => {
                let value = meta.value()?.parse::<LitStr>()?;
                let method = format_ident!("{}", key);
                calls.push(quote! { .#method(#value) });
            }
            "deprecated" => {
                let value = flag(&meta)?;
                calls.push(quote! { .deprecated(#value) });
            }
            "parameter" => calls.push(parameter(&meta)?),
            "response" => calls.push(response(&meta)?),
            _ => return Err(meta.error("unsupported docs argument")),
        }
        Ok(())
    })?;

    Ok(quote! { metadata.docs(::axum_apispec::Docs::new() #(#calls)*) })
}

fn parameter(meta: &ParseNestedMeta) -> Result<TokenStream> {
    let mut name = None;
    let mut location = None;
    let mut modifiers = Vec::new();

    meta.parse_nested_meta(|inner| {
        let key = inner.path.get_ident().map(ToString::to_string).unwrap_or_default();
        match key.as_str() {
            "name" => name = Some(inner.value()?.parse::<LitStr>()?),
            "location" => {
                let value = inner.value()?.parse::<LitStr>()?;
                location = Some(lookup(&PARAM_LOCATIONS, &value, "parameter location")?);
            }
            "description" => {
                let value = inner.value()?.parse::<LitStr>()?;
                modifiers.push(quote! { .description(#value) });
            }
            "required" => {
                let value = flag(&inner)?;
                modifiers.push(quote! { .required(#value) });
            }
            "deprecated" => {
                if flag(&inner)? {
                    modifiers.push(quote! { .deprecated() });
                }
            }
            "schema" => {
                let raw = inner.value()?.parse::<LitStr>()?;
                let schema = parse_example(&raw)?;
                modifiers.push(quote! { .schema(#schema) });
            }
            _ => return Err(inner.error("unsupported parameter argument")),
        }
        Ok(())
    })?;

    let name = name.ok_or_else(|| meta.error("parameter requires `name`"))?;
    let location = location.unwrap_or_else(|| Ident::new("Query", Span::call_site()));
    Ok(quote! {
        .parameter(
            ::axum_apispec::ParameterDoc::new(#name, ::axum_apispec::ParamLocation::#location)
                #(#modifiers)*
        )
    })
}

fn response(meta: &ParseNestedMeta) -> Result<TokenStream> {
    let mut status = None;
    let mut description = None;
    let mut headers = Vec::new();

    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("status") {
            status = Some(inner.value()?.parse::<LitInt>()?);
        } else if inner.path.is_ident("description") {
            description = Some(inner.value()?.parse::<LitStr>()?);
        } else if inner.path.is_ident("header") {
            let mut header = None;
            let mut text = None;
            inner.parse_nested_meta(|field| {
                if field.path.is_ident("name") {
                    header = Some(field.value()?.parse::<LitStr>()?);
                } else if field.path.is_ident("description") {
                    text = Some(field.value()?.parse::<LitStr>()?);
                } else {
                    return Err(field.error("unsupported header argument"));
                }
                Ok(())
            })?;
            let header = header.ok_or_else(|| inner.error("header requires `name`"))?;
            let text = text.map(|t| t.value()).unwrap_or_default();
            headers.push(quote! { .header(#header, #text) });
        } else {
            return Err(inner.error("unsupported response argument"));
        }
        Ok(())
    })?;

    let status = status.ok_or_else(|| meta.error("response requires `status`"))?;
    let description = description.map(|d| d.value()).unwrap_or_default();
    Ok(quote! {
        .response(#status, ::axum_apispec::ResponseDoc::new(#description) #(#headers)*)
    })
}

/// A parsed `request_schema(..)` style attribute.
struct RequestArgs {
    ty: Type,
    location: Option<LitStr>,
    modifiers: Vec<TokenStream>,
}

fn parse_request_args(input: ParseStream, fixed_location: bool) -> Result<RequestArgs> {
    let ty: Type = input.parse()?;
    let mut location = None;
    let mut modifiers = Vec::new();

    while !input.is_empty() {
        input.parse::<Token![,]>()?;
        if input.is_empty() {
            break;
        }
        let key = Ident::parse_any(input)?;
        let value = if input.peek(Token![=]) {
            input.parse::<Token![=]>()?;
            Some(input.parse::<Lit>()?)
        } else {
            None
        };

        match (key.to_string().as_str(), value) {
            ("location", Some(Lit::Str(value))) if !fixed_location => location = Some(value),
            ("location", _) if fixed_location => {
                return Err(Error::new(key.span(), "location is fixed for this attribute"))
            }
            ("put_into", Some(Lit::Str(value))) => modifiers.push(quote! { .put_into(#value) }),
            ("required", None) => modifiers.push(quote! { .required(true) }),
            ("required", Some(Lit::Bool(value))) => modifiers.push(quote! { .required(#value) }),
            ("add_to_refs", None) => modifiers.push(quote! { .add_to_refs(true) }),
            ("add_to_refs", Some(Lit::Bool(value))) => {
                modifiers.push(quote! { .add_to_refs(#value) })
            }
            ("example", Some(Lit::Str(raw))) => {
                let example = parse_example(&raw)?;
                modifiers.push(quote! { .example(#example) });
            }
            _ => return Err(Error::new(key.span(), format!("unsupported argument `{key}`"))),
        }
    }

    Ok(RequestArgs { ty, location, modifiers })
}

/// A parsed `response_schema(T, code, ..)` attribute.
struct ResponseArgs {
    ty: Type,
    code: LitInt,
    modifiers: Vec<TokenStream>,
}

fn parse_response_args(input: ParseStream) -> Result<ResponseArgs> {
    let ty: Type = input.parse()?;
    input.parse::<Token![,]>()?;
    let code: LitInt = input.parse()?;
    code.base10_parse::<u16>()?;
    let mut modifiers = Vec::new();

    while !input.is_empty() {
        input.parse::<Token![,]>()?;
        if input.is_empty() {
            break;
        }
        let key = Ident::parse_any(input)?;
        let value = if input.peek(Token![=]) {
            input.parse::<Token![=]>()?;
            Some(input.parse::<Lit>()?)
        } else {
            None
        };
        match (key.to_string().as_str(), value) {
            ("description", Some(Lit::Str(value))) => {
                modifiers.push(quote! { .description(#value) })
            }
            ("required", None) => modifiers.push(quote! { .required(true) }),
            ("required", Some(Lit::Bool(value))) => modifiers.push(quote! { .required(#value) }),
            _ => return Err(Error::new(key.span(), format!("unsupported argument `{key}`"))),
        }
    }

    Ok(ResponseArgs { ty, code, modifiers })
}

pub(crate) fn expand(mut func: ItemFn) -> Result<TokenStream> {
    let fn_name = func.sig.ident.clone();
    if !func.sig.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &func.sig.generics,
            "#[api_handler] does not support generic handlers",
        ));
    }
    let mut steps = Vec::new();

    let lines = doc_lines(&func.attrs);
    if let Some((summary, rest)) = lines.split_first() {
        let description = rest.join("\n");
        let description = (!description.is_empty()).then(|| quote! { .description(#description) });
        steps.push(quote! {
            metadata.docs(::axum_apispec::Docs::new().summary(#summary) #description)
        });
    }

    let mut json_seen = false;
    let mut kept = Vec::with_capacity(func.attrs.len());
    for attr in std::mem::take(&mut func.attrs) {
        let Some(helper) = attr
            .path()
            .get_ident()
            .map(ToString::to_string)
            .filter(|name| HELPERS.contains(&name.as_str()))
        else {
            kept.push(attr);
            continue;
        };

        let step = match helper.as_str() {
            "docs" => docs_step(&attr)?,
            "response_schema" | "marshal_with" => {
                let args = attr.parse_args_with(parse_response_args)?;
                let ResponseArgs { ty, code, modifiers } = args;
                quote! {
                    metadata.response_schema(
                        ::axum_apispec::ResponseBinding::new::<#ty>(#code) #(#modifiers)*
                    )
                }
            }
            request => {
                let shortcut = request.strip_suffix("_schema").filter(|_| request != "request_schema");
                let args = attr.parse_args_with(|input: ParseStream| {
                    parse_request_args(input, shortcut.is_some())
                })?;

                let (location_name, span) = match (&shortcut, &args.location) {
                    (Some(name), _) => (name.to_string(), attr.span()),
                    (None, Some(lit)) => (lit.value(), lit.span()),
                    (None, None) => ("json".to_string(), attr.span()),
                };
                let location = lookup(&LOCATIONS, &LitStr::new(&location_name, span), "location")?;

                if location_name == "json" {
                    if json_seen {
                        return Err(Error::new(
                            span,
                            "multiple json body schemas are not allowed on one handler",
                        ));
                    }
                    json_seen = true;
                }

                let RequestArgs { ty, modifiers, .. } = args;
                let put_into = shortcut.map(|name| quote! { .put_into(#name) });
                quote! {
                    metadata.request_schema(
                        ::axum_apispec::RequestBinding::new::<#ty>(::axum_apispec::Location::#location)
                            #put_into
                            #(#modifiers)*
                    )?
                }
            }
        };
        steps.push(step);
    }
    func.attrs = kept;

    let metadata_fn = format_ident!("__apispec_metadata_{}", fn_name);
    let id_fn = format_ident!("__apispec_id_{}", fn_name);
    Ok(quote! {
        #func

        const _: () = {
            #[allow(non_snake_case)]
            fn #metadata_fn() -> ::core::result::Result<
                ::axum_apispec::HandlerMetadata,
                ::axum_apispec::ConfigError,
            > {
                let metadata = ::axum_apispec::HandlerMetadata::new();
                #(let metadata = #steps;)*
                ::core::result::Result::Ok(metadata)
            }

            #[allow(non_snake_case)]
            fn #id_fn() -> ::axum_apispec::HandlerId {
                ::axum_apispec::HandlerId::of_val(&#fn_name)
            }

            ::axum_apispec::inventory::submit! {
                ::axum_apispec::HandlerEntry {
                    id: #id_fn,
                    metadata: #metadata_fn,
                }
            }
        };
    })
}
