//! Path template helpers.

/// Convert an axum path template (`/users/:id`, `/files/*rest`) to the
/// OpenAPI form (`/users/{id}`, `/files/{rest}`).
pub fn to_openapi_path(path: &str) -> String {
    let mut result = String::with_capacity(path.len() + 2);

    for (i, segment) in path.split('/').enumerate() {
        if i > 0 {
            result.push('/');
        }
        match segment.strip_prefix(':').or_else(|| segment.strip_prefix('*')) {
            Some(name) if !name.is_empty() => {
                result.push('{');
                result.push_str(name);
                result.push('}');
            }
            _ => result.push_str(segment),
        }
    }

    result
}

/// Placeholder names of an OpenAPI path template, in order of appearance.
pub fn path_keys(path: &str) -> Vec<&str> {
    let mut keys = Vec::new();
    let mut rest = path;

    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        let key = &after[..end];
        if !key.is_empty() {
            keys.push(key);
        }
        rest = &after[end + 1..];
    }

    keys
}

/// Make a route path absolute and strip a trailing slash.
///
/// An empty input stays empty.
pub fn normalize_route(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else if path.starts_with('/') {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        format!("/{}", path.trim_end_matches('/'))
    }
}

/// Join a nest prefix and a route path the way `Router::nest` does.
pub fn join(prefix: &str, path: &str) -> String {
    let prefix = normalize_route(prefix);
    let prefix = prefix.trim_end_matches('/');

    match path {
        "" | "/" if prefix.is_empty() => "/".to_string(),
        "" | "/" => prefix.to_string(),
        _ if path.starts_with('/') => format!("{prefix}{path}"),
        _ => format!("{prefix}/{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parameter_conversion() {
        assert_eq!(to_openapi_path("/users/:id"), "/users/{id}");
        assert_eq!(to_openapi_path("/users"), "/users");
        assert_eq!(to_openapi_path("/files/*path"), "/files/{path}");
        assert_eq!(to_openapi_path("/"), "/");
    }

    #[test]
    fn test_complex_path_conversion() {
        let test_cases = vec![
            (
                "/users/:user_id/posts/:post_id/comments/:comment_id",
                "/users/{user_id}/posts/{post_id}/comments/{comment_id}",
            ),
            ("/api/v1/:version/users/:id", "/api/v1/{version}/users/{id}"),
            ("/:category/:subcategory/:item", "/{category}/{subcategory}/{item}"),
        ];

        for (input, expected) in test_cases {
            assert_eq!(to_openapi_path(input), expected);
        }
    }

    #[test]
    fn test_path_keys() {
        assert_eq!(path_keys("/users/{user_id}/posts/{id}"), vec!["user_id", "id"]);
        assert!(path_keys("/users").is_empty());
        assert!(path_keys("/broken/{id").is_empty());
    }

    #[test]
    fn test_route_normalization() {
        let test_cases = vec![
            ("/api/docs", "/api/docs"),
            ("api/docs", "/api/docs"),
            ("/api/docs/", "/api/docs"),
            ("api/docs/", "/api/docs"),
            ("/", "/"),
            ("", ""),
        ];

        for (input, expected) in test_cases {
            assert_eq!(normalize_route(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/api", "/users"), "/api/users");
        assert_eq!(join("/api/", "users"), "/api/users");
        assert_eq!(join("/api", "/"), "/api");
        assert_eq!(join("", "/users"), "/users");
    }
}
