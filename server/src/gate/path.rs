use std::borrow::Cow;

use thiserror::Error;

/// Where the framework serves page props for client-side navigation.
pub(crate) const PAGE_DATA_PREFIX: &str = "/_next/data/";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path {0:?} is not absolute")]
    NotAbsolute(String),

    #[error("path {0:?} contains an encoded or alternate separator")]
    EncodedSeparator(String),

    #[error("path {0:?} climbs above the root")]
    EscapesRoot(String),
}

/// Canonical form of a request path, as the upstream would resolve it.
///
/// `%2e` is decoded, `.` and `..` segments are resolved and empty segments
/// collapse; a trailing slash survives. Paths that smuggle a separator
/// (`%2f`, `%5c`, `\`) or climb above `/` are refused outright. Returns the
/// input unchanged (borrowed) when it is already canonical.
pub fn normalize_path(path: &str) -> Result<Cow<'_, str>, PathError> {
    if !path.starts_with('/') {
        return Err(PathError::NotAbsolute(path.to_string()));
    }

    let lower = path.to_ascii_lowercase();
    if path.contains('\\') || lower.contains("%2f") || lower.contains("%5c") {
        return Err(PathError::EncodedSeparator(path.to_string()));
    }

    let decoded: Cow<'_, str> = if lower.contains("%2e") {
        Cow::Owned(path.replace("%2e", ".").replace("%2E", "."))
    } else {
        Cow::Borrowed(path)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathError::EscapesRoot(path.to_string()));
                }
            }
            s => segments.push(s),
        }
    }

    let mut canonical = String::with_capacity(decoded.len());
    for segment in &segments {
        canonical.push('/');
        canonical.push_str(segment);
    }
    if canonical.is_empty() || (decoded.ends_with('/') && decoded.len() > 1) {
        canonical.push('/');
    }

    if canonical == path {
        Ok(Cow::Borrowed(path))
    } else {
        Ok(Cow::Owned(canonical))
    }
}

/// The page a `/_next/data/<build>/<page>.json` request loads props for.
/// `index.json` is the home page.
pub fn page_for_data_route(path: &str) -> Option<String> {
    let rest = path.strip_prefix(PAGE_DATA_PREFIX)?;
    let (_build, page) = rest.split_once('/')?;
    let page = page.strip_suffix(".json")?;

    match page {
        "" => None,
        "index" => Some("/".to_string()),
        page => Some(format!("/{}", page)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(path: &str) -> String {
        normalize_path(path).unwrap().into_owned()
    }

    #[test]
    fn canonical_paths_are_borrowed() {
        assert!(matches!(normalize_path("/cases/4"), Ok(Cow::Borrowed(_))));
        assert!(matches!(normalize_path("/"), Ok(Cow::Borrowed(_))));
        assert!(matches!(normalize_path("/cases/"), Ok(Cow::Borrowed(_))));
    }

    #[test]
    fn dot_segments_are_resolved() {
        assert_eq!(norm("/api/../users/5"), "/users/5");
        assert_eq!(norm("/_next/static/../../users/5"), "/users/5");
        assert_eq!(norm("/cases/./4"), "/cases/4");
        assert_eq!(norm("/cases/4/.."), "/cases");
        assert_eq!(norm("/api/.."), "/");
    }

    #[test]
    fn encoded_dots_count_as_dots() {
        assert_eq!(norm("/api/%2e%2e/users/5"), "/users/5");
        assert_eq!(norm("/api/%2E./users/5"), "/users/5");
        assert_eq!(norm("/files/v1%2e2"), "/files/v1.2");
    }

    #[test]
    fn empty_segments_collapse() {
        assert_eq!(norm("//users//5"), "/users/5");
        assert_eq!(norm("/cases//"), "/cases/");
    }

    #[test]
    fn smuggled_separators_are_refused() {
        for path in ["/api/..%2fusers/5", "/api%2F..%2Fusers", "/api\\..\\users", "/a%5c.."] {
            assert!(
                matches!(normalize_path(path), Err(PathError::EncodedSeparator(_))),
                "{}",
                path
            );
        }
    }

    #[test]
    fn climbing_above_root_is_refused() {
        assert!(matches!(normalize_path("/.."), Err(PathError::EscapesRoot(_))));
        assert!(matches!(
            normalize_path("/cases/../../etc"),
            Err(PathError::EscapesRoot(_))
        ));
    }

    #[test]
    fn relative_and_asterisk_targets_are_refused() {
        assert!(matches!(normalize_path("*"), Err(PathError::NotAbsolute(_))));
        assert!(matches!(normalize_path("cases"), Err(PathError::NotAbsolute(_))));
    }

    #[test]
    fn data_routes_map_to_their_page() {
        assert_eq!(
            page_for_data_route("/_next/data/abc123/cases.json").as_deref(),
            Some("/cases")
        );
        assert_eq!(
            page_for_data_route("/_next/data/abc123/users/5.json").as_deref(),
            Some("/users/5")
        );
        assert_eq!(
            page_for_data_route("/_next/data/abc123/index.json").as_deref(),
            Some("/")
        );
    }

    #[test]
    fn other_paths_are_not_data_routes() {
        assert_eq!(page_for_data_route("/_next/data/abc123/cases"), None);
        assert_eq!(page_for_data_route("/_next/data/abc123"), None);
        assert_eq!(page_for_data_route("/_next/data/abc123/.json"), None);
        assert_eq!(page_for_data_route("/cases.json"), None);
    }
}
