use crate::errors::AppError;

/// Longest accepted tag, in characters. Matches `TagRequest` validation.
pub const MAX_TAG_CHARS: usize = 100;

/// Trims and lowercases a tag name. Blank names yield `None`.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let name = raw.trim().to_lowercase();
    (!name.is_empty()).then_some(name)
}

/// Normalizes every name, dropping blanks and later duplicates.
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names: Vec<String> = Vec::new();
    for name in raw.into_iter().filter_map(|tag| normalize_tag(tag.as_ref())) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Parses the `tags` upload field, a JSON array of strings.
pub fn parse_tag_list(raw: Option<&str>) -> Result<Vec<String>, AppError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Vec::new()),
        Some(raw) => raw,
    };

    let tags: Vec<String> = serde_json::from_str(raw).map_err(|_| {
        AppError::InvalidInput("Tags must be a JSON array of strings".to_string())
    })?;

    let tags = normalize_tags(tags);
    if let Some(tag) = tags.iter().find(|tag| tag.chars().count() > MAX_TAG_CHARS) {
        return Err(AppError::InvalidInput(format!(
            "Tag '{}...' is longer than {} characters",
            tag.chars().take(20).collect::<String>(),
            MAX_TAG_CHARS
        )));
    }

    Ok(tags)
}

/// Reads the tag filter from a query string. Accepts repeated `tags` keys and
/// comma separated values.
pub fn parse_tag_filter(query: &str) -> Vec<String> {
    let values: Vec<String> = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == "tags")
        .flat_map(|(_, value)| {
            value.split(',').map(str::to_string).collect::<Vec<_>>()
        })
        .collect();

    normalize_tags(values)
}
