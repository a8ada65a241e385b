use url::Url;

/// What the operator pasted after granting access: either the bare
/// authorization code or the whole redirect URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastedAuthorization {
    pub code: String,
    pub state: Option<String>,
}

/// Extracts the authorization code from a pasted redirect URL or bare code.
///
/// # Arguments
///
/// * `input` - a line read from the terminal, surrounding whitespace allowed
///
/// # Returns
///
/// The code and, when a full URL was pasted, its `state` parameter. Fails
/// when the URL carries an `error` instead of a code, or when the input is
/// empty.
pub fn parse_pasted_authorization(input: &str) -> Result<PastedAuthorization, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("nothing was pasted".to_string());
    }

    let Ok(url) = Url::parse(input) else {
        if input.contains(char::is_whitespace) {
            return Err("authorization code must not contain whitespace".to_string());
        }
        return Ok(PastedAuthorization {
            code: input.to_string(),
            state: None,
        });
    };

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(format!("authorization was denied: {}", value)),
            _ => {}
        }
    }

    match code {
        Some(code) if !code.is_empty() => Ok(PastedAuthorization { code, state }),
        _ => Err("redirect URL has no code parameter".to_string()),
    }
}

/// Human readable presence marker for the status table.
pub fn presence(present: bool) -> &'static str {
    if present { "stored" } else { "missing" }
}
