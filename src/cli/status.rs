use tabled::Table;

use crate::{
    config::Config, error, server::build_state, success, types::CredentialTableRow, utils,
    warning,
};

/// Prints which credentials the store currently holds.
pub async fn status(config: &Config) {
    let app = match build_state(config).await {
        Ok(app) => app,
        Err(e) => error!("Cannot set up credential store. Err: {}", e),
    };

    let status = match app.tokens.status().await {
        Ok(status) => status,
        Err(e) => error!("Cannot read credential store. Err: {}", e),
    };

    let rows = vec![
        CredentialTableRow {
            credential: "access token".to_string(),
            state: utils::presence(status.access_token_present).to_string(),
        },
        CredentialTableRow {
            credential: "refresh token".to_string(),
            state: utils::presence(status.refresh_token_present).to_string(),
        },
    ];
    println!("{}", Table::new(rows));

    if !status.refresh_token_present {
        warning!("No refresh token stored. Run spotify-broadcast login.");
    }
}

/// Obtains a valid access token once, refreshing it if needed.
pub async fn check(config: &Config) {
    let app = match build_state(config).await {
        Ok(app) => app,
        Err(e) => error!("Cannot set up credential store. Err: {}", e),
    };

    match app.tokens.get_valid_token().await {
        Ok(_) => success!("A valid access token is available."),
        Err(e) if e.needs_reauth() => {
            error!("{}. Run spotify-broadcast login.", e)
        }
        Err(e) if e.is_retryable() => {
            error!("{}. Try again in a moment.", e)
        }
        Err(e) => error!("{}", e),
    }
}
