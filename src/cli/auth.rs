use std::{sync::Arc, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    sync::Mutex,
    time::{Instant, sleep},
};

use crate::{
    api::AppState,
    config::Config,
    error, info,
    server::{build_state, router},
    spotify::auth::generate_state,
    success,
    types::PendingLogin,
    utils, warning,
};

const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs the one-time authorization code flow and stores the resulting tokens.
///
/// With `code` set the code is exchanged right away. Otherwise the consent
/// URL is printed (and opened in a browser unless `no_browser`), a local
/// callback server is started on the configured address and the flow
/// finishes on whichever comes first: Spotify redirecting to `/callback`, or
/// the operator pasting the code or full redirect URL into the terminal.
pub async fn login(config: &Config, code: Option<String>, no_browser: bool) {
    require_shared_store(config, "login");
    let app = match build_state(config).await {
        Ok(app) => app,
        Err(e) => error!("Cannot set up credential store. Err: {}", e),
    };

    if let Some(code) = code {
        exchange(&app, &code).await;
        return;
    }

    let state = generate_state();
    let auth_url = match app.auth.authorize_url(&state) {
        Ok(url) => url,
        Err(e) => error!("Cannot build consent URL. Err: {}", e),
    };
    *app.pending.lock().await = Some(PendingLogin {
        state: state.clone(),
    });

    match TcpListener::bind(config.server_address).await {
        Ok(listener) => {
            let server_app = app.clone();
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router(server_app)).await {
                    warning!("Callback server stopped: {}", e);
                }
            });
        }
        Err(e) => warning!(
            "Cannot listen on {} ({}), paste the redirect URL instead.",
            config.server_address,
            e
        ),
    }

    info!("Open this URL and grant access:\n{}", auth_url);
    if !no_browser && webbrowser::open(&auth_url).is_err() {
        warning!("Failed to open browser. Please navigate to the URL above manually.");
    }
    info!("Waiting for the callback, or paste the code / redirect URL here:");

    tokio::select! {
        completed = wait_for_callback(Arc::clone(&app.pending)) => {
            if completed {
                success!("Authentication successful!");
            } else {
                error!("Authentication timed out.");
            }
        }
        line = read_line() => {
            let Some(line) = line else {
                error!("No input received.");
            };
            let pasted = match utils::parse_pasted_authorization(&line) {
                Ok(p) => p,
                Err(e) => error!("{}", e),
            };
            if pasted.state.as_deref().is_some_and(|s| s != state) {
                error!("Pasted URL belongs to a different login attempt.");
            }
            exchange(&app, &pasted.code).await;
        }
    }
}

/// Removes every stored credential.
pub async fn logout(config: &Config) {
    require_shared_store(config, "logout");
    let app = match build_state(config).await {
        Ok(app) => app,
        Err(e) => error!("Cannot set up credential store. Err: {}", e),
    };

    match app.tokens.logout().await {
        Ok(()) => success!("Stored Spotify credentials removed."),
        Err(e) => error!("Failed to remove credentials. Err: {}", e),
    }
}

/// Credentials written to the in-memory store die with this command, so
/// neither command would have any effect on a running server.
fn require_shared_store(config: &Config, command: &str) {
    if !config.store.is_shared() {
        error!(
            "`{}` needs a shared credential store, CREDENTIAL_STORE=memory keeps tokens only inside this process. Set CREDENTIAL_STORE=redis.",
            command
        );
    }
}

async fn exchange(app: &AppState, code: &str) {
    match app.tokens.authorize_with_code(code).await {
        Ok(_) => success!("Authentication successful!"),
        Err(e) => error!("Token exchange failed. Err: {}", e),
    }
}

/// Polls until the callback handler has cleared the pending login.
async fn wait_for_callback(pending: Arc<Mutex<Option<PendingLogin>>>) -> bool {
    let start = Instant::now();

    while start.elapsed() < LOGIN_TIMEOUT {
        if pending.lock().await.is_none() {
            return true;
        }
        sleep(Duration::from_secs(1)).await;
    }

    false
}

async fn read_line() -> Option<String> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    lines.next_line().await.ok().flatten()
}
