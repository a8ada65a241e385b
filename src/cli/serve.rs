use crate::{config::Config, error, server};

pub async fn serve(config: &Config) {
    let app = match server::build_state(config).await {
        Ok(app) => app,
        Err(e) => error!("Cannot set up credential store. Err: {}", e),
    };

    if let Err(e) = server::start_api_server(app, config.server_address).await {
        error!("Server failed. Err: {}", e);
    }
}
