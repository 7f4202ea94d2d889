use crate::commands::load_config;
use crate::core::{
    clients::{client_for, ClientAction},
    error::Result,
    print_success,
};
use std::env;

/// Hand `action` on `paths` to the configured external client
pub fn execute_open(action: ClientAction, paths: Vec<String>) -> Result<()> {
    let config = load_config();
    let working_copy = env::current_dir()?;
    let client = client_for(config.client);

    let paths = if paths.is_empty() {
        vec![working_copy.to_string_lossy().into_owned()]
    } else {
        paths
    };
    log::debug!("Dispatching {action:?} on {paths:?} to {}", client.name());

    client.run(action, &paths, Some(&working_copy))?;
    print_success(&format!("Opened {} for {} path(s)", client.name(), paths.len()));
    Ok(())
}
