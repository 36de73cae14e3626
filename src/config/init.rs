// ABOUTME: Config scaffolding for new installations.
// ABOUTME: Creates an sshbridge.yml template file.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, DEFAULT_PORT};

pub fn init_config(dir: &Path, host: Option<&str>, user: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let yaml = generate_template_yaml(
        host.unwrap_or("server.example.com"),
        user.unwrap_or("deploy"),
    );
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(host: &str, user: &str) -> String {
    format!(
        r#"host: {}
port: {}
user: {}
# Authenticate with a private key...
key_file: ~/.ssh/id_ed25519
# ...or a password, read from the environment. A password wins over a key.
# password:
#   env: SSH_PASSWORD

# SSH host key verification
# Set to false to require the host in known_hosts
# trust_on_first_use: true
# known_hosts_path: ~/.ssh/known_hosts

# Optional upper bound for remote commands (default: none)
# command_timeout: 5m
"#,
        host, DEFAULT_PORT, user
    )
}
