//! Configuration sanity checks run at startup and by `--validate-config`.

use super::Config;

/// Validate the loaded configuration. Returns a newline-separated list of
/// problems on failure.
pub fn validate(config: &Config) -> Result<(), String> {
    let mut problems = Vec::new();

    if config.lobby.port == 0 {
        problems.push("lobby.port must be non-zero".to_string());
    }
    if config.storage.port == 0 {
        problems.push("storage.port must be non-zero".to_string());
    }
    if config.lobby.port == config.storage.port && config.lobby.host == config.storage.host {
        problems.push(format!(
            "lobby and storage services cannot share {}:{}",
            config.lobby.host, config.lobby.port
        ));
    }
    if config.game.start_port < 1024 {
        problems.push(format!(
            "game.start_port {} is in the privileged range",
            config.game.start_port
        ));
    }
    if config.storage.data_dir.trim().is_empty() {
        problems.push("storage.data_dir must not be empty".to_string());
    }
    if config.game.default_command.is_empty() {
        problems.push("game.default_command must name an executable".to_string());
    }
    if config.lobby.client_queue_size == 0 {
        problems.push("lobby.client_queue_size must be non-zero".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn colliding_ports_are_rejected() {
        let mut config = Config::default();
        config.storage.port = config.lobby.port;
        let err = validate(&config).unwrap_err();
        assert!(err.contains("cannot share"));
    }

    #[test]
    fn privileged_game_port_is_rejected() {
        let mut config = Config::default();
        config.game.start_port = 80;
        assert!(validate(&config).is_err());
    }
}
