use std::process::Stdio;
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command;
use crate::config::CommandConfig;
use crate::error::{EmulatorError, Result};
use super::{Capability, PowerAction};

/// Backend that runs a local program per action; exit status 0 means success.
pub struct CommandBackend {
    name: String,
    port: u16,
    on_cmd: Vec<String>,
    off_cmd: Vec<String>,
    state_cmd: Option<Vec<String>>,
    use_fake_state: bool,
    timeout: Duration,
}

impl CommandBackend {
    pub fn new(name: &str, port: u16, config: &CommandConfig, timeout: Duration) -> Result<Self> {
        let parse = |field: &str, command: &str| {
            shlex::split(command)
                .filter(|argv| !argv.is_empty())
                .ok_or_else(|| {
                    EmulatorError::Configuration(format!(
                        "device '{}': cannot parse {} '{}'",
                        name, field, command
                    ))
                })
        };

        Ok(Self {
            name: name.to_string(),
            port,
            on_cmd: parse("on_cmd", &config.on_cmd)?,
            off_cmd: parse("off_cmd", &config.off_cmd)?,
            state_cmd: config
                .state_cmd
                .as_deref()
                .map(|cmd| parse("state_cmd", cmd))
                .transpose()?,
            use_fake_state: config.use_fake_state,
            timeout,
        })
    }

    async fn run(&self, argv: &[String]) -> bool {
        self.execute(argv).await == Exit::Success
    }

    async fn execute(&self, argv: &[String]) -> Exit {
        let Some((program, args)) = argv.split_first() else {
            return Exit::Unavailable;
        };

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) if output.status.success() => Exit::Success,
            Ok(Ok(output)) => {
                tracing::debug!(
                    "{}: '{}' exited with {}: {}",
                    self.name,
                    argv.join(" "),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                Exit::Failure
            }
            Ok(Err(e)) => {
                tracing::error!("{}: failed to run '{}': {}", self.name, program, e);
                Exit::Unavailable
            }
            Err(_) => {
                tracing::error!(
                    "{}: '{}' timed out after {:?}",
                    self.name,
                    argv.join(" "),
                    self.timeout
                );
                Exit::Unavailable
            }
        }
    }
}

/// How a command invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Success,
    Failure,
    /// Could not be started, or did not finish within the timeout
    Unavailable,
}

#[async_trait]
impl Capability for CommandBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn port(&self) -> u16 {
        self.port
    }

    async fn on(&self) -> bool {
        self.run(&self.on_cmd).await
    }

    async fn off(&self) -> bool {
        self.run(&self.off_cmd).await
    }

    async fn get_state(&self, last_action: PowerAction) -> String {
        if self.use_fake_state {
            return last_action.as_str().to_string();
        }

        let Some(state_cmd) = &self.state_cmd else {
            return "unknown".to_string();
        };
        match self.execute(state_cmd).await {
            Exit::Success => "on".to_string(),
            Exit::Failure => "off".to_string(),
            Exit::Unavailable => "unknown".to_string(),
        }
    }
}
