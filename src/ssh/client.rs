// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, authentication, command execution, and SFTP transfers.

use super::error::{Error, Result};
use russh::client::{self, Config, Handle, Msg};
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, decode_secret_key, ssh_key};
use russh::{Channel, ChannelMsg, Disconnect, Sig};
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::{RawSftpSession, SftpSession};
use russh_sftp::protocol::StatusCode;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Private key contents as read from the configured key file.
#[derive(Clone)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    pub fn new(contents: impl Into<String>) -> Self {
        Self(contents.into())
    }

    fn decode(&self) -> Result<ssh_key::PrivateKey> {
        decode_secret_key(&self.0, None).map_err(|e| Error::KeyDecodeFailed(e.to_string()))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

/// Credential used to authenticate a session.
#[derive(Clone)]
pub enum Auth {
    Password(String),
    PrivateKey(KeyMaterial),
    /// No credential configured. The `none` method is still attempted and
    /// the server decides.
    None,
}

impl Auth {
    /// Pick the credential to use. A password wins over a key.
    pub fn select(password: Option<String>, key: Option<KeyMaterial>) -> Self {
        match (password, key) {
            (Some(password), _) => Auth::Password(password),
            (None, Some(key)) => Auth::PrivateKey(key),
            (None, None) => Auth::None,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Auth::Password(_) => "password",
            Auth::PrivateKey(_) => "publickey",
            Auth::None => "none",
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Password(_) => f.write_str("Password(<redacted>)"),
            Auth::PrivateKey(key) => f.debug_tuple("PrivateKey").field(key).finish(),
            Auth::None => f.write_str("None"),
        }
    }
}

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Credential presented to the server.
    pub auth: Auth,
    /// Whether to accept unknown hosts (Trust On First Use).
    /// If false, connection to unknown hosts will fail.
    pub trust_on_first_use: bool,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Upper bound for a remote command. None waits indefinitely.
    pub command_timeout: Option<Duration>,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            auth: Auth::None,
            trust_on_first_use: true,
            known_hosts_path: None,
            command_timeout: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = Auth::Password(password.into());
        self
    }

    pub fn private_key(mut self, key: KeyMaterial) -> Self {
        self.auth = Auth::PrivateKey(key);
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }
}

/// Output from a remote command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit status, absent when the process was killed by a signal.
    pub exit_code: Option<u32>,
    /// Name of the signal that terminated the process, if any.
    pub exit_signal: Option<String>,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// One entry of a remote directory listing, as the SFTP server reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub filename: String,
    pub longname: String,
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: Option<PathBuf>,
}

impl SshHandler {
    fn new(config: &SessionConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            trust_on_first_use: config.trust_on_first_use,
            known_hosts_path: config.known_hosts_path.clone(),
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let check_result = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match check_result {
            Ok(true) => Ok(true),
            Ok(false) if self.trust_on_first_use => {
                tracing::warn!(
                    host = %self.host,
                    port = self.port,
                    "Trust-On-First-Use: accepting unknown host key"
                );
                let learn_result = match &self.known_hosts_path {
                    Some(path) => {
                        learn_known_hosts_path(&self.host, self.port, server_public_key, path)
                    }
                    None => learn_known_hosts(&self.host, self.port, server_public_key),
                };
                if let Err(e) = learn_result {
                    tracing::warn!("Failed to save host key to known_hosts: {}", e);
                }
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::error!(host = %self.host, "host key does not match known_hosts entry");
                Ok(false)
            }
            // Unreadable known_hosts is treated as an unknown host.
            Err(_) => Ok(self.trust_on_first_use),
        }
    }
}

/// An established SSH session.
pub struct Session {
    config: SessionConfig,
    handle: Handle<SshHandler>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    /// Connect and authenticate. Resolves once the session is usable.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let handler = SshHandler::new(&config);

        let mut handle = client::connect(
            Arc::new(Config::default()),
            (config.host.as_str(), config.port),
            handler,
        )
        .await
        .map_err(|e| {
            if e.to_string().contains("Connection refused") {
                Error::Connection(format!(
                    "connection refused to {}:{}",
                    config.host, config.port
                ))
            } else {
                Error::Connection(e.to_string())
            }
        })?;

        tracing::debug!(
            host = %config.host,
            port = config.port,
            method = config.auth.method(),
            "authenticating"
        );

        let authenticated = match Self::authenticate(&mut handle, &config).await {
            Ok(authenticated) => authenticated,
            Err(e) => {
                Self::abandon(&handle).await;
                return Err(e);
            }
        };
        if !authenticated {
            Self::abandon(&handle).await;
            return Err(Error::AuthenticationFailed(config.user.clone()));
        }

        Ok(Self { config, handle })
    }

    /// Authenticate the session with the configured credential.
    async fn authenticate(handle: &mut Handle<SshHandler>, config: &SessionConfig) -> Result<bool> {
        let result = match &config.auth {
            Auth::Password(password) => {
                handle
                    .authenticate_password(config.user.as_str(), password.as_str())
                    .await?
            }
            Auth::PrivateKey(material) => {
                let key = material.decode()?;
                let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
                handle
                    .authenticate_publickey(
                        config.user.as_str(),
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await?
            }
            Auth::None => handle.authenticate_none(config.user.as_str()).await?,
        };
        Ok(result.success())
    }

    /// Drop a connection that never became a usable session.
    async fn abandon(handle: &Handle<SshHandler>) {
        if let Err(e) = handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!("disconnect after failed authentication: {}", e);
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Execute a command on the remote host.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        match self.config.command_timeout {
            Some(timeout) => self.exec_with_timeout(command, timeout).await,
            None => self.exec_inner(command).await,
        }
    }

    /// Execute a command with a custom timeout.
    pub async fn exec_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.exec_inner(command)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        let mut collector = ExecCollector::default();
        while let Some(msg) = channel.wait().await {
            if collector.accept(msg)? {
                break;
            }
        }
        collector.finish()
    }

    /// Open a fresh session channel with the sftp subsystem started on it.
    async fn sftp_channel(&self) -> Result<Channel<Msg>> {
        let channel = self.handle.channel_open_session().await?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| Error::SubsystemFailed(e.to_string()))?;
        Ok(channel)
    }

    async fn sftp(&self) -> Result<SftpSession> {
        let channel = self.sftp_channel().await?;
        Ok(SftpSession::new(channel.into_stream()).await?)
    }

    /// Write `contents` to `remote_path`, creating or truncating it.
    /// Returns once the server has acknowledged closing the file.
    pub async fn upload(&self, remote_path: &str, contents: &[u8]) -> Result<()> {
        let sftp = self.sftp().await?;
        let mut file = sftp.create(remote_path).await?;
        file.write_all(contents).await?;
        file.flush().await?;
        file.shutdown().await?;
        sftp.close().await?;
        Ok(())
    }

    /// Read the whole of `remote_path` into memory.
    pub async fn download(&self, remote_path: &str) -> Result<Vec<u8>> {
        let sftp = self.sftp().await?;
        let mut file = sftp.open(remote_path).await?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await?;
        file.shutdown().await?;
        sftp.close().await?;
        Ok(contents)
    }

    /// List `remote_path` in the order the server returns entries.
    ///
    /// Uses the raw protocol so each entry keeps the server's `longname`
    /// text, and nothing (including `.` and `..`) is filtered out.
    pub async fn read_dir(&self, remote_path: &str) -> Result<Vec<DirEntry>> {
        let channel = self.sftp_channel().await?;
        let sftp = RawSftpSession::new(channel.into_stream());
        sftp.init().await?;

        let handle = sftp.opendir(remote_path).await?.handle;
        let mut entries = Vec::new();
        loop {
            match sftp.readdir(handle.as_str()).await {
                Ok(name) => entries.extend(name.files.into_iter().map(|file| DirEntry {
                    filename: file.filename,
                    longname: file.longname,
                })),
                Err(SftpError::Status(status)) if matches!(status.status_code, StatusCode::Eof) => {
                    break;
                }
                Err(e) => {
                    let _ = sftp.close(handle.as_str()).await;
                    return Err(e.into());
                }
            }
        }
        sftp.close(handle.as_str()).await?;

        Ok(entries)
    }

    /// Disconnect the session.
    pub async fn disconnect(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        Ok(())
    }
}

/// Accumulates the messages of an exec channel into a [`CommandOutput`].
#[derive(Default)]
struct ExecCollector {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<u32>,
    exit_signal: Option<String>,
    got_eof: bool,
}

impl ExecCollector {
    /// Feed one channel message. Returns `true` once the command is done.
    fn accept(&mut self, msg: ChannelMsg) -> Result<bool> {
        match msg {
            ChannelMsg::Data { data } => self.stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext } => {
                if ext == 1 {
                    // stderr
                    self.stderr.extend_from_slice(&data);
                }
            }
            ChannelMsg::ExitStatus { exit_status } => {
                self.exit_code = Some(exit_status);
                return Ok(self.got_eof);
            }
            ChannelMsg::ExitSignal { signal_name, .. } => {
                self.exit_signal = Some(signal_label(&signal_name));
                return Ok(self.got_eof);
            }
            ChannelMsg::Eof => {
                self.got_eof = true;
                return Ok(self.finished());
            }
            ChannelMsg::Close => return Ok(true),
            ChannelMsg::Failure => {
                return Err(Error::CommandFailed(
                    "server refused to execute command".to_string(),
                ));
            }
            _ => {}
        }
        Ok(false)
    }

    fn finished(&self) -> bool {
        self.exit_code.is_some() || self.exit_signal.is_some()
    }

    fn finish(self) -> Result<CommandOutput> {
        // Neither status nor signal means the connection died under the command.
        if !self.finished() {
            return Err(Error::ChannelClosed);
        }

        Ok(CommandOutput {
            exit_code: self.exit_code,
            exit_signal: self.exit_signal,
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
        })
    }
}

fn signal_label(signal: &Sig) -> String {
    match signal {
        Sig::Custom(name) => name.clone(),
        other => format!("{:?}", other),
    }
}
