//! SFTP remote backend
//!
//! Connects over SSH, authenticates, and maps the [`Connection`] operations
//! onto SFTP: objects are remote files opened with positioned writes,
//! collections are remote directories.

use crate::config::RemoteConfig;
use crate::error::{ParputError, Result};
use crate::remote::{Connection, ObjectWrite};
use ssh2::{OpenFlags, OpenType, Session, Sftp};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One authenticated SSH session with an open SFTP channel
pub struct SftpConnection {
    /// SSH session, kept for the lifetime of the SFTP channel
    session: Session,
    /// SFTP channel
    sftp: Sftp,
    /// Remote host, for error context
    host: String,
}

impl SftpConnection {
    /// Dial, handshake, and authenticate against the remote host
    pub fn connect(config: &RemoteConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        debug!(addr = %addr, "dialing remote endpoint");

        let tcp = TcpStream::connect(&addr)
            .map_err(|e| ParputError::connection(&config.host, e.to_string()))?;

        let mut session = Session::new()
            .map_err(|e| ParputError::connection(&config.host, e.to_string()))?;

        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| ParputError::connection(&config.host, e.to_string()))?;

        Self::authenticate(&mut session, config)?;

        let sftp = session
            .sftp()
            .map_err(|e| ParputError::connection(&config.host, e.to_string()))?;

        Ok(Self {
            session,
            sftp,
            host: config.host.clone(),
        })
    }

    /// Authenticate with the remote host
    fn authenticate(session: &mut Session, config: &RemoteConfig) -> Result<()> {
        if let Some(key_path) = &config.key_path {
            session
                .userauth_pubkey_file(&config.user, None, key_path, None)
                .map_err(|e| ParputError::auth(&config.user, &config.host, e.to_string()))?;
        } else if let Some(password) = &config.password {
            session
                .userauth_password(&config.user, password)
                .map_err(|e| ParputError::auth(&config.user, &config.host, e.to_string()))?;
        } else {
            // Try SSH agent
            let mut agent = session
                .agent()
                .map_err(|e| ParputError::auth(&config.user, &config.host, e.to_string()))?;

            agent
                .connect()
                .map_err(|e| ParputError::auth(&config.user, &config.host, e.to_string()))?;

            agent
                .list_identities()
                .map_err(|e| ParputError::auth(&config.user, &config.host, e.to_string()))?;

            let identities: Vec<_> = agent.identities().unwrap_or_default();

            let mut authenticated = false;
            for identity in identities {
                if agent.userauth(&config.user, &identity).is_ok() {
                    authenticated = true;
                    break;
                }
            }

            if !authenticated {
                return Err(ParputError::auth(
                    &config.user,
                    &config.host,
                    "No valid SSH key found in agent",
                ));
            }
        }

        if !session.authenticated() {
            return Err(ParputError::auth(
                &config.user,
                &config.host,
                "Authentication failed",
            ));
        }

        Ok(())
    }

    /// Underlying SSH session, for keepalive tuning
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Remote host this connection is bound to
    pub fn host(&self) -> &str {
        &self.host
    }

    fn remote_err(&self, e: ssh2::Error) -> ParputError {
        ParputError::remote(format!("{} ({})", e, self.host))
    }
}

impl Connection for SftpConnection {
    fn create(&self, path: &Path) -> Result<Box<dyn ObjectWrite>> {
        let file = self.sftp.create(path).map_err(|e| self.remote_err(e))?;
        Ok(Box::new(file))
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn ObjectWrite>> {
        // CREATE without TRUNCATE: concurrent chunk writers open the same
        // object after the caller has created it once.
        let file = self
            .sftp
            .open_mode(
                path,
                OpenFlags::WRITE | OpenFlags::CREATE,
                0o644,
                OpenType::File,
            )
            .map_err(|e| self.remote_err(e))?;
        Ok(Box::new(file))
    }

    fn create_collection(&self, path: &Path) -> Result<()> {
        let mut current = PathBuf::new();

        for component in path.components() {
            current.push(component);

            match self.sftp.stat(&current) {
                Ok(stat) => {
                    if !stat.is_dir() {
                        return Err(ParputError::remote(format!(
                            "Path exists but is not a collection: {current:?}"
                        )));
                    }
                }
                Err(_) => {
                    self.sftp
                        .mkdir(&current, 0o755)
                        .map_err(|e| self.remote_err(e))?;
                }
            }
        }

        Ok(())
    }
}
