//! Remote strategy: `top` and `free` over SSH.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use ssh2::Session;
use tracing::debug;

use crate::collector::ProbeError;
use crate::config::SshSettings;
use crate::fmt::{mib_to_gb, round2};
use crate::model::HostMetrics;

pub const CPU_COMMAND: &str = "top -bn1 | grep 'Cpu(s)'";
pub const MEM_COMMAND: &str = "free -m";

/// Bound on TCP connect and on every blocking SSH call.
const SSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Private keys tried from `~/.ssh` when no credentials are configured.
pub const DEFAULT_KEY_FILES: [&str; 3] = ["id_rsa", "id_ecdsa", "id_ed25519"];

/// How [`SshShell::connect`] authenticates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMethod<'a> {
    /// Configured private key file. Wins over a configured password.
    KeyFile(&'a Path),
    Password(&'a str),
    /// Neither is configured: ssh-agent, then [`DEFAULT_KEY_FILES`].
    Agent,
}

/// Picks the authentication method for `ssh`. Empty strings count as unset.
pub fn auth_method(ssh: &SshSettings) -> AuthMethod<'_> {
    if let Some(key) = ssh.key.as_deref().filter(|k| !k.is_empty()) {
        AuthMethod::KeyFile(Path::new(key))
    } else if let Some(password) = ssh.password.as_deref().filter(|p| !p.is_empty()) {
        AuthMethod::Password(password)
    } else {
        AuthMethod::Agent
    }
}

/// Candidate default keys under `home`, in the order they are tried.
pub fn default_key_files(home: &Path) -> Vec<PathBuf> {
    DEFAULT_KEY_FILES
        .iter()
        .map(|name| home.join(".ssh").join(name))
        .collect()
}

/// Something that can run a shell command on the database host.
pub trait RemoteShell {
    /// Runs `cmd` and returns its standard output.
    fn run(&mut self, cmd: &str) -> Result<String, ProbeError>;
}

/// Authenticated SSH session. Disconnects on drop.
pub struct SshShell {
    session: Session,
}

impl SshShell {
    /// Connects and authenticates, see [`auth_method`].
    pub fn connect(host: &str, ssh: &SshSettings) -> Result<Self, ProbeError> {
        let addr = (host, ssh.port)
            .to_socket_addrs()
            .map_err(|e| ProbeError::remote(format!("resolve {}: {}", host, e)))?
            .next()
            .ok_or_else(|| ProbeError::remote(format!("resolve {}: no addresses", host)))?;

        let tcp = TcpStream::connect_timeout(&addr, SSH_TIMEOUT)
            .map_err(|e| ProbeError::remote(format!("connect {}: {}", addr, e)))?;

        let mut session = Session::new().map_err(ssh_error)?;
        session.set_tcp_stream(tcp);
        session.set_timeout(SSH_TIMEOUT.as_millis() as u32);
        session.handshake().map_err(ssh_error)?;

        authenticate(&session, ssh)?;

        if !session.authenticated() {
            return Err(ProbeError::remote(format!(
                "SSH authentication failed for {}",
                ssh.user
            )));
        }

        debug!(host, port = ssh.port, user = %ssh.user, "SSH session established");
        Ok(Self { session })
    }
}

impl RemoteShell for SshShell {
    fn run(&mut self, cmd: &str) -> Result<String, ProbeError> {
        let mut channel = self.session.channel_session().map_err(ssh_error)?;
        channel.exec(cmd).map_err(ssh_error)?;

        let mut out = String::new();
        channel
            .read_to_string(&mut out)
            .map_err(|e| ProbeError::remote(format!("{}: {}", cmd, e)))?;
        channel.wait_close().map_err(ssh_error)?;
        Ok(out)
    }
}

impl Drop for SshShell {
    fn drop(&mut self) {
        let _ = self.session.disconnect(None, "pgreport done", None);
    }
}

fn authenticate(session: &Session, ssh: &SshSettings) -> Result<(), ProbeError> {
    match auth_method(ssh) {
        AuthMethod::KeyFile(key) => session
            .userauth_pubkey_file(&ssh.user, None, key, None)
            .map_err(ssh_error),
        AuthMethod::Password(password) => session
            .userauth_password(&ssh.user, password)
            .map_err(ssh_error),
        AuthMethod::Agent => {
            match session.userauth_agent(&ssh.user) {
                Ok(()) if session.authenticated() => return Ok(()),
                Ok(()) => debug!(user = %ssh.user, "ssh-agent offered no accepted key"),
                Err(e) => debug!(user = %ssh.user, "ssh-agent: {}", e.message()),
            }

            let home = std::env::var_os("HOME").map(PathBuf::from);
            for key in home.iter().flat_map(|h| default_key_files(h)) {
                if !key.is_file() {
                    continue;
                }
                match session.userauth_pubkey_file(&ssh.user, None, &key, None) {
                    Ok(()) if session.authenticated() => return Ok(()),
                    Ok(()) => {}
                    Err(e) => debug!(key = %key.display(), "key rejected: {}", e.message()),
                }
            }

            Err(ProbeError::remote(format!(
                "no SSH credentials accepted for {}: ssh-agent and ~/.ssh keys failed, set ssh_key or ssh_password",
                ssh.user
            )))
        }
    }
}

fn ssh_error(e: ssh2::Error) -> ProbeError {
    ProbeError::remote(e.message().to_string())
}

/// Host probe for a database that runs on another machine.
pub struct RemoteHostProbe {
    host: String,
    ssh: SshSettings,
}

impl RemoteHostProbe {
    pub fn new(host: String, ssh: SshSettings) -> Self {
        Self { host, ssh }
    }

    pub fn sample(&self) -> Result<HostMetrics, ProbeError> {
        let mut shell = SshShell::connect(&self.host, &self.ssh)?;
        sample_with(&mut shell)
    }
}

/// Runs both commands on `shell` and parses their output.
pub fn sample_with(shell: &mut impl RemoteShell) -> Result<HostMetrics, ProbeError> {
    let top = shell.run(CPU_COMMAND)?;
    let free = shell.run(MEM_COMMAND)?;

    let cpu_pct = match parse_cpu_idle(&top) {
        Some(idle) => round2((100.0 - idle).clamp(0.0, 100.0)),
        None => {
            debug!(output = %top.trim(), "no idle field in top output");
            0.0
        }
    };
    let (total, used, free) = parse_free_mb(&free)?;

    Ok(HostMetrics {
        cpu_pct,
        ram_pct: round2(used as f64 / total as f64 * 100.0),
        ram_total_gb: mib_to_gb(total),
        ram_used_gb: mib_to_gb(used),
        ram_available_gb: mib_to_gb(free),
    })
}

/// Idle percentage from a `top` CPU line (`"... 95.0 id, ..."`).
pub fn parse_cpu_idle(top: &str) -> Option<f64> {
    let re = Regex::new(r"(\d+\.\d+)\s*id").ok()?;
    re.captures(top)?.get(1)?.as_str().parse().ok()
}

/// `(total, used, free)` in MiB from the `Mem:` row of `free -m`.
pub fn parse_free_mb(free: &str) -> Result<(u64, u64, u64), ProbeError> {
    let line = free
        .lines()
        .nth(1)
        .ok_or_else(|| ProbeError::remote("free -m: missing memory row"))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(3)
        .map(|f| f.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|e| ProbeError::remote(format!("free -m: {}: {:?}", e, line)))?;

    match fields[..] {
        [total, used, free] if total > 0 => Ok((total, used, free)),
        [0, _, _] => Err(ProbeError::remote("free -m: zero total memory")),
        _ => Err(ProbeError::remote(format!("free -m: short row {:?}", line))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ProbeErrorKind;
    use std::collections::HashMap;

    /// Replays canned command output.
    struct ScriptedShell {
        outputs: HashMap<&'static str, Result<String, ProbeError>>,
        ran: Vec<String>,
    }

    impl ScriptedShell {
        fn new(top: &str, free: &str) -> Self {
            let mut outputs = HashMap::new();
            outputs.insert(CPU_COMMAND, Ok(top.to_string()));
            outputs.insert(MEM_COMMAND, Ok(free.to_string()));
            Self {
                outputs,
                ran: Vec::new(),
            }
        }
    }

    impl RemoteShell for ScriptedShell {
        fn run(&mut self, cmd: &str) -> Result<String, ProbeError> {
            self.ran.push(cmd.to_string());
            self.outputs
                .get(cmd)
                .cloned()
                .unwrap_or_else(|| Err(ProbeError::remote(format!("unexpected command {}", cmd))))
        }
    }

    const FREE_OUTPUT: &str = "              total        used        free      shared  buff/cache   available\n\
                               Mem: 16000 4000 12000 0 0 0\n\
                               Swap:          2047           0        2047\n";

    #[test]
    fn remote_sample_from_top_and_free() {
        let mut shell = ScriptedShell::new(
            "%Cpu(s):  3.1 us,  1.2 sy,  0.0 ni, 95.0 id,  0.5 wa,  0.0 hi,  0.2 si,  0.0 st",
            FREE_OUTPUT,
        );
        let m = sample_with(&mut shell).unwrap();

        assert_eq!(
            m,
            HostMetrics {
                cpu_pct: 5.0,
                ram_pct: 25.0,
                ram_total_gb: 15.63,
                ram_used_gb: 3.91,
                ram_available_gb: 11.72,
            }
        );
        assert_eq!(shell.ran, vec![CPU_COMMAND, MEM_COMMAND]);
    }

    #[test]
    fn unparsable_top_gives_zero_cpu() {
        let mut shell = ScriptedShell::new("bash: top: command not found", FREE_OUTPUT);
        let m = sample_with(&mut shell).unwrap();
        assert_eq!(m.cpu_pct, 0.0);
        assert_eq!(m.ram_pct, 25.0);
    }

    #[test]
    fn command_failure_propagates() {
        let mut shell = ScriptedShell::new("95.0 id", FREE_OUTPUT);
        shell
            .outputs
            .insert(MEM_COMMAND, Err(ProbeError::remote("channel closed")));
        let err = sample_with(&mut shell).unwrap_err();
        assert_eq!(err.kind, ProbeErrorKind::HostProbeRemote);
        assert_eq!(err.cause, "channel closed");
    }

    #[test]
    fn cpu_idle_regex() {
        assert_eq!(parse_cpu_idle("Cpu(s): 2.0%us, 97.5%id"), None);
        assert_eq!(parse_cpu_idle("Cpu(s): 2.0 us, 97.5 id"), Some(97.5));
        assert_eq!(parse_cpu_idle("Cpu(s): 2.0 us,100.0id"), Some(100.0));
        assert_eq!(parse_cpu_idle(""), None);
    }

    fn settings(key: Option<&str>, password: Option<&str>) -> SshSettings {
        SshSettings {
            key: key.map(str::to_string),
            password: password.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn key_file_wins_over_password() {
        let ssh = settings(Some("/home/pg/.ssh/id_ed25519"), Some("secret"));
        assert_eq!(
            auth_method(&ssh),
            AuthMethod::KeyFile(Path::new("/home/pg/.ssh/id_ed25519"))
        );
    }

    #[test]
    fn password_without_key() {
        assert_eq!(
            auth_method(&settings(None, Some("secret"))),
            AuthMethod::Password("secret")
        );
        assert_eq!(
            auth_method(&settings(Some(""), Some("secret"))),
            AuthMethod::Password("secret")
        );
    }

    #[test]
    fn no_credentials_falls_back_to_agent() {
        assert_eq!(auth_method(&settings(None, None)), AuthMethod::Agent);
        assert_eq!(auth_method(&settings(Some(""), Some(""))), AuthMethod::Agent);
    }

    #[test]
    fn default_keys_live_under_dot_ssh() {
        let keys = default_key_files(Path::new("/home/pg"));
        assert_eq!(
            keys,
            vec![
                PathBuf::from("/home/pg/.ssh/id_rsa"),
                PathBuf::from("/home/pg/.ssh/id_ecdsa"),
                PathBuf::from("/home/pg/.ssh/id_ed25519"),
            ]
        );
    }

    #[test]
    fn free_rejects_bad_rows() {
        assert!(parse_free_mb("only header").is_err());
        assert!(parse_free_mb("header\nMem: 0 0 0").is_err());
        assert!(parse_free_mb("header\nMem: 100 x 50").is_err());
        assert!(parse_free_mb("header\nMem: 100 50").is_err());
        assert_eq!(parse_free_mb("header\nMem: 100 40 60 0").unwrap(), (100, 40, 60));
    }
}
