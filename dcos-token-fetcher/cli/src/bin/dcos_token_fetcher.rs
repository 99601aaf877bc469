/*
cargo run -p dcos-token-fetcher-cli --bin dcos_token_fetcher -- -c https://master.mesos -u 'uid' -k '/path/private-key.pem' -t 3600

Or, inside a task with a service account secret

cargo install dcos-token-fetcher-cli
dcos_token_fetcher -s "$MESOS_SANDBOX/sa-secret.json" -t 3600 -o file
*/

use core::time::Duration;
use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::{ArgGroup, Parser, ValueEnum};
use dcos_token_fetcher::{
    fetch, login::DEFAULT_CLUSTER, CredentialSource, LoginConfig, OutputTarget,
};
use log::debug;

/// This program will fetch an authentication token from a DC/OS cluster
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("credential").required(true).args(["userkey", "sasecret"])))]
struct Args {
    /// URL for the cluster
    #[arg(short, long, env = "DCOS_CLUSTER", default_value = DEFAULT_CLUSTER)]
    cluster: String,

    /// The username to fetch the JWT token for
    #[arg(short, long, requires = "userkey", conflicts_with = "sasecret")]
    username: Option<String>,

    /// The private key to use
    #[arg(short = 'k', long, requires = "username")]
    userkey: Option<PathBuf>,

    /// Path to the sa-secret in the secret store. Use when running in a container
    #[arg(short, long)]
    sasecret: Option<PathBuf>,

    /// Time in seconds the token should be valid for
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    time: u64,

    /// Where to put the token: "file" writes a "dcostoken" file in the current directory
    #[arg(short, long, value_enum, ignore_case = true, default_value_t = Output::Screen)]
    output: Output,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Skip verification of the cluster TLS certificate. Only for clusters whose CA cannot be trusted locally
    #[arg(long)]
    insecure_skip_tls_verify: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Output {
    File,
    Screen,
}

impl Args {
    fn credential_source(&self) -> Option<CredentialSource> {
        match (&self.sasecret, &self.userkey, &self.username) {
            (Some(path), None, None) => Some(CredentialSource::secret_bundle(path)),
            (None, Some(path), Some(username)) => {
                Some(CredentialSource::standalone_key(path, username))
            }
            _ => None,
        }
    }

    fn login_config(&self) -> LoginConfig {
        LoginConfig {
            timeout: Duration::from_secs(self.timeout),
            insecure_skip_tls_verify: self.insecure_skip_tls_verify,
            ..LoginConfig::new(&self.cluster)
        }
    }

    fn output_target(&self) -> OutputTarget {
        match self.output {
            Output::File => OutputTarget::file(),
            Output::Screen => OutputTarget::Screen,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    ExitCode::from(run(&args, &mut io::stdout().lock(), &mut io::stderr().lock()))
}

/// Returns the process exit status. Failures are reported on `stderr` only.
fn run(args: &Args, screen: &mut impl Write, stderr: &mut impl Write) -> u8 {
    let Some(source) = args.credential_source() else {
        let _ = writeln!(
            stderr,
            "exactly one of --userkey (with --username) or --sasecret is required"
        );
        return 1;
    };

    match fetch(
        &source,
        Duration::from_secs(args.time),
        &args.login_config(),
        &args.output_target(),
        screen,
    ) {
        Ok(()) => 0,
        Err(err) => {
            debug!("fetch failed: {:?}", err.kind());
            let _ = writeln!(stderr, "{err}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::{error::ErrorKind, CommandFactory as _};
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const RSA_PRIVATE_KEY: &str = include_str!("../../../tests/keys/rsa-private.pem");

    struct Run {
        code: u8,
        stdout: String,
        stderr: String,
    }

    async fn run_blocking(args: Vec<String>) -> Run {
        tokio::task::spawn_blocking(move || {
            let args = Args::try_parse_from(args).unwrap();
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            let code = run(&args, &mut stdout, &mut stderr);
            Run {
                code,
                stdout: String::from_utf8(stdout).unwrap(),
                stderr: String::from_utf8(stderr).unwrap(),
            }
        })
        .await
        .unwrap()
    }

    async fn mock_login(body: serde_json::Value, status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(dcos_token_fetcher::login::LOGIN_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    fn sasecret_args(dir: &tempfile::TempDir, cluster: &str) -> Vec<String> {
        let path = dir.path().join("sa-secret.json");
        std::fs::write(
            &path,
            json!({"uid": "alice", "private_key": RSA_PRIVATE_KEY}).to_string(),
        )
        .unwrap();

        vec![
            "dcos_token_fetcher".into(),
            "-c".into(),
            cluster.into(),
            "-s".into(),
            path.display().to_string(),
            "-t".into(),
            "60".into(),
        ]
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_prints_token() {
        let server = mock_login(json!({"token": "abc123"}), 200).await;
        let dir = tempfile::tempdir().unwrap();

        let run = run_blocking(sasecret_args(&dir, &server.uri())).await;

        assert_eq!(run.code, 0);
        assert_eq!(run.stdout, "abc123\n");
        assert!(run.stderr.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_rejected() {
        let server = mock_login(json!({"error": "invalid signature"}), 401).await;
        let dir = tempfile::tempdir().unwrap();

        let run = run_blocking(sasecret_args(&dir, &server.uri())).await;

        assert_eq!(run.code, 1);
        assert!(run.stdout.is_empty());
        assert_eq!(run.stderr.lines().count(), 2);
        assert!(run.stderr.starts_with("An error occurred (status 401). Server response:\n"));
        assert!(run.stderr.contains("invalid signature"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_missing_key_file() {
        let server = mock_login(json!({"token": "abc123"}), 200).await;
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("missing.pem");

        let run = run_blocking(vec![
            "dcos_token_fetcher".into(),
            "-c".into(),
            server.uri(),
            "-u".into(),
            "alice".into(),
            "-k".into(),
            key_path.display().to_string(),
            "-t".into(),
            "60".into(),
        ])
        .await;

        assert_eq!(run.code, 1);
        assert!(run.stdout.is_empty());
        assert!(run.stderr.starts_with("cannot read private key file"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn test_command() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_userkey() {
        let args = Args::try_parse_from([
            "dcos_token_fetcher",
            "-u",
            "alice",
            "-k",
            "/tmp/private-key.pem",
            "-t",
            "3600",
        ])
        .unwrap();

        assert_eq!(
            args.credential_source(),
            Some(CredentialSource::standalone_key("/tmp/private-key.pem", "alice"))
        );
        assert_eq!(args.output_target(), OutputTarget::Screen);
        assert_eq!(args.time, 3600);

        let config = args.login_config();
        assert_eq!(config.cluster.as_ref(), "https://master.mesos");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(!config.insecure_skip_tls_verify);
    }

    #[test]
    fn test_parse_sasecret() {
        let args = Args::try_parse_from([
            "dcos_token_fetcher",
            "--cluster",
            "https://10.0.0.1",
            "--sasecret",
            "/mnt/mesos/sandbox/sa-secret.json",
            "--time",
            "60",
            "--output",
            "FILE",
            "--timeout",
            "5",
            "--insecure-skip-tls-verify",
        ])
        .unwrap();

        assert_eq!(
            args.credential_source(),
            Some(CredentialSource::secret_bundle("/mnt/mesos/sandbox/sa-secret.json"))
        );
        assert_eq!(args.output_target(), OutputTarget::file());

        let config = args.login_config();
        assert_eq!(config.cluster.as_ref(), "https://10.0.0.1");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.insecure_skip_tls_verify);
    }

    #[test]
    fn test_parse_requires_one_credential_source() {
        let err = Args::try_parse_from(["dcos_token_fetcher", "-t", "60"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = Args::try_parse_from([
            "dcos_token_fetcher",
            "-u",
            "alice",
            "-k",
            "/tmp/private-key.pem",
            "-s",
            "/tmp/sa-secret.json",
            "-t",
            "60",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_parse_userkey_requires_username() {
        let err = Args::try_parse_from([
            "dcos_token_fetcher",
            "-k",
            "/tmp/private-key.pem",
            "-t",
            "60",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_parse_time() {
        let err = Args::try_parse_from(["dcos_token_fetcher", "-s", "/tmp/sa-secret.json"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        for time in ["0", "-5", "soon"] {
            assert!(Args::try_parse_from([
                "dcos_token_fetcher",
                "-s",
                "/tmp/sa-secret.json",
                "-t",
                time,
            ])
            .is_err());
        }
    }

    #[test]
    fn test_parse_output() {
        let err = Args::try_parse_from([
            "dcos_token_fetcher",
            "-s",
            "/tmp/sa-secret.json",
            "-t",
            "60",
            "-o",
            "printer",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }
}
