//! Command-line and environment configuration (spec §6 "Environment
//! variables (server)"): `OML_PG_HOST`, `OML_PG_PORT`, `OML_PG_USER`,
//! `OML_PG_PASS`, `OML_PG_CONNINFO` override the built-in defaults, and
//! CLI flags take precedence over all of them. This module is the one
//! piece of ambient configuration glue spec.md documents at the wire
//! level (§6) rather than treating as an external collaborator, so it
//! is implemented here rather than left to the host binary.

use crate::error::{OmlError, OmlResult};
#[cfg(feature = "postgres")]
use crate::server::postgres::PgConnectConfig;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;
const DEFAULT_USER: &str = "oml";
const DEFAULT_DBNAME: &str = "oml";

/// CLI flags for the PostgreSQL connection, mirroring the teacher's
/// `clap::Parser`-derived option structs (see `analysis/query.rs`).
/// Every field defaults to `None` so `PgConnectConfig::resolve` can
/// tell "not specified on the command line" apart from "explicitly
/// set to the default".
#[cfg_attr(feature = "cli", derive(clap::Parser))]
#[cfg_attr(feature = "cli", command(author, version, about = "oml-collector measurement server"))]
pub struct PgCliArgs {
    #[cfg_attr(feature = "cli", arg(long, env = "OML_PG_HOST"))]
    pub host: Option<String>,
    #[cfg_attr(feature = "cli", arg(long, env = "OML_PG_PORT"))]
    pub port: Option<u16>,
    #[cfg_attr(feature = "cli", arg(long, env = "OML_PG_USER"))]
    pub user: Option<String>,
    #[cfg_attr(feature = "cli", arg(long, env = "OML_PG_PASS"))]
    pub password: Option<String>,
    #[cfg_attr(feature = "cli", arg(long, env = "OML_PG_CONNINFO"))]
    pub conninfo: Option<String>,
    #[cfg_attr(feature = "cli", arg(long))]
    pub dbname: Option<String>,
}

impl Default for PgCliArgs {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            user: None,
            password: None,
            conninfo: None,
            dbname: None,
        }
    }
}

/// A sparse overlay applied over the built-in defaults, in increasing
/// precedence order: defaults, then `OML_PG_CONNINFO`, then the
/// individual `OML_PG_*` variables, then CLI flags (spec §6 "the CLI
/// takes precedence over environment").
#[derive(Default)]
struct Overlay {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    dbname: Option<String>,
}

impl Overlay {
    fn apply_onto(self, base: &mut Overlay) {
        if self.host.is_some() {
            base.host = self.host;
        }
        if self.port.is_some() {
            base.port = self.port;
        }
        if self.user.is_some() {
            base.user = self.user;
        }
        if self.password.is_some() {
            base.password = self.password;
        }
        if self.dbname.is_some() {
            base.dbname = self.dbname;
        }
    }
}

/// Parses a libpq-style `key=value key=value` conninfo string. Only
/// the keys this crate cares about (`host`, `port`, `user`, `password`,
/// `dbname`) are recognised; unknown keys are ignored rather than
/// rejected, since a real conninfo string may carry options (sslmode,
/// etc.) this backend doesn't model.
fn parse_conninfo(conninfo: &str) -> OmlResult<Overlay> {
    let mut overlay = Overlay::default();
    for pair in conninfo.split_whitespace() {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(OmlError::ConfigInvalid(format!(
                "malformed conninfo fragment `{}`, expected key=value",
                pair
            )));
        };
        match key {
            "host" => overlay.host = Some(value.to_string()),
            "port" => {
                overlay.port = Some(value.parse().map_err(|_| {
                    OmlError::ConfigInvalid(format!("invalid conninfo port `{}`", value))
                })?)
            }
            "user" => overlay.user = Some(value.to_string()),
            "password" => overlay.password = Some(value.to_string()),
            "dbname" => overlay.dbname = Some(value.to_string()),
            _ => {}
        }
    }
    Ok(overlay)
}

fn env_overlay() -> OmlResult<Overlay> {
    let mut overlay = Overlay::default();
    if let Ok(conninfo) = std::env::var("OML_PG_CONNINFO") {
        parse_conninfo(&conninfo)?.apply_onto(&mut overlay);
    }
    if let Ok(host) = std::env::var("OML_PG_HOST") {
        overlay.host = Some(host);
    }
    if let Ok(port) = std::env::var("OML_PG_PORT") {
        overlay.port = Some(
            port.parse()
                .map_err(|_| OmlError::ConfigInvalid(format!("invalid OML_PG_PORT `{}`", port)))?,
        );
    }
    if let Ok(user) = std::env::var("OML_PG_USER") {
        overlay.user = Some(user);
    }
    if let Ok(pass) = std::env::var("OML_PG_PASS") {
        overlay.password = Some(pass);
    }
    Ok(overlay)
}

fn cli_overlay(cli: &PgCliArgs) -> OmlResult<Overlay> {
    let mut overlay = Overlay::default();
    if let Some(conninfo) = &cli.conninfo {
        parse_conninfo(conninfo)?.apply_onto(&mut overlay);
    }
    overlay.host = cli.host.clone().or(overlay.host);
    overlay.port = cli.port.or(overlay.port);
    overlay.user = cli.user.clone().or(overlay.user);
    overlay.password = cli.password.clone().or(overlay.password);
    overlay.dbname = cli.dbname.clone().or(overlay.dbname);
    Ok(overlay)
}

/// Resolves a `PgConnectConfig` from built-in defaults, environment
/// variables, and CLI flags, in that increasing order of precedence.
#[cfg(feature = "postgres")]
pub fn resolve(cli: &PgCliArgs) -> OmlResult<PgConnectConfig> {
    let mut overlay = Overlay {
        host: Some(DEFAULT_HOST.to_string()),
        port: Some(DEFAULT_PORT),
        user: Some(DEFAULT_USER.to_string()),
        password: None,
        dbname: Some(DEFAULT_DBNAME.to_string()),
    };
    env_overlay()?.apply_onto(&mut overlay);
    cli_overlay(cli)?.apply_onto(&mut overlay);

    Ok(PgConnectConfig {
        host: overlay.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: overlay.port.unwrap_or(DEFAULT_PORT),
        user: overlay.user.unwrap_or_else(|| DEFAULT_USER.to_string()),
        password: overlay.password,
        dbname: overlay.dbname.unwrap_or_else(|| DEFAULT_DBNAME.to_string()),
    })
}

/// Initialises the term + file combined logger (spec "ambient stack"),
/// mirroring the teacher's `init()` in `src/lib.rs`.
#[cfg(feature = "cli")]
pub fn init_logging() -> anyhow::Result<()> {
    use anyhow::Context;

    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term]).context("initialize logger")
}

#[cfg(all(test, feature = "postgres"))]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_else_is_set() {
        std::env::remove_var("OML_PG_HOST");
        std::env::remove_var("OML_PG_PORT");
        std::env::remove_var("OML_PG_USER");
        std::env::remove_var("OML_PG_PASS");
        std::env::remove_var("OML_PG_CONNINFO");
        let cfg = resolve(&PgCliArgs::default()).unwrap();
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.port, DEFAULT_PORT);
    }

    #[test]
    fn cli_flags_win_over_conninfo() {
        let cli = PgCliArgs {
            conninfo: Some("host=fromconninfo port=1111".to_string()),
            host: Some("fromflag".to_string()),
            ..PgCliArgs::default()
        };
        let cfg = resolve(&cli).unwrap();
        assert_eq!(cfg.host, "fromflag");
        assert_eq!(cfg.port, 1111);
    }

    #[test]
    fn parses_conninfo_fragments() {
        let overlay = parse_conninfo("host=db1 port=6543 dbname=experiments").unwrap();
        assert_eq!(overlay.host.as_deref(), Some("db1"));
        assert_eq!(overlay.port, Some(6543));
        assert_eq!(overlay.dbname.as_deref(), Some("experiments"));
    }

    #[test]
    fn rejects_malformed_conninfo() {
        assert!(parse_conninfo("not-a-pair").is_err());
    }
}
