use crate::args::PostgresArgs;
use anyhow::{Context, Result};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use owo_colors::OwoColorize;
use rustls::pki_types::CertificateDer;
use tokio_postgres::NoTls;

/// Builds a connection pool from the flattened CLI/env arguments. Falls back to a plaintext
/// connection when no CA cert is configured, matching `postgres_ssl_mode = "prefer"`'s default.
pub fn create_pool(pg_args: &PostgresArgs) -> Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(pg_args.postgres_host.clone());
    cfg.port = Some(pg_args.postgres_port);
    cfg.dbname = Some(pg_args.postgres_database.clone());
    cfg.user = Some(pg_args.postgres_username.clone());
    cfg.password = pg_args.postgres_password.clone();
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let pool = match &pg_args.postgres_ca_cert {
        Some(ca_cert_path) => {
            let bytes = std::fs::read(ca_cert_path)
                .with_context(|| format!("failed to read {ca_cert_path}"))?;
            let certs = parse_ca_certs(&bytes)?;
            let tls = crate::make_rustls(certs)?;
            cfg.create_pool(Some(Runtime::Tokio1), tls)
                .context("failed to create TLS postgres pool")?
        }
        None => cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .context("failed to create postgres pool")?,
    };

    println!(
        "{}",
        format!(
            "connected to postgres at {}:{}/{}",
            pg_args.postgres_host, pg_args.postgres_port, pg_args.postgres_database
        )
        .green()
    );

    Ok(pool)
}

fn parse_ca_certs(bytes: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = std::io::BufReader::new(bytes);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse CA cert PEM")?;
    Ok(certs)
}

/// Strips `--` line comments and `/* */` block comments from a SQL source string so that
/// multi-statement DDL can be split on `;` and executed one statement at a time.
pub fn strip_sql_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_comments() {
        let sql = "select 1; -- a comment\nselect 2;";
        let stripped = strip_sql_comments(sql);
        assert!(!stripped.contains("a comment"));
        assert!(stripped.contains("select 1;"));
        assert!(stripped.contains("select 2;"));
    }

    #[test]
    fn strips_block_comments() {
        let sql = "create table /* note */ foo (id int);";
        let stripped = strip_sql_comments(sql);
        assert!(!stripped.contains("note"));
        assert!(stripped.contains("create table"));
        assert!(stripped.contains("foo (id int);"));
    }
}
