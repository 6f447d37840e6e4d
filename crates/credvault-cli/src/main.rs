//! Credvault CLI - operator tooling for the credential vault

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use credvault_core::config::{Config, EnvKeySettings, KeySettingsProvider, SystemEnv};
use credvault_core::domain::security::{
    CipherAdapter, CredentialVault, EncryptedPayload, KeyMaterial, SecretValue,
    StoreCredentialRequest, TracingAuditSink, assert_no_loose_credentials, find_loose_credentials,
    validate_key_configuration,
};
use credvault_core::error::VaultError;
use credvault_core::infrastructure::security::SqliteCredentialRepository;
use credvault_core::storage::{Database, DatabaseConfig};
use serde_json::{Value, json};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "credvault")]
#[command(author, version, about = "Encrypted credential vault for multi-tenant integrations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum KeyEncoding {
    #[default]
    Hex,
    Base64,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and generate encryption keys
    Keys {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Encrypt a value with the current key configuration
    Encrypt {
        /// Plaintext to encrypt
        plaintext: String,
    },

    /// Decrypt a payload with the current key configuration
    Decrypt {
        /// Base64 payload produced by `encrypt`
        payload: String,
    },

    /// Store a secret in the vault and print its reference
    Store {
        /// Owning tenant
        #[arg(long)]
        tenant: String,
        /// External provider the secret belongs to
        #[arg(long)]
        provider: String,
        /// Integration the secret belongs to
        #[arg(long)]
        integration: Option<String>,
        /// Credential kind (defaults to GENERIC)
        #[arg(long)]
        kind: Option<String>,
        /// Non-secret metadata as a JSON object
        #[arg(long)]
        meta: Option<String>,
        /// Treat the secret as JSON instead of raw text
        #[arg(long)]
        json: bool,
        /// The secret value
        secret: String,
    },

    /// Resolve a vault reference into its secret
    Resolve {
        /// Reference returned by `store`
        secret_ref: String,
        /// Only resolve when the record belongs to this tenant
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Scan a JSON file for plaintext credentials
    Scan {
        /// JSON file to scan
        file: PathBuf,
        /// Name of the boundary, used in the report
        #[arg(long, default_value = "scanned document")]
        context: String,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Validate the configured key sources
    Check,
    /// Print a fresh random 32-byte key
    Generate {
        #[arg(long, value_enum, default_value = "hex")]
        encoding: KeyEncoding,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("credvault=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;
    debug!(database = %config.database_path.display(), "Loaded configuration");
    let keys = EnvKeySettings::new(SystemEnv, config.keys.clone());

    match cli.command {
        Commands::Keys { action } => match action {
            KeyAction::Check => cmd_keys_check(&keys, cli.format, cli.quiet),
            KeyAction::Generate { encoding } => cmd_keys_generate(encoding),
        },

        Commands::Encrypt { plaintext } => cmd_encrypt(&keys, &plaintext),

        Commands::Decrypt { payload } => cmd_decrypt(&keys, &payload),

        Commands::Store {
            tenant,
            provider,
            integration,
            kind,
            meta,
            json,
            secret,
        } => {
            let mut request = StoreCredentialRequest::new(tenant, provider, parse_secret(secret, json)?);
            request.integration_id = integration;
            request.kind = kind;
            request.meta = meta.as_deref().map(parse_meta).transpose()?;

            let vault = open_vault(&config, keys).await?;
            cmd_store(&vault, request, cli.format, cli.quiet).await
        }

        Commands::Resolve { secret_ref, tenant } => {
            let vault = open_vault(&config, keys).await?;
            cmd_resolve(&vault, &secret_ref, tenant.as_deref(), cli.format).await
        }

        Commands::Scan { file, context } => cmd_scan(&file, &context, cli.format, cli.quiet),
    }
}

/// Render a vault error with its stable code and an operator hint
fn vault_error(err: VaultError) -> anyhow::Error {
    let mut message = format!("{} [{}]", err, err.code());
    if let Some(hint) = err.suggestion() {
        message.push_str(&format!("\n  hint: {}", hint));
    }
    anyhow!(message)
}

fn parse_secret(secret: String, as_json: bool) -> anyhow::Result<SecretValue> {
    if !as_json {
        return Ok(SecretValue::from(secret));
    }
    let value: Value = serde_json::from_str(&secret).context("--json secret is not valid JSON")?;
    Ok(SecretValue::from(value))
}

fn parse_meta(raw: &str) -> anyhow::Result<Value> {
    let meta: Value = serde_json::from_str(raw).context("--meta is not valid JSON")?;
    if !meta.is_object() {
        bail!("--meta must be a JSON object");
    }
    assert_no_loose_credentials(&meta, "credential metadata").map_err(vault_error)?;
    Ok(meta)
}

async fn open_vault(config: &Config, keys: EnvKeySettings) -> anyhow::Result<CredentialVault> {
    let db = Database::new(DatabaseConfig::with_path(&config.database_path)).await?;
    let repository = SqliteCredentialRepository::new(db.pool().clone());
    Ok(
        CredentialVault::new(Arc::new(repository), Arc::new(keys))
            .with_audit_sink(Arc::new(TracingAuditSink)),
    )
}

// ============================================================================
// Command Implementations
// ============================================================================

fn cmd_keys_check(
    keys: &EnvKeySettings,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let settings = keys.current();
    let names = settings.names().clone();

    let report = match validate_key_configuration(&settings) {
        Ok(report) => report,
        Err(err) => {
            if format == OutputFormat::Json {
                let out = json!({
                    "valid": false,
                    "code": err.code(),
                    "message": err.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
            return Err(vault_error(err));
        }
    };

    info!(
        effective_source = %report.effective_source,
        fallback_count = report.fallback_count,
        "Key configuration validated"
    );

    match format {
        OutputFormat::Json => {
            let out = json!({
                "valid": true,
                "effective_source": report.effective_source,
                "fallback_count": report.fallback_count,
                "configured_sources": report.configured_sources,
                "mismatch_overridden": report.mismatch_overridden,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text if quiet => println!("ok"),
        OutputFormat::Text => {
            println!("[OK] Key configuration is valid");
            println!(
                "     Effective source: {} ({})",
                report.effective_source,
                names.for_source(report.effective_source)
            );
            println!("     Fallback keys: {}", report.fallback_count);
            let configured: Vec<String> = report
                .configured_sources
                .iter()
                .map(|s| s.to_string())
                .collect();
            println!("     Configured sources: {}", configured.join(", "));
            for (fixed, alt) in &report.mismatch_overridden {
                println!(
                    "[!!] {} and {} differ; accepted because {} is set",
                    names.for_source(*fixed),
                    names.for_source(*alt),
                    names.allow_mismatch
                );
            }
        }
    }
    Ok(())
}

fn cmd_keys_generate(encoding: KeyEncoding) -> anyhow::Result<()> {
    let key = KeyMaterial::generate();
    match encoding {
        KeyEncoding::Hex => println!("{}", key.to_hex()),
        KeyEncoding::Base64 => println!("{}", key.to_base64()),
    }
    Ok(())
}

fn cmd_encrypt(keys: &EnvKeySettings, plaintext: &str) -> anyhow::Result<()> {
    let cipher = CipherAdapter::from_settings(&keys.current()).map_err(vault_error)?;
    let payload = cipher.encrypt(plaintext).map_err(vault_error)?;
    println!("{}", payload);
    Ok(())
}

fn cmd_decrypt(keys: &EnvKeySettings, payload: &str) -> anyhow::Result<()> {
    let cipher = CipherAdapter::from_settings(&keys.current()).map_err(vault_error)?;
    let plaintext = cipher
        .decrypt(&EncryptedPayload::new(payload))
        .map_err(vault_error)?;
    println!("{}", plaintext);
    Ok(())
}

async fn cmd_store(
    vault: &CredentialVault,
    request: StoreCredentialRequest,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let stored = vault.store_credential(request).await.map_err(vault_error)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stored)?),
        OutputFormat::Text if quiet => println!("{}", stored.secret_ref),
        OutputFormat::Text => {
            println!("Stored credential");
            println!("  Reference: {}", stored.secret_ref);
            println!("  Tenant:    {}", stored.tenant_id);
            println!("  Provider:  {}", stored.provider);
            if let Some(integration) = &stored.integration_id {
                println!("  Integration: {}", integration);
            }
            println!("  Kind:      {}", stored.kind);
            println!("  Created:   {}", stored.created_at.to_rfc3339());
        }
    }
    Ok(())
}

async fn cmd_resolve(
    vault: &CredentialVault,
    secret_ref: &str,
    tenant: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let Some(resolved) = vault
        .resolve_credential(secret_ref, tenant)
        .await
        .map_err(vault_error)?
    else {
        bail!("No credential found for the given reference");
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
        OutputFormat::Text => match &resolved.secret {
            Value::String(text) => println!("{}", text),
            other => println!("{}", serde_json::to_string(other)?),
        },
    }
    Ok(())
}

fn cmd_scan(file: &Path, context: &str, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let findings = find_loose_credentials(&value);

    match format {
        OutputFormat::Json => {
            let out = json!({ "context": context, "findings": findings });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            if findings.is_empty() {
                if !quiet {
                    println!("[OK] No plaintext credentials in {}", file.display());
                }
            } else {
                for path in &findings {
                    println!("[!!] {}", path);
                }
            }
        }
    }

    if findings.is_empty() {
        return Ok(());
    }
    Err(vault_error(VaultError::LooseCredentialBlocked {
        context: context.to_string(),
        paths: findings,
    }))
}
