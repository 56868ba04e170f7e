//! Latchkey CLI
//!
//! A local, single-user password vault: one encrypted file, unlocked by a
//! master passphrase.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use latchkey_core::{
    default_vault_path, device_fingerprint, generate, load_config, totp_now, vault_exists,
    verify_license, AuditEngine, Entry, EntryUpdate, GeneratorOptions, Session, VaultConfig,
};

#[derive(Parser)]
#[command(name = "latchkey")]
#[command(version)]
#[command(about = "Latchkey - a single-file encrypted password vault")]
#[command(after_help = "EXAMPLES:
  latchkey init                     Create a new vault
  latchkey add github.com           Add an entry (prompts securely)
  latchkey list                     List entries (never values)
  latchkey audit                    Flag weak, reused, and old passwords
  latchkey totp github.com          Print the entry's current one-time code")]
struct Cli {
    /// Vault file path (defaults to ~/.latchkey/vault.dat)
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new vault
    Init {
        /// Vault display name
        #[arg(long, default_value = "MyVault")]
        name: String,
    },

    /// Add an entry to the vault
    Add {
        /// Entry label (e.g. a site name)
        label: String,
        /// Username or login
        #[arg(long)]
        username: Option<String>,
        /// Site URL or email
        #[arg(long)]
        url: Option<String>,
        /// Base32 TOTP secret
        #[arg(long)]
        otp_secret: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// List entries (labels and usernames, never passwords)
    List {
        /// Case-insensitive filter over labels, usernames, URLs, and tags
        #[arg(long)]
        filter: Option<String>,
    },

    /// Show one entry
    Show {
        label: String,
        /// Print the password instead of a mask
        #[arg(long)]
        reveal: bool,
    },

    /// Edit an entry's fields (use 'rotate' to change the password)
    Edit(EditArgs),

    /// Change an entry's password (previous value is kept in history)
    Rotate { label: String },

    /// Remove an entry
    Remove { label: String },

    /// Audit the vault for weak, reused, and old passwords
    Audit,

    /// Print the current TOTP code for an entry
    Totp { label: String },

    /// Generate a random password
    Generate {
        #[arg(long, default_value = "16")]
        length: usize,
        #[arg(long)]
        no_upper: bool,
        #[arg(long)]
        no_lower: bool,
        #[arg(long)]
        no_digits: bool,
        #[arg(long)]
        no_symbols: bool,
    },

    /// Change the master password
    ChangeMaster,

    /// Verify an offline license token
    License {
        token: String,
        /// Check against this fingerprint instead of this machine's
        #[arg(long)]
        fingerprint: Option<String>,
    },

    /// Print this machine's license fingerprint
    Fingerprint,
}

#[derive(Args)]
struct EditArgs {
    /// Entry label
    label: String,
    /// New label
    #[arg(long)]
    rename: Option<String>,
    /// Username or login
    #[arg(long)]
    username: Option<String>,
    /// Site URL or email
    #[arg(long)]
    url: Option<String>,
    /// Free-form notes
    #[arg(long)]
    notes: Option<String>,
    /// Comma-separated tags (replaces the existing set)
    #[arg(long)]
    tags: Option<String>,
    /// Base32 TOTP secret
    #[arg(long, conflicts_with = "clear_otp")]
    otp_secret: Option<String>,
    /// Remove the TOTP secret
    #[arg(long)]
    clear_otp: bool,
    /// Mark or unmark as favorite
    #[arg(long)]
    favorite: Option<bool>,
}

impl EditArgs {
    fn into_update(self) -> EntryUpdate {
        EntryUpdate {
            label: self.rename,
            username: self.username,
            url: self.url,
            notes: self.notes,
            tags: self.tags.map(split_tags),
            otp_secret: if self.clear_otp {
                Some(None)
            } else {
                self.otp_secret.map(Some)
            },
            favorite: self.favorite,
            password: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.rename.is_none()
            && self.username.is_none()
            && self.url.is_none()
            && self.notes.is_none()
            && self.tags.is_none()
            && self.otp_secret.is_none()
            && !self.clear_otp
            && self.favorite.is_none()
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let vault_path = cli.vault.unwrap_or_else(default_vault_path);
    tracing::debug!(path = %vault_path.display(), "resolved vault path");

    match cli.command {
        None => {
            println!("latchkey - a single-file encrypted password vault");
            println!();
            if vault_exists(&vault_path) {
                println!("Vault: {}", vault_path.display());
                println!("Run 'latchkey list' to see entries, or 'latchkey --help'.");
            } else {
                println!("No vault found at {}.", vault_path.display());
                println!("Run 'latchkey init' to create one.");
            }
        }
        Some(cmd) => {
            if let Err(e) = handle_command(cmd, &vault_path) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn handle_command(cmd: Commands, vault_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Init { name } => handle_init(vault_path, &name),
        Commands::Add {
            label,
            username,
            url,
            otp_secret,
            tags,
        } => handle_add(vault_path, &label, username, url, otp_secret, tags),
        Commands::List { filter } => handle_list(vault_path, filter),
        Commands::Show { label, reveal } => handle_show(vault_path, &label, reveal),
        Commands::Edit(args) => handle_edit(vault_path, args),
        Commands::Rotate { label } => handle_rotate(vault_path, &label),
        Commands::Remove { label } => handle_remove(vault_path, &label),
        Commands::Audit => handle_audit(vault_path),
        Commands::Totp { label } => handle_totp(vault_path, &label),
        Commands::Generate {
            length,
            no_upper,
            no_lower,
            no_digits,
            no_symbols,
        } => handle_generate(length, no_upper, no_lower, no_digits, no_symbols),
        Commands::ChangeMaster => handle_change_master(vault_path),
        Commands::License { token, fingerprint } => handle_license(&token, fingerprint),
        Commands::Fingerprint => {
            println!("{}", device_fingerprint());
            Ok(())
        }
    }
}

// === Command handlers ===

fn handle_init(vault_path: &PathBuf, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    if vault_exists(vault_path) {
        return Err(format!("Vault already exists at {}", vault_path.display()).into());
    }

    let password = prompt_password("Create master password: ")?;
    let confirm = prompt_password("Confirm master password: ")?;
    if password != confirm {
        return Err("Passwords do not match".into());
    }
    if password.len() < 8 {
        return Err("Master password must be at least 8 characters".into());
    }

    let config = load_config(vault_path)?;
    let session = Session::create(vault_path, name, password.into(), config.iterations)?;
    session.lock();

    println!("Vault created at {}", vault_path.display());
    println!();
    println!("Next steps:");
    println!("  latchkey add <label>    Add an entry");
    println!("  latchkey audit          Check password health");
    Ok(())
}

fn handle_add(
    vault_path: &PathBuf,
    label: &str,
    username: Option<String>,
    url: Option<String>,
    otp_secret: Option<String>,
    tags: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(vault_path)?;

    if session.data().find_by_label(label).is_some() {
        return Err(format!("Entry '{}' already exists. Use 'latchkey rotate'.", label).into());
    }

    let password = prompt_password(&format!("Password for '{}': ", label))?;

    let entry = Entry::new(label);
    let id = entry.id;
    session.add_entry(entry);
    session.edit_entry(
        id,
        EntryUpdate {
            username,
            url,
            password: Some(password),
            otp_secret: otp_secret.map(Some),
            tags: tags.map(split_tags),
            ..Default::default()
        },
    )?;
    session.save()?;
    session.lock();

    println!("Added '{}'.", label);
    Ok(())
}

fn handle_list(
    vault_path: &PathBuf,
    filter: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(vault_path)?;
    let data = session.data();

    let entries: Vec<&Entry> = match &filter {
        Some(q) => data.search(q),
        None => data.entries.iter().collect(),
    };

    if entries.is_empty() {
        println!("No entries.");
    } else {
        println!("{}: {} entr{}", data.vault_name, entries.len(),
            if entries.len() == 1 { "y" } else { "ies" });
        println!();
        for e in entries {
            let fav = if e.favorite { "*" } else { " " };
            let tags = if e.tags.is_empty() {
                String::new()
            } else {
                format!("  [{}]", e.tags.join(", "))
            };
            println!("{} {:<28} {:<24}{}", fav, e.label, e.username, tags);
        }
    }

    session.lock();
    Ok(())
}

fn handle_show(
    vault_path: &PathBuf,
    label: &str,
    reveal: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(vault_path)?;
    let entry = session
        .data()
        .find_by_label(label)
        .ok_or_else(|| format!("Entry '{}' not found", label))?;

    println!("Label:     {}", entry.label);
    println!("Username:  {}", dash_if_empty(&entry.username));
    println!("URL:       {}", dash_if_empty(&entry.url));
    if reveal {
        println!("Password:  {}", entry.password);
    } else {
        println!("Password:  {} (use --reveal to print)", mask(&entry.password));
    }
    println!("TOTP:      {}", if entry.otp_secret.is_some() { "configured" } else { "-" });
    println!("Tags:      {}", if entry.tags.is_empty() { "-".to_string() } else { entry.tags.join(", ") });
    println!("Updated:   {}", entry.updated_at.format("%Y-%m-%d %H:%M"));
    println!("Revision:  {} ({} historical password{})",
        entry.pw_revision, entry.history.len(),
        if entry.history.len() == 1 { "" } else { "s" });

    session.lock();
    Ok(())
}

fn handle_edit(vault_path: &PathBuf, args: EditArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.is_empty() {
        return Err("Nothing to change; pass at least one field flag".into());
    }

    let mut session = open_session(vault_path)?;
    let id = session
        .data()
        .find_by_label(&args.label)
        .map(|e| e.id)
        .ok_or_else(|| format!("Entry '{}' not found", args.label))?;

    let label = args.label.clone();
    session.edit_entry(id, args.into_update())?;
    session.save()?;
    session.lock();

    println!("Updated '{}'.", label);
    Ok(())
}

fn handle_rotate(vault_path: &PathBuf, label: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(vault_path)?;
    let id = session
        .data()
        .find_by_label(label)
        .map(|e| e.id)
        .ok_or_else(|| format!("Entry '{}' not found", label))?;

    let password = prompt_password(&format!("New password for '{}': ", label))?;
    session.edit_entry(
        id,
        EntryUpdate {
            password: Some(password),
            ..Default::default()
        },
    )?;
    session.save()?;
    session.lock();

    println!("Rotated '{}'. The previous password is kept in history.", label);
    Ok(())
}

fn handle_remove(vault_path: &PathBuf, label: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(vault_path)?;
    let id = session
        .data()
        .find_by_label(label)
        .map(|e| e.id)
        .ok_or_else(|| format!("Entry '{}' not found", label))?;

    session.remove_entry(id)?;
    session.save()?;
    session.lock();

    println!("Removed '{}'.", label);
    Ok(())
}

fn handle_audit(vault_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(vault_path)?;
    let session = open_session(vault_path)?;
    let data = session.data();

    let report = AuditEngine::new(config.audit_policy()).run(data, chrono::Utc::now());

    let label_of = |id| {
        data.find(id)
            .map(|e: &Entry| e.label.as_str())
            .unwrap_or("?")
    };

    println!("Weak passwords:   {}", report.weak.len());
    println!("Reused groups:    {}", report.reused.len());
    println!("Old passwords:    {} (>{} days)", report.old.len(), config.stale_days);

    if !report.weak.is_empty() {
        println!();
        println!("Weak:");
        for id in &report.weak {
            println!("  - {}", label_of(*id));
        }
    }
    if !report.reused.is_empty() {
        println!();
        println!("Reused:");
        for group in &report.reused {
            let labels: Vec<&str> = group.entry_ids.iter().map(|id| label_of(*id)).collect();
            println!("  - {}", labels.join(", "));
        }
    }
    if !report.old.is_empty() {
        println!();
        println!("Old:");
        for id in &report.old {
            println!("  - {}", label_of(*id));
        }
    }
    if report.is_clean() {
        println!();
        println!("No findings.");
    }

    session.lock();
    Ok(())
}

fn handle_totp(vault_path: &PathBuf, label: &str) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(vault_path)?;
    let entry = session
        .data()
        .find_by_label(label)
        .ok_or_else(|| format!("Entry '{}' not found", label))?;
    let secret = entry
        .otp_secret
        .as_deref()
        .ok_or_else(|| format!("Entry '{}' has no OTP secret", label))?;

    let now_ms = chrono::Utc::now().timestamp_millis() as u64;
    let code = totp_now(secret, now_ms)?;
    let remaining = latchkey_core::seconds_remaining(now_ms, 30);
    println!("{}  (valid ~{}s)", code, remaining);

    session.lock();
    Ok(())
}

fn handle_generate(
    length: usize,
    no_upper: bool,
    no_lower: bool,
    no_digits: bool,
    no_symbols: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = GeneratorOptions {
        upper: !no_upper,
        lower: !no_lower,
        digits: !no_digits,
        symbols: !no_symbols,
    };
    let password = generate(length, options)
        .ok_or("Select at least one character class and a length that fits them all")?;
    println!("{}", password);
    Ok(())
}

fn handle_change_master(vault_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(vault_path)?;

    let new_password = prompt_password("New master password: ")?;
    let confirm = prompt_password("Confirm new master password: ")?;
    if new_password != confirm {
        return Err("Passwords do not match".into());
    }
    if new_password.len() < 8 {
        return Err("Master password must be at least 8 characters".into());
    }

    session.change_master(new_password.into())?;
    session.lock();

    println!("Master password updated.");
    Ok(())
}

fn handle_license(
    token: &str,
    fingerprint: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let fp = fingerprint.unwrap_or_else(device_fingerprint);
    let check = verify_license(token, Some(&fp));

    if check.valid {
        println!("License valid.");
        if let Some(plan) = check.plan() {
            println!("Plan: {}", plan);
        }
        if let Some(exp) = check
            .payload
            .as_ref()
            .and_then(|p| p.get("exp"))
            .and_then(|v| v.as_deref())
        {
            println!("Expires: {}", exp);
        }
        Ok(())
    } else {
        Err(format!("License invalid: {}", check.reason).into())
    }
}

// === Helpers ===

fn open_session(vault_path: &PathBuf) -> Result<Session, Box<dyn std::error::Error>> {
    if !vault_exists(vault_path) {
        return Err(format!(
            "No vault at {}. Run 'latchkey init' first.",
            vault_path.display()
        )
        .into());
    }
    let config: VaultConfig = load_config(vault_path)?;
    let password = prompt_password("Master password: ")?;
    Ok(Session::open(vault_path, password.into(), config.iterations)?)
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
    print!("{}", prompt);
    io::stdout().flush()?;
    Ok(rpassword::read_password()?)
}

fn split_tags(tags: String) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn mask(password: &str) -> String {
    if password.is_empty() {
        "-".to_string()
    } else {
        "*".repeat(password.chars().count().min(12))
    }
}

fn dash_if_empty(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn edit_parses_field_flags() {
        let cli = Cli::try_parse_from([
            "latchkey", "edit", "github.com",
            "--username", "octo",
            "--tags", "work, code",
            "--favorite", "true",
        ])
        .unwrap();

        let args = match cli.command {
            Some(Commands::Edit(args)) => args,
            _ => panic!("expected the edit subcommand"),
        };
        assert_eq!(args.label, "github.com");
        assert!(!args.is_empty());

        let update = args.into_update();
        assert_eq!(update.username.as_deref(), Some("octo"));
        assert_eq!(update.tags, Some(vec!["work".to_string(), "code".to_string()]));
        assert_eq!(update.favorite, Some(true));
        assert!(update.password.is_none());
        assert!(update.otp_secret.is_none());
    }

    #[test]
    fn edit_clear_otp_maps_to_removal() {
        let cli = Cli::try_parse_from(["latchkey", "edit", "github.com", "--clear-otp"]).unwrap();
        let args = match cli.command {
            Some(Commands::Edit(args)) => args,
            _ => panic!("expected the edit subcommand"),
        };
        assert_eq!(args.into_update().otp_secret, Some(None));
    }

    #[test]
    fn edit_otp_flags_conflict() {
        assert!(Cli::try_parse_from([
            "latchkey", "edit", "x",
            "--otp-secret", "JBSWY3DPEHPK3PXP",
            "--clear-otp",
        ])
        .is_err());
    }

    #[test]
    fn edit_with_no_flags_is_empty() {
        let cli = Cli::try_parse_from(["latchkey", "edit", "github.com"]).unwrap();
        match cli.command {
            Some(Commands::Edit(args)) => assert!(args.is_empty()),
            _ => panic!("expected the edit subcommand"),
        }
    }
}
