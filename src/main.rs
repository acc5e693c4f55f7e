//! CLI entry point for `jamShell`.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, TimeZone, Utc};
use clap::{CommandFactory, Parser, Subcommand};

use jamshell::config::Config;
use jamshell::format::attr;
use jamshell::model::message::Message;
use jamshell::search::{self, Filter, TextField};
use jamshell::store::Base;

#[derive(Parser)]
#[command(
    name = "jamshell",
    version,
    about = "Inspect and maintain JAM message bases"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the fixed header and file sizes of a base
    Info {
        /// Base path prefix (without extension)
        base: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List messages
    List {
        base: PathBuf,
        /// Include deleted messages
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
    /// Print one message
    Read {
        base: PathBuf,
        /// Message slot (1-based)
        number: u32,
        /// Mark the message read for this user
        #[arg(long, value_name = "USER")]
        user: Option<String>,
        /// Also print kludge, SEEN-BY and PATH lines
        #[arg(long)]
        kludges: bool,
    },
    /// Post a message (text from --file or stdin)
    Post {
        base: PathBuf,
        #[arg(long)]
        from: String,
        #[arg(long, default_value = "All")]
        to: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        private: bool,
        /// Origin FTN address
        #[arg(long)]
        orig: Option<String>,
        /// Destination FTN address
        #[arg(long)]
        dest: Option<String>,
    },
    /// Soft-delete a message
    Delete { base: PathBuf, number: u32 },
    /// Show or update a user's lastread pointer
    Lastread {
        base: PathBuf,
        user: String,
        /// Mark this message number as read
        #[arg(long, value_name = "N")]
        mark: Option<u32>,
    },
    /// Scan messages with filters (all given filters must match)
    Search {
        base: PathBuf,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        /// Match sender, recipient or subject
        #[arg(long)]
        text: Option<String>,
        /// Only messages written after this date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        after: Option<NaiveDate>,
        #[arg(long, value_name = "USER")]
        unread_by: Option<String>,
        #[arg(long, value_name = "USER")]
        private_for: Option<String>,
        /// Replies to this message slot
        #[arg(long, value_name = "N")]
        replies_to: Option<u32>,
        /// Include deleted messages
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = jamshell::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Info { base, json } => cmd_info(&base, json, &config),
        Commands::List { base, all, json } => cmd_list(&base, all, json, &config),
        Commands::Read {
            base,
            number,
            user,
            kludges,
        } => cmd_read(&base, number, user.as_deref(), kludges, &config),
        Commands::Post {
            base,
            from,
            to,
            subject,
            file,
            private,
            orig,
            dest,
        } => {
            let mut msg = Message::new(from, to, subject, read_body(file.as_deref())?);
            if private {
                msg = msg.with_private();
            }
            msg.orig_addr = orig.unwrap_or_default();
            msg.dest_addr = dest.unwrap_or_default();
            msg.pid = format!("jamshell {}", env!("CARGO_PKG_VERSION"));
            cmd_post(&base, &msg, &config)
        }
        Commands::Delete { base, number } => cmd_delete(&base, number, &config),
        Commands::Lastread { base, user, mark } => cmd_lastread(&base, &user, mark, &config),
        Commands::Search {
            base,
            from,
            to,
            subject,
            text,
            after,
            unread_by,
            private_for,
            replies_to,
            all,
            json,
        } => {
            let mut base = open_base(&base, &config)?;
            let mut filter = if all { Filter::All } else { Filter::NotDeleted };
            let text_filters = [
                (TextField::From, from),
                (TextField::To, to),
                (TextField::Subject, subject),
                (TextField::Any, text),
            ];
            for (field, needle) in text_filters {
                if let Some(needle) = needle {
                    filter = filter.and(Filter::text(field, &needle));
                }
            }
            if let Some(date) = after {
                filter = filter.and(Filter::AfterDate(
                    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()),
                ));
            }
            if let Some(user) = unread_by {
                let last_read = match base.get_last_read(&user) {
                    Ok(rec) => rec.last_read,
                    Err(jamshell::error::JamError::NotFound(_)) => 0,
                    Err(e) => return Err(e.into()),
                };
                filter = filter.and(Filter::UnreadAfter { last_read });
            }
            if let Some(user) = private_for {
                filter = filter.and(Filter::private_for(&user));
            }
            if let Some(n) = replies_to {
                let target = base.read_message(n)?;
                if target.msgid.is_empty() {
                    anyhow::bail!("Message {n} has no MSGID; nothing can reply to it");
                }
                filter = filter.and(Filter::RepliesTo {
                    msgid: target.msgid,
                });
            }

            let results = search::scan(&mut base, &filter)?;
            base.close()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_message_table(&results, &config);
            }
            Ok(())
        }
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = jamshell::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "jamshell.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Open an existing base. Only `post` may create one.
fn open_base(path: &Path, config: &Config) -> anyhow::Result<Base> {
    Ok(Base::open_existing(path, config.store)?)
}

/// Read a message body from a file, or from stdin when no file is given.
fn read_body(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "jamshell", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn cmd_info(path: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let mut base = open_base(path, config)?;
    let stats = base.stats()?;
    base.close()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let created = jamshell::model::message::timestamp(stats.fixed.date_created);
    println!();
    println!("  {:<20} {}", "Base", path.display());
    println!(
        "  {:<20} {}",
        "Created",
        created.format(&config.display.date_format)
    );
    println!("  {:<20} {}", "Messages", stats.message_count);
    println!("  {:<20} {}", "Active", stats.fixed.active_msgs);
    println!("  {:<20} {}", "Base number", stats.fixed.base_msg_num);
    println!("  {:<20} {}", "Mod counter", stats.fixed.mod_counter);
    println!(
        "  {:<20} {}",
        "Password",
        if stats.fixed.password_crc == 0 { "no" } else { "yes" }
    );
    println!(
        "  {:<20} {} / {} / {} / {}",
        "Sizes (hdr/txt/idx/lr)",
        format_size(stats.header_bytes, BINARY),
        format_size(stats.text_bytes, BINARY),
        format_size(stats.index_bytes, BINARY),
        format_size(stats.lastread_bytes, BINARY)
    );
    if stats.fixed.active_msgs > stats.message_count {
        println!("  Active count exceeds slot count; the fixed header is stale.");
    }
    println!();
    Ok(())
}

fn cmd_list(path: &Path, all: bool, json: bool, config: &Config) -> anyhow::Result<()> {
    let mut base = open_base(path, config)?;
    let filter = if all { Filter::All } else { Filter::NotDeleted };
    let messages = search::scan(&mut base, &filter)?;
    base.close()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else {
        print_message_table(&messages, config);
    }
    Ok(())
}

fn cmd_read(
    path: &Path,
    slot: u32,
    user: Option<&str>,
    kludges: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let mut base = open_base(path, config)?;
    let msg = base.read_message(slot)?;
    if msg.is_deleted() {
        anyhow::bail!("Message {slot} is deleted");
    }
    if let Some(user) = user {
        base.mark_read(user, msg.number)?;
        base.increment_times_read(slot)?;
    }
    base.close()?;

    println!("  {:<9} {}", "Msg", msg.number);
    println!("  {:<9} {}", "Date", msg.date.format(&config.display.date_format));
    println!("  {:<9} {} {}", "From", msg.from, msg.orig_addr);
    println!("  {:<9} {} {}", "To", msg.to, msg.dest_addr);
    println!("  {:<9} {}", "Subject", msg.subject);
    let flags = attr::describe(msg.attributes);
    if !flags.is_empty() {
        println!("  {:<9} {}", "Attr", flags.join(" "));
    }
    if kludges {
        if !msg.msgid.is_empty() {
            println!("  @MSGID: {}", msg.msgid);
        }
        if !msg.reply_id.is_empty() {
            println!("  @REPLY: {}", msg.reply_id);
        }
        for line in &msg.kludges {
            println!("  @{line}");
        }
    }
    println!("  {}", "-".repeat(70));
    println!("{}", msg.text);
    if kludges {
        for line in &msg.seen_by {
            println!("SEEN-BY: {line}");
        }
        for line in &msg.path {
            println!("@PATH: {line}");
        }
    }
    Ok(())
}

fn cmd_post(path: &Path, msg: &Message, config: &Config) -> anyhow::Result<()> {
    let mut base = Base::open_with(path, config.store)?;
    let slot = base.write_message(msg)?;
    let number = base.external_number(slot);
    base.close()?;
    println!("  Posted message {number} to {}", path.display());
    Ok(())
}

fn cmd_delete(path: &Path, slot: u32, config: &Config) -> anyhow::Result<()> {
    let mut base = open_base(path, config)?;
    base.delete_message(slot)?;
    base.close()?;
    println!("  Deleted message {slot}");
    Ok(())
}

fn cmd_lastread(path: &Path, user: &str, mark: Option<u32>, config: &Config) -> anyhow::Result<()> {
    let mut base = open_base(path, config)?;
    if let Some(n) = mark {
        base.mark_read(user, n)?;
    }
    let record = match base.get_last_read(user) {
        Ok(rec) => Some(rec),
        Err(jamshell::error::JamError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };
    let unread = base.unread_count(user)?;
    let next = base.next_unread(user).ok();
    base.close()?;

    println!();
    println!("  {:<12} {}", "User", user);
    match record {
        Some(rec) => {
            println!("  {:<12} {}", "Last read", rec.last_read);
            println!("  {:<12} {}", "High read", rec.high_read);
        }
        None => println!("  {:<12} (no record)", "Last read"),
    }
    println!("  {:<12} {}", "Unread", unread);
    if let Some(next) = next {
        println!("  {:<12} {}", "Next", next);
    }
    println!();
    Ok(())
}

/// Print messages as a human-readable table.
fn print_message_table(messages: &[Message], config: &Config) {
    println!();
    println!("  {} message(s)", messages.len());
    println!();

    if messages.is_empty() {
        return;
    }

    let width = config.display.subject_width;
    println!(
        "  {:<6} {:<17} {:<20} {:<20} {:<width$} {}",
        "#", "Date", "From", "To", "Subject", "Flags"
    );
    println!("  {}", "-".repeat(70 + width));

    for msg in messages {
        let date = msg.date.format(&config.display.date_format).to_string();
        let from: String = msg.from.chars().take(19).collect();
        let to: String = msg.to.chars().take(19).collect();
        let subject: String = msg.subject.chars().take(width.saturating_sub(1)).collect();
        let mut flags = String::new();
        if msg.is_private() {
            flags.push('P');
        }
        if msg.is_deleted() {
            flags.push('D');
        }
        println!(
            "  {:<6} {:<17} {:<20} {:<20} {:<width$} {}",
            msg.number, date, from, to, subject, flags
        );
    }
    println!();
}
