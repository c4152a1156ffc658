use std::path::PathBuf;

use doorward::{EventClass, Registry, Verdict, ViolationKind};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let mut registry = match doorward::load(&config.store) {
        Ok(registry) => registry,
        Err(err) => {
            eprintln!("error: cannot read {}: {err}", config.store.display());
            std::process::exit(1);
        }
    };

    let verdict = registry.rulecheck(&config.user, &config.text, config.class.flags());
    print_verdict(&config, &verdict, &mut registry);
}

struct CliConfig {
    store: PathBuf,
    user: String,
    text: String,
    class: EventClass,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut store = PathBuf::from("doorward.policy");
    let mut user: Option<String> = None;
    let mut text: Option<String> = None;
    let mut class = EventClass::InstantMessage;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("doorward {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--store" | "-s" => {
                let value = args.next().ok_or_else(|| "error: --store expects a path".to_string())?;
                store = PathBuf::from(value);
            }
            "--user" | "-u" => {
                let value = args.next().ok_or_else(|| "error: --user expects a name".to_string())?;
                user = Some(value);
            }
            "--class" | "-c" => {
                let value = args.next().ok_or_else(|| "error: --class expects a value".to_string())?;
                class = parse_class(&value)?;
            }
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                text = Some(rest);
                break;
            }
            other if other.starts_with('-') => {
                return Err(format!("error: unknown option {other}"));
            }
            other => {
                if text.is_some() {
                    return Err("error: message text provided multiple times".to_string());
                }
                text = Some(other.to_string());
            }
        }
    }

    let user = user.ok_or_else(|| "error: --user is required".to_string())?;
    let text = text.unwrap_or_else(|| user.clone());

    Ok(CliConfig { store, user, text, class })
}

fn parse_class(value: &str) -> Result<EventClass, String> {
    match value {
        "chat" => Ok(EventClass::ChatMessage),
        "im" => Ok(EventClass::InstantMessage),
        "enterleave" => Ok(EventClass::EnterLeave),
        "invite" => Ok(EventClass::Invite),
        other => Err(format!(
            "error: unknown event class {other} (expected chat, im, enterleave, invite)"
        )),
    }
}

fn print_verdict(config: &CliConfig, verdict: &Verdict, registry: &mut Registry) {
    if verdict.clean() {
        println!("clean: no rule matched");
        return;
    }

    println!("score: {:?}", verdict.score);

    for violation in &verdict.violations {
        match violation.kind {
            ViolationKind::Message => println!("  reply: {}", violation.payload),
            ViolationKind::Sound => println!("  sound: {}", violation.payload),
            ViolationKind::Execute => println!("  execute: {}", violation.payload),
        }
    }

    if verdict.should_blacklist() {
        // Mirror what a host does with the IGNORE bit, in memory only;
        // rerun with --store pointed at a scratch copy to persist it.
        registry.assign_user(&config.user, doorward::BLACKLIST_LEVEL);
        println!("disposition: drop, sender moved to {}", doorward::BLACKLIST_LEVEL);
    } else if verdict.should_drop() {
        println!("disposition: drop");
    } else {
        println!("disposition: deliver with side effects");
    }
}

fn print_help() {
    println!(
        "doorward - evaluate a chat/IM event against a policy store

USAGE:
    doorward --user <name> [OPTIONS] [--] <message text>

OPTIONS:
    -u, --user <name>     protocol-qualified sender, e.g. aim:somebody
    -s, --store <path>    policy store file (default: doorward.policy)
    -c, --class <class>   chat | im | enterleave | invite (default: im)
    -h, --help            print this help
    -V, --version         print version

A missing store file evaluates against the seeded default levels."
    );
}
