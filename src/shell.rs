use crate::config;
use crate::dashboard::Dashboard;
use crate::errors::{AppError, AppResult};
use crate::models::{ChartKind, SadPathEdit};
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Line commands accepted by the headless dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Show,
    Edit(ChartKind),
    Email(String),
    Peak(String),
    SadPath(SadPathEdit),
    Refresh,
    Switch,
    Close,
    Reload,
    KeySet(String),
    KeyClear,
    KeyStatus,
    Help,
    Quit,
}

pub const HELP: &str = "commands: show | edit <duration|sadpath> | email <address> | peak <minutes> | \
sadpath <index> <name|-> <count|-> | refresh | switch | close | reload | key <set <value>|clear|status> | quit";

pub fn parse_command(line: &str) -> AppResult<ShellCommand> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "" | "show" => ShellCommand::Show,
        "edit" => ShellCommand::Edit(parse_chart(rest)?),
        "email" => ShellCommand::Email(rest.to_string()),
        "peak" => ShellCommand::Peak(rest.to_string()),
        "sadpath" => ShellCommand::SadPath(parse_sad_path_edit(rest)?),
        "refresh" => ShellCommand::Refresh,
        "switch" => ShellCommand::Switch,
        "close" => ShellCommand::Close,
        "reload" => ShellCommand::Reload,
        "key" => match rest.split_once(char::is_whitespace) {
            Some(("set", value)) => ShellCommand::KeySet(value.trim().to_string()),
            _ if rest == "clear" => ShellCommand::KeyClear,
            _ if rest == "status" => ShellCommand::KeyStatus,
            _ => return Err(AppError::Validation("usage: key set <value> | key clear | key status".to_string())),
        },
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(AppError::Validation(format!("unknown command {:?}", other))),
    };
    Ok(command)
}

fn parse_chart(raw: &str) -> AppResult<ChartKind> {
    match raw.to_ascii_lowercase().as_str() {
        "duration" | "call-duration" => Ok(ChartKind::CallDuration),
        "sadpath" | "sad-path" => Ok(ChartKind::SadPath),
        _ => Err(AppError::Validation(format!("unknown chart {:?}", raw))),
    }
}

/// `<index> <name|-> <count|->`; the name may be quoted to include spaces.
/// `-` leaves a field unchanged, `""` clears the count.
fn parse_sad_path_edit(raw: &str) -> AppResult<SadPathEdit> {
    let usage = || AppError::Validation("usage: sadpath <index> <name|-> <count|->".to_string());
    let (index, rest) = raw.split_once(char::is_whitespace).ok_or_else(usage)?;
    let index = index.parse::<usize>().map_err(|_| usage())?;
    let rest = rest.trim();

    let (name, count) = if let Some(quoted) = rest.strip_prefix('"') {
        let (name, count) = quoted.split_once('"').ok_or_else(usage)?;
        (Some(name.to_string()), count.trim())
    } else {
        let (name, count) = rest.rsplit_once(char::is_whitespace).ok_or_else(usage)?;
        let name = name.trim();
        ((name != "-").then(|| name.to_string()), count.trim())
    };

    let count = match count {
        "-" => None,
        "\"\"" => Some(String::new()),
        other => Some(other.to_string()),
    };

    Ok(SadPathEdit { index, name, count })
}

async fn execute(dashboard: &Dashboard, command: ShellCommand) -> AppResult<serde_json::Value> {
    let value = match command {
        ShellCommand::Show => serde_json::to_value(dashboard.snapshot().await)?,
        ShellCommand::Edit(chart) => serde_json::to_value(dashboard.request_edit(chart).await)?,
        ShellCommand::Email(raw) => serde_json::to_value(dashboard.submit_identity(&raw).await?)?,
        ShellCommand::Peak(raw) => {
            let outcome = dashboard.save_call_duration(&raw).await?;
            json!({ "outcome": outcome, "dashboard": dashboard.snapshot().await })
        }
        ShellCommand::SadPath(edit) => {
            let outcome = dashboard.save_sad_path(&[edit]).await?;
            json!({ "outcome": outcome, "dashboard": dashboard.snapshot().await })
        }
        ShellCommand::Refresh => serde_json::to_value(dashboard.refresh().await?)?,
        ShellCommand::Switch => serde_json::to_value(dashboard.switch_user().await?)?,
        ShellCommand::Close => serde_json::to_value(dashboard.dismiss_prompt().await)?,
        ShellCommand::Reload => serde_json::to_value(dashboard.load().await?)?,
        ShellCommand::KeySet(value) => serde_json::to_value(config::save_store_key(&value)?)?,
        ShellCommand::KeyClear => serde_json::to_value(config::clear_store_key()?)?,
        ShellCommand::KeyStatus => serde_json::to_value(config::has_store_key()?)?,
        ShellCommand::Help => json!({ "help": HELP }),
        ShellCommand::Quit => json!({ "bye": true }),
    };
    Ok(value)
}

/// Reads commands line by line and writes one JSON document per command.
/// Errors are reported inline and do not stop the loop.
pub async fn run_loop<R, W>(dashboard: &Dashboard, input: R, mut output: W) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let result = match parse_command(&line) {
            Ok(ShellCommand::Quit) => break,
            Ok(command) => execute(dashboard, command).await,
            Err(error) => Err(error),
        };

        let rendered = match result {
            Ok(value) => value,
            Err(error) => json!({ "error": error.to_string(), "dashboard": dashboard.snapshot().await }),
        };
        let mut text = serde_json::to_string(&rendered)?;
        text.push('\n');
        output.write_all(text.as_bytes()).await?;
        output.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_command, ShellCommand};
    use crate::models::{ChartKind, SadPathEdit};

    #[test]
    fn parses_basic_commands() {
        assert_eq!(parse_command("").expect("empty"), ShellCommand::Show);
        assert_eq!(
            parse_command("edit duration").expect("edit"),
            ShellCommand::Edit(ChartKind::CallDuration)
        );
        assert_eq!(
            parse_command("email  A@B.com ").expect("email"),
            ShellCommand::Email("A@B.com".to_string())
        );
        assert_eq!(parse_command("peak 5").expect("peak"), ShellCommand::Peak("5".to_string()));
        assert_eq!(parse_command("key status").expect("key"), ShellCommand::KeyStatus);
        assert_eq!(
            parse_command("key set abc").expect("key set"),
            ShellCommand::KeySet("abc".to_string())
        );
        assert!(parse_command("edit pie").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn parses_sad_path_edits() {
        assert_eq!(
            parse_command("sadpath 0 \"Dropped Calls\" 14").expect("quoted"),
            ShellCommand::SadPath(SadPathEdit {
                index: 0,
                name: Some("Dropped Calls".to_string()),
                count: Some("14".to_string()),
            })
        );
        assert_eq!(
            parse_command("sadpath 2 - \"\"").expect("clear count"),
            ShellCommand::SadPath(SadPathEdit {
                index: 2,
                name: None,
                count: Some(String::new()),
            })
        );
        assert_eq!(
            parse_command("sadpath 1 Outages -").expect("rename"),
            ShellCommand::SadPath(SadPathEdit {
                index: 1,
                name: Some("Outages".to_string()),
                count: None,
            })
        );
        assert!(parse_command("sadpath x y z").is_err());
    }
}
