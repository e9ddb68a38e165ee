use std::io::BufRead;
use std::io::Write;

use crate::vojo::duplicate_policy::DuplicateStrategy;
use crate::vojo::duplicate_policy::ItemAction;

/// Resolves the run-wide duplicate strategy for the dashboard pipeline.
/// A static `update`/`skip` configuration value wins without prompting; an
/// unattended run defaults to skip so nothing is overwritten silently.
pub fn resolve_run_strategy(
    on_duplicate: &str,
    interactive: bool,
) -> Result<DuplicateStrategy, anyhow::Error> {
    match on_duplicate {
        "update" => {
            info!("configuration set to override existing dashboards");
            Ok(DuplicateStrategy::Override)
        }
        "skip" => {
            info!("configuration set to skip existing dashboards");
            Ok(DuplicateStrategy::Skip)
        }
        _ => {
            if !interactive {
                info!("non-interactive run, existing dashboards will be skipped");
                return Ok(DuplicateStrategy::Skip);
            }
            prompt_run_strategy(&mut std::io::stdin().lock())
        }
    }
}

pub(crate) fn prompt_run_strategy(
    input: &mut dyn BufRead,
) -> Result<DuplicateStrategy, anyhow::Error> {
    println!();
    println!("What should happen when a dashboard already exists in the target?");
    println!("  [o] Override - replace existing dashboards with the source versions");
    println!("  [s] Skip - keep existing dashboards, only create new ones");
    println!("  [c] Cancel - abort the migration");
    loop {
        print!("Enter your choice [o/s/c]: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            // EOF mid-prompt behaves like an unattended run.
            return Ok(DuplicateStrategy::Skip);
        }
        match DuplicateStrategy::parse_choice(&line) {
            Some(choice) => return Ok(choice),
            None => println!("Invalid choice. Please try again."),
        }
    }
}

/// Per-item prompt used by the sequential migrators when a name collision is
/// found. `kind` names the object type for the messages, e.g. "event".
pub fn prompt_item_action(kind: &str, name: &str) -> Result<ItemAction, anyhow::Error> {
    prompt_item_action_from(kind, name, &mut std::io::stdin().lock())
}

pub(crate) fn prompt_item_action_from(
    kind: &str,
    name: &str,
    input: &mut dyn BufRead,
) -> Result<ItemAction, anyhow::Error> {
    loop {
        println!();
        println!("The {} '{}' already exists in the target system.", kind, name);
        println!("Choose an action:");
        println!("  [s] Skip");
        println!("  [u] Update the existing {}", kind);
        println!("  [c] Cancel migration");
        print!("Enter your choice [s/u/c]: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(ItemAction::Skip);
        }
        match ItemAction::parse_choice(&line) {
            Some(choice) => return Ok(choice),
            None => println!("Invalid choice. Please try again."),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn static_update_wins_without_prompting() {
        let strategy = resolve_run_strategy("update", false).unwrap();
        assert_eq!(strategy, DuplicateStrategy::Override);
    }

    #[test]
    fn static_skip_wins_without_prompting() {
        let strategy = resolve_run_strategy("skip", true).unwrap();
        assert_eq!(strategy, DuplicateStrategy::Skip);
    }

    #[test]
    fn non_interactive_ask_defaults_to_skip() {
        let strategy = resolve_run_strategy("ask", false).unwrap();
        assert_eq!(strategy, DuplicateStrategy::Skip);
    }

    #[test]
    fn prompt_retries_until_a_valid_choice() {
        let mut input = Cursor::new(b"bogus\no\n".to_vec());
        let strategy = prompt_run_strategy(&mut input).unwrap();
        assert_eq!(strategy, DuplicateStrategy::Override);
    }

    #[test]
    fn prompt_eof_falls_back_to_skip() {
        let mut input = Cursor::new(Vec::new());
        let strategy = prompt_run_strategy(&mut input).unwrap();
        assert_eq!(strategy, DuplicateStrategy::Skip);
    }

    #[test]
    fn item_prompt_parses_update() {
        let mut input = Cursor::new(b"u\n".to_vec());
        let action = prompt_item_action_from("event", "cpu spike", &mut input).unwrap();
        assert_eq!(action, ItemAction::Update);
    }
}
