mod cli;
mod prompts;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use uuid::Uuid;

use shoplist_core::db::{self, copy_between, export_backend_to_json, import_json_to_backend};
use shoplist_core::{
    get_config_path, order_items, order_lists, Config, Item, ItemChanges, ListChanges,
    ShoppingList, ShoppingListStore,
};

use crate::cli::{Cli, Command, DbCommand, ItemCommand, ListCommand};

/// Number of UUID characters shown in listings
const SHORT_ID_LEN: usize = 8;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = get_config_path()?;
    let config = Config::load_or_default(&config_path)?;
    log::debug!("Using config {:?}", config_path);

    let db_config = config.resolve_database(cli.db.as_deref(), cli.backend)?;
    let store = ShoppingListStore::open(&db_config, config.store_options())
        .with_context(|| format!("Failed to open database {:?}", db_config.path))?;

    let result = match &cli.command {
        Command::List(cmd) => handle_list_command(cmd, &store),
        Command::Item(cmd) => handle_item_command(cmd, &store),
        Command::Db(cmd) => handle_db_command(cmd, &store),
    };

    store.close();
    result
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn short_id(id: &Uuid) -> String {
    id.to_string()[..SHORT_ID_LEN].to_string()
}

/// Resolves a full UUID or a unique prefix against a set of candidate ids
fn resolve_id<'a, I>(kind: &str, id_str: &str, candidates: I) -> Result<Uuid>
where
    I: IntoIterator<Item = &'a Uuid>,
{
    if let Ok(id) = Uuid::parse_str(id_str) {
        return Ok(id);
    }

    let prefix = id_str.to_lowercase();
    let matches: Vec<Uuid> = candidates
        .into_iter()
        .filter(|id| id.to_string().starts_with(&prefix))
        .copied()
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => anyhow::bail!("No {} matches '{}'", kind, id_str),
        _ => anyhow::bail!(
            "'{}' matches {} {}s - use more characters",
            id_str,
            matches.len(),
            kind
        ),
    }
}

fn resolve_list_id(store: &ShoppingListStore, id_str: &str) -> Result<Uuid> {
    let lists = store.list_all()?;
    resolve_id("list", id_str, lists.iter().map(|l| &l.id))
}

fn resolve_item_id(store: &ShoppingListStore, id_str: &str) -> Result<Uuid> {
    let snapshot = store.backend().load()?;
    resolve_id("item", id_str, snapshot.items().iter().map(|i| &i.id))
}

// =============================================================================
// Lists
// =============================================================================

fn handle_list_command(cmd: &ListCommand, store: &ShoppingListStore) -> Result<()> {
    match cmd {
        ListCommand::Add { title } => {
            let list = store.create_list(title, chrono::Utc::now())?;
            println!("{}", "List added successfully!".green());
            println!("ID: {}", list.id);
        }
        ListCommand::Ls => show_lists(store)?,
        ListCommand::Show { id } => {
            let id = resolve_list_id(store, id)?;
            show_list(store, &id)?;
        }
        ListCommand::Rename { id, title } => {
            let id = resolve_list_id(store, id)?;
            store.update_list(&id, &ListChanges::title(title.as_str()))?;
            println!("{}", "List renamed.".green());
        }
        ListCommand::Rm { id, yes } => {
            let id = resolve_list_id(store, id)?;
            delete_list(store, &id, *yes)?;
        }
    }
    Ok(())
}

fn show_lists(store: &ShoppingListStore) -> Result<()> {
    let lists = order_lists(&store.list_all()?);

    if lists.is_empty() {
        println!("{}", "No lists found.".yellow());
        return Ok(());
    }

    println!(
        "{:<8} | {:<30} | {:<16} | {:<9}",
        "ID", "Title", "Created", "Done"
    );
    println!("{}", "-".repeat(72));

    for list in lists {
        let items = store.list_items(&list.id)?;
        let done = items.iter().filter(|i| i.done).count();
        let progress = format!("{}/{}", done, items.len());
        let progress = if !items.is_empty() && done == items.len() {
            progress.green()
        } else {
            progress.normal()
        };

        println!(
            "{:<8} | {:<30} | {:<16} | {:<9}",
            short_id(&list.id),
            list.title,
            list.created_at.format("%Y-%m-%d %H:%M"),
            progress
        );
    }

    Ok(())
}

fn show_list(store: &ShoppingListStore, id: &Uuid) -> Result<()> {
    let list = store.get_list(id)?;
    let items = order_items(&store.list_items(id)?);

    print_list_header(&list);
    if items.is_empty() {
        println!("  {}", "No items.".yellow());
        return Ok(());
    }
    for item in &items {
        print_item(item);
    }
    Ok(())
}

fn print_list_header(list: &ShoppingList) {
    println!("{}", list.title.bold());
    println!(
        "{}",
        format!(
            "{}  created {}",
            list.id,
            list.created_at.format("%Y-%m-%d %H:%M")
        )
        .dimmed()
    );
}

fn print_item(item: &Item) {
    let mut line = item.label.clone();
    if !item.sub_label.is_empty() {
        line.push_str(&format!(" ({})", item.sub_label));
    }

    if item.done {
        println!(
            "  {} {} {}",
            "[x]".green(),
            short_id(&item.id).dimmed(),
            line.strikethrough().dimmed()
        );
    } else {
        println!("  [ ] {} {}", short_id(&item.id).dimmed(), line);
    }

    if !item.annotation.is_empty() {
        println!("      {}", item.annotation.italic());
    }
}

fn delete_list(store: &ShoppingListStore, id: &Uuid, skip_confirm: bool) -> Result<()> {
    let list = store.get_list(id)?;
    let item_count = store.list_items(id)?.len();

    println!("{}", "List to delete:".yellow());
    println!("  ID: {}", list.id);
    println!("  Title: {}", list.title);
    println!("  Items: {}", item_count);

    if !skip_confirm
        && !prompts::confirm("Delete this list and all of its items?")?
    {
        println!("{}", "Deletion cancelled.".yellow());
        return Ok(());
    }

    store.delete_list(id)?;
    println!("{}", "List deleted successfully!".green());
    Ok(())
}

// =============================================================================
// Items
// =============================================================================

fn handle_item_command(cmd: &ItemCommand, store: &ShoppingListStore) -> Result<()> {
    match cmd {
        ItemCommand::Add {
            list,
            label,
            sub_label,
            annotation,
        } => {
            let list_id = resolve_list_id(store, list)?;
            // Check the list before prompting so a typo fails fast
            let list = store.get_list(&list_id)?;

            let new_item = match label {
                Some(label) => prompts::NewItem {
                    label: label.clone(),
                    sub_label: sub_label.clone().unwrap_or_default(),
                    annotation: annotation.clone().unwrap_or_default(),
                },
                None => prompts::prompt_new_item()?,
            };

            let item = store.create_item(
                &list.id,
                &new_item.label,
                &new_item.sub_label,
                &new_item.annotation,
            )?;
            println!("{} {}", "Added to".green(), list.title.green().bold());
            println!("ID: {}", item.id);
        }
        ItemCommand::Edit {
            id,
            label,
            sub_label,
            annotation,
        } => {
            let id = resolve_item_id(store, id)?;
            let mut changes = ItemChanges {
                label: label.clone(),
                sub_label: sub_label.clone(),
                annotation: annotation.clone(),
                done: None,
            };
            if changes.is_empty() {
                let item = store.get_item(&id)?;
                changes = prompts::prompt_edit_item(&item)?;
            }

            if changes.is_empty() {
                println!("{}", "Nothing changed.".yellow());
            } else {
                store.update_item(&id, &changes)?;
                println!("{}", "Item updated.".green());
            }
        }
        ItemCommand::Done { id } => {
            let id = resolve_item_id(store, id)?;
            let done = store.toggle_done(&id)?;
            let item = store.get_item(&id)?;
            if done {
                println!("{} {}", "Done:".green(), item.label);
            } else {
                println!("{} {}", "Not done:".yellow(), item.label);
            }
        }
        ItemCommand::Rm { id } => {
            let id = resolve_item_id(store, id)?;
            store.delete_item(&id)?;
            println!("{}", "Item deleted.".green());
        }
    }
    Ok(())
}

// =============================================================================
// Database maintenance
// =============================================================================

fn handle_db_command(cmd: &DbCommand, store: &ShoppingListStore) -> Result<()> {
    match cmd {
        DbCommand::Path => {
            println!(
                "{} ({})",
                store.backend().path().display(),
                store.backend_type()
            );
        }
        DbCommand::Stats => {
            let stats = store.stats()?;
            println!("Backend: {}", stats.backend_type);
            println!("Lists:   {}", stats.list_count);
            println!(
                "Items:   {} ({} done)",
                stats.item_count, stats.done_count
            );
        }
        DbCommand::Migrate { dest } => {
            let target = db::create_backend(dest, None)?;
            let count = copy_between(store.backend(), target.as_ref())?;
            println!(
                "{} {} lists to {} ({})",
                "Migrated".green(),
                count,
                dest.display(),
                target.backend_type()
            );
        }
        DbCommand::Export { output } => {
            export_backend_to_json(store.backend(), output)?;
            println!("{} {}", "Exported to".green(), output.display());
        }
        DbCommand::Import { input, yes } => {
            if !*yes && !prompts::confirm("Replace all lists with the imported data?")? {
                println!("{}", "Import cancelled.".yellow());
                return Ok(());
            }
            import_json_to_backend(input, store.backend())?;
            println!("{} {}", "Imported from".green(), input.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_full_uuid() {
        let id = Uuid::new_v4();
        let known: [&Uuid; 0] = [];
        assert_eq!(resolve_id("list", &id.to_string(), known).unwrap(), id);
    }

    #[test]
    fn test_resolve_unique_prefix() {
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let prefix = ids[0].to_string()[..SHORT_ID_LEN].to_uppercase();
        let resolved = resolve_id("list", &prefix, ids.iter());
        // Two random v4 ids sharing 8 hex chars is practically impossible
        assert_eq!(resolved.unwrap(), ids[0]);
    }

    #[test]
    fn test_resolve_ambiguous_and_missing() {
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let err = resolve_id("item", "", ids.iter()).unwrap_err();
        assert!(err.to_string().contains("matches 2 items"));

        let err = resolve_id("item", "zzzz", ids.iter()).unwrap_err();
        assert!(err.to_string().contains("No item matches"));
    }

    #[test]
    fn test_resolve_against_store() {
        let store = ShoppingListStore::in_memory();
        let list = store.create_list("Groceries", chrono::Utc::now()).unwrap();
        let item = store.create_item(&list.id, "Milk", "", "").unwrap();

        assert_eq!(resolve_list_id(&store, &short_id(&list.id)).unwrap(), list.id);
        assert_eq!(resolve_item_id(&store, &short_id(&item.id)).unwrap(), item.id);
    }
}
