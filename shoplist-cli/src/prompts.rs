use anyhow::Result;
use inquire::{Confirm, Text};

use shoplist_core::{Item, ItemChanges};

/// Fields entered for a new item
pub struct NewItem {
    pub label: String,
    pub sub_label: String,
    pub annotation: String,
}

/// Prompts the user for a new item
pub fn prompt_new_item() -> Result<NewItem> {
    let label = Text::new("Item label:").prompt()?;
    let sub_label = Text::new("Sub label:").with_default("").prompt()?;
    let annotation = Text::new("Annotation:").with_default("").prompt()?;

    Ok(NewItem {
        label,
        sub_label,
        annotation,
    })
}

/// Prompts for new values, pre-filled with the item's current ones.
/// Only fields that actually changed end up in the result.
pub fn prompt_edit_item(item: &Item) -> Result<ItemChanges> {
    let label = Text::new("Item label:")
        .with_initial_value(&item.label)
        .prompt()?;
    let sub_label = Text::new("Sub label:")
        .with_initial_value(&item.sub_label)
        .prompt()?;
    let annotation = Text::new("Annotation:")
        .with_initial_value(&item.annotation)
        .prompt()?;

    Ok(ItemChanges {
        label: (label != item.label).then_some(label),
        sub_label: (sub_label != item.sub_label).then_some(sub_label),
        annotation: (annotation != item.annotation).then_some(annotation),
        done: None,
    })
}

/// Asks a yes/no question, defaulting to no
pub fn confirm(question: &str) -> Result<bool> {
    Ok(Confirm::new(question).with_default(false).prompt()?)
}
