//! Display ordering for lists and items
//!
//! These functions work on already-fetched collections. They never touch a
//! backend and never modify their input.

use crate::models::{Item, ShoppingList};

/// Orders lists newest first. Lists with equal timestamps keep their input order.
pub fn order_lists(lists: &[ShoppingList]) -> Vec<ShoppingList> {
    let mut ordered = lists.to_vec();
    ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    ordered
}

/// Puts not-done items before done items, keeping relative order within each group.
pub fn order_items(items: &[Item]) -> Vec<Item> {
    let (mut pending, done): (Vec<Item>, Vec<Item>) =
        items.iter().cloned().partition(|item| !item.done);
    pending.extend(done);
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn item(label: &str, done: bool) -> Item {
        let mut item = Item::new(Uuid::nil(), label, "", "");
        item.done = done;
        item
    }

    fn labels(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.label.as_str()).collect()
    }

    #[test]
    fn test_order_lists_newest_first() {
        let t0 = Utc.with_ymd_and_hms(2017, 1, 12, 9, 0, 0).unwrap();
        let l1 = ShoppingList::new("L1", t0);
        let l2 = ShoppingList::new("L2", t0 + Duration::days(1));

        let ordered = order_lists(&[l1.clone(), l2.clone()]);
        assert_eq!(ordered, vec![l2, l1]);
    }

    #[test]
    fn test_order_lists_is_idempotent_and_stable() {
        let t0 = Utc.with_ymd_and_hms(2017, 1, 12, 9, 0, 0).unwrap();
        let lists = vec![
            ShoppingList::new("a", t0),
            ShoppingList::new("b", t0 + Duration::weeks(1)),
            ShoppingList::new("c", t0),
            ShoppingList::new("d", t0 + Duration::days(30)),
        ];

        let once = order_lists(&lists);
        let titles: Vec<&str> = once.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["d", "b", "a", "c"]);
        assert_eq!(order_lists(&once), once);
    }

    #[test]
    fn test_order_items_done_last() {
        let milk = item("Milk", true);
        let eggs = item("Eggs", false);
        let ordered = order_items(&[milk, eggs]);
        assert_eq!(labels(&ordered), vec!["Eggs", "Milk"]);
    }

    #[test]
    fn test_order_items_stable_partition() {
        let input = vec![
            item("a", true),
            item("b", false),
            item("c", true),
            item("d", false),
            item("e", false),
            item("f", true),
        ];
        let ordered = order_items(&input);
        assert_eq!(labels(&ordered), vec!["b", "d", "e", "a", "c", "f"]);

        let first_done = ordered.iter().position(|i| i.done).unwrap();
        assert!(ordered[first_done..].iter().all(|i| i.done));
        assert_eq!(labels(&input), vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn test_order_empty() {
        assert!(order_lists(&[]).is_empty());
        assert!(order_items(&[]).is_empty());
    }
}
