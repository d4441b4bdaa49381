//! Grouping of well-known accounts by display name.

use std::collections::HashMap;

use crate::domain::{AccountGroup, WellKnownAccount};

/// Group accounts by name, most addresses first.
///
/// Ties keep the order in which each name first appeared. Entries without a name
/// or an account are skipped.
pub fn group_and_count_accounts(entries: &[WellKnownAccount]) -> Vec<AccountGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<AccountGroup> = Vec::new();

    for entry in entries {
        let (Some(name), Some(account)) = (entry.name.as_deref(), entry.account.as_deref()) else {
            continue;
        };
        if name.is_empty() || account.is_empty() {
            continue;
        }
        let slot = *index.entry(name).or_insert_with(|| {
            groups.push(AccountGroup {
                name: name.to_string(),
                accounts: Vec::new(),
                account_count: 0,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.accounts.push(account.to_string());
        group.account_count = group.accounts.len();
    }

    // `sort_by` is stable.
    groups.sort_by(|a, b| b.account_count.cmp(&a.account_count));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn groups_by_name_and_sorts_by_count() {
        let entries = vec![
            WellKnownAccount::new("A", "1"),
            WellKnownAccount::new("A", "2"),
            WellKnownAccount::new("B", "3"),
        ];
        let groups = group_and_count_accounts(&entries);
        assert_eq!(
            groups,
            vec![
                AccountGroup {
                    name: "A".into(),
                    accounts: vec!["1".into(), "2".into()],
                    account_count: 2
                },
                AccountGroup {
                    name: "B".into(),
                    accounts: vec!["3".into()],
                    account_count: 1
                },
            ]
        );
    }

    #[test]
    fn ties_keep_first_occurrence_order() {
        let entries = vec![
            WellKnownAccount::new("C", "1"),
            WellKnownAccount::new("B", "2"),
            WellKnownAccount::new("A", "3"),
            WellKnownAccount::new("A", "4"),
        ];
        let names: Vec<String> = group_and_count_accounts(&entries).into_iter().map(|g| g.name).collect();
        assert_eq!(names, ["A", "C", "B"]);
    }

    #[test]
    fn skips_incomplete_entries() {
        let entries: Vec<WellKnownAccount> = serde_json::from_value(json!([
            {"name": "A", "account": "1"},
            {"name": "A"},
            {"account": "2"},
            {"name": "", "account": "3"},
            {"name": "B", "account": "4", "domain": "b.example"}
        ]))
        .unwrap();
        let groups = group_and_count_accounts(&entries);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].accounts, ["1"]);
        assert_eq!(groups[1].accounts, ["4"]);
    }
}
