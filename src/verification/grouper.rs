use crate::verification::issue::Issue;

/// Split issues into runs of nearby blocks
///
/// Issues are sorted by block number; a new group starts whenever the
/// distance to the previous issue exceeds `gap`. Each group is re-translated
/// with a single call.
pub fn group_issues(mut issues: Vec<Issue>, gap: usize) -> Vec<Vec<Issue>> {
    issues.sort_by_key(|issue| issue.block_number);

    let mut groups: Vec<Vec<Issue>> = Vec::new();
    for issue in issues {
        match groups.last_mut() {
            Some(group)
                if group
                    .last()
                    .is_some_and(|previous| issue.block_number - previous.block_number <= gap) =>
            {
                group.push(issue)
            }
            _ => groups.push(vec![issue]),
        }
    }
    groups
}
