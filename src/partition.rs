use crate::models::{AdRecord, GroupId};

/// The filtered record set split for rendering: every input record lands in
/// exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub ungrouped: Vec<AdRecord>,
    /// Bucket order is first-seen record order; member order preserves the
    /// filtered input order.
    pub grouped: Vec<(GroupId, Vec<AdRecord>)>,
}

pub fn partition<'a, I>(records: I) -> Partition
where
    I: IntoIterator<Item = &'a AdRecord>,
{
    let mut out = Partition::default();
    for ad in records {
        match &ad.group {
            None => out.ungrouped.push(ad.clone()),
            Some(group) => match out.grouped.iter().position(|(id, _)| id == group) {
                Some(slot) => out.grouped[slot].1.push(ad.clone()),
                None => out.grouped.push((group.clone(), vec![ad.clone()])),
            },
        }
    }
    out
}

/// Sum of `ads_count` over a record subset; empty or non-numeric cells count
/// as zero.
pub fn ads_count_total<'a, I>(records: I) -> u64
where
    I: IntoIterator<Item = &'a AdRecord>,
{
    records
        .into_iter()
        .filter_map(|ad| ad.ads_count.trim().parse::<u64>().ok())
        .sum()
}
