use serde::Serialize;

use crate::models::TagCount;

pub const MAX_WEIGHT : u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudTag {
    pub name :   String,
    pub count :  u32,
    pub weight : u32,
}

/// Scales each count linearly onto `0..=max_weight`, the least used tag
/// getting 0 and the most used `max_weight`.
pub fn weigh(counts : Vec<TagCount>, max_weight : u32) -> Vec<CloudTag> {
    let min = counts.iter().map(|t| t.count).min().unwrap_or(0);
    let max = counts.iter().map(|t| t.count).max().unwrap_or(0);

    let range = match max - min {
        0 => 1,
        n => u64::from(n),
    };

    counts
        .into_iter()
        .map(|t| {
            let weight = u64::from(max_weight) * u64::from(t.count - min) / range;

            CloudTag {
                name :   t.name,
                count :  t.count,
                weight : weight as u32,
            }
        })
        .collect()
}
