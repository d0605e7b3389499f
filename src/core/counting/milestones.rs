use super::counting_models::{CustomEmoji, MilestoneEvent, SpecialNumberEvent};
use std::collections::{BTreeMap, BTreeSet};

/// Exact match against the channel's milestone set.
pub fn check_milestone(value: u64, milestones: &BTreeSet<u64>) -> Option<MilestoneEvent> {
    milestones.contains(&value).then_some(MilestoneEvent { value })
}

/// Exact match against the guild's curated special numbers. Independent of milestones.
pub fn check_special_number(
    value: u64,
    special_numbers: &BTreeMap<u64, Option<CustomEmoji>>,
) -> Option<SpecialNumberEvent> {
    special_numbers
        .get(&value)
        .map(|emoji| SpecialNumberEvent {
            value,
            emoji: emoji.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milestones_match_exactly() {
        let milestones = BTreeSet::from([100, 500]);
        assert_eq!(
            check_milestone(100, &milestones),
            Some(MilestoneEvent { value: 100 })
        );
        assert_eq!(check_milestone(101, &milestones), None);
        assert_eq!(check_milestone(250, &milestones), None);
    }

    #[test]
    fn a_value_can_be_both_milestone_and_special() {
        let milestones = BTreeSet::from([100]);
        let devil = CustomEmoji::parse("<:devil:66>").unwrap();
        let specials = BTreeMap::from([(100, None), (666, Some(devil.clone()))]);

        assert!(check_milestone(100, &milestones).is_some());
        assert_eq!(
            check_special_number(100, &specials),
            Some(SpecialNumberEvent {
                value: 100,
                emoji: None
            })
        );

        let event = check_special_number(666, &specials).unwrap();
        assert_eq!(event.emoji, Some(devil));
        assert!(check_milestone(666, &milestones).is_none());
    }
}
