use super::counting_models::{
    ChannelCounterState, GuildCountingConfig, RejectReason, SubmissionEvent, ViolationNotice,
};

/// Channel state after a rejected submission.
///
/// The default policy wipes the count back to zero. Channels in recovery
/// mode keep their count so the next person can post the correct number.
pub fn apply_rejection(state: &ChannelCounterState, _reason: RejectReason) -> ChannelCounterState {
    let mut next = state.clone();
    if !state.recovery_enabled {
        next.last_accepted_value = 0;
        next.last_acceptor_id = None;
    }
    next
}

/// Build the notice the moderation side acts on.
pub fn violation_notice(
    config: &GuildCountingConfig,
    before: &ChannelCounterState,
    submission: &SubmissionEvent,
    reason: RejectReason,
) -> ViolationNotice {
    ViolationNotice {
        guild_id: submission.guild_id,
        channel_id: submission.channel_id,
        user_id: submission.author_id,
        reason,
        submitted_text: submission.raw_text.clone(),
        expected: before.expected_next(),
        count_reset: !before.recovery_enabled,
        penalty: config.penalty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn counting_state(last: u64, acceptor: Option<u64>) -> ChannelCounterState {
        let mut state = ChannelCounterState::new(last, BTreeSet::new());
        state.last_acceptor_id = acceptor;
        state
    }

    #[test]
    fn every_reason_resets_by_default() {
        let before = counting_state(5, Some(2));
        for reason in [
            RejectReason::InvalidFormat,
            RejectReason::SameUserTwice,
            RejectReason::WrongNumber,
        ] {
            let after = apply_rejection(&before, reason);
            assert_eq!(after.last_accepted_value, 0);
            assert_eq!(after.last_acceptor_id, None);
        }
    }

    #[test]
    fn recovery_mode_keeps_the_count() {
        let mut before = counting_state(5, Some(2));
        before.recovery_enabled = true;

        let after = apply_rejection(&before, RejectReason::WrongNumber);
        assert_eq!(after, before);
    }

    #[test]
    fn notice_carries_expected_value_and_penalty() {
        let mut config = GuildCountingConfig::new(1);
        config.penalty_minutes = 5;
        let before = counting_state(5, Some(2));
        let submission = SubmissionEvent {
            guild_id: 1,
            channel_id: 3,
            author_id: 4,
            raw_text: "7".to_string(),
        };

        let notice = violation_notice(&config, &before, &submission, RejectReason::WrongNumber);
        assert_eq!(notice.expected, 6);
        assert_eq!(notice.user_id, 4);
        assert!(notice.count_reset);
        assert_eq!(notice.penalty, Some(Duration::from_secs(300)));

        config.penalty_minutes = 0;
        let notice = violation_notice(&config, &before, &submission, RejectReason::WrongNumber);
        assert_eq!(notice.penalty, None);
    }
}
