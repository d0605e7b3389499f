use super::counting_models::{ChannelCounterState, Outcome, RejectReason, SubmissionEvent};
use super::expression;

/// Decide what a submission does to the count. No side effects.
///
/// The same-user rule is checked before the number itself, so posting the
/// correct next number twice in a row is still a mistake.
pub fn validate(state: &ChannelCounterState, submission: &SubmissionEvent) -> Outcome {
    let Some(parsed) = parse_submission(state, &submission.raw_text) else {
        return if state.chat_allowed() {
            Outcome::Ignored
        } else {
            Outcome::Rejected(RejectReason::InvalidFormat)
        };
    };

    if state.last_acceptor_id == Some(submission.author_id) {
        return Outcome::Rejected(RejectReason::SameUserTwice);
    }

    match u64::try_from(parsed) {
        Ok(value) if value == state.expected_next() => Outcome::Accepted { value },
        _ => Outcome::Rejected(RejectReason::WrongNumber),
    }
}

fn parse_submission(state: &ChannelCounterState, raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }

    if state.expressions_allowed() {
        expression::evaluate(raw).ok()
    } else {
        None
    }
}
