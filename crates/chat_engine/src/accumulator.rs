use chat_core::{DeltaPayload, Message, ResultFragment, SequenceId};
use thiserror::Error;

/// Failure while concatenating ordered fragments into the final message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccumulateError {
    #[error("fragment {sequence_id} carries an unresolvable delta payload")]
    MalformedFragment { sequence_id: SequenceId },
}

/// Concatenates ordered fragment deltas into the final assistant message.
///
/// Iteration stops at the first stop marker (the final sentinel or a
/// stop/length finish); trailing fragments a backend may emit after that
/// point are never appended. A malformed delta anywhere before the stop point
/// fails the whole build, so no partial message is ever produced from it.
pub fn build_final_message<'a, I>(ordered: I) -> Result<Message, AccumulateError>
where
    I: IntoIterator<Item = &'a ResultFragment>,
{
    let mut content = String::new();

    for fragment in ordered {
        if fragment.is_stop_marker() {
            break;
        }

        match &fragment.delta {
            DeltaPayload::Text(text) => content.push_str(text),
            DeltaPayload::Empty => {}
            DeltaPayload::Malformed(_) => {
                return Err(AccumulateError::MalformedFragment {
                    sequence_id: fragment.sequence_id,
                });
            }
        }
    }

    Ok(Message::assistant(content))
}

#[cfg(test)]
mod tests {
    use chat_core::{FinishReason, ResultFragment, Role};
    use serde_json::json;

    use super::{build_final_message, AccumulateError};

    #[test]
    fn ordered_deltas_concatenate_into_an_assistant_message() {
        let fragments = vec![
            ResultFragment::text(0, "lo "),
            ResultFragment::text(1, "Hel"),
            ResultFragment::finished(2, FinishReason::Stop),
        ];

        let message =
            build_final_message(fragments.iter()).expect("ordered build should succeed");

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "lo Hel");
    }

    #[test]
    fn content_after_the_stop_marker_is_ignored() {
        let fragments = vec![
            ResultFragment::text(0, "kept"),
            ResultFragment::finished(1, FinishReason::Length),
            ResultFragment::empty(2),
            ResultFragment::text(3, " dropped"),
        ];

        let message =
            build_final_message(fragments.iter()).expect("ordered build should succeed");
        assert_eq!(message.content, "kept");
    }

    #[test]
    fn sentinel_terminates_accumulation_like_an_explicit_finish() {
        let fragments = vec![
            ResultFragment::text(0, "answer"),
            ResultFragment::sentinel(1),
            ResultFragment::text(2, " trailing"),
        ];

        let message =
            build_final_message(fragments.iter()).expect("ordered build should succeed");
        assert_eq!(message.content, "answer");
    }

    #[test]
    fn malformed_delta_fails_the_whole_build() {
        let fragments = vec![
            ResultFragment::text(0, "partial "),
            ResultFragment::malformed(1, json!({"content": 42})),
            ResultFragment::finished(2, FinishReason::Stop),
        ];

        let error = build_final_message(fragments.iter())
            .expect_err("malformed delta should fail the build");
        assert_eq!(error, AccumulateError::MalformedFragment { sequence_id: 1 });
    }

    #[test]
    fn empty_deltas_before_the_stop_point_contribute_nothing() {
        let fragments = vec![
            ResultFragment::empty(0),
            ResultFragment::text(1, "only"),
            ResultFragment::empty(2),
            ResultFragment::finished(3, FinishReason::Stop),
        ];

        let message =
            build_final_message(fragments.iter()).expect("ordered build should succeed");
        assert_eq!(message.content, "only");
    }

    #[test]
    fn rebuilding_the_same_buffer_is_deterministic() {
        let fragments = vec![
            ResultFragment::text(0, "same "),
            ResultFragment::text(1, "answer"),
            ResultFragment::finished(2, FinishReason::Stop),
        ];

        let first = build_final_message(fragments.iter()).expect("first build should succeed");
        let second = build_final_message(fragments.iter()).expect("second build should succeed");
        assert_eq!(first, second);
    }
}
