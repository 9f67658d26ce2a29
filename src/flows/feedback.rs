// self
use crate::{
	_prelude::*,
	auth::{Feedback, NewFeedback, SubjectId},
	flows::{Orchestrator, observe},
	obs::FlowKind,
};

impl Orchestrator {
	/// Stores feedback from `subject` and posts it to the feedback channel.
	///
	/// Blank content is [`Error::InvalidFeedback`]; an identical submission by the same subject
	/// inside the duplicate window is [`Error::DuplicateFeedback`]. The duplicate check and the
	/// insert are separate store calls, so two simultaneous identical submissions can both
	/// land. The chat post runs detached and never affects the result.
	pub async fn submit_feedback(&self, subject: SubjectId, content: &str) -> Result<Feedback> {
		observe(FlowKind::SubmitFeedback, "submit_feedback", async {
			if content.trim().is_empty() {
				return Err(Error::InvalidFeedback);
			}

			let now = self.clock.now();
			let duplicates = self
				.store
				.count_recent_duplicate_feedback(subject, content, now - self.settings.duplicate_window)
				.await
				.map_err(Error::unavailable)?;

			if duplicates > 0 {
				return Err(Error::DuplicateFeedback);
			}

			let feedback = self
				.store
				.create_feedback(NewFeedback {
					subject_id: subject,
					content: content.to_owned(),
					created_at: now,
				})
				.await
				.map_err(Error::unavailable)?;

			self.side_channel.dispatch(
				self.settings.feedback_channel.clone(),
				format!("New user feedback (User ID: {subject}): {content}"),
			);

			Ok(feedback)
		})
		.await
	}
}
